pub mod spheres;
