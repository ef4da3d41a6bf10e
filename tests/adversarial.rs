//! Degenerate and hostile inputs.

mod support;

use glam::Vec3;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use sphere_broadphase::{
    find_pairs, find_pairs_with, validation, BroadPhaseConfig, CellHash, CollisionPair, Sphere,
};
use support::spheres::{clustered_spheres, lattice_spheres, random_spheres, random_spheres_around};

fn with_cell_size(cell_size: f32) -> BroadPhaseConfig {
    BroadPhaseConfig {
        cell_size: Some(cell_size),
        ..BroadPhaseConfig::default()
    }
}

fn assert_exact(spheres: &[Sphere], pairs: &[CollisionPair]) {
    let report = validation::validate(spheres, pairs);
    assert!(report.is_valid(), "{}", report);
}

#[test]
fn test_coincident_spheres() {
    let spheres = vec![Sphere::new(Vec3::new(3.7, -1.2, 0.4), 0.5); 60];
    let output = find_pairs(&spheres).expect("find_pairs failed");
    assert_eq!(output.pairs.len(), 60 * 59 / 2);
    assert_exact(&spheres, &output.pairs);
    assert_eq!(output.stats.largest_bucket, 60);
}

#[test]
fn test_dense_clusters() {
    let spheres = clustered_spheres(4, 300, 1.0, 0.3, 21);
    let output = find_pairs(&spheres).expect("find_pairs failed");
    assert!(output.stats.largest_bucket > 10);
    assert_exact(&spheres, &output.pairs);
}

#[test]
fn test_touching_on_cell_boundaries() {
    // Centers on grid corners, neighbours exactly tangent.
    let spheres = lattice_spheres(5, 1.0, 0.5, Vec3::splat(-2.0));
    let output = find_pairs_with(&spheres, with_cell_size(1.0)).expect("find_pairs_with failed");
    assert_eq!(output.pairs.len(), 3 * 5 * 5 * 4);
    assert_exact(&spheres, &output.pairs);
}

#[test]
fn test_one_large_sphere_among_small() {
    let mut spheres = random_spheres(600, 10.0, 0.25..=0.25, 22);
    spheres.push(Sphere::new(Vec3::new(0.5, -0.5, 0.25), 8.0));
    let output = find_pairs(&spheres).expect("find_pairs failed");
    assert_eq!(output.stats.cell_size, 8.0 * 2.25);
    let big = (spheres.len() - 1) as u32;
    assert!(output.pairs.iter().filter(|p| p.contains(big)).count() > 100);
    assert_exact(&spheres, &output.pairs);
}

#[test]
fn test_far_from_origin() {
    let mut rng = ChaCha8Rng::seed_from_u64(23);
    let spheres = random_spheres_around(Vec3::new(1.0e4, -2.0e4, 5.0e3), 800, 6.0, 0.3..=0.6, &mut rng);
    let output = find_pairs(&spheres).expect("find_pairs failed");
    assert!(!output.pairs.is_empty());
    assert_exact(&spheres, &output.pairs);

    let shifted = BroadPhaseConfig {
        origin: Vec3::new(1.0e4, -2.0e4, 5.0e3),
        ..BroadPhaseConfig::default()
    };
    let near = find_pairs_with(&spheres, shifted).expect("find_pairs_with failed");
    assert_eq!(near.pairs, output.pairs);
}

#[test]
fn test_cell_coordinates_saturate() {
    let spheres = [
        Sphere::new(Vec3::new(1.0e30, 0.0, 0.0), 1.0),
        Sphere::new(Vec3::new(1.0e30, 0.0, 0.0), 1.0),
        Sphere::new(Vec3::new(2.0e30, 0.0, 0.0), 1.0),
        Sphere::new(Vec3::new(-1.0e30, 0.0, 0.0), 1.0),
        Sphere::new(Vec3::new(0.0, 0.0, 0.0), 1.0),
    ];
    let output = find_pairs(&spheres).expect("find_pairs failed");
    assert_eq!(output.pairs, vec![CollisionPair::new(0, 1)]);
    assert_exact(&spheres, &output.pairs);
}

#[test]
fn test_bucket_collision_between_distant_cells() {
    // Cells (1, 0, 0) and (0, 1024, 0) hash to the same bucket.
    let spheres = [
        Sphere::new(Vec3::new(1.5, 0.5, 0.5), 0.1),
        Sphere::new(Vec3::new(0.5, 1024.5, 0.5), 0.1),
        Sphere::new(Vec3::new(1.6, 0.5, 0.5), 0.1),
    ];
    let output = find_pairs_with(&spheres, with_cell_size(1.0)).expect("find_pairs_with failed");
    assert_eq!(output.stats.valid_cell_count, 1);
    assert_eq!(output.stats.largest_bucket, 3);
    assert_eq!(output.pairs, vec![CollisionPair::new(0, 2)]);
}

#[test]
fn test_morton_bucket_collision_one_period_apart() {
    // Cells (0, 0, 0) and (1024, 0, 0) share their low 10 bits.
    let spheres = [
        Sphere::new(Vec3::new(0.5, 0.5, 0.5), 0.1),
        Sphere::new(Vec3::new(1024.5, 0.5, 0.5), 0.1),
        Sphere::new(Vec3::new(0.6, 0.5, 0.5), 0.1),
    ];
    let config = BroadPhaseConfig {
        cell_hash: CellHash::Morton,
        ..with_cell_size(1.0)
    };
    let output = find_pairs_with(&spheres, config).expect("find_pairs_with failed");
    assert_eq!(output.stats.valid_cell_count, 1);
    assert_eq!(output.stats.largest_bucket, 3);
    assert_eq!(output.pairs, vec![CollisionPair::new(0, 2)]);
}

#[test]
fn test_straddling_zero_with_small_cells() {
    // Many objects per cell, cells on both sides of every axis plane.
    let spheres = random_spheres(1500, 2.0, 0.1..=0.2, 24);
    for cell_size in [0.42, 0.5, 0.9] {
        let output = find_pairs_with(&spheres, with_cell_size(cell_size)).expect("find_pairs_with failed");
        assert_exact(&spheres, &output.pairs);
    }
}

#[test]
fn test_zero_radius_points_with_explicit_cells() {
    let mut points: Vec<Sphere> = random_spheres(200, 3.0, 0.0..=0.0, 25);
    // Duplicate a few points so some pairs exist.
    for i in 0..20 {
        points.push(points[i * 7]);
    }
    let output = find_pairs_with(&points, with_cell_size(0.5)).expect("find_pairs_with failed");
    assert!(output.pairs.len() >= 20);
    assert_exact(&points, &output.pairs);
}
