#![allow(dead_code)]

use glam::Vec3;
use rand::Rng;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use sphere_broadphase::Sphere;
use std::ops::RangeInclusive;

/// Spheres with centers uniform in `[-extent, extent]³` and radii uniform in `radius`.
pub fn random_spheres(n: usize, extent: f32, radius: RangeInclusive<f32>, seed: u64) -> Vec<Sphere> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    random_spheres_around(Vec3::ZERO, n, extent, radius, &mut rng)
}

pub fn random_spheres_around<R: Rng + ?Sized>(
    center: Vec3,
    n: usize,
    extent: f32,
    radius: RangeInclusive<f32>,
    rng: &mut R,
) -> Vec<Sphere> {
    (0..n)
        .map(|_| {
            let offset = Vec3::new(
                rng.gen_range(-extent..=extent),
                rng.gen_range(-extent..=extent),
                rng.gen_range(-extent..=extent),
            );
            Sphere::new(center + offset, rng.gen_range(radius.clone()))
        })
        .collect()
}

/// `clusters` tight groups of `per_cluster` spheres scattered in a large box.
pub fn clustered_spheres(clusters: usize, per_cluster: usize, spread: f32, radius: f32, seed: u64) -> Vec<Sphere> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut out = Vec::with_capacity(clusters * per_cluster);
    for _ in 0..clusters {
        let hub = Vec3::new(
            rng.gen_range(-50.0..50.0),
            rng.gen_range(-50.0..50.0),
            rng.gen_range(-50.0..50.0),
        );
        out.extend(random_spheres_around(hub, per_cluster, spread, radius..=radius, &mut rng));
    }
    out
}

/// A cubic lattice of `side³` spheres with the given spacing.
pub fn lattice_spheres(side: usize, spacing: f32, radius: f32, origin: Vec3) -> Vec<Sphere> {
    let mut out = Vec::with_capacity(side * side * side);
    for i in 0..side {
        for j in 0..side {
            for k in 0..side {
                let p = origin + Vec3::new(i as f32, j as f32, k as f32) * spacing;
                out.push(Sphere::new(p, radius));
            }
        }
    }
    out
}
