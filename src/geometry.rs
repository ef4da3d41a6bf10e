//! Overlap predicates consumed by the pipeline.
//!
//! Both tests are closed: touching volumes count as overlapping. The
//! brute-force reference in [`crate::validation`] uses the same predicates,
//! so the pipeline and the reference agree on boundary cases.

use crate::types::{Aabb, Sphere};

/// Sphere–sphere overlap test.
#[inline]
pub fn sphere_sphere(a: &Sphere, b: &Sphere) -> bool {
    let r = a.radius + b.radius;
    a.center.distance_squared(b.center) <= r * r
}

/// Sphere–AABB overlap test (closest-point distance).
#[inline]
pub fn sphere_aabb(s: &Sphere, aabb: &Aabb) -> bool {
    let closest = aabb.clamp_point(s.center);
    s.center.distance_squared(closest) <= s.radius * s.radius
}
