//! Core input and output types.

use bytemuck::{Pod, Zeroable};
use glam::Vec3;
use std::fmt;

/// A bounding sphere.
///
/// `#[repr(C)]` with a stable 16-byte layout so slices of spheres can be
/// handed to other backends without conversion.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Pod, Zeroable)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Sphere {
    pub center: Vec3,
    /// Non-negative; negative and NaN radii are rejected when bound.
    pub radius: f32,
}

impl Sphere {
    #[inline]
    pub const fn new(center: Vec3, radius: f32) -> Self {
        Self { center, radius }
    }

    /// Same center, radius multiplied by `factor`.
    #[inline]
    pub fn scaled(self, factor: f32) -> Self {
        Self::new(self.center, self.radius * factor)
    }

    /// Tight axis-aligned box around the sphere.
    #[inline]
    pub fn aabb(&self) -> Aabb {
        let r = Vec3::splat(self.radius);
        Aabb::new(self.center - r, self.center + r)
    }
}

/// Trait for types that can be used as input spheres.
///
/// This allows zero-copy input from application-side body storage.
pub trait SphereLike {
    fn center(&self) -> Vec3;
    fn radius(&self) -> f32;

    #[inline]
    fn to_sphere(&self) -> Sphere {
        Sphere::new(self.center(), self.radius())
    }
}

impl SphereLike for Sphere {
    #[inline]
    fn center(&self) -> Vec3 {
        self.center
    }

    #[inline]
    fn radius(&self) -> f32 {
        self.radius
    }

    #[inline]
    fn to_sphere(&self) -> Sphere {
        *self
    }
}

impl SphereLike for (Vec3, f32) {
    #[inline]
    fn center(&self) -> Vec3 {
        self.0
    }

    #[inline]
    fn radius(&self) -> f32 {
        self.1
    }
}

impl SphereLike for [f32; 4] {
    #[inline]
    fn center(&self) -> Vec3 {
        Vec3::new(self[0], self[1], self[2])
    }

    #[inline]
    fn radius(&self) -> f32 {
        self[3]
    }
}

/// Axis-aligned bounding box, inclusive on both ends.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aabb {
    pub min: Vec3,
    pub max: Vec3,
}

impl Aabb {
    #[inline]
    pub const fn new(min: Vec3, max: Vec3) -> Self {
        Self { min, max }
    }

    /// Closest point of the box to `p`.
    #[inline]
    pub fn clamp_point(&self, p: Vec3) -> Vec3 {
        p.clamp(self.min, self.max)
    }
}

/// A candidate pair reported by the broad phase.
///
/// Ordering is lexicographic on `(a, b)`. Pairs produced by the pipeline
/// always satisfy `a < b`.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Pod, Zeroable)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CollisionPair {
    pub a: u32,
    pub b: u32,
}

impl CollisionPair {
    #[inline]
    pub const fn new(a: u32, b: u32) -> Self {
        Self { a, b }
    }

    /// The same pair with the smaller id first.
    #[inline]
    pub fn normalized(self) -> Self {
        if self.a <= self.b {
            self
        } else {
            Self::new(self.b, self.a)
        }
    }

    #[inline]
    pub fn contains(&self, id: u32) -> bool {
        self.a == id || self.b == id
    }
}

impl From<(u32, u32)> for CollisionPair {
    #[inline]
    fn from((a, b): (u32, u32)) -> Self {
        Self::new(a, b)
    }
}

impl From<CollisionPair> for (u32, u32) {
    #[inline]
    fn from(p: CollisionPair) -> Self {
        (p.a, p.b)
    }
}

impl fmt::Display for CollisionPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({},{})", self.a, self.b)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sphere_layout() {
        assert_eq!(std::mem::size_of::<Sphere>(), 16);
        assert_eq!(std::mem::size_of::<CollisionPair>(), 8);
    }

    #[test]
    fn test_spheres_fit_in_device_buffers() {
        assert_eq!(Sphere::default(), Sphere::new(Vec3::ZERO, 0.0));
        let mut buf = crate::DeviceBuffer::<Sphere>::labeled("spheres");
        buf.resize(3).unwrap();
        buf.fill(Sphere::new(Vec3::ONE, 2.0));
        assert_eq!(buf.to_vec(), vec![Sphere::new(Vec3::ONE, 2.0); 3]);
    }

    #[test]
    fn test_sphere_like_impls_agree() {
        let s = Sphere::new(Vec3::new(1.0, 2.0, 3.0), 0.5);
        let tuple = (Vec3::new(1.0, 2.0, 3.0), 0.5f32);
        let arr = [1.0f32, 2.0, 3.0, 0.5];
        assert_eq!(tuple.to_sphere(), s);
        assert_eq!(arr.to_sphere(), s);
    }

    #[test]
    fn test_pair_ordering_is_lexicographic() {
        let mut pairs = vec![
            CollisionPair::new(2, 3),
            CollisionPair::new(1, 9),
            CollisionPair::new(1, 4),
        ];
        pairs.sort();
        assert_eq!(
            pairs,
            vec![
                CollisionPair::new(1, 4),
                CollisionPair::new(1, 9),
                CollisionPair::new(2, 3)
            ]
        );
        assert_eq!(CollisionPair::new(5, 2).normalized(), CollisionPair::new(2, 5));
        assert_eq!(CollisionPair::new(5, 2).to_string(), "(5,2)");
    }

    #[test]
    fn test_sphere_aabb() {
        let s = Sphere::new(Vec3::new(1.0, 1.0, 1.0), 0.25);
        let b = s.aabb();
        assert_eq!(b.min, Vec3::splat(0.75));
        assert_eq!(b.max, Vec3::splat(1.25));
    }
}
