//! Uniform grid hashing: position → cell → bucket.
//!
//! Cells are cubes of side `cell_size` anchored at `origin`. A cell's bucket
//! is a [`CellHash`] of its integer coordinate reduced to 30 bits, so two
//! distinct cells may share a bucket; consumers compare [`CellRecord::cell`]
//! before treating records as co-located.

mod cell;

pub use cell::{CellRecord, ControlBits, CELL_RECORD_CSV_HEADER};

use crate::error::ConfigError;
use crate::types::Aabb;
use glam::{IVec3, Vec3};

/// Buckets are reduced modulo this value; every valid bucket is below
/// [`CellRecord::SENTINEL_BUCKET`].
pub const BUCKET_MODULUS: u32 = 1 << 30;

/// Cell coordinates are clamped to `±CELL_COORD_LIMIT` so that stepping to a
/// neighbouring cell never overflows.
pub const CELL_COORD_LIMIT: i32 = i32::MAX - 1;

/// Parity class of a cell: `(i & 1) << 2 | (j & 1) << 1 | (k & 1)`.
///
/// Uses the two's-complement low bit so negative coordinates alternate the
/// same way positive ones do.
#[inline]
pub fn cell_parity(cell: IVec3) -> u32 {
    (((cell.x & 1) << 2) | ((cell.y & 1) << 1) | (cell.z & 1)) as u32
}

/// Spreads the low 10 bits of `v` to every third bit of a 30-bit word.
#[inline]
fn expand_bits(v: u32) -> u32 {
    let mut x = v & 0x0000_03FF;
    x = (x | (x << 16)) & 0x0300_00FF;
    x = (x | (x << 8)) & 0x0300_F00F;
    x = (x | (x << 4)) & 0x030C_30C3;
    x = (x | (x << 2)) & 0x0924_9249;
    x
}

/// How a cell coordinate becomes a bucket.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum CellHash {
    /// `x << 20 ^ y << 10 ^ z`, reduced modulo [`BUCKET_MODULUS`].
    #[default]
    Shift,
    /// Interleaved low 10 bits of each coordinate, `x` highest. Cells within
    /// a 1024-cell period map to distinct buckets, and nearby cells to
    /// nearby buckets.
    Morton,
}

impl CellHash {
    /// Bucket of `cell`, in `0..BUCKET_MODULUS`.
    #[inline]
    pub fn hash(self, cell: IVec3) -> u32 {
        let (x, y, z) = (cell.x as u32, cell.y as u32, cell.z as u32);
        match self {
            CellHash::Shift => ((x << 20) ^ (y << 10) ^ z) % BUCKET_MODULUS,
            CellHash::Morton => (expand_bits(x) << 2) | (expand_bits(y) << 1) | expand_bits(z),
        }
    }
}

/// Cell size, grid origin and cell hash. Pure value type.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SpatialHashConfig {
    pub cell_size: f32,
    pub origin: Vec3,
    #[cfg_attr(feature = "serde", serde(default))]
    pub cell_hash: CellHash,
}

impl SpatialHashConfig {
    /// Grid with the default [`CellHash::Shift`] bucket hash.
    pub const fn new(cell_size: f32, origin: Vec3) -> Self {
        Self {
            cell_size,
            origin,
            cell_hash: CellHash::Shift,
        }
    }

    pub const fn with_cell_hash(mut self, cell_hash: CellHash) -> Self {
        self.cell_hash = cell_hash;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.cell_size.is_finite() && self.cell_size > 0.0) {
            return Err(ConfigError::NonPositiveCellSize(self.cell_size));
        }
        if !self.origin.is_finite() {
            return Err(ConfigError::NonFiniteOrigin);
        }
        Ok(())
    }

    /// Integer coordinate of the cell containing `p`.
    ///
    /// Rounds toward negative infinity, so cells straddling the origin have
    /// the same extent as every other cell.
    #[inline]
    pub fn cell_of(&self, p: Vec3) -> IVec3 {
        ((p - self.origin) / self.cell_size)
            .floor()
            .as_ivec3()
            .clamp(IVec3::splat(-CELL_COORD_LIMIT), IVec3::splat(CELL_COORD_LIMIT))
    }

    /// Bucket of a cell coordinate, in `0..BUCKET_MODULUS`.
    #[inline]
    pub fn hash_of(&self, cell: IVec3) -> u32 {
        self.cell_hash.hash(cell)
    }

    #[inline]
    pub fn bucket_of(&self, p: Vec3) -> u32 {
        self.hash_of(self.cell_of(p))
    }

    #[inline]
    pub fn cell_min_corner(&self, cell: IVec3) -> Vec3 {
        self.origin + cell.as_vec3() * self.cell_size
    }

    #[inline]
    pub fn cell_center(&self, cell: IVec3) -> Vec3 {
        self.origin + (cell.as_vec3() + Vec3::splat(0.5)) * self.cell_size
    }

    #[inline]
    pub fn cell_aabb(&self, cell: IVec3) -> Aabb {
        let min = self.cell_min_corner(cell);
        Aabb::new(min, min + Vec3::splat(self.cell_size))
    }
}
