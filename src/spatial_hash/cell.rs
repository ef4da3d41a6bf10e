//! Per-(object, cell) records and the bucket ownership predicate.
//!
//! Every object occupies a 2×2×2 block of cells anchored at its home cell and
//! extending one cell per axis toward the side of the cell its center lies
//! in. The eight cells of a block have eight distinct parities, so a record
//! can reconstruct any cell of its object's block from its own cell and
//! parity alone. That is what the ownership predicate relies on.

use super::cell_parity;
use bytemuck::{Pod, Zeroable};
use glam::IVec3;
use std::fmt;

/// Packed per-record flags.
///
/// | bits   | field          |
/// |--------|----------------|
/// | 0..3   | `pass_type`    |
/// | 3..6   | `home_type`    |
/// | 6..14  | `overlap_mask` |
/// | 14..17 | `block_dir`    |
///
/// `block_dir` uses the parity bit layout (x = bit 2, y = bit 1, z = bit 0);
/// a set bit means the block extends toward +axis from the home cell.
#[repr(transparent)]
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash, Pod, Zeroable)]
pub struct ControlBits(pub u32);

impl ControlBits {
    const PASS_SHIFT: u32 = 0;
    const HOME_SHIFT: u32 = 3;
    const MASK_SHIFT: u32 = 6;
    const DIR_SHIFT: u32 = 14;

    pub fn new(pass_type: u32, home_type: u32, overlap_mask: u32, block_dir: u32) -> Self {
        debug_assert!(pass_type < 8 && home_type < 8 && block_dir < 8);
        debug_assert!(overlap_mask < 256);
        Self(
            (pass_type << Self::PASS_SHIFT)
                | (home_type << Self::HOME_SHIFT)
                | (overlap_mask << Self::MASK_SHIFT)
                | (block_dir << Self::DIR_SHIFT),
        )
    }

    /// Parity of the occupied cell.
    #[inline]
    pub fn pass_type(self) -> u32 {
        (self.0 >> Self::PASS_SHIFT) & 0b111
    }

    /// Parity of the object's home cell.
    #[inline]
    pub fn home_type(self) -> u32 {
        (self.0 >> Self::HOME_SHIFT) & 0b111
    }

    /// Bit `q` is set iff the object occupies its block cell of parity `q`.
    #[inline]
    pub fn overlap_mask(self) -> u32 {
        (self.0 >> Self::MASK_SHIFT) & 0xff
    }

    #[inline]
    pub fn block_dir(self) -> u32 {
        (self.0 >> Self::DIR_SHIFT) & 0b111
    }
}

impl fmt::Debug for ControlBits {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ControlBits")
            .field("pass_type", &self.pass_type())
            .field("home_type", &self.home_type())
            .field("overlap_mask", &format_args!("{:#010b}", self.overlap_mask()))
            .field("block_dir", &format_args!("{:#05b}", self.block_dir()))
            .finish()
    }
}

/// Column names matching the `Display` output of [`CellRecord`].
pub const CELL_RECORD_CSV_HEADER: &str =
    "bucket,object_id,cell_x,cell_y,cell_z,pass_type,home_type,overlap_mask,block_dir,is_home";

/// One (object, occupied cell) entry of the partition.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Pod, Zeroable)]
pub struct CellRecord {
    pub bucket: u32,
    pub object_id: u32,
    pub cell: IVec3,
    pub control: ControlBits,
}

impl Default for CellRecord {
    fn default() -> Self {
        Self::SENTINEL
    }
}

impl CellRecord {
    /// Bucket key of unused slots. Sorts after every valid bucket.
    pub const SENTINEL_BUCKET: u32 = u32::MAX;

    pub const SENTINEL: Self = Self {
        bucket: Self::SENTINEL_BUCKET,
        object_id: u32::MAX,
        cell: IVec3::NEG_ONE,
        control: ControlBits(0),
    };

    /// Record for `object_id` occupying `cell`, an element of the block
    /// anchored at `home` extending along `dir` (each component ±1).
    pub fn occupying(
        object_id: u32,
        bucket: u32,
        cell: IVec3,
        home: IVec3,
        dir: IVec3,
        overlap_mask: u32,
    ) -> Self {
        debug_assert!(bucket != Self::SENTINEL_BUCKET);
        debug_assert!(
            (cell - home).abs().max_element() <= 1,
            "cell {cell} outside the block of home {home}"
        );
        let block_dir = (u32::from(dir.x > 0) << 2) | (u32::from(dir.y > 0) << 1) | u32::from(dir.z > 0);
        Self {
            bucket,
            object_id,
            cell,
            control: ControlBits::new(cell_parity(cell), cell_parity(home), overlap_mask, block_dir),
        }
    }

    #[inline]
    pub fn is_sentinel(&self) -> bool {
        self.bucket == Self::SENTINEL_BUCKET
    }

    #[inline]
    pub fn pass_type(&self) -> u32 {
        self.control.pass_type()
    }

    #[inline]
    pub fn home_type(&self) -> u32 {
        self.control.home_type()
    }

    #[inline]
    pub fn overlap_mask(&self) -> u32 {
        self.control.overlap_mask()
    }

    /// The record occupies its object's home cell.
    #[inline]
    pub fn is_home(&self) -> bool {
        self.pass_type() == self.home_type()
    }

    #[inline]
    pub fn is_phantom(&self) -> bool {
        !self.is_home()
    }

    /// Coordinate of the cell with parity `q` in this record's object block.
    ///
    /// Per axis: matching parity bit keeps the coordinate; otherwise the other
    /// cell of the block on that axis is one step away, toward `block_dir` if
    /// this record sits on the home side and away from it if not.
    pub fn cell_with_parity(&self, q: u32) -> IVec3 {
        let pass = self.pass_type();
        let home = self.home_type();
        let dir = self.control.block_dir();
        let axis = |c: i32, bit: u32| -> i32 {
            let q_bit = (q >> bit) & 1;
            let pass_bit = (pass >> bit) & 1;
            if q_bit == pass_bit {
                return c;
            }
            let step = if (dir >> bit) & 1 == 1 { 1 } else { -1 };
            if pass_bit == (home >> bit) & 1 {
                c + step
            } else {
                c - step
            }
        };
        IVec3::new(axis(self.cell.x, 2), axis(self.cell.y, 1), axis(self.cell.z, 0))
    }

    /// Whether the pair `(a, b)` seen in this cell is owned by another cell.
    ///
    /// Both records must occupy the same cell. A pair is reported only from
    /// the lowest-parity cell both objects occupy: it may be ignored here iff
    /// some parity below this cell's is set in both overlap masks and names
    /// the same cell in both blocks.
    pub fn may_ignore(a: &Self, b: &Self) -> bool {
        debug_assert_eq!(a.cell, b.cell);
        let pass = a.pass_type();
        let mut lower = a.overlap_mask() & b.overlap_mask() & ((1u32 << pass) - 1);
        while lower != 0 {
            let q = lower.trailing_zeros();
            if a.cell_with_parity(q) == b.cell_with_parity(q) {
                return true;
            }
            lower &= lower - 1;
        }
        false
    }
}

impl fmt::Display for CellRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{},{},{},{},{},{},{},{:08b},{:03b},{}",
            self.bucket,
            self.object_id,
            self.cell.x,
            self.cell.y,
            self.cell.z,
            self.pass_type(),
            self.home_type(),
            self.overlap_mask(),
            self.control.block_dir(),
            u8::from(self.is_home()),
        )
    }
}
