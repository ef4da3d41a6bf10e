//! Spatial partition: cell assignment, bucketing and pair generation.
//!
//! [`SpatialPartitionField`] owns every intermediate buffer and runs the
//! stages; [`SpatialPartitionLauncher`] chains them on a stream.
//!
//! Each object writes a home record plus one phantom record per extra cell of
//! its 2×2×2 block that its proxy sphere touches. Records are sorted by
//! bucket, runs of equal buckets become candidate sets, and each pair is
//! tested in exactly one bucket: the lowest-parity cell both objects occupy.

mod field;
mod launcher;
mod pairs;

pub use field::SpatialPartitionField;
pub use launcher::SpatialPartitionLauncher;

use std::fmt;

/// Record slots reserved per object: the home cell and up to 7 phantoms.
pub const SLOTS_PER_OBJECT: usize = 8;

/// Radius multiplier for the proxy sphere tested against block cells.
pub const PROXY_SCALE: f32 = 1.5;

/// Automatic cell size as a multiple of the largest radius.
pub const CELL_SIZE_SCALE: f32 = PROXY_SCALE * PROXY_SCALE;

/// Smallest cell size, in units of the largest radius, for which every
/// sphere fits inside its 2×2×2 block.
pub const MIN_CELL_SIZE_RATIO: f32 = 2.0;

/// Summary of the last run of a [`SpatialPartitionField`].
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct FieldStats {
    pub object_count: usize,
    /// Record slots written, sentinels included.
    pub slot_count: usize,
    /// Non-sentinel records.
    pub occupied_records: usize,
    /// Records of non-home cells.
    pub phantom_records: usize,
    /// Distinct buckets, the sentinel bucket included.
    pub unique_bucket_count: usize,
    /// Distinct buckets excluding the sentinel bucket.
    pub valid_cell_count: usize,
    pub largest_bucket: usize,
    pub pair_count: usize,
    pub cell_size: f32,
}

impl fmt::Display for FieldStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "objects={} cell_size={:.4} records={} (phantom {}) slots={} buckets={} largest={} pairs={}",
            self.object_count,
            self.cell_size,
            self.occupied_records,
            self.phantom_records,
            self.slot_count,
            self.valid_cell_count,
            self.largest_bucket,
            self.pair_count
        )
    }
}
