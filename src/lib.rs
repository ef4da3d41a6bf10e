//! Broad-phase collision detection for bounding spheres.
//!
//! This crate finds every pair of overlapping spheres with a uniform spatial
//! hash. Each sphere is recorded in its home cell and in the neighbouring
//! cells of its 2×2×2 block that it may reach; records are sorted by bucket
//! and each bucket tests its candidates exactly once, with a parity-based
//! ownership rule so a pair shared by several cells is reported by one.
//!
//! All stages are data-parallel passes over fixed-size slots and grow-only
//! buffers, run on a [`Stream`] (rayon-backed with the default `parallel`
//! feature).
//!
//! # Example
//!
//! ```
//! use glam::Vec3;
//! use sphere_broadphase::{find_pairs, CollisionPair, Sphere};
//!
//! let spheres = vec![
//!     Sphere::new(Vec3::new(0.0, 0.0, 0.0), 0.5),
//!     Sphere::new(Vec3::new(0.5, 0.0, 0.0), 0.5),
//!     Sphere::new(Vec3::new(10.0, 10.0, 10.0), 0.5),
//! ];
//!
//! let output = find_pairs(&spheres).expect("broad phase should succeed");
//! assert_eq!(output.pairs, vec![CollisionPair::new(0, 1)]);
//! ```

mod error;
mod types;

pub mod device;
pub mod geometry;
pub mod partition;
pub mod spatial_hash;
pub mod timing;
pub mod validation;

pub use device::{DeviceBuffer, LaunchConfig, Readback, Stream, StreamStats};
pub use error::{BroadPhaseError, ConfigError};
pub use partition::{FieldStats, SpatialPartitionField, SpatialPartitionLauncher};
pub use spatial_hash::{CellHash, CellRecord, SpatialHashConfig};
pub use types::{Aabb, CollisionPair, Sphere, SphereLike};

use glam::Vec3;

/// Output of [`find_pairs`], including run statistics.
#[derive(Debug, Clone)]
pub struct BroadPhaseOutput {
    /// Every overlapping pair once, with `a < b`, sorted.
    pub pairs: Vec<CollisionPair>,
    /// Statistics of the partition that produced the pairs.
    pub stats: FieldStats,
}

/// Configuration for [`find_pairs_with`].
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct BroadPhaseConfig {
    /// Grid cell size. `None` (or a non-positive value) derives it from the
    /// largest radius.
    ///
    /// Explicit sizes below twice the largest radius can miss overlaps and
    /// are logged as a warning.
    pub cell_size: Option<f32>,
    /// Grid origin.
    pub origin: Vec3,
    /// Cell coordinate to bucket hash.
    pub cell_hash: CellHash,
    /// Work-group size for per-object stages.
    pub light_group_size: usize,
    /// Work-group size for per-bucket stages.
    pub heavy_group_size: usize,
}

impl Default for BroadPhaseConfig {
    fn default() -> Self {
        let launch = LaunchConfig::default();
        Self {
            cell_size: None,
            origin: Vec3::ZERO,
            cell_hash: CellHash::default(),
            light_group_size: launch.light_group_size,
            heavy_group_size: launch.heavy_group_size,
        }
    }
}

/// Find all overlapping sphere pairs with default settings.
pub fn find_pairs<S: SphereLike + Sync>(spheres: &[S]) -> Result<BroadPhaseOutput, BroadPhaseError> {
    find_pairs_with(spheres, BroadPhaseConfig::default())
}

/// Find all overlapping sphere pairs with explicit configuration.
///
/// Builds a fresh [`SpatialPartitionField`] for the call. To reuse buffers
/// across frames, keep a field and drive it with a
/// [`SpatialPartitionLauncher`] instead.
pub fn find_pairs_with<S: SphereLike + Sync>(
    spheres: &[S],
    config: BroadPhaseConfig,
) -> Result<BroadPhaseOutput, BroadPhaseError> {
    let stream = Stream::new();
    let mut field = SpatialPartitionField::new();
    let mut pairs = DeviceBuffer::labeled("collision pairs");

    SpatialPartitionLauncher::new(&mut field, &stream)
        .with_group_sizes(config.light_group_size, config.heavy_group_size)
        .config_spatial_hash(config.origin)
        .with_cell_hash(config.cell_hash)
        .set_cell_size(config.cell_size.unwrap_or(0.0))
        .setup(spheres)?
        .create_collision_pairs(&mut pairs)?
        .wait();

    let mut pairs = pairs.to_vec();
    pairs.sort_unstable();
    let stats = field.stats();
    log::debug!("find_pairs: {}", stats);
    Ok(BroadPhaseOutput { pairs, stats })
}
