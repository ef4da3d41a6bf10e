use super::SpatialPartitionField;
use crate::device::{DeviceBuffer, Stream};
use crate::error::BroadPhaseError;
use crate::spatial_hash::CellHash;
use crate::types::{CollisionPair, SphereLike};
use glam::Vec3;

/// Fluent driver that runs a [`SpatialPartitionField`] on a [`Stream`].
///
/// ```
/// use glam::Vec3;
/// use sphere_broadphase::{DeviceBuffer, Sphere, SpatialPartitionField, SpatialPartitionLauncher, Stream};
///
/// let spheres = [
///     Sphere::new(Vec3::new(0.0, 0.0, 0.0), 1.0),
///     Sphere::new(Vec3::new(0.5, 0.0, 0.0), 1.0),
/// ];
/// let stream = Stream::new();
/// let mut field = SpatialPartitionField::new();
/// let mut pairs = DeviceBuffer::labeled("pairs");
///
/// SpatialPartitionLauncher::new(&mut field, &stream)
///     .config_spatial_hash(Vec3::ZERO)
///     .set_cell_size(3.0)
///     .setup(&spheres)?
///     .create_collision_pairs(&mut pairs)?
///     .wait();
/// assert_eq!(pairs.len(), 1);
/// # Ok::<(), sphere_broadphase::BroadPhaseError>(())
/// ```
pub struct SpatialPartitionLauncher<'a> {
    field: &'a mut SpatialPartitionField,
    stream: &'a Stream,
}

impl<'a> SpatialPartitionLauncher<'a> {
    pub fn new(field: &'a mut SpatialPartitionField, stream: &'a Stream) -> Self {
        Self { field, stream }
    }

    pub fn with_group_sizes(self, light: usize, heavy: usize) -> Self {
        self.field.config_launch(light, heavy);
        self
    }

    pub fn config_spatial_hash(self, origin: Vec3) -> Self {
        self.field.config_spatial_hash(origin);
        self
    }

    pub fn with_cell_hash(self, cell_hash: CellHash) -> Self {
        self.field.config_cell_hash(cell_hash);
        self
    }

    /// `<= 0` selects automatic sizing.
    pub fn set_cell_size(self, cell_size: f32) -> Self {
        self.field.set_cell_size(cell_size);
        self
    }

    /// Build the partition for `spheres`.
    pub fn setup<S: SphereLike + Sync>(self, spheres: &[S]) -> Result<Self, BroadPhaseError> {
        self.field.setup(self.stream, spheres)?;
        Ok(self)
    }

    /// Write every overlapping pair into `out`, resized to fit.
    pub fn create_collision_pairs(
        self,
        out: &mut DeviceBuffer<CollisionPair>,
    ) -> Result<Self, BroadPhaseError> {
        self.field.create_collision_pair_list(self.stream, out)?;
        Ok(self)
    }

    /// Call `f` for every overlapping pair, possibly concurrently.
    pub fn for_each_pair<F>(self, f: F) -> Result<Self, BroadPhaseError>
    where
        F: Fn(CollisionPair) + Sync + Send,
    {
        self.field.for_each_pair(self.stream, f)?;
        Ok(self)
    }

    pub fn valid_cell_count(&self) -> usize {
        self.field.valid_cell_count()
    }

    pub fn field(&self) -> &SpatialPartitionField {
        self.field
    }

    /// Block until the stream has drained.
    pub fn wait(self) {
        self.stream.synchronize();
    }
}
