//! Partition state and the pipeline stages.

use super::pairs::{enumerate_bucket, CountSink, EmitSink, VisitSink};
use super::{FieldStats, CELL_SIZE_SCALE, MIN_CELL_SIZE_RATIO, PROXY_SCALE, SLOTS_PER_OBJECT};
use crate::device::{
    exclusive_sum, reduce_max, run_length_encode, sort_pairs, DeviceBuffer, EncodeWorkspace,
    LaunchConfig, ScanWorkspace, SortWorkspace, Stream, Workload,
};
use crate::error::{BroadPhaseError, ConfigError};
use crate::geometry::sphere_aabb;
use crate::spatial_hash::{
    cell_parity, CellHash, CellRecord, SpatialHashConfig, CELL_RECORD_CSV_HEADER,
};
use crate::timing::{PipelineStage, PipelineTimings, Timer};

#[cfg(feature = "parallel")]
use rayon::prelude::*;
use crate::types::{CollisionPair, Sphere, SphereLike};
use glam::{IVec3, Vec3};
use std::io;

/// Offsets of the 7 non-home cells of a block, before applying the block
/// direction: x, y, z, yz, xz, xy, xyz.
const BLOCK_OFFSETS: [IVec3; 7] = [
    IVec3::new(1, 0, 0),
    IVec3::new(0, 1, 0),
    IVec3::new(0, 0, 1),
    IVec3::new(0, 1, 1),
    IVec3::new(1, 0, 1),
    IVec3::new(1, 1, 0),
    IVec3::new(1, 1, 1),
];

/// Progress through the pipeline. Each stage requires the previous one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Stage {
    Empty,
    Bound,
    Sized,
    Filled,
    Sorted,
    Counted,
}

impl Stage {
    /// Name of the operation that reaches this stage.
    fn producer(self) -> &'static str {
        match self {
            Stage::Empty => "new",
            Stage::Bound => "bind",
            Stage::Sized => "estimate_cell_size",
            Stage::Filled => "fill_hash_cells",
            Stage::Sorted => "sort_hash_cells",
            Stage::Counted => "count_collision_per_cell",
        }
    }
}

/// Sorted records grouped by bucket.
#[derive(Clone, Copy)]
struct Buckets<'a> {
    records: &'a [CellRecord],
    offsets: &'a [u32],
    counts: &'a [u32],
}

impl<'a> Buckets<'a> {
    fn new(
        records: &'a DeviceBuffer<CellRecord>,
        offsets: &'a DeviceBuffer<u32>,
        counts: &'a DeviceBuffer<u32>,
    ) -> Self {
        Self {
            records: records.as_slice(),
            offsets: offsets.as_slice(),
            counts: counts.as_slice(),
        }
    }

    #[inline]
    fn get(&self, bucket: usize) -> &'a [CellRecord] {
        let start = self.offsets[bucket] as usize;
        &self.records[start..start + self.counts[bucket] as usize]
    }
}

/// Write the records of one object into its 8 slots.
///
/// Slot 0 holds the home cell, the following slots the block cells touched
/// by the proxy sphere in [`BLOCK_OFFSETS`] order, the rest sentinels.
pub(crate) fn write_object_cells(
    hash: &SpatialHashConfig,
    sphere: &Sphere,
    object_id: u32,
    slots: &mut [CellRecord],
) {
    debug_assert_eq!(slots.len(), SLOTS_PER_OBJECT);
    let home = hash.cell_of(sphere.center);
    let mid = hash.cell_center(home);
    let toward = |c: f32, m: f32| if c > m { 1 } else { -1 };
    let dir = IVec3::new(
        toward(sphere.center.x, mid.x),
        toward(sphere.center.y, mid.y),
        toward(sphere.center.z, mid.z),
    );
    let proxy = sphere.scaled(PROXY_SCALE);

    let mut cells = [home; SLOTS_PER_OBJECT];
    let mut used = 1;
    for offset in BLOCK_OFFSETS {
        let cell = home + offset * dir;
        if sphere_aabb(&proxy, &hash.cell_aabb(cell)) {
            cells[used] = cell;
            used += 1;
        }
    }

    let mask = cells[..used]
        .iter()
        .fold(0u32, |m, &c| m | (1 << cell_parity(c)));
    for (slot, &cell) in slots.iter_mut().zip(&cells[..used]) {
        *slot = CellRecord::occupying(object_id, hash.hash_of(cell), cell, home, dir, mask);
    }
    slots[used..].fill(CellRecord::SENTINEL);
}

/// Owns every intermediate buffer of the partition and runs its stages.
///
/// Stages run in a fixed order (bind, estimate cell size, fill, sort, count,
/// then pair creation any number of times); calling one early returns
/// [`BroadPhaseError::StageOrder`]. Buffers only grow, so reusing a field
/// across frames avoids reallocation once the largest input has been seen.
#[derive(Debug)]
pub struct SpatialPartitionField {
    launch: LaunchConfig,
    origin: Option<Vec3>,
    /// Explicit cell size; `<= 0` selects automatic sizing.
    requested_cell_size: f32,
    /// Resolved configuration of the current run.
    hash: SpatialHashConfig,
    stage: Stage,
    object_count: usize,
    unique_bucket_count: usize,
    pair_count: usize,

    spheres: DeviceBuffer<Sphere>,
    radii: DeviceBuffer<f32>,
    cell_keys: DeviceBuffer<u32>,
    cell_records: DeviceBuffer<CellRecord>,
    sorted_keys: DeviceBuffer<u32>,
    sorted_records: DeviceBuffer<CellRecord>,
    unique_keys: DeviceBuffer<u32>,
    bucket_counts: DeviceBuffer<u32>,
    bucket_offsets: DeviceBuffer<u32>,
    pair_counts: DeviceBuffer<u64>,
    pair_offsets: DeviceBuffer<u64>,

    sort_workspace: SortWorkspace,
    encode_workspace: EncodeWorkspace,
    scan_workspace: ScanWorkspace<u32>,
    pair_scan_workspace: ScanWorkspace<u64>,

    timings: PipelineTimings,
}

impl Default for SpatialPartitionField {
    fn default() -> Self {
        Self::new()
    }
}

impl SpatialPartitionField {
    pub fn new() -> Self {
        Self {
            launch: LaunchConfig::default(),
            origin: None,
            requested_cell_size: 0.0,
            hash: SpatialHashConfig::new(0.0, Vec3::ZERO),
            stage: Stage::Empty,
            object_count: 0,
            unique_bucket_count: 0,
            pair_count: 0,
            spheres: DeviceBuffer::labeled("spheres"),
            radii: DeviceBuffer::labeled("radii"),
            cell_keys: DeviceBuffer::labeled("cell keys"),
            cell_records: DeviceBuffer::labeled("cell records"),
            sorted_keys: DeviceBuffer::labeled("sorted cell keys"),
            sorted_records: DeviceBuffer::labeled("sorted cell records"),
            unique_keys: DeviceBuffer::labeled("unique buckets"),
            bucket_counts: DeviceBuffer::labeled("bucket counts"),
            bucket_offsets: DeviceBuffer::labeled("bucket offsets"),
            pair_counts: DeviceBuffer::labeled("pair counts"),
            pair_offsets: DeviceBuffer::labeled("pair offsets"),
            sort_workspace: SortWorkspace::default(),
            encode_workspace: EncodeWorkspace::default(),
            scan_workspace: ScanWorkspace::default(),
            pair_scan_workspace: ScanWorkspace::default(),
            timings: PipelineTimings::default(),
        }
    }

    // -- configuration ------------------------------------------------------

    /// Work-group sizes for per-object and per-bucket stages.
    pub fn config_launch(&mut self, light_group_size: usize, heavy_group_size: usize) {
        self.launch = LaunchConfig {
            light_group_size,
            heavy_group_size,
        };
    }

    pub fn launch_config(&self) -> LaunchConfig {
        self.launch
    }

    /// Grid origin. Required before cells are filled.
    pub fn config_spatial_hash(&mut self, origin: Vec3) {
        self.origin = Some(origin);
    }

    pub fn origin(&self) -> Option<Vec3> {
        self.origin
    }

    /// Bucket hash for subsequent runs.
    pub fn config_cell_hash(&mut self, cell_hash: CellHash) {
        self.hash.cell_hash = cell_hash;
    }

    pub fn cell_hash(&self) -> CellHash {
        self.hash.cell_hash
    }

    /// Explicit cell size for subsequent runs; `<= 0` selects automatic
    /// sizing from the largest radius. NaN and infinity are rejected when the
    /// cell size is resolved.
    pub fn set_cell_size(&mut self, cell_size: f32) {
        self.requested_cell_size = cell_size;
    }

    /// Cell size used by the current run: 0 before it is resolved, and the
    /// explicit size (or 0) when the run has no objects.
    pub fn cell_size(&self) -> f32 {
        self.hash.cell_size
    }

    // -- results ------------------------------------------------------------

    pub fn object_count(&self) -> usize {
        self.object_count
    }

    /// Distinct buckets of the last count stage, the sentinel bucket included.
    pub fn unique_bucket_count(&self) -> usize {
        self.unique_bucket_count
    }

    /// Occupied buckets, excluding the sentinel bucket.
    pub fn valid_cell_count(&self) -> usize {
        self.unique_bucket_count.saturating_sub(1)
    }

    /// Pairs written by the last [`create_collision_pair_list`](Self::create_collision_pair_list).
    pub fn pair_count(&self) -> usize {
        self.pair_count
    }

    /// Spheres bound by the last [`bind`](Self::bind).
    pub fn spheres(&self) -> &[Sphere] {
        self.spheres.as_slice()
    }

    pub fn timings(&self) -> &PipelineTimings {
        &self.timings
    }

    /// Slots the record buffers can hold without reallocating.
    pub fn record_capacity(&self) -> usize {
        self.cell_records.capacity()
    }

    /// Sorted non-sentinel records, grouped by bucket.
    pub fn debug_records(&self) -> &[CellRecord] {
        &self.sorted_records.as_slice()[..self.occupied_records()]
    }

    /// Write [`debug_records`](Self::debug_records) as CSV.
    pub fn write_records_csv<W: io::Write>(&self, mut w: W) -> io::Result<()> {
        writeln!(w, "{}", CELL_RECORD_CSV_HEADER)?;
        for record in self.debug_records() {
            writeln!(w, "{}", record)?;
        }
        Ok(())
    }

    /// Summary of the last run. Walks the sorted records once.
    pub fn stats(&self) -> FieldStats {
        let valid = self.valid_cell_count();
        let counts = &self.bucket_counts.as_slice()[..valid];
        FieldStats {
            object_count: self.object_count,
            slot_count: self.cell_records.len(),
            occupied_records: self.occupied_records(),
            phantom_records: self.debug_records().iter().filter(|r| r.is_phantom()).count(),
            unique_bucket_count: self.unique_bucket_count,
            valid_cell_count: valid,
            largest_bucket: counts.iter().copied().max().unwrap_or(0) as usize,
            pair_count: self.pair_count,
            cell_size: self.hash.cell_size,
        }
    }

    fn occupied_records(&self) -> usize {
        match self.valid_cell_count() {
            0 => 0,
            valid => self.bucket_offsets.as_slice()[valid] as usize,
        }
    }

    fn require(&self, needed: Stage, found: &'static str) -> Result<(), BroadPhaseError> {
        if self.stage < needed {
            return Err(BroadPhaseError::StageOrder {
                expected: needed.producer(),
                found,
            });
        }
        Ok(())
    }

    /// Forget the buckets and pairs of a previous run.
    fn discard_buckets(&mut self) {
        self.unique_bucket_count = 0;
        self.pair_count = 0;
        self.unique_keys.clear();
        self.bucket_counts.clear();
        self.bucket_offsets.clear();
        self.pair_counts.clear();
        self.pair_offsets.clear();
    }

    // -- stages -------------------------------------------------------------

    /// Run every stage up to and including the bucket count.
    pub fn setup<S: SphereLike + Sync>(
        &mut self,
        stream: &Stream,
        spheres: &[S],
    ) -> Result<(), BroadPhaseError> {
        self.bind(stream, spheres)?;
        self.estimate_cell_size(stream)?;
        self.fill_hash_cells(stream)?;
        self.sort_hash_cells(stream)?;
        self.count_collision_per_cell(stream)
    }

    /// Upload the input spheres and reset every logical length.
    ///
    /// Fails with [`ConfigError::InvalidRadius`] for the first sphere whose
    /// radius is negative or NaN.
    pub fn bind<S: SphereLike + Sync>(
        &mut self,
        stream: &Stream,
        spheres: &[S],
    ) -> Result<(), BroadPhaseError> {
        self.stage = Stage::Empty;
        self.timings.reset();
        self.discard_buckets();
        self.object_count = 0;
        self.cell_keys.clear();
        self.cell_records.clear();
        self.sorted_keys.clear();
        self.sorted_records.clear();

        let n = spheres.len();
        // Slot indices and offsets are u32.
        let max_objects = (u32::MAX as usize - 1) / SLOTS_PER_OBJECT;
        if n > max_objects {
            return Err(BroadPhaseError::Capacity {
                requested: n.saturating_mul(SLOTS_PER_OBJECT).saturating_add(1),
                what: "cell records",
            });
        }

        self.spheres.resize(n)?;
        self.radii.resize(n)?;
        let light = self.launch.group_size(Workload::Light);
        stream
            .parallel_for(Workload::Light, light)
            .apply_mut(self.spheres.as_mut_slice(), |i, s| *s = spheres[i].to_sphere());
        let bound = self.spheres.as_slice();
        stream
            .parallel_for(Workload::Light, light)
            .apply_mut(self.radii.as_mut_slice(), |i, r| *r = bound[i].radius);

        let radii = self.radii.as_slice();
        #[cfg(feature = "parallel")]
        let invalid = radii.par_iter().position_first(|r| !(*r >= 0.0));
        #[cfg(not(feature = "parallel"))]
        let invalid = radii.iter().position(|r| !(*r >= 0.0));
        if let Some(object_id) = invalid {
            return Err(ConfigError::InvalidRadius {
                object_id,
                radius: radii[object_id],
            }
            .into());
        }

        self.object_count = n;
        self.stage = Stage::Bound;
        log::trace!("bind: {} objects", n);
        Ok(())
    }

    /// Resolve the cell size for this run.
    ///
    /// Without an explicit size, reduces the radii to their maximum (a host
    /// read-back) and uses `max_radius * CELL_SIZE_SCALE`. An explicit size
    /// below twice the largest radius is accepted but logged as a warning,
    /// since spheres may then extend past their block.
    pub fn estimate_cell_size(&mut self, stream: &Stream) -> Result<(), BroadPhaseError> {
        self.require(Stage::Bound, "estimate_cell_size")?;
        self.stage = Stage::Bound;
        self.discard_buckets();
        let timer = Timer::start();

        let requested = self.requested_cell_size;
        if !requested.is_finite() {
            return Err(ConfigError::NonPositiveCellSize(requested).into());
        }

        if self.object_count > 0 {
            if requested > 0.0 {
                self.hash.cell_size = requested;
                if log::log_enabled!(log::Level::Warn) {
                    let max_radius = reduce_max(stream, self.radii.as_slice()).wait();
                    if requested < MIN_CELL_SIZE_RATIO * max_radius {
                        log::warn!(
                            "cell size {} is below {}x the largest radius {}; overlaps may be missed",
                            requested,
                            MIN_CELL_SIZE_RATIO,
                            max_radius
                        );
                    }
                }
            } else {
                // Host sync point: fill needs the cell size.
                let max_radius = reduce_max(stream, self.radii.as_slice()).wait();
                let cell_size = max_radius * CELL_SIZE_SCALE;
                if !(cell_size.is_finite() && cell_size > 0.0) {
                    return Err(ConfigError::DegenerateCellSize { max_radius }.into());
                }
                log::trace!(
                    "estimate_cell_size: max radius {} -> cell size {}",
                    max_radius,
                    cell_size
                );
                self.hash.cell_size = cell_size;
            }
        } else {
            self.hash.cell_size = requested.max(0.0);
        }

        self.timings
            .set(PipelineStage::EstimateCellSize, timer.elapsed());
        self.stage = Stage::Sized;
        Ok(())
    }

    /// Write 8 record slots per object plus one trailing sentinel slot.
    ///
    /// The trailing sentinel guarantees a sentinel bucket exists even when
    /// every object fills all of its slots.
    pub fn fill_hash_cells(&mut self, stream: &Stream) -> Result<(), BroadPhaseError> {
        self.require(Stage::Sized, "fill_hash_cells")?;
        self.stage = Stage::Sized;
        self.discard_buckets();
        let timer = Timer::start();

        let n = self.object_count;
        if n == 0 {
            self.cell_records.clear();
            self.cell_keys.clear();
        } else {
            self.hash.origin = self.origin.ok_or(ConfigError::OriginNotSet)?;
            self.hash.validate()?;

            let slots = n * SLOTS_PER_OBJECT + 1;
            self.cell_records.resize(slots)?;
            self.cell_keys.resize(slots)?;

            let light = self.launch.group_size(Workload::Light);
            let hash = self.hash;
            let spheres = self.spheres.as_slice();
            let (objects, tail) = self
                .cell_records
                .as_mut_slice()
                .split_at_mut(n * SLOTS_PER_OBJECT);
            stream.parallel_for(Workload::Light, light).apply_chunks_mut(
                objects,
                SLOTS_PER_OBJECT,
                |i, chunk| write_object_cells(&hash, &spheres[i], i as u32, chunk),
            );
            tail.fill(CellRecord::SENTINEL);

            let records = self.cell_records.as_slice();
            stream
                .parallel_for(Workload::Light, light)
                .apply_mut(self.cell_keys.as_mut_slice(), |i, key| *key = records[i].bucket);
            log::trace!("fill_hash_cells: {} objects, {} slots", n, slots);
        }

        self.timings.set(PipelineStage::FillHashCells, timer.elapsed());
        self.stage = Stage::Filled;
        Ok(())
    }

    /// Stable sort of the slots by bucket.
    pub fn sort_hash_cells(&mut self, stream: &Stream) -> Result<(), BroadPhaseError> {
        self.require(Stage::Filled, "sort_hash_cells")?;
        self.stage = Stage::Filled;
        self.discard_buckets();
        let timer = Timer::start();

        let slots = self.cell_keys.len();
        self.sorted_keys.resize(slots)?;
        self.sorted_records.resize(slots)?;
        sort_pairs(
            stream,
            &mut self.sort_workspace,
            self.cell_keys.as_slice(),
            self.cell_records.as_slice(),
            self.sorted_keys.as_mut_slice(),
            self.sorted_records.as_mut_slice(),
        )?;

        self.timings.set(PipelineStage::SortHashCells, timer.elapsed());
        self.stage = Stage::Sorted;
        Ok(())
    }

    /// Collapse the sorted slots into buckets and compute bucket offsets.
    pub fn count_collision_per_cell(&mut self, stream: &Stream) -> Result<(), BroadPhaseError> {
        self.require(Stage::Sorted, "count_collision_per_cell")?;
        self.stage = Stage::Sorted;
        self.discard_buckets();
        let timer = Timer::start();

        let slots = self.sorted_keys.len();
        if slots > 0 {
            self.unique_keys.resize(slots)?;
            self.bucket_counts.resize(slots)?;
            // Host sync point: every per-bucket buffer is sized from this.
            let unique = run_length_encode(
                stream,
                &mut self.encode_workspace,
                self.sorted_keys.as_slice(),
                self.unique_keys.as_mut_slice(),
                self.bucket_counts.as_mut_slice(),
            )
            .wait();
            self.unique_keys.resize(unique)?;
            self.bucket_counts.resize(unique)?;
            debug_assert_eq!(
                self.unique_keys.as_slice().last(),
                Some(&CellRecord::SENTINEL_BUCKET),
                "sorted slots must end with the sentinel bucket"
            );

            self.bucket_offsets.resize(unique)?;
            exclusive_sum(
                stream,
                &mut self.scan_workspace,
                self.bucket_counts.as_slice(),
                self.bucket_offsets.as_mut_slice(),
            );
            self.unique_bucket_count = unique;
        }

        self.timings
            .set(PipelineStage::CountCollisionPerCell, timer.elapsed());
        self.stage = Stage::Counted;
        log::debug!(
            "count_collision_per_cell: {} objects in {} buckets",
            self.object_count,
            self.valid_cell_count()
        );
        Ok(())
    }

    /// Count, size, then write every overlapping pair into `out`.
    ///
    /// `out` is resized to exactly the number of pairs. Pairs are grouped by
    /// owning bucket and satisfy `a < b`; within a bucket they follow record
    /// order.
    pub fn create_collision_pair_list(
        &mut self,
        stream: &Stream,
        out: &mut DeviceBuffer<CollisionPair>,
    ) -> Result<(), BroadPhaseError> {
        self.require(Stage::Counted, "create_collision_pair_list")?;
        let timer = Timer::start();
        self.pair_count = 0;
        self.pair_counts.clear();
        self.pair_offsets.clear();

        let valid = self.valid_cell_count();
        if valid == 0 {
            out.clear();
            self.timings
                .set(PipelineStage::CreateCollisionPairList, timer.elapsed());
            return Ok(());
        }

        let unique = self.unique_bucket_count;
        self.pair_counts.resize(unique)?;
        self.pair_offsets.resize(unique)?;
        let heavy = self.launch.group_size(Workload::Heavy);
        let spheres = self.spheres.as_slice();
        let buckets = Buckets::new(&self.sorted_records, &self.bucket_offsets, &self.bucket_counts);

        // Pass A: count per bucket; the sentinel bucket contributes nothing.
        let counts = self.pair_counts.as_mut_slice();
        stream
            .parallel_for(Workload::Heavy, heavy)
            .apply_mut(&mut counts[..valid], |b, count| {
                let mut sink = CountSink::default();
                enumerate_bucket(buckets.get(b), spheres, &mut sink);
                *count = sink.count;
            });
        counts[valid] = 0;
        exclusive_sum(
            stream,
            &mut self.pair_scan_workspace,
            self.pair_counts.as_slice(),
            self.pair_offsets.as_mut_slice(),
        );

        // Host sync point: the output is sized from the total.
        let total = stream.read_back(&self.pair_offsets, valid).wait();
        let total = usize::try_from(total).map_err(|_| BroadPhaseError::Capacity {
            requested: usize::MAX,
            what: "collision pairs",
        })?;
        out.resize(total)?;

        // Pass B: each bucket writes its own slice of the output.
        let pair_counts = self.pair_counts.as_slice();
        let pair_offsets = self.pair_offsets.as_slice();
        let mut slices: Vec<&mut [CollisionPair]> = Vec::with_capacity(valid);
        let mut rest = out.as_mut_slice();
        let mut consumed = 0usize;
        for (&count, &offset) in pair_counts[..valid].iter().zip(pair_offsets) {
            debug_assert_eq!(offset as usize, consumed);
            let (head, tail) = std::mem::take(&mut rest).split_at_mut(count as usize);
            slices.push(head);
            rest = tail;
            consumed += count as usize;
        }
        debug_assert!(rest.is_empty());

        stream
            .parallel_for(Workload::Heavy, heavy)
            .apply_mut(&mut slices, |b, slice| {
                let expected = slice.len();
                let mut sink = EmitSink::new(&mut slice[..]);
                enumerate_bucket(buckets.get(b), spheres, &mut sink);
                debug_assert_eq!(sink.written(), expected, "bucket {} count/emit mismatch", b);
            });

        self.pair_count = total;
        self.timings
            .set(PipelineStage::CreateCollisionPairList, timer.elapsed());
        log::debug!(
            "create_collision_pair_list: {} pairs from {} buckets",
            total,
            valid
        );
        Ok(())
    }

    /// Call `f` for every overlapping pair without materializing a list.
    ///
    /// Buckets are visited in parallel, so `f` may be called concurrently and
    /// in any order. Each pair is visited exactly once.
    pub fn for_each_pair<F>(&self, stream: &Stream, f: F) -> Result<(), BroadPhaseError>
    where
        F: Fn(CollisionPair) + Sync + Send,
    {
        self.require(Stage::Counted, "for_each_pair")?;
        let spheres = self.spheres.as_slice();
        let buckets = Buckets::new(&self.sorted_records, &self.bucket_offsets, &self.bucket_counts);
        stream
            .parallel_for(Workload::Heavy, self.launch.group_size(Workload::Heavy))
            .apply(self.valid_cell_count(), |b| {
                enumerate_bucket(buckets.get(b), spheres, &mut VisitSink(&f));
            });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit_grid() -> SpatialHashConfig {
        SpatialHashConfig::new(1.0, Vec3::ZERO)
    }

    fn write(sphere: Sphere) -> Vec<CellRecord> {
        let mut slots = vec![CellRecord::SENTINEL; SLOTS_PER_OBJECT];
        write_object_cells(&unit_grid(), &sphere, 3, &mut slots);
        slots
    }

    #[test]
    fn test_centered_sphere_has_only_home() {
        let slots = write(Sphere::new(Vec3::splat(0.5), 0.1));
        assert_eq!(slots[0].cell, IVec3::ZERO);
        assert!(slots[0].is_home());
        assert_eq!(slots[0].overlap_mask(), 1);
        assert!(slots[1..].iter().all(|r| r.is_sentinel()));
    }

    #[test]
    fn test_centered_sphere_extends_toward_negative() {
        // Not strictly above the cell center: the block extends to -axis.
        let slots = write(Sphere::new(Vec3::splat(0.5), 0.6));
        let cells: Vec<IVec3> = slots.iter().filter(|r| !r.is_sentinel()).map(|r| r.cell).collect();
        assert_eq!(cells.len(), 8);
        assert!(cells.contains(&IVec3::new(-1, -1, -1)));
        assert!(!cells.contains(&IVec3::new(1, 0, 0)));
    }

    #[test]
    fn test_corner_sphere_fills_block_in_order() {
        let slots = write(Sphere::new(Vec3::splat(0.9), 0.2));
        let cells: Vec<IVec3> = slots.iter().map(|r| r.cell).collect();
        assert_eq!(
            cells,
            vec![
                IVec3::new(0, 0, 0),
                IVec3::new(1, 0, 0),
                IVec3::new(0, 1, 0),
                IVec3::new(0, 0, 1),
                IVec3::new(0, 1, 1),
                IVec3::new(1, 0, 1),
                IVec3::new(1, 1, 0),
                IVec3::new(1, 1, 1),
            ]
        );
        assert!(slots.iter().all(|r| r.object_id == 3));
        assert!(slots.iter().all(|r| r.overlap_mask() == 0xff));
        assert_eq!(slots.iter().filter(|r| r.is_home()).count(), 1);
    }

    #[test]
    fn test_face_sphere_gets_one_phantom() {
        let slots = write(Sphere::new(Vec3::new(0.9, 0.5, 0.5), 0.1));
        assert_eq!(slots[0].cell, IVec3::ZERO);
        assert_eq!(slots[1].cell, IVec3::new(1, 0, 0));
        assert!(slots[1].is_phantom());
        assert_eq!(slots[0].overlap_mask(), 0b1_0001);
        assert_eq!(slots[1].overlap_mask(), 0b1_0001);
        assert!(slots[2..].iter().all(|r| r.is_sentinel()));
        assert_eq!(slots[1].bucket, unit_grid().hash_of(IVec3::new(1, 0, 0)));
    }

    #[test]
    fn test_stage_order_is_enforced() {
        let stream = Stream::new();
        let mut field = SpatialPartitionField::new();
        let mut out = DeviceBuffer::labeled("pairs");
        let err = field.create_collision_pair_list(&stream, &mut out).unwrap_err();
        assert_eq!(
            err,
            BroadPhaseError::StageOrder {
                expected: "count_collision_per_cell",
                found: "create_collision_pair_list"
            }
        );
        let err = field.fill_hash_cells(&stream).unwrap_err();
        assert!(matches!(err, BroadPhaseError::StageOrder { found: "fill_hash_cells", .. }));
    }

    #[test]
    fn test_rebinding_invalidates_later_stages() {
        let stream = Stream::new();
        let mut field = SpatialPartitionField::new();
        field.config_spatial_hash(Vec3::ZERO);
        field.setup(&stream, &[Sphere::new(Vec3::ZERO, 0.5)]).unwrap();
        field.bind(&stream, &[Sphere::new(Vec3::ONE, 0.5)]).unwrap();
        assert_eq!(field.unique_bucket_count(), 0);
        assert!(field.sort_hash_cells(&stream).is_err());
    }

    #[test]
    fn test_missing_origin() {
        let stream = Stream::new();
        let mut field = SpatialPartitionField::new();
        let err = field.setup(&stream, &[Sphere::new(Vec3::ZERO, 0.5)]).unwrap_err();
        assert_eq!(err, BroadPhaseError::Config(ConfigError::OriginNotSet));
    }

    #[test]
    fn test_non_finite_cell_size() {
        let stream = Stream::new();
        let mut field = SpatialPartitionField::new();
        field.config_spatial_hash(Vec3::ZERO);
        field.set_cell_size(f32::NAN);
        let err = field.setup(&stream, &[Sphere::new(Vec3::ZERO, 0.5)]).unwrap_err();
        assert!(matches!(
            err,
            BroadPhaseError::Config(ConfigError::NonPositiveCellSize(_))
        ));
    }

    #[test]
    fn test_zero_radius_auto_size_fails() {
        let stream = Stream::new();
        let mut field = SpatialPartitionField::new();
        field.config_spatial_hash(Vec3::ZERO);
        let points = [
            Sphere::new(Vec3::splat(0.5), 0.0),
            Sphere::new(Vec3::new(2.5, 0.5, 0.5), 0.0),
        ];
        let err = field.setup(&stream, &points).unwrap_err();
        assert_eq!(
            err,
            BroadPhaseError::Config(ConfigError::DegenerateCellSize { max_radius: 0.0 })
        );

        // An explicit size makes point sets valid.
        field.set_cell_size(1.0);
        field.setup(&stream, &points).unwrap();
        assert_eq!(field.valid_cell_count(), 2);
    }

    #[test]
    fn test_csv_dump_lists_every_record() {
        let stream = Stream::new();
        let mut field = SpatialPartitionField::new();
        field.config_spatial_hash(Vec3::ZERO);
        field.set_cell_size(1.0);
        field
            .setup(&stream, &[Sphere::new(Vec3::new(0.9, 0.5, 0.5), 0.1)])
            .unwrap();
        let mut csv = Vec::new();
        field.write_records_csv(&mut csv).unwrap();
        let text = String::from_utf8(csv).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], CELL_RECORD_CSV_HEADER);
        assert_eq!(lines.len(), 1 + 2);
        assert_eq!(field.stats().phantom_records, 1);
    }
}
