//! Execution backend for the partition pipeline.
//!
//! The pipeline is written against a small device model: buffers with a
//! logical length distinct from their capacity, a stream that launches
//! data-parallel stages, explicit host read-backs, and a handful of
//! parallel primitives. This backend runs on the CPU. With the `parallel`
//! feature, stages execute on the rayon pool and the work-group size becomes
//! the minimum split length of a task; without it they run in order.
//!
//! Stages execute eagerly, so by the time a stage returns its outputs are
//! visible. [`Readback`] still marks every point where the controlling thread
//! consumes a value computed by a stage.

mod buffer;
mod primitives;
mod readback;

pub use buffer::DeviceBuffer;
pub use primitives::{
    exclusive_sum, reduce_max, run_length_encode, sort_pairs, EncodeWorkspace, ScanWorkspace,
    SortWorkspace,
};
pub use readback::Readback;

use std::cell::Cell;

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// Default work-group size for per-object stages.
pub const DEFAULT_LIGHT_GROUP_SIZE: usize = 256;
/// Default work-group size for per-bucket O(k²) stages.
pub const DEFAULT_HEAVY_GROUP_SIZE: usize = 64;

/// Class of a parallel launch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Workload {
    /// Cheap per-element work (one task per object or slot).
    Light,
    /// Expensive per-bucket work (quadratic in bucket occupancy).
    Heavy,
}

/// Work-group sizes per workload class. Tuning only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct LaunchConfig {
    pub light_group_size: usize,
    pub heavy_group_size: usize,
}

impl Default for LaunchConfig {
    fn default() -> Self {
        Self {
            light_group_size: DEFAULT_LIGHT_GROUP_SIZE,
            heavy_group_size: DEFAULT_HEAVY_GROUP_SIZE,
        }
    }
}

impl LaunchConfig {
    #[inline]
    pub fn group_size(&self, workload: Workload) -> usize {
        match workload {
            Workload::Light => self.light_group_size,
            Workload::Heavy => self.heavy_group_size,
        }
        .max(1)
    }
}

/// Launch and synchronization counters of a [`Stream`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StreamStats {
    /// Parallel launches of light stages.
    pub light_launches: u64,
    /// Parallel launches of heavy stages.
    pub heavy_launches: u64,
    /// Host read-backs (blocking synchronization points).
    pub readbacks: u64,
}

/// An in-order execution stream.
///
/// Stages submitted to one stream execute in program order. The stream is
/// owned by the controlling thread; the parallel bodies it runs never see it.
#[derive(Debug, Default)]
pub struct Stream {
    stats: Cell<StreamStats>,
}

impl Stream {
    pub fn new() -> Self {
        Self::default()
    }

    /// Counters accumulated since creation or the last [`Stream::reset_stats`].
    pub fn stats(&self) -> StreamStats {
        self.stats.get()
    }

    pub fn reset_stats(&self) {
        self.stats.set(StreamStats::default());
    }

    /// Start a parallel launch of `workload` class with the given group size.
    pub fn parallel_for(&self, workload: Workload, group_size: usize) -> ParallelFor<'_> {
        ParallelFor {
            stream: self,
            workload,
            group_size: group_size.max(1),
        }
    }

    /// Read element `index` of `buffer` back to the host.
    ///
    /// This is a synchronization point: all previously submitted work that
    /// writes `buffer` has completed once the returned handle is waited on.
    pub fn read_back<T: Copy>(&self, buffer: &DeviceBuffer<T>, index: usize) -> Readback<T> {
        debug_assert!(
            index < buffer.len(),
            "read-back index {} out of range for `{}` (len {})",
            index,
            buffer.label(),
            buffer.len()
        );
        self.bump(|s| s.readbacks += 1);
        Readback::ready(buffer.as_slice()[index])
    }

    /// Publish a host-visible scalar produced by a primitive.
    pub(crate) fn read_back_value<T>(&self, value: T) -> Readback<T> {
        self.bump(|s| s.readbacks += 1);
        Readback::ready(value)
    }

    /// Block until all submitted work has completed.
    ///
    /// Stages execute eagerly on this backend, so there is never pending
    /// work; the call exists so pipeline code states where it synchronizes.
    #[inline]
    pub fn synchronize(&self) {}

    /// Count one launch of a stage the primitives run outside [`ParallelFor`].
    pub(crate) fn record_launch(&self, workload: Workload) {
        match workload {
            Workload::Light => self.bump(|s| s.light_launches += 1),
            Workload::Heavy => self.bump(|s| s.heavy_launches += 1),
        }
    }

    fn bump(&self, f: impl FnOnce(&mut StreamStats)) {
        let mut s = self.stats.get();
        f(&mut s);
        self.stats.set(s);
    }
}

/// A configured parallel launch: "run `body(i)` for every task `i`".
pub struct ParallelFor<'s> {
    stream: &'s Stream,
    workload: Workload,
    group_size: usize,
}

impl ParallelFor<'_> {
    fn count_launch(&self) {
        self.stream.record_launch(self.workload);
    }

    /// Run `body(i)` for `i in 0..n`.
    pub fn apply<F>(self, n: usize, body: F)
    where
        F: Fn(usize) + Sync + Send,
    {
        if n == 0 {
            return;
        }
        self.count_launch();
        #[cfg(feature = "parallel")]
        (0..n)
            .into_par_iter()
            .with_min_len(self.group_size)
            .for_each(body);
        #[cfg(not(feature = "parallel"))]
        (0..n).for_each(body);
    }

    /// Run `body(i, &mut data[i])` for every element.
    pub fn apply_mut<T, F>(self, data: &mut [T], body: F)
    where
        T: Send,
        F: Fn(usize, &mut T) + Sync + Send,
    {
        if data.is_empty() {
            return;
        }
        self.count_launch();
        #[cfg(feature = "parallel")]
        data.par_iter_mut()
            .with_min_len(self.group_size)
            .enumerate()
            .for_each(|(i, x)| body(i, x));
        #[cfg(not(feature = "parallel"))]
        data.iter_mut().enumerate().for_each(|(i, x)| body(i, x));
    }

    /// Run `body(i, chunk_i)` over consecutive `chunk`-sized pieces of `data`.
    pub fn apply_chunks_mut<T, F>(self, data: &mut [T], chunk: usize, body: F)
    where
        T: Send,
        F: Fn(usize, &mut [T]) + Sync + Send,
    {
        if data.is_empty() {
            return;
        }
        debug_assert!(chunk > 0);
        self.count_launch();
        #[cfg(feature = "parallel")]
        data.par_chunks_mut(chunk)
            .with_min_len(self.group_size)
            .enumerate()
            .for_each(|(i, c)| body(i, c));
        #[cfg(not(feature = "parallel"))]
        data.chunks_mut(chunk)
            .enumerate()
            .for_each(|(i, c)| body(i, c));
    }
}
