//! Per-bucket candidate pair enumeration.
//!
//! One loop serves counting, emitting and visiting; the [`PairSink`] decides
//! what happens to an accepted pair.

use crate::geometry::sphere_sphere;
use crate::spatial_hash::CellRecord;
use crate::types::{CollisionPair, Sphere};

/// Receives pairs accepted by [`enumerate_bucket`].
pub(crate) trait PairSink {
    fn accept(&mut self, pair: CollisionPair);
}

/// Counts accepted pairs (pass A).
#[derive(Debug, Default)]
pub(crate) struct CountSink {
    pub(crate) count: u64,
}

impl PairSink for CountSink {
    #[inline]
    fn accept(&mut self, _pair: CollisionPair) {
        self.count += 1;
    }
}

/// Writes accepted pairs into a pre-sized slice (pass B).
pub(crate) struct EmitSink<'a> {
    out: &'a mut [CollisionPair],
    written: usize,
}

impl<'a> EmitSink<'a> {
    pub(crate) fn new(out: &'a mut [CollisionPair]) -> Self {
        Self { out, written: 0 }
    }

    pub(crate) fn written(&self) -> usize {
        self.written
    }
}

impl PairSink for EmitSink<'_> {
    #[inline]
    fn accept(&mut self, pair: CollisionPair) {
        debug_assert!(
            self.written < self.out.len(),
            "bucket emitted more pairs than it counted"
        );
        if let Some(slot) = self.out.get_mut(self.written) {
            *slot = pair;
        }
        self.written += 1;
    }
}

/// Hands accepted pairs to a callback.
pub(crate) struct VisitSink<'f, F>(pub(crate) &'f F);

impl<F: Fn(CollisionPair)> PairSink for VisitSink<'_, F> {
    #[inline]
    fn accept(&mut self, pair: CollisionPair) {
        (self.0)(pair);
    }
}

/// Feed every pair owned by this bucket whose spheres overlap to `sink`.
///
/// `records` are the sorted records of one bucket. Records of different cells
/// that share the bucket through a hash collision are never paired, and pairs
/// that a lower-parity shared cell owns are skipped. Records arrive in object
/// order, so every accepted pair has `a < b`.
pub(crate) fn enumerate_bucket<K: PairSink>(
    records: &[CellRecord],
    spheres: &[Sphere],
    sink: &mut K,
) {
    for (i, r0) in records.iter().enumerate() {
        debug_assert!(!r0.is_sentinel());
        let s0 = &spheres[r0.object_id as usize];
        for r1 in &records[i + 1..] {
            if r0.cell != r1.cell || CellRecord::may_ignore(r0, r1) {
                continue;
            }
            debug_assert!(r0.object_id < r1.object_id);
            if sphere_sphere(s0, &spheres[r1.object_id as usize]) {
                sink.accept(CollisionPair::new(r0.object_id, r1.object_id));
            }
        }
    }
}
