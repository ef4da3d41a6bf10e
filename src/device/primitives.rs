//! Parallel primitives: stable sort-by-key, run-length encode, exclusive
//! prefix sum and max reduction.
//!
//! Each primitive that needs scratch memory takes a workspace owned by the
//! caller, so repeated invocations reuse allocations.

use super::{DeviceBuffer, Readback, Stream, Workload};
use crate::error::BroadPhaseError;
use std::ops::Add;

#[cfg(feature = "parallel")]
use rayon::prelude::*;

macro_rules! maybe_par_range {
    ($range:expr) => {{
        #[cfg(feature = "parallel")]
        {
            ($range).into_par_iter()
        }
        #[cfg(not(feature = "parallel"))]
        {
            $range
        }
    }};
}

/// Elements per task of the sort's pack and gather launches.
const GATHER_GROUP: usize = 1024;
/// Elements per scan task.
const SCAN_TILE: usize = 2048;

// ---------------------------------------------------------------------------
// Sort by key
// ---------------------------------------------------------------------------

/// Scratch for [`sort_pairs`]: one `key << 32 | index` word per element.
#[derive(Debug, Clone)]
pub struct SortWorkspace {
    packed: DeviceBuffer<u64>,
}

impl Default for SortWorkspace {
    fn default() -> Self {
        Self {
            packed: DeviceBuffer::labeled("sort permutation"),
        }
    }
}

/// Stable sort of `(key, value)` pairs.
///
/// Reads `keys_in`/`values_in` and writes the sorted sequence to
/// `keys_out`/`values_out`. Elements with equal keys keep their input order.
///
/// Each key is packed with its input index, the packed words are sorted in
/// parallel, then keys and values are gathered in sorted order. The index in
/// the low half makes every word distinct, so the unstable sort of the words
/// yields the stable order of the pairs.
pub fn sort_pairs<V>(
    stream: &Stream,
    workspace: &mut SortWorkspace,
    keys_in: &[u32],
    values_in: &[V],
    keys_out: &mut [u32],
    values_out: &mut [V],
) -> Result<(), BroadPhaseError>
where
    V: Copy + Send + Sync,
{
    let n = keys_in.len();
    debug_assert_eq!(values_in.len(), n);
    debug_assert_eq!(keys_out.len(), n);
    debug_assert_eq!(values_out.len(), n);

    if n < 2 {
        keys_out.copy_from_slice(keys_in);
        values_out.copy_from_slice(values_in);
        return Ok(());
    }
    // Indices live in the low 32 bits.
    if u32::try_from(n - 1).is_err() {
        return Err(BroadPhaseError::Capacity {
            requested: n,
            what: "sort permutation",
        });
    }
    workspace.packed.resize(n)?;
    let packed = workspace.packed.as_mut_slice();

    stream
        .parallel_for(Workload::Light, GATHER_GROUP)
        .apply_mut(&mut *packed, |i, word| {
            *word = (u64::from(keys_in[i]) << 32) | i as u64
        });

    stream.record_launch(Workload::Light);
    #[cfg(feature = "parallel")]
    packed.par_sort_unstable();
    #[cfg(not(feature = "parallel"))]
    packed.sort_unstable();

    let packed: &[u64] = packed;
    stream
        .parallel_for(Workload::Light, GATHER_GROUP)
        .apply_mut(keys_out, |i, key| *key = (packed[i] >> 32) as u32);
    stream
        .parallel_for(Workload::Light, GATHER_GROUP)
        .apply_mut(values_out, |i, value| {
            *value = values_in[(packed[i] & u64::from(u32::MAX)) as usize]
        });
    Ok(())
}

// ---------------------------------------------------------------------------
// Run-length encode
// ---------------------------------------------------------------------------

/// Scratch for [`run_length_encode`]: indices where runs start.
#[derive(Debug, Clone, Default)]
pub struct EncodeWorkspace {
    heads: Vec<u32>,
}

/// Collapse runs of equal keys.
///
/// Writes the key of each run to `unique[..runs]` and its length to
/// `counts[..runs]`; both must hold at least `keys.len()` elements. The run
/// count is returned as a host read-back.
pub fn run_length_encode(
    stream: &Stream,
    workspace: &mut EncodeWorkspace,
    keys: &[u32],
    unique: &mut [u32],
    counts: &mut [u32],
) -> Readback<usize> {
    let n = keys.len();
    debug_assert!(unique.len() >= n && counts.len() >= n);

    let heads = &mut workspace.heads;
    heads.clear();
    if n > 0 {
        stream.record_launch(Workload::Light);
        let starts = maybe_par_range!(0..n)
            .filter(|&i| i == 0 || keys[i] != keys[i - 1])
            .map(|i| i as u32);
        #[cfg(feature = "parallel")]
        heads.par_extend(starts);
        #[cfg(not(feature = "parallel"))]
        heads.extend(starts);
    }

    let runs = heads.len();
    let heads: &[u32] = heads;
    let run_len = |r: usize| {
        let end = heads.get(r + 1).map_or(n, |&h| h as usize);
        (end - heads[r] as usize) as u32
    };
    if runs > 0 {
        stream.record_launch(Workload::Light);
        #[cfg(feature = "parallel")]
        unique[..runs]
            .par_iter_mut()
            .zip(counts[..runs].par_iter_mut())
            .enumerate()
            .for_each(|(r, (u, c))| {
                *u = keys[heads[r] as usize];
                *c = run_len(r);
            });
        #[cfg(not(feature = "parallel"))]
        for r in 0..runs {
            unique[r] = keys[heads[r] as usize];
            counts[r] = run_len(r);
        }
    }
    stream.read_back_value(runs)
}

// ---------------------------------------------------------------------------
// Exclusive sum
// ---------------------------------------------------------------------------

/// Scratch for [`exclusive_sum`]: per-tile partial sums.
#[derive(Debug, Clone)]
pub struct ScanWorkspace<T> {
    partials: Vec<T>,
}

impl<T> Default for ScanWorkspace<T> {
    fn default() -> Self {
        Self {
            partials: Vec::new(),
        }
    }
}

fn tile_sum<T: Copy + Default + Add<Output = T>>(tile: &[T]) -> T {
    tile.iter().fold(T::default(), |acc, &x| acc + x)
}

/// `output[i] = input[0] + ... + input[i - 1]`, with `output[0] = 0`.
///
/// Tiles are summed in parallel, the tile sums scanned on the controlling
/// thread, then each tile scanned from its base in parallel. Pick `T` wide
/// enough for the total.
pub fn exclusive_sum<T>(
    stream: &Stream,
    workspace: &mut ScanWorkspace<T>,
    input: &[T],
    output: &mut [T],
) where
    T: Copy + Default + Add<Output = T> + Send + Sync,
{
    debug_assert_eq!(input.len(), output.len());
    if input.is_empty() {
        return;
    }
    stream.record_launch(Workload::Light);

    let partials = &mut workspace.partials;
    #[cfg(feature = "parallel")]
    input
        .par_chunks(SCAN_TILE)
        .map(tile_sum)
        .collect_into_vec(partials);
    #[cfg(not(feature = "parallel"))]
    {
        partials.clear();
        partials.extend(input.chunks(SCAN_TILE).map(tile_sum));
    }

    let mut acc = T::default();
    for p in partials.iter_mut() {
        let sum = *p;
        *p = acc;
        acc = acc + sum;
    }

    let scan_tile = |((out, tile), &base): ((&mut [T], &[T]), &T)| {
        let mut acc = base;
        for (o, &x) in out.iter_mut().zip(tile) {
            *o = acc;
            acc = acc + x;
        }
    };
    #[cfg(feature = "parallel")]
    output
        .par_chunks_mut(SCAN_TILE)
        .zip(input.par_chunks(SCAN_TILE))
        .zip(partials.par_iter())
        .for_each(scan_tile);
    #[cfg(not(feature = "parallel"))]
    output
        .chunks_mut(SCAN_TILE)
        .zip(input.chunks(SCAN_TILE))
        .zip(partials.iter())
        .for_each(scan_tile);
}

// ---------------------------------------------------------------------------
// Max reduce
// ---------------------------------------------------------------------------

/// Maximum of `values` as a host read-back. NaNs are ignored; an empty
/// input yields `f32::NEG_INFINITY`.
pub fn reduce_max(stream: &Stream, values: &[f32]) -> Readback<f32> {
    if !values.is_empty() {
        stream.record_launch(Workload::Light);
    }
    #[cfg(feature = "parallel")]
    let max = values
        .par_iter()
        .copied()
        .reduce(|| f32::NEG_INFINITY, f32::max);
    #[cfg(not(feature = "parallel"))]
    let max = values.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    stream.read_back_value(max)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{Rng, SeedableRng};
    use rand_chacha::ChaCha8Rng;

    #[test]
    fn test_sort_pairs_is_stable() {
        let stream = Stream::new();
        let mut ws = SortWorkspace::default();
        let keys = [5u32, 1, 5, u32::MAX, 1, 0, 5, u32::MAX];
        let values: Vec<u32> = (0..keys.len() as u32).collect();
        let mut k_out = vec![0; keys.len()];
        let mut v_out = vec![0; keys.len()];
        sort_pairs(&stream, &mut ws, &keys, &values, &mut k_out, &mut v_out).unwrap();
        assert_eq!(k_out, vec![0, 1, 1, 5, 5, 5, u32::MAX, u32::MAX]);
        assert_eq!(v_out, vec![5, 1, 4, 0, 2, 6, 3, 7]);
    }

    #[test]
    fn test_sort_pairs_matches_std_stable_sort() {
        let stream = Stream::new();
        let mut ws = SortWorkspace::default();
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        // Many repeats, so stability is visible in the values.
        let keys: Vec<u32> = (0..20_000)
            .map(|_| rng.gen_range(0..3000u32) << 12 | rng.gen_range(0..4u32))
            .collect();
        let values: Vec<u32> = (0..keys.len() as u32).collect();

        let mut expected: Vec<(u32, u32)> = keys.iter().copied().zip(values.iter().copied()).collect();
        expected.sort_by_key(|&(k, _)| k);

        let mut k_out = vec![0; keys.len()];
        let mut v_out = vec![0; keys.len()];
        sort_pairs(&stream, &mut ws, &keys, &values, &mut k_out, &mut v_out).unwrap();
        let got: Vec<(u32, u32)> = k_out.into_iter().zip(v_out).collect();
        assert_eq!(got, expected);
    }

    #[test]
    fn test_sort_pairs_full_width_keys() {
        let stream = Stream::new();
        let mut ws = SortWorkspace::default();
        let mut rng = ChaCha8Rng::seed_from_u64(8);
        let keys: Vec<u32> = (0..50_000)
            .map(|i| match i % 4 {
                0 => u32::MAX,
                1 => rng.gen(),
                2 => rng.gen_range(0..16u32),
                _ => u32::MAX - rng.gen_range(0..16u32),
            })
            .collect();
        let values: Vec<u64> = (0..keys.len() as u64).map(|i| i * 3).collect();

        let mut expected: Vec<(u32, u64)> = keys.iter().copied().zip(values.iter().copied()).collect();
        expected.sort_by_key(|&(k, _)| k);

        let mut k_out = vec![0; keys.len()];
        let mut v_out = vec![0; keys.len()];
        sort_pairs(&stream, &mut ws, &keys, &values, &mut k_out, &mut v_out).unwrap();
        let got: Vec<(u32, u64)> = k_out.into_iter().zip(v_out).collect();
        assert_eq!(got, expected);

        // Pack, sort and two gathers.
        assert_eq!(stream.stats().light_launches, 4);
        assert_eq!(stream.stats().readbacks, 0);

        // The scratch is reused by a smaller sort.
        let mut k_out = [0u32; 3];
        let mut v_out = [0u64; 3];
        sort_pairs(&stream, &mut ws, &[2, 0, 2], &[10, 11, 12], &mut k_out, &mut v_out).unwrap();
        assert_eq!((k_out, v_out), ([0, 2, 2], [11, 10, 12]));
    }

    #[test]
    fn test_sort_pairs_trivial_inputs() {
        let stream = Stream::new();
        let mut ws = SortWorkspace::default();
        let mut k: [u32; 0] = [];
        let mut v: [u8; 0] = [];
        sort_pairs(&stream, &mut ws, &[], &[], &mut k, &mut v).unwrap();

        let mut k = [0u32];
        let mut v = [0u8];
        sort_pairs(&stream, &mut ws, &[9], &[3], &mut k, &mut v).unwrap();
        assert_eq!((k[0], v[0]), (9, 3));
    }

    #[test]
    fn test_run_length_encode() {
        let stream = Stream::new();
        let mut ws = EncodeWorkspace::default();
        let keys = [1u32, 1, 1, 4, 7, 7, u32::MAX, u32::MAX];
        let mut unique = [0u32; 8];
        let mut counts = [0u32; 8];
        let runs = run_length_encode(&stream, &mut ws, &keys, &mut unique, &mut counts).wait();
        assert_eq!(runs, 4);
        assert_eq!(&unique[..runs], &[1, 4, 7, u32::MAX]);
        assert_eq!(&counts[..runs], &[3, 1, 2, 2]);
        assert_eq!(stream.stats().readbacks, 1);
    }

    #[test]
    fn test_run_length_encode_empty() {
        let stream = Stream::new();
        let mut ws = EncodeWorkspace::default();
        let runs = run_length_encode(&stream, &mut ws, &[], &mut [], &mut []).wait();
        assert_eq!(runs, 0);
    }

    #[test]
    fn test_exclusive_sum_across_tiles() {
        let stream = Stream::new();
        let mut ws = ScanWorkspace::default();
        let input: Vec<u32> = (0..(SCAN_TILE * 3 + 17) as u32).map(|i| i % 5).collect();
        let mut output = vec![u32::MAX; input.len()];
        exclusive_sum(&stream, &mut ws, &input, &mut output);

        let mut acc = 0;
        for (i, &x) in input.iter().enumerate() {
            assert_eq!(output[i], acc, "prefix mismatch at {}", i);
            acc += x;
        }
    }

    #[test]
    fn test_exclusive_sum_small() {
        let stream = Stream::new();
        let mut ws = ScanWorkspace::default();
        let mut output = [0u32; 4];
        exclusive_sum(&stream, &mut ws, &[3, 0, 2, 0], &mut output);
        assert_eq!(output, [0, 3, 3, 5]);
    }

    #[test]
    fn test_exclusive_sum_wide_totals() {
        let stream = Stream::new();
        let mut ws = ScanWorkspace::<u64>::default();
        let input = [u64::from(u32::MAX), 5, 7, u64::from(u32::MAX)];
        let mut output = [0u64; 4];
        exclusive_sum(&stream, &mut ws, &input, &mut output);
        assert_eq!(output, [0, 4_294_967_295, 4_294_967_300, 4_294_967_307]);
    }

    #[test]
    fn test_reduce_max() {
        let stream = Stream::new();
        assert_eq!(reduce_max(&stream, &[0.5, 2.0, f32::NAN, 1.0]).wait(), 2.0);
        assert_eq!(reduce_max(&stream, &[]).wait(), f32::NEG_INFINITY);
        assert_eq!(stream.stats().readbacks, 2);
    }
}
