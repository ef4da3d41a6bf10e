//! Reference checking for broad-phase output.
//!
//! Provides an O(N²) reference pass and a comparison of reported pairs
//! against it. Useful for debugging, testing, and benchmarking.

use crate::geometry::sphere_sphere;
use crate::types::{CollisionPair, Sphere, SphereLike};
use rustc_hash::{FxHashMap, FxHashSet};

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

/// Detailed comparison of reported pairs against the reference set.
#[derive(Debug, Clone, Default)]
pub struct ValidationReport {
    /// Number of input spheres.
    pub num_objects: usize,
    /// Pairs in the reference set.
    pub expected_pairs: usize,
    /// Pairs reported, duplicates included.
    pub reported_pairs: usize,

    /// Reference pairs that were not reported.
    pub missing: Vec<CollisionPair>,
    /// Reported pairs that do not overlap (or are self-pairs).
    pub unexpected: Vec<CollisionPair>,
    /// Pairs reported more than once (after normalizing order).
    pub duplicates: Vec<CollisionPair>,
    /// Reported pairs with `a >= b`.
    pub misordered: usize,
}

impl ValidationReport {
    /// Exactly the reference set, each pair once, in `a < b` order.
    pub fn is_valid(&self) -> bool {
        self.missing.is_empty()
            && self.unexpected.is_empty()
            && self.duplicates.is_empty()
            && self.misordered == 0
    }

    /// Format a summary of any issues found.
    pub fn summary(&self) -> String {
        if self.is_valid() {
            return "Exact".to_string();
        }

        let preview = |pairs: &[CollisionPair]| {
            let shown: Vec<String> = pairs.iter().take(4).map(|p| p.to_string()).collect();
            let more = if pairs.len() > shown.len() { ", ..." } else { "" };
            format!("[{}{}]", shown.join(", "), more)
        };

        let mut issues = Vec::new();
        if !self.missing.is_empty() {
            issues.push(format!("{} missing {}", self.missing.len(), preview(&self.missing)));
        }
        if !self.unexpected.is_empty() {
            issues.push(format!(
                "{} unexpected {}",
                self.unexpected.len(),
                preview(&self.unexpected)
            ));
        }
        if !self.duplicates.is_empty() {
            issues.push(format!(
                "{} duplicated {}",
                self.duplicates.len(),
                preview(&self.duplicates)
            ));
        }
        if self.misordered > 0 {
            issues.push(format!("{} with a >= b", self.misordered));
        }
        issues.join(", ")
    }
}

impl std::fmt::Display for ValidationReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "ValidationReport {{ N={}, expected={}, reported={}, {} }}",
            self.num_objects,
            self.expected_pairs,
            self.reported_pairs,
            self.summary()
        )
    }
}

/// Every overlapping pair by exhaustive testing, sorted, with `a < b`.
pub fn brute_force_pairs<S: SphereLike + Sync>(spheres: &[S]) -> Vec<CollisionPair> {
    let spheres: Vec<Sphere> = spheres.iter().map(SphereLike::to_sphere).collect();
    let n = spheres.len();
    let rows: Vec<Vec<CollisionPair>> = maybe_par_range!(0..n)
        .map(|i| {
            let si = &spheres[i];
            (i + 1..n)
                .filter(|&j| sphere_sphere(si, &spheres[j]))
                .map(|j| CollisionPair::new(i as u32, j as u32))
                .collect()
        })
        .collect();
    rows.concat()
}

/// Compare `reported` against a reference pair list.
pub fn compare_pairs(
    num_objects: usize,
    reported: &[CollisionPair],
    expected: &[CollisionPair],
) -> ValidationReport {
    let mut seen: FxHashMap<CollisionPair, u32> = FxHashMap::default();
    let mut misordered = 0;
    for p in reported {
        if p.a >= p.b {
            misordered += 1;
        }
        *seen.entry(p.normalized()).or_default() += 1;
    }
    let expected_set: FxHashSet<CollisionPair> = expected.iter().map(|p| p.normalized()).collect();

    let mut missing: Vec<CollisionPair> = expected_set
        .iter()
        .filter(|p| !seen.contains_key(*p))
        .copied()
        .collect();
    let mut unexpected: Vec<CollisionPair> = seen
        .keys()
        .filter(|p| p.a == p.b || !expected_set.contains(*p))
        .copied()
        .collect();
    let mut duplicates: Vec<CollisionPair> = seen
        .iter()
        .filter(|&(_, &count)| count > 1)
        .map(|(&p, _)| p)
        .collect();
    missing.sort_unstable();
    unexpected.sort_unstable();
    duplicates.sort_unstable();

    ValidationReport {
        num_objects,
        expected_pairs: expected_set.len(),
        reported_pairs: reported.len(),
        missing,
        unexpected,
        duplicates,
        misordered,
    }
}

/// Check `reported` against the O(N²) reference for `spheres`.
pub fn validate<S: SphereLike + Sync>(spheres: &[S], reported: &[CollisionPair]) -> ValidationReport {
    compare_pairs(spheres.len(), reported, &brute_force_pairs(spheres))
}
