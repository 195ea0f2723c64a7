//! One-dimensional index: a sorted permutation replaces the linear scan.
//!
//! A query is located in the sorted values by binary search, then the
//! answer grows outward from that bracket, always taking the closer of the
//! next value on the left and the next value on the right. Cost per query is
//! O(log n + k) instead of O(n).

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::distance::DistanceMetric;
use crate::error::{FlatKnnError, Result};
use crate::flat_index::FlatIndex;
use crate::index::{check_search_shape, Index, Label, NO_LABEL};
use crate::range_result::RangeSearchResult;
use crate::selector::IdSelector;

/// Configuration parameters for the sorted-axis index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SortedAxisParams {
    /// Rebuild the permutation on every `add`. When false, call
    /// `update_permutation` between the last add and the first search.
    pub continuous_update: bool,
    /// Sort in parallel once the index holds at least this many values.
    pub parallel_sort_threshold: usize,
}

impl Default for SortedAxisParams {
    fn default() -> Self {
        Self {
            continuous_update: true,
            parallel_sort_threshold: 1_000_000,
        }
    }
}

impl SortedAxisParams {
    pub fn new(continuous_update: bool) -> Self {
        Self {
            continuous_update,
            ..Self::default()
        }
    }
}

/// Where the next result of one query comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Frontier {
    /// Both neighbors are still available: `left` is the next candidate
    /// below the query, `right` the next one above.
    Both { left: usize, right: usize },
    /// Only smaller values remain, starting at this position.
    Left(usize),
    /// Only larger values remain, starting at this position.
    Right(usize),
    /// Every stored value has been emitted.
    Exhausted,
}

/// Exact L2 search over scalars via a maintained sort permutation.
///
/// Results are identical to a `FlatIndex` over the same values, distances
/// included (squared differences).
#[derive(Debug, Clone)]
pub struct SortedAxisIndex {
    flat: FlatIndex,
    perm: Vec<usize>,
    params: SortedAxisParams,
}

impl SortedAxisIndex {
    pub fn new(params: SortedAxisParams) -> Result<Self> {
        Ok(Self {
            flat: FlatIndex::l2(1)?,
            perm: Vec::new(),
            params,
        })
    }

    pub fn params(&self) -> SortedAxisParams {
        self.params
    }

    /// Stored positions in non-decreasing order of value.
    pub fn permutation(&self) -> &[usize] {
        &self.perm
    }

    /// Whether `search` may run without `update_permutation` first.
    pub fn is_permutation_current(&self) -> bool {
        self.perm.len() == self.flat.ntotal()
    }

    /// Rebuild the ascending sort permutation over every stored value.
    pub fn update_permutation(&mut self) {
        let values = self.flat.vectors();
        let mut perm: Vec<usize> = (0..values.len()).collect();
        let by_value = |a: &usize, b: &usize| values[*a].total_cmp(&values[*b]);
        let parallel = perm.len() >= self.params.parallel_sort_threshold;
        if parallel {
            perm.par_sort_unstable_by(by_value);
        } else {
            perm.sort_unstable_by(by_value);
        }
        debug!(ntotal = perm.len(), parallel, "rebuilt sort permutation");
        self.perm = perm;
    }

    /// Bracket `q` in the sorted values and pick the starting frontier.
    fn locate(&self, values: &[f32], q: f32) -> Frontier {
        let n = self.perm.len();
        if n == 0 {
            return Frontier::Exhausted;
        }
        let value = |i: usize| values[self.perm[i]];
        if value(0) > q {
            return Frontier::Right(0);
        }
        if value(n - 1) <= q {
            return Frontier::Left(n - 1);
        }
        // value(i0) <= q < value(i1)
        let (mut i0, mut i1) = (0, n - 1);
        while i0 + 1 < i1 {
            let mid = (i0 + i1) / 2;
            if value(mid) <= q {
                i0 = mid;
            } else {
                i1 = mid;
            }
        }
        Frontier::Both {
            left: i0,
            right: i1,
        }
    }

    /// Fill one query row by expanding outward from the bracket around `q`.
    fn expand(&self, values: &[f32], q: f32, distances: &mut [f32], labels: &mut [Label]) {
        let n = self.perm.len();
        let mut frontier = self.locate(values, q);

        for (dist, label) in distances.iter_mut().zip(labels.iter_mut()) {
            let pos = match frontier {
                Frontier::Both { left, right } => {
                    if q - values[self.perm[left]] < values[self.perm[right]] - q {
                        frontier = match left {
                            0 => Frontier::Right(right),
                            _ => Frontier::Both {
                                left: left - 1,
                                right,
                            },
                        };
                        left
                    } else {
                        frontier = if right + 1 == n {
                            Frontier::Left(left)
                        } else {
                            Frontier::Both {
                                left,
                                right: right + 1,
                            }
                        };
                        right
                    }
                }
                Frontier::Left(i) => {
                    frontier = match i {
                        0 => Frontier::Exhausted,
                        _ => Frontier::Left(i - 1),
                    };
                    i
                }
                Frontier::Right(i) => {
                    frontier = if i + 1 == n {
                        Frontier::Exhausted
                    } else {
                        Frontier::Right(i + 1)
                    };
                    i
                }
                Frontier::Exhausted => {
                    *dist = f32::INFINITY;
                    *label = NO_LABEL;
                    continue;
                }
            };
            let row = self.perm[pos];
            let diff = q - values[row];
            *dist = diff * diff;
            *label = row as Label;
        }
    }
}

impl Index for SortedAxisIndex {
    fn dimension(&self) -> usize {
        1
    }

    fn ntotal(&self) -> usize {
        self.flat.ntotal()
    }

    fn is_trained(&self) -> bool {
        true
    }

    fn metric(&self) -> DistanceMetric {
        DistanceMetric::L2
    }

    fn train(&mut self, x: &[f32]) -> Result<()> {
        self.flat.train(x)
    }

    fn add(&mut self, x: &[f32]) -> Result<()> {
        self.flat.add(x)?;
        if self.params.continuous_update {
            self.update_permutation();
        }
        Ok(())
    }

    fn search(
        &self,
        x: &[f32],
        k: usize,
        distances: &mut [f32],
        labels: &mut [Label],
    ) -> Result<()> {
        if !self.is_permutation_current() {
            return Err(FlatKnnError::PermutationStale {
                ntotal: self.ntotal(),
                perm_len: self.perm.len(),
            });
        }
        let nq = check_search_shape(1, x, k, distances, labels)?;
        if k == 0 {
            return Ok(());
        }
        trace!(nq, k, ntotal = self.ntotal(), "sorted-axis search");

        let values = self.flat.vectors();
        distances
            .par_chunks_mut(k)
            .zip(labels.par_chunks_mut(k))
            .zip(x.par_iter())
            .for_each(|((dis, lab), &q)| self.expand(values, q, dis, lab));
        Ok(())
    }

    fn range_search(&self, x: &[f32], radius: f32) -> Result<RangeSearchResult> {
        self.flat.range_search(x, radius)
    }

    fn reset(&mut self) {
        self.flat.reset();
        self.perm.clear();
    }

    /// Removal renumbers survivors, so the permutation is dropped and, in
    /// continuous mode, rebuilt.
    fn remove_ids(&mut self, selector: &dyn IdSelector) -> Result<usize> {
        let removed = self.flat.remove_ids(selector)?;
        if removed > 0 {
            self.perm.clear();
            if self.params.continuous_update {
                self.update_permutation();
            }
        }
        Ok(removed)
    }

    fn reconstruct(&self, label: Label, out: &mut [f32]) -> Result<()> {
        self.flat.reconstruct(label, out)
    }

    fn reconstruct_n(&self, i0: Label, ni: usize, out: &mut [f32]) -> Result<()> {
        self.flat.reconstruct_n(i0, ni, out)
    }
}
