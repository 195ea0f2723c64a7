//! Brute-force flat index: O(n) k-NN search over uncompressed vectors

use tracing::{debug, trace};

use crate::distance::DistanceMetric;
use crate::error::{FlatKnnError, Result};
use crate::index::{check_search_shape, Index, Label, NO_LABEL};
use crate::knn;
use crate::range_result::RangeSearchResult;
use crate::selector::IdSelector;
use crate::storage::{row_count, Compaction, FlatStorage};

/// A flat (brute-force) index that computes distance to every stored vector.
#[derive(Debug, Clone)]
pub struct FlatIndex {
    storage: FlatStorage,
    metric: DistanceMetric,
}

impl FlatIndex {
    /// Create a new empty flat index for `d`-dimensional vectors.
    pub fn new(d: usize, metric: DistanceMetric) -> Result<Self> {
        Ok(Self {
            storage: FlatStorage::new(d)?,
            metric,
        })
    }

    /// Flat index ranked by squared Euclidean distance.
    pub fn l2(d: usize) -> Result<Self> {
        Self::new(d, DistanceMetric::L2)
    }

    /// Flat index ranked by inner product.
    pub fn inner_product(d: usize) -> Result<Self> {
        Self::new(d, DistanceMetric::InnerProduct)
    }

    /// All stored vectors, row-major.
    pub fn vectors(&self) -> &[f32] {
        self.storage.as_slice()
    }

    pub fn storage(&self) -> &FlatStorage {
        &self.storage
    }

    /// Get a stored vector by label.
    pub fn get_vector(&self, label: Label) -> Option<&[f32]> {
        usize::try_from(label).ok().and_then(|i| self.storage.row(i))
    }

    /// Check that `label` names a stored vector.
    pub(crate) fn check_label(&self, label: Label) -> Result<usize> {
        usize::try_from(label)
            .ok()
            .filter(|&i| i < self.ntotal())
            .ok_or_else(|| FlatKnnError::LabelOutOfRange {
                label,
                ntotal: self.ntotal(),
            })
    }

    /// Overwrite `distances` with the exact distance between each query and
    /// the `k` candidates named in its row of `labels`.
    ///
    /// Labels must lie in `[-1, ntotal)`. `NO_LABEL` slots receive the
    /// metric's worst value; `labels` is never modified.
    pub fn compute_distance_subset(
        &self,
        x: &[f32],
        k: usize,
        distances: &mut [f32],
        labels: &[Label],
    ) -> Result<()> {
        let d = self.dimension();
        check_search_shape(d, x, k, distances, labels)?;
        if let Some(&label) = labels
            .iter()
            .find(|&&l| l != NO_LABEL && self.check_label(l).is_err())
        {
            return Err(FlatKnnError::LabelOutOfRange {
                label,
                ntotal: self.ntotal(),
            });
        }
        knn::distances_by_idx(self.metric, x, self.vectors(), d, k, labels, distances);
        Ok(())
    }

    /// Like `remove_ids`, also returning where every surviving vector moved.
    ///
    /// Survivors are renumbered to stay contiguous, so labels handed out
    /// before the call may now name a different vector.
    pub fn remove_ids_with_map(&mut self, selector: &dyn IdSelector) -> Compaction {
        let compaction = self
            .storage
            .compact(|i| selector.is_member(i as Label));
        debug!(
            removed = compaction.removed,
            ntotal = self.ntotal(),
            "compacted flat storage"
        );
        compaction
    }
}

impl Index for FlatIndex {
    fn dimension(&self) -> usize {
        self.storage.dimension()
    }

    fn ntotal(&self) -> usize {
        self.storage.len()
    }

    fn is_trained(&self) -> bool {
        true
    }

    fn metric(&self) -> DistanceMetric {
        self.metric
    }

    fn train(&mut self, x: &[f32]) -> Result<()> {
        row_count(x, self.dimension())?;
        Ok(())
    }

    fn add(&mut self, x: &[f32]) -> Result<()> {
        let first = self.storage.append(x)?;
        debug!(
            added = self.ntotal() - first,
            ntotal = self.ntotal(),
            "added vectors to flat index"
        );
        Ok(())
    }

    fn search(
        &self,
        x: &[f32],
        k: usize,
        distances: &mut [f32],
        labels: &mut [Label],
    ) -> Result<()> {
        let d = self.dimension();
        let nq = check_search_shape(d, x, k, distances, labels)?;
        trace!(nq, k, ntotal = self.ntotal(), "flat search");
        knn::knn_exhaustive(self.metric, x, self.vectors(), d, k, distances, labels);
        Ok(())
    }

    fn range_search(&self, x: &[f32], radius: f32) -> Result<RangeSearchResult> {
        let d = self.dimension();
        row_count(x, d)?;
        Ok(knn::range_search_exhaustive(
            self.metric,
            x,
            self.vectors(),
            d,
            radius,
        ))
    }

    fn reset(&mut self) {
        self.storage.clear();
        debug!("reset flat index");
    }

    fn remove_ids(&mut self, selector: &dyn IdSelector) -> Result<usize> {
        Ok(self.remove_ids_with_map(selector).removed)
    }

    fn reconstruct(&self, label: Label, out: &mut [f32]) -> Result<()> {
        let i = self.check_label(label)?;
        let d = self.dimension();
        if out.len() != d {
            return Err(FlatKnnError::DimensionMismatch {
                expected: d,
                actual: out.len(),
            });
        }
        if let Some(row) = self.storage.row(i) {
            out.copy_from_slice(row);
        }
        Ok(())
    }

    fn reconstruct_n(&self, i0: Label, ni: usize, out: &mut [f32]) -> Result<()> {
        let d = self.dimension();
        if ni.checked_mul(d) != Some(out.len()) {
            return Err(FlatKnnError::DimensionMismatch {
                expected: ni.saturating_mul(d),
                actual: out.len(),
            });
        }
        let rows = usize::try_from(i0)
            .ok()
            .and_then(|start| self.storage.rows(start, ni))
            .ok_or_else(|| FlatKnnError::LabelOutOfRange {
                label: i0.saturating_add(ni.saturating_sub(1) as Label),
                ntotal: self.ntotal(),
            })?;
        out.copy_from_slice(rows);
        Ok(())
    }
}
