//! Flat L2 index with a per-vector additive distance bias

use tracing::trace;

use crate::distance::DistanceMetric;
use crate::error::{FlatKnnError, Result};
use crate::flat_index::FlatIndex;
use crate::index::{check_search_shape, Index, Label};
use crate::knn;
use crate::selector::IdSelector;

/// An L2 flat index where stored vector `j` scores `l2_sqr(q, x_j) - shift[j]`.
///
/// The shift array is never recomputed on `add`; callers must keep it at
/// `ntotal` entries before searching.
#[derive(Debug, Clone)]
pub struct ShiftedFlatIndex {
    flat: FlatIndex,
    shift: Vec<f32>,
}

impl ShiftedFlatIndex {
    pub fn new(d: usize, shift: Vec<f32>) -> Result<Self> {
        Ok(Self {
            flat: FlatIndex::l2(d)?,
            shift,
        })
    }

    pub fn shift(&self) -> &[f32] {
        &self.shift
    }

    /// Replace the bias array.
    pub fn set_shift(&mut self, shift: Vec<f32>) {
        self.shift = shift;
    }

    /// The unshifted storage.
    pub fn flat(&self) -> &FlatIndex {
        &self.flat
    }
}

impl Index for ShiftedFlatIndex {
    fn dimension(&self) -> usize {
        self.flat.dimension()
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
        self.flat.add(x)
    }

    fn search(
        &self,
        x: &[f32],
        k: usize,
        distances: &mut [f32],
        labels: &mut [Label],
    ) -> Result<()> {
        let ntotal = self.ntotal();
        if self.shift.len() != ntotal {
            return Err(FlatKnnError::ShiftSizeMismatch {
                ntotal,
                shift_len: self.shift.len(),
            });
        }
        let d = self.dimension();
        let nq = check_search_shape(d, x, k, distances, labels)?;
        trace!(nq, k, ntotal, "shifted flat search");
        knn::knn_l2_with_shift(
            x,
            self.flat.vectors(),
            &self.shift,
            d,
            k,
            distances,
            labels,
        );
        Ok(())
    }

    fn reset(&mut self) {
        self.flat.reset();
    }

    fn remove_ids(&mut self, selector: &dyn IdSelector) -> Result<usize> {
        self.flat.remove_ids(selector)
    }

    fn reconstruct(&self, label: Label, out: &mut [f32]) -> Result<()> {
        self.flat.reconstruct(label, out)
    }

    fn reconstruct_n(&self, i0: Label, ni: usize, out: &mut [f32]) -> Result<()> {
        self.flat.reconstruct_n(i0, ni, out)
    }
}
