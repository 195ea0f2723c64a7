//! Index trait shared by every search backend

use crate::distance::DistanceMetric;
use crate::error::{FlatKnnError, Result};
use crate::range_result::RangeSearchResult;
use crate::selector::IdSelector;
use crate::storage::row_count;

/// Label of a stored vector. Labels are positional: row `i` has label `i`.
pub type Label = i64;

/// Sentinel label for an empty result slot.
pub const NO_LABEL: Label = -1;

/// Owned k-NN results for a batch of queries, row-major `nq * k`.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchResults {
    pub nq: usize,
    pub k: usize,
    pub distances: Vec<f32>,
    pub labels: Vec<Label>,
}

impl SearchResults {
    /// Results of query `i` as `(distances, labels)`, best first.
    pub fn row(&self, i: usize) -> (&[f32], &[Label]) {
        let range = i * self.k..(i + 1) * self.k;
        (&self.distances[range.clone()], &self.labels[range])
    }
}

/// Validate a query batch against output buffers of `nq * k` slots.
/// Returns `nq`.
pub(crate) fn check_search_shape(
    d: usize,
    x: &[f32],
    k: usize,
    distances: &[f32],
    labels: &[Label],
) -> Result<usize> {
    let nq = row_count(x, d)?;
    let expected = nq * k;
    for actual in [distances.len(), labels.len()] {
        if actual != expected {
            return Err(FlatKnnError::DimensionMismatch { expected, actual });
        }
    }
    Ok(nq)
}

/// Check that labels `i0..i0 + n` all name stored vectors.
pub(crate) fn check_label_range(i0: Label, n: usize, ntotal: usize) -> Result<()> {
    let in_range = usize::try_from(i0)
        .ok()
        .and_then(|start| start.checked_add(n))
        .is_some_and(|end| end <= ntotal);
    if in_range {
        Ok(())
    } else {
        Err(FlatKnnError::LabelOutOfRange {
            label: i0.saturating_add(n.saturating_sub(1) as Label),
            ntotal,
        })
    }
}

/// A search index over fixed-dimension `f32` vectors.
///
/// Vector batches are row-major: `n` vectors of dimension `d` are passed as
/// one slice of `n * d` floats. Search outputs are caller-owned buffers of
/// `n * k` slots; slots without a result hold `NO_LABEL` and `+inf`.
///
/// Optional capabilities default to `FlatKnnError::Unsupported`.
pub trait Index {
    /// Dimension of every stored vector.
    fn dimension(&self) -> usize;

    /// Number of stored vectors.
    fn ntotal(&self) -> usize;

    /// Whether the index is ready for `add`.
    fn is_trained(&self) -> bool;

    /// The metric results are ranked by.
    fn metric(&self) -> DistanceMetric;

    fn len(&self) -> usize {
        self.ntotal()
    }

    fn is_empty(&self) -> bool {
        self.ntotal() == 0
    }

    /// Train on a representative batch.
    fn train(&mut self, x: &[f32]) -> Result<()>;

    /// Append a batch, labelling it `ntotal..ntotal + n`.
    fn add(&mut self, x: &[f32]) -> Result<()>;

    /// Append a batch under caller-chosen labels.
    fn add_with_ids(&mut self, _x: &[f32], _ids: &[Label]) -> Result<()> {
        Err(FlatKnnError::Unsupported {
            operation: "add_with_ids",
        })
    }

    /// Write the `k` best matches of each query into `distances`/`labels`.
    fn search(&self, x: &[f32], k: usize, distances: &mut [f32], labels: &mut [Label])
        -> Result<()>;

    /// Like `search`, allocating the output buffers.
    fn search_knn(&self, x: &[f32], k: usize) -> Result<SearchResults> {
        let nq = row_count(x, self.dimension())?;
        let mut distances = vec![0.0; nq * k];
        let mut labels = vec![NO_LABEL; nq * k];
        self.search(x, k, &mut distances, &mut labels)?;
        Ok(SearchResults {
            nq,
            k,
            distances,
            labels,
        })
    }

    /// Every stored vector within `radius` of each query.
    fn range_search(&self, _x: &[f32], _radius: f32) -> Result<RangeSearchResult> {
        Err(FlatKnnError::Unsupported {
            operation: "range_search",
        })
    }

    /// Labels of the `k` best matches of each query.
    fn assign(&self, x: &[f32], k: usize) -> Result<Vec<Label>> {
        Ok(self.search_knn(x, k)?.labels)
    }

    /// Remove every stored vector.
    fn reset(&mut self);

    /// Remove the vectors `selector` picks. Returns how many were removed.
    fn remove_ids(&mut self, _selector: &dyn IdSelector) -> Result<usize> {
        Err(FlatKnnError::Unsupported {
            operation: "remove_ids",
        })
    }

    /// Copy stored vector `label` into `out` (length `d`).
    fn reconstruct(&self, _label: Label, _out: &mut [f32]) -> Result<()> {
        Err(FlatKnnError::Unsupported {
            operation: "reconstruct",
        })
    }

    /// Copy stored vectors `i0..i0 + ni` into `out` (length `ni * d`).
    fn reconstruct_n(&self, i0: Label, ni: usize, out: &mut [f32]) -> Result<()> {
        let d = self.dimension();
        if ni.checked_mul(d) != Some(out.len()) {
            return Err(FlatKnnError::DimensionMismatch {
                expected: ni.saturating_mul(d),
                actual: out.len(),
            });
        }
        check_label_range(i0, ni, self.ntotal())?;
        let mut staged = vec![0.0; out.len()];
        for (offset, row) in staged.chunks_exact_mut(d).enumerate() {
            self.reconstruct(i0 + offset as Label, row)?;
        }
        out.copy_from_slice(&staged);
        Ok(())
    }

    /// `search`, then reconstruct each result into `recons` (length `n * k * d`).
    /// Slots without a result are filled with NaN.
    fn search_and_reconstruct(
        &self,
        x: &[f32],
        k: usize,
        distances: &mut [f32],
        labels: &mut [Label],
        recons: &mut [f32],
    ) -> Result<()> {
        let d = self.dimension();
        let nq = check_search_shape(d, x, k, distances, labels)?;
        if recons.len() != nq * k * d {
            return Err(FlatKnnError::DimensionMismatch {
                expected: nq * k * d,
                actual: recons.len(),
            });
        }
        self.search(x, k, distances, labels)?;
        let ntotal = self.ntotal();
        if let Some(&label) = labels
            .iter()
            .find(|&&l| l != NO_LABEL && check_label_range(l, 1, ntotal).is_err())
        {
            return Err(FlatKnnError::LabelOutOfRange { label, ntotal });
        }
        let mut staged = vec![f32::NAN; recons.len()];
        for (row, &label) in staged.chunks_exact_mut(d).zip(labels.iter()) {
            if label != NO_LABEL {
                self.reconstruct(label, row)?;
            }
        }
        recons.copy_from_slice(&staged);
        Ok(())
    }

    /// `residual = x - reconstruct(label)` for a single vector `x`.
    fn compute_residual(&self, x: &[f32], residual: &mut [f32], label: Label) -> Result<()> {
        let d = self.dimension();
        for len in [x.len(), residual.len()] {
            if len != d {
                return Err(FlatKnnError::DimensionMismatch {
                    expected: d,
                    actual: len,
                });
            }
        }
        self.reconstruct(label, residual)?;
        for (r, v) in residual.iter_mut().zip(x.iter()) {
            *r = v - *r;
        }
        Ok(())
    }
}

macro_rules! forward_index {
    ($($ty:ty),*) => {$(
        impl<I: Index + ?Sized> Index for $ty {
            fn dimension(&self) -> usize {
                (**self).dimension()
            }
            fn ntotal(&self) -> usize {
                (**self).ntotal()
            }
            fn is_trained(&self) -> bool {
                (**self).is_trained()
            }
            fn metric(&self) -> DistanceMetric {
                (**self).metric()
            }
            fn train(&mut self, x: &[f32]) -> Result<()> {
                (**self).train(x)
            }
            fn add(&mut self, x: &[f32]) -> Result<()> {
                (**self).add(x)
            }
            fn add_with_ids(&mut self, x: &[f32], ids: &[Label]) -> Result<()> {
                (**self).add_with_ids(x, ids)
            }
            fn search(
                &self,
                x: &[f32],
                k: usize,
                distances: &mut [f32],
                labels: &mut [Label],
            ) -> Result<()> {
                (**self).search(x, k, distances, labels)
            }
            fn range_search(&self, x: &[f32], radius: f32) -> Result<RangeSearchResult> {
                (**self).range_search(x, radius)
            }
            fn reset(&mut self) {
                (**self).reset()
            }
            fn remove_ids(&mut self, selector: &dyn IdSelector) -> Result<usize> {
                (**self).remove_ids(selector)
            }
            fn reconstruct(&self, label: Label, out: &mut [f32]) -> Result<()> {
                (**self).reconstruct(label, out)
            }
            fn reconstruct_n(&self, i0: Label, ni: usize, out: &mut [f32]) -> Result<()> {
                (**self).reconstruct_n(i0, ni, out)
            }
        }
    )*};
}

forward_index!(Box<I>, &mut I);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flat_index::FlatIndex;

    /// Index relying on the trait defaults for every batch reconstruction.
    struct RowByRow {
        flat: FlatIndex,
        bogus_label: Option<Label>,
    }

    impl RowByRow {
        fn new(rows: &[f32]) -> Self {
            let mut flat = FlatIndex::l2(2).unwrap();
            flat.add(rows).unwrap();
            Self {
                flat,
                bogus_label: None,
            }
        }
    }

    impl Index for RowByRow {
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
            self.flat.metric()
        }
        fn train(&mut self, _x: &[f32]) -> Result<()> {
            Ok(())
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
            self.flat.search(x, k, distances, labels)?;
            if let Some(bogus) = self.bogus_label {
                labels[labels.len() - 1] = bogus;
            }
            Ok(())
        }
        fn reset(&mut self) {
            self.flat.reset()
        }
        fn reconstruct(&self, label: Label, out: &mut [f32]) -> Result<()> {
            self.flat.reconstruct(label, out)
        }
    }

    #[test]
    fn test_default_reconstruct_n() {
        let index = RowByRow::new(&[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
        let mut out = [0.0; 4];
        index.reconstruct_n(1, 2, &mut out).unwrap();
        assert_eq!(out, [3.0, 4.0, 5.0, 6.0]);
    }

    #[test]
    fn test_default_reconstruct_n_leaves_output_on_error() {
        let index = RowByRow::new(&[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
        let mut out = [9.0; 4];
        assert!(matches!(
            index.reconstruct_n(2, 2, &mut out),
            Err(FlatKnnError::LabelOutOfRange { label: 3, ntotal: 3 })
        ));
        assert_eq!(out, [9.0; 4]);
        assert!(matches!(
            index.reconstruct_n(1 << 62, 1, &mut [9.0; 2]),
            Err(FlatKnnError::LabelOutOfRange { .. })
        ));
        assert!(matches!(
            index.reconstruct_n(-1, 1, &mut [9.0; 2]),
            Err(FlatKnnError::LabelOutOfRange { label: -1, .. })
        ));
    }

    #[test]
    fn test_default_search_and_reconstruct() {
        let index = RowByRow::new(&[0.0, 0.0, 1.0, 1.0]);
        let mut distances = [0.0; 3];
        let mut labels = [0; 3];
        let mut recons = [0.0; 6];
        index
            .search_and_reconstruct(&[0.9, 0.9], 3, &mut distances, &mut labels, &mut recons)
            .unwrap();
        assert_eq!(labels, [1, 0, NO_LABEL]);
        assert_eq!(recons[..4], [1.0, 1.0, 0.0, 0.0]);
        assert!(recons[4..].iter().all(|v| v.is_nan()));
    }

    #[test]
    fn test_search_and_reconstruct_rejects_bad_label_before_writing() {
        let mut index = RowByRow::new(&[0.0, 0.0, 1.0, 1.0]);
        index.bogus_label = Some(7);
        let mut distances = [0.0; 2];
        let mut labels = [0; 2];
        let mut recons = [9.0; 4];
        assert!(matches!(
            index.search_and_reconstruct(&[0.0, 0.0], 2, &mut distances, &mut labels, &mut recons),
            Err(FlatKnnError::LabelOutOfRange { label: 7, ntotal: 2 })
        ));
        assert_eq!(recons, [9.0; 4]);
    }
}
