//! Two-stage search: approximate candidates from a base index, re-ranked
//! with exact distances from an owned flat copy of the same vectors.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::distance::DistanceMetric;
use crate::error::{FlatKnnError, Result};
use crate::flat_index::FlatIndex;
use crate::index::{check_search_shape, Index, Label, NO_LABEL};
use crate::storage::row_count;
use crate::top_k::TopK;

/// Configuration parameters for the refine stage.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RefineParams {
    /// The base index is asked for `floor(k * k_factor)` candidates.
    pub k_factor: f32,
}

impl Default for RefineParams {
    fn default() -> Self {
        Self { k_factor: 1.0 }
    }
}

impl RefineParams {
    pub fn new(k_factor: f32) -> Self {
        Self { k_factor }
    }

    pub fn validate(&self) -> Result<()> {
        if !self.k_factor.is_finite() || self.k_factor < 1.0 {
            return Err(FlatKnnError::InvalidParameter(format!(
                "k_factor must be a finite value >= 1, got {}",
                self.k_factor
            )));
        }
        Ok(())
    }
}

/// Re-ranks a base index's candidates with exact distances.
///
/// The base is owned when `B` is an owned type (`FlatIndex`,
/// `Box<dyn Index>`, ...) and borrowed when `B` is `&mut I`. Every `add`
/// goes to the base and the exact refine index in the same order, so a
/// label means the same vector in both.
pub struct RefineFlatIndex<B> {
    base: B,
    refine: FlatIndex,
    k_factor: f32,
    is_trained: bool,
}

impl<B: Index> RefineFlatIndex<B> {
    /// Wrap an empty base index with `k_factor = 1`.
    pub fn new(base: B) -> Result<Self> {
        Self::with_params(base, RefineParams::default())
    }

    pub fn with_params(base: B, params: RefineParams) -> Result<Self> {
        params.validate()?;
        if base.ntotal() != 0 {
            return Err(FlatKnnError::BaseNotEmpty {
                ntotal: base.ntotal(),
            });
        }
        let refine = FlatIndex::new(base.dimension(), base.metric())?;
        Ok(Self {
            is_trained: base.is_trained(),
            base,
            refine,
            k_factor: params.k_factor,
        })
    }

    pub fn base(&self) -> &B {
        &self.base
    }

    /// The exact index holding the same vectors as the base.
    pub fn refine_index(&self) -> &FlatIndex {
        &self.refine
    }

    pub fn k_factor(&self) -> f32 {
        self.k_factor
    }

    pub fn set_k_factor(&mut self, k_factor: f32) -> Result<()> {
        RefineParams::new(k_factor).validate()?;
        self.k_factor = k_factor;
        Ok(())
    }

    /// Give the base index back, dropping the refine copy.
    pub fn into_base(self) -> B {
        self.base
    }

    /// Number of base candidates re-scored for a request of `k`.
    fn k_base(&self, k: usize) -> usize {
        ((k as f32 * self.k_factor).floor() as usize).max(k)
    }
}

/// Scratch buffer of `len` slots, reserved fallibly.
fn scratch<T: Clone>(len: usize, fill: T) -> Result<Vec<T>> {
    let mut buf = Vec::new();
    buf.try_reserve_exact(len)?;
    buf.resize(len, fill);
    Ok(buf)
}

impl<B: Index> Index for RefineFlatIndex<B> {
    fn dimension(&self) -> usize {
        self.refine.dimension()
    }

    fn ntotal(&self) -> usize {
        self.refine.ntotal()
    }

    fn is_trained(&self) -> bool {
        self.is_trained
    }

    fn metric(&self) -> DistanceMetric {
        self.refine.metric()
    }

    fn train(&mut self, x: &[f32]) -> Result<()> {
        self.base.train(x)?;
        self.is_trained = true;
        Ok(())
    }

    fn add(&mut self, x: &[f32]) -> Result<()> {
        if !self.is_trained {
            return Err(FlatKnnError::NotTrained);
        }
        row_count(x, self.dimension())?;
        self.base.add(x)?;
        self.refine.add(x)?;
        debug!(ntotal = self.ntotal(), "added vectors to refine index");
        Ok(())
    }

    /// Labels returned by the base must lie in `[-1, ntotal)`; anything else
    /// fails with `LabelOutOfRange` before the output is written.
    fn search(
        &self,
        x: &[f32],
        k: usize,
        distances: &mut [f32],
        labels: &mut [Label],
    ) -> Result<()> {
        if !self.is_trained {
            return Err(FlatKnnError::NotTrained);
        }
        let nq = check_search_shape(self.dimension(), x, k, distances, labels)?;
        if nq == 0 || k == 0 {
            return Ok(());
        }

        let k_base = self.k_base(k);
        trace!(nq, k, k_base, "refine search");
        let mut base_distances = scratch(nq * k_base, 0.0f32)?;
        let mut base_labels = scratch(nq * k_base, NO_LABEL)?;

        self.base
            .search(x, k_base, &mut base_distances, &mut base_labels)?;
        self.refine
            .compute_distance_subset(x, k_base, &mut base_distances, &base_labels)?;

        let metric = self.metric();
        distances
            .par_chunks_mut(k)
            .zip(labels.par_chunks_mut(k))
            .zip(
                base_distances
                    .par_chunks(k_base)
                    .zip(base_labels.par_chunks(k_base)),
            )
            .for_each(|((dis, lab), (cand_dis, cand_lab))| {
                let mut heap =
                    TopK::from_candidates(metric, dis, lab, &cand_dis[..k], &cand_lab[..k]);
                if k_base > k {
                    heap.extend(&cand_dis[k..], &cand_lab[k..]);
                }
                heap.finalize();
            });
        Ok(())
    }

    fn reset(&mut self) {
        self.base.reset();
        self.refine.reset();
    }

    fn reconstruct(&self, label: Label, out: &mut [f32]) -> Result<()> {
        self.refine.reconstruct(label, out)
    }

    fn reconstruct_n(&self, i0: Label, ni: usize, out: &mut [f32]) -> Result<()> {
        self.refine.reconstruct_n(i0, ni, out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Approximate base: stores vectors snapped to a coarse grid and needs training.
    struct CoarseIndex {
        flat: FlatIndex,
        trained: bool,
    }

    impl CoarseIndex {
        fn new(d: usize) -> Self {
            Self {
                flat: FlatIndex::l2(d).unwrap(),
                trained: false,
            }
        }
    }

    impl Index for CoarseIndex {
        fn dimension(&self) -> usize {
            self.flat.dimension()
        }
        fn ntotal(&self) -> usize {
            self.flat.ntotal()
        }
        fn is_trained(&self) -> bool {
            self.trained
        }
        fn metric(&self) -> DistanceMetric {
            self.flat.metric()
        }
        fn train(&mut self, _x: &[f32]) -> Result<()> {
            self.trained = true;
            Ok(())
        }
        fn add(&mut self, x: &[f32]) -> Result<()> {
            let snapped: Vec<f32> = x.iter().map(|v| (v * 2.0).round() / 2.0).collect();
            self.flat.add(&snapped)
        }
        fn search(
            &self,
            x: &[f32],
            k: usize,
            distances: &mut [f32],
            labels: &mut [Label],
        ) -> Result<()> {
            self.flat.search(x, k, distances, labels)
        }
        fn reset(&mut self) {
            self.flat.reset()
        }
    }

    #[test]
    fn test_exact_base_matches_flat() {
        let data: Vec<f32> = (0..40).map(|i| ((i * 7) % 13) as f32).collect();
        let mut flat = FlatIndex::l2(4).unwrap();
        flat.add(&data).unwrap();

        let mut refine = RefineFlatIndex::new(FlatIndex::l2(4).unwrap()).unwrap();
        refine.add(&data).unwrap();

        let queries = [1.0, 2.0, 3.0, 4.0, 9.0, 0.0, 5.0, 1.0];
        let expected = flat.search_knn(&queries, 3).unwrap();
        let got = refine.search_knn(&queries, 3).unwrap();
        assert_eq!(got, expected);
    }

    #[test]
    fn test_base_must_start_empty() {
        let mut base = FlatIndex::l2(2).unwrap();
        base.add(&[0.0, 0.0]).unwrap();
        assert!(matches!(
            RefineFlatIndex::new(base),
            Err(FlatKnnError::BaseNotEmpty { ntotal: 1 })
        ));
    }

    #[test]
    fn test_requires_training() {
        let mut refine = RefineFlatIndex::new(CoarseIndex::new(1)).unwrap();
        assert!(!refine.is_trained());
        assert!(matches!(refine.add(&[0.0]), Err(FlatKnnError::NotTrained)));
        assert!(matches!(
            refine.search_knn(&[0.0], 1),
            Err(FlatKnnError::NotTrained)
        ));

        refine.train(&[0.0]).unwrap();
        refine.add(&[0.0]).unwrap();
        assert_eq!(refine.ntotal(), 1);
        assert_eq!(refine.base().ntotal(), 1);
    }

    #[test]
    fn test_exact_distances_fix_coarse_ranking() {
        let mut refine =
            RefineFlatIndex::with_params(CoarseIndex::new(1), RefineParams::new(2.0)).unwrap();
        refine.train(&[]).unwrap();
        // 0.9 and 1.1 both snap to 1.0; the coarse base cannot tell them apart.
        refine.add(&[0.9, 1.1, 3.0, 5.0]).unwrap();

        let results = refine.search_knn(&[1.05], 1).unwrap();
        assert_eq!(results.labels, vec![1]);
        assert!((results.distances[0] - 0.0025).abs() < 1e-5);
    }

    #[test]
    fn test_missing_candidates_pad() {
        let mut refine =
            RefineFlatIndex::with_params(FlatIndex::l2(1).unwrap(), RefineParams::new(3.0))
                .unwrap();
        refine.add(&[1.0, 2.0]).unwrap();

        let results = refine.search_knn(&[0.0], 3).unwrap();
        assert_eq!(results.labels, vec![0, 1, NO_LABEL]);
        assert_eq!(results.distances[2], f32::INFINITY);
    }

    #[test]
    fn test_inner_product_refine() {
        let mut refine =
            RefineFlatIndex::with_params(FlatIndex::inner_product(2).unwrap(), RefineParams::new(2.0))
                .unwrap();
        refine.add(&[1.0, 0.0, 3.0, 0.0, 2.0, 0.0, -1.0, 0.0]).unwrap();
        let results = refine.search_knn(&[1.0, 0.0], 2).unwrap();
        assert_eq!(results.labels, vec![1, 2]);
        assert_eq!(results.distances, vec![3.0, 2.0]);
    }

    #[test]
    fn test_borrowed_and_boxed_base() {
        let mut base = FlatIndex::l2(1).unwrap();
        {
            let mut refine = RefineFlatIndex::new(&mut base).unwrap();
            refine.add(&[4.0, 8.0]).unwrap();
        }
        // the caller still owns the base and sees the adds
        assert_eq!(base.ntotal(), 2);

        let boxed: Box<dyn Index> = Box::new(FlatIndex::l2(1).unwrap());
        let mut refine = RefineFlatIndex::new(boxed).unwrap();
        refine.add(&[4.0, 8.0]).unwrap();
        assert_eq!(refine.search_knn(&[7.0], 1).unwrap().labels, vec![1]);
        assert_eq!(refine.into_base().ntotal(), 2);
    }

    #[test]
    fn test_reset_and_reconstruct() {
        let mut refine = RefineFlatIndex::new(CoarseIndex::new(1)).unwrap();
        refine.train(&[]).unwrap();
        refine.add(&[0.3]).unwrap();
        let mut out = [0.0];
        // reconstruction comes from the exact copy, not the snapped base
        refine.reconstruct(0, &mut out).unwrap();
        assert_eq!(out, [0.3]);

        refine.reset();
        assert_eq!(refine.ntotal(), 0);
        assert_eq!(refine.base().ntotal(), 0);
    }

    #[test]
    fn test_params_validation() {
        assert!(RefineParams::new(0.5).validate().is_err());
        assert!(RefineParams::new(f32::NAN).validate().is_err());
        let mut refine = RefineFlatIndex::new(FlatIndex::l2(1).unwrap()).unwrap();
        assert!(refine.set_k_factor(0.9).is_err());
        refine.set_k_factor(4.0).unwrap();
        assert_eq!(refine.k_factor(), 4.0);
        assert_eq!(refine.k_base(3), 12);

        let params: RefineParams = serde_json::from_str(r#"{"k_factor": 2.5}"#).unwrap();
        assert_eq!(params.k_factor, 2.5);
        let defaulted: RefineParams = serde_json::from_str("{}").unwrap();
        assert_eq!(defaulted, RefineParams::default());
    }
}
