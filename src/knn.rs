//! Batch distance kernels: exhaustive k-NN, range search and subset distances.
//!
//! Every kernel splits work by query row with rayon. Each worker owns one
//! query's slice of the output buffers, so no synchronization is needed.
//! Callers validate buffer shapes; kernels only `debug_assert` them.

use rayon::prelude::*;

use crate::distance::{l2_sqr, DistanceMetric};
use crate::index::{Label, NO_LABEL};
use crate::range_result::RangeSearchResult;
use crate::top_k::TopK;

/// Exhaustive top-`k` of every query against every stored row.
pub fn knn_exhaustive(
    metric: DistanceMetric,
    queries: &[f32],
    base: &[f32],
    d: usize,
    k: usize,
    distances: &mut [f32],
    labels: &mut [Label],
) {
    scan_rows(metric, queries, base, d, k, distances, labels, |q, row, _| {
        metric.distance(q, row)
    });
}

/// Exhaustive L2 top-`k` where stored row `j` scores `l2_sqr(q, x_j) - shift[j]`.
pub fn knn_l2_with_shift(
    queries: &[f32],
    base: &[f32],
    shift: &[f32],
    d: usize,
    k: usize,
    distances: &mut [f32],
    labels: &mut [Label],
) {
    debug_assert_eq!(shift.len() * d, base.len());
    scan_rows(
        DistanceMetric::L2,
        queries,
        base,
        d,
        k,
        distances,
        labels,
        |q, row, j| l2_sqr(q, row) - shift[j],
    );
}

#[allow(clippy::too_many_arguments)]
fn scan_rows<F>(
    metric: DistanceMetric,
    queries: &[f32],
    base: &[f32],
    d: usize,
    k: usize,
    distances: &mut [f32],
    labels: &mut [Label],
    score: F,
) where
    F: Fn(&[f32], &[f32], usize) -> f32 + Sync,
{
    if k == 0 {
        return;
    }
    debug_assert_eq!(distances.len(), queries.len() / d * k);
    debug_assert_eq!(labels.len(), distances.len());

    distances
        .par_chunks_mut(k)
        .zip(labels.par_chunks_mut(k))
        .zip(queries.par_chunks(d))
        .for_each(|((dis, lab), q)| {
            let mut heap = TopK::new(metric, dis, lab);
            for (j, row) in base.chunks_exact(d).enumerate() {
                heap.push(score(q, row, j), j as Label);
            }
            heap.finalize();
        });
}

/// All stored rows satisfying the metric's radius predicate, per query.
pub fn range_search_exhaustive(
    metric: DistanceMetric,
    queries: &[f32],
    base: &[f32],
    d: usize,
    radius: f32,
) -> RangeSearchResult {
    let partials: Vec<Vec<(Label, f32)>> = queries
        .par_chunks(d)
        .map(|q| {
            base.chunks_exact(d)
                .enumerate()
                .filter_map(|(j, row)| {
                    let dist = metric.distance(q, row);
                    metric
                        .within_radius(dist, radius)
                        .then_some((j as Label, dist))
                })
                .collect()
        })
        .collect();
    RangeSearchResult::from_partials(partials)
}

/// Distances between each query and its `k` named candidates, written in place.
///
/// `labels` must lie in `[-1, ntotal)`. `NO_LABEL` slots get the metric's
/// worst value so they never rank ahead of a real candidate.
pub fn distances_by_idx(
    metric: DistanceMetric,
    queries: &[f32],
    base: &[f32],
    d: usize,
    k: usize,
    labels: &[Label],
    distances: &mut [f32],
) {
    if k == 0 {
        return;
    }
    debug_assert_eq!(labels.len(), distances.len());

    distances
        .par_chunks_mut(k)
        .zip(labels.par_chunks(k))
        .zip(queries.par_chunks(d))
        .for_each(|((dis, lab), q)| {
            for (out, &label) in dis.iter_mut().zip(lab.iter()) {
                *out = if label == NO_LABEL {
                    metric.worst()
                } else {
                    let j = label as usize;
                    metric.distance(q, &base[j * d..(j + 1) * d])
                };
            }
        });
}
