//! Range search results: a variable number of matches per query.

use crate::index::Label;

/// Per-query match sets stored contiguously.
///
/// Matches of query `i` live at `lims[i]..lims[i + 1]` in `labels` and
/// `distances`. Order within a query is unspecified.
#[derive(Debug, Clone, PartialEq)]
pub struct RangeSearchResult {
    lims: Vec<usize>,
    labels: Vec<Label>,
    distances: Vec<f32>,
}

impl RangeSearchResult {
    /// An empty result for `nq` queries.
    pub fn new(nq: usize) -> Self {
        Self {
            lims: vec![0; nq + 1],
            labels: Vec::new(),
            distances: Vec::new(),
        }
    }

    /// Concatenate per-query partial results, one `Vec` per query in order.
    pub fn from_partials(partials: Vec<Vec<(Label, f32)>>) -> Self {
        let total: usize = partials.iter().map(Vec::len).sum();
        let mut lims = Vec::with_capacity(partials.len() + 1);
        let mut labels = Vec::with_capacity(total);
        let mut distances = Vec::with_capacity(total);
        lims.push(0);
        for part in partials {
            for (label, dist) in part {
                labels.push(label);
                distances.push(dist);
            }
            lims.push(labels.len());
        }
        Self {
            lims,
            labels,
            distances,
        }
    }

    /// Number of queries.
    pub fn nq(&self) -> usize {
        self.lims.len() - 1
    }

    /// Total number of matches across all queries.
    pub fn total(&self) -> usize {
        self.labels.len()
    }

    /// Matches of query `i` as `(labels, distances)`.
    pub fn query(&self, i: usize) -> (&[Label], &[f32]) {
        let (start, end) = (self.lims[i], self.lims[i + 1]);
        (&self.labels[start..end], &self.distances[start..end])
    }

    pub fn lims(&self) -> &[usize] {
        &self.lims
    }

    pub fn labels(&self) -> &[Label] {
        &self.labels
    }

    pub fn distances(&self) -> &[f32] {
        &self.distances
    }
}
