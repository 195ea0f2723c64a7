//! Bounded top-k selection over a caller-owned output row.
//!
//! The heap lives directly in the `distances`/`labels` slices of one query
//! row, so a search writes its final answer without intermediate buffers.
//! The root always holds the worst candidate kept so far: the largest
//! distance for L2, the smallest inner product for inner-product search.

use crate::distance::DistanceMetric;
use crate::index::{Label, NO_LABEL};

/// A fixed-capacity heap of `(distance, label)` pairs ordered by a metric.
pub struct TopK<'a> {
    metric: DistanceMetric,
    distances: &'a mut [f32],
    labels: &'a mut [Label],
    len: usize,
}

impl<'a> TopK<'a> {
    /// Start an empty heap whose capacity is the row length.
    pub fn new(metric: DistanceMetric, distances: &'a mut [f32], labels: &'a mut [Label]) -> Self {
        debug_assert_eq!(distances.len(), labels.len());
        let worst = metric.worst();
        distances.fill(worst);
        labels.fill(NO_LABEL);
        Self {
            metric,
            distances,
            labels,
            len: 0,
        }
    }

    /// Heapify a heap from an initial batch of candidates.
    pub fn from_candidates(
        metric: DistanceMetric,
        distances: &'a mut [f32],
        labels: &'a mut [Label],
        cand_distances: &[f32],
        cand_labels: &[Label],
    ) -> Self {
        let mut heap = Self::new(metric, distances, labels);
        heap.extend(cand_distances, cand_labels);
        heap
    }

    pub fn capacity(&self) -> usize {
        self.labels.len()
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Distance a new candidate must beat to enter a full heap.
    #[inline]
    pub fn threshold(&self) -> f32 {
        if self.len < self.capacity() {
            self.metric.worst()
        } else {
            self.distances[0]
        }
    }

    /// Offer one candidate. `NO_LABEL` entries are ignored.
    #[inline]
    pub fn push(&mut self, distance: f32, label: Label) {
        if label == NO_LABEL {
            return;
        }
        let k = self.capacity();
        if self.len < k {
            let i = self.len;
            self.distances[i] = distance;
            self.labels[i] = label;
            self.len += 1;
            self.sift_up(i);
        } else if k > 0 && self.ranks_after(self.distances[0], self.labels[0], distance, label) {
            self.distances[0] = distance;
            self.labels[0] = label;
            self.sift_down(0, k);
        }
    }

    /// Offer a batch of candidates, pairwise from the two slices.
    pub fn extend(&mut self, distances: &[f32], labels: &[Label]) {
        debug_assert_eq!(distances.len(), labels.len());
        for (&d, &l) in distances.iter().zip(labels.iter()) {
            self.push(d, l);
        }
    }

    /// Sort the kept candidates best-first and pad unused slots with
    /// `NO_LABEL` / `+inf`. Returns the number of valid entries.
    pub fn finalize(mut self) -> usize {
        for end in (1..self.len).rev() {
            self.swap(0, end);
            self.sift_down(0, end);
        }
        let len = self.len;
        self.distances[len..].fill(f32::INFINITY);
        self.labels[len..].fill(NO_LABEL);
        len
    }

    /// Whether `(da, la)` ranks behind `(db, lb)`. Ties go to the smaller label.
    #[inline]
    fn ranks_after(&self, da: f32, la: Label, db: f32, lb: Label) -> bool {
        self.metric.is_better(db, da) || (da == db && la > lb)
    }

    #[inline]
    fn worse(&self, i: usize, j: usize) -> bool {
        self.ranks_after(
            self.distances[i],
            self.labels[i],
            self.distances[j],
            self.labels[j],
        )
    }

    #[inline]
    fn swap(&mut self, i: usize, j: usize) {
        self.distances.swap(i, j);
        self.labels.swap(i, j);
    }

    fn sift_up(&mut self, mut i: usize) {
        while i > 0 {
            let parent = (i - 1) / 2;
            if self.worse(i, parent) {
                self.swap(i, parent);
                i = parent;
            } else {
                break;
            }
        }
    }

    fn sift_down(&mut self, mut i: usize, n: usize) {
        loop {
            let left = 2 * i + 1;
            if left >= n {
                break;
            }
            let right = left + 1;
            let mut child = left;
            if right < n && self.worse(right, left) {
                child = right;
            }
            if self.worse(child, i) {
                self.swap(i, child);
                i = child;
            } else {
                break;
            }
        }
    }
}
