//! Distance metrics for vector similarity

use serde::{Deserialize, Serialize};

/// Distance metrics supported by every index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum DistanceMetric {
    /// Squared Euclidean distance (smaller is better)
    #[default]
    L2,
    /// Inner product (larger is better)
    InnerProduct,
}

impl DistanceMetric {
    /// Compute the distance between two rows of equal length using this metric.
    #[inline]
    pub fn distance(&self, a: &[f32], b: &[f32]) -> f32 {
        match self {
            DistanceMetric::L2 => l2_sqr(a, b),
            DistanceMetric::InnerProduct => inner_product(a, b),
        }
    }

    /// Whether distance `a` ranks strictly ahead of distance `b`.
    #[inline]
    pub fn is_better(&self, a: f32, b: f32) -> bool {
        match self {
            DistanceMetric::L2 => a < b,
            DistanceMetric::InnerProduct => a > b,
        }
    }

    /// The value no real candidate can lose to.
    #[inline]
    pub fn worst(&self) -> f32 {
        match self {
            DistanceMetric::L2 => f32::INFINITY,
            DistanceMetric::InnerProduct => f32::NEG_INFINITY,
        }
    }

    /// Range-search predicate: `dist <= radius` for L2, `dist >= radius` for inner product.
    #[inline]
    pub fn within_radius(&self, dist: f32, radius: f32) -> bool {
        match self {
            DistanceMetric::L2 => dist <= radius,
            DistanceMetric::InnerProduct => dist >= radius,
        }
    }
}

/// Squared Euclidean distance between two rows.
#[inline]
pub fn l2_sqr(a: &[f32], b: &[f32]) -> f32 {
    debug_assert_eq!(a.len(), b.len());
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| {
            let d = x - y;
            d * d
        })
        .sum()
}

/// Inner product of two rows.
#[inline]
pub fn inner_product(a: &[f32], b: &[f32]) -> f32 {
    debug_assert_eq!(a.len(), b.len());
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}
