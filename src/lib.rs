//! # flatknn
//!
//! Exact nearest-neighbor search over dense `f32` vectors by brute force.
//!
//! This library provides:
//! - A flat index scanning every stored vector (squared L2 or inner product)
//! - A shifted flat index with a per-vector distance bias
//! - A refine stage re-ranking an approximate index's candidates exactly
//! - A sorted-axis index for scalars: binary search plus outward expansion
//!
//! ## Example
//!
//! ```rust
//! use flatknn::{FlatIndex, Index};
//!
//! // Two 3-dimensional vectors, row-major
//! let mut index = FlatIndex::l2(3).unwrap();
//! index.add(&[1.0, 2.0, 3.0, 0.0, 0.0, 1.0]).unwrap();
//!
//! // Search for the 2 nearest neighbors
//! let results = index.search_knn(&[1.1, 2.1, 3.1], 2).unwrap();
//! assert_eq!(results.labels, vec![0, 1]);
//! ```

pub mod distance;
pub mod error;
pub mod flat_index;
pub mod index;
pub mod knn;
pub mod range_result;
pub mod refine;
pub mod selector;
pub mod shifted;
pub mod sorted_axis;
pub mod storage;
pub mod top_k;

pub use distance::DistanceMetric;
pub use error::{FlatKnnError, Result};
pub use flat_index::FlatIndex;
pub use index::{Index, Label, SearchResults, NO_LABEL};
pub use range_result::RangeSearchResult;
pub use refine::{RefineFlatIndex, RefineParams};
pub use selector::{IdSelector, IdSelectorBatch, IdSelectorNot, IdSelectorRange};
pub use shifted::ShiftedFlatIndex;
pub use sorted_axis::{SortedAxisIndex, SortedAxisParams};
pub use storage::{Compaction, FlatStorage};
