//! Row-major flat vector storage

use crate::error::{FlatKnnError, Result};
use crate::index::{Label, NO_LABEL};

/// Number of `d`-dimensional rows in `x`, or an error if `x` is ragged.
pub fn row_count(x: &[f32], d: usize) -> Result<usize> {
    if d == 0 {
        return Err(FlatKnnError::InvalidDimension);
    }
    if x.len() % d != 0 {
        return Err(FlatKnnError::DimensionMismatch {
            expected: d,
            actual: x.len(),
        });
    }
    Ok(x.len() / d)
}

/// Outcome of a compaction: how many rows went away and where the rest moved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Compaction {
    /// Number of rows removed.
    pub removed: usize,
    /// `old_to_new[i]` is the new label of old row `i`, or `NO_LABEL` if it was removed.
    pub old_to_new: Vec<Label>,
}

impl Compaction {
    /// The label that old label `old` maps to, if it survived.
    pub fn new_label(&self, old: Label) -> Option<Label> {
        usize::try_from(old)
            .ok()
            .and_then(|i| self.old_to_new.get(i).copied())
            .filter(|&l| l != NO_LABEL)
    }
}

/// Contiguous storage of `len() * dimension()` floats. Row `i` has label `i`.
#[derive(Debug, Clone)]
pub struct FlatStorage {
    d: usize,
    data: Vec<f32>,
}

impl FlatStorage {
    /// Create empty storage for `d`-dimensional rows.
    pub fn new(d: usize) -> Result<Self> {
        if d == 0 {
            return Err(FlatKnnError::InvalidDimension);
        }
        Ok(Self { d, data: Vec::new() })
    }

    pub fn dimension(&self) -> usize {
        self.d
    }

    /// Number of stored rows.
    pub fn len(&self) -> usize {
        self.data.len() / self.d
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// The whole buffer, row-major.
    pub fn as_slice(&self) -> &[f32] {
        &self.data
    }

    /// Append the rows of `x`. Returns the label of the first appended row.
    pub fn append(&mut self, x: &[f32]) -> Result<usize> {
        row_count(x, self.d)?;
        let first = self.len();
        self.data.extend_from_slice(x);
        Ok(first)
    }

    /// Row `i`, if stored.
    pub fn row(&self, i: usize) -> Option<&[f32]> {
        self.rows(i, 1)
    }

    /// Rows `[i0, i0 + n)` as one contiguous slice, if all are stored.
    /// Ranges whose offsets overflow are treated as out of range.
    pub fn rows(&self, i0: usize, n: usize) -> Option<&[f32]> {
        let start = i0.checked_mul(self.d)?;
        let end = i0.checked_add(n)?.checked_mul(self.d)?;
        self.data.get(start..end)
    }

    pub fn clear(&mut self) {
        self.data.clear();
    }

    /// Drop every row for which `remove` returns true, shifting survivors
    /// left so they stay contiguous and keep their relative order.
    pub fn compact<F>(&mut self, mut remove: F) -> Compaction
    where
        F: FnMut(usize) -> bool,
    {
        let d = self.d;
        let n = self.len();
        let mut old_to_new = Vec::with_capacity(n);
        let mut kept = 0;
        for i in 0..n {
            if remove(i) {
                old_to_new.push(NO_LABEL);
                continue;
            }
            if i > kept {
                self.data.copy_within(i * d..(i + 1) * d, kept * d);
            }
            old_to_new.push(kept as Label);
            kept += 1;
        }
        self.data.truncate(kept * d);
        Compaction {
            removed: n - kept,
            old_to_new,
        }
    }
}
