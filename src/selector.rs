//! ID selectors used by `remove_ids`

use std::collections::HashSet;

use crate::index::Label;

/// A predicate over labels deciding which stored vectors are selected.
pub trait IdSelector {
    fn is_member(&self, label: Label) -> bool;
}

/// Selects labels in the half-open range `[imin, imax)`.
#[derive(Debug, Clone, Copy)]
pub struct IdSelectorRange {
    pub imin: Label,
    pub imax: Label,
}

impl IdSelectorRange {
    pub fn new(imin: Label, imax: Label) -> Self {
        Self { imin, imax }
    }
}

impl IdSelector for IdSelectorRange {
    fn is_member(&self, label: Label) -> bool {
        self.imin <= label && label < self.imax
    }
}

/// Selects an explicit set of labels.
#[derive(Debug, Clone, Default)]
pub struct IdSelectorBatch {
    labels: HashSet<Label>,
}

impl IdSelectorBatch {
    pub fn new(labels: impl IntoIterator<Item = Label>) -> Self {
        Self {
            labels: labels.into_iter().collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }
}

impl IdSelector for IdSelectorBatch {
    fn is_member(&self, label: Label) -> bool {
        self.labels.contains(&label)
    }
}

/// Inverts another selector.
pub struct IdSelectorNot<S>(pub S);

impl<S: IdSelector> IdSelector for IdSelectorNot<S> {
    fn is_member(&self, label: Label) -> bool {
        !self.0.is_member(label)
    }
}

impl<F> IdSelector for F
where
    F: Fn(Label) -> bool,
{
    fn is_member(&self, label: Label) -> bool {
        self(label)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_range_selector() {
        let sel = IdSelectorRange::new(2, 5);
        assert!(!sel.is_member(1));
        assert!(sel.is_member(2));
        assert!(sel.is_member(4));
        assert!(!sel.is_member(5));
    }

    #[test]
    fn test_batch_selector() {
        let sel = IdSelectorBatch::new([1, 7, 7, 9]);
        assert_eq!(sel.len(), 3);
        assert!(sel.is_member(7));
        assert!(!sel.is_member(2));
    }

    #[test]
    fn test_not_and_closure() {
        let sel = IdSelectorNot(IdSelectorRange::new(0, 3));
        assert!(!sel.is_member(2));
        assert!(sel.is_member(3));

        let even = |label: Label| label % 2 == 0;
        assert!(even.is_member(4));
        assert!(!even.is_member(5));
    }
}
