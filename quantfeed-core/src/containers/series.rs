//! Labeled 1-D sequence.

use serde::Serialize;

/// Values with one label each. `None` is "no value".
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Series<L> {
    index: Vec<L>,
    values: Vec<Option<f64>>,
}

impl<L> Series<L> {
    /// # Panics
    /// If `index` and `values` differ in length.
    pub fn new(index: Vec<L>, values: Vec<Option<f64>>) -> Self {
        assert_eq!(index.len(), values.len(), "series index/values length mismatch");
        Self { index, values }
    }

    pub fn index(&self) -> &[L] {
        &self.index
    }

    pub fn values(&self) -> &[Option<f64>] {
        &self.values
    }

    /// Same values under new labels.
    ///
    /// # Panics
    /// If `index` has a different length.
    pub fn relabel<M>(self, index: Vec<M>) -> Series<M> {
        Series::new(index, self.values)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Value at a position.
    pub fn get(&self, pos: usize) -> Option<f64> {
        self.values.get(pos).copied().flatten()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&L, Option<f64>)> {
        self.index.iter().zip(self.values.iter().copied())
    }
}

impl<L: PartialEq> Series<L> {
    /// Value for the first entry carrying `label`.
    pub fn get_by(&self, label: &L) -> Option<f64> {
        self.index
            .iter()
            .position(|l| l == label)
            .and_then(|pos| self.get(pos))
    }
}
