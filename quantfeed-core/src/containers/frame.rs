//! Labeled 2-D table.

use serde::Serialize;

use super::series::Series;

/// Row-major table with labeled rows and columns. `None` is "no value".
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Frame<R, C> {
    index: Vec<R>,
    columns: Vec<C>,
    values: Vec<Option<f64>>,
}

impl<R, C> Frame<R, C> {
    /// # Panics
    /// If `values` does not hold `index.len() * columns.len()` entries.
    pub fn new(index: Vec<R>, columns: Vec<C>, values: Vec<Option<f64>>) -> Self {
        assert_eq!(
            values.len(),
            index.len() * columns.len(),
            "frame values do not match its shape"
        );
        Self {
            index,
            columns,
            values,
        }
    }

    pub fn index(&self) -> &[R] {
        &self.index
    }

    pub fn columns(&self) -> &[C] {
        &self.columns
    }

    /// (rows, columns)
    pub fn shape(&self) -> (usize, usize) {
        (self.index.len(), self.columns.len())
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Same values under new column labels.
    pub fn relabel_columns<D>(self, columns: Vec<D>) -> Frame<R, D> {
        Frame::new(self.index, columns, self.values)
    }

    pub fn get(&self, row: usize, column: usize) -> Option<f64> {
        if row >= self.index.len() || column >= self.columns.len() {
            return None;
        }
        self.values[row * self.columns.len() + column]
    }
}

impl<R: Clone, C> Frame<R, C> {
    /// One column as a series over the row labels.
    pub fn column(&self, column: usize) -> Option<Series<R>> {
        if column >= self.columns.len() {
            return None;
        }
        let values = (0..self.index.len()).map(|r| self.get(r, column)).collect();
        Some(Series::new(self.index.clone(), values))
    }
}

impl<R, C: Clone> Frame<R, C> {
    /// One row as a series over the column labels.
    pub fn row(&self, row: usize) -> Option<Series<C>> {
        if row >= self.index.len() {
            return None;
        }
        let width = self.columns.len();
        let values = self.values[row * width..(row + 1) * width].to_vec();
        Some(Series::new(self.columns.clone(), values))
    }
}

impl<R: Clone, C: PartialEq> Frame<R, C> {
    /// First column carrying `label`.
    pub fn column_by(&self, label: &C) -> Option<Series<R>> {
        self.columns
            .iter()
            .position(|c| c == label)
            .and_then(|pos| self.column(pos))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rows_and_columns() {
        let frame = Frame::new(
            vec![1, 2],
            vec!["a", "b", "c"],
            vec![Some(1.0), Some(2.0), Some(3.0), Some(4.0), None, Some(6.0)],
        );
        assert_eq!(frame.shape(), (2, 3));
        assert_eq!(frame.get(1, 2), Some(6.0));
        assert_eq!(frame.get(1, 1), None);
        assert_eq!(frame.get(5, 0), None);
        assert_eq!(frame.column_by(&"b").unwrap().values(), &[Some(2.0), None]);
        assert_eq!(frame.row(0).unwrap().values(), &[Some(1.0), Some(2.0), Some(3.0)]);
    }

    #[test]
    fn zero_rows_keep_column_labels() {
        let frame: Frame<i32, &str> = Frame::new(vec![], vec!["a", "b"], vec![]);
        assert!(frame.is_empty());
        assert_eq!(frame.columns(), &["a", "b"]);
        assert!(frame.column(0).unwrap().is_empty());
    }
}
