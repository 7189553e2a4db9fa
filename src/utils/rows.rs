//! Contiguous row-major storage for per-row distance loops.

use ndarray::{Array2, ShapeError};

/// Owned row-major copy of a matrix; every row is a plain slice.
#[derive(Debug, Clone, PartialEq)]
pub struct DenseRows {
    data: Vec<f64>,
    n_rows: usize,
    n_cols: usize,
}

impl DenseRows {
    /// Copy `x` in logical (row-major) order, whatever its memory layout.
    pub fn from_array(x: &Array2<f64>) -> Self {
        Self {
            data: x.iter().copied().collect(),
            n_rows: x.nrows(),
            n_cols: x.ncols(),
        }
    }

    pub fn zeros(n_rows: usize, n_cols: usize) -> Self {
        Self {
            data: vec![0.0; n_rows * n_cols],
            n_rows,
            n_cols,
        }
    }

    #[inline]
    pub fn row(&self, i: usize) -> &[f64] {
        &self.data[i * self.n_cols..(i + 1) * self.n_cols]
    }

    #[inline]
    pub fn row_mut(&mut self, i: usize) -> &mut [f64] {
        &mut self.data[i * self.n_cols..(i + 1) * self.n_cols]
    }

    pub fn n_rows(&self) -> usize {
        self.n_rows
    }

    pub fn n_cols(&self) -> usize {
        self.n_cols
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.data
    }

    pub fn into_array(self) -> Result<Array2<f64>, ShapeError> {
        Array2::from_shape_vec((self.n_rows, self.n_cols), self.data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_rows_follow_logical_order() {
        let x = array![[1.0, 2.0], [3.0, 4.0]];
        let transposed = x.t().to_owned();
        let rows = DenseRows::from_array(&transposed);
        assert_eq!(rows.row(0), &[1.0, 3.0]);
        assert_eq!(rows.row(1), &[2.0, 4.0]);
    }

    #[test]
    fn test_back_to_array() {
        let mut rows = DenseRows::zeros(2, 3);
        rows.row_mut(1)[2] = 5.0;
        let x = rows.into_array().unwrap();
        assert_eq!(x[[1, 2]], 5.0);
    }
}
