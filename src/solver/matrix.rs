//! Dense row-major matrix used for MNA assembly and factorization.

use std::fmt;

/// Dense `rows x cols` matrix stored row-major.
#[derive(Debug, Clone, PartialEq)]
pub struct DenseMatrix {
    data: Vec<f64>,
    rows: usize,
    cols: usize,
}

impl DenseMatrix {
    /// Create a zero matrix.
    pub fn zeros(rows: usize, cols: usize) -> Self {
        Self {
            data: vec![0.0; rows * cols],
            rows,
            cols,
        }
    }

    /// Create a zero square matrix.
    pub fn square(size: usize) -> Self {
        Self::zeros(size, size)
    }

    /// Create an identity matrix.
    pub fn identity(size: usize) -> Self {
        let mut m = Self::square(size);
        for i in 0..size {
            m.set(i, i, 1.0);
        }
        m
    }

    /// Build from nested rows. Short rows are zero padded.
    pub fn from_rows(rows: &[Vec<f64>]) -> Self {
        let cols = rows.iter().map(Vec::len).max().unwrap_or(0);
        let mut m = Self::zeros(rows.len(), cols);
        for (i, row) in rows.iter().enumerate() {
            for (j, &v) in row.iter().enumerate() {
                m.set(i, j, v);
            }
        }
        m
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn is_square(&self) -> bool {
        self.rows == self.cols
    }

    /// Reset all entries to zero.
    pub fn clear(&mut self) {
        self.data.fill(0.0);
    }

    /// Get matrix element at (row, col).
    pub fn get(&self, row: usize, col: usize) -> f64 {
        self.data[row * self.cols + col]
    }

    /// Set matrix element at (row, col).
    pub fn set(&mut self, row: usize, col: usize, value: f64) {
        self.data[row * self.cols + col] = value;
    }

    /// Add to matrix element at (row, col).
    pub fn add(&mut self, row: usize, col: usize, value: f64) {
        self.data[row * self.cols + col] += value;
    }

    /// Borrow one row.
    pub fn row(&self, row: usize) -> &[f64] {
        &self.data[row * self.cols..(row + 1) * self.cols]
    }

    /// Swap two rows in place.
    pub fn swap_rows(&mut self, a: usize, b: usize) {
        if a == b {
            return;
        }
        for j in 0..self.cols {
            self.data.swap(a * self.cols + j, b * self.cols + j);
        }
    }

    /// Stamp a conductance between two matrix indices.
    /// For a conductance G between nodes n1 and n2:
    ///   A[n1,n1] += G
    ///   A[n2,n2] += G
    ///   A[n1,n2] -= G
    ///   A[n2,n1] -= G
    pub fn stamp_conductance(&mut self, n1: usize, n2: usize, g: f64) {
        self.add(n1, n1, g);
        self.add(n2, n2, g);
        self.add(n1, n2, -g);
        self.add(n2, n1, -g);
    }

    /// Stamp the incidence pattern of a branch variable `br` between two nodes.
    /// V[n+] - V[n-] appears in row `br`, the branch current in the KCL rows.
    pub fn stamp_branch(&mut self, n_pos: usize, n_neg: usize, br: usize) {
        self.add(br, n_pos, 1.0);
        self.add(br, n_neg, -1.0);
        self.add(n_pos, br, 1.0);
        self.add(n_neg, br, -1.0);
    }

    /// Matrix-vector product.
    pub fn mul_vec(&self, x: &[f64]) -> Vec<f64> {
        (0..self.rows)
            .map(|i| self.row(i).iter().zip(x).map(|(a, b)| a * b).sum())
            .collect()
    }

    /// Copy of the sub-matrix that drops row and column 0 (the ground reference).
    pub fn without_ground(&self) -> DenseMatrix {
        let n = self.rows.saturating_sub(1);
        let m = self.cols.saturating_sub(1);
        let mut reduced = DenseMatrix::zeros(n, m);
        for i in 0..n {
            for j in 0..m {
                reduced.set(i, j, self.get(i + 1, j + 1));
            }
        }
        reduced
    }
}

impl fmt::Display for DenseMatrix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for i in 0..self.rows {
            let cells: Vec<String> = self.row(i).iter().map(|v| format!("{v:>12.4e}")).collect();
            writeln!(f, "[{}]", cells.join(" "))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stamp_conductance_symmetry() {
        let mut m = DenseMatrix::square(3);
        m.stamp_conductance(1, 2, 0.5);
        assert_eq!(m.get(1, 1), 0.5);
        assert_eq!(m.get(2, 2), 0.5);
        assert_eq!(m.get(1, 2), -0.5);
        assert_eq!(m.get(2, 1), -0.5);
    }

    #[test]
    fn test_without_ground() {
        let m = DenseMatrix::from_rows(&[
            vec![9.0, 9.0, 9.0],
            vec![9.0, 1.0, 2.0],
            vec![9.0, 3.0, 4.0],
        ]);
        let r = m.without_ground();
        assert_eq!(r.rows(), 2);
        assert_eq!(r.row(0), &[1.0, 2.0]);
        assert_eq!(r.row(1), &[3.0, 4.0]);
    }

    #[test]
    fn test_mul_vec() {
        let m = DenseMatrix::from_rows(&[vec![1.0, 2.0], vec![3.0, 4.0]]);
        assert_eq!(m.mul_vec(&[1.0, 1.0]), vec![3.0, 7.0]);
    }
}
