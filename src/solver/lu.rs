//! LU decomposition with partial pivoting.
//!
//! For an `m x n` matrix `A` with `m >= n` the decomposition is an `m x n`
//! unit lower triangular `L`, an `n x n` upper triangular `U` and a row
//! permutation `piv` such that `A[piv, :] = L * U`.
//!
//! The factorization itself never fails. A singular matrix is reported when
//! [`LuDecomposition::solve`] is called.

use crate::error::{Result, SimError};

use super::matrix::DenseMatrix;

/// LU factors of a dense matrix, packed into a single array.
#[derive(Debug, Clone)]
pub struct LuDecomposition {
    lu: DenseMatrix,
    m: usize,
    n: usize,
    piv: Vec<usize>,
    pivot_sign: i32,
}

impl LuDecomposition {
    /// Factor `a`, which must have at least as many rows as columns.
    pub fn new(a: &DenseMatrix) -> Result<Self> {
        let m = a.rows();
        let n = a.cols();
        if m < n {
            return Err(SimError::DimensionMismatch {
                expected: n,
                actual: m,
            });
        }

        let mut lu = a.clone();
        let mut piv: Vec<usize> = (0..m).collect();
        let mut pivot_sign = 1;

        for k in 0..n {
            // Find pivot
            let mut p = k;
            let mut max_val = lu.get(k, k).abs();
            for i in (k + 1)..m {
                let val = lu.get(i, k).abs();
                if val > max_val {
                    max_val = val;
                    p = i;
                }
            }

            // Swap rows if needed
            if p != k {
                lu.swap_rows(p, k);
                piv.swap(p, k);
                pivot_sign = -pivot_sign;
            }

            // Eliminate
            let pivot = lu.get(k, k);
            if pivot != 0.0 {
                for i in (k + 1)..m {
                    let factor = lu.get(i, k) / pivot;
                    lu.set(i, k, factor);
                    for j in (k + 1)..n {
                        lu.add(i, j, -factor * lu.get(k, j));
                    }
                }
            }
        }

        Ok(Self {
            lu,
            m,
            n,
            piv,
            pivot_sign,
        })
    }

    /// True when every diagonal entry of `U` is non-zero.
    pub fn is_nonsingular(&self) -> bool {
        (0..self.n).all(|j| self.lu.get(j, j) != 0.0)
    }

    /// Row permutation applied during pivoting.
    pub fn pivot(&self) -> &[usize] {
        &self.piv
    }

    /// Parity of the row permutation (+1 or -1).
    pub fn pivot_sign(&self) -> i32 {
        self.pivot_sign
    }

    /// Unit lower triangular factor (`m x n`).
    pub fn l(&self) -> DenseMatrix {
        let mut l = DenseMatrix::zeros(self.m, self.n);
        for i in 0..self.m {
            for j in 0..self.n {
                if i > j {
                    l.set(i, j, self.lu.get(i, j));
                } else if i == j {
                    l.set(i, j, 1.0);
                }
            }
        }
        l
    }

    /// Upper triangular factor (`n x n`).
    pub fn u(&self) -> DenseMatrix {
        let mut u = DenseMatrix::square(self.n);
        for i in 0..self.n {
            for j in i..self.n {
                u.set(i, j, self.lu.get(i, j));
            }
        }
        u
    }

    /// Determinant of a square matrix.
    pub fn determinant(&self) -> Result<f64> {
        if self.m != self.n {
            return Err(SimError::DimensionMismatch {
                expected: self.n,
                actual: self.m,
            });
        }
        let mut d = f64::from(self.pivot_sign);
        for j in 0..self.n {
            d *= self.lu.get(j, j);
        }
        Ok(d)
    }

    /// Solve `A * x = b`.
    pub fn solve(&self, b: &[f64]) -> Result<Vec<f64>> {
        if b.len() != self.m {
            return Err(SimError::DimensionMismatch {
                expected: self.m,
                actual: b.len(),
            });
        }
        if !self.is_nonsingular() {
            return Err(SimError::SingularMatrix);
        }

        let n = self.n;
        // Apply pivot permutation to b
        let mut x: Vec<f64> = self.piv.iter().map(|&p| b[p]).collect();

        // Forward substitution (L * y = Pb)
        for k in 0..n {
            for i in (k + 1)..n {
                x[i] -= x[k] * self.lu.get(i, k);
            }
        }

        // Back substitution (U * x = y)
        for k in (0..n).rev() {
            x[k] /= self.lu.get(k, k);
            for i in 0..k {
                x[i] -= x[k] * self.lu.get(i, k);
            }
        }

        x.truncate(n);
        Ok(x)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    /// Deterministic diagonally dominant test matrix.
    fn well_conditioned(n: usize, seed: u64) -> DenseMatrix {
        let mut state = seed;
        let mut next = move || {
            state = state.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
            ((state >> 33) as f64 / (1u64 << 31) as f64) - 0.5
        };
        let mut a = DenseMatrix::square(n);
        for i in 0..n {
            for j in 0..n {
                a.set(i, j, next());
            }
            a.add(i, i, n as f64);
        }
        a
    }

    #[test]
    fn test_solve_round_trip() {
        let n = 8;
        let a = well_conditioned(n, 42);
        let b: Vec<f64> = (0..n).map(|i| (i as f64) - 3.5).collect();

        let lu = LuDecomposition::new(&a).unwrap();
        let x = lu.solve(&b).unwrap();
        let ax = a.mul_vec(&x);
        for (lhs, rhs) in ax.iter().zip(&b) {
            assert!((lhs - rhs).abs() <= 1e-9 * rhs.abs().max(1.0));
        }
    }

    #[test]
    fn test_zero_row_is_singular() {
        let a = DenseMatrix::from_rows(&[
            vec![1.0, 2.0, 3.0],
            vec![0.0, 0.0, 0.0],
            vec![4.0, 5.0, 6.0],
        ]);
        let lu = LuDecomposition::new(&a).unwrap();
        assert!(!lu.is_nonsingular());
        assert!(matches!(lu.solve(&[1.0, 2.0, 3.0]), Err(SimError::SingularMatrix)));
    }

    #[test]
    fn test_pivoting_and_determinant() {
        let a = DenseMatrix::from_rows(&[vec![0.0, 1.0], vec![2.0, 3.0]]);
        let lu = LuDecomposition::new(&a).unwrap();
        assert_eq!(lu.pivot(), &[1, 0]);
        assert_eq!(lu.pivot_sign(), -1);
        assert_relative_eq!(lu.determinant().unwrap(), -2.0);
    }

    #[test]
    fn test_factors_reconstruct_permuted_matrix() {
        let a = well_conditioned(4, 7);
        let lu = LuDecomposition::new(&a).unwrap();
        let (l, u) = (lu.l(), lu.u());
        for (row, &p) in lu.pivot().iter().enumerate() {
            for col in 0..4 {
                let v: f64 = (0..4).map(|k| l.get(row, k) * u.get(k, col)).sum();
                assert_relative_eq!(v, a.get(p, col), epsilon = 1e-12);
            }
        }
    }

    #[test]
    fn test_rejects_wide_matrix_and_bad_rhs() {
        assert!(LuDecomposition::new(&DenseMatrix::zeros(2, 3)).is_err());
        let lu = LuDecomposition::new(&DenseMatrix::identity(2)).unwrap();
        assert!(matches!(lu.solve(&[1.0]), Err(SimError::DimensionMismatch { .. })));
    }
}
