//! LU decomposition in arbitrary-precision decimal arithmetic.
//!
//! Mirrors [`LuDecomposition`](super::LuDecomposition) for systems whose
//! conditioning makes double precision unreliable. Every product and quotient
//! is rounded to [`PRECISION_DIGITS`] significant digits, and a diagonal entry
//! smaller than [`SINGULAR_TOLERANCE`] counts as zero.

use bigdecimal::BigDecimal;
use num_traits::{FromPrimitive, ToPrimitive, Zero};

use crate::error::{Result, SimError};

use super::matrix::DenseMatrix;

/// Significant digits kept by every arithmetic operation.
pub const PRECISION_DIGITS: u64 = 20;

/// Magnitude below which a pivot is treated as zero.
pub const SINGULAR_TOLERANCE: f64 = 1e-30;

/// High-precision LU factors with partial pivoting.
#[derive(Debug, Clone)]
pub struct BigLuDecomposition {
    lu: Vec<Vec<BigDecimal>>,
    m: usize,
    n: usize,
    piv: Vec<usize>,
    pivot_sign: i32,
    tolerance: BigDecimal,
}

fn to_big(value: f64) -> Result<BigDecimal> {
    BigDecimal::from_f64(value)
        .map(|v| v.with_prec(PRECISION_DIGITS))
        .ok_or_else(|| SimError::invalid_param(format!("cannot represent {value} as a decimal")))
}

fn to_f64(value: &BigDecimal) -> Result<f64> {
    value
        .to_f64()
        .ok_or_else(|| SimError::invalid_param(format!("decimal {value} does not fit into f64")))
}

impl BigLuDecomposition {
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

        let mut lu = (0..m)
            .map(|i| a.row(i).iter().map(|&v| to_big(v)).collect::<Result<Vec<_>>>())
            .collect::<Result<Vec<_>>>()?;
        let mut piv: Vec<usize> = (0..m).collect();
        let mut pivot_sign = 1;

        for k in 0..n {
            let mut p = k;
            for i in (k + 1)..m {
                if lu[i][k].abs() > lu[p][k].abs() {
                    p = i;
                }
            }

            if p != k {
                lu.swap(p, k);
                piv.swap(p, k);
                pivot_sign = -pivot_sign;
            }

            if lu[k][k].is_zero() {
                continue;
            }
            let pivot_row = lu[k].clone();
            for row in lu.iter_mut().skip(k + 1) {
                let factor = (&row[k] / &pivot_row[k]).with_prec(PRECISION_DIGITS);
                for j in (k + 1)..n {
                    let delta = (&factor * &pivot_row[j]).with_prec(PRECISION_DIGITS);
                    row[j] = (&row[j] - &delta).with_prec(PRECISION_DIGITS);
                }
                row[k] = factor;
            }
        }

        Ok(Self {
            lu,
            m,
            n,
            piv,
            pivot_sign,
            tolerance: to_big(SINGULAR_TOLERANCE)?,
        })
    }

    /// True when every diagonal entry of `U` exceeds the singular tolerance.
    pub fn is_nonsingular(&self) -> bool {
        (0..self.n).all(|j| self.lu[j][j].abs() >= self.tolerance)
    }

    /// Row permutation applied during pivoting.
    pub fn pivot(&self) -> &[usize] {
        &self.piv
    }

    /// Parity of the row permutation (+1 or -1).
    pub fn pivot_sign(&self) -> i32 {
        self.pivot_sign
    }

    /// Determinant of a square matrix, rounded to f64.
    pub fn determinant(&self) -> Result<f64> {
        if self.m != self.n {
            return Err(SimError::DimensionMismatch {
                expected: self.n,
                actual: self.m,
            });
        }
        let mut d = BigDecimal::from(self.pivot_sign);
        for j in 0..self.n {
            d = (&d * &self.lu[j][j]).with_prec(PRECISION_DIGITS);
        }
        to_f64(&d)
    }

    /// Solve `A * x = b` and round the result back to f64.
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
        let mut x = self
            .piv
            .iter()
            .map(|&p| to_big(b[p]))
            .collect::<Result<Vec<_>>>()?;

        for k in 0..n {
            for i in (k + 1)..n {
                let delta = (&x[k] * &self.lu[i][k]).with_prec(PRECISION_DIGITS);
                x[i] = (&x[i] - &delta).with_prec(PRECISION_DIGITS);
            }
        }

        for k in (0..n).rev() {
            x[k] = (&x[k] / &self.lu[k][k]).with_prec(PRECISION_DIGITS);
            for i in 0..k {
                let delta = (&x[k] * &self.lu[i][k]).with_prec(PRECISION_DIGITS);
                x[i] = (&x[i] - &delta).with_prec(PRECISION_DIGITS);
            }
        }

        x.iter().take(n).map(to_f64).collect()
    }
}
