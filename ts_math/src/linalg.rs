//! Dense linear algebra for small regression problems, backed by `faer`
//!
//! Contains:
//! - `Matrix`, a thin wrapper over `faer::Mat<f64>` with row/column accessors
//! - Square solves through LU with partial pivoting
//! - Ordinary least squares via the normal equations, retried with a ridge
//!   term when the design is rank-deficient
//! - Log-determinant of symmetric positive-definite matrices (Cholesky)

use crate::{MathError, Result};
use faer::{prelude::*, Mat, Side};

/// Reciprocal condition number below which a system is treated as singular
const SINGULAR_TOLERANCE: f64 = 1e-12;

/// Ridge strength relative to the mean diagonal of X'X
const RIDGE_SCALE: f64 = 1e-8;

/// Dense `f64` matrix
#[derive(Debug, Clone)]
pub struct Matrix {
    inner: Mat<f64>,
}

impl Matrix {
    /// Create a matrix filled with zeros
    pub fn zeros(rows: usize, cols: usize) -> Self {
        Self {
            inner: Mat::zeros(rows, cols),
        }
    }

    /// Create an identity matrix of size `n`
    pub fn identity(n: usize) -> Self {
        Self {
            inner: Mat::from_fn(n, n, |i, j| if i == j { 1.0 } else { 0.0 }),
        }
    }

    /// Build a matrix from row vectors, which must all have the same length
    pub fn from_rows(rows: &[Vec<f64>]) -> Result<Self> {
        let cols = rows.first().map(Vec::len).unwrap_or(0);
        if let Some(bad) = rows.iter().position(|r| r.len() != cols) {
            return Err(MathError::InvalidInput(format!(
                "Row {} has {} columns, expected {}",
                bad,
                rows[bad].len(),
                cols
            )));
        }

        Ok(Self {
            inner: Mat::from_fn(rows.len(), cols, |i, j| rows[i][j]),
        })
    }

    pub fn rows(&self) -> usize {
        self.inner.nrows()
    }

    pub fn cols(&self) -> usize {
        self.inner.ncols()
    }

    /// Get the element at (`row`, `col`)
    pub fn get(&self, row: usize, col: usize) -> f64 {
        self.inner.read(row, col)
    }

    /// Set the element at (`row`, `col`)
    pub fn set(&mut self, row: usize, col: usize, value: f64) {
        self.inner.write(row, col, value);
    }

    /// Copy one row out
    pub fn row(&self, row: usize) -> Vec<f64> {
        (0..self.cols()).map(|c| self.get(row, c)).collect()
    }

    /// Copy one column out
    pub fn column(&self, col: usize) -> Vec<f64> {
        (0..self.rows()).map(|r| self.get(r, col)).collect()
    }

    /// True if every element is finite
    pub fn is_finite(&self) -> bool {
        (0..self.rows()).all(|r| (0..self.cols()).all(|c| self.get(r, c).is_finite()))
    }

    /// Matrix product `self * other`
    pub fn mul(&self, other: &Matrix) -> Result<Matrix> {
        if self.cols() != other.rows() {
            return Err(MathError::InvalidInput(format!(
                "Cannot multiply {}x{} by {}x{}",
                self.rows(),
                self.cols(),
                other.rows(),
                other.cols()
            )));
        }
        Ok(Matrix {
            inner: self.inner.as_ref() * other.inner.as_ref(),
        })
    }

    /// Product `self' * other`
    pub fn transpose_mul(&self, other: &Matrix) -> Result<Matrix> {
        if self.rows() != other.rows() {
            return Err(MathError::InvalidInput(format!(
                "Cannot multiply transpose of {}x{} by {}x{}",
                self.rows(),
                self.cols(),
                other.rows(),
                other.cols()
            )));
        }
        Ok(Matrix {
            inner: self.inner.transpose() * other.inner.as_ref(),
        })
    }

    /// Element-wise difference `self - other`
    pub fn sub(&self, other: &Matrix) -> Result<Matrix> {
        if self.rows() != other.rows() || self.cols() != other.cols() {
            return Err(MathError::InvalidInput(format!(
                "Cannot subtract {}x{} from {}x{}",
                other.rows(),
                other.cols(),
                self.rows(),
                self.cols()
            )));
        }
        Ok(Matrix {
            inner: Mat::from_fn(self.rows(), self.cols(), |i, j| {
                self.get(i, j) - other.get(i, j)
            }),
        })
    }

    /// Scale every element by `factor`
    pub fn scale(&self, factor: f64) -> Matrix {
        Matrix {
            inner: Mat::from_fn(self.rows(), self.cols(), |i, j| self.get(i, j) * factor),
        }
    }
}

impl From<Mat<f64>> for Matrix {
    fn from(inner: Mat<f64>) -> Self {
        Self { inner }
    }
}

/// Solve `a * x = b` for square `a` with a partial-pivot LU factorisation.
///
/// Systems whose reciprocal condition number falls below the singular
/// tolerance are rejected with `CalculationError`.
pub fn solve(a: &Matrix, b: &Matrix) -> Result<Matrix> {
    let n = a.rows();
    if a.cols() != n || b.rows() != n {
        return Err(MathError::InvalidInput(format!(
            "Cannot solve {}x{} system against {}x{} right-hand side",
            a.rows(),
            a.cols(),
            b.rows(),
            b.cols()
        )));
    }
    if n == 0 || !a.is_finite() || !b.is_finite() {
        return Err(MathError::CalculationError(
            "System matrix is empty or non-finite".to_string(),
        ));
    }

    let singular_values = a.inner.singular_values();
    let largest = singular_values.iter().copied().fold(0.0_f64, f64::max);
    let smallest = singular_values.iter().copied().fold(f64::INFINITY, f64::min);
    if largest == 0.0 || smallest <= largest * SINGULAR_TOLERANCE * n as f64 {
        return Err(MathError::CalculationError(format!(
            "Matrix is singular (singular values span {:e} to {:e})",
            smallest, largest
        )));
    }

    let lu = a.inner.partial_piv_lu();
    let x = Matrix::from(lu.solve(&b.inner));
    if !x.is_finite() {
        return Err(MathError::CalculationError(
            "LU solve produced non-finite values".to_string(),
        ));
    }
    Ok(x)
}

/// Result of a least squares fit of `targets ≈ design * coefficients`
#[derive(Debug, Clone)]
pub struct LeastSquaresFit {
    /// One column of coefficients per target column (`design.cols() x targets.cols()`)
    pub coefficients: Matrix,
    /// Residuals, same shape as the targets
    pub residuals: Matrix,
    /// Ridge term added to the normal equations, if the design was rank-deficient
    pub ridge: Option<f64>,
}

impl LeastSquaresFit {
    /// True if the fit needed a ridge term
    pub fn is_regularized(&self) -> bool {
        self.ridge.is_some()
    }

    /// Maximum-likelihood residual covariance `E'E / n`
    pub fn residual_covariance(&self) -> Result<Matrix> {
        let n = self.residuals.rows();
        if n == 0 {
            return Err(MathError::InsufficientData(
                "No residuals to estimate a covariance from".to_string(),
            ));
        }
        Ok(self
            .residuals
            .transpose_mul(&self.residuals)?
            .scale(1.0 / n as f64))
    }
}

/// Ordinary least squares through the normal equations.
///
/// When `X'X` is singular the system is solved once more with a small ridge
/// term on the diagonal; the returned fit records the ridge so callers can
/// reject or report it.
pub fn least_squares(design: &Matrix, targets: &Matrix) -> Result<LeastSquaresFit> {
    if design.rows() != targets.rows() {
        return Err(MathError::InvalidInput(format!(
            "Design has {} rows but targets have {}",
            design.rows(),
            targets.rows()
        )));
    }
    if design.rows() == 0 || design.cols() == 0 {
        return Err(MathError::InsufficientData(
            "Least squares needs at least one row and one regressor".to_string(),
        ));
    }
    if !design.is_finite() || !targets.is_finite() {
        return Err(MathError::InvalidInput(
            "Least squares inputs contain non-finite values".to_string(),
        ));
    }

    let xtx = design.transpose_mul(design)?;
    let xty = design.transpose_mul(targets)?;

    let (coefficients, ridge) = match solve(&xtx, &xty) {
        Ok(coefficients) => (coefficients, None),
        Err(MathError::CalculationError(_)) => {
            let k = xtx.rows();
            let trace: f64 = (0..k).map(|i| xtx.get(i, i)).sum();
            let lambda = RIDGE_SCALE * (trace / k as f64).max(1.0);
            let mut regularized = xtx.clone();
            for i in 0..k {
                regularized.set(i, i, regularized.get(i, i) + lambda);
            }
            (solve(&regularized, &xty)?, Some(lambda))
        }
        Err(e) => return Err(e),
    };

    let fitted = design.mul(&coefficients)?;
    let residuals = targets.sub(&fitted)?;

    Ok(LeastSquaresFit {
        coefficients,
        residuals,
        ridge,
    })
}

/// Natural log of the determinant of a symmetric positive-definite matrix.
///
/// Returns `None` when the Cholesky factorisation breaks down.
pub fn log_determinant_spd(m: &Matrix) -> Option<f64> {
    let n = m.rows();
    if m.cols() != n || n == 0 || !m.is_finite() {
        return None;
    }

    let l = m.inner.cholesky(Side::Lower).ok()?.compute_l();
    let mut log_det = 0.0;
    for j in 0..n {
        let d = l.read(j, j);
        if d <= 0.0 || !d.is_finite() {
            return None;
        }
        log_det += 2.0 * d.ln();
    }

    log_det.is_finite().then_some(log_det)
}
