//! Dense symmetric positive-definite solves via Cholesky factorization.

use ndarray::{Array1, Array2, s};

/// Relative pivot threshold below which a matrix is treated as singular.
const PIVOT_EPS: f64 = 1e-10;

/// Share of a column's squared norm left after projecting out earlier
/// columns, below which the column counts as aliased.
const ALIAS_EPS: f64 = 1e-9;

/// Lower-triangular factor `L` with `A = L L^T`.
#[derive(Debug, Clone)]
pub(crate) struct Cholesky {
    l: Array2<f64>,
}

impl Cholesky {
    /// Factor a square symmetric matrix.
    ///
    /// Returns `Err(k)` with the first pivot index `k` whose diagonal collapses,
    /// which identifies a column dependent on the ones before it.
    pub(crate) fn factor(a: &Array2<f64>) -> Result<Self, usize> {
        let n = a.nrows();
        debug_assert_eq!(n, a.ncols());
        let scale = a.diag().iter().fold(0.0_f64, |m, v| m.max(v.abs()));
        let mut l = Array2::<f64>::zeros((n, n));

        for i in 0..n {
            for j in 0..=i {
                let sum = l.slice(s![i, ..j]).dot(&l.slice(s![j, ..j]));
                if i == j {
                    let diag = a[[i, i]] - sum;
                    if diag <= PIVOT_EPS * scale.max(1.0) {
                        return Err(i);
                    }
                    l[[i, i]] = diag.sqrt();
                } else {
                    l[[i, j]] = (a[[i, j]] - sum) / l[[j, j]];
                }
            }
        }
        Ok(Self { l })
    }

    /// Solve `A x = b`.
    pub(crate) fn solve(&self, b: &Array1<f64>) -> Array1<f64> {
        let l = &self.l;
        let n = l.nrows();

        // Forward substitution: L y = b
        let mut y = Array1::<f64>::zeros(n);
        for i in 0..n {
            let sum = l.slice(s![i, ..i]).dot(&y.slice(s![..i]));
            y[i] = (b[i] - sum) / l[[i, i]];
        }

        // Backward substitution: L^T x = y
        let mut x = Array1::<f64>::zeros(n);
        for i in (0..n).rev() {
            let sum = l.slice(s![i + 1.., i]).dot(&x.slice(s![i + 1..]));
            x[i] = (y[i] - sum) / l[[i, i]];
        }
        x
    }

    /// Diagonal of `A^-1`.
    pub(crate) fn inverse_diagonal(&self) -> Array1<f64> {
        let n = self.l.nrows();
        (0..n)
            .map(|k| {
                let mut e = Array1::<f64>::zeros(n);
                e[k] = 1.0;
                self.solve(&e)[k]
            })
            .collect()
    }
}

/// Indices of the columns behind a Gram matrix `X^T X` that are linear
/// combinations of earlier columns.
///
/// Columns are taken in order; each is tested only against the earlier
/// columns that were themselves kept, so the first column of a dependent
/// group stays and the later ones are reported.
pub(crate) fn dependent_columns(gram: &Array2<f64>) -> Vec<usize> {
    let n = gram.nrows();
    debug_assert_eq!(n, gram.ncols());
    let mut l = Array2::<f64>::zeros((n, n));
    let mut dependent = Vec::new();

    for i in 0..n {
        for j in 0..i {
            if l[[j, j]] == 0.0 {
                continue;
            }
            let sum = l.slice(s![i, ..j]).dot(&l.slice(s![j, ..j]));
            l[[i, j]] = (gram[[i, j]] - sum) / l[[j, j]];
        }
        let row = l.slice(s![i, ..i]);
        let residual = gram[[i, i]] - row.dot(&row);
        if residual <= ALIAS_EPS * gram[[i, i]] {
            dependent.push(i);
        } else {
            l[[i, i]] = residual.sqrt();
        }
    }
    dependent
}

#[cfg(test)]
mod tests {
    use ndarray::{arr1, arr2};

    use super::*;

    #[test]
    fn solves_spd_system() {
        // [[4, 2], [2, 3]] x = [2, 1] -> x = [0.5, 0]
        let chol = Cholesky::factor(&arr2(&[[4.0, 2.0], [2.0, 3.0]])).unwrap();
        let x = chol.solve(&arr1(&[2.0, 1.0]));
        assert!((x[0] - 0.5).abs() < 1e-12);
        assert!(x[1].abs() < 1e-12);
    }

    #[test]
    fn inverse_diagonal_matches_closed_form() {
        // inverse of [[4, 2], [2, 3]] is [[3, -2], [-2, 4]] / 8
        let chol = Cholesky::factor(&arr2(&[[4.0, 2.0], [2.0, 3.0]])).unwrap();
        let d = chol.inverse_diagonal();
        assert!((d[0] - 3.0 / 8.0).abs() < 1e-12);
        assert!((d[1] - 0.5).abs() < 1e-12);
    }

    #[test]
    fn dependent_column_reports_pivot() {
        // second column equals the first
        let a = arr2(&[[1.0, 1.0, 0.0], [1.0, 1.0, 0.0], [0.0, 0.0, 2.0]]);
        assert_eq!(Cholesky::factor(&a).unwrap_err(), 1);
    }

    #[test]
    fn dependent_columns_keep_the_first_of_each_group() {
        // columns: intercept, x, constant 1.1, 2x + 3, y
        let x = [0.5, -1.0, 2.0, 0.25, 1.5];
        let y = [1.0, 0.0, -2.0, 3.0, 0.5];
        let design = Array2::from_shape_fn((5, 5), |(r, c)| match c {
            0 => 1.0,
            1 => x[r],
            2 => 1.1,
            3 => 2.0 * x[r] + 3.0,
            _ => y[r],
        });
        assert_eq!(dependent_columns(&design.t().dot(&design)), vec![2, 3]);
    }

    #[test]
    fn independent_columns_report_nothing() {
        let gram = arr2(&[[4.0, 2.0], [2.0, 3.0]]);
        assert!(dependent_columns(&gram).is_empty());
    }
}
