//! Iteratively reweighted least squares for the binomial GLM.

use std::f64::consts::SQRT_2;

use ndarray::{Array1, Array2, Axis};
use statrs::function::erf::erfc;
use tracing::{debug, info, instrument, warn};

use crate::config::LogisticConfig;
use crate::error::GlmError;
use crate::linalg::{Cholesky, dependent_columns};
use crate::model::{Coefficient, FitSummary, INTERCEPT, LogisticModel, logistic};

/// Probabilities are kept this far from 0 and 1 so weights and logs stay finite.
const MU_EPS: f64 = 1e-10;

#[instrument(skip_all, fields(n_samples = features.len(), n_features = feature_names.len()))]
pub(crate) fn fit(
    config: &LogisticConfig,
    features: &[Vec<f64>],
    labels: &[u8],
    feature_names: &[String],
) -> Result<LogisticModel, GlmError> {
    config.validate()?;
    validate_inputs(features, labels, feature_names)?;

    let n = features.len();
    let y: Array1<f64> = labels.iter().map(|&l| f64::from(l)).collect();
    let term_name = |k: usize| -> String {
        if k == 0 {
            INTERCEPT.to_string()
        } else {
            feature_names[k - 1].clone()
        }
    };

    // Aliased columns are left out; the intercept comes first and is never aliased.
    let full = design_matrix(features);
    let aliased = dependent_columns(&full.t().dot(&full));
    if !aliased.is_empty() {
        let names: Vec<String> = aliased.iter().map(|&k| term_name(k)).collect();
        warn!(?names, "aliased columns left out of the fit");
    }
    let kept: Vec<usize> = (0..full.ncols()).filter(|k| !aliased.contains(k)).collect();
    let design = full.select(Axis(1), &kept);
    let p = kept.len();

    let mut beta = Array1::<f64>::zeros(p);
    let mut eta = Array1::<f64>::zeros(n);
    let mut mu = eta.mapv(|e| clamp_mu(logistic(e)));
    let mut dev = deviance(&y, &mu);
    let mut iterations = 0;
    let mut converged = false;

    while iterations < config.max_iter {
        iterations += 1;

        let weights = mu.mapv(|m| m * (1.0 - m));
        let working = &eta + &((&y - &mu) / &weights);
        let (xtwx, xtwz) = weighted_normal_equations(&design, &weights, &working);

        let chol = Cholesky::factor(&xtwx).map_err(|k| GlmError::SingularDesign {
            feature: term_name(kept[k]),
        })?;
        beta = chol.solve(&xtwz);
        eta = design.dot(&beta);
        mu = eta.mapv(|e| clamp_mu(logistic(e)));

        let dev_new = deviance(&y, &mu);
        let change = (dev_new - dev).abs() / (dev_new.abs() + 0.1);
        debug!(iteration = iterations, deviance = dev_new, change, "irls step");
        dev = dev_new;
        if change < config.tolerance {
            converged = true;
            break;
        }
    }

    if !converged {
        warn!(iterations, deviance = dev, "irls did not converge");
    }

    // Covariance from the information matrix at the final estimate.
    let weights = mu.mapv(|m| m * (1.0 - m));
    let (info_matrix, _) = weighted_normal_equations(&design, &weights, &eta);
    let variances = Cholesky::factor(&info_matrix)
        .map_err(|k| GlmError::SingularDesign {
            feature: term_name(kept[k]),
        })?
        .inverse_diagonal();

    // Estimates go back to their place in the full design.
    let mut fitted = kept
        .iter()
        .copied()
        .zip(beta.iter().copied().zip(variances.iter().copied()))
        .peekable();
    let mut terms: Vec<Coefficient> = (0..full.ncols())
        .map(|k| match fitted.next_if(|&(j, _)| j == k) {
            Some((_, (estimate, var))) => {
                let std_error = var.max(0.0).sqrt();
                let z_value = estimate / std_error;
                Coefficient {
                    name: term_name(k),
                    estimate,
                    std_error: Some(std_error),
                    z_value: Some(z_value),
                    p_value: Some(two_sided_p(z_value)),
                }
            }
            None => Coefficient {
                name: term_name(k),
                estimate: 0.0,
                std_error: None,
                z_value: None,
                p_value: None,
            },
        })
        .collect();
    let intercept = terms.remove(0);

    let y_bar = y.sum() / n as f64;
    let null_mu = Array1::from_elem(n, clamp_mu(y_bar));
    let summary = FitSummary {
        deviance: dev,
        null_deviance: deviance(&y, &null_mu),
        aic: dev + 2.0 * p as f64,
        n_obs: n,
        iterations,
        converged,
    };

    info!(
        iterations,
        converged,
        n_aliased = aliased.len(),
        deviance = summary.deviance,
        null_deviance = summary.null_deviance,
        aic = summary.aic,
        "logistic regression fitted"
    );

    Ok(LogisticModel {
        intercept,
        coefficients: terms,
        summary,
    })
}

fn validate_inputs(
    features: &[Vec<f64>],
    labels: &[u8],
    feature_names: &[String],
) -> Result<(), GlmError> {
    let Some(first) = features.first() else {
        return Err(GlmError::EmptyDataset);
    };
    if labels.len() != features.len() {
        return Err(GlmError::LabelCountMismatch {
            n_rows: features.len(),
            n_labels: labels.len(),
        });
    }
    let width = first.len();
    if feature_names.len() != width {
        return Err(GlmError::FeatureNameMismatch {
            n_features: width,
            n_names: feature_names.len(),
        });
    }

    for (sample_index, row) in features.iter().enumerate() {
        if row.len() != width {
            return Err(GlmError::FeatureCountMismatch {
                expected: width,
                got: row.len(),
                sample_index,
            });
        }
        if let Some(feature_index) = row.iter().position(|v| !v.is_finite()) {
            return Err(GlmError::NonFiniteValue {
                sample_index,
                feature_index,
            });
        }
    }

    if let Some(sample_index) = labels.iter().position(|&l| l > 1) {
        return Err(GlmError::InvalidLabel {
            sample_index,
            value: labels[sample_index],
        });
    }
    if labels.iter().all(|&l| l == labels[0]) {
        return Err(GlmError::ConstantResponse {
            value: labels[0],
            n_rows: labels.len(),
        });
    }

    // An all-zero column has no information; name it before the solver
    // reports a bare singular pivot.
    for (j, name) in feature_names.iter().enumerate() {
        if features.iter().all(|row| row[j] == 0.0) {
            return Err(GlmError::UnobservedLevel {
                feature: name.clone(),
            });
        }
    }
    Ok(())
}

/// Rows of `features` behind a leading intercept column.
fn design_matrix(features: &[Vec<f64>]) -> Array2<f64> {
    let width = features.first().map_or(0, Vec::len) + 1;
    Array2::from_shape_fn((features.len(), width), |(i, k)| {
        if k == 0 { 1.0 } else { features[i][k - 1] }
    })
}

/// `X^T W X` and `X^T W z`.
fn weighted_normal_equations(
    design: &Array2<f64>,
    weights: &Array1<f64>,
    z: &Array1<f64>,
) -> (Array2<f64>, Array1<f64>) {
    let weighted = design * &weights.view().insert_axis(Axis(1));
    (weighted.t().dot(design), weighted.t().dot(z))
}

fn clamp_mu(mu: f64) -> f64 {
    mu.clamp(MU_EPS, 1.0 - MU_EPS)
}

/// Binomial deviance `-2 * sum(y ln mu + (1 - y) ln(1 - mu))` for 0/1 `y`.
fn deviance(y: &Array1<f64>, mu: &Array1<f64>) -> f64 {
    -2.0 * y
        .iter()
        .zip(mu)
        .map(|(&yi, &m)| if yi > 0.5 { m.ln() } else { (1.0 - m).ln() })
        .sum::<f64>()
}

/// Two-sided p-value of a standard-normal statistic.
fn two_sided_p(z: f64) -> f64 {
    if z.is_nan() {
        return f64::NAN;
    }
    erfc(z.abs() / SQRT_2).clamp(0.0, 1.0)
}
