//! Binary confusion matrix and derived rates, positive class = 1.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::EvalError;

/// Counts of thresholded predictions against actual responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfusionMatrix {
    /// Predicted 1, actual 1.
    pub tp: usize,
    /// Predicted 1, actual 0.
    pub fp: usize,
    /// Predicted 0, actual 0.
    pub tn: usize,
    /// Predicted 0, actual 1.
    pub fn_: usize,
}

/// Rates derived from a [`ConfusionMatrix`].
///
/// A rate whose denominator is zero is `None`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ConfusionMetrics {
    /// `(TP + TN) / total`.
    pub accuracy: f64,
    /// `TP / (TP + FN)`, recall on the positive class.
    pub sensitivity: Option<f64>,
    /// `TN / (TN + FP)`.
    pub specificity: Option<f64>,
    /// Positive predictive value, `TP / (TP + FP)`.
    pub precision: Option<f64>,
    /// Negative predictive value, `TN / (TN + FN)`.
    pub npv: Option<f64>,
    /// `(TP + FN) / total`.
    pub prevalence: f64,
    /// `TP / total`.
    pub detection_rate: f64,
    /// `(TP + FP) / total`.
    pub detection_prevalence: f64,
    /// Mean of sensitivity and specificity.
    pub balanced_accuracy: Option<f64>,
    /// Harmonic mean of precision and sensitivity.
    pub f1: Option<f64>,
    /// Cohen's kappa: agreement beyond chance.
    pub kappa: Option<f64>,
}

fn ratio(num: usize, den: usize) -> Option<f64> {
    (den > 0).then(|| num as f64 / den as f64)
}

impl ConfusionMatrix {
    /// Tabulate predicted against actual classes.
    ///
    /// # Errors
    ///
    /// Returns [`EvalError::ClassLengthMismatch`] when the slices differ in
    /// length or are empty.
    pub fn from_classes(actual: &[u8], predicted: &[u8]) -> Result<Self, EvalError> {
        if actual.len() != predicted.len() || actual.is_empty() {
            return Err(EvalError::ClassLengthMismatch {
                n_actual: actual.len(),
                n_predicted: predicted.len(),
            });
        }
        let mut cm = Self {
            tp: 0,
            fp: 0,
            tn: 0,
            fn_: 0,
        };
        for (&a, &p) in actual.iter().zip(predicted) {
            match (a == 1, p == 1) {
                (true, true) => cm.tp += 1,
                (false, true) => cm.fp += 1,
                (false, false) => cm.tn += 1,
                (true, false) => cm.fn_ += 1,
            }
        }
        Ok(cm)
    }

    /// Return the number of classified records.
    #[must_use]
    pub fn total(&self) -> usize {
        self.tp + self.fp + self.tn + self.fn_
    }

    /// Return the number of positive predictions.
    #[must_use]
    pub fn predicted_positive(&self) -> usize {
        self.tp + self.fp
    }

    /// Compute every derived rate.
    #[must_use]
    pub fn metrics(&self) -> ConfusionMetrics {
        let total = self.total();
        let n = total as f64;
        let sensitivity = ratio(self.tp, self.tp + self.fn_);
        let specificity = ratio(self.tn, self.tn + self.fp);
        let precision = ratio(self.tp, self.tp + self.fp);
        let accuracy = ratio(self.tp + self.tn, total).unwrap_or(0.0);

        let f1 = match (precision, sensitivity) {
            (Some(p), Some(r)) if p + r > 0.0 => Some(2.0 * p * r / (p + r)),
            (Some(_), Some(_)) => Some(0.0),
            _ => None,
        };
        let kappa = if total == 0 {
            None
        } else {
            let actual_pos = (self.tp + self.fn_) as f64 / n;
            let predicted_pos = (self.tp + self.fp) as f64 / n;
            let expected =
                actual_pos * predicted_pos + (1.0 - actual_pos) * (1.0 - predicted_pos);
            (expected < 1.0).then(|| (accuracy - expected) / (1.0 - expected))
        };

        ConfusionMetrics {
            accuracy,
            sensitivity,
            specificity,
            precision,
            npv: ratio(self.tn, self.tn + self.fn_),
            prevalence: ratio(self.tp + self.fn_, total).unwrap_or(0.0),
            detection_rate: ratio(self.tp, total).unwrap_or(0.0),
            detection_prevalence: ratio(self.tp + self.fp, total).unwrap_or(0.0),
            balanced_accuracy: sensitivity.zip(specificity).map(|(a, b)| (a + b) / 2.0),
            f1,
            kappa,
        }
    }
}

impl fmt::Display for ConfusionMatrix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{:>12} {:>9} {:>9}", "", "actual 0", "actual 1")?;
        writeln!(f, "{:>12} {:>9} {:>9}", "predicted 0", self.tn, self.fn_)?;
        writeln!(f, "{:>12} {:>9} {:>9}", "predicted 1", self.fp, self.tp)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_and_accuracy_from_table() {
        let actual = [1, 1, 1, 0, 0, 0, 0, 0, 1, 0];
        let predicted = [1, 0, 1, 0, 1, 0, 0, 0, 0, 0];
        let cm = ConfusionMatrix::from_classes(&actual, &predicted).unwrap();
        assert_eq!((cm.tp, cm.fp, cm.tn, cm.fn_), (2, 1, 5, 2));
        assert_eq!(cm.total(), 10);

        let m = cm.metrics();
        let recomputed = (cm.tp + cm.tn) as f64 / cm.total() as f64;
        assert_eq!(m.accuracy, recomputed);
        assert_eq!(m.sensitivity, Some(0.5));
        assert_eq!(m.specificity, Some(5.0 / 6.0));
        assert_eq!(m.precision, Some(2.0 / 3.0));
        assert_eq!(m.npv, Some(5.0 / 7.0));
        assert_eq!(m.prevalence, 0.4);
        assert_eq!(m.detection_rate, 0.2);
        assert_eq!(m.detection_prevalence, 0.3);
    }

    #[test]
    fn kappa_matches_hand_computation() {
        let cm = ConfusionMatrix {
            tp: 20,
            fp: 10,
            tn: 60,
            fn_: 10,
        };
        // po = 0.8, pe = 0.3*0.3 + 0.7*0.7 = 0.58
        let kappa = cm.metrics().kappa.unwrap();
        assert!((kappa - (0.8 - 0.58) / 0.42).abs() < 1e-12);
        let f1 = cm.metrics().f1.unwrap();
        assert!((f1 - 2.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn undefined_rates_are_none() {
        // No positive predictions at all, as with a high cutoff.
        let cm = ConfusionMatrix::from_classes(&[0, 1, 0, 0], &[0, 0, 0, 0]).unwrap();
        let m = cm.metrics();
        assert_eq!(m.precision, None);
        assert_eq!(m.f1, None);
        assert_eq!(m.sensitivity, Some(0.0));
        assert_eq!(m.kappa, Some(0.0));

        let all_negative = ConfusionMatrix::from_classes(&[0, 0], &[0, 0]).unwrap();
        assert_eq!(all_negative.metrics().kappa, None);
        assert_eq!(all_negative.metrics().sensitivity, None);
    }

    #[test]
    fn mismatched_or_empty_inputs_rejected() {
        assert!(ConfusionMatrix::from_classes(&[], &[]).is_err());
        assert!(matches!(
            ConfusionMatrix::from_classes(&[0, 1], &[0]),
            Err(EvalError::ClassLengthMismatch { n_actual: 2, n_predicted: 1 })
        ));
    }

    #[test]
    fn display_shows_cells() {
        let cm = ConfusionMatrix::from_classes(&[0, 1], &[0, 1]).unwrap();
        let text = cm.to_string();
        assert!(text.contains("predicted 1"));
        assert!(text.contains("actual 0"));
    }
}
