//! Chart data and text rendering for model comparison reports.

use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use propensity_io::{ArtifactWriter, Partition};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

use crate::EvalError;
use crate::evaluator::{Comparison, ComparisonSummary, ModelEvaluation};
use crate::scorer::{INTERCEPT_TERM, ModelDescription, TermKind};

/// Coefficients with a p-value below this are charted.
pub const SIGNIFICANCE_LEVEL: f64 = 0.05;

/// File name of the combined text report.
pub const REPORT_TEXT_FILE: &str = "report.txt";

/// File name of the comparison summary.
pub const COMPARISON_FILE: &str = "comparison.json";

/// File name of the model descriptions.
pub const MODELS_FILE: &str = "models.json";

const BAR_WIDTH: usize = 40;

/// One named row of values across a chart's categories.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Series {
    /// Series label, e.g. a partition name.
    pub name: String,
    /// One value per category.
    pub values: Vec<f64>,
}

/// Horizontal bar chart data, possibly grouped by series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chart {
    /// File stem for this chart's outputs.
    pub id: String,
    /// Chart title.
    pub title: String,
    /// What the bar lengths measure.
    pub value_label: String,
    /// Bar labels, top to bottom.
    pub categories: Vec<String>,
    /// Values per series, parallel to `categories`.
    pub series: Vec<Series>,
}

impl Chart {
    /// Render as fixed-width text bars scaled to the largest value.
    #[must_use]
    pub fn render(&self) -> String {
        let mut out = format!("{}\n{}\n", self.title, self.value_label);
        if self.categories.is_empty() {
            out.push_str("  (no bars)\n");
            return out;
        }
        let max = self
            .series
            .iter()
            .flat_map(|s| s.values.iter().copied())
            .fold(0.0f64, f64::max);
        let label_width = self.categories.iter().map(String::len).max().unwrap_or(0);
        let series_width = self.series.iter().map(|s| s.name.len()).max().unwrap_or(0);
        let grouped = self.series.len() > 1;

        for (c, category) in self.categories.iter().enumerate() {
            for s in &self.series {
                let value = s.values.get(c).copied().unwrap_or(0.0);
                let len = if max > 0.0 {
                    (value / max * BAR_WIDTH as f64).round() as usize
                } else {
                    0
                };
                let bar = "#".repeat(len);
                let _ = if grouped {
                    writeln!(
                        out,
                        "  {category:<label_width$}  {:<series_width$}  {bar:<BAR_WIDTH$} {value:.2}",
                        s.name
                    )
                } else {
                    writeln!(out, "  {category:<label_width$}  {bar:<BAR_WIDTH$} {value:.2}")
                };
            }
        }
        out
    }
}

/// Chart (a): |z| of coefficients with p < [`SIGNIFICANCE_LEVEL`], intercept
/// excluded, most significant first.
#[must_use]
pub fn significance_chart(description: &ModelDescription) -> Chart {
    let mut terms: Vec<(&str, f64, f64)> = description
        .terms
        .iter()
        .filter(|t| t.field != INTERCEPT_TERM)
        .filter_map(|t| match (t.p_value, t.statistic) {
            (Some(p), Some(z)) if p < SIGNIFICANCE_LEVEL => Some((t.name.as_str(), p, z.abs())),
            _ => None,
        })
        .collect();
    // p-values can underflow to zero; |z| breaks those ties.
    terms.sort_by(|a, b| a.1.total_cmp(&b.1).then(b.2.total_cmp(&a.2)));

    Chart {
        id: format!("significance_{}", description.model),
        title: format!(
            "{}: significant coefficients (p < {SIGNIFICANCE_LEVEL})",
            description.model
        ),
        value_label: "|z value|".to_string(),
        categories: terms.iter().map(|t| t.0.to_string()).collect(),
        series: vec![Series {
            name: description.model.clone(),
            values: terms.iter().map(|t| t.2).collect(),
        }],
    }
}

/// Chart (b): importance summed per source field, largest first.
#[must_use]
pub fn importance_chart(description: &ModelDescription) -> Chart {
    let mut fields: Vec<(String, f64)> = Vec::new();
    for term in &description.terms {
        match fields.iter_mut().find(|(f, _)| *f == term.field) {
            Some((_, total)) => *total += term.estimate,
            None => fields.push((term.field.clone(), term.estimate)),
        }
    }
    fields.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(&b.0)));

    Chart {
        id: format!("importance_{}", description.model),
        title: format!("{}: variable importance by field", description.model),
        value_label: "mean decrease in impurity (share)".to_string(),
        categories: fields.iter().map(|f| f.0.clone()).collect(),
        series: vec![Series {
            name: description.model.clone(),
            values: fields.iter().map(|f| f.1).collect(),
        }],
    }
}

/// Chart (c): response percentage by decile, one series per partition.
#[must_use]
pub fn lift_chart(evaluation: &ModelEvaluation) -> Chart {
    let categories = (1..=10).map(|d: u8| d.to_string()).collect();
    let series = Partition::ALL
        .iter()
        .map(|&p| Series {
            name: p.to_string(),
            values: evaluation.lift_in(p).map(|r| r.response_pct).collect(),
        })
        .collect();
    Chart {
        id: format!("lift_{}", evaluation.model()),
        title: format!("{}: response rate by score decile", evaluation.model()),
        value_label: "responders (%)".to_string(),
        categories,
        series,
    }
}

/// All charts and metrics of one comparison.
#[derive(Debug, Clone, PartialEq)]
pub struct Report {
    charts: Vec<Chart>,
    summary: ComparisonSummary,
    descriptions: Vec<ModelDescription>,
}

impl Report {
    /// Build every chart for the compared models.
    #[must_use]
    pub fn build(comparison: &Comparison, descriptions: &[ModelDescription]) -> Self {
        let mut charts: Vec<Chart> = descriptions
            .iter()
            .map(|d| match d.kind {
                TermKind::Coefficients => significance_chart(d),
                TermKind::Importances => importance_chart(d),
            })
            .collect();
        charts.extend(comparison.models().iter().map(lift_chart));
        Self {
            charts,
            summary: comparison.summary(),
            descriptions: descriptions.to_vec(),
        }
    }

    /// Return the charts: one per description, then one lift chart per model.
    #[must_use]
    pub fn charts(&self) -> &[Chart] {
        &self.charts
    }

    /// Return the comparison summary.
    #[must_use]
    pub fn summary(&self) -> &ComparisonSummary {
        &self.summary
    }

    /// Render charts and confusion metrics as one text document.
    #[must_use]
    pub fn render_text(&self) -> String {
        let mut out = String::new();
        for chart in &self.charts {
            out.push_str(&chart.render());
            out.push('\n');
        }
        for d in &self.descriptions {
            if !d.baselines.is_empty() {
                let _ = writeln!(out, "{}: baseline levels", d.model);
                for b in &d.baselines {
                    let _ = writeln!(out, "  {:<16} {}", b.field, b.level);
                }
                out.push('\n');
            }
            if matches!(d.kind, TermKind::Coefficients) {
                let aliased: Vec<&str> = d
                    .terms
                    .iter()
                    .filter(|t| t.statistic.is_none())
                    .map(|t| t.name.as_str())
                    .collect();
                if !aliased.is_empty() {
                    let _ = writeln!(out, "{}: aliased, not estimated: {}\n", d.model, aliased.join(", "));
                }
            }
        }
        let _ = writeln!(out, "cutoff: {}", self.summary.cutoff);
        for m in &self.summary.models {
            let _ = writeln!(out, "\n{}\n{}", m.model, m.confusion);
            let rates = [
                ("accuracy", Some(m.metrics.accuracy)),
                ("sensitivity", m.metrics.sensitivity),
                ("specificity", m.metrics.specificity),
                ("precision", m.metrics.precision),
                ("balanced accuracy", m.metrics.balanced_accuracy),
                ("kappa", m.metrics.kappa),
            ];
            for (name, value) in rates {
                let shown = value.map_or_else(|| "NA".to_string(), |v| format!("{v:.4}"));
                let _ = writeln!(out, "  {name:<18} {shown}");
            }
        }
        out
    }

    /// Write `<chart>.txt` and `<chart>.json` per chart, plus the combined
    /// text report, the comparison summary, and model descriptions.
    ///
    /// # Errors
    ///
    /// Returns [`EvalError::Io`] when the directory or a file cannot be written.
    #[instrument(skip(self), fields(dir = %dir.display(), n_charts = self.charts.len()))]
    pub fn write(&self, dir: &Path) -> Result<Vec<PathBuf>, EvalError> {
        let writer = ArtifactWriter::new(dir)?;
        let mut paths = Vec::with_capacity(2 * self.charts.len() + 3);
        for chart in &self.charts {
            paths.push(writer.write_bytes(&format!("{}.txt", chart.id), chart.render().as_bytes())?);
            paths.push(writer.write_json(&format!("{}.json", chart.id), chart)?);
        }
        paths.push(writer.write_bytes(REPORT_TEXT_FILE, self.render_text().as_bytes())?);
        paths.push(writer.write_json(COMPARISON_FILE, &self.summary)?);
        paths.push(writer.write_json(MODELS_FILE, &self.descriptions)?);
        info!(n_files = paths.len(), "report written");
        Ok(paths)
    }
}
