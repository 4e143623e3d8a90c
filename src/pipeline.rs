//! The `run` and `score` stages, from connection string to files on disk.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use propensity_eval::{
    ConfusionMatrix, ConfusionMetrics, Evaluator, ModelDescription, N_DECILES, Report, Scorer,
    assign_deciles,
};
use propensity_glm::{LogisticConfig, LogisticModel};
use propensity_io::{
    ArtifactWriter, Connection, FORMAT_VERSION, FeaturePlan, Partition, Record, SCHEMA_SAMPLE_FILE,
    SampleConfig, Schema, SchemaReader, TableHandle, prepare,
};
use propensity_rf::{PermutationImportance, RandomForest};
use rayon::iter::{IntoParallelRefIterator, ParallelIterator};
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::{info, instrument};

use crate::models::{FOREST_MODEL_FILE, ForestScorer, LOGISTIC_MODEL_FILE, LogisticScorer};

/// Column holding each row's percentile; used for sampling, never as a feature.
pub const PERCENTILE_COLUMN: &str = "percentile";

/// Report file with the forest's OOB permutation importances.
pub const PERMUTATION_FILE: &str = "forest_permutation_importance.json";

/// Inputs of the `run` stage.
#[derive(Debug, Clone)]
pub struct RunConfig {
    /// Connection string of the data source.
    pub source: String,
    /// Table holding the contact records.
    pub table: String,
    /// Directory receiving models, predictions and the sample extract.
    pub api_dir: PathBuf,
    /// Directory receiving charts and the text report.
    pub report_dir: PathBuf,
    /// Inclusive upper percentile of the training partition.
    pub train_upper: f64,
    /// Exclusive lower percentile of the testing partition.
    pub test_lower: f64,
    /// Number of trees in the forest.
    pub n_trees: usize,
    /// Probability cutoff for the positive class.
    pub cutoff: f64,
    /// Seed for the forest and permutation importance.
    pub seed: u64,
}

/// Fit statistics of the logistic regression.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LogisticFit {
    /// IRLS iterations performed.
    pub iterations: usize,
    /// Whether IRLS converged.
    pub converged: bool,
    /// Residual deviance.
    pub deviance: f64,
    /// Intercept-only deviance.
    pub null_deviance: f64,
    /// Akaike information criterion.
    pub aic: f64,
}

/// Training statistics of the random forest.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ForestFit {
    /// Number of trees.
    pub n_trees: usize,
    /// Encoded feature count.
    pub n_features: usize,
    /// Features drawn per split.
    pub max_features: usize,
    /// Out-of-bag accuracy on the training partition.
    pub oob_accuracy: Option<f64>,
    /// The five most important features by OOB permutation.
    pub top_permutation: Vec<PermutationImportance>,
}

/// Whole-sample results of one model at the run's cutoff.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModelOutcome {
    /// Model name.
    pub model: String,
    /// Counts over the combined sample.
    pub confusion: ConfusionMatrix,
    /// Rates derived from `confusion`.
    pub metrics: ConfusionMetrics,
}

/// What `run` prints on stdout.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    /// Source table.
    pub table: String,
    /// Training rows.
    pub n_train: usize,
    /// Testing rows.
    pub n_test: usize,
    /// Shared cutoff.
    pub cutoff: f64,
    /// Logistic regression fit.
    pub logistic: LogisticFit,
    /// Random forest fit.
    pub forest: ForestFit,
    /// One entry per compared model.
    pub models: Vec<ModelOutcome>,
    /// Files written under the API directory.
    pub artifacts: Vec<PathBuf>,
    /// Files written under the report directory.
    pub reports: Vec<PathBuf>,
}

fn connect(source: &str) -> Result<Connection> {
    Connection::open(source).with_context(|| format!("failed to connect to data source {source}"))
}

fn open_table(conn: &Connection, table: &str) -> Result<TableHandle> {
    conn.table(table)
        .with_context(|| format!("failed to open table {table}"))
}

/// Fit both models on the training partition, compare them on the combined
/// sample, and write reports and API artifacts.
#[instrument(skip_all, fields(table = %config.table, seed = config.seed))]
pub fn run(config: &RunConfig) -> Result<RunSummary> {
    // Reject a bad cutoff before any fitting.
    let evaluator = Evaluator::new(config.cutoff).context("invalid cutoff")?;

    // Held until the run returns.
    let conn = connect(&config.source)?;
    let table = open_table(&conn, &config.table)?;
    let plan = FeaturePlan::bank_marketing();
    let query = prepare(&table, &plan).context("feature preparation failed")?;
    let sample = SampleConfig::new(config.train_upper, config.test_lower)
        .context("invalid sampling bounds")?
        .with_percentile_column(PERCENTILE_COLUMN)
        .with_response(plan.response())
        .draw(&query)
        .context("sampling failed")?;
    sample
        .check_trainable()
        .context("training partition cannot support model fitting")?;
    let n_train = sample.partition_len(Partition::Train);
    let n_test = sample.partition_len(Partition::Test);
    info!(n_train, n_test, "combined sample ready");

    let logistic = LogisticScorer::fit(&sample, &LogisticConfig::new())?;
    let (forest, forest_result) = ForestScorer::fit(&sample, config.n_trees, config.seed)?;
    let permutation = forest
        .permutation_importances(&forest_result, &sample, config.seed)
        .context("permutation importance failed")?;

    let scorers: [&dyn Scorer; 2] = [&logistic, &forest];
    let comparison = evaluator
        .compare(&sample, &scorers)
        .context("evaluation failed")?;

    let descriptions: Vec<ModelDescription> = scorers.iter().map(|s| s.describe()).collect();
    let report = Report::build(&comparison, &descriptions);
    let mut reports = report
        .write(&config.report_dir)
        .context("failed to write reports")?;
    reports.push(
        ArtifactWriter::new(&config.report_dir)
            .and_then(|w| w.write_json(PERMUTATION_FILE, &permutation))
            .context("failed to write permutation importance")?,
    );

    let api = ArtifactWriter::new(&config.api_dir).context("failed to prepare API directory")?;
    let logistic_path = api.path(LOGISTIC_MODEL_FILE);
    logistic
        .model()
        .save(&logistic_path)
        .context("failed to export logistic model")?;
    let forest_path = api.path(FOREST_MODEL_FILE);
    forest
        .forest()
        .save(&forest_path)
        .context("failed to export random forest")?;
    let artifacts = vec![
        logistic_path,
        forest_path,
        api.write_predictions(&sample, &comparison.prediction_columns(), evaluator.cutoff())
            .context("failed to export predictions")?,
        api.write_schema_sample(&sample)
            .context("failed to export schema sample")?,
        api.write_sample_csv(&sample)
            .context("failed to export sample extract")?,
    ];
    info!(
        n_artifacts = artifacts.len(),
        n_reports = reports.len(),
        "run complete"
    );

    let fit = logistic.model().summary();
    let metadata = forest_result.metadata();
    Ok(RunSummary {
        table: config.table.clone(),
        n_train,
        n_test,
        cutoff: evaluator.cutoff(),
        logistic: LogisticFit {
            iterations: fit.iterations,
            converged: fit.converged,
            deviance: fit.deviance,
            null_deviance: fit.null_deviance,
            aic: fit.aic,
        },
        forest: ForestFit {
            n_trees: metadata.n_trees,
            n_features: metadata.n_features,
            max_features: metadata.max_features_resolved,
            oob_accuracy: forest_result.oob_score().map(|s| s.accuracy),
            top_permutation: permutation.into_iter().take(5).collect(),
        },
        models: comparison
            .models()
            .iter()
            .map(|m| ModelOutcome {
                model: m.model().to_string(),
                confusion: *m.confusion(),
                metrics: m.confusion().metrics(),
            })
            .collect(),
        artifacts,
        reports,
    })
}

/// Inputs of the `score` stage.
#[derive(Debug, Clone)]
pub struct ScoreConfig {
    /// Connection string of the data source.
    pub source: String,
    /// Table to score.
    pub table: String,
    /// Directory holding the artifacts of a previous run.
    pub api_dir: PathBuf,
    /// Probability cutoff for the positive class.
    pub cutoff: f64,
    /// File receiving the scored rows.
    pub output: PathBuf,
}

/// Per-model totals of a scored table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoredModel {
    /// Model name.
    pub model: String,
    /// Mean score over all rows.
    pub mean_score: f64,
    /// Rows classified positive at the cutoff.
    pub predicted_positive: usize,
}

/// What `score` prints on stdout.
#[derive(Debug, Clone, Serialize)]
pub struct ScoreSummary {
    /// Scored table.
    pub table: String,
    /// Rows scored.
    pub n_rows: usize,
    /// Cutoff applied.
    pub cutoff: f64,
    /// One entry per model.
    pub models: Vec<ScoredModel>,
    /// File written.
    pub output: PathBuf,
}

#[derive(Serialize)]
struct ScoredTable<'a> {
    format_version: u32,
    table: &'a str,
    cutoff: f64,
    models: Vec<&'a str>,
    n_rows: usize,
    rows: Vec<Value>,
}

struct ScoreColumn<'a> {
    model: &'a str,
    scores: Vec<f64>,
    deciles: Option<Vec<u8>>,
    classes: Vec<u8>,
}

fn load_records(conn: &Connection, table: &str, schema: &Schema) -> Result<Vec<Record>> {
    let table = open_table(conn, table)?;
    let mut query =
        prepare(&table, &FeaturePlan::bank_marketing()).context("feature preparation failed")?;
    let columns = query.columns().context("feature preparation failed")?;
    if columns.iter().any(|c| c == PERCENTILE_COLUMN) {
        query = query.drop_columns(&[PERCENTILE_COLUMN]);
    }
    let frame = query.collect().context("failed to read table rows")?;
    let binder = schema
        .binder(frame.columns(), table.name())
        .context("table does not match the exported schema sample")?;
    frame
        .rows()
        .iter()
        .enumerate()
        .map(|(i, row)| binder.bind(row, i))
        .collect::<Result<Vec<_>, _>>()
        .context("failed to type table rows against the schema sample")
}

/// Score every row of a table with the models exported by a previous `run`.
///
/// Deciles are assigned over the whole table when it has at least ten rows.
#[instrument(skip_all, fields(table = %config.table, api_dir = %config.api_dir.display()))]
pub fn score(config: &ScoreConfig) -> Result<ScoreSummary> {
    let evaluator = Evaluator::new(config.cutoff).context("invalid cutoff")?;

    let schema = SchemaReader::new(&config.api_dir.join(SCHEMA_SAMPLE_FILE))
        .read()
        .context("failed to read schema sample")?;
    let logistic = LogisticModel::load(config.api_dir.join(LOGISTIC_MODEL_FILE))
        .context("failed to load logistic model")?;
    let forest = RandomForest::load(config.api_dir.join(FOREST_MODEL_FILE))
        .context("failed to load random forest")?;
    let logistic = LogisticScorer::new(&schema, logistic)?;
    let forest = ForestScorer::new(&schema, forest)?;
    let scorers: [&dyn Scorer; 2] = [&logistic, &forest];

    let conn = connect(&config.source)?;
    let records = load_records(&conn, &config.table, &schema)?;
    info!(n_rows = records.len(), "table loaded for scoring");

    let mut columns = Vec::with_capacity(scorers.len());
    for scorer in scorers {
        let scores = records
            .par_iter()
            .map(|r| scorer.score(r))
            .collect::<Result<Vec<f64>, _>>()
            .with_context(|| format!("scoring with {} failed", scorer.name()))?;
        let deciles = if scores.len() >= usize::from(N_DECILES) {
            Some(assign_deciles(&scores)?)
        } else {
            None
        };
        let classes = scores.iter().map(|&s| evaluator.classify(s)).collect();
        columns.push(ScoreColumn {
            model: scorer.name(),
            scores,
            deciles,
            classes,
        });
    }

    let rows = records
        .iter()
        .enumerate()
        .map(|(i, record)| scored_row(&schema, i, record, &columns))
        .collect();
    let artifact = ScoredTable {
        format_version: FORMAT_VERSION,
        table: &config.table,
        cutoff: evaluator.cutoff(),
        models: columns.iter().map(|c| c.model).collect(),
        n_rows: records.len(),
        rows,
    };
    let output = write_output(&config.output, &artifact)?;

    let models = columns
        .iter()
        .map(|c| ScoredModel {
            model: c.model.to_string(),
            mean_score: c.scores.iter().sum::<f64>() / c.scores.len().max(1) as f64,
            predicted_positive: c.classes.iter().filter(|&&k| k == 1).count(),
        })
        .collect();
    Ok(ScoreSummary {
        table: config.table.clone(),
        n_rows: records.len(),
        cutoff: evaluator.cutoff(),
        models,
        output,
    })
}

fn scored_row(
    schema: &Schema,
    index: usize,
    record: &Record,
    columns: &[ScoreColumn<'_>],
) -> Value {
    let mut row = Map::new();
    row.insert("row".into(), index.into());
    for (i, (column, &cell)) in schema.columns().iter().zip(record.cells()).enumerate() {
        row.insert(column.name.clone(), schema.render(i, cell).into());
    }
    row.insert(schema.response().into(), record.resp().into());
    let mut scores = BTreeMap::new();
    for c in columns {
        scores.insert(format!("{}_score", c.model), Value::from(c.scores[index]));
        if let Some(deciles) = &c.deciles {
            scores.insert(format!("{}_decile", c.model), Value::from(deciles[index]));
        }
        scores.insert(format!("{}_class", c.model), Value::from(c.classes[index]));
    }
    row.extend(scores);
    Value::Object(row)
}

fn write_output(path: &Path, artifact: &ScoredTable<'_>) -> Result<PathBuf> {
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or(Path::new("."));
    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .with_context(|| format!("invalid output path {}", path.display()))?;
    let written = ArtifactWriter::new(dir)
        .and_then(|w| w.write_json(name, artifact))
        .context("failed to write scored table")?;
    info!(path = %written.display(), "scored table written");
    Ok(written)
}
