//! The two compared models, wired to the evaluator.
//!
//! Each scorer pairs a fitted model with the encoder that produced its
//! training columns, so it can score typed records directly.

use anyhow::{Context, Result, bail};
use propensity_eval::{
    Baseline, EvalError, INTERCEPT_TERM, ModelDescription, Scorer, Term, TermKind,
};
use propensity_glm::{LogisticConfig, LogisticModel};
use propensity_io::{Coding, CombinedSample, FeatureEncoder, Partition, Record, Schema};
use propensity_rf::{
    OobMode, PermutationImportance, RandomForest, RandomForestConfig, RandomForestResult,
    RankedFeature,
};
use tracing::{info, instrument};

/// Model name of the logistic regression.
pub const LOGISTIC: &str = "logistic";

/// Model name of the random forest.
pub const FOREST: &str = "forest";

/// File name of the exported logistic regression.
pub const LOGISTIC_MODEL_FILE: &str = "logistic_model.json";

/// File name of the exported random forest.
pub const FOREST_MODEL_FILE: &str = "forest_model.json";

/// Encode the training partition of `sample` with `encoder`.
fn training_data(
    sample: &CombinedSample,
    encoder: &FeatureEncoder,
) -> Result<(Vec<Vec<f64>>, Vec<u8>)> {
    let train = sample.records_in(Partition::Train);
    let features = encoder
        .encode_all(train.iter().copied())
        .context("failed to encode training records")?;
    let labels = train.iter().map(|r| r.resp()).collect();
    Ok((features, labels))
}

/// Fail unless a loaded model was trained on the columns `encoder` produces.
fn check_columns(model: &str, encoder: &FeatureEncoder, names: &[&str]) -> Result<()> {
    let expected: Vec<&str> = encoder.feature_names().iter().map(String::as_str).collect();
    if expected != names {
        bail!(
            "{model} model columns do not match the schema sample ({} model columns, {} encoded)",
            names.len(),
            expected.len()
        );
    }
    Ok(())
}

fn field_of(encoder: &FeatureEncoder, index: usize) -> String {
    encoder
        .group_of(index)
        .map_or_else(|| encoder.feature_names()[index].clone(), |g| g.field.clone())
}

/// Logistic regression on treatment-coded features.
#[derive(Debug)]
pub struct LogisticScorer {
    encoder: FeatureEncoder,
    model: LogisticModel,
}

impl LogisticScorer {
    /// Fit on the training partition of `sample`.
    #[instrument(skip_all, fields(n_rows = sample.partition_len(Partition::Train)))]
    pub fn fit(sample: &CombinedSample, config: &LogisticConfig) -> Result<Self> {
        let encoder = FeatureEncoder::new(sample.schema(), Coding::Treatment);
        let (features, labels) = training_data(sample, &encoder)?;
        let model = config
            .fit(&features, &labels, encoder.feature_names())
            .context("logistic regression failed")?;
        info!(
            n_terms = model.coefficients().len() + 1,
            converged = model.summary().converged,
            "logistic model ready"
        );
        Ok(Self { encoder, model })
    }

    /// Pair a loaded model with an encoder for `schema`.
    pub fn new(schema: &Schema, model: LogisticModel) -> Result<Self> {
        let encoder = FeatureEncoder::new(schema, Coding::Treatment);
        check_columns(LOGISTIC, &encoder, &model.feature_names())?;
        Ok(Self { encoder, model })
    }

    /// The fitted model.
    pub fn model(&self) -> &LogisticModel {
        &self.model
    }
}

impl Scorer for LogisticScorer {
    fn name(&self) -> &str {
        LOGISTIC
    }

    fn score(&self, record: &Record) -> Result<f64, EvalError> {
        let row = self
            .encoder
            .encode(record)
            .map_err(|e| EvalError::scoring(LOGISTIC, e))?;
        self.model
            .predict_proba(&row)
            .map_err(|e| EvalError::scoring(LOGISTIC, e))
    }

    fn describe(&self) -> ModelDescription {
        let intercept = self.model.intercept();
        let mut terms = vec![Term {
            name: intercept.name.clone(),
            field: INTERCEPT_TERM.to_string(),
            estimate: intercept.estimate,
            statistic: intercept.z_value,
            p_value: intercept.p_value,
        }];
        terms.extend(self.model.coefficients().iter().enumerate().map(|(i, c)| Term {
            name: c.name.clone(),
            field: field_of(&self.encoder, i),
            estimate: c.estimate,
            statistic: c.z_value,
            p_value: c.p_value,
        }));
        let baselines = self
            .encoder
            .groups()
            .iter()
            .filter_map(|g| {
                g.baseline.as_ref().map(|level| Baseline {
                    field: g.field.clone(),
                    level: level.clone(),
                })
            })
            .collect();
        ModelDescription {
            model: LOGISTIC.to_string(),
            kind: TermKind::Coefficients,
            terms,
            baselines,
        }
    }
}

/// Random forest on one-hot features, scored by the positive vote fraction.
#[derive(Debug)]
pub struct ForestScorer {
    encoder: FeatureEncoder,
    forest: RandomForest,
    importances: Vec<RankedFeature>,
}

impl ForestScorer {
    /// Fit on the training partition of `sample`, with OOB evaluation.
    ///
    /// Returns the scorer together with the full training result.
    #[instrument(skip_all, fields(n_trees = n_trees, seed = seed))]
    pub fn fit(
        sample: &CombinedSample,
        n_trees: usize,
        seed: u64,
    ) -> Result<(Self, RandomForestResult)> {
        let encoder = FeatureEncoder::new(sample.schema(), Coding::OneHot);
        let (features, labels) = training_data(sample, &encoder)?;
        let result = RandomForestConfig::new(n_trees)
            .context("invalid random forest configuration")?
            .with_seed(seed)
            .with_oob_mode(OobMode::Enabled)
            .fit(&features, &labels, encoder.feature_names())
            .context("random forest training failed")?;
        let scorer = Self {
            encoder,
            forest: result.forest().clone(),
            importances: result.importances().to_vec(),
        };
        Ok((scorer, result))
    }

    /// Pair a loaded forest with an encoder for `schema`.
    pub fn new(schema: &Schema, forest: RandomForest) -> Result<Self> {
        let encoder = FeatureEncoder::new(schema, Coding::OneHot);
        let names: Vec<&str> = forest.feature_names().iter().map(String::as_str).collect();
        check_columns(FOREST, &encoder, &names)?;
        let importances = forest.importances();
        Ok(Self {
            encoder,
            forest,
            importances,
        })
    }

    /// The fitted forest.
    pub fn forest(&self) -> &RandomForest {
        &self.forest
    }

    /// OOB permutation importance for a `result` returned by [`ForestScorer::fit`]
    /// on the same `sample`.
    pub fn permutation_importances(
        &self,
        result: &RandomForestResult,
        sample: &CombinedSample,
        seed: u64,
    ) -> Result<Vec<PermutationImportance>> {
        let (features, labels) = training_data(sample, &self.encoder)?;
        result
            .permutation_importances(&features, &labels, seed)
            .context("training rows no longer match the forest")
    }
}

impl Scorer for ForestScorer {
    fn name(&self) -> &str {
        FOREST
    }

    fn score(&self, record: &Record) -> Result<f64, EvalError> {
        let row = self
            .encoder
            .encode(record)
            .map_err(|e| EvalError::scoring(FOREST, e))?;
        self.forest
            .vote_fraction(&row, 1)
            .map_err(|e| EvalError::scoring(FOREST, e))
    }

    fn describe(&self) -> ModelDescription {
        let names = self.encoder.feature_names();
        let terms = self
            .importances
            .iter()
            .map(|f| {
                let field = names
                    .iter()
                    .position(|n| *n == f.name)
                    .map_or_else(|| f.name.clone(), |i| field_of(&self.encoder, i));
                Term {
                    name: f.name.clone(),
                    field,
                    estimate: f.importance,
                    statistic: None,
                    p_value: None,
                }
            })
            .collect();
        ModelDescription {
            model: FOREST.to_string(),
            kind: TermKind::Importances,
            terms,
            baselines: Vec::new(),
        }
    }
}
