//! Numeric encoding of typed records for model fitting and scoring.

use std::ops::Range;

use serde::{Deserialize, Serialize};

use crate::IoError;
use crate::domain::{Cell, ColumnKind, Record, Schema};

/// How factor columns expand into numeric columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Coding {
    /// One 0/1 column per level except the first, which is the baseline.
    Treatment,
    /// One 0/1 column per level.
    OneHot,
}

/// The encoded columns that came from one source field.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureGroup {
    /// Source field name.
    pub field: String,
    /// Encoded column positions belonging to the field.
    pub columns: Range<usize>,
    /// Baseline level absorbed into the intercept, for treatment-coded factors.
    pub baseline: Option<String>,
}

#[derive(Debug, Clone)]
enum Slot {
    Numeric { offset: usize },
    Factor { offset: usize, skip_first: bool },
}

/// Turns [`Record`]s of one [`Schema`] into dense numeric rows.
///
/// Factor dummies are named `field[level]`; numeric columns keep their name.
#[derive(Debug, Clone)]
pub struct FeatureEncoder {
    coding: Coding,
    slots: Vec<Slot>,
    names: Vec<String>,
    groups: Vec<FeatureGroup>,
}

impl FeatureEncoder {
    /// Build an encoder for `schema`.
    #[must_use]
    pub fn new(schema: &Schema, coding: Coding) -> Self {
        let mut slots = Vec::with_capacity(schema.columns().len());
        let mut names = Vec::new();
        let mut groups = Vec::with_capacity(schema.columns().len());

        for column in schema.columns() {
            let start = names.len();
            let mut baseline = None;
            match &column.kind {
                ColumnKind::Numeric => {
                    slots.push(Slot::Numeric { offset: start });
                    names.push(column.name.clone());
                }
                ColumnKind::Categorical { levels } => {
                    let skip_first = coding == Coding::Treatment;
                    if skip_first {
                        baseline = levels.first().cloned();
                    }
                    slots.push(Slot::Factor {
                        offset: start,
                        skip_first,
                    });
                    let kept = if skip_first { levels.get(1..).unwrap_or(&[]) } else { levels };
                    names.extend(kept.iter().map(|l| format!("{}[{l}]", column.name)));
                }
            }
            groups.push(FeatureGroup {
                field: column.name.clone(),
                columns: start..names.len(),
                baseline,
            });
        }

        Self {
            coding,
            slots,
            names,
            groups,
        }
    }

    /// Return the coding scheme.
    #[must_use]
    pub fn coding(&self) -> Coding {
        self.coding
    }

    /// Return the encoded column names.
    #[must_use]
    pub fn feature_names(&self) -> &[String] {
        &self.names
    }

    /// Return the number of encoded columns.
    #[must_use]
    pub fn n_features(&self) -> usize {
        self.names.len()
    }

    /// Return one group per source field, in schema order.
    #[must_use]
    pub fn groups(&self) -> &[FeatureGroup] {
        &self.groups
    }

    /// Return the group that owns encoded column `index`.
    #[must_use]
    pub fn group_of(&self, index: usize) -> Option<&FeatureGroup> {
        self.groups.iter().find(|g| g.columns.contains(&index))
    }

    /// Encode one record.
    ///
    /// # Errors
    ///
    /// Returns [`IoError::RecordShape`] when the record's cell count differs
    /// from the schema, or a cell's type disagrees with its column.
    pub fn encode(&self, record: &Record) -> Result<Vec<f64>, IoError> {
        let cells = record.cells();
        if cells.len() != self.slots.len() {
            return Err(IoError::RecordShape {
                expected: self.slots.len(),
                got: cells.len(),
            });
        }

        let mut row = vec![0.0; self.names.len()];
        for (slot, cell) in self.slots.iter().zip(cells) {
            match (slot, *cell) {
                (Slot::Numeric { offset }, Cell::Number(v)) => row[*offset] = v,
                (Slot::Factor { offset, skip_first }, Cell::Level(level)) => {
                    let pos = if *skip_first {
                        match level.checked_sub(1) {
                            Some(p) => p,
                            None => continue,
                        }
                    } else {
                        level
                    };
                    row[offset + pos] = 1.0;
                }
                _ => {
                    return Err(IoError::RecordShape {
                        expected: self.slots.len(),
                        got: cells.len(),
                    });
                }
            }
        }
        Ok(row)
    }

    /// Encode many records into a row-major matrix.
    ///
    /// # Errors
    ///
    /// Propagates the first [`FeatureEncoder::encode`] failure.
    pub fn encode_all<'a, I>(&self, records: I) -> Result<Vec<Vec<f64>>, IoError>
    where
        I: IntoIterator<Item = &'a Record>,
    {
        records.into_iter().map(|r| self.encode(r)).collect()
    }
}
