//! Feature preparation: an explicit list of column transformations.

use tracing::{debug, instrument};

use crate::IoError;
use crate::source::{TableHandle, TableQuery};

/// One transformation applied to a source field.
#[derive(Debug, Clone, PartialEq)]
pub enum Transform {
    /// Replace any of `from` in `field` with `to`; other values pass through.
    Recode {
        /// Field to rewrite.
        field: String,
        /// Values to collapse.
        from: Vec<String>,
        /// Replacement value.
        to: String,
    },
    /// Derive `target` = 1 where `field == positive`, else 0.
    Indicator {
        /// Source field.
        field: String,
        /// Name of the derived 0/1 column.
        target: String,
        /// Value mapped to 1.
        positive: String,
    },
    /// Remove fields that leak the outcome or are unused.
    Drop {
        /// Fields to remove.
        fields: Vec<String>,
    },
}

/// An ordered list of transformations turning raw rows into prepared rows.
///
/// # Defaults ([`FeaturePlan::bank_marketing`])
///
/// | Step | Effect |
/// |------|--------|
/// | recode `education` | `basic 4-year`, `basic 6-year`, `illiterate` become `less than 5 years` |
/// | indicator `resp` | 1 where `term_deposit == "yes"` |
/// | drop | `in_default`, `date`, `personal_loan`, `term_deposit` |
#[derive(Debug, Clone, PartialEq)]
pub struct FeaturePlan {
    steps: Vec<Transform>,
    response: String,
}

impl FeaturePlan {
    /// Create a plan from explicit steps and the name of the response it derives.
    #[must_use]
    pub fn new(steps: Vec<Transform>, response: &str) -> Self {
        Self {
            steps,
            response: response.to_string(),
        }
    }

    /// The plan for the bank-marketing contact table.
    #[must_use]
    pub fn bank_marketing() -> Self {
        let strings = |xs: &[&str]| xs.iter().map(|s| s.to_string()).collect::<Vec<_>>();
        Self::new(
            vec![
                Transform::Recode {
                    field: "education".into(),
                    from: strings(&["basic 4-year", "basic 6-year", "illiterate"]),
                    to: "less than 5 years".into(),
                },
                Transform::Indicator {
                    field: "term_deposit".into(),
                    target: "resp".into(),
                    positive: "yes".into(),
                },
                Transform::Drop {
                    fields: strings(&["in_default", "date", "personal_loan", "term_deposit"]),
                },
            ],
            "resp",
        )
    }

    /// Return the steps in application order.
    #[must_use]
    pub fn steps(&self) -> &[Transform] {
        &self.steps
    }

    /// Return the name of the derived response column.
    #[must_use]
    pub fn response(&self) -> &str {
        &self.response
    }

    /// Append this plan's steps to an existing query.
    #[must_use]
    pub fn apply(&self, query: TableQuery) -> TableQuery {
        self.steps.iter().fold(query, |q, step| match step {
            Transform::Recode { field, from, to } => q.recode(field, from, to),
            Transform::Indicator {
                field,
                target,
                positive,
            } => q.indicator(field, target, positive),
            Transform::Drop { fields } => q.drop_columns(fields),
        })
    }
}

/// Build the prepared-record query for `table`.
///
/// Only the plan is built; no rows are read. Every referenced field is checked
/// against the table header first.
///
/// # Errors
///
/// | Variant | Condition |
/// |---|---|
/// | [`IoError::MissingColumn`] | a step references a field the table lacks |
/// | [`IoError::DuplicateColumn`] | a derived column already exists |
#[instrument(skip_all, fields(table = %table.name(), n_steps = plan.steps.len()))]
pub fn prepare(table: &TableHandle, plan: &FeaturePlan) -> Result<TableQuery, IoError> {
    let query = plan.apply(table.query());
    let columns = query.columns()?;
    debug!(n_columns = columns.len(), "feature plan validated");
    Ok(query)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::Connection;
    use std::fs;
    use tempfile::TempDir;

    const BANK: &str = "\
job,education,in_default,date,personal_loan,term_deposit,percentile
admin.,basic 4-year,no,2008-05-05,no,yes,3
services,university degree,no,2008-05-05,yes,no,40
retired,illiterate,unknown,2008-05-06,no,no,90
admin.,basic 6-year,no,2008-05-06,no,yes,12
blue-collar,high school,no,2008-05-07,no,no,77
";

    fn bank_source(content: &str) -> (TempDir, TableHandle) {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("bank.csv"), content).unwrap();
        let conn = Connection::open(dir.path().to_str().unwrap()).unwrap();
        let table = conn.table("bank").unwrap();
        (dir, table)
    }

    #[test]
    fn education_is_collapsed() {
        let (_dir, table) = bank_source(BANK);
        let frame = prepare(&table, &FeaturePlan::bank_marketing())
            .unwrap()
            .collect()
            .unwrap();
        let edu = frame.column_index("education").unwrap();
        let values: Vec<&str> = frame.rows().iter().map(|r| r[edu].as_str()).collect();
        assert_eq!(
            values,
            vec![
                "less than 5 years",
                "university degree",
                "less than 5 years",
                "less than 5 years",
                "high school",
            ]
        );
    }

    #[test]
    fn resp_follows_term_deposit() {
        let (_dir, table) = bank_source(BANK);
        let frame = prepare(&table, &FeaturePlan::bank_marketing())
            .unwrap()
            .collect()
            .unwrap();
        let resp = frame.column_index("resp").unwrap();
        let values: Vec<&str> = frame.rows().iter().map(|r| r[resp].as_str()).collect();
        assert_eq!(values, vec!["1", "0", "0", "1", "0"]);
    }

    #[test]
    fn leakage_columns_are_removed() {
        let (_dir, table) = bank_source(BANK);
        let columns = prepare(&table, &FeaturePlan::bank_marketing())
            .unwrap()
            .columns()
            .unwrap();
        assert_eq!(columns, vec!["job", "education", "percentile", "resp"]);
    }

    #[test]
    fn missing_field_fails_before_reading() {
        let (_dir, table) = bank_source("job,education,term_deposit\nadmin.,x,yes\n");
        let err = prepare(&table, &FeaturePlan::bank_marketing()).unwrap_err();
        assert!(matches!(err, IoError::MissingColumn { ref column, .. } if column == "in_default"));
    }
}
