//! Panel data indexed by subject and period.

use crate::error::{Result, SkillOptError};
use std::collections::{BTreeMap, BTreeSet};

/// Identifier of one subject (one panel unit).
pub type SubjectId = u64;

/// Panel dataset: one row per `(subject, period)` with named `f64` columns.
///
/// Missing observations are stored as NaN. Rows are kept sorted by subject
/// and period regardless of insertion order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Dataset {
    columns: Vec<String>,
    rows: BTreeMap<(SubjectId, usize), Vec<f64>>,
}

impl Dataset {
    /// Empty dataset with the given column names.
    pub fn new<I, S>(columns: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let columns: Vec<String> = columns.into_iter().map(Into::into).collect();
        let mut seen = BTreeSet::new();
        for column in &columns {
            if !seen.insert(column.as_str()) {
                return Err(SkillOptError::Data(format!(
                    "column '{column}' appears more than once"
                )));
            }
        }
        Ok(Self {
            columns,
            rows: BTreeMap::new(),
        })
    }

    /// Add the row of `subject` in `period`. `values` follow the column order.
    pub fn push(&mut self, subject: SubjectId, period: usize, values: &[f64]) -> Result<()> {
        if values.len() != self.columns.len() {
            return Err(SkillOptError::DimensionMismatch(format!(
                "row ({subject}, {period}) has {} values for {} columns",
                values.len(),
                self.columns.len()
            )));
        }
        if self.rows.contains_key(&(subject, period)) {
            return Err(SkillOptError::Data(format!(
                "duplicate row for subject {subject} in period {period}"
            )));
        }
        self.rows.insert((subject, period), values.to_vec());
        Ok(())
    }

    /// Column names.
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Position of a column.
    pub fn column_position(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|column| column == name)
    }

    /// Number of `(subject, period)` rows.
    pub fn n_rows(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Distinct subjects, ascending.
    pub fn subjects(&self) -> Vec<SubjectId> {
        let mut subjects: Vec<SubjectId> = self.rows.keys().map(|(subject, _)| *subject).collect();
        subjects.dedup();
        subjects
    }

    /// Values of one row, if present.
    pub fn row(&self, subject: SubjectId, period: usize) -> Option<&[f64]> {
        self.rows.get(&(subject, period)).map(Vec::as_slice)
    }

    /// One cell; NaN when the row is absent or the value is missing.
    pub fn value(&self, subject: SubjectId, period: usize, column: &str) -> f64 {
        match (self.row(subject, period), self.column_position(column)) {
            (Some(row), Some(pos)) => row[pos],
            _ => f64::NAN,
        }
    }

    /// All rows in `(subject, period)` order.
    pub fn rows(&self) -> impl Iterator<Item = (SubjectId, usize, &[f64])> {
        self.rows
            .iter()
            .map(|((subject, period), values)| (*subject, *period, values.as_slice()))
    }
}
