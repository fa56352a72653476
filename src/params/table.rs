//! The parameter table.
//!
//! A [`ParamsTable`] pairs a shared [`ParamsIndex`] with one value and one
//! set of bounds per row. Values and bounds are the caller's to change; the
//! index never is.

use super::bounds::Bounds;
use super::index::{Category, ParamKey, ParamsIndex};
use super::template::template_keys;
use crate::constraints::query::Query;
use crate::error::{Result, SkillOptError};
use crate::specification::ModelSpecification;
use ndarray::Array1;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// A borrowed view of one table row.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParamEntry<'a> {
    pub key: &'a ParamKey,
    pub value: f64,
    pub bounds: Bounds,
}

/// Serialized form of one row. Unset values and infinite bounds are `null`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParamRecord {
    pub category: Category,
    pub period: Option<usize>,
    pub name1: String,
    pub name2: String,
    #[serde(default)]
    pub value: Option<f64>,
    #[serde(default)]
    pub lower_bound: Option<f64>,
    #[serde(default)]
    pub upper_bound: Option<f64>,
}

/// Canonical table of model parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct ParamsTable {
    index: ParamsIndex,
    values: Array1<f64>,
    bounds: Vec<Bounds>,
}

impl ParamsTable {
    /// Build the template implied by `spec`: every parameter, value NaN,
    /// unbounded, in canonical order.
    ///
    /// # Examples
    ///
    /// ```
    /// use skillopt_rs::params::ParamsTable;
    /// use skillopt_rs::specification::ModelSpecification;
    ///
    /// let spec = ModelSpecification::from_yaml_str(
    ///     "factors: {fac1: {measurements: [[y1, y2], [y1, y2]]}}",
    /// )
    /// .unwrap();
    /// let template = ParamsTable::template(&spec).unwrap();
    /// assert!(template.rows().all(|row| row.value.is_nan()));
    /// ```
    pub fn template(spec: &ModelSpecification) -> Result<Self> {
        let labels = spec.labels()?;
        let index = ParamsIndex::from_unsorted(template_keys(&labels))
            .map_err(|e| SkillOptError::Specification(format!("inconsistent parameter set: {e}")))?;
        Ok(Self::from_index(index))
    }

    /// A default-valued table over `index`.
    pub fn from_index(index: ParamsIndex) -> Self {
        let n = index.len();
        Self {
            index,
            values: Array1::from_elem(n, f64::NAN),
            bounds: vec![Bounds::unbounded(); n],
        }
    }

    pub fn index(&self) -> &ParamsIndex {
        &self.index
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Current values in canonical order.
    pub fn values(&self) -> &Array1<f64> {
        &self.values
    }

    /// Bounds in canonical order.
    pub fn bounds(&self) -> &[Bounds] {
        &self.bounds
    }

    /// Iterate over all rows in canonical order.
    pub fn rows(&self) -> impl Iterator<Item = ParamEntry<'_>> {
        self.index
            .iter()
            .zip(self.values.iter())
            .zip(self.bounds.iter())
            .map(|((key, value), bounds)| ParamEntry {
                key,
                value: *value,
                bounds: *bounds,
            })
    }

    /// Row at `position`.
    pub fn row(&self, position: usize) -> Option<ParamEntry<'_>> {
        let key = self.index.key(position)?;
        Some(ParamEntry {
            key,
            value: self.values[position],
            bounds: self.bounds[position],
        })
    }

    /// Row identified by `key`.
    pub fn get(&self, key: &ParamKey) -> Option<ParamEntry<'_>> {
        self.index.position(key).and_then(|pos| self.row(pos))
    }

    fn position_of(&self, key: &ParamKey) -> Result<usize> {
        self.index
            .position(key)
            .ok_or_else(|| SkillOptError::invalid_param(key, "not a parameter of this model"))
    }

    /// Set the value of the row identified by `key`.
    pub fn set_value(&mut self, key: &ParamKey, value: f64) -> Result<()> {
        let pos = self.position_of(key)?;
        self.values[pos] = value;
        Ok(())
    }

    /// Set the value of the row at `position`.
    pub fn set_value_at(&mut self, position: usize, value: f64) -> Result<()> {
        if position >= self.len() {
            return Err(SkillOptError::DimensionMismatch(format!(
                "row {position} does not exist in a table of {} rows",
                self.len()
            )));
        }
        self.values[position] = value;
        Ok(())
    }

    /// Replace all values at once.
    pub fn set_values(&mut self, values: Array1<f64>) -> Result<()> {
        if values.len() != self.len() {
            return Err(SkillOptError::DimensionMismatch(format!(
                "expected {} values, got {}",
                self.len(),
                values.len()
            )));
        }
        self.values = values;
        Ok(())
    }

    /// Merge `(key, value)` pairs into the table. Unknown keys are an error
    /// and leave the table unchanged.
    pub fn fill_values<I>(&mut self, values: I) -> Result<()>
    where
        I: IntoIterator<Item = (ParamKey, f64)>,
    {
        let mut updates = Vec::new();
        for (key, value) in values {
            updates.push((self.position_of(&key)?, value));
        }
        for (pos, value) in updates {
            self.values[pos] = value;
        }
        Ok(())
    }

    /// Set both bounds of the row identified by `key`.
    pub fn set_bounds(&mut self, key: &ParamKey, lower: f64, upper: f64) -> Result<()> {
        let pos = self.position_of(key)?;
        self.bounds[pos] = Bounds::new(lower, upper)?;
        Ok(())
    }

    /// Set the lower bound of the given rows, keeping their upper bounds.
    pub fn set_lower_bound_at(&mut self, positions: &[usize], lower: f64) -> Result<()> {
        self.update_bounds_at(positions, |bounds| Bounds::new(lower, bounds.upper))
    }

    /// Set the upper bound of the given rows, keeping their lower bounds.
    pub fn set_upper_bound_at(&mut self, positions: &[usize], upper: f64) -> Result<()> {
        self.update_bounds_at(positions, |bounds| Bounds::new(bounds.lower, upper))
    }

    fn update_bounds_at<F>(&mut self, positions: &[usize], update: F) -> Result<()>
    where
        F: Fn(&Bounds) -> std::result::Result<Bounds, super::bounds::BoundsError>,
    {
        let mut updated = Vec::with_capacity(positions.len());
        for &pos in positions {
            let current = self.bounds.get(pos).ok_or_else(|| {
                SkillOptError::DimensionMismatch(format!(
                    "row {pos} does not exist in a table of {} rows",
                    self.bounds.len()
                ))
            })?;
            updated.push((pos, update(current)?));
        }
        for (pos, bounds) in updated {
            self.bounds[pos] = bounds;
        }
        Ok(())
    }

    /// Positions of the rows matching a filter expression such as
    /// `"category == 'shock_sds' & name1 == 'fac3'"`.
    pub fn query(&self, expression: &str) -> Result<Vec<usize>> {
        let query = Query::parse(expression)?;
        Ok(self
            .index
            .iter()
            .enumerate()
            .filter(|(_, key)| query.matches(key))
            .map(|(pos, _)| pos)
            .collect())
    }

    /// Keys of rows whose value is still unset.
    pub fn unset(&self) -> Vec<&ParamKey> {
        self.rows()
            .filter(|row| row.value.is_nan())
            .map(|row| row.key)
            .collect()
    }

    /// Convert the table to serializable records.
    pub fn to_records(&self) -> Vec<ParamRecord> {
        self.rows()
            .map(|row| ParamRecord {
                category: row.key.category,
                period: row.key.period,
                name1: row.key.name1.clone(),
                name2: row.key.name2.clone(),
                value: (!row.value.is_nan()).then_some(row.value),
                lower_bound: row.bounds.has_lower_bound().then_some(row.bounds.lower),
                upper_bound: row.bounds.has_upper_bound().then_some(row.bounds.upper),
            })
            .collect()
    }

    /// Build a table from records in any order.
    pub fn from_records(records: Vec<ParamRecord>) -> Result<Self> {
        let mut rows = Vec::with_capacity(records.len());
        for record in records {
            let key = ParamKey {
                category: record.category,
                period: record.period,
                name1: record.name1,
                name2: record.name2,
            };
            let bounds = Bounds::new(
                record.lower_bound.unwrap_or(f64::NEG_INFINITY),
                record.upper_bound.unwrap_or(f64::INFINITY),
            )?;
            rows.push((key, record.value.unwrap_or(f64::NAN), bounds));
        }
        rows.sort_by(|a, b| a.0.cmp(&b.0));

        let mut keys = Vec::with_capacity(rows.len());
        let mut values = Vec::with_capacity(rows.len());
        let mut bounds = Vec::with_capacity(rows.len());
        for (key, value, row_bounds) in rows {
            keys.push(key);
            values.push(value);
            bounds.push(row_bounds);
        }

        Ok(Self {
            index: ParamsIndex::from_sorted(keys)?,
            values: Array1::from_vec(values),
            bounds,
        })
    }

    /// Serialize the table to pretty JSON records.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(&self.to_records())?)
    }

    /// Parse a table from JSON records.
    pub fn from_json(json: &str) -> Result<Self> {
        let records: Vec<ParamRecord> = serde_json::from_str(json)?;
        Self::from_records(records)
    }

    /// Save the table as JSON records.
    pub fn save_json<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        std::fs::write(path, self.to_json()?)?;
        Ok(())
    }

    /// Load a table from a JSON file.
    pub fn load_json<P: AsRef<Path>>(path: P) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }
}
