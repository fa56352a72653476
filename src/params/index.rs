//! The canonical parameter index.
//!
//! A parameter is identified by `(category, period, name1, name2)`. The
//! index stores these keys strictly increasing, so a row position is a
//! pure function of the key set, and every holder of a position (the
//! constraint partition, the likelihood engine, the optimizer's free
//! vector) agrees on it. The index is immutable and shared by `Arc`.

use crate::error::{Result, SkillOptError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// The part of the model a parameter belongs to.
///
/// The declaration order is the canonical category order of the table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    /// Measurement intercepts and control coefficients
    Controls,

    /// Factor loadings of measurements
    Loadings,

    /// Measurement error standard deviations
    MeasSds,

    /// Transition shock standard deviations
    ShockSds,

    /// Means of the initial factor distribution
    InitialStates,

    /// Lower Cholesky factor of the initial covariance
    InitialCholcovs,

    /// Transition equation coefficients
    Transition,
}

impl Category {
    /// All categories in canonical order.
    pub const ALL: [Category; 7] = [
        Category::Controls,
        Category::Loadings,
        Category::MeasSds,
        Category::ShockSds,
        Category::InitialStates,
        Category::InitialCholcovs,
        Category::Transition,
    ];

    /// The category name used in queries and serialized tables.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Controls => "controls",
            Self::Loadings => "loadings",
            Self::MeasSds => "meas_sds",
            Self::ShockSds => "shock_sds",
            Self::InitialStates => "initial_states",
            Self::InitialCholcovs => "initial_cholcovs",
            Self::Transition => "transition",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|category| category.as_str() == s)
            .ok_or_else(|| format!("unknown parameter category '{s}'"))
    }
}

/// Identity of one parameter row. Ordering is the canonical table order.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ParamKey {
    pub category: Category,
    pub period: Option<usize>,
    pub name1: String,
    pub name2: String,
}

impl ParamKey {
    /// Create a key for a time-indexed parameter.
    pub fn new(category: Category, period: usize, name1: &str, name2: &str) -> Self {
        Self {
            category,
            period: Some(period),
            name1: name1.to_string(),
            name2: name2.to_string(),
        }
    }

    /// Create a key for a time-invariant parameter.
    pub fn time_invariant(category: Category, name1: &str, name2: &str) -> Self {
        Self {
            category,
            period: None,
            name1: name1.to_string(),
            name2: name2.to_string(),
        }
    }
}

impl fmt::Display for ParamKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.period {
            Some(period) => write!(
                f,
                "({}, {}, {}, {})",
                self.category, period, self.name1, self.name2
            ),
            None => write!(
                f,
                "({}, None, {}, {})",
                self.category, self.name1, self.name2
            ),
        }
    }
}

/// Immutable, strictly ordered set of parameter keys.
#[derive(Debug, Clone)]
pub struct ParamsIndex {
    keys: Arc<[ParamKey]>,
}

impl ParamsIndex {
    /// Build an index from keys that are already strictly increasing.
    pub fn from_sorted(keys: Vec<ParamKey>) -> Result<Self> {
        if let Some(pair) = keys.windows(2).find(|pair| pair[0] >= pair[1]) {
            let message = if pair[0] == pair[1] {
                "duplicate parameter in index"
            } else {
                "parameter index is not in canonical order"
            };
            return Err(SkillOptError::invalid_param(&pair[1], message));
        }
        Ok(Self { keys: keys.into() })
    }

    /// Build an index from keys in any order; duplicates are an error.
    pub fn from_unsorted(mut keys: Vec<ParamKey>) -> Result<Self> {
        keys.sort();
        Self::from_sorted(keys)
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// All keys in canonical order.
    pub fn keys(&self) -> &[ParamKey] {
        &self.keys
    }

    /// Key at row `position`.
    pub fn key(&self, position: usize) -> Option<&ParamKey> {
        self.keys.get(position)
    }

    /// Row position of `key`.
    pub fn position(&self, key: &ParamKey) -> Option<usize> {
        self.keys.binary_search(key).ok()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ParamKey> {
        self.keys.iter()
    }
}

impl PartialEq for ParamsIndex {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.keys, &other.keys) || self.keys == other.keys
    }
}

impl Eq for ParamsIndex {}
