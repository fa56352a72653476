//! # Model Specification
//!
//! A declarative description of a latent factor model: which measurements
//! load on which factor in every period, how factors evolve between periods,
//! and which loadings or intercepts are normalized. The specification alone
//! determines the parameter template, so everything here is validated up
//! front and then treated as immutable.
//!
//! Specifications are usually written as YAML or JSON:
//!
//! ```rust
//! use skillopt_rs::specification::ModelSpecification;
//!
//! let spec = ModelSpecification::from_yaml_str(
//!     r#"
//! factors:
//!   fac1:
//!     measurements: [[y1, y2], [y1, y2]]
//!     normalizations:
//!       loadings: [{y1: 1.0}, {y1: 1.0}]
//!     transition_function: linear
//! controls: [x1]
//! "#,
//! )
//! .unwrap();
//! assert_eq!(spec.n_periods(), 2);
//! ```

pub mod labels;

pub use labels::{ModelLabels, CONSTANT, MIXTURE, UNARY};

use crate::error::{Result, SkillOptError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// Law of motion of a single factor between consecutive periods.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransitionFunction {
    /// Linear combination of all factors plus a constant, with a normal shock
    #[default]
    Linear,

    /// The factor keeps its value; no transition or shock parameters
    Constant,
}

/// Finite difference scheme used by the derivative variants.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiffMethod {
    /// Symmetric differences, one extra evaluation pair per free parameter
    #[default]
    Central,

    /// One-sided differences that reuse the base evaluation
    Forward,
}

/// Normalizations of one factor, one map per period.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Normalizations {
    /// Fixed loadings: measurement name to loading value
    #[serde(default)]
    pub loadings: Vec<BTreeMap<String, f64>>,

    /// Fixed intercepts: measurement name to intercept value
    #[serde(default)]
    pub intercepts: Vec<BTreeMap<String, f64>>,
}

/// Specification of a single latent factor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FactorSpec {
    /// Measurement names per period
    pub measurements: Vec<Vec<String>>,

    #[serde(default)]
    pub normalizations: Normalizations,

    #[serde(default)]
    pub transition_function: TransitionFunction,
}

/// Options that tune evaluation without changing the parameter set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EstimationOptions {
    /// Relative step of the finite difference derivatives. Default: 1e-6
    #[serde(default = "default_finite_difference_step")]
    pub finite_difference_step: f64,

    /// Finite difference scheme. Default: Central
    #[serde(default)]
    pub finite_difference_method: DiffMethod,
}

fn default_finite_difference_step() -> f64 {
    1e-6
}

impl Default for EstimationOptions {
    fn default() -> Self {
        Self {
            finite_difference_step: default_finite_difference_step(),
            finite_difference_method: DiffMethod::default(),
        }
    }
}

/// Declarative description of a latent factor state-space model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelSpecification {
    /// Factors by name. Factors are ordered by name everywhere.
    pub factors: BTreeMap<String, FactorSpec>,

    /// Names of observed control variables (the constant is implicit)
    #[serde(default)]
    pub controls: Vec<String>,

    /// Stage of every transition period. Periods of one stage share their
    /// transition and shock parameters.
    #[serde(default)]
    pub stagemap: Option<Vec<usize>>,

    #[serde(default)]
    pub estimation_options: EstimationOptions,
}

impl ModelSpecification {
    /// Parse a specification from a JSON string.
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Parse a specification from a YAML string.
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    /// Load a specification from a `.json`, `.yaml` or `.yml` file.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("json") => Self::from_json_str(&content),
            Some("yaml") | Some("yml") => Self::from_yaml_str(&content),
            _ => Err(SkillOptError::Specification(format!(
                "unsupported specification file '{}': expected .json, .yaml or .yml",
                path.display()
            ))),
        }
    }

    /// Serialize the specification to pretty JSON.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Number of periods, taken from the longest measurement list.
    pub fn n_periods(&self) -> usize {
        self.factors
            .values()
            .map(|factor| factor.measurements.len())
            .max()
            .unwrap_or(0)
    }

    /// Validate the specification and derive its labels.
    pub fn labels(&self) -> Result<ModelLabels> {
        ModelLabels::from_specification(self)
    }
}
