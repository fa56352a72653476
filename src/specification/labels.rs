//! Validated, flattened view of a model specification.
//!
//! Every consumer that needs to know which measurement exists in which
//! period works from [`ModelLabels`] rather than from the raw
//! specification, so the validation rules live in one place.

use super::{ModelSpecification, TransitionFunction};
use crate::error::{Result, SkillOptError};

/// Name of the implicit intercept control.
pub const CONSTANT: &str = "constant";

/// Name of the single initial-distribution component.
pub const MIXTURE: &str = "mixture_0";

/// Placeholder used as `name2` of unary parameters.
pub const UNARY: &str = "-";

/// Labels derived from a validated [`ModelSpecification`].
#[derive(Debug, Clone, PartialEq)]
pub struct ModelLabels {
    /// Factor names in canonical (sorted) order
    pub factors: Vec<String>,

    /// Transition function of every factor, aligned with `factors`
    pub transition_functions: Vec<TransitionFunction>,

    /// Control names, starting with [`CONSTANT`]
    pub controls: Vec<String>,

    /// Number of periods
    pub n_periods: usize,

    /// Distinct measurements per period, in order of first appearance
    pub measurements: Vec<Vec<String>>,

    /// `(measurement, factor)` loading pairs per period
    pub loadings: Vec<Vec<(String, String)>>,

    /// Stage of every transition period (`n_periods - 1` entries)
    pub stagemap: Vec<usize>,
}

impl ModelLabels {
    /// Validate `spec` and derive its labels.
    pub fn from_specification(spec: &ModelSpecification) -> Result<Self> {
        if spec.factors.is_empty() {
            return Err(SkillOptError::Specification(
                "the model needs at least one factor".to_string(),
            ));
        }

        let n_periods = spec.n_periods();
        if n_periods == 0 {
            return Err(SkillOptError::Specification(
                "the model needs at least one period of measurements".to_string(),
            ));
        }

        let mut factors = Vec::with_capacity(spec.factors.len());
        let mut transition_functions = Vec::with_capacity(spec.factors.len());
        let mut measurements: Vec<Vec<String>> = vec![Vec::new(); n_periods];
        let mut loadings: Vec<Vec<(String, String)>> = vec![Vec::new(); n_periods];

        for (factor, factor_spec) in &spec.factors {
            if factor.is_empty() || factor.contains('-') {
                return Err(SkillOptError::Specification(format!(
                    "invalid factor name '{factor}': names must be non-empty and must not contain '-'"
                )));
            }
            if factor_spec.measurements.len() != n_periods {
                return Err(SkillOptError::Specification(format!(
                    "factor '{factor}' has measurements for {} periods, expected {n_periods}",
                    factor_spec.measurements.len()
                )));
            }

            for (period, period_measurements) in factor_spec.measurements.iter().enumerate() {
                for meas in period_measurements {
                    if loadings[period].iter().any(|(m, f)| m == meas && f == factor) {
                        return Err(SkillOptError::Specification(format!(
                            "measurement '{meas}' is listed twice for factor '{factor}' in period {period}"
                        )));
                    }
                    if !measurements[period].contains(meas) {
                        measurements[period].push(meas.clone());
                    }
                    loadings[period].push((meas.clone(), factor.clone()));
                }
            }

            let norms = &factor_spec.normalizations;
            for (kind, per_period) in [("loadings", &norms.loadings), ("intercepts", &norms.intercepts)]
            {
                if per_period.len() > n_periods {
                    return Err(SkillOptError::Specification(format!(
                        "factor '{factor}' has {kind} normalizations for {} periods, but the model has {n_periods}",
                        per_period.len()
                    )));
                }
                for (period, normalized) in per_period.iter().enumerate() {
                    for meas in normalized.keys() {
                        if !factor_spec.measurements[period].contains(meas) {
                            return Err(SkillOptError::Specification(format!(
                                "{kind} normalization of factor '{factor}' in period {period} refers to \
                                 '{meas}', which does not measure that factor in that period"
                            )));
                        }
                    }
                }
            }

            factors.push(factor.clone());
            transition_functions.push(factor_spec.transition_function);
        }

        let mut controls = vec![CONSTANT.to_string()];
        for control in &spec.controls {
            if controls.contains(control) {
                return Err(SkillOptError::Specification(format!(
                    "control '{control}' is listed twice or shadows the implicit constant"
                )));
            }
            controls.push(control.clone());
        }

        let n_transitions = n_periods - 1;
        let stagemap = match &spec.stagemap {
            None => (0..n_transitions).collect(),
            Some(stagemap) => {
                if stagemap.len() != n_transitions {
                    return Err(SkillOptError::Specification(format!(
                        "stagemap has {} entries, expected one per transition ({n_transitions})",
                        stagemap.len()
                    )));
                }
                let n_stages = stagemap.iter().max().map_or(0, |max| max + 1);
                for stage in 0..n_stages {
                    if !stagemap.contains(&stage) {
                        return Err(SkillOptError::Specification(format!(
                            "stagemap skips stage {stage}; stages must be numbered 0, 1, 2, ..."
                        )));
                    }
                }
                stagemap.clone()
            }
        };

        Ok(Self {
            factors,
            transition_functions,
            controls,
            n_periods,
            measurements,
            loadings,
            stagemap,
        })
    }

    /// Number of latent factors.
    pub fn n_factors(&self) -> usize {
        self.factors.len()
    }

    /// Position of `factor` in the canonical factor order.
    pub fn factor_position(&self, factor: &str) -> Option<usize> {
        self.factors.iter().position(|f| f == factor)
    }

    /// Factors with a linear transition, in canonical order.
    pub fn linear_factors(&self) -> impl Iterator<Item = &String> {
        self.factors
            .iter()
            .zip(&self.transition_functions)
            .filter(|(_, function)| **function == TransitionFunction::Linear)
            .map(|(factor, _)| factor)
    }

    /// Coefficient names of a linear transition equation.
    pub fn transition_coefficients(&self) -> Vec<String> {
        let mut names = self.factors.clone();
        names.push(CONSTANT.to_string());
        names
    }

    /// Names of the lower-triangular initial Cholesky factor entries,
    /// row-major, as `"row-col"`.
    pub fn cholcov_names(&self) -> Vec<String> {
        let mut names = Vec::new();
        for (row, row_factor) in self.factors.iter().enumerate() {
            for col_factor in &self.factors[..=row] {
                names.push(format!("{row_factor}-{col_factor}"));
            }
        }
        names
    }

    /// Transition periods grouped by stage. Stage `s` is at position `s`.
    pub fn stages(&self) -> Vec<Vec<usize>> {
        let n_stages = self.stagemap.iter().max().map_or(0, |max| max + 1);
        let mut stages = vec![Vec::new(); n_stages];
        for (period, stage) in self.stagemap.iter().enumerate() {
            stages[*stage].push(period);
        }
        stages
    }
}
