//! Everything an optimizer needs to estimate a model on a dataset.

use crate::constraints::{ConstraintSpec, Loc, NormalizedConstraints};
use crate::criterion::{CriterionFamily, DebugLoglike};
use crate::error::Result;
use crate::likelihood::{Dataset, KalmanEngine};
use crate::params::{Category, ParamKey, ParamsTable};
use crate::specification::{ModelSpecification, CONSTANT};
use ndarray::{Array1, Array2};
use std::sync::Arc;
use tracing::info;

/// Parameter template, default constraints and criterion functions of one
/// model and dataset.
#[derive(Debug, Clone)]
pub struct MaximizationInputs {
    params_template: ParamsTable,
    constraints: Vec<ConstraintSpec>,
    family: CriterionFamily,
}

/// Build the maximization inputs of `spec` on `data`.
///
/// The dataset is validated and copied into the engine once; the returned
/// functions never look at `data` again.
///
/// # Errors
///
/// * [`crate::SkillOptError::Specification`] for an invalid specification
/// * [`crate::SkillOptError::Data`] if `data` lacks a measurement or control
///   column, or an observed measurement has a missing control
pub fn get_maximization_inputs(spec: &ModelSpecification, data: &Dataset) -> Result<MaximizationInputs> {
    let params_template = ParamsTable::template(spec)?;
    let constraints = default_constraints(spec)?;
    let normalized = NormalizedConstraints::new(params_template.index(), &constraints)?;
    let engine = KalmanEngine::new(spec, params_template.index(), data)?;
    let family = CriterionFamily::new(
        Arc::new(engine),
        normalized,
        spec.estimation_options.clone().into(),
    )?;

    info!(
        n_params = params_template.len(),
        n_constraints = constraints.len(),
        n_free = family.n_free(),
        n_subjects = family.n_observations(),
        "built maximization inputs"
    );

    Ok(MaximizationInputs {
        params_template,
        constraints,
        family,
    })
}

/// Constraints implied by the specification itself.
///
/// Normalized loadings and intercepts are fixed. Transition periods of one
/// stage share their transition and shock parameters through pairwise
/// equalities over whole periods.
pub fn default_constraints(spec: &ModelSpecification) -> Result<Vec<ConstraintSpec>> {
    let labels = spec.labels()?;
    let mut constraints = Vec::new();

    for (factor, factor_spec) in &spec.factors {
        let normalizations = &factor_spec.normalizations;
        for (period, loadings) in normalizations.loadings.iter().enumerate() {
            for (meas, value) in loadings {
                let key = ParamKey::new(Category::Loadings, period, meas, factor);
                constraints.push(ConstraintSpec::fixed_loc(Loc::exact(&key), *value));
            }
        }
        for (period, intercepts) in normalizations.intercepts.iter().enumerate() {
            for (meas, value) in intercepts {
                let key = ParamKey::new(Category::Controls, period, meas, CONSTANT);
                constraints.push(ConstraintSpec::fixed_loc(Loc::exact(&key), *value));
            }
        }
    }

    if labels.linear_factors().next().is_some() {
        for periods in labels.stages().into_iter().filter(|periods| periods.len() > 1) {
            for category in [Category::Transition, Category::ShockSds] {
                constraints.push(ConstraintSpec::pairwise_locs(
                    periods.iter().map(|&period| Loc::period(category, period)),
                ));
            }
        }
    }

    Ok(constraints)
}

impl MaximizationInputs {
    /// Every parameter of the model in canonical order, values unset.
    pub fn params_template(&self) -> &ParamsTable {
        &self.params_template
    }

    /// Constraints implied by the specification.
    pub fn constraints(&self) -> &[ConstraintSpec] {
        &self.constraints
    }

    /// The default constraints in normalized form.
    pub fn normalized(&self) -> &NormalizedConstraints {
        self.family.constraints()
    }

    /// Criterion functions under the default constraints.
    pub fn family(&self) -> &CriterionFamily {
        &self.family
    }

    /// Criterion functions under the default constraints plus `extra`.
    ///
    /// # Errors
    ///
    /// Any error of [`NormalizedConstraints::new`], e.g. an `extra` rule
    /// that fixes a normalized-equal row.
    pub fn with_constraints(&self, extra: &[ConstraintSpec]) -> Result<CriterionFamily> {
        let mut all = self.constraints.clone();
        all.extend_from_slice(extra);
        let normalized = NormalizedConstraints::new(self.params_template.index(), &all)?;
        info!(n_extra = extra.len(), n_free = normalized.n_free(), "added constraints");
        self.family.with_constraints(normalized)
    }

    pub fn debug_loglike(&self, params: &ParamsTable) -> Result<DebugLoglike> {
        self.family.debug_loglike(params)
    }

    pub fn loglike(&self, params: &ParamsTable) -> Result<f64> {
        self.family.loglike(params)
    }

    pub fn gradient(&self, params: &ParamsTable) -> Result<Array1<f64>> {
        self.family.gradient(params)
    }

    pub fn jacobian(&self, params: &ParamsTable) -> Result<Array2<f64>> {
        self.family.jacobian(params)
    }

    pub fn loglike_and_gradient(&self, params: &ParamsTable) -> Result<(f64, Array1<f64>)> {
        self.family.loglike_and_gradient(params)
    }
}
