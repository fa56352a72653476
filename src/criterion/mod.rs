//! # Criterion Functions
//!
//! The five log-likelihood variants an optimizer consumes:
//!
//! - [`CriterionFamily::debug_loglike`]: value plus diagnostics, sequential
//! - [`CriterionFamily::loglike`]: value
//! - [`CriterionFamily::gradient`]: derivative with respect to the free vector
//! - [`CriterionFamily::jacobian`]: per-subject derivatives (subjects × free)
//! - [`CriterionFamily::loglike_and_gradient`]: value and gradient together
//!
//! The table-accepting variants validate the table against the normalized
//! constraints once and then call the matching `*_at` method, which takes
//! a free vector and performs no validation. Optimizers work on the `*_at`
//! methods directly, or on the `*_within` methods, which keep every
//! finite-difference evaluation inside the box bounds of the free vector.
//! The table variants difference within the bounds of the table.

pub mod finite_difference;

pub use finite_difference::FiniteDifference;

use crate::constraints::NormalizedConstraints;
use crate::error::{Result, SkillOptError};
use crate::likelihood::{DebugTrace, LikelihoodEngine};
use crate::params::ParamsTable;
use ndarray::{Array1, Array2, ArrayView1};
use std::fmt;
use std::sync::Arc;

/// Result of [`CriterionFamily::debug_loglike`].
#[derive(Debug, Clone, PartialEq)]
pub struct DebugLoglike {
    /// Log-likelihood, identical to [`CriterionFamily::loglike`]
    pub value: f64,

    /// Free vector the evaluation started from
    pub free_params: Array1<f64>,

    /// Full parameter vector after applying the constraints
    pub params: Array1<f64>,

    /// Intermediate results of the engine
    pub trace: DebugTrace,
}

/// Box of the free vector as `(lower, upper)`.
pub type FreeBox<'b> = (&'b Array1<f64>, &'b Array1<f64>);

/// Contributions and, when requested, their derivatives.
struct Evaluation {
    contributions: Array1<f64>,
    jacobian: Option<Array2<f64>>,
}

impl Evaluation {
    fn value(&self) -> f64 {
        total(&self.contributions)
    }

    fn gradient(&self) -> Result<Array1<f64>> {
        let jacobian = self.jacobian.as_ref().ok_or_else(|| {
            SkillOptError::FunctionEvaluation("derivatives were not computed".to_string())
        })?;
        Ok(jacobian
            .columns()
            .into_iter()
            .map(total_view)
            .collect())
    }
}

/// Sum in subject order, so every variant reports the same value.
fn total(contributions: &Array1<f64>) -> f64 {
    total_view(contributions.view())
}

fn total_view(values: ArrayView1<'_, f64>) -> f64 {
    values.iter().fold(0.0, |acc, value| acc + value)
}

/// Log-likelihood functions over a fixed dataset, model and constraint set.
#[derive(Clone)]
pub struct CriterionFamily {
    engine: Arc<dyn LikelihoodEngine>,
    constraints: Arc<NormalizedConstraints>,
    differences: FiniteDifference,
}

impl fmt::Debug for CriterionFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CriterionFamily")
            .field("n_params", &self.engine.n_params())
            .field("n_observations", &self.engine.n_observations())
            .field("n_free", &self.constraints.n_free())
            .field("differences", &self.differences)
            .finish()
    }
}

impl CriterionFamily {
    /// Bind `engine` to a constraint set.
    pub fn new(
        engine: Arc<dyn LikelihoodEngine>,
        constraints: NormalizedConstraints,
        differences: FiniteDifference,
    ) -> Result<Self> {
        if engine.n_params() != constraints.index().len() {
            return Err(SkillOptError::DimensionMismatch(format!(
                "engine expects {} parameters but the constraints cover {} rows",
                engine.n_params(),
                constraints.index().len()
            )));
        }
        Ok(Self {
            engine,
            constraints: Arc::new(constraints),
            differences,
        })
    }

    /// Same engine and difference options under another constraint set.
    pub fn with_constraints(&self, constraints: NormalizedConstraints) -> Result<Self> {
        Self::new(Arc::clone(&self.engine), constraints, self.differences)
    }

    pub fn constraints(&self) -> &NormalizedConstraints {
        &self.constraints
    }

    pub fn engine(&self) -> &Arc<dyn LikelihoodEngine> {
        &self.engine
    }

    pub fn finite_difference(&self) -> FiniteDifference {
        self.differences
    }

    /// Length of the free vector.
    pub fn n_free(&self) -> usize {
        self.constraints.n_free()
    }

    /// Number of per-subject contributions.
    pub fn n_observations(&self) -> usize {
        self.engine.n_observations()
    }

    /// Validated free vector of `table`.
    pub fn free_params(&self, table: &ParamsTable) -> Result<Array1<f64>> {
        self.constraints.free_values(table)
    }

    /// Free vector and free bounds of a validated table.
    fn validated(&self, table: &ParamsTable) -> Result<(Array1<f64>, Array1<f64>, Array1<f64>)> {
        let free = self.free_params(table)?;
        let (lower, upper) = self.constraints.free_bounds(table)?;
        Ok((free, lower, upper))
    }

    fn evaluate(
        &self,
        free: ArrayView1<'_, f64>,
        derivatives: bool,
        bounds: Option<FreeBox<'_>>,
    ) -> Result<Evaluation> {
        let contributions = self.contributions_at(free)?;
        let jacobian = if derivatives {
            let x = free.to_owned();
            Some(self.differences.jacobian_within(
                |point| self.contributions_at(point.view()),
                &x,
                &contributions,
                bounds,
            )?)
        } else {
            None
        };
        Ok(Evaluation {
            contributions,
            jacobian,
        })
    }

    /// Per-subject contributions at a free vector.
    pub fn contributions_at(&self, free: ArrayView1<'_, f64>) -> Result<Array1<f64>> {
        let params = self.constraints.expand(free);
        let contributions = self.engine.contributions(params.view())?;
        if contributions.len() != self.engine.n_observations() {
            return Err(SkillOptError::FunctionEvaluation(format!(
                "engine returned {} contributions for {} subjects",
                contributions.len(),
                self.engine.n_observations()
            )));
        }
        Ok(contributions)
    }

    pub fn debug_loglike_at(&self, free: ArrayView1<'_, f64>) -> Result<DebugLoglike> {
        let params = self.constraints.expand(free);
        let trace = self.engine.debug_contributions(params.view())?;
        Ok(DebugLoglike {
            value: total(&trace.contributions),
            free_params: free.to_owned(),
            params,
            trace,
        })
    }

    pub fn loglike_at(&self, free: ArrayView1<'_, f64>) -> Result<f64> {
        Ok(self.evaluate(free, false, None)?.value())
    }

    pub fn gradient_at(&self, free: ArrayView1<'_, f64>) -> Result<Array1<f64>> {
        self.evaluate(free, true, None)?.gradient()
    }

    pub fn jacobian_at(&self, free: ArrayView1<'_, f64>) -> Result<Array2<f64>> {
        self.jacobian_within(free, None)
    }

    pub fn loglike_and_gradient_at(&self, free: ArrayView1<'_, f64>) -> Result<(f64, Array1<f64>)> {
        self.loglike_and_gradient_within(free, None)
    }

    pub fn gradient_within(
        &self,
        free: ArrayView1<'_, f64>,
        bounds: Option<FreeBox<'_>>,
    ) -> Result<Array1<f64>> {
        self.evaluate(free, true, bounds)?.gradient()
    }

    pub fn jacobian_within(
        &self,
        free: ArrayView1<'_, f64>,
        bounds: Option<FreeBox<'_>>,
    ) -> Result<Array2<f64>> {
        self.evaluate(free, true, bounds)?.jacobian.ok_or_else(|| {
            SkillOptError::FunctionEvaluation("derivatives were not computed".to_string())
        })
    }

    /// Value and gradient, differencing only inside `bounds`.
    pub fn loglike_and_gradient_within(
        &self,
        free: ArrayView1<'_, f64>,
        bounds: Option<FreeBox<'_>>,
    ) -> Result<(f64, Array1<f64>)> {
        let evaluation = self.evaluate(free, true, bounds)?;
        Ok((evaluation.value(), evaluation.gradient()?))
    }

    /// Log-likelihood with diagnostics. Runs sequentially.
    pub fn debug_loglike(&self, table: &ParamsTable) -> Result<DebugLoglike> {
        let free = self.free_params(table)?;
        self.debug_loglike_at(free.view())
    }

    /// Log-likelihood of the data at `table`.
    ///
    /// # Errors
    ///
    /// [`SkillOptError::ParameterValidation`] if the table is laid out on a
    /// different index, or a free value is unset, non-finite, out of bounds
    /// or disagrees with a tied row.
    pub fn loglike(&self, table: &ParamsTable) -> Result<f64> {
        let free = self.free_params(table)?;
        self.loglike_at(free.view())
    }

    /// Gradient with respect to the free vector. Fixed rows have no entry;
    /// tied rows share one.
    pub fn gradient(&self, table: &ParamsTable) -> Result<Array1<f64>> {
        let (free, lower, upper) = self.validated(table)?;
        self.gradient_within(free.view(), Some((&lower, &upper)))
    }

    /// Derivative of every subject's contribution with respect to the free
    /// vector.
    pub fn jacobian(&self, table: &ParamsTable) -> Result<Array2<f64>> {
        let (free, lower, upper) = self.validated(table)?;
        self.jacobian_within(free.view(), Some((&lower, &upper)))
    }

    /// Value and gradient from a single derivative pass.
    pub fn loglike_and_gradient(&self, table: &ParamsTable) -> Result<(f64, Array1<f64>)> {
        let (free, lower, upper) = self.validated(table)?;
        self.loglike_and_gradient_within(free.view(), Some((&lower, &upper)))
    }
}
