//! # Optimizer Boundary
//!
//! A [`Maximizer`] consumes a [`MaximizationProblem`] (criterion family,
//! start values and box bounds over the free vector) and returns an
//! [`OptimizationResult`]. [`maximize`] runs the round trip from a filled
//! parameter table to an estimated one.
//!
//! ```rust,no_run
//! # use skillopt_rs::criterion::CriterionFamily;
//! # use skillopt_rs::params::ParamsTable;
//! use skillopt_rs::optimizer::{maximize, ProjectedGradientAscent};
//!
//! # fn run(family: &CriterionFamily, start: &ParamsTable) -> skillopt_rs::Result<()> {
//! let (estimates, result) = maximize(family, start, &ProjectedGradientAscent::new())?;
//! println!("{}: {}", result.status.description(), result.value);
//! # Ok(())
//! # }
//! ```

pub mod ascent;
pub mod convergence;

pub use ascent::{AscentConfig, ProjectedGradientAscent};
pub use convergence::{ConvergenceCriteria, ConvergenceStatus};

use crate::criterion::CriterionFamily;
use crate::error::Result;
use crate::params::ParamsTable;
use ndarray::Array1;
use tracing::info;

/// Everything a maximizer needs, expressed over the free vector.
#[derive(Debug, Clone)]
pub struct MaximizationProblem<'a> {
    family: &'a CriterionFamily,
    start: Array1<f64>,
    lower: Array1<f64>,
    upper: Array1<f64>,
}

impl<'a> MaximizationProblem<'a> {
    /// Problem starting from the values of `table`, bounded by the
    /// intersected bounds of every free parameter.
    pub fn from_table(family: &'a CriterionFamily, table: &ParamsTable) -> Result<Self> {
        let start = family.free_params(table)?;
        let (lower, upper) = family.constraints().free_bounds(table)?;
        Ok(Self {
            family,
            start,
            lower,
            upper,
        })
    }

    pub fn family(&self) -> &'a CriterionFamily {
        self.family
    }

    pub fn start(&self) -> &Array1<f64> {
        &self.start
    }

    pub fn lower(&self) -> &Array1<f64> {
        &self.lower
    }

    pub fn upper(&self) -> &Array1<f64> {
        &self.upper
    }
}

/// Outcome of a maximization over the free vector.
#[derive(Debug, Clone, PartialEq)]
pub struct OptimizationResult {
    /// Free vector at the optimum
    pub params: Array1<f64>,

    /// Criterion value at `params`
    pub value: f64,

    /// Gradient at `params`
    pub gradient: Array1<f64>,

    pub status: ConvergenceStatus,

    /// Accepted steps
    pub iterations: usize,

    /// Criterion evaluations, counting value and gradient passes
    pub evaluations: usize,
}

/// Maximizes a criterion family over its free vector.
pub trait Maximizer {
    fn maximize(&self, problem: &MaximizationProblem<'_>) -> Result<OptimizationResult>;
}

/// Maximize `family` starting from `start` and write the estimates back into
/// a copy of the table.
pub fn maximize<M>(
    family: &CriterionFamily,
    start: &ParamsTable,
    maximizer: &M,
) -> Result<(ParamsTable, OptimizationResult)>
where
    M: Maximizer + ?Sized,
{
    let problem = MaximizationProblem::from_table(family, start)?;
    info!(n_free = family.n_free(), "starting maximization");
    let result = maximizer.maximize(&problem)?;
    let estimates = family.constraints().to_table(start, result.params.view())?;
    Ok((estimates, result))
}
