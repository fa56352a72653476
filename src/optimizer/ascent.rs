//! Projected gradient ascent with Armijo backtracking.

use super::convergence::{ConvergenceCriteria, ConvergenceStatus};
use super::{MaximizationProblem, Maximizer, OptimizationResult};
use crate::error::{Result, SkillOptError};
use ndarray::Array1;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Configuration of [`ProjectedGradientAscent`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AscentConfig {
    /// Maximum number of accepted steps. Default: 500
    pub max_iterations: usize,

    /// Step length of the first trial. Default: 1e-2
    pub initial_step: f64,

    /// Factor applied to the step after a rejected trial. Default: 0.5
    pub shrink_factor: f64,

    /// Factor applied to the step after an accepted trial. Default: 2.0
    pub grow_factor: f64,

    /// Smallest step tried before giving up. Default: 1e-14
    pub min_step: f64,

    /// Sufficient increase constant of the Armijo condition. Default: 1e-4
    pub armijo: f64,

    #[serde(flatten)]
    pub convergence: ConvergenceCriteria,
}

impl Default for AscentConfig {
    fn default() -> Self {
        Self {
            max_iterations: 500,
            initial_step: 1e-2,
            shrink_factor: 0.5,
            grow_factor: 2.0,
            min_step: 1e-14,
            armijo: 1e-4,
            convergence: ConvergenceCriteria::default(),
        }
    }
}

/// Maximizes by stepping along the gradient and projecting onto the box
/// bounds of the free parameters.
#[derive(Debug, Clone, Default)]
pub struct ProjectedGradientAscent {
    config: AscentConfig,
}

impl ProjectedGradientAscent {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: AscentConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &AscentConfig {
        &self.config
    }

    fn validate_config(&self) -> Result<()> {
        let c = &self.config;
        if !(c.initial_step > 0.0 && c.min_step > 0.0) {
            return Err(SkillOptError::OptimizationFailure(
                "step lengths must be positive".to_string(),
            ));
        }
        if !(c.shrink_factor > 0.0 && c.shrink_factor < 1.0) || c.grow_factor < 1.0 {
            return Err(SkillOptError::OptimizationFailure(format!(
                "need 0 < shrink_factor < 1 <= grow_factor, got {} and {}",
                c.shrink_factor, c.grow_factor
            )));
        }
        Ok(())
    }
}

fn project(x: &Array1<f64>, lower: &Array1<f64>, upper: &Array1<f64>) -> Array1<f64> {
    let mut projected = x.clone();
    for ((value, lo), hi) in projected.iter_mut().zip(lower).zip(upper) {
        *value = value.max(*lo).min(*hi);
    }
    projected
}

fn norm(x: &Array1<f64>) -> f64 {
    x.dot(x).sqrt()
}

impl Maximizer for ProjectedGradientAscent {
    fn maximize(&self, problem: &MaximizationProblem<'_>) -> Result<OptimizationResult> {
        self.validate_config()?;
        let family = problem.family();
        let (lower, upper) = (problem.lower(), problem.upper());

        let mut x = project(problem.start(), lower, upper);
        let bounds = Some((lower, upper));
        let (mut value, mut gradient) = family.loglike_and_gradient_within(x.view(), bounds)?;
        let mut evaluations = 1;
        if !value.is_finite() {
            return Err(SkillOptError::OptimizationFailure(format!(
                "criterion is {value} at the start values"
            )));
        }

        let mut step = self.config.initial_step;
        let mut status = ConvergenceStatus::MaxIterationsReached;
        let mut iterations = 0;

        while iterations < self.config.max_iterations {
            let projected_gradient = project(&(&x + &gradient), lower, upper) - &x;
            if norm(&projected_gradient) < self.config.convergence.gradient_tolerance {
                status = ConvergenceStatus::GradientConvergence;
                break;
            }

            let accepted = loop {
                if step < self.config.min_step {
                    break None;
                }
                let trial = project(&(&x + &(&gradient * step)), lower, upper);
                let direction = &trial - &x;
                let trial_value = family.loglike_at(trial.view())?;
                evaluations += 1;
                if trial_value.is_finite()
                    && trial_value >= value + self.config.armijo * gradient.dot(&direction)
                {
                    break Some(trial);
                }
                step *= self.config.shrink_factor;
            };

            let Some(trial) = accepted else {
                status = ConvergenceStatus::LineSearchFailed;
                break;
            };

            let (new_value, new_gradient) = family.loglike_and_gradient_within(trial.view(), bounds)?;
            evaluations += 1;
            iterations += 1;
            let new_projected = project(&(&trial + &new_gradient), lower, upper) - &trial;
            debug!(iterations, value = new_value, step, "accepted step");

            let converged = self.config.convergence.check(
                &x,
                &trial,
                value,
                new_value,
                norm(&new_projected),
            );
            x = trial;
            value = new_value;
            gradient = new_gradient;
            step *= self.config.grow_factor;

            if let Some(converged) = converged {
                status = converged;
                break;
            }
        }

        info!(
            iterations,
            evaluations,
            value,
            status = status.description(),
            "gradient ascent finished"
        );

        Ok(OptimizationResult {
            params: x,
            value,
            gradient,
            status,
            iterations,
            evaluations,
        })
    }
}
