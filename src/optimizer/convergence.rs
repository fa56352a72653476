//! Convergence criteria for maximization.

use ndarray::Array1;
use serde::{Deserialize, Serialize};

/// Why a maximizer stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConvergenceStatus {
    /// The relative change of the criterion fell below its tolerance.
    CriterionConvergence,

    /// The projected gradient is small.
    GradientConvergence,

    /// The accepted step barely moved the parameters.
    ParameterConvergence,

    /// The line search could not find an improving step.
    LineSearchFailed,

    /// The iteration limit was reached first.
    MaxIterationsReached,
}

impl ConvergenceStatus {
    /// Returns true if the maximizer stopped at a point it considers optimal.
    pub fn is_converged(&self) -> bool {
        matches!(
            self,
            Self::CriterionConvergence | Self::GradientConvergence | Self::ParameterConvergence
        )
    }

    pub fn description(&self) -> &'static str {
        match self {
            Self::CriterionConvergence => "Converged: small relative criterion change",
            Self::GradientConvergence => "Converged: small projected gradient",
            Self::ParameterConvergence => "Converged: small parameter change",
            Self::LineSearchFailed => "Terminated: no improving step found",
            Self::MaxIterationsReached => "Terminated: maximum iterations reached",
        }
    }
}

/// Tolerances checked after every accepted step.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConvergenceCriteria {
    /// Relative criterion change `|f_new - f| / max(|f|, 1)`. Default: 1e-9
    pub relative_criterion_tolerance: f64,

    /// Norm of the projected gradient. Default: 1e-6
    pub gradient_tolerance: f64,

    /// Largest relative parameter change. Default: 1e-10
    pub parameter_tolerance: f64,
}

impl Default for ConvergenceCriteria {
    fn default() -> Self {
        Self {
            relative_criterion_tolerance: 1e-9,
            gradient_tolerance: 1e-6,
            parameter_tolerance: 1e-10,
        }
    }
}

impl ConvergenceCriteria {
    /// Status after a step from `params` (value `value`) to `new_params`
    /// (value `new_value`), or `None` to keep iterating.
    pub fn check(
        &self,
        params: &Array1<f64>,
        new_params: &Array1<f64>,
        value: f64,
        new_value: f64,
        projected_gradient_norm: f64,
    ) -> Option<ConvergenceStatus> {
        if projected_gradient_norm < self.gradient_tolerance {
            return Some(ConvergenceStatus::GradientConvergence);
        }

        let criterion_change = (new_value - value).abs() / value.abs().max(1.0);
        if criterion_change < self.relative_criterion_tolerance {
            return Some(ConvergenceStatus::CriterionConvergence);
        }

        let parameter_change = new_params
            .iter()
            .zip(params.iter())
            .map(|(a, b)| (a - b).abs() / b.abs().max(1.0))
            .fold(0.0, f64::max);
        if parameter_change < self.parameter_tolerance {
            return Some(ConvergenceStatus::ParameterConvergence);
        }

        None
    }
}
