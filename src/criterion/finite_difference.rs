//! Finite difference derivatives of contribution vectors.
//!
//! Columns of the jacobian are independent, so they are computed in
//! parallel with rayon and assembled in column order afterwards.
//!
//! Given box bounds, a coordinate close to a bound is differenced on the
//! side that stays inside the box.

use crate::error::{Result, SkillOptError};
use crate::specification::{DiffMethod, EstimationOptions};
use ndarray::{Array1, Array2};
use rayon::prelude::*;

/// Points a single column is differenced over.
#[derive(Debug, Clone, Copy, PartialEq)]
enum Stencil {
    Central(f64),
    Forward(f64),
    Backward(f64),
    /// The box has no room around the coordinate
    Flat,
}

/// Step rule and difference scheme.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FiniteDifference {
    /// Base step; scaled by `|x|` when `|x|` exceeds it
    pub step: f64,
    pub method: DiffMethod,
}

impl Default for FiniteDifference {
    fn default() -> Self {
        EstimationOptions::default().into()
    }
}

impl From<EstimationOptions> for FiniteDifference {
    fn from(options: EstimationOptions) -> Self {
        Self {
            step: options.finite_difference_step,
            method: options.finite_difference_method,
        }
    }
}

impl FiniteDifference {
    /// Step used for a coordinate with value `x`.
    pub fn step_for(&self, x: f64) -> f64 {
        if x.abs() > self.step {
            x.abs() * self.step
        } else {
            self.step
        }
    }

    /// Stencil for a coordinate with value `x` inside `[lower, upper]`.
    fn stencil(&self, x: f64, lower: f64, upper: f64) -> Stencil {
        let h = self.step_for(x);
        let (room_up, room_down) = (upper - x, x - lower);
        match self.method {
            DiffMethod::Central if room_up >= h && room_down >= h => Stencil::Central(h),
            _ if room_up >= h => Stencil::Forward(h),
            _ if room_down >= h => Stencil::Backward(h),
            _ if room_up > 0.0 && room_up >= room_down => Stencil::Forward(room_up),
            _ if room_down > 0.0 => Stencil::Backward(room_down),
            _ => Stencil::Flat,
        }
    }

    /// Jacobian of `f` at `x`: one row per contribution, one column per
    /// coordinate of `x`.
    ///
    /// `base` must be `f(x)`; one-sided schemes reuse it instead of
    /// evaluating `f` again.
    pub fn jacobian<F>(&self, f: F, x: &Array1<f64>, base: &Array1<f64>) -> Result<Array2<f64>>
    where
        F: Fn(&Array1<f64>) -> Result<Array1<f64>> + Sync,
    {
        self.jacobian_within(f, x, base, None)
    }

    /// Like [`Self::jacobian`], but `f` is only evaluated inside the box
    /// `bounds = (lower, upper)`.
    pub fn jacobian_within<F>(
        &self,
        f: F,
        x: &Array1<f64>,
        base: &Array1<f64>,
        bounds: Option<(&Array1<f64>, &Array1<f64>)>,
    ) -> Result<Array2<f64>>
    where
        F: Fn(&Array1<f64>) -> Result<Array1<f64>> + Sync,
    {
        if !(self.step > 0.0 && self.step.is_finite()) {
            return Err(SkillOptError::Specification(format!(
                "finite difference step must be positive, got {}",
                self.step
            )));
        }
        let n_rows = base.len();
        let n_cols = x.len();
        if let Some((lower, upper)) = bounds {
            if lower.len() != n_cols || upper.len() != n_cols {
                return Err(SkillOptError::DimensionMismatch(format!(
                    "{n_cols} coordinates but bounds of length {} and {}",
                    lower.len(),
                    upper.len()
                )));
            }
        }

        let shifted = |j: usize, h: f64| -> Result<Array1<f64>> {
            let mut point = x.clone();
            point[j] += h;
            checked(f(&point)?, n_rows)
        };

        let columns: Result<Vec<Array1<f64>>> = (0..n_cols)
            .into_par_iter()
            .map(|j| {
                let (lower, upper) =
                    bounds.map_or((f64::NEG_INFINITY, f64::INFINITY), |(l, u)| (l[j], u[j]));
                match self.stencil(x[j], lower, upper) {
                    Stencil::Central(h) => Ok((shifted(j, h)? - shifted(j, -h)?) / (2.0 * h)),
                    Stencil::Forward(h) => Ok((shifted(j, h)? - base) / h),
                    Stencil::Backward(h) => Ok((base - &shifted(j, -h)?) / h),
                    Stencil::Flat => Ok(Array1::zeros(n_rows)),
                }
            })
            .collect();

        let mut jac = Array2::zeros((n_rows, n_cols));
        for (j, column) in columns?.into_iter().enumerate() {
            jac.column_mut(j).assign(&column);
        }
        Ok(jac)
    }
}

fn checked(values: Array1<f64>, expected: usize) -> Result<Array1<f64>> {
    if values.len() != expected {
        return Err(SkillOptError::FunctionEvaluation(format!(
            "expected {expected} contributions, got {}",
            values.len()
        )));
    }
    Ok(values)
}
