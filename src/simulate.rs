//! Simulation of panel datasets from a fully specified model.
//!
//! Simulated data is what the tests, the demo and the benchmarks estimate
//! on. Controls are drawn from a standard normal distribution; factors and
//! measurements follow the same linear-Gaussian model the Kalman engine
//! evaluates.

use crate::error::{Result, SkillOptError};
use crate::likelihood::{Dataset, SubjectId};
use crate::params::{Category, ParamKey, ParamsTable};
use crate::specification::{
    ModelLabels, ModelSpecification, TransitionFunction, CONSTANT, MIXTURE, UNARY,
};
use ndarray::{Array1, Array2};
use rand::Rng;
use rand_distr::{Distribution, StandardNormal};
use tracing::debug;

fn factor_of(labels: &ModelLabels, factor: &str) -> Result<usize> {
    labels
        .factor_position(factor)
        .ok_or_else(|| SkillOptError::Specification(format!("unknown factor '{factor}'")))
}

fn column_of(columns: &[&String], meas: &str) -> Result<usize> {
    columns
        .iter()
        .position(|c| c.as_str() == meas)
        .ok_or_else(|| SkillOptError::Specification(format!("no column for measurement '{meas}'")))
}

/// Draw `n_subjects` subjects from the model `spec` at the values of `params`.
///
/// The dataset has one column per distinct measurement followed by one per
/// control, and one row per subject and period. Subject ids are `0..n_subjects`.
///
/// # Errors
///
/// [`SkillOptError::ParameterValidation`] if `params` is not laid out on the
/// template of `spec` or has a non-finite value.
pub fn simulate_dataset<R: Rng + ?Sized>(
    spec: &ModelSpecification,
    params: &ParamsTable,
    n_subjects: usize,
    rng: &mut R,
) -> Result<Dataset> {
    let labels = spec.labels()?;
    let template = ParamsTable::template(spec)?;
    if template.index() != params.index() {
        return Err(SkillOptError::ParameterValidation {
            key: format!("{} rows", params.len()),
            message: "parameter table does not match the model's template".to_string(),
        });
    }
    if let Some(row) = params.rows().find(|row| !row.value.is_finite()) {
        return Err(SkillOptError::invalid_param(
            row.key,
            format!("cannot simulate with value {}", row.value),
        ));
    }
    let value = |key: ParamKey| -> Result<f64> {
        params
            .get(&key)
            .map(|row| row.value)
            .ok_or_else(|| SkillOptError::invalid_param(&key, "missing from the table"))
    };

    let mut measurement_columns: Vec<&String> = Vec::new();
    for meas in labels.measurements.iter().flatten() {
        if !measurement_columns.contains(&meas) {
            measurement_columns.push(meas);
        }
    }
    let observed_controls: Vec<&String> = labels.controls.iter().filter(|c| *c != CONSTANT).collect();
    let mut data = Dataset::new(
        measurement_columns
            .iter()
            .chain(observed_controls.iter())
            .map(|name| name.as_str()),
    )?;

    let n = labels.n_factors();
    let mean: Array1<f64> = labels
        .factors
        .iter()
        .map(|factor| value(ParamKey::new(Category::InitialStates, 0, MIXTURE, factor)))
        .collect::<Result<_>>()?;
    let mut chol = Array2::<f64>::zeros((n, n));
    for (row, row_factor) in labels.factors.iter().enumerate() {
        for (col, col_factor) in labels.factors[..=row].iter().enumerate() {
            let name = format!("{row_factor}-{col_factor}");
            chol[[row, col]] = value(ParamKey::new(Category::InitialCholcovs, 0, MIXTURE, &name))?;
        }
    }

    let mut draw = |size: usize| -> Array1<f64> {
        (0..size)
            .map(|_| {
                let z: f64 = StandardNormal.sample(&mut *rng);
                z
            })
            .collect()
    };

    for subject in 0..n_subjects {
        let mut state = &mean + &chol.dot(&draw(n));
        for period in 0..labels.n_periods {
            let controls = draw(observed_controls.len());
            let mut row = vec![f64::NAN; measurement_columns.len()];
            row.extend(controls.iter());

            let shocks = draw(labels.measurements[period].len());
            for (k, meas) in labels.measurements[period].iter().enumerate() {
                let mut y = value(ParamKey::new(Category::Controls, period, meas, CONSTANT))?;
                for (control, x) in observed_controls.iter().zip(controls.iter()) {
                    y += x * value(ParamKey::new(Category::Controls, period, meas, control))?;
                }
                for (m, factor) in &labels.loadings[period] {
                    if m == meas {
                        let f = factor_of(&labels, factor)?;
                        y += state[f] * value(ParamKey::new(Category::Loadings, period, meas, factor))?;
                    }
                }
                y += shocks[k] * value(ParamKey::new(Category::MeasSds, period, meas, UNARY))?;

                row[column_of(&measurement_columns, meas)?] = y;
            }
            data.push(subject as SubjectId, period, &row)?;

            if period + 1 < labels.n_periods {
                let shocks = draw(n);
                let mut next = state.clone();
                for (i, (factor, function)) in labels
                    .factors
                    .iter()
                    .zip(&labels.transition_functions)
                    .enumerate()
                {
                    if *function == TransitionFunction::Constant {
                        continue;
                    }
                    let mut x = value(ParamKey::new(Category::Transition, period, factor, CONSTANT))?;
                    for (j, other) in labels.factors.iter().enumerate() {
                        x += state[j] * value(ParamKey::new(Category::Transition, period, factor, other))?;
                    }
                    x += shocks[i] * value(ParamKey::new(Category::ShockSds, period, factor, UNARY))?;
                    next[i] = x;
                }
                state = next;
            }
        }
    }

    debug!(n_subjects, n_rows = data.n_rows(), "simulated dataset");
    Ok(data)
}
