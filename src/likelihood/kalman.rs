//! Kalman filter likelihood for linear-Gaussian latent factor models.
//!
//! Every subject is filtered independently. Measurements are processed one
//! at a time (sequential scalar updates), so a missing measurement is simply
//! skipped and no matrix inversion is needed. Between periods the factors
//! evolve as `x' = A x + b + shock` with independent normal shocks.

use super::dataset::{Dataset, SubjectId};
use super::{DebugTrace, LikelihoodEngine};
use crate::error::{Result, SkillOptError};
use crate::params::{Category, ParamKey, ParamsIndex};
use crate::specification::{ModelLabels, ModelSpecification, TransitionFunction, CONSTANT, MIXTURE, UNARY};
use ndarray::{Array1, Array2, Array3, ArrayView1};
use rayon::prelude::*;
use std::f64::consts::PI;
use tracing::{info, warn};

/// Parameter positions of one measurement equation.
#[derive(Debug, Clone)]
struct MeasurementLayout {
    /// Dataset column of the measurement
    column: usize,
    /// Control coefficients, aligned with the control columns
    controls: Vec<usize>,
    /// `(factor, position)` of every loading
    loadings: Vec<(usize, usize)>,
    sd: usize,
}

#[derive(Debug, Clone)]
enum FactorTransition {
    Linear {
        /// Coefficients of every factor followed by the intercept
        coefficients: Vec<usize>,
        shock_sd: usize,
    },
    Constant,
}

#[derive(Debug, Clone)]
struct Layout {
    measurements: Vec<Vec<MeasurementLayout>>,
    transitions: Vec<Vec<FactorTransition>>,
    initial_states: Vec<usize>,
    /// `(row, col, position)` of the lower-triangular initial Cholesky factor
    initial_cholcov: Vec<(usize, usize, usize)>,
}

/// Observations of one subject, aligned with the layout.
#[derive(Debug, Clone)]
struct SubjectData {
    id: SubjectId,
    /// Per period, the measurements in layout order (NaN when missing)
    measurements: Vec<Vec<f64>>,
    /// Per period, the control values starting with the constant 1.0
    controls: Vec<Vec<f64>>,
}

/// Reference engine: linear Kalman filter over a validated panel.
#[derive(Debug, Clone)]
pub struct KalmanEngine {
    layout: Layout,
    subjects: Vec<SubjectData>,
    factors: Vec<String>,
    n_params: usize,
}

fn position(index: &ParamsIndex, key: ParamKey) -> Result<usize> {
    index.position(&key).ok_or_else(|| {
        SkillOptError::Specification(format!("parameter {key} is missing from the index"))
    })
}

impl Layout {
    fn new(labels: &ModelLabels, index: &ParamsIndex, data: &Dataset) -> Result<Self> {
        let column = |name: &str| {
            data.column_position(name).ok_or_else(|| {
                SkillOptError::Data(format!("column '{name}' is missing from the dataset"))
            })
        };

        let mut measurements = Vec::with_capacity(labels.n_periods);
        for period in 0..labels.n_periods {
            let mut equations = Vec::new();
            for meas in &labels.measurements[period] {
                let controls = labels
                    .controls
                    .iter()
                    .map(|control| {
                        position(index, ParamKey::new(Category::Controls, period, meas, control))
                    })
                    .collect::<Result<Vec<_>>>()?;
                let loadings = labels.loadings[period]
                    .iter()
                    .filter(|(m, _)| m == meas)
                    .map(|(_, factor)| {
                        let f = labels.factor_position(factor).ok_or_else(|| {
                            SkillOptError::Specification(format!("unknown factor '{factor}'"))
                        })?;
                        let pos =
                            position(index, ParamKey::new(Category::Loadings, period, meas, factor))?;
                        Ok((f, pos))
                    })
                    .collect::<Result<Vec<_>>>()?;
                equations.push(MeasurementLayout {
                    column: column(meas)?,
                    controls,
                    loadings,
                    sd: position(index, ParamKey::new(Category::MeasSds, period, meas, UNARY))?,
                });
            }
            measurements.push(equations);
        }

        let coefficients = labels.transition_coefficients();
        let mut transitions = Vec::new();
        for period in 0..labels.n_periods.saturating_sub(1) {
            let mut equations = Vec::with_capacity(labels.n_factors());
            for (factor, function) in labels.factors.iter().zip(&labels.transition_functions) {
                equations.push(match function {
                    TransitionFunction::Constant => FactorTransition::Constant,
                    TransitionFunction::Linear => FactorTransition::Linear {
                        coefficients: coefficients
                            .iter()
                            .map(|c| position(index, ParamKey::new(Category::Transition, period, factor, c)))
                            .collect::<Result<Vec<_>>>()?,
                        shock_sd: position(
                            index,
                            ParamKey::new(Category::ShockSds, period, factor, UNARY),
                        )?,
                    },
                });
            }
            transitions.push(equations);
        }

        let initial_states = labels
            .factors
            .iter()
            .map(|factor| position(index, ParamKey::new(Category::InitialStates, 0, MIXTURE, factor)))
            .collect::<Result<Vec<_>>>()?;

        let mut initial_cholcov = Vec::new();
        for (row, row_factor) in labels.factors.iter().enumerate() {
            for (col, col_factor) in labels.factors[..=row].iter().enumerate() {
                let name = format!("{row_factor}-{col_factor}");
                let pos = position(index, ParamKey::new(Category::InitialCholcovs, 0, MIXTURE, &name))?;
                initial_cholcov.push((row, col, pos));
            }
        }

        Ok(Self {
            measurements,
            transitions,
            initial_states,
            initial_cholcov,
        })
    }
}

impl KalmanEngine {
    /// Build the engine for `spec` over `index` and validate `data` once.
    ///
    /// # Errors
    ///
    /// * [`SkillOptError::Data`] if a measurement or control column is
    ///   missing, or an observed measurement has a missing control
    /// * [`SkillOptError::Specification`] if `index` lacks a model parameter
    pub fn new(spec: &ModelSpecification, index: &ParamsIndex, data: &Dataset) -> Result<Self> {
        let labels = spec.labels()?;
        let layout = Layout::new(&labels, index, data)?;

        let control_columns = labels
            .controls
            .iter()
            .map(|control| match control.as_str() {
                CONSTANT => Ok(None),
                name => data.column_position(name).map(Some).ok_or_else(|| {
                    SkillOptError::Data(format!("column '{name}' is missing from the dataset"))
                }),
            })
            .collect::<Result<Vec<_>>>()?;

        let mut ignored_rows = 0usize;
        let mut subjects: Vec<SubjectData> = Vec::new();
        for (id, period, row) in data.rows() {
            if period >= labels.n_periods {
                ignored_rows += 1;
                continue;
            }
            if subjects.last().map_or(true, |s| s.id != id) {
                subjects.push(SubjectData {
                    id,
                    measurements: layout
                        .measurements
                        .iter()
                        .map(|equations| vec![f64::NAN; equations.len()])
                        .collect(),
                    controls: vec![vec![0.0; control_columns.len()]; labels.n_periods],
                });
            }
            let Some(subject) = subjects.last_mut() else {
                continue;
            };

            let controls: Vec<f64> = control_columns
                .iter()
                .map(|column| column.map_or(1.0, |c| row[c]))
                .collect();
            let measurements: Vec<f64> = layout.measurements[period]
                .iter()
                .map(|equation| row[equation.column])
                .collect();

            if measurements.iter().any(|y| !y.is_nan()) {
                if let Some(k) = controls.iter().position(|x| x.is_nan()) {
                    return Err(SkillOptError::Data(format!(
                        "subject {id} has observed measurements but a missing '{}' in period {period}",
                        labels.controls[k]
                    )));
                }
            }
            subject.measurements[period] = measurements;
            subject.controls[period] = controls;
        }

        if ignored_rows > 0 {
            warn!(
                ignored_rows,
                n_periods = labels.n_periods,
                "dataset rows outside the model's periods are ignored"
            );
        }
        info!(
            n_subjects = subjects.len(),
            n_periods = labels.n_periods,
            n_factors = labels.n_factors(),
            n_params = index.len(),
            "built Kalman likelihood engine"
        );

        Ok(Self {
            layout,
            subjects,
            factors: labels.factors,
            n_params: index.len(),
        })
    }

    /// Subject ids in evaluation order.
    pub fn subject_ids(&self) -> Vec<SubjectId> {
        self.subjects.iter().map(|s| s.id).collect()
    }

    fn check_params(&self, params: &ArrayView1<'_, f64>) -> Result<()> {
        if params.len() != self.n_params {
            return Err(SkillOptError::DimensionMismatch(format!(
                "expected {} parameters, got {}",
                self.n_params,
                params.len()
            )));
        }
        Ok(())
    }

    /// Filter one subject. `on_period` sees the period's contribution and
    /// the filtered state after its measurement update.
    fn filter_subject<F>(&self, params: &ArrayView1<'_, f64>, subject: &SubjectData, mut on_period: F) -> f64
    where
        F: FnMut(usize, f64, &Array1<f64>),
    {
        let n = self.factors.len();
        let mut x: Array1<f64> = self.layout.initial_states.iter().map(|&pos| params[pos]).collect();
        let mut chol = Array2::<f64>::zeros((n, n));
        for &(row, col, pos) in &self.layout.initial_cholcov {
            chol[[row, col]] = params[pos];
        }
        let mut p = chol.dot(&chol.t());

        let mut total = 0.0;
        for (period, equations) in self.layout.measurements.iter().enumerate() {
            let mut period_ll = 0.0;
            for (k, equation) in equations.iter().enumerate() {
                let y = subject.measurements[period][k];
                if y.is_nan() {
                    continue;
                }
                let mut h = Array1::<f64>::zeros(n);
                for &(f, pos) in &equation.loadings {
                    h[f] = params[pos];
                }
                let intercept: f64 = equation
                    .controls
                    .iter()
                    .zip(&subject.controls[period])
                    .map(|(&pos, value)| params[pos] * value)
                    .sum();
                let sd = params[equation.sd];

                let residual = y - intercept - h.dot(&x);
                let ph = p.dot(&h);
                let s = h.dot(&ph) + sd * sd;
                if !(s > 0.0 && s.is_finite()) {
                    return f64::NEG_INFINITY;
                }
                let gain = &ph / s;
                x.scaled_add(residual, &gain);
                for i in 0..n {
                    for j in 0..n {
                        p[[i, j]] -= gain[i] * ph[j];
                    }
                }
                period_ll += -0.5 * ((2.0 * PI).ln() + s.ln() + residual * residual / s);
            }
            on_period(period, period_ll, &x);
            total += period_ll;

            if let Some(transition) = self.layout.transitions.get(period) {
                let mut a = Array2::<f64>::zeros((n, n));
                let mut b = Array1::<f64>::zeros(n);
                let mut q = Array1::<f64>::zeros(n);
                for (i, equation) in transition.iter().enumerate() {
                    match equation {
                        FactorTransition::Constant => a[[i, i]] = 1.0,
                        FactorTransition::Linear {
                            coefficients,
                            shock_sd,
                        } => {
                            for j in 0..n {
                                a[[i, j]] = params[coefficients[j]];
                            }
                            b[i] = params[coefficients[n]];
                            q[i] = params[*shock_sd];
                        }
                    }
                }
                x = a.dot(&x) + &b;
                p = a.dot(&p).dot(&a.t());
                for i in 0..n {
                    p[[i, i]] += q[i] * q[i];
                }
            }
        }
        total
    }
}

impl LikelihoodEngine for KalmanEngine {
    fn n_params(&self) -> usize {
        self.n_params
    }

    fn n_observations(&self) -> usize {
        self.subjects.len()
    }

    fn contributions(&self, params: ArrayView1<'_, f64>) -> Result<Array1<f64>> {
        self.check_params(&params)?;
        let contributions: Vec<f64> = self
            .subjects
            .par_iter()
            .map(|subject| self.filter_subject(&params, subject, |_, _, _| {}))
            .collect();
        Ok(Array1::from(contributions))
    }

    fn debug_contributions(&self, params: ArrayView1<'_, f64>) -> Result<DebugTrace> {
        self.check_params(&params)?;
        let n_subjects = self.subjects.len();
        let n_periods = self.layout.measurements.len();
        let n_factors = self.factors.len();

        let mut contributions = Array1::zeros(n_subjects);
        let mut period_contributions = Array2::from_elem((n_subjects, n_periods), f64::NAN);
        let mut filtered_states = Array3::from_elem((n_subjects, n_periods, n_factors), f64::NAN);
        for (s, subject) in self.subjects.iter().enumerate() {
            contributions[s] = self.filter_subject(&params, subject, |period, ll, state| {
                period_contributions[[s, period]] = ll;
                for (f, value) in state.iter().enumerate() {
                    filtered_states[[s, period, f]] = *value;
                }
            });
        }

        Ok(DebugTrace {
            subjects: self.subject_ids(),
            contributions,
            period_contributions,
            filtered_states,
            factors: self.factors.clone(),
        })
    }
}
