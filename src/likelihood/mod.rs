//! # Likelihood Engines
//!
//! A likelihood engine evaluates the per-subject log-likelihood contributions
//! of a dataset at a full parameter vector (one entry per parameter table
//! row, in index order). The criterion family builds values, gradients and
//! jacobians on top of this single operation.
//!
//! [`KalmanEngine`] is the reference engine for linear-Gaussian latent
//! factor models.

pub mod dataset;
pub mod kalman;

pub use dataset::{Dataset, SubjectId};
pub use kalman::KalmanEngine;

use crate::error::Result;
use ndarray::{Array1, Array2, Array3, ArrayView1};

/// Evaluates log-likelihood contributions of one dataset.
///
/// Implementations hold no mutable state, so one engine can be shared
/// between threads and evaluated concurrently.
pub trait LikelihoodEngine: Send + Sync {
    /// Length of the full parameter vector.
    fn n_params(&self) -> usize;

    /// Number of contributions, one per subject.
    fn n_observations(&self) -> usize;

    /// Log-likelihood contribution of every subject at `params`.
    fn contributions(&self, params: ArrayView1<'_, f64>) -> Result<Array1<f64>>;

    /// The same contributions with intermediate results, computed
    /// sequentially.
    fn debug_contributions(&self, params: ArrayView1<'_, f64>) -> Result<DebugTrace>;
}

/// Intermediate results of one evaluation.
#[derive(Debug, Clone, PartialEq)]
pub struct DebugTrace {
    /// Subject of every row of the arrays below
    pub subjects: Vec<SubjectId>,

    /// Per-subject contributions
    pub contributions: Array1<f64>,

    /// Contribution of every subject in every period (subjects × periods)
    pub period_contributions: Array2<f64>,

    /// Filtered factor means after the measurement update of every period
    /// (subjects × periods × factors)
    pub filtered_states: Array3<f64>,

    /// Factor names, aligned with the last axis of `filtered_states`
    pub factors: Vec<String>,
}
