//! # skillopt-rs
//!
//! `skillopt-rs` prepares latent factor state-space models for maximum
//! likelihood estimation. From a model specification and a panel dataset it
//! builds everything a numerical optimizer needs:
//!
//! - a parameter template listing every model parameter in canonical order
//! - the constraints implied by the specification, normalized into a free
//!   parameter vector together with any user constraints
//! - a family of criterion functions: log-likelihood, gradient, per-subject
//!   jacobian, value and gradient together, and a debug variant
//!
//! ## Basic Usage
//!
//! ```rust,no_run
//! use skillopt_rs::{get_maximization_inputs, ConstraintSpec, Dataset, ModelSpecification};
//!
//! # fn main() -> skillopt_rs::Result<()> {
//! let spec = ModelSpecification::from_path("model.yaml")?;
//! # let data = Dataset::new(["y1", "y2"])?;
//! let inputs = get_maximization_inputs(&spec, &data)?;
//!
//! let mut params = inputs.params_template().clone();
//! // ... fill in start values ...
//!
//! let value = inputs.loglike(&params)?;
//! let gradient = inputs.gradient(&params)?;
//!
//! let constrained = inputs.with_constraints(&[ConstraintSpec::equality_query(
//!     "category == 'loadings' & name1 == 'y2'",
//! )])?;
//! let (value, gradient) = constrained.loglike_and_gradient(&params)?;
//! # Ok(())
//! # }
//! ```

pub mod constraints;
pub mod criterion;
pub mod error;
pub mod likelihood;
pub mod maximization_inputs;
pub mod optimizer;
pub mod params;
pub mod simulate;
pub mod specification;

// Re-exports for convenience
pub use constraints::{ConstraintSpec, Loc, NormalizedConstraints, Selector};
pub use criterion::{CriterionFamily, DebugLoglike};
pub use error::{Result, SkillOptError};
pub use likelihood::{Dataset, KalmanEngine, LikelihoodEngine};
pub use maximization_inputs::{default_constraints, get_maximization_inputs, MaximizationInputs};
pub use optimizer::{maximize, Maximizer, ProjectedGradientAscent};
pub use params::{Category, ParamKey, ParamsTable};
pub use simulate::simulate_dataset;
pub use specification::ModelSpecification;

/// Version of the library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
