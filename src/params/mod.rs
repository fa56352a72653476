//! # Parameter Tables
//!
//! The canonical representation of model parameters. A model specification
//! implies a fixed set of parameters; [`ParamsTable::template`] lists them in
//! canonical order with unset values, and the caller fills in values and
//! optionally tightens bounds before evaluation.
//!
//! ## Core Components
//!
//! - [`ParamKey`] and [`Category`]: the `(category, period, name1, name2)` row identity
//! - [`ParamsIndex`]: the immutable, ordered set of keys shared by every consumer
//! - [`ParamsTable`]: values and bounds over an index
//! - [`Bounds`]: box bounds of a single row
//!
//! ## Example Usage
//!
//! ```rust
//! use skillopt_rs::params::{Category, ParamKey, ParamsTable};
//! use skillopt_rs::specification::ModelSpecification;
//!
//! let spec = ModelSpecification::from_yaml_str(
//!     "factors: {fac1: {measurements: [[y1, y2], [y1, y2]]}}",
//! )
//! .unwrap();
//!
//! let mut params = ParamsTable::template(&spec).unwrap();
//! params
//!     .set_value(&ParamKey::new(Category::Loadings, 0, "y2", "fac1"), 0.8)
//!     .unwrap();
//!
//! let sds = params.query("category == 'meas_sds'").unwrap();
//! params.set_lower_bound_at(&sds, 0.0).unwrap();
//! ```

pub mod bounds;
pub mod index;
pub mod table;
mod template;

pub use bounds::{Bounds, BoundsError};
pub use index::{Category, ParamKey, ParamsIndex};
pub use table::{ParamEntry, ParamRecord, ParamsTable};
