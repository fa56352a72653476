//! # Constraints
//!
//! Declarative constraints over parameter table rows and their normalization
//! into a free parameter vector.
//!
//! Three kinds are supported:
//!
//! - **fixed**: pin the selected rows to a value
//! - **equality**: the selected rows share one free value
//! - **pairwise equality**: the k-th rows of several selections share a value
//!
//! Rows are selected by a key prefix ([`Loc`]) or by a filter expression
//! over the key fields, e.g. `category == 'loadings' & period in (0, 1)`.
//! [`NormalizedConstraints`] merges overlapping equalities transitively and
//! rejects contradictions.

pub mod normalize;
pub mod query;
pub mod selector;
pub mod spec;

pub use normalize::{FreeParameter, NormalizedConstraints, RowKind};
pub use query::{Query, QueryError};
pub use selector::{Loc, Selector};
pub use spec::ConstraintSpec;
