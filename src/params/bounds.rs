//! Box bounds on a single parameter row. Free equivalence classes combine
//! the bounds of their members by intersection.

use std::f64::{INFINITY, NEG_INFINITY};
use thiserror::Error;

/// Invalid or incompatible bounds.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum BoundsError {
    #[error("Invalid bounds: lower ({lower}) must not exceed upper ({upper})")]
    InvalidBounds { lower: f64, upper: f64 },

    #[error("Bounds must not be NaN")]
    NanBound,

    #[error("Bounds [{lower}, {upper}] and [{other_lower}, {other_upper}] do not overlap")]
    EmptyIntersection {
        lower: f64,
        upper: f64,
        other_lower: f64,
        other_upper: f64,
    },
}

/// Closed interval a parameter row must stay in. Infinite ends mean
/// the row is unbounded on that side.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    /// Smallest allowed value
    pub lower: f64,

    /// Largest allowed value
    pub upper: f64,
}

impl Default for Bounds {
    fn default() -> Self {
        Self {
            lower: NEG_INFINITY,
            upper: INFINITY,
        }
    }
}

impl Bounds {
    /// Create new bounds; `lower` must not exceed `upper`.
    ///
    /// # Examples
    ///
    /// ```
    /// use skillopt_rs::params::Bounds;
    ///
    /// let bounds = Bounds::new(0.0, 10.0).unwrap();
    /// assert_eq!(bounds.lower, 0.0);
    /// assert_eq!(bounds.upper, 10.0);
    /// assert!(Bounds::new(1.0, 0.0).is_err());
    /// ```
    pub fn new(lower: f64, upper: f64) -> Result<Self, BoundsError> {
        if lower.is_nan() || upper.is_nan() {
            return Err(BoundsError::NanBound);
        }
        if lower > upper {
            return Err(BoundsError::InvalidBounds { lower, upper });
        }

        Ok(Self { lower, upper })
    }

    /// `(-inf, inf)`, the bounds of every template row.
    pub fn unbounded() -> Self {
        Self::default()
    }

    /// `[lower, inf)`, e.g. for standard deviations.
    pub fn lower_only(lower: f64) -> Self {
        Self {
            lower,
            upper: INFINITY,
        }
    }

    /// NaN is never contained.
    pub fn contains(&self, value: f64) -> bool {
        value >= self.lower && value <= self.upper
    }

    pub fn has_lower_bound(&self) -> bool {
        self.lower.is_finite()
    }

    pub fn has_upper_bound(&self) -> bool {
        self.upper.is_finite()
    }

    /// The tightest bounds satisfying both `self` and `other`.
    pub fn intersect(&self, other: &Bounds) -> Result<Bounds, BoundsError> {
        let lower = self.lower.max(other.lower);
        let upper = self.upper.min(other.upper);
        if lower > upper {
            return Err(BoundsError::EmptyIntersection {
                lower: self.lower,
                upper: self.upper,
                other_lower: other.lower,
                other_upper: other.upper,
            });
        }
        Ok(Bounds { lower, upper })
    }
}
