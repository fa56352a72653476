//! Declarative constraint specifications.
//!
//! Constraints are written the same way in code and in serialized form:
//!
//! ```json
//! [
//!   {"query": "category == 'transition' & name1 == 'fac2' & name2 != 'fac2'",
//!    "type": "fixed", "value": 0},
//!   {"loc": "initial_states", "type": "fixed", "value": 0},
//!   {"queries": ["period == 0 & name1 == 'Q1_fac1'", "period == 1 & name1 == 'Q1_fac1'"],
//!    "type": "pairwise_equality"}
//! ]
//! ```

use super::selector::{Loc, Selector};
use crate::error::{Result, SkillOptError};
use serde::{Deserialize, Serialize};
use std::fmt;

/// One user-declared constraint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawConstraint", into = "RawConstraint")]
pub enum ConstraintSpec {
    /// Pin every selected row to `value`
    Fixed { selector: Selector, value: f64 },

    /// All selected rows share one free value
    Equality { selector: Selector },

    /// The k-th rows of every selection share one free value
    PairwiseEquality { selectors: Vec<Selector> },
}

impl ConstraintSpec {
    /// Fix the rows matching `query` to `value`.
    pub fn fixed_query(query: &str, value: f64) -> Self {
        Self::Fixed {
            selector: Selector::Query(query.to_string()),
            value,
        }
    }

    /// Fix the rows at `loc` to `value`.
    pub fn fixed_loc(loc: Loc, value: f64) -> Self {
        Self::Fixed {
            selector: Selector::Loc(loc),
            value,
        }
    }

    /// Tie all rows matching `query` together.
    pub fn equality_query(query: &str) -> Self {
        Self::Equality {
            selector: Selector::Query(query.to_string()),
        }
    }

    /// Tie the selections of several queries position by position.
    pub fn pairwise_queries<I, S>(queries: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::PairwiseEquality {
            selectors: queries
                .into_iter()
                .map(|q| Selector::Query(q.into()))
                .collect(),
        }
    }

    /// Tie the selections of several locations position by position.
    pub fn pairwise_locs<I>(locs: I) -> Self
    where
        I: IntoIterator<Item = Loc>,
    {
        Self::PairwiseEquality {
            selectors: locs.into_iter().map(Selector::Loc).collect(),
        }
    }

    /// The constraint kind as written in serialized form.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Fixed { .. } => "fixed",
            Self::Equality { .. } => "equality",
            Self::PairwiseEquality { .. } => "pairwise_equality",
        }
    }

    /// Check the parts of the constraint that do not depend on the table.
    pub fn validate(&self) -> Result<()> {
        match self {
            Self::Fixed { value, .. } if !value.is_finite() => Err(SkillOptError::InvalidConstraint(
                format!("{self}: fixed value must be finite, got {value}"),
            )),
            Self::PairwiseEquality { selectors } if selectors.len() < 2 => {
                Err(SkillOptError::InvalidConstraint(format!(
                    "{self}: pairwise equality needs at least two selections"
                )))
            }
            _ => Ok(()),
        }
    }

    /// Parse a list of constraints from JSON.
    pub fn list_from_json(json: &str) -> Result<Vec<Self>> {
        Ok(serde_json::from_str(json)?)
    }
}

impl fmt::Display for ConstraintSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fixed { selector, value } => write!(f, "fixed {selector} = {value}"),
            Self::Equality { selector } => write!(f, "equality {selector}"),
            Self::PairwiseEquality { selectors } => {
                write!(f, "pairwise_equality [")?;
                for (i, selector) in selectors.iter().enumerate() {
                    if i > 0 {
                        write!(f, "; ")?;
                    }
                    write!(f, "{selector}")?;
                }
                write!(f, "]")
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
enum ConstraintKind {
    Fixed,
    Equality,
    PairwiseEquality,
}

/// Flat serialized shape shared by all constraint kinds.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct RawConstraint {
    #[serde(rename = "type")]
    kind: Option<ConstraintKind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    loc: Option<Loc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    query: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    locs: Option<Vec<Loc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    queries: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    value: Option<f64>,
}

impl RawConstraint {
    fn single_selector(&mut self) -> std::result::Result<Selector, String> {
        match (self.loc.take(), self.query.take()) {
            (Some(loc), None) => Ok(Selector::Loc(loc)),
            (None, Some(query)) => Ok(Selector::Query(query)),
            (Some(_), Some(_)) => Err("give either 'loc' or 'query', not both".to_string()),
            (None, None) => Err("missing 'loc' or 'query'".to_string()),
        }
    }

    fn many_selectors(&mut self) -> std::result::Result<Vec<Selector>, String> {
        match (self.locs.take(), self.queries.take()) {
            (Some(locs), None) => Ok(locs.into_iter().map(Selector::Loc).collect()),
            (None, Some(queries)) => Ok(queries.into_iter().map(Selector::Query).collect()),
            (Some(_), Some(_)) => Err("give either 'locs' or 'queries', not both".to_string()),
            (None, None) => Err("missing 'locs' or 'queries'".to_string()),
        }
    }
}

impl TryFrom<RawConstraint> for ConstraintSpec {
    type Error = String;

    fn try_from(mut raw: RawConstraint) -> std::result::Result<Self, Self::Error> {
        match raw.kind {
            None => Err("constraint is missing its 'type'".to_string()),
            Some(ConstraintKind::Fixed) => {
                let selector = raw.single_selector()?;
                let value = raw
                    .value
                    .ok_or_else(|| "fixed constraint is missing its 'value'".to_string())?;
                Ok(Self::Fixed { selector, value })
            }
            Some(ConstraintKind::Equality) => Ok(Self::Equality {
                selector: raw.single_selector()?,
            }),
            Some(ConstraintKind::PairwiseEquality) => Ok(Self::PairwiseEquality {
                selectors: raw.many_selectors()?,
            }),
        }
    }
}

impl From<ConstraintSpec> for RawConstraint {
    fn from(spec: ConstraintSpec) -> Self {
        fn put_single(raw: &mut RawConstraint, selector: Selector) {
            match selector {
                Selector::Loc(loc) => raw.loc = Some(loc),
                Selector::Query(query) => raw.query = Some(query),
            }
        }

        let mut raw = RawConstraint::default();
        match spec {
            ConstraintSpec::Fixed { selector, value } => {
                raw.kind = Some(ConstraintKind::Fixed);
                raw.value = Some(value);
                put_single(&mut raw, selector);
            }
            ConstraintSpec::Equality { selector } => {
                raw.kind = Some(ConstraintKind::Equality);
                put_single(&mut raw, selector);
            }
            ConstraintSpec::PairwiseEquality { selectors } => {
                raw.kind = Some(ConstraintKind::PairwiseEquality);
                if selectors.iter().all(|s| matches!(s, Selector::Loc(_))) {
                    raw.locs = Some(
                        selectors
                            .into_iter()
                            .filter_map(|s| match s {
                                Selector::Loc(loc) => Some(loc),
                                Selector::Query(_) => None,
                            })
                            .collect(),
                    );
                } else {
                    // mixed selections serialize as queries
                    raw.queries = Some(
                        selectors
                            .into_iter()
                            .map(|s| match s {
                                Selector::Query(query) => query,
                                Selector::Loc(loc) => loc.to_query(),
                            })
                            .collect(),
                    );
                }
            }
        }
        raw
    }
}
