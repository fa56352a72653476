//! Selection of parameter rows.
//!
//! A [`Selector`] is either a location (a prefix of the row key, like a
//! partial multi-index lookup) or a filter [`Query`]. Resolving a selector
//! against a [`ParamsIndex`] yields row positions in canonical order and
//! fails if nothing matches.

use super::query::Query;
use crate::error::{Result, SkillOptError};
use crate::params::{Category, ParamKey, ParamsIndex};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A key prefix: category, then optionally period, name1 and name2.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "LocRepr", into = "LocRepr")]
pub struct Loc {
    pub category: Category,
    pub period: Option<usize>,
    pub name1: Option<String>,
    pub name2: Option<String>,
}

impl Loc {
    /// Every row of a category.
    pub fn category(category: Category) -> Self {
        Self {
            category,
            period: None,
            name1: None,
            name2: None,
        }
    }

    /// Every row of a category in one period.
    pub fn period(category: Category, period: usize) -> Self {
        Self {
            period: Some(period),
            ..Self::category(category)
        }
    }

    /// Exactly one row.
    pub fn exact(key: &ParamKey) -> Self {
        Self {
            category: key.category,
            period: key.period,
            name1: Some(key.name1.clone()),
            name2: Some(key.name2.clone()),
        }
    }

    /// The equivalent filter expression.
    pub fn to_query(&self) -> String {
        let mut terms = vec![format!("category == '{}'", self.category)];
        if let Some(period) = self.period {
            terms.push(format!("period == {period}"));
        }
        if let Some(name) = &self.name1 {
            terms.push(format!("name1 == '{name}'"));
        }
        if let Some(name) = &self.name2 {
            terms.push(format!("name2 == '{name}'"));
        }
        terms.join(" & ")
    }

    /// Whether `key` starts with this prefix.
    pub fn matches(&self, key: &ParamKey) -> bool {
        key.category == self.category
            && self.period.map_or(true, |period| key.period == Some(period))
            && self.name1.as_ref().map_or(true, |name| &key.name1 == name)
            && self.name2.as_ref().map_or(true, |name| &key.name2 == name)
    }
}

impl fmt::Display for Loc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}", self.category)?;
        if let Some(period) = self.period {
            write!(f, ", {period}")?;
        }
        for name in [&self.name1, &self.name2].into_iter().flatten() {
            write!(f, ", {name}")?;
        }
        write!(f, ")")
    }
}

/// Element of a serialized location path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
enum LocPart {
    Int(u64),
    Str(String),
    Null,
}

/// Serialized location: `"initial_states"` or `["loadings", 0, "y1", "fac1"]`.
/// Unset parts before a set one are `null`, e.g. `["loadings", null, "y2"]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
enum LocRepr {
    Category(String),
    Path(Vec<LocPart>),
}

impl TryFrom<LocRepr> for Loc {
    type Error = String;

    fn try_from(repr: LocRepr) -> std::result::Result<Self, Self::Error> {
        let parts = match repr {
            LocRepr::Category(category) => vec![LocPart::Str(category)],
            LocRepr::Path(parts) => parts,
        };
        if parts.is_empty() || parts.len() > 4 {
            return Err(format!(
                "a location has between 1 and 4 parts, got {}",
                parts.len()
            ));
        }

        let mut parts = parts.into_iter();
        let category = match parts.next() {
            Some(LocPart::Str(name)) => name.parse::<Category>()?,
            _ => return Err("a location starts with a category name".to_string()),
        };
        let period = match parts.next() {
            None | Some(LocPart::Null) => None,
            Some(LocPart::Int(period)) => Some(
                usize::try_from(period).map_err(|_| format!("period {period} is out of range"))?,
            ),
            Some(LocPart::Str(other)) => {
                return Err(format!(
                    "the second location part is a period, got '{other}'"
                ))
            }
        };
        let mut name = |position: &str| match parts.next() {
            None | Some(LocPart::Null) => Ok(None),
            Some(LocPart::Str(name)) => Ok(Some(name)),
            Some(LocPart::Int(value)) => Err(format!(
                "the {position} location part is a name, got {value}"
            )),
        };
        let name1 = name("third")?;
        let name2 = name("fourth")?;

        Ok(Loc {
            category,
            period,
            name1,
            name2,
        })
    }
}

impl From<Loc> for LocRepr {
    fn from(loc: Loc) -> Self {
        if loc.period.is_none() && loc.name1.is_none() && loc.name2.is_none() {
            return LocRepr::Category(loc.category.as_str().to_string());
        }
        let mut parts = vec![
            LocPart::Str(loc.category.as_str().to_string()),
            loc.period.map_or(LocPart::Null, |period| LocPart::Int(period as u64)),
            loc.name1.map_or(LocPart::Null, LocPart::Str),
            loc.name2.map_or(LocPart::Null, LocPart::Str),
        ];
        while matches!(parts.last(), Some(LocPart::Null)) {
            parts.pop();
        }
        LocRepr::Path(parts)
    }
}

/// How a constraint picks its rows.
#[derive(Debug, Clone, PartialEq)]
pub enum Selector {
    /// Rows whose key starts with the location prefix
    Loc(Loc),

    /// Rows matching a filter expression
    Query(String),
}

impl Selector {
    /// Positions of the selected rows, in canonical order.
    ///
    /// Selecting nothing is an error: a silent no-op would hide a typo in
    /// the constraint.
    pub fn resolve(&self, index: &ParamsIndex) -> Result<Vec<usize>> {
        let positions: Vec<usize> = match self {
            Self::Loc(loc) => matching_positions(index, |key| loc.matches(key)),
            Self::Query(expression) => {
                let query = Query::parse(expression)?;
                matching_positions(index, |key| query.matches(key))
            }
        };

        if positions.is_empty() {
            return Err(SkillOptError::SelectorResolution {
                selector: self.to_string(),
            });
        }
        Ok(positions)
    }
}

fn matching_positions<F>(index: &ParamsIndex, predicate: F) -> Vec<usize>
where
    F: Fn(&ParamKey) -> bool,
{
    index
        .iter()
        .enumerate()
        .filter(|(_, key)| predicate(key))
        .map(|(pos, _)| pos)
        .collect()
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Loc(loc) => write!(f, "loc {loc}"),
            Self::Query(expression) => write!(f, "query '{expression}'"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn index() -> ParamsIndex {
        ParamsIndex::from_unsorted(vec![
            ParamKey::new(Category::Loadings, 0, "y1", "fac1"),
            ParamKey::new(Category::Loadings, 0, "y2", "fac1"),
            ParamKey::new(Category::Loadings, 1, "y1", "fac1"),
            ParamKey::new(Category::InitialStates, 0, "mixture_0", "fac1"),
        ])
        .unwrap()
    }

    #[test]
    fn test_loc_prefixes() {
        let index = index();
        let all = Selector::Loc(Loc::category(Category::Loadings));
        assert_eq!(all.resolve(&index).unwrap(), vec![0, 1, 2]);

        let period = Selector::Loc(Loc::period(Category::Loadings, 0));
        assert_eq!(period.resolve(&index).unwrap(), vec![0, 1]);

        let exact = Selector::Loc(Loc::exact(&ParamKey::new(Category::Loadings, 1, "y1", "fac1")));
        assert_eq!(exact.resolve(&index).unwrap(), vec![2]);
    }

    #[test]
    fn test_loc_as_query_selects_same_rows() {
        let index = index();
        let loc = Loc::period(Category::Loadings, 0);
        assert_eq!(loc.to_query(), "category == 'loadings' & period == 0");
        assert_eq!(
            Selector::Query(loc.to_query()).resolve(&index).unwrap(),
            Selector::Loc(loc).resolve(&index).unwrap()
        );
    }

    #[test]
    fn test_query_selector() {
        let selector = Selector::Query("name1 == 'y1'".to_string());
        assert_eq!(selector.resolve(&index()).unwrap(), vec![0, 2]);
    }

    #[test]
    fn test_zero_matches_is_an_error() {
        let selector = Selector::Query("period == 7".to_string());
        let err = selector.resolve(&index()).unwrap_err();
        match err {
            SkillOptError::SelectorResolution { selector } => {
                assert_eq!(selector, "query 'period == 7'")
            }
            other => panic!("Expected SelectorResolution, got {other:?}"),
        }

        let selector = Selector::Loc(Loc::category(Category::Transition));
        assert!(matches!(
            selector.resolve(&index()),
            Err(SkillOptError::SelectorResolution { .. })
        ));
    }

    #[test]
    fn test_loc_serde() {
        let loc: Loc = serde_json::from_str("\"initial_states\"").unwrap();
        assert_eq!(loc, Loc::category(Category::InitialStates));

        let loc: Loc = serde_json::from_str(r#"["loadings", 0, "y1", "fac1"]"#).unwrap();
        assert_eq!(loc, Loc::exact(&ParamKey::new(Category::Loadings, 0, "y1", "fac1")));
        assert_eq!(serde_json::to_string(&loc).unwrap(), r#"["loadings",0,"y1","fac1"]"#);

        assert!(serde_json::from_str::<Loc>(r#"["loadings", "y1"]"#).is_err());
        assert!(serde_json::from_str::<Loc>("\"unknown\"").is_err());
    }

    #[test]
    fn test_loc_without_period_round_trips() {
        let every_y2 = Loc {
            name1: Some("y2".to_string()),
            ..Loc::category(Category::Loadings)
        };
        let json = serde_json::to_string(&every_y2).unwrap();
        assert_eq!(json, r#"["loadings",null,"y2"]"#);
        let parsed: Loc = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, every_y2);
        assert_eq!(Selector::Loc(parsed).resolve(&index()).unwrap(), vec![1]);

        let by_name2 = Loc {
            name2: Some("fac1".to_string()),
            ..Loc::period(Category::Loadings, 1)
        };
        let json = serde_json::to_string(&by_name2).unwrap();
        assert_eq!(json, r#"["loadings",1,null,"fac1"]"#);
        assert_eq!(serde_json::from_str::<Loc>(&json).unwrap(), by_name2);
    }
}
