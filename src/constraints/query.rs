//! Filter expressions over the parameter index.
//!
//! Queries select rows by comparing the index fields `category`, `period`,
//! `name1` and `name2` with literals:
//!
//! ```text
//! category == 'transition' & name1 == 'fac2' & name2 != 'fac2'
//! period == 3 & name1 == 'Q1_fac1'
//! (name1 in ['y1', 'y2'] | period >= 4) & ~(category == 'controls')
//! ```
//!
//! `&`/`and` binds tighter than `|`/`or`; `~`/`not` negates. Strings are
//! single or double quoted, periods are integers.

use crate::params::{Category, ParamKey};
use nom::{
    branch::alt,
    bytes::complete::{is_not, tag},
    character::complete::{char, digit1, multispace0},
    combinator::{all_consuming, map, map_res, opt, recognize, value},
    multi::{many0, separated_list1},
    sequence::{delimited, pair, preceded},
    IResult, Parser,
};
use std::cmp::Ordering;
use thiserror::Error;

/// Error that can occur while parsing a query
#[derive(Error, Debug, Clone, PartialEq)]
#[error("Invalid query '{query}': {message}")]
pub struct QueryError {
    pub query: String,
    pub message: String,
}

/// Index field a comparison refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Category,
    Period,
    Name1,
    Name2,
}

impl Field {
    fn as_str(&self) -> &'static str {
        match self {
            Self::Category => "category",
            Self::Period => "period",
            Self::Name1 => "name1",
            Self::Name2 => "name2",
        }
    }
}

/// Comparison operators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl CompareOp {
    fn holds(&self, ordering: Ordering) -> bool {
        match self {
            Self::Eq => ordering == Ordering::Equal,
            Self::Ne => ordering != Ordering::Equal,
            Self::Lt => ordering == Ordering::Less,
            Self::Le => ordering != Ordering::Greater,
            Self::Gt => ordering == Ordering::Greater,
            Self::Ge => ordering != Ordering::Less,
        }
    }
}

/// Literal operand of a comparison
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Str(String),
    Int(i64),
    Category(Category),
}

/// Parsed query AST
#[derive(Debug, Clone, PartialEq)]
pub enum Query {
    /// `field op literal`
    Compare {
        field: Field,
        op: CompareOp,
        literal: Literal,
    },

    /// `field in [...]` or `field not in [...]`
    In {
        field: Field,
        negated: bool,
        literals: Vec<Literal>,
    },

    Not(Box<Query>),
    And(Box<Query>, Box<Query>),
    Or(Box<Query>, Box<Query>),
}

impl Query {
    /// Parse and type-check a query.
    pub fn parse(input: &str) -> Result<Self, QueryError> {
        let error = |message: String| QueryError {
            query: input.to_string(),
            message,
        };

        let (_, mut query) = all_consuming(delimited(multispace0, or_expr, multispace0))
            .parse(input)
            .map_err(|e| error(format!("{:?}", e)))?;
        query.resolve_literals().map_err(error)?;
        Ok(query)
    }

    /// Whether the row identified by `key` satisfies the query.
    pub fn matches(&self, key: &ParamKey) -> bool {
        match self {
            Self::Compare { field, op, literal } => match compare(key, *field, literal) {
                Some(ordering) => op.holds(ordering),
                // rows without a period only differ from every period
                None => *op == CompareOp::Ne,
            },
            Self::In {
                field,
                negated,
                literals,
            } => {
                let found = literals
                    .iter()
                    .any(|literal| compare(key, *field, literal) == Some(Ordering::Equal));
                found != *negated
            }
            Self::Not(inner) => !inner.matches(key),
            Self::And(left, right) => left.matches(key) && right.matches(key),
            Self::Or(left, right) => left.matches(key) || right.matches(key),
        }
    }

    /// Give every literal the type of the field it is compared with.
    fn resolve_literals(&mut self) -> Result<(), String> {
        match self {
            Self::Compare { field, literal, .. } => resolve_literal(*field, literal),
            Self::In {
                field, literals, ..
            } => literals
                .iter_mut()
                .try_for_each(|literal| resolve_literal(*field, literal)),
            Self::Not(inner) => inner.resolve_literals(),
            Self::And(left, right) | Self::Or(left, right) => {
                left.resolve_literals()?;
                right.resolve_literals()
            }
        }
    }
}

fn resolve_literal(field: Field, literal: &mut Literal) -> Result<(), String> {
    let resolved = match (field, &*literal) {
        (Field::Category, Literal::Str(name)) => Literal::Category(name.parse::<Category>()?),
        (Field::Period, Literal::Int(_)) => return Ok(()),
        (Field::Name1 | Field::Name2, Literal::Str(_)) => return Ok(()),
        (Field::Period, _) => {
            return Err("period must be compared with an integer".to_string());
        }
        (field, _) => {
            return Err(format!("{} must be compared with a quoted string", field.as_str()));
        }
    };
    *literal = resolved;
    Ok(())
}

/// Order of the key's field relative to the literal, `None` for a missing period.
fn compare(key: &ParamKey, field: Field, literal: &Literal) -> Option<Ordering> {
    match (field, literal) {
        (Field::Category, Literal::Category(category)) => Some(key.category.cmp(category)),
        (Field::Period, Literal::Int(period)) => key
            .period
            .map(|p| i64::try_from(p).unwrap_or(i64::MAX).cmp(period)),
        (Field::Name1, Literal::Str(name)) => Some(key.name1.as_str().cmp(name.as_str())),
        (Field::Name2, Literal::Str(name)) => Some(key.name2.as_str().cmp(name.as_str())),
        // literals are resolved at parse time
        _ => None,
    }
}

// Parser functions using nom

/// Wrap a parser with optional surrounding whitespace
fn ws<'a, O, P>(inner: P) -> impl Parser<&'a str, Output = O, Error = nom::error::Error<&'a str>>
where
    P: Parser<&'a str, Output = O, Error = nom::error::Error<&'a str>>,
{
    delimited(multispace0, inner, multispace0)
}

fn field(input: &str) -> IResult<&str, Field> {
    alt((
        value(Field::Category, tag("category")),
        value(Field::Period, tag("period")),
        value(Field::Name1, tag("name1")),
        value(Field::Name2, tag("name2")),
    ))
    .parse(input)
}

fn compare_op(input: &str) -> IResult<&str, CompareOp> {
    alt((
        value(CompareOp::Eq, tag("==")),
        value(CompareOp::Ne, tag("!=")),
        value(CompareOp::Le, tag("<=")),
        value(CompareOp::Ge, tag(">=")),
        value(CompareOp::Lt, tag("<")),
        value(CompareOp::Gt, tag(">")),
    ))
    .parse(input)
}

fn quoted(input: &str) -> IResult<&str, String> {
    map(
        alt((
            delimited(char('\''), opt(is_not("'")), char('\'')),
            delimited(char('"'), opt(is_not("\"")), char('"')),
        )),
        |s: Option<&str>| s.unwrap_or("").to_string(),
    )
    .parse(input)
}

fn integer(input: &str) -> IResult<&str, i64> {
    map_res(recognize(pair(opt(char('-')), digit1)), |s: &str| {
        s.parse::<i64>()
    })
    .parse(input)
}

fn literal(input: &str) -> IResult<&str, Literal> {
    alt((map(quoted, Literal::Str), map(integer, Literal::Int))).parse(input)
}

/// `[a, b]` or the tuple form `(a, b)`
fn literal_list(input: &str) -> IResult<&str, Vec<Literal>> {
    let items = || separated_list1(ws(char(',')), ws(literal));
    alt((
        delimited(ws(char('[')), items(), ws(char(']'))),
        delimited(ws(char('(')), items(), ws(char(')'))),
    ))
    .parse(input)
}

/// `in` or `not in`
fn membership(input: &str) -> IResult<&str, bool> {
    alt((
        value(true, pair(tag("not"), preceded(multispace0, tag("in")))),
        value(false, tag("in")),
    ))
    .parse(input)
}

fn comparison(input: &str) -> IResult<&str, Query> {
    let (input, field) = ws(field).parse(input)?;
    alt((
        map(pair(ws(compare_op), ws(literal)), move |(op, literal)| {
            Query::Compare { field, op, literal }
        }),
        map(pair(ws(membership), literal_list), move |(negated, literals)| {
            Query::In {
                field,
                negated,
                literals,
            }
        }),
    ))
    .parse(input)
}

fn primary(input: &str) -> IResult<&str, Query> {
    alt((
        delimited(ws(char('(')), or_expr, ws(char(')'))),
        comparison,
    ))
    .parse(input)
}

fn not_expr(input: &str) -> IResult<&str, Query> {
    alt((
        map(preceded(ws(alt((tag("~"), tag("not")))), not_expr), |q| {
            Query::Not(Box::new(q))
        }),
        primary,
    ))
    .parse(input)
}

fn and_expr(input: &str) -> IResult<&str, Query> {
    let (input, first) = not_expr(input)?;
    let (input, rest) = many0(preceded(
        ws(alt((tag("&&"), tag("&"), tag("and")))),
        not_expr,
    ))
    .parse(input)?;
    let query = rest
        .into_iter()
        .fold(first, |acc, q| Query::And(Box::new(acc), Box::new(q)));
    Ok((input, query))
}

fn or_expr(input: &str) -> IResult<&str, Query> {
    let (input, first) = and_expr(input)?;
    let (input, rest) = many0(preceded(
        ws(alt((tag("||"), tag("|"), tag("or")))),
        and_expr,
    ))
    .parse(input)?;
    let query = rest
        .into_iter()
        .fold(first, |acc, q| Query::Or(Box::new(acc), Box::new(q)));
    Ok((input, query))
}
