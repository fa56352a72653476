//! Tests of the filter language against a model template

use skillopt_rs::constraints::Query;
use skillopt_rs::{ParamsTable, SkillOptError};

use crate::test_helpers::two_factor_spec;

fn count(table: &ParamsTable, query: &str) -> usize {
    table.query(query).unwrap().len()
}

#[test]
fn test_operator_precedence() {
    let table = ParamsTable::template(&two_factor_spec(2)).unwrap();

    // `&` binds tighter than `|`
    let loose = count(&table, "name1 == 'y1' | name1 == 'y2' & category == 'loadings'");
    let explicit = count(&table, "name1 == 'y1' | (name1 == 'y2' & category == 'loadings')");
    let grouped = count(&table, "(name1 == 'y1' | name1 == 'y2') & category == 'loadings'");
    assert_eq!(loose, explicit);
    assert_eq!(grouped, 4);
    assert!(loose > grouped);

    let words = count(&table, "name1 == 'y1' or name1 == 'y2' and category == 'loadings'");
    assert_eq!(words, loose);
}

#[test]
fn test_negation_and_membership() {
    let table = ParamsTable::template(&two_factor_spec(2)).unwrap();
    let total = table.len();
    let loadings = count(&table, "category == 'loadings'");

    assert_eq!(count(&table, "~(category == 'loadings')"), total - loadings);
    assert_eq!(count(&table, "not category == 'loadings'"), total - loadings);
    assert_eq!(
        count(&table, "category not in ['loadings']"),
        count(&table, "category != 'loadings'")
    );
    assert_eq!(count(&table, "period >= 1 & category == 'loadings'"), 5);
}

#[test]
fn test_query_parse_errors() {
    for bad in ["period ==", "name1 = 'y1'", "period in []", "(name1 == 'y1'", "color == 'red'"] {
        assert!(Query::parse(bad).is_err(), "'{bad}' should not parse");
    }

    let table = ParamsTable::template(&two_factor_spec(2)).unwrap();
    match table.query("period < 'x'") {
        Err(SkillOptError::QueryParse { query, .. }) => assert_eq!(query, "period < 'x'"),
        other => panic!("Expected QueryParse, got {other:?}"),
    }
}

#[test]
fn test_tuple_and_bracket_lists_agree() {
    let table = ParamsTable::template(&two_factor_spec(3)).unwrap();
    let tuple = table
        .query("category == 'loadings' & period in (0, 1)")
        .unwrap();
    let bracket = table
        .query("category == 'loadings' & period in [0, 1]")
        .unwrap();
    assert_eq!(tuple, bracket);
    assert_eq!(tuple.len(), 10);
}
