//! Tests of filling, querying and persisting parameter tables

use approx::assert_relative_eq;
use skillopt_rs::{Category, ParamKey, ParamsTable, SkillOptError};

use crate::test_helpers::{fill_params, two_factor_spec};

#[test]
fn test_fill_values_is_all_or_nothing() {
    let mut params = ParamsTable::template(&two_factor_spec(2)).unwrap();
    let known = ParamKey::new(Category::Loadings, 0, "y2", "fac1");
    let unknown = ParamKey::new(Category::Loadings, 0, "y9", "fac1");

    let result = params.fill_values(vec![(known.clone(), 0.8), (unknown, 0.1)]);
    assert!(matches!(result, Err(SkillOptError::ParameterValidation { .. })));
    assert!(params.get(&known).unwrap().value.is_nan());

    params.fill_values(vec![(known.clone(), 0.8)]).unwrap();
    assert_relative_eq!(params.get(&known).unwrap().value, 0.8);
}

#[test]
fn test_bounds_on_queried_rows() {
    let mut params = ParamsTable::template(&two_factor_spec(2)).unwrap();
    let sds = params.query("category in ['meas_sds', 'shock_sds']").unwrap();
    params.set_lower_bound_at(&sds, 0.0).unwrap();

    for pos in sds {
        let row = params.row(pos).unwrap();
        assert_eq!(row.bounds.lower, 0.0);
        assert!(!row.bounds.has_upper_bound());
    }

    let key = ParamKey::new(Category::Loadings, 1, "y2", "fac1");
    assert!(params.set_bounds(&key, 1.0, 0.0).is_err());
}

#[test]
fn test_json_file_round_trip() {
    let mut params = fill_params(&ParamsTable::template(&two_factor_spec(2)).unwrap());
    let sds = params.query("category == 'meas_sds'").unwrap();
    params.set_lower_bound_at(&sds, 0.0).unwrap();
    params
        .set_value(&ParamKey::new(Category::Loadings, 1, "y2", "fac1"), f64::NAN)
        .unwrap();

    let path = std::env::temp_dir().join(format!("skillopt-params-{}.json", std::process::id()));
    params.save_json(&path).unwrap();
    let loaded = ParamsTable::load_json(&path).unwrap();
    std::fs::remove_file(&path).unwrap();

    assert_eq!(loaded.index(), params.index());
    assert_eq!(loaded.bounds(), params.bounds());
    assert_eq!(loaded.unset().len(), 1);

    let json = params.to_json().unwrap();
    assert!(json.contains("\"upper_bound\": null"));
    assert!(json.contains("\"lower_bound\": 0.0"));
}

#[test]
fn test_query_errors() {
    let params = ParamsTable::template(&two_factor_spec(2)).unwrap();
    assert!(matches!(
        params.query("period == 'one'"),
        Err(SkillOptError::QueryParse { .. })
    ));
    assert!(matches!(
        params.query("category == 'nonsense'"),
        Err(SkillOptError::QueryParse { .. })
    ));
    assert!(params.query("name1 == 'y1' &").is_err());
}
