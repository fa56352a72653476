//! Agreement between the five criterion variants

use approx::assert_relative_eq;
use skillopt_rs::{ConstraintSpec, ParamsTable, SkillOptError};

use crate::test_helpers::small_model;

#[test]
fn test_values_agree_across_variants() {
    let (inputs, params) = small_model(3, 40);

    let value = inputs.loglike(&params).unwrap();
    let debug = inputs.debug_loglike(&params).unwrap();
    let (joint_value, joint_gradient) = inputs.loglike_and_gradient(&params).unwrap();
    let gradient = inputs.gradient(&params).unwrap();

    assert!(value.is_finite());
    assert_eq!(value, debug.value);
    assert_eq!(value, joint_value);
    assert_eq!(gradient, joint_gradient);
}

#[test]
fn test_jacobian_columns_sum_to_gradient() {
    let (inputs, params) = small_model(2, 25);

    let jacobian = inputs.jacobian(&params).unwrap();
    let gradient = inputs.gradient(&params).unwrap();
    assert_eq!(jacobian.dim(), (25, inputs.normalized().n_free()));

    for (j, column) in jacobian.columns().into_iter().enumerate() {
        assert_relative_eq!(column.sum(), gradient[j], epsilon = 1e-8, max_relative = 1e-10);
    }
}

#[test]
fn test_debug_trace_is_consistent() {
    let (inputs, params) = small_model(3, 10);
    let debug = inputs.debug_loglike(&params).unwrap();

    assert_eq!(debug.trace.subjects.len(), 10);
    assert_eq!(debug.trace.period_contributions.dim(), (10, 3));
    assert_eq!(debug.trace.filtered_states.dim(), (10, 3, 2));
    assert_eq!(debug.trace.factors, vec!["fac1", "fac2"]);
    assert_eq!(debug.params.len(), params.len());
    assert_relative_eq!(debug.trace.period_contributions.sum(), debug.value, epsilon = 1e-9);

    // fixed rows take their constraint values in the full vector
    let normalized_loading = params
        .query("category == 'loadings' & name1 == 'y1'")
        .unwrap();
    for pos in normalized_loading {
        assert_eq!(debug.params[pos], 1.0);
    }
}

#[test]
fn test_unset_and_foreign_tables_are_rejected() {
    let (inputs, mut params) = small_model(2, 5);
    let template = inputs.params_template().clone();
    assert!(matches!(
        inputs.loglike(&template),
        Err(SkillOptError::ParameterValidation { .. })
    ));

    let pos = params.query("category == 'meas_sds' & name1 == 'y3'").unwrap()[0];
    params.set_value_at(pos, f64::INFINITY).unwrap();
    assert!(matches!(
        inputs.gradient(&params),
        Err(SkillOptError::ParameterValidation { .. })
    ));

    let (other, _) = small_model(3, 5);
    let foreign = crate::test_helpers::fill_params(other.params_template());
    assert!(matches!(
        inputs.jacobian(&foreign),
        Err(SkillOptError::ParameterValidation { .. })
    ));
}

#[test]
fn test_fixed_rows_ignore_table_values() {
    let (inputs, params) = small_model(2, 10);
    let mut changed: ParamsTable = params.clone();
    for pos in changed.query("category == 'loadings' & name1 == 'y4'").unwrap() {
        changed.set_value_at(pos, 123.0).unwrap();
    }
    assert_eq!(inputs.loglike(&params).unwrap(), inputs.loglike(&changed).unwrap());
}

#[test]
fn test_missing_measurements_lower_information() {
    use crate::test_helpers::{simulated_data, two_factor_spec, with_missing, fill_params};
    use skillopt_rs::get_maximization_inputs;

    let spec = two_factor_spec(2);
    let full = simulated_data(&spec, 20, 3);
    let sparse = with_missing(&full, 2);

    let full_inputs = get_maximization_inputs(&spec, &full).unwrap();
    let sparse_inputs = get_maximization_inputs(&spec, &sparse).unwrap();
    let params = fill_params(full_inputs.params_template());

    let full_value = full_inputs.loglike(&params).unwrap();
    let sparse_value = sparse_inputs.loglike(&params).unwrap();
    assert!(full_value.is_finite() && sparse_value.is_finite());
    assert_ne!(full_value, sparse_value);
}

#[test]
fn test_fixed_value_outside_bounds_is_rejected() {
    let (inputs, mut params) = small_model(2, 10);
    let family = inputs
        .with_constraints(&[ConstraintSpec::fixed_query(
            "category == 'meas_sds' & name1 == 'y1'",
            -3.0,
        )])
        .unwrap();
    assert!(family.loglike(&params).is_ok());

    let sds = params.query("category == 'meas_sds'").unwrap();
    params.set_lower_bound_at(&sds, 0.0).unwrap();
    for result in [
        family.loglike(&params).map(|_| ()),
        family.gradient(&params).map(|_| ()),
        family.debug_loglike(&params).map(|_| ()),
    ] {
        assert!(matches!(
            result,
            Err(SkillOptError::ParameterValidation { .. })
        ));
    }
}
