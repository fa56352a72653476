//! Specifications, constraints and parameters read from files

use skillopt_rs::{
    get_maximization_inputs, ConstraintSpec, ModelSpecification, ParamsTable,
};

use crate::test_helpers::{fill_params, simulated_data, two_factor_spec};

fn temp_path(name: &str) -> std::path::PathBuf {
    std::env::temp_dir().join(format!("skillopt-{}-{name}", std::process::id()))
}

#[test]
fn test_specification_files() {
    let spec = two_factor_spec(3);

    let json_path = temp_path("model.json");
    std::fs::write(&json_path, spec.to_json().unwrap()).unwrap();
    let from_json = ModelSpecification::from_path(&json_path).unwrap();
    std::fs::remove_file(&json_path).unwrap();
    assert_eq!(from_json, spec);

    let yaml_path = temp_path("model.yaml");
    std::fs::write(
        &yaml_path,
        "factors:\n  fac1:\n    measurements: [[y1, y2], [y1, y2]]\nestimation_options:\n  finite_difference_method: forward\n",
    )
    .unwrap();
    let from_yaml = ModelSpecification::from_path(&yaml_path).unwrap();
    std::fs::remove_file(&yaml_path).unwrap();
    assert_eq!(from_yaml.n_periods(), 2);
    assert_eq!(
        from_yaml.estimation_options.finite_difference_method,
        skillopt_rs::specification::DiffMethod::Forward
    );

    assert!(ModelSpecification::from_path(temp_path("missing.yaml")).is_err());
}

#[test]
fn test_usage_script() {
    let spec = two_factor_spec(3);
    let data = simulated_data(&spec, 20, 11);
    let inputs = get_maximization_inputs(&spec, &data).unwrap();

    let params_path = temp_path("params.json");
    fill_params(inputs.params_template())
        .save_json(&params_path)
        .unwrap();
    let params = ParamsTable::load_json(&params_path).unwrap();
    std::fs::remove_file(&params_path).unwrap();

    let constraints = ConstraintSpec::list_from_json(
        r#"[
            {"query": "category == 'transition' & name1 == 'fac2' & name2 == 'fac1'",
             "type": "fixed", "value": 0.1},
            {"queries": ["category == 'meas_sds' & name1 == 'y2'",
                         "category == 'meas_sds' & name1 == 'y3'"],
             "type": "pairwise_equality"}
        ]"#,
    )
    .unwrap();
    let family = inputs.with_constraints(&constraints).unwrap();

    let value = family.loglike(&params).unwrap();
    let debug = family.debug_loglike(&params).unwrap();
    let (joint_value, joint_gradient) = family.loglike_and_gradient(&params).unwrap();
    let gradient = family.gradient(&params).unwrap();
    let jacobian = family.jacobian(&params).unwrap();

    assert_eq!(value, debug.value);
    assert_eq!(value, joint_value);
    assert_eq!(gradient, joint_gradient);
    assert_eq!(jacobian.dim(), (20, family.n_free()));
    // 2 fixed transition rows, 3 tied meas sd pairs
    assert_eq!(family.n_free(), inputs.normalized().n_free() - 2 - 3);
}
