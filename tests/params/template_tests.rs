//! Tests of template construction from model specifications

use proptest::prelude::*;
use skillopt_rs::{Category, ModelSpecification, ParamKey, ParamsTable, SkillOptError};

use crate::test_helpers::two_factor_spec;

fn spec_yaml(n_factors: usize, n_periods: usize, n_meas: usize, constant_last: bool) -> String {
    let mut yaml = String::from("factors:\n");
    for f in 0..n_factors {
        let names: Vec<String> = (0..n_meas).map(|m| format!("m{f}_{m}")).collect();
        let period = format!("[{}]", names.join(", "));
        let periods = vec![period; n_periods].join(", ");
        yaml.push_str(&format!("  fac{f}:\n    measurements: [{periods}]\n"));
        if constant_last && f + 1 == n_factors {
            yaml.push_str("    transition_function: constant\n");
        }
    }
    yaml
}

proptest! {
    #[test]
    fn template_is_idempotent_and_sorted(
        n_factors in 1usize..4,
        n_periods in 1usize..5,
        n_meas in 1usize..4,
        constant_last in any::<bool>(),
    ) {
        let spec = ModelSpecification::from_yaml_str(
            &spec_yaml(n_factors, n_periods, n_meas, constant_last),
        ).unwrap();

        let first = ParamsTable::template(&spec).unwrap();
        let second = ParamsTable::template(&spec).unwrap();
        prop_assert_eq!(first.index(), second.index());

        let keys = first.index().keys();
        prop_assert!(keys.windows(2).all(|pair| pair[0] < pair[1]));
        prop_assert!(first.values().iter().all(|v| v.is_nan()));
        prop_assert!(first.bounds().iter().all(|b| !b.has_lower_bound() && !b.has_upper_bound()));

        let n_linear = if constant_last { n_factors - 1 } else { n_factors };
        let transitions = keys.iter().filter(|k| k.category == Category::Transition).count();
        prop_assert_eq!(transitions, (n_periods - 1) * n_linear * (n_factors + 1));
        let cholcovs = keys.iter().filter(|k| k.category == Category::InitialCholcovs).count();
        prop_assert_eq!(cholcovs, n_factors * (n_factors + 1) / 2);
    }
}

#[test]
fn test_template_rows_of_two_factor_model() {
    let spec = two_factor_spec(3);
    let template = ParamsTable::template(&spec).unwrap();

    // 5 measurements x 3 periods x (constant + x1)
    let controls = template.query("category == 'controls'").unwrap();
    assert_eq!(controls.len(), 30);

    assert!(template
        .get(&ParamKey::new(Category::Loadings, 2, "y5", "fac2"))
        .is_some());
    assert!(template
        .get(&ParamKey::new(Category::Loadings, 2, "y5", "fac1"))
        .is_none());
    assert!(template
        .get(&ParamKey::new(Category::Transition, 1, "fac1", "constant"))
        .is_some());
    assert!(template
        .get(&ParamKey::new(Category::Transition, 2, "fac1", "constant"))
        .is_none());
    assert!(template
        .get(&ParamKey::new(Category::InitialCholcovs, 0, "mixture_0", "fac2-fac1"))
        .is_some());

    assert_eq!(template.unset().len(), template.len());
}

#[test]
fn test_malformed_specifications() {
    let unequal = "factors: {fac1: {measurements: [[y1], [y1]]}, fac2: {measurements: [[y2]]}}";
    let spec = ModelSpecification::from_yaml_str(unequal).unwrap();
    assert!(matches!(
        ParamsTable::template(&spec),
        Err(SkillOptError::Specification(_))
    ));

    let dashed = "factors: {fac-1: {measurements: [[y1]]}}";
    let spec = ModelSpecification::from_yaml_str(dashed).unwrap();
    assert!(matches!(
        ParamsTable::template(&spec),
        Err(SkillOptError::Specification(_))
    ));

    let constant_control = "factors: {fac1: {measurements: [[y1]]}}\ncontrols: [constant]";
    let spec = ModelSpecification::from_yaml_str(constant_control).unwrap();
    assert!(ParamsTable::template(&spec).is_err());
}
