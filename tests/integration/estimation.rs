//! Maximum likelihood estimation on simulated panels

use skillopt_rs::optimizer::{AscentConfig, ConvergenceCriteria};
use skillopt_rs::{maximize, Category, ParamKey, ProjectedGradientAscent};

use crate::test_helpers::small_model;

#[test]
fn test_maximize_improves_loglike_and_respects_bounds() {
    let (inputs, truth) = small_model(2, 60);

    // start away from the simulation values
    let mut start = truth.clone();
    for pos in start.query("category == 'loadings' & name1 != 'y1' & name1 != 'y4'").unwrap() {
        start.set_value_at(pos, 0.4).unwrap();
    }
    let sds = start.query("category in ['meas_sds', 'shock_sds']").unwrap();
    start.set_lower_bound_at(&sds, 1e-3).unwrap();

    let maximizer = ProjectedGradientAscent::with_config(AscentConfig {
        max_iterations: 50,
        convergence: ConvergenceCriteria {
            relative_criterion_tolerance: 1e-8,
            ..ConvergenceCriteria::default()
        },
        ..AscentConfig::default()
    });
    let (estimates, result) = maximize(inputs.family(), &start, &maximizer).unwrap();

    let start_value = inputs.loglike(&start).unwrap();
    assert!(result.value > start_value, "{} <= {start_value}", result.value);
    assert_eq!(inputs.loglike(&estimates).unwrap(), result.value);
    assert!(result.iterations > 0);
    assert!(result.evaluations > result.iterations);

    for pos in sds {
        assert!(estimates.values()[pos] >= 1e-3);
    }

    // normalized loadings stay at their fixed values
    let fixed = ParamKey::new(Category::Loadings, 1, "y1", "fac1");
    assert_eq!(estimates.get(&fixed).unwrap().value, 1.0);
    // estimates moved towards the simulation value of 0.8
    let free = ParamKey::new(Category::Loadings, 0, "y2", "fac1");
    assert!(estimates.get(&free).unwrap().value > 0.4);
}

#[test]
fn test_maximize_with_tied_loadings() {
    let (inputs, truth) = small_model(3, 30);
    let tied = inputs
        .with_constraints(&[skillopt_rs::ConstraintSpec::equality_query(
            "category == 'loadings' & name1 == 'y5'",
        )])
        .unwrap();

    let maximizer = ProjectedGradientAscent::with_config(AscentConfig {
        max_iterations: 20,
        ..AscentConfig::default()
    });
    let (estimates, _) = maximize(&tied, &truth, &maximizer).unwrap();

    let values: Vec<f64> = estimates
        .query("category == 'loadings' & name1 == 'y5'")
        .unwrap()
        .into_iter()
        .map(|pos| estimates.values()[pos])
        .collect();
    assert_eq!(values.len(), 3);
    assert!(values.iter().all(|v| *v == values[0]));
}
