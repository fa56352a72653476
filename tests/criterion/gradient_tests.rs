//! Gradients with respect to the free vector under constraints

use approx::assert_relative_eq;
use skillopt_rs::constraints::{ConstraintSpec, RowKind};
use skillopt_rs::{Category, ParamKey};

use crate::test_helpers::small_model;

#[test]
fn test_fixed_rows_have_no_gradient_entry() {
    let (inputs, params) = small_model(2, 20);
    let n_rows = params.len();
    let normalized = inputs.normalized();

    // one fixed loading per factor and period
    assert_eq!(normalized.n_free(), n_rows - 4);
    assert_eq!(inputs.gradient(&params).unwrap().len(), n_rows - 4);

    let fixed = params.index().position(&ParamKey::new(Category::Loadings, 1, "y4", "fac2")).unwrap();
    assert_eq!(normalized.row_kind(fixed), Some(RowKind::Fixed(1.0)));
}

#[test]
fn test_tied_class_gradient_sums_member_partials() {
    let (inputs, params) = small_model(8, 30);
    let rules: Vec<ConstraintSpec> = (0..8)
        .map(|t| {
            ConstraintSpec::equality_query(&format!(
                "category == 'loadings' & name1 == 'y2' & name2 == 'fac1' & period in [{t}, {}]",
                (t + 1) % 8
            ))
        })
        .collect();
    let tied = inputs.with_constraints(&rules).unwrap();
    assert_eq!(tied.n_free(), inputs.normalized().n_free() - 7);

    let untied_gradient = inputs.gradient(&params).unwrap();
    let tied_gradient = tied.gradient(&params).unwrap();

    let members: Vec<usize> = (0..8)
        .map(|t| {
            params
                .index()
                .position(&ParamKey::new(Category::Loadings, t, "y2", "fac1"))
                .unwrap()
        })
        .collect();
    let free_position = |normalized: &skillopt_rs::NormalizedConstraints, row: usize| {
        match normalized.row_kind(row) {
            Some(RowKind::Free(i)) => i,
            other => panic!("Expected a free row, got {other:?}"),
        }
    };

    let expected: f64 = members
        .iter()
        .map(|&row| untied_gradient[free_position(inputs.normalized(), row)])
        .sum();
    let class = free_position(tied.constraints(), members[0]);
    assert_relative_eq!(tied_gradient[class], expected, max_relative = 1e-4, epsilon = 1e-5);

    // an untouched parameter keeps its partial derivative
    let other = params
        .index()
        .position(&ParamKey::new(Category::MeasSds, 3, "y5", "-"))
        .unwrap();
    assert_relative_eq!(
        tied_gradient[free_position(tied.constraints(), other)],
        untied_gradient[free_position(inputs.normalized(), other)],
        max_relative = 1e-6,
        epsilon = 1e-8
    );
}

#[test]
fn test_gradient_matches_loglike_differences() {
    let (inputs, params) = small_model(2, 15);
    let family = inputs.family();
    let free = family.free_params(&params).unwrap();
    let gradient = family.gradient_at(free.view()).unwrap();

    for j in [0, free.len() / 2, free.len() - 1] {
        let h = 1e-5;
        let mut upper = free.clone();
        upper[j] += h;
        let mut lower = free.clone();
        lower[j] -= h;
        let numeric = (family.loglike_at(upper.view()).unwrap()
            - family.loglike_at(lower.view()).unwrap())
            / (2.0 * h);
        assert_relative_eq!(gradient[j], numeric, max_relative = 1e-3, epsilon = 1e-4);
    }
}

#[test]
fn test_conflicting_extra_constraint() {
    let (inputs, _) = small_model(2, 5);
    let result = inputs.with_constraints(&[ConstraintSpec::equality_query(
        "category == 'loadings' & name1 == 'y1'",
    )]);
    assert!(matches!(
        result,
        Err(skillopt_rs::SkillOptError::ConstraintConflict { .. })
    ));
}
