//! Tests of constraint normalization against model templates

use proptest::prelude::*;
use skillopt_rs::constraints::{ConstraintSpec, Loc, NormalizedConstraints, RowKind};
use skillopt_rs::{Category, ParamKey, ParamsTable, SkillOptError};

use crate::test_helpers::two_factor_spec;

fn loading(period: usize, meas: &str, factor: &str) -> ParamKey {
    ParamKey::new(Category::Loadings, period, meas, factor)
}

/// One rule per period, each tying the y2 loading of its period to the
/// next period's, wrapping around.
fn per_period_rules(n_periods: usize) -> Vec<ConstraintSpec> {
    (0..n_periods)
        .map(|t| {
            ConstraintSpec::equality_query(&format!(
                "category == 'loadings' & name1 == 'y2' & name2 == 'fac1' & period in [{t}, {}]",
                (t + 1) % n_periods
            ))
        })
        .collect()
}

#[test]
fn test_eight_per_period_rules_form_one_class() {
    let template = ParamsTable::template(&two_factor_spec(8)).unwrap();
    let index = template.index();
    let normalized = NormalizedConstraints::new(index, &per_period_rules(8)).unwrap();

    let members: Vec<usize> = (0..8)
        .map(|t| index.position(&loading(t, "y2", "fac1")).unwrap())
        .collect();
    let class = match normalized.row_kind(members[0]) {
        Some(RowKind::Free(class)) => class,
        other => panic!("Expected a free row, got {other:?}"),
    };
    assert_eq!(normalized.free_parameters()[class].members(), members.as_slice());
    assert_eq!(normalized.n_free(), index.len() - 7);
}

#[test]
fn test_zero_match_selector_fails() {
    let template = ParamsTable::template(&two_factor_spec(2)).unwrap();
    let constraints = [
        ConstraintSpec::fixed_query("category == 'loadings' & name1 == 'y1'", 1.0),
        ConstraintSpec::equality_query("name1 == 'y9'"),
    ];
    let err = NormalizedConstraints::new(template.index(), &constraints).unwrap_err();
    match err {
        SkillOptError::SelectorResolution { selector } => {
            assert!(selector.contains("y9"), "{selector}")
        }
        other => panic!("Expected SelectorResolution, got {other:?}"),
    }

    let loc = ConstraintSpec::fixed_loc(Loc::exact(&loading(5, "y1", "fac1")), 1.0);
    assert!(matches!(
        NormalizedConstraints::new(template.index(), &[loc]),
        Err(SkillOptError::SelectorResolution { .. })
    ));
}

#[test]
fn test_fixed_row_inside_equality_conflicts() {
    let template = ParamsTable::template(&two_factor_spec(3)).unwrap();
    let constraints = [
        ConstraintSpec::equality_query("category == 'loadings' & name1 == 'y2'"),
        ConstraintSpec::fixed_loc(Loc::exact(&loading(1, "y2", "fac1")), 0.8),
    ];
    match NormalizedConstraints::new(template.index(), &constraints) {
        Err(SkillOptError::ConstraintConflict { key, message }) => {
            assert_eq!(key, "(loadings, 1, y2, fac1)");
            assert!(message.contains("fixed"), "{message}");
        }
        other => panic!("Expected ConstraintConflict, got {other:?}"),
    }
}

#[test]
fn test_constraints_from_json() {
    let template = ParamsTable::template(&two_factor_spec(3)).unwrap();
    let constraints = ConstraintSpec::list_from_json(
        r#"[
            {"loc": ["loadings", 0, "y1", "fac1"], "type": "fixed", "value": 1.0},
            {"query": "category == 'transition' & name1 == 'fac2' & name2 == 'fac1'",
             "type": "fixed", "value": 0},
            {"locs": [["shock_sds", 0], ["shock_sds", 1]], "type": "pairwise_equality"}
        ]"#,
    )
    .unwrap();
    let normalized = NormalizedConstraints::new(template.index(), &constraints).unwrap();

    let coefficient = ParamKey::new(Category::Transition, 1, "fac2", "fac1");
    let pos = template.index().position(&coefficient).unwrap();
    assert_eq!(normalized.row_kind(pos), Some(RowKind::Fixed(0.0)));

    // 2 factors x 3 coefficients x 2 transition periods; one fixed per period
    let classes = |query: &str| -> std::collections::BTreeSet<usize> {
        template
            .query(query)
            .unwrap()
            .into_iter()
            .filter_map(|pos| match normalized.row_kind(pos) {
                Some(RowKind::Free(class)) => Some(class),
                _ => None,
            })
            .collect()
    };
    assert_eq!(template.query("category == 'transition'").unwrap().len(), 12);
    assert_eq!(classes("category == 'transition'").len(), 10);

    // shock sds of both factors are shared between the two transitions
    assert_eq!(template.query("category == 'shock_sds'").unwrap().len(), 4);
    assert_eq!(classes("category == 'shock_sds'").len(), 2);
}

proptest! {
    #[test]
    fn partition_does_not_depend_on_rule_order(
        seed in any::<u64>(),
    ) {
        let template = ParamsTable::template(&two_factor_spec(8)).unwrap();
        let mut rules = per_period_rules(8);
        rules.push(ConstraintSpec::fixed_query("category == 'loadings' & name1 == 'y1'", 1.0));
        rules.push(ConstraintSpec::equality_query("category == 'meas_sds' & name1 == 'y3'"));
        let reference = NormalizedConstraints::new(template.index(), &rules).unwrap();

        // deterministic shuffle from the seed
        let mut state = seed;
        for i in (1..rules.len()).rev() {
            state = state.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
            let j = (state >> 33) as usize % (i + 1);
            rules.swap(i, j);
        }
        let shuffled = NormalizedConstraints::new(template.index(), &rules).unwrap();
        prop_assert_eq!(shuffled, reference);
    }
}
