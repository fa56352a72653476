//! Generation of template rows from model labels.

use super::index::{Category, ParamKey};
use crate::specification::{ModelLabels, MIXTURE, UNARY};

/// Every parameter key implied by `labels`, in generation order.
///
/// The caller sorts the keys into canonical order.
pub(crate) fn template_keys(labels: &ModelLabels) -> Vec<ParamKey> {
    let mut keys = Vec::new();

    for period in 0..labels.n_periods {
        for meas in &labels.measurements[period] {
            for control in &labels.controls {
                keys.push(ParamKey::new(Category::Controls, period, meas, control));
            }
            keys.push(ParamKey::new(Category::MeasSds, period, meas, UNARY));
        }
        for (meas, factor) in &labels.loadings[period] {
            keys.push(ParamKey::new(Category::Loadings, period, meas, factor));
        }
    }

    for period in 0..labels.n_periods.saturating_sub(1) {
        for factor in labels.linear_factors() {
            keys.push(ParamKey::new(Category::ShockSds, period, factor, UNARY));
            for coefficient in labels.transition_coefficients() {
                keys.push(ParamKey::new(
                    Category::Transition,
                    period,
                    factor,
                    &coefficient,
                ));
            }
        }
    }

    for factor in &labels.factors {
        keys.push(ParamKey::new(Category::InitialStates, 0, MIXTURE, factor));
    }
    for name in labels.cholcov_names() {
        keys.push(ParamKey::new(Category::InitialCholcovs, 0, MIXTURE, &name));
    }

    keys
}
