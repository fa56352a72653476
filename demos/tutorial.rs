//! Tutorial: estimating a two-factor skill formation model
//!
//! This example walks through the whole workflow: define a model, simulate a
//! panel dataset from known parameters, build the maximization inputs,
//! evaluate every criterion variant, add constraints of our own and finally
//! maximize the likelihood with projected gradient ascent.

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use skillopt_rs::error::Result;
use skillopt_rs::optimizer::AscentConfig;
use skillopt_rs::{
    get_maximization_inputs, maximize, simulate_dataset, Category, ConstraintSpec,
    ModelSpecification, ParamsTable, ProjectedGradientAscent,
};

const MODEL: &str = r#"
factors:
  cognitive:
    measurements: [[math, reading, memory], [math, reading, memory], [math, reading, memory]]
    normalizations:
      loadings: [{math: 1.0}, {math: 1.0}, {math: 1.0}]
  noncognitive:
    measurements: [[grit, calm], [grit, calm], [grit, calm]]
    normalizations:
      loadings: [{grit: 1.0}, {grit: 1.0}, {grit: 1.0}]
controls: [income]
stagemap: [0, 0]
"#;

/// Parameter values the data is simulated from.
fn true_params(template: &ParamsTable) -> Result<ParamsTable> {
    let mut params = template.clone();
    let values = template
        .index()
        .iter()
        .map(|key| match key.category {
            Category::Controls if key.name2 == "constant" => 1.0,
            Category::Controls => 0.2,
            Category::Loadings if key.name1 == "math" || key.name1 == "grit" => 1.0,
            Category::Loadings => 0.8,
            Category::MeasSds => 0.6,
            Category::ShockSds => 0.4,
            Category::InitialStates => 0.0,
            Category::InitialCholcovs if key.name2 == "noncognitive-cognitive" => 0.3,
            Category::InitialCholcovs => 1.0,
            Category::Transition if key.name2 == "constant" => 0.1,
            Category::Transition if key.name1 == key.name2 => 0.8,
            Category::Transition => 0.15,
        })
        .collect();
    params.set_values(values)?;
    Ok(params)
}

/// Start values: the true values pulled towards zero, keeping normalized
/// loadings at one.
fn start_params(truth: &ParamsTable) -> Result<ParamsTable> {
    let mut params = truth.clone();
    let values = truth
        .rows()
        .map(|row| match row.key.category {
            Category::Loadings if row.value == 1.0 => 1.0,
            Category::MeasSds | Category::ShockSds | Category::InitialCholcovs => row.value,
            _ => 0.7 * row.value,
        })
        .collect();
    params.set_values(values)?;

    // standard deviations stay positive
    let sds = params.query("category == 'meas_sds' | category == 'shock_sds'")?;
    params.set_lower_bound_at(&sds, 1e-3)?;
    Ok(params)
}

fn main() -> Result<()> {
    println!("Skill formation model tutorial");
    println!("==============================\n");

    // 1. Model specification
    let spec = ModelSpecification::from_yaml_str(MODEL)?;
    println!(
        "Model with {} factors over {} periods",
        spec.factors.len(),
        spec.n_periods()
    );

    // 2. Simulated data
    let template = ParamsTable::template(&spec)?;
    let truth = true_params(&template)?;
    let mut rng = ChaCha8Rng::seed_from_u64(2024);
    let data = simulate_dataset(&spec, &truth, 500, &mut rng)?;
    println!(
        "Simulated {} subjects ({} rows, columns {:?})\n",
        data.subjects().len(),
        data.n_rows(),
        data.columns()
    );

    // 3. Maximization inputs
    let inputs = get_maximization_inputs(&spec, &data)?;
    println!("Parameter template: {} rows", inputs.params_template().len());
    println!("Default constraints: {}", inputs.constraints().len());
    for constraint in inputs.constraints().iter().take(3) {
        println!("  {:?}", constraint);
    }
    println!("Free parameters: {}\n", inputs.family().n_free());

    // 4. Criterion variants at the start values
    let start = start_params(&truth)?;
    let loglike = inputs.loglike(&start)?;
    let gradient = inputs.gradient(&start)?;
    let jacobian = inputs.jacobian(&start)?;
    let (value, _) = inputs.loglike_and_gradient(&start)?;
    let debug = inputs.debug_loglike(&start)?;

    println!("Log-likelihood at start:     {loglike:.4}");
    println!("  value from value+gradient: {value:.4}");
    println!("  value from debug variant:  {:.4}", debug.value);
    println!(
        "  gradient norm:             {:.4}",
        gradient.dot(&gradient).sqrt()
    );
    println!(
        "  jacobian shape:            {} subjects x {} free parameters",
        jacobian.nrows(),
        jacobian.ncols()
    );
    println!(
        "  filtered states:           {:?}\n",
        debug.trace.filtered_states.shape()
    );

    // 5. Extra constraints: equal loadings of reading across periods and
    //    a fixed initial mean
    let extra = ConstraintSpec::list_from_json(
        r#"[
            {"type": "equality", "query": "category == 'loadings' & name1 == 'reading'"},
            {"type": "fixed", "query": "category == 'initial_states'", "value": 0.0}
        ]"#,
    )?;
    let constrained = inputs.with_constraints(&extra)?;
    println!(
        "With {} extra constraints: {} free parameters",
        extra.len(),
        constrained.n_free()
    );

    // 6. Maximization
    let maximizer = ProjectedGradientAscent::with_config(AscentConfig {
        max_iterations: 200,
        ..AscentConfig::default()
    });
    let (estimates, result) = maximize(&constrained, &start, &maximizer)?;

    println!("\nOptimization Results:");
    println!("  status:      {}", result.status.description());
    println!("  iterations:  {}", result.iterations);
    println!("  evaluations: {}", result.evaluations);
    println!("  loglike:     {:.4} -> {:.4}", loglike, result.value);

    println!("\nSelected estimates (true value in brackets):");
    let rows = estimates.query("category == 'loadings' | category == 'transition'")?;
    for position in rows.into_iter().take(8) {
        if let (Some(estimate), Some(actual)) = (estimates.row(position), truth.row(position)) {
            println!(
                "  {:<18} {:>2} {:<10} {:<14} {:>8.4} [{:.4}]",
                estimate.key.category.as_str(),
                estimate.key.period.map_or("-".to_string(), |p| p.to_string()),
                estimate.key.name1,
                estimate.key.name2,
                estimate.value,
                actual.value
            );
        }
    }

    Ok(())
}
