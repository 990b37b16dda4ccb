//! End-to-end tests of handler composition and variational inference

use std::collections::HashMap;

use approx::assert_relative_eq;
use minippl::params::{load_param_store, save_param_store, with_param_store, ParamFormat};
use minippl::poutine::handlers_active;
use minippl::prelude::*;
use tempfile::tempdir;

fn model(data: &Vec<f64>) -> PplResult<()> {
    let loc = sample("loc", Normal::new(0.0, 10.0)?, None)?;
    let obs = Tensor::from_vec(data.clone());
    let (_, result) = plate("data", data.len(), -1)?.run(|| sample("obs", Normal::new(loc.clone(), 1.0)?, Some(obs.clone())));
    result?;
    Ok(())
}

fn guide(_: &Vec<f64>) -> PplResult<()> {
    let loc = param("guide_loc", Some(Tensor::scalar(0.0)), Constraint::Real)?;
    let scale = param("guide_scale", Some(Tensor::scalar(1.0)), Constraint::Positive)?;
    sample("loc", Normal::new(loc, scale)?, None)?;
    Ok(())
}

#[test]
fn test_no_handler_transparency() {
    assert!(!handlers_active());
    set_rng_seed(42);
    let direct = sample("x", Normal::new(1.0, 2.0).unwrap(), None).unwrap().item().unwrap();

    set_rng_seed(42);
    let (_, traced) = TraceMessenger::new().run(|| sample("x", Normal::new(1.0, 2.0)?, None));
    assert_eq!(traced.unwrap().item().unwrap(), direct);
}

#[test]
fn test_block_scoping_hides_samples_from_outer_trace() {
    let data = vec![1.0, 2.0, 3.0];
    let outer = TraceMessenger::new().enter();
    let block = BlockMessenger::hide_types(&[SiteKind::Sample]).enter();
    let inner = TraceMessenger::new().enter();
    guide(&data).unwrap();
    let inner = inner.exit().into_trace();
    drop(block);
    let outer = outer.exit().into_trace();

    assert_eq!(outer.sample_sites().count(), 0);
    assert_eq!(outer.names().collect::<Vec<_>>(), vec!["guide_loc", "guide_scale"]);
    assert_eq!(inner.names().collect::<Vec<_>>(), vec!["guide_loc", "guide_scale", "loc"]);
}

#[test]
fn test_trace_then_replay_scores_guide_draw_under_model() {
    let data = vec![0.5];
    let guide_trace = TraceMessenger::new().get_trace(|| guide(&data)).unwrap();
    let model_trace = TraceMessenger::new()
        .get_trace(|| ReplayMessenger::new(guide_trace.clone()).run(|| model(&data)).1)
        .unwrap();

    let drawn = guide_trace.value("loc").unwrap();
    assert!(model_trace.value("loc").unwrap().ptr_eq(drawn));
    assert!(model_trace.get("obs").unwrap().is_observed);
    assert_eq!(model_trace.value("obs").unwrap().shape(), &[1]);
}

#[test]
fn test_condition_turns_latent_into_observation() {
    let mut data = HashMap::new();
    data.insert("loc".to_string(), Tensor::scalar(2.5));
    let trace = TraceMessenger::new()
        .get_trace(|| ConditionMessenger::new(data).run(|| model(&vec![2.0, 3.0])).1)
        .unwrap();
    let loc = trace.get("loc").unwrap();
    assert!(loc.is_observed);
    assert_eq!(loc.value.as_ref().unwrap().item().unwrap(), 2.5);
}

#[test]
fn test_svi_recovers_posterior_mean() {
    // posterior mean of loc is sum(data) / (n + 1/100)
    let data: Vec<f64> = vec![2.1, 1.9, 2.4, 1.6, 2.0, 2.2, 1.8, 2.0];
    let n = data.len() as f64;
    let expected = data.iter().sum::<f64>() / (n + 0.01);

    set_rng_seed(5);
    let optim = Adam::new(AdamConfig::new(0.05).with_schedule(StepDecay::new(800, 0.1))).unwrap();
    let mut svi = Svi::new(model, guide, optim, TraceElbo)
        .with_config(SviConfig::default().with_log_interval(0))
        .unwrap();
    let result = svi.fit(&data, &MaxSteps::new(1600)).unwrap();
    assert_eq!(result.steps, 1600);
    assert!(result.final_loss.unwrap().is_finite());

    let loc = with_param_store(|store| store.get_param("guide_loc").unwrap().item().unwrap());
    assert!((loc - expected).abs() < 0.2, "guide_loc = {loc}, expected {expected}");

    let early = result.history.iter().take(100).sum::<f64>() / 100.0;
    let late = result.history.moving_average(100).unwrap();
    assert!(late < early);
}

#[test]
fn test_param_store_survives_save_and_load() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("params.json");

    let data = vec![1.0];
    let mut svi = Svi::new(model, guide, Adam::new(AdamConfig::new(0.1)).unwrap(), TraceElbo);
    for _ in 0..5 {
        svi.step(&data).unwrap();
    }
    let trained = with_param_store(|store| store.get_param("guide_loc").unwrap().item().unwrap());
    save_param_store(&path, ParamFormat::Json).unwrap();

    clear_param_store();
    assert!(param("guide_loc", None, Constraint::Real).is_err());

    load_param_store(&path).unwrap();
    let restored = param("guide_loc", None, Constraint::Real).unwrap().item().unwrap();
    assert_relative_eq!(restored, trained, epsilon = 1e-12);
}
