// Integration tests for the capability engine
//
// Tests cover:
// - Whole-pipeline invariants over randomly generated charts
// - Input rejection
// - Configuration effects (monotonicity, degenerate weights, swaps)
// - Cache behaviour under batch and concurrent load

use aptitude::config::{AlgorithmConfig, CacheConfig, ConfigLoader};
use aptitude::models::{
    AlgorithmOutput, Branch, Capability, ChartInput, Layer, PillarInput, PillarPosition, SolarDate,
    Stem, TenGod,
};
use aptitude::services::{CapabilityEngine, create_evaluator};
use fake::Fake;
use rstest::rstest;
use std::sync::Arc;

fn solar() -> SolarDate {
    SolarDate {
        year: 1990,
        month: 6,
        day: 15,
        hour: 8,
        minute: 0,
    }
}

fn engine() -> CapabilityEngine {
    CapabilityEngine::new(AlgorithmConfig::default(), CacheConfig::default()).unwrap()
}

fn random_chart() -> ChartInput {
    let pillar = || {
        let stem = Stem::ALL[(0..10).fake::<usize>()];
        let branch = Branch::ALL[(0..12).fake::<usize>()];
        PillarInput::new(stem.hanzi(), branch.hanzi())
    };
    let (year, month, day, hour) = (pillar(), pillar(), pillar(), pillar());
    let mut input = ChartInput::from_pillars(
        [
            (year.stem.as_str(), year.branch.as_str()),
            (month.stem.as_str(), month.branch.as_str()),
            (day.stem.as_str(), day.branch.as_str()),
            (hour.stem.as_str(), hour.branch.as_str()),
        ],
        if (0..2).fake::<u8>() == 0 { "male" } else { "female" },
        solar(),
    );
    input.solar = Some(SolarDate {
        year: (1900..=2100).fake::<i32>(),
        month: (1..=12).fake::<u32>(),
        day: (1..=28).fake::<u32>(),
        hour: (0..24).fake::<u32>(),
        minute: (0..60).fake::<u32>(),
    });
    input
}

// ============ Invariants ============

#[test]
fn test_random_charts_satisfy_output_invariants() {
    let engine = engine();
    for _ in 0..200 {
        let input = random_chart();
        let output = engine.evaluate_complete(&input).unwrap();

        assert!(output.distribution.is_normalized());
        assert!(output.distribution.iter().all(|(_, v)| v >= 0.0));
        assert!(output.scores.iter().all(|(_, s)| (0.0..=100.0).contains(&s)));
        assert!((0.0..=1.0).contains(&output.pattern.confidence));
        let stem_layer = output
            .diagnostics
            .strength
            .contributions
            .iter()
            .filter(|c| c.layer == Layer::Stem)
            .count();
        assert_eq!(stem_layer, 4);
        assert!(engine.validate_output(&output).valid);
    }
}

#[test]
fn test_evaluation_is_deterministic_across_engines() {
    let input = random_chart();
    let first = engine().evaluate_complete(&input).unwrap();
    let second = engine().evaluate_complete(&input).unwrap();
    assert_eq!(
        serde_json::to_string(&first).unwrap(),
        serde_json::to_string(&second).unwrap()
    );
}

#[test]
fn test_output_survives_json_round_trip() {
    let output = engine().evaluate_complete(&random_chart()).unwrap();
    let json = serde_json::to_value(&output).unwrap();
    assert!(json["scores"]["stability"].is_number());
    assert!(json["distribution"]["friend"].is_number());
    let back: AlgorithmOutput = serde_json::from_value(json).unwrap();
    assert_eq!(back.pattern.pattern_type, output.pattern.pattern_type);
    assert_eq!(back.scores.strongest(), output.scores.strongest());
    assert!((back.distribution.total() - 1.0).abs() < 1e-9);
}

// ============ Input rejection ============

#[rstest]
#[case::bad_stem("pillars.day.stem", |i: &mut ChartInput| i.pillars.day = Some(PillarInput::new("X", "子")))]
#[case::bad_branch("pillars.hour.branch", |i: &mut ChartInput| i.pillars.hour = Some(PillarInput::new("甲", "猫")))]
#[case::missing_pillar("pillars.year", |i: &mut ChartInput| i.pillars.year = None)]
#[case::bad_gender("gender", |i: &mut ChartInput| i.gender = "other".into())]
#[case::missing_date("solar", |i: &mut ChartInput| i.solar = None)]
#[case::impossible_date("solar", |i: &mut ChartInput| {
    i.solar = Some(SolarDate { year: 2023, month: 2, day: 30, hour: 0, minute: 0 })
})]
#[case::hour_out_of_range("solar.hour", |i: &mut ChartInput| {
    i.solar = Some(SolarDate { year: 2023, month: 2, day: 1, hour: 24, minute: 0 })
})]
fn test_invalid_input_is_rejected(#[case] field: &str, #[case] mutate: fn(&mut ChartInput)) {
    let mut input = random_chart();
    mutate(&mut input);

    let engine = engine();
    let report = engine.validate_input(&input);
    assert!(!report.valid);
    assert!(report.errors.iter().any(|e| e.field() == field), "{:?}", report.errors);

    let err = engine.evaluate_complete(&input).unwrap_err();
    assert!(err.is_validation());
    assert_eq!(engine.performance_summary().cache_misses, 0);
}

#[test]
fn test_pinyin_and_hanzi_inputs_agree() {
    let hanzi = ChartInput::from_pillars(
        [("甲", "子"), ("丙", "寅"), ("戊", "午"), ("庚", "申")],
        "male",
        solar(),
    );
    let pinyin = ChartInput::from_pillars(
        [("jia", "zi"), ("bing", "yin"), ("wu", "wu"), ("geng", "shen")],
        "Male",
        solar(),
    );
    let engine = engine();
    assert_eq!(
        engine.evaluate_complete(&hanzi).unwrap(),
        engine.evaluate_complete(&pinyin).unwrap()
    );
}

// ============ Configuration effects ============

#[test]
fn test_shared_stem_chart_favours_stability_over_sales() {
    let input = ChartInput::from_pillars(
        [("甲", "子"), ("甲", "寅"), ("甲", "辰"), ("甲", "戌")],
        "male",
        solar(),
    );
    let output = engine().evaluate_complete(&input).unwrap();
    assert_eq!(output.pattern.dominant, TenGod::Friend);
    assert!(output.distribution.get(TenGod::Friend) > 0.5);
    assert!(output.scores.get(Capability::Sales) < output.scores.get(Capability::Stability));
    assert!(output.pattern.confidence > 0.5);
}

/// Capabilities whose largest weight sits on the given category
fn top_weighted_by(god: TenGod) -> &'static [Capability] {
    match god {
        TenGod::DirectOfficer => &[Capability::Execution, Capability::Management],
        TenGod::HurtingOfficer => &[Capability::Innovation, Capability::Sales],
        TenGod::DirectResource => &[Capability::Coordination],
        TenGod::Friend => &[Capability::Stability],
        _ => &[],
    }
}

#[test]
fn test_raising_month_weight_does_not_lower_stability() {
    let input = ChartInput::from_pillars(
        [("甲", "子"), ("乙", "卯"), ("乙", "亥"), ("丙", "子")],
        "female",
        solar(),
    );
    let base = engine().evaluate_complete(&input).unwrap();

    let mut config = AlgorithmConfig::default();
    config.position_weights.month = 1.5;
    let heavier = CapabilityEngine::new(config, CacheConfig::default())
        .unwrap()
        .evaluate_complete(&input)
        .unwrap();

    assert!(heavier.distribution.get(TenGod::Friend) >= base.distribution.get(TenGod::Friend));
    assert!(
        heavier.scores.get(Capability::Stability) >= base.scores.get(Capability::Stability) - 1e-9
    );
}

#[test]
fn test_raising_month_weight_is_monotone_over_random_charts() {
    // Month branches holding a single hidden stem of the same element as
    // the month stem, so the whole month pillar feeds one category
    let months = [("癸", "子"), ("乙", "卯"), ("辛", "酉")];

    let mut heavy_config = AlgorithmConfig::default();
    heavy_config.position_weights.month = 1.5;
    let light = engine();
    let heavy = CapabilityEngine::new(heavy_config, CacheConfig::default()).unwrap();

    let mut checked = 0;
    for _ in 0..300 {
        let mut input = random_chart();
        let (stem, branch) = months[(0..months.len()).fake::<usize>()];
        input.pillars.month = Some(PillarInput::new(stem, branch));

        let before = light.evaluate_complete(&input).unwrap();
        let after = heavy.evaluate_complete(&input).unwrap();

        let target = before
            .diagnostics
            .strength
            .contributions
            .iter()
            .find(|c| c.position == PillarPosition::Month && c.layer == Layer::Stem)
            .map(|c| c.ten_god)
            .unwrap();

        assert!(
            after.distribution.get(target) >= before.distribution.get(target) - 1e-12,
            "{:?}: {} -> {}",
            target,
            before.distribution.get(target),
            after.distribution.get(target)
        );
        for capability in top_weighted_by(target) {
            assert!(
                after.scores.get(*capability) >= before.scores.get(*capability) - 1e-9,
                "{:?} under {:?}",
                capability,
                target
            );
            checked += 1;
        }
    }
    assert!(checked > 0);
}

#[test]
fn test_zero_weights_fall_back_to_uniform() {
    let mut config = AlgorithmConfig::default();
    config.position_weights.year = 0.0;
    config.position_weights.month = 0.0;
    config.position_weights.day = 0.0;
    config.position_weights.hour = 0.0;

    let engine = CapabilityEngine::new(config, CacheConfig::default()).unwrap();
    let output = engine.evaluate_complete(&random_chart()).unwrap();

    assert!(output.diagnostics.strength.degenerate);
    assert!(output.distribution.iter().all(|(_, v)| (v - 0.1).abs() < 1e-12));
    assert_eq!(output.pattern.confidence, 0.0);
    assert!(!output.warnings.is_empty());
}

#[test]
fn test_config_swap_does_not_serve_stale_results() {
    let engine = engine();
    let input = random_chart();
    let before = engine.evaluate_complete(&input).unwrap();

    let mut config = AlgorithmConfig::default();
    config.scoring.rescaling = aptitude::config::Rescaling::Linear;
    engine.update_config(config).unwrap();
    let after = engine.evaluate_complete(&input).unwrap();

    assert_eq!(before.distribution, after.distribution);
    assert!(Capability::ALL
        .iter()
        .all(|c| after.scores.get(*c) <= before.scores.get(*c) + 1e-9));
    assert_eq!(engine.performance_summary().cache_misses, 2);
}

#[test]
fn test_algorithm_config_from_file() {
    figment::Jail::expect_with(|jail| {
        jail.create_file(
            "tuned.toml",
            r#"
            [algorithm.position_weights]
            month = 1.2

            [algorithm.scoring.rescaling]
            curve = "linear"
            "#,
        )?;
        let config = ConfigLoader::load_algorithm_config("tuned.toml")?;
        assert_eq!(config.position_weights.month, 1.2);
        assert_eq!(config.position_weights.year, 0.45);

        let engine = CapabilityEngine::new(config, CacheConfig::default())
            .map_err(|e| e.to_string())?;
        assert_eq!(engine.get_config().position_weights.month, 1.2);
        Ok(())
    });
}

// ============ Cache behaviour ============

#[test]
fn test_batch_of_duplicates_computes_once() {
    let engine = engine();
    let input = random_chart();
    let results = engine.evaluate_batch(&[input.clone(), input.clone(), input]);
    assert!(results.iter().all(|r| r.is_ok()));

    let stats = engine.performance_summary();
    assert_eq!(stats.cache_misses, 1);
    assert_eq!(stats.cache_hits, 2);
    assert_eq!(stats.entries, 1);
}

#[test]
fn test_warm_and_cold_cache_agree() {
    let input = random_chart();
    let warm_engine = engine();
    warm_engine.evaluate_complete(&input).unwrap();
    let warm = warm_engine.evaluate_complete(&input).unwrap();

    let cold_engine = engine();
    cold_engine.set_caching_enabled(false);
    let cold = cold_engine.evaluate_complete(&input).unwrap();

    assert_eq!(warm, cold);
}

#[test]
fn test_capacity_is_respected_under_load() {
    let cache = CacheConfig {
        max_entries: 16,
        ..CacheConfig::default()
    };
    let engine = CapabilityEngine::new(AlgorithmConfig::default(), cache).unwrap();
    for _ in 0..100 {
        engine.evaluate_complete(&random_chart()).unwrap();
    }
    let stats = engine.performance_summary();
    assert!(stats.entries <= 16);
    assert_eq!(stats.cache_hits + stats.cache_misses, 100);
}

#[tokio::test]
async fn test_async_adapter_serves_concurrent_requests() {
    let engine = Arc::new(engine());
    let evaluator: Arc<dyn aptitude::CapabilityEvaluator> =
        Arc::from(create_evaluator(Arc::clone(&engine)));
    let input = random_chart();

    let mut handles = Vec::new();
    for _ in 0..16 {
        let evaluator = Arc::clone(&evaluator);
        let input = input.clone();
        handles.push(tokio::spawn(async move { evaluator.evaluate(input).await }));
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    let stats = engine.performance_summary();
    assert_eq!(stats.cache_misses, 1);
    assert_eq!(stats.cache_hits, 15);
}
