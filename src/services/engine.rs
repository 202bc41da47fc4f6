//! Capability Engine
//!
//! Root service: validates a chart, runs strength, scoring and pattern
//! detection through the evaluation cache, and checks the assembled output.

use parking_lot::RwLock;
use rayon::prelude::*;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

use crate::config::{AlgorithmConfig, AppConfig, CacheConfig, ConfigLoader};
use crate::error::Result;
use crate::models::{
    AlgorithmOutput, CapabilityResult, Chart, ChartInput, OutputDiagnostics, PatternResult,
    RelationDistribution, StrengthResult,
};
use crate::observability::EngineMetrics;
use crate::services::pattern::{self, recommendations};
use crate::services::performance::{
    BenchmarkReport, PerformanceManager, PerformanceStats, cache_key,
};
use crate::services::scorer::calculate_scores;
use crate::services::strength::calculate_strength;
use crate::tables;
use crate::validation::{self, InputValidation, OutputValidation};

/// Capability assessment engine
pub struct CapabilityEngine {
    config: RwLock<Arc<AlgorithmConfig>>,
    cache: PerformanceManager,
}

impl CapabilityEngine {
    /// Create an engine with explicit algorithm and cache settings
    pub fn new(config: AlgorithmConfig, cache_config: CacheConfig) -> Result<Self> {
        config.validate()?;
        tables::verify_tables()?;
        let metrics = EngineMetrics::new()?;

        info!(
            cache_enabled = cache_config.enabled,
            max_entries = cache_config.max_entries,
            ttl_secs = cache_config.ttl_secs,
            "capability engine created"
        );

        Ok(Self {
            config: RwLock::new(Arc::new(config)),
            cache: PerformanceManager::new(cache_config, metrics),
        })
    }

    /// Create an engine from a loaded application config
    pub fn from_app_config(app: &AppConfig) -> Result<Self> {
        ConfigLoader::validate(app)?;
        Self::new(app.algorithm.clone(), app.cache.clone())
    }

    /// Check an input without failing
    pub fn validate_input(&self, input: &ChartInput) -> InputValidation {
        validation::validate_input(input)
    }

    /// Strength distribution only, uncached
    pub fn calculate_ten_god_strength(&self, input: &ChartInput) -> Result<StrengthResult> {
        let chart = validation::resolve_chart(input)?;
        calculate_strength(&chart, &self.get_config())
    }

    pub fn calculate_capability_scores(
        &self,
        distribution: &RelationDistribution,
    ) -> Result<CapabilityResult> {
        calculate_scores(distribution, &self.get_config())
    }

    pub fn detect_pattern(&self, distribution: &RelationDistribution) -> Result<PatternResult> {
        pattern::detect_pattern(distribution, &self.get_config())
    }

    /// Full evaluation through the cache
    pub fn evaluate_complete(&self, input: &ChartInput) -> Result<AlgorithmOutput> {
        let chart = validation::resolve_chart(input)?;
        let config = self.get_config();
        let key = cache_key(&chart, &config)?;

        let output = self
            .cache
            .get_or_compute(key, || assemble(&chart, &config))?;
        Ok(Arc::unwrap_or_clone(output))
    }

    /// Evaluate every input in parallel; results keep the input order
    pub fn evaluate_batch(&self, inputs: &[ChartInput]) -> Vec<Result<AlgorithmOutput>> {
        let start = Instant::now();
        let results: Vec<Result<AlgorithmOutput>> = inputs
            .par_iter()
            .map(|input| self.evaluate_complete(input))
            .collect();

        debug!(
            count = inputs.len(),
            failed = results.iter().filter(|r| r.is_err()).count(),
            elapsed_ms = start.elapsed().as_secs_f64() * 1000.0,
            "batch evaluated"
        );
        results
    }

    /// Snapshot of the active configuration
    pub fn get_config(&self) -> Arc<AlgorithmConfig> {
        Arc::clone(&self.config.read())
    }

    /// Replace the active configuration
    ///
    /// Evaluations already running keep the snapshot they started with.
    pub fn update_config(&self, config: AlgorithmConfig) -> Result<()> {
        config.validate()?;
        *self.config.write() = Arc::new(config);
        info!("algorithm config replaced");
        Ok(())
    }

    pub fn validate_output(&self, output: &AlgorithmOutput) -> OutputValidation {
        validation::validate_output(output)
    }

    /// Evaluate one chart repeatedly, bypassing the cache
    pub fn performance_test(&self, input: &ChartInput, iterations: usize) -> Result<BenchmarkReport> {
        let chart = validation::resolve_chart(input)?;
        let config = self.get_config();

        let mut samples = Vec::with_capacity(iterations);
        for _ in 0..iterations {
            let start = Instant::now();
            assemble(&chart, &config)?;
            samples.push(start.elapsed().as_secs_f64() * 1000.0);
        }

        let report = BenchmarkReport::from_samples(&samples);
        info!(
            iterations,
            average_ms = report.average_ms,
            max_ms = report.max_ms,
            "performance test finished"
        );
        Ok(report)
    }

    pub fn performance_summary(&self) -> PerformanceStats {
        self.cache.summary()
    }

    pub fn metrics_text(&self) -> Result<String> {
        self.cache.metrics_text()
    }

    pub fn clear_cache(&self) {
        self.cache.clear();
    }

    pub fn set_caching_enabled(&self, enabled: bool) {
        self.cache.set_enabled(enabled);
    }
}

/// Run the pipeline for one resolved chart under one config snapshot
fn assemble(chart: &Chart, config: &AlgorithmConfig) -> Result<AlgorithmOutput> {
    let strength = calculate_strength(chart, config)?;
    let capability = calculate_scores(&strength.distribution, config)?;
    let pattern = pattern::detect_pattern(&strength.distribution, config)?;
    let advice = recommendations(&pattern, &capability.scores);

    let mut warnings = strength.tags.warnings.clone();
    warnings.extend(capability.warnings);

    let mut output = AlgorithmOutput {
        distribution: strength.distribution,
        clusters: capability.clusters,
        scores: capability.scores,
        pattern,
        tags: strength.tags,
        diagnostics: OutputDiagnostics {
            strength: strength.diagnostics,
            capabilities: capability.breakdown,
            polarization: capability.polarization,
        },
        recommendations: advice,
        warnings,
    };

    let check = validation::validate_output(&output);
    if !check.valid {
        for warning in &check.warnings {
            warn!(day_master = %chart.day_master(), %warning, "output check failed");
        }
        output.warnings.extend(check.warnings);
    }
    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EngineError;
    use crate::models::{Capability, PillarInput, SolarDate, TenGod};

    fn solar() -> SolarDate {
        SolarDate {
            year: 1984,
            month: 2,
            day: 20,
            hour: 20,
            minute: 0,
        }
    }

    fn engine() -> CapabilityEngine {
        CapabilityEngine::new(AlgorithmConfig::default(), CacheConfig::default()).unwrap()
    }

    fn self_heavy() -> ChartInput {
        ChartInput::from_pillars(
            [("甲", "子"), ("甲", "寅"), ("甲", "辰"), ("甲", "戌")],
            "male",
            solar(),
        )
    }

    #[test]
    fn test_shared_stem_scenario() {
        let output = engine().evaluate_complete(&self_heavy()).unwrap();
        let ranked = output.distribution.ranked();
        assert_eq!(ranked[0].0, TenGod::Friend);
        assert!(ranked[0].1 > 0.4);
        assert!(ranked[0].1 > ranked[1].1);
        assert!(output.scores.get(Capability::Sales) < output.scores.get(Capability::Stability));
        assert!(output.distribution.is_normalized());
    }

    #[test]
    fn test_warm_cache_matches_fresh_result() {
        let engine = engine();
        let cold = engine.evaluate_complete(&self_heavy()).unwrap();
        let warm = engine.evaluate_complete(&self_heavy()).unwrap();
        assert_eq!(cold, warm);

        let fresh = CapabilityEngine::new(AlgorithmConfig::default(), CacheConfig::default())
            .unwrap()
            .evaluate_complete(&self_heavy())
            .unwrap();
        assert_eq!(warm, fresh);

        let stats = engine.performance_summary();
        assert_eq!(stats.cache_hits, 1);
        assert_eq!(stats.cache_misses, 1);
    }

    #[test]
    fn test_invalid_input_raises_validation_error() {
        let mut input = self_heavy();
        input.pillars.day = Some(PillarInput::new("无效天干", "辰"));
        let err = engine().evaluate_complete(&input).unwrap_err();
        assert!(err.is_validation());
        assert_eq!(engine().validate_input(&input).errors.len(), 1);
    }

    #[test]
    fn test_update_config_changes_results_and_cache_key() {
        let engine = engine();
        let before = engine.evaluate_complete(&self_heavy()).unwrap();

        let mut config = AlgorithmConfig::default();
        config.amplification.enabled = false;
        engine.update_config(config.clone()).unwrap();
        assert_eq!(*engine.get_config(), config);

        let after = engine.evaluate_complete(&self_heavy()).unwrap();
        assert!(after.distribution.get(TenGod::Friend) < before.distribution.get(TenGod::Friend));
        assert_eq!(engine.performance_summary().cache_misses, 2);
    }

    #[test]
    fn test_update_config_rejects_invalid() {
        let engine = engine();
        let mut config = AlgorithmConfig::default();
        config.phantom_attenuation = -1.0;
        assert!(matches!(
            engine.update_config(config),
            Err(EngineError::Config(_))
        ));
        assert_eq!(*engine.get_config(), AlgorithmConfig::default());
    }

    #[test]
    fn test_batch_keeps_order_and_isolates_failures() {
        let engine = engine();
        let mut bad = self_heavy();
        bad.gender = "unknown".into();
        let other = ChartInput::from_pillars(
            [("庚", "申"), ("辛", "酉"), ("丙", "午"), ("壬", "子")],
            "female",
            solar(),
        );

        let results = engine.evaluate_batch(&[self_heavy(), bad, other.clone(), self_heavy()]);
        assert_eq!(results.len(), 4);
        assert!(results[1].is_err());
        assert_eq!(results[0].as_ref().unwrap(), results[3].as_ref().unwrap());
        assert_eq!(
            results[2].as_ref().unwrap(),
            &engine.evaluate_complete(&other).unwrap()
        );
    }

    #[test]
    fn test_performance_test_bypasses_cache() {
        let engine = engine();
        let report = engine.performance_test(&self_heavy(), 5).unwrap();
        assert_eq!(report.iterations, 5);
        assert!(report.min_ms <= report.average_ms && report.average_ms <= report.max_ms);
        assert_eq!(engine.performance_summary().cache_misses, 0);
        assert_eq!(engine.performance_summary().entries, 0);
    }

    #[test]
    fn test_output_validation_is_clean_for_real_output() {
        let engine = engine();
        let output = engine.evaluate_complete(&self_heavy()).unwrap();
        let check = engine.validate_output(&output);
        assert!(check.valid, "{:?}", check.warnings);
    }

    #[test]
    fn test_caching_switch_and_clear() {
        let engine = engine();
        engine.evaluate_complete(&self_heavy()).unwrap();
        engine.clear_cache();
        assert_eq!(engine.performance_summary().entries, 0);

        engine.set_caching_enabled(false);
        engine.evaluate_complete(&self_heavy()).unwrap();
        assert_eq!(engine.performance_summary().entries, 0);
        assert!(engine.metrics_text().unwrap().contains("aptitude_cache_misses_total 2"));
    }
}
