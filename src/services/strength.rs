//! Relational Strength Calculator
//!
//! Turns the eight chart symbols into a normalized distribution over the ten
//! relation categories, keeping every intermediate contribution for audit.

use std::collections::BTreeMap;

use tracing::debug;

use crate::config::AlgorithmConfig;
use crate::error::{EngineError, Result};
use crate::models::{
    Chart, Element, KillMode, Layer, PhantomStem, PillarContribution, PillarPosition,
    ProcessingTrace, RelationDistribution, Stem, StrengthDiagnostics, StrengthResult,
    StrengthTags, TenGod,
};
use crate::tables;

/// Compute the ten-category strength distribution of a chart
pub fn calculate_strength(chart: &Chart, config: &AlgorithmConfig) -> Result<StrengthResult> {
    tables::verify_tables()?;

    let day_master = chart.day_master();
    let month_branch = chart.month_branch();
    let element_roots = element_roots(chart);

    let mut contributions = Vec::with_capacity(16);
    let mut phantom_stems = Vec::new();
    let mut raw = [0.0_f64; 10];

    for (position, pillar) in chart.pillars() {
        let position_weight = config.position_weights.get(position);

        let element = pillar.stem.element();
        let rooted = element_roots.get(&element).copied().unwrap_or(0.0) > 0.0;
        let attenuation = if rooted {
            1.0
        } else {
            phantom_stems.push(PhantomStem {
                position,
                stem: pillar.stem,
                element,
            });
            config.phantom_attenuation
        };

        let stem_contribution = contribution(
            position,
            Layer::Stem,
            pillar.stem,
            day_master,
            1.0,
            position_weight,
            config.layer_coefficients.stem,
            tables::seasonal_factor(month_branch, element),
            attenuation,
        )?;
        raw[stem_contribution.ten_god.index()] += stem_contribution.value;
        contributions.push(stem_contribution);

        for &(hidden, sub_weight) in tables::hidden_stems(pillar.branch) {
            let hidden_contribution = contribution(
                position,
                Layer::Hidden,
                hidden,
                day_master,
                sub_weight,
                position_weight,
                config.layer_coefficients.hidden,
                tables::seasonal_factor(month_branch, hidden.element()),
                1.0,
            )?;
            raw[hidden_contribution.ten_god.index()] += hidden_contribution.value;
            contributions.push(hidden_contribution);
        }
    }

    let (mut distribution, amplified, degenerate) = amplify_and_normalize(&raw, config)?;
    let processing = if config.ten_god_processing.enabled && !degenerate {
        let (processed, trace) = apply_processing(&distribution, config);
        distribution = processed;
        Some(trace)
    } else {
        None
    };
    let tags = analysis_tags(&distribution, phantom_stems.len(), degenerate, config);

    debug!(
        day_master = %day_master,
        month_branch = %month_branch,
        phantoms = phantom_stems.len(),
        degenerate,
        "strength distribution computed"
    );

    let seasonal_factors = Element::ALL
        .iter()
        .map(|e| (*e, tables::seasonal_factor(month_branch, *e)))
        .collect();

    Ok(StrengthResult {
        distribution,
        tags,
        diagnostics: StrengthDiagnostics {
            contributions,
            element_roots,
            seasonal_factors,
            phantom_stems,
            raw_totals: TenGod::ALL.iter().map(|g| (*g, raw[g.index()])).collect(),
            amplified,
            degenerate,
            processing,
        },
    })
}

/// 各五行在四支藏干中的分量之和
fn element_roots(chart: &Chart) -> BTreeMap<Element, f64> {
    let mut roots: BTreeMap<Element, f64> = Element::ALL.iter().map(|e| (*e, 0.0)).collect();
    for (_, pillar) in chart.pillars() {
        for &(hidden, weight) in tables::hidden_stems(pillar.branch) {
            *roots.entry(hidden.element()).or_insert(0.0) += weight;
        }
    }
    roots
}

#[allow(clippy::too_many_arguments)]
fn contribution(
    position: PillarPosition,
    layer: Layer,
    source: Stem,
    day_master: Stem,
    sub_weight: f64,
    position_weight: f64,
    layer_coefficient: f64,
    seasonal_factor: f64,
    attenuation: f64,
) -> Result<PillarContribution> {
    let value = sub_weight * position_weight * layer_coefficient * seasonal_factor * attenuation;
    if !value.is_finite() {
        return Err(EngineError::Calculation(format!(
            "non-finite contribution from {} {} at {}",
            source,
            match layer {
                Layer::Stem => "stem",
                Layer::Hidden => "hidden stem",
            },
            position
        )));
    }
    Ok(PillarContribution {
        position,
        layer,
        source,
        ten_god: tables::relation(day_master, source),
        sub_weight,
        position_weight,
        layer_coefficient,
        seasonal_factor,
        attenuation,
        value,
    })
}

fn amplify_and_normalize(
    raw: &[f64; 10],
    config: &AlgorithmConfig,
) -> Result<(RelationDistribution, Vec<TenGod>, bool)> {
    let total: f64 = raw.iter().sum();
    if !total.is_finite() {
        return Err(EngineError::Calculation(format!(
            "raw strength total is not finite: {}",
            total
        )));
    }
    if total <= 0.0 {
        return Ok((RelationDistribution::uniform(), Vec::new(), true));
    }

    let amp = &config.amplification;
    let mut boosted = *raw;
    let mut amplified = Vec::new();
    if amp.enabled {
        for god in TenGod::ALL {
            let share = raw[god.index()] / total;
            if share > amp.threshold {
                boosted[god.index()] *= 1.0 + amp.k * (share - amp.threshold).powf(amp.gamma);
                amplified.push(god);
            }
        }
    }

    let boosted_total: f64 = boosted.iter().sum();
    if !boosted_total.is_finite() || boosted_total <= 0.0 {
        return Err(EngineError::Calculation(format!(
            "amplified strength total is invalid: {}",
            boosted_total
        )));
    }

    let mut values = [0.0; 10];
    for (slot, value) in values.iter_mut().zip(boosted.iter()) {
        *slot = value / boosted_total;
    }
    Ok((RelationDistribution::from_values(values), amplified, false))
}

/// Food/hurt absorption, weak-root damping and kill conversion on the shares
fn apply_processing(
    distribution: &RelationDistribution,
    config: &AlgorithmConfig,
) -> (RelationDistribution, ProcessingTrace) {
    let params = &config.ten_god_processing;
    let mut values = *distribution.values();

    let food = TenGod::EatingGod.index();
    let hurt = TenGod::HurtingOfficer.index();
    let output_total = values[food] + values[hurt];
    let absorption_rate = if output_total > 0.0 {
        (params.food_hurt_absorption * output_total.powf(params.marginal_alpha)).clamp(0.0, 1.0)
    } else {
        0.0
    };
    values[food] *= 1.0 - absorption_rate;
    values[hurt] *= 1.0 - absorption_rate;

    let mut weak_roots = Vec::new();
    for god in TenGod::ALL {
        let value = &mut values[god.index()];
        if *value > 0.0 && *value < params.weak_root_ratio {
            *value *= params.weak_root_factor;
            weak_roots.push(god);
        }
    }

    let kill = TenGod::SevenKillings.index();
    let total: f64 = values.iter().sum();
    let mut kill_converted = 0.0;
    if total > 0.0 && values[kill] / total > params.kill_dominance_threshold {
        let moved = values[kill] * params.kill_conversion_rate;
        values[kill] -= moved;
        values[TenGod::DirectOfficer.index()] += moved;
        kill_converted = moved / total;
    }

    debug!(
        absorption_rate,
        weak_roots = weak_roots.len(),
        kill_converted,
        "ten god processing applied"
    );

    (
        RelationDistribution::normalized(values),
        ProcessingTrace {
            absorption_rate,
            weak_roots,
            kill_converted,
        },
    )
}

fn analysis_tags(
    distribution: &RelationDistribution,
    phantom_count: usize,
    degenerate: bool,
    config: &AlgorithmConfig,
) -> StrengthTags {
    let mut warnings = Vec::new();

    let total = distribution.total();
    let hurt_absorb_rate = if total > 0.0 {
        distribution.get(TenGod::HurtingOfficer) / total
    } else {
        0.0
    };

    let kill_mode =
        if distribution.get(TenGod::SevenKillings) > distribution.get(TenGod::DirectOfficer) * 2.0 {
            KillMode::KillDominant
        } else {
            KillMode::Normal
        };

    let ranked = distribution.ranked();
    let max = ranked[0].1;
    let second = ranked[1].1;
    let dominance_ratio = if second > 0.0 {
        max / second
    } else if max > 0.0 {
        f64::INFINITY
    } else {
        0.0
    };
    let follower = dominance_ratio > config.pattern.follower_tag_ratio;

    let phantom_ratio = phantom_count as f64 / 4.0;
    let dominance = max;

    if degenerate {
        warnings.push("四柱贡献总和为零，已回退为均匀分布".to_string());
    }
    if phantom_ratio > 0.5 {
        warnings.push(format!("虚透天干过多: {} 个", phantom_count));
    }
    if dominance > 0.7 {
        warnings.push("单一十神过强，可能影响平衡性".to_string());
    }
    if hurt_absorb_rate > 0.3 {
        warnings.push(format!("伤官吸收率较高: {:.1}%", hurt_absorb_rate * 100.0));
    }

    StrengthTags {
        hurt_absorb_rate,
        kill_mode,
        follower,
        phantom_ratio,
        dominance,
        warnings,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Branch, Gender, Pillar, SolarDate};

    fn chart(pillars: [(Stem, Branch); 4]) -> Chart {
        let [year, month, day, hour] = pillars.map(|(stem, branch)| Pillar { stem, branch });
        Chart {
            year,
            month,
            day,
            hour,
            gender: Gender::Male,
            solar: SolarDate {
                year: 1984,
                month: 2,
                day: 20,
                hour: 20,
                minute: 0,
            },
            lunar: None,
        }
    }

    fn self_heavy() -> Chart {
        chart([
            (Stem::Jia, Branch::Zi),
            (Stem::Jia, Branch::Yin),
            (Stem::Jia, Branch::Chen),
            (Stem::Jia, Branch::Xu),
        ])
    }

    #[test]
    fn test_distribution_sums_to_one() {
        let result = calculate_strength(&self_heavy(), &AlgorithmConfig::default()).unwrap();
        assert!(result.distribution.is_normalized());
        assert!(result.distribution.iter().all(|(_, v)| (0.0..=1.0).contains(&v)));
        assert!(!result.diagnostics.degenerate);
    }

    #[test]
    fn test_shared_day_master_makes_friend_dominant() {
        let result = calculate_strength(&self_heavy(), &AlgorithmConfig::default()).unwrap();
        let ranked = result.distribution.ranked();
        assert_eq!(ranked[0].0, TenGod::Friend);
        assert!(ranked[0].1 > 0.4);
        assert!(ranked[0].1 > ranked[1].1);
        assert_eq!(result.diagnostics.amplified, vec![TenGod::Friend]);
        assert!(result.tags.follower);
    }

    #[test]
    fn test_contributions_cover_every_symbol() {
        let result = calculate_strength(&self_heavy(), &AlgorithmConfig::default()).unwrap();
        let contributions = &result.diagnostics.contributions;
        // 子(1) + 寅(3) + 辰(3) + 戌(3) 藏干，加四个天干
        assert_eq!(contributions.len(), 14);
        assert_eq!(
            contributions
                .iter()
                .filter(|c| c.layer == Layer::Stem)
                .count(),
            4
        );

        let month_stem = contributions
            .iter()
            .find(|c| c.position == PillarPosition::Month && c.layer == Layer::Stem)
            .unwrap();
        // 寅月木旺
        assert_eq!(month_stem.seasonal_factor, 1.38);
        assert_eq!(month_stem.position_weight, 1.0);
        assert!((month_stem.value - 1.38).abs() < 1e-12);
    }

    #[test]
    fn test_unrooted_stem_is_attenuated() {
        // 四支藏干均无金，庚为虚透
        let result = calculate_strength(
            &chart([
                (Stem::Geng, Branch::Zi),
                (Stem::Bing, Branch::Wu),
                (Stem::Jia, Branch::Yin),
                (Stem::Ren, Branch::Zi),
            ]),
            &AlgorithmConfig::default(),
        )
        .unwrap();

        let phantoms = &result.diagnostics.phantom_stems;
        assert_eq!(phantoms.len(), 1);
        assert_eq!(phantoms[0].stem, Stem::Geng);
        assert_eq!(phantoms[0].position, PillarPosition::Year);
        assert_eq!(result.tags.phantom_ratio, 0.25);

        let year_stem = result
            .diagnostics
            .contributions
            .iter()
            .find(|c| c.position == PillarPosition::Year && c.layer == Layer::Stem)
            .unwrap();
        assert_eq!(year_stem.attenuation, 0.6);
        assert_eq!(result.diagnostics.element_roots[&Element::Metal], 0.0);
    }

    #[test]
    fn test_zero_weights_fall_back_to_uniform() {
        let mut config = AlgorithmConfig::default();
        config.position_weights.year = 0.0;
        config.position_weights.month = 0.0;
        config.position_weights.day = 0.0;
        config.position_weights.hour = 0.0;

        let result = calculate_strength(&self_heavy(), &config).unwrap();
        assert_eq!(result.distribution, RelationDistribution::uniform());
        assert!(result.diagnostics.degenerate);
        assert!(!result.tags.warnings.is_empty());
    }

    #[test]
    fn test_infinite_weight_is_calculation_error() {
        let mut config = AlgorithmConfig::default();
        config.position_weights.day = f64::INFINITY;
        assert!(matches!(
            calculate_strength(&self_heavy(), &config),
            Err(EngineError::Calculation(_))
        ));
    }

    #[test]
    fn test_kill_mode_tag() {
        // 甲日主，庚为七杀
        let result = calculate_strength(
            &chart([
                (Stem::Geng, Branch::Shen),
                (Stem::Geng, Branch::Shen),
                (Stem::Jia, Branch::Shen),
                (Stem::Geng, Branch::Shen),
            ]),
            &AlgorithmConfig::default(),
        )
        .unwrap();
        assert_eq!(result.tags.kill_mode, KillMode::KillDominant);
        assert_eq!(result.distribution.ranked()[0].0, TenGod::SevenKillings);
    }

    fn tag_config() -> AlgorithmConfig {
        AlgorithmConfig::default()
    }

    #[test]
    fn test_phantom_heavy_chart_warns() {
        let tags = analysis_tags(&RelationDistribution::uniform(), 3, false, &tag_config());
        assert_eq!(tags.phantom_ratio, 0.75);
        assert!(tags.warnings.iter().any(|w| w == "虚透天干过多: 3 个"));

        // 两个虚透恰好为一半，不提示
        let tags = analysis_tags(&RelationDistribution::uniform(), 2, false, &tag_config());
        assert!(tags.warnings.is_empty());
    }

    #[test]
    fn test_single_category_dominance_warns() {
        let tags = analysis_tags(
            &RelationDistribution::concentrated(TenGod::DirectWealth),
            0,
            false,
            &tag_config(),
        );
        assert_eq!(tags.dominance, 1.0);
        assert!(tags.follower);
        assert!(
            tags.warnings
                .iter()
                .any(|w| w == "单一十神过强，可能影响平衡性")
        );
    }

    #[test]
    fn test_high_hurting_officer_share_warns() {
        let mut values = [0.6 / 9.0; 10];
        values[TenGod::HurtingOfficer.index()] = 0.4;
        let tags = analysis_tags(
            &RelationDistribution::from_values(values),
            0,
            false,
            &tag_config(),
        );
        assert!((tags.hurt_absorb_rate - 0.4).abs() < 1e-12);
        assert!(tags.warnings.iter().any(|w| w == "伤官吸收率较高: 40.0%"));
        assert_eq!(tags.warnings.len(), 1);
    }

    #[test]
    fn test_uniform_distribution_has_no_warnings() {
        let tags = analysis_tags(&RelationDistribution::uniform(), 0, false, &tag_config());
        assert!(tags.warnings.is_empty());
        assert!(!tags.follower);
        assert_eq!(tags.kill_mode, KillMode::Normal);
    }

    #[test]
    fn test_all_kill_chart_carries_dominance_warning() {
        let result = calculate_strength(
            &chart([
                (Stem::Geng, Branch::Shen),
                (Stem::Geng, Branch::Shen),
                (Stem::Jia, Branch::Shen),
                (Stem::Geng, Branch::Shen),
            ]),
            &AlgorithmConfig::default(),
        )
        .unwrap();
        assert!(result.tags.dominance > 0.7, "dominance = {}", result.tags.dominance);
        assert!(
            result
                .tags
                .warnings
                .contains(&"单一十神过强，可能影响平衡性".to_string())
        );
    }

    #[test]
    fn test_processing_is_off_by_default() {
        let result = calculate_strength(&self_heavy(), &AlgorithmConfig::default()).unwrap();
        assert!(result.diagnostics.processing.is_none());
    }

    #[test]
    fn test_processing_absorbs_output_and_converts_kill() {
        let mut values = [0.0; 10];
        values[TenGod::SevenKillings.index()] = 0.6;
        values[TenGod::EatingGod.index()] = 0.2;
        values[TenGod::DirectOfficer.index()] = 0.17;
        values[TenGod::Friend.index()] = 0.03;
        let dist = RelationDistribution::from_values(values);

        let mut config = AlgorithmConfig::default();
        config.ten_god_processing.enabled = true;
        let (processed, trace) = apply_processing(&dist, &config);

        // 0.9 * 0.2^0.9
        let expected_rate = 0.9 * 0.2_f64.powf(0.9);
        assert!((trace.absorption_rate - expected_rate).abs() < 1e-12);
        assert_eq!(trace.weak_roots, vec![TenGod::Friend]);
        assert!(trace.kill_converted > 0.0);

        assert!(processed.is_normalized());
        assert!(processed.get(TenGod::EatingGod) < 0.2);
        assert!(processed.get(TenGod::DirectOfficer) > 0.17);
        assert!(processed.get(TenGod::SevenKillings) < 0.6);
        assert!(processed.get(TenGod::Friend) < 0.03);
    }

    #[test]
    fn test_processing_trace_recorded_on_chart() {
        let mut config = AlgorithmConfig::default();
        config.ten_god_processing.enabled = true;
        let result = calculate_strength(&self_heavy(), &config).unwrap();
        assert!(result.distribution.is_normalized());
        let trace = result.diagnostics.processing.unwrap();
        assert!((0.0..=1.0).contains(&trace.absorption_rate));
    }

    #[test]
    fn test_deterministic() {
        let config = AlgorithmConfig::default();
        let a = calculate_strength(&self_heavy(), &config).unwrap();
        let b = calculate_strength(&self_heavy(), &config).unwrap();
        assert_eq!(a, b);
    }
}
