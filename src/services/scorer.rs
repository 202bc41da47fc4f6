//! Capability Scorer
//!
//! Maps a relation distribution onto the six capability scores. Each score is
//! a weighted sum over the ten categories, divided by the capability's largest
//! weight and passed through the configured rescaling curve. Both steps are
//! monotone, so moving strength toward a capability's top-weighted category
//! never lowers that capability's score.
//!
//! `ScoringConfig` can layer a dominance bonus, a pattern bonus, a multiplier
//! and a score floor on top of the base. Those stages are off by default.

use tracing::{debug, warn};

use crate::config::{AlgorithmConfig, BaseScore};
use crate::error::Result;
use crate::models::{
    Capability, CapabilityBreakdown, CapabilityResult, CapabilityScores, ClusterScores,
    PatternResult, Polarization, RelationDistribution, TenGod, WeightedContribution,
};
use crate::services::pattern;
use crate::tables;
use crate::validation;

const TOP_CONTRIBUTIONS: usize = 3;

/// Score a distribution
pub fn calculate_scores(
    distribution: &RelationDistribution,
    config: &AlgorithmConfig,
) -> Result<CapabilityResult> {
    validation::validate_distribution(distribution)?;
    tables::verify_tables()?;

    let scoring = &config.scoring;
    let detected: Option<PatternResult> = if scoring.pattern_bonus {
        Some(pattern::detect_pattern(distribution, config)?)
    } else {
        None
    };

    let mut warnings = Vec::new();
    let mut values = [0.0; 6];
    let mut breakdown = Vec::with_capacity(Capability::ALL.len());

    for capability in Capability::ALL {
        let mut contributions: Vec<WeightedContribution> = TenGod::ALL
            .iter()
            .map(|god| {
                let strength = distribution.get(*god);
                let weight = tables::capability_weight(capability, *god);
                WeightedContribution {
                    ten_god: *god,
                    strength,
                    weight,
                    contribution: strength * weight,
                }
            })
            .collect();

        let raw: f64 = contributions.iter().map(|c| c.contribution).sum();
        let relative = raw / tables::max_weight(capability);
        let base = match scoring.base {
            BaseScore::Relative => scoring.rescaling.apply(relative),
            BaseScore::RootWeighted => {
                100.0
                    * contributions
                        .iter()
                        .map(|c| c.strength.sqrt() * c.weight)
                        .sum::<f64>()
            }
        };

        let dominance_bonus = if scoring.dominance_bonus.enabled {
            contributions
                .iter()
                .filter(|c| c.strength > scoring.dominance_bonus.threshold)
                .map(|c| c.contribution * scoring.dominance_bonus.factor)
                .sum()
        } else {
            0.0
        };

        let pattern_bonus = detected.as_ref().map_or(0.0, |p| {
            pattern::pattern_bonus(p.pattern_type, capability) * p.confidence
        });

        let mut score = (base + dominance_bonus + pattern_bonus) * scoring.multiplier;
        if !score.is_finite() {
            warn!(capability = %capability, raw, "non-finite capability score replaced with 0");
            warnings.push(format!("{} 分数计算异常，已置为 0", capability));
            score = 0.0;
        }
        let score = score.clamp(scoring.min_score, 100.0);
        values[capability.index()] = score;

        contributions.sort_by(|a, b| {
            b.contribution
                .total_cmp(&a.contribution)
                .then(a.ten_god.cmp(&b.ten_god))
        });
        contributions.truncate(TOP_CONTRIBUTIONS);

        breakdown.push(CapabilityBreakdown {
            capability,
            raw,
            relative,
            base,
            dominance_bonus,
            pattern_bonus,
            score,
            top_contributions: contributions,
        });
    }

    let scores = CapabilityScores::from_values(values);
    let polarization = polarization(&scores);

    debug!(
        strongest = %polarization.strongest,
        disparity = polarization.disparity,
        "capability scores computed"
    );

    Ok(CapabilityResult {
        scores,
        clusters: ClusterScores::from_distribution(distribution),
        breakdown,
        polarization,
        warnings,
    })
}

fn polarization(scores: &CapabilityScores) -> Polarization {
    let disparity = scores.max() - scores.min();
    let mut weakest = Capability::Execution;
    for capability in Capability::ALL {
        if scores.get(capability) < scores.get(weakest) {
            weakest = capability;
        }
    }
    Polarization {
        disparity,
        balance: 1.0 - (disparity / 100.0).clamp(0.0, 1.0),
        strongest: scores.strongest(),
        weakest,
    }
}
