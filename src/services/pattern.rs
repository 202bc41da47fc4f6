//! Pattern Detector
//!
//! Finds the dominant relation category and classifies the chart's overall
//! pattern from cluster strengths.

use tracing::debug;

use crate::config::{AlgorithmConfig, RatioBasis};
use crate::error::Result;
use crate::models::{
    Capability, CapabilityScores, Cluster, PatternResult, PatternType, RelationDistribution,
    TenGod,
};
use crate::validation;

const OTHERS_EPSILON: f64 = 1e-3;

/// 最强十神须超过此占比才进入格局判定
const PATTERN_MIN_SHARE: f64 = 0.3;

/// Detect the dominant category and pattern of a distribution
pub fn detect_pattern(
    distribution: &RelationDistribution,
    config: &AlgorithmConfig,
) -> Result<PatternResult> {
    validation::validate_distribution(distribution)?;

    let ranked = distribution.ranked();
    let (dominant, top) = ranked[0];
    let second = ranked[1].1;
    let total = distribution.total();

    let strength_ratio = match config.pattern.ratio_basis {
        RatioBasis::Total => {
            if total > 0.0 {
                top / total
            } else {
                0.0
            }
        }
        RatioBasis::Others => top / (total - top + OTHERS_EPSILON),
    };

    let confidence = if top > 0.0 {
        ((top - second) / top).clamp(0.0, 1.0)
    } else {
        0.0
    };

    let pattern_type = classify(distribution, top, second, config);

    debug!(
        dominant = %dominant,
        pattern = %pattern_type,
        strength_ratio,
        confidence,
        "pattern detected"
    );

    Ok(PatternResult {
        dominant,
        strength_ratio,
        confidence,
        pattern_type,
        description: describe(pattern_type).to_string(),
    })
}

fn classify(
    distribution: &RelationDistribution,
    top: f64,
    second: f64,
    config: &AlgorithmConfig,
) -> PatternType {
    let follower_ratio = top / (second + OTHERS_EPSILON);
    if follower_ratio > config.pattern.follower_ratio && top > config.pattern.follower_min_share {
        return PatternType::Follower;
    }

    if top <= PATTERN_MIN_SHARE {
        return PatternType::Ordinary;
    }

    if distribution.cluster(Cluster::Resource) > 0.3 {
        PatternType::Resource
    } else if distribution.cluster(Cluster::Officer) > 0.25 {
        if distribution.get(TenGod::DirectOfficer) > distribution.get(TenGod::SevenKillings) {
            PatternType::DirectOfficer
        } else {
            PatternType::SevenKillings
        }
    } else if distribution.cluster(Cluster::Wealth) > 0.25 {
        PatternType::Wealth
    } else if distribution.cluster(Cluster::Companion) > 0.3 {
        PatternType::Companion
    } else if distribution.cluster(Cluster::Output) > 0.25 {
        PatternType::Output
    } else {
        PatternType::Ordinary
    }
}

fn describe(pattern_type: PatternType) -> &'static str {
    match pattern_type {
        PatternType::Follower => "从格成立，专一发展某方面能力",
        PatternType::Resource => "印星旺盛，利于学习和稳定发展",
        PatternType::DirectOfficer => "正官得用，利于仕途和管理",
        PatternType::SevenKillings => "七杀有制，利于开拓和执行",
        PatternType::Wealth => "财星旺盛，利于经商和理财",
        PatternType::Companion => "比劫旺盛，利于合作和团队发展",
        PatternType::Output => "食伤旺盛，利于创新和表达",
        PatternType::Ordinary => "格局平和，各方面能力均衡发展",
    }
}

/// Score bonus a pattern grants a capability at full confidence
pub fn pattern_bonus(pattern_type: PatternType, capability: Capability) -> f64 {
    use Capability::*;
    match (pattern_type, capability) {
        (PatternType::Resource, Stability) => 25.0,
        (PatternType::Resource, Coordination) => 20.0,
        (PatternType::Resource, Management) => 15.0,
        (PatternType::Resource, Execution) => 10.0,
        (PatternType::DirectOfficer, Execution) => 25.0,
        (PatternType::DirectOfficer, Management) => 20.0,
        (PatternType::DirectOfficer, Stability) => 15.0,
        (PatternType::SevenKillings, Execution) => 30.0,
        (PatternType::SevenKillings, Innovation) => 15.0,
        (PatternType::SevenKillings, Management) => 10.0,
        (PatternType::Wealth, Sales) => 25.0,
        (PatternType::Wealth, Innovation) => 20.0,
        (PatternType::Wealth, Execution) => 15.0,
        (PatternType::Output, Innovation) => 30.0,
        (PatternType::Output, Sales) => 20.0,
        (PatternType::Output, Coordination) => 15.0,
        (PatternType::Companion, Stability) => 20.0,
        (PatternType::Companion, Execution) => 15.0,
        (PatternType::Companion, Coordination) => 10.0,
        _ => 0.0,
    }
}

/// Career suggestions derived from the pattern and the score spread
pub fn recommendations(pattern: &PatternResult, scores: &CapabilityScores) -> Vec<String> {
    let mut out: Vec<String> = match pattern.pattern_type {
        PatternType::Resource => vec![
            "适合从事教育、研究、文化等稳定性行业",
            "注重知识积累和专业技能提升",
        ],
        PatternType::DirectOfficer => vec!["适合管理岗位和公职工作", "发挥组织协调和规范执行的优势"],
        PatternType::SevenKillings => {
            vec!["适合开拓性和竞争性强的工作", "注重执行力和决断力的发挥"]
        }
        PatternType::Wealth => vec!["适合商业经营和财务管理工作", "发挥理财和市场敏感度优势"],
        PatternType::Output => vec!["适合创意、表达和技艺类工作", "注重创新思维和沟通表达能力"],
        PatternType::Companion => vec!["适合团队合作和伙伴经营模式", "发挥协作和稳定发展优势"],
        PatternType::Follower | PatternType::Ordinary => Vec::new(),
    }
    .into_iter()
    .map(String::from)
    .collect();

    let strongest = scores.strongest();
    if scores.get(strongest) >= 75.0 {
        out.push(format!("{}是您的优势领域，建议重点发展", strongest));
    }

    let mut weakest = Capability::Execution;
    for capability in Capability::ALL {
        if scores.get(capability) < scores.get(weakest) {
            weakest = capability;
        }
    }
    if scores.get(weakest) <= 40.0 {
        out.push(format!("{}相对较弱，可通过学习和练习提升", weakest));
    }

    let spread = scores.max() - scores.min();
    if spread > 50.0 {
        out.push("能力分布不够均衡，建议在发挥优势的同时补强短板".to_string());
    } else if spread < 20.0 {
        out.push("能力发展较为均衡，适合综合性和管理类岗位".to_string());
    }

    out
}
