//! 评估结果模型
//!
//! 计算结果均为只读快照，下游消费方不应修改。

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::models::capability::{Capability, CapabilityScores};
use crate::models::chart::PillarPosition;
use crate::models::symbols::{Element, Stem};
use crate::models::ten_god::{ClusterScores, RelationDistribution, TenGod};

/// 贡献来源层
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Layer {
    /// 天干
    Stem,
    /// 地支藏干
    Hidden,
}

/// 单条贡献明细
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PillarContribution {
    pub position: PillarPosition,
    pub layer: Layer,
    /// 贡献来源天干（藏干时为藏干本身）
    pub source: Stem,
    pub ten_god: TenGod,
    /// 藏干分量，天干层恒为 1.0
    pub sub_weight: f64,
    pub position_weight: f64,
    pub layer_coefficient: f64,
    pub seasonal_factor: f64,
    /// 虚透衰减系数，未虚透时为 1.0
    pub attenuation: f64,
    pub value: f64,
}

/// 虚透天干
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhantomStem {
    pub position: PillarPosition,
    pub stem: Stem,
    pub element: Element,
}

/// 强度计算诊断信息
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrengthDiagnostics {
    /// 逐柱逐层贡献
    pub contributions: Vec<PillarContribution>,
    /// 各五行在四支藏干中的通根分数
    pub element_roots: BTreeMap<Element, f64>,
    /// 月令对各五行的季节系数
    pub seasonal_factors: BTreeMap<Element, f64>,
    pub phantom_stems: Vec<PhantomStem>,
    /// 放大前的原始累计值
    pub raw_totals: BTreeMap<TenGod, f64>,
    /// 触发主导放大的十神
    pub amplified: Vec<TenGod>,
    /// 总量为零，回退为均匀分布
    pub degenerate: bool,
    /// 十神后处理轨迹，未启用时为空
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub processing: Option<ProcessingTrace>,
}

/// 十神后处理轨迹
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessingTrace {
    /// 食神、伤官共同扣减的比例
    pub absorption_rate: f64,
    /// 触发弱根衰减的十神
    pub weak_roots: Vec<TenGod>,
    /// 由七杀转为正官的占比，未触发杀化时为 0
    pub kill_converted: f64,
}

/// 杀化模式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KillMode {
    /// 七杀超过正官两倍
    KillDominant,
    Normal,
}

/// 分析标签
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrengthTags {
    /// 伤官占比
    pub hurt_absorb_rate: f64,
    pub kill_mode: KillMode,
    /// 从格倾向
    pub follower: bool,
    /// 虚透天干数 / 4
    pub phantom_ratio: f64,
    /// 最大单项占比
    pub dominance: f64,
    pub warnings: Vec<String>,
}

/// 强度计算结果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrengthResult {
    pub distribution: RelationDistribution,
    pub tags: StrengthTags,
    pub diagnostics: StrengthDiagnostics,
}

/// 单项加权贡献
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WeightedContribution {
    pub ten_god: TenGod,
    pub strength: f64,
    pub weight: f64,
    pub contribution: f64,
}

/// 单项能力的计算明细
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CapabilityBreakdown {
    pub capability: Capability,
    /// 加权和
    pub raw: f64,
    /// 加权和 / 最大权重
    pub relative: f64,
    /// 基础分（按 `scoring.base` 计算）
    #[serde(default)]
    pub base: f64,
    #[serde(default)]
    pub dominance_bonus: f64,
    #[serde(default)]
    pub pattern_bonus: f64,
    pub score: f64,
    /// 贡献最大的三项
    pub top_contributions: Vec<WeightedContribution>,
}

/// 能力极化程度
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Polarization {
    /// 最高分与最低分之差
    pub disparity: f64,
    /// 1 - clamp(disparity / 100)
    pub balance: f64,
    pub strongest: Capability,
    pub weakest: Capability,
}

/// 评分结果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CapabilityResult {
    pub scores: CapabilityScores,
    pub clusters: ClusterScores,
    pub breakdown: Vec<CapabilityBreakdown>,
    pub polarization: Polarization,
    pub warnings: Vec<String>,
}

/// 格局类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PatternType {
    /// 从格
    Follower,
    /// 印旺格
    Resource,
    /// 正官格
    DirectOfficer,
    /// 七杀格
    SevenKillings,
    /// 财旺格
    Wealth,
    /// 比劫格
    Companion,
    /// 食伤格
    Output,
    /// 普通格局
    Ordinary,
}

impl PatternType {
    pub fn hanzi(self) -> &'static str {
        match self {
            PatternType::Follower => "从格",
            PatternType::Resource => "印旺格",
            PatternType::DirectOfficer => "正官格",
            PatternType::SevenKillings => "七杀格",
            PatternType::Wealth => "财旺格",
            PatternType::Companion => "比劫格",
            PatternType::Output => "食伤格",
            PatternType::Ordinary => "普通格局",
        }
    }
}

impl std::fmt::Display for PatternType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.hanzi())
    }
}

/// 格局判定结果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatternResult {
    pub dominant: TenGod,
    pub strength_ratio: f64,
    /// [0, 1]
    pub confidence: f64,
    pub pattern_type: PatternType,
    pub description: String,
}

/// 完整评估诊断
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputDiagnostics {
    pub strength: StrengthDiagnostics,
    pub capabilities: Vec<CapabilityBreakdown>,
    pub polarization: Polarization,
}

/// 完整评估结果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlgorithmOutput {
    pub distribution: RelationDistribution,
    pub clusters: ClusterScores,
    pub scores: CapabilityScores,
    pub pattern: PatternResult,
    pub tags: StrengthTags,
    pub diagnostics: OutputDiagnostics,
    /// 基于格局与能力分布的建议
    pub recommendations: Vec<String>,
    /// 计算与输出校验过程中累积的提示
    pub warnings: Vec<String>,
}
