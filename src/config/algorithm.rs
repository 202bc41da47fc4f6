//! 算法参数配置
//!
//! 每次评估使用同一份不可变快照；引擎实例可整体替换。

use serde::{Deserialize, Serialize};

use crate::config::loader::ConfigValidationError;
use crate::models::PillarPosition;

/// 柱位权重
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PositionWeights {
    pub year: f64,
    pub month: f64,
    pub day: f64,
    pub hour: f64,
}

impl Default for PositionWeights {
    fn default() -> Self {
        Self {
            year: 0.45,
            month: 1.0,
            day: 0.70,
            hour: 0.55,
        }
    }
}

impl PositionWeights {
    pub fn get(&self, position: PillarPosition) -> f64 {
        match position {
            PillarPosition::Year => self.year,
            PillarPosition::Month => self.month,
            PillarPosition::Day => self.day,
            PillarPosition::Hour => self.hour,
        }
    }
}

/// 天干层与藏干层系数
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LayerCoefficients {
    pub stem: f64,
    pub hidden: f64,
}

impl Default for LayerCoefficients {
    fn default() -> Self {
        Self {
            stem: 1.0,
            hidden: 1.0,
        }
    }
}

/// 主导放大参数
///
/// 占比超过 `threshold` 的十神乘以 `1 + k * (share - threshold)^gamma`。
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AmplificationConfig {
    pub enabled: bool,
    pub threshold: f64,
    pub k: f64,
    pub gamma: f64,
}

impl Default for AmplificationConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            threshold: 0.3,
            k: 0.5,
            gamma: 0.6,
        }
    }
}

/// 相对分数到 [0, 100] 的映射曲线
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
#[serde(tag = "curve", rename_all = "snake_case")]
pub enum Rescaling {
    /// 100 * sqrt(x)
    #[default]
    SquareRoot,
    /// 归一化 logistic，x=0 时为 0，x=1 时为 100
    Logistic { midpoint: f64, steepness: f64 },
    /// 100 * x
    Linear,
}

impl Rescaling {
    /// 将 [0, 1] 内的相对值映射到 [0, 100]，在该区间内单调不减
    pub fn apply(&self, relative: f64) -> f64 {
        let x = relative.clamp(0.0, 1.0);
        match *self {
            Rescaling::SquareRoot => 100.0 * x.sqrt(),
            Rescaling::Linear => 100.0 * x,
            Rescaling::Logistic {
                midpoint,
                steepness,
            } => {
                let sigmoid = |v: f64| 1.0 / (1.0 + (-steepness * (v - midpoint)).exp());
                let low = sigmoid(0.0);
                let high = sigmoid(1.0);
                100.0 * (sigmoid(x) - low) / (high - low)
            }
        }
    }
}

/// 基础分的计算方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum BaseScore {
    /// rescaling(加权和 / 最大权重)
    #[default]
    Relative,
    /// 100 * Σ sqrt(强度) * 权重，不经过 rescaling 曲线
    RootWeighted,
}

/// 主导加成：占比超过阈值的十神额外贡献 `占比 * 权重 * factor`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DominanceBonus {
    pub enabled: bool,
    pub threshold: f64,
    pub factor: f64,
}

impl Default for DominanceBonus {
    fn default() -> Self {
        Self {
            enabled: false,
            threshold: 0.3,
            factor: 60.0,
        }
    }
}

/// 评分配置
///
/// 最终分数 = clamp((基础分 + 主导加成 + 格局加成) * multiplier, min_score, 100)。
/// 默认只保留基础分，加成项全部关闭。
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    pub rescaling: Rescaling,
    pub base: BaseScore,
    pub dominance_bonus: DominanceBonus,
    /// 按格局类型与置信度给能力加分
    pub pattern_bonus: bool,
    pub multiplier: f64,
    pub min_score: f64,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            rescaling: Rescaling::SquareRoot,
            base: BaseScore::Relative,
            dominance_bonus: DominanceBonus::default(),
            pattern_bonus: false,
            multiplier: 1.0,
            min_score: 0.0,
        }
    }
}

impl ScoringConfig {
    /// 开方加权基础分、主导与格局加成、2.2 倍放大、15 分下限
    ///
    /// 分数区分度更高，但均匀分布下各项容易同时封顶。
    pub fn bonus_weighted() -> Self {
        Self {
            rescaling: Rescaling::SquareRoot,
            base: BaseScore::RootWeighted,
            dominance_bonus: DominanceBonus {
                enabled: true,
                ..DominanceBonus::default()
            },
            pattern_bonus: true,
            multiplier: 2.2,
            min_score: 15.0,
        }
    }
}

/// 十神后处理（默认关闭）
///
/// 在归一化后的分布上依次执行食伤吸收、弱根衰减、杀化，然后重新归一化。
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TenGodProcessing {
    pub enabled: bool,
    /// 食伤吸收率 = clamp(food_hurt_absorption * 食伤占比^marginal_alpha, 0, 1)
    pub food_hurt_absorption: f64,
    pub marginal_alpha: f64,
    /// 占比低于此值的十神视为弱根
    pub weak_root_ratio: f64,
    pub weak_root_factor: f64,
    /// 七杀占比超过此值时触发杀化
    pub kill_dominance_threshold: f64,
    /// 杀化时转为正官的七杀比例
    pub kill_conversion_rate: f64,
}

impl Default for TenGodProcessing {
    fn default() -> Self {
        Self {
            enabled: false,
            food_hurt_absorption: 0.9,
            marginal_alpha: 0.9,
            weak_root_ratio: 0.04,
            weak_root_factor: 0.6,
            kill_dominance_threshold: 0.5,
            kill_conversion_rate: 0.3,
        }
    }
}

/// 主导占比的计算基准
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum RatioBasis {
    /// top / 总和
    #[default]
    Total,
    /// top / (其余之和 + 1e-3)
    Others,
}

/// 格局判定配置
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PatternConfig {
    pub ratio_basis: RatioBasis,
    /// 从格判定：最强 / 次强 须超过此值
    pub follower_ratio: f64,
    /// 从格判定：最强占比须超过此值
    pub follower_min_share: f64,
    /// 分析标签中的从格倾向阈值
    pub follower_tag_ratio: f64,
}

impl Default for PatternConfig {
    fn default() -> Self {
        Self {
            ratio_basis: RatioBasis::Total,
            follower_ratio: 3.0,
            follower_min_share: 0.5,
            follower_tag_ratio: 1.8,
        }
    }
}

/// 算法配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AlgorithmConfig {
    pub position_weights: PositionWeights,
    pub layer_coefficients: LayerCoefficients,
    pub amplification: AmplificationConfig,
    /// 虚透天干衰减系数
    pub phantom_attenuation: f64,
    pub ten_god_processing: TenGodProcessing,
    pub scoring: ScoringConfig,
    pub pattern: PatternConfig,
}

impl Default for AlgorithmConfig {
    fn default() -> Self {
        Self {
            position_weights: PositionWeights::default(),
            layer_coefficients: LayerCoefficients::default(),
            amplification: AmplificationConfig::default(),
            phantom_attenuation: 0.6,
            ten_god_processing: TenGodProcessing::default(),
            scoring: ScoringConfig::default(),
            pattern: PatternConfig::default(),
        }
    }
}

impl AlgorithmConfig {
    pub fn validate(&self) -> Result<(), ConfigValidationError> {
        let weights = [
            ("position_weights.year", self.position_weights.year),
            ("position_weights.month", self.position_weights.month),
            ("position_weights.day", self.position_weights.day),
            ("position_weights.hour", self.position_weights.hour),
            ("layer_coefficients.stem", self.layer_coefficients.stem),
            ("layer_coefficients.hidden", self.layer_coefficients.hidden),
            ("amplification.k", self.amplification.k),
        ];
        for (name, value) in weights {
            if !value.is_finite() || value < 0.0 {
                return Err(ConfigValidationError::InvalidWeight {
                    name: name.to_string(),
                    value,
                });
            }
        }

        if !(0.0..=1.0).contains(&self.amplification.threshold) {
            return Err(ConfigValidationError::OutOfUnitRange {
                name: "amplification.threshold".to_string(),
                value: self.amplification.threshold,
            });
        }
        if !self.amplification.gamma.is_finite() || self.amplification.gamma <= 0.0 {
            return Err(ConfigValidationError::InvalidWeight {
                name: "amplification.gamma".to_string(),
                value: self.amplification.gamma,
            });
        }

        if !(0.0..=1.0).contains(&self.phantom_attenuation) {
            return Err(ConfigValidationError::OutOfUnitRange {
                name: "phantom_attenuation".to_string(),
                value: self.phantom_attenuation,
            });
        }

        let processing = &self.ten_god_processing;
        let unit_params = [
            ("ten_god_processing.food_hurt_absorption", processing.food_hurt_absorption),
            ("ten_god_processing.weak_root_ratio", processing.weak_root_ratio),
            ("ten_god_processing.weak_root_factor", processing.weak_root_factor),
            ("ten_god_processing.kill_dominance_threshold", processing.kill_dominance_threshold),
            ("ten_god_processing.kill_conversion_rate", processing.kill_conversion_rate),
            ("scoring.dominance_bonus.threshold", self.scoring.dominance_bonus.threshold),
        ];
        for (name, value) in unit_params {
            if !(0.0..=1.0).contains(&value) {
                return Err(ConfigValidationError::OutOfUnitRange {
                    name: name.to_string(),
                    value,
                });
            }
        }

        let scoring = &self.scoring;
        let positive = [
            ("ten_god_processing.marginal_alpha", processing.marginal_alpha),
            ("scoring.multiplier", scoring.multiplier),
        ];
        for (name, value) in positive {
            if !value.is_finite() || value <= 0.0 {
                return Err(ConfigValidationError::InvalidWeight {
                    name: name.to_string(),
                    value,
                });
            }
        }
        if !scoring.dominance_bonus.factor.is_finite() || scoring.dominance_bonus.factor < 0.0 {
            return Err(ConfigValidationError::InvalidWeight {
                name: "scoring.dominance_bonus.factor".to_string(),
                value: scoring.dominance_bonus.factor,
            });
        }
        if !(0.0..=100.0).contains(&scoring.min_score) {
            return Err(ConfigValidationError::InvalidMinScore(scoring.min_score));
        }

        if let Rescaling::Logistic {
            midpoint,
            steepness,
        } = self.scoring.rescaling
        {
            if !(0.0..=1.0).contains(&midpoint) || !steepness.is_finite() || steepness <= 0.0 {
                return Err(ConfigValidationError::InvalidRescaling);
            }
        }

        let pattern = &self.pattern;
        if !pattern.follower_ratio.is_finite()
            || pattern.follower_ratio < 1.0
            || !pattern.follower_tag_ratio.is_finite()
            || pattern.follower_tag_ratio < 1.0
        {
            return Err(ConfigValidationError::InvalidWeight {
                name: "pattern.follower_ratio".to_string(),
                value: pattern.follower_ratio.min(pattern.follower_tag_ratio),
            });
        }
        if !(0.0..=1.0).contains(&pattern.follower_min_share) {
            return Err(ConfigValidationError::OutOfUnitRange {
                name: "pattern.follower_min_share".to_string(),
                value: pattern.follower_min_share,
            });
        }

        Ok(())
    }
}
