//! 能力维度与评分模型

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// 能力维度
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    /// 执行力
    #[serde(alias = "执行力")]
    Execution,
    /// 创新力
    #[serde(alias = "创新力")]
    Innovation,
    /// 管理力
    #[serde(alias = "管理力")]
    Management,
    /// 销售力
    #[serde(alias = "销售力")]
    Sales,
    /// 协调力
    #[serde(alias = "协调力")]
    Coordination,
    /// 稳定性
    #[serde(alias = "稳定性")]
    Stability,
}

impl Capability {
    pub const ALL: [Capability; 6] = [
        Capability::Execution,
        Capability::Innovation,
        Capability::Management,
        Capability::Sales,
        Capability::Coordination,
        Capability::Stability,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn hanzi(self) -> &'static str {
        match self {
            Capability::Execution => "执行力",
            Capability::Innovation => "创新力",
            Capability::Management => "管理力",
            Capability::Sales => "销售力",
            Capability::Coordination => "协调力",
            Capability::Stability => "稳定性",
        }
    }
}

impl std::fmt::Display for Capability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.hanzi())
    }
}

/// 六维能力分数，每项位于 [0, 100]
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "BTreeMap<Capability, f64>", into = "BTreeMap<Capability, f64>")]
pub struct CapabilityScores {
    values: [f64; 6],
}

impl CapabilityScores {
    pub fn from_values(values: [f64; 6]) -> Self {
        Self { values }
    }

    pub fn get(&self, capability: Capability) -> f64 {
        self.values[capability.index()]
    }

    pub fn iter(&self) -> impl Iterator<Item = (Capability, f64)> + '_ {
        Capability::ALL
            .iter()
            .map(move |c| (*c, self.values[c.index()]))
    }

    pub fn max(&self) -> f64 {
        self.values.iter().copied().fold(f64::MIN, f64::max)
    }

    pub fn min(&self) -> f64 {
        self.values.iter().copied().fold(f64::MAX, f64::min)
    }

    /// 得分最高的能力（平局取声明顺序靠前者）
    pub fn strongest(&self) -> Capability {
        let mut best = Capability::Execution;
        for capability in Capability::ALL {
            if self.get(capability) > self.get(best) {
                best = capability;
            }
        }
        best
    }
}

impl TryFrom<BTreeMap<Capability, f64>> for CapabilityScores {
    type Error = String;

    fn try_from(map: BTreeMap<Capability, f64>) -> Result<Self, Self::Error> {
        if map.len() != Capability::ALL.len() {
            return Err(format!("expected 6 capabilities, got {}", map.len()));
        }
        let mut values = [0.0; 6];
        for (capability, value) in map {
            values[capability.index()] = value;
        }
        Ok(Self { values })
    }
}

impl From<CapabilityScores> for BTreeMap<Capability, f64> {
    fn from(scores: CapabilityScores) -> Self {
        scores.iter().collect()
    }
}
