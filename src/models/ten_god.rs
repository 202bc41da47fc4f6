//! 十神（关系类别）与强度分布模型

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::models::symbols::{Element, Stem};

/// 分布总和容差
pub const SUM_TOLERANCE: f64 = 1e-6;

/// 十神
///
/// 声明顺序即规范顺序，平局时按此顺序取先出现者。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TenGod {
    /// 比肩
    #[serde(alias = "比肩")]
    Friend,
    /// 劫财
    #[serde(alias = "劫财")]
    RobWealth,
    /// 食神
    #[serde(alias = "食神")]
    EatingGod,
    /// 伤官
    #[serde(alias = "伤官")]
    HurtingOfficer,
    /// 正财
    #[serde(alias = "正财")]
    DirectWealth,
    /// 偏财
    #[serde(alias = "偏财")]
    IndirectWealth,
    /// 正官
    #[serde(alias = "正官")]
    DirectOfficer,
    /// 七杀
    #[serde(alias = "七杀")]
    SevenKillings,
    /// 正印
    #[serde(alias = "正印")]
    DirectResource,
    /// 偏印
    #[serde(alias = "偏印")]
    IndirectResource,
}

impl TenGod {
    pub const ALL: [TenGod; 10] = [
        TenGod::Friend,
        TenGod::RobWealth,
        TenGod::EatingGod,
        TenGod::HurtingOfficer,
        TenGod::DirectWealth,
        TenGod::IndirectWealth,
        TenGod::DirectOfficer,
        TenGod::SevenKillings,
        TenGod::DirectResource,
        TenGod::IndirectResource,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn cluster(self) -> Cluster {
        match self {
            TenGod::Friend | TenGod::RobWealth => Cluster::Companion,
            TenGod::EatingGod | TenGod::HurtingOfficer => Cluster::Output,
            TenGod::DirectWealth | TenGod::IndirectWealth => Cluster::Wealth,
            TenGod::DirectOfficer | TenGod::SevenKillings => Cluster::Officer,
            TenGod::DirectResource | TenGod::IndirectResource => Cluster::Resource,
        }
    }

    /// 由五行生克与阴阳推导十神，用于校验常量表
    pub fn derive(day_master: Stem, other: Stem) -> TenGod {
        let same = day_master.polarity() == other.polarity();
        let me: Element = day_master.element();
        let it: Element = other.element();
        let (same_kind, diff_kind) = if it == me {
            (TenGod::Friend, TenGod::RobWealth)
        } else if me.produces() == it {
            (TenGod::EatingGod, TenGod::HurtingOfficer)
        } else if me.controls() == it {
            (TenGod::IndirectWealth, TenGod::DirectWealth)
        } else if it.controls() == me {
            (TenGod::SevenKillings, TenGod::DirectOfficer)
        } else {
            (TenGod::IndirectResource, TenGod::DirectResource)
        };
        if same { same_kind } else { diff_kind }
    }

    pub fn hanzi(self) -> &'static str {
        match self {
            TenGod::Friend => "比肩",
            TenGod::RobWealth => "劫财",
            TenGod::EatingGod => "食神",
            TenGod::HurtingOfficer => "伤官",
            TenGod::DirectWealth => "正财",
            TenGod::IndirectWealth => "偏财",
            TenGod::DirectOfficer => "正官",
            TenGod::SevenKillings => "七杀",
            TenGod::DirectResource => "正印",
            TenGod::IndirectResource => "偏印",
        }
    }
}

impl std::fmt::Display for TenGod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.hanzi())
    }
}

/// 十神聚合分组
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Cluster {
    /// 食伤
    #[serde(alias = "食伤")]
    Output,
    /// 官杀
    #[serde(alias = "官杀")]
    Officer,
    /// 比劫
    #[serde(alias = "比劫")]
    Companion,
    /// 财
    #[serde(alias = "财")]
    Wealth,
    /// 印
    #[serde(alias = "印")]
    Resource,
}

impl Cluster {
    pub const ALL: [Cluster; 5] = [
        Cluster::Output,
        Cluster::Officer,
        Cluster::Companion,
        Cluster::Wealth,
        Cluster::Resource,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn members(self) -> [TenGod; 2] {
        match self {
            Cluster::Output => [TenGod::EatingGod, TenGod::HurtingOfficer],
            Cluster::Officer => [TenGod::DirectOfficer, TenGod::SevenKillings],
            Cluster::Companion => [TenGod::Friend, TenGod::RobWealth],
            Cluster::Wealth => [TenGod::DirectWealth, TenGod::IndirectWealth],
            Cluster::Resource => [TenGod::DirectResource, TenGod::IndirectResource],
        }
    }
}

/// 十神强度分布
///
/// 序列化为恰好包含十个十神键的映射；缺键、多键或非数字值在反序列化时即被拒绝。
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "BTreeMap<TenGod, f64>", into = "BTreeMap<TenGod, f64>")]
pub struct RelationDistribution {
    values: [f64; 10],
}

impl RelationDistribution {
    /// 直接由数组构造，不做归一化
    pub fn from_values(values: [f64; 10]) -> Self {
        Self { values }
    }

    /// 均匀分布（每类 0.1）
    pub fn uniform() -> Self {
        Self {
            values: [0.1; 10],
        }
    }

    /// 单一十神占满
    pub fn concentrated(god: TenGod) -> Self {
        let mut values = [0.0; 10];
        values[god.index()] = 1.0;
        Self { values }
    }

    /// 由任意非负原始值归一化；负值与非有限值按 0 处理，全零时回退为均匀分布
    pub fn normalized(raw: [f64; 10]) -> Self {
        let mut sanitized = [0.0; 10];
        let mut total = 0.0;
        for (slot, value) in sanitized.iter_mut().zip(raw.iter()) {
            if value.is_finite() && *value > 0.0 {
                *slot = *value;
                total += *value;
            }
        }
        if total <= 0.0 {
            return Self::uniform();
        }
        for slot in sanitized.iter_mut() {
            *slot /= total;
        }
        Self { values: sanitized }
    }

    pub fn get(&self, god: TenGod) -> f64 {
        self.values[god.index()]
    }

    pub fn values(&self) -> &[f64; 10] {
        &self.values
    }

    pub fn iter(&self) -> impl Iterator<Item = (TenGod, f64)> + '_ {
        TenGod::ALL.iter().map(move |g| (*g, self.values[g.index()]))
    }

    pub fn total(&self) -> f64 {
        self.values.iter().sum()
    }

    pub fn is_normalized(&self) -> bool {
        (self.total() - 1.0).abs() <= SUM_TOLERANCE
    }

    pub fn cluster(&self, cluster: Cluster) -> f64 {
        cluster.members().iter().map(|g| self.get(*g)).sum()
    }

    /// 按强度降序排列（平局按规范顺序）
    pub fn ranked(&self) -> Vec<(TenGod, f64)> {
        let mut entries: Vec<(TenGod, f64)> = self.iter().collect();
        entries.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));
        entries
    }
}

impl TryFrom<BTreeMap<TenGod, f64>> for RelationDistribution {
    type Error = String;

    fn try_from(map: BTreeMap<TenGod, f64>) -> Result<Self, Self::Error> {
        let missing: Vec<&str> = TenGod::ALL
            .iter()
            .filter(|g| !map.contains_key(g))
            .map(|g| g.hanzi())
            .collect();
        if !missing.is_empty() {
            return Err(format!("missing ten god strengths: {}", missing.join(", ")));
        }
        let mut values = [0.0; 10];
        for (god, value) in map {
            values[god.index()] = value;
        }
        Ok(Self { values })
    }
}

impl From<RelationDistribution> for BTreeMap<TenGod, f64> {
    fn from(dist: RelationDistribution) -> Self {
        dist.iter().collect()
    }
}

/// 聚合指标
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "BTreeMap<Cluster, f64>", into = "BTreeMap<Cluster, f64>")]
pub struct ClusterScores {
    values: [f64; 5],
}

impl ClusterScores {
    /// 等权求和
    pub fn from_distribution(dist: &RelationDistribution) -> Self {
        let mut values = [0.0; 5];
        for cluster in Cluster::ALL {
            values[cluster.index()] = dist.cluster(cluster);
        }
        Self { values }
    }

    pub fn get(&self, cluster: Cluster) -> f64 {
        self.values[cluster.index()]
    }

    pub fn iter(&self) -> impl Iterator<Item = (Cluster, f64)> + '_ {
        Cluster::ALL.iter().map(move |c| (*c, self.values[c.index()]))
    }

    pub fn total(&self) -> f64 {
        self.values.iter().sum()
    }
}

impl TryFrom<BTreeMap<Cluster, f64>> for ClusterScores {
    type Error = String;

    fn try_from(map: BTreeMap<Cluster, f64>) -> Result<Self, Self::Error> {
        if map.len() != Cluster::ALL.len() {
            return Err(format!("expected 5 clusters, got {}", map.len()));
        }
        let mut values = [0.0; 5];
        for (cluster, value) in map {
            values[cluster.index()] = value;
        }
        Ok(Self { values })
    }
}

impl From<ClusterScores> for BTreeMap<Cluster, f64> {
    fn from(scores: ClusterScores) -> Self {
        scores.iter().collect()
    }
}
