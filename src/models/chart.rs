//! 命盘模型
//!
//! `ChartInput` 是上游历法模块交付的原始形式，字段均为字符串或可缺省；
//! `Chart` 是校验通过后的强类型形式，只能由 `validation::resolve_chart` 产生。

use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::models::symbols::{Branch, Gender, Stem};

/// 柱位
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PillarPosition {
    Year,
    Month,
    Day,
    Hour,
}

impl PillarPosition {
    pub const ALL: [PillarPosition; 4] = [
        PillarPosition::Year,
        PillarPosition::Month,
        PillarPosition::Day,
        PillarPosition::Hour,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            PillarPosition::Year => "year",
            PillarPosition::Month => "month",
            PillarPosition::Day => "day",
            PillarPosition::Hour => "hour",
        }
    }
}

impl std::fmt::Display for PillarPosition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 单柱原始输入
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PillarInput {
    /// 天干（汉字或拼音）
    #[serde(default)]
    pub stem: String,
    /// 地支（汉字或拼音）
    #[serde(default)]
    pub branch: String,
}

impl PillarInput {
    pub fn new(stem: impl Into<String>, branch: impl Into<String>) -> Self {
        Self {
            stem: stem.into(),
            branch: branch.into(),
        }
    }
}

/// 四柱原始输入
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PillarsInput {
    #[serde(default)]
    pub year: Option<PillarInput>,
    #[serde(default)]
    pub month: Option<PillarInput>,
    #[serde(default)]
    pub day: Option<PillarInput>,
    #[serde(default)]
    pub hour: Option<PillarInput>,
}

impl PillarsInput {
    pub fn get(&self, position: PillarPosition) -> Option<&PillarInput> {
        match position {
            PillarPosition::Year => self.year.as_ref(),
            PillarPosition::Month => self.month.as_ref(),
            PillarPosition::Day => self.day.as_ref(),
            PillarPosition::Hour => self.hour.as_ref(),
        }
    }
}

/// 公历出生时间
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Validate)]
pub struct SolarDate {
    #[validate(range(min = 1900, max = 2100))]
    pub year: i32,
    #[validate(range(min = 1, max = 12))]
    pub month: u32,
    #[validate(range(min = 1, max = 31))]
    pub day: u32,
    #[validate(range(min = 0, max = 23))]
    pub hour: u32,
    #[validate(range(min = 0, max = 59))]
    #[serde(default)]
    pub minute: u32,
}

/// 农历日期
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Validate)]
pub struct LunarDate {
    #[validate(range(min = 1900, max = 2100))]
    pub year: i32,
    #[validate(range(min = 1, max = 12))]
    pub month: u32,
    #[validate(range(min = 1, max = 30))]
    pub day: u32,
    #[validate(range(min = 0, max = 23))]
    pub hour: u32,
    #[serde(default)]
    pub is_leap: bool,
}

/// 命盘原始输入
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChartInput {
    #[serde(default)]
    pub pillars: PillarsInput,
    #[serde(default)]
    pub gender: String,
    #[serde(default)]
    pub solar: Option<SolarDate>,
    #[serde(default)]
    pub lunar: Option<LunarDate>,
}

impl ChartInput {
    /// 由四柱字符串直接构造，常用于测试与基准
    pub fn from_pillars(
        pillars: [(&str, &str); 4],
        gender: &str,
        solar: SolarDate,
    ) -> Self {
        let [year, month, day, hour] = pillars;
        Self {
            pillars: PillarsInput {
                year: Some(PillarInput::new(year.0, year.1)),
                month: Some(PillarInput::new(month.0, month.1)),
                day: Some(PillarInput::new(day.0, day.1)),
                hour: Some(PillarInput::new(hour.0, hour.1)),
            },
            gender: gender.to_string(),
            solar: Some(solar),
            lunar: None,
        }
    }
}

/// 已解析的单柱
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Pillar {
    pub stem: Stem,
    pub branch: Branch,
}

/// 已校验的命盘
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Chart {
    pub year: Pillar,
    pub month: Pillar,
    pub day: Pillar,
    pub hour: Pillar,
    pub gender: Gender,
    pub solar: SolarDate,
    pub lunar: Option<LunarDate>,
}

impl Chart {
    /// 日主
    pub fn day_master(&self) -> Stem {
        self.day.stem
    }

    pub fn pillar(&self, position: PillarPosition) -> Pillar {
        match position {
            PillarPosition::Year => self.year,
            PillarPosition::Month => self.month,
            PillarPosition::Day => self.day,
            PillarPosition::Hour => self.hour,
        }
    }

    /// 按年、月、日、时顺序返回四柱
    pub fn pillars(&self) -> [(PillarPosition, Pillar); 4] {
        PillarPosition::ALL.map(|p| (p, self.pillar(p)))
    }

    /// 月令
    pub fn month_branch(&self) -> Branch {
        self.month.branch
    }
}
