//! 常量表
//!
//! 十神关系表、地支藏干表、月令季节系数矩阵与能力权重矩阵。
//! 表数据在进程内首次使用时统一校验一次。

use once_cell::sync::OnceCell;

use crate::error::{EngineError, Result};
use crate::models::{Branch, Capability, Element, Stem, TenGod};

use crate::models::TenGod::{
    DirectOfficer as DO, DirectResource as DR, DirectWealth as DW, EatingGod as EG,
    Friend as FR, HurtingOfficer as HO, IndirectResource as IR, IndirectWealth as IW,
    RobWealth as RW, SevenKillings as SK,
};

/// 十神关系表，行为日主，列为他干，均按 甲..癸 排列
pub const RELATION_TABLE: [[TenGod; 10]; 10] = [
    [FR, RW, EG, HO, IW, DW, SK, DO, IR, DR],
    [RW, FR, HO, EG, DW, IW, DO, SK, DR, IR],
    [IR, DR, FR, RW, EG, HO, IW, DW, SK, DO],
    [DR, IR, RW, FR, HO, EG, DW, IW, DO, SK],
    [SK, DO, IR, DR, FR, RW, EG, HO, IW, DW],
    [DO, SK, DR, IR, RW, FR, HO, EG, DW, IW],
    [IW, DW, SK, DO, IR, DR, FR, RW, EG, HO],
    [DW, IW, DO, SK, DR, IR, RW, FR, HO, EG],
    [EG, HO, IW, DW, SK, DO, IR, DR, FR, RW],
    [HO, EG, DW, IW, DO, SK, DR, IR, RW, FR],
];

/// 地支藏干及分量，本气在前
pub const HIDDEN_STEMS: [&[(Stem, f64)]; 12] = [
    &[(Stem::Gui, 1.0)],
    &[(Stem::Ji, 0.6), (Stem::Gui, 0.3), (Stem::Xin, 0.1)],
    &[(Stem::Jia, 0.6), (Stem::Bing, 0.3), (Stem::Wu, 0.1)],
    &[(Stem::Yi, 1.0)],
    &[(Stem::Wu, 0.6), (Stem::Yi, 0.3), (Stem::Gui, 0.1)],
    &[(Stem::Bing, 0.6), (Stem::Geng, 0.3), (Stem::Wu, 0.1)],
    &[(Stem::Ding, 0.7), (Stem::Ji, 0.3)],
    &[(Stem::Ji, 0.6), (Stem::Ding, 0.3), (Stem::Yi, 0.1)],
    &[(Stem::Geng, 0.6), (Stem::Ren, 0.3), (Stem::Wu, 0.1)],
    &[(Stem::Xin, 1.0)],
    &[(Stem::Wu, 0.6), (Stem::Xin, 0.3), (Stem::Ding, 0.1)],
    &[(Stem::Ren, 0.7), (Stem::Jia, 0.3)],
];

/// 月令季节系数，行为月支（子..亥），列为 木 火 土 金 水
pub const SEASONAL_MATRIX: [[f64; 5]; 12] = [
    [0.68, 0.42, 0.58, 0.92, 1.42],
    [0.52, 0.38, 1.28, 1.12, 0.88],
    [1.38, 0.78, 0.48, 0.52, 0.72],
    [1.58, 0.88, 0.42, 0.38, 0.62],
    [0.92, 0.72, 1.18, 0.68, 0.58],
    [0.48, 1.48, 0.82, 0.78, 0.32],
    [0.38, 1.68, 0.88, 0.62, 0.28],
    [0.58, 0.98, 1.28, 0.72, 0.42],
    [0.42, 0.58, 0.78, 1.42, 0.68],
    [0.32, 0.48, 0.68, 1.62, 0.78],
    [0.68, 0.82, 1.18, 0.92, 0.48],
    [0.88, 0.52, 0.62, 0.78, 1.28],
];

/// 能力权重，行为能力（执行、创新、管理、销售、协调、稳定），列按十神规范顺序
pub const CAPABILITY_WEIGHTS: [[f64; 10]; 6] = [
    [0.20, 0.10, 0.05, 0.03, 0.02, 0.01, 0.35, 0.30, 0.15, 0.08],
    [0.01, 0.15, 0.35, 0.40, 0.03, 0.05, 0.02, 0.08, 0.10, 0.20],
    [0.12, 0.05, 0.08, 0.03, 0.02, 0.01, 0.45, 0.35, 0.25, 0.15],
    [0.10, 0.15, 0.30, 0.35, 0.25, 0.20, 0.05, 0.08, 0.03, 0.02],
    [0.15, 0.05, 0.25, 0.03, 0.12, 0.08, 0.20, 0.02, 0.40, 0.30],
    [0.40, 0.03, 0.08, 0.01, 0.12, 0.05, 0.25, 0.02, 0.35, 0.15],
];

const WEIGHT_TOLERANCE: f64 = 1e-9;

static VERIFIED: OnceCell<std::result::Result<(), String>> = OnceCell::new();

/// 校验全部常量表，结果在进程内缓存
pub fn verify_tables() -> Result<()> {
    VERIFIED
        .get_or_init(check_tables)
        .clone()
        .map_err(EngineError::Calculation)
}

fn check_tables() -> std::result::Result<(), String> {
    for day_master in Stem::ALL {
        for other in Stem::ALL {
            let listed = RELATION_TABLE[day_master.index()][other.index()];
            let derived = TenGod::derive(day_master, other);
            if listed != derived {
                return Err(format!(
                    "relation table entry ({}, {}) is {}, expected {}",
                    day_master, other, listed, derived
                ));
            }
        }
    }

    for branch in Branch::ALL {
        let hidden = HIDDEN_STEMS[branch.index()];
        if hidden.is_empty() || hidden.len() > 3 {
            return Err(format!("branch {} has {} hidden stems", branch, hidden.len()));
        }
        let total: f64 = hidden.iter().map(|(_, w)| w).sum();
        if (total - 1.0).abs() > WEIGHT_TOLERANCE {
            return Err(format!("hidden stem weights of {} sum to {}", branch, total));
        }
        if hidden.windows(2).any(|pair| pair[0].1 < pair[1].1) {
            return Err(format!("hidden stem weights of {} are not descending", branch));
        }
    }

    for (row, factors) in SEASONAL_MATRIX.iter().enumerate() {
        if factors.iter().any(|f| !f.is_finite() || *f <= 0.0) {
            return Err(format!("seasonal row {} holds a non-positive factor", row));
        }
    }

    for capability in Capability::ALL {
        let weights = &CAPABILITY_WEIGHTS[capability.index()];
        if weights.iter().any(|w| !w.is_finite() || *w < 0.0) {
            return Err(format!("capability {} has an invalid weight", capability));
        }
        if max_weight(capability) <= 0.0 {
            return Err(format!("capability {} has no positive weight", capability));
        }
    }

    Ok(())
}

/// 他干相对日主的十神
pub fn relation(day_master: Stem, other: Stem) -> TenGod {
    RELATION_TABLE[day_master.index()][other.index()]
}

pub fn hidden_stems(branch: Branch) -> &'static [(Stem, f64)] {
    HIDDEN_STEMS[branch.index()]
}

pub fn seasonal_factor(month_branch: Branch, element: Element) -> f64 {
    SEASONAL_MATRIX[month_branch.index()][element.index()]
}

pub fn capability_weight(capability: Capability, god: TenGod) -> f64 {
    CAPABILITY_WEIGHTS[capability.index()][god.index()]
}

pub fn max_weight(capability: Capability) -> f64 {
    CAPABILITY_WEIGHTS[capability.index()]
        .iter()
        .copied()
        .fold(0.0, f64::max)
}
