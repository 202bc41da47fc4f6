//! 核心数据模型模块
//!
//! 定义命盘输入、十神分布、能力分数与评估结果。

pub mod capability;
pub mod chart;
pub mod output;
pub mod symbols;
pub mod ten_god;

pub use capability::*;
pub use chart::*;
pub use output::*;
pub use symbols::*;
pub use ten_god::*;
