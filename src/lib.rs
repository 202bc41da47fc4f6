//! Aptitude - 命盘能力评估引擎
//!
//! 根据四柱八字计算十神强度分布，映射为六项职业能力评分，
//! 并给出主导十神与格局判定。相同输入与配置总是得到相同结果。

pub mod config;
pub mod error;
pub mod models;
pub mod observability;
pub mod services;
pub mod tables;
pub mod validation;

pub use config::{AlgorithmConfig, AppConfig, CacheConfig, ConfigLoader};
pub use error::{EngineError, Result};
pub use services::{CapabilityEngine, CapabilityEvaluator, create_engine, create_evaluator};
