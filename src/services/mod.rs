//! 服务模块

pub mod engine;
pub mod evaluator;
pub mod pattern;
pub mod performance;
pub mod scorer;
pub mod strength;

use std::sync::Arc;

use crate::config::AppConfig;
use crate::error::Result;

pub use engine::CapabilityEngine;
pub use evaluator::{BlockingEvaluator, CapabilityEvaluator, create_evaluator};
pub use pattern::{detect_pattern, recommendations};
pub use performance::{BenchmarkReport, PerformanceManager, PerformanceStats, cache_key};
pub use scorer::calculate_scores;
pub use strength::calculate_strength;

/// 创建评估引擎
pub fn create_engine(config: &AppConfig) -> Result<Arc<CapabilityEngine>> {
    Ok(Arc::new(CapabilityEngine::from_app_config(config)?))
}
