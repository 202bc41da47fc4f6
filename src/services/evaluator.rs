//! 异步评估服务

use async_trait::async_trait;
use std::sync::Arc;
use tracing::error;

use crate::error::{EngineError, Result};
use crate::models::{AlgorithmOutput, ChartInput};
use crate::services::engine::CapabilityEngine;
use crate::services::performance::PerformanceStats;

#[async_trait]
pub trait CapabilityEvaluator: Send + Sync {
    async fn evaluate(&self, input: ChartInput) -> Result<AlgorithmOutput>;
    async fn evaluate_batch(&self, inputs: Vec<ChartInput>) -> Result<Vec<Result<AlgorithmOutput>>>;
    fn stats(&self) -> PerformanceStats;
}

/// Runs engine work on the blocking pool so async callers never stall
pub struct BlockingEvaluator {
    engine: Arc<CapabilityEngine>,
}

impl BlockingEvaluator {
    pub fn new(engine: Arc<CapabilityEngine>) -> Self {
        Self { engine }
    }

    async fn run<T, F>(&self, work: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&CapabilityEngine) -> T + Send + 'static,
    {
        let engine = Arc::clone(&self.engine);
        tokio::task::spawn_blocking(move || work(&engine))
            .await
            .map_err(|e| {
                error!(error = %e, "evaluation task failed");
                EngineError::Internal(format!("evaluation task failed: {}", e))
            })
    }
}

#[async_trait]
impl CapabilityEvaluator for BlockingEvaluator {
    async fn evaluate(&self, input: ChartInput) -> Result<AlgorithmOutput> {
        self.run(move |engine| engine.evaluate_complete(&input)).await?
    }

    async fn evaluate_batch(&self, inputs: Vec<ChartInput>) -> Result<Vec<Result<AlgorithmOutput>>> {
        self.run(move |engine| engine.evaluate_batch(&inputs)).await
    }

    fn stats(&self) -> PerformanceStats {
        self.engine.performance_summary()
    }
}

/// 创建异步评估服务
pub fn create_evaluator(engine: Arc<CapabilityEngine>) -> Box<dyn CapabilityEvaluator> {
    Box::new(BlockingEvaluator::new(engine))
}
