//! 错误处理模块
//!
//! 定义能力评估引擎的错误类型和错误处理逻辑。

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::validation::ValidationIssue;

/// 引擎错误类型
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EngineError {
    /// 输入或分布校验失败，计算前抛出
    #[error("参数验证失败: {}", join_issues(.errors))]
    Validation { errors: Vec<ValidationIssue> },

    /// 计算过程中内部不变量被破坏（查表缺失、非有限数值）
    #[error("计算错误: {0}")]
    Calculation(String),

    /// 配置错误
    #[error("配置错误: {0}")]
    Config(String),

    /// 序列化错误
    #[error("序列化错误: {0}")]
    Serialization(String),

    /// 内部错误
    #[error("内部错误: {0}")]
    Internal(String),
}

impl EngineError {
    /// 由单个校验问题构造校验错误
    pub fn validation(issue: ValidationIssue) -> Self {
        EngineError::Validation {
            errors: vec![issue],
        }
    }

    /// 错误代码
    pub fn code(&self) -> &'static str {
        match self {
            EngineError::Validation { .. } => "VALIDATION_ERROR",
            EngineError::Calculation(_) => "CALCULATION_ERROR",
            EngineError::Config(_) => "CONFIG_ERROR",
            EngineError::Serialization(_) => "SERIALIZATION_ERROR",
            EngineError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// 是否为调用方可修正的输入问题
    pub fn is_validation(&self) -> bool {
        matches!(self, EngineError::Validation { .. })
    }
}

fn join_issues(errors: &[ValidationIssue]) -> String {
    errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

impl From<serde_json::Error> for EngineError {
    fn from(e: serde_json::Error) -> Self {
        EngineError::Serialization(e.to_string())
    }
}

impl From<figment::Error> for EngineError {
    fn from(e: figment::Error) -> Self {
        EngineError::Config(e.to_string())
    }
}

impl From<prometheus::Error> for EngineError {
    fn from(e: prometheus::Error) -> Self {
        EngineError::Internal(e.to_string())
    }
}

/// 错误响应
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// 错误代码
    pub code: String,
    /// 错误消息
    pub message: String,
    /// 详细信息
    pub details: Vec<String>,
}

impl From<&EngineError> for ErrorResponse {
    fn from(err: &EngineError) -> Self {
        let details = match err {
            EngineError::Validation { errors } => errors.iter().map(|e| e.to_string()).collect(),
            _ => Vec::new(),
        };
        Self {
            code: err.code().to_string(),
            message: err.to_string(),
            details,
        }
    }
}

/// 结果类型别名
pub type Result<T> = std::result::Result<T, EngineError>;
