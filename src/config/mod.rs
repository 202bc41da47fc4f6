//! 配置管理模块
//!
//! 提供算法参数与应用配置的加载和校验，支持 TOML/YAML 配置文件和环境变量覆盖。

pub mod algorithm;
pub mod config;
pub mod loader;

pub use algorithm::*;
pub use config::{AppConfig, CacheConfig, LoggingConfig};
pub use loader::{ConfigLoader, ConfigValidationError};
