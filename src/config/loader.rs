use crate::config::algorithm::AlgorithmConfig;
use crate::config::config::AppConfig;
use crate::error::EngineError;
use figment::{
    Figment,
    providers::{Env, Format, Toml, Yaml},
};
use std::path::{Path, PathBuf};

const ENV_PREFIX: &str = "APTITUDE_";

/// 配置加载器
pub struct ConfigLoader;

impl ConfigLoader {
    /// 从默认路径加载配置
    ///
    /// 合并顺序（后者覆盖前者）：
    /// 1. ./aptitude.toml
    /// 2. ./aptitude.yaml
    /// 3. 环境变量 `APTITUDE_*`，嵌套字段以 `__` 分隔
    pub fn load() -> Result<AppConfig, figment::Error> {
        Figment::new()
            .merge(Toml::file(default_config_path()))
            .merge(Yaml::file("aptitude.yaml"))
            .merge(Env::prefixed(ENV_PREFIX).split("__").global())
            .extract()
    }

    /// 从指定路径加载配置，按扩展名选择 YAML 或 TOML
    pub fn load_from(path: impl AsRef<Path>) -> Result<AppConfig, figment::Error> {
        Self::file_figment(path.as_ref())
            .merge(Env::prefixed(ENV_PREFIX).split("__").global())
            .extract()
    }

    /// 只加载算法参数（配置文件中的 `algorithm` 段）
    pub fn load_algorithm_config(path: impl AsRef<Path>) -> Result<AlgorithmConfig, figment::Error> {
        Self::file_figment(path.as_ref())
            .merge(Env::prefixed(ENV_PREFIX).split("__").global())
            .focus("algorithm")
            .extract()
    }

    fn file_figment(path: &Path) -> Figment {
        match path.extension().and_then(|e| e.to_str()) {
            Some("yaml") | Some("yml") => Figment::new().merge(Yaml::file(path)),
            _ => Figment::new().merge(Toml::file(path)),
        }
    }

    /// 验证配置
    pub fn validate(config: &AppConfig) -> Result<(), ConfigValidationError> {
        config.algorithm.validate()?;

        if config.cache.max_entries == 0 {
            return Err(ConfigValidationError::InvalidCacheCapacity);
        }

        if config.cache.latency_window == 0 {
            return Err(ConfigValidationError::InvalidLatencyWindow);
        }

        if config.logging.level.trim().is_empty() {
            return Err(ConfigValidationError::MissingLogLevel);
        }

        Ok(())
    }
}

/// 配置验证错误
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum ConfigValidationError {
    #[error("权重 {name} 无效，必须为非负有限数: {value}")]
    InvalidWeight { name: String, value: f64 },

    #[error("参数 {name} 必须位于 [0, 1]: {value}")]
    OutOfUnitRange { name: String, value: f64 },

    #[error("最低分必须位于 [0, 100]: {0}")]
    InvalidMinScore(f64),

    #[error("logistic 曲线参数无效，midpoint 须在 [0, 1] 且 steepness 须为正")]
    InvalidRescaling,

    #[error("缓存容量无效，必须大于 0")]
    InvalidCacheCapacity,

    #[error("延迟统计窗口无效，必须大于 0")]
    InvalidLatencyWindow,

    #[error("日志级别未配置")]
    MissingLogLevel,
}

impl From<ConfigValidationError> for EngineError {
    fn from(e: ConfigValidationError) -> Self {
        EngineError::Config(e.to_string())
    }
}

/// 获取默认配置文件路径
pub fn default_config_path() -> PathBuf {
    PathBuf::from("aptitude.toml")
}
