//! 可观测性模块
//!
//! 提供 Prometheus 指标和结构化日志。

use prometheus::{Encoder, Histogram, HistogramOpts, IntCounter, IntGauge, Registry, TextEncoder};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::writer::BoxMakeWriter;

use crate::config::LoggingConfig;
use crate::error::{EngineError, Result};

// ===== Engine Metrics =====

/// 引擎指标
///
/// 每个引擎实例持有独立的 Registry，多个引擎可共存于同一进程。
#[derive(Clone)]
pub struct EngineMetrics {
    registry: Registry,
    pub cache_hits: IntCounter,
    pub cache_misses: IntCounter,
    pub cache_evictions: IntCounter,
    pub cache_entries: IntGauge,
    pub evaluation_errors: IntCounter,
    pub evaluation_duration: Histogram,
}

impl EngineMetrics {
    pub fn new() -> Result<Self> {
        let registry = Registry::new();

        let cache_hits = IntCounter::new("aptitude_cache_hits_total", "Evaluations served from cache")?;
        let cache_misses =
            IntCounter::new("aptitude_cache_misses_total", "Evaluations computed on demand")?;
        let cache_evictions =
            IntCounter::new("aptitude_cache_evictions_total", "Cache entries evicted")?;
        let cache_entries = IntGauge::new("aptitude_cache_entries", "Entries currently cached")?;
        let evaluation_errors =
            IntCounter::new("aptitude_evaluation_errors_total", "Failed computations")?;
        let evaluation_duration = Histogram::with_opts(
            HistogramOpts::new(
                "aptitude_evaluation_duration_seconds",
                "Latency of uncached computations",
            )
            .buckets(vec![
                0.00005, 0.0001, 0.00025, 0.0005, 0.001, 0.0025, 0.005, 0.01, 0.05,
            ]),
        )?;

        registry.register(Box::new(cache_hits.clone()))?;
        registry.register(Box::new(cache_misses.clone()))?;
        registry.register(Box::new(cache_evictions.clone()))?;
        registry.register(Box::new(cache_entries.clone()))?;
        registry.register(Box::new(evaluation_errors.clone()))?;
        registry.register(Box::new(evaluation_duration.clone()))?;

        Ok(Self {
            registry,
            cache_hits,
            cache_misses,
            cache_evictions,
            cache_entries,
            evaluation_errors,
            evaluation_duration,
        })
    }

    /// 记录缓存命中
    pub fn record_hit(&self) {
        self.cache_hits.inc();
    }

    /// 记录一次实际计算
    pub fn record_miss(&self, duration_secs: f64) {
        self.cache_misses.inc();
        self.evaluation_duration.observe(duration_secs);
    }

    pub fn record_evictions(&self, count: u64) {
        self.cache_evictions.inc_by(count);
    }

    pub fn record_error(&self) {
        self.evaluation_errors.inc();
    }

    pub fn set_entries(&self, entries: usize) {
        self.cache_entries.set(entries as i64);
    }

    /// 生成 Prometheus 文本格式指标
    pub fn gather(&self) -> Result<String> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| EngineError::Internal(e.to_string()))
    }
}

// ===== Structured Logging =====

/// 初始化结构化日志
///
/// `RUST_LOG` 优先于配置中的级别。配置了日志目录时按天滚动写入文件，
/// 返回的 guard 需在进程退出前保持存活。
pub fn init_tracing(config: &LoggingConfig) -> Result<Option<WorkerGuard>> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.level))
        .map_err(|e| EngineError::Config(e.to_string()))?;

    let (writer, guard) = match &config.log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, &config.file_prefix);
            let (non_blocking, guard) = tracing_appender::non_blocking(appender);
            (BoxMakeWriter::new(non_blocking), Some(guard))
        }
        None => (BoxMakeWriter::new(std::io::stderr), None),
    };

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(writer)
        .with_target(true)
        .with_line_number(true);

    let installed = if config.structured {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
    installed.map_err(|e| EngineError::Config(e.to_string()))?;

    Ok(guard)
}
