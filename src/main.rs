use anyhow::Context;
use aptitude::config::ConfigLoader;
use aptitude::models::ChartInput;
use aptitude::observability::init_tracing;
use aptitude::services::{create_engine, create_evaluator};
use serde_json::Value;
use std::io::Read;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = match std::env::args().nth(1) {
        Some(path) => ConfigLoader::load_from(&path)
            .with_context(|| format!("failed to load config from {}", path))?,
        None => ConfigLoader::load().context("failed to load config")?,
    };
    ConfigLoader::validate(&config)?;

    let _guard = init_tracing(&config.logging)?;
    info!(
        app = %config.app_name,
        environment = %config.environment,
        "Starting aptitude..."
    );

    let engine = create_engine(&config)?;
    let evaluator = create_evaluator(engine.clone());

    let mut raw = String::new();
    std::io::stdin()
        .read_to_string(&mut raw)
        .context("failed to read chart input from stdin")?;
    let request: Value = serde_json::from_str(&raw).context("stdin is not valid JSON")?;

    let response = match request {
        Value::Array(items) => {
            let inputs = items
                .into_iter()
                .map(serde_json::from_value::<ChartInput>)
                .collect::<Result<Vec<_>, _>>()
                .context("invalid chart input in batch")?;
            let results = evaluator.evaluate_batch(inputs).await?;
            let rendered = results
                .into_iter()
                .map(|result| match result {
                    Ok(output) => serde_json::to_value(output),
                    Err(e) => {
                        warn!(code = e.code(), error = %e, "chart rejected");
                        serde_json::to_value(aptitude::error::ErrorResponse::from(&e))
                    }
                })
                .collect::<Result<Vec<_>, _>>()?;
            Value::Array(rendered)
        }
        single => {
            let input: ChartInput =
                serde_json::from_value(single).context("invalid chart input")?;
            let output = evaluator.evaluate(input).await?;
            serde_json::to_value(output)?
        }
    };

    println!("{}", serde_json::to_string_pretty(&response)?);

    let stats = engine.performance_summary();
    info!(
        hits = stats.cache_hits,
        misses = stats.cache_misses,
        avg_latency_ms = stats.avg_latency_ms,
        "aptitude finished"
    );
    Ok(())
}
