//! Linguistic Automation Controller
//!
//! Reads sensor readings as JSON lines on stdin, evaluates the rule set on a
//! fixed interval and prints validated device commands as JSON lines.
//!
//! Usage: `linguistic_automation [config.yaml]`

use anyhow::{Context, Result};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, info, warn};

use linguistic_automation::utils::telemetry::{init_tracing, DEFAULT_FILTER};
use linguistic_automation::{AutomationConfig, RuleProcessingPipeline, SensorReading};

const DEFAULT_CONFIG_PATH: &str = "config/automation.yaml";

// ──────────────────────────────────────────────────────────────────────────────
// MAIN ENTRY POINT
// ──────────────────────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables
    dotenv::dotenv().ok();

    init_tracing(DEFAULT_FILTER).context("Failed to set tracing subscriber")?;

    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string());
    let mut config = AutomationConfig::from_file(&config_path)
        .with_context(|| format!("Failed to load configuration from '{}'", config_path))?;
    config.apply_env_overrides();

    let pipeline = Arc::new(config.build_pipeline().context("Failed to build pipeline")?);
    if !pipeline.has_provider() {
        warn!("No inference provider configured; every rule will resolve to NO_ACTION");
    }

    info!(
        "Controller ready: {} rule(s), tick every {:?}",
        pipeline.interpreter().rule_count(),
        config.tick_interval()
    );

    run(pipeline, config.tick_interval()).await
}

// ──────────────────────────────────────────────────────────────────────────────
// EVENT LOOP
// ──────────────────────────────────────────────────────────────────────────────

async fn run(pipeline: Arc<RuleProcessingPipeline>, tick_interval: std::time::Duration) -> Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut ticker = tokio::time::interval(tick_interval);
    let mut stdin_open = true;

    loop {
        tokio::select! {
            line = lines.next_line(), if stdin_open => {
                match line.context("Failed to read stdin")? {
                    Some(line) => ingest_line(&pipeline, &line),
                    None => {
                        info!("stdin closed; running a final tick");
                        stdin_open = false;
                        tick(&pipeline).await?;
                        break;
                    }
                }
            }
            _ = ticker.tick() => {
                tick(&pipeline).await?;
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Shutting down");
                break;
            }
        }
    }

    let stats = pipeline.stats();
    info!("Final statistics: {}", serde_json::to_string(&stats)?);
    Ok(())
}

fn ingest_line(pipeline: &RuleProcessingPipeline, line: &str) {
    let line = line.trim();
    if line.is_empty() {
        return;
    }
    match serde_json::from_str::<SensorReading>(line) {
        Ok(reading) => match pipeline.ingest_reading(&reading) {
            Ok(description) => debug!("Ingested {}", description.to_text_with_value()),
            Err(e) => warn!("Dropped reading from '{}': {}", reading.sensor_id, e),
        },
        Err(e) => warn!("Invalid reading '{}': {}", line, e),
    }
}

async fn tick(pipeline: &RuleProcessingPipeline) -> Result<()> {
    let result = pipeline.evaluate().await;
    for error in &result.errors {
        warn!("{}", error);
    }
    for command in &result.commands {
        println!("{}", serde_json::to_string(command).context("Failed to encode command")?);
    }
    Ok(())
}
