//! Autocat batch binary
//!
//! Loads the configured PCdb/VCdb artifact directories, streams a JSONL
//! input file through the matching engine, writes JSONL results, and
//! prints the statistics report.

use std::io::{BufRead, BufWriter, Write};

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use autocat::batch::BatchOptions;
use autocat::config::{AppConfig, BatchKind, LogFormat};
use autocat::engine::{PartBatchInput, VehicleBatchInput};
use autocat::MatchingEngine;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::load()?;

    // Initialize tracing
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| format!("autocat={}", config.logging.level).into());
    match config.logging.format {
        LogFormat::Json => tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init(),
        LogFormat::Text => tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init(),
    }

    tracing::info!(
        pcdb = %config.catalog.pcdb_dir,
        vcdb = %config.catalog.vcdb_dir,
        "loading catalogs"
    );
    let engine = MatchingEngine::from_dirs(
        &config.catalog.pcdb_dir,
        &config.catalog.vcdb_dir,
        config.matcher.clone(),
    )
    .await?;

    let input = std::fs::File::open(&config.batch.input)?;
    let reader = std::io::BufReader::new(input);
    let output = std::fs::File::create(&config.batch.output)?;
    let mut writer = BufWriter::new(output);

    let options = BatchOptions::default();

    match config.batch.kind {
        BatchKind::Parts => {
            let mut inputs = Vec::new();
            for line in reader.lines() {
                let line = line?;
                if line.trim().is_empty() {
                    continue;
                }
                let record: PartBatchInput = serde_json::from_str(&line)?;
                inputs.push(record);
            }
            let outcome = engine.batch_match_parts(inputs, &options);
            for (id, result) in &outcome.results {
                let row = serde_json::json!({ "id": id, "result": result });
                writeln!(writer, "{}", serde_json::to_string(&row)?)?;
            }
        }
        BatchKind::Vehicles => {
            let mut inputs = Vec::new();
            for line in reader.lines() {
                let line = line?;
                if line.trim().is_empty() {
                    continue;
                }
                let record: VehicleBatchInput = serde_json::from_str(&line)?;
                inputs.push(record);
            }
            let outcome = engine.batch_match_vehicles(inputs, &options);
            for (id, result) in &outcome.results {
                let row = serde_json::json!({ "id": id, "result": result });
                writeln!(writer, "{}", serde_json::to_string(&row)?)?;
            }
        }
    }
    writer.flush()?;

    let report = engine.statistics();
    println!("{}", serde_json::to_string_pretty(&report)?);

    Ok(())
}
