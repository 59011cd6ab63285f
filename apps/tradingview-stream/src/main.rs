//! TradingView Stream Binary
//!
//! Streams one symbol's chart series (plus optional indicator study) in
//! batch mode and prints the result as JSON on stdout.
//!
//! # Usage
//!
//! ```bash
//! cargo run --bin tradingview-stream
//! ```
//!
//! # Environment Variables
//!
//! ## Request
//! - `TV_SYMBOL`: exchange symbol (default: `BINANCE:BTCUSDT`)
//! - `TV_TIMEFRAME`: target timeframe code (default: `1m`)
//! - `TV_BAR_COUNT`: number of bars to request (default: `10`)
//! - `TV_INDICATOR_ID` / `TV_INDICATOR_VERSION`: indicator script reference,
//!   both or neither
//! - `TV_STUDY_SCRIPT` / `TV_STUDY_INPUTS`: study-creation payload for the
//!   indicator, as produced by your metadata source (script key and JSON
//!   inputs object)
//!
//! ## Connection
//! - `TV_STREAM_URL`: WebSocket endpoint (default: production chart feed)
//! - `TV_STREAM_JWT`: bearer token (default: anonymous)
//! - `TV_STREAM_MAX_RECONNECT_ATTEMPTS`, `TV_STREAM_RECONNECT_DELAY_INITIAL_MS`,
//!   `TV_STREAM_RECONNECT_DELAY_MAX_SECS`, `TV_STREAM_RECONNECT_DELAY_MULTIPLIER`
//! - `TV_STREAM_MAX_PACKETS`, `TV_STREAM_MIN_STUDY_POINTS`
//! - `RUST_LOG`: log filter (default: `info`)

use std::sync::Arc;

use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use tradingview_stream::{
    ExportError, Exporter, Indicator, StaticStudyMetadata, StreamBatch, StreamClient,
    StreamSettings, StudyPayload,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    rustls::crypto::ring::default_provider()
        .install_default()
        .map_err(|_| anyhow::anyhow!("failed to install rustls crypto provider"))?;

    // Load .env before anything reads the environment.
    let _ = dotenvy::dotenv();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    tracing::info!("Starting TradingView stream");

    let settings = StreamSettings::from_env();
    let request = StreamRequest::from_env()?;
    tracing::info!(
        symbol = %request.symbol,
        timeframe = %request.timeframe,
        bars = request.bar_count,
        indicators = request.indicators.len(),
        "request"
    );

    let metadata = request.metadata_provider();
    let cancel = CancellationToken::new();
    let client =
        StreamClient::new(settings, Arc::new(metadata)).with_cancellation(cancel.clone());

    tokio::select! {
        result = client.stream_symbol(
            &request.symbol,
            &request.timeframe,
            request.bar_count,
            request.indicators.clone(),
        ) => {
            let batch = result?;
            tracing::info!(
                bars = batch.bars.len(),
                indicators = batch.indicators.len(),
                failed = batch.failed_indicators.len(),
                "stream complete"
            );
            StdoutExporter.export(&batch)?;
        }
        _ = signal::ctrl_c() => {
            tracing::info!("interrupt received, closing stream");
            cancel.cancel();
        }
    }

    Ok(())
}

/// One batch request assembled from the environment.
struct StreamRequest {
    symbol: String,
    timeframe: String,
    bar_count: u32,
    indicators: Vec<Indicator>,
    study_script: String,
    study_inputs: serde_json::Value,
}

impl StreamRequest {
    fn from_env() -> anyhow::Result<Self> {
        let symbol =
            std::env::var("TV_SYMBOL").unwrap_or_else(|_| "BINANCE:BTCUSDT".to_string());
        let timeframe = std::env::var("TV_TIMEFRAME").unwrap_or_else(|_| "1m".to_string());
        let bar_count = std::env::var("TV_BAR_COUNT")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(10);

        let indicator = Indicator::from_parts(
            std::env::var("TV_INDICATOR_ID").ok(),
            std::env::var("TV_INDICATOR_VERSION").ok(),
        )?;

        let study_script = std::env::var("TV_STUDY_SCRIPT")
            .unwrap_or_else(|_| "Script@tv-scripting-101!".to_string());
        let study_inputs = match std::env::var("TV_STUDY_INPUTS") {
            Ok(raw) => serde_json::from_str(&raw)?,
            Err(_) => serde_json::Value::Object(serde_json::Map::new()),
        };

        Ok(Self {
            symbol,
            timeframe,
            bar_count,
            indicators: indicator.into_iter().collect(),
            study_script,
            study_inputs,
        })
    }

    /// Register the configured study payload for the requested indicator.
    fn metadata_provider(&self) -> StaticStudyMetadata {
        let mut provider = StaticStudyMetadata::new();
        for indicator in &self.indicators {
            provider = provider.with_payload(
                indicator,
                StudyPayload {
                    script: self.study_script.clone(),
                    inputs: self.study_inputs.clone(),
                },
            );
        }
        provider
    }
}

/// Prints the batch result as pretty JSON on stdout.
struct StdoutExporter;

impl Exporter for StdoutExporter {
    fn export(&self, batch: &StreamBatch) -> Result<(), ExportError> {
        let json =
            serde_json::to_string_pretty(batch).map_err(|e| ExportError::Sink(e.to_string()))?;
        println!("{json}");
        Ok(())
    }
}
