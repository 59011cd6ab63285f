#![cfg_attr(
    test,
    allow(
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::float_cmp,
        clippy::too_many_lines,
        clippy::match_same_arms,
        clippy::needless_pass_by_value,
        clippy::default_trait_access,
        clippy::items_after_statements
    )
)]

//! TradingView Stream - Real-Time Chart Data Client
//!
//! A client for TradingView's proprietary, length-prefixed, multiplexed
//! message protocol over a single WebSocket connection. It establishes
//! authenticated quote and chart sessions, subscribes to one symbol's OHLCV
//! series and zero or more indicator studies, decodes the inbound frame
//! stream (data interleaved with heartbeats), and resamples 1-minute bars
//! into coarser timeframes. Subscription state survives heartbeat cycles
//! and transient disconnects.
//!
//! # Layers (inside -> outside)
//!
//! - **Domain**: Chart data types and aggregation
//!   - `streaming`: bars, indicator points, timeframes, batch results
//!   - `subscription`: symbols, indicators, study slot assignment
//!   - `resample`: timeframe bucket aggregation
//!
//! - **Application**: Use cases and port definitions
//!   - `ports`: study metadata and export collaborators
//!   - `services`: batch collection policy
//!
//! - **Infrastructure**: Protocol adapters
//!   - `tradingview`: frame codec, messages, sessions, reconnect, client
//!   - `config`: environment-driven settings
//!
//! # Data Flow
//!
//! ```text
//! WebSocket ──► Codec ──► Packets ──► Extractors ──► Resampler ──► StreamBatch
//!     ▲                      │
//!     └── heartbeat echo ◄───┘
//! ```
//!
//! # Modes
//!
//! Batch mode ([`StreamClient::stream`]) collects bars plus study series and
//! returns a structured result; raw mode ([`StreamClient::connect`]) hands
//! back the lazy packet sequence and leaves interpretation to the caller.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::pedantic)]

// =============================================================================
// Module Declarations
// =============================================================================

/// Domain layer - Core chart data types with no protocol dependencies.
pub mod domain;

/// Application layer - Use cases and port definitions.
pub mod application;

/// Infrastructure layer - Protocol adapters and configuration.
pub mod infrastructure;

// =============================================================================
// Re-exports
// =============================================================================

// Domain types
pub use domain::resample::{ResampleError, resample_bars, resample_points};
pub use domain::streaming::{Bar, IndicatorPoint, StreamBatch, Timeframe, UnsupportedTimeframe};
pub use domain::subscription::{
    Indicator, STUDY_SLOT_BASE, StudySlotMap, Subscription, SubscriptionError, Symbol,
};

// Ports
pub use application::ports::{
    ExportError, Exporter, MetadataError, StaticStudyMetadata, StudyMetadataProvider, StudyPayload,
};

// Batch collection (for embedders driving a raw stream themselves)
pub use application::services::{RawSeries, collect_series};

// Configuration
pub use infrastructure::config::{
    AuthToken, CollectorSettings, DEFAULT_AUTH_TOKEN, DEFAULT_WEBSOCKET_URL, StreamSettings,
    WebSocketSettings,
};

// Stream client
pub use infrastructure::tradingview::client::{
    ConnectionState, PacketStream, StreamClient, StreamError,
};

// Wire codec (for integration tests and protocol tooling)
pub use infrastructure::tradingview::codec::{
    decode_packets, encode_frame, is_heartbeat, split_frames,
};
pub use infrastructure::tradingview::messages::{ClientMessage, Packet};

// Session management
pub use infrastructure::tradingview::reconnect::{ReconnectConfig, ReconnectPolicy};
pub use infrastructure::tradingview::session::{
    PreparedStudy, QUOTE_FIELDS, SessionIds, generate_session_id,
};
