//! Chart Stream Client
//!
//! Owns the connection lifecycle: connect with the fixed browser header set,
//! run the handshake and subscription sequences, pull frames, echo
//! heartbeats, and reconnect with bounded backoff on connection loss while
//! replaying the original subscription with fresh session ids.
//!
//! # Consumption model
//!
//! [`PacketStream`] is a single-consumer pull sequence: `next()` is the only
//! suspension point and the stream is consumed through `&mut self`, so it
//! cannot be shared across concurrent consumers. Independent symbol streams
//! need independent [`PacketStream`] instances, each with its own socket,
//! session ids, and backoff state.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tokio_util::sync::CancellationToken;

use crate::application::ports::{MetadataError, StudyMetadataProvider};
use crate::application::services::collect_series;
use crate::domain::resample::{ResampleError, resample_bars, resample_points};
use crate::domain::streaming::StreamBatch;
use crate::domain::subscription::{StudySlotMap, Subscription, SubscriptionError, Symbol};
use crate::infrastructure::config::StreamSettings;

use super::codec;
use super::messages::{ClientMessage, Packet};
use super::reconnect::{ReconnectConfig, ReconnectPolicy};
use super::session::{self, PreparedStudy, SessionIds};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Fixed request headers the server expects from a browser client.
///
/// The WebSocket handshake headers themselves (Host, Upgrade, Connection,
/// Sec-WebSocket-*) are emitted by tungstenite.
const REQUEST_HEADERS: [(&str, &str); 6] = [
    ("Origin", "https://www.tradingview.com"),
    (
        "User-Agent",
        "Mozilla/5.0 (Windows NT 6.3; Win64; x64) AppleWebKit/537.36 \
         (KHTML, like Gecko) Chrome/107.0.0.0 Safari/537.36",
    ),
    ("Accept-Encoding", "gzip, deflate, br, zstd"),
    ("Accept-Language", "en-US,en;q=0.9,fa;q=0.8"),
    ("Cache-Control", "no-cache"),
    ("Pragma", "no-cache"),
];

// =============================================================================
// Error Type
// =============================================================================

/// Errors surfaced by the stream client.
#[derive(Debug, thiserror::Error)]
pub enum StreamError {
    /// WebSocket transport error.
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    /// Outbound message serialization failed.
    #[error("message encoding failed: {0}")]
    Encode(#[from] serde_json::Error),

    /// The stream request was invalid.
    #[error("invalid stream request: {0}")]
    Subscription(#[from] SubscriptionError),

    /// Study metadata lookup failed.
    #[error(transparent)]
    Metadata(#[from] MetadataError),

    /// Resampling the collected series failed.
    #[error(transparent)]
    Resample(#[from] ResampleError),

    /// The server reported a protocol or critical fault.
    #[error("server fault ({method}): {detail}")]
    Server {
        /// The fault packet's method name.
        method: String,
        /// The fault packet's params, stringified.
        detail: String,
    },

    /// Every reconnection attempt failed; the stream is closed.
    #[error("reconnect attempts exhausted after {attempts} tries")]
    ConnectionExhausted {
        /// Number of attempts made.
        attempts: u32,
    },

    /// The requested series never materialized within the packet ceiling.
    #[error("no data found within {packets} packets, missing: {missing:?}")]
    DataNotFound {
        /// The packet ceiling that was reached.
        packets: usize,
        /// Names of the series that never arrived (`ohlcv` and/or
        /// indicator ids).
        missing: Vec<String>,
    },

    /// The stream was cancelled mid-collection.
    #[error("stream cancelled")]
    Cancelled,

    /// The stream is closed; no further operations are valid.
    #[error("stream is closed")]
    Closed,
}

// =============================================================================
// Connection state
// =============================================================================

/// Connection lifecycle states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    /// No socket.
    #[default]
    Disconnected,
    /// Opening the WebSocket.
    Connecting,
    /// Socket open, sending the handshake sequence.
    Handshaking,
    /// Handshake and subscription sent (the protocol has no explicit ack).
    Subscribed,
    /// At least one frame received.
    Streaming,
    /// Connection lost, retrying with backoff.
    Reconnecting,
    /// Terminal; the socket is released.
    Closed,
}

// =============================================================================
// Stream mode
// =============================================================================

/// What the stream is subscribed to.
#[derive(Debug, Clone)]
enum StreamMode {
    /// One symbol's chart series plus attached studies.
    Chart {
        subscription: Subscription,
        slot_map: StudySlotMap,
        studies: Vec<PreparedStudy>,
    },
    /// Quote-only fast updates for a set of symbols.
    Quotes { symbols: Vec<Symbol> },
}

impl StreamMode {
    fn subscribe_sequence(&self, ids: &SessionIds) -> Vec<ClientMessage> {
        match self {
            Self::Chart {
                subscription,
                studies,
                ..
            } => session::subscribe_sequence(ids, subscription, studies),
            Self::Quotes { symbols } => session::quote_subscribe_sequence(ids, symbols),
        }
    }
}

/// One step of the receive loop, resolved outside the socket borrow.
enum Step {
    Cancelled,
    Frame(Option<Result<Message, tokio_tungstenite::tungstenite::Error>>),
}

// =============================================================================
// Packet stream
// =============================================================================

/// A lazy, effectively-infinite sequence of decoded packets over one
/// connection.
///
/// Dropping the stream releases the socket; call [`PacketStream::close`]
/// for a graceful close handshake.
#[derive(Debug)]
pub struct PacketStream {
    settings: StreamSettings,
    mode: StreamMode,
    cancel: CancellationToken,
    ws: Option<WsStream>,
    state: ConnectionState,
    session: SessionIds,
    pending: VecDeque<Packet>,
}

impl PacketStream {
    fn new(settings: StreamSettings, mode: StreamMode, cancel: CancellationToken) -> Self {
        Self {
            settings,
            mode,
            cancel,
            ws: None,
            state: ConnectionState::Disconnected,
            session: SessionIds::generate(),
            pending: VecDeque::new(),
        }
    }

    /// Current connection state.
    #[must_use]
    pub const fn state(&self) -> ConnectionState {
        self.state
    }

    /// The subscription this stream replays, for chart streams.
    #[must_use]
    pub const fn subscription(&self) -> Option<&Subscription> {
        match &self.mode {
            StreamMode::Chart { subscription, .. } => Some(subscription),
            StreamMode::Quotes { .. } => None,
        }
    }

    /// The study slot map, for chart streams.
    #[must_use]
    pub const fn slot_map(&self) -> Option<&StudySlotMap> {
        match &self.mode {
            StreamMode::Chart { slot_map, .. } => Some(slot_map),
            StreamMode::Quotes { .. } => None,
        }
    }

    /// The current session id pair (regenerated on every reconnect).
    #[must_use]
    pub const fn session(&self) -> &SessionIds {
        &self.session
    }

    /// True once the stream's cancellation token has fired.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Pull the next decoded packet.
    ///
    /// Heartbeats are echoed verbatim inside the loop and never surface.
    /// On connection loss the stream reconnects with bounded backoff and
    /// replays the original subscription with fresh session ids before
    /// yielding again. Returns `None` after cancellation or a graceful end,
    /// and `Some(Err(_))` with a terminal error once reconnection attempts
    /// are exhausted.
    pub async fn next(&mut self) -> Option<Result<Packet, StreamError>> {
        loop {
            if let Some(packet) = self.pending.pop_front() {
                return Some(Ok(packet));
            }
            if matches!(self.state, ConnectionState::Closed) {
                return None;
            }
            if self.cancel.is_cancelled() {
                self.shutdown().await;
                return None;
            }

            let step = {
                let Some(ws) = self.ws.as_mut() else {
                    return None;
                };
                tokio::select! {
                    () = self.cancel.cancelled() => Step::Cancelled,
                    frame = ws.next() => Step::Frame(frame),
                }
            };

            match step {
                Step::Cancelled => {
                    tracing::info!("stream cancelled");
                    self.shutdown().await;
                    return None;
                }
                Step::Frame(Some(Ok(Message::Text(text)))) => {
                    if matches!(self.state, ConnectionState::Subscribed) {
                        self.state = ConnectionState::Streaming;
                    }
                    if codec::is_heartbeat(&text) {
                        tracing::debug!(heartbeat = %text.as_str(), "echoing heartbeat");
                        if let Err(error) = self.reply(Message::Text(text)).await {
                            tracing::warn!(%error, "heartbeat echo failed");
                            if let Some(terminal) = self.recover().await {
                                return Some(Err(terminal));
                            }
                        }
                        continue;
                    }
                    self.pending.extend(codec::decode_packets(&text));
                }
                Step::Frame(Some(Ok(Message::Ping(payload)))) => {
                    if let Err(error) = self.reply(Message::Pong(payload)).await {
                        tracing::warn!(%error, "pong failed");
                        if let Some(terminal) = self.recover().await {
                            return Some(Err(terminal));
                        }
                    }
                }
                Step::Frame(Some(Ok(Message::Close(_)))) => {
                    tracing::info!("server closed the connection");
                    if let Some(terminal) = self.recover().await {
                        return Some(Err(terminal));
                    }
                }
                Step::Frame(Some(Ok(_))) => {
                    // Pong/binary frames carry nothing for this protocol.
                }
                Step::Frame(Some(Err(error))) => {
                    tracing::warn!(%error, "websocket read failed");
                    if let Some(terminal) = self.recover().await {
                        return Some(Err(terminal));
                    }
                }
                Step::Frame(None) => {
                    tracing::info!("websocket stream ended");
                    if let Some(terminal) = self.recover().await {
                        return Some(Err(terminal));
                    }
                }
            }
        }
    }

    /// Gracefully close the stream and release the socket.
    pub async fn close(&mut self) {
        self.shutdown().await;
    }

    /// Connect, handshake, and subscribe. Send success is all the protocol
    /// offers: there is no explicit server ack for any of these messages.
    async fn establish(&mut self) -> Result<(), StreamError> {
        self.state = ConnectionState::Connecting;
        tracing::info!(url = %self.settings.url, "connecting to chart stream");
        let ws = open_socket(&self.settings.url).await?;
        self.ws = Some(ws);

        self.state = ConnectionState::Handshaking;
        self.session = SessionIds::generate();
        tracing::debug!(
            quote = %self.session.quote,
            chart = %self.session.chart,
            "sessions generated"
        );

        let mut messages = session::handshake_sequence(
            &self.session,
            self.settings.auth_token.as_str(),
            &self.settings.locale,
        );
        messages.extend(self.mode.subscribe_sequence(&self.session));
        for message in &messages {
            self.send(message).await?;
        }

        self.state = ConnectionState::Subscribed;
        Ok(())
    }

    async fn send(&mut self, message: &ClientMessage) -> Result<(), StreamError> {
        let frame = message.to_frame()?;
        tracing::debug!(method = %message.method, "sending message");
        let ws = self.ws.as_mut().ok_or(StreamError::Closed)?;
        ws.send(Message::Text(frame.into())).await?;
        Ok(())
    }

    /// Send a raw protocol reply (heartbeat echo, pong) on the live socket.
    async fn reply(&mut self, message: Message) -> Result<(), StreamError> {
        let ws = self.ws.as_mut().ok_or(StreamError::Closed)?;
        ws.send(message).await?;
        Ok(())
    }

    /// Reconnect with bounded backoff and replay the subscription.
    ///
    /// Returns `None` when streaming can continue (or the stream was
    /// cancelled mid-recovery), `Some(error)` once attempts are exhausted.
    async fn recover(&mut self) -> Option<StreamError> {
        self.state = ConnectionState::Reconnecting;
        self.close_socket().await;

        let mut policy = ReconnectPolicy::new(ReconnectConfig::from_websocket_settings(
            &self.settings.websocket,
        ));
        loop {
            let Some(delay) = policy.next_delay() else {
                self.state = ConnectionState::Closed;
                return Some(StreamError::ConnectionExhausted {
                    attempts: policy.attempt_count(),
                });
            };
            tracing::info!(
                attempt = policy.attempt_count(),
                delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                "reconnecting to chart stream"
            );
            tokio::select! {
                () = self.cancel.cancelled() => {
                    self.shutdown().await;
                    return None;
                }
                () = tokio::time::sleep(delay) => {}
            }

            match self.establish().await {
                Ok(()) => {
                    tracing::info!("re-subscribed after reconnect");
                    return None;
                }
                Err(error) => {
                    tracing::warn!(%error, "reconnect attempt failed");
                    self.close_socket().await;
                }
            }
        }
    }

    async fn close_socket(&mut self) {
        if let Some(mut ws) = self.ws.take() {
            if let Err(error) = ws.close(None).await {
                tracing::debug!(%error, "websocket close failed");
            }
        }
    }

    async fn shutdown(&mut self) {
        self.close_socket().await;
        self.state = ConnectionState::Closed;
    }
}

// =============================================================================
// Stream client
// =============================================================================

/// Entry point for chart and quote streams.
///
/// Holds static configuration, the study metadata collaborator, and the
/// cancellation token handed to every stream it opens. Nothing else is
/// shared between streams.
pub struct StreamClient {
    settings: StreamSettings,
    metadata: Arc<dyn StudyMetadataProvider>,
    cancel: CancellationToken,
}

impl StreamClient {
    /// Create a client.
    #[must_use]
    pub fn new(settings: StreamSettings, metadata: Arc<dyn StudyMetadataProvider>) -> Self {
        Self {
            settings,
            metadata,
            cancel: CancellationToken::new(),
        }
    }

    /// Use an externally owned cancellation token.
    #[must_use]
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// A handle to the client's cancellation token.
    #[must_use]
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Open a chart stream: validate, fetch study payloads, connect,
    /// handshake, and subscribe.
    ///
    /// # Errors
    ///
    /// Fails on study metadata lookup errors before any socket I/O, and on
    /// transport errors while connecting or subscribing.
    pub async fn connect(&self, subscription: Subscription) -> Result<PacketStream, StreamError> {
        let slot_map = StudySlotMap::assign(&subscription.indicators);
        let mut studies = Vec::with_capacity(slot_map.len());
        for (slot, indicator) in slot_map.iter() {
            let payload = self.metadata.study_payload(indicator).await?;
            studies.push(PreparedStudy {
                slot: slot.to_string(),
                payload,
            });
        }

        let mut stream = PacketStream::new(
            self.settings.clone(),
            StreamMode::Chart {
                subscription,
                slot_map,
                studies,
            },
            self.cancel.clone(),
        );
        stream.establish().await?;
        Ok(stream)
    }

    /// Open a quote-only stream for a set of symbols.
    ///
    /// # Errors
    ///
    /// Fails when `symbols` is empty, and on transport errors while
    /// connecting or subscribing.
    pub async fn connect_quotes(&self, symbols: Vec<Symbol>) -> Result<PacketStream, StreamError> {
        if symbols.is_empty() {
            return Err(SubscriptionError::EmptySymbol.into());
        }
        let mut stream = PacketStream::new(
            self.settings.clone(),
            StreamMode::Quotes { symbols },
            self.cancel.clone(),
        );
        stream.establish().await?;
        Ok(stream)
    }

    /// Batch mode: stream until the requested series have materialized,
    /// then resample to the subscription's timeframe.
    ///
    /// Studies that never produce data within the packet ceiling are
    /// reported in [`StreamBatch::failed_indicators`], not as an error.
    ///
    /// # Errors
    ///
    /// Fails when bars never arrive within the packet ceiling
    /// ([`StreamError::DataNotFound`]), on terminal transport errors, and on
    /// server faults.
    pub async fn stream(&self, subscription: Subscription) -> Result<StreamBatch, StreamError> {
        let target_minutes = subscription.timeframe.minutes();

        let mut stream = self.connect(subscription).await?;
        let collected = collect_series(&mut stream, &self.settings.collector).await;
        stream.close().await;
        let raw = collected?;

        let bars = resample_bars(&raw.bars, target_minutes)?;
        let mut indicators = HashMap::with_capacity(raw.indicators.len());
        for (id, points) in raw.indicators {
            let resampled = resample_points(&points, target_minutes)?;
            indicators.insert(id, resampled);
        }

        Ok(StreamBatch {
            bars,
            indicators,
            failed_indicators: raw.failed_indicators,
        })
    }

    /// Convenience wrapper taking raw request parts.
    ///
    /// # Errors
    ///
    /// Fails on request validation errors plus everything
    /// [`StreamClient::stream`] can fail with.
    pub async fn stream_symbol(
        &self,
        exchange_symbol: &str,
        timeframe: &str,
        bar_count: u32,
        indicators: Vec<crate::domain::subscription::Indicator>,
    ) -> Result<StreamBatch, StreamError> {
        let subscription = Subscription::new(exchange_symbol, timeframe, bar_count, indicators)?;
        self.stream(subscription).await
    }
}

async fn open_socket(url: &str) -> Result<WsStream, StreamError> {
    let mut request = url.into_client_request()?;
    for (name, value) in REQUEST_HEADERS {
        request
            .headers_mut()
            .append(name, HeaderValue::from_static(value));
    }
    let (ws, _response) = connect_async(request).await?;
    Ok(ws)
}
