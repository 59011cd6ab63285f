//! Stream Configuration Settings
//!
//! Configuration types for the streaming client, loaded from environment
//! variables with typed defaults. Retry/backoff parameters and the packet
//! ceiling are explicit configuration here rather than implicit constants.

use std::time::Duration;

/// Default WebSocket endpoint for the chart data feed.
pub const DEFAULT_WEBSOCKET_URL: &str =
    "wss://data.tradingview.com/socket.io/websocket?from=chart%2FVEPYsueI%2F&type=chart";

/// Auth token used for anonymous sessions.
pub const DEFAULT_AUTH_TOKEN: &str = "unauthorized_user_token";

/// Bearer token for the chart session.
///
/// Token acquisition is out of scope; the value is supplied externally and
/// defaults to the anonymous token.
#[derive(Clone)]
pub struct AuthToken(String);

impl AuthToken {
    /// Wrap a token value.
    #[must_use]
    pub const fn new(token: String) -> Self {
        Self(token)
    }

    /// The raw token value.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for AuthToken {
    fn default() -> Self {
        Self(DEFAULT_AUTH_TOKEN.to_string())
    }
}

impl std::fmt::Debug for AuthToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.0 == DEFAULT_AUTH_TOKEN {
            f.debug_tuple("AuthToken").field(&self.0).finish()
        } else {
            f.debug_tuple("AuthToken").field(&"[REDACTED]").finish()
        }
    }
}

/// WebSocket connection settings.
#[derive(Debug, Clone)]
pub struct WebSocketSettings {
    /// Initial reconnection delay.
    pub reconnect_delay_initial: Duration,
    /// Maximum reconnection delay.
    pub reconnect_delay_max: Duration,
    /// Reconnection delay multiplier for exponential backoff.
    pub reconnect_delay_multiplier: f64,
    /// Maximum reconnection attempts before the stream fails terminally.
    pub max_reconnect_attempts: u32,
}

impl Default for WebSocketSettings {
    fn default() -> Self {
        Self {
            reconnect_delay_initial: Duration::from_secs(1),
            reconnect_delay_max: Duration::from_secs(30),
            reconnect_delay_multiplier: 2.0,
            max_reconnect_attempts: 5,
        }
    }
}

/// Batch collection settings.
#[derive(Debug, Clone)]
pub struct CollectorSettings {
    /// Packet ceiling: give up on series that have not materialized by then.
    pub max_packets: usize,
    /// Minimum study series length accepted as a full snapshot; shorter
    /// arrays are partial incremental updates and are skipped.
    pub min_study_points: usize,
}

impl Default for CollectorSettings {
    fn default() -> Self {
        Self {
            max_packets: 50,
            min_study_points: 10,
        }
    }
}

/// Complete client configuration.
#[derive(Debug, Clone)]
pub struct StreamSettings {
    /// WebSocket endpoint.
    pub url: String,
    /// Bearer token for the session.
    pub auth_token: AuthToken,
    /// Locale sent during the handshake (language, region).
    pub locale: (String, String),
    /// WebSocket connection settings.
    pub websocket: WebSocketSettings,
    /// Batch collection settings.
    pub collector: CollectorSettings,
}

impl Default for StreamSettings {
    fn default() -> Self {
        Self {
            url: DEFAULT_WEBSOCKET_URL.to_string(),
            auth_token: AuthToken::default(),
            locale: ("en".to_string(), "US".to_string()),
            websocket: WebSocketSettings::default(),
            collector: CollectorSettings::default(),
        }
    }
}

impl StreamSettings {
    /// Create configuration from environment variables, falling back to
    /// defaults for anything unset.
    #[must_use]
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let websocket = WebSocketSettings {
            reconnect_delay_initial: parse_env_duration_millis(
                "TV_STREAM_RECONNECT_DELAY_INITIAL_MS",
                defaults.websocket.reconnect_delay_initial,
            ),
            reconnect_delay_max: parse_env_duration_secs(
                "TV_STREAM_RECONNECT_DELAY_MAX_SECS",
                defaults.websocket.reconnect_delay_max,
            ),
            reconnect_delay_multiplier: parse_env_f64(
                "TV_STREAM_RECONNECT_DELAY_MULTIPLIER",
                defaults.websocket.reconnect_delay_multiplier,
            ),
            max_reconnect_attempts: parse_env_u32(
                "TV_STREAM_MAX_RECONNECT_ATTEMPTS",
                defaults.websocket.max_reconnect_attempts,
            ),
        };

        let collector = CollectorSettings {
            max_packets: parse_env_usize("TV_STREAM_MAX_PACKETS", defaults.collector.max_packets),
            min_study_points: parse_env_usize(
                "TV_STREAM_MIN_STUDY_POINTS",
                defaults.collector.min_study_points,
            ),
        };

        Self {
            url: std::env::var("TV_STREAM_URL").unwrap_or(defaults.url),
            auth_token: std::env::var("TV_STREAM_JWT")
                .map_or(defaults.auth_token, AuthToken::new),
            locale: defaults.locale,
            websocket,
            collector,
        }
    }
}

fn parse_env_u32(key: &str, default: u32) -> u32 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn parse_env_usize(key: &str, default: usize) -> usize {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn parse_env_f64(key: &str, default: f64) -> f64 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn parse_env_duration_secs(key: &str, default: Duration) -> Duration {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .map_or(default, Duration::from_secs)
}

fn parse_env_duration_millis(key: &str, default: Duration) -> Duration {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .map_or(default, Duration::from_millis)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn websocket_settings_defaults() {
        let settings = WebSocketSettings::default();
        assert_eq!(settings.reconnect_delay_initial, Duration::from_secs(1));
        assert_eq!(settings.reconnect_delay_max, Duration::from_secs(30));
        assert!((settings.reconnect_delay_multiplier - 2.0).abs() < f64::EPSILON);
        assert_eq!(settings.max_reconnect_attempts, 5);
    }

    #[test]
    fn collector_settings_defaults() {
        let settings = CollectorSettings::default();
        assert_eq!(settings.max_packets, 50);
        assert_eq!(settings.min_study_points, 10);
    }

    #[test]
    fn stream_settings_defaults() {
        let settings = StreamSettings::default();
        assert_eq!(settings.url, DEFAULT_WEBSOCKET_URL);
        assert_eq!(settings.auth_token.as_str(), DEFAULT_AUTH_TOKEN);
        assert_eq!(settings.locale.0, "en");
        assert_eq!(settings.locale.1, "US");
    }

    #[test]
    fn custom_auth_token_is_redacted_in_debug() {
        let token = AuthToken::new("secret-jwt".to_string());
        let debug = format!("{token:?}");
        assert!(!debug.contains("secret-jwt"));
        assert!(debug.contains("[REDACTED]"));
    }

    #[test]
    fn anonymous_auth_token_is_not_redacted() {
        let token = AuthToken::default();
        let debug = format!("{token:?}");
        assert!(debug.contains(DEFAULT_AUTH_TOKEN));
    }
}
