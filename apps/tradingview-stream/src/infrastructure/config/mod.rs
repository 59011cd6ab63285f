//! Configuration module.

mod settings;

pub use settings::{
    AuthToken, CollectorSettings, DEFAULT_AUTH_TOKEN, DEFAULT_WEBSOCKET_URL, StreamSettings,
    WebSocketSettings,
};
