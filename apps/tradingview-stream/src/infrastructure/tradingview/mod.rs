//! Chart Protocol Adapter
//!
//! Everything that speaks the multiplexed chart protocol: the wire frame
//! codec, message types, session management, reconnection policy, packet
//! extractors, and the stream client itself.

/// Stream client and connection state machine.
pub mod client;

/// Length-prefixed frame codec and heartbeat detection.
pub mod codec;

/// Packet extractors: raw packets to typed series.
pub mod extract;

/// Outbound message builder and inbound packet enum.
pub mod messages;

/// Bounded exponential backoff policy.
pub mod reconnect;

/// Session ids and handshake/subscription sequences.
pub mod session;
