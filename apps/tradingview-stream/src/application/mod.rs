//! Application layer - Use cases and port definitions.

/// Interfaces for the external collaborators the stream core consumes.
pub mod ports;

/// Batch collection of bar and study series from a packet stream.
pub mod services;
