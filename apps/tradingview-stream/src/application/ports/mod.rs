//! Port Interfaces
//!
//! Contracts for the external collaborators the stream core consumes.
//!
//! ## Driven Ports (Outbound)
//!
//! - [`StudyMetadataProvider`]: resolves an indicator script reference to an
//!   opaque study-creation payload. The real lookup (an HTTP fetch against
//!   the pine-facade translate endpoint) lives outside this crate; tests and
//!   embedders inject payloads through [`StaticStudyMetadata`].
//! - [`Exporter`]: receives the finished batch result. File formats are out
//!   of scope here; the binary wires a stdout JSON exporter.

use std::collections::HashMap;

use async_trait::async_trait;
use serde_json::Value;

use crate::domain::streaming::StreamBatch;
use crate::domain::subscription::Indicator;

// =============================================================================
// Study metadata
// =============================================================================

/// Opaque study-creation payload for one indicator.
///
/// The session layer combines this with the chart session id and the
/// assigned slot name to build the `create_study` message; the payload
/// itself (script key plus default input values) comes from the metadata
/// collaborator and is replayed verbatim on re-subscription.
#[derive(Debug, Clone, PartialEq)]
pub struct StudyPayload {
    /// Script key, e.g. `Script@tv-scripting-101!`.
    pub script: String,
    /// Input object with default values (`text`, `pineId`, `pineVersion`,
    /// `pineFeatures`, and any `in_*` inputs).
    pub inputs: Value,
}

/// Errors from the study metadata collaborator.
#[derive(Debug, Clone, thiserror::Error)]
pub enum MetadataError {
    /// The indicator script does not exist (or is not public).
    #[error("indicator not found: {id} v{version}")]
    NotFound {
        /// Pine script id.
        id: String,
        /// Script version.
        version: String,
    },

    /// The lookup itself failed.
    #[error("study metadata lookup failed: {0}")]
    Lookup(String),
}

/// Resolves indicator script references to study-creation payloads.
#[async_trait]
pub trait StudyMetadataProvider: Send + Sync {
    /// Fetch the study payload for an indicator.
    ///
    /// # Errors
    ///
    /// Returns [`MetadataError::NotFound`] for unknown scripts and
    /// [`MetadataError::Lookup`] when the lookup itself fails.
    async fn study_payload(&self, indicator: &Indicator) -> Result<StudyPayload, MetadataError>;
}

/// Map-backed [`StudyMetadataProvider`] for embedders and tests.
#[derive(Debug, Clone, Default)]
pub struct StaticStudyMetadata {
    payloads: HashMap<(String, String), StudyPayload>,
}

impl StaticStudyMetadata {
    /// Create an empty provider.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a payload for an indicator.
    #[must_use]
    pub fn with_payload(mut self, indicator: &Indicator, payload: StudyPayload) -> Self {
        self.payloads
            .insert((indicator.id.clone(), indicator.version.clone()), payload);
        self
    }
}

#[async_trait]
impl StudyMetadataProvider for StaticStudyMetadata {
    async fn study_payload(&self, indicator: &Indicator) -> Result<StudyPayload, MetadataError> {
        self.payloads
            .get(&(indicator.id.clone(), indicator.version.clone()))
            .cloned()
            .ok_or_else(|| MetadataError::NotFound {
                id: indicator.id.clone(),
                version: indicator.version.clone(),
            })
    }
}

// =============================================================================
// Export
// =============================================================================

/// Errors from the export collaborator.
#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    /// The export sink rejected the batch.
    #[error("export failed: {0}")]
    Sink(String),
}

/// Receives finished batch results.
pub trait Exporter: Send + Sync {
    /// Export one batch result.
    ///
    /// # Errors
    ///
    /// Returns [`ExportError`] when the sink rejects the batch.
    fn export(&self, batch: &StreamBatch) -> Result<(), ExportError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn rsi() -> Indicator {
        Indicator::new("STD;RSI".to_string(), "29.0".to_string())
    }

    #[tokio::test]
    async fn static_provider_returns_registered_payloads() {
        let payload = StudyPayload {
            script: "Script@tv-scripting-101!".to_string(),
            inputs: json!({"pineId": "STD;RSI"}),
        };
        let provider = StaticStudyMetadata::new().with_payload(&rsi(), payload.clone());

        let found = provider.study_payload(&rsi()).await.unwrap();
        assert_eq!(found, payload);
    }

    #[tokio::test]
    async fn static_provider_reports_unknown_indicators() {
        let provider = StaticStudyMetadata::new();
        let err = provider.study_payload(&rsi()).await.unwrap_err();
        assert!(matches!(err, MetadataError::NotFound { .. }));
    }
}
