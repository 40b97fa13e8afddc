//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the bridge.
//! All types derive Serde traits for deserialization from config files.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Root configuration for the bridge.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct BridgeConfig {
    /// Listener and endpoint settings.
    pub server: ServerConfig,

    /// WebSocket upgrade policy.
    pub upgrade: UpgradePolicy,

    /// Reader/dispatcher/writer settings.
    pub pipeline: PipelineConfig,

    /// Object pool sizing.
    pub pools: PoolConfig,

    /// Extra headers sent on the upgrade response.
    pub response_headers: BTreeMap<String, String>,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,

    /// Path the WebSocket endpoint is mounted on.
    pub path: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
            path: "/ws".to_string(),
        }
    }
}

/// Which connections may upgrade, and with what limits.
///
/// The default is permissive: any origin, no subprotocol, library limits.
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq, Eq)]
#[serde(default)]
pub struct UpgradePolicy {
    /// Allowed `Origin` values. Empty allows any origin.
    pub allowed_origins: Vec<String>,

    /// Subprotocols offered during the handshake, in preference order.
    pub protocols: Vec<String>,

    /// Maximum size of one incoming message in bytes.
    pub max_message_size: Option<usize>,

    /// Maximum size of one incoming frame in bytes.
    pub max_frame_size: Option<usize>,
}

impl UpgradePolicy {
    /// Whether a handshake carrying `origin` may proceed.
    /// Requests without an `Origin` header (non-browser clients) always pass.
    pub fn allows_origin(&self, origin: Option<&str>) -> bool {
        match origin {
            _ if self.allowed_origins.is_empty() => true,
            None => true,
            Some(origin) => self
                .allowed_origins
                .iter()
                .any(|allowed| allowed.eq_ignore_ascii_case(origin)),
        }
    }
}

/// Frame type used for outbound responses.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    #[default]
    Text,
    Binary,
}

/// What a panicking handler produces.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// No response; the peer never sees the correlation id again.
    #[default]
    Drop,
    /// An empty 500 response carrying the correlation id.
    ErrorResponse,
}

/// Pipeline configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct PipelineConfig {
    /// Depth of the reader→dispatcher and dispatcher→writer queues.
    pub queue_depth: usize,

    /// Per-connection cap on concurrently running handlers. `None` = unbounded.
    pub max_in_flight: Option<usize>,

    /// Frame type for responses.
    pub message_kind: MessageKind,

    /// Handler panic behaviour.
    pub failure_policy: FailurePolicy,

    /// Echo `requestUri` in responses.
    pub echo_request_uri: bool,

    /// Body limit for service-backed handlers, in bytes.
    pub max_body_size: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            queue_depth: 32,
            max_in_flight: None,
            message_kind: MessageKind::Text,
            failure_policy: FailurePolicy::Drop,
            echo_request_uri: true,
            max_body_size: 2 * 1024 * 1024, // 2MB
        }
    }
}

/// Object pool configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct PoolConfig {
    /// Idle request shells kept for reuse.
    pub request_capacity: usize,

    /// Idle response accumulators kept for reuse.
    pub response_capacity: usize,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            request_capacity: 256,
            response_capacity: 256,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_uses_defaults() {
        let config: BridgeConfig = toml::from_str("").unwrap();
        assert_eq!(config.server.path, "/ws");
        assert_eq!(config.pipeline, PipelineConfig::default());
        assert_eq!(config.upgrade, UpgradePolicy::default());
        assert!(config.response_headers.is_empty());
    }

    #[test]
    fn partial_sections_merge_with_defaults() {
        let config: BridgeConfig = toml::from_str(
            r#"
            [pipeline]
            max_in_flight = 8
            message_kind = "binary"
            failure_policy = "error_response"

            [response_headers]
            x-served-by = "wsrest"
            "#,
        )
        .unwrap();

        assert_eq!(config.pipeline.max_in_flight, Some(8));
        assert_eq!(config.pipeline.message_kind, MessageKind::Binary);
        assert_eq!(config.pipeline.failure_policy, FailurePolicy::ErrorResponse);
        assert_eq!(config.pipeline.queue_depth, 32);
        assert_eq!(config.response_headers["x-served-by"], "wsrest");
    }

    #[test]
    fn origin_policy() {
        let open = UpgradePolicy::default();
        assert!(open.allows_origin(Some("https://anywhere.test")));

        let strict = UpgradePolicy {
            allowed_origins: vec!["https://app.example.com".into()],
            ..UpgradePolicy::default()
        };
        assert!(strict.allows_origin(Some("https://APP.example.com")));
        assert!(strict.allows_origin(None));
        assert!(!strict.allows_origin(Some("https://evil.example.com")));
    }
}
