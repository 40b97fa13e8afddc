//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (queue depth > 0, limits > 0)
//! - Check addresses, endpoint path and response headers parse
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: BridgeConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::collections::BTreeMap;
use std::net::SocketAddr;

use axum::http::{HeaderMap, HeaderName, HeaderValue};

use crate::config::schema::BridgeConfig;

/// A single semantic problem in a configuration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("server.bind_address {0:?} is not a socket address")]
    InvalidBindAddress(String),

    #[error("server.path {0:?} must start with '/'")]
    InvalidPath(String),

    #[error("pipeline.queue_depth must be greater than zero")]
    ZeroQueueDepth,

    #[error("pipeline.max_in_flight must be greater than zero when set")]
    ZeroMaxInFlight,

    #[error("upgrade.{0} must be greater than zero when set")]
    ZeroUpgradeLimit(&'static str),

    #[error("response header {name:?} is not a valid header")]
    InvalidResponseHeader { name: String },

    #[error("observability.metrics_address {0:?} is not a socket address")]
    InvalidMetricsAddress(String),
}

/// Check every semantic constraint of `config`.
pub fn validate_config(config: &BridgeConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.server.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::InvalidBindAddress(
            config.server.bind_address.clone(),
        ));
    }
    if !config.server.path.starts_with('/') {
        errors.push(ValidationError::InvalidPath(config.server.path.clone()));
    }
    if config.pipeline.queue_depth == 0 {
        errors.push(ValidationError::ZeroQueueDepth);
    }
    if config.pipeline.max_in_flight == Some(0) {
        errors.push(ValidationError::ZeroMaxInFlight);
    }
    if config.upgrade.max_message_size == Some(0) {
        errors.push(ValidationError::ZeroUpgradeLimit("max_message_size"));
    }
    if config.upgrade.max_frame_size == Some(0) {
        errors.push(ValidationError::ZeroUpgradeLimit("max_frame_size"));
    }
    if let Err(e) = parse_response_headers(&config.response_headers) {
        errors.push(e);
    }
    if config.observability.metrics_enabled
        && config
            .observability
            .metrics_address
            .parse::<SocketAddr>()
            .is_err()
    {
        errors.push(ValidationError::InvalidMetricsAddress(
            config.observability.metrics_address.clone(),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Convert configured response headers into a header map.
pub fn parse_response_headers(
    headers: &BTreeMap<String, String>,
) -> Result<HeaderMap, ValidationError> {
    let mut map = HeaderMap::with_capacity(headers.len());
    for (name, value) in headers {
        let invalid = || ValidationError::InvalidResponseHeader { name: name.clone() };
        let header_name = HeaderName::from_bytes(name.as_bytes()).map_err(|_| invalid())?;
        let header_value = HeaderValue::from_str(value).map_err(|_| invalid())?;
        map.append(header_name, header_value);
    }
    Ok(map)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert_eq!(validate_config(&BridgeConfig::default()), Ok(()));
    }

    #[test]
    fn reports_every_problem() {
        let mut config = BridgeConfig::default();
        config.server.bind_address = "nowhere".into();
        config.server.path = "ws".into();
        config.pipeline.queue_depth = 0;
        config.pipeline.max_in_flight = Some(0);
        config
            .response_headers
            .insert("bad header".into(), "x".into());

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(
            errors,
            vec![
                ValidationError::InvalidBindAddress("nowhere".into()),
                ValidationError::InvalidPath("ws".into()),
                ValidationError::ZeroQueueDepth,
                ValidationError::ZeroMaxInFlight,
                ValidationError::InvalidResponseHeader {
                    name: "bad header".into()
                },
            ]
        );
    }

    #[test]
    fn metrics_address_checked_only_when_enabled() {
        let mut config = BridgeConfig::default();
        config.observability.metrics_address = "bogus".into();
        assert!(validate_config(&config).is_ok());

        config.observability.metrics_enabled = true;
        assert_eq!(
            validate_config(&config),
            Err(vec![ValidationError::InvalidMetricsAddress("bogus".into())])
        );
    }

    #[test]
    fn response_headers_parse() {
        let headers = BTreeMap::from([
            ("x-served-by".to_string(), "wsrest".to_string()),
            ("cache-control".to_string(), "no-store".to_string()),
        ]);
        let map = parse_response_headers(&headers).unwrap();
        assert_eq!(map["x-served-by"], "wsrest");
        assert_eq!(map.len(), 2);
    }
}
