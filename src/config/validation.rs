//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate addresses and log levels
//! - Reject empty access log outputs and formats
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: SidecarConfig → Result<(), Vec<ValidationError>>
//! - Format strings are only checked for presence here; the access log
//!   compiler reports structural errors at startup

use std::fmt;
use std::net::SocketAddr;

use crate::config::schema::{SidecarConfig, PLACEHOLDER_API_KEY};
use crate::observability::logging::LOG_LEVELS;

/// A single semantic problem in a configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl ValidationError {
    fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Check a parsed configuration.
pub fn validate_config(config: &SidecarConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if !LOG_LEVELS.contains(&config.observability.log_level.as_str()) {
        errors.push(ValidationError::new(
            "observability.log_level",
            format!("unknown log level '{}'", config.observability.log_level),
        ));
    }

    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::new(
            "observability.metrics_address",
            format!("invalid socket address '{}'", config.observability.metrics_address),
        ));
    }

    if config.admin.enabled {
        if config.admin.bind_address.parse::<SocketAddr>().is_err() {
            errors.push(ValidationError::new(
                "admin.bind_address",
                format!("invalid socket address '{}'", config.admin.bind_address),
            ));
        }
        if config.admin.api_key.is_empty() || config.admin.api_key == PLACEHOLDER_API_KEY {
            errors.push(ValidationError::new(
                "admin.api_key",
                "must be set to a non-placeholder value",
            ));
        }
    }

    for (i, log) in config.access_logs.iter().enumerate() {
        if log.output.trim().is_empty() {
            errors.push(ValidationError::new(
                format!("access_logs[{}].output", i),
                "must not be empty",
            ));
        }
        if log.format.is_empty() {
            errors.push(ValidationError::new(
                format!("access_logs[{}].format", i),
                "must not be empty",
            ));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::AccessLogConfig;

    #[test]
    fn test_default_config_is_valid() {
        assert!(validate_config(&SidecarConfig::default()).is_ok());
    }

    #[test]
    fn test_collects_every_error() {
        let mut config = SidecarConfig::default();
        config.observability.log_level = "loud".to_string();
        config.admin.enabled = true;
        config.admin.bind_address = "not-an-address".to_string();
        config.access_logs.push(AccessLogConfig {
            output: "".to_string(),
            format: "".to_string(),
            disabled: false,
        });

        let errors = validate_config(&config).unwrap_err();
        let fields: Vec<&str> = errors.iter().map(|e| e.field.as_str()).collect();
        assert_eq!(
            fields,
            vec![
                "observability.log_level",
                "admin.bind_address",
                "admin.api_key",
                "access_logs[0].output",
                "access_logs[0].format",
            ]
        );
    }

    #[test]
    fn test_metrics_address_checked_only_when_enabled() {
        let mut config = SidecarConfig::default();
        config.observability.metrics_address = "nowhere".to_string();
        assert!(validate_config(&config).is_ok());

        config.observability.metrics_enabled = true;
        assert!(validate_config(&config).is_err());
    }
}
