//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Check override keys name real levels
//! - Check the log filter parses
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: BridgeConfig → Result<(), Vec<ValidationError>>

use thiserror::Error;
use tracing_subscriber::EnvFilter;

use crate::appender::LogLevel;
use crate::config::schema::BridgeConfig;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("capture.exception_handling_overrides: unknown level '{0}'")]
    UnknownOverrideLevel(String),

    #[error("observability.log_level: invalid filter '{filter}': {reason}")]
    InvalidLogFilter { filter: String, reason: String },

    #[error("capture.source_prefix must not be empty")]
    EmptySourcePrefix,
}

pub fn validate_config(config: &BridgeConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    let mut keys: Vec<&String> = config.capture.exception_handling_overrides.keys().collect();
    keys.sort();
    for key in keys {
        if key.parse::<LogLevel>().is_err() {
            errors.push(ValidationError::UnknownOverrideLevel(key.clone()));
        }
    }

    if let Some(prefix) = &config.capture.source_prefix {
        if prefix.trim().is_empty() {
            errors.push(ValidationError::EmptySourcePrefix);
        }
    }

    if let Err(e) = EnvFilter::try_new(&config.observability.log_level) {
        errors.push(ValidationError::InvalidLogFilter {
            filter: config.observability.log_level.clone(),
            reason: e.to_string(),
        });
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
    use crate::exceptions::StrategyKind;

    #[test]
    fn test_default_config_is_valid() {
        assert!(validate_config(&BridgeConfig::default()).is_ok());
    }

    #[test]
    fn test_reports_every_error() {
        let mut config = BridgeConfig::default();
        config
            .capture
            .exception_handling_overrides
            .insert("loud".into(), StrategyKind::Discard);
        config
            .capture
            .exception_handling_overrides
            .insert("warning".into(), StrategyKind::Discard);
        config.capture.source_prefix = Some("  ".into());
        config.observability.log_level = "stdio_bridge=notalevel".into();

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 3);
        assert_eq!(errors[0], ValidationError::UnknownOverrideLevel("loud".into()));
        assert_eq!(errors[1], ValidationError::EmptySourcePrefix);
        assert!(matches!(errors[2], ValidationError::InvalidLogFilter { .. }));
    }
}
