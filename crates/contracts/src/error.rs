//! Layered error definitions
//!
//! Categorized by source: config / data / model / presentation / display

use thiserror::Error;

/// Unified error type
#[derive(Debug, Error)]
pub enum TimingError {
    // ===== Configuration Errors =====
    /// Configuration parse error
    #[error("config parse error: {message}")]
    ConfigParse {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Configuration validation error
    #[error("config validation error at '{field}': {message}")]
    ConfigValidation { field: String, message: String },

    /// Component setup rejected (null collaborator, size below floor, ...)
    #[error("setup error for '{component}': {message}")]
    Setup { component: String, message: String },

    // ===== Data Errors =====
    /// Not enough samples for the requested operation
    #[error("insufficient data: have {have} samples, need {need}")]
    InsufficientData { have: usize, need: usize },

    /// A store was asked to bind a second upstream without detaching
    #[error("store '{store}' already bound to upstream '{upstream}'")]
    AlreadyBound { store: String, upstream: String },

    // ===== Model Errors =====
    /// The linear model has no successful fit to predict from
    #[error("model for '{client}' has no usable fit")]
    ModelNotReady { client: String },

    // ===== Synchronizer Errors =====
    /// Unknown data client name
    #[error("unknown data client: {name}")]
    UnknownClient { name: String },

    // ===== Presentation Errors =====
    /// Slide lookup failure
    #[error("no slide named '{name}'")]
    UnknownSlide { name: String },

    /// Slide presenter driven while not set up
    #[error("slide presenter not set up: {message}")]
    PresenterNotReady { message: String },

    // ===== Display Errors =====
    /// Swap call failed in the display backend
    #[error("display swap failed: {message}")]
    SwapFailed { message: String },

    /// Render call failed in the display backend
    #[error("display render failed: {message}")]
    RenderFailed { message: String },

    /// Fence operation failed in the display backend
    #[error("fence operation failed: {message}")]
    FenceFailed { message: String },

    // ===== General Errors =====
    /// A bounded wait expired
    #[error("timeout: condition not met within {waited_ms}ms")]
    Timeout { waited_ms: i64 },

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Other error
    #[error("{0}")]
    Other(String),
}

impl TimingError {
    /// Create configuration parse error
    pub fn config_parse(message: impl Into<String>) -> Self {
        Self::ConfigParse {
            message: message.into(),
            source: None,
        }
    }

    /// Create configuration validation error
    pub fn config_validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ConfigValidation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create component setup error
    pub fn setup(component: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Setup {
            component: component.into(),
            message: message.into(),
        }
    }

    /// Create swap failure error
    pub fn swap_failed(message: impl Into<String>) -> Self {
        Self::SwapFailed {
            message: message.into(),
        }
    }

    /// Create render failure error
    pub fn render_failed(message: impl Into<String>) -> Self {
        Self::RenderFailed {
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;

    #[test]
    fn test_display_messages() {
        let err = TimingError::InsufficientData { have: 2, need: 3 };
        assert_eq!(err.to_string(), "insufficient data: have 2 samples, need 3");

        let err = TimingError::config_validation("refresh_rate_hz", "must be positive");
        assert!(err.to_string().contains("refresh_rate_hz"));
    }

    #[test]
    fn test_model_not_ready_is_a_leaf_error() {
        let err = TimingError::ModelNotReady {
            client: "display".to_string(),
        };
        assert_eq!(err.to_string(), "model for 'display' has no usable fit");
        assert!(err.source().is_none());
    }

    #[test]
    fn test_config_parse_chains_its_cause() {
        let cause: Box<dyn Error + Send + Sync> =
            "unexpected token".to_string().into();
        let err = TimingError::ConfigParse {
            message: "bad toml".to_string(),
            source: Some(cause),
        };
        assert!(err.source().is_some());
    }
}
