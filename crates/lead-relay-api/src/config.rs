//! Configuration types for the HTTP service.

use std::collections::HashMap;

use lead_relay_core::normalize::NormalizerConfig;
use lead_relay_core::ProductFallback;
use serde::{Deserialize, Serialize};

/// Service configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ServiceConfig {
    /// HTTP server settings
    pub server: ServerConfig,

    /// Task-board integration settings
    pub taskboard: TaskboardConfig,

    /// Normalization pipeline settings
    pub normalizer: NormalizerSettings,

    /// Logging configuration
    pub logging: LoggingConfig,
}

impl ServiceConfig {
    /// Check that the configuration is complete enough to serve traffic.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.taskboard.list_id.trim().is_empty() {
            return Err(ConfigError::Missing {
                key: "taskboard.list_id".to_string(),
            });
        }
        if self.taskboard.email_field_id.trim().is_empty() {
            return Err(ConfigError::Missing {
                key: "taskboard.email_field_id".to_string(),
            });
        }
        if !self.taskboard.task_name_template.contains("{name}") {
            return Err(ConfigError::Invalid {
                message: "taskboard.task_name_template must contain the {name} placeholder"
                    .to_string(),
            });
        }
        if self.server.port == 0 {
            return Err(ConfigError::Invalid {
                message: "server.port must be non-zero".to_string(),
            });
        }
        Ok(())
    }
}

/// HTTP server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Host to bind to
    pub host: String,

    /// Port to listen on
    pub port: u16,

    /// Request timeout in seconds
    pub timeout_seconds: u64,

    /// Graceful shutdown timeout in seconds
    pub shutdown_timeout_seconds: u64,

    /// Enable CORS
    pub enable_cors: bool,

    /// Enable compression
    pub enable_compression: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            timeout_seconds: 30,
            shutdown_timeout_seconds: 30,
            enable_cors: true,
            enable_compression: true,
        }
    }
}

/// Task-board integration configuration.
///
/// The custom-field identifiers are the board's own IDs for the fields a
/// lead task carries. Only the email field is required (it is the
/// reconciliation key); the others are written when both the ID and the
/// value are present.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskboardConfig {
    /// Task-board API base URL
    pub api_url: String,

    /// List that holds the lead tasks
    pub list_id: String,

    /// Fallback bearer token when the delivery carries none
    pub api_token: Option<String>,

    /// Task title template; `{name}` is replaced with the lead's name
    pub task_name_template: String,

    /// Custom field holding the lead's email (reconciliation key)
    pub email_field_id: String,

    /// Custom field for the lead's phone
    pub phone_field_id: Option<String>,

    /// Custom field for the purchase amount
    pub amount_field_id: Option<String>,

    /// Custom field for the lead's tax document
    pub document_field_id: Option<String>,

    /// Custom field for the payment method
    pub payment_method_field_id: Option<String>,

    /// Custom field for the card brand
    pub payment_brand_field_id: Option<String>,

    /// Custom field for the coupon description
    pub coupon_field_id: Option<String>,
}

impl Default for TaskboardConfig {
    fn default() -> Self {
        Self {
            api_url: "https://api.clickup.com/api/v2".to_string(),
            list_id: String::new(),
            api_token: None,
            task_name_template: "[Lead] {name}".to_string(),
            email_field_id: String::new(),
            phone_field_id: None,
            amount_field_id: None,
            document_field_id: None,
            payment_method_field_id: None,
            payment_brand_field_id: None,
            coupon_field_id: None,
        }
    }
}

/// Normalization pipeline settings.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct NormalizerSettings {
    /// Policy for product names missing from the lookup table
    pub product_fallback: ProductFallback,

    /// Extra product-name-to-slug entries layered over the built-in table
    #[serde(default)]
    pub product_overrides: HashMap<String, String>,
}

impl NormalizerSettings {
    /// Materialize the pipeline configuration: built-in tables plus the
    /// deployment's overrides.
    pub fn to_normalizer_config(&self) -> NormalizerConfig {
        let mut config = NormalizerConfig {
            product_fallback: self.product_fallback,
            ..NormalizerConfig::default()
        };
        for (name, slug) in &self.product_overrides {
            config.product_table.insert(name.clone(), slug.clone());
        }
        config
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Logging level
    pub level: String,

    /// Enable JSON structured logging
    pub json_format: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json_format: false,
        }
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid configuration: {message}")]
    Invalid { message: String },

    #[error("Missing required configuration: {key}")]
    Missing { key: String },
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
