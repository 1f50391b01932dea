//! # Lead-Relay Core
//!
//! Core business logic for the Lead-Relay webhook normalization service.
//!
//! This crate contains the domain logic for turning loosely-structured
//! checkout-platform webhook payloads (sale updates, contract updates,
//! checkout abandonment) into a fixed [`CanonicalRecord`], and for deriving
//! the task tag used to categorize leads in the external task store.
//!
//! ## Architecture
//!
//! Everything here is pure: no I/O, no shared mutable state. The pipeline is
//!
//! ```text
//! raw JSON body -> extract::unwrap_envelope -> extract::resolve (per field)
//!               -> Normalizer -> CanonicalRecord -> derive_tag
//! ```
//!
//! HTTP plumbing and the task-store client live in the `lead-relay-api` and
//! `taskboard-sdk` crates respectively.

use thiserror::Error;

pub mod event;
pub mod extract;
pub mod normalize;

pub use event::{WebhookEvent, WebhookKind, WebhookType};
pub use extract::{resolve, unwrap_envelope, FieldPath, FieldPathSet};
pub use normalize::{derive_tag, CanonicalRecord, Normalizer, NormalizerConfig, ProductFallback};

/// Standard result type for pipeline operations.
pub type PipelineResult<T> = Result<T, PipelineError>;

// ============================================================================
// Error Types
// ============================================================================

/// Top-level error for payload processing failures.
///
/// All coercion failures inside the normalizer degrade to `None` rather than
/// raising; errors are reserved for unusable envelopes and failed validation
/// of required fields or enumerated values.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// The transport envelope is malformed or does not contain a JSON object.
    #[error("invalid payload: {message}")]
    InvalidPayload { message: String },

    /// A required field or enumerated value failed validation.
    #[error("validation failed: {0}")]
    Validation(#[from] ValidationError),
}

/// Validation errors for required fields and enumerated values.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    /// One or more required canonical fields could not be resolved.
    #[error("missing required fields: {}", fields.join(", "))]
    MissingFields { fields: Vec<String> },

    /// The `type` field names an unsupported webhook type.
    #[error("unsupported webhook type: {value}")]
    UnsupportedType { value: String },

    /// The `event` field names an unsupported webhook event.
    #[error("unsupported webhook event: {value}")]
    UnsupportedEvent { value: String },

    /// The type/event combination is not one of the accepted pairings.
    #[error("event {event} is not valid for webhook type {webhook_type}")]
    EventTypeMismatch { webhook_type: String, event: String },

    /// `currentStatus` is not a recognized sale status.
    #[error("invalid sale status: {value}")]
    InvalidSaleStatus { value: String },

    /// `currentStatus` is not a recognized contract status.
    #[error("invalid contract status: {value}")]
    InvalidContractStatus { value: String },

    /// `product.type` is not TRANSACTION or SUBSCRIPTION.
    #[error("invalid product type: {value}")]
    InvalidProductType { value: String },

    /// `product.method` contains an unrecognized payment method.
    #[error("invalid payment method: {value}")]
    InvalidPaymentMethod { value: String },

    /// `lead.step` is not a known checkout step.
    #[error("invalid checkout step: {value}")]
    InvalidCheckoutStep { value: String },

    /// Action or product slug did not resolve, so no tag can be derived.
    #[error("could not determine a task tag for this payload")]
    UnresolvableTag,
}

#[cfg(test)]
#[path = "lib_tests.rs"]
mod tests;
