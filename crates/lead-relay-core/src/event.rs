//! Webhook classification and per-event validation.
//!
//! The checkout platform delivers three webhook families, each with a fixed
//! type/event pairing:
//!
//! | `type`     | `event`             |
//! |------------|---------------------|
//! | `sale`     | `saleUpdated`       |
//! | `contract` | `contractUpdated`   |
//! | `lead`     | `checkoutAbandoned` |
//!
//! The task-reconciliation flow classifies strictly (unknown types, events
//! or mismatched pairings are rejected); the pure-normalization flow only
//! needs to know whether the delivery is a checkout abandonment.

use serde_json::{Map, Value};

use crate::extract::resolve;
use crate::ValidationError;

const SALE_STATUSES: &[&str] = &[
    "created",
    "paid",
    "waiting_payment",
    "refused",
    "refunded",
    "chargedback",
];

const CONTRACT_STATUSES: &[&str] = &[
    "created",
    "paid",
    "trialing",
    "pending_payment",
    "unpaid",
    "canceled",
];

const PRODUCT_TYPES: &[&str] = &["TRANSACTION", "SUBSCRIPTION"];

const PAYMENT_METHODS: &[&str] = &["CREDIT_CARD", "TWO_CREDIT_CARDS", "BOLETO", "PIX", "PAYPAL"];

/// Checkout steps the platform reports for abandonment events
/// (1: personal data, 2: address, 3: payment).
const CHECKOUT_STEPS: &[i64] = &[1, 2, 3];

// ============================================================================
// Classification
// ============================================================================

/// Supported webhook types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WebhookType {
    Sale,
    Contract,
    Lead,
}

impl WebhookType {
    pub fn parse(value: &str) -> Result<Self, ValidationError> {
        match value {
            "sale" => Ok(Self::Sale),
            "contract" => Ok(Self::Contract),
            "lead" => Ok(Self::Lead),
            other => Err(ValidationError::UnsupportedType {
                value: other.to_string(),
            }),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Sale => "sale",
            Self::Contract => "contract",
            Self::Lead => "lead",
        }
    }
}

/// Supported webhook events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WebhookEvent {
    SaleUpdated,
    ContractUpdated,
    CheckoutAbandoned,
}

impl WebhookEvent {
    pub fn parse(value: &str) -> Result<Self, ValidationError> {
        match value {
            "saleUpdated" => Ok(Self::SaleUpdated),
            "contractUpdated" => Ok(Self::ContractUpdated),
            "checkoutAbandoned" => Ok(Self::CheckoutAbandoned),
            other => Err(ValidationError::UnsupportedEvent {
                value: other.to_string(),
            }),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SaleUpdated => "saleUpdated",
            Self::ContractUpdated => "contractUpdated",
            Self::CheckoutAbandoned => "checkoutAbandoned",
        }
    }
}

/// A validated type/event pairing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WebhookKind {
    Sale,
    Contract,
    CheckoutAbandoned,
}

impl WebhookKind {
    /// Strict classification for the task-reconciliation flow.
    ///
    /// Rejects unknown types, unknown events, and pairings that do not
    /// match the table in the module docs.
    pub fn classify(payload: &Map<String, Value>) -> Result<Self, ValidationError> {
        let raw_type = payload.get("type").and_then(Value::as_str).unwrap_or("");
        let raw_event = payload.get("event").and_then(Value::as_str).unwrap_or("");

        let webhook_type = WebhookType::parse(raw_type)?;
        let event = WebhookEvent::parse(raw_event)?;

        match (webhook_type, event) {
            (WebhookType::Sale, WebhookEvent::SaleUpdated) => Ok(Self::Sale),
            (WebhookType::Contract, WebhookEvent::ContractUpdated) => Ok(Self::Contract),
            (WebhookType::Lead, WebhookEvent::CheckoutAbandoned) => Ok(Self::CheckoutAbandoned),
            _ => Err(ValidationError::EventTypeMismatch {
                webhook_type: raw_type.to_string(),
                event: raw_event.to_string(),
            }),
        }
    }

    /// Lenient classification for the pure-normalization flow: anything
    /// that is not a checkout abandonment is treated as a sale-shaped
    /// delivery and extracted with the default path tables.
    pub fn classify_lenient(payload: &Map<String, Value>) -> Self {
        let is_abandoned = payload.get("type").and_then(Value::as_str) == Some("lead")
            && payload.get("event").and_then(Value::as_str) == Some("checkoutAbandoned");
        if is_abandoned {
            Self::CheckoutAbandoned
        } else if payload.get("type").and_then(Value::as_str) == Some("contract") {
            Self::Contract
        } else {
            Self::Sale
        }
    }

    pub fn webhook_type(&self) -> WebhookType {
        match self {
            Self::Sale => WebhookType::Sale,
            Self::Contract => WebhookType::Contract,
            Self::CheckoutAbandoned => WebhookType::Lead,
        }
    }

    pub fn event(&self) -> WebhookEvent {
        match self {
            Self::Sale => WebhookEvent::SaleUpdated,
            Self::Contract => WebhookEvent::ContractUpdated,
            Self::CheckoutAbandoned => WebhookEvent::CheckoutAbandoned,
        }
    }
}

// ============================================================================
// Payment metadata
// ============================================================================

/// Flags and card brand carried in the `saleMetas` key/value array.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PaymentMetadata {
    pub brand: Option<String>,
    pub reuse_credit_card: bool,
    pub assoc_ticket: bool,
}

impl PaymentMetadata {
    /// Extract from the `saleMetas` array; entries are objects with
    /// `meta_key`/`meta_value` string pairs, boolean flags encoded as "1".
    pub fn from_sale_metas(metas: Option<&Value>) -> Self {
        let mut metadata = Self::default();
        let Some(entries) = metas.and_then(Value::as_array) else {
            return metadata;
        };

        for entry in entries {
            let key = entry.get("meta_key").and_then(Value::as_str);
            let value = entry.get("meta_value").and_then(Value::as_str);
            match (key, value) {
                (Some("brand"), Some(v)) => metadata.brand = Some(v.to_string()),
                (Some("reuse_credit_card"), Some(v)) => metadata.reuse_credit_card = v == "1",
                (Some("assoc_ticket"), Some(v)) => metadata.assoc_ticket = v == "1",
                _ => {}
            }
        }

        metadata
    }
}

/// Render a coupon object (`{name, type, amount}`) as the display string
/// stored in the task's coupon custom field.
pub fn format_coupon(coupon: Option<&Value>) -> Option<String> {
    let coupon = coupon?.as_object()?;
    let name = coupon.get("name").and_then(Value::as_str)?;
    let kind = coupon.get("type").and_then(Value::as_str).unwrap_or("?");
    let amount = coupon.get("amount").map(render_scalar).unwrap_or_default();
    Some(format!("{} ({}: {})", name, kind, amount))
}

fn render_scalar(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

// ============================================================================
// Per-kind validation
// ============================================================================

/// Sale-specific fields pulled out during validation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SaleDetails {
    pub current_status: String,
    pub payment_method: Option<String>,
    pub payment_brand: Option<String>,
    pub document: Option<String>,
    pub coupon: Option<String>,
}

/// Contract-specific fields pulled out during validation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ContractDetails {
    pub current_status: String,
    pub start_date: Option<String>,
    pub period_end: Option<String>,
    pub coupon: Option<String>,
    pub document: Option<String>,
}

/// Abandonment-specific fields pulled out during validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AbandonmentDetails {
    pub checkout_step: i64,
}

/// Validate a sale delivery: known `currentStatus`, and, when present,
/// known `product.type` and `product.method`. Payment brand comes from the
/// sale metadata, the effective payment method from `sale.method`.
pub fn validate_sale(payload: &Map<String, Value>) -> Result<SaleDetails, ValidationError> {
    let data = Value::Object(payload.clone());

    let current_status = payload
        .get("currentStatus")
        .and_then(Value::as_str)
        .unwrap_or("");
    if !SALE_STATUSES.contains(&current_status) {
        return Err(ValidationError::InvalidSaleStatus {
            value: current_status.to_string(),
        });
    }

    if let Some(product_type) = resolve(&data, &[&["product", "type"]]).and_then(Value::as_str) {
        if !PRODUCT_TYPES.contains(&product_type) {
            return Err(ValidationError::InvalidProductType {
                value: product_type.to_string(),
            });
        }
    }

    if let Some(methods) = resolve(&data, &[&["product", "method"]]).and_then(Value::as_str) {
        let all_known = methods
            .split(',')
            .all(|method| PAYMENT_METHODS.contains(&method.trim()));
        if !all_known {
            return Err(ValidationError::InvalidPaymentMethod {
                value: methods.to_string(),
            });
        }
    }

    let metadata = PaymentMetadata::from_sale_metas(payload.get("saleMetas"));

    Ok(SaleDetails {
        current_status: current_status.to_string(),
        payment_method: resolve(&data, &[&["sale", "method"]])
            .and_then(Value::as_str)
            .map(String::from),
        payment_brand: metadata.brand,
        document: resolve(&data, super::normalize::paths::DOCUMENT)
            .and_then(Value::as_str)
            .map(String::from),
        coupon: format_coupon(resolve(&data, &[&["sale", "coupon"]])),
    })
}

/// Validate a contract delivery: known contract `currentStatus`; billing
/// period bounds and the coupon travel along for the task record.
pub fn validate_contract(payload: &Map<String, Value>) -> Result<ContractDetails, ValidationError> {
    let data = Value::Object(payload.clone());

    let current_status = payload
        .get("currentStatus")
        .and_then(Value::as_str)
        .unwrap_or("");
    if !CONTRACT_STATUSES.contains(&current_status) {
        return Err(ValidationError::InvalidContractStatus {
            value: current_status.to_string(),
        });
    }

    Ok(ContractDetails {
        current_status: current_status.to_string(),
        start_date: resolve(&data, &[&["contract", "start_date"]])
            .and_then(Value::as_str)
            .map(String::from),
        period_end: resolve(&data, &[&["contract", "current_period_end"]])
            .and_then(Value::as_str)
            .map(String::from),
        coupon: format_coupon(resolve(&data, &[&["currentSale", "coupon"]])),
        document: resolve(&data, super::normalize::paths::DOCUMENT)
            .and_then(Value::as_str)
            .map(String::from),
    })
}

/// Validate a checkout-abandonment delivery: `lead.step` must be one of the
/// known steps, accepted as an integer or a numeric string.
pub fn validate_abandonment(
    payload: &Map<String, Value>,
) -> Result<AbandonmentDetails, ValidationError> {
    let data = Value::Object(payload.clone());
    let raw_step = resolve(&data, &[&["lead", "step"]]);

    let step = match raw_step {
        Some(Value::Number(n)) => n.as_i64(),
        Some(Value::String(s)) => s.trim().parse::<i64>().ok(),
        _ => None,
    };

    match step {
        Some(step) if CHECKOUT_STEPS.contains(&step) => Ok(AbandonmentDetails {
            checkout_step: step,
        }),
        _ => Err(ValidationError::InvalidCheckoutStep {
            value: raw_step.map(render_scalar).unwrap_or_else(|| "<missing>".to_string()),
        }),
    }
}

#[cfg(test)]
#[path = "event_tests.rs"]
mod tests;
