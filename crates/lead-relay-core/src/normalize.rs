//! Field coercion and canonical-record assembly.
//!
//! Each per-field coercion is total: any value that cannot be coerced
//! degrades to `None` instead of raising. The [`Normalizer`] ties the
//! coercions to per-event-type path tables and to the status/product lookup
//! tables, producing a [`CanonicalRecord`].

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;
use unicode_normalization::{char::is_combining_mark, UnicodeNormalization};

use crate::extract::{resolve, FieldPathSet};
use crate::WebhookKind;

/// Action forced for checkout-abandonment events, bypassing status lookup.
pub const ABANDONED_ACTION: &str = "abandonada";

// ============================================================================
// Field path tables
// ============================================================================

/// Extraction path tables, keyed by event kind.
///
/// The data lives here instead of branching code so that schema-variant
/// priority stays reviewable in one place. Current-schema paths come first;
/// legacy aliases follow.
pub mod paths {
    use crate::extract::FieldPathSet;

    pub const SALE_NAME: FieldPathSet = &[
        &["client", "name"],
        &["nome"],
        &["name"],
        &["buyer", "name"],
        &["customer", "name"],
    ];
    pub const SALE_EMAIL: FieldPathSet = &[
        &["client", "email"],
        &["email"],
        &["buyer", "email"],
        &["customer", "email"],
    ];
    pub const SALE_PHONE: FieldPathSet = &[
        &["client", "cellphone"],
        &["telefone"],
        &["phone"],
        &["buyer", "phone"],
        &["client", "phone"],
        &["customer", "phone"],
    ];

    // Abandoned-checkout deliveries put the contact under `lead`; some
    // forwarders still mirror it under `client`, so that stays as a fallback.
    pub const LEAD_NAME: FieldPathSet = &[&["lead", "name"], &["client", "name"]];
    pub const LEAD_EMAIL: FieldPathSet = &[&["lead", "email"], &["client", "email"]];
    pub const LEAD_PHONE: FieldPathSet = &[&["lead", "cellphone"], &["client", "cellphone"]];

    pub const PRODUCT: FieldPathSet = &[
        &["product", "name"],
        &["produto"],
        &["product_name"],
        &["item", "name"],
        &["produto", "nome"],
        &["produto_nome"],
    ];

    // Status precedence is load-bearing: the embedded sale status beats the
    // root-level currentStatus, which beats oldStatus. Contract deliveries
    // carry the embedded sale under `currentSale`.
    pub const STATUS_SALE: FieldPathSet = &[&["sale", "status"], &["currentSale", "status"]];
    pub const STATUS_CURRENT: FieldPathSet =
        &[&["currentStatus"], &["current_status"], &["status"]];
    pub const STATUS_OLD: FieldPathSet = &[&["oldStatus"], &["old_status"]];

    pub const AMOUNT: FieldPathSet = &[
        &["sale", "amount"],
        &["currentSale", "amount"],
        &["valor"],
        &["value"],
        &["amount"],
        &["price"],
        &["purchase", "value"],
        &["purchase", "amount"],
        &["product", "amount"],
    ];
    pub const SELLER_BALANCE: FieldPathSet =
        &[&["sale", "seller_balance"], &["currentSale", "seller_balance"]];
    pub const DOCUMENT: FieldPathSet = &[&["client", "cpf_cnpj"]];
}

// ============================================================================
// NumericLike
// ============================================================================

/// Tagged union over the value shapes the upstream platform uses for one
/// logical numeric field (bare number, or text with `,` as the decimal
/// separator). One coercion per target type replaces the scattered
/// "is this a number or a string" branching of the historical handlers.
#[derive(Debug, Clone, PartialEq)]
pub enum NumericLike {
    Integer(i64),
    Float(f64),
    Text(String),
}

impl NumericLike {
    /// Classify a raw JSON value. Objects, arrays, booleans and nulls are
    /// not numeric-like and yield `None`.
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Some(Self::Integer(i))
                } else {
                    n.as_f64().map(Self::Float)
                }
            }
            Value::String(s) => Some(Self::Text(s.clone())),
            _ => None,
        }
    }

    /// Coerce to an integer amount, truncating toward zero.
    ///
    /// Text values tolerate `,` as the decimal separator (`"997,00"` → 997).
    pub fn as_truncated_int(&self) -> Option<i64> {
        match self {
            Self::Integer(i) => Some(*i),
            Self::Float(f) if f.is_finite() => Some(*f as i64),
            Self::Float(_) => None,
            Self::Text(s) => {
                let parsed: f64 = s.replace(',', ".").trim().parse().ok()?;
                parsed.is_finite().then_some(parsed as i64)
            }
        }
    }

    /// Coerce to a float, keeping fractional cents (settled amounts).
    pub fn as_float(&self) -> Option<f64> {
        match self {
            Self::Integer(i) => Some(*i as f64),
            Self::Float(f) if f.is_finite() => Some(*f),
            Self::Float(_) => None,
            Self::Text(s) => {
                let parsed: f64 = s.replace(',', ".").trim().parse().ok()?;
                parsed.is_finite().then_some(parsed)
            }
        }
    }
}

// ============================================================================
// Per-field coercions
// ============================================================================

/// Names and emails accept only strings; trimmed, empty-after-trim → `None`.
pub fn coerce_text(value: Option<&Value>) -> Option<String> {
    let trimmed = value?.as_str()?.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

/// Phones accept trimmed strings or stringified numbers; anything else → `None`.
pub fn coerce_phone(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(s) => {
            let trimmed = s.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_string())
        }
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Integer amount coercion (truncates toward zero).
pub fn coerce_amount(value: Option<&Value>) -> Option<i64> {
    NumericLike::from_value(value?)?.as_truncated_int()
}

/// Float amount coercion (settled value keeps its cents).
pub fn coerce_settled(value: Option<&Value>) -> Option<f64> {
    NumericLike::from_value(value?)?.as_float()
}

/// Derive the product slug for a name missing from the lookup table:
/// trim, lowercase, spaces to hyphens, diacritics stripped (NFD, combining
/// marks dropped).
pub fn slugify(raw: &str) -> String {
    raw.trim()
        .to_lowercase()
        .replace(' ', "-")
        .nfd()
        .filter(|c| !is_combining_mark(*c))
        .collect()
}

/// Compose the task tag. Strict by design: both halves must have resolved.
pub fn derive_tag(action: Option<&str>, product: Option<&str>) -> Option<String> {
    match (action, product) {
        (Some(action), Some(product)) => Some(format!("{}-{}", action, product)),
        _ => None,
    }
}

// ============================================================================
// Canonical record
// ============================================================================

/// Normalized, typed output of the extraction pipeline.
///
/// Serialized field names are the wire contract consumed by downstream
/// marketing automations and must not change.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CanonicalRecord {
    #[serde(rename = "nome")]
    pub name: Option<String>,
    pub email: Option<String>,
    #[serde(rename = "telefone")]
    pub phone: Option<String>,
    #[serde(rename = "produto")]
    pub product: Option<String>,
    #[serde(rename = "acao")]
    pub action: Option<String>,
    pub tag: Option<String>,
    #[serde(rename = "idproduto")]
    pub product_id: Option<String>,
    #[serde(rename = "valor")]
    pub amount: Option<i64>,
    #[serde(rename = "liquidado")]
    pub settled_amount: Option<f64>,
}

impl CanonicalRecord {
    /// Names of the required reconciliation fields that are absent.
    ///
    /// Name and email are the minimum for task creation; email doubles as
    /// the reconciliation key against the task store.
    pub fn missing_required(&self) -> Vec<String> {
        let mut missing = Vec::new();
        if self.name.is_none() {
            missing.push("nome".to_string());
        }
        if self.email.is_none() {
            missing.push("email".to_string());
        }
        missing
    }
}

// ============================================================================
// Normalizer
// ============================================================================

/// Policy for product names missing from the lookup table.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProductFallback {
    /// Unknown product names yield a null slug (strict deployments).
    Null,
    /// Unknown product names are slugified from the raw name.
    #[default]
    Slugify,
}

/// Immutable lookup tables and policies injected into the [`Normalizer`].
#[derive(Debug, Clone)]
pub struct NormalizerConfig {
    /// Raw product name → canonical slug (exact match).
    pub product_table: HashMap<String, String>,
    /// Lower-cased platform status → action label.
    pub status_table: HashMap<String, String>,
    /// What to do when a product name misses the table.
    pub product_fallback: ProductFallback,
}

impl Default for NormalizerConfig {
    fn default() -> Self {
        let product_table = [
            ("Mentoria Black", "mentoria-black"),
            ("Implementação Bravy", "implementacao-bravy"),
            ("Bravy Club", "bravy-club"),
            ("Floow PRO", "floow-pro"),
            ("Bravy Black", "bravy-black"),
            ("ClickUp Pro", "clickup-pro"),
            ("Club+Floow", "club+floow"),
            ("ClickUp Start", "clickup-start"),
            ("CRM Automatizado", "crm-automatizado"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

        let status_table = [
            ("waiting_payment", "aguardando-pagamento"),
            ("paid", "comprador"),
            ("refused", "recusada"),
            ("refunded", "reembolsada"),
            ("chargedback", "chargeback"),
            ("abandoned", ABANDONED_ACTION),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

        Self {
            product_table,
            status_table,
            product_fallback: ProductFallback::default(),
        }
    }
}

/// The consolidated field normalizer.
///
/// One instance serves every event type; variant behavior is driven by the
/// path tables in [`paths`] and the injected [`NormalizerConfig`], not by
/// per-handler code.
#[derive(Debug, Clone, Default)]
pub struct Normalizer {
    config: NormalizerConfig,
}

impl Normalizer {
    pub fn new(config: NormalizerConfig) -> Self {
        Self { config }
    }

    /// Run the full extraction pipeline over an unwrapped payload object.
    ///
    /// Total: every coercion failure degrades to a null field. Callers that
    /// require specific fields validate the returned record themselves.
    pub fn normalize(&self, payload: &Map<String, Value>) -> CanonicalRecord {
        let kind = WebhookKind::classify_lenient(payload);
        let data = Value::Object(payload.clone());

        let (name_paths, email_paths, phone_paths) = match kind {
            WebhookKind::CheckoutAbandoned => {
                (paths::LEAD_NAME, paths::LEAD_EMAIL, paths::LEAD_PHONE)
            }
            _ => (paths::SALE_NAME, paths::SALE_EMAIL, paths::SALE_PHONE),
        };

        let name = coerce_text(resolve(&data, name_paths));
        let email = coerce_text(resolve(&data, email_paths));
        let phone = coerce_phone(resolve(&data, phone_paths));

        let product = self.resolve_product(&data);
        let action = self.resolve_action(&data, kind);
        let tag = derive_tag(action.as_deref(), product.as_deref());
        let amount = coerce_amount(resolve(&data, paths::AMOUNT));

        // Settled value only exists for completed purchases.
        let settled_amount = if action.as_deref() == Some("comprador") {
            coerce_settled(resolve(&data, paths::SELLER_BALANCE))
        } else {
            None
        };

        debug!(
            kind = ?kind,
            email = email.as_deref().unwrap_or("<none>"),
            tag = tag.as_deref().unwrap_or("<none>"),
            "normalized webhook payload"
        );

        CanonicalRecord {
            name,
            email,
            phone,
            product,
            action,
            product_id: tag.clone(),
            tag,
            amount,
            settled_amount,
        }
    }

    /// Map the raw product name through the table, applying the configured
    /// miss policy.
    fn resolve_product(&self, data: &Value) -> Option<String> {
        let raw = resolve(data, paths::PRODUCT)?.as_str()?.trim();
        if raw.is_empty() {
            return None;
        }
        match self.config.product_table.get(raw) {
            Some(slug) => Some(slug.clone()),
            None => match self.config.product_fallback {
                ProductFallback::Null => None,
                ProductFallback::Slugify => Some(slugify(raw)),
            },
        }
    }

    /// Resolve the action label. Checkout abandonment wins unconditionally;
    /// otherwise the first status along the precedence chain is looked up
    /// case-insensitively, and an unknown status yields no action.
    fn resolve_action(&self, data: &Value, kind: WebhookKind) -> Option<String> {
        if kind == WebhookKind::CheckoutAbandoned {
            return Some(ABANDONED_ACTION.to_string());
        }

        let status = resolve(data, paths::STATUS_SALE)
            .or_else(|| resolve(data, paths::STATUS_CURRENT))
            .or_else(|| resolve(data, paths::STATUS_OLD))?
            .as_str()?;

        self.config.status_table.get(&status.to_lowercase()).cloned()
    }
}

#[cfg(test)]
#[path = "normalize_tests.rs"]
mod tests;
