//! Transport-envelope unwrapping and multi-path field resolution.
//!
//! Webhook deliveries arrive in several historical shapes: a bare JSON
//! object, an array whose first element wraps the real payload under a
//! `body` key (the forwarder format, which may also carry the original
//! request headers), or an array whose first element *is* the payload.
//! [`unwrap_envelope`] collapses all of them into one object.
//!
//! Field extraction never fails: [`resolve`] walks an ordered list of key
//! paths and returns the first non-null hit, treating absence as a value.

use serde_json::{Map, Value};

use crate::PipelineError;

/// One traversal route into a nested payload, as an ordered key sequence.
pub type FieldPath = &'static [&'static str];

/// An ordered set of [`FieldPath`]s, tried in order; first hit wins.
///
/// The ordering encodes schema-variant priority (current schema first,
/// legacy aliases after) and is load-bearing: reordering a set changes
/// which historical payload shape wins a tie.
pub type FieldPathSet = &'static [FieldPath];

/// Resolve a field by trying each path in `paths`, in order.
///
/// A traversal aborts (yields nothing) as soon as an intermediate value is
/// not an object or a key is missing; an explicit JSON `null` terminal is
/// treated the same as absence. The value at the first path whose full
/// traversal succeeds is returned.
///
/// Empty strings and `0` are *hits*, not misses; emptiness checks belong
/// to the per-field coercions downstream.
pub fn resolve<'a>(data: &'a Value, paths: FieldPathSet) -> Option<&'a Value> {
    for path in paths {
        if let Some(value) = resolve_one(data, path) {
            return Some(value);
        }
    }
    None
}

fn resolve_one<'a>(data: &'a Value, path: FieldPath) -> Option<&'a Value> {
    let mut current = data;
    for key in path {
        current = current.as_object()?.get(*key)?;
        if current.is_null() {
            return None;
        }
    }
    Some(current)
}

/// Normalize the transport envelope down to the payload object.
///
/// Contract:
/// - an object is returned unchanged;
/// - a non-empty array yields element 0's `body` value when element 0 is an
///   object carrying a `body` key, otherwise element 0 itself;
/// - an empty array, a scalar, or a result that is not an object fails with
///   [`PipelineError::InvalidPayload`].
pub fn unwrap_envelope(raw: &Value) -> Result<&Map<String, Value>, PipelineError> {
    let candidate = match raw {
        Value::Object(_) => raw,
        Value::Array(items) => {
            let first = items.first().ok_or_else(|| PipelineError::InvalidPayload {
                message: "payload array is empty".to_string(),
            })?;
            match first.as_object().and_then(|obj| obj.get("body")) {
                Some(body) => body,
                None => first,
            }
        }
        _ => {
            return Err(PipelineError::InvalidPayload {
                message: "payload must be a JSON object or a non-empty array".to_string(),
            })
        }
    };

    candidate.as_object().ok_or_else(|| PipelineError::InvalidPayload {
        message: "unwrapped payload is not a JSON object".to_string(),
    })
}

/// Extract the forwarded credential from an array envelope, if present.
///
/// Forwarders that wrap the payload under `body` also copy the original
/// request headers alongside it; the task-store token travels in
/// `x-webhook-token`. Bare-object deliveries never carry one.
pub fn envelope_token(raw: &Value) -> Option<&str> {
    raw.as_array()?
        .first()?
        .as_object()?
        .get("headers")?
        .as_object()?
        .get("x-webhook-token")?
        .as_str()
}

#[cfg(test)]
#[path = "extract_tests.rs"]
mod tests;
