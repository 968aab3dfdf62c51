//! Input hashing
//!
//! Content-addresses a normalized generation request so that the same logical
//! request always maps to the same idempotency key, across processes and over
//! time. Changing any normalization rule here invalidates prior hashes by
//! design; that is cache versioning, not a bug.

use serde_json::{Map, Value};
use sha2::{Digest, Sha256};

use crate::domain::job::JobKind;

/// Decimal places kept when canonicalizing numbers. Six places is roughly
/// 0.1 m of latitude, enough to absorb geocoding jitter without collapsing
/// distinct birthplaces.
const NUMBER_PRECISION: f64 = 1e6;

/// Produce a normalized payload for a job kind from a raw input object.
///
/// Rules:
/// - the payload carries exactly the kind's known fields; absent fields are
///   included as null rather than omitted, so "absent" and "null" hash alike
/// - unknown extra fields are dropped
/// - date fields are reduced to calendar-date strings
/// - numbers are rounded, object keys end up sorted (see [`canonicalize`])
pub fn normalize(kind: JobKind, raw: &Value) -> Value {
    let mut out = Map::new();
    for field in payload_fields(kind) {
        let mut value = raw.get(*field).cloned().unwrap_or(Value::Null);
        if is_date_field(field) {
            if let Value::String(s) = &value {
                value = Value::String(date_only(s).to_string());
            }
        }
        out.insert((*field).to_string(), canonicalize(&value));
    }
    Value::Object(out)
}

/// Compute the idempotency key for a normalized request.
pub fn input_hash(kind: JobKind, locale: &str, payload: &Value) -> String {
    let canonical = canonicalize(payload);
    let mut hasher = Sha256::new();
    hasher.update(kind.as_str().as_bytes());
    hasher.update(b"\n");
    hasher.update(locale.as_bytes());
    hasher.update(b"\n");
    hasher.update(canonical.to_string().as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Rebuild a JSON value in canonical form: object keys sorted recursively
/// (serde_json's default map is ordered), floating-point numbers rounded to
/// a fixed precision.
pub fn canonicalize(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut out = Map::new();
            for (k, v) in map {
                out.insert(k.clone(), canonicalize(v));
            }
            Value::Object(out)
        }
        Value::Array(items) => Value::Array(items.iter().map(canonicalize).collect()),
        Value::Number(n) => {
            if n.is_f64() {
                let rounded = (n.as_f64().unwrap_or(0.0) * NUMBER_PRECISION).round()
                    / NUMBER_PRECISION;
                serde_json::Number::from_f64(rounded)
                    .map(Value::Number)
                    .unwrap_or(Value::Null)
            } else {
                Value::Number(n.clone())
            }
        }
        other => other.clone(),
    }
}

/// The known payload fields for each job kind. Normalization projects raw
/// input onto exactly this set.
fn payload_fields(kind: JobKind) -> &'static [&'static str] {
    match kind {
        JobKind::DailyGuidance => &["local_date", "timezone"],
        JobKind::NatalChartBasic | JobKind::NatalChartExtended => &[
            "birth_date",
            "birth_time",
            "latitude",
            "longitude",
            "house_system",
        ],
        JobKind::KarmicReading => &["birth_date", "birth_time", "latitude", "longitude"],
        JobKind::OneTimeReport => &[
            "report_type",
            "birth_date",
            "birth_time",
            "latitude",
            "longitude",
            "partner_birth_date",
            "partner_birth_time",
            "partner_latitude",
            "partner_longitude",
        ],
    }
}

fn is_date_field(field: &str) -> bool {
    matches!(field, "birth_date" | "partner_birth_date" | "local_date")
}

/// Reduce a date-time string to its calendar-date prefix. Time-of-day is not
/// semantically relevant for date fields, so "1990-04-12T08:30:00Z" and
/// "1990-04-12" must hash identically.
fn date_only(s: &str) -> &str {
    if s.len() > 10 && s.as_bytes().get(10) == Some(&b'T') {
        &s[..10]
    } else {
        s
    }
}
