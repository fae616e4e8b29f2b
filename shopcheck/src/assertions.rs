//! Response matchers. Nothing here panics on a malformed or partial body: every
//! failed expectation becomes a [`Mismatch`] describing the step and field.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use http::StatusCode;
use serde_json::Value;

use crate::client::ApiResponse;
use crate::error::Mismatch;

/// How a response field is compared with the value that was sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldMatch {
    /// JSON equality.
    Exact,
    /// The backend stores the value in upper case (coupon names).
    Uppercased,
    /// Numeric equality regardless of integer/float encoding.
    Number,
    /// Both sides parse to the same point in time (`2026-12-31` matches
    /// `2026-12-31T00:00:00.000Z`).
    SameInstant,
    /// Present and non-empty; the sent value is not compared.
    NonEmpty,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RequiredField {
    pub name: String,
    pub rule: FieldMatch,
}

impl RequiredField {
    pub fn new(name: &str, rule: FieldMatch) -> Self {
        Self {
            name: name.to_string(),
            rule,
        }
    }
}

pub fn expect_status(step: &str, resp: &ApiResponse, expected: StatusCode) -> Result<(), Mismatch> {
    if resp.status == expected {
        Ok(())
    } else {
        Err(Mismatch::status(step, &expected.to_string(), resp.status, &resp.body))
    }
}

pub fn expect_success(step: &str, resp: &ApiResponse) -> Result<(), Mismatch> {
    if resp.is_success() {
        Ok(())
    } else {
        Err(Mismatch::status(step, "a successful status", resp.status, &resp.body))
    }
}

/// Body parsed as a JSON object or array; `null`, scalars, and non-JSON fail.
pub fn expect_document(step: &str, resp: &ApiResponse) -> Result<Value, Mismatch> {
    match resp.json() {
        Some(v @ (Value::Object(_) | Value::Array(_))) => Ok(v),
        _ => Err(Mismatch::new(
            step,
            "a JSON document",
            crate::error::truncate(&resp.body),
        )),
    }
}

pub fn expect_array<'a>(step: &str, doc: &'a Value) -> Result<&'a Vec<Value>, Mismatch> {
    doc.as_array()
        .ok_or_else(|| Mismatch::new(step, "a JSON array", kind_of(doc)))
}

pub fn field<'a>(step: &str, body: &'a Value, name: &str) -> Result<&'a Value, Mismatch> {
    match body.get(name) {
        Some(v) if !v.is_null() => Ok(v),
        _ => Err(Mismatch::new(step, "field to be present", "missing").on_field(name)),
    }
}

/// Identity values are strings on this backend, but numbers are tolerated.
pub fn identity_of(body: &Value, identity_field: &str) -> Option<String> {
    match body.get(identity_field)? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

pub fn expect_identity(step: &str, body: &Value, identity_field: &str) -> Result<String, Mismatch> {
    identity_of(body, identity_field).ok_or_else(|| {
        Mismatch::new(step, "a non-empty identity", render(body.get(identity_field)))
            .on_field(identity_field)
    })
}

pub fn non_empty_string<'a>(step: &str, body: &'a Value, name: &str) -> Result<&'a str, Mismatch> {
    let v = field(step, body, name)?;
    match v.as_str() {
        Some(s) if !s.is_empty() => Ok(s),
        _ => Err(Mismatch::new(step, "a non-empty string", render(Some(v))).on_field(name)),
    }
}

pub fn check_field(
    step: &str,
    body: &Value,
    name: &str,
    sent: &Value,
    rule: FieldMatch,
) -> Result<(), Mismatch> {
    let actual = field(step, body, name)?;
    let ok = match rule {
        FieldMatch::Exact => actual == sent,
        FieldMatch::Uppercased => match (sent.as_str(), actual.as_str()) {
            (Some(s), Some(a)) => a == s.to_uppercase(),
            _ => false,
        },
        FieldMatch::Number => match (as_number(sent), as_number(actual)) {
            (Some(s), Some(a)) => (s - a).abs() < 1e-9,
            _ => false,
        },
        FieldMatch::SameInstant => {
            match (sent.as_str().and_then(parse_instant), actual.as_str().and_then(parse_instant)) {
                (Some(s), Some(a)) => s == a,
                _ => false,
            }
        }
        FieldMatch::NonEmpty => !is_blank(actual),
    };

    if ok {
        Ok(())
    } else {
        Err(Mismatch::new(step, describe_expected(sent, rule), render(Some(actual))).on_field(name))
    }
}

fn describe_expected(sent: &Value, rule: FieldMatch) -> String {
    match rule {
        FieldMatch::Exact => sent.to_string(),
        FieldMatch::Uppercased => match sent.as_str() {
            Some(s) => format!("\"{}\"", s.to_uppercase()),
            None => format!("upper-cased {}", sent),
        },
        FieldMatch::Number => format!("number {}", sent),
        FieldMatch::SameInstant => format!("the instant {}", sent),
        FieldMatch::NonEmpty => "a non-empty value".to_string(),
    }
}

fn as_number(v: &Value) -> Option<f64> {
    match v {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

fn is_blank(v: &Value) -> bool {
    match v {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        Value::Array(a) => a.is_empty(),
        Value::Object(o) => o.is_empty(),
        _ => false,
    }
}

fn kind_of(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

fn render(v: Option<&Value>) -> String {
    match v {
        None => "missing".to_string(),
        Some(v) => v.to_string(),
    }
}

/// Accepts RFC 3339, ISO 8601 without offset (read as UTC), and bare dates
/// (midnight UTC).
pub fn parse_instant(s: &str) -> Option<DateTime<Utc>> {
    let s = s.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f") {
        return Some(naive.and_utc());
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

fn timestamps(step: &str, body: &Value) -> Result<(String, String), Mismatch> {
    let created = non_empty_string(step, body, "createdAt")?;
    let updated = non_empty_string(step, body, "updatedAt")?;
    for (name, raw) in [("createdAt", created), ("updatedAt", updated)] {
        if parse_instant(raw).is_none() {
            return Err(Mismatch::new(step, "a valid date-time", format!("\"{}\"", raw)).on_field(name));
        }
    }
    Ok((created.to_string(), updated.to_string()))
}

/// Right after creation both timestamps are identical.
pub fn check_fresh_timestamps(step: &str, body: &Value) -> Result<(), Mismatch> {
    let (created, updated) = timestamps(step, body)?;
    if created == updated {
        Ok(())
    } else {
        Err(Mismatch::new(step, format!("\"{}\" (same as createdAt)", created), format!("\"{}\"", updated))
            .on_field("updatedAt"))
    }
}

/// After an update `updatedAt` has moved away from `createdAt`.
pub fn check_touched_timestamps(step: &str, body: &Value) -> Result<(), Mismatch> {
    let (created, updated) = timestamps(step, body)?;
    if created != updated {
        Ok(())
    } else {
        Err(Mismatch::new(step, "a value different from createdAt", format!("\"{}\"", updated))
            .on_field("updatedAt"))
    }
}

/// The ways this backend says "gone".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Absence {
    EmptyBody,
    NullLiteral,
    MissingFromListing,
}

/// Classifies a single-item read; `None` means the body still looks like a document.
pub fn absent_body(body: &str) -> Option<Absence> {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        Some(Absence::EmptyBody)
    } else if trimmed == "null" {
        Some(Absence::NullLiteral)
    } else {
        None
    }
}

pub fn listing_contains(listing: &[Value], identity_field: &str, id: &str) -> bool {
    listing
        .iter()
        .any(|item| identity_of(item, identity_field).as_deref() == Some(id))
}
