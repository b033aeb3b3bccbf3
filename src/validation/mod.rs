//! Declarative field validation for record payloads.
//!
//! A [`Schema`] is a list of [`FieldRule`]s. Validation is pure: the payload
//! is either rejected with the violated fields, or accepted and returned cast
//! to the canonical form of each field kind (numeric strings become numbers,
//! epoch milliseconds become RFC 3339 timestamps). The cast payload is what
//! gets persisted.

pub mod schemas;

use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, TimeZone, Utc};
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::HashMap;

/// Scalar type a field must hold
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldKind {
    String,
    Number,
    Integer,
    Boolean,
    Date,
}

impl FieldKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FieldKind::String => "string",
            FieldKind::Number => "number",
            FieldKind::Integer => "integer",
            FieldKind::Boolean => "boolean",
            FieldKind::Date => "date",
        }
    }

    /// Cast `value` to this kind, or `None` when it cannot be. Numeric
    /// strings pass as numbers, scalars pass as strings.
    pub fn cast(&self, value: &Value) -> Option<Value> {
        match self {
            FieldKind::String => match value {
                Value::String(_) => Some(value.clone()),
                Value::Number(n) => Some(Value::String(n.to_string())),
                Value::Bool(b) => Some(Value::String(b.to_string())),
                _ => None,
            },
            FieldKind::Number => match value {
                Value::Number(_) => Some(value.clone()),
                _ => as_number(value).and_then(number_value),
            },
            FieldKind::Integer => {
                let n = as_number(value)?;
                if n.fract() != 0.0 || n < i64::MIN as f64 || n > i64::MAX as f64 {
                    return None;
                }
                Some(Value::from(n as i64))
            }
            FieldKind::Boolean => match value {
                Value::Bool(_) => Some(value.clone()),
                Value::String(s) if s == "true" => Some(Value::Bool(true)),
                Value::String(s) if s == "false" => Some(Value::Bool(false)),
                _ => None,
            },
            FieldKind::Date => cast_date(value),
        }
    }
}

/// Presence constraint of a field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Presence {
    /// Must be present and non-null
    Required,
    /// May be absent, but not null
    Optional,
    /// May be absent or null
    Nullable,
}

#[derive(Debug, Clone, Serialize)]
pub struct FieldRule {
    pub name: String,
    pub kind: FieldKind,
    pub presence: Presence,
}

impl FieldRule {
    pub fn new(name: impl Into<String>, kind: FieldKind) -> Self {
        Self {
            name: name.into(),
            kind,
            presence: Presence::Optional,
        }
    }

    pub fn string(name: impl Into<String>) -> Self {
        Self::new(name, FieldKind::String)
    }

    pub fn number(name: impl Into<String>) -> Self {
        Self::new(name, FieldKind::Number)
    }

    pub fn integer(name: impl Into<String>) -> Self {
        Self::new(name, FieldKind::Integer)
    }

    pub fn boolean(name: impl Into<String>) -> Self {
        Self::new(name, FieldKind::Boolean)
    }

    pub fn date(name: impl Into<String>) -> Self {
        Self::new(name, FieldKind::Date)
    }

    pub fn required(mut self) -> Self {
        self.presence = Presence::Required;
        self
    }

    pub fn nullable(mut self) -> Self {
        self.presence = Presence::Nullable;
        self
    }

    /// Check one field: `Ok(None)` when absent, `Ok(Some(cast))` when
    /// acceptable, `Err(reason)` otherwise
    fn check(&self, value: Option<&Value>) -> Result<Option<Value>, String> {
        match (value, self.presence) {
            (None, Presence::Required) | (Some(Value::Null), Presence::Required) => {
                Err(format!("{} is a required field", self.name))
            }
            (None, _) => Ok(None),
            (Some(Value::Null), Presence::Nullable) => Ok(Some(Value::Null)),
            (Some(Value::Null), Presence::Optional) => Err(format!("{} cannot be null", self.name)),
            (Some(v), _) => self.kind.cast(v).map(Some).ok_or_else(|| {
                format!(
                    "{} must be a `{}` type, but the final value was: `{}`",
                    self.name,
                    self.kind.as_str(),
                    v
                )
            }),
        }
    }
}

/// Whether validation stops at the first violation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ValidationMode {
    #[default]
    CollectAll,
    FailFast,
}

impl ValidationMode {
    pub fn from_abort_early(abort_early: bool) -> Self {
        if abort_early {
            ValidationMode::FailFast
        } else {
            ValidationMode::CollectAll
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Violation {
    pub field: String,
    pub reason: String,
}

/// One or more violated fields
#[derive(Debug, Clone)]
pub struct ValidationError {
    pub violations: Vec<Violation>,
}

impl ValidationError {
    pub fn summary(&self) -> String {
        match self.violations.as_slice() {
            [] => "Validation failed".to_string(),
            [only] => only.reason.clone(),
            [first, rest @ ..] => format!("{} (and {} more)", first.reason, rest.len()),
        }
    }

    pub fn field_errors(&self) -> HashMap<String, String> {
        self.violations
            .iter()
            .map(|v| (v.field.clone(), v.reason.clone()))
            .collect()
    }

    pub fn has_field(&self, field: &str) -> bool {
        self.violations.iter().any(|v| v.field == field)
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.summary())
    }
}

impl std::error::Error for ValidationError {}

/// Object schema for one resource
#[derive(Debug, Clone, Serialize)]
pub struct Schema {
    pub name: String,
    pub fields: Vec<FieldRule>,
}

impl Schema {
    pub fn object(name: impl Into<String>, fields: Vec<FieldRule>) -> Self {
        Self { name: name.into(), fields }
    }

    pub fn field(&self, name: &str) -> Option<&FieldRule> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Validate `payload`, returning it cast field by field
    pub fn validate(
        &self,
        payload: &Map<String, Value>,
        mode: ValidationMode,
    ) -> Result<Map<String, Value>, ValidationError> {
        let mut violations = Vec::new();
        let mut cast = Map::new();

        for rule in &self.fields {
            match rule.check(payload.get(&rule.name)) {
                Ok(Some(value)) => {
                    cast.insert(rule.name.clone(), value);
                }
                Ok(None) => {}
                Err(reason) => {
                    violations.push(Violation { field: rule.name.clone(), reason });
                    if mode == ValidationMode::FailFast {
                        return Err(ValidationError { violations });
                    }
                }
            }
        }

        for key in payload.keys() {
            if self.field(key).is_none() {
                violations.push(Violation {
                    field: key.clone(),
                    reason: format!("{} is not a field of {}", key, self.name),
                });
                if mode == ValidationMode::FailFast {
                    return Err(ValidationError { violations });
                }
            }
        }

        if violations.is_empty() {
            Ok(cast)
        } else {
            Err(ValidationError { violations })
        }
    }
}

fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                return None;
            }
            trimmed.parse::<f64>().ok().filter(|f| f.is_finite())
        }
        _ => None,
    }
}

/// Integral values stay JSON integers
fn number_value(n: f64) -> Option<Value> {
    if n.fract() == 0.0 && n >= i64::MIN as f64 && n <= i64::MAX as f64 {
        Some(Value::from(n as i64))
    } else {
        serde_json::Number::from_f64(n).map(Value::Number)
    }
}

/// Date strings are kept (trimmed) when they parse; epoch milliseconds
/// become RFC 3339 UTC timestamps
fn cast_date(value: &Value) -> Option<Value> {
    match value {
        Value::Number(n) => {
            let millis = n.as_i64().or_else(|| n.as_f64().filter(|f| f.is_finite()).map(|f| f as i64))?;
            let at = Utc.timestamp_millis_opt(millis).single()?;
            Some(Value::String(at.to_rfc3339_opts(SecondsFormat::Millis, true)))
        }
        Value::String(s) => {
            let s = s.trim();
            let parses = DateTime::parse_from_rfc3339(s).is_ok()
                || NaiveDate::parse_from_str(s, "%Y-%m-%d").is_ok()
                || NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f").is_ok()
                || NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f").is_ok();
            parses.then(|| Value::String(s.to_string()))
        }
        _ => None,
    }
}
