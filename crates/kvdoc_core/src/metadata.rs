//! Metadata envelope.
//!
//! Every stored payload is wrapped as `{data, metadata: {created?, expires?}}`.
//! Expiry is checked lazily on read.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use kvdoc_codec::{Object, Value};

use crate::error::{CoreError, CoreResult};

/// Milliseconds since the Unix epoch.
#[must_use]
pub fn now_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| i64::try_from(d.as_millis()).unwrap_or(i64::MAX))
}

/// When a value expires.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Expires {
    /// Relative to the time of the write.
    In(Duration),
    /// Absolute timestamp in milliseconds.
    At(i64),
}

impl Expires {
    fn resolve(self, now: i64) -> i64 {
        match self {
            Expires::In(d) => now.saturating_add(i64::try_from(d.as_millis()).unwrap_or(i64::MAX)),
            Expires::At(ms) => ms,
        }
    }
}

/// Metadata stored next to a value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Metadata {
    /// Creation timestamp (ms).
    pub created: Option<i64>,
    /// Expiry timestamp (ms).
    pub expires: Option<i64>,
}

impl Metadata {
    /// Empty metadata.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the expiry, resolving relative durations against now.
    #[must_use]
    pub fn expires(mut self, expires: Expires) -> Self {
        self.expires = Some(expires.resolve(now_ms()));
        self
    }

    /// Sets the creation time.
    #[must_use]
    pub fn created(mut self, ms: i64) -> Self {
        self.created = Some(ms);
        self
    }

    /// Returns `true` once `now` has reached the expiry.
    #[must_use]
    pub fn is_expired(&self, now: i64) -> bool {
        self.expires.is_some_and(|at| at <= now)
    }

    /// Returns `true` when no field is set.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.created.is_none() && self.expires.is_none()
    }

    /// Overlays the fields set in `other`.
    pub fn merge(&mut self, other: &Metadata) {
        if other.created.is_some() {
            self.created = other.created;
        }
        if other.expires.is_some() {
            self.expires = other.expires;
        }
    }

    /// Reads metadata from a document field.
    ///
    /// `expires` may be a date (absolute) or a number of milliseconds
    /// (relative to now).
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::TypeMismatch`] for other `expires` types.
    pub fn from_field(value: &Value) -> CoreResult<Self> {
        let Some(object) = value.as_object() else {
            return Err(CoreError::type_mismatch(format!(
                "metadata must be an object, got {}",
                value.type_name()
            )));
        };
        let created = match object.get("created") {
            Some(Value::Date(ms)) => Some(*ms),
            Some(Value::Number(n)) => Some(*n as i64),
            _ => None,
        };
        let expires = match object.get("expires") {
            None | Some(Value::Undefined | Value::Null) => None,
            Some(Value::Date(ms)) => Some(*ms),
            Some(Value::Number(n)) if n.is_infinite() && *n > 0.0 => None,
            Some(Value::Number(n)) if *n >= 0.0 => {
                Some(Expires::In(Duration::from_millis(*n as u64)).resolve(now_ms()))
            }
            Some(other) => {
                return Err(CoreError::type_mismatch(format!(
                    "expires must be milliseconds or a date, got {}",
                    other.type_name()
                )))
            }
        };
        Ok(Self { created, expires })
    }

    fn to_value(&self) -> Value {
        let mut object = Object::new();
        if let Some(ms) = self.created {
            object.insert("created", Value::Date(ms));
        }
        if let Some(ms) = self.expires {
            object.insert("expires", Value::Date(ms));
        }
        Value::Object(object)
    }

    fn from_stored(value: Option<&Value>) -> Self {
        let read = |field: &str| match value.and_then(|v| v.get(field)) {
            Some(Value::Date(ms)) => Some(*ms),
            _ => None,
        };
        Self {
            created: read("created"),
            expires: read("expires"),
        }
    }
}

/// Wraps a value in its envelope.
pub(crate) fn wrap(data: Value, metadata: &Metadata) -> Value {
    Value::object([("data", data), ("metadata", metadata.to_value())])
}

/// Splits a stored envelope. Values written without one come back as is.
pub(crate) fn unwrap(stored: Value) -> (Value, Metadata) {
    match stored {
        Value::Object(mut object) if object.contains_key("data") => {
            let metadata = Metadata::from_stored(object.get("metadata"));
            let data = object.remove("data").unwrap_or(Value::Undefined);
            (data, metadata)
        }
        other => (other, Metadata::default()),
    }
}
