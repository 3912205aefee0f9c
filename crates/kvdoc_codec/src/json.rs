//! Conversion from `serde_json` documents.

use crate::value::{Object, Value};

impl From<serde_json::Value> for Value {
    fn from(json: serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => Value::Number(n.as_f64().unwrap_or(f64::NAN)),
            serde_json::Value::String(s) => Value::Text(s),
            serde_json::Value::Array(items) => {
                Value::Array(items.into_iter().map(Value::from).collect())
            }
            serde_json::Value::Object(map) => Value::Object(
                map.into_iter()
                    .map(|(k, v)| (k, Value::from(v)))
                    .collect::<Object>(),
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn json_documents_convert() {
        let value = Value::from(json!({
            "title": "Reinventing Organizations",
            "year": 2014,
            "tags": ["management", null],
            "draft": false
        }));
        assert_eq!(value.get("year"), Some(&Value::Number(2014.0)));
        assert_eq!(value.get_path("tags.1"), Some(&Value::Null));
        assert_eq!(value.get("draft"), Some(&Value::Bool(false)));
        assert!(value.as_object().unwrap().class().is_none());
    }

    #[test]
    fn json_strings_are_not_untagged() {
        assert_eq!(Value::from(json!("@Date(5)")), Value::Text("@Date(5)".into()));
    }
}
