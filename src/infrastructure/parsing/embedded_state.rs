//! Typed accessor over the embedded client-state cache
//!
//! The cache is a flat map from typed object identifiers (`PlaceDetailBase:123`,
//! `Menu:123_0`, `ROOT_QUERY`, ...) to field records. Nothing about it is
//! guaranteed, so every accessor returns an explicit `Option` or a defaulted
//! value; only coercion of a present-but-malformed number is an error.

use serde_json::{Map, Value};

use super::{ParsingError, ParsingResult};

/// Parsed embedded state, keys kept in encounter order
#[derive(Debug, Clone)]
pub struct EmbeddedState {
    entries: Map<String, Value>,
}

/// One field record of the embedded state
#[derive(Debug, Clone, Copy)]
pub struct StateRecord<'a> {
    key: &'a str,
    fields: &'a Map<String, Value>,
}

impl EmbeddedState {
    pub fn from_value(value: &Value) -> ParsingResult<Self> {
        match value {
            Value::Object(entries) => Ok(Self {
                entries: entries.clone(),
            }),
            Value::Null => Err(ParsingError::StateMissing),
            other => Err(ParsingError::NotAnObject {
                found: type_name(other).to_string(),
            }),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Record stored under exactly `key`
    pub fn record(&self, key: &str) -> Option<StateRecord<'_>> {
        self.records().find(|record| record.key() == key)
    }

    /// First record whose key starts with `prefix`
    pub fn record_with_prefix(&self, prefix: &str) -> Option<StateRecord<'_>> {
        self.records().find(|record| record.key().starts_with(prefix))
    }

    /// All object-valued records in encounter order
    pub fn records(&self) -> impl Iterator<Item = StateRecord<'_>> {
        self.entries
            .iter()
            .filter_map(|(key, value)| StateRecord::new(key, value))
    }

    /// Records whose `__typename` equals `type_tag`
    pub fn records_of_type<'a>(&'a self, type_tag: &'a str) -> impl Iterator<Item = StateRecord<'a>> {
        self.records()
            .filter(move |record| record.type_tag() == Some(type_tag))
    }
}

impl<'a> StateRecord<'a> {
    fn new(key: &'a str, value: &'a Value) -> Option<Self> {
        value.as_object().map(|fields| Self { key, fields })
    }

    pub fn key(&self) -> &'a str {
        self.key
    }

    pub fn type_tag(&self) -> Option<&'a str> {
        self.fields.get("__typename").and_then(Value::as_str)
    }

    pub fn field(&self, name: &str) -> Option<&'a Value> {
        self.fields.get(name).filter(|v| !v.is_null())
    }

    /// Nested record stored inline under the first field starting with `prefix`
    pub fn nested_with_prefix(&self, prefix: &str) -> Option<StateRecord<'a>> {
        self.fields
            .iter()
            .find(|(key, _)| key.starts_with(prefix))
            .and_then(|(key, value)| StateRecord::new(key, value))
    }

    /// Text of a string field, `None` when absent or not a string
    pub fn str_field(&self, name: &str) -> Option<&'a str> {
        self.field(name).and_then(Value::as_str)
    }

    /// Display text of a scalar field; empty strings count as absent
    pub fn text(&self, name: &str) -> Option<String> {
        match self.field(name)? {
            Value::String(s) if s.is_empty() => None,
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }

    /// Count field with thousands separators, 0 when blank or absent
    pub fn count(&self, name: &str) -> ParsingResult<i64> {
        parse_count(name, self.field(name))
    }

    /// Float field, 0.0 when absent
    pub fn number(&self, name: &str) -> ParsingResult<f64> {
        match self.field(name) {
            None => Ok(0.0),
            Some(Value::Number(n)) => n
                .as_f64()
                .ok_or_else(|| ParsingError::invalid_number(name, n)),
            Some(Value::String(s)) if s.trim().is_empty() => Ok(0.0),
            Some(Value::String(s)) => s
                .trim()
                .parse::<f64>()
                .map_err(|_| ParsingError::invalid_number(name, s)),
            Some(other) => Err(ParsingError::invalid_number(name, other)),
        }
    }
}

/// Parse a count that may be a number or a string like `"1,234"`
pub fn parse_count(field: &str, value: Option<&Value>) -> ParsingResult<i64> {
    match value {
        None | Some(Value::Null) => Ok(0),
        Some(Value::Number(n)) => n
            .as_i64()
            .ok_or_else(|| ParsingError::invalid_number(field, n)),
        Some(Value::String(s)) => {
            let digits = strip_separators(s);
            if digits.is_empty() {
                return Ok(0);
            }
            digits
                .parse::<i64>()
                .map_err(|_| ParsingError::invalid_number(field, s))
        }
        Some(other) => Err(ParsingError::invalid_number(field, other)),
    }
}

/// Parse a displayed price; only plain digit strings (after separator removal) qualify
pub fn parse_price(text: &str) -> Option<i64> {
    let digits = strip_separators(text);
    if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

fn strip_separators(text: &str) -> String {
    text.trim().replace(',', "")
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_rejects_non_object_state() {
        assert_eq!(
            EmbeddedState::from_value(&json!([1, 2])).unwrap_err(),
            ParsingError::NotAnObject { found: "array".to_string() }
        );
        assert_eq!(EmbeddedState::from_value(&Value::Null).unwrap_err(), ParsingError::StateMissing);
    }

    #[test]
    fn test_records_skip_scalars_and_keep_order() {
        let state = EmbeddedState::from_value(&json!({
            "Menu:2": { "__typename": "Menu" },
            "version": 3,
            "Menu:1": { "__typename": "Menu" }
        }))
        .unwrap();

        let keys: Vec<&str> = state.records().map(|r| r.key()).collect();
        assert_eq!(keys, vec!["Menu:2", "Menu:1"]);
    }

    #[test]
    fn test_count_variants() {
        assert_eq!(parse_count("n", Some(&json!("1,234"))), Ok(1234));
        assert_eq!(parse_count("n", Some(&json!(""))), Ok(0));
        assert_eq!(parse_count("n", Some(&json!(77))), Ok(77));
        assert_eq!(parse_count("n", None), Ok(0));
        assert!(parse_count("n", Some(&json!("many"))).is_err());
        assert!(parse_count("n", Some(&json!(1.5))).is_err());
    }

    #[test]
    fn test_number_defaults_and_coercion() {
        let state = EmbeddedState::from_value(&json!({
            "PlaceDetailBase:1": { "a": 4.42, "b": "3.9", "c": null, "d": true }
        }))
        .unwrap();
        let record = state.record_with_prefix("PlaceDetailBase:").unwrap();

        assert_eq!(record.number("a"), Ok(4.42));
        assert_eq!(record.number("b"), Ok(3.9));
        assert_eq!(record.number("c"), Ok(0.0));
        assert_eq!(record.number("missing"), Ok(0.0));
        assert!(record.number("d").is_err());
    }

    #[test]
    fn test_parse_price() {
        assert_eq!(parse_price("15,000"), Some(15_000));
        assert_eq!(parse_price("9000"), Some(9_000));
        assert_eq!(parse_price("변동"), None);
        assert_eq!(parse_price("12,000~"), None);
        assert_eq!(parse_price(""), None);
    }
}
