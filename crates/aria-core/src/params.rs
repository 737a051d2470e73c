//! Parameter maps for audio processors
//!
//! One flat string-keyed map per invocation. Missing or wrong-typed values
//! resolve to the processor's documented default instead of failing; each
//! processor reads the map exactly once per call into a typed params struct
//! with explicit clamps.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Heterogeneous scalar parameter value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
}

impl From<f64> for ParamValue {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<i64> for ParamValue {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<bool> for ParamValue {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<&str> for ParamValue {
    fn from(v: &str) -> Self {
        Self::Str(v.to_owned())
    }
}

/// String-keyed parameter map, one per `process()` invocation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParamMap(BTreeMap<String, ParamValue>);

impl ParamMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, key: &str, value: impl Into<ParamValue>) -> &mut Self {
        self.0.insert(key.to_owned(), value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&ParamValue> {
        self.0.get(key)
    }

    /// Float accessor; `Int` values coerce, anything else falls back.
    pub fn float_or(&self, key: &str, default: f64) -> f64 {
        match self.0.get(key) {
            Some(ParamValue::Float(v)) if v.is_finite() => *v,
            Some(ParamValue::Int(v)) => *v as f64,
            _ => default,
        }
    }

    /// Float accessor with an explicit valid range.
    pub fn float_clamped(&self, key: &str, default: f64, min: f64, max: f64) -> f64 {
        self.float_or(key, default).clamp(min, max)
    }

    pub fn int_or(&self, key: &str, default: i64) -> i64 {
        match self.0.get(key) {
            Some(ParamValue::Int(v)) => *v,
            Some(ParamValue::Float(v)) if v.is_finite() => *v as i64,
            _ => default,
        }
    }

    pub fn bool_or(&self, key: &str, default: bool) -> bool {
        match self.0.get(key) {
            Some(ParamValue::Bool(v)) => *v,
            _ => default,
        }
    }

    pub fn str_or<'a>(&'a self, key: &str, default: &'a str) -> &'a str {
        match self.0.get(key) {
            Some(ParamValue::Str(v)) => v,
            _ => default,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_on_missing_and_mistyped() {
        let mut params = ParamMap::new();
        params.set("mix", 0.25).set("mode", "wide").set("bands", 4i64);

        assert_eq!(params.float_or("mix", 1.0), 0.25);
        assert_eq!(params.float_or("missing", 1.0), 1.0);
        // Wrong type falls back to the default rather than failing.
        assert_eq!(params.float_or("mode", 0.5), 0.5);
        assert_eq!(params.int_or("bands", 0), 4);
        assert_eq!(params.str_or("mode", "narrow"), "wide");
        assert!(params.bool_or("bypass", false) == false);
    }

    #[test]
    fn test_clamped_access() {
        let mut params = ParamMap::new();
        params.set("freq", 1.0e9);
        assert_eq!(params.float_clamped("freq", 1000.0, 20.0, 20000.0), 20000.0);
    }

    #[test]
    fn test_json_map() {
        let json = r#"{"mix": 0.5, "enabled": true, "taps": 3, "mode": "tape"}"#;
        let params: ParamMap = serde_json::from_str(json).unwrap();
        assert_eq!(params.float_or("mix", 0.0), 0.5);
        assert!(params.bool_or("enabled", false));
        assert_eq!(params.int_or("taps", 0), 3);
        assert_eq!(params.str_or("mode", ""), "tape");
    }
}
