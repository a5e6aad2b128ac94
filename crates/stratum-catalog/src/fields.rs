//! Small accessors used by the normalizers.

use serde_json::{Map, Value};
use stratum_core::NormalizeError;

pub(crate) fn str_field<'a>(config: &'a Map<String, Value>, key: &str) -> Option<&'a str> {
    config.get(key).and_then(Value::as_str)
}

/// Read a non-negative whole number. Integral floats such as `4096.0` are
/// accepted and written back as integers; fractional, negative or
/// non-numeric values are rejected.
pub(crate) fn whole_number_field(
    config: &mut Map<String, Value>,
    key: &str,
) -> Result<Option<u64>, NormalizeError> {
    let number = match config.get(key) {
        None | Some(Value::Null) => return Ok(None),
        Some(Value::Number(number)) => number,
        Some(other) => {
            return Err(NormalizeError::new(
                key,
                format!("{} must be a whole number, got {}", key, other),
            ));
        }
    };
    if let Some(value) = number.as_u64() {
        return Ok(Some(value));
    }
    match number.as_f64() {
        Some(value) if value >= 0.0 && value.fract() == 0.0 && value <= u32::MAX as f64 => {
            let whole = value as u64;
            config.insert(key.to_string(), Value::from(whole));
            Ok(Some(whole))
        }
        _ => Err(NormalizeError::new(
            key,
            format!("{} must be a whole number, got {}", key, number),
        )
        .with_suggestion(format!("Set `{}` to an integer", key))),
    }
}

pub(crate) fn bool_field(config: &Map<String, Value>, key: &str) -> bool {
    config.get(key).and_then(Value::as_bool).unwrap_or(false)
}

pub(crate) fn object_field<'a>(
    config: &'a Map<String, Value>,
    key: &str,
) -> Option<&'a Map<String, Value>> {
    config.get(key).and_then(Value::as_object)
}

/// Set `key` unless it already holds a non-null value.
pub(crate) fn fill_default(config: &mut Map<String, Value>, key: &str, value: impl Into<Value>) {
    match config.get(key) {
        Some(existing) if !existing.is_null() => {}
        _ => {
            config.insert(key.to_string(), value.into());
        }
    }
}
