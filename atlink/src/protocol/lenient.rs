//! Field deserializers that accept the loose shapes the CLI sometimes emits:
//! numbers as strings, booleans as strings or 0/1, integers as `3.0`.
//! A value that cannot be coerced becomes `None` instead of failing the line.

use serde::{Deserialize, Deserializer};
use serde_json::Value;

fn to_u64(v: &Value) -> Option<u64> {
    match v {
        Value::Number(n) => n.as_u64().or_else(|| {
            n.as_f64()
                .filter(|f| *f >= 0.0 && f.fract() == 0.0 && *f <= u64::MAX as f64)
                .map(|f| f as u64)
        }),
        Value::String(s) => {
            let s = s.trim();
            s.parse::<u64>().ok().or_else(|| {
                s.parse::<f64>()
                    .ok()
                    .filter(|f| *f >= 0.0 && f.fract() == 0.0)
                    .map(|f| f as u64)
            })
        }
        _ => None,
    }
}

fn to_f64(v: &Value) -> Option<f64> {
    match v {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok().filter(|f| f.is_finite()),
        _ => None,
    }
}

fn to_bool(v: &Value) -> Option<bool> {
    match v {
        Value::Bool(b) => Some(*b),
        Value::Number(n) => match n.as_i64() {
            Some(0) => Some(false),
            Some(1) => Some(true),
            _ => None,
        },
        Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "1" | "yes" => Some(true),
            "false" | "0" | "no" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

pub(crate) fn opt_u64<'de, D: Deserializer<'de>>(d: D) -> Result<Option<u64>, D::Error> {
    Ok(Option::<Value>::deserialize(d)?.as_ref().and_then(to_u64))
}

pub(crate) fn u64_or_zero<'de, D: Deserializer<'de>>(d: D) -> Result<u64, D::Error> {
    Ok(opt_u64(d)?.unwrap_or(0))
}

pub(crate) fn opt_f64<'de, D: Deserializer<'de>>(d: D) -> Result<Option<f64>, D::Error> {
    Ok(Option::<Value>::deserialize(d)?.as_ref().and_then(to_f64))
}

pub(crate) fn opt_bool<'de, D: Deserializer<'de>>(d: D) -> Result<Option<bool>, D::Error> {
    Ok(Option::<Value>::deserialize(d)?.as_ref().and_then(to_bool))
}

/// Accepts a string, a number (stringified), or null.
pub(crate) fn opt_string<'de, D: Deserializer<'de>>(d: D) -> Result<Option<String>, D::Error> {
    Ok(match Option::<Value>::deserialize(d)? {
        Some(Value::String(s)) => Some(s),
        Some(Value::Number(n)) => Some(n.to_string()),
        Some(Value::Bool(b)) => Some(b.to_string()),
        _ => None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn u64_coercions() {
        assert_eq!(to_u64(&json!(5)), Some(5));
        assert_eq!(to_u64(&json!(5.0)), Some(5));
        assert_eq!(to_u64(&json!("12")), Some(12));
        assert_eq!(to_u64(&json!(" 7.0 ")), Some(7));
        assert_eq!(to_u64(&json!(5.5)), None);
        assert_eq!(to_u64(&json!(-1)), None);
        assert_eq!(to_u64(&json!("abc")), None);
        assert_eq!(to_u64(&json!(null)), None);
    }

    #[test]
    fn f64_coercions() {
        assert_eq!(to_f64(&json!(0.25)), Some(0.25));
        assert_eq!(to_f64(&json!("0.5")), Some(0.5));
        assert_eq!(to_f64(&json!(3)), Some(3.0));
        assert_eq!(to_f64(&json!("NaN")), None);
        assert_eq!(to_f64(&json!([])), None);
    }

    #[test]
    fn bool_coercions() {
        assert_eq!(to_bool(&json!(true)), Some(true));
        assert_eq!(to_bool(&json!("False")), Some(false));
        assert_eq!(to_bool(&json!(1)), Some(true));
        assert_eq!(to_bool(&json!(0)), Some(false));
        assert_eq!(to_bool(&json!(2)), None);
        assert_eq!(to_bool(&json!("maybe")), None);
    }
}
