#![forbid(unsafe_code)]

//! String ↔ number rules shared by expressions, assignments and conditions.

use std::cmp::Ordering;

use hotscript_line::Value;

#[derive(Copy, Clone, Debug, PartialEq)]
pub enum Number {
    Int(i64),
    Float(f64),
}

impl Number {
    pub fn as_f64(self) -> f64 {
        match self {
            Number::Int(n) => n as f64,
            Number::Float(x) => x,
        }
    }

    pub fn as_i64(self) -> i64 {
        match self {
            Number::Int(n) => n,
            Number::Float(x) => x as i64,
        }
    }

    pub fn is_zero(self) -> bool {
        match self {
            Number::Int(n) => n == 0,
            Number::Float(x) => x == 0.0,
        }
    }
}

impl From<Number> for Value {
    fn from(n: Number) -> Self {
        match n {
            Number::Int(n) => Value::Int(n),
            Number::Float(x) => Value::Float(x),
        }
    }
}

/// Parses decimal integers, `0x` hex integers and plain decimal floats,
/// ignoring surrounding spaces and tabs.
pub fn parse_number(text: &str) -> Option<Number> {
    let t = text.trim_matches(|c| c == ' ' || c == '\t');
    let (negative, body) = match t.as_bytes().first()? {
        b'-' => (true, &t[1..]),
        b'+' => (false, &t[1..]),
        _ => (false, t),
    };
    if let Some(hex) = body.strip_prefix("0x").or_else(|| body.strip_prefix("0X")) {
        if hex.is_empty() || !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
            return None;
        }
        let n = u64::from_str_radix(hex, 16).ok()? as i64;
        return Some(Number::Int(if negative { n.wrapping_neg() } else { n }));
    }
    let digits = body.bytes().filter(u8::is_ascii_digit).count();
    let dots = body.bytes().filter(|&b| b == b'.').count();
    if digits == 0 || dots > 1 || digits + dots != body.len() {
        return None;
    }
    if dots == 0 {
        let n: i64 = body.parse().ok()?;
        Some(Number::Int(if negative { -n } else { n }))
    } else {
        let x: f64 = body.parse().ok()?;
        Some(Number::Float(if negative { -x } else { x }))
    }
}

pub fn to_number(value: &Value) -> Option<Number> {
    match value {
        Value::Int(n) => Some(Number::Int(*n)),
        Value::Float(x) => Some(Number::Float(*x)),
        Value::Text(s) => parse_number(s),
    }
}

/// Empty text and zero are false; everything else is true.
pub fn is_true(value: &Value) -> bool {
    match value {
        Value::Text(s) if s.is_empty() => false,
        other => !to_number(other).is_some_and(Number::is_zero),
    }
}

/// Numeric comparison when both sides are numbers, otherwise text comparison.
pub fn compare(a: &Value, b: &Value, case_sensitive: bool) -> Ordering {
    if let (Some(x), Some(y)) = (to_number(a), to_number(b)) {
        return match (x, y) {
            (Number::Int(x), Number::Int(y)) => x.cmp(&y),
            _ => x.as_f64().partial_cmp(&y.as_f64()).unwrap_or(Ordering::Equal),
        };
    }
    compare_text(&a.to_string(), &b.to_string(), case_sensitive)
}

pub fn compare_text(a: &str, b: &str, case_sensitive: bool) -> Ordering {
    if case_sensitive {
        a.cmp(b)
    } else {
        a.to_lowercase().cmp(&b.to_lowercase())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn number_forms() {
        assert_eq!(parse_number(" 42\t"), Some(Number::Int(42)));
        assert_eq!(parse_number("-0x1F"), Some(Number::Int(-31)));
        assert_eq!(parse_number("+1.5"), Some(Number::Float(1.5)));
        assert_eq!(parse_number(".5"), Some(Number::Float(0.5)));
        assert_eq!(parse_number("1.2.3"), None);
        assert_eq!(parse_number("12abc"), None);
        assert_eq!(parse_number(""), None);
        assert_eq!(parse_number("-"), None);
    }

    #[test]
    fn truthiness() {
        assert!(!is_true(&Value::from("")));
        assert!(!is_true(&Value::from("0")));
        assert!(!is_true(&Value::Float(0.0)));
        assert!(is_true(&Value::from("abc")));
        assert!(is_true(&Value::Int(-1)));
    }

    #[test]
    fn mixed_comparison() {
        assert_eq!(compare(&Value::from("10"), &Value::Int(9), false), Ordering::Greater);
        assert_eq!(compare(&Value::from("10"), &Value::from("9x"), false), Ordering::Less);
        assert_eq!(compare(&Value::from("ABC"), &Value::from("abc"), false), Ordering::Equal);
        assert_ne!(compare(&Value::from("ABC"), &Value::from("abc"), true), Ordering::Equal);
    }
}
