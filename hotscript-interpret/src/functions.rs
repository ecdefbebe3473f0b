#![forbid(unsafe_code)]

//! Built-in functions callable from expressions.

use hotscript_line::Value;

use crate::coerce::{self, Number};
use crate::error::ErrorKind;

pub(crate) fn call(name: &str, args: &[Value]) -> Result<Value, ErrorKind> {
    let lower = name.to_ascii_lowercase();
    let (min, max) = match lower.as_str() {
        "abs" | "ceil" | "floor" | "sqrt" | "strlen" | "asc" | "chr" | "exp" | "log" | "ln" => {
            (1, 1)
        }
        "round" => (1, 2),
        "mod" => (2, 2),
        "instr" => (2, 4),
        "substr" => (2, 3),
        _ => return Err(ErrorKind::UnknownFunction(name.to_string())),
    };
    if args.len() < min || args.len() > max {
        return Err(ErrorKind::Expression(format!(
            "{name}() takes {min} to {max} parameters, got {}",
            args.len()
        )));
    }
    let num = |i: usize| args.get(i).and_then(coerce::to_number);
    let text = |i: usize| args.get(i).map(Value::to_string).unwrap_or_default();

    let v = match lower.as_str() {
        "abs" => match num(0) {
            Some(Number::Int(n)) => Value::Int(n.wrapping_abs()),
            Some(Number::Float(x)) => Value::Float(x.abs()),
            None => Value::default(),
        },
        "ceil" => num(0).map_or_else(Value::default, |n| Value::Int(n.as_f64().ceil() as i64)),
        "floor" => num(0).map_or_else(Value::default, |n| Value::Int(n.as_f64().floor() as i64)),
        "round" => round(num(0), num(1)),
        "sqrt" => float_fn(num(0), |x| (x >= 0.0).then(|| x.sqrt())),
        "exp" => float_fn(num(0), |x| Some(x.exp())),
        "log" => float_fn(num(0), |x| (x > 0.0).then(|| x.log10())),
        "ln" => float_fn(num(0), |x| (x > 0.0).then(|| x.ln())),
        "mod" => match (num(0), num(1)) {
            (Some(_), Some(d)) if d.is_zero() => return Err(ErrorKind::DivideByZero),
            (Some(Number::Int(a)), Some(Number::Int(b))) => Value::Int(a.wrapping_rem(b)),
            (Some(a), Some(b)) => Value::Float(a.as_f64() % b.as_f64()),
            _ => Value::default(),
        },
        "strlen" => Value::Int(text(0).chars().count() as i64),
        "asc" => Value::Int(text(0).chars().next().map_or(0, |c| c as i64)),
        "chr" => num(0)
            .and_then(|n| u32::try_from(n.as_i64()).ok())
            .and_then(char::from_u32)
            .map_or_else(Value::default, |c| Value::Text(c.to_string())),
        "instr" => {
            let case_sensitive = args.get(2).is_some_and(coerce::is_true);
            let start = num(3).map_or(1, |n| n.as_i64().max(1)) as usize;
            Value::Int(instr(&text(0), &text(1), case_sensitive, start))
        }
        "substr" => Value::Text(substr(&text(0), num(1).map_or(1, Number::as_i64), num(2).map(Number::as_i64))),
        _ => Value::default(),
    };
    Ok(v)
}

fn float_fn(n: Option<Number>, f: impl Fn(f64) -> Option<f64>) -> Value {
    n.and_then(|n| f(n.as_f64())).map_or_else(Value::default, Value::Float)
}

const MAX_ROUND_PLACES: i64 = 17;

fn round(n: Option<Number>, places: Option<Number>) -> Value {
    let Some(n) = n else {
        return Value::default();
    };
    // Digits past f64 precision are noise; beyond -400 every factor is infinite.
    let places = places.map_or(0, Number::as_i64).clamp(-400, MAX_ROUND_PLACES);
    if places <= 0 {
        let factor = 10f64.powi(-places as i32);
        return Value::Int(((n.as_f64() / factor).round() * factor) as i64);
    }
    Value::Text(format!("{:.*}", places as usize, n.as_f64()))
}

/// 1-based position of `needle` in `hay` at or after char `start`, or 0.
fn instr(hay: &str, needle: &str, case_sensitive: bool, start: usize) -> i64 {
    let (hay, needle) = if case_sensitive {
        (hay.to_string(), needle.to_string())
    } else {
        (hay.to_lowercase(), needle.to_lowercase())
    };
    if needle.is_empty() {
        return 0;
    }
    let skip = hay.char_indices().nth(start - 1).map_or(hay.len(), |(i, _)| i);
    match hay[skip..].find(&needle) {
        Some(i) => hay[..skip + i].chars().count() as i64 + 1,
        None => 0,
    }
}

/// `start` is 1-based; zero or negative counts back from the end (0 = last
/// char). A negative `len` drops that many chars from the end.
fn substr(s: &str, start: i64, len: Option<i64>) -> String {
    let chars: Vec<char> = s.chars().collect();
    let total = chars.len() as i64;
    let first = if start >= 1 {
        start - 1
    } else {
        (total - 1).saturating_add(start).max(0)
    };
    if first >= total {
        return String::new();
    }
    let end = match len {
        None => total,
        Some(l) if l >= 0 => first.saturating_add(l).min(total),
        Some(l) => total.saturating_add(l).max(first),
    };
    chars[first as usize..end as usize].iter().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn call_with(name: &str, args: &[&str]) -> Value {
        let args: Vec<Value> = args.iter().map(|a| Value::from(*a)).collect();
        call(name, &args).unwrap()
    }

    #[test]
    fn string_functions() {
        assert_eq!(call_with("StrLen", &["héllo"]), Value::Int(5));
        assert_eq!(call_with("InStr", &["Hello", "LL"]), Value::Int(3));
        assert_eq!(call_with("InStr", &["Hello", "LL", "1"]), Value::Int(0));
        assert_eq!(call_with("SubStr", &["abcdef", "2", "3"]), Value::from("bcd"));
        assert_eq!(call_with("SubStr", &["abc", "0"]), Value::from("c"));
        assert_eq!(call_with("SubStr", &["abcdef", "1", "-2"]), Value::from("abcd"));
        assert_eq!(call_with("SubStr", &["abc", "2", "9223372036854775807"]), Value::from("bc"));
        assert_eq!(call_with("SubStr", &["abc", "-9223372036854775807"]), Value::from("abc"));
        assert_eq!(call_with("SubStr", &["abc", "1", "-9223372036854775807"]), Value::from(""));
        assert_eq!(call_with("Chr", &["65"]), Value::from("A"));
        assert_eq!(call_with("Asc", &["A"]), Value::Int(65));
    }

    #[test]
    fn math_functions() {
        assert_eq!(call_with("Abs", &["-3"]), Value::Int(3));
        assert_eq!(call_with("Floor", &["-1.5"]), Value::Int(-2));
        assert_eq!(call_with("Round", &["2.346", "2"]), Value::from("2.35"));
        assert_eq!(call_with("Round", &["1234", "-2"]), Value::Int(1200));
        assert_eq!(call_with("Round", &["1", "1000000000000"]), Value::from("1.00000000000000000"));
        assert_eq!(call_with("Round", &["1234", "-9223372036854775807"]), Value::Int(0));
        assert_eq!(call_with("Sqrt", &["-1"]), Value::default());
        assert_eq!(call_with("Mod", &["7", "3"]), Value::Int(1));
        assert_eq!(call("Mod", &[Value::Int(1), Value::Int(0)]), Err(ErrorKind::DivideByZero));
    }

    #[test]
    fn unknown_function() {
        assert_eq!(
            call("Nope", &[]),
            Err(ErrorKind::UnknownFunction("Nope".to_string()))
        );
    }
}
