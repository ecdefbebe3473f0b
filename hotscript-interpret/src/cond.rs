#![forbid(unsafe_code)]

//! Conditions of the non-expression if-family.

use hotscript_line::{CompareOp, IfCond, Value};

use crate::coerce::{self, parse_number, Number};
use crate::error::ErrorKind;

/// Evaluates `cond` over the line's expanded args: the variable's contents
/// first, then the operands.
pub(crate) fn evaluate(cond: IfCond, args: &[&str]) -> Result<bool, ErrorKind> {
    let arg = |i: usize| args.get(i).copied().unwrap_or("");
    let subject = arg(0);
    let result = match cond {
        IfCond::Expr => coerce::is_true(&Value::from(subject)),
        IfCond::Compare(op) => {
            let ord = coerce::compare(&Value::from(subject), &Value::from(arg(1)), false);
            match op {
                CompareOp::Equal => ord.is_eq(),
                CompareOp::NotEqual => !ord.is_eq(),
                CompareOp::Greater => ord.is_gt(),
                CompareOp::GreaterOrEqual => ord.is_ge(),
                CompareOp::Less => ord.is_lt(),
                CompareOp::LessOrEqual => ord.is_le(),
            }
        }
        IfCond::Between { negate } => negate != between(subject, arg(1), arg(2)),
        IfCond::In { negate } => {
            let subject = subject.to_lowercase();
            negate != split_list(arg(1)).iter().any(|item| item.to_lowercase() == subject)
        }
        IfCond::Contains { negate } => {
            let hay = subject.to_lowercase();
            negate
                != split_list(arg(1))
                    .iter()
                    .any(|item| !item.is_empty() && hay.contains(&item.to_lowercase()))
        }
        IfCond::Is { negate } => negate != is_type(subject, arg(1))?,
    };
    Ok(result)
}

fn between(v: &str, low: &str, high: &str) -> bool {
    match (parse_number(v), parse_number(low), parse_number(high)) {
        (Some(v), Some(lo), Some(hi)) => {
            let (v, lo, hi) = (v.as_f64(), lo.as_f64(), hi.as_f64());
            lo <= v && v <= hi
        }
        _ => {
            let v = v.to_lowercase();
            low.to_lowercase() <= v && v <= high.to_lowercase()
        }
    }
}

/// Comma-separated list where `,,` stands for a literal comma.
fn split_list(list: &str) -> Vec<String> {
    let mut items = Vec::new();
    let mut cur = String::new();
    let mut chars = list.chars().peekable();
    while let Some(c) = chars.next() {
        if c == ',' {
            if chars.peek() == Some(&',') {
                chars.next();
                cur.push(',');
            } else {
                items.push(std::mem::take(&mut cur));
            }
        } else {
            cur.push(c);
        }
    }
    items.push(cur);
    items
}

fn is_type(v: &str, type_name: &str) -> Result<bool, ErrorKind> {
    let t = v.trim_matches(|c| c == ' ' || c == '\t');
    let nonempty = !v.is_empty();
    let ok = match type_name.trim().to_ascii_lowercase().as_str() {
        "integer" => matches!(parse_number(t), Some(Number::Int(_))),
        "float" => matches!(parse_number(t), Some(Number::Float(_))),
        "number" => parse_number(t).is_some(),
        "digit" => nonempty && v.chars().all(|c| c.is_ascii_digit()),
        "xdigit" => {
            let body = v.strip_prefix("0x").or_else(|| v.strip_prefix("0X")).unwrap_or(v);
            !body.is_empty() && body.chars().all(|c| c.is_ascii_hexdigit())
        }
        "alpha" => nonempty && v.chars().all(char::is_alphabetic),
        "upper" => nonempty && v.chars().all(char::is_uppercase),
        "lower" => nonempty && v.chars().all(char::is_lowercase),
        "alnum" => nonempty && v.chars().all(char::is_alphanumeric),
        "space" => nonempty && v.chars().all(char::is_whitespace),
        "time" => is_timestamp(t),
        other => return Err(ErrorKind::BadParameter(format!("unknown type \"{other}\""))),
    };
    Ok(ok)
}

/// `YYYYMMDDHH24MISS`, possibly truncated after the year.
fn is_timestamp(s: &str) -> bool {
    if s.len() < 4 || s.len() > 14 || s.len() % 2 != 0 || !s.bytes().all(|b| b.is_ascii_digit()) {
        return false;
    }
    let field = |from: usize| s.get(from..from + 2).and_then(|f| f.parse::<u32>().ok());
    let in_range = |from: usize, lo: u32, hi: u32| field(from).is_none_or(|n| (lo..=hi).contains(&n));
    in_range(4, 1, 12) && in_range(6, 1, 31) && in_range(8, 0, 23) && in_range(10, 0, 59) && in_range(12, 0, 59)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compare_is_numeric_when_both_numbers() {
        let gt = IfCond::Compare(CompareOp::Greater);
        assert!(evaluate(gt, &["10", "9"]).unwrap());
        assert!(!evaluate(gt, &["10", "9z"]).unwrap());
        assert!(evaluate(IfCond::Compare(CompareOp::Equal), &["ABC", "abc"]).unwrap());
    }

    #[test]
    fn between_in_contains() {
        assert!(evaluate(IfCond::Between { negate: false }, &["5", "1", "10"]).unwrap());
        assert!(evaluate(IfCond::Between { negate: true }, &["cat", "a", "b"]).unwrap());
        assert!(evaluate(IfCond::In { negate: false }, &["b", "a,B,c"]).unwrap());
        assert!(evaluate(IfCond::In { negate: false }, &["x,y", "x,,y,z"]).unwrap());
        assert!(evaluate(IfCond::Contains { negate: false }, &["Hello", "zz,ELL"]).unwrap());
        assert!(evaluate(IfCond::Contains { negate: true }, &["Hello", "zz"]).unwrap());
    }

    #[test]
    fn type_checks() {
        let is = IfCond::Is { negate: false };
        assert!(evaluate(is, &["42", "integer"]).unwrap());
        assert!(!evaluate(is, &["4.2", "integer"]).unwrap());
        assert!(evaluate(is, &["4.2", "number"]).unwrap());
        assert!(evaluate(is, &["20240229", "time"]).unwrap());
        assert!(!evaluate(is, &["20241301", "time"]).unwrap());
        assert!(!evaluate(is, &["", "alpha"]).unwrap());
        assert!(evaluate(is, &["x", "bogus"]).is_err());
    }
}
