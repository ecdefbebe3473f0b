#![forbid(unsafe_code)]

//! Precedence-climbing evaluator. It walks the token stream directly and
//! produces a value without building a tree.

use hotscript_line::lex::{self, Op, Token, TokenKind};
use hotscript_line::{Deref, Value};

use crate::coerce::{self, Number};
use crate::error::ErrorKind;
use crate::expand::Env;
use crate::functions;

// Binding power, loosest first.
const OR: u8 = 1;
const AND: u8 = 2;
const NOT: u8 = 3;
const EQUALITY: u8 = 4;
const RELATIONAL: u8 = 5;
const CONCAT: u8 = 6;
const BIT_OR: u8 = 7;
const BIT_XOR: u8 = 8;
const BIT_AND: u8 = 9;
const SHIFT: u8 = 10;
const ADDITIVE: u8 = 11;
const MULTIPLICATIVE: u8 = 12;

pub(crate) fn evaluate(text: &str, derefs: &[Deref], env: &mut Env<'_>) -> Result<Value, ErrorKind> {
    let tokens = lex::tokenize(text).map_err(ErrorKind::Expression)?;
    if tokens.is_empty() {
        return Ok(Value::default());
    }
    let mut eval = Eval {
        src: text,
        tokens,
        pos: 0,
        derefs,
        env,
        quiet: 0,
    };
    let value = eval.binary(OR)?;
    match eval.peek() {
        None => Ok(value),
        Some(tok) => Err(ErrorKind::Expression(format!(
            "unexpected \"{}\"",
            tok.text(text)
        ))),
    }
}

struct Eval<'s, 'e, 'v> {
    src: &'s str,
    tokens: Vec<Token>,
    pos: usize,
    derefs: &'s [Deref],
    env: &'e mut Env<'v>,
    /// Inside the unevaluated side of `and`/`or`: errors are swallowed.
    quiet: u32,
}

impl Eval<'_, '_, '_> {
    fn peek(&self) -> Option<Token> {
        self.tokens.get(self.pos).copied()
    }

    fn advance(&mut self) -> Option<Token> {
        let tok = self.peek();
        self.pos += 1;
        tok
    }

    fn expect(&mut self, kind: TokenKind, what: &str) -> Result<(), ErrorKind> {
        match self.advance() {
            Some(t) if t.kind == kind => Ok(()),
            _ => Err(ErrorKind::Expression(format!("missing \"{what}\""))),
        }
    }

    fn is_word_not(&self, tok: Token) -> bool {
        tok.kind == TokenKind::Op(Op::Not) && tok.len == 3
    }

    /// The binary operator at the cursor and whether it is written out
    /// (juxtaposed operands concatenate implicitly).
    fn peek_binary(&self) -> Option<(Op, u8, bool)> {
        let tok = self.peek()?;
        match tok.kind {
            TokenKind::Op(op) => {
                let prec = match op {
                    Op::Or => OR,
                    Op::And => AND,
                    Op::Eq | Op::StrictEq | Op::Ne => EQUALITY,
                    Op::Lt | Op::Le | Op::Gt | Op::Ge => RELATIONAL,
                    Op::Concat => CONCAT,
                    Op::BitOr => BIT_OR,
                    Op::BitXor => BIT_XOR,
                    Op::BitAnd => BIT_AND,
                    Op::Shl | Op::Shr => SHIFT,
                    Op::Add | Op::Sub => ADDITIVE,
                    Op::Mul | Op::Div | Op::FloorDiv => MULTIPLICATIVE,
                    Op::Pow | Op::Not | Op::BitNot => return None,
                };
                Some((op, prec, true))
            }
            TokenKind::Number
            | TokenKind::Str
            | TokenKind::Operand
            | TokenKind::Function
            | TokenKind::LParen => Some((Op::Concat, CONCAT, false)),
            TokenKind::RParen | TokenKind::Comma => None,
        }
    }

    fn binary(&mut self, min: u8) -> Result<Value, ErrorKind> {
        let mut lhs = match self.peek() {
            Some(tok) if self.is_word_not(tok) && min <= NOT => {
                self.advance();
                let v = self.binary(NOT)?;
                bool_value(!coerce::is_true(&v))
            }
            _ => self.unary()?,
        };
        while let Some((op, prec, explicit)) = self.peek_binary() {
            if prec < min {
                break;
            }
            if explicit {
                self.advance();
            }
            lhs = match op {
                Op::And | Op::Or => {
                    let decided = coerce::is_true(&lhs) == (op == Op::Or);
                    if decided {
                        self.quiet += 1;
                    }
                    let rhs = self.binary(prec + 1);
                    if decided {
                        self.quiet -= 1;
                        rhs?;
                        bool_value(op == Op::Or)
                    } else {
                        bool_value(coerce::is_true(&rhs?))
                    }
                }
                _ => {
                    let rhs = self.binary(prec + 1)?;
                    self.apply(op, lhs, rhs)?
                }
            };
        }
        Ok(lhs)
    }

    fn unary(&mut self) -> Result<Value, ErrorKind> {
        let Some(tok) = self.peek() else {
            return Err(ErrorKind::Expression("missing operand".to_string()));
        };
        match tok.kind {
            TokenKind::Op(Op::Sub) => {
                self.advance();
                let v = self.unary()?;
                Ok(match coerce::to_number(&v) {
                    Some(Number::Int(n)) => Value::Int(n.wrapping_neg()),
                    Some(Number::Float(x)) => Value::Float(-x),
                    None => Value::default(),
                })
            }
            TokenKind::Op(Op::Add) => {
                self.advance();
                self.unary()
            }
            TokenKind::Op(Op::Not) if !self.is_word_not(tok) => {
                self.advance();
                let v = self.unary()?;
                Ok(bool_value(!coerce::is_true(&v)))
            }
            TokenKind::Op(Op::BitNot) => {
                self.advance();
                let v = self.unary()?;
                Ok(coerce::to_number(&v).map_or(Value::default(), |n| Value::Int(!n.as_i64())))
            }
            _ => self.power(),
        }
    }

    fn power(&mut self) -> Result<Value, ErrorKind> {
        let base = self.primary()?;
        if self.peek().is_some_and(|t| t.kind == TokenKind::Op(Op::Pow)) {
            self.advance();
            let exp = self.unary()?;
            return Ok(power(&base, &exp));
        }
        Ok(base)
    }

    fn primary(&mut self) -> Result<Value, ErrorKind> {
        let Some(tok) = self.advance() else {
            return Err(ErrorKind::Expression("missing operand".to_string()));
        };
        let text = tok.text(self.src);
        match tok.kind {
            TokenKind::Number => coerce::parse_number(text)
                .map(Value::from)
                .ok_or_else(|| ErrorKind::Expression(format!("invalid number \"{text}\""))),
            TokenKind::Str => Ok(Value::Text(text[1..text.len() - 1].replace("\"\"", "\""))),
            TokenKind::Operand => {
                let Some(deref) = self.derefs.iter().find(|d| d.start == tok.start) else {
                    return Err(ErrorKind::Expression(format!("unknown operand \"{text}\"")));
                };
                self.env.operand(&deref.target)
            }
            TokenKind::Function => {
                self.expect(TokenKind::LParen, "(")?;
                let mut args = Vec::new();
                if self.peek().is_some_and(|t| t.kind == TokenKind::RParen) {
                    self.advance();
                } else {
                    loop {
                        args.push(self.binary(OR)?);
                        match self.advance() {
                            Some(t) if t.kind == TokenKind::Comma => continue,
                            Some(t) if t.kind == TokenKind::RParen => break,
                            _ => return Err(ErrorKind::Expression("missing \")\"".to_string())),
                        }
                    }
                }
                self.quietly(functions::call(text, &args))
            }
            TokenKind::LParen => {
                let v = self.binary(OR)?;
                self.expect(TokenKind::RParen, ")")?;
                Ok(v)
            }
            TokenKind::Op(_) | TokenKind::RParen | TokenKind::Comma => Err(ErrorKind::Expression(
                format!("unexpected \"{text}\""),
            )),
        }
    }

    fn quietly(&self, result: Result<Value, ErrorKind>) -> Result<Value, ErrorKind> {
        match result {
            Err(ErrorKind::DivideByZero) if self.quiet > 0 => Ok(Value::default()),
            other => other,
        }
    }

    fn apply(&self, op: Op, a: Value, b: Value) -> Result<Value, ErrorKind> {
        let v = match op {
            Op::Concat => {
                let mut s = a.to_string();
                b.append_to(&mut s);
                Value::Text(s)
            }
            Op::Eq => bool_value(coerce::compare(&a, &b, false).is_eq()),
            Op::Ne => bool_value(!coerce::compare(&a, &b, false).is_eq()),
            Op::StrictEq => bool_value(coerce::compare(&a, &b, true).is_eq()),
            Op::Lt => bool_value(coerce::compare(&a, &b, false).is_lt()),
            Op::Le => bool_value(coerce::compare(&a, &b, false).is_le()),
            Op::Gt => bool_value(coerce::compare(&a, &b, false).is_gt()),
            Op::Ge => bool_value(coerce::compare(&a, &b, false).is_ge()),
            _ => return self.quietly(arithmetic(op, &a, &b)),
        };
        Ok(v)
    }
}

fn bool_value(b: bool) -> Value {
    Value::Int(b as i64)
}

pub(crate) fn arithmetic(op: Op, a: &Value, b: &Value) -> Result<Value, ErrorKind> {
    let (Some(x), Some(y)) = (coerce::to_number(a), coerce::to_number(b)) else {
        return Ok(Value::default());
    };
    let v = match (op, x, y) {
        (Op::Add, Number::Int(x), Number::Int(y)) => Value::Int(x.wrapping_add(y)),
        (Op::Sub, Number::Int(x), Number::Int(y)) => Value::Int(x.wrapping_sub(y)),
        (Op::Mul, Number::Int(x), Number::Int(y)) => Value::Int(x.wrapping_mul(y)),
        (Op::Add, x, y) => Value::Float(x.as_f64() + y.as_f64()),
        (Op::Sub, x, y) => Value::Float(x.as_f64() - y.as_f64()),
        (Op::Mul, x, y) => Value::Float(x.as_f64() * y.as_f64()),
        (Op::Div | Op::FloorDiv, _, y) if y.is_zero() => return Err(ErrorKind::DivideByZero),
        (Op::Div, x, y) => Value::Float(x.as_f64() / y.as_f64()),
        (Op::FloorDiv, Number::Int(x), Number::Int(y)) => {
            let q = x.wrapping_div(y);
            Value::Int(if x.wrapping_rem(y) != 0 && ((x < 0) != (y < 0)) { q - 1 } else { q })
        }
        (Op::FloorDiv, x, y) => Value::Float((x.as_f64() / y.as_f64()).floor()),
        (Op::BitAnd, x, y) => Value::Int(x.as_i64() & y.as_i64()),
        (Op::BitOr, x, y) => Value::Int(x.as_i64() | y.as_i64()),
        (Op::BitXor, x, y) => Value::Int(x.as_i64() ^ y.as_i64()),
        (Op::Shl, x, y) => Value::Int(x.as_i64().wrapping_shl(y.as_i64() as u32)),
        (Op::Shr, x, y) => Value::Int(x.as_i64().wrapping_shr(y.as_i64() as u32)),
        _ => Value::default(),
    };
    Ok(v)
}

fn power(base: &Value, exp: &Value) -> Value {
    let (Some(b), Some(e)) = (coerce::to_number(base), coerce::to_number(exp)) else {
        return Value::default();
    };
    if let (Number::Int(b), Number::Int(e)) = (b, e) {
        if let Some(n) = u32::try_from(e).ok().and_then(|e| b.checked_pow(e)) {
            return Value::Int(n);
        }
    }
    let r = b.as_f64().powf(e.as_f64());
    if r.is_nan() { Value::default() } else { Value::Float(r) }
}
