#![forbid(unsafe_code)]

//! Expression tokenizer. The loader uses it to find operand boundaries and
//! the evaluator re-runs it over the same text, so both always agree on
//! where each operand starts.

/// Characters that end an operand.
pub const OPERAND_TERMINATORS: &str = "\t +-<>=*/&|^~!(),";
/// Characters that may not appear in an expression outside a string literal.
pub const ILLEGAL_CHARS: &str = "'\\:;`{}";

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Op {
    Add,
    Sub,
    Mul,
    Div,
    FloorDiv,
    Pow,
    Concat,
    BitAnd,
    BitOr,
    BitXor,
    BitNot,
    Not,
    And,
    Or,
    Shl,
    Shr,
    Eq,
    StrictEq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum TokenKind {
    Number,
    /// Quoted string; the span includes the quotes.
    Str,
    /// A variable reference (possibly with `%` parts).
    Operand,
    /// A word directly followed by `(`.
    Function,
    Op(Op),
    LParen,
    RParen,
    Comma,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub start: usize,
    pub len: usize,
}

impl Token {
    pub fn text<'a>(&self, src: &'a str) -> &'a str {
        &src[self.start..self.start + self.len]
    }
}

fn is_terminator(c: char) -> bool {
    OPERAND_TERMINATORS.contains(c) || c == '"'
}

/// Splits `src` into tokens, or returns a message describing the first
/// lexical problem.
pub fn tokenize(src: &str) -> Result<Vec<Token>, String> {
    let bytes = src.as_bytes();
    let mut out = Vec::new();
    let mut i = 0;
    while i < bytes.len() {
        let c = bytes[i];
        let at = |len: usize, kind: TokenKind| Token { kind, start: i, len };
        match c {
            b' ' | b'\t' => {
                i += 1;
                continue;
            }
            b'"' => {
                let mut j = i + 1;
                loop {
                    match bytes.get(j) {
                        None => return Err("missing close-quote".to_string()),
                        Some(b'"') if bytes.get(j + 1) == Some(&b'"') => j += 2,
                        Some(b'"') => break,
                        Some(_) => j += 1,
                    }
                }
                out.push(at(j + 1 - i, TokenKind::Str));
                i = j + 1;
                continue;
            }
            b'(' => out.push(at(1, TokenKind::LParen)),
            b')' => out.push(at(1, TokenKind::RParen)),
            b',' => out.push(at(1, TokenKind::Comma)),
            _ => {}
        }
        if matches!(c, b'(' | b')' | b',') {
            i += 1;
            continue;
        }

        let next = bytes.get(i + 1).copied();
        let op = match (c, next) {
            (b'*', Some(b'*')) => Some((Op::Pow, 2)),
            (b'*', _) => Some((Op::Mul, 1)),
            (b'/', Some(b'/')) => Some((Op::FloorDiv, 2)),
            (b'/', _) => Some((Op::Div, 1)),
            (b'+', _) => Some((Op::Add, 1)),
            (b'-', _) => Some((Op::Sub, 1)),
            (b'&', Some(b'&')) => Some((Op::And, 2)),
            (b'&', _) => Some((Op::BitAnd, 1)),
            (b'|', Some(b'|')) => Some((Op::Or, 2)),
            (b'|', _) => Some((Op::BitOr, 1)),
            (b'^', _) => Some((Op::BitXor, 1)),
            (b'~', _) => Some((Op::BitNot, 1)),
            (b'!', Some(b'=')) => Some((Op::Ne, 2)),
            (b'!', _) => Some((Op::Not, 1)),
            (b'<', Some(b'>')) => Some((Op::Ne, 2)),
            (b'<', Some(b'<')) => Some((Op::Shl, 2)),
            (b'<', Some(b'=')) => Some((Op::Le, 2)),
            (b'<', _) => Some((Op::Lt, 1)),
            (b'>', Some(b'>')) => Some((Op::Shr, 2)),
            (b'>', Some(b'=')) => Some((Op::Ge, 2)),
            (b'>', _) => Some((Op::Gt, 1)),
            (b'=', Some(b'=')) => Some((Op::StrictEq, 2)),
            (b'=', _) => Some((Op::Eq, 1)),
            (b'.', n) if !n.is_some_and(|n| n.is_ascii_digit()) => Some((Op::Concat, 1)),
            _ => None,
        };
        if let Some((op, len)) = op {
            out.push(at(len, TokenKind::Op(op)));
            i += len;
            continue;
        }

        // Operand run.
        let rest = &src[i..];
        let len = rest
            .char_indices()
            .find(|(_, ch)| is_terminator(*ch))
            .map_or(rest.len(), |(n, _)| n);
        let word = &rest[..len];
        if let Some(bad) = word.chars().find(|ch| ILLEGAL_CHARS.contains(*ch)) {
            return Err(format!("illegal character '{bad}' in expression"));
        }
        let kind = if word.starts_with(|ch: char| ch.is_ascii_digit() || ch == '.') {
            TokenKind::Number
        } else if word.eq_ignore_ascii_case("and") {
            TokenKind::Op(Op::And)
        } else if word.eq_ignore_ascii_case("or") {
            TokenKind::Op(Op::Or)
        } else if word.eq_ignore_ascii_case("not") {
            TokenKind::Op(Op::Not)
        } else if !word.contains('%') && src[i + len..].starts_with('(') {
            TokenKind::Function
        } else {
            TokenKind::Operand
        };
        out.push(Token {
            kind,
            start: i,
            len,
        });
        i += len;
    }
    Ok(out)
}
