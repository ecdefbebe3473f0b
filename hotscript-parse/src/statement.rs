#![forbid(unsafe_code)]

/// One argument as produced by the tokenizer: its text plus the byte offsets
/// of characters that were escaped and must be taken literally (a literal
/// `%` never starts a variable reference).
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RawArg {
    pub text: String,
    pub literal: Vec<usize>,
}

impl RawArg {
    pub fn plain(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            literal: Vec::new(),
        }
    }

    /// Decodes backtick escapes: `` `% `` `` `, `` `` `; `` and ``` `` ``` become
    /// literal characters, `` `n `` `` `r `` `` `t `` become control characters.
    pub fn from_escaped(src: &str) -> Self {
        let mut text = String::with_capacity(src.len());
        let mut literal = Vec::new();
        let mut chars = src.chars();
        while let Some(c) = chars.next() {
            if c != '`' {
                text.push(c);
                continue;
            }
            match chars.next() {
                Some('n') => text.push('\n'),
                Some('r') => text.push('\r'),
                Some('t') => text.push('\t'),
                Some(other) => {
                    literal.push(text.len());
                    text.push(other);
                }
                None => text.push('`'),
            }
        }
        Self { text, literal }
    }

    pub fn is_literal_at(&self, offset: usize) -> bool {
        self.literal.binary_search(&offset).is_ok()
    }
}

impl From<&str> for RawArg {
    fn from(s: &str) -> Self {
        RawArg::from_escaped(s)
    }
}

/// A tokenized source statement.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Statement {
    pub keyword: String,
    pub args: Vec<RawArg>,
    pub line_no: u32,
    /// Action written on the same physical line, e.g. `IfEqual, x, 1, Return`
    /// or `else Return`.
    pub same_line: Option<Box<Statement>>,
}

impl Statement {
    pub fn new(keyword: impl Into<String>, line_no: u32) -> Self {
        Self {
            keyword: keyword.into(),
            args: Vec::new(),
            line_no,
            same_line: None,
        }
    }

    pub fn arg(mut self, arg: impl Into<RawArg>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn with_args<A: Into<RawArg>>(mut self, args: impl IntoIterator<Item = A>) -> Self {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn then(mut self, action: Statement) -> Self {
        self.same_line = Some(Box::new(action));
        self
    }
}
