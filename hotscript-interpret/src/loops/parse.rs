#![forbid(unsafe_code)]

/// Splits a copy of the input up front, so changing the input variable
/// inside the loop does not affect the remaining fields.
#[derive(Debug)]
pub struct ParseCursor {
    input: Vec<char>,
    pos: usize,
    delimiters: Vec<char>,
    omit: Vec<char>,
    csv: bool,
    done: bool,
}

impl ParseCursor {
    pub fn new(input: &str, delimiters: &str, omit: &str) -> Self {
        let csv = delimiters.eq_ignore_ascii_case("csv");
        Self {
            input: input.chars().collect(),
            pos: 0,
            delimiters: if csv { Vec::new() } else { delimiters.chars().collect() },
            omit: omit.chars().collect(),
            csv,
            done: input.is_empty(),
        }
    }

    pub fn next_field(&mut self) -> Option<String> {
        if self.done {
            return None;
        }
        if self.csv {
            return Some(self.next_csv());
        }
        if self.delimiters.is_empty() {
            return self.next_char();
        }
        let start = self.pos;
        let end = self.input[start..]
            .iter()
            .position(|c| self.delimiters.contains(c))
            .map(|i| start + i);
        let field = match end {
            Some(end) => {
                self.pos = end + 1;
                &self.input[start..end]
            }
            None => {
                self.done = true;
                &self.input[start..]
            }
        };
        Some(self.trim(field))
    }

    /// Without delimiters every char is a field; omitted chars are skipped.
    fn next_char(&mut self) -> Option<String> {
        while let Some(&c) = self.input.get(self.pos) {
            self.pos += 1;
            if !self.omit.contains(&c) {
                return Some(c.to_string());
            }
        }
        self.done = true;
        None
    }

    fn next_csv(&mut self) -> String {
        let mut field = String::new();
        if self.input.get(self.pos) == Some(&'"') {
            self.pos += 1;
            while let Some(&c) = self.input.get(self.pos) {
                self.pos += 1;
                if c == '"' {
                    if self.input.get(self.pos) == Some(&'"') {
                        field.push('"');
                        self.pos += 1;
                    } else {
                        break;
                    }
                } else {
                    field.push(c);
                }
            }
            // Anything between the closing quote and the comma is kept.
            while let Some(&c) = self.input.get(self.pos) {
                self.pos += 1;
                if c == ',' {
                    return field;
                }
                field.push(c);
            }
            self.done = true;
            return field;
        }
        let start = self.pos;
        match self.input[start..].iter().position(|&c| c == ',') {
            Some(i) => {
                self.pos = start + i + 1;
                self.trim(&self.input[start..start + i])
            }
            None => {
                self.done = true;
                self.trim(&self.input[start..])
            }
        }
    }

    fn trim(&self, field: &[char]) -> String {
        let mut s = field;
        while let [first, rest @ ..] = s {
            if !self.omit.contains(first) {
                break;
            }
            s = rest;
        }
        while let [rest @ .., last] = s {
            if !self.omit.contains(last) {
                break;
            }
            s = rest;
        }
        s.iter().collect()
    }
}
