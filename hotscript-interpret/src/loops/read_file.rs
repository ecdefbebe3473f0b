#![forbid(unsafe_code)]

use std::fs::{File, OpenOptions};
use std::io::{self, BufRead, BufReader, Read};
use std::path::PathBuf;

use crate::error::ErrorKind;

/// Longest line handed out in one iteration; longer lines continue in the
/// next one.
pub const MAX_LINE: u64 = 65535;

#[derive(Debug)]
pub struct ReadCursor {
    reader: Option<BufReader<File>>,
}

impl ReadCursor {
    /// A missing or unreadable file gives a loop with no iterations.
    pub fn open(path: &str) -> Self {
        let reader = match File::open(path) {
            Ok(f) => Some(BufReader::new(f)),
            Err(err) => {
                tracing::debug!(path, %err, "read loop: cannot open input");
                None
            }
        };
        Self { reader }
    }

    /// The next line without its terminator; `Ok(None)` at end of file. A
    /// read failure ends the loop with an error.
    pub fn next_line(&mut self) -> Result<Option<String>, ErrorKind> {
        let Some(reader) = self.reader.as_mut() else {
            return Ok(None);
        };
        let mut raw = Vec::new();
        let read = reader.by_ref().take(MAX_LINE).read_until(b'\n', &mut raw);
        let result = match read {
            Ok(0) => Ok(0),
            Ok(n) if n as u64 == MAX_LINE && raw.last() != Some(&b'\n') => {
                skip_line_end(reader).map(|()| n)
            }
            other => other,
        };
        match result {
            Ok(0) => {
                self.reader = None;
                return Ok(None);
            }
            Err(err) => {
                self.reader = None;
                return Err(ErrorKind::Io(format!("read loop: {err}")));
            }
            Ok(_) => {}
        }
        while matches!(raw.last(), Some(b'\n' | b'\r')) {
            raw.pop();
        }
        Ok(Some(String::from_utf8_lossy(&raw).into_owned()))
    }
}

/// After a full-length chunk, a terminator that follows directly belongs to
/// that line rather than starting an empty one.
fn skip_line_end(reader: &mut BufReader<File>) -> io::Result<()> {
    let (n, split_crlf) = match reader.fill_buf()? {
        [b'\n', ..] => (1, false),
        [b'\r', b'\n', ..] => (2, false),
        // Only the CR made it into the buffer.
        [b'\r'] => (1, true),
        _ => (0, false),
    };
    reader.consume(n);
    if split_crlf && reader.fill_buf()?.first() == Some(&b'\n') {
        reader.consume(1);
    }
    Ok(())
}

/// The optional output file of a read loop. Nothing is created until a
/// command inside the loop writes to it.
#[derive(Debug)]
pub struct LoopOutput {
    path: PathBuf,
    file: Option<File>,
}

impl LoopOutput {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            file: None,
        }
    }

    pub fn file(&mut self) -> io::Result<&mut File> {
        match &mut self.file {
            Some(f) => Ok(f),
            slot @ None => {
                let f = OpenOptions::new().create(true).append(true).open(&self.path)?;
                Ok(slot.insert(f))
            }
        }
    }

    pub fn is_open(&self) -> bool {
        self.file.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn strips_line_endings() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("in.txt");
        std::fs::write(&path, "one\r\ntwo\n\nthree").unwrap();
        let mut c = ReadCursor::open(path.to_str().unwrap());
        let lines: Vec<_> = std::iter::from_fn(|| c.next_line().unwrap()).collect();
        assert_eq!(lines, ["one", "two", "", "three"]);
    }

    #[test]
    fn long_lines_are_split() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("long.txt");
        let long = "x".repeat(MAX_LINE as usize + 10);
        std::fs::write(&path, format!("{long}\nend\n")).unwrap();
        let mut c = ReadCursor::open(path.to_str().unwrap());
        assert_eq!(c.next_line().unwrap().map(|l| l.len()), Some(MAX_LINE as usize));
        assert_eq!(c.next_line().unwrap().map(|l| l.len()), Some(10));
        assert_eq!(c.next_line().unwrap().as_deref(), Some("end"));
        assert_eq!(c.next_line(), Ok(None));
    }

    #[test]
    fn a_line_of_exactly_max_length_keeps_its_terminator() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("exact.txt");
        let exact = "y".repeat(MAX_LINE as usize);
        std::fs::write(&path, format!("{exact}\nnext\r\n{exact}\r\nlast")).unwrap();
        let mut c = ReadCursor::open(path.to_str().unwrap());
        let lines: Vec<_> = std::iter::from_fn(|| c.next_line().unwrap()).collect();
        let lens: Vec<_> = lines.iter().map(String::len).collect();
        assert_eq!(lens, [MAX_LINE as usize, 4, MAX_LINE as usize, 4]);
        assert_eq!(lines[1], "next");
        assert_eq!(lines[3], "last");
    }

    #[test]
    fn a_read_failure_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let mut c = ReadCursor::open(dir.path().to_str().unwrap());
        assert!(matches!(c.next_line(), Err(ErrorKind::Io(_))));
        assert_eq!(c.next_line(), Ok(None));
    }

    #[test]
    fn output_opens_lazily() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.txt");
        let mut out = LoopOutput::new(&path);
        assert!(!path.exists());
        writeln!(out.file().unwrap(), "hi").unwrap();
        assert!(out.is_open());
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "hi\n");
    }
}
