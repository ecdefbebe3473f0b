#![forbid(unsafe_code)]

use std::collections::VecDeque;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use regex::{Regex, RegexBuilder};

use crate::error::ErrorKind;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum FileMode {
    FilesOnly,
    FilesAndFolders,
    FoldersOnly,
}

impl FileMode {
    pub fn from_arg(arg: &str) -> Result<Self, ErrorKind> {
        match arg.trim() {
            "" | "0" => Ok(FileMode::FilesOnly),
            "1" => Ok(FileMode::FilesAndFolders),
            "2" => Ok(FileMode::FoldersOnly),
            other => Err(ErrorKind::BadParameter(format!(
                "invalid file-loop mode \"{other}\" (must be 0, 1 or 2)"
            ))),
        }
    }

    fn wants(self, is_dir: bool) -> bool {
        match self {
            FileMode::FilesOnly => !is_dir,
            FileMode::FilesAndFolders => true,
            FileMode::FoldersOnly => is_dir,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FileItem {
    pub name: String,
    pub dir: String,
    pub full_path: String,
    pub size: u64,
    pub is_dir: bool,
}

impl FileItem {
    pub fn ext(&self) -> &str {
        Path::new(&self.name)
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("")
    }
}

/// Turns a `*`/`?` wildcard into a case-insensitive anchored regex.
pub fn wildcard_regex(pattern: &str) -> Result<Regex, ErrorKind> {
    let mut re = String::from("^");
    for c in pattern.chars() {
        match c {
            '*' => re.push_str(".*"),
            '?' => re.push('.'),
            other => re.push_str(&regex::escape(&other.to_string())),
        }
    }
    re.push('$');
    RegexBuilder::new(&re)
        .case_insensitive(true)
        .build()
        .map_err(|e| ErrorKind::BadParameter(format!("invalid file pattern \"{pattern}\": {e}")))
}

/// Walks one folder at a time. A folder's own matches come before anything
/// in its sub-folders; entries are sorted by name.
#[derive(Debug)]
pub struct FileCursor {
    matcher: Regex,
    mode: FileMode,
    recurse: bool,
    pending: Vec<PathBuf>,
    ready: VecDeque<FileItem>,
}

impl FileCursor {
    pub fn new(pattern: &str, mode: FileMode, recurse: bool) -> Result<Self, ErrorKind> {
        let split = pattern.rfind(['/', '\\']);
        let (dir, name) = match split {
            Some(i) => (&pattern[..i], &pattern[i + 1..]),
            None => ("", pattern),
        };
        let dir = if dir.is_empty() && split.is_some() { "/" } else { dir };
        Ok(Self {
            matcher: wildcard_regex(name)?,
            mode,
            recurse,
            pending: vec![PathBuf::from(dir)],
            ready: VecDeque::new(),
        })
    }

    pub fn next_item(&mut self) -> Result<Option<FileItem>, ErrorKind> {
        loop {
            if let Some(item) = self.ready.pop_front() {
                return Ok(Some(item));
            }
            let Some(dir) = self.pending.pop() else {
                return Ok(None);
            };
            self.scan(&dir)?;
        }
    }

    /// A folder that does not exist has no matches; any other failure to list
    /// it ends the loop.
    fn scan(&mut self, dir: &Path) -> Result<(), ErrorKind> {
        let listing = if dir.as_os_str().is_empty() {
            fs::read_dir(".")
        } else {
            fs::read_dir(dir)
        };
        let listing = match listing {
            Ok(listing) => listing,
            Err(err) if is_missing(&err) => {
                tracing::debug!(dir = %dir.display(), "file loop: no such folder");
                return Ok(());
            }
            Err(err) => return Err(io_error(dir, &err)),
        };
        let mut entries: Vec<(String, bool, u64)> = Vec::new();
        for entry in listing {
            let entry = entry.map_err(|e| io_error(dir, &e))?;
            let meta = match entry.metadata() {
                Ok(meta) => meta,
                // Removed while the folder was being listed.
                Err(err) if is_missing(&err) => continue,
                Err(err) => return Err(io_error(&entry.path(), &err)),
            };
            let Ok(name) = entry.file_name().into_string() else {
                tracing::debug!(path = %entry.path().display(), "file loop: skipping non-UTF-8 name");
                continue;
            };
            entries.push((name, meta.is_dir(), meta.len()));
        }
        entries.sort_by(|a, b| a.0.cmp(&b.0));

        let dir_text = dir.to_string_lossy().into_owned();
        let mut subdirs = Vec::new();
        for (name, is_dir, size) in entries {
            let path = dir.join(&name);
            if is_dir && self.recurse {
                subdirs.push(path.clone());
            }
            if self.mode.wants(is_dir) && self.matcher.is_match(&name) {
                self.ready.push_back(FileItem {
                    full_path: path.to_string_lossy().into_owned(),
                    dir: dir_text.clone(),
                    name,
                    size: if is_dir { 0 } else { size },
                    is_dir,
                });
            }
        }
        self.pending.extend(subdirs.into_iter().rev());
        Ok(())
    }
}

fn is_missing(err: &io::Error) -> bool {
    matches!(err.kind(), io::ErrorKind::NotFound | io::ErrorKind::NotADirectory)
}

fn io_error(path: &Path, err: &io::Error) -> ErrorKind {
    ErrorKind::Io(format!("file loop: {}: {err}", path.display()))
}
