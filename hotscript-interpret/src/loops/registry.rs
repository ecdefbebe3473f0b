#![forbid(unsafe_code)]

use std::collections::{BTreeMap, VecDeque};

use hotscript_line::RegRoot;

use crate::error::ErrorKind;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RegValue {
    pub name: String,
    /// `REG_SZ`, `REG_DWORD`, ...
    pub kind: String,
    pub data: String,
}

/// Read access to a hierarchical key/value store. Keys are `\`-separated
/// paths below a root; a missing key simply has no children.
pub trait Registry {
    fn subkeys(&self, root: RegRoot, key: &str) -> Vec<String>;
    fn values(&self, root: RegRoot, key: &str) -> Vec<RegValue>;
}

#[derive(Clone, Debug, Default)]
struct KeyNode {
    name: String,
    values: Vec<RegValue>,
}

/// In-process registry. Key lookup ignores case.
#[derive(Clone, Debug, Default)]
pub struct MemoryRegistry {
    keys: BTreeMap<(RegRoot, String), KeyNode>,
}

fn normalize(key: &str) -> String {
    key.trim_matches('\\').to_lowercase()
}

impl MemoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates `key` and its ancestors.
    pub fn create_key(&mut self, root: RegRoot, key: &str) {
        let mut path = String::new();
        for part in key.split('\\').filter(|p| !p.is_empty()) {
            if !path.is_empty() {
                path.push('\\');
            }
            path.push_str(part);
            self.keys
                .entry((root, path.to_lowercase()))
                .or_insert_with(|| KeyNode {
                    name: part.to_string(),
                    values: Vec::new(),
                });
        }
    }

    pub fn set_value(&mut self, root: RegRoot, key: &str, name: &str, kind: &str, data: &str) {
        self.create_key(root, key);
        let node = self.keys.entry((root, normalize(key))).or_default();
        let value = RegValue {
            name: name.to_string(),
            kind: kind.to_string(),
            data: data.to_string(),
        };
        match node.values.iter_mut().find(|v| v.name.eq_ignore_ascii_case(name)) {
            Some(existing) => *existing = value,
            None => node.values.push(value),
        }
    }
}

impl Registry for MemoryRegistry {
    fn subkeys(&self, root: RegRoot, key: &str) -> Vec<String> {
        let parent = normalize(key);
        self.keys
            .iter()
            .filter(|((r, path), _)| {
                *r == root
                    && match path.rsplit_once('\\') {
                        Some((head, _)) => head == parent,
                        None => parent.is_empty(),
                    }
            })
            .map(|(_, node)| node.name.clone())
            .collect()
    }

    fn values(&self, root: RegRoot, key: &str) -> Vec<RegValue> {
        self.keys
            .get(&(root, normalize(key)))
            .map(|n| n.values.clone())
            .unwrap_or_default()
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum RegMode {
    ValuesOnly,
    ValuesAndKeys,
    KeysOnly,
}

impl RegMode {
    pub fn from_arg(arg: &str) -> Result<Self, ErrorKind> {
        match arg.trim() {
            "" | "0" => Ok(RegMode::ValuesOnly),
            "1" => Ok(RegMode::ValuesAndKeys),
            "2" => Ok(RegMode::KeysOnly),
            other => Err(ErrorKind::BadParameter(format!(
                "invalid registry-loop mode \"{other}\" (must be 0, 1 or 2)"
            ))),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RegItem {
    pub name: String,
    /// `KEY` for subkeys, otherwise the value's type.
    pub kind: String,
    pub root: RegRoot,
    pub subkey: String,
}

/// Per key: its subkeys, then its values, then (when recursing) the same for
/// each subkey in turn.
#[derive(Debug)]
pub struct RegCursor {
    root: RegRoot,
    mode: RegMode,
    recurse: bool,
    pending: Vec<String>,
    ready: VecDeque<RegItem>,
}

impl RegCursor {
    pub fn new(root: RegRoot, key: &str, mode: RegMode, recurse: bool) -> Self {
        Self {
            root,
            mode,
            recurse,
            pending: vec![key.trim_matches('\\').to_string()],
            ready: VecDeque::new(),
        }
    }

    pub fn next_item(&mut self, registry: &dyn Registry) -> Option<RegItem> {
        loop {
            if let Some(item) = self.ready.pop_front() {
                return Some(item);
            }
            let key = self.pending.pop()?;
            let subkeys = registry.subkeys(self.root, &key);
            if self.mode != RegMode::ValuesOnly {
                for name in &subkeys {
                    self.ready.push_back(RegItem {
                        name: name.clone(),
                        kind: "KEY".to_string(),
                        root: self.root,
                        subkey: key.clone(),
                    });
                }
            }
            if self.mode != RegMode::KeysOnly {
                for value in registry.values(self.root, &key) {
                    self.ready.push_back(RegItem {
                        name: value.name,
                        kind: value.kind,
                        root: self.root,
                        subkey: key.clone(),
                    });
                }
            }
            if self.recurse {
                let children = subkeys.iter().rev().map(|name| {
                    if key.is_empty() {
                        name.clone()
                    } else {
                        format!("{key}\\{name}")
                    }
                });
                self.pending.extend(children);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> MemoryRegistry {
        let mut reg = MemoryRegistry::new();
        reg.set_value(RegRoot::CurrentUser, "Software\\App", "Version", "REG_SZ", "1.0");
        reg.set_value(RegRoot::CurrentUser, "Software\\App\\Plugins", "Count", "REG_DWORD", "2");
        reg.create_key(RegRoot::CurrentUser, "Software\\App\\Cache");
        reg
    }

    fn drain(cursor: &mut RegCursor, reg: &MemoryRegistry) -> Vec<(String, String, String)> {
        std::iter::from_fn(|| cursor.next_item(reg))
            .map(|i| (i.subkey, i.name, i.kind))
            .collect()
    }

    #[test]
    fn subkeys_before_values() {
        let reg = sample();
        let mut cursor = RegCursor::new(RegRoot::CurrentUser, "software\\app", RegMode::ValuesAndKeys, false);
        let names: Vec<_> = drain(&mut cursor, &reg).into_iter().map(|(_, n, k)| (n, k)).collect();
        assert_eq!(
            names,
            [
                ("Cache".to_string(), "KEY".to_string()),
                ("Plugins".to_string(), "KEY".to_string()),
                ("Version".to_string(), "REG_SZ".to_string()),
            ]
        );
    }

    #[test]
    fn recursive_values_only() {
        let reg = sample();
        let mut cursor = RegCursor::new(RegRoot::CurrentUser, "Software", RegMode::ValuesOnly, true);
        let items = drain(&mut cursor, &reg);
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].1, "Version");
        assert_eq!(items[1].0.to_lowercase(), "software\\app\\plugins");
    }
}
