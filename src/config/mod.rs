//! Generic `[section]` / `key: value` config store (spec.md §6).
//!
//! Grounded on `original_source/conf.go`'s `Config`/`ConfigKey`/`ConfigVal`:
//! a single flat `(section, name) -> values` map backs both `server.conf`
//! and `zone.conf`, with `get(section, name)` falling back to
//! `get("default", name)` when the requested section has no entry. The
//! zone-specific view over this same store lives in `config::zone`.

pub mod zone;

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use crate::error::config::ConfigError;

/// `(section, name)` composite key, exactly as `conf.go`'s `ConfigKey`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ConfigKey {
    pub section: String,
    pub name: String,
}

/// The set of values stored under one key. `first` is a convenience accessor
/// for the common case of a single-valued key.
#[derive(Debug, Clone, Default)]
pub struct ConfigVal {
    pub values: Vec<String>,
}

impl ConfigVal {
    pub fn first(&self) -> Option<&str> {
        self.values.first().map(String::as_str)
    }
}

/// Records the path and mtime a `Config` was loaded from, so a background
/// reloader can tell when the source file changed (`gslbutil.go`
/// `FileModifiedSince`/`FileModifiedInfo`).
#[derive(Debug, Clone, Default)]
pub struct FileInfo {
    pub path: Option<PathBuf>,
    pub mtime: Option<SystemTime>,
}

impl FileInfo {
    fn for_path(path: &Path) -> Self {
        let mtime = std::fs::metadata(path).and_then(|m| m.modified()).ok();
        FileInfo {
            path: Some(path.to_path_buf()),
            mtime,
        }
    }

    /// True if the file on disk is newer than what we last loaded.
    pub fn modified_since(&self) -> bool {
        let (Some(path), Some(loaded)) = (&self.path, self.mtime) else {
            return false;
        };
        match std::fs::metadata(path).and_then(|m| m.modified()) {
            Ok(current) => current > loaded,
            Err(_) => false,
        }
    }
}

/// A section/name/value store loaded from an INI-like text file.
#[derive(Debug, Clone, Default)]
pub struct Config {
    pub data: HashMap<ConfigKey, ConfigVal>,
    pub file_info: FileInfo,
    current_section: String,
    last_key: Option<ConfigKey>,
}

impl Config {
    pub fn new() -> Self {
        Config {
            data: HashMap::new(),
            file_info: FileInfo::default(),
            current_section: "default".to_string(),
            last_key: None,
        }
    }

    /// Parse a whole file. Mirrors `conf.go`'s `NewConfigFromFile`: as much
    /// of the file is parsed as possible, and the first error seen (if any)
    /// is returned alongside the partially-built config.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Config, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mut config = Config::from_str_for(&text, path);
        config.file_info = FileInfo::for_path(path);
        Ok(config)
    }

    /// Parse from an in-memory string, as used by the test fixtures.
    pub fn from_str(text: &str) -> Config {
        Config::from_str_for(text, Path::new(""))
    }

    fn from_str_for(text: &str, path: &Path) -> Config {
        let mut config = Config::new();
        let hostname = current_hostname();
        for (idx, line) in text.lines().enumerate() {
            if let Err(ConfigError::Syntax { .. }) = config.add_line(line, &hostname) {
                log::warn!("{}:{}: skipping unparseable line: {:?}", path.display(), idx + 1, line);
            }
        }
        config
    }

    fn add_line(&mut self, raw: &str, hostname: &str) -> Result<(), ConfigError> {
        let line = raw.trim_end();
        let trimmed = line.trim();

        if trimmed.is_empty() || trimmed.starts_with('#') {
            return Ok(());
        }

        // [section] or [section/hostname]
        if let Some(inner) = trimmed.strip_prefix('[').and_then(|s| s.strip_suffix(']')) {
            if let Some((section, host)) = inner.split_once('/') {
                // Host-scoped section: discarded unless it matches us (§4.A).
                self.current_section = if host == hostname {
                    section.to_string()
                } else {
                    "".to_string() // sentinel: AddKeyValue below drops blank sections
                };
            } else {
                self.current_section = inner.to_string();
            }
            self.last_key = None;
            return Ok(());
        }

        // "  - v1" multi-line sequence continuation.
        if let Some(item) = trimmed.strip_prefix("- ").or_else(|| trimmed.strip_prefix('-')) {
            if let Some(key) = self.last_key.clone() {
                self.add_value(key, item.trim());
                return Ok(());
            }
        }

        // "key: value" or "key2: [v1, v2, v3]" or "key3:" (sequence header).
        if let Some((name, rest)) = line.split_once(':') {
            let name = name.trim();
            if name.is_empty() {
                return Err(ConfigError::Syntax {
                    path: PathBuf::new(),
                    line: 0,
                    text: raw.to_string(),
                });
            }
            let key = ConfigKey {
                section: self.current_section.clone(),
                name: name.to_string(),
            };
            self.last_key = Some(key.clone());

            let value = rest.trim();
            if value.is_empty() {
                // "key3:" header for an upcoming "- v" block; nothing to add yet.
                self.data.entry(key).or_default();
                return Ok(());
            }
            if let Some(inline) = value.strip_prefix('[').and_then(|s| s.strip_suffix(']')) {
                for item in inline.split(',') {
                    self.add_value(key.clone(), item.trim());
                }
                return Ok(());
            }
            self.add_value(key, value);
            return Ok(());
        }

        Err(ConfigError::Syntax {
            path: PathBuf::new(),
            line: 0,
            text: raw.to_string(),
        })
    }

    fn add_value(&mut self, key: ConfigKey, value: &str) {
        if key.section.is_empty() || value.is_empty() {
            return;
        }
        self.data.entry(key).or_default().values.push(value.to_string());
    }

    /// `(section, name) -> values`, falling back to `("default", name)`.
    pub fn get(&self, section: &str, name: &str) -> Option<&ConfigVal> {
        let key = ConfigKey { section: section.to_string(), name: name.to_string() };
        self.data.get(&key).or_else(|| {
            let fallback = ConfigKey { section: "default".to_string(), name: name.to_string() };
            self.data.get(&fallback)
        })
    }

    pub fn get_strings(&self, section: &str, name: &str) -> Option<&[String]> {
        self.get(section, name).map(|v| v.values.as_slice())
    }

    pub fn get_string(&self, section: &str, name: &str) -> Option<&str> {
        self.get(section, name).and_then(ConfigVal::first)
    }

    pub fn get_int(&self, section: &str, name: &str) -> Option<i64> {
        self.get_string(section, name).and_then(|s| s.parse().ok())
    }

    /// Booleans accept `y|Y|t|T|1-9` as true, `n|N|f|F|0` as false (§6).
    pub fn get_bool(&self, section: &str, name: &str) -> Option<bool> {
        let value = self.get_string(section, name)?;
        let first = value.chars().next()?;
        Some(matches!(first, 'y' | 'Y' | 't' | 'T' | '1'..='9'))
    }

    pub fn need_reload(&self) -> bool {
        self.file_info.modified_since()
    }
}

fn current_hostname() -> String {
    hostname_from_env().unwrap_or_default()
}

fn hostname_from_env() -> Option<String> {
    std::env::var("HOSTNAME").ok().filter(|s| !s.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_sections_and_scalars() {
        let c = Config::from_str(
            "[server]\nudp: 0.0.0.0:53\n[default]\nmaxcache: 10000\n",
        );
        assert_eq!(c.get_string("server", "udp"), Some("0.0.0.0:53"));
        assert_eq!(c.get_int("default", "maxcache"), Some(10000));
    }

    #[test]
    fn falls_back_to_default_section() {
        let c = Config::from_str("[default]\nkey: fallback\n");
        assert_eq!(c.get_string("comcast", "key"), Some("fallback"));
    }

    #[test]
    fn inline_sequence() {
        let c = Config::from_str("[server]\nudp: [1.1.1.1:53, 2.2.2.2:53]\n");
        assert_eq!(
            c.get_strings("server", "udp"),
            Some(&["1.1.1.1:53".to_string(), "2.2.2.2:53".to_string()][..])
        );
    }

    #[test]
    fn multiline_sequence() {
        let c = Config::from_str("[server]\nudp:\n  - 1.1.1.1:53\n  - 2.2.2.2:53\n");
        assert_eq!(
            c.get_strings("server", "udp"),
            Some(&["1.1.1.1:53".to_string(), "2.2.2.2:53".to_string()][..])
        );
    }

    #[test]
    fn booleans() {
        let c = Config::from_str("[lookup]\ndebug: Y\nquiet: n\n");
        assert_eq!(c.get_bool("lookup", "debug"), Some(true));
        assert_eq!(c.get_bool("lookup", "quiet"), Some(false));
    }

    #[test]
    fn host_scoped_section_discarded_unless_matching() {
        std::env::remove_var("HOSTNAME");
        let c = Config::from_str("[server/otherhost]\nudp: 1.2.3.4:53\n");
        assert_eq!(c.get_string("server", "udp"), None);
    }
}
