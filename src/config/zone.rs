//! Zone store (spec.md §4.A): `(view, hostname) -> ordered directive lines`.
//!
//! Built on top of `Config`, but zone keys are canonicalized at load time —
//! lowercased, trailing dot stripped — per spec.md §3's invariant ("Zone
//! keys are stored lowercased and dot-stripped; lookups lowercase their
//! input"). Grounded on `original_source/conf.go`'s reuse of the generic
//! `Config` type for `zone.conf`, and `global.go`'s `scanForASN` for the
//! view-map derivation.

use std::collections::HashMap;
use std::path::Path;

use crate::error::config::ConfigError;

use super::Config;

fn canonical_name(name: &str) -> String {
    let lower = name.to_ascii_lowercase();
    lower.strip_suffix('.').map(str::to_string).unwrap_or(lower)
}

/// A loaded zone file: `(view, name) -> ordered RR/directive lines`.
#[derive(Debug, Clone, Default)]
pub struct Zone {
    data: HashMap<(String, String), Vec<String>>,
    pub file_info: super::FileInfo,
}

impl Zone {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Zone, ConfigError> {
        let config = Config::from_file(path)?;
        Ok(Zone::from_config(config))
    }

    pub fn from_str(text: &str) -> Zone {
        Zone::from_config(Config::from_str(text))
    }

    fn from_config(config: Config) -> Zone {
        let mut data: HashMap<(String, String), Vec<String>> = HashMap::new();
        for (key, val) in config.data {
            let name = canonical_name(&key.name);
            data.entry((key.section, name)).or_default().extend(val.values);
        }
        Zone { data, file_info: config.file_info }
    }

    /// `get(view, name)`: exact `view` section if present, else `"default"`.
    pub fn get(&self, view: &str, name: &str) -> Option<&[String]> {
        let name = canonical_name(name);
        self.data
            .get(&(view.to_string(), name.clone()))
            .or_else(|| self.data.get(&(String::from("default"), name)))
            .map(Vec::as_slice)
    }

    /// First-value boolean getter, per spec.md §4.A.
    pub fn get_bool(&self, view: &str, name: &str) -> Option<bool> {
        let first = self.get(view, name)?.first()?;
        let c = first.chars().next()?;
        Some(matches!(c, 'y' | 'Y' | 't' | 'T' | '1'..='9'))
    }

    pub fn need_reload(&self) -> bool {
        self.file_info.modified_since()
    }

    /// All `(view, name)` pairs in the zone, for the health-check scanner
    /// and the view-map builder below.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str, &[String])> {
        self.data
            .iter()
            .map(|((view, name), values)| (view.as_str(), name.as_str(), values.as_slice()))
    }

    /// Derive the view map (spec.md §4.D): for every zone entry named
    /// `as`, `country`, or `resolver`, each listed value becomes a key
    /// pointing at that entry's section name.
    ///
    /// Grounded on `global.go`'s `scanForASN`, generalized to also cover
    /// `country` (spec.md names all three; the Go source only wires up
    /// `as`/`resolver`, which DESIGN.md records as a resolved ambiguity).
    pub fn derive_view_map(&self) -> ViewMap {
        let mut map = HashMap::new();
        for (view, name, values) in self.iter() {
            if matches!(name, "as" | "country" | "resolver") {
                for value in values {
                    map.insert(value.to_ascii_lowercase(), view.to_string());
                }
            }
        }
        ViewMap { map }
    }
}

/// `(ASN or IP or country) -> view`, consulted by `dns::view::view_of`.
#[derive(Debug, Clone, Default)]
pub struct ViewMap {
    map: HashMap<String, String>,
}

impl ViewMap {
    pub fn lookup(&self, key: &str) -> Option<&str> {
        self.map.get(&key.to_ascii_lowercase()).map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonicalizes_name_on_lookup() {
        let z = Zone::from_str("[default]\na.example.com: A 192.0.2.1\n");
        assert_eq!(z.get("default", "A.Example.Com."), Some(&["A 192.0.2.1".to_string()][..]));
    }

    #[test]
    fn falls_back_to_default_view() {
        let z = Zone::from_str("[default]\nhost: A 192.0.2.1\n");
        assert_eq!(z.get("comcast", "host"), Some(&["A 192.0.2.1".to_string()][..]));
    }

    #[test]
    fn view_map_derivation() {
        let z = Zone::from_str("[comcast]\nas: 7922\nresolver: 96.0.0.1\n");
        let vm = z.derive_view_map();
        assert_eq!(vm.lookup("7922"), Some("comcast"));
        assert_eq!(vm.lookup("96.0.0.1"), Some("comcast"));
    }
}
