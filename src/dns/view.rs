//! View resolver (spec.md §4.D): classifies a client IP into a view name.
//!
//! Grounded on `original_source/global.go`'s `scanForASN` plus
//! `dns_gslb.go`'s call site, which strips the `:port` suffix before
//! consulting the ASN map. The view cache is a plain `SweepCache` like every
//! other stage cache; overflow replaces the whole mapping, which `clear()`
//! already does.

use crate::cache::SweepCache;
use crate::config::zone::ViewMap;

use super::geo::GeoTable;

pub const DEFAULT_VIEW: &str = "default";

/// Strips a trailing `:port`, including the bracketed IPv6 form
/// `[::1]:53`, leaving the bare address.
pub fn strip_port(addr: &str) -> &str {
    if let Some(rest) = addr.strip_prefix('[') {
        if let Some(end) = rest.find(']') {
            return &rest[..end];
        }
    }
    match addr.rsplit_once(':') {
        // Only strip if there's exactly one colon (IPv4:port), otherwise
        // this is a bare, unbracketed IPv6 address and must be left alone.
        Some((host, port)) if port.chars().all(|c| c.is_ascii_digit()) && !host.contains(':') => host,
        _ => addr,
    }
}

/// Resolves a client address to a view name, memoized by address.
pub struct ViewResolver {
    cache: SweepCache<String, String>,
}

impl ViewResolver {
    pub fn new(max_size: usize) -> Self {
        ViewResolver { cache: SweepCache::new(max_size) }
    }

    pub async fn view_of(&self, addr: &str, geo: &GeoTable, view_map: &ViewMap) -> String {
        let ip_text = strip_port(addr).to_string();

        if let Some(view) = self.cache.get(&ip_text).await {
            return view;
        }

        let (asn, _isp, _country) = geo.lookup(&ip_text);
        let view = view_map
            .lookup(&asn)
            .or_else(|| view_map.lookup(&ip_text))
            .map(str::to_string)
            .unwrap_or_else(|| DEFAULT_VIEW.to_string());

        self.cache.insert(ip_text, view.clone()).await;
        view
    }

    pub async fn sweep(&self) {
        self.cache.sweep().await;
    }

    pub async fn clear(&self) {
        self.cache.clear().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::zone::Zone;

    #[test]
    fn strips_v4_port() {
        assert_eq!(strip_port("192.0.2.1:53"), "192.0.2.1");
    }

    #[test]
    fn strips_bracketed_v6_port() {
        assert_eq!(strip_port("[2001:db8::1]:53"), "2001:db8::1");
    }

    #[test]
    fn leaves_bare_v6_untouched() {
        assert_eq!(strip_port("2001:db8::1"), "2001:db8::1");
    }

    #[tokio::test]
    async fn resolves_via_asn_map() {
        let zone = Zone::from_str("[comcast]\nas: 7922\n");
        let view_map = zone.derive_view_map();
        let geo = GeoTable::new(vec![crate::dns::geo::GeoRange {
            start: [0; 16],
            end: [0xff; 16],
            asn: "7922".to_string(),
            isp: String::new(),
            country: String::new(),
        }]);
        let resolver = ViewResolver::new(100);
        assert_eq!(resolver.view_of("203.0.113.1:53", &geo, &view_map).await, "comcast");
    }

    #[tokio::test]
    async fn falls_back_to_default() {
        let resolver = ViewResolver::new(100);
        let geo = GeoTable::new(vec![]);
        let view_map = ViewMap::default();
        assert_eq!(resolver.view_of("203.0.113.1:53", &geo, &view_map).await, DEFAULT_VIEW);
    }
}
