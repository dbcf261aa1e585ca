//! Geo classifier (spec.md §4.C): IP → (ASN, ISP, country) via a sorted
//! IP-range table.
//!
//! Grounded on `original_source/maxmind.go`: IPv4 and IPv6 addresses are
//! both normalized to 16-byte IPv6-mapped form, ranges are kept sorted by
//! `start`, and lookup does a `partition_point` binary search for the first
//! range whose `end >= ip`, then checks `start <= ip`. The loader itself
//! (CSV parsing) is out of scope per spec.md §1 — `GeoTable` is built from
//! already-parsed rows, leaving file format plumbing to the caller.

use std::net::IpAddr;

/// One contiguous IP range and the network it belongs to.
#[derive(Debug, Clone)]
pub struct GeoRange {
    pub start: [u8; 16],
    pub end: [u8; 16],
    pub asn: String,
    pub isp: String,
    pub country: String,
}

/// Sorted-by-`start` table of IP ranges, as loaded from the geo database.
#[derive(Debug, Clone, Default)]
pub struct GeoTable {
    ranges: Vec<GeoRange>,
}

fn to16(ip: IpAddr) -> [u8; 16] {
    match ip {
        IpAddr::V4(v4) => v4.to_ipv6_mapped().octets(),
        IpAddr::V6(v6) => v6.octets(),
    }
}

impl GeoTable {
    /// Build a table from unsorted rows, sorting by `start` as the Go
    /// source does before the first lookup.
    pub fn new(mut ranges: Vec<GeoRange>) -> Self {
        ranges.sort_by(|a, b| a.start.cmp(&b.start));
        GeoTable { ranges }
    }

    /// `lookup(ip_text) -> (asn, isp, country)`. Unknown or unparseable IPs
    /// return empty strings in all three fields.
    pub fn lookup(&self, ip_text: &str) -> (String, String, String) {
        let Ok(ip) = ip_text.parse::<IpAddr>() else {
            return (String::new(), String::new(), String::new());
        };
        let needle = to16(ip);

        let idx = self.ranges.partition_point(|r| r.end < needle);
        match self.ranges.get(idx) {
            Some(range) if range.start <= needle => {
                (range.asn.clone(), range.isp.clone(), range.country.clone())
            }
            _ => (String::new(), String::new(), String::new()),
        }
    }
}
