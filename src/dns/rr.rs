//! RR parser cache (spec.md §4.H): text presentation line → wire `Record`.
//!
//! The presentation form produced by `dns::frontend`'s canonicalizer is
//! always `"<owner>. <ttl> <TYPE> <rdata…>"`. Parsing is hand-rolled rather
//! than routed through a zone-file lexer because the core contract only
//! ever sees this one canonical shape. Every lookup returns an owned
//! `Record`, which is a deep copy by construction — safe for the dispatcher
//! to mutate in place when applying the 0x20 hack (spec.md §4.J step 9).

use std::net::{Ipv4Addr, Ipv6Addr};
use std::str::FromStr;

use hickory_server::proto::rr::rdata::{A, AAAA, CNAME, MX, NS, SOA, SRV, TXT};
use hickory_server::proto::rr::{Name, RData, Record};

use crate::cache::SweepCache;
use crate::error::dns::DnsError;

fn bad(text: &str) -> DnsError {
    DnsError::PackFailure(format!("unparseable RR line: {:?}", text))
}

/// Parses one canonicalized presentation line into a wire `Record`.
pub fn parse(text: &str) -> Result<Record, DnsError> {
    let mut fields = text.split_whitespace();
    let owner = fields.next().ok_or_else(|| bad(text))?;
    let ttl: u32 = fields.next().ok_or_else(|| bad(text))?.parse().map_err(|_| bad(text))?;
    let rtype = fields.next().ok_or_else(|| bad(text))?.to_ascii_uppercase();
    let rest: Vec<&str> = fields.collect();

    let name = Name::from_str(owner).map_err(|_| bad(text))?;

    let rdata = match rtype.as_str() {
        "A" => {
            let addr: Ipv4Addr = rest.first().ok_or_else(|| bad(text))?.parse().map_err(|_| bad(text))?;
            RData::A(A(addr))
        }
        "AAAA" => {
            let addr: Ipv6Addr = rest.first().ok_or_else(|| bad(text))?.parse().map_err(|_| bad(text))?;
            RData::AAAA(AAAA(addr))
        }
        "CNAME" => {
            let target = Name::from_str(rest.first().ok_or_else(|| bad(text))?).map_err(|_| bad(text))?;
            RData::CNAME(CNAME(target))
        }
        "NS" => {
            let target = Name::from_str(rest.first().ok_or_else(|| bad(text))?).map_err(|_| bad(text))?;
            RData::NS(NS(target))
        }
        "TXT" | "SPF" => {
            let strings = rest.iter().map(|s| s.trim_matches('"').to_string()).collect();
            RData::TXT(TXT::new(strings))
        }
        "MX" => {
            let preference: u16 = rest.first().ok_or_else(|| bad(text))?.parse().map_err(|_| bad(text))?;
            let exchange = Name::from_str(rest.get(1).ok_or_else(|| bad(text))?).map_err(|_| bad(text))?;
            RData::MX(MX::new(preference, exchange))
        }
        "SRV" => {
            let priority: u16 = rest.first().ok_or_else(|| bad(text))?.parse().map_err(|_| bad(text))?;
            let weight: u16 = rest.get(1).ok_or_else(|| bad(text))?.parse().map_err(|_| bad(text))?;
            let port: u16 = rest.get(2).ok_or_else(|| bad(text))?.parse().map_err(|_| bad(text))?;
            let target = Name::from_str(rest.get(3).ok_or_else(|| bad(text))?).map_err(|_| bad(text))?;
            RData::SRV(SRV::new(priority, weight, port, target))
        }
        "SOA" => {
            if rest.len() < 7 {
                return Err(bad(text));
            }
            let mname = Name::from_str(rest[0]).map_err(|_| bad(text))?;
            let rname = Name::from_str(rest[1]).map_err(|_| bad(text))?;
            let serial: u32 = rest[2].parse().map_err(|_| bad(text))?;
            let refresh: i32 = rest[3].parse().map_err(|_| bad(text))?;
            let retry: i32 = rest[4].parse().map_err(|_| bad(text))?;
            let expire: i32 = rest[5].parse().map_err(|_| bad(text))?;
            let minimum: u32 = rest[6].parse().map_err(|_| bad(text))?;
            RData::SOA(SOA::new(mname, rname, serial, refresh, retry, expire, minimum))
        }
        _ => return Err(bad(text)),
    };

    Ok(Record::from_rdata(name, ttl, rdata))
}

/// Memoizing wrapper over [`parse`], keyed by the raw presentation line.
pub struct RrCache {
    cache: SweepCache<String, Record>,
}

impl RrCache {
    pub fn new(max_size: usize) -> Self {
        RrCache { cache: SweepCache::new(max_size) }
    }

    /// Always hands back an owned, independently mutable `Record`.
    pub async fn parse(&self, text: &str) -> Result<Record, DnsError> {
        if let Some(cached) = self.cache.get(&text.to_string()).await {
            return Ok(cached);
        }
        let record = parse(text)?;
        self.cache.insert(text.to_string(), record.clone()).await;
        Ok(record)
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

    #[test]
    fn parses_a_record() {
        let rec = parse("a.example.com. 300 A 192.0.2.1").unwrap();
        assert_eq!(rec.ttl(), 300);
        assert_eq!(rec.name().to_string(), "a.example.com.");
    }

    #[test]
    fn parses_cname_record() {
        let rec = parse("alias.example.com. 300 CNAME target.example.com.").unwrap();
        assert!(matches!(rec.data(), RData::CNAME(_)));
    }

    #[test]
    fn rejects_unknown_type() {
        assert!(parse("x.example.com. 300 BOGUS foo").is_err());
    }

    #[tokio::test]
    async fn cache_returns_independent_copies() {
        let cache = RrCache::new(10);
        let a = cache.parse("a.example.com. 300 A 192.0.2.1").await.unwrap();
        let b = cache.parse("a.example.com. 300 A 192.0.2.1").await.unwrap();
        assert_eq!(a.ttl(), b.ttl());
    }
}
