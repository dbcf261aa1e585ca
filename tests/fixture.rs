//! Shared fixture zone covering the nine end-to-end scenarios in spec.md
//! §8's testable-properties table. Not a `#[cfg(test)]` module: plain
//! integration-test support code, included per-file via `mod fixture;`.

pub const ZONE: &str = "\
[default]
a.example.com: A 192.0.2.1
ds.example.com: AAAA 2001:db8::1
expand.example.com:
  - EXPAND a.example.com
*.wildcard.example.com: A 192.0.2.1
fb.example.com:
  - HC check_false primary.example.com
  - FB backup.example.com
primary.example.com: A 192.0.2.2
backup.example.com: A 192.0.2.3
nofb.example.com:
  - HC check_false one.example.com
  - HC check_false two.example.com
one.example.com: A 192.0.2.1
two.example.com: A 192.0.2.2
foreigncname.example.com:
  - CNAME ds.example.org
example.com:
  - SOA ns1.example.com admin.example.com 1 3600 600 604800 300
  - NS ns1.example.com
  - NS ns2.example.com
ns1.example.com:
  - A 198.51.100.1
  - AAAA 2001:db8::53
ns2.example.com:
  - A 198.51.100.2
";

pub fn tokens() -> gslbd::dns::tokenizer::TokenCache {
    gslbd::dns::tokenizer::TokenCache::new(1000)
}

pub fn health() -> std::sync::Arc<gslbd::health::HealthRegistry> {
    gslbd::health::HealthRegistry::new(|| {})
}
