//! Front-end resolver (spec.md §4.G): assembles authoritative response
//! sections from the back-end resolver's output, with glue discovery,
//! NXDOMAIN/REFUSED policy, and rotation on cache hit.
//!
//! Grounded on `original_source/compute.go`'s `LookupFrontEnd` /
//! `LookupFrontEndNoCache` pair and `dns_gslb.go`'s RR-line canonicalizer.
//! The front-end cache is its own type rather than reusing `SweepCache`
//! because rotate-on-read needs to mutate the stored entry under the
//! writer lock in the same critical section as the read, per spec.md §9's
//! "cache rotation on read" design note.

use std::collections::{HashMap, HashSet};

use hickory_server::proto::op::ResponseCode;
use tokio::sync::RwLock;

use crate::cache::rotation::rotate_left_one;
use crate::config::zone::Zone;
use crate::health::HealthRegistry;

use super::backend::BackendResolver;
use super::tokenizer::TokenCache;
use super::trace::TraceSink;

fn canonical(name: &str) -> String {
    let lower = name.to_ascii_lowercase();
    lower.strip_suffix('.').map(str::to_string).unwrap_or(lower)
}

fn ensure_dot(name: &str) -> String {
    if name.ends_with('.') { name.to_string() } else { format!("{name}.") }
}

fn is_address_line(line: &str) -> bool {
    matches!(
        line.split_whitespace().next().map(str::to_ascii_uppercase).as_deref(),
        Some("A") | Some("AAAA")
    )
}

fn record_type(line: &str) -> Option<String> {
    line.split_whitespace().next().map(str::to_ascii_uppercase)
}

/// Canonicalizes a raw back-end line into presentation form: owner name
/// dot-terminated, TTL always 300, type uppercased, CNAME/NS/MX/SRV target
/// hostnames lowercased and dot-terminated (spec.md §4.G step 10).
///
/// Grounded on `original_source/compute.go`'s `CreateRRString`, which
/// always emits `TheOneAndOnlyTTL` (300) rather than reading one from the
/// rdata: an MX or SRV line's leading integer is preference/priority, not
/// a TTL, and must never be stripped.
fn canonicalize(owner: &str, raw_line: &str) -> String {
    const TTL: u32 = 300;
    let mut fields = raw_line.split_whitespace();
    let rtype = fields.next().unwrap_or("").to_ascii_uppercase();
    let rest: Vec<&str> = fields.collect();

    let rdata = match rtype.as_str() {
        "CNAME" | "NS" if !rest.is_empty() => vec![ensure_dot(&rest[0].to_ascii_lowercase())],
        "MX" if rest.len() >= 2 => vec![rest[0].to_string(), ensure_dot(&rest[1].to_ascii_lowercase())],
        "SRV" if rest.len() >= 4 => vec![
            rest[0].to_string(),
            rest[1].to_string(),
            rest[2].to_string(),
            ensure_dot(&rest[3].to_ascii_lowercase()),
        ],
        _ => rest.iter().map(|s| s.to_string()).collect(),
    };

    format!("{} {} {} {}", ensure_dot(owner), TTL, rtype, rdata.join(" "))
}

/// Climbs from `qname` (inclusive) to the apex, returning every
/// `(owner, values)` pair that has a zone entry, closest first.
fn climb(zone: &Zone, view: &str, qname: &str) -> Vec<(String, Vec<String>)> {
    let labels: Vec<&str> = qname.split('.').filter(|s| !s.is_empty()).collect();
    let mut out = Vec::new();
    for i in 0..labels.len() {
        let suffix = labels[i..].join(".");
        if let Some(values) = zone.get(view, &suffix) {
            out.push((suffix, values.to_vec()));
        }
    }
    out
}

fn find_soa(zone: &Zone, view: &str, qname: &str) -> Option<(String, String)> {
    climb(zone, view, qname).into_iter().find_map(|(owner, values)| {
        values
            .iter()
            .find(|l| record_type(l).as_deref() == Some("SOA"))
            .map(|l| (owner, l.clone()))
    })
}

fn find_ns(zone: &Zone, view: &str, qname: &str) -> Option<(String, Vec<String>)> {
    climb(zone, view, qname).into_iter().find_map(|(owner, values)| {
        let ns: Vec<String> = values.iter().filter(|l| record_type(l).as_deref() == Some("NS")).cloned().collect();
        (!ns.is_empty()).then_some((owner, ns))
    })
}

/// Assembled authoritative response, pre-wire-packing.
#[derive(Debug, Clone, Default)]
pub struct LookupResult {
    pub answer: Vec<String>,
    pub authority: Vec<String>,
    pub additional: Vec<String>,
    pub aa: bool,
    pub rcode: ResponseCode,
}

type FeKey = (String, String, String);

struct FeEntry {
    result: LookupResult,
    recent: bool,
}

/// Front-end result cache: rotates the stored answer section on every read
/// and writes the rotated copy back, under one writer-lock critical section.
pub struct FrontendCache {
    inner: RwLock<HashMap<FeKey, FeEntry>>,
    max_size: usize,
}

impl FrontendCache {
    pub fn new(max_size: usize) -> Self {
        FrontendCache { inner: RwLock::new(HashMap::new()), max_size }
    }

    async fn get_rotated(&self, key: &FeKey) -> Option<LookupResult> {
        let mut map = self.inner.write().await;
        let entry = map.get_mut(key)?;
        entry.recent = true;
        rotate_left_one(&mut entry.result.answer);
        Some(entry.result.clone())
    }

    async fn insert(&self, key: FeKey, result: LookupResult) {
        let mut map = self.inner.write().await;
        if map.len() >= self.max_size && !map.contains_key(&key) {
            map.clear();
        }
        map.insert(key, FeEntry { result, recent: true });
    }

    pub async fn sweep(&self) {
        let mut map = self.inner.write().await;
        map.retain(|_, entry| std::mem::take(&mut entry.recent));
    }

    pub async fn clear(&self) {
        *self.inner.write().await = HashMap::new();
    }
}

pub struct FrontendResolver {
    cache: FrontendCache,
}

impl FrontendResolver {
    pub fn new(max_size: usize) -> Self {
        FrontendResolver { cache: FrontendCache::new(max_size) }
    }

    pub async fn resolve(
        &self,
        zone: &Zone,
        health: &HealthRegistry,
        tokens: &TokenCache,
        backend: &BackendResolver,
        qname: &str,
        view: &str,
        qtype: &str,
    ) -> LookupResult {
        let qname = canonical(qname);
        let qtype_uc = qtype.to_ascii_uppercase();
        let key: FeKey = (qname.clone(), view.to_string(), qtype_uc.clone());

        if let Some(rotated) = self.cache.get_rotated(&key).await {
            return rotated;
        }

        let result = resolve_no_cache(zone, health, tokens, backend, &qname, view, &qtype_uc, None).await;
        self.cache.insert(key, result.clone()).await;
        result
    }

    /// As `resolve`, but always bypasses the front-end cache and records a
    /// step-by-step account of every decision into `trace`, for the
    /// `/gslb/trace` diagnostic endpoint (spec.md §4.J).
    pub async fn resolve_traced(
        &self,
        zone: &Zone,
        health: &HealthRegistry,
        tokens: &TokenCache,
        backend: &BackendResolver,
        qname: &str,
        view: &str,
        qtype: &str,
        trace: &TraceSink,
    ) -> LookupResult {
        let qname = canonical(qname);
        let qtype_uc = qtype.to_ascii_uppercase();
        trace.push(format!("frontend: resolving {qname} type={qtype_uc} view={view}"));
        resolve_no_cache(zone, health, tokens, backend, &qname, view, &qtype_uc, Some(trace)).await
    }

    pub async fn sweep(&self) {
        self.cache.sweep().await;
    }

    pub async fn clear(&self) {
        self.cache.clear().await;
    }
}

#[allow(clippy::too_many_arguments)]
async fn resolve_no_cache(
    zone: &Zone,
    health: &HealthRegistry,
    tokens: &TokenCache,
    backend: &BackendResolver,
    qname: &str,
    view: &str,
    qtype: &str,
    trace: Option<&TraceSink>,
) -> LookupResult {
    let raw = backend.resolve_opt(zone, health, tokens, qname, view, false, trace).await;

    // DELEGATE: non-authoritative hand-off. NS records placed in authority
    // (RFC-conventional; spec.md §9 flags the append-to-additional reading
    // as the likely bug and recommends this fix) with A/AAAA glue gathered
    // per target in additional.
    if let Some(delegate) = raw.iter().find(|l| record_type(l).as_deref() == Some("DELEGATE")) {
        if let Some(t) = trace {
            t.push(format!("frontend: {qname} delegates via {delegate}"));
        }
        let toks = super::tokenizer::tokenize(delegate);
        let targets = toks.get(2..).unwrap_or_default();
        let mut authority = Vec::new();
        let mut additional = Vec::new();
        for target in targets {
            authority.push(canonicalize(qname, &format!("NS {target}")));
            let glue = backend.resolve_opt(zone, health, tokens, target, view, true, trace).await;
            for line in glue.iter().filter(|l| is_address_line(l)) {
                additional.push(canonicalize(target, line));
            }
        }
        return LookupResult { answer: Vec::new(), authority, additional, aa: false, rcode: ResponseCode::NoError };
    }

    // CNAME: coexists with nothing else.
    if let Some(cname) = raw.iter().find(|l| record_type(l).as_deref() == Some("CNAME")) {
        if let Some(t) = trace {
            t.push(format!("frontend: {qname} is a CNAME ({cname}), returned alone"));
        }
        return LookupResult {
            answer: vec![canonicalize(qname, cname)],
            authority: Vec::new(),
            additional: Vec::new(),
            aa: true,
            rcode: ResponseCode::NoError,
        };
    }

    let mut answer: Vec<String> = raw
        .iter()
        .filter(|l| qtype == "ANY" || record_type(l).as_deref() == Some(qtype))
        .map(|l| canonicalize(qname, l))
        .collect();

    let mut result = if raw.is_empty() {
        // Unknown name: climb for an enclosing SOA.
        match find_soa(zone, view, qname) {
            Some((owner, soa)) => {
                if let Some(t) = trace {
                    t.push(format!("frontend: {qname} unknown, NXDOMAIN with enclosing SOA at {owner}"));
                }
                LookupResult {
                    answer: Vec::new(),
                    authority: vec![canonicalize(&owner, &soa)],
                    additional: Vec::new(),
                    aa: true,
                    rcode: ResponseCode::NXDomain,
                }
            }
            None => {
                if let Some(t) = trace {
                    t.push(format!("frontend: {qname} unknown, no enclosing SOA, REFUSED"));
                }
                LookupResult { answer: Vec::new(), authority: Vec::new(), additional: Vec::new(), aa: false, rcode: ResponseCode::Refused }
            }
        }
    } else if answer.is_empty() {
        // Known name, no record of the requested type.
        if let Some(t) = trace {
            t.push(format!("frontend: {qname} known but has no {qtype} record"));
        }
        let authority = find_soa(zone, view, qname).map(|(owner, soa)| vec![canonicalize(&owner, &soa)]).unwrap_or_default();
        LookupResult { answer: Vec::new(), authority, additional: Vec::new(), aa: true, rcode: ResponseCode::NoError }
    } else {
        let authority = if qtype == "NS" {
            Vec::new()
        } else {
            find_ns(zone, view, qname)
                .map(|(owner, records)| records.iter().map(|l| canonicalize(&owner, l)).collect())
                .unwrap_or_default()
        };
        LookupResult { answer: std::mem::take(&mut answer), authority, additional: Vec::new(), aa: true, rcode: ResponseCode::NoError }
    };

    // Glue pass: every NS target seen in authority or answer gets its
    // A/AAAA looked up (skip_hc=true) and appended to additional, once each.
    let mut glued: HashSet<String> = HashSet::new();
    for line in result.authority.iter().chain(result.answer.iter()).cloned().collect::<Vec<_>>() {
        if record_type(&line).as_deref() != Some("NS") {
            continue;
        }
        let Some(target) = line.split_whitespace().nth(3) else { continue };
        let target = target.trim_end_matches('.').to_string();
        if !glued.insert(target.clone()) {
            continue;
        }
        if let Some(t) = trace {
            t.push(format!("frontend: gluing {target}"));
        }
        let glue = backend.resolve_opt(zone, health, tokens, &target, view, true, trace).await;
        for g in glue.iter().filter(|l| is_address_line(l)) {
            result.additional.push(canonicalize(&target, g));
        }
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens() -> TokenCache {
        TokenCache::new(1000)
    }

    fn health() -> std::sync::Arc<HealthRegistry> {
        HealthRegistry::new(|| {})
    }

    const FIXTURE: &str = "\
[default]
a.example.com: A 192.0.2.1
example.com:
  - SOA ns1.example.com admin.example.com 1 3600 600 604800 300
  - NS ns1.example.com
  - NS ns2.example.com
ns1.example.com:
  - A 198.51.100.1
  - AAAA 2001:db8::53
foreigncname.example.com:
  - CNAME ds.example.org
";

    #[tokio::test]
    async fn answers_a_record_with_ns_and_glue() {
        let zone = Zone::from_str(FIXTURE);
        let fe = FrontendResolver::new(100);
        let backend = BackendResolver::new(100);
        let result = fe.resolve(&zone, &health(), &tokens(), &backend, "a.example.com", "default", "A").await;
        assert_eq!(result.answer, vec!["a.example.com. 300 A 192.0.2.1".to_string()]);
        assert_eq!(result.authority.len(), 2);
        assert!(result.aa);
        assert_eq!(result.rcode, ResponseCode::NoError);
    }

    #[tokio::test]
    async fn unknown_name_with_soa_is_nxdomain() {
        let zone = Zone::from_str(FIXTURE);
        let fe = FrontendResolver::new(100);
        let backend = BackendResolver::new(100);
        let result = fe.resolve(&zone, &health(), &tokens(), &backend, "dne.example.com", "default", "A").await;
        assert_eq!(result.rcode, ResponseCode::NXDomain);
        assert!(result.aa);
        assert!(result.answer.is_empty());
        assert_eq!(result.authority.len(), 1);
    }

    #[tokio::test]
    async fn unknown_name_without_soa_is_refused() {
        let zone = Zone::from_str(FIXTURE);
        let fe = FrontendResolver::new(100);
        let backend = BackendResolver::new(100);
        let result = fe.resolve(&zone, &health(), &tokens(), &backend, "dne.example.org", "default", "A").await;
        assert_eq!(result.rcode, ResponseCode::Refused);
        assert!(!result.aa);
        assert!(result.answer.is_empty() && result.authority.is_empty() && result.additional.is_empty());
    }

    #[tokio::test]
    async fn foreign_cname_returned_alone() {
        let zone = Zone::from_str(FIXTURE);
        let fe = FrontendResolver::new(100);
        let backend = BackendResolver::new(100);
        let result = fe.resolve(&zone, &health(), &tokens(), &backend, "foreigncname.example.com", "default", "A").await;
        assert_eq!(result.answer, vec!["foreigncname.example.com. 300 CNAME ds.example.org.".to_string()]);
        assert!(result.authority.is_empty());
        assert!(result.additional.is_empty());
    }

    #[tokio::test]
    async fn cache_hit_rotates_answer_section() {
        let zone = Zone::from_str(
            "[default]\nmulti.example.com:\n  - A 192.0.2.1\n  - A 192.0.2.2\n  - A 192.0.2.3\n",
        );
        let fe = FrontendResolver::new(100);
        let backend = BackendResolver::new(100);
        let first = fe.resolve(&zone, &health(), &tokens(), &backend, "multi.example.com", "default", "A").await;
        let second = fe.resolve(&zone, &health(), &tokens(), &backend, "multi.example.com", "default", "A").await;
        assert_eq!(first.answer.len(), second.answer.len());
        assert_ne!(first.answer, second.answer);
    }

    #[tokio::test]
    async fn mx_preference_is_not_mistaken_for_a_ttl() {
        let zone = Zone::from_str("[default]\nmail.example.com:\n  - MX 10 mx1.example.com\n");
        let fe = FrontendResolver::new(100);
        let backend = BackendResolver::new(100);
        let result = fe.resolve(&zone, &health(), &tokens(), &backend, "mail.example.com", "default", "MX").await;
        assert_eq!(result.answer, vec!["mail.example.com. 300 MX 10 mx1.example.com.".to_string()]);
    }

    #[tokio::test]
    async fn srv_priority_is_not_mistaken_for_a_ttl() {
        let zone = Zone::from_str("[default]\n_sip._tcp.example.com:\n  - SRV 10 60 5060 sip.example.com\n");
        let fe = FrontendResolver::new(100);
        let backend = BackendResolver::new(100);
        let result = fe.resolve(&zone, &health(), &tokens(), &backend, "_sip._tcp.example.com", "default", "SRV").await;
        assert_eq!(result.answer, vec!["_sip._tcp.example.com. 300 SRV 10 60 5060 sip.example.com.".to_string()]);
    }

    #[tokio::test]
    async fn traced_resolve_records_resolution_steps() {
        let zone = Zone::from_str(FIXTURE);
        let fe = FrontendResolver::new(100);
        let backend = BackendResolver::new(100);
        let sink = crate::dns::trace::TraceSink::new();
        let result = fe.resolve_traced(&zone, &health(), &tokens(), &backend, "a.example.com", "default", "A", &sink).await;
        assert_eq!(result.answer, vec!["a.example.com. 300 A 192.0.2.1".to_string()]);
        let lines = sink.into_lines();
        assert!(lines.iter().any(|l| l.contains("resolving a.example.com")));
        assert!(lines.iter().any(|l| l.contains("gluing")));
    }
}
