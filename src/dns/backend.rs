//! Back-end resolver (spec.md §4.F): recursive directive expansion over the
//! zone store plus health-check state.
//!
//! Grounded on `original_source/compute.go`'s `LookupBackEnd`/`lookupBE`
//! pair: the same directive classification (literal / EXPAND / CNAME / HC /
//! FB), the same fail-open re-run with `skip_hc=true` when every HC for a
//! name is down, and memoization of only non-empty results. Recursion depth
//! is capped and a per-call-stack visited set breaks cycles, per the
//! "depth counter or visited set" options spec.md §9 leaves open — this
//! uses both.

use std::collections::HashSet;
use std::future::Future;
use std::pin::Pin;

use crate::cache::SweepCache;
use crate::config::zone::Zone;
use crate::health::HealthRegistry;

use super::tokenizer::TokenCache;
use super::trace::TraceSink;

const MAX_DEPTH: usize = 32;

type BeKey = (String, String, bool);

fn canonical(name: &str) -> String {
    let lower = name.to_ascii_lowercase();
    lower.strip_suffix('.').map(str::to_string).unwrap_or(lower)
}

fn is_address_line(line: &str) -> bool {
    matches!(
        line.split_whitespace().next().map(str::to_ascii_uppercase).as_deref(),
        Some("A") | Some("AAAA")
    )
}

/// Zone lookup with the single-level wildcard fallback from spec.md §4.F
/// step 3: `foo.example.com` missing retries as `*.example.com`, but a
/// wildcard miss is never itself retried.
fn lookup_values<'z>(zone: &'z Zone, view: &str, qname: &str) -> Option<&'z [String]> {
    if let Some(values) = zone.get(view, qname) {
        return Some(values);
    }
    if qname.starts_with("*.") {
        return None;
    }
    let (_, rest) = qname.split_once('.')?;
    zone.get(view, &format!("*.{rest}"))
}

/// Caches `(qname, view, skip_hc) -> expanded RR lines`, memoizing only
/// non-empty results per spec.md §3's invariant.
pub struct BackendResolver {
    cache: SweepCache<BeKey, Vec<String>>,
}

impl BackendResolver {
    pub fn new(max_size: usize) -> Self {
        BackendResolver { cache: SweepCache::new(max_size) }
    }

    pub async fn resolve(
        &self,
        zone: &Zone,
        health: &HealthRegistry,
        tokens: &TokenCache,
        qname: &str,
        view: &str,
        skip_hc: bool,
    ) -> Vec<String> {
        self.resolve_opt(zone, health, tokens, qname, view, skip_hc, None).await
    }

    /// As `resolve`, but records a human-readable line for every
    /// expansion/health-check/fallback decision into `trace`, for the
    /// `/gslb/trace` diagnostic endpoint.
    pub async fn resolve_traced(
        &self,
        zone: &Zone,
        health: &HealthRegistry,
        tokens: &TokenCache,
        qname: &str,
        view: &str,
        skip_hc: bool,
        trace: &TraceSink,
    ) -> Vec<String> {
        self.resolve_opt(zone, health, tokens, qname, view, skip_hc, Some(trace)).await
    }

    pub(crate) async fn resolve_opt<'a>(
        &'a self,
        zone: &'a Zone,
        health: &'a HealthRegistry,
        tokens: &'a TokenCache,
        qname: &'a str,
        view: &'a str,
        skip_hc: bool,
        trace: Option<&'a TraceSink>,
    ) -> Vec<String> {
        let mut visited = HashSet::new();
        self.resolve_inner(zone, health, tokens, qname, view, skip_hc, &mut visited, 0, trace).await
    }

    #[allow(clippy::too_many_arguments)]
    fn resolve_inner<'a>(
        &'a self,
        zone: &'a Zone,
        health: &'a HealthRegistry,
        tokens: &'a TokenCache,
        qname: &'a str,
        view: &'a str,
        skip_hc: bool,
        visited: &'a mut HashSet<BeKey>,
        depth: usize,
        trace: Option<&'a TraceSink>,
    ) -> Pin<Box<dyn Future<Output = Vec<String>> + Send + 'a>> {
        Box::pin(async move {
            let qname = canonical(qname);
            let key: BeKey = (qname.clone(), view.to_string(), skip_hc);

            if let Some(cached) = self.cache.get(&key).await {
                if let Some(t) = trace {
                    t.push(format!("backend: cache hit for {qname} (view={view}, skip_hc={skip_hc})"));
                }
                return cached;
            }
            if depth >= MAX_DEPTH || !visited.insert(key.clone()) {
                if let Some(t) = trace {
                    t.push(format!("backend: depth/cycle guard stopped expansion of {qname}"));
                }
                return Vec::new();
            }

            let mut output = Vec::new();
            let mut hc_seen = false;

            if let Some(values) = lookup_values(zone, view, &qname) {
                for line in values.to_vec() {
                    let line_tokens = tokens.tokenize(&line).await;
                    let Some(directive) = line_tokens.first() else { continue };

                    match directive.to_ascii_uppercase().as_str() {
                        "EXPAND" | "CNAME" => {
                            let is_cname = directive.eq_ignore_ascii_case("cname");
                            let Some(target) = line_tokens.get(1) else { continue };
                            if let Some(t) = trace {
                                t.push(format!("backend: {directive} {qname} -> {target}"));
                            }
                            let expanded = self
                                .resolve_inner(zone, health, tokens, target, view, skip_hc, visited, depth + 1, trace)
                                .await;
                            if !expanded.is_empty() {
                                output.extend(expanded);
                            } else if is_cname {
                                output.push(format!("CNAME {target}"));
                            }
                        }
                        "HC" => {
                            hc_seen = true;
                            if let (Some(service), Some(target)) = (line_tokens.get(1), line_tokens.get(2)) {
                                let (up, _known) = health.get(service, target).await;
                                if let Some(t) = trace {
                                    t.push(format!(
                                        "backend: HC {service}/{target} is {}",
                                        if up { "up" } else { "down" }
                                    ));
                                }
                                if skip_hc || up {
                                    let expanded = self
                                        .resolve_inner(
                                            zone,
                                            health,
                                            tokens,
                                            target,
                                            view,
                                            skip_hc,
                                            visited,
                                            depth + 1,
                                            trace,
                                        )
                                        .await;
                                    output.extend(expanded);
                                }
                            }
                        }
                        "FB" => {
                            let has_addr = output.iter().any(|l: &String| is_address_line(l));
                            if !has_addr {
                                if let Some(target) = line_tokens.get(1) {
                                    if let Some(t) = trace {
                                        t.push(format!("backend: FB falling back to {target} for {qname}"));
                                    }
                                    let expanded = self
                                        .resolve_inner(
                                            zone,
                                            health,
                                            tokens,
                                            target,
                                            view,
                                            skip_hc,
                                            visited,
                                            depth + 1,
                                            trace,
                                        )
                                        .await;
                                    output.extend(expanded);
                                }
                            }
                        }
                        _ => output.push(line),
                    }
                }
            }

            visited.remove(&key);

            if hc_seen && !skip_hc && !output.iter().any(|l| is_address_line(l)) {
                if let Some(t) = trace {
                    t.push(format!("backend: all health checks down for {qname}, failing open"));
                }
                return self.resolve_inner(zone, health, tokens, &qname, view, true, visited, depth, trace).await;
            }

            if !output.is_empty() {
                self.cache.insert(key, output.clone()).await;
            }
            output
        })
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

    fn tokens() -> TokenCache {
        TokenCache::new(1000)
    }

    fn health() -> std::sync::Arc<HealthRegistry> {
        HealthRegistry::new(|| {})
    }

    #[tokio::test]
    async fn literal_rr_is_returned_verbatim() {
        let zone = Zone::from_str("[default]\na.example.com: A 192.0.2.1\n");
        let be = BackendResolver::new(100);
        let out = be.resolve(&zone, &health(), &tokens(), "a.example.com", "default", false).await;
        assert_eq!(out, vec!["A 192.0.2.1".to_string()]);
    }

    #[tokio::test]
    async fn expand_splices_target_lines() {
        let zone = Zone::from_str(
            "[default]\nexpand.example.com:\n  - EXPAND target.example.com\ntarget.example.com: A 192.0.2.1\n",
        );
        let be = BackendResolver::new(100);
        let out = be.resolve(&zone, &health(), &tokens(), "expand.example.com", "default", false).await;
        assert_eq!(out, vec!["A 192.0.2.1".to_string()]);
    }

    #[tokio::test]
    async fn wildcard_fallback_matches_single_label() {
        let zone = Zone::from_str("[default]\n*.wildcard.example.com: A 192.0.2.1\n");
        let be = BackendResolver::new(100);
        let out = be.resolve(&zone, &health(), &tokens(), "foo.wildcard.example.com", "default", false).await;
        assert_eq!(out, vec!["A 192.0.2.1".to_string()]);
    }

    #[tokio::test]
    async fn fb_only_fires_without_prior_address() {
        let zone = Zone::from_str(
            "[default]\nfb.example.com:\n  - FB backup.example.com\nbackup.example.com: A 192.0.2.3\n",
        );
        let be = BackendResolver::new(100);
        let out = be.resolve(&zone, &health(), &tokens(), "fb.example.com", "default", false).await;
        assert_eq!(out, vec!["A 192.0.2.3".to_string()]);
    }

    #[tokio::test]
    async fn hc_down_without_fb_fails_open_to_every_target() {
        let zone = Zone::from_str(
            "[default]\nnofb.example.com:\n  - HC check_false one.example.com\n  - HC check_false two.example.com\n\
             one.example.com: A 192.0.2.1\ntwo.example.com: A 192.0.2.2\n",
        );
        let be = BackendResolver::new(100);
        let registry = health();
        registry.add("check_false", "one.example.com", 60).await;
        registry.add("check_false", "two.example.com", 60).await;

        let out = be.resolve(&zone, &registry, &tokens(), "nofb.example.com", "default", false).await;
        assert_eq!(out.len(), 2);
        assert!(out.contains(&"A 192.0.2.1".to_string()));
        assert!(out.contains(&"A 192.0.2.2".to_string()));
    }

    #[tokio::test]
    async fn hc_up_target_is_included_and_down_is_dropped() {
        let zone = Zone::from_str(
            "[default]\nmix.example.com:\n  - HC check_true up.example.com\n  - HC check_false down.example.com\n\
             up.example.com: A 192.0.2.1\ndown.example.com: A 192.0.2.2\n",
        );
        let be = BackendResolver::new(100);
        let registry = health();
        registry.add("check_true", "up.example.com", 60).await;
        registry.add("check_false", "down.example.com", 60).await;

        let out = be.resolve(&zone, &registry, &tokens(), "mix.example.com", "default", false).await;
        assert_eq!(out, vec!["A 192.0.2.1".to_string()]);
    }

    #[tokio::test]
    async fn cyclic_expand_terminates() {
        let zone = Zone::from_str(
            "[default]\na.example.com:\n  - EXPAND b.example.com\nb.example.com:\n  - EXPAND a.example.com\n",
        );
        let be = BackendResolver::new(100);
        let out = be.resolve(&zone, &health(), &tokens(), "a.example.com", "default", false).await;
        assert!(out.is_empty());
    }

    #[tokio::test]
    async fn traced_resolve_records_expansion_steps() {
        let zone = Zone::from_str(
            "[default]\nexpand.example.com:\n  - EXPAND target.example.com\ntarget.example.com: A 192.0.2.1\n",
        );
        let be = BackendResolver::new(100);
        let trace = TraceSink::new();
        let out = be.resolve_traced(&zone, &health(), &tokens(), "expand.example.com", "default", false, &trace).await;
        assert_eq!(out, vec!["A 192.0.2.1".to_string()]);
        let lines = trace.into_lines();
        assert!(lines.iter().any(|l| l.contains("EXPAND expand.example.com -> target.example.com")));
    }
}
