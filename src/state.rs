//! Process-wide state: atomically published config/zone/geo/view snapshots,
//! plus the cache and health-check singletons (spec.md §5, §9).
//!
//! Grounded on `other_examples` aardvark-dns's `&'static ArcSwap<DNSBackend>`
//! pattern for the snapshot side (the teacher itself never needs hot
//! reload); the cache/health singletons are injectable collaborators
//! constructed once at startup and threaded through a context, per spec.md
//! §9's "avoid hidden module-level state" note.

use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;

use crate::config::zone::{ViewMap, Zone};
use crate::config::Config;
use crate::dns::backend::BackendResolver;
use crate::dns::frontend::FrontendResolver;
use crate::dns::geo::GeoTable;
use crate::dns::packed::PackedCache;
use crate::dns::rr::RrCache;
use crate::dns::tokenizer::TokenCache;
use crate::dns::view::ViewResolver;
use crate::error::Result;
use crate::health::HealthRegistry;

/// One config/zone/geo/view generation, published atomically.
pub struct Snapshot {
    pub config: Config,
    pub zone: Zone,
    pub geo: GeoTable,
    pub view_map: ViewMap,
}

/// Everything a query or a probe needs, constructed once at startup.
pub struct GlobalState {
    pub snapshot: ArcSwap<Snapshot>,
    pub health: Arc<HealthRegistry>,
    pub tokens: TokenCache,
    pub backend: BackendResolver,
    pub frontend: FrontendResolver,
    pub rr: RrCache,
    pub packed: PackedCache,
    pub view: ViewResolver,
    pub debug: std::sync::atomic::AtomicBool,
}

impl GlobalState {
    pub async fn new(etc_dir: &std::path::Path) -> Result<Arc<GlobalState>> {
        let snapshot = load_snapshot(etc_dir)?;
        let maxcache = snapshot.config.get_int("default", "maxcache").unwrap_or(10_000) as usize;
        let debug = snapshot.config.get_bool("lookup", "debug").unwrap_or(false);
        let tokens_size = cache_size_of(&snapshot.config, "tokens", maxcache);
        let backend_size = cache_size_of(&snapshot.config, "backend", maxcache);
        let frontend_size = cache_size_of(&snapshot.config, "frontend", maxcache);
        let rr_size = cache_size_of(&snapshot.config, "rr", maxcache);
        let packed_size = cache_size_of(&snapshot.config, "packed", maxcache);
        let view_size = cache_size_of(&snapshot.config, "view", maxcache);

        let state = Arc::new_cyclic(|weak: &std::sync::Weak<GlobalState>| {
            let weak = weak.clone();
            let health = HealthRegistry::new(move || {
                if let Some(state) = weak.upgrade() {
                    tokio::spawn(async move { state.flush_all().await });
                }
            });
            GlobalState {
                snapshot: ArcSwap::new(Arc::new(snapshot)),
                health,
                tokens: TokenCache::new(tokens_size),
                backend: BackendResolver::new(backend_size),
                frontend: FrontendResolver::new(frontend_size),
                rr: RrCache::new(rr_size),
                packed: PackedCache::new(packed_size),
                view: ViewResolver::new(view_size),
                debug: std::sync::atomic::AtomicBool::new(debug),
            }
        });

        state.scan_health_checks().await;
        Ok(state)
    }

    /// Registers every `HC <service> <target>` directive line in the
    /// current zone with the health registry (spec.md §9 "on change ...
    /// rescans E"). `HealthRegistry::add` is idempotent, so pairs already
    /// probing are left alone.
    ///
    /// Grounded on `original_source/global.go`'s `scanForHealthChecks`,
    /// which walks the zone once at startup and again after every reload so
    /// a newly added `HC` line starts probing without a restart.
    async fn scan_health_checks(self: &Arc<Self>) {
        let snapshot = self.snapshot.load();
        for (service, target, interval) in health_check_targets(&snapshot.zone, &snapshot.config) {
            self.health.add(&service, &target, interval).await;
        }
    }

    /// Rebuilds A/C/D from disk and, on success, publishes the new
    /// snapshot, flushes every cache, and rescans E for newly added `HC`
    /// directives (spec.md §2 "control flow for config reload" and "on
    /// change ... rescans E"). Reload failures are logged and the previous
    /// snapshot is retained (spec.md §7).
    pub async fn reload_if_needed(self: &Arc<Self>, etc_dir: &std::path::Path) {
        let needs_reload = {
            let current = self.snapshot.load();
            current.config.need_reload() || current.zone.need_reload()
        };
        if !needs_reload {
            return;
        }
        match load_snapshot(etc_dir) {
            Ok(fresh) => {
                self.snapshot.store(Arc::new(fresh));
                self.flush_all().await;
                self.scan_health_checks().await;
                log::info!("configuration reloaded");
            }
            Err(err) => {
                log::error!("configuration reload failed, retaining previous snapshot: {}", err);
            }
        }
    }

    /// Bulk invalidation across every stage cache (spec.md §2, §3, §8
    /// property 4): fired on config reload and on any health-check
    /// transition.
    pub async fn flush_all(&self) {
        self.tokens.clear().await;
        self.backend.clear().await;
        self.frontend.clear().await;
        self.rr.clear().await;
        self.packed.clear().await;
        self.view.clear().await;
    }

    /// Sweeper: each cache drops entries untouched since the last sweep
    /// (spec.md §5).
    pub async fn sweep_all(&self) {
        self.tokens.sweep().await;
        self.backend.sweep().await;
        self.frontend.sweep().await;
        self.rr.sweep().await;
        self.packed.sweep().await;
        self.view.sweep().await;
    }
}

/// Every distinct `(service, target)` pair named by an `HC` directive
/// anywhere in the zone, paired with its probe interval from
/// `[interval] <service>` (spec.md §6), defaulting to 60s when unset.
fn health_check_targets(zone: &Zone, config: &Config) -> Vec<(String, String, u64)> {
    let mut seen = std::collections::HashSet::new();
    let mut out = Vec::new();
    for (_view, _name, values) in zone.iter() {
        for line in values {
            let mut fields = line.split_whitespace();
            let Some(directive) = fields.next() else { continue };
            if !directive.eq_ignore_ascii_case("hc") {
                continue;
            }
            let (Some(service), Some(target)) = (fields.next(), fields.next()) else { continue };
            if !seen.insert((service.to_string(), target.to_string())) {
                continue;
            }
            let interval = config.get_int("interval", service).unwrap_or(60).max(1) as u64;
            out.push((service.to_string(), target.to_string(), interval));
        }
    }
    out
}

fn cache_size_of(config: &Config, name: &str, fallback: usize) -> usize {
    config.get_int("cachesize", name).map(|n| n as usize).unwrap_or(fallback)
}

fn load_snapshot(etc_dir: &std::path::Path) -> Result<Snapshot> {
    let config = Config::from_file(etc_dir.join("server.conf"))?;
    let zone = Zone::from_file(etc_dir.join("zone.conf"))?;
    let view_map = zone.derive_view_map();
    let geo = GeoTable::default();
    Ok(Snapshot { config, zone, geo, view_map })
}

/// Periodically checks source-file mtimes and triggers a reload (spec.md
/// §2 "control flow for config reload", §5 "a single reloader task").
pub async fn run_reload_ticker(state: Arc<GlobalState>, etc_dir: std::path::PathBuf, interval_s: u64) {
    let mut ticker = tokio::time::interval(Duration::from_secs(interval_s.max(1)));
    loop {
        ticker.tick().await;
        state.reload_if_needed(&etc_dir).await;
    }
}

/// Periodically sweeps every cache (spec.md §5, `interval/clean_cache`).
pub async fn run_sweep_ticker(state: Arc<GlobalState>, interval_s: u64) {
    let mut ticker = tokio::time::interval(Duration::from_secs(interval_s.max(1)));
    loop {
        ticker.tick().await;
        state.sweep_all().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collects_distinct_hc_pairs_with_configured_interval() {
        let zone = Zone::from_str(
            "[default]\nfb.example.com:\n  - HC check_false primary.example.com\n  - FB backup.example.com\n\
             nofb.example.com:\n  - HC check_false one.example.com\n  - HC check_false primary.example.com\n",
        );
        let config = Config::from_str("[interval]\ncheck_false: 15\n");

        let mut targets = health_check_targets(&zone, &config);
        targets.sort();

        assert_eq!(
            targets,
            vec![
                ("check_false".to_string(), "one.example.com".to_string(), 15),
                ("check_false".to_string(), "primary.example.com".to_string(), 15),
            ]
        );
    }

    #[test]
    fn falls_back_to_sixty_seconds_without_an_interval_entry() {
        let zone = Zone::from_str("[default]\nsvc.example.com:\n  - HC check_true target.example.com\n");
        let config = Config::from_str("[default]\nmaxcache: 1000\n");

        let targets = health_check_targets(&zone, &config);
        assert_eq!(targets, vec![("check_true".to_string(), "target.example.com".to_string(), 60)]);
    }
}
