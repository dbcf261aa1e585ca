//! Health-check registry (spec.md §4.E): per-(service,target) status plus
//! a background probe loop for each registered pair.
//!
//! Grounded on `original_source/service.go` and `global.go`'s health map:
//! a single `RwLock`-guarded map keyed by `(service, target)`, with
//! `Add`/`Get`/`Set` operations. The probe loop itself follows
//! `checks.go`'s dispatch plus the jittered-sleep idiom described in
//! spec.md §4.E ("sleep for interval × U[0.9, 1.1]").

pub mod checks;

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use tokio::sync::RwLock;

pub type ServiceTarget = (String, String);

/// Shared status table plus the set of (service, target) pairs that already
/// have a background probe task running.
pub struct HealthRegistry {
    status: RwLock<HashMap<ServiceTarget, bool>>,
    spawned: RwLock<HashSet<ServiceTarget>>,
    on_change: Arc<dyn Fn() + Send + Sync>,
}

impl HealthRegistry {
    /// `on_change` is invoked (synchronously, so it should be cheap — e.g.
    /// spawn a task) whenever a probe's result differs from the last one,
    /// since every cached expansion that depended on it is now stale.
    pub fn new(on_change: impl Fn() + Send + Sync + 'static) -> Arc<Self> {
        Arc::new(HealthRegistry {
            status: RwLock::new(HashMap::new()),
            spawned: RwLock::new(HashSet::new()),
            on_change: Arc::new(on_change),
        })
    }

    /// Idempotent: the first call for a (service, target) pair marks it
    /// DOWN and spawns its probe loop; later calls no-op. Returns whether
    /// the pair was already present.
    pub async fn add(self: &Arc<Self>, service: &str, target: &str, interval_s: u64) -> bool {
        let key = (service.to_string(), target.to_string());
        {
            let mut spawned = self.spawned.write().await;
            if !spawned.insert(key.clone()) {
                return true;
            }
        }
        self.status.write().await.entry(key.clone()).or_insert(false);

        let registry = Arc::clone(self);
        tokio::spawn(async move { registry.probe_loop(key, interval_s).await });
        false
    }

    /// Every `(service, target, up)` row currently tracked, for the
    /// `/gslb/hc` diagnostic dump.
    pub async fn snapshot(&self) -> Vec<(String, String, bool)> {
        self.status.read().await.iter().map(|((service, target), &up)| (service.clone(), target.clone(), up)).collect()
    }

    pub async fn get(&self, service: &str, target: &str) -> (bool, bool) {
        let key = (service.to_string(), target.to_string());
        match self.status.read().await.get(&key) {
            Some(&status) => (status, true),
            None => (false, false),
        }
    }

    /// Returns `(changed, known)`. `known` is false if the pair had never
    /// been registered (the write still happens, matching the Go source's
    /// permissive `Set`).
    pub async fn set(&self, service: &str, target: &str, new_status: bool) -> (bool, bool) {
        let key = (service.to_string(), target.to_string());
        let mut map = self.status.write().await;
        let known = map.contains_key(&key);
        let changed = map.insert(key, new_status) != Some(new_status);
        if changed {
            (self.on_change)();
        }
        (changed, known)
    }

    async fn probe_loop(self: Arc<Self>, key: ServiceTarget, interval_s: u64) {
        let (service, target) = key.clone();
        loop {
            let up = checks::run(&service, &target).await;
            let (changed, _) = self.set(&service, &target, up).await;
            if changed {
                log::info!("health check {}/{} transitioned to {}", service, target, if up { "up" } else { "down" });
            }

            let jitter = rand::thread_rng().gen_range(0.9..1.1);
            let sleep_s = (interval_s as f64 * jitter).max(0.1);
            tokio::time::sleep(Duration::from_secs_f64(sleep_s)).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn add_is_idempotent_and_marks_down_initially() {
        let registry = HealthRegistry::new(|| {});
        let already = registry.add("check_true", "example.com", 60).await;
        assert!(!already);
        let (status, known) = registry.get("check_true", "example.com").await;
        assert!(known);
        assert!(!status);

        let already_again = registry.add("check_true", "example.com", 60).await;
        assert!(already_again);
    }

    #[tokio::test]
    async fn unknown_pair_reports_not_known() {
        let registry = HealthRegistry::new(|| {});
        let (status, known) = registry.get("check_true", "nope.example.com").await;
        assert!(!known);
        assert!(!status);
    }

    #[tokio::test]
    async fn set_fires_on_change_only_when_value_differs() {
        let counter = Arc::new(AtomicUsize::new(0));
        let counter2 = Arc::clone(&counter);
        let registry = HealthRegistry::new(move || {
            counter2.fetch_add(1, Ordering::SeqCst);
        });

        registry.set("check_true", "a", true).await;
        assert_eq!(counter.load(Ordering::SeqCst), 1);
        registry.set("check_true", "a", true).await;
        assert_eq!(counter.load(Ordering::SeqCst), 1, "no change, no flush");
        registry.set("check_true", "a", false).await;
        assert_eq!(counter.load(Ordering::SeqCst), 2);
    }
}
