//! Per-tenant policy rule cache with TTL refresh and default fallback.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tokio::sync::RwLock;
use tracing::warn;

use pixelwall_core::TenantId;
use pixelwall_domain::{LimitedAgent, RedirectAgent, RuleSetSnapshot};

use crate::ports::RuleRepository;

/// Cache key holding the built-in fallback rule set.
pub const DEFAULT_RULES_KEY: &str = "default";

#[derive(Debug, Clone)]
struct CacheEntry {
    snapshot: RuleSetSnapshot,
    refreshed_at: DateTime<Utc>,
}

/// Process-wide cache of materialized tenant rule sets.
///
/// Entries older than the TTL are reloaded from the rule store before use.
/// A load that returns nothing substitutes the default snapshot, and a load
/// that fails serves whatever is already cached: a tenant is never left
/// filterless because of a transient store problem.
pub struct RuleCache {
    repository: Arc<dyn RuleRepository>,
    ttl_seconds: i64,
    entries: RwLock<HashMap<String, CacheEntry>>,
}

impl RuleCache {
    /// Creates a cache seeded with the built-in default rule set.
    #[must_use]
    pub fn new(repository: Arc<dyn RuleRepository>, ttl_seconds: i64, now: DateTime<Utc>) -> Self {
        let mut entries = HashMap::new();
        entries.insert(
            DEFAULT_RULES_KEY.to_owned(),
            CacheEntry {
                snapshot: Self::builtin_defaults(),
                refreshed_at: now,
            },
        );

        Self {
            repository,
            ttl_seconds,
            entries: RwLock::new(entries),
        }
    }

    /// The deny-list served to tenants without rules of their own: known AI
    /// crawlers blocked, one rate-restricted pattern, one paywall redirect.
    #[must_use]
    pub fn builtin_defaults() -> RuleSetSnapshot {
        RuleSetSnapshot::new(
            vec!["GPTBot".to_owned(), "Perplexity".to_owned()],
            vec![LimitedAgent {
                pattern: "ClaudeAI".to_owned(),
                max_per_day: 5,
            }],
            vec![RedirectAgent {
                pattern: "PaywallLLM".to_owned(),
                url: "https://example.com/paywall".to_owned(),
            }],
        )
    }

    /// Returns the effective rule set for a tenant, reloading when stale.
    ///
    /// Never fails: store errors fall back to the stale entry or the
    /// default snapshot, trading freshness for availability.
    pub async fn get_rules(&self, tenant_id: &TenantId, now: DateTime<Utc>) -> RuleSetSnapshot {
        // The default entry never goes through tenant-store loading.
        if tenant_id.as_str() == DEFAULT_RULES_KEY {
            return self.default_snapshot().await;
        }

        {
            let entries = self.entries.read().await;
            if let Some(entry) = entries.get(tenant_id.as_str())
                && now - entry.refreshed_at <= Duration::seconds(self.ttl_seconds)
            {
                return entry.snapshot.clone();
            }
        }

        match self.repository.list_rules(tenant_id).await {
            Ok(rules) => {
                let loaded = RuleSetSnapshot::from_rules(&rules);
                let snapshot = if loaded.is_empty() {
                    self.default_snapshot().await
                } else {
                    loaded
                };

                let mut entries = self.entries.write().await;
                entries.insert(
                    tenant_id.as_str().to_owned(),
                    CacheEntry {
                        snapshot: snapshot.clone(),
                        refreshed_at: now,
                    },
                );
                snapshot
            }
            Err(error) => {
                warn!(tenant = %tenant_id, %error, "rule store load failed, serving cached rules");
                let entries = self.entries.read().await;
                // A stale entry keeps its timestamp so the next request retries.
                if let Some(stale) = entries.get(tenant_id.as_str()) {
                    return stale.snapshot.clone();
                }
                entries
                    .get(DEFAULT_RULES_KEY)
                    .map(|entry| entry.snapshot.clone())
                    .unwrap_or_default()
            }
        }
    }

    async fn default_snapshot(&self) -> RuleSetSnapshot {
        self.entries
            .read()
            .await
            .get(DEFAULT_RULES_KEY)
            .map(|entry| entry.snapshot.clone())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    use async_trait::async_trait;
    use chrono::{Duration, Utc};

    use pixelwall_core::{AppError, AppResult, TenantId};
    use pixelwall_domain::{PolicyKind, PolicyRule};

    use crate::ports::RuleRepository;

    use super::RuleCache;

    struct FakeRuleRepository {
        rules: Vec<PolicyRule>,
        fail: AtomicBool,
        loads: AtomicUsize,
    }

    impl FakeRuleRepository {
        fn with_rules(rules: Vec<PolicyRule>) -> Self {
            Self {
                rules,
                fail: AtomicBool::new(false),
                loads: AtomicUsize::new(0),
            }
        }

        fn failing() -> Self {
            let repository = Self::with_rules(Vec::new());
            repository.fail.store(true, Ordering::SeqCst);
            repository
        }

        fn start_failing(&self) {
            self.fail.store(true, Ordering::SeqCst);
        }

        fn load_count(&self) -> usize {
            self.loads.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl RuleRepository for FakeRuleRepository {
        async fn list_rules(&self, _tenant_id: &TenantId) -> AppResult<Vec<PolicyRule>> {
            self.loads.fetch_add(1, Ordering::SeqCst);
            if self.fail.load(Ordering::SeqCst) {
                return Err(AppError::Unavailable("rule store down".to_owned()));
            }
            Ok(self.rules.clone())
        }
    }

    fn tenant() -> AppResult<TenantId> {
        TenantId::new("acme")
    }

    fn block_rule(pattern: &str) -> AppResult<PolicyRule> {
        PolicyRule::new(
            uuid::Uuid::nil(),
            tenant()?,
            None,
            pattern,
            PolicyKind::Block,
            None,
            None,
            Utc::now(),
        )
    }

    #[tokio::test]
    async fn fresh_entry_skips_the_store() {
        let rules: Vec<PolicyRule> = block_rule("CCBot").into_iter().collect();
        let repository = Arc::new(FakeRuleRepository::with_rules(rules));
        let t0 = Utc::now();
        let cache = RuleCache::new(repository.clone(), 60, t0);
        let Ok(tenant_id) = tenant() else {
            return;
        };

        let first = cache.get_rules(&tenant_id, t0).await;
        assert_eq!(first.blocked(), ["CCBot"]);
        assert_eq!(repository.load_count(), 1);

        // One second inside the TTL: served from cache.
        let second = cache
            .get_rules(&tenant_id, t0 + Duration::seconds(59))
            .await;
        assert_eq!(second.blocked(), ["CCBot"]);
        assert_eq!(repository.load_count(), 1);

        // One second past the TTL: reloaded.
        cache.get_rules(&tenant_id, t0 + Duration::seconds(61)).await;
        assert_eq!(repository.load_count(), 2);
    }

    #[tokio::test]
    async fn empty_load_falls_back_to_defaults() {
        let repository = Arc::new(FakeRuleRepository::with_rules(Vec::new()));
        let t0 = Utc::now();
        let cache = RuleCache::new(repository, 60, t0);
        let Ok(tenant_id) = tenant() else {
            return;
        };

        let snapshot = cache.get_rules(&tenant_id, t0).await;
        assert_eq!(snapshot, RuleCache::builtin_defaults());
        assert!(!snapshot.is_empty());
    }

    #[tokio::test]
    async fn store_failure_serves_stale_entry() {
        let rules: Vec<PolicyRule> = block_rule("CCBot").into_iter().collect();
        let repository = Arc::new(FakeRuleRepository::with_rules(rules));
        let t0 = Utc::now();
        let cache = RuleCache::new(repository.clone(), 60, t0);
        let Ok(tenant_id) = tenant() else {
            return;
        };
        cache.get_rules(&tenant_id, t0).await;

        repository.start_failing();
        let stale = cache
            .get_rules(&tenant_id, t0 + Duration::seconds(120))
            .await;
        assert_eq!(stale.blocked(), ["CCBot"]);
        assert_eq!(repository.load_count(), 2);

        // The stale entry did not refresh its timestamp: the next call
        // retries the store again.
        cache
            .get_rules(&tenant_id, t0 + Duration::seconds(121))
            .await;
        assert_eq!(repository.load_count(), 3);
    }

    #[tokio::test]
    async fn store_failure_without_history_serves_defaults() {
        let t0 = Utc::now();
        let cache = RuleCache::new(Arc::new(FakeRuleRepository::failing()), 60, t0);
        let Ok(tenant_id) = tenant() else {
            return;
        };

        let snapshot = cache.get_rules(&tenant_id, t0).await;
        assert_eq!(snapshot, RuleCache::builtin_defaults());
    }

    #[tokio::test]
    async fn default_key_is_exempt_from_loading() {
        let repository = Arc::new(FakeRuleRepository::failing());
        let t0 = Utc::now();
        let cache = RuleCache::new(repository.clone(), 60, t0);
        let Ok(default_id) = TenantId::new(super::DEFAULT_RULES_KEY) else {
            return;
        };

        let snapshot = cache
            .get_rules(&default_id, t0 + Duration::seconds(3600))
            .await;
        assert_eq!(snapshot, RuleCache::builtin_defaults());
        assert_eq!(repository.load_count(), 0);
    }
}
