//! Repository ports consumed by the classification pipeline.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use pixelwall_core::{AppResult, TenantId};
use pixelwall_domain::{AccessEvent, PolicyRule};

/// Read port for the persistent per-tenant policy rule store.
#[async_trait]
pub trait RuleRepository: Send + Sync {
    /// Lists the stored rules for one tenant in configuration order.
    async fn list_rules(&self, tenant_id: &TenantId) -> AppResult<Vec<PolicyRule>>;
}

/// Append-oriented port for the access event log.
#[async_trait]
pub trait AccessEventRepository: Send + Sync {
    /// Appends one classified-request record.
    async fn insert(&self, event: AccessEvent) -> AppResult<()>;

    /// Counts a tenant's events since `since` whose rule tag starts with
    /// `rule_prefix`. Used to enforce daily ceilings on restricted patterns.
    async fn count_rule_usage(
        &self,
        tenant_id: &TenantId,
        rule_prefix: &str,
        since: DateTime<Utc>,
    ) -> AppResult<u64>;
}
