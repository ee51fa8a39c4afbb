use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use pixelwall_application::RuleRepository;
use pixelwall_core::{AppResult, TenantId};
use pixelwall_domain::PolicyRule;

/// In-memory rule store implementation.
#[derive(Debug, Default)]
pub struct InMemoryRuleRepository {
    rules: RwLock<HashMap<TenantId, Vec<PolicyRule>>>,
}

impl InMemoryRuleRepository {
    /// Creates an empty in-memory rule store.
    #[must_use]
    pub fn new() -> Self {
        Self {
            rules: RwLock::new(HashMap::new()),
        }
    }

    /// Appends a rule for its tenant, preserving insertion order.
    pub async fn add_rule(&self, rule: PolicyRule) {
        self.rules
            .write()
            .await
            .entry(rule.tenant_id().clone())
            .or_default()
            .push(rule);
    }

    /// Removes every rule for one tenant.
    pub async fn clear_tenant(&self, tenant_id: &TenantId) {
        self.rules.write().await.remove(tenant_id);
    }
}

#[async_trait]
impl RuleRepository for InMemoryRuleRepository {
    async fn list_rules(&self, tenant_id: &TenantId) -> AppResult<Vec<PolicyRule>> {
        Ok(self
            .rules
            .read()
            .await
            .get(tenant_id)
            .cloned()
            .unwrap_or_default())
    }
}
