use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use pixelwall_application::AccessEventRepository;
use pixelwall_core::{AppResult, TenantId};
use pixelwall_domain::AccessEvent;

/// In-memory append-only access event log.
#[derive(Debug, Default)]
pub struct InMemoryAccessEventRepository {
    events: RwLock<Vec<AccessEvent>>,
}

impl InMemoryAccessEventRepository {
    /// Creates an empty in-memory event log.
    #[must_use]
    pub fn new() -> Self {
        Self {
            events: RwLock::new(Vec::new()),
        }
    }

    /// Returns a copy of every stored event, in insertion order.
    pub async fn all_events(&self) -> Vec<AccessEvent> {
        self.events.read().await.clone()
    }
}

#[async_trait]
impl AccessEventRepository for InMemoryAccessEventRepository {
    async fn insert(&self, event: AccessEvent) -> AppResult<()> {
        self.events.write().await.push(event);
        Ok(())
    }

    async fn count_rule_usage(
        &self,
        tenant_id: &TenantId,
        rule_prefix: &str,
        since: DateTime<Utc>,
    ) -> AppResult<u64> {
        let events = self.events.read().await;
        Ok(events
            .iter()
            .filter(|event| {
                event.tenant_id() == tenant_id
                    && event.timestamp() >= since
                    && event.rule().starts_with(rule_prefix)
            })
            .count() as u64)
    }
}
