use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use pixelwall_application::AccessEventRepository;
use pixelwall_core::{AppError, AppResult, TenantId};
use pixelwall_domain::AccessEvent;

/// PostgreSQL-backed append-only access event log.
#[derive(Clone)]
pub struct PostgresAccessEventRepository {
    pool: PgPool,
}

impl PostgresAccessEventRepository {
    /// Creates a repository with the provided connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AccessEventRepository for PostgresAccessEventRepository {
    async fn insert(&self, event: AccessEvent) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO access_events (
                id,
                tenant_id,
                ts,
                ip_address,
                user_agent,
                fingerprint,
                path,
                outcome,
                rule,
                redirect_url,
                js_executed
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            "#,
        )
        .bind(event.id().as_uuid())
        .bind(event.tenant_id().as_str())
        .bind(event.timestamp())
        .bind(event.ip_address())
        .bind(event.user_agent())
        .bind(event.fingerprint())
        .bind(event.path())
        .bind(event.outcome().as_str())
        .bind(event.rule())
        .bind(event.redirect_url())
        .bind(event.js_executed())
        .execute(&self.pool)
        .await
        .map_err(|error| {
            AppError::Unavailable(format!("failed to append access event: {error}"))
        })?;

        Ok(())
    }

    async fn count_rule_usage(
        &self,
        tenant_id: &TenantId,
        rule_prefix: &str,
        since: DateTime<Utc>,
    ) -> AppResult<u64> {
        // Literal prefix comparison; LIKE would let %/_ in a tenant's
        // pattern act as wildcards and overcount.
        let count: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*)
            FROM access_events
            WHERE tenant_id = $1
                AND ts >= $2
                AND left(rule, length($3)) = $3
            "#,
        )
        .bind(tenant_id.as_str())
        .bind(since)
        .bind(rule_prefix)
        .fetch_one(&self.pool)
        .await
        .map_err(|error| {
            AppError::Unavailable(format!("failed to count rule usage: {error}"))
        })?;

        Ok(u64::try_from(count).unwrap_or(0))
    }
}
