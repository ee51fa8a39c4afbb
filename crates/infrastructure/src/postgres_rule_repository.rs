use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};

use pixelwall_application::RuleRepository;
use pixelwall_core::{AppError, AppResult, TenantId};
use pixelwall_domain::{PolicyKind, PolicyRule};

/// PostgreSQL-backed repository for tenant policy rules.
#[derive(Clone)]
pub struct PostgresRuleRepository {
    pool: PgPool,
}

impl PostgresRuleRepository {
    /// Creates a repository with the provided connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, FromRow)]
struct PolicyRuleRow {
    id: uuid::Uuid,
    tenant_id: String,
    llm_name: Option<String>,
    pattern: String,
    policy: String,
    max_per_day: Option<i32>,
    redirect_url: Option<String>,
    created_at: DateTime<Utc>,
}

impl PolicyRuleRow {
    fn into_rule(self) -> AppResult<PolicyRule> {
        let max_per_day = match self.max_per_day {
            Some(value) => Some(u32::try_from(value).map_err(|_| {
                AppError::Internal(format!("negative rule ceiling for rule {}", self.id))
            })?),
            None => None,
        };

        PolicyRule::new(
            self.id,
            TenantId::new(self.tenant_id)?,
            self.llm_name,
            self.pattern,
            PolicyKind::parse(&self.policy)?,
            max_per_day,
            self.redirect_url,
            self.created_at,
        )
    }
}

#[async_trait]
impl RuleRepository for PostgresRuleRepository {
    async fn list_rules(&self, tenant_id: &TenantId) -> AppResult<Vec<PolicyRule>> {
        let rows = sqlx::query_as::<_, PolicyRuleRow>(
            r#"
            SELECT
                id,
                tenant_id,
                llm_name,
                pattern,
                policy,
                max_per_day,
                redirect_url,
                created_at
            FROM policy_rules
            WHERE tenant_id = $1
            ORDER BY created_at, id
            "#,
        )
        .bind(tenant_id.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(|error| AppError::Unavailable(format!("failed to list policy rules: {error}")))?;

        rows.into_iter().map(PolicyRuleRow::into_rule).collect()
    }
}
