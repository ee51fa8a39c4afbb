//! Tenant policy rules and their materialized form.

use chrono::{DateTime, Utc};
use pixelwall_core::{AppError, AppResult, NonEmptyString, TenantId};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Action a policy rule applies to matching user agents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PolicyKind {
    /// Matching traffic passes through unchanged.
    Allow,
    /// Matching traffic is rejected outright.
    Block,
    /// Matching traffic is allowed up to a daily ceiling.
    Restricted,
    /// Matching traffic is redirected to a configured URL.
    Redirect,
}

impl PolicyKind {
    /// Returns the stable storage value.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Allow => "allow",
            Self::Block => "block",
            Self::Restricted => "restricted",
            Self::Redirect => "redirect",
        }
    }

    /// Parses a stable storage value.
    pub fn parse(value: &str) -> AppResult<Self> {
        match value {
            "allow" => Ok(Self::Allow),
            "block" => Ok(Self::Block),
            "restricted" => Ok(Self::Restricted),
            "redirect" => Ok(Self::Redirect),
            other => Err(AppError::Validation(format!(
                "unknown policy kind '{other}'"
            ))),
        }
    }
}

/// One tenant-configured pattern-to-action mapping.
///
/// The pattern is matched against the visitor's user-agent string as a
/// regular expression. `max_per_day` is meaningful only for
/// [`PolicyKind::Restricted`]; `redirect_url` only for
/// [`PolicyKind::Redirect`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolicyRule {
    id: Uuid,
    tenant_id: TenantId,
    llm_name: Option<String>,
    pattern: NonEmptyString,
    kind: PolicyKind,
    max_per_day: Option<u32>,
    redirect_url: Option<String>,
    created_at: DateTime<Utc>,
}

impl PolicyRule {
    /// Creates a validated policy rule.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        id: Uuid,
        tenant_id: TenantId,
        llm_name: Option<String>,
        pattern: impl Into<String>,
        kind: PolicyKind,
        max_per_day: Option<u32>,
        redirect_url: Option<String>,
        created_at: DateTime<Utc>,
    ) -> AppResult<Self> {
        let pattern = NonEmptyString::new(pattern)?;

        if kind == PolicyKind::Restricted && max_per_day.is_none() {
            return Err(AppError::Validation(
                "restricted rules require a daily ceiling".to_owned(),
            ));
        }

        if kind == PolicyKind::Redirect
            && redirect_url
                .as_deref()
                .is_none_or(|url| url.trim().is_empty())
        {
            return Err(AppError::Validation(
                "redirect rules require a target URL".to_owned(),
            ));
        }

        Ok(Self {
            id,
            tenant_id,
            llm_name,
            pattern,
            kind,
            max_per_day,
            redirect_url,
            created_at,
        })
    }

    /// Returns the rule identifier.
    #[must_use]
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Returns the owning tenant.
    #[must_use]
    pub fn tenant_id(&self) -> &TenantId {
        &self.tenant_id
    }

    /// Returns the crawler display name, when configured.
    #[must_use]
    pub fn llm_name(&self) -> Option<&str> {
        self.llm_name.as_deref()
    }

    /// Returns the user-agent pattern.
    #[must_use]
    pub fn pattern(&self) -> &NonEmptyString {
        &self.pattern
    }

    /// Returns the policy kind.
    #[must_use]
    pub fn kind(&self) -> PolicyKind {
        self.kind
    }

    /// Returns the daily ceiling for restricted rules.
    #[must_use]
    pub fn max_per_day(&self) -> Option<u32> {
        self.max_per_day
    }

    /// Returns the redirect target for redirect rules.
    #[must_use]
    pub fn redirect_url(&self) -> Option<&str> {
        self.redirect_url.as_deref()
    }

    /// Returns the creation timestamp.
    #[must_use]
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

/// One rate-restricted pattern with its daily ceiling.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LimitedAgent {
    /// User-agent pattern.
    pub pattern: String,
    /// Maximum matching visits allowed per UTC day.
    pub max_per_day: u32,
}

/// One redirect pattern with its target URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RedirectAgent {
    /// User-agent pattern.
    pub pattern: String,
    /// Redirect target.
    pub url: String,
}

/// The materialized rule set for one tenant.
///
/// Patterns keep the order they were loaded in; within each class the first
/// matching pattern decides, so reordering would change outcomes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleSetSnapshot {
    blocked: Vec<String>,
    limited: Vec<LimitedAgent>,
    redirect: Vec<RedirectAgent>,
}

impl RuleSetSnapshot {
    /// Builds a snapshot from raw class lists.
    #[must_use]
    pub fn new(
        blocked: Vec<String>,
        limited: Vec<LimitedAgent>,
        redirect: Vec<RedirectAgent>,
    ) -> Self {
        Self {
            blocked,
            limited,
            redirect,
        }
    }

    /// Materializes the blocked / limited / redirect split from stored rules.
    ///
    /// `allow` rules carry no snapshot state: anything unmatched is allowed
    /// by default.
    #[must_use]
    pub fn from_rules(rules: &[PolicyRule]) -> Self {
        let mut snapshot = Self::default();
        for rule in rules {
            match rule.kind() {
                PolicyKind::Allow => {}
                PolicyKind::Block => {
                    snapshot.blocked.push(rule.pattern().as_str().to_owned());
                }
                PolicyKind::Restricted => {
                    if let Some(max_per_day) = rule.max_per_day() {
                        snapshot.limited.push(LimitedAgent {
                            pattern: rule.pattern().as_str().to_owned(),
                            max_per_day,
                        });
                    }
                }
                PolicyKind::Redirect => {
                    if let Some(url) = rule.redirect_url() {
                        snapshot.redirect.push(RedirectAgent {
                            pattern: rule.pattern().as_str().to_owned(),
                            url: url.to_owned(),
                        });
                    }
                }
            }
        }

        snapshot
    }

    /// Returns blocked patterns in evaluation order.
    #[must_use]
    pub fn blocked(&self) -> &[String] {
        &self.blocked
    }

    /// Returns rate-restricted patterns in evaluation order.
    #[must_use]
    pub fn limited(&self) -> &[LimitedAgent] {
        &self.limited
    }

    /// Returns redirect patterns in evaluation order.
    #[must_use]
    pub fn redirect(&self) -> &[RedirectAgent] {
        &self.redirect
    }

    /// Returns whether no rule of any class is present.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.blocked.is_empty() && self.limited.is_empty() && self.redirect.is_empty()
    }
}
