//! The request classification pipeline.
//!
//! Combines signal heuristics, sliding-window rate limiting, and tenant
//! rule matching into exactly one outcome per request, in strict precedence
//! order: signal checks are cheap and certain, rate ceilings protect the
//! service itself, and tenant rules run last because they may hit the store.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use regex::Regex;
use tracing::warn;

use pixelwall_core::TenantId;
use pixelwall_domain::{LimitedAgent, Outcome};

use crate::bot_signals::BotSignalEvaluator;
use crate::inputs::VisitSignals;
use crate::ports::AccessEventRepository;
use crate::rate_window::RateWindowCounter;
use crate::rule_cache::RuleCache;

/// Tunables for the classification pipeline.
#[derive(Debug, Clone)]
pub struct ClassificationConfig {
    /// Sliding window length in seconds for both rate counters.
    pub window_seconds: i64,
    /// Per-IP ceiling within one window.
    pub ip_ceiling: usize,
    /// Per-tenant ceiling within one window.
    pub tenant_ceiling: usize,
    /// Upper bound on rule-store and usage-count queries before the request
    /// falls back to allow.
    pub store_timeout_ms: u64,
}

impl Default for ClassificationConfig {
    fn default() -> Self {
        Self {
            window_seconds: 60,
            ip_ceiling: 60,
            tenant_ceiling: 100_000,
            store_timeout_ms: 2_000,
        }
    }
}

/// The pipeline's single authoritative decision for one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    /// Final outcome.
    pub outcome: Outcome,
    /// Which check fired; `"none"` for a plain allow.
    pub rule: String,
    /// Redirect target, present iff the outcome is [`Outcome::Redirect`].
    pub redirect_url: Option<String>,
}

impl Classification {
    fn allow() -> Self {
        Self {
            outcome: Outcome::Allow,
            rule: "none".to_owned(),
            redirect_url: None,
        }
    }
}

/// Orchestrates bot signals, rate windows, and tenant rules.
#[derive(Clone)]
pub struct ClassificationService {
    config: ClassificationConfig,
    evaluator: BotSignalEvaluator,
    rate_windows: Arc<RateWindowCounter>,
    rule_cache: Arc<RuleCache>,
    events: Arc<dyn AccessEventRepository>,
}

impl ClassificationService {
    /// Creates a classification service.
    #[must_use]
    pub fn new(
        config: ClassificationConfig,
        rate_windows: Arc<RateWindowCounter>,
        rule_cache: Arc<RuleCache>,
        events: Arc<dyn AccessEventRepository>,
    ) -> Self {
        Self {
            config,
            evaluator: BotSignalEvaluator::new(),
            rate_windows,
            rule_cache,
            events,
        }
    }

    /// Classifies one request. Never fails: store problems degrade to allow
    /// rather than holding up or rejecting legitimate traffic.
    pub async fn classify(
        &self,
        tenant_id: &TenantId,
        signals: &VisitSignals,
        now: DateTime<Utc>,
    ) -> Classification {
        // 1. Signal heuristics short-circuit everything else.
        if let Some(verdict) = self.evaluator.evaluate(signals) {
            return Classification {
                outcome: verdict.outcome,
                rule: verdict.rule,
                redirect_url: None,
            };
        }

        // 2. Per-IP window defends against single-source abuse.
        let ip_window = self
            .rate_windows
            .record_and_check(
                &format!("ip:{}", signals.ip_address),
                now,
                self.config.window_seconds,
                self.config.ip_ceiling,
            )
            .await;
        if ip_window.exceeded {
            return Classification {
                outcome: Outcome::Ratelimit,
                rule: format!("ip_rate_limit ({}/{})", ip_window.count, self.config.ip_ceiling),
                redirect_url: None,
            };
        }

        // 3. Per-tenant window bounds aggregate throughput.
        let tenant_window = self
            .rate_windows
            .record_and_check(
                &format!("tenant:{tenant_id}"),
                now,
                self.config.window_seconds,
                self.config.tenant_ceiling,
            )
            .await;
        if tenant_window.exceeded {
            return Classification {
                outcome: Outcome::Ratelimit,
                rule: format!(
                    "tenant_rate_limit ({}/{})",
                    tenant_window.count, self.config.tenant_ceiling
                ),
                redirect_url: None,
            };
        }

        // 4./5. Undecided traffic goes through the tenant's rules; any
        // store fault or stall inside this step must not reject traffic.
        let timeout = std::time::Duration::from_millis(self.config.store_timeout_ms);
        match tokio::time::timeout(timeout, self.apply_rules(tenant_id, signals, now)).await {
            Ok(classification) => classification,
            Err(_) => {
                warn!(tenant = %tenant_id, "rule evaluation timed out, allowing request");
                Classification::allow()
            }
        }
    }

    async fn apply_rules(
        &self,
        tenant_id: &TenantId,
        signals: &VisitSignals,
        now: DateTime<Utc>,
    ) -> Classification {
        let rules = self.rule_cache.get_rules(tenant_id, now).await;
        let user_agent = signals.user_agent.as_str();

        if let Some(pattern) = first_match(rules.blocked().iter().map(String::as_str), user_agent)
        {
            return Classification {
                outcome: Outcome::Block,
                rule: format!("blocked:{pattern}"),
                redirect_url: None,
            };
        }

        if let Some(agent) = rules
            .redirect()
            .iter()
            .find(|agent| pattern_matches(&agent.pattern, user_agent))
        {
            return Classification {
                outcome: Outcome::Redirect,
                rule: format!("redirect:{}", agent.pattern),
                redirect_url: Some(agent.url.clone()),
            };
        }

        if let Some(agent) = rules
            .limited()
            .iter()
            .find(|agent| pattern_matches(&agent.pattern, user_agent))
        {
            return self.apply_daily_limit(tenant_id, agent, now).await;
        }

        Classification::allow()
    }

    /// Enforces the daily ceiling on one restricted pattern by counting
    /// today's already-logged `limit:` events for it.
    async fn apply_daily_limit(
        &self,
        tenant_id: &TenantId,
        agent: &LimitedAgent,
        now: DateTime<Utc>,
    ) -> Classification {
        let midnight = now
            .date_naive()
            .and_hms_opt(0, 0, 0)
            .map(|naive| naive.and_utc())
            .unwrap_or(now);
        let prefix = format!("limit:{}", agent.pattern);

        let used = match self
            .events
            .count_rule_usage(tenant_id, &prefix, midnight)
            .await
        {
            Ok(used) => used,
            Err(error) => {
                warn!(tenant = %tenant_id, %error, "limit usage count failed, allowing request");
                return Classification::allow();
            }
        };

        if used >= u64::from(agent.max_per_day) {
            Classification {
                outcome: Outcome::Block,
                rule: format!(
                    "limit_exceeded:{} ({}/{})",
                    agent.pattern, used, agent.max_per_day
                ),
                redirect_url: None,
            }
        } else {
            // The new event is logged with this tag, so it advances the
            // effective counter on its own.
            Classification {
                outcome: Outcome::Limit,
                rule: format!("limit:{} ({}/{})", agent.pattern, used + 1, agent.max_per_day),
                redirect_url: None,
            }
        }
    }
}

/// First pattern (in list order) whose regex search matches the user agent.
fn first_match<'a>(patterns: impl Iterator<Item = &'a str>, user_agent: &str) -> Option<&'a str> {
    for pattern in patterns {
        if pattern_matches(pattern, user_agent) {
            return Some(pattern);
        }
    }
    None
}

/// Unanchored regex search. Tenant patterns are untrusted; one that fails
/// to compile is skipped rather than failing the request.
fn pattern_matches(pattern: &str, user_agent: &str) -> bool {
    match Regex::new(pattern) {
        Ok(regex) => regex.is_match(user_agent),
        Err(error) => {
            warn!(%pattern, %error, "skipping unparsable rule pattern");
            false
        }
    }
}
