//! Immutable access-event records.

use chrono::{DateTime, Utc};
use pixelwall_core::{AppError, AppResult, TenantId};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for an access event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EventId(Uuid);

impl EventId {
    /// Creates a new random event identifier.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Creates an event identifier from an existing UUID value.
    #[must_use]
    pub fn from_uuid(value: Uuid) -> Self {
        Self(value)
    }

    /// Returns the underlying UUID value.
    #[must_use]
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for EventId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for EventId {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(formatter, "{}", self.0)
    }
}

/// Final classification outcome for one processed request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    /// Ordinary traffic; the pixel is served.
    Allow,
    /// Rejected traffic; the endpoint answers 401.
    Block,
    /// Restricted-pattern traffic still under its daily ceiling.
    Limit,
    /// Traffic dropped by a sliding-window ceiling.
    Ratelimit,
    /// Traffic sent to a tenant-configured URL.
    Redirect,
    /// Traffic marked as likely AI-assistant referral; served but recorded.
    Flagged,
}

impl Outcome {
    /// Returns the stable storage value.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Allow => "allow",
            Self::Block => "block",
            Self::Limit => "limit",
            Self::Ratelimit => "ratelimit",
            Self::Redirect => "redirect",
            Self::Flagged => "flagged",
        }
    }

    /// Parses a stable storage value.
    pub fn parse(value: &str) -> AppResult<Self> {
        match value {
            "allow" => Ok(Self::Allow),
            "block" => Ok(Self::Block),
            "limit" => Ok(Self::Limit),
            "ratelimit" => Ok(Self::Ratelimit),
            "redirect" => Ok(Self::Redirect),
            "flagged" => Ok(Self::Flagged),
            other => Err(AppError::Validation(format!("unknown outcome '{other}'"))),
        }
    }
}

impl std::fmt::Display for Outcome {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter.write_str(self.as_str())
    }
}

/// The immutable record of one classified request.
///
/// Written exactly once per processed request, before the HTTP response is
/// returned; never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccessEvent {
    id: EventId,
    tenant_id: TenantId,
    timestamp: DateTime<Utc>,
    ip_address: String,
    user_agent: String,
    fingerprint: String,
    path: String,
    outcome: Outcome,
    rule: String,
    redirect_url: Option<String>,
    js_executed: bool,
}

impl AccessEvent {
    /// Creates an access event.
    ///
    /// The `rule` field documents which check decided the outcome and is
    /// never empty (`"none"` for a plain allow).
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        id: EventId,
        tenant_id: TenantId,
        timestamp: DateTime<Utc>,
        ip_address: impl Into<String>,
        user_agent: impl Into<String>,
        fingerprint: impl Into<String>,
        path: impl Into<String>,
        outcome: Outcome,
        rule: impl Into<String>,
        redirect_url: Option<String>,
        js_executed: bool,
    ) -> AppResult<Self> {
        let rule = rule.into();
        if rule.trim().is_empty() {
            return Err(AppError::Validation(
                "access event rule must not be empty".to_owned(),
            ));
        }

        if redirect_url.is_some() != (outcome == Outcome::Redirect) {
            return Err(AppError::Validation(
                "redirect URL must be present exactly for redirect outcomes".to_owned(),
            ));
        }

        Ok(Self {
            id,
            tenant_id,
            timestamp,
            ip_address: ip_address.into(),
            user_agent: user_agent.into(),
            fingerprint: fingerprint.into(),
            path: path.into(),
            outcome,
            rule,
            redirect_url,
            js_executed,
        })
    }

    /// Returns the event identifier.
    #[must_use]
    pub fn id(&self) -> EventId {
        self.id
    }

    /// Returns the owning tenant.
    #[must_use]
    pub fn tenant_id(&self) -> &TenantId {
        &self.tenant_id
    }

    /// Returns when the request was classified.
    #[must_use]
    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    /// Returns the client IP address.
    #[must_use]
    pub fn ip_address(&self) -> &str {
        &self.ip_address
    }

    /// Returns the user-agent string the decision was made against.
    #[must_use]
    pub fn user_agent(&self) -> &str {
        &self.user_agent
    }

    /// Returns the raw fingerprint payload (or noscript marker).
    #[must_use]
    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }

    /// Returns the page path the beacon was embedded on.
    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Returns the final outcome.
    #[must_use]
    pub fn outcome(&self) -> Outcome {
        self.outcome
    }

    /// Returns the human-readable rule tag that decided the outcome.
    #[must_use]
    pub fn rule(&self) -> &str {
        &self.rule
    }

    /// Returns the redirect target, present iff the outcome is redirect.
    #[must_use]
    pub fn redirect_url(&self) -> Option<&str> {
        self.redirect_url.as_deref()
    }

    /// Returns whether the client executed the probe script.
    #[must_use]
    pub fn js_executed(&self) -> bool {
        self.js_executed
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use pixelwall_core::TenantId;

    use super::{AccessEvent, EventId, Outcome};

    #[test]
    fn outcome_round_trips_storage_values() {
        for outcome in [
            Outcome::Allow,
            Outcome::Block,
            Outcome::Limit,
            Outcome::Ratelimit,
            Outcome::Redirect,
            Outcome::Flagged,
        ] {
            assert_eq!(Outcome::parse(outcome.as_str()).ok(), Some(outcome));
        }
    }

    #[test]
    fn event_rejects_empty_rule() {
        let result = TenantId::new("acme").and_then(|tenant_id| {
            AccessEvent::new(
                EventId::new(),
                tenant_id,
                Utc::now(),
                "203.0.113.7",
                "Mozilla/5.0",
                "",
                "/",
                Outcome::Allow,
                "  ",
                None,
                true,
            )
        });
        assert!(result.is_err());
    }

    #[test]
    fn event_requires_redirect_url_only_for_redirects() {
        let missing_url = TenantId::new("acme").and_then(|tenant_id| {
            AccessEvent::new(
                EventId::new(),
                tenant_id,
                Utc::now(),
                "203.0.113.7",
                "PaywallLLM/1.0",
                "",
                "/",
                Outcome::Redirect,
                "redirect:PaywallLLM",
                None,
                false,
            )
        });
        assert!(missing_url.is_err());

        let stray_url = TenantId::new("acme").and_then(|tenant_id| {
            AccessEvent::new(
                EventId::new(),
                tenant_id,
                Utc::now(),
                "203.0.113.7",
                "Mozilla/5.0",
                "",
                "/",
                Outcome::Allow,
                "none",
                Some("https://example.com".to_owned()),
                true,
            )
        });
        assert!(stray_url.is_err());
    }
}
