//! Synchronous access-event persistence.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::error;

use pixelwall_core::{AppResult, TenantId};
use pixelwall_domain::{AccessEvent, EventId};

use crate::classification::Classification;
use crate::inputs::VisitSignals;
use crate::ports::AccessEventRepository;

/// Persists exactly one [`AccessEvent`] per classified request.
///
/// Runs before the HTTP response so dashboards never disagree with
/// responses already sent. A failed write is logged and dropped: traffic
/// shaping never depends on log success.
#[derive(Clone)]
pub struct AccessEventRecorder {
    events: Arc<dyn AccessEventRepository>,
}

impl AccessEventRecorder {
    /// Creates a recorder.
    #[must_use]
    pub fn new(events: Arc<dyn AccessEventRepository>) -> Self {
        Self { events }
    }

    /// Builds and persists the event record for one classified request.
    ///
    /// Only event construction can fail (a pipeline contract violation);
    /// persistence failures are swallowed after logging.
    pub async fn record(
        &self,
        tenant_id: &TenantId,
        signals: &VisitSignals,
        classification: &Classification,
        now: DateTime<Utc>,
    ) -> AppResult<AccessEvent> {
        let event = AccessEvent::new(
            EventId::new(),
            tenant_id.clone(),
            now,
            signals.ip_address.clone(),
            signals.user_agent.clone(),
            signals.fingerprint_record(),
            signals.path.clone(),
            classification.outcome,
            classification.rule.clone(),
            classification.redirect_url.clone(),
            signals.js_executed(),
        )?;

        if let Err(write_error) = self.events.insert(event.clone()).await {
            error!(
                tenant = %tenant_id,
                error = %write_error,
                "access event write failed, dropping record"
            );
        }

        Ok(event)
    }
}
