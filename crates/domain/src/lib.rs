//! Domain entities and invariants.

#![forbid(unsafe_code)]

mod event;
mod fingerprint;
mod rule;

pub use event::{AccessEvent, EventId, Outcome};
pub use fingerprint::Fingerprint;
pub use rule::{LimitedAgent, PolicyKind, PolicyRule, RedirectAgent, RuleSetSnapshot};
