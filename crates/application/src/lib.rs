//! Application services and ports for the classification pipeline.

#![forbid(unsafe_code)]

mod bot_signals;
mod classification;
mod inputs;
mod ports;
mod rate_window;
mod recorder;
mod rule_cache;

pub use bot_signals::{BotSignalEvaluator, SignalVerdict};
pub use classification::{Classification, ClassificationConfig, ClassificationService};
pub use inputs::VisitSignals;
pub use ports::{AccessEventRepository, RuleRepository};
pub use rate_window::{RateWindowCounter, WindowCount};
pub use recorder::AccessEventRecorder;
pub use rule_cache::{DEFAULT_RULES_KEY, RuleCache};
