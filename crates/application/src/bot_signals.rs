//! Stateless heuristics over request-level signals.
//!
//! Runs before rate limiting and rule matching: these checks are cheap and
//! high-confidence, so an obvious automation tell short-circuits the rest
//! of the pipeline. The evaluator never touches counters or stores.

use url::Url;

use pixelwall_domain::{Fingerprint, Outcome};

use crate::inputs::VisitSignals;

/// Consumer AI-assistant UI hosts whose referrals get flagged.
const LLM_UI_DOMAINS: [&str; 8] = [
    "chatgpt.com",
    "claude.ai",
    "copilot.microsoft.com",
    "chat.deepseek.com",
    "gemini.google.com",
    "meta.ai",
    "chat.mistral.ai",
    "perplexity.ai",
];

/// A decisive verdict from signal evaluation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignalVerdict {
    /// Outcome the pipeline adopts unchanged.
    pub outcome: Outcome,
    /// Rule tag documenting which signal fired.
    pub rule: String,
}

/// Pure evaluator for per-request bot signals.
#[derive(Debug, Clone, Copy, Default)]
pub struct BotSignalEvaluator;

impl BotSignalEvaluator {
    /// Creates an evaluator.
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Evaluates signals in fixed precedence, returning the first verdict:
    /// no-script fallback, then LLM-UI referral, then client fingerprint.
    /// `None` means the pipeline should continue with rate limiting.
    #[must_use]
    pub fn evaluate(&self, signals: &VisitSignals) -> Option<SignalVerdict> {
        if signals.is_noscript() {
            return Some(SignalVerdict {
                outcome: Outcome::Block,
                rule: "noscript".to_owned(),
            });
        }

        if let Some(source) = llm_referral_source(signals) {
            return Some(SignalVerdict {
                outcome: Outcome::Flagged,
                rule: format!("suspicious_referral:{source}"),
            });
        }

        if is_client_fingerprint_bot(signals) {
            return Some(SignalVerdict {
                outcome: Outcome::Block,
                rule: "client_fingerprint_bot".to_owned(),
            });
        }

        None
    }
}

/// Lower-cased host of a referrer URL with any `www.` prefix stripped.
///
/// Schemeless values fall back to the text before the first slash, matching
/// how browsers sometimes truncate the header.
fn sanitize_domain(referrer: &str) -> String {
    let host = Url::parse(referrer)
        .ok()
        .and_then(|url| url.host_str().map(str::to_owned))
        .unwrap_or_else(|| {
            referrer
                .split('/')
                .next()
                .unwrap_or_default()
                .to_owned()
        });

    host.to_lowercase()
        .strip_prefix("www.")
        .map(str::to_owned)
        .unwrap_or_else(|| host.to_lowercase())
}

/// Returns the matched referral source when the visit came out of an
/// AI-assistant UI: the referrer host when one is present, otherwise a UTM
/// source containing one of the known domain tokens.
fn llm_referral_source(signals: &VisitSignals) -> Option<String> {
    let utm = signals
        .utm_source
        .as_deref()
        .filter(|value| !value.is_empty());

    if let Some(referrer) = signals.referrer.as_deref().filter(|value| !value.is_empty()) {
        let domain = sanitize_domain(referrer);
        if LLM_UI_DOMAINS.iter().any(|known| domain.contains(known)) {
            return Some(utm.unwrap_or(referrer).to_owned());
        }
        return None;
    }

    let utm = utm?;
    let lowered = utm.to_lowercase();
    LLM_UI_DOMAINS
        .iter()
        .any(|known| lowered.contains(known))
        .then(|| utm.to_owned())
}

/// Client-side automation tells: the probe's automation beacon, an
/// unparsable or self-incriminating fingerprint, or a headless marker. A
/// request carrying no client telemetry at all does not fire here; it falls
/// through to the tenant rules, which is where plain server-side crawlers
/// are caught.
fn is_client_fingerprint_bot(signals: &VisitSignals) -> bool {
    if signals.declares_automation() {
        return true;
    }

    if signals.user_agent.to_lowercase().contains("headless") {
        return true;
    }

    let Some(raw) = signals.fingerprint.as_deref() else {
        return false;
    };

    let Ok(fingerprint) = Fingerprint::parse(raw) else {
        // Untrusted telemetry that does not even parse is its own signal.
        return true;
    };

    fingerprint.webdriver
        || fingerprint.reports_headless_ua()
        || fingerprint.has_synthetic_brand_pair()
}

#[cfg(test)]
mod tests {
    use pixelwall_domain::Outcome;

    use crate::inputs::VisitSignals;

    use super::{BotSignalEvaluator, sanitize_domain};

    fn browser_signals() -> VisitSignals {
        VisitSignals {
            ip_address: "203.0.113.7".to_owned(),
            user_agent:
                "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36".to_owned(),
            path: "/pricing".to_owned(),
            ..VisitSignals::default()
        }
    }

    #[test]
    fn noscript_blocks_before_anything_else() {
        let evaluator = BotSignalEvaluator::new();
        let signals = VisitSignals {
            noscript: Some("1".to_owned()),
            referrer: Some("https://chatgpt.com/c/abc".to_owned()),
            fingerprint: Some("not json".to_owned()),
            ..browser_signals()
        };

        let verdict = evaluator.evaluate(&signals);
        assert!(verdict.is_some_and(|verdict| {
            verdict.outcome == Outcome::Block && verdict.rule == "noscript"
        }));
    }

    #[test]
    fn chat_ui_referrer_is_flagged() {
        let evaluator = BotSignalEvaluator::new();
        let signals = VisitSignals {
            referrer: Some("https://chatgpt.com/c/abc".to_owned()),
            ..browser_signals()
        };

        let verdict = evaluator.evaluate(&signals);
        assert!(verdict.is_some_and(|verdict| {
            verdict.outcome == Outcome::Flagged
                && verdict.rule.starts_with("suspicious_referral:")
        }));
    }

    #[test]
    fn utm_token_is_flagged_without_referrer() {
        let evaluator = BotSignalEvaluator::new();
        let signals = VisitSignals {
            utm_source: Some("Perplexity.AI".to_owned()),
            ..browser_signals()
        };

        let verdict = evaluator.evaluate(&signals);
        assert!(verdict.is_some_and(|verdict| {
            verdict.outcome == Outcome::Flagged
                && verdict.rule == "suspicious_referral:Perplexity.AI"
        }));
    }

    #[test]
    fn ordinary_referrer_passes() {
        let evaluator = BotSignalEvaluator::new();
        let signals = VisitSignals {
            referrer: Some("https://www.example.org/articles".to_owned()),
            js_flag: Some("2".to_owned()),
            ..browser_signals()
        };

        assert!(evaluator.evaluate(&signals).is_none());
    }

    #[test]
    fn webdriver_fingerprint_blocks() {
        let evaluator = BotSignalEvaluator::new();
        let signals = VisitSignals {
            js_flag: Some("2".to_owned()),
            fingerprint: Some(r#"{"webdriver": true}"#.to_owned()),
            ..browser_signals()
        };

        let verdict = evaluator.evaluate(&signals);
        assert!(verdict.is_some_and(|verdict| verdict.rule == "client_fingerprint_bot"));
    }

    #[test]
    fn unparsable_fingerprint_blocks() {
        let evaluator = BotSignalEvaluator::new();
        let signals = VisitSignals {
            fingerprint: Some("Mozilla/5.0|en-US|1920x1080|Europe/Madrid".to_owned()),
            ..browser_signals()
        };

        let verdict = evaluator.evaluate(&signals);
        assert!(verdict.is_some_and(|verdict| verdict.rule == "client_fingerprint_bot"));
    }

    #[test]
    fn automation_beacon_blocks_without_fingerprint() {
        // The snippet's js=1 beacon carries no fingerprint; the flag alone
        // must be decisive.
        let evaluator = BotSignalEvaluator::new();
        let signals = VisitSignals {
            js_flag: Some("1".to_owned()),
            ..browser_signals()
        };

        let verdict = evaluator.evaluate(&signals);
        assert!(verdict.is_some_and(|verdict| {
            verdict.outcome == Outcome::Block && verdict.rule == "client_fingerprint_bot"
        }));
    }

    #[test]
    fn headless_user_agent_blocks() {
        let evaluator = BotSignalEvaluator::new();
        let signals = VisitSignals {
            user_agent: "Mozilla/5.0 HeadlessChrome/120.0.0.0".to_owned(),
            js_flag: Some("2".to_owned()),
            ..browser_signals()
        };

        let verdict = evaluator.evaluate(&signals);
        assert!(verdict.is_some_and(|verdict| verdict.rule == "client_fingerprint_bot"));
    }

    #[test]
    fn synthetic_brand_pair_blocks() {
        let evaluator = BotSignalEvaluator::new();
        let signals = VisitSignals {
            js_flag: Some("2".to_owned()),
            fingerprint: Some(
                r#"{"webdriver": false, "brands": ["Chromium", "Not;A=Brand"]}"#.to_owned(),
            ),
            ..browser_signals()
        };

        let verdict = evaluator.evaluate(&signals);
        assert!(verdict.is_some_and(|verdict| verdict.rule == "client_fingerprint_bot"));
    }

    #[test]
    fn bare_server_side_request_yields_no_verdict() {
        let evaluator = BotSignalEvaluator::new();
        let signals = VisitSignals {
            user_agent: "GPTBot/1.0".to_owned(),
            ..browser_signals()
        };

        assert!(evaluator.evaluate(&signals).is_none());
    }

    #[test]
    fn sanitize_domain_strips_scheme_and_www() {
        assert_eq!(sanitize_domain("https://www.ChatGPT.com/c/abc"), "chatgpt.com");
        assert_eq!(sanitize_domain("claude.ai/chat"), "claude.ai");
    }
}
