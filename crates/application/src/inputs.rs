//! Request-level signals extracted by the HTTP layer.

/// Everything the pipeline knows about one pixel request.
///
/// All fields are untrusted client input; the HTTP layer extracts them but
/// performs no validation beyond UTF-8.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VisitSignals {
    /// Client IP, preferring the first forwarded-for hop over the peer.
    pub ip_address: String,
    /// User-agent string (query override, else header).
    pub user_agent: String,
    /// Raw `Referer` header value, when present.
    pub referrer: Option<String>,
    /// UTM source parameter, when present (or recovered from the referrer).
    pub utm_source: Option<String>,
    /// Raw fingerprint payload from the probe script.
    pub fingerprint: Option<String>,
    /// Raw `js` probe flag: `"1"` automation detected by the probe,
    /// `"2"` clean execution with a fingerprint.
    pub js_flag: Option<String>,
    /// Raw `noscript` parameter from the no-JS fallback image.
    pub noscript: Option<String>,
    /// Page the beacon was embedded on (`src` param, else request path).
    pub path: String,
}

impl VisitSignals {
    /// Returns whether the request came from the no-JS fallback path.
    #[must_use]
    pub fn is_noscript(&self) -> bool {
        self.noscript.is_some()
    }

    /// Returns whether the probe's automation beacon fired. The snippet
    /// sends `js=1` when it sees a webdriver flag or a failed paint-timing
    /// check, and never attaches a fingerprint to that beacon.
    #[must_use]
    pub fn declares_automation(&self) -> bool {
        self.js_flag.as_deref() == Some("1")
    }

    /// Returns whether the probe script ran cleanly in the client.
    #[must_use]
    pub fn js_executed(&self) -> bool {
        self.js_flag.as_deref() == Some("2")
    }

    /// Returns the raw payload stored in the event log fingerprint column:
    /// the fingerprint when submitted, else the noscript marker, else empty.
    #[must_use]
    pub fn fingerprint_record(&self) -> String {
        self.fingerprint
            .clone()
            .or_else(|| self.noscript.clone())
            .unwrap_or_default()
    }
}
