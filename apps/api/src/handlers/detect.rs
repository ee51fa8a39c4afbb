//! The tracking pixel endpoint.
//!
//! Classifies one visit, logs the outcome, and answers with a 401 for
//! blocks, a redirect for redirect rules, and the 1x1 transparent PNG for
//! everything else. Classification-internal faults never surface as 5xx:
//! this asset is embedded on third-party pages where a broken image is a
//! visible defect.

use std::net::SocketAddr;

use axum::extract::{ConnectInfo, Path, Query, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Redirect, Response};
use chrono::Utc;
use serde::Deserialize;
use tracing::warn;
use url::Url;

use pixelwall_application::{DEFAULT_RULES_KEY, VisitSignals};
use pixelwall_core::TenantId;
use pixelwall_domain::Outcome;

use crate::state::AppState;

/// 1x1 transparent PNG served for every non-block, non-redirect outcome.
const TRANSPARENT_PNG: &[u8] =
    b"\x89PNG\r\n\x1a\n\x00\x00\x00\rIHDR\x00\x00\x00\x01\
      \x00\x00\x00\x01\x08\x06\x00\x00\x00\x1f\x15\xc4\
      \x89\x00\x00\x00\nIDATx\x9cc`\x00\x00\x00\x02\x00\
      \x01\xe2!\xbc#\x00\x00\x00\x00IEND\xaeB`\x82";

/// Query parameters forwarded by the embed snippet.
#[derive(Debug, Default, Deserialize)]
pub struct DetectParams {
    /// User-agent override.
    pub ua: Option<String>,
    /// Fingerprint payload from the probe script.
    pub fp: Option<String>,
    /// Probe flag: `"1"` automation detected, `"2"` clean execution.
    pub js: Option<String>,
    /// Present when the noscript fallback image loaded.
    pub noscript: Option<String>,
    /// Page URL the snippet is embedded on.
    pub src: Option<String>,
    /// Campaign source override.
    pub utm: Option<String>,
    /// Standard campaign source parameter.
    pub utm_source: Option<String>,
}

pub async fn detect_pixel_handler(
    State(state): State<AppState>,
    Path(tenant): Path<String>,
    Query(params): Query<DetectParams>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
) -> Response {
    let Ok(tenant_id) = TenantId::new(tenant_slug(&tenant)) else {
        return pixel_response();
    };

    let signals = extract_signals(&tenant_id, &params, &headers, peer);
    let now = Utc::now();
    let classification = state
        .classification_service
        .classify(&tenant_id, &signals, now)
        .await;

    if let Err(error) = state
        .event_recorder
        .record(&tenant_id, &signals, &classification, now)
        .await
    {
        warn!(tenant = %tenant_id, %error, "could not build access event");
    }

    match classification.outcome {
        Outcome::Block => StatusCode::UNAUTHORIZED.into_response(),
        Outcome::Redirect => match classification.redirect_url.as_deref() {
            Some(url) => Redirect::to(url).into_response(),
            None => pixel_response(),
        },
        _ => pixel_response(),
    }
}

/// Strips the `.png` suffix the route captures as part of the tenant
/// segment. A blank slug is attributed to the default tenant so the
/// request is still classified and logged.
fn tenant_slug(tenant: &str) -> &str {
    let slug = tenant.strip_suffix(".png").unwrap_or(tenant);
    if slug.trim().is_empty() {
        DEFAULT_RULES_KEY
    } else {
        slug
    }
}

fn pixel_response() -> Response {
    (
        [
            (header::CONTENT_TYPE, "image/png"),
            (header::CACHE_CONTROL, "no-store, max-age=0"),
        ],
        TRANSPARENT_PNG,
    )
        .into_response()
}

fn extract_signals(
    tenant_id: &TenantId,
    params: &DetectParams,
    headers: &HeaderMap,
    peer: SocketAddr,
) -> VisitSignals {
    let ip_address = client_ip(headers, peer);

    let user_agent = params.ua.clone().unwrap_or_else(|| {
        headers
            .get(header::USER_AGENT)
            .and_then(|value| value.to_str().ok())
            .unwrap_or_default()
            .to_owned()
    });

    let referrer = headers
        .get(header::REFERER)
        .and_then(|value| value.to_str().ok())
        .filter(|value| !value.is_empty())
        .map(str::to_owned);

    let utm_source = params
        .utm
        .clone()
        .or_else(|| params.utm_source.clone())
        .filter(|value| !value.is_empty())
        .or_else(|| referrer.as_deref().and_then(utm_source_from_referrer));

    let path = params
        .src
        .clone()
        .filter(|value| !value.is_empty())
        .unwrap_or_else(|| format!("/detect/{tenant_id}.png"));

    VisitSignals {
        ip_address,
        user_agent,
        referrer,
        utm_source,
        fingerprint: params.fp.clone(),
        js_flag: params.js.clone(),
        noscript: params.noscript.clone(),
        path,
    }
}

/// First hop of the forwarded-for chain, falling back to the socket peer.
fn client_ip(headers: &HeaderMap, peer: SocketAddr) -> String {
    headers
        .get("x-forwarded-for")
        .and_then(|value| value.to_str().ok())
        .and_then(|chain| chain.split(',').next())
        .map(|hop| hop.trim().to_owned())
        .filter(|hop| !hop.is_empty())
        .unwrap_or_else(|| peer.ip().to_string())
}

/// Recovers `utm_source` from the referrer URL when the snippet did not
/// forward it directly.
fn utm_source_from_referrer(referrer: &str) -> Option<String> {
    let parsed = Url::parse(referrer).ok()?;
    parsed
        .query_pairs()
        .find(|(key, _)| key == "utm_source")
        .map(|(_, value)| value.into_owned())
        .filter(|value| !value.is_empty())
}

#[cfg(test)]
mod tests {
    use std::net::{IpAddr, Ipv4Addr, SocketAddr};

    use axum::http::{HeaderMap, HeaderValue, header};
    use pixelwall_core::TenantId;

    use super::{
        DetectParams, TRANSPARENT_PNG, client_ip, extract_signals, tenant_slug,
        utm_source_from_referrer,
    };

    fn peer() -> SocketAddr {
        SocketAddr::new(IpAddr::V4(Ipv4Addr::new(192, 0, 2, 10)), 40_000)
    }

    #[test]
    fn pixel_bytes_are_a_valid_minimal_png() {
        assert_eq!(TRANSPARENT_PNG.len(), 67);
        assert!(TRANSPARENT_PNG.starts_with(b"\x89PNG\r\n\x1a\n"));
        assert!(TRANSPARENT_PNG.ends_with(b"IEND\xaeB`\x82"));
    }

    #[test]
    fn tenant_slug_strips_png_suffix_once() {
        assert_eq!(tenant_slug("acme.png"), "acme");
        assert_eq!(tenant_slug("acme"), "acme");
        assert_eq!(tenant_slug("acme.png.png"), "acme.png");
    }

    #[test]
    fn blank_slug_falls_back_to_the_default_tenant() {
        assert_eq!(tenant_slug(".png"), "default");
        assert_eq!(tenant_slug(" "), "default");
    }

    #[test]
    fn forwarded_for_first_hop_wins_over_peer() {
        let mut headers = HeaderMap::new();
        headers.insert(
            "x-forwarded-for",
            HeaderValue::from_static("203.0.113.7, 10.0.0.1"),
        );
        assert_eq!(client_ip(&headers, peer()), "203.0.113.7");

        assert_eq!(client_ip(&HeaderMap::new(), peer()), "192.0.2.10");
    }

    #[test]
    fn utm_source_recovered_from_referrer_query() {
        assert_eq!(
            utm_source_from_referrer("https://example.org/post?utm_source=chatgpt.com&x=1"),
            Some("chatgpt.com".to_owned())
        );
        assert_eq!(
            utm_source_from_referrer("https://example.org/post"),
            None
        );
    }

    #[test]
    fn query_ua_overrides_header() {
        let Ok(tenant_id) = TenantId::new("acme") else {
            return;
        };
        let mut headers = HeaderMap::new();
        headers.insert(header::USER_AGENT, HeaderValue::from_static("HeaderUA/1.0"));

        let params = DetectParams {
            ua: Some("QueryUA/2.0".to_owned()),
            ..DetectParams::default()
        };
        let signals = extract_signals(&tenant_id, &params, &headers, peer());
        assert_eq!(signals.user_agent, "QueryUA/2.0");

        let signals = extract_signals(&tenant_id, &DetectParams::default(), &headers, peer());
        assert_eq!(signals.user_agent, "HeaderUA/1.0");
        assert_eq!(signals.path, "/detect/acme.png");
    }
}
