//! Serves the copy-paste tracking snippet for a tenant.
//!
//! The snippet plants three probes on the embedding page: a hidden
//! honeypot link crawlers follow, a `js=1` beacon fired when the probe
//! sees a webdriver flag or a failed paint-timing check, and a `js=2`
//! pixel load carrying a JSON fingerprint when the renderer looks real.
//! A noscript fallback covers clients that never run the script.

use axum::extract::{Query, State};
use axum::http::header;
use axum::response::{IntoResponse, Response};
use serde::Deserialize;

use pixelwall_core::TenantId;

use crate::error::ApiResult;
use crate::state::AppState;

const SNIPPET_TEMPLATE: &str = concat!(
    "<a href={base}/detect/{t}.png style=display:none rel=nofollow>@prompt:/?</a>",
    "<script>!async function(){if(navigator.webdriver||!(await new Promise(r=>{",
    "let e=performance.now(),t=1;requestAnimationFrame(()=>{(performance.now()-e<2)&&(t=0),r(t)}),",
    "setTimeout(()=>r(t),5)})))return fetch(\"{base}/detect/{t}.png?js=1\").catch(1);",
    "let f=JSON.stringify({webdriver:!!navigator.webdriver,ua:navigator.userAgent,",
    "brands:(navigator.userAgentData&&navigator.userAgentData.brands||[]).map(b=>b.brand)}),",
    "n=new Image;n.src=`{base}/detect/{t}.png?js=2&fp=${encodeURIComponent(f)}",
    "&src=${encodeURIComponent(location.href)}`,",
    "n.style.display=\"none\",document.body.appendChild(n)}()</script>",
    "<noscript><img src={base}/detect/{t}.png?noscript=1 style=display:none alt></noscript>",
);

/// Query parameters for the snippet endpoint.
#[derive(Debug, Deserialize)]
pub struct SnippetParams {
    /// Tenant the snippet reports to.
    pub tenant: String,
}

pub async fn embed_snippet_handler(
    State(state): State<AppState>,
    Query(params): Query<SnippetParams>,
) -> ApiResult<Response> {
    let tenant_id = TenantId::new(&params.tenant)?;

    let snippet = render_snippet(&state.public_base_url, &tenant_id);
    Ok((
        [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        snippet,
    )
        .into_response())
}

fn render_snippet(base_url: &str, tenant_id: &TenantId) -> String {
    SNIPPET_TEMPLATE
        .replace("{base}", base_url.trim_end_matches('/'))
        .replace("{t}", tenant_id.as_str())
}

#[cfg(test)]
mod tests {
    use pixelwall_core::TenantId;

    use super::render_snippet;

    #[test]
    fn snippet_substitutes_tenant_and_base_url() {
        let Ok(tenant_id) = TenantId::new("acme") else {
            return;
        };
        let snippet = render_snippet("https://pixels.example.net/", &tenant_id);

        assert!(snippet.contains("https://pixels.example.net/detect/acme.png"));
        assert!(!snippet.contains("{t}"));
        assert!(!snippet.contains("{base}"));
        assert!(snippet.contains("noscript=1"));
        assert!(snippet.contains("js=1"));
        assert!(snippet.contains("js=2"));
    }
}
