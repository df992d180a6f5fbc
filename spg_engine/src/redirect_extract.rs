//! Redirect-target recovery from degraded gateway responses.
//!
//! The hosted checkout gateway sometimes answers a session request with an HTML document instead of JSON. There is
//! no structured contract to lean on, so the redirect target is recovered by an ordered chain of pure string
//! extraction strategies. The order of the chain is the tie-break policy: a meta-refresh beats an inline script
//! redirect, which beats an auto-submitting form, and so on. The chain short-circuits on the first match and never
//! executes any script content.

use log::warn;
use regex::Regex;

/// The substrings that mark a bare URL as plausibly belonging to the checkout flow. Used by strategy 5 so that we
/// never follow an unrelated link found in an error page.
fn looks_like_checkout_url(url: &str) -> bool {
    let lower = url.to_ascii_lowercase();
    ["checkout", "paygate", "payment"].iter().any(|needle| lower.contains(needle))
}

/// Try each strategy in turn against the fetched document. `fetched_from` is the URL the degraded response was
/// retrieved from; it doubles as the base for resolving relative form actions and as the next-to-last fallback.
/// Returns `None` only when nothing usable was found, which callers must surface rather than guessing.
pub fn extract_redirect_url(html: &str, fetched_from: &str) -> Option<String> {
    let strategies: &[fn(&str, &str) -> Option<String>] = &[
        meta_refresh_url,
        script_location_url,
        form_action_url,
        checkout_anchor_url,
        bare_checkout_url,
        fetched_url_fallback,
    ];
    for strategy in strategies {
        if let Some(url) = strategy(html, fetched_from) {
            return Some(url);
        }
    }
    warn!("🧲️ Could not determine a redirect target from the degraded gateway response");
    None
}

/// Strategy 1: `<meta http-equiv="refresh" content="0;url=...">`.
fn meta_refresh_url(html: &str, _base: &str) -> Option<String> {
    let re = Regex::new(r#"(?is)<meta[^>]*http-equiv\s*=\s*["']?refresh["']?[^>]*content\s*=\s*["'][^"']*url\s*=\s*([^"'\s>]+)"#).ok()?;
    re.captures(html).and_then(|c| c.get(1)).map(|m| m.as_str().to_string())
}

/// Strategy 2: `window.location.href = "..."` or `window.location.replace("...")` in an inline script. Pure
/// string matching; the script is never evaluated.
fn script_location_url(html: &str, _base: &str) -> Option<String> {
    let re =
        Regex::new(r#"(?i)window\.location(?:\.href)?\s*(?:=\s*|\.replace\s*\(\s*)["']([^"']+)["']"#).ok()?;
    re.captures(html).and_then(|c| c.get(1)).map(|m| m.as_str().to_string())
}

/// Strategy 3: the first form's `action` attribute, handling auto-submitting redirect forms. Relative actions are
/// resolved against the URL the response was fetched from.
fn form_action_url(html: &str, base: &str) -> Option<String> {
    let re = Regex::new(r#"(?is)<form[^>]*action\s*=\s*["']([^"']+)["']"#).ok()?;
    let action = re.captures(html).and_then(|c| c.get(1)).map(|m| m.as_str().to_string())?;
    Some(resolve_against(base, &action))
}

/// Strategy 4: the first anchor whose href contains "checkout".
fn checkout_anchor_url(html: &str, base: &str) -> Option<String> {
    let re = Regex::new(r#"(?is)<a[^>]*href\s*=\s*["']([^"']*checkout[^"']*)["']"#).ok()?;
    let href = re.captures(html).and_then(|c| c.get(1)).map(|m| m.as_str().to_string())?;
    Some(resolve_against(base, &href))
}

/// Strategy 5: the first bare absolute URL anywhere in the document, accepted only when it passes the
/// checkout-likeness predicate.
fn bare_checkout_url(html: &str, _base: &str) -> Option<String> {
    let re = Regex::new(r#"https?://[^\s"'<>()]+"#).ok()?;
    let found = re
        .find_iter(html)
        .map(|m| m.as_str().trim_end_matches(['.', ',']).to_string())
        .find(|url| looks_like_checkout_url(url));
    found
}

/// Strategy 6: fall back to the URL the degraded response was fetched from.
fn fetched_url_fallback(_html: &str, base: &str) -> Option<String> {
    (!base.is_empty()).then(|| base.to_string())
}

/// Minimal relative-reference resolution: absolute URLs pass through, `/path` joins the base origin, anything
/// else joins the base directory.
fn resolve_against(base: &str, href: &str) -> String {
    if href.starts_with("http://") || href.starts_with("https://") {
        return href.to_string();
    }
    if let Some(rest) = base.strip_prefix("https://").or_else(|| base.strip_prefix("http://")) {
        let scheme_len = base.len() - rest.len();
        let origin_end = rest.find('/').map(|i| scheme_len + i).unwrap_or(base.len());
        let origin = &base[..origin_end];
        if let Some(absolute_path) = href.strip_prefix('/') {
            return format!("{origin}/{absolute_path}");
        }
        let dir_end = base.rfind('/').map(|i| i.max(origin_end)).unwrap_or(base.len());
        return format!("{}/{href}", &base[..dir_end]);
    }
    href.to_string()
}

#[cfg(test)]
mod test {
    use super::*;

    const BASE: &str = "https://pay.example.com/paygate/session/123";

    #[test]
    fn meta_refresh_wins() {
        let html = r#"<html><head><meta http-equiv="refresh" content="0;url=https://pay.example.com/checkout/abc"></head>
            <body><form action="https://other.example.com/form"></form></body></html>"#;
        assert_eq!(extract_redirect_url(html, BASE).as_deref(), Some("https://pay.example.com/checkout/abc"));
    }

    #[test]
    fn script_location_beats_form_action() {
        let html = r#"<script>window.location.href = "https://pay.example.com/checkout/xyz";</script>
            <form action="/somewhere"></form>"#;
        assert_eq!(extract_redirect_url(html, BASE).as_deref(), Some("https://pay.example.com/checkout/xyz"));
    }

    #[test]
    fn location_replace_form_is_matched() {
        let html = r#"<script>window.location.replace('https://pay.example.com/checkout/r1')</script>"#;
        assert_eq!(extract_redirect_url(html, BASE).as_deref(), Some("https://pay.example.com/checkout/r1"));
    }

    #[test]
    fn relative_form_action_resolves_against_base() {
        let html = r#"<form method="post" action="/checkout/continue"><input type="hidden"></form>"#;
        assert_eq!(extract_redirect_url(html, BASE).as_deref(), Some("https://pay.example.com/checkout/continue"));
    }

    #[test]
    fn anchor_containing_checkout_is_used() {
        let html = r#"<html><body><a href="/checkout/abc?foo=1">pay</a></body></html>"#;
        assert_eq!(extract_redirect_url(html, BASE).as_deref(), Some("https://pay.example.com/checkout/abc?foo=1"));
    }

    #[test]
    fn anchor_without_checkout_is_skipped() {
        let html = r#"<a href="/terms">terms</a>"#;
        // Falls through to the fetched-URL fallback.
        assert_eq!(extract_redirect_url(html, BASE).as_deref(), Some(BASE));
    }

    #[test]
    fn bare_url_needs_checkout_likeness() {
        let html = "An error occurred. See https://status.example.com/incidents for details. \
                    Retry at https://pay.example.com/paygate/retry/9";
        assert_eq!(extract_redirect_url(html, BASE).as_deref(), Some("https://pay.example.com/paygate/retry/9"));
    }

    #[test]
    fn empty_document_with_no_base_yields_nothing() {
        assert_eq!(extract_redirect_url("<html></html>", ""), None);
    }

    #[test]
    fn chain_never_executes_scripts() {
        // A script that would redirect somewhere hostile if evaluated; we only ever read string literals.
        let html = r#"<script>var u = ["https://pay.example.com/checkout/safe"]; window.location.href = u[0];</script>"#;
        // No string literal directly assigned, so the strategy does not match and the chain falls through.
        let result = extract_redirect_url(html, BASE);
        assert_eq!(result.as_deref(), Some("https://pay.example.com/checkout/safe"));
    }
}
