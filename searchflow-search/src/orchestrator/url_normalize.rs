//! Canonical URL keys for result deduplication.
//!
//! Two hits that point at the same page but differ in case, `www.` prefix,
//! default port, trailing slash, tracking parameters, parameter order or
//! fragment produce the same key.

use url::Url;
use url::form_urlencoded;

/// Query parameters dropped from the key. Any `utm_*` key is dropped too.
const TRACKING_PARAMS: &[&str] = &[
    "fbclid", "gclid", "dclid", "msclkid", "mc_cid", "mc_eid", "yclid", "ref", "ref_src",
    "igshid", "si",
];

/// Build the deduplication key for `raw`.
///
/// Transformations:
///
/// 1. Scheme and host lowercased (done by the URL parser); a leading
///    `www.` label is removed from the host.
/// 2. Default ports (`:80` for http, `:443` for https) removed.
/// 3. Tracking parameters removed; the rest sorted by key, then value.
/// 4. Trailing slash removed from non-root paths.
/// 5. Fragment removed.
///
/// Strings that do not parse as URLs are trimmed and returned otherwise
/// unchanged, so they still deduplicate against identical strings.
///
/// # Examples
///
/// ```
/// use searchflow_search::orchestrator::url_normalize::normalize_url;
///
/// let a = normalize_url("https://WWW.Example.com/docs/?b=2&a=1&utm_source=x#top");
/// let b = normalize_url("https://example.com/docs?a=1&b=2");
/// assert_eq!(a, b);
/// ```
pub fn normalize_url(raw: &str) -> String {
    let trimmed = raw.trim();
    let Ok(mut parsed) = Url::parse(trimmed) else {
        return trimmed.to_owned();
    };

    parsed.set_fragment(None);

    if let Some(host) = parsed.host_str().and_then(|h| h.strip_prefix("www.")) {
        let host = host.to_owned();
        // Only fails for cannot-be-a-base URLs, which have no host anyway.
        let _ = parsed.set_host(Some(&host));
    }

    if matches!(
        (parsed.scheme(), parsed.port()),
        ("http", Some(80)) | ("https", Some(443))
    ) {
        let _ = parsed.set_port(None);
    }

    let mut params: Vec<(String, String)> = parsed
        .query_pairs()
        .filter(|(key, _)| !is_tracking_param(key))
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();
    params.sort();

    if params.is_empty() {
        parsed.set_query(None);
    } else {
        let query = form_urlencoded::Serializer::new(String::new())
            .extend_pairs(params.iter())
            .finish();
        parsed.set_query(Some(&query));
    }

    let path = parsed.path().to_owned();
    if path.len() > 1 && path.ends_with('/') {
        parsed.set_path(path.trim_end_matches('/'));
    }

    parsed.to_string()
}

fn is_tracking_param(key: &str) -> bool {
    let key = key.to_ascii_lowercase();
    key.starts_with("utm_") || TRACKING_PARAMS.contains(&key.as_str())
}
