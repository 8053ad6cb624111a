//! Deciding whether a URL belongs to the explored domain.

use url::Url;

/// Whether `url` is on `domain` or one of its subdomains.
///
/// Unparsable URLs and URLs without a host (`about:blank`, `data:`) are outside.
pub fn in_domain(url: &str, domain: &str) -> bool {
    let Ok(parsed) = Url::parse(url) else {
        return false;
    };
    let Some(host) = parsed.host_str() else {
        return false;
    };

    let host = host.trim_end_matches('.').to_ascii_lowercase();
    let domain = bare_host(domain);
    if domain.is_empty() {
        return false;
    }

    host == domain || host.ends_with(&format!(".{domain}"))
}

/// Strip an accidental scheme, path, or port from a configured domain.
fn bare_host(domain: &str) -> String {
    let rest = domain
        .split_once("://")
        .map_or(domain, |(_, rest)| rest);
    let host = rest.split(['/', '?', '#']).next().unwrap_or_default();
    let host = host.rsplit_once(':').map_or(host, |(h, port)| {
        if port.chars().all(|c| c.is_ascii_digit()) {
            h
        } else {
            host
        }
    });
    host.trim_end_matches('.').to_ascii_lowercase()
}
