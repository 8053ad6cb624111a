//! Page HTML extraction: clean in the browser, minify and split in Rust.
//!
//! The model only needs structure and the few attributes that identify
//! elements, so invisible elements, presentational tags, comments, and all
//! other attributes are dropped before anything is sent.

use std::sync::OnceLock;

use anyhow::{Context, Result};
use regex::Regex;
use web_explorer::ExplorerError;

use crate::session::BrowserSession;

/// Attributes kept on every element.
pub const ALLOWED_ATTRIBUTES: &[&str] = &[
    "id",
    "name",
    "value",
    "placeholder",
    "data-test-id",
    "data-testid",
    "data-current-value",
    "href",
];

/// Records form values and visibility on the live DOM, then cleans a copy.
///
/// Returns `null` for `about:blank`.
const CLEAN_HTML_SCRIPT: &str = r#"(() => {
    if (location.href === 'about:blank') { return null; }
    const MARK = 'data-explorer-invisible';
    document.querySelectorAll('input, textarea, select').forEach(el => {
        el.setAttribute('data-current-value', el.value ?? '');
    });
    document.querySelectorAll('*').forEach(el => {
        const visible = !!(el.offsetWidth || el.offsetHeight || el.getClientRects().length);
        if (visible) { el.removeAttribute(MARK); } else { el.setAttribute(MARK, 'true'); }
    });
    const root = document.documentElement.cloneNode(true);
    root.querySelectorAll('[' + MARK + ']').forEach(el => el.remove());
    root.querySelectorAll('path, meta, link, noscript, script, style').forEach(el => el.remove());
    const allowed = new Set(__ALLOWED__);
    [root, ...root.querySelectorAll('*')].forEach(el => {
        [...el.attributes].forEach(a => { if (!allowed.has(a.name)) { el.removeAttribute(a.name); } });
    });
    const walker = document.createTreeWalker(root, NodeFilter.SHOW_COMMENT);
    const comments = [];
    while (walker.nextNode()) { comments.push(walker.currentNode); }
    comments.forEach(c => c.remove());
    return root.outerHTML;
})()"#;

fn clean_script() -> &'static str {
    static SCRIPT: OnceLock<String> = OnceLock::new();
    SCRIPT.get_or_init(|| {
        let allowed = serde_json::to_string(ALLOWED_ATTRIBUTES).unwrap_or_else(|_| "[]".into());
        CLEAN_HTML_SCRIPT.replace("__ALLOWED__", &allowed)
    })
}

fn comment_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)\s*<!--.*?-->\s*").expect("valid regex"))
}

fn between_tags_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r">\s+<").expect("valid regex"))
}

fn whitespace_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\s+").expect("valid regex"))
}

/// Remove comments and collapse insignificant whitespace.
pub fn minify(html: &str) -> String {
    let html = comment_re().replace_all(html, "");
    let html = between_tags_re().replace_all(&html, "><");
    whitespace_re().replace_all(&html, " ").trim().to_string()
}

/// Split markup on tag boundaries into parts shorter than `max_len` bytes.
///
/// A single tag longer than the limit is cut at character boundaries.
pub fn split_parts(html: &str, max_len: usize) -> Vec<String> {
    let max_len = max_len.max(2);
    let mut parts = Vec::new();
    let mut part = String::new();

    for (i, token) in html.split('<').enumerate() {
        let piece = if i == 0 {
            token.to_string()
        } else {
            format!("<{token}")
        };
        if piece.is_empty() {
            continue;
        }

        if part.len() + piece.len() < max_len {
            part.push_str(&piece);
            continue;
        }

        if !part.is_empty() {
            parts.push(std::mem::take(&mut part));
        }
        if piece.len() < max_len {
            part = piece;
        } else {
            parts.extend(chunk(&piece, max_len - 1));
        }
    }

    if !part.is_empty() {
        parts.push(part);
    }
    parts
}

fn chunk(s: &str, size: usize) -> Vec<String> {
    let mut out = Vec::new();
    let mut current = String::new();
    for ch in s.chars() {
        if current.len() + ch.len_utf8() > size && !current.is_empty() {
            out.push(std::mem::take(&mut current));
        }
        current.push(ch);
    }
    if !current.is_empty() {
        out.push(current);
    }
    out
}

/// Cleaned, minified HTML of the current page.
pub async fn page_html(session: &BrowserSession) -> Result<String> {
    let url = session.url().await?;
    if url.is_empty() || url == "about:blank" {
        return Err(ExplorerError::PageNotLoaded("no page loaded yet".into()).into());
    }

    let value = session
        .eval(clean_script())
        .await
        .context("failed to extract page HTML")?;
    match value.as_str() {
        Some(html) => Ok(minify(html)),
        None => Err(ExplorerError::PageNotLoaded(url).into()),
    }
}

/// Cleaned HTML of the current page in parts the model can take at once.
pub async fn page_parts(session: &BrowserSession, max_len: usize) -> Result<Vec<String>> {
    let html = page_html(session).await?;
    let parts = split_parts(&html, max_len);
    tracing::debug!(bytes = html.len(), parts = parts.len(), "page HTML extracted");
    Ok(parts)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minify_drops_comments_and_whitespace() {
        let html = "<div>\n  <!-- nav -->\n  <a href=\"/x\">  Go\n home </a>\n</div>";
        assert_eq!(minify(html), "<div><a href=\"/x\"> Go home </a></div>");
    }

    #[test]
    fn test_split_keeps_everything_in_order() {
        let html = "<div><p>one</p><p>two</p><p>three</p></div>";
        let parts = split_parts(html, 16);
        assert!(parts.len() > 1);
        assert!(parts.iter().all(|p| p.len() < 16));
        assert_eq!(parts.concat(), html);
        assert!(parts.iter().all(|p| p.starts_with('<')));
    }

    #[test]
    fn test_small_page_is_one_part() {
        let html = "<html><body><h1>Hi</h1></body></html>";
        assert_eq!(split_parts(html, 40_000), vec![html.to_string()]);
    }

    #[test]
    fn test_oversized_tag_is_chunked() {
        let long = format!("<p>{}</p>", "é".repeat(20));
        let parts = split_parts(&long, 10);
        assert!(parts.iter().all(|p| p.len() < 10));
        assert_eq!(parts.concat(), long);
    }

    #[test]
    fn test_empty_page() {
        assert!(split_parts("", 100).is_empty());
    }

    #[test]
    fn test_clean_script_lists_allowed_attributes() {
        let script = clean_script();
        assert!(script.contains(r#""data-current-value""#));
        assert!(!script.contains("__ALLOWED__"));
    }
}
