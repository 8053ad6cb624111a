//! Low-level page operations: click, fill, select.
//!
//! Each operation becomes one JS snippet that waits for its element,
//! scrolls it into view, and acts on it. Selectors and values are escaped
//! and only ever placed inside string literals.

use std::time::Duration;

use anyhow::Result;
use web_explorer::{Operation, OperationKind};

use crate::session::BrowserSession;

/// What happened when an operation was applied to the page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Applied,
    /// The element did not appear within the browser timeout.
    Timeout,
    Failed(String),
}

impl Outcome {
    /// The tool-result text reported back to the model.
    pub fn tool_message(&self) -> String {
        match self {
            Self::Applied => "OK".to_string(),
            Self::Timeout => "Timeout error".to_string(),
            Self::Failed(e) => format!("Error: {e}"),
        }
    }
}

/// Build the JS snippet for one operation.
///
/// The snippet resolves to `{ ok: true }`, `{ ok: false, timeout: true }`,
/// or `{ ok: false, error: "..." }`.
pub fn operation_script(op: &Operation, timeout_ms: u64) -> String {
    let selector = sanitize_js_string(&op.selector);
    let value = sanitize_js_string(op.value.as_deref().unwrap_or(""));
    let act = match op.kind {
        OperationKind::Click => "el.click();".to_string(),
        OperationKind::Fill => format!(
            r#"if (!('value' in el)) {{ return {{ ok: false, error: 'element is not a text input' }}; }}
            el.focus();
            el.value = '{value}';
            el.dispatchEvent(new Event('input', {{ bubbles: true }}));
            el.dispatchEvent(new Event('change', {{ bubbles: true }}));"#
        ),
        OperationKind::Select => format!(
            r#"if (el.tagName !== 'SELECT') {{ return {{ ok: false, error: 'element is not a select' }}; }}
            if (![...el.options].some(o => o.value === '{value}')) {{ return {{ ok: false, error: 'no such option' }}; }}
            el.value = '{value}';
            el.dispatchEvent(new Event('change', {{ bubbles: true }}));"#
        ),
    };
    format!(
        r#"(async () => {{
            const deadline = Date.now() + {timeout_ms};
            let el = null;
            while (true) {{
                try {{ el = document.querySelector('{selector}'); }}
                catch (e) {{ return {{ ok: false, error: 'invalid selector: ' + e.message }}; }}
                if (el && (el.offsetWidth || el.offsetHeight || el.getClientRects().length)) {{ break; }}
                if (Date.now() > deadline) {{ return {{ ok: false, timeout: true }}; }}
                await new Promise(r => setTimeout(r, 100));
            }}
            el.scrollIntoView({{ block: 'center', inline: 'center' }});
            {act}
            return {{ ok: true }};
        }})()"#
    )
}

fn outcome_from(value: &serde_json::Value) -> Outcome {
    if value.get("ok").and_then(|v| v.as_bool()).unwrap_or(false) {
        return Outcome::Applied;
    }
    if value.get("timeout").and_then(|v| v.as_bool()).unwrap_or(false) {
        return Outcome::Timeout;
    }
    let error = value
        .get("error")
        .and_then(|v| v.as_str())
        .unwrap_or("operation returned no result");
    Outcome::Failed(error.to_string())
}

/// Apply one operation to the page.
///
/// Script-level failures are reported as an [`Outcome`]; only a broken
/// browser connection is an `Err`.
pub async fn apply(session: &BrowserSession, op: &Operation, timeout_ms: u64) -> Result<Outcome> {
    let script = operation_script(op, timeout_ms);
    // Leave room for the script's own deadline before giving up on the tab.
    let limit = Duration::from_millis(timeout_ms + 2_000);
    let outcome = match tokio::time::timeout(limit, session.eval(&script)).await {
        Ok(Ok(value)) => outcome_from(&value),
        Ok(Err(e)) => Outcome::Failed(format!("{e:#}")),
        Err(_) => Outcome::Timeout,
    };
    tracing::debug!(
        kind = %op.kind,
        selector = %op.selector,
        outcome = ?outcome,
        "operation applied"
    );
    Ok(outcome)
}

/// Escape a string for a single- or double-quoted JS string literal.
///
/// Covers backslashes, quotes, backticks, line breaks, and tabs. Null bytes
/// are dropped, and angle brackets are hex-escaped so a value can never
/// close a surrounding `<script>`.
pub fn sanitize_js_string(s: &str) -> String {
    let mut result = String::with_capacity(s.len() + 8);
    for ch in s.chars() {
        match ch {
            '\\' => result.push_str("\\\\"),
            '\'' => result.push_str("\\'"),
            '"' => result.push_str("\\\""),
            '`' => result.push_str("\\`"),
            '\n' => result.push_str("\\n"),
            '\r' => result.push_str("\\r"),
            '\t' => result.push_str("\\t"),
            '\0' => {}
            '<' => result.push_str("\\x3c"),
            '>' => result.push_str("\\x3e"),
            _ => result.push(ch),
        }
    }
    result
}
