//! Cookie banner detection and acceptance.

use anyhow::Result;
use serde::Deserialize;
use web_explorer::Operation;

use crate::context::RunContext;
use crate::dom::{self, Outcome};
use crate::html;
use crate::model::tool_arguments;
use crate::prompts::{ACCEPT_COOKIES_SELECTOR, SEARCH_COOKIES};

#[derive(Deserialize)]
struct AcceptArgs {
    selector: String,
}

/// Look for a cookie banner and click its accept button.
///
/// Returns whether a banner was found and accepted. A banner whose button
/// cannot be clicked is logged and left alone.
pub async fn accept_if_present(ctx: &RunContext) -> Result<bool> {
    let parts = html::page_parts(&ctx.session, ctx.config.html_part_length).await?;

    let mut banner = None;
    for part in &parts {
        let reply = ctx.ask(SEARCH_COOKIES, &[("html_part", part.as_str())], false).await?;
        if reply.says("yes") {
            banner = Some(part);
            break;
        }
    }
    let Some(part) = banner else {
        tracing::debug!("no cookie banner");
        return Ok(false);
    };

    let reply = ctx.ask(ACCEPT_COOKIES_SELECTOR, &[("html_part", part.as_str())], false).await?;
    let args: AcceptArgs = tool_arguments(&reply, "accept_cookies")?;
    let op = Operation::click(args.selector);
    match dom::apply(&ctx.session, &op, ctx.config.browser_timeout_ms).await? {
        Outcome::Applied => {
            tracing::info!(selector = %op.selector, "cookie banner accepted");
            tokio::time::sleep(ctx.config.action_sleep).await;
            Ok(true)
        }
        outcome => {
            tracing::warn!(selector = %op.selector, outcome = ?outcome, "could not accept cookie banner");
            Ok(false)
        }
    }
}
