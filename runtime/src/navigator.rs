//! Browser-backed navigation.

use anyhow::Result;
use async_trait::async_trait;
use web_explorer::ExplorerResult;

use crate::context::RunContext;
use crate::cookies;
use crate::error::into_explorer;

/// [`web_explorer::Navigator`] over the shared browser tab.
///
/// With cookie acceptance enabled, every full navigation is followed by a
/// cookie banner check, so replays from the root start from a clean page.
pub struct BrowserNavigator {
    ctx: RunContext,
}

impl BrowserNavigator {
    pub fn new(ctx: RunContext) -> Self {
        Self { ctx }
    }

    async fn open(&self, url: &str) -> Result<()> {
        let result = self.ctx.session.navigate(url).await?;
        tracing::info!(url = %result.final_url, load_time_ms = result.load_time_ms, "page opened");
        if self.ctx.config.accept_cookies {
            if let Err(e) = cookies::accept_if_present(&self.ctx).await {
                tracing::warn!(error = %format!("{e:#}"), "cookie banner check failed");
            }
        }
        Ok(())
    }

    async fn back(&self) -> Result<()> {
        self.ctx.session.back().await?;
        tokio::time::sleep(self.ctx.config.action_sleep).await;
        Ok(())
    }
}

#[async_trait]
impl web_explorer::Navigator for BrowserNavigator {
    async fn current_url(&mut self) -> ExplorerResult<String> {
        self.ctx.session.url().await.map_err(into_explorer)
    }

    async fn navigate(&mut self, url: &str) -> ExplorerResult<()> {
        self.open(url).await.map_err(into_explorer)
    }

    async fn go_back(&mut self) -> ExplorerResult<()> {
        self.back().await.map_err(into_explorer)
    }
}
