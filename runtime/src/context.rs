//! Everything one exploration run shares: the browser tab, the model
//! client, the prompts, and the runtime settings.

use std::sync::Arc;

use anyhow::Result;

use crate::config::RuntimeConfig;
use crate::model::{ChatMessage, ModelClient};
use crate::prompts::PromptRepository;
use crate::session::BrowserSession;

/// Handle passed to every collaborator of a run. Cheap to clone.
#[derive(Clone)]
pub struct RunContext {
    pub session: BrowserSession,
    pub model: ModelClient,
    pub prompts: Arc<PromptRepository>,
    pub config: Arc<RuntimeConfig>,
}

impl RunContext {
    pub fn new(
        session: BrowserSession,
        model: ModelClient,
        prompts: PromptRepository,
        config: RuntimeConfig,
    ) -> Self {
        Self {
            session,
            model,
            prompts: Arc::new(prompts),
            config: Arc::new(config),
        }
    }

    /// Send the named prompt, optionally with a screenshot of the page.
    pub async fn ask(
        &self,
        prompt: &str,
        data: &[(&str, &str)],
        with_screenshot: bool,
    ) -> Result<ChatMessage> {
        let prompt = self.prompts.get(prompt)?;
        let screenshot = if with_screenshot {
            Some(self.session.screenshot().await?)
        } else {
            None
        };
        Ok(self.model.ask(prompt, data, screenshot.as_deref()).await?)
    }
}
