//! The single browser tab shared by the describer, executor, and navigator.
//!
//! Each collaborator holds a clone of the same [`BrowserSession`]; the tab
//! itself sits behind a mutex so only one of them talks to it at a time.

use crate::renderer::{NavigationResult, RenderContext};
use anyhow::Result;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Mutex;

/// Shared handle to one browser tab.
#[derive(Clone)]
pub struct BrowserSession {
    /// Unique session identifier, included in log events.
    pub id: String,
    context: Arc<Mutex<Box<dyn RenderContext>>>,
    created_at: Instant,
    navigation_timeout_ms: u64,
}

impl BrowserSession {
    /// Wrap a freshly created browser context.
    pub fn new(context: Box<dyn RenderContext>, navigation_timeout_ms: u64) -> Self {
        Self {
            id: format!("sess-{}", uuid::Uuid::new_v4().simple()),
            context: Arc::new(Mutex::new(context)),
            created_at: Instant::now(),
            navigation_timeout_ms,
        }
    }

    pub async fn url(&self) -> Result<String> {
        self.context.lock().await.get_url().await
    }

    pub async fn screenshot(&self) -> Result<Vec<u8>> {
        self.context.lock().await.screenshot().await
    }

    pub async fn eval(&self, script: &str) -> Result<serde_json::Value> {
        self.context.lock().await.execute_js(script).await
    }

    pub async fn navigate(&self, url: &str) -> Result<NavigationResult> {
        let result = self
            .context
            .lock()
            .await
            .navigate(url, self.navigation_timeout_ms)
            .await?;
        tracing::debug!(
            session = %self.id,
            url = %result.final_url,
            load_time_ms = result.load_time_ms,
            "navigated"
        );
        Ok(result)
    }

    pub async fn back(&self) -> Result<()> {
        self.context
            .lock()
            .await
            .go_back(self.navigation_timeout_ms)
            .await
    }

    /// How long the session has been alive.
    pub fn age(&self) -> std::time::Duration {
        self.created_at.elapsed()
    }

    /// Close the tab if this is the last handle to it.
    pub async fn close(self) -> Result<()> {
        let age = self.age();
        match Arc::try_unwrap(self.context) {
            Ok(mutex) => {
                tracing::debug!(session = %self.id, age_ms = age.as_millis() as u64, "closing session");
                mutex.into_inner().close().await
            }
            Err(_) => {
                tracing::debug!(session = %self.id, "session still shared, not closing");
                Ok(())
            }
        }
    }
}
