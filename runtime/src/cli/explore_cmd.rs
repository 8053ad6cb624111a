//! `web-explorer explore <domain>`: explore a web application and export its graph.

use std::path::PathBuf;

use anyhow::{Context, Result};
use web_explorer::{Collaborators, Explorer, ExplorerConfig, SnapshotReader, StateStore};

use super::output::{self, OutputFormat};
use crate::config::{resolve_data_dir, Credentials, ModelSettings, RuntimeConfig};
use crate::context::RunContext;
use crate::describer::LlmDescriber;
use crate::executor::LlmExecutor;
use crate::model::ModelClient;
use crate::navigator::BrowserNavigator;
use crate::prompts::PromptRepository;
use crate::renderer::chromium::ChromiumRenderer;
use crate::renderer::Renderer;
use crate::session::BrowserSession;

/// Options of one exploration run.
#[derive(Debug, Clone)]
pub struct ExploreArgs {
    pub domain: String,
    pub iterations: Option<usize>,
    pub output: OutputFormat,
    pub output_file: Option<PathBuf>,
    pub restore: Option<PathBuf>,
    pub login: Option<Credentials>,
    pub additional_info: Option<String>,
    pub store_titles: bool,
    pub confirm_titles: bool,
    pub accept_cookies: bool,
    pub prompts: Option<PathBuf>,
    pub autosave: Option<PathBuf>,
    pub headed: bool,
    pub seed: Option<u64>,
    pub data_dir: Option<PathBuf>,
}

impl ExploreArgs {
    fn explorer_config(&self) -> ExplorerConfig {
        ExplorerConfig {
            iterations: self.iterations,
            autosave: self.autosave.clone(),
            ..ExplorerConfig::default()
        }
    }

    fn runtime_config(&self) -> RuntimeConfig {
        RuntimeConfig {
            data_dir: resolve_data_dir(self.data_dir.as_deref()),
            accept_cookies: self.accept_cookies,
            store_titles: self.store_titles,
            confirm_titles: self.confirm_titles,
            additional_info: self.additional_info.clone(),
            credentials: self.login.clone(),
            prompts_file: self.prompts.clone(),
            ..RuntimeConfig::default()
        }
    }
}

/// Load the store to resume from, or start empty.
fn initial_store(restore: Option<&std::path::Path>, threshold: f32) -> Result<StateStore> {
    match restore {
        Some(path) => {
            let store = SnapshotReader::read_from_file(path, threshold)
                .with_context(|| format!("failed to restore from {}", path.display()))?;
            tracing::info!(path = %path.display(), states = store.len(), "exploration restored");
            Ok(store)
        }
        None => Ok(StateStore::new(threshold)),
    }
}

pub async fn run(args: ExploreArgs) -> Result<()> {
    let explorer_config = args.explorer_config();
    let runtime_config = args.runtime_config();

    let model = ModelClient::new(ModelSettings::from_env()?)?;
    let prompts = PromptRepository::load(runtime_config.prompts_file.as_deref())?;
    let store = initial_store(args.restore.as_deref(), explorer_config.similarity_threshold)?;

    let mut explorer = Explorer::with_store(&args.domain, explorer_config, store);
    if let Some(seed) = args.seed {
        explorer = explorer.with_seed(seed);
    }

    let renderer = ChromiumRenderer::launch(
        runtime_config.chromium_path.as_deref(),
        runtime_config.window_size,
        !args.headed,
    )
    .await?;
    let session = BrowserSession::new(
        renderer.new_context().await?,
        runtime_config.navigation_timeout_ms,
    );
    tracing::info!(domain = %args.domain, session = %session.id, "exploration starting");

    let ctx = RunContext::new(session.clone(), model, prompts, runtime_config);
    let mut describer = LlmDescriber::new(ctx.clone())?;
    let mut executor = LlmExecutor::new(ctx.clone());
    let mut navigator = BrowserNavigator::new(ctx);

    let result = explorer
        .run(Collaborators {
            describer: &mut describer,
            executor: &mut executor,
            navigator: &mut navigator,
        })
        .await;

    // Whatever was explored is exported, even when the run failed.
    let exported = output::write_output(explorer.store(), args.output, args.output_file.as_deref());

    drop((describer, executor, navigator));
    if let Err(e) = session.close().await {
        tracing::warn!(error = %format!("{e:#}"), "failed to close browser tab");
    }
    tracing::debug!(open_tabs = renderer.active_contexts(), "shutting down browser");
    renderer.shutdown().await?;

    let reason = result?;
    exported?;
    tracing::info!(
        ?reason,
        iterations = explorer.iterations(),
        states = explorer.store().len(),
        transitions = explorer.store().transition_count(),
        "exploration finished"
    );
    Ok(())
}
