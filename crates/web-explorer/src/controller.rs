//! The exploration loop.
//!
//! Each iteration observes the live page, resolves it to a web state, links
//! it to the previous state if the last action succeeded, then picks and
//! executes the next action. When the current state has nothing left to try
//! the controller backtracks to the nearest reachable state that does and
//! replays the recorded path there.

use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::collaborators::{Collaborators, Describer, Executor, Navigator};
use crate::config::ExplorerConfig;
use crate::domain::in_domain;
use crate::replay::replay;
use crate::search::{find_next_action, path_to};
use crate::selection::select_action;
use crate::storage::SnapshotWriter;
use crate::store::StateStore;
use crate::types::{Execution, ExplorerError, ExplorerResult, StateId};

/// Why a run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// The configured number of iterations was reached.
    BudgetExhausted,
    /// No reachable state has an unattempted action left.
    GraphExhausted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Exploring,
    Done(StopReason),
}

/// Drives exploration of one domain.
pub struct Explorer {
    domain: String,
    config: ExplorerConfig,
    store: StateStore,
    phase: Phase,
    rng: StdRng,
    iterations: usize,
}

impl Explorer {
    /// Start exploring `domain` with an empty store.
    pub fn new(domain: impl Into<String>, config: ExplorerConfig) -> Self {
        let store = StateStore::new(config.similarity_threshold);
        Self::with_store(domain, config, store)
    }

    /// Resume exploring with previously discovered states.
    pub fn with_store(domain: impl Into<String>, config: ExplorerConfig, store: StateStore) -> Self {
        Self {
            domain: domain.into(),
            config,
            store,
            phase: Phase::Exploring,
            rng: StdRng::from_entropy(),
            iterations: 0,
        }
    }

    /// Use a fixed seed for action sampling.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = StdRng::seed_from_u64(seed);
        self
    }

    pub fn domain(&self) -> &str {
        &self.domain
    }

    pub fn config(&self) -> &ExplorerConfig {
        &self.config
    }

    /// Everything discovered so far, also after a failed run.
    pub fn store(&self) -> &StateStore {
        &self.store
    }

    pub fn into_store(self) -> StateStore {
        self.store
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Iterations completed across all runs.
    pub fn iterations(&self) -> usize {
        self.iterations
    }

    pub fn root_url(&self) -> String {
        self.config.root_url(&self.domain)
    }

    /// Explore until the iteration budget or the reachable graph runs out.
    pub async fn run(&mut self, collaborators: Collaborators<'_>) -> ExplorerResult<StopReason> {
        let Collaborators {
            describer,
            executor,
            navigator,
        } = collaborators;

        self.phase = Phase::Exploring;
        let budget = self.config.iterations;
        if budget == Some(0) {
            return Ok(self.finish(StopReason::BudgetExhausted));
        }

        let root_url = self.root_url();
        tracing::info!(domain = %self.domain, root = %root_url, budget = ?budget, "exploration started");
        navigator.navigate(&root_url).await?;

        let mut pending: Option<(StateId, usize, Execution)> = None;
        let mut iteration = 0usize;

        loop {
            iteration += 1;
            tracing::info!(
                iteration,
                states = self.store.len(),
                transitions = self.store.transition_count(),
                "iteration started"
            );

            let current = self.observe(describer).await?;
            let current = self.resolve(describer, navigator, current).await?;

            // A success is only recorded together with its edge, so a snapshot
            // never holds a succeeded action without a transition.
            if let Some((from, action_index, execution)) = pending.take() {
                self.store.record_outcome(from, action_index, execution)?;
                self.store.add_transition(from, action_index, current)?;
                tracing::debug!(from = %from, to = %current, "transition recorded");
            }

            if budget.is_some_and(|n| iteration >= n) {
                self.end_iteration()?;
                return Ok(self.finish(StopReason::BudgetExhausted));
            }

            let Some((state, action_index)) = self
                .choose(current, executor, navigator, &root_url)
                .await?
            else {
                self.end_iteration()?;
                return Ok(self.finish(StopReason::GraphExhausted));
            };

            let action = self.store.action(state, action_index)?.clone();
            tracing::info!(
                state = %state,
                action = %action.description,
                priority = action.priority,
                "executing action"
            );
            let mut execution = executor.execute(&action).await?;

            let url = navigator.current_url().await?;
            if !in_domain(&url, &self.domain) {
                tracing::warn!(url = %url, action = %action.description, "action left the domain");
                execution.success = false;
                execution.operations.clear();
                self.return_to_domain(executor, navigator, &root_url, state)
                    .await?;
            }

            let success = execution.success;
            if success {
                pending = Some((state, action_index, execution));
            } else {
                self.store.record_outcome(state, action_index, execution)?;
            }
            tracing::info!(action = %action.description, success, "action finished");

            self.end_iteration()?;
        }
    }

    /// Read the title and embedding of the live page.
    async fn observe(&mut self, describer: &mut dyn Describer) -> ExplorerResult<Observed> {
        let title = describer.title().await?;
        let embedding = describer.embedding(&title).await?;
        Ok(Observed { title, embedding })
    }

    async fn resolve(
        &mut self,
        describer: &mut dyn Describer,
        navigator: &mut dyn Navigator,
        observed: Observed,
    ) -> ExplorerResult<StateId> {
        let url = navigator.current_url().await?;
        let title = observed.title.as_str();
        let resolved = self
            .store
            .find_or_create(title, observed.embedding, &url, || async move {
                let description = describer.description().await?;
                let actions = describer.actions(title, &description).await?;
                Ok::<_, ExplorerError>((description, actions))
            })
            .await?;
        Ok(resolved.id)
    }

    /// Pick the next action, backtracking and replaying when `current` is exhausted.
    async fn choose(
        &mut self,
        current: StateId,
        executor: &mut dyn Executor,
        navigator: &mut dyn Navigator,
        root_url: &str,
    ) -> ExplorerResult<Option<(StateId, usize)>> {
        let obvious = self.config.obvious_priority;
        let ws = self.store.get(current)?;
        if let Some(index) = select_action(&ws.actions, obvious, &mut self.rng)? {
            return Ok(Some((current, index)));
        }

        tracing::debug!(state = %current, "state exhausted, searching for frontier");
        let Some(frontier) = find_next_action(&self.store, obvious, &mut self.rng)? else {
            return Ok(None);
        };

        if let Err(e) = replay(
            navigator,
            executor,
            root_url,
            &frontier.path,
            self.config.replay_delay,
        )
        .await
        {
            tracing::error!(target_state = %frontier.state, error = %e, "replay to frontier failed");
            return Err(e);
        }

        Ok(Some((frontier.state, frontier.action_index)))
    }

    /// Go back until the browser is inside the domain again, or replay from the root.
    async fn return_to_domain(
        &mut self,
        executor: &mut dyn Executor,
        navigator: &mut dyn Navigator,
        root_url: &str,
        state: StateId,
    ) -> ExplorerResult<()> {
        for step in 1..=self.config.max_back_steps {
            navigator.go_back().await?;
            let url = navigator.current_url().await?;
            if in_domain(&url, &self.domain) {
                tracing::info!(steps = step, url = %url, "back inside the domain");
                return Ok(());
            }
        }

        tracing::warn!(
            max_back_steps = self.config.max_back_steps,
            "going back did not return to the domain, replaying from the root"
        );
        let path = path_to(&self.store, state)?.unwrap_or_default();
        replay(navigator, executor, root_url, &path, self.config.replay_delay).await
    }

    fn end_iteration(&mut self) -> ExplorerResult<()> {
        self.iterations += 1;
        if let Some(path) = &self.config.autosave {
            SnapshotWriter::write_to_file(&self.store, path)?;
        }
        Ok(())
    }

    fn finish(&mut self, reason: StopReason) -> StopReason {
        tracing::info!(
            reason = ?reason,
            states = self.store.len(),
            transitions = self.store.transition_count(),
            unattempted = self.store.unattempted_count(),
            "exploration finished"
        );
        self.phase = Phase::Done(reason);
        reason
    }
}

struct Observed {
    title: String,
    embedding: Vec<f32>,
}
