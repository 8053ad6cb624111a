//! In-memory arena of discovered web states and the transitions between them.

use std::collections::HashMap;
use std::future::Future;

use crate::similarity::first_match;
use crate::types::{
    normalize_parts, Action, ActionStatus, DescriptionPart, Execution, ExplorerError,
    ExplorerResult, StateId, StateTransition, WebState,
};

/// How an observed page was resolved to a state.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Resolved {
    pub id: StateId,
    pub created: bool,
    /// Similarity to the matched state, `None` when a new state was created.
    pub similarity: Option<f32>,
}

/// Owns every discovered state. States are never removed during a run.
#[derive(Debug, Clone)]
pub struct StateStore {
    states: Vec<WebState>,
    index: HashMap<StateId, usize>,
    threshold: f32,
}

impl StateStore {
    /// Create an empty store with the given equivalence threshold.
    pub fn new(threshold: f32) -> Self {
        Self {
            states: Vec::new(),
            index: HashMap::new(),
            threshold,
        }
    }

    /// Rebuild a store from previously saved states.
    ///
    /// Identifiers must be unique, every action must point into its state's
    /// description, and every transition must target a known state.
    pub fn from_states(states: Vec<WebState>, threshold: f32) -> ExplorerResult<Self> {
        let mut index = HashMap::with_capacity(states.len());
        for (i, ws) in states.iter().enumerate() {
            if index.insert(ws.id, i).is_some() {
                return Err(ExplorerError::Snapshot(format!("duplicate state id {}", ws.id)));
            }
        }

        for ws in &states {
            let parts = ws.description.len();
            if let Some(action) = ws.actions.iter().find(|a| a.part >= parts) {
                return Err(ExplorerError::Snapshot(format!(
                    "action '{}' of state {} refers to part {} of {}",
                    action.description, ws.id, action.part, parts
                )));
            }
            for t in &ws.transitions {
                if !index.contains_key(&t.target) {
                    return Err(ExplorerError::Snapshot(format!(
                        "state {} has a transition to unknown state {}",
                        ws.id, t.target
                    )));
                }
            }
        }

        Ok(Self {
            states,
            index,
            threshold,
        })
    }

    pub fn threshold(&self) -> f32 {
        self.threshold
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    /// States in creation order.
    pub fn iter(&self) -> impl Iterator<Item = &WebState> {
        self.states.iter()
    }

    pub fn states(&self) -> &[WebState] {
        &self.states
    }

    /// The first state ever created, where every search and replay starts.
    pub fn root(&self) -> Option<&WebState> {
        self.states.first()
    }

    pub fn contains(&self, id: StateId) -> bool {
        self.index.contains_key(&id)
    }

    pub fn get(&self, id: StateId) -> ExplorerResult<&WebState> {
        self.index
            .get(&id)
            .map(|&i| &self.states[i])
            .ok_or(ExplorerError::UnknownState(id))
    }

    pub fn get_mut(&mut self, id: StateId) -> ExplorerResult<&mut WebState> {
        match self.index.get(&id) {
            Some(&i) => Ok(&mut self.states[i]),
            None => Err(ExplorerError::UnknownState(id)),
        }
    }

    /// Find an existing state equivalent to `embedding`.
    pub fn lookup(&self, embedding: &[f32]) -> Option<(StateId, f32)> {
        first_match(
            embedding,
            self.states.iter().map(|ws| ws.title_embedding.as_slice()),
            self.threshold,
        )
        .map(|(i, sim)| (self.states[i].id, sim))
    }

    /// Resolve an observed page to a state, creating one if nothing matches.
    ///
    /// `describe` is only awaited for new states; matched states keep their
    /// cached description and actions.
    pub async fn find_or_create<F, Fut>(
        &mut self,
        title: &str,
        embedding: Vec<f32>,
        url: &str,
        describe: F,
    ) -> ExplorerResult<Resolved>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = ExplorerResult<(Vec<DescriptionPart>, Vec<Action>)>>,
    {
        if let Some((id, similarity)) = self.lookup(&embedding) {
            let ws = self.get_mut(id)?;
            if ws.add_url(url) {
                tracing::debug!(state = %id, url, "new URL for known state");
            }
            tracing::info!(state = %id, title = %ws.title, similarity, "matched known state");
            return Ok(Resolved {
                id,
                created: false,
                similarity: Some(similarity),
            });
        }

        let (description, actions) = describe().await?;
        let id = self.insert(WebState::new(title, embedding, url, description, actions))?;
        tracing::info!(state = %id, title, "created new state");

        Ok(Resolved {
            id,
            created: true,
            similarity: None,
        })
    }

    /// Append a new state, validating its actions against its description.
    pub fn insert(&mut self, mut ws: WebState) -> ExplorerResult<StateId> {
        normalize_parts(&mut ws.actions, ws.description.len())?;
        if self.index.contains_key(&ws.id) {
            return Err(ExplorerError::Snapshot(format!("duplicate state id {}", ws.id)));
        }
        let id = ws.id;
        self.index.insert(id, self.states.len());
        self.states.push(ws);
        Ok(id)
    }

    /// Permanently record the single attempt of an action.
    pub fn record_outcome(
        &mut self,
        id: StateId,
        action_index: usize,
        execution: Execution,
    ) -> ExplorerResult<()> {
        let action = self.action_mut(id, action_index)?;
        if execution.success {
            action.mark(ActionStatus::Succeeded)?;
            action.operations = execution.operations;
        } else {
            action.mark(ActionStatus::Failed)?;
        }
        Ok(())
    }

    /// Append an edge for a succeeded action.
    pub fn add_transition(
        &mut self,
        from: StateId,
        action_index: usize,
        to: StateId,
    ) -> ExplorerResult<()> {
        if !self.contains(to) {
            return Err(ExplorerError::UnknownState(to));
        }
        let ws = self.get_mut(from)?;
        let action = ws
            .actions
            .get(action_index)
            .ok_or(ExplorerError::UnknownAction {
                state: from,
                index: action_index,
            })?;
        if !action.succeeded() {
            return Err(ExplorerError::TransitionFromUnsuccessfulAction(
                action.description.clone(),
            ));
        }
        let transition = StateTransition {
            action: action.clone(),
            target: to,
        };
        ws.transitions.push(transition);
        Ok(())
    }

    pub fn action(&self, id: StateId, action_index: usize) -> ExplorerResult<&Action> {
        self.get(id)?
            .actions
            .get(action_index)
            .ok_or(ExplorerError::UnknownAction {
                state: id,
                index: action_index,
            })
    }

    fn action_mut(&mut self, id: StateId, action_index: usize) -> ExplorerResult<&mut Action> {
        self.get_mut(id)?
            .actions
            .get_mut(action_index)
            .ok_or(ExplorerError::UnknownAction {
                state: id,
                index: action_index,
            })
    }

    pub fn unattempted_count(&self) -> usize {
        self.states.iter().map(WebState::unattempted_count).sum()
    }

    pub fn transition_count(&self) -> usize {
        self.states.iter().map(|ws| ws.transitions.len()).sum()
    }
}
