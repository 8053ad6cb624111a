//! Core data types for discovered web states and the actions between them.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One chunk of a page description as returned by the describer.
///
/// Opaque to the core beyond counting and indexing.
pub type DescriptionPart = serde_json::Value;

/// Stable identifier of a discovered web state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StateId(pub Uuid);

impl StateId {
    /// Generate a fresh random identifier.
    pub fn new_v4() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for StateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.hyphenated())
    }
}

/// Outcome of an action. Moves forward from `Unattempted` exactly once.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionStatus {
    #[default]
    Unattempted,
    Succeeded,
    Failed,
}

/// Low-level browser operation kinds the executor can record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    Click,
    Fill,
    Select,
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Click => "click",
            Self::Fill => "fill",
            Self::Select => "select",
        };
        write!(f, "{s}")
    }
}

/// A single executed browser operation, kept for deterministic replay.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Operation {
    pub selector: String,
    pub kind: OperationKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
}

impl Operation {
    pub fn click(selector: impl Into<String>) -> Self {
        Self {
            selector: selector.into(),
            kind: OperationKind::Click,
            value: None,
        }
    }

    pub fn fill(selector: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            selector: selector.into(),
            kind: OperationKind::Fill,
            value: Some(text.into()),
        }
    }

    pub fn select(selector: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            selector: selector.into(),
            kind: OperationKind::Select,
            value: Some(value.into()),
        }
    }
}

/// A candidate interaction proposed by the model for one web state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Action {
    /// Natural-language label, also used as the edge label.
    pub description: String,
    /// Index into the owning state's description parts.
    pub part: usize,
    /// Model confidence weight. Must be positive.
    pub priority: i32,
    #[serde(default)]
    pub status: ActionStatus,
    /// Operations recorded on a successful execution.
    #[serde(default)]
    pub operations: Vec<Operation>,
}

impl Action {
    /// Create an unattempted action.
    pub fn new(description: impl Into<String>, part: usize, priority: i32) -> Self {
        Self {
            description: description.into(),
            part,
            priority,
            status: ActionStatus::Unattempted,
            operations: Vec::new(),
        }
    }

    pub fn is_unattempted(&self) -> bool {
        self.status == ActionStatus::Unattempted
    }

    pub fn succeeded(&self) -> bool {
        self.status == ActionStatus::Succeeded
    }

    /// Record the outcome of the single attempt this action gets.
    pub fn mark(&mut self, status: ActionStatus) -> ExplorerResult<()> {
        if !self.is_unattempted() {
            return Err(ExplorerError::ActionAlreadyAttempted(self.description.clone()));
        }
        self.status = status;
        Ok(())
    }
}

/// Make every action's `part` index valid for a description of `part_count` parts.
///
/// Models frequently return wrong part numbers for single-part pages, so those
/// are forced to 0. Anything else out of range is rejected.
pub fn normalize_parts(actions: &mut [Action], part_count: usize) -> ExplorerResult<()> {
    if part_count == 1 {
        for action in actions.iter_mut() {
            action.part = 0;
        }
        return Ok(());
    }

    for action in actions.iter() {
        if action.part >= part_count {
            return Err(ExplorerError::InvalidActionPart {
                action: action.description.clone(),
                part: action.part,
                parts: part_count,
            });
        }
    }
    Ok(())
}

/// A directed edge created by a successful action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateTransition {
    /// Copy of the action at the moment it succeeded, operations included.
    pub action: Action,
    pub target: StateId,
}

/// A discovered, de-duplicated screen of the target application.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WebState {
    #[serde(rename = "ws_id")]
    pub id: StateId,
    pub title: String,
    pub title_embedding: Vec<f32>,
    /// URLs observed to render this state, deduplicated.
    pub urls: Vec<String>,
    pub description: Vec<DescriptionPart>,
    pub actions: Vec<Action>,
    pub transitions: Vec<StateTransition>,
}

impl WebState {
    pub fn new(
        title: impl Into<String>,
        title_embedding: Vec<f32>,
        url: impl Into<String>,
        description: Vec<DescriptionPart>,
        actions: Vec<Action>,
    ) -> Self {
        Self {
            id: StateId::new_v4(),
            title: title.into(),
            title_embedding,
            urls: vec![url.into()],
            description,
            actions,
            transitions: Vec::new(),
        }
    }

    /// Add a URL if it has not been seen for this state yet.
    pub fn add_url(&mut self, url: &str) -> bool {
        if self.urls.iter().any(|u| u == url) {
            return false;
        }
        self.urls.push(url.to_string());
        true
    }

    pub fn has_unattempted(&self) -> bool {
        self.actions.iter().any(Action::is_unattempted)
    }

    pub fn unattempted_count(&self) -> usize {
        self.actions.iter().filter(|a| a.is_unattempted()).count()
    }
}

/// What the executor reports after attempting an action.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Execution {
    /// Whether the page observably changed.
    pub success: bool,
    pub operations: Vec<Operation>,
}

impl Execution {
    pub fn failed() -> Self {
        Self::default()
    }
}

/// Errors that can occur while exploring.
#[derive(thiserror::Error, Debug)]
pub enum ExplorerError {
    #[error("Malformed model output: {0}")]
    MalformedModelOutput(String),

    #[error("Page not loaded: {0}")]
    PageNotLoaded(String),

    #[error("Invalid priority {priority} for action '{action}': priorities must be positive")]
    InvalidPriority { action: String, priority: i32 },

    #[error("Action '{action}' refers to part {part} but the description has {parts} parts")]
    InvalidActionPart {
        action: String,
        part: usize,
        parts: usize,
    },

    #[error("Action already attempted: {0}")]
    ActionAlreadyAttempted(String),

    #[error("Cannot add a transition for action '{0}' which has not succeeded")]
    TransitionFromUnsuccessfulAction(String),

    #[error("Unknown state: {0}")]
    UnknownState(StateId),

    #[error("State {state} has no action at index {index}")]
    UnknownAction { state: StateId, index: usize },

    #[error("Snapshot error: {0}")]
    Snapshot(String),

    #[error("Replay error: {0}")]
    Replay(String),

    #[error("Browser error: {0}")]
    Browser(String),

    #[error("Model error: {0}")]
    Model(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Convenience result type.
pub type ExplorerResult<T> = Result<T, ExplorerError>;
