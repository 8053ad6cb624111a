//! Interfaces to the outside world: the model that describes pages, the
//! agent that performs actions, and the browser that is navigated.
//!
//! Implementations live in the runtime crate. The core only ever sees
//! validated values; `Err` returned from any method ends the run, while
//! ordinary interaction failures are reported through [`Execution`].

use async_trait::async_trait;

use crate::types::{Action, DescriptionPart, Execution, ExplorerResult, Operation};

/// Turns the live page into the values a web state is built from.
#[async_trait]
pub trait Describer: Send {
    /// Short title identifying the current screen.
    async fn title(&mut self) -> ExplorerResult<String>;
    /// Embedding vector of a title.
    async fn embedding(&mut self, title: &str) -> ExplorerResult<Vec<f32>>;
    /// Ordered description parts of the current page.
    async fn description(&mut self) -> ExplorerResult<Vec<DescriptionPart>>;
    /// Candidate actions for a page, all unattempted.
    async fn actions(
        &mut self,
        title: &str,
        description: &[DescriptionPart],
    ) -> ExplorerResult<Vec<Action>>;
}

/// Performs actions on the live page.
#[async_trait]
pub trait Executor: Send {
    /// Attempt an action once, reporting whether the page changed.
    async fn execute(&mut self, action: &Action) -> ExplorerResult<Execution>;
    /// Re-apply previously recorded operations in order.
    async fn replay(&mut self, operations: &[Operation]) -> ExplorerResult<()>;
}

/// Moves the browser session around.
#[async_trait]
pub trait Navigator: Send {
    async fn current_url(&mut self) -> ExplorerResult<String>;
    async fn navigate(&mut self, url: &str) -> ExplorerResult<()>;
    async fn go_back(&mut self) -> ExplorerResult<()>;
}

/// The collaborators bound to one browser session.
///
/// Passed to each run so a new session can be attached without touching
/// the state store.
pub struct Collaborators<'a> {
    pub describer: &'a mut dyn Describer,
    pub executor: &'a mut dyn Executor,
    pub navigator: &'a mut dyn Navigator,
}
