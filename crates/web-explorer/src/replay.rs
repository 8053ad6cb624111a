//! Deterministic return to a known state by re-applying recorded operations.

use std::time::Duration;

use crate::collaborators::{Executor, Navigator};
use crate::types::{ExplorerError, ExplorerResult, StateTransition};

/// Navigate to `root_url` and re-apply the operations of every transition in `path`.
///
/// The model is never consulted. `delay` is waited after each transition so
/// the page can settle before the next one.
pub async fn replay(
    navigator: &mut dyn Navigator,
    executor: &mut dyn Executor,
    root_url: &str,
    path: &[StateTransition],
    delay: Duration,
) -> ExplorerResult<()> {
    tracing::info!(root = root_url, steps = path.len(), "replaying path");
    navigator.navigate(root_url).await?;

    for (step, transition) in path.iter().enumerate() {
        let action = &transition.action;
        if action.operations.is_empty() {
            return Err(ExplorerError::Replay(format!(
                "step {step} ('{}') has no recorded operations",
                action.description
            )));
        }

        tracing::debug!(
            step,
            action = %action.description,
            operations = action.operations.len(),
            target = %transition.target,
            "replay step"
        );
        executor.replay(&action.operations).await.map_err(|e| {
            ExplorerError::Replay(format!("step {step} ('{}') failed: {e}", action.description))
        })?;

        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
    }

    Ok(())
}
