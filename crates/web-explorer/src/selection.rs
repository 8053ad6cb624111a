//! Choosing the next action of a state.
//!
//! Unattempted actions at or above the obvious-priority cutoff are taken
//! deterministically (highest priority, first encountered on ties). Otherwise
//! one unattempted action is sampled with probability proportional to its
//! priority. Selection is a pure function of the action list and a uniform
//! sample so it can be tested without a model or a seeded generator.

use rand::Rng;

use crate::types::{Action, ExplorerError, ExplorerResult};

/// Pick an unattempted action index using a uniform `sample` in `[0, 1)`.
///
/// Returns `None` when every action has been attempted.
pub fn select_action_with(
    actions: &[Action],
    obvious_priority: i32,
    sample: f64,
) -> ExplorerResult<Option<usize>> {
    let candidates: Vec<(usize, &Action)> = actions
        .iter()
        .enumerate()
        .filter(|(_, a)| a.is_unattempted())
        .collect();

    if candidates.is_empty() {
        return Ok(None);
    }

    if let Some(bad) = candidates.iter().find(|(_, a)| a.priority <= 0) {
        return Err(ExplorerError::InvalidPriority {
            action: bad.1.description.clone(),
            priority: bad.1.priority,
        });
    }

    let mut obvious: Option<(usize, i32)> = None;
    for &(i, a) in &candidates {
        if a.priority >= obvious_priority && obvious.map_or(true, |(_, p)| a.priority > p) {
            obvious = Some((i, a.priority));
        }
    }
    if let Some((i, _)) = obvious {
        return Ok(Some(i));
    }

    let total: f64 = candidates.iter().map(|(_, a)| a.priority as f64).sum();
    let sample = sample.clamp(0.0, 1.0);
    let mut cumulative = 0.0;
    for &(i, a) in &candidates {
        cumulative += a.priority as f64 / total;
        if sample < cumulative {
            return Ok(Some(i));
        }
    }

    // Rounding can leave the cumulative sum just under 1.0.
    Ok(candidates.last().map(|(i, _)| *i))
}

/// Pick an unattempted action index, drawing the sample from `rng`.
pub fn select_action<R: Rng + ?Sized>(
    actions: &[Action],
    obvious_priority: i32,
    rng: &mut R,
) -> ExplorerResult<Option<usize>> {
    select_action_with(actions, obvious_priority, rng.gen::<f64>())
}
