//! Backtracking search over the known transition graph.
//!
//! Depth-first from the root state with a visited set keyed by state id.
//! The path returned is a valid one, not necessarily the shortest.

use std::collections::HashSet;

use rand::Rng;

use crate::selection::select_action;
use crate::store::StateStore;
use crate::types::{ExplorerResult, StateId, StateTransition, WebState};

/// A reachable state that still has an unexplored action.
#[derive(Debug, Clone, PartialEq)]
pub struct Frontier {
    pub state: StateId,
    pub action_index: usize,
    /// Transitions from the root to `state`, in replay order.
    pub path: Vec<StateTransition>,
}

/// One visited node: the state and how it was reached.
struct Visit {
    state: StateId,
    /// Index of the parent in the visited list and the transition taken from it.
    parent: Option<(usize, usize)>,
}

/// Search from `root` for the first state satisfying `goal`.
///
/// Returns the goal state and the path of transitions leading to it.
pub fn search<F>(
    store: &StateStore,
    root: StateId,
    mut goal: F,
) -> ExplorerResult<Option<(StateId, Vec<StateTransition>)>>
where
    F: FnMut(&WebState) -> bool,
{
    let mut visited: Vec<Visit> = Vec::new();
    let mut seen: HashSet<StateId> = HashSet::new();
    let mut stack: Vec<Visit> = vec![Visit {
        state: root,
        parent: None,
    }];

    while let Some(visit) = stack.pop() {
        if !seen.insert(visit.state) {
            continue;
        }

        let ws = store.get(visit.state)?;
        let here = visited.len();
        visited.push(visit);

        if goal(ws) {
            let path = trail(store, &visited, here)?;
            return Ok(Some((ws.id, path)));
        }

        for (t_index, t) in ws.transitions.iter().enumerate() {
            if !seen.contains(&t.target) {
                stack.push(Visit {
                    state: t.target,
                    parent: Some((here, t_index)),
                });
            }
        }
    }

    Ok(None)
}

/// Walk parent pointers back to the root and reverse into replay order.
fn trail(
    store: &StateStore,
    visited: &[Visit],
    mut at: usize,
) -> ExplorerResult<Vec<StateTransition>> {
    let mut path = Vec::new();
    while let Some((parent, t_index)) = visited[at].parent {
        let from = store.get(visited[parent].state)?;
        path.push(from.transitions[t_index].clone());
        at = parent;
    }
    path.reverse();
    Ok(path)
}

/// Find the nearest reachable state with an unattempted action.
///
/// Returns `None` when the reachable graph is fully explored.
pub fn find_next_action<R: Rng + ?Sized>(
    store: &StateStore,
    obvious_priority: i32,
    rng: &mut R,
) -> ExplorerResult<Option<Frontier>> {
    let root = match store.root() {
        Some(ws) => ws.id,
        None => return Ok(None),
    };

    let Some((state, path)) = search(store, root, WebState::has_unattempted)? else {
        return Ok(None);
    };

    let ws = store.get(state)?;
    let Some(action_index) = select_action(&ws.actions, obvious_priority, rng)? else {
        return Ok(None);
    };

    tracing::info!(
        state = %state,
        title = %ws.title,
        path_len = path.len(),
        "backtracking to unexplored state"
    );

    Ok(Some(Frontier {
        state,
        action_index,
        path,
    }))
}

/// Path of transitions from the root to `target`, if it is reachable.
pub fn path_to(store: &StateStore, target: StateId) -> ExplorerResult<Option<Vec<StateTransition>>> {
    let root = match store.root() {
        Some(ws) => ws.id,
        None => return Ok(None),
    };
    Ok(search(store, root, |ws| ws.id == target)?.map(|(_, path)| path))
}
