//! `web-explorer validate <snapshot>`: check that a snapshot loads.

use std::path::Path;

use anyhow::Result;
use web_explorer::config::TITLE_SIMILARITY_THRESHOLD;
use web_explorer::{ActionStatus, SnapshotReader, StateStore};

/// Counts reported for a valid snapshot.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct Summary {
    pub states: usize,
    pub actions: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub unattempted: usize,
    pub transitions: usize,
}

pub fn summarize(store: &StateStore) -> Summary {
    let mut summary = Summary {
        states: store.len(),
        transitions: store.transition_count(),
        ..Summary::default()
    };
    for action in store.iter().flat_map(|ws| ws.actions.iter()) {
        summary.actions += 1;
        match action.status {
            ActionStatus::Succeeded => summary.succeeded += 1,
            ActionStatus::Failed => summary.failed += 1,
            ActionStatus::Unattempted => summary.unattempted += 1,
        }
    }
    summary
}

pub fn run(snapshot: &Path) -> Result<()> {
    match SnapshotReader::read_from_file(snapshot, TITLE_SIMILARITY_THRESHOLD) {
        Ok(store) => {
            let s = summarize(&store);
            println!("Valid snapshot: {}", snapshot.display());
            println!("  States:      {}", s.states);
            println!("  Transitions: {}", s.transitions);
            println!(
                "  Actions:     {} ({} succeeded, {} failed, {} unattempted)",
                s.actions, s.succeeded, s.failed, s.unattempted
            );
            Ok(())
        }
        Err(e) => anyhow::bail!("invalid snapshot {}: {e}", snapshot.display()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use web_explorer::{Action, Execution, Operation, WebState};

    #[test]
    fn test_summary_counts_statuses() {
        let mut store = StateStore::new(TITLE_SIMILARITY_THRESHOLD);
        let home = store
            .insert(WebState::new(
                "Home",
                vec![1.0, 0.0],
                "http://a.test",
                vec![serde_json::json!({})],
                vec![Action::new("Open cart", 0, 5), Action::new("Search", 0, 3), Action::new("Help", 0, 1)],
            ))
            .unwrap();
        let cart = store
            .insert(WebState::new("Cart", vec![0.0, 1.0], "http://a.test/cart", vec![], vec![]))
            .unwrap();
        store
            .record_outcome(
                home,
                0,
                Execution {
                    success: true,
                    operations: vec![Operation::click("#cart")],
                },
            )
            .unwrap();
        store.add_transition(home, 0, cart).unwrap();
        store.record_outcome(home, 1, Execution::failed()).unwrap();

        assert_eq!(
            summarize(&store),
            Summary {
                states: 2,
                actions: 3,
                succeeded: 1,
                failed: 1,
                unattempted: 1,
                transitions: 1,
            }
        );
    }

    #[test]
    fn test_invalid_snapshot_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.json");
        std::fs::write(&path, "{not json").unwrap();
        assert!(run(&path).is_err());
    }
}
