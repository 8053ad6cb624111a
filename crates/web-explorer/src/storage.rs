//! JSON snapshot reader/writer for the state store.
//!
//! A snapshot is the full list of web states in creation order, including
//! embeddings, action outcomes, and recorded operations, so an interrupted
//! exploration can be resumed. The simple view drops everything a human
//! reader does not need and cannot be loaded back.

use std::io::{Read, Write};
use std::path::Path;

use serde::Serialize;

use crate::store::StateStore;
use crate::types::{DescriptionPart, ExplorerError, ExplorerResult, StateId, WebState};

/// Writer for snapshot files.
pub struct SnapshotWriter;

/// Reader for snapshot files.
pub struct SnapshotReader;

impl SnapshotWriter {
    /// Write the store to a file, creating parent directories as needed.
    pub fn write_to_file(store: &StateStore, path: &Path) -> ExplorerResult<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        // Write next to the target and rename so a crash never leaves half a snapshot.
        let tmp = path.with_extension("tmp");
        {
            let mut file = std::io::BufWriter::new(std::fs::File::create(&tmp)?);
            Self::write_to(store, &mut file)?;
            file.flush()?;
        }
        std::fs::rename(&tmp, path)?;

        tracing::debug!(path = %path.display(), states = store.len(), "snapshot written");
        Ok(())
    }

    /// Write the store to any writer.
    pub fn write_to<W: Write>(store: &StateStore, writer: &mut W) -> ExplorerResult<()> {
        serde_json::to_writer_pretty(&mut *writer, store.states())
            .map_err(|e| ExplorerError::Snapshot(format!("Serialization failed: {e}")))?;
        writer.write_all(b"\n")?;
        Ok(())
    }
}

impl SnapshotReader {
    /// Read a store from a file.
    pub fn read_from_file(path: &Path, threshold: f32) -> ExplorerResult<StateStore> {
        let file = std::fs::File::open(path)?;
        let store = Self::read_from(&mut std::io::BufReader::new(file), threshold)?;
        tracing::info!(
            path = %path.display(),
            states = store.len(),
            transitions = store.transition_count(),
            "snapshot loaded"
        );
        Ok(store)
    }

    /// Read a store from any reader.
    ///
    /// State ids must be unique and every transition must target a state in
    /// the snapshot.
    pub fn read_from<R: Read>(reader: &mut R, threshold: f32) -> ExplorerResult<StateStore> {
        let states: Vec<WebState> = serde_json::from_reader(reader)
            .map_err(|e| ExplorerError::Snapshot(format!("Deserialization failed: {e}")))?;
        StateStore::from_states(states, threshold)
    }
}

#[derive(Serialize)]
struct SimpleState<'a> {
    ws_id: StateId,
    title: &'a str,
    urls: &'a [String],
    description: &'a [DescriptionPart],
    actions: Vec<&'a str>,
    transitions: Vec<SimpleTransition<'a>>,
}

#[derive(Serialize)]
struct SimpleTransition<'a> {
    action: &'a str,
    target: StateId,
}

/// Write the human-oriented view: no embeddings, actions reduced to their labels.
pub fn write_simple<W: Write>(store: &StateStore, writer: &mut W) -> ExplorerResult<()> {
    let view: Vec<SimpleState<'_>> = store
        .iter()
        .map(|ws| SimpleState {
            ws_id: ws.id,
            title: &ws.title,
            urls: &ws.urls,
            description: &ws.description,
            actions: ws.actions.iter().map(|a| a.description.as_str()).collect(),
            transitions: ws
                .transitions
                .iter()
                .map(|t| SimpleTransition {
                    action: &t.action.description,
                    target: t.target,
                })
                .collect(),
        })
        .collect();

    serde_json::to_writer_pretty(&mut *writer, &view)?;
    writer.write_all(b"\n")?;
    Ok(())
}
