//! Rendering an explored graph in one of the export formats.

use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};
use clap::ValueEnum;
use web_explorer::{to_dot, write_simple, SnapshotWriter, StateStore};

/// Export formats. `json` is a full snapshot that can be resumed from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Graphviz DOT, one node per state.
    Digraph,
    /// Full snapshot.
    Json,
    /// Readable JSON without embeddings or operations.
    JsonSimple,
}

/// Serialize the store in `format`.
pub fn render(store: &StateStore, format: OutputFormat) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    match format {
        OutputFormat::Digraph => {
            buf.extend_from_slice(to_dot(store).as_bytes());
        }
        OutputFormat::Json => SnapshotWriter::write_to(store, &mut buf)?,
        OutputFormat::JsonSimple => write_simple(store, &mut buf)?,
    }
    Ok(buf)
}

/// Write the store to `path`, or to stdout when no path is given.
pub fn write_output(store: &StateStore, format: OutputFormat, path: Option<&Path>) -> Result<()> {
    if format == OutputFormat::Json {
        if let Some(path) = path {
            SnapshotWriter::write_to_file(store, path)?;
            tracing::info!(path = %path.display(), states = store.len(), "snapshot written");
            return Ok(());
        }
    }

    let bytes = render(store, format)?;
    match path {
        Some(path) => {
            std::fs::write(path, &bytes)
                .with_context(|| format!("failed to write {}", path.display()))?;
            tracing::info!(path = %path.display(), states = store.len(), ?format, "export written");
        }
        None => {
            let mut stdout = std::io::stdout().lock();
            stdout.write_all(&bytes)?;
            stdout.flush()?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use web_explorer::WebState;

    fn store() -> StateStore {
        let mut store = StateStore::new(0.92);
        store
            .insert(WebState::new(
                "Home",
                vec![1.0, 0.0],
                "http://shop.test",
                vec![serde_json::json!({"summary": "home"})],
                vec![],
            ))
            .unwrap();
        store
    }

    #[test]
    fn test_render_formats() {
        let store = store();
        let dot = String::from_utf8(render(&store, OutputFormat::Digraph).unwrap()).unwrap();
        assert!(dot.starts_with("digraph"));

        let json: serde_json::Value =
            serde_json::from_slice(&render(&store, OutputFormat::Json).unwrap()).unwrap();
        assert_eq!(json[0]["title"], "Home");
        assert!(json[0].get("title_embedding").is_some());

        let simple: serde_json::Value =
            serde_json::from_slice(&render(&store, OutputFormat::JsonSimple).unwrap()).unwrap();
        assert!(simple[0].get("title_embedding").is_none());
    }

    #[test]
    fn test_json_to_file_can_be_read_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("graph.json");
        write_output(&store(), OutputFormat::Json, Some(&path)).unwrap();
        let restored = web_explorer::SnapshotReader::read_from_file(&path, 0.92).unwrap();
        assert_eq!(restored.len(), 1);
    }
}
