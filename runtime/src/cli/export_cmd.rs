//! `web-explorer export <snapshot>`: convert a saved snapshot to another format.

use std::path::Path;

use anyhow::{Context, Result};
use web_explorer::config::TITLE_SIMILARITY_THRESHOLD;
use web_explorer::SnapshotReader;

use super::output::{self, OutputFormat};

pub fn run(snapshot: &Path, format: OutputFormat, output_file: Option<&Path>) -> Result<()> {
    let store = SnapshotReader::read_from_file(snapshot, TITLE_SIMILARITY_THRESHOLD)
        .with_context(|| format!("failed to read snapshot {}", snapshot.display()))?;
    output::write_output(&store, format, output_file)
}
