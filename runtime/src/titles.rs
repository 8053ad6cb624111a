//! Append-only JSONL log of generated titles.
//!
//! Each line records the page URL, the HTML the title was generated from,
//! and the title, so titling prompts can be evaluated offline. The file is
//! rotated to `.1`, `.2`, ... once it grows past `MAX_LOG_SIZE`.

use anyhow::{Context, Result};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

/// Maximum log size before rotation (100 MB). Entries carry full HTML.
const MAX_LOG_SIZE: u64 = 100 * 1024 * 1024;

const MAX_ROTATIONS: u32 = 5;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TitleRecord {
    pub timestamp: String,
    pub url: String,
    pub html: String,
    pub title: String,
}

pub struct TitleLog {
    file: File,
    path: PathBuf,
    current_size: u64,
}

impl TitleLog {
    /// Open or create the log, creating parent directories.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .with_context(|| format!("failed to open title log: {}", path.display()))?;

        let current_size = file.metadata().map(|m| m.len()).unwrap_or(0);

        Ok(Self {
            file,
            path: path.to_path_buf(),
            current_size,
        })
    }

    pub fn record(&mut self, url: &str, html: &str, title: &str) -> Result<()> {
        if self.current_size >= MAX_LOG_SIZE {
            self.rotate()?;
        }

        let record = TitleRecord {
            timestamp: Utc::now().to_rfc3339(),
            url: url.to_string(),
            html: html.to_string(),
            title: title.to_string(),
        };
        let json = serde_json::to_string(&record)?;
        writeln!(self.file, "{json}")
            .with_context(|| format!("failed to write title log: {}", self.path.display()))?;
        self.current_size += json.len() as u64 + 1;
        Ok(())
    }

    /// titles.jsonl -> titles.jsonl.1, .1 -> .2, and so on.
    fn rotate(&mut self) -> Result<()> {
        self.file.flush()?;

        for i in (1..MAX_ROTATIONS).rev() {
            let from = rotation_path(&self.path, i);
            if from.exists() {
                let _ = std::fs::rename(&from, rotation_path(&self.path, i + 1));
            }
        }
        let _ = std::fs::rename(&self.path, rotation_path(&self.path, 1));

        self.file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .context("failed to reopen title log after rotation")?;
        self.current_size = 0;
        tracing::info!(path = %self.path.display(), "title log rotated");
        Ok(())
    }
}

fn rotation_path(base: &Path, index: u32) -> PathBuf {
    let name = format!(
        "{}.{index}",
        base.file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("titles.jsonl")
    );
    base.with_file_name(name)
}

/// Read every record of a title log.
pub fn read_records(path: &Path) -> Result<Vec<TitleRecord>> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read title log: {}", path.display()))?;
    raw.lines()
        .filter(|l| !l.trim().is_empty())
        .enumerate()
        .map(|(i, line)| {
            serde_json::from_str(line).with_context(|| format!("bad title record on line {}", i + 1))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_records_append_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("titles.jsonl");

        let mut log = TitleLog::open(&path).unwrap();
        log.record("https://a.test/", "<h1>A</h1>", "Home page").unwrap();
        drop(log);

        let mut log = TitleLog::open(&path).unwrap();
        log.record("https://a.test/cart", "<h1>Cart</h1>", "Cart page").unwrap();

        let records = read_records(&path).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].title, "Home page");
        assert_eq!(records[1].url, "https://a.test/cart");
        assert!(chrono::DateTime::parse_from_rfc3339(&records[1].timestamp).is_ok());
    }

    #[test]
    fn test_rotation_moves_current_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("titles.jsonl");
        let mut log = TitleLog::open(&path).unwrap();
        log.record("u", "h", "first").unwrap();
        log.current_size = MAX_LOG_SIZE;
        log.record("u", "h", "second").unwrap();

        assert_eq!(read_records(&rotation_path(&path, 1)).unwrap()[0].title, "first");
        let current = read_records(&path).unwrap();
        assert_eq!(current.len(), 1);
        assert_eq!(current[0].title, "second");
    }
}
