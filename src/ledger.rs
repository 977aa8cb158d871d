//! Durable category ledger.
//!
//! The ledger maps track ids to their assigned labels and is rewritten to disk
//! after every processed batch, so an interrupted run loses at most the
//! in-flight batch. Before each overwrite the previous file is preserved as a
//! timestamped `.bak`; a failed backup is logged and never blocks the save.
//!
//! Single-writer assumption: two concurrent runs would race on the
//! backup-then-overwrite sequence. Callers must not run more than one process
//! against the same ledger file.

use crate::models::{self, CategoryMap, Track};
use anyhow::Result;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

pub struct Ledger {
    path: PathBuf,
    entries: CategoryMap,
}

impl Ledger {
    /// Load the ledger from disk, or start empty if the file does not exist.
    pub fn load(path: &Path) -> Result<Self> {
        let entries = if path.exists() {
            info!("Loading existing categorizations from: {}", path.display());
            models::load_json(path)?
        } else {
            CategoryMap::new()
        };
        Ok(Self {
            path: path.to_path_buf(),
            entries,
        })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, track_id: &str) -> bool {
        self.entries.contains_key(track_id)
    }

    pub fn entries(&self) -> &CategoryMap {
        &self.entries
    }

    /// Record one track's labels. Overwrites any previous assignment for the
    /// same id (only happens when a caller re-categorizes explicitly).
    pub fn assign(&mut self, track_id: &str, labels: Vec<String>) {
        self.entries.insert(track_id.to_string(), labels);
    }

    /// Tracks from `tracks` that have no ledger entry yet, in input order.
    /// This is the resumption set: everything persisted in earlier runs or
    /// earlier batches of this run is excluded.
    pub fn uncategorized<'a>(&self, tracks: &'a [Track]) -> Vec<&'a Track> {
        tracks.iter().filter(|t| !self.contains(&t.id)).collect()
    }

    /// Deduplicated, sorted labels currently in the ledger, capped at `limit`.
    /// Used to bias the model toward reusing existing categories.
    pub fn unique_labels(&self, limit: usize) -> Vec<String> {
        let mut labels: Vec<String> = self
            .entries
            .values()
            .flatten()
            .cloned()
            .collect::<std::collections::BTreeSet<String>>()
            .into_iter()
            .collect();
        labels.truncate(limit);
        labels
    }

    /// Persist the full ledger, backing up the previous file first.
    pub fn save(&self) -> Result<()> {
        if self.path.exists() {
            let timestamp = chrono::Local::now().format("%Y%m%d_%H%M%S");
            let backup = self
                .path
                .with_file_name(format!(
                    "{}.{}.bak",
                    self.path
                        .file_name()
                        .and_then(|n| n.to_str())
                        .unwrap_or("song_categories.json"),
                    timestamp
                ));
            match std::fs::copy(&self.path, &backup) {
                Ok(_) => info!("Created backup of categories file: {}", backup.display()),
                Err(e) => warn!("Failed to create backup: {}", e),
            }
        }

        models::save_json(&self.path, &self.entries)?;
        info!("Saved categories to: {}", self.path.display());
        Ok(())
    }
}
