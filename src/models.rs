//! Core data models for the categorization pipeline.
//!
//! This module contains the track record, the ledger mapping, the derived
//! summary types, and the JSON persistence helpers shared by every on-disk
//! artifact.
//!
//! All files are pretty-printed UTF-8 JSON and assume a single writer; nothing
//! here guards against two concurrent runs racing on the same paths.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

/// A saved track as fetched from Spotify. Immutable once fetched; uniquely
/// keyed by `id` (the service-assigned identifier).
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Track {
    pub id: String,
    pub name: String,
    /// All credited artists joined into one display string.
    pub artist: String,
    pub album: String,
    pub uri: String,
    pub popularity: i64,
    pub added_at: String,
    pub release_date: String,
}

/// Durable mapping from track id to its assigned category labels.
/// Grows monotonically across runs; entries are never removed.
pub type CategoryMap = BTreeMap<String, Vec<String>>;

/// Minimal track reference carried inside the summary.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct SongRef {
    pub id: String,
    pub name: String,
    pub artist: String,
    pub uri: String,
}

/// One category with its member songs.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct CategorySummary {
    pub label: String,
    pub count: usize,
    pub songs: Vec<SongRef>,
}

/// Derived categorization summary, recomputed each run. Never authoritative:
/// always regenerable from the ledger and the track store.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Summary {
    pub total_songs_categorized: usize,
    pub total_categories: usize,
    /// Sorted descending by count; ties keep encounter order.
    pub categories: Vec<CategorySummary>,
}

/// Load a JSON file into any deserializable value.
pub fn load_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let file = File::open(path).with_context(|| format!("failed to open {}", path.display()))?;
    let value = serde_json::from_reader(BufReader::new(file))
        .with_context(|| format!("failed to parse {}", path.display()))?;
    Ok(value)
}

/// Write a value as pretty-printed JSON. The writer is buffered and explicitly
/// flushed so a successful return means the bytes reached the OS.
pub fn save_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let file = File::create(path).with_context(|| format!("failed to create {}", path.display()))?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, value)
        .with_context(|| format!("failed to write {}", path.display()))?;
    writer
        .flush()
        .with_context(|| format!("failed to flush {}", path.display()))?;
    Ok(())
}
