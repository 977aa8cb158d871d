//! Playlist materialization (the organize variant).
//!
//! Downstream consumer of the ledger only: each track's first label is its
//! playlist assignment. Playlists are resolved through a persistent
//! label -> playlist-id cache, then by exact name among the user's existing
//! playlists, and only created when neither knows the label. Membership is
//! uploaded in bounded batches with an inter-batch delay; a failure for one
//! category never halts the others.

use crate::models::{self, CategoryMap, Track};
use crate::progress::create_progress_bar;
use crate::spotify::{SpotifyClient, SpotifyError, PLAYLIST_ADD_LIMIT};
use anyhow::Result;
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{error, info};

/// Delay between membership-add calls, to respect the API rate limits.
const INTER_ADD_DELAY: Duration = Duration::from_millis(500);

/// Persistent mapping from category label to remote playlist id. Append-only:
/// entries are added when playlists are resolved or created, never removed.
pub struct PlaylistCache {
    path: PathBuf,
    entries: BTreeMap<String, String>,
}

impl PlaylistCache {
    pub fn load(path: &Path) -> Result<Self> {
        let entries = if path.exists() {
            models::load_json(path)?
        } else {
            BTreeMap::new()
        };
        Ok(Self {
            path: path.to_path_buf(),
            entries,
        })
    }

    pub fn get(&self, label: &str) -> Option<&String> {
        self.entries.get(label)
    }

    pub fn insert(&mut self, label: &str, playlist_id: &str) {
        self.entries
            .insert(label.to_string(), playlist_id.to_string());
    }

    pub fn save(&self) -> Result<()> {
        models::save_json(&self.path, &self.entries)
    }
}

/// Group track uris by each track's primary (first) label, keeping the
/// ledger's encounter order for both categories and members. Ledger entries
/// without a matching track in the store are skipped.
pub fn group_by_primary_label(
    ledger: &CategoryMap,
    tracks: &[Track],
) -> Vec<(String, Vec<String>)> {
    let uri_by_id: HashMap<&str, &str> = tracks
        .iter()
        .map(|t| (t.id.as_str(), t.uri.as_str()))
        .collect();

    let mut groups: Vec<(String, Vec<String>)> = Vec::new();
    let mut index_by_label: HashMap<String, usize> = HashMap::new();

    for (track_id, labels) in ledger {
        let Some(label) = labels.first() else {
            continue;
        };
        let Some(uri) = uri_by_id.get(track_id.as_str()) else {
            continue;
        };

        let idx = *index_by_label.entry(label.clone()).or_insert_with(|| {
            groups.push((label.clone(), Vec::new()));
            groups.len() - 1
        });
        groups[idx].1.push((*uri).to_string());
    }

    groups
}

/// Create or reuse one playlist per category and upload memberships.
pub fn materialize(
    client: &mut SpotifyClient,
    ledger: &CategoryMap,
    tracks: &[Track],
    cache: &mut PlaylistCache,
) -> Result<()> {
    let groups = group_by_primary_label(ledger, tracks);
    if groups.is_empty() {
        info!("No categorized tracks to organize into playlists");
        return Ok(());
    }

    info!("Creating playlists and adding songs");

    // One upfront scan; per-category lookups then stay local.
    let existing = client.list_playlists()?;
    let existing_by_name: HashMap<&str, &str> = existing
        .iter()
        .map(|p| (p.name.as_str(), p.id.as_str()))
        .collect();
    let user_id = client.current_user_id()?;

    let pb = create_progress_bar(groups.len() as u64, "Creating playlists");
    for (label, uris) in &groups {
        match resolve_playlist(client, &user_id, label, &existing_by_name, cache) {
            Ok(playlist_id) => {
                for chunk in uris.chunks(PLAYLIST_ADD_LIMIT) {
                    if let Err(e) = client.add_tracks_to_playlist(&playlist_id, chunk) {
                        error!("Error adding songs to {} playlist: {}", label, e);
                    }
                    std::thread::sleep(INTER_ADD_DELAY);
                }
            }
            Err(e) => error!("Error resolving playlist for {}: {}", label, e),
        }
        pb.inc(1);
    }
    pb.finish_with_message(format!("Organized {} playlists", groups.len()));

    cache.save()?;
    Ok(())
}

fn resolve_playlist(
    client: &mut SpotifyClient,
    user_id: &str,
    label: &str,
    existing_by_name: &HashMap<&str, &str>,
    cache: &mut PlaylistCache,
) -> Result<String, SpotifyError> {
    if let Some(id) = cache.get(label) {
        return Ok(id.clone());
    }

    if let Some(id) = existing_by_name.get(label) {
        cache.insert(label, id);
        return Ok((*id).to_string());
    }

    let description = format!("Auto-generated playlist: {label}");
    let id = client.create_private_playlist(user_id, label, &description)?;
    info!("Created playlist '{}'", label);
    cache.insert(label, &id);
    Ok(id)
}
