//! Liked-track store.
//!
//! Drains the full saved-tracks collection once, page by page with a fixed
//! inter-request delay, and caches the result to disk. While the cache file
//! exists, later runs read it instead of touching the network. Malformed
//! items are logged and skipped; one broken entry never aborts the fetch.

use crate::models::{self, Track};
use crate::progress::create_spinner;
use crate::spotify::{self, SpotifyClient};
use anyhow::Result;
use std::path::Path;
use std::time::Duration;
use tracing::{info, warn};

/// Delay between page fetches, to respect the API rate limits.
const INTER_PAGE_DELAY: Duration = Duration::from_millis(100);

/// Return the liked tracks, from cache when present, otherwise fetched and
/// then cached.
pub fn load_or_fetch(client: &mut SpotifyClient, cache_path: &Path) -> Result<Vec<Track>> {
    if cache_path.exists() {
        info!("Loading liked songs from cache: {}", cache_path.display());
        return models::load_json(cache_path);
    }

    let tracks = fetch_all(client)?;
    models::save_json(cache_path, &tracks)?;
    info!("Cached {} liked songs to {}", tracks.len(), cache_path.display());
    Ok(tracks)
}

/// Fully drain the remote paginated collection, in saved order.
fn fetch_all(client: &mut SpotifyClient) -> Result<Vec<Track>> {
    info!("Fetching liked songs from Spotify...");
    let spinner = create_spinner("Fetching liked songs");

    let mut tracks: Vec<Track> = Vec::new();
    let mut offset = 0u32;

    loop {
        let page = client.saved_tracks_page(offset)?;
        if page.items.is_empty() {
            break;
        }

        for item in &page.items {
            match spotify::item_to_track(item) {
                Some(track) => tracks.push(track),
                None => warn!("Skipping malformed track entry at offset {}", offset),
            }
        }

        offset += spotify::PAGE_LIMIT;
        spinner.set_message(format!("Fetched {} songs so far...", tracks.len()));

        if page.next.is_none() {
            break;
        }
        std::thread::sleep(INTER_PAGE_DELAY);
    }

    spinner.finish_with_message(format!("Total liked songs: {}", tracks.len()));
    info!("Total liked songs: {}", tracks.len());
    Ok(tracks)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn track(id: &str) -> Track {
        Track {
            id: id.to_string(),
            name: format!("Song {id}"),
            artist: "Artist".to_string(),
            album: "Album".to_string(),
            uri: format!("spotify:track:{id}"),
            popularity: 5,
            added_at: "2024-02-02T00:00:00Z".to_string(),
            release_date: "2018-01-01".to_string(),
        }
    }

    #[test]
    fn test_cache_roundtrip_preserves_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("spotify_liked_songs.json");

        let tracks = vec![track("t2"), track("t1"), track("t3")];
        models::save_json(&path, &tracks).unwrap();

        let loaded: Vec<Track> = models::load_json(&path).unwrap();
        assert_eq!(loaded, tracks);
    }

    #[test]
    fn test_cached_ids_unique() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("spotify_liked_songs.json");

        let tracks = vec![track("t1"), track("t2"), track("t3")];
        models::save_json(&path, &tracks).unwrap();

        let loaded: Vec<Track> = models::load_json(&path).unwrap();
        let ids: HashSet<&str> = loaded.iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids.len(), loaded.len());
    }
}
