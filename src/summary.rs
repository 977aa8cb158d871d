//! Categorization summary.
//!
//! Folds the ledger and the track store into a category -> songs index sorted
//! by popularity (track count). Stale ledger entries, whose track id is no
//! longer in the store, contribute nothing; they stay in the ledger untouched.

use crate::models::{self, CategorySummary, SongRef, Summary, Track};
use anyhow::Result;
use std::collections::HashMap;
use std::path::Path;
use tracing::info;

/// How many categories the final log surfaces for human inspection.
const TOP_CATEGORIES_SHOWN: usize = 15;

/// Build the summary from the ledger entries and the fetched tracks.
/// Categories keep their encounter order on ties (stable sort).
pub fn build(ledger: &models::CategoryMap, tracks: &[Track]) -> Summary {
    let tracks_by_id: HashMap<&str, &Track> =
        tracks.iter().map(|t| (t.id.as_str(), t)).collect();

    let mut categories: Vec<CategorySummary> = Vec::new();
    let mut index_by_label: HashMap<String, usize> = HashMap::new();

    for (track_id, labels) in ledger {
        let Some(track) = tracks_by_id.get(track_id.as_str()) else {
            // Track no longer in the store; excluded from the summary.
            continue;
        };

        for label in labels {
            let idx = *index_by_label.entry(label.clone()).or_insert_with(|| {
                categories.push(CategorySummary {
                    label: label.clone(),
                    count: 0,
                    songs: Vec::new(),
                });
                categories.len() - 1
            });

            categories[idx].count += 1;
            categories[idx].songs.push(SongRef {
                id: track.id.clone(),
                name: track.name.clone(),
                artist: track.artist.clone(),
                uri: track.uri.clone(),
            });
        }
    }

    categories.sort_by(|a, b| b.count.cmp(&a.count));

    Summary {
        total_songs_categorized: ledger.len(),
        total_categories: categories.len(),
        categories,
    }
}

/// Persist the summary and log the totals plus the top categories.
pub fn write_and_report(summary: &Summary, path: &Path) -> Result<()> {
    models::save_json(path, summary)?;
    info!("Summary saved to: {}", path.display());
    info!(
        "Found {} unique categories across {} songs",
        summary.total_categories, summary.total_songs_categorized
    );

    info!("Top {} categories:", TOP_CATEGORIES_SHOWN);
    for category in summary.categories.iter().take(TOP_CATEGORIES_SHOWN) {
        info!("  {}: {} songs", category.label, category.count);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::CategoryMap;

    fn track(id: &str) -> Track {
        Track {
            id: id.to_string(),
            name: format!("Song {id}"),
            artist: "Artist".to_string(),
            album: "Album".to_string(),
            uri: format!("spotify:track:{id}"),
            popularity: 1,
            added_at: "2024-01-01T00:00:00Z".to_string(),
            release_date: "2019-01-01".to_string(),
        }
    }

    #[test]
    fn test_counts_sorted_descending() {
        let mut ledger = CategoryMap::new();
        ledger.insert("t1".to_string(), vec!["Rock".to_string(), "Chill".to_string()]);
        ledger.insert("t2".to_string(), vec!["Rock".to_string()]);
        let tracks = vec![track("t1"), track("t2")];

        let summary = build(&ledger, &tracks);

        assert_eq!(summary.total_songs_categorized, 2);
        assert_eq!(summary.total_categories, 2);
        assert_eq!(summary.categories[0].label, "Rock");
        assert_eq!(summary.categories[0].count, 2);
        assert_eq!(summary.categories[1].label, "Chill");
        assert_eq!(summary.categories[1].count, 1);
    }

    #[test]
    fn test_stale_ledger_entry_excluded() {
        let mut ledger = CategoryMap::new();
        ledger.insert("t1".to_string(), vec!["Rock".to_string()]);
        ledger.insert("gone".to_string(), vec!["Rock".to_string(), "Lost".to_string()]);
        let tracks = vec![track("t1")];

        let summary = build(&ledger, &tracks);

        assert_eq!(summary.categories.len(), 1);
        assert_eq!(summary.categories[0].label, "Rock");
        assert_eq!(summary.categories[0].count, 1);
        assert_eq!(summary.categories[0].songs.len(), 1);
        // The ledger itself keeps the stale key; only the summary skips it.
        assert!(ledger.contains_key("gone"));
    }

    #[test]
    fn test_ties_keep_encounter_order() {
        let mut ledger = CategoryMap::new();
        // BTreeMap iterates t1 then t2, so "Ambient" is encountered first.
        ledger.insert("t1".to_string(), vec!["Ambient".to_string()]);
        ledger.insert("t2".to_string(), vec!["Zydeco".to_string()]);
        let tracks = vec![track("t1"), track("t2")];

        let summary = build(&ledger, &tracks);
        let labels: Vec<&str> = summary.categories.iter().map(|c| c.label.as_str()).collect();
        assert_eq!(labels, vec!["Ambient", "Zydeco"]);
    }

    #[test]
    fn test_song_refs_carry_track_fields() {
        let mut ledger = CategoryMap::new();
        ledger.insert("t1".to_string(), vec!["Rock".to_string()]);
        let tracks = vec![track("t1")];

        let summary = build(&ledger, &tracks);
        let song = &summary.categories[0].songs[0];
        assert_eq!(song.id, "t1");
        assert_eq!(song.uri, "spotify:track:t1");
    }
}
