//! Batched LLM categorization with retry and incremental persistence.
//!
//! Uncategorized tracks are partitioned into fixed-size batches. Each batch is
//! rendered into a single prompt, sent to the labeler, and parsed back into one
//! label list per track. A short response or a failed call is retried with a
//! fixed delay; when all attempts are exhausted the whole batch degrades to the
//! sentinel label instead of aborting the run. The ledger is persisted after
//! every batch so interruption loses at most the in-flight batch.

use crate::ledger::Ledger;
use crate::llm::Labeler;
use crate::models::Track;
use crate::parse;
use crate::progress::create_progress_bar;
use anyhow::Result;
use std::time::Duration;
use tracing::{error, info, warn};

/// Number of songs sent to the model in one call.
pub const TRACKS_PER_BATCH: usize = 20;
/// Cap on previously-seen labels included in the prompt, to bound token usage.
pub const LABEL_HINT_LIMIT: usize = 50;

const MAX_ATTEMPTS: u32 = 3;
const RETRY_DELAY: Duration = Duration::from_secs(2);
const INTER_BATCH_DELAY: Duration = Duration::from_secs(1);

/// Terminal fallback when every attempt for a batch fails.
pub const FALLBACK_LABEL: &str = "Uncategorized";

/// How many labels the model is asked for per track.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LabelMode {
    /// One category per song; used when the ledger feeds playlist creation.
    Single,
    /// 2-4 pipe-separated categories per song.
    Multi,
}

pub struct BatchCategorizer<'a, L: Labeler> {
    labeler: &'a L,
    mode: LabelMode,
    max_attempts: u32,
    retry_delay: Duration,
    inter_batch_delay: Duration,
}

impl<'a, L: Labeler> BatchCategorizer<'a, L> {
    pub fn new(labeler: &'a L, mode: LabelMode) -> Self {
        Self {
            labeler,
            mode,
            max_attempts: MAX_ATTEMPTS,
            retry_delay: RETRY_DELAY,
            inter_batch_delay: INTER_BATCH_DELAY,
        }
    }

    #[cfg(test)]
    fn without_delays(labeler: &'a L, mode: LabelMode) -> Self {
        Self {
            labeler,
            mode,
            max_attempts: MAX_ATTEMPTS,
            retry_delay: Duration::ZERO,
            inter_batch_delay: Duration::ZERO,
        }
    }

    /// Render the single prompt for one batch: an optional reuse hint listing
    /// known labels, the per-mode instructions, and one numbered line per track.
    fn render_prompt(&self, batch: &[&Track], existing_labels: &[String]) -> String {
        let mut prompt = String::new();

        if !existing_labels.is_empty() {
            prompt.push_str("Existing playlist categories (reuse these when appropriate):\n");
            prompt.push_str(&existing_labels.join(", "));
            prompt.push_str("\n\n");
        }

        match self.mode {
            LabelMode::Multi => {
                prompt.push_str(
                    "Categorize these songs into music genres, mood-based playlists, or other relevant groupings.\n\
                     For each song, assign 2-4 categories that best describe it. Use common genre names, moods, eras, or themes.\n\
                     Return the results in this format:\n\
                     1. Category A | Category B | Category C\n\
                     2. Category D | Category E | Category F\n\
                     And so on. Just the category names in order, separated by pipes (|), nothing else.\n",
                );
            }
            LabelMode::Single => {
                prompt.push_str(
                    "Categorize these songs into music genres or mood-based playlists.\n\
                     For each song, assign ONE category only. Be specific but use common genre names or moods.\n\
                     Return the results in this format:\n\
                     1. Category Name\n\
                     2. Category Name\n\
                     And so on. Just the category names in order, nothing else.\n",
                );
            }
        }

        prompt.push_str("\nSongs to categorize:\n");
        for (i, track) in batch.iter().enumerate() {
            prompt.push_str(&format!(
                "{}. '{}' by {} (Album: {})\n",
                i + 1,
                track.name,
                track.artist,
                track.album
            ));
        }

        prompt
    }

    /// Categorize one batch. Always returns exactly `batch.len()` non-empty
    /// label lists, positionally aligned with the input; total failure yields
    /// the sentinel label for every track.
    pub fn categorize(&self, batch: &[&Track], existing_labels: &[String]) -> Vec<Vec<String>> {
        let prompt = self.render_prompt(batch, existing_labels);

        for attempt in 1..=self.max_attempts {
            match self.labeler.complete(&prompt) {
                Ok(text) => {
                    let mut parsed = parse::parse_response(&text);
                    if parsed.len() >= batch.len() {
                        parsed.truncate(batch.len());
                        return parsed;
                    }
                    warn!(
                        "Model returned {} category sets for {} songs. Retrying...",
                        parsed.len(),
                        batch.len()
                    );
                }
                Err(e) => {
                    error!("Error in LLM call: {}. Attempt {}/{}", e, attempt, self.max_attempts);
                }
            }
            std::thread::sleep(self.retry_delay);
        }

        vec![vec![FALLBACK_LABEL.to_string()]; batch.len()]
    }

    /// Categorize every track not yet in the ledger, persisting after each
    /// batch. Returns the number of newly categorized tracks.
    pub fn run(&self, tracks: &[Track], ledger: &mut Ledger) -> Result<usize> {
        let uncategorized = ledger.uncategorized(tracks);
        info!(
            "Found {} uncategorized songs out of {} total",
            uncategorized.len(),
            tracks.len()
        );

        if uncategorized.is_empty() {
            info!("No new songs to categorize");
            return Ok(0);
        }

        let batches: Vec<&[&Track]> = uncategorized.chunks(TRACKS_PER_BATCH).collect();
        let pb = create_progress_bar(batches.len() as u64, "Categorizing songs");

        let mut categorized = 0;
        for batch in batches {
            let hint = ledger.unique_labels(LABEL_HINT_LIMIT);
            let labels = self.categorize(batch, &hint);

            for (track, track_labels) in batch.iter().zip(labels) {
                ledger.assign(&track.id, track_labels);
                categorized += 1;
            }

            ledger.save()?;
            pb.inc(1);
            std::thread::sleep(self.inter_batch_delay);
        }
        pb.finish_with_message(format!("Categorized {categorized} songs"));

        Ok(categorized)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::LlmError;
    use std::cell::RefCell;

    /// Scripted labeler: pops one canned result per call and counts calls.
    struct FakeLabeler {
        responses: RefCell<Vec<Result<String, LlmError>>>,
        calls: RefCell<u32>,
    }

    impl FakeLabeler {
        fn new(responses: Vec<Result<String, LlmError>>) -> Self {
            let mut responses = responses;
            responses.reverse();
            Self {
                responses: RefCell::new(responses),
                calls: RefCell::new(0),
            }
        }

        fn call_count(&self) -> u32 {
            *self.calls.borrow()
        }
    }

    impl Labeler for FakeLabeler {
        fn complete(&self, _user_prompt: &str) -> Result<String, LlmError> {
            *self.calls.borrow_mut() += 1;
            self.responses
                .borrow_mut()
                .pop()
                .unwrap_or(Err(LlmError::EmptyResponse))
        }
    }

    fn track(id: &str, name: &str) -> Track {
        Track {
            id: id.to_string(),
            name: name.to_string(),
            artist: "Artist".to_string(),
            album: "Album".to_string(),
            uri: format!("spotify:track:{id}"),
            popularity: 10,
            added_at: "2024-01-01T00:00:00Z".to_string(),
            release_date: "2021-06-01".to_string(),
        }
    }

    #[test]
    fn test_batch_returns_one_list_per_track() {
        let labeler = FakeLabeler::new(vec![Ok("1. Pop | Summer\n2. Jazz".to_string())]);
        let categorizer = BatchCategorizer::without_delays(&labeler, LabelMode::Multi);

        let t1 = track("t1", "Song One");
        let t2 = track("t2", "Song Two");
        let labels = categorizer.categorize(&[&t1, &t2], &[]);

        assert_eq!(
            labels,
            vec![
                vec!["Pop".to_string(), "Summer".to_string()],
                vec!["Jazz".to_string()],
            ]
        );
        assert_eq!(labeler.call_count(), 1);
    }

    #[test]
    fn test_extra_lines_truncated() {
        let labeler = FakeLabeler::new(vec![Ok("1. Pop\n2. Jazz\n3. Rock".to_string())]);
        let categorizer = BatchCategorizer::without_delays(&labeler, LabelMode::Single);

        let t1 = track("t1", "Song One");
        let t2 = track("t2", "Song Two");
        let labels = categorizer.categorize(&[&t1, &t2], &[]);
        assert_eq!(labels.len(), 2);
    }

    #[test]
    fn test_short_response_retried_then_succeeds() {
        let labeler = FakeLabeler::new(vec![
            Ok("1. Pop".to_string()), // one line for two tracks
            Ok("1. Pop\n2. Jazz".to_string()),
        ]);
        let categorizer = BatchCategorizer::without_delays(&labeler, LabelMode::Single);

        let t1 = track("t1", "Song One");
        let t2 = track("t2", "Song Two");
        let labels = categorizer.categorize(&[&t1, &t2], &[]);

        assert_eq!(labeler.call_count(), 2);
        assert_eq!(labels[1], vec!["Jazz".to_string()]);
    }

    #[test]
    fn test_exhausted_attempts_fall_back_to_sentinel() {
        let labeler = FakeLabeler::new(vec![
            Err(LlmError::EmptyResponse),
            Err(LlmError::EmptyResponse),
            Err(LlmError::EmptyResponse),
        ]);
        let categorizer = BatchCategorizer::without_delays(&labeler, LabelMode::Multi);

        let t1 = track("t1", "Song One");
        let t2 = track("t2", "Song Two");
        let labels = categorizer.categorize(&[&t1, &t2], &[]);

        assert_eq!(labeler.call_count(), 3);
        assert_eq!(
            labels,
            vec![
                vec![FALLBACK_LABEL.to_string()],
                vec![FALLBACK_LABEL.to_string()],
            ]
        );
    }

    #[test]
    fn test_prompt_contains_hint_and_numbered_lines() {
        let labeler = FakeLabeler::new(vec![]);
        let categorizer = BatchCategorizer::without_delays(&labeler, LabelMode::Multi);

        let t1 = track("t1", "Take On Me");
        let hint = vec!["Chill".to_string(), "Rock".to_string()];
        let prompt = categorizer.render_prompt(&[&t1], &hint);

        assert!(prompt.contains("Existing playlist categories (reuse these when appropriate):"));
        assert!(prompt.contains("Chill, Rock"));
        assert!(prompt.contains("1. 'Take On Me' by Artist (Album: Album)"));
    }

    #[test]
    fn test_prompt_omits_hint_when_no_labels() {
        let labeler = FakeLabeler::new(vec![]);
        let categorizer = BatchCategorizer::without_delays(&labeler, LabelMode::Single);

        let t1 = track("t1", "Take On Me");
        let prompt = categorizer.render_prompt(&[&t1], &[]);
        assert!(!prompt.contains("Existing playlist categories"));
        assert!(prompt.contains("assign ONE category only"));
    }

    #[test]
    fn test_run_is_idempotent_with_full_ledger() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("song_categories.json");

        let tracks = vec![track("t1", "One"), track("t2", "Two")];
        let mut ledger = Ledger::load(&path).unwrap();
        ledger.assign("t1", vec!["Rock".to_string()]);
        ledger.assign("t2", vec!["Jazz".to_string()]);

        let labeler = FakeLabeler::new(vec![]);
        let categorizer = BatchCategorizer::without_delays(&labeler, LabelMode::Multi);

        let newly = categorizer.run(&tracks, &mut ledger).unwrap();
        assert_eq!(newly, 0);
        assert_eq!(labeler.call_count(), 0);
        assert_eq!(ledger.len(), 2);
    }

    #[test]
    fn test_run_resumes_only_remaining_tracks() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("song_categories.json");

        let tracks = vec![track("t1", "One"), track("t2", "Two"), track("t3", "Three")];
        let mut ledger = Ledger::load(&path).unwrap();
        ledger.assign("t1", vec!["Rock".to_string()]);
        ledger.save().unwrap();

        let labeler = FakeLabeler::new(vec![Ok("1. Pop\n2. Jazz".to_string())]);
        let categorizer = BatchCategorizer::without_delays(&labeler, LabelMode::Single);

        let newly = categorizer.run(&tracks, &mut ledger).unwrap();
        assert_eq!(newly, 2);
        assert_eq!(labeler.call_count(), 1);

        // Prior entry untouched, new ones persisted.
        let reloaded = Ledger::load(&path).unwrap();
        assert_eq!(reloaded.entries().get("t1").unwrap(), &vec!["Rock".to_string()]);
        assert_eq!(reloaded.entries().get("t2").unwrap(), &vec!["Pop".to_string()]);
        assert_eq!(reloaded.entries().get("t3").unwrap(), &vec!["Jazz".to_string()]);
    }
}
