//! Parser for the model's categorization responses.
//!
//! The model is instructed to answer with one line per track:
//!
//! ```text
//! line := [index "." whitespace] label {"|" label}
//! ```
//!
//! A numeric prefix is stripped only when the line *begins* with digits
//! followed by a dot and whitespace. A `". "` occurring later in a label
//! (e.g. "Mr. Brightside Covers") is part of the label text and is never
//! treated as a prefix.

use once_cell::sync::Lazy;
use regex::Regex;

static LINE_INDEX_PREFIX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*\d{1,4}\.\s+").expect("valid regex"));

/// Parse one response line into its labels. Returns an empty vector for a
/// line that contains no label text (callers skip those).
pub fn parse_line(line: &str) -> Vec<String> {
    let rest = LINE_INDEX_PREFIX.replace(line, "");
    rest.split('|')
        .map(|label| label.trim().to_string())
        .filter(|label| !label.is_empty())
        .collect()
}

/// Parse a full response into one label list per non-empty line, in order.
/// No count validation happens here; the categorizer compares the result
/// length against its batch size.
pub fn parse_response(text: &str) -> Vec<Vec<String>> {
    text.lines()
        .map(parse_line)
        .filter(|labels| !labels.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_multi_label_response() {
        let parsed = parse_response("1. Pop | Summer\n2. Jazz");
        assert_eq!(
            parsed,
            vec![
                vec!["Pop".to_string(), "Summer".to_string()],
                vec!["Jazz".to_string()],
            ]
        );
    }

    #[test]
    fn test_parse_single_label_response() {
        let parsed = parse_response("1. Indie Rock\n2. Lo-fi Chill\n3. 80s Synth");
        assert_eq!(
            parsed,
            vec![
                vec!["Indie Rock".to_string()],
                vec!["Lo-fi Chill".to_string()],
                vec!["80s Synth".to_string()],
            ]
        );
    }

    #[test]
    fn test_prefix_without_index_left_alone() {
        assert_eq!(parse_line("Folk | Acoustic"), vec!["Folk", "Acoustic"]);
    }

    #[test]
    fn test_mid_label_dot_space_not_stripped() {
        // The ambiguous case from the free-form format: a period inside the
        // label text must survive.
        assert_eq!(parse_line("3. Mr. Brightside Covers"), vec!["Mr. Brightside Covers"]);
        assert_eq!(parse_line("Dr. Dre Era | West Coast"), vec!["Dr. Dre Era", "West Coast"]);
    }

    #[test]
    fn test_index_requires_leading_digits() {
        // "A. " is not a numeric index.
        assert_eq!(parse_line("A. Tribe Vibes"), vec!["A. Tribe Vibes"]);
    }

    #[test]
    fn test_whitespace_trimmed_and_empty_labels_dropped() {
        assert_eq!(parse_line("  4.   Rock |  | Chill  "), vec!["Rock", "Chill"]);
    }

    #[test]
    fn test_blank_lines_skipped() {
        let parsed = parse_response("1. Pop\n\n   \n2. Jazz\n");
        assert_eq!(parsed.len(), 2);
    }

    #[test]
    fn test_empty_response() {
        assert!(parse_response("").is_empty());
    }
}
