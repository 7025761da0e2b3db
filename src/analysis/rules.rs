//! Watch-word matching
//!
//! A watch word fires when it appears, case-insensitively, anywhere inside a
//! buffered detection. Words are tried in list order, so the first listed word
//! with any hit wins regardless of how recent the hit is.

use tracing::warn;

use crate::analysis::buffer::DetectionBuffer;

/// Watch words as handed to the matcher: a list or one comma-separated string
#[derive(Debug, Clone, Copy)]
pub enum WatchWordInput<'a> {
    List(&'a [String]),
    Csv(&'a str),
}

impl<'a> WatchWordInput<'a> {
    /// Trimmed, non-empty words in their given order
    pub fn normalized(self) -> Vec<&'a str> {
        match self {
            WatchWordInput::List(words) => normalize(words.iter().map(String::as_str)),
            WatchWordInput::Csv(csv) => normalize(csv.split(',')),
        }
    }
}

impl<'a> From<&'a [String]> for WatchWordInput<'a> {
    fn from(words: &'a [String]) -> Self {
        WatchWordInput::List(words)
    }
}

impl<'a> From<&'a Vec<String>> for WatchWordInput<'a> {
    fn from(words: &'a Vec<String>) -> Self {
        WatchWordInput::List(words.as_slice())
    }
}

impl<'a> From<&'a str> for WatchWordInput<'a> {
    fn from(csv: &'a str) -> Self {
        WatchWordInput::Csv(csv)
    }
}

fn normalize<'a>(words: impl Iterator<Item = &'a str>) -> Vec<&'a str> {
    words.map(str::trim).filter(|w| !w.is_empty()).collect()
}

/// Ordered, editable list of watch words
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WatchWords {
    words: Vec<String>,
}

impl WatchWords {
    pub fn new<I, S>(words: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut list = Self::default();
        list.set(words);
        list
    }

    /// Replace the list; entries are trimmed and blanks dropped
    pub fn set<I, S>(&mut self, words: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.words = words
            .into_iter()
            .map(|w| Into::<String>::into(w).trim().to_string())
            .filter(|w| !w.is_empty())
            .collect();
    }

    /// Replace the list from a comma-separated string
    pub fn set_from_csv(&mut self, csv: &str) {
        self.set(csv.split(','));
    }

    pub fn words(&self) -> &[String] {
        &self.words
    }

    pub fn to_csv(&self) -> String {
        self.words.join(",")
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    pub fn len(&self) -> usize {
        self.words.len()
    }
}

/// Return the first watch word found in the buffer
///
/// Empty word lists and empty buffers never match.
pub fn find_alarm<'a>(words: impl Into<WatchWordInput<'a>>, buffer: &DetectionBuffer) -> Option<String> {
    if buffer.is_empty() {
        return None;
    }
    let words = words.into().normalized();
    if words.is_empty() {
        return None;
    }

    // Lowercase every detection once rather than once per word
    let texts: Vec<String> = buffer.iter().map(|d| d.text().to_lowercase()).collect();

    for word in words {
        let needle = word.to_lowercase();
        if let Some(index) = texts.iter().position(|text| text.contains(&needle)) {
            if let Some(detection) = buffer.iter().nth(index) {
                warn!(
                    "ALARM! Watch word '{}' detected at {}",
                    word,
                    detection.formatted_timestamp()
                );
            }
            return Some(word.to_string());
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn buffer_with(texts: &[&str]) -> DetectionBuffer {
        let mut buffer = DetectionBuffer::new(100);
        for text in texts {
            buffer.append(text, None);
        }
        buffer
    }

    #[test]
    fn test_empty_words_never_match() {
        let buffer = buffer_with(&["smoke"]);
        let empty: Vec<String> = vec![];
        assert_eq!(find_alarm(&empty, &buffer), None);
        assert_eq!(find_alarm("", &buffer), None);
        assert_eq!(find_alarm(" , ,", &buffer), None);
    }

    #[test]
    fn test_empty_buffer_never_matches() {
        let words = vec!["smoke".to_string()];
        assert_eq!(find_alarm(&words, &DetectionBuffer::new(10)), None);
    }

    #[test]
    fn test_case_insensitive_substring() {
        let words = vec!["smoke".to_string(), "alert".to_string()];
        let buffer = buffer_with(&["all clear", "SMOKE detected"]);
        assert_eq!(find_alarm(&words, &buffer), Some("smoke".to_string()));
    }

    #[test]
    fn test_matches_inside_words() {
        let words = vec!["arm".to_string()];
        let buffer = buffer_with(&["ALARM raised"]);
        assert_eq!(find_alarm(&words, &buffer), Some("arm".to_string()));
    }

    #[test]
    fn test_word_order_beats_recency() {
        let words = vec!["danger".to_string(), "alert".to_string()];
        // "alert" is older, "danger" more recent; list order decides
        let buffer = buffer_with(&["alert issued", "danger zone"]);
        assert_eq!(find_alarm(&words, &buffer), Some("danger".to_string()));
    }

    #[test]
    fn test_csv_equals_list() {
        let buffer = buffer_with(&["b side"]);
        let list = vec!["a".to_string(), "b".to_string()];
        assert_eq!(find_alarm("a, b", &buffer), find_alarm(&list, &buffer));
        assert_eq!(find_alarm("a, b", &buffer), Some("b".to_string()));
    }

    #[test]
    fn test_list_entries_are_trimmed_and_blanks_skipped() {
        let buffer = buffer_with(&["a warning sign"]);
        let words = vec!["".to_string(), "  warning ".to_string()];
        assert_eq!(find_alarm(&words, &buffer), Some("warning".to_string()));
    }

    #[test]
    fn test_no_match() {
        let buffer = buffer_with(&["nothing here"]);
        assert_eq!(find_alarm("fire, flood", &buffer), None);
    }

    #[test]
    fn test_watch_words_set_from_csv() {
        let mut words = WatchWords::default();
        words.set_from_csv(" smoke, ,home theater ,");
        assert_eq!(words.words(), &["smoke".to_string(), "home theater".to_string()]);
        assert_eq!(words.to_csv(), "smoke,home theater");
        assert_eq!(words.len(), 2);
    }

    #[test]
    fn test_watch_words_feed_matcher() {
        let words = WatchWords::new(["599:", "hazard"]);
        let buffer = buffer_with(&["CODE 599: active"]);
        assert_eq!(find_alarm(words.words(), &buffer), Some("599:".to_string()));
    }
}
