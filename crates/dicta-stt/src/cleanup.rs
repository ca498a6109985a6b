use regex::Regex;
use tracing::debug;

/// Tail repeats of a single word that count as an ASR loop.
const SINGLE_WORD_REPEAT_THRESHOLD: usize = 8;
/// Tail repeats of a two-word phrase that count as an ASR loop.
const BIGRAM_REPEAT_THRESHOLD: usize = 6;

/// Post-processing applied to raw transcripts before delivery: filler-word
/// removal, vocabulary corrections, and trimming of pathological trailing
/// repetition (a common ASR hallucination tail).
pub struct TranscriptCleaner {
    filter_fillers: bool,
    filler_regex: Option<Regex>,
    vocabulary: Vec<(Regex, String)>,
}

impl Default for TranscriptCleaner {
    fn default() -> Self {
        Self {
            filter_fillers: false,
            filler_regex: None,
            vocabulary: Vec::new(),
        }
    }
}

impl TranscriptCleaner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_filler_filter(&mut self, enabled: bool) {
        self.filter_fillers = enabled;
    }

    pub fn set_filler_words(&mut self, words: &[String]) {
        let words: Vec<&String> = words.iter().filter(|w| !w.trim().is_empty()).collect();
        self.filler_regex = if words.is_empty() {
            None
        } else {
            let pattern = format!(
                r"(?i)\b(?:{})\b",
                words
                    .iter()
                    .map(|w| regex::escape(w.trim()))
                    .collect::<Vec<_>>()
                    .join("|")
            );
            Regex::new(&pattern).ok()
        };
    }

    /// Vocabulary entries are (spoken, written) pairs; matching is
    /// case-insensitive and whole-word.
    pub fn set_vocabulary(&mut self, entries: &[(String, String)]) {
        self.vocabulary = entries
            .iter()
            .filter(|(from, _)| !from.trim().is_empty())
            .filter_map(|(from, to)| {
                Regex::new(&format!(r"(?i)\b{}\b", regex::escape(from.trim())))
                    .ok()
                    .map(|re| (re, to.clone()))
            })
            .collect();
    }

    pub fn clean(&self, text: &str) -> String {
        let mut out = text.trim().to_string();
        if out.is_empty() {
            return out;
        }

        if self.filter_fillers {
            out = self.remove_fillers(&out);
        }
        for (re, replacement) in &self.vocabulary {
            out = re.replace_all(&out, replacement.as_str()).into_owned();
        }
        trim_trailing_repetition(&out)
    }

    fn remove_fillers(&self, text: &str) -> String {
        let Some(re) = &self.filler_regex else {
            return text.to_string();
        };
        let mut result = re.replace_all(text, "").into_owned();

        // Tidy the punctuation and spacing the removals leave behind.
        result = Regex::new(r",\s*,").unwrap().replace_all(&result, ",").into_owned();
        result = Regex::new(r"^\s*,\s*").unwrap().replace_all(&result, "").into_owned();
        result = Regex::new(r",\s*([.!?])").unwrap().replace_all(&result, "$1").into_owned();
        result = Regex::new(r"\s*,\s*$").unwrap().replace_all(&result, "").into_owned();
        result = Regex::new(r"\s+").unwrap().replace_all(&result, " ").into_owned();
        result.trim().to_string()
    }
}

/// Collapse an obviously looping tail ("low LDL low LDL low LDL ...") to a
/// single occurrence. Only the very end of the text is touched.
fn trim_trailing_repetition(text: &str) -> String {
    let normalized = text.trim();
    if normalized.is_empty() {
        return normalized.to_string();
    }

    let words: Vec<&str> = normalized.split_whitespace().collect();

    // Single-word tail loop.
    if words.len() >= SINGLE_WORD_REPEAT_THRESHOLD {
        let last = words[words.len() - 1].to_lowercase();
        let mut run = 1;
        for w in words.iter().rev().skip(1) {
            if w.to_lowercase() == last {
                run += 1;
            } else {
                break;
            }
        }
        if run >= SINGLE_WORD_REPEAT_THRESHOLD {
            debug!("trimming {}x repeated word tail", run);
            let keep = words.len() - run + 1;
            return words[..keep].join(" ");
        }
    }

    // Two-word tail loop.
    if words.len() >= BIGRAM_REPEAT_THRESHOLD * 2 {
        let tail: Vec<String> = words[words.len() - 2..]
            .iter()
            .map(|w| w.to_lowercase())
            .collect();
        let mut run = 1;
        let mut idx = words.len() as isize - 4;
        while idx >= 0 {
            let i = idx as usize;
            let pair = [words[i].to_lowercase(), words[i + 1].to_lowercase()];
            if pair[0] == tail[0] && pair[1] == tail[1] {
                run += 1;
                idx -= 2;
            } else {
                break;
            }
        }
        if run >= BIGRAM_REPEAT_THRESHOLD {
            debug!("trimming {}x repeated bigram tail", run);
            let keep = words.len() - (run - 1) * 2;
            return words[..keep].join(" ");
        }
    }

    words.join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cleaner_with_fillers(words: &[&str]) -> TranscriptCleaner {
        let mut c = TranscriptCleaner::new();
        c.set_filler_filter(true);
        c.set_filler_words(&words.iter().map(|w| w.to_string()).collect::<Vec<_>>());
        c
    }

    #[test]
    fn removes_filler_words_case_insensitively() {
        let c = cleaner_with_fillers(&["um", "uh"]);
        assert_eq!(c.clean("Um the patient uh is stable"), "the patient is stable");
    }

    #[test]
    fn cleans_orphaned_commas() {
        let c = cleaner_with_fillers(&["um"]);
        assert_eq!(c.clean("well, um, the result is fine"), "well, the result is fine");
        assert_eq!(c.clean("um, starting now"), "starting now");
        assert_eq!(c.clean("done, um."), "done.");
    }

    #[test]
    fn filler_filter_disabled_by_default() {
        let mut c = TranscriptCleaner::new();
        c.set_filler_words(&["um".to_string()]);
        assert_eq!(c.clean("um hello"), "um hello");
    }

    #[test]
    fn filler_removal_is_whole_word() {
        let c = cleaner_with_fillers(&["um"]);
        assert_eq!(c.clean("the drum is loud"), "the drum is loud");
    }

    #[test]
    fn vocabulary_corrections_apply() {
        let mut c = TranscriptCleaner::new();
        c.set_vocabulary(&[("high potension".to_string(), "hypertension".to_string())]);
        assert_eq!(
            c.clean("patient has High Potension today"),
            "patient has hypertension today"
        );
    }

    #[test]
    fn trims_single_word_tail_loop() {
        let text = format!("check the {}", vec!["results"; 10].join(" "));
        assert_eq!(trim_trailing_repetition(&text), "check the results");
    }

    #[test]
    fn keeps_short_repetition() {
        assert_eq!(
            trim_trailing_repetition("it was very very good"),
            "it was very very good"
        );
    }

    #[test]
    fn trims_bigram_tail_loop() {
        let text = format!("monitor {}", vec!["low LDL"; 7].join(" "));
        assert_eq!(trim_trailing_repetition(&text), "monitor low LDL");
    }

    #[test]
    fn repetition_trim_is_idempotent() {
        let text = format!("check {}", vec!["stat"; 12].join(" "));
        let once = trim_trailing_repetition(&text);
        assert_eq!(trim_trailing_repetition(&once), once);
    }

    #[test]
    fn mid_text_repetition_is_preserved() {
        let text = "go go go go go go go go and then stop";
        assert_eq!(trim_trailing_repetition(text), text);
    }

    #[test]
    fn empty_input_stays_empty() {
        assert_eq!(TranscriptCleaner::new().clean("   "), "");
    }
}
