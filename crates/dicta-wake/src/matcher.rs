use std::collections::VecDeque;
use std::time::{Duration, Instant};

use tracing::debug;

use dicta_foundation::Mode;

use crate::phonetic::phonetic_key;

/// Longest span a multi-word phrase may occupy in the hypothesis stream.
pub const PHRASE_WINDOW: Duration = Duration::from_millis(1500);

/// Per-mode wake phrase sets, as configured by the UI.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WakePhrases {
    pub dictate: Vec<String>,
    pub proofread: Vec<String>,
    pub letter: Vec<String>,
}

impl WakePhrases {
    pub fn builtin() -> Self {
        Self {
            dictate: vec!["note".into(), "dictation".into(), "dictate".into()],
            proofread: vec!["proof".into(), "proofread".into()],
            letter: vec!["letter".into()],
        }
    }

    fn iter(&self) -> impl Iterator<Item = (Mode, &String)> {
        self.dictate
            .iter()
            .map(|p| (Mode::Dictate, p))
            .chain(self.proofread.iter().map(|p| (Mode::Proofread, p)))
            .chain(self.letter.iter().map(|p| (Mode::Letter, p)))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct WakeMatch {
    pub mode: Mode,
    pub phrase: String,
    pub confidence: f32,
}

#[derive(Debug, Clone)]
struct PhraseEntry {
    mode: Mode,
    phrase: String,
    keys: Vec<String>,
}

/// Matches recognised text against the configured wake phrases.
///
/// Words arrive as they are recognised; the matcher keeps a short window of
/// phonetic keys with arrival times. A phrase matches when its key sequence
/// appears contiguously, ends at the newest word, and fits inside
/// [`PHRASE_WINDOW`]. Ties are broken by mode precedence
/// (proofread > letter > dictate), then by phrase length.
pub struct WakeWordMatcher {
    entries: Vec<PhraseEntry>,
    window: Duration,
    recent: VecDeque<(String, Instant)>,
}

impl WakeWordMatcher {
    pub fn new(phrases: &WakePhrases) -> Self {
        let mut matcher = Self {
            entries: Vec::new(),
            window: PHRASE_WINDOW,
            recent: VecDeque::new(),
        };
        matcher.set_phrases(phrases);
        matcher
    }

    pub fn set_phrases(&mut self, phrases: &WakePhrases) {
        self.entries = phrases
            .iter()
            .filter_map(|(mode, phrase)| {
                let keys: Vec<String> = phrase
                    .split_whitespace()
                    .map(phonetic_key)
                    .filter(|k| !k.is_empty())
                    .collect();
                if keys.is_empty() {
                    debug!("ignoring unencodable wake phrase: {:?}", phrase);
                    return None;
                }
                Some(PhraseEntry {
                    mode,
                    phrase: phrase.to_lowercase(),
                    keys,
                })
            })
            .collect();
        self.recent.clear();
    }

    /// Feed one recognised hypothesis. Returns the winning match, if any.
    pub fn observe(&mut self, text: &str, now: Instant) -> Option<WakeMatch> {
        let mut matched_any = false;
        let mut best: Option<&PhraseEntry> = None;

        for word in text.split_whitespace() {
            let key = phonetic_key(word);
            if key.is_empty() {
                continue;
            }
            self.recent.push_back((key, now));
        }
        self.prune(now);

        for entry in &self.entries {
            if !self.matches_tail(entry) {
                continue;
            }
            matched_any = true;
            let better = match best {
                None => true,
                Some(current) => {
                    (entry.mode.precedence(), std::cmp::Reverse(entry.keys.len()))
                        < (current.mode.precedence(), std::cmp::Reverse(current.keys.len()))
                }
            };
            if better {
                best = Some(entry);
            }
        }

        let result = best.map(|entry| WakeMatch {
            mode: entry.mode,
            phrase: entry.phrase.clone(),
            confidence: 1.0,
        });
        if matched_any {
            // One activation per utterance: a match consumes the window.
            self.recent.clear();
        }
        result
    }

    pub fn reset(&mut self) {
        self.recent.clear();
    }

    fn prune(&mut self, now: Instant) {
        while let Some((_, t)) = self.recent.front() {
            if now.duration_since(*t) > self.window {
                self.recent.pop_front();
            } else {
                break;
            }
        }
    }

    /// Whether the entry's keys terminate the recent-word window.
    fn matches_tail(&self, entry: &PhraseEntry) -> bool {
        let n = entry.keys.len();
        if self.recent.len() < n {
            return false;
        }
        let tail_start = self.recent.len() - n;
        entry
            .keys
            .iter()
            .zip(self.recent.iter().skip(tail_start))
            .all(|(key, (recent_key, _))| key == recent_key)
    }
}
