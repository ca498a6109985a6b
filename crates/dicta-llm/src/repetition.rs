use std::collections::VecDeque;

use tracing::warn;

/// Characters of response text kept for loop inspection.
const RING_CAPACITY: usize = 100;

/// Watches the response stream for runaway repetition.
///
/// A fixed ring of the most recent response characters is scanned for the
/// configured seed phrases; hitting `max_repetitions` occurrences inside
/// the ring terminates the stream. Seeds are per model family and small by
/// design: this is a tripwire, not an open heuristic.
pub struct RepetitionDetector {
    ring: VecDeque<char>,
    capacity: usize,
    seeds: Vec<String>,
    max_repetitions: usize,
}

impl RepetitionDetector {
    pub fn new(seeds: &[String], max_repetitions: usize) -> Self {
        Self {
            ring: VecDeque::with_capacity(RING_CAPACITY),
            capacity: RING_CAPACITY,
            seeds: seeds.iter().filter(|s| !s.is_empty()).cloned().collect(),
            max_repetitions: max_repetitions.max(1),
        }
    }

    /// Feed response text; returns `true` when a loop is detected.
    pub fn observe(&mut self, chunk: &str) -> bool {
        if self.seeds.is_empty() {
            return false;
        }
        for c in chunk.chars() {
            if self.ring.len() == self.capacity {
                self.ring.pop_front();
            }
            self.ring.push_back(c);
        }

        let window: String = self.ring.iter().collect();
        for seed in &self.seeds {
            let count = window.matches(seed.as_str()).count();
            if count >= self.max_repetitions {
                warn!(
                    "repetition loop detected: {:?} appeared {} times in the last {} chars",
                    seed, count, self.capacity
                );
                return true;
            }
        }
        false
    }

    pub fn reset(&mut self) {
        self.ring.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn detector() -> RepetitionDetector {
        RepetitionDetector::new(&["The correct term is".to_string()], 3)
    }

    #[test]
    fn triggers_on_third_occurrence() {
        let mut d = detector();
        assert!(!d.observe("The correct term is X. "));
        assert!(!d.observe("The correct term is X. "));
        assert!(d.observe("The correct term is X."));
    }

    #[test]
    fn ignores_unrelated_repetition() {
        let mut d = detector();
        for _ in 0..10 {
            assert!(!d.observe("All good here. "));
        }
    }

    #[test]
    fn seed_split_across_chunks_counts() {
        let mut d = detector();
        assert!(!d.observe("The correct term is A. The correct "));
        assert!(d.observe("term is B. The correct term is C."));
    }

    #[test]
    fn old_occurrences_age_out_of_the_ring() {
        let mut d = detector();
        assert!(!d.observe("The correct term is X. "));
        // Push enough unrelated text to evict the first occurrence.
        assert!(!d.observe(&"filler text ".repeat(12)));
        assert!(!d.observe("The correct term is Y. "));
        assert!(!d.observe("The correct term is Z. "));
    }

    #[test]
    fn reset_clears_history() {
        let mut d = detector();
        d.observe("The correct term is X. The correct term is Y. ");
        d.reset();
        assert!(!d.observe("The correct term is Z."));
    }

    #[test]
    fn empty_seed_list_never_triggers() {
        let mut d = RepetitionDetector::new(&[], 3);
        assert!(!d.observe(&"loop ".repeat(100)));
    }
}
