//! Compact phonetic keys for wake-word comparison.
//!
//! Recognised words and configured phrases are both reduced to consonant
//! skeletons so that spelling variants and recogniser quirks ("prufe" for
//! "proof") still match. The encoding is a reduced Metaphone: silent leading
//! clusters are dropped, digraphs fold to a single symbol, vowels survive
//! only at the word start.

/// Encode one word. Non-alphabetic characters are ignored; an empty or
/// non-alphabetic input yields an empty key.
pub fn phonetic_key(word: &str) -> String {
    let letters: Vec<char> = word
        .chars()
        .filter(|c| c.is_ascii_alphabetic())
        .map(|c| c.to_ascii_lowercase())
        .collect();
    if letters.is_empty() {
        return String::new();
    }

    // Silent leading clusters.
    let start = match (letters.first(), letters.get(1)) {
        (Some('k'), Some('n'))
        | (Some('g'), Some('n'))
        | (Some('p'), Some('n'))
        | (Some('w'), Some('r'))
        | (Some('a'), Some('e')) => 1,
        _ => 0,
    };

    let mut key = String::new();
    let mut i = start;
    while i < letters.len() {
        let c = letters[i];
        let next = letters.get(i + 1).copied();

        // Collapse doubled letters.
        if i > start && letters[i - 1] == c {
            i += 1;
            continue;
        }

        match c {
            'a' | 'e' | 'i' | 'o' | 'u' => {
                if i == start {
                    key.push('A');
                }
            }
            'b' => {
                // Silent terminal -mb.
                let final_mb = i + 1 == letters.len() && i > 0 && letters[i - 1] == 'm';
                if !final_mb {
                    key.push('P');
                }
            }
            'c' => {
                if next == Some('h') {
                    key.push('X');
                    i += 1;
                } else if matches!(next, Some('i') | Some('e') | Some('y')) {
                    key.push('S');
                } else {
                    key.push('K');
                }
            }
            'd' => key.push('T'),
            'f' | 'v' => key.push('F'),
            'g' => {
                if next == Some('h') {
                    // gh: silent except word-initially.
                    if i == start {
                        key.push('K');
                    }
                    i += 1;
                } else {
                    key.push('K');
                }
            }
            'h' => {
                // Keep only when it starts the word.
                if i == start {
                    key.push('H');
                }
            }
            'j' => key.push('J'),
            'k' => key.push('K'),
            'l' => key.push('L'),
            'm' => key.push('M'),
            'n' => key.push('N'),
            'p' => {
                if next == Some('h') {
                    key.push('F');
                    i += 1;
                } else {
                    key.push('P');
                }
            }
            'q' => key.push('K'),
            'r' => key.push('R'),
            's' => {
                if next == Some('h') {
                    key.push('X');
                    i += 1;
                } else {
                    key.push('S');
                }
            }
            't' => {
                if next == Some('h') {
                    key.push('0');
                    i += 1;
                } else {
                    key.push('T');
                }
            }
            'w' | 'y' => {
                // Semivowels count only before a vowel.
                if matches!(next, Some('a') | Some('e') | Some('i') | Some('o') | Some('u')) {
                    key.push(c.to_ascii_uppercase());
                }
            }
            'x' => key.push_str("KS"),
            'z' => key.push('S'),
            _ => {}
        }
        i += 1;
    }

    // Consecutive identical symbols can still arise across digraphs.
    let mut dedup = String::with_capacity(key.len());
    for c in key.chars() {
        if dedup.chars().last() != Some(c) {
            dedup.push(c);
        }
    }
    dedup
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spelling_variants_share_a_key() {
        assert_eq!(phonetic_key("note"), phonetic_key("noat"));
        assert_eq!(phonetic_key("proof"), phonetic_key("prufe"));
        assert_eq!(phonetic_key("letter"), phonetic_key("lettur"));
        assert_eq!(phonetic_key("phone"), phonetic_key("fone"));
        assert_eq!(phonetic_key("night"), phonetic_key("knight"));
    }

    #[test]
    fn distinct_words_have_distinct_keys() {
        assert_ne!(phonetic_key("note"), phonetic_key("letter"));
        assert_ne!(phonetic_key("proof"), phonetic_key("dictate"));
        assert_ne!(phonetic_key("letter"), phonetic_key("proof"));
    }

    #[test]
    fn known_keys() {
        assert_eq!(phonetic_key("note"), "NT");
        assert_eq!(phonetic_key("proof"), "PRF");
        assert_eq!(phonetic_key("dictate"), "TKTT");
        assert_eq!(phonetic_key("letter"), "LTR");
    }

    #[test]
    fn vowels_survive_only_at_start() {
        assert_eq!(phonetic_key("audio"), "AT");
        assert_eq!(phonetic_key("idea"), "AT");
    }

    #[test]
    fn leading_silent_clusters_drop() {
        assert_eq!(phonetic_key("know"), phonetic_key("no"));
        assert_eq!(phonetic_key("write"), phonetic_key("rite"));
    }

    #[test]
    fn case_and_punctuation_are_ignored() {
        assert_eq!(phonetic_key("Note!"), phonetic_key("note"));
        assert_eq!(phonetic_key("NOTE"), "NT");
    }

    #[test]
    fn empty_and_non_alpha_inputs() {
        assert_eq!(phonetic_key(""), "");
        assert_eq!(phonetic_key("123"), "");
    }

    #[test]
    fn doubled_letters_collapse() {
        assert_eq!(phonetic_key("summer"), phonetic_key("sumer"));
    }
}
