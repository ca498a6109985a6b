use regex::Regex;
use tracing::debug;

use dicta_foundation::Mode;

/// Shape the accumulated response into the delivered artifact.
///
/// Proofread output is contractually a bulleted list; the first bullet
/// block is extracted and continuation lines are folded into their bullet.
/// When the model ignored the contract the trimmed text passes through
/// unchanged. Letter output is delivered as written.
pub fn finalize_artifact(mode: Mode, response: &str) -> String {
    match mode {
        Mode::Proofread => extract_bullet_block(response),
        Mode::Letter | Mode::Dictate => response.trim().to_string(),
    }
}

fn extract_bullet_block(response: &str) -> String {
    let bullet = Regex::new(r"^\s*[-*•]\s+").unwrap();
    let mut bullets: Vec<String> = Vec::new();
    let mut in_block = false;

    for line in response.lines() {
        if bullet.is_match(line) {
            let cleaned = bullet.replace(line, "").trim().to_string();
            if !cleaned.is_empty() {
                bullets.push(cleaned);
                in_block = true;
            }
        } else if in_block && !line.trim().is_empty() {
            // Continuation of the previous bullet.
            if let Some(last) = bullets.last_mut() {
                last.push(' ');
                last.push_str(line.trim());
            }
        } else if in_block {
            // Blank line ends the first bullet block.
            break;
        }
    }

    if bullets.is_empty() {
        debug!("proofread output had no bullet list, passing through");
        return response.trim().to_string();
    }

    bullets
        .iter()
        .map(|b| format!("- {b}"))
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn proofread_extracts_bullets() {
        let text = "- Patient complained of fever.\n- Chills for 3 days.\n";
        assert_eq!(
            finalize_artifact(Mode::Proofread, text),
            "- Patient complained of fever.\n- Chills for 3 days."
        );
    }

    #[test]
    fn alternative_bullet_markers_are_normalised() {
        let text = "* First point\n• Second point";
        assert_eq!(
            finalize_artifact(Mode::Proofread, text),
            "- First point\n- Second point"
        );
    }

    #[test]
    fn continuation_lines_fold_into_bullet() {
        let text = "- A sentence that\n  continues here.\n- Next.";
        assert_eq!(
            finalize_artifact(Mode::Proofread, text),
            "- A sentence that continues here.\n- Next."
        );
    }

    #[test]
    fn only_first_block_is_kept() {
        let text = "- One.\n- Two.\n\nTrailing commentary.\n- Stray bullet.";
        assert_eq!(finalize_artifact(Mode::Proofread, text), "- One.\n- Two.");
    }

    #[test]
    fn leading_prose_before_bullets_is_dropped() {
        let text = "Here are the corrections:\n- Fixed.";
        assert_eq!(finalize_artifact(Mode::Proofread, text), "- Fixed.");
    }

    #[test]
    fn no_bullets_passes_through_trimmed() {
        let text = "  The corrected sentence.  ";
        assert_eq!(
            finalize_artifact(Mode::Proofread, text),
            "The corrected sentence."
        );
    }

    #[test]
    fn letter_mode_trims_only() {
        let text = "\nDear Dr. Smith,\n\nBody of the letter.\n";
        assert_eq!(
            finalize_artifact(Mode::Letter, text),
            "Dear Dr. Smith,\n\nBody of the letter."
        );
    }
}
