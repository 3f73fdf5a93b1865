//! Text Cleaning
//!
//! Hosted models and encyclopedia extracts routinely return typographic
//! quotes, math glyphs and emoji. Everything that flows back into the agent
//! loop or the transcript is reduced to plain ASCII first.

use std::sync::LazyLock;

use regex::Regex;

static NON_ASCII: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^\x00-\x7F]+").expect("non-ASCII pattern is valid"));

/// Remove every run of non-ASCII characters.
///
/// Nothing is substituted in place of the removed run, so `"x²"` becomes
/// `"x"`. Applying it twice yields the same string as applying it once.
pub fn clean_text(text: &str) -> String {
    NON_ASCII.replace_all(text, "").into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strips_non_ascii() {
        let cleaned = clean_text("∫ sin(x) dx = −cos(x) + C ✅");
        assert_eq!(cleaned, " sin(x) dx = cos(x) + C ");
        assert!(cleaned.is_ascii());
    }

    #[test]
    fn test_ascii_is_unchanged() {
        let input = "Find the integral of sin(x)\n\tAnswer: -cos(x) + C";
        assert_eq!(clean_text(input), input);
    }

    #[test]
    fn test_idempotent() {
        for input in ["naïve café", "x² + y² = z²", "", "plain", "日本語 text"] {
            let once = clean_text(input);
            assert_eq!(clean_text(&once), once);
        }
    }

    #[test]
    fn test_only_non_ascii() {
        assert_eq!(clean_text("π≈"), "");
    }
}
