// Quality heuristics deciding whether an engine's output ends the chain
use once_cell::sync::Lazy;
use regex::Regex;

static MULTI_SPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[ \t]+").expect("valid regex"));
static MANY_BLANK_LINES: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n{3,}").expect("valid regex"));

/// Score extracted text 0.0-1.0 from a handful of cheap checks.
pub fn quality_score(text: &str) -> f32 {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return 0.0;
    }

    let checks = [
        trimmed.len() > 10,
        trimmed.contains(". ") || trimmed.contains(".\n"),
        !is_mostly_gibberish(trimmed),
        has_dictionary_words(trimmed),
        has_reasonable_whitespace(trimmed),
    ];

    let passed = checks.iter().filter(|&&x| x).count() as f32;
    passed / checks.len() as f32
}

/// A result is sufficient when it is non-empty, long enough, and scores
/// above the configured floor. Sufficiency ends the fallback chain.
pub fn is_sufficient(text: &str, min_length: usize, quality_floor: f32) -> bool {
    let trimmed = text.trim();
    trimmed.len() >= min_length && quality_score(trimmed) >= quality_floor
}

/// Normalize extracted text: collapse runs of spaces/tabs, strip control
/// characters, squeeze long blank-line runs. Layout (line breaks) is kept.
pub fn clean_text(text: &str) -> String {
    let filtered: String = text
        .chars()
        .filter(|c| !c.is_control() || *c == '\n' || *c == '\t')
        .collect();
    let collapsed = MULTI_SPACE.replace_all(&filtered, " ");
    let squeezed = MANY_BLANK_LINES.replace_all(&collapsed, "\n\n");
    let lines: Vec<&str> = squeezed.lines().map(|l| l.trim_end()).collect();
    lines.join("\n").trim().to_string()
}

fn is_mostly_gibberish(text: &str) -> bool {
    let alpha_count = text.chars().filter(|c| c.is_alphabetic()).count();
    if alpha_count == 0 {
        return true;
    }
    let vowel_count = text.chars().filter(|c| "aeiouAEIOU".contains(*c)).count();
    let vowel_ratio = vowel_count as f32 / alpha_count as f32;
    !(0.1..=0.8).contains(&vowel_ratio)
}

fn has_dictionary_words(text: &str) -> bool {
    let words: Vec<&str> = text.split_whitespace().collect();
    if words.is_empty() {
        return false;
    }

    let valid_words = words
        .iter()
        .filter(|w| w.len() >= 2 && w.len() <= 20)
        .filter(|w| {
            let alpha_ratio = w.chars().filter(|c| c.is_alphabetic()).count() as f32 / w.len() as f32;
            alpha_ratio > 0.7
        })
        .count();

    valid_words as f32 / words.len() as f32 > 0.5
}

fn has_reasonable_whitespace(text: &str) -> bool {
    let whitespace_count = text.chars().filter(|c| c.is_whitespace()).count();
    let ratio = whitespace_count as f32 / text.len() as f32;
    ratio > 0.02 && ratio < 0.5
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scores_prose_high_and_noise_low() {
        assert!(quality_score("This is a normal sentence. It has good structure and words.") > 0.7);
        assert!(quality_score("xvqpz kljfd qwrtk zzzpq") < 0.7);
        assert_eq!(quality_score(""), 0.0);
        assert_eq!(quality_score("   \n  "), 0.0);
    }

    #[test]
    fn sufficiency_needs_length_and_quality() {
        let prose = "The quick brown fox jumps over the lazy dog. It does so every day.";
        assert!(is_sufficient(prose, 50, 0.4));
        assert!(!is_sufficient(prose, 500, 0.4));
        assert!(!is_sufficient("ok", 50, 0.4));
        // Long but junk
        let junk = "zzqx ".repeat(40);
        assert!(!is_sufficient(&junk, 50, 0.8));
    }

    #[test]
    fn clean_text_collapses_whitespace_but_keeps_lines() {
        let raw = "First   line\t\tend   \n\n\n\n\nSecond line\u{0}";
        let cleaned = clean_text(raw);
        assert_eq!(cleaned, "First line end\n\nSecond line");
    }
}
