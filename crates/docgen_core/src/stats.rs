//! crates/docgen_core/src/stats.rs
//!
//! Statistics derived from generated text after a task completes.

use crate::domain::TaskStatistics;
use crate::prompts::{CHART_MARKER_EN, CHART_MARKER_ZH, FORMULA_MARKER_EN, FORMULA_MARKER_ZH};

const MARKERS: [&str; 4] = [CHART_MARKER_ZH, CHART_MARKER_EN, FORMULA_MARKER_ZH, FORMULA_MARKER_EN];

pub fn compute_statistics(text: &str) -> TaskStatistics {
    TaskStatistics {
        word_count: count_words(text),
        charts_count: count_occurrences(text, &[CHART_MARKER_ZH, CHART_MARKER_EN]),
        formulas_count: count_occurrences(text, &[FORMULA_MARKER_ZH, FORMULA_MARKER_EN]),
    }
}

/// Each CJK ideograph is one word; other text is split on whitespace and
/// punctuation, and a run counts when it holds at least one letter or digit.
/// Chart and formula markers are placeholders, not prose, and count as nothing.
pub fn count_words(text: &str) -> u32 {
    let mut prose = text.to_string();
    for marker in MARKERS {
        prose = prose.replace(marker, " ");
    }

    let mut count = 0u32;
    let mut in_token = false;
    let mut token_has_alnum = false;

    for c in prose.chars() {
        if is_cjk_ideograph(c) || c.is_whitespace() || is_cjk_punctuation(c) {
            if in_token && token_has_alnum {
                count += 1;
            }
            in_token = false;
            token_has_alnum = false;
            if is_cjk_ideograph(c) {
                count += 1;
            }
        } else {
            in_token = true;
            token_has_alnum |= c.is_alphanumeric();
        }
    }
    if in_token && token_has_alnum {
        count += 1;
    }
    count
}

fn count_occurrences(text: &str, markers: &[&str]) -> u32 {
    markers.iter().map(|m| text.matches(m).count() as u32).sum()
}

fn is_cjk_ideograph(c: char) -> bool {
    matches!(c,
        '\u{4E00}'..='\u{9FFF}'
        | '\u{3400}'..='\u{4DBF}'
        | '\u{F900}'..='\u{FAFF}'
        | '\u{20000}'..='\u{2A6DF}')
}

fn is_cjk_punctuation(c: char) -> bool {
    matches!(c,
        '\u{3000}'..='\u{303F}'
        | '，' | '：' | '；' | '！' | '？' | '（' | '）' | '“' | '”' | '‘' | '’' | '…')
}
