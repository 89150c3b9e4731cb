//! Stateless helper utilities shared by the extraction engine.

use chrono::NaiveDateTime;
use unicode_normalization::UnicodeNormalization;

use crate::conf::{C_FILE_OUT_PREFIX, TUP_CROSS_GLYPHS};

////////////////////////////////////////////////////////////////////////////////
// #region ValueNormalization

/// Strip one pair of matching surrounding quotes (`'...'` or `"..."`) and trim.
fn strip_quote_pair(s: &str) -> Option<&str> {
    for c_quote in ['\'', '"'] {
        if s.chars().count() >= 2 && s.starts_with(c_quote) && s.ends_with(c_quote) {
            return Some(s[1..s.len() - 1].trim());
        }
    }
    None
}

/// Trim and strip one pair of surrounding quotes, as done for every source cell.
pub fn clean_cell_text(raw: &str) -> String {
    let c_trimmed = raw.trim();
    strip_quote_pair(c_trimmed).unwrap_or(c_trimmed).to_string()
}

/// Canonical form of a value for equality matching.
///
/// Idempotent: `normalize_for_match(&normalize_for_match(s)) == normalize_for_match(s)`.
pub fn normalize_for_match(raw: &str) -> String {
    let mut c_value = raw.trim();
    while let Some(c_inner) = strip_quote_pair(c_value) {
        c_value = c_inner;
    }

    let c_composed: String = c_value
        .nfkc()
        .filter(|chr| !TUP_CROSS_GLYPHS.contains(chr))
        .collect();
    let c_lower = c_composed
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase();

    let mut c_out = c_lower.as_str();
    while let Some(c_inner) = strip_quote_pair(c_out) {
        c_out = c_inner;
    }
    c_out.to_string()
}

/// Case-insensitive trimmed label equality used for header lookups.
pub fn is_same_label(a: &str, b: &str) -> bool {
    a.trim().to_lowercase() == b.trim().to_lowercase()
}

/// First header position whose label equals `label` case-insensitively.
pub fn find_header_idx(headers: &[String], label: &str) -> Option<usize> {
    headers.iter().position(|c_header| is_same_label(c_header, label))
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region TextLayout

/// Re-flow `s` into lines of at most `n_words` words.
pub fn wrap_every_n_words(s: &str, n_words: usize) -> String {
    if s.is_empty() || n_words == 0 {
        return s.to_string();
    }

    s.split_whitespace()
        .collect::<Vec<_>>()
        .chunks(n_words)
        .map(|l_words| l_words.join(" "))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Display width units of a cell text, line breaks counted as spaces.
pub fn estimate_text_width(s: &str) -> usize {
    s.replace('\n', " ").chars().count()
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region FileNaming

/// Reduce `name` to a portable ASCII file-name component.
pub fn sanitize_file_name(name: &str) -> String {
    let c_ascii: String = name.nfkd().filter(char::is_ascii).collect();
    let c_joined = c_ascii
        .replace(['/', '\\'], " ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("_");
    let c_kept: String = c_joined
        .chars()
        .filter(|chr| chr.is_ascii_alphanumeric() || matches!(chr, '_' | '.' | '-'))
        .collect();

    c_kept.trim_matches(|chr| chr == '.' || chr == '_').to_string()
}

/// Output workbook file name: `Formatki-{department}-{YYYYmmdd-HHMMSS}.xlsx`.
pub fn derive_output_file_name(department: &str, timestamp: NaiveDateTime) -> String {
    let mut c_department = sanitize_file_name(department);
    if c_department.is_empty() {
        c_department = "dept".to_string();
    }
    format!(
        "{C_FILE_OUT_PREFIX}-{c_department}-{}.xlsx",
        timestamp.format("%Y%m%d-%H%M%S")
    )
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
