//! Name normalization for display and for cache file keys.

use unicode_normalization::UnicodeNormalization;

const PLACEHOLDER: &str = "?";

fn is_display_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, ' ' | '-' | '.' | '_' | '(' | ')' | '[' | ']')
}

/// Reduces `text` to printable ASCII from a restricted set.
///
/// Accented letters lose their diacritics, other non-ASCII characters are
/// dropped. Decomposition itself cannot fail; when nothing of a non-empty
/// input survives (an all-CJK title, say) the result is `"?"` so the name
/// never renders as blank.
pub fn sanitize(text: &str) -> String {
    let out: String = text
        .nfkd()
        .filter(char::is_ascii)
        .filter(|c| is_display_char(*c))
        .collect();
    if out.is_empty() && !text.is_empty() {
        return PLACEHOLDER.to_string();
    }
    out
}

/// Filesystem-safe key: every non-alphanumeric character becomes `_`.
pub fn cache_key(text: &str) -> String {
    text.chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect()
}

/// Percent-decodes `raw`, falling back to the raw text when it is not valid UTF-8.
pub fn percent_decode(raw: &str) -> String {
    urlencoding::decode(raw)
        .map(|decoded| decoded.into_owned())
        .unwrap_or_else(|_| raw.to_string())
}

/// Last path segment of the decoded name.
pub fn basename(raw: &str) -> String {
    let decoded = percent_decode(raw);
    decoded.rsplit('/').next().unwrap_or_default().to_string()
}

/// Human-readable entry name: decoded basename, sanitized.
pub fn display_name(raw: &str) -> String {
    sanitize(&basename(raw))
}

pub fn format_size(bytes: Option<u64>) -> String {
    const KB: f64 = 1024.0;
    const MB: f64 = KB * 1024.0;
    const GB: f64 = MB * 1024.0;

    let Some(bytes) = bytes.filter(|b| *b > 0) else {
        return "0B".to_string();
    };
    let s = bytes as f64;
    if s > GB {
        format!("{:.1}GB", s / GB)
    } else if s > MB {
        format!("{:.1}MB", s / MB)
    } else if s > KB {
        format!("{:.0}KB", s / KB)
    } else {
        format!("{bytes}B")
    }
}
