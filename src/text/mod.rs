//! # Text Layout
//!
//! Greedy word wrapping against a width-measurement capability, plus the
//! transliteration pass that keeps content inside WinAnsi.
//!
//! The wrap is deliberately simple: paragraphs split on hard line breaks,
//! words split on single spaces, no hyphenation, no mid-word breaks. A word
//! wider than the whole line is placed alone and allowed to overflow. For a
//! fixed metrics snapshot the result is fully deterministic.

/// Break `text` into lines whose measured width fits `max_width`.
///
/// `measure(text, size)` must return the rendered width of `text` at font
/// size `size` in the same units as `max_width`. An empty paragraph (the
/// text between two consecutive line breaks) yields exactly one empty line,
/// preserving blank-line spacing in the rendered output.
pub fn wrap_text(
    text: &str,
    measure: impl Fn(&str, f64) -> f64,
    font_size: f64,
    max_width: f64,
) -> Vec<String> {
    let mut lines = Vec::new();

    for paragraph in text.split('\n') {
        if paragraph.trim().is_empty() {
            lines.push(String::new());
            continue;
        }

        let mut current = String::new();
        for word in paragraph.split(' ') {
            let candidate = if current.is_empty() {
                word.to_string()
            } else {
                format!("{} {}", current, word)
            };
            if measure(&candidate, font_size) > max_width && !current.is_empty() {
                lines.push(current);
                current = word.to_string();
            } else {
                current = candidate;
            }
        }
        if !current.is_empty() {
            lines.push(current);
        }
    }

    lines
}

/// Replace typographic punctuation with WinAnsi-safe equivalents.
///
/// The standard faces are written with WinAnsiEncoding; em dashes, curly
/// quotes and the ellipsis arrive routinely from pasted client data and
/// would otherwise render as fallback glyphs.
pub fn clean_text(text: &str) -> String {
    text.chars()
        .flat_map(|ch| match ch {
            '\u{2014}' | '\u{2013}' => vec!['-'],
            '\u{2018}' | '\u{2019}' => vec!['\''],
            '\u{201C}' | '\u{201D}' => vec!['"'],
            '\u{2026}' => vec!['.', '.', '.'],
            other => vec![other],
        })
        .collect()
}
