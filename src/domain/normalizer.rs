//! Plain-text normalization for streamed provider output.
//!
//! Providers answer in loosely formatted markdown with citation markers.
//! [`normalize`] strips that formatting from one fragment at a time while
//! keeping list markers, line breaks and any non-ASCII text intact.
//!
//! Each fragment is cleaned on its own. A marker that is split across two
//! fragments (`**bo` + `ld**`) is left in place.

use once_cell::sync::Lazy;
use regex::Regex;
use std::borrow::Cow;

/// Markup and citation rules, applied in order.
static MARKUP_RULES: Lazy<Vec<(Regex, &'static str)>> = Lazy::new(|| {
    [
        // Citation markers: "[1]", "[23]"
        (r"\[\d+\]", ""),
        // Bold: "**text**"
        (r"\*\*([^*\n]+?)\*\*", "${1}"),
        // Italic: "*text*", not "2 * 3 * 4"
        (r"\*([^*\s](?:[^*\n]*?[^*\s])?)\*", "${1}"),
        // Italic: "_text_", not "snake_case_name"
        (r"\b_([^_\s](?:[^_\n]*?[^_\s])?)_\b", "${1}"),
        // Headings: "## Title"
        (r"(?m)^#{1,6}[ \t]+", ""),
        // Blockquotes: "> quoted"
        (r"(?m)^>[ \t]+", ""),
        // Inline code: "`code`"
        (r"`([^`\n]+)`", "${1}"),
        // Emphasis tags: "<b>", "</strong>"
        (r"(?i)</?(?:b|i|strong|em)>", ""),
        // Parenthetical references: "(1)"
        (r"\(\d+\)", ""),
        // Citation preambles
        (r"(?i)\b(?:footnote \d+|source|reference|according to): ", ""),
    ]
    .into_iter()
    .map(|(pattern, replacement)| (compile(pattern), replacement))
    .collect()
});

/// Whitespace rules, applied after typography is normalized.
static SPACING_RULES: Lazy<Vec<(Regex, &'static str)>> = Lazy::new(|| {
    [
        // Runs of spaces; newlines are untouched
        (r" {2,}", " "),
        // Space before "." or ","
        (r" ([.,])", "${1}"),
    ]
    .into_iter()
    .map(|(pattern, replacement)| (compile(pattern), replacement))
    .collect()
});

fn compile(pattern: &str) -> Regex {
    Regex::new(pattern).unwrap()
}

/// Strips markdown and citation artifacts from one fragment.
pub fn normalize(fragment: &str) -> String {
    if fragment.is_empty() {
        return String::new();
    }

    let text = apply(&MARKUP_RULES, fragment.to_string());
    let text: String = text.chars().map(plain_punctuation).collect();
    apply(&SPACING_RULES, text)
}

fn apply(rules: &[(Regex, &'static str)], mut text: String) -> String {
    for (pattern, replacement) in rules {
        if let Cow::Owned(replaced) = pattern.replace_all(&text, *replacement) {
            text = replaced;
        }
    }
    text
}

/// Maps typographic quotes and dashes to ASCII.
fn plain_punctuation(c: char) -> char {
    match c {
        '\u{201C}' | '\u{201D}' | '\u{201E}' | '\u{201F}' => '"',
        '\u{2018}' | '\u{2019}' | '\u{201A}' | '\u{201B}' => '\'',
        '\u{2012}' | '\u{2013}' | '\u{2014}' | '\u{2015}' => '-',
        other => other,
    }
}
