// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Text normalisation shared by the extractors and the model builder.

/// Display normalisation: CR/CRLF to LF, whitespace runs collapsed, empty
/// lines dropped. Idempotent.
pub fn normalize_detail_text(text: &str) -> String {
    text.replace("\r\n", "\n")
        .replace('\r', "\n")
        .lines()
        .map(|line| line.split_whitespace().collect::<Vec<_>>().join(" "))
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Comparison normalisation: lowercased, light punctuation stripped,
/// whitespace collapsed. Used for dedup and equivalence checks only.
pub fn normalize_compare_text(text: &str) -> String {
    let lowered = text.to_lowercase();
    let mut cleaned = String::with_capacity(lowered.len());
    for ch in lowered.chars() {
        match ch {
            '`' | '\'' => cleaned.push(' '),
            ',' | '.' | '"' | '!' | ';' | ':' | '(' | ')' => {}
            other => cleaned.push(other),
        }
    }
    cleaned.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Two texts are equivalent when their compare-normalised forms match or one
/// is a prefix of the other.
pub fn text_equivalent(a: &str, b: &str) -> bool {
    let a = normalize_compare_text(a);
    let b = normalize_compare_text(b);
    if a.is_empty() || b.is_empty() {
        return a == b;
    }
    a == b || a.starts_with(&b) || b.starts_with(&a)
}

/// First non-empty line after display normalisation.
pub fn first_meaningful_line(text: &str) -> String {
    normalize_detail_text(text).lines().next().unwrap_or_default().to_owned()
}

/// Truncate to `max` characters, ellipsis included.
pub fn trim_to_length(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_owned();
    }
    let kept: String = text.chars().take(max.saturating_sub(3)).collect();
    format!("{}...", kept.trim_end())
}

/// Join lines, dropping later duplicates under compare normalisation.
pub fn unique_joined<'a>(lines: impl IntoIterator<Item = &'a str>) -> String {
    let mut seen: Vec<String> = Vec::new();
    let mut out: Vec<&str> = Vec::new();
    for line in lines {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        let key = normalize_compare_text(trimmed);
        if seen.iter().any(|s| *s == key) {
            continue;
        }
        seen.push(key);
        out.push(trimmed);
    }
    out.join("\n")
}

#[cfg(test)]
#[path = "normalize_tests.rs"]
mod tests;
