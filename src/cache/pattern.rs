//! Glob patterns
//!
//! The Redis `MATCH` dialect: `*` any run, `?` any single character,
//! `[abc]`, `[^abc]` and `[a-z]` classes, and `\x` for a literal `x`. The
//! in-memory backend compiles patterns with [`glob_to_regex`] so both
//! backends agree on what a pattern reaches.

use std::str::Chars;

use regex::Regex;

use crate::error::{CacheError, Result};

/// Characters with a meaning in a glob.
const GLOB_SPECIALS: [char; 5] = ['\\', '*', '?', '[', ']'];

/// Compiles a glob into an anchored regex.
pub fn glob_to_regex(pattern: &str) -> Result<Regex> {
    let mut body = String::with_capacity(pattern.len() * 2);
    let mut chars = pattern.chars();

    while let Some(c) = chars.next() {
        match c {
            '*' => body.push_str(".*"),
            '?' => body.push('.'),
            // A trailing backslash stands for itself
            '\\' => push_literal(&mut body, chars.next().unwrap_or('\\')),
            '[' => match char_class(&mut chars) {
                Some(class) => body.push_str(&class),
                None => push_literal(&mut body, '['),
            },
            other => push_literal(&mut body, other),
        }
    }

    Regex::new(&format!("(?s)^{}$", body))
        .map_err(|e| CacheError::InvalidRequest(format!("invalid key pattern '{}': {}", pattern, e)))
}

/// Escapes `text` so it matches only itself inside a glob.
pub fn escape_glob(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        if GLOB_SPECIALS.contains(&c) {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// One-shot match; compile with [`glob_to_regex`] when testing many keys.
#[cfg(test)]
pub(crate) fn glob_matches(pattern: &str, key: &str) -> bool {
    glob_to_regex(pattern)
        .map(|re| re.is_match(key))
        .unwrap_or(false)
}

fn push_literal(body: &mut String, c: char) {
    let mut buf = [0u8; 4];
    body.push_str(&regex::escape(c.encode_utf8(&mut buf)));
}

/// Translates the class following a `[`, consuming it only when the
/// closing `]` exists. Empty and unterminated classes read as a literal `[`.
fn char_class(chars: &mut Chars<'_>) -> Option<String> {
    let mut ahead = chars.clone();
    let mut class = String::from("[");
    let mut members = 0;

    if ahead.as_str().starts_with('^') {
        ahead.next();
        class.push('^');
    }
    loop {
        match ahead.next()? {
            ']' if members > 0 => break,
            ']' => return None,
            '-' if members > 0 && !ahead.as_str().starts_with(']') => class.push('-'),
            '\\' => push_literal(&mut class, ahead.next()?),
            other => push_literal(&mut class, other),
        }
        members += 1;
    }

    class.push(']');
    *chars = ahead;
    Some(class)
}
