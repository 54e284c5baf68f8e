//! LaTeX field escaping.
//!
//! Each input character is classified once and emitted once: the backslashes
//! and braces written for one reserved character are never re-scanned.

use std::borrow::Cow;

/// Characters with special meaning in LaTeX body text.
pub const RESERVED: [char; 9] = ['&', '%', '$', '#', '_', '{', '}', '~', '^'];

fn replacement(c: char) -> Option<&'static str> {
    match c {
        '&' => Some(r"\&"),
        '%' => Some(r"\%"),
        '$' => Some(r"\$"),
        '#' => Some(r"\#"),
        '_' => Some(r"\_"),
        '{' => Some(r"\{"),
        '}' => Some(r"\}"),
        '~' => Some(r"\textasciitilde{}"),
        '^' => Some(r"\textasciicircum{}"),
        _ => None,
    }
}

/// Escapes reserved characters for safe inclusion in LaTeX body text.
/// Borrows the input unchanged when it contains no reserved character.
pub fn escape_latex(input: &str) -> Cow<'_, str> {
    let Some(first) = input.find(&RESERVED[..]) else {
        return Cow::Borrowed(input);
    };

    let mut out = String::with_capacity(input.len() + 16);
    out.push_str(&input[..first]);
    for c in input[first..].chars() {
        match replacement(c) {
            Some(escaped) => out.push_str(escaped),
            None => out.push(c),
        }
    }
    Cow::Owned(out)
}
