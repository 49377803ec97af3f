//! Word splitting and reference-aware scanning over makefile text.

use crate::consts::syntax::{COMMENT, LINE_ESCAPE};

#[inline(always)]
pub fn is_ws(c: char) -> bool {
    matches!(c, ' ' | '\t' | '\n' | '\r' | '\x0b' | '\x0c')
}

#[inline]
pub fn words(s: &str) -> impl Iterator::<Item = &str> {
    s.split(is_ws).filter(|w| !w.is_empty())
}

#[inline]
pub fn split_ws(s: &str) -> Vec::<&str> {
    words(s).collect()
}

/// Collapses runs of whitespace into single spaces and trims both ends.
#[inline]
pub fn strip_ws(s: &str) -> String {
    split_ws(s).join(" ")
}

#[inline]
pub fn trim_blanks(s: &str) -> &str {
    s.trim_matches([' ', '\t'])
}

/// Finds `ch` outside of `$(...)` and `${...}` references.
pub fn find_top_level(s: &str, ch: u8) -> Option::<usize> {
    let bytes = s.as_bytes();
    let mut closers = Vec::<u8>::new();
    let mut i = 0;
    while i < bytes.len() {
        let b = bytes[i];
        if b == b'$' && i + 1 < bytes.len() {
            match bytes[i + 1] {
                b'(' => { closers.push(b')'); i += 2; continue }
                b'{' => { closers.push(b'}'); i += 2; continue }
                _ => { i += 2; continue }
            }
        }
        if let Some(&top) = closers.last() {
            if b == top { closers.pop(); }
        } else if b == ch {
            return Some(i)
        }
        i += 1
    }
    None
}

/// Finds the first top-level blank, or `None`.
#[inline]
pub fn find_top_level_ws(s: &str) -> Option::<usize> {
    match (find_top_level(s, b' '), find_top_level(s, b'\t')) {
        (Some(a), Some(b)) => Some(a.min(b)),
        (a, b) => a.or(b)
    }
}

/// Splits function arguments on top-level commas, producing at most `max`
/// pieces. Commas nested in references or parentheses do not split.
pub fn split_args(s: &str, max: usize) -> Vec::<&str> {
    let bytes = s.as_bytes();
    let mut out = Vec::new();
    let mut closers = Vec::<u8>::new();
    let mut start = 0;
    let mut i = 0;
    while i < bytes.len() {
        let b = bytes[i];
        match b {
            b'$' if i + 1 < bytes.len() && matches!(bytes[i + 1], b'(' | b'{') => {
                closers.push(if bytes[i + 1] == b'(' { b')' } else { b'}' });
                i += 2;
                continue
            }
            b'(' => closers.push(b')'),
            b')' | b'}' if closers.last() == Some(&b) => { closers.pop(); }
            b',' if closers.is_empty() && out.len() + 1 < max => {
                out.push(&s[start..i]);
                start = i + 1
            }
            _ => {}
        }
        i += 1
    }
    out.push(&s[start..]);
    out
}

#[inline]
pub fn split_args_all(s: &str) -> Vec::<&str> {
    split_args(s, usize::MAX)
}

/// Removes a `#` comment, honoring `\#` escapes and references.
pub fn strip_comment(s: &str) -> String {
    if !s.contains(COMMENT) {
        return s.to_owned()
    }
    let mut out = String::with_capacity(s.len());
    let mut closers = Vec::<char>::new();
    let mut chars = s.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            LINE_ESCAPE if chars.peek() == Some(&COMMENT) => {
                out.push(COMMENT);
                chars.next();
                continue
            }
            '$' if matches!(chars.peek(), Some('(') | Some('{')) => {
                let Some(open) = chars.next() else { break };
                closers.push(if open == '(' { ')' } else { '}' });
                out.push(c);
                out.push(open);
                continue
            }
            COMMENT if closers.is_empty() => break,
            _ => if closers.last() == Some(&c) { closers.pop(); }
        }
        out.push(c)
    }
    out
}

/// Whether the text ends in an odd number of backslashes.
#[inline]
pub fn ends_with_escape(s: &str) -> bool {
    s.chars().rev().take_while(|&c| c == LINE_ESCAPE).count() % 2 == 1
}
