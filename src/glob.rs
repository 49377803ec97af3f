//! Shell-style wildcards for `$(wildcard)`.

use std::cell::Cell;
use std::path::Path;

/// Bounds backtracking work for patterns like `*a*a*a*`.
const MAX_MATCH_CALLS: usize = 100_000;

#[inline]
pub fn contains_glob(s: &str) -> bool {
    s.contains(['*', '?', '['])
}

/// Whether `name` matches `pattern` in full.
pub fn glob_match(pattern: &str, name: &str) -> bool {
    let pattern = pattern.chars().collect::<Vec<_>>();
    let name = name.chars().collect::<Vec<_>>();
    match_bounded(&pattern, 0, &name, 0, &Cell::new(0))
}

fn match_bounded(pattern: &[char], pi: usize, input: &[char], ii: usize, calls: &Cell::<usize>) -> bool {
    calls.set(calls.get() + 1);
    if calls.get() > MAX_MATCH_CALLS { return false }

    let Some(&p) = pattern.get(pi) else { return ii >= input.len() };
    match p {
        '*' => {
            let mut next = pi;
            while pattern.get(next) == Some(&'*') { next += 1 }
            if next >= pattern.len() { return true }
            (ii..=input.len()).any(|skip| match_bounded(pattern, next, input, skip, calls))
        }
        '?' => ii < input.len() && match_bounded(pattern, pi + 1, input, ii + 1, calls),
        '[' => {
            let Some(&c) = input.get(ii) else { return false };
            match match_class(pattern, pi + 1, c) {
                Some((true, end)) => match_bounded(pattern, end, input, ii + 1, calls),
                Some((false, _)) => false,
                // Unterminated class, `[` is literal.
                None => c == '[' && match_bounded(pattern, pi + 1, input, ii + 1, calls)
            }
        }
        '\\' if pi + 1 < pattern.len() => {
            input.get(ii) == Some(&pattern[pi + 1]) && match_bounded(pattern, pi + 2, input, ii + 1, calls)
        }
        _ => input.get(ii) == Some(&p) && match_bounded(pattern, pi + 1, input, ii + 1, calls)
    }
}

/// Returns whether `c` is in the class starting at `start` and the index
/// just past its closing bracket.
fn match_class(pattern: &[char], start: usize, c: char) -> Option::<(bool, usize)> {
    let mut i = start;
    let negated = matches!(pattern.get(i), Some('!') | Some('^'));
    if negated { i += 1 }
    let mut matched = false;
    let mut first = true;
    while i < pattern.len() {
        let lo = pattern[i];
        if lo == ']' && !first {
            return Some((matched != negated, i + 1))
        }
        first = false;
        if pattern.get(i + 1) == Some(&'-') && pattern.get(i + 2).map_or(false, |&hi| hi != ']') {
            let hi = pattern[i + 2];
            if lo <= c && c <= hi { matched = true }
            i += 3
        } else {
            if lo == c { matched = true }
            i += 1
        }
    }
    None
}

fn join(dir: &str, name: &str) -> String {
    match dir {
        "" => name.to_owned(),
        d if d.ends_with('/') => format!("{d}{name}"),
        d => format!("{d}/{name}")
    }
}

/// Expands one wildcard pattern against the file system. Results are sorted
/// and only name existing paths; a pattern without magic characters yields
/// itself when the file exists.
pub fn expand(pattern: &str) -> Vec::<String> {
    if !contains_glob(pattern) {
        return if Path::new(pattern).symlink_metadata().is_ok() { vec![pattern.to_owned()] } else { Vec::new() }
    }

    let (mut candidates, rest) = match pattern.strip_prefix('/') {
        Some(rest) => (vec!["/".to_owned()], rest),
        None => (vec![String::new()], pattern)
    };

    let segments = rest.split('/').collect::<Vec<_>>();
    for (i, segment) in segments.iter().enumerate() {
        let last = i + 1 == segments.len();
        if segment.is_empty() {
            if last {
                candidates = candidates.into_iter().filter(|c| Path::new(c).is_dir()).map(|c| format!("{}/", c.trim_end_matches('/'))).collect()
            }
            continue
        }
        if !contains_glob(segment) {
            candidates = candidates.iter().map(|c| join(c, segment)).collect();
            continue
        }

        let mut next = Vec::new();
        for dir in &candidates {
            let Ok(entries) = std::fs::read_dir(if dir.is_empty() { "." } else { dir.as_str() }) else { continue };
            let mut names = entries.filter_map(|e| e.ok()).filter_map(|e| e.file_name().into_string().ok()).filter(|name| {
                (!name.starts_with('.') || segment.starts_with('.')) && glob_match(segment, name)
            }).collect::<Vec<_>>();
            names.sort();
            next.extend(names.into_iter().map(|name| join(dir, &name)));
        }
        candidates = next
    }

    let mut found = candidates.into_iter().filter(|c| Path::new(c).symlink_metadata().is_ok()).collect::<Vec<_>>();
    found.sort();
    found
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matching() {
        assert!(glob_match("*.c", "main.c"));
        assert!(!glob_match("*.c", "main.h"));
        assert!(glob_match("t?st", "test"));
        assert!(glob_match("[a-c]x", "bx"));
        assert!(!glob_match("[!a-c]x", "bx"));
        assert!(glob_match("[]]", "]"));
        assert!(glob_match("\\*", "*"));
    }

    #[test]
    fn adversarial_pattern_terminates() {
        let pattern = "*a".repeat(30);
        assert!(!glob_match(&pattern, &"a".repeat(29)));
    }

    #[test]
    fn expands_against_directory() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["b.c", "a.c", "c.h", ".hidden.c"] {
            std::fs::write(dir.path().join(name), "").unwrap();
        }
        let base = dir.path().to_str().unwrap();
        let found = expand(&format!("{base}/*.c"));
        assert_eq!(found, vec![format!("{base}/a.c"), format!("{base}/b.c")]);
        assert!(expand(&format!("{base}/*.o")).is_empty());
        assert_eq!(expand(&format!("{base}/c.h")), vec![format!("{base}/c.h")]);
    }
}
