//! `%` patterns as used by `patsubst`, `filter`, pattern rules and
//! substitution references.

#[derive(Clone, PartialEq, Eq)]
#[cfg_attr(any(test, feature = "dbg"), derive(Debug))]
enum Piece {
    Lit(String),
    Wild,
}

/// Tokenizes a pattern. `\%` is a literal percent, `\\` a literal backslash.
fn pieces(pattern: &str) -> Vec::<Piece> {
    let mut out = Vec::new();
    let mut lit = String::new();
    let mut chars = pattern.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '\\' if matches!(chars.peek(), Some('%') | Some('\\')) => {
                if let Some(next) = chars.next() { lit.push(next) }
            }
            '%' => {
                if !lit.is_empty() { out.push(Piece::Lit(std::mem::take(&mut lit))) }
                out.push(Piece::Wild)
            }
            _ => lit.push(c)
        }
    }
    if !lit.is_empty() { out.push(Piece::Lit(lit)) }
    out
}

fn match_pieces(pieces: &[Piece], word: &str) -> bool {
    match pieces.split_first() {
        None => word.is_empty(),
        Some((Piece::Lit(lit), rest)) => word.strip_prefix(lit.as_str()).map_or(false, |w| match_pieces(rest, w)),
        Some((Piece::Wild, rest)) => {
            if rest.is_empty() { return true }
            word.char_indices().map(|(i, _)| i).chain(std::iter::once(word.len())).any(|i| match_pieces(rest, &word[i..]))
        }
    }
}

/// Whether `word` matches `pattern`. A pattern without `%` must match exactly.
#[inline]
pub fn matches(pattern: &str, word: &str) -> bool {
    match_pieces(&pieces(pattern), word)
}

/// Splits a pattern at its first unescaped `%` into unescaped prefix and suffix.
fn split_pattern(pattern: &str) -> Option::<(String, String)> {
    let mut prefix = String::new();
    let mut chars = pattern.char_indices().peekable();
    while let Some((i, c)) = chars.next() {
        match c {
            '\\' if matches!(chars.peek(), Some((_, '%')) | Some((_, '\\'))) => {
                if let Some((_, next)) = chars.next() { prefix.push(next) }
            }
            '%' => return Some((prefix, unescape(&pattern[i + 1..]))),
            _ => prefix.push(c)
        }
    }
    None
}

fn unescape(s: &str) -> String {
    s.replace("\\%", "%")
}

/// The text matched by `%`, or `None` when `word` doesn't fit the pattern.
pub fn match_stem<'a>(pattern: &str, word: &'a str) -> Option::<&'a str> {
    let (prefix, suffix) = split_pattern(pattern)?;
    if word.len() < prefix.len() + suffix.len() { return None }
    let stem = word.strip_prefix(prefix.as_str())?.strip_suffix(suffix.as_str())?;
    Some(stem)
}

/// Replaces the first unescaped `%` of `template` with `stem`.
pub fn subst_stem(template: &str, stem: &str) -> String {
    match split_pattern(template) {
        Some((prefix, suffix)) => format!("{prefix}{stem}{suffix}"),
        None => unescape(template)
    }
}

/// One word through `$(patsubst)`.
pub fn patsubst_word<'a>(word: &'a str, from: &str, to: &str) -> std::borrow::Cow::<'a, str> {
    if !from.contains('%') {
        return if word == unescape(from) { subst_stem(to, "").into() } else { word.into() }
    }
    match match_stem(from, word) {
        Some(stem) => subst_stem(to, stem).into(),
        None => word.into()
    }
}

/// `$(VAR:from=to)`. Without a `%` in `from` it means `%from=%to`.
pub fn subst_ref(value: &str, from: &str, to: &str) -> String {
    let (from, to) = if from.contains('%') {
        (from.to_owned(), to.to_owned())
    } else {
        (format!("%{from}"), format!("%{to}"))
    };
    crate::text::words(value).map(|w| patsubst_word(w, &from, &to)).collect::<Vec<_>>().join(" ")
}

/// Matches a rule target pattern against a file name. A pattern without a
/// slash matches only the last component and the directory becomes part of
/// the stem. Returns the stem and the directory prefix.
pub fn target_stem<'a>(pattern: &str, name: &'a str) -> Option::<(String, &'a str)> {
    if pattern.contains('/') {
        return match_stem(pattern, name).map(|s| (s.to_owned(), ""))
    }
    let (dir, file) = match name.rfind('/') {
        Some(i) => name.split_at(i + 1),
        None => ("", name)
    };
    match_stem(pattern, file).map(|s| (format!("{dir}{s}"), dir))
}

/// Instantiates a prerequisite template for a stem found by [`target_stem`].
pub fn instantiate(template: &str, stem: &str, dir: &str) -> String {
    if !template.contains('%') {
        return template.to_owned()
    }
    if dir.is_empty() || template.contains('/') {
        return subst_stem(template, stem)
    }
    let base = &stem[dir.len().min(stem.len())..];
    format!("{dir}{}", subst_stem(template, base))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wildcard_matching() {
        assert!(matches("%.c", "foo.c"));
        assert!(!matches("%.c", "foo.h"));
        assert!(matches("a%b%c", "aXbYbc"));
        assert!(matches("foo", "foo"));
        assert!(!matches("foo", "foobar"));
        assert!(matches("100\\%", "100%"));
        assert!(!matches("100\\%", "1000"));
    }

    #[test]
    fn stems() {
        assert_eq!(match_stem("%.o", "src/a.o"), Some("src/a"));
        assert_eq!(match_stem("lib%.a", "libm.a"), Some("m"));
        assert_eq!(match_stem("lib%.a", "lib.a"), Some(""));
        assert_eq!(match_stem("x%x", "x"), None);
    }

    #[test]
    fn patsubst_words() {
        assert_eq!(patsubst_word("a.c", "%.c", "%.o"), "a.o");
        assert_eq!(patsubst_word("a.h", "%.c", "%.o"), "a.h");
        assert_eq!(patsubst_word("a.c", "a.c", "b"), "b");
    }

    #[test]
    fn substitution_reference() {
        assert_eq!(subst_ref("a.c b.c c.h", ".c", ".o"), "a.o b.o c.h");
        assert_eq!(subst_ref("x.c", "%.c", "obj/%.o"), "obj/x.o");
    }

    #[test]
    fn directory_stems() {
        let (stem, dir) = target_stem("%.o", "src/foo.o").unwrap();
        assert_eq!((stem.as_str(), dir), ("src/foo", "src/"));
        assert_eq!(instantiate("%.c", &stem, dir), "src/foo.c");

        let (stem, dir) = target_stem("lib%.a", "out/libz.a").unwrap();
        assert_eq!((stem.as_str(), dir), ("out/z", "out/"));
        assert_eq!(instantiate("%.c", &stem, dir), "out/z.c");

        assert_eq!(target_stem("src/%.o", "lib/foo.o"), None);
    }
}
