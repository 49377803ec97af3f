use std::fs::File;
use std::path::{Component, Path, PathBuf};
use std::io::{self, Read, Error, ErrorKind};

use memmap2::Mmap;

/// Reads a makefile. `-` stands for standard input.
#[cfg_attr(feature = "dbg", track_caller)]
pub fn read_file<P>(path: P) -> io::Result::<String>
where
    P: AsRef::<Path>
{
    let path = path.as_ref();
    if path.as_os_str() == "-" {
        let mut content = String::new();
        io::stdin().read_to_string(&mut content)?;
        return Ok(content)
    }

    let file = File::open(path)?;
    if file.metadata()?.len() == 0 {
        return Ok(String::new())
    }

    let mmap = unsafe { Mmap::map(&file) }?;
    std::str::from_utf8(&mmap[..]).map(|s| s.to_owned()).map_err(|e| Error::new(ErrorKind::InvalidData, e))
}

/// `io::Error` text without the trailing ` (os error N)`.
pub fn strerror(e: &io::Error) -> String {
    let s = e.to_string();
    match s.find(" (os error") {
        Some(i) => s[..i].to_owned(),
        None => s
    }
}

#[inline]
pub fn path_exists(path: &str) -> bool {
    Path::new(path).symlink_metadata().is_ok()
}

/// `$(dir)` of a single word: everything up to and including the last slash.
#[inline]
pub fn dir_word(w: &str) -> &str {
    match w.rfind('/') {
        Some(i) => &w[..=i],
        None => "./"
    }
}

#[inline]
pub fn notdir_word(w: &str) -> &str {
    match w.rfind('/') {
        Some(i) => &w[i + 1..],
        None => w
    }
}

/// Suffix of the last path component, dot included.
#[inline]
pub fn suffix_word(w: &str) -> Option::<&str> {
    let base = notdir_word(w);
    base.rfind('.').map(|i| &base[i..])
}

#[inline]
pub fn basename_word(w: &str) -> &str {
    match suffix_word(w) {
        Some(suffix) => &w[..w.len() - suffix.len()],
        None => w
    }
}

/// Directory form used by `$(@D)` and friends.
pub fn dir_part(w: &str) -> &str {
    match w.rfind('/') {
        Some(0) => "/",
        Some(i) => &w[..i],
        None => "."
    }
}

/// Lexical absolute path: `.` and `..` are folded, symlinks are not resolved.
pub fn abspath(w: &str, cwd: &Path) -> String {
    let joined = if w.starts_with('/') { PathBuf::from(w) } else { cwd.join(w) };
    let mut out = Vec::<&str>::new();
    for c in joined.components() {
        match c {
            Component::Normal(s) => out.push(s.to_str().unwrap_or_default()),
            Component::ParentDir => { out.pop(); }
            _ => {}
        }
    }
    format!("/{}", out.join("/"))
}

#[inline]
pub fn realpath(w: &str) -> Option::<String> {
    std::fs::canonicalize(w).ok().map(|p| p.to_string_lossy().into_owned())
}

/// Drops leading `./` components.
pub fn normalize_path(mut t: &str) -> &str {
    while let Some(rest) = t.strip_prefix("./") {
        if rest.is_empty() { break }
        t = rest.trim_start_matches('/');
    }
    t
}

/// Flattens `{a}b` into `a/b`, turns `{}x` into `x`.
pub fn normalize_brace_path(t: &str) -> String {
    let Some(rest) = t.strip_prefix('{') else { return t.to_owned() };
    let Some(close) = rest.find('}') else { return t.to_owned() };
    let (inner, tail) = (&rest[..close], &rest[close + 1..]);
    if inner.is_empty() {
        return tail.to_owned()
    }
    if tail.is_empty() {
        return inner.to_owned()
    }
    format!("{}/{}", inner.trim_end_matches('/'), tail.trim_start_matches('/'))
}

#[inline]
pub fn normalize_target(t: &str) -> String {
    normalize_path(&normalize_brace_path(t)).to_owned()
}

/// The same file under its `./`-prefixed or bare spelling.
#[inline]
pub fn alt_name(name: &str) -> String {
    match name.strip_prefix("./") {
        Some(rest) => rest.to_owned(),
        None => format!("./{name}")
    }
}

#[derive(Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(any(test, feature = "dbg"), derive(Debug))]
pub struct Prefixes {
    pub silent: bool,
    pub ignore: bool,
    pub force: bool,
}

impl Prefixes {
    #[inline]
    pub fn merge(self, other: Self) -> Self {
        Self {
            silent: self.silent || other.silent,
            ignore: self.ignore || other.ignore,
            force: self.force || other.force,
        }
    }
}

/// Strips any mix of leading `@`, `-` and `+` together with surrounding blanks.
pub fn strip_cmd_prefixes(s: &str) -> (Prefixes, &str) {
    let mut prefixes = Prefixes::default();
    let mut rest = s.trim_start_matches([' ', '\t']);
    loop {
        match rest.chars().next() {
            Some('@') => prefixes.silent = true,
            Some('-') => prefixes.ignore = true,
            Some('+') => prefixes.force = true,
            _ => break
        }
        rest = rest[1..].trim_start_matches([' ', '\t']);
    }
    (prefixes, rest)
}

/// Splits an expanded recipe line on newlines not escaped by a backslash.
pub fn split_recipe_lines(s: &str) -> Vec::<&str> {
    let bytes = s.as_bytes();
    let mut out = Vec::new();
    let mut start = 0;
    for (i, &b) in bytes.iter().enumerate() {
        if b == b'\n' && (i == 0 || bytes[i - 1] != b'\\') {
            out.push(&s[start..i]);
            start = i + 1;
        }
    }
    out.push(&s[start..]);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn word_parts() {
        assert_eq!(dir_word("src/foo.c"), "src/");
        assert_eq!(dir_word("hacks"), "./");
        assert_eq!(notdir_word("src/foo.c"), "foo.c");
        assert_eq!(suffix_word("src/foo.c"), Some(".c"));
        assert_eq!(suffix_word("src.d/foo"), None);
        assert_eq!(basename_word("src/foo.c"), "src/foo");
        assert_eq!(basename_word("src.d/foo"), "src.d/foo");
    }

    #[test]
    fn automatic_dir_part() {
        assert_eq!(dir_part("a/b/c.o"), "a/b");
        assert_eq!(dir_part("c.o"), ".");
        assert_eq!(dir_part("/c.o"), "/");
    }

    #[test]
    fn lexical_abspath() {
        assert_eq!(abspath("a/../b/./c", Path::new("/tmp/x")), "/tmp/x/b/c");
        assert_eq!(abspath("/../etc", Path::new("/tmp")), "/etc");
    }

    #[test]
    fn path_normalization() {
        assert_eq!(normalize_path("./foo.o"), "foo.o");
        assert_eq!(normalize_path("././foo.o"), "foo.o");
        assert_eq!(normalize_brace_path("{lib}foo.c"), "lib/foo.c");
        assert_eq!(normalize_brace_path("{}foo.c"), "foo.c");
        assert_eq!(alt_name("./x"), "x");
        assert_eq!(alt_name("x"), "./x");
    }

    #[test]
    fn command_prefixes() {
        let (p, rest) = strip_cmd_prefixes("@-  echo hi");
        assert!(p.silent && p.ignore && !p.force);
        assert_eq!(rest, "echo hi");

        let (p, rest) = strip_cmd_prefixes("+$(MAKE) -C sub");
        assert!(p.force);
        assert_eq!(rest, "$(MAKE) -C sub");
    }

    #[test]
    fn recipe_line_splitting() {
        assert_eq!(split_recipe_lines("a\nb"), vec!["a", "b"]);
        assert_eq!(split_recipe_lines("a \\\nb"), vec!["a \\\nb"]);
    }
}
