use crate::loc::Loc;
use crate::vars::AssignOp;
use crate::error::{MakeError, Result};
use crate::consts::{special, syntax};
use crate::text::{ends_with_escape, strip_comment, trim_blanks};

use std::sync::Arc;

#[derive(Clone, PartialEq, Eq)]
#[cfg_attr(any(test, feature = "dbg"), derive(Debug))]
pub struct DefineHeader {
    pub name: String,
    pub op: AssignOp,
    pub overriding: bool,
    pub export: bool,
}

#[derive(Clone, PartialEq, Eq)]
#[cfg_attr(any(test, feature = "dbg"), derive(Debug))]
pub enum LineKind {
    Text,
    /// Starts with the recipe prefix. `raw` holds the text after it.
    Recipe,
    Define { header: DefineHeader, body: String },
}

/// One logical line: continuations joined, comments stripped from `text`.
#[derive(Clone)]
#[cfg_attr(any(test, feature = "dbg"), derive(Debug))]
pub struct Line {
    pub kind: LineKind,
    pub text: String,
    pub raw: String,
    pub loc: Loc,
}

pub struct LineReader<'a> {
    lines: Vec::<&'a str>,
    file: Arc::<str>,
    first_line: usize,
    recipe_prefix: char,
    posix: bool,
}

impl<'a> LineReader<'a> {
    pub fn new(text: &'a str, file: &Arc::<str>, first_line: usize) -> Self {
        let mut lines = text.split('\n').map(|l| l.strip_suffix('\r').unwrap_or(l)).collect::<Vec<_>>();
        if lines.last().map_or(false, |l| l.is_empty()) { lines.pop(); }
        Self { lines, file: Arc::clone(file), first_line, recipe_prefix: syntax::RECIPE_PREFIX, posix: false }
    }

    #[inline]
    pub fn read_at(text: &'a str, file: &Arc::<str>, first_line: usize) -> Result::<Vec::<Line>> {
        Self::new(text, file, first_line).collect()
    }

    #[inline]
    fn loc(&self, i: usize) -> Loc {
        Loc::new(&self.file, self.first_line + i)
    }

    fn collect(mut self) -> Result::<Vec::<Line>> {
        let mut out = Vec::with_capacity(self.lines.len());
        let mut i = 0;
        while i < self.lines.len() {
            let start = i;
            let line = self.lines[i];
            i += 1;

            if !line.starts_with(self.recipe_prefix) {
                if let Some(header) = self.define_header(line, start) {
                    let body = self.define_body(&mut i, start)?;
                    out.push(Line { kind: LineKind::Define { header, body }, text: String::new(), raw: String::new(), loc: self.loc(start) });
                    continue
                }
            }

            if let Some(body) = line.strip_prefix(self.recipe_prefix) {
                let mut raw = body.to_owned();
                while ends_with_escape(&raw) && i < self.lines.len() {
                    let next = self.lines[i];
                    i += 1;
                    raw.push('\n');
                    raw.push_str(next.strip_prefix(self.recipe_prefix).unwrap_or(next));
                }
                let text = strip_comment(&raw);
                out.push(Line { kind: LineKind::Recipe, text, raw, loc: self.loc(start) });
                continue
            }

            let mut raw = String::new();
            let mut cur = line;
            while ends_with_escape(cur) && i < self.lines.len() {
                let chunk = &cur[..cur.len() - 1];
                match chunk.strip_suffix('$') {
                    // `$\` joins without leaving a space behind.
                    Some(head) if !self.posix => {
                        raw.push_str(head.trim_end());
                        raw.push_str("$ ");
                    }
                    _ => {
                        raw.push_str(chunk.trim_end());
                        raw.push(' ');
                    }
                }
                cur = self.lines[i].trim_start();
                i += 1;
            }
            raw.push_str(cur);

            let text = strip_comment(&raw);
            self.directives(&text);
            out.push(Line { kind: LineKind::Text, text, raw, loc: self.loc(start) });
        }
        Ok(out)
    }

    /// `.RECIPEPREFIX` and `.POSIX` change how later lines are read.
    fn directives(&mut self, text: &str) {
        let t = text.trim();
        if let Some(rest) = t.strip_prefix(special::RECIPEPREFIX) {
            if let Some(eq) = rest.find('=') {
                let (_, start) = AssignOp::ending_at(rest, eq);
                if trim_blanks(&rest[..start]).is_empty() {
                    self.recipe_prefix = rest[eq + 1..].trim_start().chars().next().unwrap_or(syntax::RECIPE_PREFIX);
                }
            }
        } else if t.starts_with(special::POSIX) && t[special::POSIX.len()..].trim_start().starts_with(':') {
            self.posix = true
        }
    }

    fn define_header(&self, line: &str, at: usize) -> Option::<DefineHeader> {
        let mut rest = trim_blanks(&strip_comment(line)).to_owned();
        let (mut overriding, mut export) = (false, false);
        loop {
            if let Some(r) = strip_word(&rest, syntax::OVERRIDE) {
                overriding = true;
                rest = r.to_owned()
            } else if let Some(r) = strip_word(&rest, syntax::EXPORT) {
                export = true;
                rest = r.to_owned()
            } else {
                break
            }
        }

        let rest = match rest.strip_prefix(syntax::DEFINE)? {
            "" => return None,
            r if r.starts_with([' ', '\t']) => r.trim_start(),
            _ => return None
        };
        if AssignOp::starting(rest).is_some() { return None }

        let end = rest.char_indices().find(|&(i, c)| {
            matches!(c, ' ' | '\t') || AssignOp::starting(&rest[i..]).is_some()
        }).map(|(i, _)| i).unwrap_or(rest.len());
        let name = rest[..end].to_owned();
        if name.is_empty() { return None }

        let tail = rest[end..].trim_start();
        let (op, tail) = match AssignOp::starting(tail) {
            Some((op, len)) => (op, tail[len..].trim()),
            None => (AssignOp::Recursive, tail)
        };
        if !tail.is_empty() {
            report!(Some(self.loc(at)), "extraneous text after '{}' directive", syntax::DEFINE);
        }
        Some(DefineHeader { name, op, overriding, export })
    }

    fn define_body(&self, i: &mut usize, start: usize) -> Result::<String> {
        let mut body = Vec::<&str>::new();
        let mut depth = 0usize;
        loop {
            let Some(&line) = self.lines.get(*i) else {
                return Err(MakeError::stop(Some(&self.loc(start)), "missing 'endef', unterminated 'define'"))
            };
            *i += 1;

            if !line.starts_with(self.recipe_prefix) && self.define_header(line, *i - 1).is_some() {
                depth += 1;
                body.push(line);
                continue
            }

            let head = trim_blanks(&strip_comment(line)).to_owned();
            if let Some(tail) = strip_word(&head, syntax::ENDEF).or_else(|| (head == syntax::ENDEF).then_some("")) {
                if depth == 0 {
                    if !tail.is_empty() {
                        report!(Some(self.loc(*i - 1)), "extraneous text after '{}' directive", syntax::ENDEF);
                    }
                    break
                }
                depth -= 1
            }
            body.push(line);
        }
        Ok(body.join("\n"))
    }
}

/// Strips a leading keyword followed by a blank.
pub fn strip_word<'s>(s: &'s str, word: &str) -> Option::<&'s str> {
    let rest = s.strip_prefix(word)?;
    rest.starts_with([' ', '\t']).then(|| rest.trim_start())
}
