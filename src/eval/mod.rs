//! Makefile evaluation: turns logical lines into variables, rules and
//! include records.

pub mod cond;

use cond::CondStack;
use crate::loc::Loc;
use crate::util;
use crate::pattern;
use crate::config::Assignment;
use crate::expand::{self, Ctx, Expander, Scope};
use crate::expand::functions::shell_capture;
use crate::error::{MakeError, Result};
use crate::line::{strip_word, Line, LineKind, LineReader};
use crate::consts::{special, syntax, BUILTIN_VARIABLES, DEFAULT_SHELL, DEFAULT_SUFFIXES, MAKE_VERSION};
use crate::graph::{PatternRule, Recipe, RecipeLine, Rule, Silent, SuffixRule};
use crate::text::{find_top_level, find_top_level_ws, split_args, split_ws, words};
use crate::types::{StrIndexMap, StrIndexSet};
use crate::vars::{escape_dollars, AssignOp, Exports, Flavor, Merge, Origin, Overlay, ScopedVar, Var, Vars};

use std::mem;
use std::ops::Range;
use std::sync::Arc;

use tracing::{debug, trace};

/// Everything the session needs before the first makefile is read.
pub struct Seed<'c> {
    pub env_override: bool,
    pub builtin_rules: bool,
    pub builtin_vars: bool,
    pub assignments: &'c [Assignment],
    pub make: String,
    pub makeflags: String,
    pub mflags: String,
    pub level: usize,
    pub goals: &'c [String],
}

#[derive(Clone, Default)]
#[cfg_attr(any(test, feature = "dbg"), derive(Debug))]
pub struct Specials {
    pub phony: StrIndexSet,
    pub precious: StrIndexSet,
    pub delete_on_error: bool,
    pub second_expansion: bool,
    pub not_parallel: bool,
    pub posix: bool,
    pub silent: Silent,
}

#[derive(Clone)]
#[cfg_attr(any(test, feature = "dbg"), derive(Debug))]
pub struct Include {
    pub path: String,
    pub optional: bool,
    pub loc: Loc,
}

/// Rule that receives the recipe lines that follow.
#[derive(Clone)]
#[cfg_attr(any(test, feature = "dbg"), derive(Debug))]
enum Current {
    Explicit(Range::<usize>),
    Suffix(usize),
    Pattern(usize),
    Default,
}

#[derive(Clone, Copy, Default)]
struct Modifiers {
    overriding: bool,
    export: bool,
}

fn modifiers(mut text: &str) -> (Modifiers, &str) {
    let mut mods = Modifiers::default();
    loop {
        if let Some(rest) = strip_word(text, syntax::OVERRIDE) {
            mods.overriding = true;
            text = rest
        } else if let Some(rest) = strip_word(text, syntax::EXPORT) {
            mods.export = true;
            text = rest
        } else if let Some(rest) = strip_word(text, syntax::PRIVATE) {
            text = rest
        } else {
            return (mods, text)
        }
    }
}

/// Splits `NAME op value`. Returns `None` when the text is not an assignment.
pub fn parse_assignment(text: &str) -> Option::<(&str, AssignOp, &str)> {
    let eq = find_top_level(text, b'=')?;
    let (op, start) = AssignOp::ending_at(text, eq);
    let name = text[..start].trim();
    if name.is_empty() || find_top_level(name, b':').is_some() || find_top_level_ws(name).is_some() {
        return None
    }
    Some((name, op, text[eq + 1..].trim_start()))
}

struct RuleLine<'a> {
    targets: &'a str,
    rest: &'a str,
    double_colon: bool,
    grouped: bool,
}

fn parse_rule_line(text: &str) -> Option::<RuleLine> {
    let colon = find_top_level(text, b':')?;
    let after = &text[colon + 1..];
    let (double_colon, rest) = match after.strip_prefix(':') {
        Some(rest) => (true, rest),
        None => (false, after)
    };
    let grouped = !double_colon && text[..colon].ends_with('&');
    let targets = if grouped { &text[..colon - 1] } else { &text[..colon] };
    Some(RuleLine { targets, rest, double_colon, grouped })
}

/// Splits expanded prerequisites on the first `|`.
pub fn split_order_only(text: &str) -> (Vec::<String>, Vec::<String>) {
    let (normal, order_only) = match text.find('|') {
        Some(i) => (&text[..i], &text[i + 1..]),
        None => (text, "")
    };
    let norm = |s: &str| words(s).map(util::normalize_target).collect::<Vec<_>>();
    (norm(normal), norm(order_only))
}

fn directive_word(text: &str) -> (&str, &str) {
    let end = text.find([' ', '\t', '(']).unwrap_or(text.len());
    (&text[..end], &text[end..])
}

#[inline]
fn is_special_target(name: &str) -> bool {
    matches!(
        name,
        special::PHONY | special::PRECIOUS | special::SECONDARY | special::SUFFIXES
            | special::DEFAULT | special::DELETE_ON_ERROR | special::SECONDEXPANSION
            | special::EXPORT_ALL_VARIABLES | special::NOTPARALLEL | special::SILENT | special::POSIX
    ) || special::IGNORED.contains(&name)
}

#[inline]
fn join_values(a: &str, b: &str) -> String {
    if a.is_empty() { b.to_owned() } else if b.is_empty() { a.to_owned() } else { format!("{a} {b}") }
}

pub struct Evaluator {
    pub vars: Vars,
    pub target_vars: StrIndexMap::<Overlay>,
    pub pattern_vars: Vec::<(String, Overlay)>,
    pub rules: Vec::<Rule>,
    pub suffix_rules: Vec::<SuffixRule>,
    pub pattern_rules: Vec::<PatternRule>,
    pub default_recipe: Option::<Recipe>,
    /// `None` until `.SUFFIXES` is declared.
    pub suffixes: Option::<Vec::<String>>,
    pub vpaths: Vec::<(String, Vec::<String>)>,
    pub specials: Specials,
    pub exports: Exports,
    pub includes: Vec::<Include>,
    /// Required includes that did not exist when read.
    pub missing: Vec::<Include>,
    pub default_goal: Option::<String>,
    pub builtin_rules: bool,

    cond: CondStack,
    current: Option::<Current>,
}

impl Evaluator {
    fn empty(builtin_rules: bool) -> Self {
        Self {
            vars: Vars::default(),
            target_vars: StrIndexMap::default(),
            pattern_vars: Vec::new(),
            rules: Vec::new(),
            suffix_rules: Vec::new(),
            pattern_rules: Vec::new(),
            default_recipe: None,
            suffixes: None,
            vpaths: Vec::new(),
            specials: Specials::default(),
            exports: Exports::default(),
            includes: Vec::new(),
            missing: Vec::new(),
            default_goal: None,
            builtin_rules,
            cond: CondStack::default(),
            current: None,
        }
    }

    pub fn new(seed: &Seed) -> Result::<Self> {
        let mut ev = Self::empty(seed.builtin_rules);

        let env_origin = if seed.env_override { Origin::EnvironmentOverride } else { Origin::Environment };
        for (k, v) in std::env::vars_os() {
            let (Some(k), Some(v)) = (k.to_str(), v.to_str()) else { continue };
            if matches!(k, "SHELL" | "MAKE" | "MAKEFLAGS" | "MFLAGS" | "MAKELEVEL" | "MAKECMDGOALS" | "CURDIR") {
                continue
            }
            ev.vars.insert(k, Var::recursive(v, env_origin));
        }

        let cwd = std::env::current_dir().map(|p| p.to_string_lossy().into_owned()).unwrap_or_default();
        let defaults = [
            ("SHELL", Var::recursive(DEFAULT_SHELL, Origin::Default)),
            (special::SHELLFLAGS, Var::recursive("-c", Origin::Default)),
            ("MAKE", Var::simple(seed.make.as_str(), Origin::Default)),
            ("MAKE_VERSION", Var::simple(MAKE_VERSION, Origin::Default)),
            ("MAKEFLAGS", Var::simple(seed.makeflags.as_str(), Origin::Default)),
            ("MFLAGS", Var::simple(seed.mflags.as_str(), Origin::Default)),
            ("MAKELEVEL", Var::simple(seed.level.to_string(), Origin::Environment)),
            ("MAKECMDGOALS", Var::simple(seed.goals.join(" "), Origin::Default)),
            ("CURDIR", Var::simple(cwd, Origin::File)),
            ("MAKEFILE_LIST", Var::simple("", Origin::File)),
        ];
        for (name, var) in defaults {
            ev.vars.insert(name, var)
        }
        if seed.builtin_vars {
            for (name, value) in BUILTIN_VARIABLES {
                if !ev.vars.contains(name) {
                    ev.vars.insert(*name, Var::recursive(*value, Origin::Default))
                }
            }
        }
        ev.exports.export("MAKEFLAGS");
        ev.exports.export("MFLAGS");

        for a in seed.assignments {
            ev.assign(&a.name, a.op, &a.value, Origin::CommandLine, None)?
        }
        Ok(ev)
    }

    /// A scratch session over existing variables, for `$(eval)` in recipes.
    pub fn with_vars(vars: Vars, exports: Exports) -> Self {
        let mut ev = Self::empty(false);
        ev.vars = vars;
        ev.exports = exports;
        ev
    }

    #[inline]
    fn expand(&mut self, text: &str, loc: &Loc) -> Result::<String> {
        if !text.contains('$') {
            return Ok(text.to_owned())
        }
        let ctx = Ctx::at(Some(loc.clone()));
        expand::expand(self, text, &ctx)
    }

    /// Expands in the global scope outside of any makefile line.
    pub fn expand_global(&mut self, text: &str) -> Result::<String> {
        expand::expand(self, text, &Ctx::default())
    }

    pub fn read_file(&mut self, path: &str) -> Result::<()> {
        let text = util::read_file(path).map_err(|e| MakeError::io(path, e))?;
        debug!(path, "reading makefile");
        let list = self.vars.get("MAKEFILE_LIST").map(|v| v.value.clone()).unwrap_or_default();
        self.vars.insert("MAKEFILE_LIST", Var::simple(join_values(&list, path), Origin::File));
        self.read_text(&text, path, 1)
    }

    pub fn read_text(&mut self, text: &str, file: &str, first_line: usize) -> Result::<()> {
        let lines = LineReader::read_at(text, &Arc::from(file), first_line)?;
        self.eval_lines(&lines)
    }

    fn eval_lines(&mut self, lines: &[Line]) -> Result::<()> {
        let cond = mem::take(&mut self.cond);
        let current = self.current.take();
        let result = lines.iter().try_for_each(|line| self.line(line)).and_then(|_| {
            match self.cond.open_loc() {
                Some(loc) => Err(MakeError::stop(Some(loc), "missing 'endif'")),
                None => Ok(())
            }
        });
        self.cond = cond;
        self.current = current;
        result
    }

    fn line(&mut self, line: &Line) -> Result::<()> {
        match &line.kind {
            LineKind::Define { header, body } => {
                if !self.cond.active() { return Ok(()) }
                self.current = None;
                let name = self.expand(&header.name, &line.loc)?.trim().to_owned();
                let mods = Modifiers { overriding: header.overriding, export: header.export };
                return self.assign_global(&name, header.op, body, mods, &line.loc)
            }
            LineKind::Recipe if self.current.is_some() => {
                if self.cond.active() {
                    self.push_recipe(&line.raw, &line.loc)
                }
                return Ok(())
            }
            _ => {}
        }

        let text = line.text.trim_start();
        if self.conditional(text, &line.loc)? { return Ok(()) }
        if !self.cond.active() { return Ok(()) }
        let text = text.trim_end();
        if text.is_empty() { return Ok(()) }
        trace!(loc = %line.loc, text, "statement");
        self.statement(text, &line.loc, line.kind == LineKind::Recipe)
    }

    /// Handles conditional directives. Returns whether the line was one.
    fn conditional(&mut self, text: &str, loc: &Loc) -> Result::<bool> {
        let (kw, rest) = directive_word(text);
        let rest_trim = rest.trim_start();
        if AssignOp::starting(rest_trim).is_some() || rest_trim.starts_with(':') {
            return Ok(false)
        }
        let stop = |msg: &str| MakeError::stop(Some(loc), msg);
        match kw {
            syntax::IFEQ | syntax::IFNEQ | syntax::IFDEF | syntax::IFNDEF => {
                let cond = if self.cond.active() { self.test(kw, rest_trim, loc)? } else { false };
                self.cond.push(cond, loc.clone());
                Ok(true)
            }
            syntax::ELSE => {
                if rest_trim.is_empty() {
                    self.cond.flip(None).map_err(stop)?;
                    return Ok(true)
                }
                let (kw2, rest2) = directive_word(rest_trim);
                if !matches!(kw2, syntax::IFEQ | syntax::IFNEQ | syntax::IFDEF | syntax::IFNDEF) {
                    report!(Some(loc), "extraneous text after '{}' directive", syntax::ELSE);
                    self.cond.flip(None).map_err(stop)?;
                    return Ok(true)
                }
                let cond = if self.cond.else_needs_test().map_err(stop)? {
                    self.test(kw2, rest2.trim_start(), loc)?
                } else {
                    false
                };
                self.cond.flip(Some(cond)).map_err(stop)?;
                Ok(true)
            }
            syntax::ENDIF => {
                self.cond.pop().map_err(stop)?;
                if !rest_trim.is_empty() {
                    report!(Some(loc), "extraneous text after '{}' directive", syntax::ENDIF);
                }
                Ok(true)
            }
            _ => Ok(false)
        }
    }

    fn test(&mut self, kw: &str, rest: &str, loc: &Loc) -> Result::<bool> {
        match kw {
            syntax::IFDEF | syntax::IFNDEF => {
                let name = self.expand(rest.trim(), loc)?.trim().to_owned();
                let defined = self.vars.get(&name).map_or(false, |v| !v.value.is_empty());
                Ok(defined == (kw == syntax::IFDEF))
            }
            _ => {
                let (a, b) = self.condition_args(rest.trim(), kw, loc)?;
                Ok((a == b) == (kw == syntax::IFEQ))
            }
        }
    }

    fn condition_args(&mut self, s: &str, kw: &str, loc: &Loc) -> Result::<(String, String)> {
        let invalid = || MakeError::stop(Some(loc), "invalid syntax in conditional");
        if s.starts_with('(') {
            let close = s.rfind(')').ok_or_else(invalid)?;
            if !s[close + 1..].trim().is_empty() {
                report!(Some(loc), "extraneous text after '{kw}' directive");
            }
            let parts = split_args(&s[1..close], 2);
            if parts.len() != 2 { return Err(invalid()) }
            let a = self.expand(parts[0], loc)?.trim().to_owned();
            let b = self.expand(parts[1], loc)?.trim().to_owned();
            return Ok((a, b))
        }

        let mut quoted = Vec::with_capacity(2);
        let mut rest = s;
        for _ in 0..2 {
            let q = rest.chars().next().filter(|c| *c == '"' || *c == '\'').ok_or_else(invalid)?;
            let end = rest[1..].find(q).ok_or_else(invalid)? + 1;
            quoted.push(&rest[1..end]);
            rest = rest[end + 1..].trim_start();
        }
        if !rest.is_empty() {
            report!(Some(loc), "extraneous text after '{kw}' directive");
        }
        let a = self.expand(quoted[0], loc)?;
        let b = self.expand(quoted[1], loc)?;
        Ok((a, b))
    }

    fn statement(&mut self, text: &str, loc: &Loc, tab: bool) -> Result::<()> {
        self.current = None;

        if text == syntax::EXPORT {
            self.exports.all = true;
            return Ok(())
        }
        if text == syntax::UNEXPORT {
            self.exports.all = false;
            return Ok(())
        }
        if let Some(rest) = strip_word(text, syntax::UNEXPORT) {
            for name in split_ws(&self.expand(rest, loc)?) {
                self.exports.unexport(name);
                if let Some(v) = self.vars.get_mut(name) { v.export = false }
            }
            return Ok(())
        }

        let (mods, body) = modifiers(text);
        if let Some(rest) = strip_word(body, syntax::UNDEFINE) {
            let origin = if mods.overriding { Origin::Override } else { Origin::File };
            let name = self.expand(rest, loc)?.trim().to_owned();
            if self.vars.get(&name).map_or(true, |v| v.origin <= origin) {
                self.vars.remove(&name);
            }
            return Ok(())
        }
        if let Some((name, op, value)) = parse_assignment(body) {
            let name = self.expand(name, loc)?.trim().to_owned();
            return self.assign_global(&name, op, value, mods, loc)
        }
        if mods.export {
            for name in split_ws(&self.expand(body, loc)?) {
                self.exports.export(name);
                if let Some(v) = self.vars.get_mut(name) { v.export = true }
            }
            return Ok(())
        }

        for (kw, optional) in [
            (syntax::INCLUDE, false),
            (syntax::OPT_INCLUDE, true),
            (syntax::SINCLUDE, true),
            (syntax::BANG_INCLUDE, false),
        ] {
            if let Some(rest) = strip_word(text, kw) {
                return self.include(optional, rest, loc)
            }
            if text == kw { return Ok(()) }
        }

        if let Some(rest) = strip_word(text, syntax::VPATH).or_else(|| (text == syntax::VPATH).then_some("")) {
            return self.vpath(rest, loc)
        }
        if text == syntax::ENDEF {
            return Err(MakeError::stop(Some(loc), "extraneous 'endef'"))
        }

        if let Some(rule) = parse_rule_line(text) {
            return self.rule(rule, loc)
        }

        // The line may only become a rule once expanded.
        let expanded = self.expand(text, loc)?;
        if expanded.trim().is_empty() {
            return Ok(())
        }
        let escaped = escape_dollars(&expanded);
        match parse_rule_line(&escaped) {
            Some(rule) => self.rule(rule, loc),
            None if tab => Err(MakeError::stop(Some(loc), "recipe commences before first target")),
            None => Err(MakeError::stop(Some(loc), "missing separator"))
        }
    }

    fn include(&mut self, optional: bool, arg: &str, loc: &Loc) -> Result::<()> {
        let files = split_ws(&self.expand(arg, loc)?).into_iter().map(util::normalize_target).collect::<Vec<_>>();
        for path in files {
            let include = Include { path: path.clone(), optional, loc: loc.clone() };
            self.includes.push(include.clone());
            if util::path_exists(&path) {
                self.read_file(&path)?
            } else if !optional {
                debug!(path, "deferring missing include");
                self.missing.push(include)
            }
        }
        Ok(())
    }

    fn vpath(&mut self, rest: &str, loc: &Loc) -> Result::<()> {
        let expanded = self.expand(rest, loc)?;
        let ws = split_ws(&expanded);
        match ws.as_slice() {
            [] => self.vpaths.clear(),
            [pattern] => self.vpaths.retain(|(p, _)| p != pattern),
            [pattern, dirs @ ..] => {
                let dirs = dirs.iter().flat_map(|d| d.split(':')).filter(|d| !d.is_empty()).map(|d| d.to_owned()).collect();
                self.vpaths.push(((*pattern).to_owned(), dirs))
            }
        }
        Ok(())
    }

    fn note_default_goal(&mut self, targets: &[String]) {
        if self.default_goal.is_some() { return }
        if let Some(t) = targets.iter().find(|t| !t.contains('%') && (!t.starts_with('.') || t.contains('/'))) {
            self.default_goal = Some(t.clone())
        }
    }

    /// The source and destination suffixes when `target` names a suffix rule.
    fn suffix_rule(&self, target: &str) -> Option::<(String, String)> {
        if !target.starts_with('.') || target.contains('/') {
            return None
        }
        match &self.suffixes {
            Some(list) => {
                for src in list {
                    if let Some(dst) = target.strip_prefix(src.as_str()) {
                        if list.iter().any(|s| s == dst) {
                            return Some((src.clone(), dst.to_owned()))
                        }
                    }
                }
                list.iter().any(|s| s == target).then(|| (target.to_owned(), String::new()))
            }
            None => match target[1..].find('.') {
                Some(i) => Some((target[..i + 1].to_owned(), target[i + 1..].to_owned())),
                None => DEFAULT_SUFFIXES.contains(&target).then(|| (target.to_owned(), String::new()))
            }
        }
    }

    fn special(&mut self, name: &str, prereqs: &[String]) {
        match name {
            special::PHONY => self.specials.phony.extend(prereqs.iter().cloned()),
            special::PRECIOUS | special::SECONDARY => self.specials.precious.extend(prereqs.iter().cloned()),
            special::SUFFIXES => {
                if prereqs.is_empty() {
                    self.suffixes = Some(Vec::new());
                    return
                }
                let builtin = self.builtin_rules;
                let list = self.suffixes.get_or_insert_with(|| {
                    if builtin { DEFAULT_SUFFIXES.iter().map(|s| (*s).to_owned()).collect() } else { Vec::new() }
                });
                for p in prereqs {
                    if !list.contains(p) { list.push(p.clone()) }
                }
            }
            special::DELETE_ON_ERROR => self.specials.delete_on_error = true,
            special::SECONDEXPANSION => self.specials.second_expansion = true,
            special::NOTPARALLEL => self.specials.not_parallel = true,
            special::POSIX => self.specials.posix = true,
            special::EXPORT_ALL_VARIABLES => self.exports.all = true,
            special::SILENT => {
                if prereqs.is_empty() {
                    self.specials.silent = Silent::All;
                    return
                }
                match &mut self.specials.silent {
                    Silent::All => {}
                    Silent::Targets(set) => set.extend(prereqs.iter().cloned()),
                    silent => *silent = Silent::Targets(prereqs.iter().cloned().collect())
                }
            }
            _ => debug!(name, "ignoring special target")
        }
    }

    fn rule(&mut self, r: RuleLine, loc: &Loc) -> Result::<()> {
        let (deps_part, inline) = match find_top_level(r.rest, b';') {
            Some(i) => (&r.rest[..i], Some(&r.rest[i + 1..])),
            None => (r.rest, None)
        };

        let targets = split_ws(&self.expand(r.targets, loc)?).into_iter().map(util::normalize_target).collect::<Vec<_>>();
        if targets.is_empty() {
            return Ok(())
        }

        if inline.is_none() {
            let (mods, body) = modifiers(deps_part.trim_start());
            if let Some((name, op, value)) = parse_assignment(body) {
                for target in &targets {
                    self.assign_scoped(target, name, op, value, mods, loc)?
                }
                return Ok(())
            }
        }

        let static_pattern = find_top_level(deps_part, b':').map(|i| (&deps_part[..i], &deps_part[i + 1..]));
        let prereq_text = static_pattern.map_or(deps_part, |(_, p)| p);
        let expanded = self.expand(prereq_text, loc)?;
        let recipe_line = inline.map(|t| RecipeLine { text: t.trim_start().to_owned(), loc: loc.clone() });

        // Special targets always take their prerequisites from the first
        // expansion.
        let first = targets[0].as_str();
        if is_special_target(first) {
            let (mut all, order_only) = split_order_only(&expanded);
            all.extend(order_only);
            self.special(first, &all);
            if first == special::DEFAULT {
                self.default_recipe = Some(Vec::new());
                self.current = Some(Current::Default);
                if let Some(line) = recipe_line { self.push_recipe(&line.text, loc) }
            }
            return Ok(())
        }

        let (prereqs, order_only, second) = if self.specials.second_expansion {
            let text = expanded.trim();
            (Vec::new(), Vec::new(), (!text.is_empty()).then(|| text.to_owned()))
        } else {
            let (prereqs, order_only) = split_order_only(&expanded);
            (prereqs, order_only, None)
        };

        if static_pattern.is_none() && targets.len() == 1 && !r.double_colon && prereq_text.trim().is_empty() {
            if let Some((src, dst)) = self.suffix_rule(first) {
                debug!(src, dst, "suffix rule");
                self.suffix_rules.push(SuffixRule { src, dst, recipe: recipe_line.into_iter().collect(), loc: Some(loc.clone()) });
                self.current = Some(Current::Suffix(self.suffix_rules.len() - 1));
                return Ok(())
            }
        }

        if static_pattern.is_none() && targets.iter().any(|t| t.contains('%')) {
            if targets.iter().any(|t| !t.contains('%')) {
                return Err(MakeError::stop(Some(loc), "mixed implicit and normal rules"))
            }
            let (prereqs, order_only) = match &second {
                Some(text) => split_order_only(text),
                None => (prereqs, order_only)
            };
            self.pattern_rules.push(PatternRule {
                targets,
                prereqs,
                order_only,
                recipe: recipe_line.into_iter().collect(),
                loc: Some(loc.clone()),
            });
            self.current = Some(Current::Pattern(self.pattern_rules.len() - 1));
            return Ok(())
        }

        self.note_default_goal(&targets);
        let start = self.rules.len();
        match static_pattern {
            Some((tpat, _)) => {
                let tpat = self.expand(tpat, loc)?.trim().to_owned();
                for target in targets {
                    let Some(stem) = pattern::match_stem(&tpat, &target).map(|s| s.to_owned()) else {
                        report!(Some(loc), "target '{target}' doesn't match the target pattern");
                        continue
                    };
                    let subst = |list: &[String]| list.iter().map(|p| pattern::subst_stem(p, &stem)).collect::<Vec<_>>();
                    let second = second.as_ref().map(|text| {
                        words(text).map(|w| {
                            if w.contains('%') && !w.contains('$') { pattern::subst_stem(w, &stem) } else { w.to_owned() }
                        }).collect::<Vec<_>>().join(" ")
                    });
                    self.rules.push(Rule {
                        targets: vec![target],
                        prereqs: subst(&prereqs),
                        order_only: subst(&order_only),
                        recipe: Vec::new(),
                        double_colon: r.double_colon,
                        grouped: false,
                        stem: Some(stem),
                        second,
                        loc: loc.clone(),
                    })
                }
            }
            None => self.rules.push(Rule {
                targets,
                prereqs,
                order_only,
                recipe: Vec::new(),
                double_colon: r.double_colon,
                grouped: r.grouped,
                stem: None,
                second,
                loc: loc.clone(),
            })
        }
        self.current = Some(Current::Explicit(start..self.rules.len()));
        if let Some(line) = recipe_line {
            self.push_recipe(&line.text, loc)
        }
        Ok(())
    }

    fn push_recipe(&mut self, text: &str, loc: &Loc) {
        let line = RecipeLine { text: text.to_owned(), loc: loc.clone() };
        match &self.current {
            Some(Current::Explicit(range)) => {
                for rule in &mut self.rules[range.clone()] {
                    rule.recipe.push(line.clone())
                }
            }
            Some(Current::Suffix(i)) => self.suffix_rules[*i].recipe.push(line),
            Some(Current::Pattern(i)) => self.pattern_rules[*i].recipe.push(line),
            Some(Current::Default) => self.default_recipe.get_or_insert_with(Vec::new).push(line),
            None => {}
        }
    }

    fn shell_assignment(&mut self, value: &str, loc: Option::<&Loc>) -> Result::<String> {
        let ctx = Ctx::at(loc.cloned());
        let mut ex = Expander::new(self);
        let cmd = ex.expand(value, &ctx)?;
        shell_capture(&mut ex, &cmd, &ctx)
    }

    fn assign_global(&mut self, name: &str, op: AssignOp, value: &str, mods: Modifiers, loc: &Loc) -> Result::<()> {
        let origin = if mods.overriding { Origin::Override } else { Origin::File };
        self.assign(name, op, value, origin, Some(loc))?;
        if mods.export {
            self.exports.export(name);
            if let Some(v) = self.vars.get_mut(name) { v.export = true }
        }
        Ok(())
    }

    /// Applies one global assignment honoring origin precedence.
    pub fn assign(&mut self, name: &str, op: AssignOp, value: &str, origin: Origin, loc: Option::<&Loc>) -> Result::<()> {
        if name.is_empty() {
            return Err(MakeError::stop(loc, "empty variable name"))
        }
        let existing = self.vars.get(name).cloned();
        if let Some(old) = &existing {
            if old.origin > origin {
                trace!(name, "keeping higher-precedence definition");
                return Ok(())
            }
        }

        let ctx = Ctx::at(loc.cloned());
        let mut var = match op {
            AssignOp::Recursive => Var::recursive(value, origin),
            AssignOp::Simple => Var::simple(expand::expand(self, value, &ctx)?, origin),
            AssignOp::Escaped => Var::recursive(escape_dollars(&expand::expand(self, value, &ctx)?), origin),
            AssignOp::Conditional => {
                if existing.is_some() { return Ok(()) }
                Var::recursive(value, origin)
            }
            AssignOp::Shell => Var::recursive(self.shell_assignment(value, loc)?, origin),
            AssignOp::Append => match &existing {
                Some(old) if old.flavor == Flavor::Simple => {
                    let more = expand::expand(self, value, &ctx)?;
                    Var::simple(join_values(&old.value, &more), origin)
                }
                Some(old) => Var::recursive(join_values(&old.value, value), origin),
                None => Var::recursive(value, origin)
            }
        };
        var.export = existing.map_or(false, |v| v.export);
        var.loc = loc.cloned();
        self.vars.insert(name, var);
        Ok(())
    }

    fn overlay_mut(&mut self, target: &str) -> &mut Overlay {
        if !target.contains('%') {
            return self.target_vars.entry(target.to_owned()).or_default()
        }
        let i = match self.pattern_vars.iter().position(|(p, _)| p == target) {
            Some(i) => i,
            None => {
                self.pattern_vars.push((target.to_owned(), Overlay::default()));
                self.pattern_vars.len() - 1
            }
        };
        &mut self.pattern_vars[i].1
    }

    fn assign_scoped(&mut self, target: &str, name: &str, op: AssignOp, value: &str, mods: Modifiers, loc: &Loc) -> Result::<()> {
        let name = self.expand(name, loc)?.trim().to_owned();
        let origin = if mods.overriding { Origin::Override } else { Origin::File };
        let existing = self.overlay_mut(target).get(&name).cloned();

        let mut var = match op {
            AssignOp::Simple => Var::simple(self.expand(value, loc)?, origin),
            AssignOp::Escaped => Var::recursive(escape_dollars(&self.expand(value, loc)?), origin),
            AssignOp::Shell => Var::recursive(self.shell_assignment(value, Some(loc))?, origin),
            AssignOp::Append => match &existing {
                Some(old) if old.var.flavor == Flavor::Simple => {
                    let more = self.expand(value, loc)?;
                    Var::simple(join_values(&old.var.value, &more), origin)
                }
                Some(old) => Var::recursive(join_values(&old.var.value, value), origin),
                None => Var::recursive(value, origin)
            },
            AssignOp::Recursive | AssignOp::Conditional => Var::recursive(value, origin),
        };
        var.export = mods.export;
        var.loc = Some(loc.clone());

        let merge = match (op, &existing) {
            (AssignOp::Append, Some(old)) => old.merge,
            (AssignOp::Append, None) => Merge::Append,
            (AssignOp::Conditional, _) => Merge::Default,
            _ => Merge::Replace,
        };
        self.overlay_mut(target).insert(name, ScopedVar { var, merge });
        Ok(())
    }
}

impl Scope for Evaluator {
    #[inline]
    fn lookup(&self, name: &str) -> Option::<&Var> {
        self.vars.get(name)
    }

    fn eval(&mut self, text: &str, ctx: &Ctx) -> Result::<()> {
        let (file, line) = match &ctx.loc {
            Some(loc) => (Arc::clone(&loc.file), loc.line),
            None => (Arc::from("<eval>"), 1)
        };
        let lines = LineReader::read_at(text, &file, line)?;
        self.eval_lines(&lines)
    }

    #[inline]
    fn export_names(&self) -> Vec::<String> {
        self.exports.collect([&self.vars])
    }

    #[inline]
    fn set_shell_status(&mut self, status: i32) {
        self.vars.insert(special::SHELLSTATUS, Var::simple(status.to_string(), Origin::Default))
    }
}
