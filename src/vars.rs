use crate::loc::Loc;
use crate::types::{StrHashMap, StrHashSet, StrIndexMap, StrIndexSet};

#[derive(Clone, Copy, PartialEq, Eq)]
#[cfg_attr(any(test, feature = "dbg"), derive(Debug))]
pub enum Flavor {
    /// Stored verbatim, expanded on every use.
    Recursive,
    /// Expanded once at assignment.
    Simple,
}

impl Flavor {
    #[inline]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Recursive => "recursive",
            Self::Simple => "simple",
        }
    }
}

/// Where a definition came from. Declaration order is assignment precedence:
/// a definition may only replace one of equal or lower rank.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[cfg_attr(any(test, feature = "dbg"), derive(Debug))]
pub enum Origin {
    Default,
    Environment,
    File,
    EnvironmentOverride,
    CommandLine,
    Override,
    Automatic,
}

impl Origin {
    #[inline]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Default => "default",
            Self::Environment => "environment",
            Self::File => "file",
            Self::EnvironmentOverride => "environment override",
            Self::CommandLine => "command line",
            Self::Override => "override",
            Self::Automatic => "automatic",
        }
    }
}

#[derive(Clone)]
#[cfg_attr(any(test, feature = "dbg"), derive(Debug))]
pub struct Var {
    pub value: String,
    pub flavor: Flavor,
    pub origin: Origin,
    pub export: bool,
    pub loc: Option::<Loc>,
}

impl Var {
    #[inline]
    pub fn new(value: impl Into::<String>, flavor: Flavor, origin: Origin) -> Self {
        Self { value: value.into(), flavor, origin, export: false, loc: None }
    }

    #[inline]
    pub fn recursive(value: impl Into::<String>, origin: Origin) -> Self {
        Self::new(value, Flavor::Recursive, origin)
    }

    #[inline]
    pub fn simple(value: impl Into::<String>, origin: Origin) -> Self {
        Self::new(value, Flavor::Simple, origin)
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
#[cfg_attr(any(test, feature = "dbg"), derive(Debug))]
pub enum AssignOp {
    /// `=`
    Recursive,
    /// `:=` and `::=`
    Simple,
    /// `:::=`, expanded now but stored with `$` re-escaped.
    Escaped,
    /// `+=`
    Append,
    /// `?=`
    Conditional,
    /// `!=`
    Shell,
}

impl AssignOp {
    /// Operator spellings, longest first.
    pub const ALL: &'static [(&'static str, AssignOp)] = &[
        (":::=", AssignOp::Escaped),
        ("::=", AssignOp::Simple),
        (":=", AssignOp::Simple),
        ("+=", AssignOp::Append),
        ("?=", AssignOp::Conditional),
        ("!=", AssignOp::Shell),
        ("=", AssignOp::Recursive),
    ];

    /// Recognizes the operator whose `=` sits at `eq` in `s`. Returns the
    /// operator and the byte offset where it starts.
    pub fn ending_at(s: &str, eq: usize) -> (Self, usize) {
        let head = &s[..eq];
        for (spelling, op) in Self::ALL {
            let prefix = &spelling[..spelling.len() - 1];
            if head.ends_with(prefix) && !prefix.is_empty() {
                return (*op, eq - prefix.len())
            }
        }
        (Self::Recursive, eq)
    }

    /// Recognizes an operator at the start of `s`.
    pub fn starting(s: &str) -> Option::<(Self, usize)> {
        Self::ALL.iter().find(|(spelling, _)| s.starts_with(spelling)).map(|(spelling, op)| (*op, spelling.len()))
    }
}

#[derive(Clone, Default)]
#[cfg_attr(any(test, feature = "dbg"), derive(Debug))]
pub struct Vars {
    map: StrHashMap::<Var>,
}

impl Vars {
    #[inline]
    pub fn get(&self, name: &str) -> Option::<&Var> {
        self.map.get(name)
    }

    #[inline]
    pub fn get_mut(&mut self, name: &str) -> Option::<&mut Var> {
        self.map.get_mut(name)
    }

    #[inline]
    pub fn insert(&mut self, name: impl Into::<String>, var: Var) {
        self.map.insert(name.into(), var);
    }

    #[inline]
    pub fn remove(&mut self, name: &str) -> Option::<Var> {
        self.map.remove(name)
    }

    #[inline]
    pub fn contains(&self, name: &str) -> bool {
        self.map.contains_key(name)
    }

    #[inline]
    pub fn iter(&self) -> impl Iterator::<Item = (&String, &Var)> {
        self.map.iter()
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
#[cfg_attr(any(test, feature = "dbg"), derive(Debug))]
pub enum Merge {
    Replace,
    /// `+=` onto whatever the enclosing scope holds.
    Append,
    /// `?=`, only when the enclosing scope has no definition.
    Default,
}

/// One entry of a target or pattern overlay.
#[derive(Clone)]
#[cfg_attr(any(test, feature = "dbg"), derive(Debug))]
pub struct ScopedVar {
    pub var: Var,
    pub merge: Merge,
}

pub type Overlay = StrIndexMap::<ScopedVar>;

/// Escapes `$` so a simple value survives a later recursive expansion.
#[inline]
pub fn escape_dollars(s: &str) -> String {
    s.replace('$', "$$")
}

#[inline]
fn join_values(a: &str, b: &str) -> String {
    match (a.is_empty(), b.is_empty()) {
        (true, _) => b.to_owned(),
        (_, true) => a.to_owned(),
        _ => format!("{a} {b}")
    }
}

/// Layers an overlay entry on the definition visible below it.
pub fn merge_scoped(base: Option::<&Var>, scoped: &ScopedVar) -> Var {
    let ScopedVar { var, merge } = scoped;
    let Some(base) = base else { return var.clone() };

    // Command line and override definitions only yield to `override`.
    if base.origin > var.origin && base.origin >= Origin::EnvironmentOverride {
        return base.clone()
    }

    let mut merged = match merge {
        Merge::Replace => var.clone(),
        Merge::Default => return base.clone(),
        Merge::Append => match (base.flavor, var.flavor) {
            (Flavor::Simple, Flavor::Simple) => Var::simple(join_values(&base.value, &var.value), var.origin),
            (Flavor::Simple, Flavor::Recursive) => Var::recursive(join_values(&escape_dollars(&base.value), &var.value), var.origin),
            (Flavor::Recursive, Flavor::Simple) => Var::recursive(join_values(&base.value, &escape_dollars(&var.value)), var.origin),
            (Flavor::Recursive, Flavor::Recursive) => Var::recursive(join_values(&base.value, &var.value), var.origin),
        }
    };
    merged.export = var.export || base.export;
    merged.loc = var.loc.clone().or_else(|| base.loc.clone());
    merged
}

/// Names and switches governing what reaches the environment of children.
#[derive(Clone, Default)]
#[cfg_attr(any(test, feature = "dbg"), derive(Debug))]
pub struct Exports {
    pub all: bool,
    pub names: StrIndexSet,
    pub unexported: StrHashSet,
}

#[inline]
pub fn is_env_name(name: &str) -> bool {
    let mut chars = name.chars();
    chars.next().map_or(false, |c| c.is_ascii_alphabetic() || c == '_') && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

impl Exports {
    pub fn export(&mut self, name: &str) {
        self.unexported.remove(name);
        self.names.insert(name.to_owned());
    }

    pub fn unexport(&mut self, name: &str) {
        self.names.shift_remove(name);
        self.unexported.insert(name.to_owned());
    }

    /// Names to place in a child environment, in a stable order.
    pub fn collect<'a>(&self, layers: impl IntoIterator::<Item = &'a Vars>) -> Vec::<String> {
        let mut out = self.names.iter().filter(|n| !self.unexported.contains(*n)).cloned().collect::<StrIndexSet>();
        for vars in layers {
            let mut extra = vars.iter().filter(|(name, var)| {
                let inherited = matches!(var.origin, Origin::Environment | Origin::EnvironmentOverride | Origin::CommandLine);
                (var.export || inherited || (self.all && var.origin != Origin::Default))
                    && !self.unexported.contains(*name)
                    && is_env_name(name)
            }).map(|(name, _)| name.clone()).collect::<Vec<_>>();
            extra.sort();
            out.extend(extra);
        }
        out.into_iter().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scoped(var: Var, merge: Merge) -> ScopedVar {
        ScopedVar { var, merge }
    }

    #[test]
    fn origin_precedence() {
        assert!(Origin::Override > Origin::CommandLine);
        assert!(Origin::CommandLine > Origin::EnvironmentOverride);
        assert!(Origin::EnvironmentOverride > Origin::File);
        assert!(Origin::File > Origin::Environment);
        assert!(Origin::Environment > Origin::Default);
    }

    #[test]
    fn operator_recognition() {
        assert_eq!(AssignOp::ending_at("A:::=b", 4), (AssignOp::Escaped, 1));
        assert_eq!(AssignOp::ending_at("A ::= b", 4), (AssignOp::Simple, 2));
        assert_eq!(AssignOp::ending_at("A := b", 3), (AssignOp::Simple, 2));
        assert_eq!(AssignOp::ending_at("A += b", 3), (AssignOp::Append, 2));
        assert_eq!(AssignOp::ending_at("A != b", 3), (AssignOp::Shell, 2));
        assert_eq!(AssignOp::ending_at("A = b", 2), (AssignOp::Recursive, 2));
        assert_eq!(AssignOp::starting("?= x"), Some((AssignOp::Conditional, 2)));
    }

    #[test]
    fn overlay_append_keeps_base_flavor() {
        let base = Var::simple("-O2 $x", Origin::File);
        let merged = merge_scoped(Some(&base), &scoped(Var::recursive("-g", Origin::File), Merge::Append));
        assert_eq!(merged.flavor, Flavor::Recursive);
        assert_eq!(merged.value, "-O2 $$x -g");

        let merged = merge_scoped(Some(&base), &scoped(Var::simple("-g", Origin::File), Merge::Append));
        assert_eq!(merged.flavor, Flavor::Simple);
        assert_eq!(merged.value, "-O2 $x -g");
    }

    #[test]
    fn overlay_default_and_replace() {
        let base = Var::recursive("a", Origin::File);
        assert_eq!(merge_scoped(Some(&base), &scoped(Var::recursive("b", Origin::File), Merge::Default)).value, "a");
        assert_eq!(merge_scoped(None, &scoped(Var::recursive("b", Origin::File), Merge::Default)).value, "b");
        assert_eq!(merge_scoped(Some(&base), &scoped(Var::recursive("b", Origin::File), Merge::Replace)).value, "b");
    }

    #[test]
    fn command_line_wins_over_overlay() {
        let base = Var::recursive("cli", Origin::CommandLine);
        let merged = merge_scoped(Some(&base), &scoped(Var::recursive("file", Origin::File), Merge::Replace));
        assert_eq!(merged.value, "cli");
        let merged = merge_scoped(Some(&base), &scoped(Var::recursive("forced", Origin::Override), Merge::Replace));
        assert_eq!(merged.value, "forced");
    }

    #[test]
    fn export_collection() {
        let mut vars = Vars::default();
        vars.insert("HOME", Var::recursive("/root", Origin::Environment));
        vars.insert("LOCAL", Var::recursive("x", Origin::File));
        let mut named = Var::recursive("y", Origin::File);
        named.export = true;
        vars.insert("NAMED", named);

        let mut exports = Exports::default();
        assert_eq!(exports.collect([&vars]), vec!["HOME", "NAMED"]);

        exports.unexport("HOME");
        exports.all = true;
        assert_eq!(exports.collect([&vars]), vec!["LOCAL", "NAMED"]);
    }
}
