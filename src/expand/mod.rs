//! Macro expansion: `$(...)` references, substitution references and
//! built-in function calls.

pub mod functions;

use crate::loc::Loc;
use crate::vars::{Origin, Var};
use crate::consts::AUTOMATIC_VARS;
use crate::error::{MakeError, Result};
use crate::text::find_top_level;
use crate::pattern;


use tracing::debug;

/// What an expansion can see and touch.
pub trait Scope {
    fn lookup(&self, name: &str) -> Option::<&Var>;

    /// Feeds `$(eval ...)` text back into the session that owns the scope.
    fn eval(&mut self, text: &str, ctx: &Ctx) -> Result::<()>;

    /// Variables to place in the environment of child processes.
    fn export_names(&self) -> Vec::<String>;

    fn set_shell_status(&mut self, status: i32);

    fn origin(&self, name: &str) -> &'static str {
        match self.lookup(name) {
            Some(var) => var.origin.as_str(),
            None if env_var(name).is_some() => Origin::Environment.as_str(),
            None => "undefined"
        }
    }
}

/// Environment lookup that tolerates names the OS would reject.
#[inline]
pub fn env_var(name: &str) -> Option::<String> {
    if name.is_empty() || name.contains(['=', '\0']) { return None }
    std::env::var(name).ok()
}

/// Expansion-local bindings: automatic variables, `foreach`/`let` variables
/// and `call` parameters, plus the locations errors are reported at.
#[derive(Default)]
pub struct Ctx<'p> {
    parent: Option::<&'p Ctx<'p>>,
    locals: Vec::<(String, String)>,
    /// Hides positional parameters of enclosing calls.
    barrier: bool,
    pub loc: Option::<Loc>,
    pub def_loc: Option::<Loc>,
    pub recipe: bool,
}

impl Ctx<'static> {
    #[inline]
    pub fn at(loc: Option::<Loc>) -> Self {
        Self { loc, ..Self::default() }
    }
}

impl<'p> Ctx<'p> {
    #[inline]
    pub fn child<'c>(&'c self) -> Ctx<'c> {
        Ctx {
            parent: Some(self),
            locals: Vec::new(),
            barrier: false,
            loc: self.loc.clone(),
            def_loc: self.def_loc.clone(),
            recipe: self.recipe,
        }
    }

    /// A child scope for `$(call)`.
    #[inline]
    pub fn call_frame<'c>(&'c self) -> Ctx<'c> {
        let mut ctx = self.child();
        ctx.barrier = true;
        ctx
    }

    #[inline]
    pub fn set(&mut self, name: impl Into::<String>, value: impl Into::<String>) {
        self.locals.push((name.into(), value.into()))
    }

    pub fn get(&self, name: &str) -> Option::<&str> {
        if let Some((_, v)) = self.locals.iter().rev().find(|(n, _)| n == name) {
            return Some(v)
        }
        if self.barrier && name.bytes().all(|b| b.is_ascii_digit()) {
            return None
        }
        self.parent.and_then(|p| p.get(name))
    }

    /// Location for errors raised by a function: the definition of the
    /// variable being expanded when known, else the expansion site.
    #[inline]
    pub fn prefer_def(&self) -> Option::<&Loc> {
        self.def_loc.as_ref().or(self.loc.as_ref())
    }
}

pub struct Expander<'s> {
    scope: &'s mut dyn Scope,
    /// Recursive variables currently being expanded.
    expanding: Vec::<String>,
    exporting: bool,
}

impl<'s> Expander<'s> {
    #[inline]
    pub fn new(scope: &'s mut dyn Scope) -> Self {
        Self { scope, expanding: Vec::new(), exporting: false }
    }

    #[inline]
    pub fn scope(&mut self) -> &mut dyn Scope {
        self.scope
    }

    #[inline]
    pub fn error(&self, ctx: &Ctx, msg: impl std::fmt::Display) -> MakeError {
        MakeError::stop(ctx.loc.as_ref(), msg)
    }

    #[inline]
    pub fn def_error(&self, ctx: &Ctx, msg: impl std::fmt::Display) -> MakeError {
        MakeError::stop(ctx.prefer_def(), msg)
    }

    pub fn expand(&mut self, text: &str, ctx: &Ctx) -> Result::<String> {
        if !text.contains('$') {
            return Ok(text.to_owned())
        }

        let bytes = text.as_bytes();
        let mut out = String::with_capacity(text.len());
        let mut i = 0;
        while let Some(off) = text[i..].find('$') {
            let at = i + off;
            out.push_str(&text[i..at]);
            let Some(next) = text[at + 1..].chars().next() else {
                out.push('$');
                i = text.len();
                break
            };
            match next {
                '$' => {
                    out.push('$');
                    i = at + 2
                }
                '(' | '{' => {
                    let (open, close) = if next == '(' { (b'(', b')') } else { (b'{', b'}') };
                    let mut depth = 1;
                    let mut j = at + 2;
                    while j < bytes.len() {
                        if bytes[j] == open {
                            depth += 1
                        } else if bytes[j] == close {
                            depth -= 1;
                            if depth == 0 { break }
                        }
                        j += 1
                    }
                    if depth != 0 {
                        return Err(self.error(ctx, "unterminated variable reference"))
                    }
                    let value = self.reference(&text[at + 2..j], ctx)?;
                    out.push_str(&value);
                    i = j + 1
                }
                c => {
                    let mut buf = [0; 4];
                    let value = self.var_value(c.encode_utf8(&mut buf), ctx)?;
                    out.push_str(&value);
                    i = at + 1 + c.len_utf8()
                }
            }
        }
        out.push_str(&text[i..]);
        Ok(out)
    }

    /// Evaluates the inside of one `$(...)`.
    fn reference(&mut self, token: &str, ctx: &Ctx) -> Result::<String> {
        if let Some((name, args)) = split_function(token) {
            if let Some(builtin) = functions::lookup(name) {
                if builtin.io {
                    debug!(function = builtin.name, "calling builtin with side effects");
                }
                return (builtin.call)(self, args, ctx)
            }
        }

        let (name, subst) = match find_top_level(token, b':') {
            Some(colon) => {
                let rest = &token[colon + 1..];
                match find_top_level(rest, b'=') {
                    Some(eq) => (&token[..colon], Some((&rest[..eq], &rest[eq + 1..]))),
                    None => (token, None)
                }
            }
            None => (token, None)
        };

        let name = self.expand(name, ctx)?;
        let value = self.var_value(&name, ctx)?;
        match subst {
            Some((from, to)) => {
                let from = self.expand(from, ctx)?;
                let to = self.expand(to, ctx)?;
                Ok(pattern::subst_ref(&value, &from, &to))
            }
            None => Ok(value)
        }
    }

    /// Value of a variable: expansion locals, then the scope, then the
    /// process environment.
    pub fn var_value(&mut self, name: &str, ctx: &Ctx) -> Result::<String> {
        if let Some(v) = ctx.get(name) {
            return Ok(v.to_owned())
        }
        match self.scope.lookup(name).cloned() {
            Some(var) => self.expand_var(name, &var, ctx),
            None if AUTOMATIC_VARS.contains(&name) => Ok(String::new()),
            None => Ok(env_var(name).unwrap_or_default())
        }
    }

    pub fn expand_var(&mut self, name: &str, var: &Var, ctx: &Ctx) -> Result::<String> {
        if var.flavor == crate::vars::Flavor::Simple {
            return Ok(var.value.clone())
        }
        if self.expanding.iter().any(|n| n == name) {
            return Err(self.error(ctx, format!("Recursive variable '{name}' references itself (eventually)")))
        }
        self.expanding.push(name.to_owned());
        let mut inner = ctx.child();
        if var.loc.is_some() {
            inner.def_loc = var.loc.clone()
        }
        let r = self.expand(&var.value, &inner);
        self.expanding.pop();
        r
    }

    /// Name/value pairs for a child environment.
    pub fn exported_env(&mut self, ctx: &Ctx) -> Result::<Vec::<(String, String)>> {
        if self.exporting {
            return Ok(Vec::new())
        }
        self.exporting = true;
        let names = self.scope.export_names();
        let mut env = Vec::with_capacity(names.len());
        let mut result = Ok(());
        for name in names {
            match self.var_value(&name, ctx) {
                Ok(value) => env.push((name, value)),
                Err(e) => { result = Err(e); break }
            }
        }
        self.exporting = false;
        result.map(|_| env)
    }
}

/// Splits `name args` for a function call. The name ends at the first blank
/// or comma.
pub fn split_function(token: &str) -> Option::<(&str, &str)> {
    let end = token.find([' ', '\t', ','])?;
    let name = &token[..end];
    if name.is_empty() { return None }
    let rest = &token[end..];
    let args = match rest.strip_prefix(',') {
        Some(args) => args,
        None => rest.trim_start_matches([' ', '\t'])
    };
    Some((name, args))
}

#[inline]
pub fn expand(scope: &mut dyn Scope, text: &str, ctx: &Ctx) -> Result::<String> {
    Expander::new(scope).expand(text, ctx)
}

#[cfg(test)]
pub mod tests {
    use super::*;
    use crate::vars::Vars;

    /// Scope backed by a plain variable table, for unit tests.
    #[derive(Default)]
    pub struct TestScope {
        pub vars: Vars,
        pub evaluated: Vec::<String>,
        pub shell_status: Option::<i32>,
    }

    impl TestScope {
        pub fn with(vars: &[(&str, &str)]) -> Self {
            let mut scope = Self::default();
            for (name, value) in vars {
                scope.vars.insert(*name, Var::recursive(*value, Origin::File));
            }
            scope
        }

        pub fn expand(&mut self, text: &str) -> Result::<String> {
            expand(self, text, &Ctx::default())
        }
    }

    impl Scope for TestScope {
        fn lookup(&self, name: &str) -> Option::<&Var> {
            self.vars.get(name)
        }

        fn eval(&mut self, text: &str, _: &Ctx) -> Result::<()> {
            self.evaluated.push(text.to_owned());
            Ok(())
        }

        fn export_names(&self) -> Vec::<String> {
            Vec::new()
        }

        fn set_shell_status(&mut self, status: i32) {
            self.shell_status = Some(status)
        }
    }

    #[test]
    fn plain_references() {
        let mut scope = TestScope::with(&[("A", "a"), ("B", "$(A)b"), ("X", "x")]);
        assert_eq!(scope.expand("$(B) ${B} $X $$X").unwrap(), "ab ab x $X");
        assert_eq!(scope.expand("$(UNDEFINED_FOR_SURE_42)").unwrap(), "");
        assert_eq!(scope.expand("tail$").unwrap(), "tail$");
    }

    #[test]
    fn computed_names() {
        let mut scope = TestScope::with(&[("which", "A"), ("A_val", "found")]);
        assert_eq!(scope.expand("$($(which)_val)").unwrap(), "found");
    }

    #[test]
    fn substitution_references() {
        let mut scope = TestScope::with(&[("SRC", "a.c b.c")]);
        assert_eq!(scope.expand("$(SRC:.c=.o)").unwrap(), "a.o b.o");
        assert_eq!(scope.expand("$(SRC:%.c=obj/%.o)").unwrap(), "obj/a.o obj/b.o");
    }

    #[test]
    fn simple_values_are_not_reexpanded() {
        let mut scope = TestScope::default();
        scope.vars.insert("S", Var::simple("$(nope)", Origin::File));
        assert_eq!(scope.expand("$(S)").unwrap(), "$(nope)");
    }

    #[test]
    fn self_reference_is_fatal() {
        let mut scope = TestScope::with(&[("A", "$(B)"), ("B", "x $(A)")]);
        let err = scope.expand("$(A)").unwrap_err();
        assert!(err.to_string().contains("Recursive variable 'A' references itself (eventually)"));
    }

    #[test]
    fn unterminated_reference() {
        let mut scope = TestScope::default();
        assert!(scope.expand("$(A").unwrap_err().to_string().contains("unterminated variable reference"));
    }

    #[test]
    fn locals_shadow_scope() {
        let mut scope = TestScope::with(&[("@", "global")]);
        let mut ctx = Ctx::default();
        ctx.set("@", "local");
        assert_eq!(expand(&mut scope, "$@", &ctx).unwrap(), "local");
    }

    #[test]
    fn call_frames_hide_outer_parameters() {
        let mut outer = Ctx::default();
        outer.set("1", "outer");
        outer.set("x", "kept");
        let inner = outer.call_frame();
        assert_eq!(inner.get("1"), None);
        assert_eq!(inner.get("x"), Some("kept"));
    }

    #[test]
    fn function_name_split() {
        assert_eq!(split_function("subst a,b,c"), Some(("subst", "a,b,c")));
        assert_eq!(split_function("info  hi"), Some(("info", "hi")));
        assert_eq!(split_function("FOO"), None);
    }
}
