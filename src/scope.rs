//! Variable scopes seen while prerequisites and recipes are expanded.

use crate::consts::special;
use crate::error::Result;
use crate::eval::Evaluator;
use crate::expand::{Ctx, Scope};
use crate::vars::{merge_scoped, Exports, Origin, Overlay, Var, Vars};

use std::mem;

/// Session-wide state that outlives makefile reading.
#[derive(Default)]
pub struct Globals {
    pub vars: Vars,
    pub exports: Exports,
}

impl Globals {
    #[inline]
    pub fn from_evaluator(ev: &Evaluator) -> Self {
        Self { vars: ev.vars.clone(), exports: ev.exports.clone() }
    }
}

/// Applies `overlay` on top of `into`, falling back to `base` for names
/// `into` does not define yet.
pub fn layer(base: &Vars, overlay: &Overlay, into: &mut Vars) {
    for (name, scoped) in overlay {
        let merged = merge_scoped(into.get(name).or_else(|| base.get(name)), scoped);
        into.insert(name.as_str(), merged)
    }
}

/// Target-local definitions over the global store.
pub struct BuildScope<'a> {
    globals: &'a mut Globals,
    local: &'a Vars,
}

impl<'a> BuildScope<'a> {
    #[inline]
    pub fn new(globals: &'a mut Globals, local: &'a Vars) -> Self {
        Self { globals, local }
    }
}

impl Scope for BuildScope<'_> {
    #[inline]
    fn lookup(&self, name: &str) -> Option::<&Var> {
        self.local.get(name).or_else(|| self.globals.vars.get(name))
    }

    fn eval(&mut self, text: &str, ctx: &Ctx) -> Result::<()> {
        let vars = mem::take(&mut self.globals.vars);
        let exports = mem::take(&mut self.globals.exports);
        let mut ev = Evaluator::with_vars(vars, exports);
        let result = Scope::eval(&mut ev, text, ctx);
        self.globals.vars = ev.vars;
        self.globals.exports = ev.exports;
        result
    }

    #[inline]
    fn export_names(&self) -> Vec::<String> {
        self.globals.exports.collect([&self.globals.vars, self.local])
    }

    #[inline]
    fn set_shell_status(&mut self, status: i32) {
        self.globals.vars.insert(special::SHELLSTATUS, Var::simple(status.to_string(), Origin::Default))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expand;
    use crate::vars::{Merge, ScopedVar};

    fn overlay(entries: &[(&str, &str, Merge)]) -> Overlay {
        entries.iter().map(|(name, value, merge)| {
            ((*name).to_owned(), ScopedVar { var: Var::recursive(*value, Origin::File), merge: *merge })
        }).collect()
    }

    #[test]
    fn local_definitions_shadow_globals() {
        let mut globals = Globals::default();
        globals.vars.insert("CFLAGS", Var::recursive("-O2", Origin::File));
        globals.vars.insert("CC", Var::recursive("cc", Origin::File));

        let mut local = Vars::default();
        layer(&globals.vars, &overlay(&[("CFLAGS", "-g", Merge::Append)]), &mut local);
        let mut scope = BuildScope::new(&mut globals, &local);
        assert_eq!(expand::expand(&mut scope, "$(CC) $(CFLAGS)", &Ctx::default()).unwrap(), "cc -O2 -g");
    }

    #[test]
    fn layers_stack_in_order() {
        let base = Vars::default();
        let mut local = Vars::default();
        layer(&base, &overlay(&[("X", "pattern", Merge::Replace)]), &mut local);
        layer(&base, &overlay(&[("X", "target", Merge::Append), ("Y", "y", Merge::Default)]), &mut local);
        assert_eq!(local.get("X").unwrap().value, "pattern target");
        assert_eq!(local.get("Y").unwrap().value, "y");
    }

    #[test]
    fn recipe_eval_updates_globals() {
        let mut globals = Globals::default();
        let local = Vars::default();
        let mut scope = BuildScope::new(&mut globals, &local);
        expand::expand(&mut scope, "$(eval GENERATED := yes)", &Ctx::default()).unwrap();
        assert_eq!(globals.vars.get("GENERATED").unwrap().value, "yes");
    }
}
