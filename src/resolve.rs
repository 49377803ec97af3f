//! Finding the rule that builds a target: explicit rules first, then
//! suffix and pattern rules, the assembler fallback and `.DEFAULT`.

use crate::util;
use crate::pattern;
use crate::error::Result;
use crate::fs::MetadataCache;
use crate::expand::{self, Ctx};
use crate::eval::split_order_only;
use crate::consts::ASM_SOURCES;
use crate::types::StrHashMap;
use crate::scope::{layer, BuildScope, Globals};
use crate::graph::{asm_recipe, Graph, Node, PatternRule};
use crate::vars::Vars;

use std::rc::Rc;

use tracing::trace;

/// Implicit rules may chain through one intermediate file.
const MAX_CHAIN: usize = 1;

#[inline]
fn push_unique(list: &mut Vec::<String>, items: impl IntoIterator::<Item = String>) {
    for item in items {
        if !list.contains(&item) { list.push(item) }
    }
}

pub struct Resolver<'g> {
    graph: &'g Graph,
    memo: StrHashMap::<Option::<Rc::<Node>>>,
}

impl<'g> Resolver<'g> {
    #[inline]
    pub fn new(graph: &'g Graph) -> Self {
        Self { graph, memo: StrHashMap::default() }
    }

    /// The node for `name`, or `None` when no rule can make it.
    pub fn resolve(&mut self, name: &str, globals: &mut Globals, fs: &mut MetadataCache) -> Result::<Option::<Rc::<Node>>> {
        if let Some(hit) = self.memo.get(name) {
            return Ok(hit.clone())
        }
        let node = self.lookup(name, globals, fs)?.map(Rc::new);
        self.memo.insert(name.to_owned(), node.clone());
        Ok(node)
    }

    fn lookup(&self, name: &str, globals: &mut Globals, fs: &mut MetadataCache) -> Result::<Option::<Node>> {
        let explicit = self.graph.node(name).or_else(|| self.graph.node(&util::alt_name(name))).cloned();
        if let Some(node) = &explicit {
            if node.has_recipe() || node.phony || node.double_colon {
                return self.finish(node.clone(), name, globals).map(Some)
            }
        }

        let node = match (explicit, self.infer(name, fs, 0)) {
            (Some(mut node), Some(implicit)) => {
                trace!(node = %name, "explicit target completed by implicit rule");
                let mut deps = implicit.deps;
                push_unique(&mut deps, node.deps);
                node.deps = deps;
                push_unique(&mut node.order_only, implicit.order_only);
                node.recipe = implicit.recipe;
                node.stem = node.stem.or(implicit.stem);
                node.peers = implicit.peers;
                node
            }
            (None, Some(implicit)) => implicit,
            (explicit, None) => match self.graph.default_recipe.as_ref().filter(|r| !r.is_empty()) {
                Some(recipe) => {
                    let mut node = explicit.unwrap_or_else(|| Node::new(name));
                    node.recipe = recipe.clone();
                    node
                }
                None => match explicit {
                    Some(node) => node,
                    None => return Ok(None)
                }
            }
        };
        self.finish(node, name, globals).map(Some)
    }

    /// Whether `name` exists, is an explicit target, or can be inferred.
    fn available(&self, name: &str, fs: &mut MetadataCache, depth: usize) -> bool {
        fs.resolve_path(name).is_some()
            || self.graph.node(name).is_some()
            || (depth < MAX_CHAIN && self.infer(name, fs, depth + 1).is_some())
    }

    fn infer(&self, name: &str, fs: &mut MetadataCache, depth: usize) -> Option::<Node> {
        for rule in self.graph.suffix_rules_for(name) {
            if rule.recipe.is_empty() { continue }
            let (stem, src) = if rule.dst.is_empty() {
                (name, format!("{name}{}", rule.src))
            } else {
                let Some(stem) = name.strip_suffix(rule.dst.as_str()) else { continue };
                (stem, format!("{stem}{}", rule.src))
            };
            if src != name && self.available(&src, fs, depth) {
                trace!(node = %name, src = %src, "suffix rule applies");
                let mut node = Node::new(name);
                node.deps = vec![src];
                node.recipe = rule.recipe.clone();
                node.stem = Some(stem.to_owned());
                node.loc = rule.loc.clone();
                return Some(node)
            }
        }

        let mut candidates = Vec::<(String, &str, &PatternRule)>::new();
        for rule in self.graph.pattern_rules() {
            let found = rule.targets.iter().find_map(|t| pattern::target_stem(t, name));
            if let Some((stem, dir)) = found.filter(|(stem, _)| !stem.is_empty()) {
                candidates.push((stem, dir, rule))
            }
        }
        candidates.sort_by_key(|(stem, ..)| stem.len());

        for (stem, dir, rule) in candidates {
            let deps = rule.prereqs.iter().map(|p| pattern::instantiate(p, &stem, dir)).collect::<Vec<_>>();
            if deps.iter().any(|d| d == name) { continue }
            let usable = deps.iter().all(|d| {
                (self.graph.second_expansion && d.contains('$')) || self.available(d, fs, depth)
            });
            if !usable { continue }

            trace!(node = %name, stem = %stem, "pattern rule applies");
            let mut node = Node::new(name);
            node.deps = deps;
            node.order_only = rule.order_only.iter().map(|p| pattern::instantiate(p, &stem, dir)).collect();
            node.peers = rule.targets.iter()
                .map(|t| pattern::instantiate(t, &stem, dir))
                .filter(|t| t != name)
                .collect();
            node.recipe = rule.recipe.clone();
            node.stem = Some(stem);
            node.loc = rule.loc.clone();
            return Some(node)
        }

        if self.graph.builtin_rules {
            if let Some(base) = name.strip_suffix(".o") {
                for ext in ASM_SOURCES {
                    let src = format!("{base}{ext}");
                    if fs.resolve_path(&src).is_some() {
                        let mut node = Node::new(name);
                        node.deps = vec![src];
                        node.recipe = asm_recipe();
                        node.stem = Some(base.to_owned());
                        return Some(node)
                    }
                }
            }
        }
        None
    }

    /// Attaches target variables and runs the second expansion.
    fn finish(&self, mut node: Node, name: &str, globals: &mut Globals) -> Result::<Node> {
        node.name = name.to_owned();
        if let Some(overlay) = self.graph.target_vars(name) {
            node.vars = overlay.clone()
        }
        if !self.graph.second_expansion {
            return Ok(node)
        }

        let pending = node.deps.iter().any(|d| d.contains('$'));
        if node.second.is_empty() && !pending {
            return Ok(node)
        }

        let mut local = Vars::default();
        layer(&globals.vars, &node.vars, &mut local);
        let mut scope = BuildScope::new(globals, &local);
        let mut ctx = Ctx::at(node.loc.clone());
        ctx.set("@", name);
        ctx.set("*", node.stem.clone().unwrap_or_default());

        let mut deps = Vec::with_capacity(node.deps.len());
        for dep in &node.deps {
            if dep.contains('$') {
                let expanded = expand::expand(&mut scope, dep, &ctx)?;
                let (normal, order_only) = split_order_only(&expanded);
                push_unique(&mut deps, normal);
                push_unique(&mut node.order_only, order_only);
            } else {
                push_unique(&mut deps, [dep.clone()])
            }
        }
        for text in &node.second {
            ctx.set("<", deps.first().cloned().unwrap_or_default());
            ctx.set("^", deps.join(" "));
            let expanded = expand::expand(&mut scope, text, &ctx)?;
            let (normal, order_only) = split_order_only(&expanded);
            push_unique(&mut deps, normal);
            push_unique(&mut node.order_only, order_only);
        }
        node.deps = deps;
        Ok(node)
    }
}
