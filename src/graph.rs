use crate::loc::Loc;
use crate::util;
use crate::eval::Evaluator;
use crate::vars::Overlay;
use crate::consts::{ASM_RECIPE, BUILTIN_PATTERN_RULES};
use crate::types::{StrHashMap, StrHashSet, StrIndexMap, StrIndexSet};

#[cfg(feature = "dbg")]
use tramer::tramer;

#[derive(Clone)]
#[cfg_attr(any(test, feature = "dbg"), derive(Debug))]
pub struct RecipeLine {
    pub text: String,
    pub loc: Loc,
}

pub type Recipe = Vec::<RecipeLine>;

#[inline]
pub fn recipe_is_blank(recipe: &[RecipeLine]) -> bool {
    recipe.iter().all(|line| {
        let t = line.text.trim();
        t.is_empty() || t.starts_with('#')
    })
}

/// An explicit rule as read from a makefile.
#[derive(Clone)]
#[cfg_attr(any(test, feature = "dbg"), derive(Debug))]
pub struct Rule {
    pub targets: Vec::<String>,
    pub prereqs: Vec::<String>,
    pub order_only: Vec::<String>,
    pub recipe: Recipe,
    pub double_colon: bool,
    pub grouped: bool,
    /// Set for rules produced by a static pattern.
    pub stem: Option::<String>,
    /// Prerequisite text awaiting `.SECONDEXPANSION`.
    pub second: Option::<String>,
    pub loc: Loc,
}

/// `.c.o:` or the single-suffix `.c:` form (empty `dst`).
#[derive(Clone)]
#[cfg_attr(any(test, feature = "dbg"), derive(Debug))]
pub struct SuffixRule {
    pub src: String,
    pub dst: String,
    pub recipe: Recipe,
    pub loc: Option::<Loc>,
}

#[derive(Clone)]
#[cfg_attr(any(test, feature = "dbg"), derive(Debug))]
pub struct PatternRule {
    pub targets: Vec::<String>,
    pub prereqs: Vec::<String>,
    pub order_only: Vec::<String>,
    pub recipe: Recipe,
    pub loc: Option::<Loc>,
}

#[derive(Clone, Default)]
#[cfg_attr(any(test, feature = "dbg"), derive(Debug))]
pub struct Node {
    pub name: String,
    pub deps: Vec::<String>,
    pub order_only: Vec::<String>,
    pub recipe: Recipe,
    pub phony: bool,
    pub precious: bool,
    pub double_colon: bool,
    /// Target-specific overlay, attached at resolution time.
    pub vars: Overlay,
    /// Other targets of the same grouped rule.
    pub peers: Vec::<String>,
    pub stem: Option::<String>,
    pub second: Vec::<String>,
    pub loc: Option::<Loc>,
}

impl Node {
    #[inline]
    pub fn new(name: impl Into::<String>) -> Self {
        Self { name: name.into(), ..Self::default() }
    }

    #[inline]
    pub fn has_recipe(&self) -> bool {
        !self.recipe.is_empty()
    }
}

#[derive(Clone, Default)]
#[cfg_attr(any(test, feature = "dbg"), derive(Debug))]
pub enum Silent {
    #[default]
    None,
    All,
    Targets(StrHashSet),
}

#[derive(Default)]
#[cfg_attr(any(test, feature = "dbg"), derive(Debug))]
pub struct Graph {
    nodes: StrIndexMap::<Node>,
    target_vars: StrHashMap::<Overlay>,
    pattern_vars: Vec::<(String, Overlay)>,
    suffix_rules: Vec::<SuffixRule>,
    suffix_by_dst: StrHashMap::<Vec::<usize>>,
    pattern_rules: Vec::<PatternRule>,
    /// `None` until `.SUFFIXES` is declared.
    pub suffixes: Option::<Vec::<String>>,
    pub default_recipe: Option::<Recipe>,
    pub vpaths: Vec::<(String, Vec::<String>)>,
    pub delete_on_error: bool,
    pub second_expansion: bool,
    pub not_parallel: bool,
    pub builtin_rules: bool,
    pub silent: Silent,
}

impl Graph {
    /// Merges one explicit rule into the nodes of its targets.
    pub fn add_rule(&mut self, rule: &Rule, phony: &StrIndexSet, precious: &StrIndexSet) {
        for target in &rule.targets {
            let node = self.nodes.entry(target.clone()).or_insert_with(|| Node::new(target.as_str()));
            node.phony |= phony.contains(target);
            node.precious |= precious.contains(target);
            node.double_colon |= rule.double_colon;
            if node.loc.is_none() { node.loc = Some(rule.loc.clone()) }

            for dep in &rule.prereqs {
                if !node.deps.contains(dep) { node.deps.push(dep.clone()) }
            }
            for dep in &rule.order_only {
                if !node.order_only.contains(dep) { node.order_only.push(dep.clone()) }
            }
            if let Some(second) = &rule.second {
                node.second.push(second.clone())
            }
            if rule.stem.is_some() {
                node.stem = rule.stem.clone()
            }
            if rule.grouped {
                node.peers = rule.targets.iter().filter(|t| *t != target).cloned().collect()
            }

            if rule.recipe.is_empty() { continue }
            if rule.double_colon {
                node.recipe.extend(rule.recipe.iter().cloned());
                continue
            }
            if let Some(old) = node.recipe.first() {
                report!(Some(&rule.recipe[0].loc), "warning: overriding recipe for target '{target}'");
                report!(Some(&old.loc), "warning: ignoring old recipe for target '{target}'");
            }
            node.recipe = rule.recipe.clone()
        }
    }

    pub fn add_suffix_rule(&mut self, rule: SuffixRule) {
        let existing = self.suffix_rules.iter().position(|r| r.src == rule.src && r.dst == rule.dst);
        match existing {
            Some(i) => self.suffix_rules[i] = rule,
            None => {
                self.suffix_by_dst.entry(rule.dst.clone()).or_default().push(self.suffix_rules.len());
                self.suffix_rules.push(rule)
            }
        }
    }

    /// A pattern rule without a recipe cancels the matching earlier rules.
    pub fn add_pattern_rule(&mut self, rule: PatternRule) {
        if rule.recipe.is_empty() {
            self.pattern_rules.retain(|r| r.targets != rule.targets || r.prereqs != rule.prereqs);
            return
        }
        self.pattern_rules.push(rule)
    }

    #[inline]
    pub fn node(&self, name: &str) -> Option::<&Node> {
        self.nodes.get(name)
    }

    #[inline]
    pub fn target_vars(&self, name: &str) -> Option::<&Overlay> {
        self.target_vars.get(name)
    }

    #[inline]
    pub fn pattern_vars(&self) -> &[(String, Overlay)] {
        &self.pattern_vars
    }

    #[inline]
    pub fn pattern_rules(&self) -> &[PatternRule] {
        &self.pattern_rules
    }

    #[inline]
    fn suffix_known(&self, suffix: &str) -> bool {
        self.suffixes.as_ref().map_or(true, |list| list.iter().any(|s| s == suffix))
    }

    /// Suffix rules able to produce `target`, double-suffix ones first.
    pub fn suffix_rules_for(&self, target: &str) -> Vec::<&SuffixRule> {
        if self.suffixes.as_ref().map_or(false, |list| list.is_empty()) {
            return Vec::new()
        }
        let double = util::suffix_word(target)
            .and_then(|dst| self.suffix_by_dst.get(dst))
            .into_iter()
            .flatten();
        let single = self.suffix_by_dst.get("").into_iter().flatten();
        double.chain(single)
            .map(|&i| &self.suffix_rules[i])
            .filter(|r| self.suffix_known(&r.src) && (r.dst.is_empty() || self.suffix_known(&r.dst)))
            .filter(|r| target.len() > r.dst.len())
            .collect()
    }
}

fn builtin_pattern_rules() -> impl Iterator::<Item = PatternRule> {
    BUILTIN_PATTERN_RULES.iter().map(|(target, prereq, recipe)| PatternRule {
        targets: vec![(*target).to_owned()],
        prereqs: vec![(*prereq).to_owned()],
        order_only: Vec::new(),
        recipe: vec![RecipeLine { text: (*recipe).to_owned(), loc: Loc::new(&"<builtin>".into(), 0) }],
        loc: None,
    })
}

/// Recipe for an object built from an assembler source when no rule applies.
#[inline]
pub fn asm_recipe() -> Recipe {
    vec![RecipeLine { text: ASM_RECIPE.to_owned(), loc: Loc::new(&"<builtin>".into(), 0) }]
}

#[cfg_attr(feature = "dbg", tramer("nanos"))]
pub fn build_dependency_graph(ev: &Evaluator) -> Graph {
    let mut graph = Graph {
        suffixes: ev.suffixes.clone(),
        default_recipe: ev.default_recipe.clone(),
        vpaths: ev.vpaths.clone(),
        delete_on_error: ev.specials.delete_on_error,
        second_expansion: ev.specials.second_expansion,
        not_parallel: ev.specials.not_parallel,
        builtin_rules: ev.builtin_rules,
        silent: ev.specials.silent.clone(),
        ..Graph::default()
    };

    for rule in &ev.rules {
        graph.add_rule(rule, &ev.specials.phony, &ev.specials.precious)
    }
    for name in &ev.specials.phony {
        graph.nodes.entry(name.clone()).or_insert_with(|| Node::new(name.as_str())).phony = true
    }
    for rule in &ev.suffix_rules {
        graph.add_suffix_rule(rule.clone())
    }
    for rule in &ev.pattern_rules {
        graph.add_pattern_rule(rule.clone())
    }
    if ev.builtin_rules {
        for rule in builtin_pattern_rules() {
            graph.add_pattern_rule(rule)
        }
    }
    graph.target_vars = ev.target_vars.iter().map(|(k, v)| (k.clone(), v.clone())).collect();
    graph.pattern_vars = ev.pattern_vars.clone();
    graph
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::Arc;

    fn loc(line: usize) -> Loc {
        Loc::new(&Arc::from("Makefile"), line)
    }

    fn rule(targets: &[&str], prereqs: &[&str], recipe: &[&str]) -> Rule {
        Rule {
            targets: targets.iter().map(|s| s.to_string()).collect(),
            prereqs: prereqs.iter().map(|s| s.to_string()).collect(),
            order_only: Vec::new(),
            recipe: recipe.iter().map(|t| RecipeLine { text: t.to_string(), loc: loc(2) }).collect(),
            double_colon: false,
            grouped: false,
            stem: None,
            second: None,
            loc: loc(1),
        }
    }

    #[test]
    fn rules_merge_prerequisites() {
        let mut graph = Graph::default();
        let none = StrIndexSet::default();
        graph.add_rule(&rule(&["a", "b"], &["x"], &[]), &none, &none);
        graph.add_rule(&rule(&["a"], &["y", "x"], &["cc"]), &none, &none);
        assert_eq!(graph.node("a").unwrap().deps, vec!["x", "y"]);
        assert_eq!(graph.node("b").unwrap().deps, vec!["x"]);
        assert!(graph.node("a").unwrap().has_recipe());
        assert!(!graph.node("b").unwrap().has_recipe());
    }

    #[test]
    fn later_recipe_wins() {
        let mut graph = Graph::default();
        let none = StrIndexSet::default();
        graph.add_rule(&rule(&["a"], &[], &["first"]), &none, &none);
        graph.add_rule(&rule(&["a"], &[], &["second"]), &none, &none);
        assert_eq!(graph.node("a").unwrap().recipe[0].text, "second");
    }

    #[test]
    fn grouped_targets_know_their_peers() {
        let mut graph = Graph::default();
        let none = StrIndexSet::default();
        let mut r = rule(&["x.h", "x.c"], &["x.y"], &["yacc"]);
        r.grouped = true;
        graph.add_rule(&r, &none, &none);
        assert_eq!(graph.node("x.c").unwrap().peers, vec!["x.h"]);
    }

    #[test]
    fn suffix_rule_lookup() {
        let mut graph = Graph::default();
        graph.add_suffix_rule(SuffixRule { src: ".c".into(), dst: ".o".into(), recipe: Vec::new(), loc: None });
        graph.add_suffix_rule(SuffixRule { src: ".sh".into(), dst: String::new(), recipe: Vec::new(), loc: None });
        let found = graph.suffix_rules_for("main.o").iter().map(|r| r.src.as_str()).collect::<Vec<_>>();
        assert_eq!(found, vec![".c", ".sh"]);

        graph.suffixes = Some(vec![".c".into()]);
        assert!(graph.suffix_rules_for("main.o").is_empty());

        graph.suffixes = Some(Vec::new());
        assert!(graph.suffix_rules_for("main.o").is_empty());
    }

    #[test]
    fn recipeless_pattern_rule_cancels() {
        let mut graph = Graph::default();
        let pattern = |recipe: &[&str]| PatternRule {
            targets: vec!["%.o".into()],
            prereqs: vec!["%.c".into()],
            order_only: Vec::new(),
            recipe: recipe.iter().map(|t| RecipeLine { text: t.to_string(), loc: loc(1) }).collect(),
            loc: None,
        };
        graph.add_pattern_rule(pattern(&["cc"]));
        assert_eq!(graph.pattern_rules().len(), 1);
        graph.add_pattern_rule(pattern(&[]));
        assert!(graph.pattern_rules().is_empty());
    }

    #[test]
    fn blank_recipes() {
        let blank = vec![RecipeLine { text: "  ".into(), loc: loc(1) }, RecipeLine { text: "# note".into(), loc: loc(2) }];
        assert!(recipe_is_blank(&blank));
        assert!(!recipe_is_blank(&[RecipeLine { text: "true".into(), loc: loc(1) }]));
    }
}
