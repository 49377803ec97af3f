//! Bringing targets up to date: staleness, automatic variables, the serial
//! walk and the parallel plan.

use crate::util;
use crate::pattern;
use crate::mode::Mode;
use crate::fs::MetadataCache;
use crate::resolve::Resolver;
use crate::error::{MakeError, Result};
use crate::expand::{self, Ctx, Expander};
use crate::consts::{special, DEFAULT_SHELL, DEFAULT_SUFFIXES};
use crate::graph::{recipe_is_blank, Graph, Node, Silent};
use crate::scope::{layer, BuildScope, Globals};
use crate::shell::{self, Command, Outcome, Recipe, Settings};
use crate::types::{StrHashMap, StrHashSet};
use crate::vars::Vars;

use std::io;
use std::ptr;
use std::rc::Rc;
use std::sync::Arc;
use std::fs::{self, OpenOptions};
use std::os::fd::AsRawFd;
use std::time::SystemTime;
use std::collections::VecDeque;

use fxhash::FxHashSet;
use crossbeam_channel::{unbounded, Receiver, Sender};
use tracing::{debug, trace};

#[cfg(feature = "dbg")]
use tramer::tramer;

#[derive(Clone, Copy, PartialEq, Eq)]
#[cfg_attr(any(test, feature = "dbg"), derive(Debug))]
pub enum Status { Ok, Failed }

#[derive(Clone, Copy, PartialEq, Eq)]
#[cfg_attr(any(test, feature = "dbg"), derive(Debug))]
enum State { Building, Done, Failed }

impl From::<Status> for State {
    #[inline]
    fn from(s: Status) -> Self {
        match s { Status::Ok => State::Done, Status::Failed => State::Failed }
    }
}

/// What to do with a node once its prerequisites are settled.
enum Job {
    Done(Status),
    Run(Recipe, Option::<SystemTime>),
}

enum Launch {
    Running,
    Waiting,
    Done(Status),
}

/// Updates both timestamps of `path` to now, creating it when missing.
fn touch(path: &str) -> io::Result::<()> {
    let file = OpenOptions::new().create(true).append(true).open(path)?;
    if unsafe { libc::futimens(file.as_raw_fd(), ptr::null()) } != 0 {
        return Err(io::Error::last_os_error())
    }
    Ok(())
}

#[inline]
fn dedup(words: &[String]) -> Vec::<String> {
    let mut seen = FxHashSet::default();
    words.iter().filter(|w| seen.insert(w.as_str())).cloned().collect()
}

struct Task {
    name: String,
    node: Option::<Rc::<Node>>,
    deps: Vec::<usize>,
    dependents: Vec::<usize>,
    pending: usize,
    dep_failed: bool,
    missing: bool,
    done: bool,
    status: Status,
    /// Grouped peers waiting on this task's recipe.
    followers: Vec::<usize>,
    before: Option::<SystemTime>,
}

impl Task {
    fn new(name: &str, node: Option::<Rc::<Node>>) -> Self {
        Self {
            name: name.to_owned(),
            node,
            deps: Vec::new(),
            dependents: Vec::new(),
            pending: 0,
            dep_failed: false,
            missing: false,
            done: false,
            status: Status::Ok,
            followers: Vec::new(),
            before: None,
        }
    }
}

/// Every node reachable from one goal, as an arena with pending counts.
#[derive(Default)]
struct Plan {
    tasks: Vec::<Task>,
    index: StrHashMap::<usize>,
    /// Post-order of discovery; fixes ready-queue and cycle-search order.
    order: Vec::<usize>,
    ready: VecDeque::<usize>,
    remaining: usize,
    stop: bool,
}

impl Plan {
    fn add_edge(&mut self, from: usize, to: usize) {
        if self.tasks[from].deps.contains(&to) { return }
        self.tasks[from].deps.push(to);
        self.tasks[from].pending += 1;
        self.tasks[to].dependents.push(from);
    }

    fn complete(&mut self, i: usize, status: Status, keep_going: bool) {
        let mut work = vec![(i, status)];
        while let Some((i, status)) = work.pop() {
            if self.tasks[i].done { continue }
            let task = &mut self.tasks[i];
            task.done = true;
            task.status = status;
            self.remaining -= 1;
            if status == Status::Failed && !keep_going {
                self.stop = true
            }
            work.extend(std::mem::take(&mut task.followers).into_iter().map(|f| (f, status)));
            for d in self.tasks[i].dependents.clone() {
                let dependent = &mut self.tasks[d];
                dependent.pending = dependent.pending.saturating_sub(1);
                dependent.dep_failed |= status == Status::Failed;
                if dependent.pending == 0 && !dependent.done {
                    self.ready.push_back(d)
                }
            }
        }
    }

    /// Drops one edge of a cycle among unfinished tasks. Returns the
    /// `(dependent, prerequisite)` names of the dropped edge.
    fn break_cycle(&mut self) -> Option::<(String, String)> {
        let start = self.order.iter().copied().find(|&i| !self.tasks[i].done)?;
        let mut path = vec![start];
        let mut on_path = FxHashSet::default();
        on_path.insert(start);
        loop {
            let cur = *path.last()?;
            let next = self.tasks[cur].deps.iter().copied().find(|&d| !self.tasks[d].done);
            let Some(next) = next else {
                self.tasks[cur].pending = 0;
                self.ready.push_back(cur);
                return None
            };
            if on_path.contains(&next) {
                self.tasks[cur].deps.retain(|&d| d != next);
                self.tasks[next].dependents.retain(|&d| d != cur);
                let task = &mut self.tasks[cur];
                task.pending = task.pending.saturating_sub(1);
                if task.pending == 0 {
                    self.ready.push_back(cur)
                }
                return Some((self.tasks[cur].name.clone(), self.tasks[next].name.clone()))
            }
            on_path.insert(next);
            path.push(next);
        }
    }
}

pub struct Options<'a> {
    pub mode: Mode,
    /// Zero means no limit.
    pub jobs: usize,
    pub what_if: &'a [String],
    pub level: usize,
}

pub struct Scheduler<'g> {
    graph: &'g Graph,
    globals: &'g mut Globals,
    resolver: Resolver<'g>,
    fs: MetadataCache,

    mode: Mode,
    jobs: usize,
    level: usize,
    make: String,
    settings: Arc::<Settings>,
    what_if: StrHashSet,

    state: StrHashMap::<State>,
    /// The sole target that requested each node; `None` once shared.
    parents: StrHashMap::<Option::<String>>,
    locals: StrHashMap::<Rc::<Vars>>,
    inheriting: StrHashSet,
    /// Targets remade this run (or that would have been, without `-n`).
    updated: StrHashSet,
    started: usize,
    stale: bool,

    done_tx: Sender::<(usize, Outcome)>,
    done_rx: Receiver::<(usize, Outcome)>,
}

impl<'g> Scheduler<'g> {
    pub fn new(graph: &'g Graph, globals: &'g mut Globals, options: Options) -> Result::<Self> {
        let empty = Vars::default();
        let (vpath, make) = {
            let mut scope = BuildScope::new(&mut *globals, &empty);
            let ctx = Ctx::default();
            let vpath = expand::expand(&mut scope, "$(VPATH)", &ctx)?;
            let make = expand::expand(&mut scope, "$(MAKE)", &ctx)?;
            (vpath, make)
        };
        let vpath_dirs = vpath.split([':', ' ', '\t']).filter(|d| !d.is_empty()).map(|d| d.to_owned()).collect();

        let settings = Settings {
            dry_run: options.mode.dry_run(),
            ignore_errors: options.mode.ignore_errors(),
        };
        let jobs = if graph.not_parallel { 1 } else { options.jobs };
        let (done_tx, done_rx) = unbounded();
        Ok(Self {
            graph,
            globals,
            resolver: Resolver::new(graph),
            fs: MetadataCache::new(graph.vpaths.clone(), vpath_dirs),
            mode: options.mode,
            jobs,
            level: options.level,
            make,
            settings: Arc::new(settings),
            what_if: options.what_if.iter().cloned().collect(),
            state: StrHashMap::default(),
            parents: StrHashMap::default(),
            locals: StrHashMap::default(),
            inheriting: StrHashSet::default(),
            updated: StrHashSet::default(),
            started: 0,
            stale: false,
            done_tx,
            done_rx,
        })
    }

    /// Recipes started so far, touches and dry-run echoes included.
    #[inline]
    pub fn started(&self) -> usize {
        self.started
    }

    /// Question mode found something out of date.
    #[inline]
    pub fn stale(&self) -> bool {
        self.stale
    }

    #[inline]
    pub fn remade(&self, name: &str) -> bool {
        self.updated.contains(name)
    }

    pub fn has_recipe(&mut self, name: &str) -> bool {
        matches!(self.resolve(name), Ok(Some(node)) if node.has_recipe())
    }

    /// Whether a rule or the file itself can provide `name`.
    pub fn can_make(&mut self, name: &str) -> bool {
        matches!(self.resolve(name), Ok(Some(_))) || self.fs.resolve_path(name).is_some()
    }

    #[inline]
    fn resolve(&mut self, name: &str) -> Result::<Option::<Rc::<Node>>> {
        self.resolver.resolve(name, &mut *self.globals, &mut self.fs)
    }

    #[cfg_attr(feature = "dbg", tramer("millis"))]
    pub fn build(&mut self, goal: &str) -> Status {
        if self.jobs == 1 {
            self.update(goal, None)
        } else {
            self.build_parallel(goal)
        }
    }

    fn note_parent(&mut self, name: &str, parent: Option::<&str>) {
        match self.parents.get_mut(name) {
            None => { self.parents.insert(name.to_owned(), parent.map(|p| p.to_owned())); }
            Some(seen) if seen.as_deref() != parent => *seen = None,
            Some(_) => {}
        }
    }

    fn no_rule(&mut self, name: &str, parent: Option::<&str>) -> Status {
        if self.fs.resolve_path(name).is_some() {
            return Status::Ok
        }
        let msg = match parent {
            Some(parent) => format!("No rule to make target '{name}', needed by '{parent}'"),
            None => format!("No rule to make target '{name}'")
        };
        if self.mode.keep_going() {
            report_prog!("*** {msg}.")
        } else {
            report_prog!("*** {msg}.  Stop.")
        }
        Status::Failed
    }

    fn update(&mut self, name: &str, parent: Option::<&str>) -> Status {
        match self.state.get(name) {
            Some(State::Done) => return Status::Ok,
            Some(State::Failed) => return Status::Failed,
            Some(State::Building) => {
                if let Some(parent) = parent {
                    debug!(node = %parent, dep = %name, "dropping cycle edge");
                    report_prog!("Circular {parent} <- {name} dependency dropped.");
                }
                return Status::Ok
            }
            None => {}
        }
        self.state.insert(name.to_owned(), State::Building);
        self.note_parent(name, parent);

        let status = self.update_node(name, parent);
        if self.state.get(name) == Some(&State::Building) {
            self.state.insert(name.to_owned(), status.into());
        }
        status
    }

    fn update_node(&mut self, name: &str, parent: Option::<&str>) -> Status {
        let node = match self.resolve(name) {
            Ok(Some(node)) => node,
            Ok(None) => return self.no_rule(name, parent),
            Err(e) => {
                e.report();
                return Status::Failed
            }
        };
        trace!(node = %name, "considering");

        let mut failed = false;
        for dep in node.deps.iter().chain(node.order_only.iter()) {
            if self.update(dep, Some(name)) == Status::Failed {
                failed = true;
                if !self.mode.keep_going() { break }
            }
        }
        if failed {
            return Status::Failed
        }

        match self.prepare(&node) {
            Job::Done(status) => status,
            Job::Run(recipe, before) => {
                let outcome = shell::run_recipe(&recipe, &self.settings);
                self.finish_recipe(&node, outcome, before)
            }
        }
    }

    #[inline]
    fn hypothetical(&self) -> bool {
        self.mode.dry_run() || self.mode.question()
    }

    /// Whether `node`'s recipe has to run.
    fn need_build(&mut self, node: &Node) -> bool {
        if node.phony || self.mode.always_make() {
            return true
        }
        if node.double_colon && node.deps.is_empty() {
            return true
        }
        let path = self.fs.path_of(&node.name);
        let Some(target) = self.fs.mtime(&path) else {
            trace!(node = %node.name, "target missing");
            return true
        };
        for dep in &node.deps {
            if self.what_if.contains(dep) || (self.hypothetical() && self.updated.contains(dep)) {
                return true
            }
            if self.graph.node(dep).map_or(false, |n| n.phony) {
                return true
            }
            let dep_path = self.fs.path_of(dep);
            match self.fs.mtime(&dep_path) {
                Some(m) if m <= target => {}
                _ => {
                    trace!(node = %node.name, dep = %dep, "prerequisite is newer");
                    return true
                }
            }
        }
        false
    }

    fn prepare(&mut self, node: &Node) -> Job {
        if !self.need_build(node) {
            trace!(node = %node.name, "up to date");
            return Job::Done(Status::Ok)
        }
        if recipe_is_blank(&node.recipe) {
            if self.hypothetical() && node.deps.iter().any(|d| self.updated.contains(d)) {
                self.updated.insert(node.name.clone());
            }
            return Job::Done(Status::Ok)
        }
        if self.mode.question() {
            debug!(node = %node.name, "out of date");
            self.stale = true;
            self.updated.insert(node.name.clone());
            return Job::Done(Status::Ok)
        }
        if self.mode.touch() && !self.mode.dry_run() {
            self.started += 1;
            if node.phony {
                return Job::Done(Status::Ok)
            }
            if !self.mode.silent() {
                println!("touch {}", node.name)
            }
            if let Err(e) = touch(&node.name) {
                report_prog!("*** {}", MakeError::io(node.name.as_str(), e));
                return Job::Done(Status::Failed)
            }
            self.fs.invalidate(&node.name);
            self.updated.insert(node.name.clone());
            return Job::Done(Status::Ok)
        }

        let recipe = match self.expand_recipe(node) {
            Ok(recipe) => recipe,
            Err(e) => {
                e.report();
                return Job::Done(Status::Failed)
            }
        };
        self.started += 1;
        debug!(node = %node.name, "launching");

        if self.mode.dry_run() && !recipe.has_recursive() {
            for cmd in &recipe.commands {
                println!("{}", cmd.text)
            }
            self.updated.insert(node.name.clone());
            return Job::Done(Status::Ok)
        }

        self.fs.invalidate(&node.name);
        let before = self.fs.mtime(&node.name);
        Job::Run(recipe, before)
    }

    fn finish_recipe(&mut self, node: &Node, outcome: Outcome, before: Option::<SystemTime>) -> Status {
        let name = node.name.as_str();
        self.fs.invalidate(name);
        for peer in &node.peers {
            self.fs.invalidate(peer)
        }
        let after = self.fs.mtime(name);
        match outcome {
            Outcome::Ok => debug!(node = %name, "finished"),
            Outcome::Failed(code) => debug!(node = %name, code, "failed")
        }

        match outcome {
            Outcome::Ok => {
                // A recipe that left the timestamp alone does not make
                // dependents stale.
                if before.is_some() && before == after && !self.mode.dry_run() {
                    debug!(node = %name, "timestamp unchanged");
                } else {
                    self.updated.insert(name.to_owned());
                }
                for peer in &node.peers {
                    self.state.insert(peer.clone(), State::Done);
                    self.updated.insert(peer.clone());
                }
                Status::Ok
            }
            Outcome::Failed(_) => {
                if self.graph.delete_on_error && !node.precious && !node.phony && after.is_some() && after != before {
                    report_prog!("*** Deleting file '{name}'");
                    if let Err(e) = fs::remove_file(name) {
                        report_prog!("{}", MakeError::io(name, e));
                    }
                    self.fs.invalidate(name);
                }
                Status::Failed
            }
        }
    }

    /// Target-local variables: inherited from the sole requesting target,
    /// then matching pattern overlays, then the target's own overlay.
    fn local_vars(&mut self, node: &Node) -> Result::<Rc::<Vars>> {
        if let Some(vars) = self.locals.get(&node.name) {
            return Ok(Rc::clone(vars))
        }

        self.inheriting.insert(node.name.clone());
        let parent = self.parents.get(&node.name).cloned().flatten();
        let inherited = match parent {
            Some(parent) if !self.inheriting.contains(&parent) => match self.resolve(&parent)? {
                Some(parent) => Some(self.local_vars(&parent)?),
                None => None
            },
            _ => None
        };
        self.inheriting.remove(&node.name);

        let mut vars = inherited.map(|v| (*v).clone()).unwrap_or_default();
        let graph = self.graph;
        for (pat, overlay) in graph.pattern_vars() {
            if pattern::matches(pat, &node.name) {
                layer(&self.globals.vars, overlay, &mut vars)
            }
        }
        layer(&self.globals.vars, &node.vars, &mut vars);

        let vars = Rc::new(vars);
        self.locals.insert(node.name.clone(), Rc::clone(&vars));
        Ok(vars)
    }

    fn stem_of(&self, node: &Node) -> String {
        if let Some(stem) = &node.stem {
            return stem.clone()
        }
        let known = |s: &str| match &self.graph.suffixes {
            Some(list) => list.iter().any(|k| k == s),
            None => DEFAULT_SUFFIXES.contains(&s)
        };
        match util::suffix_word(&node.name) {
            Some(suffix) if known(suffix) => node.name[..node.name.len() - suffix.len()].to_owned(),
            _ => String::new()
        }
    }

    /// Automatic variables for `node` and their `D`/`F` forms.
    fn automatic(&mut self, node: &Node) -> Ctx<'static> {
        let target = {
            let path = self.fs.path_of(&node.name);
            self.fs.mtime(&path)
        };
        let paths = node.deps.iter().map(|d| self.fs.path_of(d)).collect::<Vec<_>>();
        let mut newer = Vec::new();
        for (dep, path) in node.deps.iter().zip(&paths) {
            let is_newer = match (target, self.fs.mtime(path)) {
                (Some(t), Some(m)) => m > t,
                _ => true
            };
            if is_newer || self.what_if.contains(dep) || (self.hypothetical() && self.updated.contains(dep)) {
                newer.push(path.clone())
            }
        }
        let order_only = node.order_only.iter().map(|d| self.fs.path_of(d)).collect::<Vec<_>>();

        let values = [
            ("@", node.name.clone()),
            ("<", paths.first().cloned().unwrap_or_default()),
            ("^", dedup(&paths).join(" ")),
            ("+", paths.join(" ")),
            ("?", dedup(&newer).join(" ")),
            ("|", dedup(&order_only).join(" ")),
            ("*", self.stem_of(node)),
        ];

        let mut ctx = Ctx::at(node.loc.clone());
        for (name, value) in values {
            let dirs = value.split_whitespace().map(util::dir_part).collect::<Vec<_>>().join(" ");
            let files = value.split_whitespace().map(util::notdir_word).collect::<Vec<_>>().join(" ");
            ctx.set(format!("{name}D"), dirs);
            ctx.set(format!("{name}F"), files);
            ctx.set(name, value);
        }
        ctx
    }

    #[inline]
    fn invokes_make(&self, raw: &str, expanded: &str) -> bool {
        raw.contains("$(MAKE)") || raw.contains("${MAKE}")
            || (!self.make.is_empty() && expanded.split_whitespace().any(|w| w == self.make))
    }

    fn expand_recipe(&mut self, node: &Node) -> Result::<Recipe> {
        let local = self.local_vars(node)?;
        let mut ctx = self.automatic(node);
        ctx.recipe = true;

        let silent_all = self.mode.silent() || match &self.graph.silent {
            Silent::None => false,
            Silent::All => true,
            Silent::Targets(set) => set.contains(&node.name)
        };

        let mut scope = BuildScope::new(&mut *self.globals, &local);
        let mut lines = Vec::with_capacity(node.recipe.len());
        for line in &node.recipe {
            let (prefixes, raw) = util::strip_cmd_prefixes(&line.text);
            ctx.loc = Some(line.loc.clone());
            let expanded = expand::expand(&mut scope, raw, &ctx)?;
            lines.push((prefixes, raw.to_owned(), expanded, line.loc.clone()));
        }

        let env = Expander::new(&mut scope).exported_env(&ctx)?;
        let shell = expand::expand(&mut scope, "$(SHELL)", &ctx)?;
        let shell_flags = expand::expand(&mut scope, &format!("$({})", special::SHELLFLAGS), &ctx)?;
        drop(scope);

        let mut commands = Vec::new();
        for (prefixes, raw, expanded, loc) in lines {
            for piece in util::split_recipe_lines(&expanded) {
                let (more, text) = util::strip_cmd_prefixes(piece);
                let p = prefixes.merge(more);
                if text.trim().is_empty() { continue }
                commands.push(Command {
                    text: text.to_owned(),
                    silent: p.silent || silent_all,
                    ignore: p.ignore,
                    recursive: p.force || self.invokes_make(&raw, text),
                    loc: loc.clone(),
                })
            }
        }

        let mut env = env.into_iter().filter(|(k, _)| k != "MAKELEVEL").collect::<Vec<_>>();
        env.push(("MAKELEVEL".to_owned(), (self.level + 1).to_string()));

        Ok(Recipe {
            target: node.name.clone(),
            commands,
            env,
            shell: if shell.trim().is_empty() { DEFAULT_SHELL.to_owned() } else { shell.trim().to_owned() },
            shell_flags: shell_flags.split_whitespace().map(|s| s.to_owned()).collect(),
        })
    }

    /// Discovers every node reachable from `goal`. `None` when a missing
    /// prerequisite stops the build before it starts.
    fn plan(&mut self, goal: &str) -> Option::<Plan> {
        let mut plan = Plan::default();
        let mut stack = vec![(goal.to_owned(), None::<String>, false)];
        while let Some((name, parent, post)) = stack.pop() {
            if post {
                if let Some(&i) = plan.index.get(&name) { plan.order.push(i) }
                continue
            }
            self.note_parent(&name, parent.as_deref());
            if plan.index.contains_key(&name) || self.state.contains_key(&name) {
                continue
            }

            let node = match self.resolve(&name) {
                Ok(node) => node,
                Err(e) => {
                    e.report();
                    return None
                }
            };
            let i = plan.tasks.len();
            let mut task = Task::new(&name, node.clone());
            if node.is_none() && self.fs.resolve_path(&name).is_none() {
                self.no_rule(&name, parent.as_deref());
                if !self.mode.keep_going() {
                    return None
                }
                task.missing = true
            }
            plan.tasks.push(task);
            plan.index.insert(name.clone(), i);

            stack.push((name.clone(), parent, true));
            if let Some(node) = node {
                for dep in node.deps.iter().chain(node.order_only.iter()).rev() {
                    stack.push((dep.clone(), Some(name.clone()), false))
                }
            }
        }

        for i in 0..plan.tasks.len() {
            let Some(node) = plan.tasks[i].node.clone() else { continue };
            for dep in node.deps.iter().chain(node.order_only.iter()) {
                match plan.index.get(dep).copied() {
                    Some(j) if j == i => {
                        report_prog!("Circular {dep} <- {dep} dependency dropped.")
                    }
                    Some(j) => plan.add_edge(i, j),
                    None => if self.state.get(dep) == Some(&State::Failed) {
                        plan.tasks[i].dep_failed = true
                    }
                }
            }
        }

        plan.remaining = plan.tasks.len();
        plan.ready = plan.order.iter().copied().filter(|&i| plan.tasks[i].pending == 0).collect();
        Some(plan)
    }

    fn launch(&mut self, plan: &mut Plan, i: usize, claimed: &mut StrHashMap::<usize>) -> Launch {
        let task = &plan.tasks[i];
        if task.dep_failed || task.missing {
            return Launch::Done(Status::Failed)
        }
        let name = task.name.clone();
        match self.state.get(&name) {
            Some(State::Done) => return Launch::Done(Status::Ok),
            Some(State::Failed) => return Launch::Done(Status::Failed),
            _ => {}
        }
        if let Some(&builder) = claimed.get(&name) {
            if builder != i {
                if plan.tasks[builder].done {
                    return Launch::Done(plan.tasks[builder].status)
                }
                plan.tasks[builder].followers.push(i);
                return Launch::Waiting
            }
        }
        let Some(node) = plan.tasks[i].node.clone() else {
            return Launch::Done(Status::Ok)
        };
        trace!(node = %name, "considering");
        for peer in &node.peers {
            claimed.insert(peer.clone(), i);
        }

        match self.prepare(&node) {
            Job::Done(status) => Launch::Done(status),
            Job::Run(recipe, before) => {
                plan.tasks[i].before = before;
                match shell::spawn_recipe(i, recipe, Arc::clone(&self.settings), self.done_tx.clone()) {
                    Ok(()) => Launch::Running,
                    Err(e) => {
                        report_prog!("{e}");
                        Launch::Done(Status::Failed)
                    }
                }
            }
        }
    }

    fn build_parallel(&mut self, goal: &str) -> Status {
        match self.state.get(goal) {
            Some(State::Done) => return Status::Ok,
            Some(State::Failed) => return Status::Failed,
            _ => {}
        }
        let Some(mut plan) = self.plan(goal) else {
            return Status::Failed
        };
        let keep_going = self.mode.keep_going();
        let limit = if self.jobs == 0 { usize::MAX } else { self.jobs };
        let mut claimed = StrHashMap::default();
        let mut running = 0usize;

        loop {
            while running < limit && !plan.stop {
                let Some(i) = plan.ready.pop_front() else { break };
                if plan.tasks[i].done { continue }
                match self.launch(&mut plan, i, &mut claimed) {
                    Launch::Running => running += 1,
                    Launch::Waiting => {}
                    Launch::Done(status) => plan.complete(i, status, keep_going)
                }
            }
            if plan.remaining == 0 {
                break
            }
            if running > 0 {
                let Ok((i, outcome)) = self.done_rx.recv() else { break };
                running -= 1;
                let node = plan.tasks[i].node.clone();
                let status = match node {
                    Some(node) => self.finish_recipe(&node, outcome, plan.tasks[i].before),
                    None => Status::Failed
                };
                plan.complete(i, status, keep_going);
                continue
            }
            if plan.stop {
                break
            }
            if plan.ready.is_empty() {
                match plan.break_cycle() {
                    Some((dependent, dep)) => {
                        debug!(node = %dependent, dep = %dep, "dropping cycle edge");
                        report_prog!("Circular {dependent} <- {dep} dependency dropped.")
                    }
                    None if plan.ready.is_empty() => break,
                    None => {}
                }
            }
        }

        for task in &plan.tasks {
            if task.done {
                self.state.insert(task.name.clone(), task.status.into());
            }
        }
        match plan.index.get(goal) {
            Some(&i) if plan.tasks[i].done => plan.tasks[i].status,
            _ => Status::Failed
        }
    }
}
