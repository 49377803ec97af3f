//! One invocation: directory changes, reading and remaking makefiles,
//! then the goals in order.

use crate::config::Config;
use crate::eval::Evaluator;
use crate::loc::prog;
use crate::error::{MakeError, Result};
use crate::scope::Globals;
use crate::graph::build_dependency_graph;
use crate::exec::{Options, Scheduler, Status};
use crate::util::{path_exists, strerror};
use crate::consts::{special, DEFAULT_MAKEFILES};

use std::env;

use tracing::debug;

#[cfg(feature = "dbg")]
use tramer::tramer;

pub const EXIT_OK: u8 = 0;
pub const EXIT_STALE: u8 = 1;
pub const EXIT_FAILURE: u8 = 2;

pub fn run(config: &Config) -> u8 {
    for dir in &config.directories {
        if let Err(e) = env::set_current_dir(dir) {
            report_prog!("*** {dir}: {}.  Stop.", strerror(&e));
            return EXIT_FAILURE
        }
    }

    let print_directory = config.mode.print_directory();
    let cwd = env::current_dir().map(|p| p.to_string_lossy().into_owned()).unwrap_or_default();
    if print_directory {
        println!("{}: Entering directory '{cwd}'", prog())
    }

    let code = session(config).unwrap_or_else(|e| {
        e.report();
        EXIT_FAILURE
    });

    if print_directory {
        println!("{}: Leaving directory '{cwd}'", prog())
    }
    code
}

#[inline]
fn options(config: &Config) -> Options<'_> {
    Options {
        mode: config.mode,
        jobs: config.jobs,
        what_if: &config.what_if,
        level: config.level,
    }
}

/// The `-f` list, else the first default makefile that exists.
fn makefiles(config: &Config) -> Vec::<String> {
    if !config.makefiles.is_empty() {
        return config.makefiles.clone()
    }
    DEFAULT_MAKEFILES.iter()
        .find(|mf| path_exists(mf))
        .map(|mf| vec![(*mf).to_owned()])
        .unwrap_or_default()
}

#[cfg_attr(feature = "dbg", tramer("millis"))]
fn read(config: &Config, makefiles: &[String]) -> Result::<Evaluator> {
    let mut ev = Evaluator::new(&config.seed())?;
    for mf in makefiles {
        ev.read_file(mf)?
    }
    Ok(ev)
}

/// Brings included and top-level makefiles up to date. Returns whether any
/// of them changed.
fn remake(config: &Config, ev: &Evaluator, makefiles: &[String]) -> Result::<bool> {
    let graph = build_dependency_graph(ev);
    let mut globals = Globals::from_evaluator(ev);
    let mut sched = Scheduler::new(&graph, &mut globals, options(config))?;

    let mut remade = false;
    for include in &ev.includes {
        if !sched.can_make(&include.path) { continue }
        if sched.build(&include.path) == Status::Failed {
            if include.optional { continue }
            return Err(MakeError::stop(Some(&include.loc), format!("failed to remake makefile '{}'", include.path)))
        }
        if sched.remade(&include.path) {
            debug!(path = %include.path, "include remade");
            remade = true
        }
    }

    for mf in makefiles {
        if mf == "-" || graph.node(mf).map_or(true, |n| n.phony) || !sched.has_recipe(mf) {
            continue
        }
        if sched.build(mf) == Status::Failed {
            return Err(MakeError::stop(None, format!("failed to remake makefile '{mf}'")))
        }
        remade |= sched.remade(mf)
    }
    Ok(remade)
}

fn session(config: &Config) -> Result::<u8> {
    let makefiles = makefiles(config);
    for mf in &makefiles {
        if mf != "-" && !path_exists(mf) {
            report_prog!("{mf}: No such file or directory");
            return Err(MakeError::stop(None, format!("No rule to make target '{mf}'")))
        }
    }

    let mut ev = read(config, &makefiles)?;
    let mode = config.mode;
    if !(mode.dry_run() || mode.question() || mode.touch()) && remake(config, &ev, &makefiles)? {
        debug!("re-reading makefiles");
        ev = read(config, &makefiles)?
    }
    if let Some(include) = ev.missing.iter().find(|i| !path_exists(&i.path)) {
        report!(Some(&include.loc), "{}: No such file or directory", include.path);
        return Err(MakeError::stop(None, format!("No rule to make target '{}'", include.path)))
    }

    let goals = if config.goals.is_empty() {
        let default = ev.expand_global(&format!("$({})", special::DEFAULT_GOAL))?;
        match default.split_whitespace().next() {
            Some(goal) => vec![goal.to_owned()],
            None => ev.default_goal.iter().cloned().collect()
        }
    } else {
        config.goals.clone()
    };
    if goals.is_empty() {
        if makefiles.is_empty() {
            report_prog!("*** No targets specified and no makefile found.  Stop.");
            return Ok(EXIT_FAILURE)
        }
        report_prog!("*** No targets.  Stop.");
        return Ok(EXIT_STALE)
    }

    let graph = build_dependency_graph(&ev);
    let mut globals = Globals::from_evaluator(&ev);
    let mut sched = Scheduler::new(&graph, &mut globals, options(config))?;

    let quiet = mode.dry_run() || mode.question() || mode.silent();
    let mut failed = false;
    for goal in &goals {
        let started = sched.started();
        match sched.build(goal) {
            Status::Ok => if sched.started() == started && !quiet && !goal.starts_with('.') {
                if sched.has_recipe(goal) {
                    println!("{}: '{goal}' is up to date.", prog())
                } else {
                    println!("{}: Nothing to be done for '{goal}'.", prog())
                }
            }
            Status::Failed => {
                failed = true;
                if !mode.keep_going() { break }
                report_prog!("Target '{goal}' not remade because of errors.")
            }
        }
    }

    Ok(match () {
        _ if failed => EXIT_FAILURE,
        _ if mode.question() && sched.stale() => EXIT_STALE,
        _ => EXIT_OK
    })
}
