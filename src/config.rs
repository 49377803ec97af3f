//! Run configuration merged from `MAKEFLAGS`, `RMAKE_JOBS` and the command line.

use crate::cli::Cli;
use crate::mode::Mode;
use crate::eval::{parse_assignment, Seed};
use crate::vars::AssignOp;

use std::env;

use tracing::warn;

/// A `VAR=VALUE` word from the command line or `MAKEFLAGS`.
#[derive(Clone, PartialEq, Eq)]
#[cfg_attr(any(test, feature = "dbg"), derive(Debug))]
pub struct Assignment {
    pub name: String,
    pub op: AssignOp,
    pub value: String,
}

impl Assignment {
    pub fn parse(word: &str) -> Option::<Self> {
        let (name, op, value) = parse_assignment(word)?;
        Some(Self { name: name.to_owned(), op, value: value.to_owned() })
    }

    fn to_flag_word(&self) -> String {
        let op = AssignOp::ALL.iter().find(|(_, op)| *op == self.op).map_or("=", |(s, _)| *s);
        format!("{name}{op}{value}", name = self.name, value = self.value.replace(' ', "\\ "))
    }
}

/// Splits on blanks not escaped with a backslash.
fn flag_words(s: &str) -> Vec::<String> {
    let mut out = Vec::new();
    let mut cur = String::new();
    let mut chars = s.chars();
    while let Some(c) = chars.next() {
        match c {
            '\\' => match chars.next() {
                Some(n @ (' ' | '\t')) => cur.push(n),
                Some(n) => { cur.push('\\'); cur.push(n) }
                None => cur.push('\\')
            },
            ' ' | '\t' => if !cur.is_empty() { out.push(std::mem::take(&mut cur)) },
            c => cur.push(c)
        }
    }
    if !cur.is_empty() { out.push(cur) }
    out
}

#[cfg_attr(any(test, feature = "dbg"), derive(Debug))]
pub struct Config {
    pub makefiles: Vec::<String>,
    pub directories: Vec::<String>,
    pub goals: Vec::<String>,
    pub assignments: Vec::<Assignment>,
    /// Zero means no limit.
    pub jobs: usize,
    pub what_if: Vec::<String>,
    pub mode: Mode,
    pub level: usize,
    pub make: String,
}

#[derive(Default)]
struct Inherited {
    mode: Mode,
    jobs: Option::<usize>,
    assignments: Vec::<Assignment>,
}

fn parse_makeflags(s: &str) -> Inherited {
    let mut inherited = Inherited::default();
    let mut assignments = false;
    for (i, word) in flag_words(s).into_iter().enumerate() {
        if assignments {
            inherited.assignments.extend(Assignment::parse(&word));
            continue
        }
        if word == "--" {
            assignments = true;
            continue
        }
        if let Some(n) = word.strip_prefix("-j") {
            inherited.jobs = Some(n.parse().unwrap_or(0));
            continue
        }
        if word.starts_with("--") {
            continue
        }
        if let Some(assignment) = Assignment::parse(&word) {
            inherited.assignments.push(assignment);
            continue
        }
        let letters = match word.strip_prefix('-') {
            Some(letters) => letters,
            None if i == 0 => word.as_str(),
            None => continue
        };
        inherited.mode = inherited.mode.union(Mode::from_letters(letters));
    }
    inherited
}

impl Config {
    pub fn new(cli: Cli) -> Self {
        let level = env::var("MAKELEVEL").ok().and_then(|l| l.trim().parse().ok()).unwrap_or(0);
        let inherited = env::var("MAKEFLAGS").map(|f| parse_makeflags(&f)).unwrap_or_default();

        let mut jobs = inherited.jobs.unwrap_or(1);
        if let Ok(j) = env::var("RMAKE_JOBS") {
            match j.trim().parse() {
                Ok(j) => jobs = j,
                Err(_) => warn!(value = j, "ignoring malformed RMAKE_JOBS")
            }
        }
        if let Some(j) = cli.jobs {
            jobs = j
        }

        let mut mode = inherited.mode;
        let switches = [
            (cli.dry_run, Mode::set_dry_run as fn(&mut Mode, bool)),
            (cli.keep_going, Mode::set_keep_going),
            (cli.question, Mode::set_question),
            (cli.touch, Mode::set_touch),
            (cli.always_make, Mode::set_always_make),
            (cli.silent, Mode::set_silent),
            (cli.ignore_errors, Mode::set_ignore_errors),
            (cli.no_builtin_rules, Mode::set_no_builtin_rules),
            (cli.no_builtin_variables, Mode::set_no_builtin_variables),
            (cli.env_override, Mode::set_env_override),
            (cli.trace, Mode::set_trace),
        ];
        for (on, set) in switches {
            if on { set(&mut mode, true) }
        }
        let print_directory = cli.print_directory || ((level > 0 || !cli.directories.is_empty()) && !cli.no_print_directory);
        mode.set_print_directory(print_directory);

        let mut assignments = inherited.assignments;
        let mut goals = Vec::new();
        for arg in cli.args {
            match Assignment::parse(&arg) {
                Some(a) => {
                    assignments.retain(|old| old.name != a.name);
                    assignments.push(a)
                }
                None => goals.push(arg)
            }
        }

        let make = env::current_exe()
            .map(|p| p.to_string_lossy().into_owned())
            .unwrap_or_else(|_| "rmake".to_owned());

        Self {
            makefiles: cli.files,
            directories: cli.directories,
            goals,
            assignments,
            jobs,
            what_if: cli.what_if,
            mode,
            level,
            make,
        }
    }

    /// `MAKEFLAGS` for recipes: letters, job count, then assignments after `--`.
    pub fn makeflags(&self) -> String {
        let mut flags = self.mode.letters();
        if self.jobs != 1 {
            if !flags.is_empty() { flags.push(' ') }
            match self.jobs {
                0 => flags.push_str("-j"),
                n => flags.push_str(&format!("-j{n}"))
            }
        }
        if !self.assignments.is_empty() {
            if !flags.is_empty() { flags.push(' ') }
            flags.push_str("--");
            for a in &self.assignments {
                flags.push(' ');
                flags.push_str(&a.to_flag_word())
            }
        }
        flags
    }

    pub fn mflags(&self) -> String {
        let letters = self.mode.letters();
        let mut flags = if letters.is_empty() { String::new() } else { format!("-{letters}") };
        if self.jobs > 1 {
            if !flags.is_empty() { flags.push(' ') }
            flags.push_str(&format!("-j{}", self.jobs))
        }
        flags
    }

    pub fn seed(&self) -> Seed<'_> {
        Seed {
            env_override: self.mode.env_override(),
            builtin_rules: !self.mode.no_builtin_rules(),
            builtin_vars: !self.mode.no_builtin_variables(),
            assignments: &self.assignments,
            make: self.make.clone(),
            makeflags: self.makeflags(),
            mflags: self.mflags(),
            level: self.level,
            goals: &self.goals,
        }
    }
}
