//! Running recipe lines through `$(SHELL)`.

use crate::loc::{prog, Loc};

use std::io::{self, Write};
use std::os::unix::process::ExitStatusExt;
use std::process;
use std::sync::Arc;
use std::thread;

use crossbeam_channel::Sender;
use tracing::debug;

/// One fully expanded recipe line.
#[derive(Clone)]
#[cfg_attr(any(test, feature = "dbg"), derive(Debug))]
pub struct Command {
    pub text: String,
    pub silent: bool,
    pub ignore: bool,
    /// Invokes `$(MAKE)` or carries the `+` prefix: runs even under `-n`.
    pub recursive: bool,
    pub loc: Loc,
}

#[cfg_attr(any(test, feature = "dbg"), derive(Debug))]
pub struct Recipe {
    pub target: String,
    pub commands: Vec::<Command>,
    pub env: Vec::<(String, String)>,
    pub shell: String,
    pub shell_flags: Vec::<String>,
}

impl Recipe {
    #[inline]
    pub fn has_recursive(&self) -> bool {
        self.commands.iter().any(|c| c.recursive)
    }
}

/// Run-wide switches, shared with worker threads.
#[derive(Clone, Copy, Default)]
#[cfg_attr(any(test, feature = "dbg"), derive(Debug))]
pub struct Settings {
    pub dry_run: bool,
    pub ignore_errors: bool,
}

#[derive(Clone, Copy, PartialEq, Eq)]
#[cfg_attr(any(test, feature = "dbg"), derive(Debug))]
pub enum Outcome {
    Ok,
    Failed(i32),
}

#[inline]
fn echo(text: &str) {
    let mut stdout = io::stdout().lock();
    _ = writeln!(stdout, "{text}");
    _ = stdout.flush();
}

fn exit_code(status: process::ExitStatus) -> i32 {
    status.code().or_else(|| status.signal().map(|s| 128 + s)).unwrap_or(1)
}

/// Runs every line of `recipe` in order, stopping at the first failure
/// that is not ignored.
pub fn run_recipe(recipe: &Recipe, settings: &Settings) -> Outcome {
    for cmd in &recipe.commands {
        if settings.dry_run && !cmd.recursive {
            echo(&cmd.text);
            continue
        }
        if !cmd.silent || settings.dry_run {
            echo(&cmd.text)
        }

        debug!(node = %recipe.target, cmd = %cmd.text, "spawning");
        let status = process::Command::new(&recipe.shell)
            .args(&recipe.shell_flags)
            .arg(&cmd.text)
            .env_clear()
            .envs(recipe.env.iter().map(|(k, v)| (k, v)))
            .status();

        let code = match status {
            Ok(status) if status.success() => continue,
            Ok(status) => exit_code(status),
            Err(e) => {
                eprintln!("{prog}: {shell}: {e}", prog = prog(), shell = recipe.shell);
                127
            }
        };

        if cmd.ignore || settings.ignore_errors {
            eprintln!("{prog}: [{loc}: {target}] Error {code} (ignored)", prog = prog(), loc = cmd.loc, target = recipe.target);
            continue
        }
        eprintln!("{prog}: *** [{loc}: {target}] Error {code}", prog = prog(), loc = cmd.loc, target = recipe.target);
        return Outcome::Failed(code)
    }
    Outcome::Ok
}

/// Runs `recipe` on a worker thread and reports `(id, outcome)` on `done`.
pub fn spawn_recipe(id: usize, recipe: Recipe, settings: Arc::<Settings>, done: Sender::<(usize, Outcome)>) -> io::Result::<()> {
    thread::Builder::new()
        .name(format!("recipe-{id}"))
        .spawn(move || {
            let outcome = run_recipe(&recipe, &settings);
            _ = done.send((id, outcome))
        })
        .map(|_| ())
}
