#![allow(dead_code)]

use std::fs::{self, File};
use std::path::Path;
use std::process::Command;
use std::time::{Duration, SystemTime};

use tempfile::TempDir;

pub struct Run {
    pub code: i32,
    pub stdout: String,
    pub stderr: String,
}

/// A scratch directory holding `Makefile`.
pub fn scratch(makefile: &str) -> TempDir {
    let dir = tempfile::tempdir().expect("could not create scratch directory");
    write(dir.path(), "Makefile", makefile);
    dir
}

pub fn write(dir: &Path, name: &str, content: &str) {
    let path = dir.join(name);
    if let Err(e) = fs::write(&path, content) {
        panic!("could not write {path}: {e}", path = path.display())
    }
}

/// Moves the modification time of `name` by `secs` relative to now.
pub fn age(dir: &Path, name: &str, secs: i64) {
    let now = SystemTime::now();
    let delta = Duration::from_secs(secs.unsigned_abs());
    let time = if secs < 0 { now - delta } else { now + delta };
    let file = File::options().write(true).open(dir.join(name)).expect("could not open file");
    file.set_modified(time).expect("could not set modification time")
}

pub fn rmake(dir: &Path, args: &[&str]) -> Run {
    rmake_env(dir, args, &[])
}

/// Runs rmake with extra environment variables set.
pub fn rmake_env(dir: &Path, args: &[&str], env: &[(&str, &str)]) -> Run {
    let out = Command::new(env!("CARGO_BIN_EXE_rmake"))
        .args(args)
        .current_dir(dir)
        .env_remove("MAKEFLAGS")
        .env_remove("MFLAGS")
        .env_remove("MAKELEVEL")
        .env_remove("RMAKE_JOBS")
        .envs(env.iter().copied())
        .output()
        .expect("could not execute rmake");

    Run {
        code: out.status.code().unwrap_or(-1),
        stdout: String::from_utf8_lossy(&out.stdout).into_owned(),
        stderr: String::from_utf8_lossy(&out.stderr).into_owned(),
    }
}
