mod common;

use common::{age, rmake, scratch, write};

const OUT_FROM_IN: &str = "out: in\n\ttouch out\n";

#[test]
fn dry_run_prints_without_running() {
    let dir = scratch("all: out\n.PHONY: all\nout: in\n\t@touch out\n");
    write(dir.path(), "in", "");
    let run = rmake(dir.path(), &["-n"]);

    assert_eq!(run.code, 0, "{}", run.stderr);
    assert_eq!(run.stdout, "touch out\n");
    assert!(!dir.path().join("out").exists());
}

#[test]
fn question_mode_reports_staleness() {
    let dir = scratch(OUT_FROM_IN);
    write(dir.path(), "in", "");
    write(dir.path(), "out", "");
    age(dir.path(), "in", -100);

    let run = rmake(dir.path(), &["-q"]);
    assert_eq!(run.code, 0);
    assert!(run.stdout.is_empty());

    age(dir.path(), "in", 100);
    let run = rmake(dir.path(), &["-q"]);
    assert_eq!(run.code, 1);
    assert!(run.stdout.is_empty());

    let run = rmake(dir.path(), &["-q", "missing"]);
    assert_eq!(run.code, 2);
}

#[test]
fn touch_mode_skips_recipes() {
    let dir = scratch("out: in\n\t@echo built\n");
    write(dir.path(), "in", "");
    let run = rmake(dir.path(), &["-t"]);

    assert_eq!(run.code, 0, "{}", run.stderr);
    assert_eq!(run.stdout, "touch out\n");
    assert!(dir.path().join("out").exists());
}

#[test]
fn always_make_rebuilds() {
    let dir = scratch("out:\n\t@echo again\n");
    write(dir.path(), "out", "");
    let run = rmake(dir.path(), &["-B"]);

    assert_eq!(run.stdout, "again\n");
}

#[test]
fn silent_flag_suppresses_echo() {
    let dir = scratch("all:\n\techo hi\n");

    let run = rmake(dir.path(), &[]);
    assert_eq!(run.stdout, "echo hi\nhi\n");

    let run = rmake(dir.path(), &["-s"]);
    assert_eq!(run.stdout, "hi\n");
}

#[test]
fn directory_change_is_announced() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::create_dir(dir.path().join("sub")).unwrap();
    write(&dir.path().join("sub"), "Makefile", "all:\n\t@echo inside\n");

    let run = rmake(dir.path(), &["-C", "sub"]);
    assert_eq!(run.code, 0, "{}", run.stderr);
    let lines = run.stdout.lines().collect::<Vec<_>>();
    assert_eq!(lines.len(), 3, "{}", run.stdout);
    assert!(lines[0].starts_with("rmake: Entering directory '"));
    assert_eq!(lines[1], "inside");
    assert!(lines[2].starts_with("rmake: Leaving directory '"));
}

#[test]
fn recursive_make_raises_level() {
    let dir = scratch("all:\n\t@$(MAKE) --no-print-directory -f sub.mk\n");
    write(dir.path(), "sub.mk", "sub:\n\t@echo level $(MAKELEVEL)\n");
    let run = rmake(dir.path(), &[]);

    assert_eq!(run.code, 0, "{}", run.stderr);
    assert_eq!(run.stdout, "level 1\n");
}

#[test]
fn recursive_make_runs_under_dry_run() {
    let dir = scratch("all:\n\t$(MAKE) --no-print-directory -f sub.mk\n");
    write(dir.path(), "sub.mk", "sub:\n\ttouch made\n");
    let run = rmake(dir.path(), &["-n"]);

    assert_eq!(run.code, 0, "{}", run.stderr);
    assert!(run.stdout.ends_with("touch made\n"), "{}", run.stdout);
    assert!(!dir.path().join("made").exists());
}
