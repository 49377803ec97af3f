mod common;

use common::{age, rmake, scratch, write};

use std::fs;

#[test]
fn shared_prerequisite_runs_once_in_parallel() {
    let dir = scratch("\
all: b c
\t@echo all
b: d
\t@echo b
c: d
\t@echo c
d:
\t@echo d >> log
");
    let run = rmake(dir.path(), &["-j2"]);

    assert_eq!(run.code, 0, "{}", run.stderr);
    assert_eq!(fs::read_to_string(dir.path().join("log")).unwrap(), "d\n");
    assert!(run.stdout.ends_with("all\n"), "{}", run.stdout);
}

#[test]
fn up_to_date_target_is_skipped() {
    let dir = scratch("out: in\n\t@echo rebuilt\n");
    write(dir.path(), "in", "");
    write(dir.path(), "out", "");
    age(dir.path(), "in", -100);

    let run = rmake(dir.path(), &[]);
    assert_eq!(run.code, 0);
    assert_eq!(run.stdout, "rmake: 'out' is up to date.\n");

    age(dir.path(), "in", 100);
    let run = rmake(dir.path(), &[]);
    assert_eq!(run.stdout, "rebuilt\n");
}

#[test]
fn nothing_to_be_done() {
    let dir = scratch("all:\n");
    let run = rmake(dir.path(), &[]);

    assert_eq!(run.code, 0);
    assert_eq!(run.stdout, "rmake: Nothing to be done for 'all'.\n");
}

#[test]
fn missing_prerequisite_stops() {
    let dir = scratch("all: nothere\n\t@echo never\n");
    let run = rmake(dir.path(), &[]);

    assert_eq!(run.code, 2);
    assert!(run.stderr.contains("No rule to make target 'nothere', needed by 'all'.  Stop."), "{}", run.stderr);
    assert!(run.stdout.is_empty());
}

#[test]
fn keep_going_builds_independent_targets() {
    let makefile = "\
all: bad good
bad:
\t@false
good:
\t@echo good
";
    let dir = scratch(makefile);
    let run = rmake(dir.path(), &["-k"]);
    assert_eq!(run.code, 2);
    assert!(run.stdout.contains("good"));
    assert!(run.stderr.contains("rmake: *** [Makefile:3: bad] Error 1"), "{}", run.stderr);
    assert!(run.stderr.contains("Target 'all' not remade because of errors."), "{}", run.stderr);

    let run = rmake(dir.path(), &[]);
    assert_eq!(run.code, 2);
    assert!(!run.stdout.contains("good"));
}

#[test]
fn keep_going_in_parallel() {
    let makefile = "\
all: x z
x: f y
\t@echo x
f:
\t@false
y:
\t@echo y
z:
\t@echo z
";
    let dir = scratch(makefile);
    let run = rmake(dir.path(), &["-k", "-j2"]);
    assert_eq!(run.code, 2);

    let mut lines = run.stdout.lines().collect::<Vec<_>>();
    lines.sort_unstable();
    assert_eq!(lines, ["y", "z"], "{}", run.stderr);
    assert!(run.stderr.contains("Target 'all' not remade because of errors."), "{}", run.stderr);
}

#[test]
fn parallel_failure_stops_new_jobs() {
    let makefile = "\
all: slow bad later
slow:
\t@sleep 1; echo slow
bad:
\t@false
later:
\t@echo later
";
    let dir = scratch(makefile);
    let run = rmake(dir.path(), &["-j2"]);
    assert_eq!(run.code, 2);
    // The job already running is waited for, nothing new starts.
    assert_eq!(run.stdout, "slow\n", "{}", run.stderr);
    assert!(run.stderr.contains("rmake: *** [Makefile:5: bad] Error 1"), "{}", run.stderr);
}

#[test]
fn ignored_failure_continues() {
    let dir = scratch("all:\n\t-@false\n\t@echo after\n");
    let run = rmake(dir.path(), &[]);

    assert_eq!(run.code, 0, "{}", run.stderr);
    assert!(run.stderr.contains("Error 1 (ignored)"), "{}", run.stderr);
    assert_eq!(run.stdout, "after\n");
}

#[test]
fn unchanged_timestamp_does_not_cascade() {
    let dir = scratch("\
out: mid
\t@echo built out
mid: src
\t@echo checked mid
");
    write(dir.path(), "src", "");
    write(dir.path(), "mid", "");
    write(dir.path(), "out", "");
    age(dir.path(), "mid", -100);
    age(dir.path(), "src", 100);

    let run = rmake(dir.path(), &[]);
    assert_eq!(run.code, 0, "{}", run.stderr);
    assert_eq!(run.stdout, "checked mid\n");
}

#[test]
fn delete_on_error_removes_partial_target() {
    let dir = scratch(".DELETE_ON_ERROR:\nout:\n\t@echo partial > out; false\n");
    let run = rmake(dir.path(), &[]);

    assert_eq!(run.code, 2);
    assert!(run.stderr.contains("rmake: *** Deleting file 'out'"), "{}", run.stderr);
    assert!(!dir.path().join("out").exists());
}

#[test]
fn delete_on_error_reports_failed_removal() {
    let dir = scratch(".DELETE_ON_ERROR:\nout:\n\t@mkdir out; false\n");
    let run = rmake(dir.path(), &[]);

    assert_eq!(run.code, 2);
    assert!(run.stderr.contains("rmake: *** Deleting file 'out'"), "{}", run.stderr);
    assert!(run.stderr.contains("rmake: out: "), "{}", run.stderr);
    assert!(dir.path().join("out").is_dir());
}

#[test]
fn grouped_targets_share_one_recipe_run() {
    let dir = scratch("\
all: a b
a b &:
\t@echo gen >> log
");
    let run = rmake(dir.path(), &[]);

    assert_eq!(run.code, 0, "{}", run.stderr);
    assert_eq!(fs::read_to_string(dir.path().join("log")).unwrap(), "gen\n");
}

#[test]
fn automatic_variables() {
    let dir = scratch("\
out.txt: a.in b.in
\t@echo $@ $< $^
%.res: %.src
\t@echo $* $(@D) $(<F)
");
    write(dir.path(), "a.in", "");
    write(dir.path(), "b.in", "");
    write(dir.path(), "x.src", "");

    let run = rmake(dir.path(), &["out.txt", "x.res"]);
    assert_eq!(run.code, 0, "{}", run.stderr);
    assert_eq!(run.stdout, "out.txt a.in a.in b.in\nx . x.src\n");
}
