mod common;

use common::{rmake, scratch};

const CYCLE: &str = "\
all: a c
a: b
\t@echo a
b: a
\t@echo b
c:
\t@echo c
";

#[test]
fn cycle_edge_is_dropped_with_warning() {
    let dir = scratch(CYCLE);
    let run = rmake(dir.path(), &[]);

    assert_eq!(run.code, 0, "{}", run.stderr);
    assert!(run.stderr.contains("rmake: Circular b <- a dependency dropped."), "{}", run.stderr);
    assert_eq!(run.stderr.matches("dependency dropped").count(), 1);
    assert_eq!(run.stdout, "b\na\nc\n");
}

#[test]
fn cycle_is_broken_under_parallel_jobs() {
    let dir = scratch(CYCLE);
    let run = rmake(dir.path(), &["-j2"]);

    assert_eq!(run.code, 0, "{}", run.stderr);
    assert_eq!(run.stderr.matches("dependency dropped.").count(), 1, "{}", run.stderr);
    for line in ["a", "b", "c"] {
        assert!(run.stdout.lines().any(|l| l == line), "{}", run.stdout)
    }
}

#[test]
fn target_depending_on_itself() {
    let dir = scratch("x: x\n\t@echo built\n");
    let run = rmake(dir.path(), &[]);

    assert_eq!(run.code, 0);
    assert!(run.stderr.contains("Circular x <- x dependency dropped."), "{}", run.stderr);
    assert_eq!(run.stdout, "built\n");
}
