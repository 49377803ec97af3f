mod common;

use common::{rmake, scratch};

#[test]
fn doubled_dollar_reaches_the_shell() {
    let dir = scratch("all:\n\t@echo '$$HOME literal' $(words a b)\n");
    let run = rmake(dir.path(), &[]);

    assert_eq!(run.code, 0, "{}", run.stderr);
    assert_eq!(run.stdout, "$HOME literal 2\n");
}

#[test]
fn shell_variables_in_recipes() {
    let dir = scratch("all:\n\t@for i in 1 2; do echo n$$i; done\n");
    let run = rmake(dir.path(), &[]);

    assert_eq!(run.stdout, "n1\nn2\n");
}
