mod common;

use common::{rmake, rmake_env, scratch, write};

#[test]
fn include_is_remade_then_read() {
    let dir = scratch("\
include gen.mk
all:
\t@echo $(VALUE)
gen.mk:
\t@echo 'VALUE = generated' > gen.mk
");
    let run = rmake(dir.path(), &[]);

    assert_eq!(run.code, 0, "{}", run.stderr);
    assert_eq!(run.stdout, "generated\n");
}

#[test]
fn missing_include_without_rule() {
    let dir = scratch("include nope.mk\nall:\n\t@echo never\n");
    let run = rmake(dir.path(), &[]);

    assert_eq!(run.code, 2);
    assert!(run.stderr.contains("Makefile:1: nope.mk: No such file or directory"), "{}", run.stderr);
    assert!(run.stdout.is_empty());
}

#[test]
fn optional_include_is_skipped() {
    let dir = scratch("-include nope.mk\nall:\n\t@echo fine\n");
    let run = rmake(dir.path(), &[]);

    assert_eq!(run.code, 0, "{}", run.stderr);
    assert_eq!(run.stdout, "fine\n");
}

#[test]
fn eval_of_called_template() {
    let dir = scratch("\
define RULE
$(1):
\t@echo made $(1)
endef
$(foreach t,x y,$(eval $(call RULE,$(t))))
all: x y
");
    let run = rmake(dir.path(), &["all"]);

    assert_eq!(run.code, 0, "{}", run.stderr);
    assert_eq!(run.stdout, "made x\nmade y\n");
}

#[test]
fn target_variables_reach_prerequisites() {
    let dir = scratch("\
MSG = global
all: child
\t@echo all $(MSG)
all: MSG = local
child:
\t@echo child $(MSG)
other:
\t@echo other $(MSG)
");
    let run = rmake(dir.path(), &["all", "other"]);

    assert_eq!(run.code, 0, "{}", run.stderr);
    assert_eq!(run.stdout, "child local\nall local\nother global\n");
}

#[test]
fn command_line_beats_makefile() {
    let dir = scratch("VAR = file\nFORCED = file\noverride FORCED = forced\nall:\n\t@echo $(VAR) $(FORCED)\n");
    let run = rmake(dir.path(), &["VAR=cli", "FORCED=cli"]);

    assert_eq!(run.stdout, "cli forced\n");
}

#[test]
fn environment_overrides_makefile_with_e() {
    let dir = scratch("GREETING = file\nall:\n\t@echo $(GREETING) $(origin GREETING)\n");
    let env = [("GREETING", "env")];

    let run = rmake_env(dir.path(), &[], &env);
    assert_eq!(run.stdout, "file file\n", "{}", run.stderr);

    let run = rmake_env(dir.path(), &["-e"], &env);
    assert_eq!(run.stdout, "env environment override\n", "{}", run.stderr);

    let run = rmake_env(dir.path(), &["-e", "GREETING=cli"], &env);
    assert_eq!(run.stdout, "cli command line\n", "{}", run.stderr);
}

#[test]
fn phony_survives_second_expansion() {
    let dir = scratch(".SECONDEXPANSION:\n.PHONY: clean\nclean:\n\t@echo cleaning\n");
    write(dir.path(), "clean", "");
    let run = rmake(dir.path(), &[]);

    assert_eq!(run.code, 0, "{}", run.stderr);
    assert_eq!(run.stdout, "cleaning\n");
}

#[test]
fn conditionals_and_shell() {
    let dir = scratch("\
X := $(shell echo hi)
ifeq ($(X),hi)
R = yes
else
R = no
endif
ifdef UNSET
R += never
endif
all:
\t@echo $(R)
");
    let run = rmake(dir.path(), &[]);

    assert_eq!(run.code, 0, "{}", run.stderr);
    assert_eq!(run.stdout, "yes\n");
}

#[test]
fn missing_separator_is_fatal() {
    let dir = scratch("all\n\t@echo hi\n");
    let run = rmake(dir.path(), &[]);

    assert_eq!(run.code, 2);
    assert!(run.stderr.contains("Makefile:1: *** missing separator"), "{}", run.stderr);
}

#[test]
fn error_function_stops_reading() {
    let dir = scratch("$(error broken here)\nall:\n");
    let run = rmake(dir.path(), &[]);

    assert_eq!(run.code, 2);
    assert!(run.stderr.contains("Makefile:1: *** broken here.  Stop."), "{}", run.stderr);
}

#[test]
fn vpath_expansion_error_stops_the_build() {
    let dir = scratch("VPATH = $(error no search path)\nall:\n\t@echo built\n");
    let run = rmake(dir.path(), &[]);

    assert_eq!(run.code, 2);
    assert!(run.stderr.contains("no search path"), "{}", run.stderr);
    assert!(!run.stdout.contains("built"));
}

#[test]
fn no_makefile_no_goal() {
    let dir = tempfile::tempdir().unwrap();
    let run = rmake(dir.path(), &[]);

    assert_eq!(run.code, 2);
    assert!(run.stderr.contains("No targets specified and no makefile found.  Stop."), "{}", run.stderr);
}

#[test]
fn default_goal_variable() {
    let dir = scratch(".DEFAULT_GOAL := second\nfirst:\n\t@echo first\nsecond:\n\t@echo second\n");
    let run = rmake(dir.path(), &[]);

    assert_eq!(run.stdout, "second\n");
}
