pub mod syntax {
    pub const IFEQ: &str = "ifeq";
    pub const IFNEQ: &str = "ifneq";
    pub const IFDEF: &str = "ifdef";
    pub const IFNDEF: &str = "ifndef";
    pub const ELSE: &str = "else";
    pub const ENDIF: &str = "endif";

    pub const DEFINE: &str = "define";
    pub const ENDEF: &str = "endef";

    pub const INCLUDE: &str = "include";
    pub const SINCLUDE: &str = "sinclude";
    pub const OPT_INCLUDE: &str = "-include";
    pub const BANG_INCLUDE: &str = "!include";

    pub const OVERRIDE: &str = "override";
    pub const EXPORT: &str = "export";
    pub const UNEXPORT: &str = "unexport";
    pub const UNDEFINE: &str = "undefine";
    pub const PRIVATE: &str = "private";
    pub const VPATH: &str = "vpath";

    pub const COMMENT: char = '#';
    pub const LINE_ESCAPE: char = '\\';
    pub const RECIPE_PREFIX: char = '\t';
}

pub mod special {
    pub const PHONY: &str = ".PHONY";
    pub const PRECIOUS: &str = ".PRECIOUS";
    pub const SECONDARY: &str = ".SECONDARY";
    pub const SUFFIXES: &str = ".SUFFIXES";
    pub const DEFAULT: &str = ".DEFAULT";
    pub const DELETE_ON_ERROR: &str = ".DELETE_ON_ERROR";
    pub const SECONDEXPANSION: &str = ".SECONDEXPANSION";
    pub const EXPORT_ALL_VARIABLES: &str = ".EXPORT_ALL_VARIABLES";
    pub const NOTPARALLEL: &str = ".NOTPARALLEL";
    pub const SILENT: &str = ".SILENT";
    pub const POSIX: &str = ".POSIX";

    /// Accepted and ignored.
    pub const IGNORED: &[&str] = &[
        ".INTERMEDIATE",
        ".NOTINTERMEDIATE",
        ".IGNORE",
        ".LOW_RESOLUTION_TIME",
        ".ONESHELL",
        ".WAIT",
    ];

    pub const RECIPEPREFIX: &str = ".RECIPEPREFIX";
    pub const DEFAULT_GOAL: &str = ".DEFAULT_GOAL";
    pub const SHELLSTATUS: &str = ".SHELLSTATUS";
    pub const SHELLFLAGS: &str = ".SHELLFLAGS";
}

pub const DEFAULT_MAKEFILES: &[&str] = &["GNUmakefile", "makefile", "Makefile"];

pub const DEFAULT_SHELL: &str = "/bin/sh";

pub const DEFAULT_SUFFIXES: &[&str] = &[
    ".out", ".a", ".ln", ".o", ".c", ".cc", ".C", ".cpp", ".p", ".f", ".F", ".m", ".r", ".y",
    ".l", ".ym", ".yl", ".s", ".S", ".mod", ".sym", ".def", ".h", ".info", ".dvi", ".tex",
    ".texinfo", ".texi", ".txinfo", ".w", ".ch", ".web", ".sh", ".elc", ".el",
];

pub const AUTOMATIC_VARS: &[&str] = &[
    "@", "%", "<", "?", "^", "+", "*", "|",
    "@D", "@F", "%D", "%F", "<D", "<F", "?D", "?F",
    "^D", "^F", "+D", "+F", "*D", "*F", "|D", "|F",
];

pub const BUILTIN_VARIABLES: &[(&str, &str)] = &[
    ("AR", "ar"),
    ("ARFLAGS", "rv"),
    ("AS", "as"),
    ("CC", "cc"),
    ("CXX", "g++"),
    ("CPP", "$(CC) -E"),
    ("LD", "ld"),
    ("LEX", "lex"),
    ("YACC", "yacc"),
    ("RM", "rm -f"),
    ("OUTPUT_OPTION", "-o $@"),
    ("COMPILE.c", "$(CC) $(CFLAGS) $(CPPFLAGS) $(TARGET_ARCH) -c"),
    ("COMPILE.cc", "$(CXX) $(CXXFLAGS) $(CPPFLAGS) $(TARGET_ARCH) -c"),
    ("COMPILE.S", "$(CC) $(ASFLAGS) $(CPPFLAGS) $(TARGET_MACH) -c"),
    ("COMPILE.s", "$(AS) $(ASFLAGS) $(TARGET_MACH)"),
];

/// (target pattern, prerequisite pattern, recipe)
pub const BUILTIN_PATTERN_RULES: &[(&str, &str, &str)] = &[
    ("%.o", "%.c", "$(COMPILE.c) $(OUTPUT_OPTION) $<"),
    ("%.o", "%.cc", "$(COMPILE.cc) $(OUTPUT_OPTION) $<"),
    ("%.o", "%.cpp", "$(COMPILE.cc) $(OUTPUT_OPTION) $<"),
];

/// Object files fall back to an assembler source next to them.
pub const ASM_SOURCES: &[&str] = &[".S", ".s"];
pub const ASM_RECIPE: &str = "$(COMPILE.S) $(OUTPUT_OPTION) $<";

pub const MAKE_VERSION: &str = "4.4";
