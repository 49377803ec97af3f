use clap::{ArgAction, Parser};

#[derive(Parser, Debug)]
#[command(name = "rmake", author, version, about)]
pub struct Cli {
    /// read FILE as a makefile
    #[arg(short = 'f', long = "file", visible_alias = "makefile", value_name = "FILE", action = ArgAction::Append)]
    pub files: Vec<String>,

    /// change to DIR before doing anything
    #[arg(short = 'C', long = "directory", value_name = "DIR", action = ArgAction::Append)]
    pub directories: Vec<String>,

    /// allow N jobs at once, infinite jobs with no argument
    #[arg(short = 'j', long = "jobs", value_name = "N", num_args = 0..=1, default_missing_value = "0")]
    pub jobs: Option<usize>,

    /// keep going when some targets can't be made
    #[arg(short = 'k', long = "keep-going", action = ArgAction::SetTrue)]
    pub keep_going: bool,

    /// don't actually run any recipe, just print them
    #[arg(short = 'n', long = "dry-run", visible_aliases = ["just-print", "recon"], action = ArgAction::SetTrue)]
    pub dry_run: bool,

    /// run no recipe, exit status says if up to date
    #[arg(short = 'q', long = "question", action = ArgAction::SetTrue)]
    pub question: bool,

    /// touch targets instead of remaking them
    #[arg(short = 't', long = "touch", action = ArgAction::SetTrue)]
    pub touch: bool,

    /// unconditionally make all targets
    #[arg(short = 'B', long = "always-make", action = ArgAction::SetTrue)]
    pub always_make: bool,

    /// don't echo recipes
    #[arg(short = 's', long = "silent", visible_alias = "quiet", action = ArgAction::SetTrue)]
    pub silent: bool,

    /// ignore errors from recipes
    #[arg(short = 'i', long = "ignore-errors", action = ArgAction::SetTrue)]
    pub ignore_errors: bool,

    /// disable the built-in implicit rules
    #[arg(short = 'r', long = "no-builtin-rules", action = ArgAction::SetTrue)]
    pub no_builtin_rules: bool,

    /// disable the built-in variable settings
    #[arg(short = 'R', long = "no-builtin-variables", action = ArgAction::SetTrue)]
    pub no_builtin_variables: bool,

    /// environment variables override makefiles
    #[arg(short = 'e', long = "environment-overrides", action = ArgAction::SetTrue)]
    pub env_override: bool,

    /// consider FILE to be infinitely new
    #[arg(short = 'W', long = "what-if", visible_aliases = ["new-file", "assume-new"], value_name = "FILE", action = ArgAction::Append)]
    pub what_if: Vec<String>,

    /// print debugging information
    #[arg(short = 'd', long = "trace", action = ArgAction::SetTrue)]
    pub trace: bool,

    /// print the current directory
    #[arg(short = 'w', long = "print-directory", action = ArgAction::SetTrue)]
    pub print_directory: bool,

    /// turn off -w, even if it was turned on implicitly
    #[arg(long = "no-print-directory", action = ArgAction::SetTrue)]
    pub no_print_directory: bool,

    /// targets to make and VAR=VALUE assignments
    pub args: Vec<String>,
}
