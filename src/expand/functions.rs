//! Built-in functions. Each receives its raw, unexpanded argument text and
//! expands arguments itself, so `if`, `and`, `or`, `foreach` and friends can
//! be lazy.

use super::{Ctx, Expander, env_var};
use crate::util;
use crate::glob;
use crate::pattern;
use crate::vars::{Flavor, Origin};
use crate::error::Result;
use crate::consts::{special, AUTOMATIC_VARS, DEFAULT_SHELL};
use crate::text::{find_top_level, split_args, split_args_all, split_ws, strip_ws, words};

use std::io::Write;
use std::fs::OpenOptions;
use std::cmp::Ordering;
use std::process::{Command, Stdio};

type Call = fn(&mut Expander<'_>, &str, &Ctx<'_>) -> Result::<String>;

pub struct Builtin {
    pub name: &'static str,
    /// Touches the file system, spawns processes or mutates the session.
    pub io: bool,
    pub call: Call,
}

macro_rules! builtins {
    (@io io) => { true };
    (@io) => { false };
    ($($name: literal => $call: ident $(: $io: ident)?), * $(,)?) => {
        pub const BUILTINS: &[Builtin] = &[
            $(Builtin { name: $name, io: builtins!(@io $($io)?), call: $call }), *
        ];
    };
}

builtins! {
    "subst"      => func_subst,
    "patsubst"   => func_patsubst,
    "strip"      => func_strip,
    "findstring" => func_findstring,
    "filter"     => func_filter,
    "filter-out" => func_filter_out,
    "sort"       => func_sort,
    "word"       => func_word,
    "wordlist"   => func_wordlist,
    "words"      => func_words,
    "firstword"  => func_firstword,
    "lastword"   => func_lastword,
    "join"       => func_join,
    "dir"        => func_dir,
    "notdir"     => func_notdir,
    "suffix"     => func_suffix,
    "basename"   => func_basename,
    "addsuffix"  => func_addsuffix,
    "addprefix"  => func_addprefix,
    "wildcard"   => func_wildcard: io,
    "realpath"   => func_realpath: io,
    "abspath"    => func_abspath,
    "if"         => func_if,
    "or"         => func_or,
    "and"        => func_and,
    "intcmp"     => func_intcmp,
    "foreach"    => func_foreach,
    "let"        => func_let,
    "call"       => func_call,
    "value"      => func_value,
    "eval"       => func_eval: io,
    "origin"     => func_origin,
    "flavor"     => func_flavor,
    "shell"      => func_shell: io,
    "file"       => func_file: io,
    "info"       => func_info: io,
    "warning"    => func_warning: io,
    "error"      => func_error: io,
}

#[inline]
pub fn lookup(name: &str) -> Option::<&'static Builtin> {
    BUILTINS.iter().find(|b| b.name == name)
}

/// Splits into at most `max` arguments, failing below `min`.
fn args<'t>(ex: &Expander, raw: &'t str, func: &str, min: usize, max: usize, ctx: &Ctx) -> Result::<Vec::<&'t str>> {
    let args = split_args(raw, max);
    let given = if raw.is_empty() { 0 } else { args.len() };
    if given < min {
        return Err(ex.def_error(ctx, format!("insufficient number of arguments ({given}) to function '{func}'")))
    }
    Ok(args)
}

#[inline]
fn expand_words(ex: &mut Expander, raw: &str, ctx: &Ctx) -> Result::<Vec::<String>> {
    Ok(words(&ex.expand(raw, ctx)?).map(|w| w.to_owned()).collect())
}

#[inline]
fn map_words(ex: &mut Expander, raw: &str, ctx: &Ctx, f: impl Fn(&str) -> String) -> Result::<String> {
    Ok(words(&ex.expand(raw, ctx)?).map(f).collect::<Vec<_>>().join(" "))
}

fn func_subst(ex: &mut Expander, raw: &str, ctx: &Ctx) -> Result::<String> {
    let a = args(ex, raw, "subst", 3, 3, ctx)?;
    let from = ex.expand(a[0], ctx)?;
    let to = ex.expand(a[1], ctx)?;
    let text = ex.expand(a[2], ctx)?;
    if from.is_empty() {
        return Ok(format!("{text}{to}"))
    }
    Ok(text.replace(&from, &to))
}

fn func_patsubst(ex: &mut Expander, raw: &str, ctx: &Ctx) -> Result::<String> {
    let a = args(ex, raw, "patsubst", 3, 3, ctx)?;
    let from = ex.expand(a[0], ctx)?.trim().to_owned();
    let to = ex.expand(a[1], ctx)?.trim().to_owned();
    map_words(ex, a[2], ctx, |w| pattern::patsubst_word(w, &from, &to).into_owned())
}

fn func_strip(ex: &mut Expander, raw: &str, ctx: &Ctx) -> Result::<String> {
    Ok(strip_ws(&ex.expand(raw, ctx)?))
}

fn func_findstring(ex: &mut Expander, raw: &str, ctx: &Ctx) -> Result::<String> {
    let a = args(ex, raw, "findstring", 2, 2, ctx)?;
    let needle = ex.expand(a[0], ctx)?;
    let hay = ex.expand(a[1], ctx)?;
    Ok(if hay.contains(&needle) { needle } else { String::new() })
}

fn filter_words(ex: &mut Expander, raw: &str, func: &str, keep: bool, ctx: &Ctx) -> Result::<String> {
    let a = args(ex, raw, func, 2, 2, ctx)?;
    let patterns = expand_words(ex, a[0], ctx)?;
    let text = ex.expand(a[1], ctx)?;
    Ok(words(&text).filter(|w| patterns.iter().any(|p| pattern::matches(p, w)) == keep).collect::<Vec<_>>().join(" "))
}

fn func_filter(ex: &mut Expander, raw: &str, ctx: &Ctx) -> Result::<String> {
    filter_words(ex, raw, "filter", true, ctx)
}

fn func_filter_out(ex: &mut Expander, raw: &str, ctx: &Ctx) -> Result::<String> {
    filter_words(ex, raw, "filter-out", false, ctx)
}

fn func_sort(ex: &mut Expander, raw: &str, ctx: &Ctx) -> Result::<String> {
    let mut list = expand_words(ex, raw, ctx)?;
    list.sort();
    list.dedup();
    Ok(list.join(" "))
}

/// Parses a numeric argument of `word`/`wordlist`.
fn parse_index(ex: &Expander, text: &str, func: &str, which: &str, allow_zero: bool, ctx: &Ctx) -> Result::<usize> {
    let t = text.trim();
    if t.is_empty() {
        return Err(ex.def_error(ctx, format!("invalid {which} argument to '{func}' function: empty value")))
    }
    if !t.bytes().all(|b| b.is_ascii_digit()) {
        return Err(ex.def_error(ctx, format!("invalid {which} argument to '{func}' function: '{t}'")))
    }
    let n = t.parse::<usize>().map_err(|_| {
        ex.def_error(ctx, format!("invalid {which} argument to '{func}' function: '{t}' out of range"))
    })?;
    if n == 0 && !allow_zero {
        return Err(if func == "word" {
            ex.def_error(ctx, "first argument to 'word' function must be greater than 0")
        } else {
            ex.def_error(ctx, format!("invalid {which} argument to '{func}' function: '{t}'"))
        })
    }
    Ok(n)
}

fn func_word(ex: &mut Expander, raw: &str, ctx: &Ctx) -> Result::<String> {
    let a = args(ex, raw, "word", 2, 2, ctx)?;
    let n = ex.expand(a[0], ctx)?;
    let n = parse_index(ex, &n, "word", "first", false, ctx)?;
    let text = ex.expand(a[1], ctx)?;
    let word = words(&text).nth(n - 1).unwrap_or_default().to_owned();
    Ok(word)
}

fn func_wordlist(ex: &mut Expander, raw: &str, ctx: &Ctx) -> Result::<String> {
    let a = args(ex, raw, "wordlist", 3, 3, ctx)?;
    let s = ex.expand(a[0], ctx)?;
    let s = parse_index(ex, &s, "wordlist", "first", false, ctx)?;
    let e = ex.expand(a[1], ctx)?;
    let e = parse_index(ex, &e, "wordlist", "second", true, ctx)?;
    let text = ex.expand(a[2], ctx)?;
    if e < s {
        return Ok(String::new())
    }
    Ok(words(&text).skip(s - 1).take(e - s + 1).collect::<Vec<_>>().join(" "))
}

fn func_words(ex: &mut Expander, raw: &str, ctx: &Ctx) -> Result::<String> {
    Ok(words(&ex.expand(raw, ctx)?).count().to_string())
}

fn func_firstword(ex: &mut Expander, raw: &str, ctx: &Ctx) -> Result::<String> {
    Ok(words(&ex.expand(raw, ctx)?).next().unwrap_or_default().to_owned())
}

fn func_lastword(ex: &mut Expander, raw: &str, ctx: &Ctx) -> Result::<String> {
    Ok(words(&ex.expand(raw, ctx)?).last().unwrap_or_default().to_owned())
}

fn func_join(ex: &mut Expander, raw: &str, ctx: &Ctx) -> Result::<String> {
    let a = args(ex, raw, "join", 2, 2, ctx)?;
    let left = expand_words(ex, a[0], ctx)?;
    let right = expand_words(ex, a[1], ctx)?;
    let n = left.len().max(right.len());
    Ok((0..n).map(|i| {
        format!("{}{}", left.get(i).map_or("", |s| s), right.get(i).map_or("", |s| s))
    }).collect::<Vec<_>>().join(" "))
}

fn func_dir(ex: &mut Expander, raw: &str, ctx: &Ctx) -> Result::<String> {
    map_words(ex, raw, ctx, |w| util::dir_word(w).to_owned())
}

fn func_notdir(ex: &mut Expander, raw: &str, ctx: &Ctx) -> Result::<String> {
    map_words(ex, raw, ctx, |w| util::notdir_word(w).to_owned())
}

fn func_suffix(ex: &mut Expander, raw: &str, ctx: &Ctx) -> Result::<String> {
    let text = ex.expand(raw, ctx)?;
    Ok(words(&text).filter_map(util::suffix_word).collect::<Vec<_>>().join(" "))
}

fn func_basename(ex: &mut Expander, raw: &str, ctx: &Ctx) -> Result::<String> {
    map_words(ex, raw, ctx, |w| util::basename_word(w).to_owned())
}

fn func_addsuffix(ex: &mut Expander, raw: &str, ctx: &Ctx) -> Result::<String> {
    let a = args(ex, raw, "addsuffix", 2, 2, ctx)?;
    let suffix = ex.expand(a[0], ctx)?;
    map_words(ex, a[1], ctx, |w| format!("{w}{suffix}"))
}

fn func_addprefix(ex: &mut Expander, raw: &str, ctx: &Ctx) -> Result::<String> {
    let a = args(ex, raw, "addprefix", 2, 2, ctx)?;
    let prefix = ex.expand(a[0], ctx)?;
    map_words(ex, a[1], ctx, |w| format!("{prefix}{w}"))
}

fn func_wildcard(ex: &mut Expander, raw: &str, ctx: &Ctx) -> Result::<String> {
    let patterns = expand_words(ex, raw, ctx)?;
    Ok(patterns.iter().flat_map(|p| glob::expand(p)).collect::<Vec<_>>().join(" "))
}

fn func_realpath(ex: &mut Expander, raw: &str, ctx: &Ctx) -> Result::<String> {
    let text = ex.expand(raw, ctx)?;
    Ok(words(&text).filter_map(util::realpath).collect::<Vec<_>>().join(" "))
}

fn func_abspath(ex: &mut Expander, raw: &str, ctx: &Ctx) -> Result::<String> {
    let cwd = std::env::current_dir().unwrap_or_default();
    map_words(ex, raw, ctx, |w| util::abspath(w, &cwd))
}

fn func_if(ex: &mut Expander, raw: &str, ctx: &Ctx) -> Result::<String> {
    let a = args(ex, raw, "if", 2, 3, ctx)?;
    let cond = ex.expand(a[0], ctx)?;
    if !cond.trim().is_empty() {
        ex.expand(a[1], ctx)
    } else {
        a.get(2).map_or(Ok(String::new()), |e| ex.expand(e, ctx))
    }
}

fn func_or(ex: &mut Expander, raw: &str, ctx: &Ctx) -> Result::<String> {
    for arg in split_args_all(raw) {
        let v = ex.expand(arg, ctx)?;
        if !v.trim().is_empty() {
            return Ok(v)
        }
    }
    Ok(String::new())
}

fn func_and(ex: &mut Expander, raw: &str, ctx: &Ctx) -> Result::<String> {
    let mut last = String::new();
    for arg in split_args_all(raw) {
        last = ex.expand(arg, ctx)?;
        if last.trim().is_empty() {
            return Ok(String::new())
        }
    }
    Ok(last)
}

fn parse_int(ex: &Expander, text: &str, which: &str, ctx: &Ctx) -> Result::<i128> {
    let t = text.trim();
    if t.is_empty() {
        return Err(ex.def_error(ctx, format!("invalid {which} argument to 'intcmp' function: empty value")))
    }
    t.parse::<i128>().map_err(|_| ex.def_error(ctx, format!("invalid {which} argument to 'intcmp' function: '{t}'")))
}

fn func_intcmp(ex: &mut Expander, raw: &str, ctx: &Ctx) -> Result::<String> {
    let a = args(ex, raw, "intcmp", 2, 5, ctx)?;
    let lhs = ex.expand(a[0], ctx)?;
    let lhs = parse_int(ex, &lhs, "first", ctx)?;
    let rhs = ex.expand(a[1], ctx)?;
    let rhs = parse_int(ex, &rhs, "second", ctx)?;
    let ord = lhs.cmp(&rhs);
    if a.len() == 2 {
        return Ok(if ord == Ordering::Equal { lhs.to_string() } else { String::new() })
    }
    let branch = match ord {
        Ordering::Less => a.get(2),
        Ordering::Equal => a.get(3),
        Ordering::Greater => a.get(4).or_else(|| a.get(3)),
    };
    branch.map_or(Ok(String::new()), |b| ex.expand(b, ctx))
}

fn func_foreach(ex: &mut Expander, raw: &str, ctx: &Ctx) -> Result::<String> {
    let a = args(ex, raw, "foreach", 3, 3, ctx)?;
    let var = ex.expand(a[0], ctx)?.trim().to_owned();
    let list = expand_words(ex, a[1], ctx)?;
    let mut out = Vec::with_capacity(list.len());
    for item in list {
        let mut inner = ctx.child();
        inner.set(var.as_str(), item);
        out.push(ex.expand(a[2], &inner)?);
    }
    Ok(out.join(" "))
}

fn func_let(ex: &mut Expander, raw: &str, ctx: &Ctx) -> Result::<String> {
    let a = args(ex, raw, "let", 3, 3, ctx)?;
    let names = expand_words(ex, a[0], ctx)?;
    let values = expand_words(ex, a[1], ctx)?;
    let mut inner = ctx.child();
    for (i, name) in names.iter().enumerate() {
        let value = if i + 1 == names.len() {
            values.get(i..).map(|rest| rest.join(" ")).unwrap_or_default()
        } else {
            values.get(i).cloned().unwrap_or_default()
        };
        inner.set(name.as_str(), value);
    }
    ex.expand(a[2], &inner)
}

fn func_call(ex: &mut Expander, raw: &str, ctx: &Ctx) -> Result::<String> {
    let parts = split_args_all(raw);
    let name = ex.expand(parts[0], ctx)?.trim().to_owned();
    let mut params = Vec::with_capacity(parts.len() - 1);
    for p in &parts[1..] {
        params.push(ex.expand(p, ctx)?);
    }

    if let Some(builtin) = lookup(&name) {
        let escaped = params.iter().map(|p| p.replace('$', "$$")).collect::<Vec<_>>().join(",");
        return (builtin.call)(ex, &escaped, ctx)
    }

    let Some(var) = ex.scope().lookup(&name).cloned() else { return Ok(String::new()) };
    if var.flavor == Flavor::Simple {
        return Ok(var.value)
    }

    let mut frame = ctx.call_frame();
    frame.set("0", name.as_str());
    for (i, p) in params.into_iter().enumerate() {
        frame.set((i + 1).to_string(), p);
    }
    if var.loc.is_some() {
        frame.def_loc = var.loc.clone()
    }
    ex.expand(&var.value, &frame)
}

fn func_value(ex: &mut Expander, raw: &str, ctx: &Ctx) -> Result::<String> {
    let name = ex.expand(raw, ctx)?.trim().to_owned();
    Ok(match ex.scope().lookup(&name) {
        Some(var) => var.value.clone(),
        None => env_var(&name).unwrap_or_default()
    })
}

/// Whether `text` defines a rule with prerequisites.
fn defines_prerequisites(text: &str) -> bool {
    text.lines().any(|line| {
        let line = line.trim_start();
        if line.is_empty() || line.starts_with('#') { return false }
        let Some(colon) = find_top_level(line, b':') else { return false };
        let rest = &line[colon + 1..];
        let rest = rest.strip_prefix(':').unwrap_or(rest);
        if rest.starts_with('=') { return false }
        let deps = match find_top_level(rest, b';') {
            Some(semi) => &rest[..semi],
            None => rest
        };
        find_top_level(deps, b'=').is_none() && !deps.trim().is_empty()
    })
}

fn func_eval(ex: &mut Expander, raw: &str, ctx: &Ctx) -> Result::<String> {
    let text = ex.expand(raw, ctx)?;
    if ctx.recipe && defines_prerequisites(&text) {
        return Err(ex.def_error(ctx, "prerequisites cannot be defined in recipes"))
    }
    ex.scope().eval(&text, ctx)?;
    Ok(String::new())
}

fn func_origin(ex: &mut Expander, raw: &str, ctx: &Ctx) -> Result::<String> {
    let name = ex.expand(raw, ctx)?.trim().to_owned();
    if AUTOMATIC_VARS.contains(&name.as_str()) || ctx.get(&name).is_some() {
        return Ok(Origin::Automatic.as_str().to_owned())
    }
    Ok(ex.scope().origin(&name).to_owned())
}

fn func_flavor(ex: &mut Expander, raw: &str, ctx: &Ctx) -> Result::<String> {
    let name = ex.expand(raw, ctx)?.trim().to_owned();
    Ok(match ex.scope().lookup(&name) {
        Some(var) => var.flavor.as_str(),
        None if env_var(&name).is_some() => Flavor::Recursive.as_str(),
        None => "undefined"
    }.to_owned())
}

/// Trims one trailing newline, then turns the remaining ones into spaces.
pub fn normalize_shell_output(out: &str) -> String {
    let out = out.strip_suffix("\r\n").or_else(|| out.strip_suffix('\n')).unwrap_or(out);
    out.replace("\r\n", " ").replace('\n', " ")
}

/// Runs `cmd` through the configured shell and captures its stdout.
pub fn shell_capture(ex: &mut Expander, cmd: &str, ctx: &Ctx) -> Result::<String> {
    let shell = match ex.scope().lookup("SHELL").cloned() {
        Some(var) => ex.expand_var("SHELL", &var, ctx)?,
        None => DEFAULT_SHELL.to_owned()
    };
    let flags = match ex.scope().lookup(special::SHELLFLAGS).cloned() {
        Some(var) => ex.expand_var(special::SHELLFLAGS, &var, ctx)?,
        None => "-c".to_owned()
    };
    let env = ex.exported_env(ctx)?;

    let output = Command::new(shell.trim())
        .args(split_ws(&flags))
        .arg(cmd)
        .envs(env)
        .stdin(Stdio::inherit())
        .stderr(Stdio::inherit())
        .output();

    let (stdout, status) = match output {
        Ok(output) => (String::from_utf8_lossy(&output.stdout).into_owned(), output.status.code().unwrap_or(127)),
        Err(e) => {
            report!(ctx.loc.as_ref(), "{shell}: {e}", e = util::strerror(&e));
            (String::new(), 127)
        }
    };
    ex.scope().set_shell_status(status);
    Ok(normalize_shell_output(&stdout))
}

fn func_shell(ex: &mut Expander, raw: &str, ctx: &Ctx) -> Result::<String> {
    let cmd = ex.expand(raw, ctx)?;
    shell_capture(ex, &cmd, ctx)
}

fn func_file(ex: &mut Expander, raw: &str, ctx: &Ctx) -> Result::<String> {
    let a = args(ex, raw, "file", 1, 2, ctx)?;
    let target = ex.expand(a[0], ctx)?;
    let target = target.trim();
    let (op, name) = if let Some(rest) = target.strip_prefix(">>") {
        (">>", rest)
    } else if let Some(rest) = target.strip_prefix('>') {
        (">", rest)
    } else if let Some(rest) = target.strip_prefix('<') {
        ("<", rest)
    } else {
        return Err(ex.def_error(ctx, format!("file: invalid file operation: {target}")))
    };
    let name = name.trim();
    if name.is_empty() {
        return Err(ex.def_error(ctx, "file: missing filename"))
    }

    if op == "<" {
        if a.len() > 1 {
            return Err(ex.def_error(ctx, "file: too many arguments"))
        }
        return match std::fs::read_to_string(name) {
            Ok(content) => Ok(content.strip_suffix('\n').unwrap_or(&content).to_owned()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(String::new()),
            Err(e) => Err(ex.def_error(ctx, format!("open: {name}: {}", util::strerror(&e))))
        }
    }

    let mut text = match a.get(1) {
        Some(t) => ex.expand(t, ctx)?,
        None => String::new()
    };
    if a.len() > 1 && !text.ends_with('\n') {
        text.push('\n')
    }
    let file = OpenOptions::new().create(true).write(true).append(op == ">>").truncate(op == ">").open(name);
    file.and_then(|mut f| f.write_all(text.as_bytes())).map_err(|e| {
        ex.def_error(ctx, format!("open: {name}: {}", util::strerror(&e)))
    })?;
    Ok(String::new())
}

fn func_info(ex: &mut Expander, raw: &str, ctx: &Ctx) -> Result::<String> {
    let msg = ex.expand(raw, ctx)?;
    let mut stdout = std::io::stdout().lock();
    _ = writeln!(stdout, "{msg}");
    _ = stdout.flush();
    Ok(String::new())
}

fn func_warning(ex: &mut Expander, raw: &str, ctx: &Ctx) -> Result::<String> {
    let msg = ex.expand(raw, ctx)?;
    report!(ctx.loc.as_ref(), "{msg}");
    Ok(String::new())
}

fn func_error(ex: &mut Expander, raw: &str, ctx: &Ctx) -> Result::<String> {
    let msg = ex.expand(raw, ctx)?;
    Err(ex.error(ctx, msg))
}

#[cfg(test)]
mod tests {
    use crate::expand::tests::TestScope;

    fn expand(vars: &[(&str, &str)], text: &str) -> String {
        TestScope::with(vars).expand(text).unwrap()
    }

    fn expand_err(text: &str) -> String {
        TestScope::default().expand(text).unwrap_err().to_string()
    }

    #[test]
    fn text_functions() {
        assert_eq!(expand(&[], "$(subst ee,EE,feet on the street)"), "fEEt on the strEEt");
        assert_eq!(expand(&[], "$(subst ,Z,abc)"), "abcZ");
        assert_eq!(expand(&[], "$(patsubst %.c,%.o,x.c.c bar.c)"), "x.c.o bar.o");
        assert_eq!(expand(&[], "$(strip   a   b  c )"), "a b c");
        assert_eq!(expand(&[], "$(findstring a,a b c)"), "a");
        assert_eq!(expand(&[], "$(findstring a,b c)"), "");
        assert_eq!(expand(&[], "$(filter %.c %.s,foo.c bar.c baz.s ugh.h)"), "foo.c bar.c baz.s");
        assert_eq!(expand(&[], "$(filter-out %.c,foo.c ugh.h)"), "ugh.h");
        assert_eq!(expand(&[], "$(sort foo bar lose foo)"), "bar foo lose");
    }

    #[test]
    fn word_functions() {
        assert_eq!(expand(&[], "$(word 2, foo bar baz)"), "bar");
        assert_eq!(expand(&[], "$(word 9, foo bar baz)"), "");
        assert_eq!(expand(&[], "$(wordlist 2, 3, foo bar baz)"), "bar baz");
        assert_eq!(expand(&[], "$(wordlist 3, 2, foo bar baz)"), "");
        assert_eq!(expand(&[], "$(words foo bar baz)"), "3");
        assert_eq!(expand(&[], "$(firstword foo bar)"), "foo");
        assert_eq!(expand(&[], "$(lastword foo bar)"), "bar");
        assert_eq!(expand(&[], "$(join a b c,.c .o)"), "a.c b.o c");
    }

    #[test]
    fn word_index_errors() {
        assert!(expand_err("$(word 0,a)").contains("first argument to 'word' function must be greater than 0"));
        assert!(expand_err("$(word x,a)").contains("invalid first argument to 'word' function: 'x'"));
        assert!(expand_err("$(wordlist 1,,a)").contains("invalid second argument to 'wordlist' function: empty value"));
    }

    #[test]
    fn file_name_functions() {
        assert_eq!(expand(&[], "$(dir src/foo.c hacks)"), "src/ ./");
        assert_eq!(expand(&[], "$(notdir src/foo.c hacks)"), "foo.c hacks");
        assert_eq!(expand(&[], "$(suffix src/foo.c src-1.0/bar.c hacks)"), ".c .c");
        assert_eq!(expand(&[], "$(basename src/foo.c src-1.0/bar hacks)"), "src/foo src-1.0/bar hacks");
        assert_eq!(expand(&[], "$(addsuffix .c,foo bar)"), "foo.c bar.c");
        assert_eq!(expand(&[], "$(addprefix src/,foo bar)"), "src/foo src/bar");
        assert_eq!(expand(&[], "$(abspath /a/b/../c)"), "/a/c");
    }

    #[test]
    fn conditionals_are_lazy() {
        assert_eq!(expand(&[], "$(if x,yes,$(error never))"), "yes");
        assert_eq!(expand(&[], "$(if ,yes,no)"), "no");
        assert_eq!(expand(&[], "$(if ,yes)"), "");
        assert_eq!(expand(&[], "$(or ,,b,$(error never))"), "b");
        assert_eq!(expand(&[], "$(and a,b,c)"), "c");
        assert_eq!(expand(&[], "$(and a,,$(error never))"), "");
    }

    #[test]
    fn integer_comparison() {
        assert_eq!(expand(&[], "$(intcmp 1,2,lt,eq,gt)"), "lt");
        assert_eq!(expand(&[], "$(intcmp 2,2,lt,eq,gt)"), "eq");
        assert_eq!(expand(&[], "$(intcmp 3,2,lt,eq)"), "eq");
        assert_eq!(expand(&[], "$(intcmp 5,5)"), "5");
        assert_eq!(expand(&[], "$(intcmp 4,5)"), "");
        assert!(expand_err("$(intcmp a,1)").contains("invalid first argument to 'intcmp' function: 'a'"));
    }

    #[test]
    fn loops_and_bindings() {
        assert_eq!(expand(&[], "$(foreach d,a b,<$(d)>)"), "<a> <b>");
        assert_eq!(expand(&[], "$(let first rest,a b c,$(rest)+$(first))"), "b c+a");
        assert_eq!(expand(&[], "$(let a b c,x,[$(a)][$(b)][$(c)])"), "[x][][]");
    }

    #[test]
    fn call_binds_positional_parameters() {
        let vars = [("reverse", "$(2) $(1)"), ("outer", "$(call inner,z)"), ("inner", "[$(1)][$(2)]")];
        assert_eq!(expand(&vars, "$(call reverse,a,b)"), "b a");
        assert_eq!(expand(&vars, "$(call outer,x,y)"), "[z][]");
        assert_eq!(expand(&vars, "$(call missing,a)"), "");
        assert_eq!(expand(&vars, "$(call subst,a,b,aaa)"), "bbb");
    }

    #[test]
    fn recursive_call_terminates() {
        let vars = [("rev", "$(if $(1),$(call rev,$(wordlist 2,$(words $(1)),$(1))) $(firstword $(1)))")];
        assert_eq!(expand(&vars, "$(strip $(call rev,a b c))"), "c b a");
    }

    #[test]
    fn introspection() {
        let vars = [("R", "$(X)")];
        assert_eq!(expand(&vars, "$(value R)"), "$(X)");
        assert_eq!(expand(&vars, "$(flavor R)"), "recursive");
        assert_eq!(expand(&vars, "$(flavor NOPE_NOT_DEFINED_42)"), "undefined");
        assert_eq!(expand(&vars, "$(origin R)"), "file");
        assert_eq!(expand(&vars, "$(origin @)"), "automatic");
    }

    #[test]
    fn eval_reaches_scope() {
        let mut scope = TestScope::default();
        scope.expand("$(eval X := 1)").unwrap();
        assert_eq!(scope.evaluated, vec!["X := 1"]);
    }

    #[test]
    fn eval_in_recipe_rejects_prerequisites() {
        let mut scope = TestScope::default();
        let mut ctx = crate::expand::Ctx::default();
        ctx.recipe = true;
        let err = crate::expand::expand(&mut scope, "$(eval foo: bar)", &ctx).unwrap_err();
        assert!(err.to_string().contains("prerequisites cannot be defined in recipes"));
        crate::expand::expand(&mut scope, "$(eval X = 1)", &ctx).unwrap();
    }

    #[test]
    fn shell_output_normalization() {
        assert_eq!(super::normalize_shell_output("a\nb\n"), "a b");
        assert_eq!(super::normalize_shell_output("a\r\n"), "a");
        assert_eq!(super::normalize_shell_output("a\n\n"), "a ");
    }

    #[test]
    fn shell_sets_status() {
        let mut scope = TestScope::default();
        assert_eq!(scope.expand("$(shell printf 'x\\ny\\n')").unwrap(), "x y");
        assert_eq!(scope.shell_status, Some(0));
        scope.expand("$(shell exit 3)").unwrap();
        assert_eq!(scope.shell_status, Some(3));
    }

    #[test]
    fn file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.txt");
        let path = path.to_str().unwrap();
        let mut scope = TestScope::default();
        scope.expand(&format!("$(file >{path},one)$(file >>{path},two)")).unwrap();
        assert_eq!(scope.expand(&format!("$(file <{path})")).unwrap(), "one\ntwo");
        assert!(scope.expand("$(file !x,y)").unwrap_err().to_string().contains("file: invalid file operation"));
    }

    #[test]
    fn error_function_is_fatal() {
        assert!(expand_err("$(error boom)").contains("*** boom.  Stop."));
    }
}
