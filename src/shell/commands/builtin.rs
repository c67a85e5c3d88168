use std::io::Write;
use std::path::PathBuf;
use std::sync::Mutex;

use anyhow::Result;

use crate::repl::history::History;
use crate::shell::context::ShellContext;
use crate::shell::lookup::find_executable;

/// Shell-internal commands. Each stage is resolved to a concrete variant
/// once, before execution, so the coordinator's two execution paths stay
/// statically exhaustive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Builtin {
    Echo,
    Pwd,
    Cd,
    Exit,
    Type,
    History,
}

/// Builtin names in completion priority order.
pub const BUILTIN_NAMES: &[&str] = &["echo", "exit", "type", "pwd", "cd", "history"];

impl Builtin {
    pub fn lookup(name: &str) -> Option<Self> {
        match name {
            "echo" => Some(Self::Echo),
            "pwd" => Some(Self::Pwd),
            "cd" => Some(Self::Cd),
            "exit" => Some(Self::Exit),
            "type" => Some(Self::Type),
            "history" => Some(Self::History),
            _ => None,
        }
    }
}

pub fn is_builtin(name: &str) -> bool {
    Builtin::lookup(name).is_some()
}

/// Session mutations a builtin may request. Applied by the dispatch loop
/// after the pipeline completes, never concurrently with running stages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    Chdir(PathBuf),
    Exit(i32),
}

pub struct BuiltinOutcome {
    pub status: i32,
    pub effect: Option<Effect>,
}

impl BuiltinOutcome {
    fn ok() -> Self {
        Self {
            status: 0,
            effect: None,
        }
    }

    fn failed() -> Self {
        Self {
            status: 1,
            effect: None,
        }
    }
}

impl Builtin {
    /// Run against the assembled output/error streams. Builtins never read
    /// their input stream.
    pub fn run(
        self,
        argv: &[String],
        ctx: &ShellContext,
        history: &Mutex<History>,
        out: &mut dyn Write,
        err: &mut dyn Write,
    ) -> Result<BuiltinOutcome> {
        match self {
            Self::Echo => echo(argv, out),
            Self::Pwd => pwd(ctx, out),
            Self::Cd => cd(argv, ctx, err),
            Self::Exit => exit(argv, err),
            Self::Type => type_cmd(argv, ctx, out, err),
            Self::History => history_cmd(argv, ctx, history, out, err),
        }
    }
}

fn echo(argv: &[String], out: &mut dyn Write) -> Result<BuiltinOutcome> {
    writeln!(out, "{}", argv[1..].join(" "))?;
    Ok(BuiltinOutcome::ok())
}

fn pwd(ctx: &ShellContext, out: &mut dyn Write) -> Result<BuiltinOutcome> {
    writeln!(out, "{}", ctx.cwd.display())?;
    Ok(BuiltinOutcome::ok())
}

fn cd(argv: &[String], ctx: &ShellContext, err: &mut dyn Write) -> Result<BuiltinOutcome> {
    if argv.len() != 2 {
        writeln!(err, "cd: invalid number of arguments")?;
        return Ok(BuiltinOutcome::failed());
    }

    let mut path = argv[1].clone();
    if let Some(rest) = path.strip_prefix('~') {
        if let Some(home) = ctx.var("HOME") {
            path = format!("{home}{rest}");
        }
    }

    let target = ctx.resolve_path(&path);
    match target.canonicalize() {
        Ok(canonical) if canonical.is_dir() => Ok(BuiltinOutcome {
            status: 0,
            effect: Some(Effect::Chdir(canonical)),
        }),
        _ => {
            writeln!(err, "cd: no such file or directory: {}", argv[1])?;
            Ok(BuiltinOutcome::failed())
        }
    }
}

fn exit(argv: &[String], err: &mut dyn Write) -> Result<BuiltinOutcome> {
    if argv.len() > 2 {
        writeln!(err, "exit: too many arguments")?;
        return Ok(BuiltinOutcome::failed());
    }
    let code = argv.get(1).and_then(|s| s.parse().ok()).unwrap_or(0);
    Ok(BuiltinOutcome {
        status: code,
        effect: Some(Effect::Exit(code)),
    })
}

fn type_cmd(
    argv: &[String],
    ctx: &ShellContext,
    out: &mut dyn Write,
    err: &mut dyn Write,
) -> Result<BuiltinOutcome> {
    if argv.len() != 2 {
        writeln!(err, "type: invalid number of arguments")?;
        return Ok(BuiltinOutcome::failed());
    }

    let name = &argv[1];
    if is_builtin(name) {
        writeln!(out, "{name} is a shell builtin")?;
        return Ok(BuiltinOutcome::ok());
    }
    match find_executable(ctx, name) {
        Some(path) => {
            writeln!(out, "{} is {}", name, path.display())?;
            Ok(BuiltinOutcome::ok())
        }
        None => {
            writeln!(err, "{name}: not found")?;
            Ok(BuiltinOutcome::failed())
        }
    }
}

fn history_cmd(
    argv: &[String],
    ctx: &ShellContext,
    history: &Mutex<History>,
    out: &mut dyn Write,
    err: &mut dyn Write,
) -> Result<BuiltinOutcome> {
    let mut history = history.lock().unwrap_or_else(|e| e.into_inner());
    match argv {
        [_] => {
            history.print_all(out)?;
            Ok(BuiltinOutcome::ok())
        }
        [_, count] => match count.parse::<usize>() {
            Ok(n) => {
                history.print_last(out, n)?;
                Ok(BuiltinOutcome::ok())
            }
            Err(_) => {
                writeln!(err, "history: {count}: numeric argument required")?;
                Ok(BuiltinOutcome::failed())
            }
        },
        [_, flag, file] if flag == "-r" || flag == "-w" || flag == "-a" => {
            let path = ctx.resolve_path(file);
            let result = match flag.as_str() {
                "-r" => history.read_from(&path),
                "-w" => history.write_to(&path),
                _ => history.append_to(&path),
            };
            match result {
                Ok(()) => Ok(BuiltinOutcome::ok()),
                Err(e) => {
                    writeln!(err, "history: {e:#}")?;
                    Ok(BuiltinOutcome::failed())
                }
            }
        }
        _ => {
            writeln!(err, "history: invalid arguments")?;
            Ok(BuiltinOutcome::failed())
        }
    }
}
