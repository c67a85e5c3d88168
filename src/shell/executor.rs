use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::sync::{Arc, Mutex};
use std::thread;

use anyhow::{Context, Result};
use log::debug;
use os_pipe::{PipeReader, PipeWriter, pipe};

use crate::repl::history::History;
use crate::shell::ast::{Pipeline, Redirect, Stage};
use crate::shell::commands::builtin::{Builtin, BuiltinOutcome, Effect};
use crate::shell::commands::system::{ExternalStage, Sink};
use crate::shell::context::ShellContext;
use crate::shell::lookup::find_executable;

/// Result of one pipeline run: the last stage's status plus a pending
/// `exit` request, if any stage asked for one.
#[derive(Debug)]
pub struct Outcome {
    pub status: i32,
    pub exit: Option<i32>,
}

// SharedWriter allows handing one sink to several concurrent stages
// (by sharing the underlying writer via Arc+Mutex).
#[derive(Clone)]
struct SharedWriter(Arc<Mutex<Box<dyn Write + Send>>>);

impl SharedWriter {
    fn new(writer: Box<dyn Write + Send>) -> Self {
        Self(Arc::new(Mutex::new(writer)))
    }
}

impl Write for SharedWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap_or_else(|e| e.into_inner()).write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.0.lock().unwrap_or_else(|e| e.into_inner()).flush()
    }
}

/// Where a stage's stdout or stderr ends up.
enum OutDest {
    Inherit,
    Shared(SharedWriter),
    Pipe(PipeWriter),
    File(File),
}

enum StdStream {
    Out,
    Err,
}

impl OutDest {
    fn into_writer(self, stream: StdStream) -> Box<dyn Write + Send> {
        match self {
            OutDest::Inherit => match stream {
                StdStream::Out => Box::new(io::stdout()),
                StdStream::Err => Box::new(io::stderr()),
            },
            OutDest::Shared(shared) => Box::new(shared),
            OutDest::Pipe(writer) => Box::new(writer),
            OutDest::File(file) => Box::new(file),
        }
    }

    fn into_sink(self) -> Sink {
        match self {
            OutDest::Inherit => Sink::Inherit,
            OutDest::Shared(shared) => Sink::Relay(Box::new(shared)),
            OutDest::Pipe(writer) => Sink::Fd(writer.into()),
            OutDest::File(file) => Sink::Fd(file.into()),
        }
    }
}

fn diag(dest: &mut OutDest, line: &str) {
    let _ = match dest {
        OutDest::Inherit => writeln!(io::stderr(), "{line}"),
        OutDest::Shared(shared) => writeln!(shared, "{line}"),
        OutDest::Pipe(writer) => writeln!(writer, "{line}"),
        OutDest::File(file) => writeln!(file, "{line}"),
    };
}

fn shell_err(capture: &Option<SharedWriter>) -> OutDest {
    match capture {
        Some(shared) => OutDest::Shared(shared.clone()),
        None => OutDest::Inherit,
    }
}

fn open_redirect(ctx: &ShellContext, redirect: &Redirect) -> io::Result<File> {
    let path = ctx.resolve_path(&redirect.target);
    let mut opts = OpenOptions::new();
    opts.write(true).create(true);
    if redirect.append {
        opts.append(true);
    } else {
        opts.truncate(true);
    }
    opts.open(path)
}

/// The assembled streams for one stage.
struct StageIo {
    out: OutDest,
    err: OutDest,
    next_reader: Option<PipeReader>,
    failed: bool,
}

/// Wire one stage's stdout and stderr. A redirect target beats the pipe to
/// the successor; the successor of a redirected stage reads empty input.
/// An unopenable target marks the stage failed after reporting it.
fn wire_stage(
    stage: &Stage,
    is_last: bool,
    ctx: &ShellContext,
    stdout_capture: &Option<SharedWriter>,
    stderr_capture: &Option<SharedWriter>,
) -> Result<StageIo> {
    let mut failed = false;

    let mut err = match &stage.stderr_redirect {
        Some(redirect) => match open_redirect(ctx, redirect) {
            Ok(file) => OutDest::File(file),
            Err(e) => {
                let mut fallback = shell_err(stderr_capture);
                diag(&mut fallback, &format!("mish: {}: {e}", redirect.target));
                failed = true;
                fallback
            }
        },
        None => shell_err(stderr_capture),
    };

    let mut next_reader = None;
    let out = if let Some(redirect) = &stage.stdout_redirect {
        if !is_last {
            let (reader, writer) = pipe().context("failed to create pipe")?;
            drop(writer);
            next_reader = Some(reader);
        }
        match open_redirect(ctx, redirect) {
            Ok(file) => OutDest::File(file),
            Err(e) => {
                diag(&mut err, &format!("mish: {}: {e}", redirect.target));
                failed = true;
                OutDest::Inherit
            }
        }
    } else if is_last {
        match stdout_capture {
            Some(shared) => OutDest::Shared(shared.clone()),
            None => OutDest::Inherit,
        }
    } else {
        let (reader, writer) = pipe().context("failed to create pipe")?;
        next_reader = Some(reader);
        OutDest::Pipe(writer)
    };

    Ok(StageIo {
        out,
        err,
        next_reader,
        failed,
    })
}

enum Running<'scope> {
    External(ExternalStage),
    Builtin(thread::ScopedJoinHandle<'scope, (i32, Option<Effect>)>),
    Done(i32),
}

/// Execute a pipeline: stage i's stdout feeds stage i+1's stdin, the first
/// stage reads the shell's stdin, the last writes the shell's stdout (or
/// the provided capture sink). All stages are started before any is waited
/// on; the reported status is the last stage's alone.
///
/// `stdout`/`stderr` of `None` mean the shell's own streams.
pub fn run_pipeline(
    pipeline: &Pipeline,
    ctx: &mut ShellContext,
    history: &Mutex<History>,
    stdout: Option<Box<dyn Write + Send>>,
    stderr: Option<Box<dyn Write + Send>>,
) -> Result<Outcome> {
    let stages = &pipeline.stages;
    if pipeline.is_empty() {
        return Ok(Outcome {
            status: ctx.exit_code,
            exit: None,
        });
    }

    let stdout_capture = stdout.map(SharedWriter::new);
    let stderr_capture = stderr.map(SharedWriter::new);

    // The sole-builtin case runs inline on the dispatcher thread.
    if let [stage] = stages.as_slice() {
        if let Some(builtin) = Builtin::lookup(stage.name()) {
            return run_sole_builtin(builtin, stage, ctx, history, stdout_capture, stderr_capture);
        }
    }

    let mut effects: Vec<Effect> = Vec::new();
    let mut last_status = 0;

    thread::scope(|scope| -> Result<()> {
        let mut running: Vec<Running> = Vec::with_capacity(stages.len());
        let mut prev_reader: Option<PipeReader> = None;

        for (i, stage) in stages.iter().enumerate() {
            let is_last = i + 1 == stages.len();
            let stdin = prev_reader.take();
            let StageIo {
                out: out_dest,
                err: mut err_dest,
                next_reader,
                failed,
            } = wire_stage(stage, is_last, ctx, &stdout_capture, &stderr_capture)?;
            prev_reader = next_reader;

            if failed {
                running.push(Running::Done(1));
                continue;
            }

            let run = match Builtin::lookup(stage.name()) {
                Some(builtin) => {
                    // Builtins never read pipe input; closing it lets the
                    // upstream stage observe a broken pipe, as with a real
                    // shell.
                    drop(stdin);
                    let argv = stage.argv.clone();
                    let snapshot = ctx.clone();
                    let mut out = out_dest.into_writer(StdStream::Out);
                    let mut err = err_dest.into_writer(StdStream::Err);
                    Running::Builtin(scope.spawn(move || {
                        match builtin.run(&argv, &snapshot, history, &mut out, &mut err) {
                            Ok(BuiltinOutcome { status, effect }) => {
                                out.flush().ok();
                                (status, effect)
                            }
                            Err(e) => {
                                debug!("builtin {} failed: {e:#}", argv[0]);
                                (1, None)
                            }
                        }
                    }))
                }
                None => match find_executable(ctx, stage.name()) {
                    Some(path) => {
                        debug!("resolved {} -> {}", stage.name(), path.display());
                        let spawned = ExternalStage::spawn(
                            &path,
                            &stage.argv,
                            ctx,
                            stdin,
                            out_dest.into_sink(),
                            err_dest.into_sink(),
                        );
                        match spawned {
                            Ok(external) => Running::External(external),
                            Err(e) => {
                                debug!("spawn failed: {e:#}");
                                let mut err = shell_err(&stderr_capture);
                                diag(&mut err, &format!("{}: command not found", stage.name()));
                                Running::Done(127)
                            }
                        }
                    }
                    None => {
                        drop(stdin);
                        diag(&mut err_dest, &format!("{}: command not found", stage.name()));
                        Running::Done(127)
                    }
                },
            };
            running.push(run);
        }

        // Wait for every stage; the last status observed wins.
        for run in running {
            last_status = match run {
                Running::External(external) => external.wait(),
                Running::Builtin(handle) => match handle.join() {
                    Ok((status, effect)) => {
                        if let Some(effect) = effect {
                            effects.push(effect);
                        }
                        status
                    }
                    Err(_) => 1,
                },
                Running::Done(status) => status,
            };
        }
        Ok(())
    })?;

    ctx.exit_code = last_status;
    let mut exit = None;
    for effect in effects {
        match effect {
            Effect::Chdir(path) => ctx.cwd = path,
            Effect::Exit(code) => exit = Some(code),
        }
    }

    Ok(Outcome {
        status: last_status,
        exit,
    })
}

fn run_sole_builtin(
    builtin: Builtin,
    stage: &Stage,
    ctx: &mut ShellContext,
    history: &Mutex<History>,
    stdout_capture: Option<SharedWriter>,
    stderr_capture: Option<SharedWriter>,
) -> Result<Outcome> {
    let StageIo {
        out: out_dest,
        err: err_dest,
        failed,
        ..
    } = wire_stage(stage, true, ctx, &stdout_capture, &stderr_capture)?;

    if failed {
        ctx.exit_code = 1;
        return Ok(Outcome {
            status: 1,
            exit: None,
        });
    }

    let mut out = out_dest.into_writer(StdStream::Out);
    let mut err = err_dest.into_writer(StdStream::Err);
    let BuiltinOutcome { status, effect } = builtin.run(&stage.argv, ctx, history, &mut out, &mut err)?;
    out.flush().ok();

    ctx.exit_code = status;
    let mut exit = None;
    match effect {
        Some(Effect::Chdir(path)) => ctx.cwd = path,
        Some(Effect::Exit(code)) => exit = Some(code),
        None => {}
    }

    Ok(Outcome { status, exit })
}
