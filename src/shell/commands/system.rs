// External command stage
use std::io;
use std::path::Path;
use std::process::{Child, Command, Stdio};
use std::thread::{self, JoinHandle};

use anyhow::{Context, Result};
use log::debug;
use os_pipe::PipeReader;

use crate::shell::context::ShellContext;

/// Where one of an external stage's output streams goes.
pub enum Sink {
    /// The shell's own stream.
    Inherit,
    /// A pipe or file end handed straight to the child.
    Fd(Stdio),
    /// A writer the coordinator must actively relay into.
    Relay(Box<dyn io::Write + Send>),
}

/// One spawned external stage plus the relay threads draining it.
pub struct ExternalStage {
    child: Child,
    relays: Vec<JoinHandle<()>>,
}

impl ExternalStage {
    pub fn spawn(
        path: &Path,
        argv: &[String],
        ctx: &ShellContext,
        stdin: Option<PipeReader>,
        stdout: Sink,
        stderr: Sink,
    ) -> Result<Self> {
        let mut cmd = Command::new(path);
        cmd.args(&argv[1..]).current_dir(&ctx.cwd);

        // The session environment is the source of truth
        cmd.env_clear();
        cmd.envs(&ctx.env);

        match stdin {
            Some(reader) => cmd.stdin(Stdio::from(reader)),
            None => cmd.stdin(Stdio::inherit()),
        };
        let out_relay = configure(&mut cmd, stdout, StdioSlot::Out);
        let err_relay = configure(&mut cmd, stderr, StdioSlot::Err);

        let mut child = cmd
            .spawn()
            .with_context(|| format!("failed to spawn {}", path.display()))?;

        let mut relays = Vec::new();
        if let Some(mut dest) = out_relay {
            if let Some(mut src) = child.stdout.take() {
                relays.push(thread::spawn(move || {
                    io::copy(&mut src, &mut dest).ok();
                }));
            }
        }
        if let Some(mut dest) = err_relay {
            if let Some(mut src) = child.stderr.take() {
                relays.push(thread::spawn(move || {
                    io::copy(&mut src, &mut dest).ok();
                }));
            }
        }

        Ok(Self { child, relays })
    }

    /// Wait for the process, then for its relay threads (all output must be
    /// flushed before the status is reported).
    pub fn wait(mut self) -> i32 {
        let status = match self.child.wait() {
            Ok(status) => status.code().unwrap_or(1),
            Err(e) => {
                debug!("wait failed: {e}");
                1
            }
        };
        for relay in self.relays {
            relay.join().ok();
        }
        status
    }
}

enum StdioSlot {
    Out,
    Err,
}

fn configure(cmd: &mut Command, sink: Sink, slot: StdioSlot) -> Option<Box<dyn io::Write + Send>> {
    let (stdio, relay) = match sink {
        Sink::Inherit => (Stdio::inherit(), None),
        Sink::Fd(stdio) => (stdio, None),
        Sink::Relay(writer) => (Stdio::piped(), Some(writer)),
    };
    match slot {
        StdioSlot::Out => cmd.stdout(stdio),
        StdioSlot::Err => cmd.stderr(stdio),
    };
    relay
}
