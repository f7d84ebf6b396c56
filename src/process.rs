//! Subprocess execution with piped stdio and cooperative cancellation.
//!
//! Every pipe gets its own scoped pump thread, so a tool that writes output
//! before it has consumed all of its input can never deadlock against us.
//! The calling thread supervises: it races process exit against the stop
//! signal and, if the signal wins, kills and reaps the child. The scope joins
//! every pump before [`execute`] returns, on all paths.

use crate::args::display_args;
use crate::cancel::{Stop, StopReason};
use crate::error::{Error, ExecutionFailure, Result};
use alloc::boxed::Box;
use alloc::string::String;
use alloc::vec::Vec;
use core::time::Duration;
use std::ffi::OsString;
use std::io::{self, Read, Write};
use std::path::Path;
use std::process::{Child, ChildStdin, Command, ExitStatus, Stdio};
use std::thread;
use whereat::*;

const POLL_MIN: Duration = Duration::from_millis(1);
const POLL_MAX: Duration = Duration::from_millis(10);

/// One fully materialized tool invocation. Built per run, consumed by
/// [`execute`].
pub struct ExecutionRequest<'a> {
    pub(crate) args: Vec<OsString>,
    pub(crate) stdin: Option<Box<dyn Read + Send + 'a>>,
    pub(crate) stdout: Option<&'a mut (dyn Write + Send)>,
}

impl<'a> ExecutionRequest<'a> {
    /// Request with the given arguments, no stdin, and captured stdout.
    #[must_use]
    pub fn new<I, S>(args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        Self {
            args: args.into_iter().map(Into::into).collect(),
            stdin: None,
            stdout: None,
        }
    }

    /// Pipe `reader` into the process's stdin.
    #[must_use]
    pub fn stdin(mut self, reader: impl Read + Send + 'a) -> Self {
        self.stdin = Some(Box::new(reader));
        self
    }

    /// Stream stdout into `sink` instead of capturing it.
    #[must_use]
    pub fn stdout(mut self, sink: &'a mut (dyn Write + Send)) -> Self {
        self.stdout = Some(sink);
        self
    }
}

/// Output of a successful execution.
#[derive(Debug, Clone, Default)]
pub struct Execution {
    /// Captured stdout; empty when stdout was streamed to a sink.
    pub stdout: Vec<u8>,
    /// Captured stderr.
    pub stderr: Vec<u8>,
}

enum Outcome {
    Exited(ExitStatus),
    Cancelled(StopReason),
}

/// Run `program` with `request`, observing `stop` until the process exits.
///
/// A signal that is already raised prevents the launch. A non-zero exit that
/// coincides with a raised signal is reported as [`Error::Cancelled`], since
/// the failure is an artifact of the kill.
pub fn execute(program: &Path, request: ExecutionRequest<'_>, stop: &dyn Stop) -> Result<Execution> {
    let name = program_name(program);
    if let Err(reason) = stop.check() {
        return Err(at!(Error::Cancelled(reason)));
    }

    let ExecutionRequest { args, stdin, stdout } = request;
    log::debug!("spawning {} {}", program.display(), display_args(&args));

    let mut child = Command::new(program)
        .args(&args)
        .stdin(if stdin.is_some() {
            Stdio::piped()
        } else {
            Stdio::null()
        })
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| {
            at!(Error::Execution(ExecutionFailure {
                program: name.clone(),
                status: None,
                detail: alloc::format!("failed to launch: {}", e),
                stderr: String::new(),
            }))
        })?;

    let child_stdin = child.stdin.take();
    let child_stdout = child.stdout.take();
    let child_stderr = child.stderr.take();

    let (outcome, stdin_result, stdout_result, stderr) = thread::scope(|scope| {
        let stdin_pump = match (stdin, child_stdin) {
            (Some(reader), Some(pipe)) => Some(scope.spawn(move || pump_stdin(reader, pipe))),
            _ => None,
        };
        let stdout_pump = child_stdout.map(|mut pipe| {
            scope.spawn(move || -> io::Result<Vec<u8>> {
                let mut captured = Vec::new();
                match stdout {
                    Some(sink) => {
                        io::copy(&mut pipe, sink)?;
                        sink.flush()?;
                    }
                    None => {
                        pipe.read_to_end(&mut captured)?;
                    }
                }
                Ok(captured)
            })
        });
        let stderr_pump = child_stderr.map(|mut pipe| {
            scope.spawn(move || {
                let mut captured = Vec::new();
                // Best effort: stderr is diagnostic only.
                let _ = pipe.read_to_end(&mut captured);
                captured
            })
        });

        let outcome = supervise(&mut child, stop);

        let stdin_result = match stdin_pump {
            Some(handle) => handle.join().unwrap_or_else(|_| Err(panicked("stdin"))),
            None => Ok(()),
        };
        let stdout_result = match stdout_pump {
            Some(handle) => handle.join().unwrap_or_else(|_| Err(panicked("stdout"))),
            None => Ok(Vec::new()),
        };
        let stderr = match stderr_pump {
            Some(handle) => handle.join().unwrap_or_default(),
            None => Vec::new(),
        };
        (outcome, stdin_result, stdout_result, stderr)
    });

    let failure = |status: Option<i32>, detail: String| {
        at!(Error::Execution(ExecutionFailure {
            program: name.clone(),
            status,
            detail,
            stderr: String::from_utf8_lossy(&stderr).into_owned(),
        }))
    };

    let status = match outcome {
        Ok(Outcome::Cancelled(reason)) => return Err(at!(Error::Cancelled(reason))),
        Ok(Outcome::Exited(status)) => status,
        Err(e) => return Err(failure(None, alloc::format!("could not be waited on: {}", e))),
    };

    // Pipe errors first: a failed sink or reader makes the tool exit
    // non-zero, and that status alone would hide the cause.
    let stdout = stdout_result
        .map_err(|e| failure(status.code(), alloc::format!("failed to forward output: {}", e)))?;
    stdin_result
        .map_err(|e| failure(status.code(), alloc::format!("failed to stream input: {}", e)))?;

    if !status.success() {
        let detail = match status.code() {
            Some(code) => alloc::format!("exited with status {}", code),
            None => alloc::format!("terminated abnormally ({})", status),
        };
        return Err(failure(status.code(), detail));
    }

    Ok(Execution { stdout, stderr })
}

/// Race process exit against `stop`. The child is reaped on every path.
fn supervise(child: &mut Child, stop: &dyn Stop) -> io::Result<Outcome> {
    let mut delay = POLL_MIN;
    loop {
        match child.try_wait() {
            Ok(Some(status)) => {
                if !status.success() {
                    if let Err(reason) = stop.check() {
                        return Ok(Outcome::Cancelled(reason));
                    }
                }
                return Ok(Outcome::Exited(status));
            }
            Ok(None) => {}
            Err(e) => {
                let _ = child.kill();
                let _ = child.wait();
                return Err(e);
            }
        }

        if let Err(reason) = stop.check() {
            log::debug!("cancellation requested; killing pid {}", child.id());
            // The child may exit on its own between try_wait and kill; it is
            // still unreaped then, so the kill is harmless.
            let _ = child.kill();
            child.wait()?;
            return Ok(Outcome::Cancelled(reason));
        }

        thread::sleep(delay);
        delay = (delay * 2).min(POLL_MAX);
    }
}

fn pump_stdin(mut reader: Box<dyn Read + Send + '_>, mut pipe: ChildStdin) -> io::Result<()> {
    match io::copy(&mut reader, &mut pipe) {
        Ok(_) => Ok(()),
        // The tool stopped reading (finished early, failed, or was killed);
        // its exit status tells the story.
        Err(e) if e.kind() == io::ErrorKind::BrokenPipe => {
            log::trace!("stdin closed early by child");
            Ok(())
        }
        Err(e) => Err(e),
    }
    // `pipe` drops here, closing stdin so the tool sees EOF.
}

fn panicked(pipe: &str) -> io::Error {
    io::Error::other(alloc::format!("{} pump thread panicked", pipe))
}

fn program_name(program: &Path) -> String {
    program
        .file_name()
        .unwrap_or(program.as_os_str())
        .to_string_lossy()
        .into_owned()
}
