//! Process execution.

use crate::command::{CallOptions, ShellCommand, ShellResult};
use crate::error::{Error, Result};
use std::io::{BufRead, BufReader, Read};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

const POLL_INTERVAL: Duration = Duration::from_millis(20);

/// Something that can run a command to completion.
///
/// Implementations return `Ok` for any exit code. `Err` is reserved for
/// commands that could not be started or that hit their timeout.
pub trait ShellRunner {
    /// Run `command` with `opts` and capture its result.
    fn run(&self, command: &ShellCommand, opts: &CallOptions) -> Result<ShellResult>;
}

impl<T: ShellRunner + ?Sized> ShellRunner for &T {
    fn run(&self, command: &ShellCommand, opts: &CallOptions) -> Result<ShellResult> {
        (**self).run(command, opts)
    }
}

impl<T: ShellRunner + ?Sized> ShellRunner for Box<T> {
    fn run(&self, command: &ShellCommand, opts: &CallOptions) -> Result<ShellResult> {
        (**self).run(command, opts)
    }
}

/// Runs commands as local child processes.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemShell;

impl ShellRunner for SystemShell {
    fn run(&self, command: &ShellCommand, opts: &CallOptions) -> Result<ShellResult> {
        let display = command.to_string();
        let argv = command.to_argv(opts);
        let Some((program, args)) = argv.split_first() else {
            return Err(Error::Spawn {
                command: display,
                source: std::io::Error::new(std::io::ErrorKind::InvalidInput, "empty command"),
            });
        };

        log::debug!("Running: {display}");

        let mut cmd = Command::new(program);
        cmd.args(args)
            .envs(&opts.env)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        if let Some(cwd) = &opts.cwd {
            cmd.current_dir(cwd);
        }

        // Own process group so a timeout can take grandchildren down too
        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;
            cmd.process_group(0);
        }

        let mut child = cmd.spawn().map_err(|source| Error::Spawn {
            command: display.clone(),
            source,
        })?;

        let stdout = child.stdout.take().map(|s| drain(s, opts.logoutput));
        let stderr = child.stderr.take().map(|s| drain(s, opts.logoutput));

        let status = match opts.timeout {
            Some(timeout) => match wait_with_timeout(&mut child, timeout)? {
                Some(status) => status,
                None => {
                    collect(stdout);
                    collect(stderr);
                    return Err(Error::Timeout {
                        command: display,
                        timeout,
                    });
                }
            },
            None => child.wait()?,
        };

        let result = ShellResult::new(exit_code(status), collect(stdout), collect(stderr));
        log::trace!("'{display}' exited with {}", result.exit_code);
        Ok(result)
    }
}

/// Run a command, returning its result whatever the exit code.
pub fn call(
    runner: &dyn ShellRunner,
    command: &ShellCommand,
    opts: &CallOptions,
) -> Result<ShellResult> {
    runner.run(command, opts)
}

/// Run a command, failing with [`Error::ExecutionFailed`] on a nonzero exit code.
pub fn checked_call(
    runner: &dyn ShellRunner,
    command: &ShellCommand,
    opts: &CallOptions,
) -> Result<ShellResult> {
    let result = runner.run(command, opts)?;
    if result.is_success() {
        Ok(result)
    } else {
        Err(Error::ExecutionFailed {
            command: command.to_string(),
            result,
        })
    }
}

/// Read a stream to the end on its own thread, optionally logging each line.
fn drain<R: Read + Send + 'static>(stream: R, logoutput: bool) -> JoinHandle<String> {
    thread::spawn(move || {
        let mut captured = String::new();
        for line in BufReader::new(stream).split(b'\n') {
            let Ok(bytes) = line else { break };
            let line = String::from_utf8_lossy(&bytes);
            if logoutput {
                log::info!("{}", line.trim_end_matches('\r'));
            }
            captured.push_str(&line);
            captured.push('\n');
        }
        captured
    })
}

fn collect(handle: Option<JoinHandle<String>>) -> String {
    handle
        .and_then(|h| h.join().ok())
        .map(|s| s.trim_end().to_string())
        .unwrap_or_default()
}

/// Wait for the child; `None` means the deadline passed and it was killed.
fn wait_with_timeout(child: &mut Child, timeout: Duration) -> Result<Option<ExitStatus>> {
    let deadline = Instant::now() + timeout;
    loop {
        if let Some(status) = child.try_wait()? {
            return Ok(Some(status));
        }
        if Instant::now() >= deadline {
            log::warn!(
                "Process {} exceeded {}s timeout, killing its process group",
                child.id(),
                timeout.as_secs_f64()
            );
            kill_process_group(child);
            // Reap; the exit status of a killed process is irrelevant
            let _ = child.wait();
            return Ok(None);
        }
        thread::sleep(POLL_INTERVAL);
    }
}

#[cfg(unix)]
fn kill_process_group(child: &mut Child) {
    let pgid = child.id() as libc::pid_t;
    // SAFETY: kill(2) with a negative pid signals the group created at spawn.
    // A group that already exited only yields ESRCH.
    unsafe {
        libc::kill(-pgid, libc::SIGKILL);
    }
    let _ = child.kill();
}

#[cfg(not(unix))]
fn kill_process_group(child: &mut Child) {
    let _ = child.kill();
}

fn exit_code(status: ExitStatus) -> i32 {
    if let Some(code) = status.code() {
        return code;
    }
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return 128 + signal;
        }
    }
    -1
}
