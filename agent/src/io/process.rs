//! Child process execution with timeouts and bounded output.
//!
//! Used by the pipeline runner and the command model backend. Both need the
//! same guarantees: the child cannot hang the loop, and a chatty child cannot
//! exhaust memory.

use std::io::{Read, Write};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use tracing::{debug, error, instrument, warn};
use wait_timeout::ChildExt;

/// Captured child process output.
#[derive(Debug)]
pub struct CommandOutput {
    pub status: ExitStatus,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
    pub stdout_truncated: usize,
    pub stderr_truncated: usize,
    pub timed_out: bool,
}

impl CommandOutput {
    /// True when the child exited with status 0 before the deadline.
    pub fn succeeded(&self) -> bool {
        !self.timed_out && self.status.success()
    }

    pub fn stdout_text(&self) -> String {
        lossy_with_notice(&self.stdout, self.stdout_truncated, "stdout")
    }

    pub fn stderr_text(&self) -> String {
        lossy_with_notice(&self.stderr, self.stderr_truncated, "stderr")
    }
}

fn lossy_with_notice(bytes: &[u8], truncated: usize, label: &str) -> String {
    let mut text = String::from_utf8_lossy(bytes).into_owned();
    if truncated > 0 {
        text.push_str(&format!("\n[{label} truncated {truncated} bytes]\n"));
    }
    text
}

/// Run `cmd` to completion or until `timeout`, capturing at most
/// `output_limit_bytes` of each output stream.
///
/// Both pipes are drained on reader threads while the child runs, so a child
/// that fills a pipe never blocks. A timed-out child is killed and reported
/// with `timed_out = true`; only spawn and wait failures are errors.
#[instrument(
    skip_all,
    fields(program = ?cmd.get_program(), timeout_secs = timeout.as_secs(), output_limit_bytes)
)]
pub fn run_command_with_timeout(
    mut cmd: Command,
    stdin: Option<&[u8]>,
    timeout: Duration,
    output_limit_bytes: usize,
) -> Result<CommandOutput> {
    let stdin_mode = if stdin.is_some() { Stdio::piped() } else { Stdio::null() };
    cmd.stdin(stdin_mode)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());

    let mut child = cmd.spawn().map_err(|e| {
        error!(err = %e, "failed to spawn command");
        anyhow::Error::new(e).context(format!("spawn {:?}", cmd.get_program()))
    })?;
    debug!(pid = child.id(), "child spawned");

    let stdout = BoundedReader::spawn(child.stdout.take(), output_limit_bytes)
        .context("capture stdout")?;
    let stderr = BoundedReader::spawn(child.stderr.take(), output_limit_bytes)
        .context("capture stderr")?;

    if let Some(input) = stdin
        && let Some(mut pipe) = child.stdin.take()
    {
        // A child that exits without reading closes the pipe early; its exit
        // status reports that, not this write.
        if let Err(e) = pipe.write_all(input) {
            warn!(err = %e, "child closed stdin early");
        }
    }

    let (status, timed_out) = wait_or_kill(&mut child, timeout)?;
    let (stdout, stdout_truncated) = stdout.finish().context("join stdout")?;
    let (stderr, stderr_truncated) = stderr.finish().context("join stderr")?;

    if stdout_truncated + stderr_truncated > 0 {
        warn!(stdout_truncated, stderr_truncated, "output truncated");
    }
    debug!(exit_code = ?status.code(), timed_out, "command finished");

    Ok(CommandOutput {
        status,
        stdout,
        stderr,
        stdout_truncated,
        stderr_truncated,
        timed_out,
    })
}

/// Wait for `child`, killing it once `timeout` elapses.
fn wait_or_kill(child: &mut Child, timeout: Duration) -> Result<(ExitStatus, bool)> {
    if let Some(status) = child.wait_timeout(timeout).context("wait for command")? {
        return Ok((status, false));
    }
    warn!(
        timeout_secs = timeout.as_secs(),
        "command timed out, killing"
    );
    child.kill().context("kill command")?;
    let status = child.wait().context("wait command after kill")?;
    Ok((status, true))
}

/// Reader thread that keeps the first `limit` bytes of a stream and counts the rest.
struct BoundedReader {
    handle: thread::JoinHandle<Result<(Vec<u8>, usize)>>,
}

impl BoundedReader {
    fn spawn<R: Read + Send + 'static>(stream: Option<R>, limit: usize) -> Result<Self> {
        let stream = stream.ok_or_else(|| anyhow!("stream was not piped"))?;
        let handle = thread::spawn(move || read_stream_limited(stream, limit));
        Ok(Self { handle })
    }

    fn finish(self) -> Result<(Vec<u8>, usize)> {
        self.handle
            .join()
            .map_err(|_| anyhow!("output reader thread panicked"))?
    }
}

fn read_stream_limited<R: Read>(mut reader: R, limit: usize) -> Result<(Vec<u8>, usize)> {
    let mut kept = Vec::with_capacity(limit.min(64 * 1024));
    let mut dropped = 0usize;
    let mut chunk = [0u8; 8192];

    loop {
        let n = reader.read(&mut chunk).context("read output")?;
        if n == 0 {
            return Ok((kept, dropped));
        }
        let room = limit.saturating_sub(kept.len()).min(n);
        kept.extend_from_slice(&chunk[..room]);
        dropped += n - room;
    }
}
