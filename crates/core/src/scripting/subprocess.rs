//! Worker process spawning with incremental output capture.
//!
//! [`spawn_worker`] starts the process and returns a [`WorkerProcess`].
//! Stdout and stderr are read line by line on two reader tasks that feed a
//! single channel, so a consumer sees lines as soon as they are produced
//! and in the order they arrived. Nothing is buffered until exit.

use std::process::Stdio;

use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWriteExt, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::mpsc;

use super::executor::{OutputLine, ScriptError, StreamKind, WorkerExit, WorkerInvocation};

/// Longest line forwarded as-is; longer lines are cut at this many bytes.
const MAX_LINE_BYTES: usize = 64 * 1024;

/// A spawned worker whose output is being streamed.
pub struct WorkerProcess {
    child: Child,
    lines: mpsc::UnboundedReceiver<OutputLine>,
}

impl WorkerProcess {
    /// OS process id, if the process is still known to the runtime.
    pub fn id(&self) -> Option<u32> {
        self.child.id()
    }

    /// Next line of output from either stream.
    ///
    /// Returns `None` once both streams have been closed by the worker.
    pub async fn next_line(&mut self) -> Option<OutputLine> {
        self.lines.recv().await
    }

    /// Wait for the process to exit. Call after [`next_line`](Self::next_line)
    /// returned `None` so no output is lost.
    pub async fn wait(mut self) -> Result<WorkerExit, ScriptError> {
        let status = self.child.wait().await.map_err(ScriptError::Wait)?;
        Ok(match status.code() {
            Some(code) => WorkerExit::Code(code),
            None => WorkerExit::Signal,
        })
    }
}

/// Spawn the worker described by `invocation`.
///
/// The interpreter is run as `<interpreter> <entry_point> <args...>`. The
/// child is not killed when the handle is dropped; runs cannot be cancelled.
pub async fn spawn_worker(invocation: WorkerInvocation) -> Result<WorkerProcess, ScriptError> {
    if tokio::fs::metadata(&invocation.entry_point).await.is_err() {
        return Err(ScriptError::EntryPointMissing(invocation.entry_point));
    }

    let mut cmd = Command::new(&invocation.interpreter);
    cmd.arg(&invocation.entry_point)
        .args(&invocation.args)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());

    for (key, value) in &invocation.env_vars {
        cmd.env(key, value);
    }

    if let Some(dir) = &invocation.working_directory {
        cmd.current_dir(dir);
    }

    tracing::debug!(
        interpreter = %invocation.interpreter,
        entry_point = %invocation.entry_point.display(),
        args = ?invocation.args,
        "Spawning worker process",
    );

    let mut child = cmd.spawn().map_err(ScriptError::Spawn)?;

    // Feed stdin on its own task so a worker that prints before reading
    // cannot deadlock against us.
    if let Some(mut stdin) = child.stdin.take() {
        let payload = invocation
            .stdin_payload
            .as_ref()
            .and_then(|value| serde_json::to_vec(value).ok());
        tokio::spawn(async move {
            if let Some(bytes) = payload {
                // Best-effort: the worker may exit without reading stdin.
                let _ = stdin.write_all(&bytes).await;
            }
            drop(stdin);
        });
    }

    let (tx, rx) = mpsc::unbounded_channel();
    if let Some(stdout) = child.stdout.take() {
        tokio::spawn(forward_lines(stdout, StreamKind::Stdout, tx.clone()));
    }
    if let Some(stderr) = child.stderr.take() {
        tokio::spawn(forward_lines(stderr, StreamKind::Stderr, tx.clone()));
    }
    drop(tx);

    Ok(WorkerProcess { child, lines: rx })
}

/// Read `reader` line by line (lossy UTF-8) and forward each line.
async fn forward_lines<R>(reader: R, stream: StreamKind, tx: mpsc::UnboundedSender<OutputLine>)
where
    R: AsyncRead + Unpin,
{
    let mut reader = BufReader::new(reader);
    let mut buf = Vec::new();
    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf).await {
            Ok(0) => break,
            Ok(_) => {
                let text = normalize_line(&buf);
                if tx.send(OutputLine::new(stream, text)).is_err() {
                    break;
                }
            }
            Err(e) => {
                tracing::warn!(stream = ?stream, error = %e, "Worker output stream read failed");
                break;
            }
        }
    }
}

/// Strip the trailing newline (and carriage return) and cap the length.
fn normalize_line(raw: &[u8]) -> String {
    let mut end = raw.len();
    if end > 0 && raw[end - 1] == b'\n' {
        end -= 1;
        if end > 0 && raw[end - 1] == b'\r' {
            end -= 1;
        }
    }
    let end = end.min(MAX_LINE_BYTES);
    String::from_utf8_lossy(&raw[..end]).into_owned()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
