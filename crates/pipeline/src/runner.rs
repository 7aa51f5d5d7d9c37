//! Runs one extraction as a child process and reports through its
//! [`JobWriter`].
//!
//! stdout and stderr are read concurrently and merged into one line stream.
//! Progress lines become events immediately; everything else feeds the
//! [`ResultSignals`] used to locate the artifact once the tool exits.

use std::io;
use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use reelfetch_core::command::ExternalCommand;
use reelfetch_core::progress::{classify_line, OutputLine, ResultSignals};
use reelfetch_core::resolver::{DirSnapshot, FileResolver, ResolveError, DEFAULT_SETTLE_DELAY};
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tokio::sync::mpsc;

use crate::job::JobWriter;

#[derive(Debug, thiserror::Error)]
pub enum RunError {
    #[error("Failed to launch {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },

    #[error("Failed while running the extraction tool: {0}")]
    Io(#[from] io::Error),

    #[error(
        "External tool failed ({}). Check the logs and try again with cookies.",
        exit_label(.code)
    )]
    ToolFailed { code: Option<i32> },

    #[error("Downloaded file not found after extraction.")]
    ArtifactNotFound,
}

impl From<ResolveError> for RunError {
    fn from(err: ResolveError) -> Self {
        match err {
            ResolveError::NotFound => RunError::ArtifactNotFound,
            ResolveError::Io(e) => RunError::Io(e),
        }
    }
}

impl RunError {
    fn from_status(status: ExitStatus) -> Self {
        RunError::ToolFailed {
            code: status.code(),
        }
    }
}

fn exit_label(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("exit code {code}"),
        None => "terminated by signal".to_string(),
    }
}

// ---------------------------------------------------------------------------
// ProcessRunner
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct ProcessRunner {
    settle_delay: Duration,
}

impl Default for ProcessRunner {
    fn default() -> Self {
        Self {
            settle_delay: DEFAULT_SETTLE_DELAY,
        }
    }
}

impl ProcessRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_settle_delay(mut self, delay: Duration) -> Self {
        self.settle_delay = delay;
        self
    }

    /// Run `command` to completion and record the outcome.
    ///
    /// Always leaves the job terminal: the writer is consumed on every path.
    pub async fn run(&self, writer: JobWriter, command: ExternalCommand) {
        let job_id = writer.id().clone();
        tracing::info!(%job_id, program = %command.program, "Starting extraction");

        match self.execute(&writer, &command).await {
            Ok(path) => {
                tracing::info!(%job_id, file = %path.display(), "Extraction finished");
                writer.complete(path);
            }
            Err(e) => {
                tracing::warn!(%job_id, error = %e, "Extraction failed");
                writer.fail(e.to_string());
            }
        }
    }

    async fn execute(&self, writer: &JobWriter, command: &ExternalCommand) -> Result<PathBuf, RunError> {
        let snapshot = DirSnapshot::capture(&command.working_dir).await?;
        writer.mark_running();

        let mut child = Command::new(&command.program)
            .args(&command.args)
            .current_dir(&command.working_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| RunError::Spawn {
                program: command.program.clone(),
                source,
            })?;

        let (line_tx, mut lines) = mpsc::unbounded_channel();
        let mut readers = Vec::with_capacity(2);
        if let Some(stdout) = child.stdout.take() {
            readers.push(tokio::spawn(forward_lines(stdout, line_tx.clone())));
        }
        if let Some(stderr) = child.stderr.take() {
            readers.push(tokio::spawn(forward_lines(stderr, line_tx.clone())));
        }
        drop(line_tx);

        let mut signals = ResultSignals::default();
        while let Some(line) = lines.recv().await {
            match classify_line(&line) {
                OutputLine::Progress(update) => writer.progress(update),
                OutputLine::Blank => {}
                other => {
                    tracing::debug!(job_id = %writer.id(), %line, "Tool output");
                    signals.record(&other);
                }
            }
        }

        for reader in readers {
            reader.await.map_err(io::Error::other)??;
        }

        let status = child.wait().await?;
        if !status.success() {
            return Err(RunError::from_status(status));
        }

        let resolver = FileResolver::new(&command.working_dir).with_settle_delay(self.settle_delay);
        let path = resolver
            .resolve(signals.final_path(), signals.identifier(), &snapshot)
            .await?;
        Ok(path)
    }
}

/// Forward each non-empty line of `reader` into `tx` as soon as its
/// terminator arrives.
///
/// Both `\r` and `\n` end a line, so a progress bar redrawn in place is
/// reported per redraw rather than at the next newline. Invalid UTF-8 is
/// replaced rather than rejected.
async fn forward_lines<R>(reader: R, tx: mpsc::UnboundedSender<String>) -> io::Result<()>
where
    R: AsyncRead + Unpin,
{
    let mut reader = BufReader::new(reader);
    let mut pending = Vec::new();
    loop {
        let chunk = reader.fill_buf().await?;
        if chunk.is_empty() {
            emit_line(&mut pending, &tx);
            return Ok(());
        }
        let consumed = chunk.len();
        for &byte in chunk {
            if byte == b'\n' || byte == b'\r' {
                if !emit_line(&mut pending, &tx) {
                    return Ok(());
                }
            } else {
                pending.push(byte);
            }
        }
        reader.consume(consumed);
    }
}

/// Send and clear the buffered line. `false` once the receiver is gone.
fn emit_line(pending: &mut Vec<u8>, tx: &mpsc::UnboundedSender<String>) -> bool {
    let line = String::from_utf8_lossy(pending).into_owned();
    pending.clear();
    line.trim().is_empty() || tx.send(line).is_ok()
}
