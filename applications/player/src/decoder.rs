//! Decode engine child process
//!
//! The engine speaks newline-delimited JSON: [`DecoderCommand`]s on its
//! stdin, [`DecoderEvent`]s on its stdout. Anything it prints to stderr is
//! forwarded to the log. When stdout closes the player is told the
//! transport failed, so playback pauses instead of silently stalling.

use crate::error::{PlayerError, Result};
use fermata_playback::backend::{DecoderCommand, DecoderLink, DecoderQuit};
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// How long the engine gets to exit after `quit` before it is killed
const EXIT_GRACE: Duration = Duration::from_secs(3);

/// Write commands as JSON lines until the channel closes or `quit` is sent
pub async fn pump_commands<W>(mut commands: mpsc::UnboundedReceiver<DecoderCommand>, mut writer: W)
where
    W: AsyncWrite + Unpin,
{
    while let Some(command) = commands.recv().await {
        let mut line = match serde_json::to_string(&command) {
            Ok(line) => line,
            Err(e) => {
                tracing::error!("Failed to encode decoder command: {}", e);
                continue;
            }
        };
        line.push('\n');

        if let Err(e) = writer.write_all(line.as_bytes()).await {
            tracing::warn!("Decode engine stdin closed: {}", e);
            break;
        }
        if let Err(e) = writer.flush().await {
            tracing::warn!("Decode engine stdin closed: {}", e);
            break;
        }

        if command == DecoderCommand::Quit {
            break;
        }
    }
    tracing::debug!("Decoder command pump stopped");
}

/// Read JSON event lines and route them into the transport channels
///
/// End of stream or a read failure is reported as a transport failure.
pub async fn pump_events<R>(reader: R, link: DecoderLink)
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = reader.lines();
    let reason = loop {
        match lines.next_line().await {
            Ok(Some(line)) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                if let Err(e) = link.dispatch_line(line) {
                    tracing::warn!("Ignoring malformed decoder event {:?}: {}", line, e);
                }
            }
            Ok(None) => break "Decode engine exited".to_string(),
            Err(e) => break format!("Decode engine output failed: {}", e),
        }
    };
    link.disconnected(reason);
    tracing::debug!("Decoder event pump stopped");
}

async fn pump_stderr<R>(reader: R)
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = reader.lines();
    while let Ok(Some(line)) = lines.next_line().await {
        tracing::info!(target: "fermata::decoder", "{}", line);
    }
}

/// A running decode engine process wired to a `LocalBackend`
pub struct DecoderProcess {
    child: Child,
    quit: DecoderQuit,
    tasks: Vec<JoinHandle<()>>,
}

impl DecoderProcess {
    /// Spawn the engine and start pumping
    pub fn spawn(
        program: &Path,
        args: &[String],
        commands: mpsc::UnboundedReceiver<DecoderCommand>,
        quit: DecoderQuit,
        link: DecoderLink,
    ) -> Result<Self> {
        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                PlayerError::Decoder(format!("cannot start {}: {}", program.display(), e))
            })?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| PlayerError::Decoder("decode engine has no stdin".to_string()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| PlayerError::Decoder("decode engine has no stdout".to_string()))?;

        let mut tasks = vec![
            tokio::spawn(pump_commands(commands, stdin)),
            tokio::spawn(pump_events(BufReader::new(stdout), link)),
        ];
        if let Some(stderr) = child.stderr.take() {
            tasks.push(tokio::spawn(pump_stderr(BufReader::new(stderr))));
        }

        tracing::info!(pid = child.id(), "Decode engine started: {}", program.display());
        Ok(Self { child, quit, tasks })
    }

    /// Send `quit` and wait for the engine to exit, killing it if it lingers
    pub async fn shutdown(mut self) {
        if self.quit.quit().is_err() {
            tracing::debug!("Decoder command pump already stopped");
        }
        match tokio::time::timeout(EXIT_GRACE, self.child.wait()).await {
            Ok(Ok(status)) => tracing::info!("Decode engine exited: {}", status),
            Ok(Err(e)) => tracing::warn!("Failed to wait for decode engine: {}", e),
            Err(_) => {
                tracing::warn!("Decode engine did not exit in time, killing it");
                if let Err(e) = self.child.kill().await {
                    tracing::warn!("Failed to kill decode engine: {}", e);
                }
            }
        }
        for task in self.tasks {
            task.abort();
        }
    }
}
