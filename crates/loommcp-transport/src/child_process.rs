//! Child-process transport: spawn a subprocess and speak newline-delimited
//! JSON over its piped stdin/stdout.
//!
//! The child's stderr is inherited so its diagnostics reach the operator
//! unmixed with the protocol stream. Teardown walks a shutdown ladder:
//! close stdin, send the kill signal, wait out a bounded grace window, then
//! force-kill and reap.

use std::collections::HashMap;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures::{SinkExt, StreamExt};
use parking_lot::Mutex;
use tokio::io::BufReader;
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tokio::sync::Mutex as TokioMutex;
use tokio_util::codec::{FramedRead, FramedWrite, LinesCodec};
use tracing::{debug, error, warn};

use crate::{
    ErrorCallback, MessageCallback, Transport, TransportError, TransportResult, TransportState,
};

type ChildWriter = FramedWrite<ChildStdin, LinesCodec>;
type ChildReader = FramedRead<BufReader<ChildStdout>, LinesCodec>;

/// Configuration for spawning a child-process transport
#[derive(Debug, Clone)]
pub struct ChildProcessConfig {
    /// Program to execute
    pub command: String,
    /// Arguments passed to the program
    pub args: Vec<String>,
    /// Extra environment variables for the child
    pub env: HashMap<String, String>,
    /// Working directory for the child
    pub working_dir: Option<String>,
    /// Grace window between the kill signal and the forced kill
    pub graceful_shutdown_timeout: Duration,
    /// Whether to kill the process when the transport is dropped
    pub kill_on_drop: bool,
}

impl ChildProcessConfig {
    /// Configuration for `command` with defaults for everything else
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            args: Vec::new(),
            env: HashMap::new(),
            working_dir: None,
            graceful_shutdown_timeout: Duration::from_secs(5),
            kill_on_drop: true,
        }
    }

    /// Append arguments
    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Set an environment variable for the child
    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    /// Set the child's working directory
    pub fn with_working_dir(mut self, dir: impl Into<String>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    /// Set the grace window used during shutdown
    pub fn with_graceful_shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.graceful_shutdown_timeout = timeout;
        self
    }
}

/// Transport that spawns and owns a subprocess
pub struct ChildProcessTransport {
    config: ChildProcessConfig,
    state: Arc<Mutex<TransportState>>,
    message_callback: Arc<Mutex<Option<MessageCallback>>>,
    error_callback: Arc<Mutex<Option<ErrorCallback>>>,
    child: Arc<TokioMutex<Option<Child>>>,
    writer: Arc<TokioMutex<Option<ChildWriter>>>,
    read_task: Mutex<Option<tokio::task::JoinHandle<()>>>,
}

impl ChildProcessTransport {
    /// Create a detached transport; the child is spawned on `connect`
    pub fn new(config: ChildProcessConfig) -> Self {
        Self {
            config,
            state: Arc::new(Mutex::new(TransportState::Detached)),
            message_callback: Arc::new(Mutex::new(None)),
            error_callback: Arc::new(Mutex::new(None)),
            child: Arc::new(TokioMutex::new(None)),
            writer: Arc::new(TokioMutex::new(None)),
            read_task: Mutex::new(None),
        }
    }

    fn spawn_reader(&self, stdout: ChildStdout) {
        let mut reader: ChildReader = FramedRead::new(BufReader::new(stdout), LinesCodec::new());
        let message_callback = self.message_callback.clone();
        let error_callback = self.error_callback.clone();
        let state = self.state.clone();

        let handle = tokio::spawn(async move {
            while let Some(result) = reader.next().await {
                match result {
                    Ok(line) => {
                        let callback = message_callback.lock().clone();
                        if let Some(callback) = callback {
                            callback(Bytes::from(line.into_bytes()));
                        }
                    }
                    Err(e) => {
                        error!("child stdout read failed: {e}");
                        *state.lock() = TransportState::Disconnected;
                        if let Some(callback) = error_callback.lock().clone() {
                            callback(TransportError::ReceiveFailed(e.to_string()));
                        }
                        return;
                    }
                }
            }

            debug!("child process closed its stdout");
            *state.lock() = TransportState::Disconnected;
            if let Some(callback) = error_callback.lock().clone() {
                callback(TransportError::Eof);
            }
        });

        *self.read_task.lock() = Some(handle);
    }

    async fn shutdown_child(&self) {
        // Closing stdin first lets a well-behaved child exit on its own.
        self.writer.lock().await.take();

        let mut guard = self.child.lock().await;
        let Some(mut child) = guard.take() else {
            return;
        };

        if let Err(e) = child.start_kill() {
            warn!("failed to signal child process: {e}");
        }

        match tokio::time::timeout(self.config.graceful_shutdown_timeout, child.wait()).await {
            Ok(Ok(status)) => debug!("child process exited: {status}"),
            Ok(Err(e)) => warn!("failed to reap child process: {e}"),
            Err(_) => {
                warn!("child process shutdown timed out, forcing kill");
                if let Err(e) = child.kill().await {
                    error!("failed to force kill child process: {e}");
                }
            }
        }
    }
}

impl std::fmt::Debug for ChildProcessTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChildProcessTransport")
            .field("command", &self.config.command)
            .field("state", &*self.state.lock())
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl Transport for ChildProcessTransport {
    async fn connect(&self) -> TransportResult<()> {
        if self.is_connected() {
            return Ok(());
        }

        let mut command = Command::new(&self.config.command);
        command
            .args(&self.config.args)
            .envs(&self.config.env)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(self.config.kill_on_drop);
        if let Some(dir) = &self.config.working_dir {
            command.current_dir(dir);
        }

        let mut child = command
            .spawn()
            .map_err(|e| TransportError::ConnectionFailed(e.to_string()))?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| TransportError::ConnectionFailed("child stdin unavailable".into()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| TransportError::ConnectionFailed("child stdout unavailable".into()))?;

        *self.writer.lock().await = Some(FramedWrite::new(stdin, LinesCodec::new()));
        *self.child.lock().await = Some(child);
        self.spawn_reader(stdout);
        *self.state.lock() = TransportState::Connected;

        debug!(command = %self.config.command, "child process spawned");
        Ok(())
    }

    async fn disconnect(&self) -> TransportResult<()> {
        *self.state.lock() = TransportState::Disconnected;
        if let Some(handle) = self.read_task.lock().take() {
            handle.abort();
        }
        self.shutdown_child().await;
        Ok(())
    }

    fn is_connected(&self) -> bool {
        *self.state.lock() == TransportState::Connected
    }

    async fn send(&self, frame: Bytes) -> TransportResult<()> {
        if !self.is_connected() {
            return Err(TransportError::NotConnected);
        }

        let line = std::str::from_utf8(&frame)
            .map_err(|e| TransportError::SendFailed(e.to_string()))?;
        if line.contains('\n') || line.contains('\r') {
            return Err(TransportError::Framing(
                "message contains embedded newline".to_string(),
            ));
        }

        let mut guard = self.writer.lock().await;
        let writer = guard.as_mut().ok_or(TransportError::NotConnected)?;
        writer
            .send(line.to_string())
            .await
            .map_err(|e| TransportError::SendFailed(e.to_string()))?;
        futures::SinkExt::<String>::flush(writer)
            .await
            .map_err(|e| TransportError::SendFailed(e.to_string()))?;
        Ok(())
    }

    fn set_message_callback(&self, callback: MessageCallback) {
        *self.message_callback.lock() = Some(callback);
    }

    fn set_error_callback(&self, callback: ErrorCallback) {
        *self.error_callback.lock() = Some(callback);
    }
}
