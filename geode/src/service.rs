//! Line-oriented command handling.
//!
//! Every input line is one JSON object with an `op` field. The reply is a single JSON
//! object carrying either `result` or `error`, plus the request's `id` when it had one.

use std::io;
use std::str::{self, Utf8Error};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use geode_core::{GenerateRequest, Limits, MineralEngine};
use geode_locate::LocationResolver;
use serde::Deserialize;
use serde_json::{Value, json};
use thiserror::Error;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio::sync::mpsc;
use tokio::task::{JoinError, spawn_blocking};
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;

/// A command read from the input stream.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "op", rename_all = "lowercase")]
pub enum Command {
    /// Run a generation request.
    Generate(GenerateRequest),
    /// Resolve a location to offsets.
    Offsets {
        /// Free-form location name.
        location: String,
    },
}

/// An error reported back for a single command.
#[derive(Error, Debug)]
pub enum CommandError {
    /// The line was not UTF-8.
    #[error("Invalid command: {0}")]
    Encoding(#[from] Utf8Error),
    /// The line was not a valid command.
    #[error("Invalid command: {0}")]
    Invalid(#[from] serde_json::Error),
    /// Generation did not finish in time.
    #[error("Request timed out after {0:?}")]
    TimedOut(Duration),
    /// The generation worker panicked or was cancelled.
    #[error("Generation failed: {0}")]
    Worker(#[from] JoinError),
}

/// Shared state used to answer commands.
pub struct Service {
    engine: Arc<MineralEngine>,
    limits: Limits,
    timeout: Duration,
    resolver: LocationResolver,
}

impl Service {
    /// Creates a new service.
    #[must_use]
    pub fn new(
        engine: MineralEngine,
        limits: Limits,
        timeout: Duration,
        resolver: LocationResolver,
    ) -> Self {
        Self {
            engine: Arc::new(engine),
            limits,
            timeout,
            resolver,
        }
    }

    /// Answer one raw input line with one output line.
    pub async fn handle_bytes(&self, line: &[u8]) -> String {
        match str::from_utf8(line) {
            Ok(line) => self.handle_line(line).await,
            Err(e) => render_reply(None, Err(e.into())),
        }
    }

    /// Answer one input line with one output line.
    pub async fn handle_line(&self, line: &str) -> String {
        match serde_json::from_str::<Value>(line) {
            Ok(value) => {
                let id = value.get("id").cloned();
                render_reply(id, self.run(&value).await)
            }
            Err(e) => render_reply(None, Err(e.into())),
        }
    }

    async fn run(&self, value: &Value) -> Result<Value, CommandError> {
        match Command::deserialize(value)? {
            Command::Generate(request) => self.generate(request).await,
            Command::Offsets { location } => {
                Ok(serde_json::to_value(self.resolver.resolve(&location).await)?)
            }
        }
    }

    #[tracing::instrument(level = "debug", skip_all)]
    async fn generate(&self, request: GenerateRequest) -> Result<Value, CommandError> {
        let engine = Arc::clone(&self.engine);
        let limits = self.limits;
        let value = self
            .run_blocking(move |stop| {
                engine
                    .generate_until(&request, &limits, stop)
                    .map(|response| serde_json::to_value(&response))
            })
            .await??;
        Ok(value)
    }

    /// Run `work` on the blocking pool under the request timeout.
    ///
    /// When the timeout fires the stop flag handed to `work` is set; `work` returns
    /// `None` once it has noticed.
    async fn run_blocking<T, F>(&self, work: F) -> Result<T, CommandError>
    where
        T: Send + 'static,
        F: FnOnce(&AtomicBool) -> Option<T> + Send + 'static,
    {
        let stop = Arc::new(AtomicBool::new(false));
        let handle = spawn_blocking({
            let stop = Arc::clone(&stop);
            move || work(&stop)
        });

        match timeout(self.timeout, handle).await {
            Ok(joined) => joined?.ok_or(CommandError::TimedOut(self.timeout)),
            Err(_) => {
                stop.store(true, Ordering::Relaxed);
                log::warn!("Generation exceeded {:?}, abandoning", self.timeout);
                Err(CommandError::TimedOut(self.timeout))
            }
        }
    }
}

fn render_reply(id: Option<Value>, outcome: Result<Value, CommandError>) -> String {
    let mut reply = match outcome {
        Ok(result) => json!({ "result": result }),
        Err(err) => {
            log::debug!("Command failed: {err}");
            json!({ "error": err.to_string() })
        }
    };
    if let (Some(id), Some(object)) = (id, reply.as_object_mut()) {
        object.insert("id".to_owned(), id);
    }
    reply.to_string()
}

/// Answer every line of `input` until it ends or `cancel_token` fires.
///
/// Each line is handled on its own task and its reply sent to `replies`. A line that
/// cannot be decoded gets an error reply; only a failed read ends the loop early.
pub async fn serve<R>(
    service: Arc<Service>,
    mut input: R,
    replies: mpsc::Sender<String>,
    cancel_token: CancellationToken,
) -> io::Result<()>
where
    R: AsyncBufRead + Unpin,
{
    let mut buf = Vec::new();
    loop {
        buf.clear();
        let read = tokio::select! {
            biased;
            () = cancel_token.cancelled() => break,
            read = input.read_until(b'\n', &mut buf) => read?,
        };
        if read == 0 {
            log::debug!("Input closed");
            break;
        }
        let line = buf.trim_ascii();
        if line.is_empty() {
            continue;
        }

        let line = line.to_vec();
        let service = Arc::clone(&service);
        let replies = replies.clone();
        tokio::spawn(async move {
            let reply = service.handle_bytes(&line).await;
            if replies.send(reply).await.is_err() {
                log::warn!("Reply dropped, output closed");
            }
        });
    }
    Ok(())
}
