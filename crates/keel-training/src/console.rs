//! Operator commands typed while training runs.

use crate::error::TrainingResult;
use crate::progress::{ProgressEvent, ProgressSink};
use crate::shutdown::ShutdownSignal;
use std::io::BufRead;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

pub const QUIT_COMMAND: &str = "quit";
pub const HELP_COMMAND: &str = "help";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperatorCommand {
    Quit,
    Help,
    Unrecognized(String),
}

impl OperatorCommand {
    /// Exact, case-sensitive match after trimming surrounding whitespace.
    #[must_use]
    pub fn parse(line: &str) -> Self {
        match line.trim() {
            QUIT_COMMAND => Self::Quit,
            HELP_COMMAND => Self::Help,
            other => Self::Unrecognized(other.to_string()),
        }
    }
}

/// Why the console loop returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsoleExit {
    ShutdownRequested,
    InputClosed,
    WorkerFinished,
}

pub struct OperatorConsole {
    signal: ShutdownSignal,
    sink: Arc<dyn ProgressSink>,
}

impl OperatorConsole {
    #[must_use]
    pub fn new(signal: ShutdownSignal, sink: Arc<dyn ProgressSink>) -> Self {
        Self { signal, sink }
    }

    /// Handle lines until `quit`, the end of input, or `finished` is cancelled.
    pub async fn run(
        self,
        mut lines: mpsc::Receiver<String>,
        finished: CancellationToken,
    ) -> ConsoleExit {
        if let Some(exit) = self.open(&mut lines) {
            return exit;
        }
        self.listen(lines, finished).await
    }

    /// Announce the console and handle every line already queued in `lines`.
    ///
    /// Returns `Some` if one of them was `quit`.
    pub fn open(&self, lines: &mut mpsc::Receiver<String>) -> Option<ConsoleExit> {
        self.sink.on_event(ProgressEvent::ConsoleReady);
        while let Ok(line) = lines.try_recv() {
            if self.handle(&line) {
                return Some(ConsoleExit::ShutdownRequested);
            }
        }
        None
    }

    /// Wait for and handle further lines. Lines already buffered are handled
    /// before `finished` is looked at.
    pub async fn listen(
        self,
        mut lines: mpsc::Receiver<String>,
        finished: CancellationToken,
    ) -> ConsoleExit {
        loop {
            let line = tokio::select! {
                biased;
                line = lines.recv() => line,
                () = finished.cancelled() => return ConsoleExit::WorkerFinished,
            };
            let Some(line) = line else {
                debug!("operator input closed");
                return ConsoleExit::InputClosed;
            };
            if self.handle(&line) {
                return ConsoleExit::ShutdownRequested;
            }
        }
    }

    /// Returns `true` once shutdown has been requested.
    fn handle(&self, line: &str) -> bool {
        match OperatorCommand::parse(line) {
            OperatorCommand::Quit => {
                self.sink.on_event(ProgressEvent::ShutdownRequested);
                self.signal.set();
                true
            }
            OperatorCommand::Help => {
                self.sink.on_event(ProgressEvent::CommandHelp);
                false
            }
            OperatorCommand::Unrecognized(input) => {
                self.sink.on_event(ProgressEvent::UnrecognizedCommand { input });
                false
            }
        }
    }
}

/// Forward lines from standard input into a channel.
///
/// Reading happens on a plain OS thread so a pending read never holds up the
/// async runtime. The returned sender feeds the same channel and can be used
/// to inject commands, e.g. from a Ctrl-C handler.
pub fn stdin_lines(
    buffer: usize,
) -> TrainingResult<(mpsc::Sender<String>, mpsc::Receiver<String>)> {
    let (tx, rx) = mpsc::channel(buffer.max(1));
    let reader_tx = tx.clone();

    std::thread::Builder::new()
        .name("keel-stdin".to_string())
        .spawn(move || {
            for line in std::io::stdin().lock().lines() {
                let Ok(line) = line else { break };
                if reader_tx.blocking_send(line).is_err() {
                    break;
                }
            }
        })?;

    Ok((tx, rx))
}
