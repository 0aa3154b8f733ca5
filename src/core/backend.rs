//! Backend process transport.
//!
//! The panel talks to its backend over the child's stdio: one JSON object per
//! line, events arriving on stdout and requests leaving on stdin. The reader
//! task forwards parsed events over an unbounded channel so the panel loop
//! consumes them in arrival order; a malformed line is dropped, never fatal.

use std::io;
use std::process::Stdio;

use memchr::memchr;
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::process::Command;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// A formulated plan delivered by `planReady`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct Plan {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub steps: Vec<PlanStep>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PlanStep {
    #[serde(default)]
    pub description: String,
}

/// Events the backend emits. Missing payload fields deserialize to safe
/// defaults; an unknown `type` fails to parse and is dropped by the reader.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum BackendEvent {
    ResponsePlaceholderRequested,
    ResponseChunk {
        #[serde(default)]
        text: String,
    },
    StreamEnded,
    StreamError {
        #[serde(default)]
        message: String,
    },
    IndexingProgress {
        #[serde(default)]
        percent: u8,
        #[serde(default)]
        message: String,
    },
    IndexingDone {
        #[serde(default)]
        has_index: Option<bool>,
    },
    IndexingToggled {
        #[serde(default)]
        enabled: bool,
        #[serde(default)]
        has_index: Option<bool>,
    },
    IndexingStatus {
        #[serde(default)]
        is_enabled: bool,
        #[serde(default)]
        has_index: Option<bool>,
    },
    PlannerNarrationChunk {
        #[serde(default)]
        text: String,
        #[serde(default)]
        step_no: u32,
    },
    PlanReady {
        #[serde(default)]
        plan: Plan,
    },
    PlanCompleted,
    SelectionChanged {
        #[serde(default)]
        file: String,
        #[serde(default)]
        start_line: Option<u32>,
        #[serde(default)]
        end_line: Option<u32>,
        #[serde(default)]
        content: Option<String>,
    },
    SelectionCleared,
    ContextSize {
        #[serde(default)]
        conversation_tokens: usize,
        #[serde(default)]
        files_tokens: usize,
    },
}

/// Requests the panel sends to the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum BackendRequest {
    SendPrompt { text: String },
    StopGeneration,
    RequestContextSize,
    ExecutePlannerAll,
}

/// Parses one stdout line. Blank, malformed, and unknown lines yield `None`.
pub fn parse_event_line(line: &str) -> Option<BackendEvent> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return None;
    }
    match serde_json::from_str(trimmed) {
        Ok(event) => Some(event),
        Err(e) => {
            warn!("dropping malformed backend event: {e}");
            None
        }
    }
}

/// Handle to the spawned backend process.
#[derive(Clone)]
pub struct BackendService {
    request_tx: mpsc::UnboundedSender<BackendRequest>,
    cancel: CancellationToken,
}

impl BackendService {
    /// Spawns `command` and wires its stdio to the event and request channels.
    pub fn spawn(mut command: Command) -> io::Result<(Self, mpsc::UnboundedReceiver<BackendEvent>)> {
        command.stdin(Stdio::piped()).stdout(Stdio::piped());
        let mut child = command.spawn()?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| io::Error::other("backend stdout was not captured"))?;
        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| io::Error::other("backend stdin was not captured"))?;

        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let (request_tx, request_rx) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();

        tokio::spawn(read_events(stdout, event_tx, cancel.clone()));
        tokio::spawn(write_requests(stdin, request_rx));
        tokio::spawn(async move {
            match child.wait().await {
                Ok(status) => debug!("backend exited: {status}"),
                Err(e) => warn!("backend wait failed: {e}"),
            }
        });

        Ok((
            Self { request_tx, cancel },
            event_rx,
        ))
    }

    /// Spawns the backend through the shell so users can pass a full command
    /// line (`codepane --backend "my-backend --workspace ."`).
    pub fn spawn_shell(command_line: &str) -> io::Result<(Self, mpsc::UnboundedReceiver<BackendEvent>)> {
        let mut command = Command::new("sh");
        command.arg("-c").arg(command_line);
        Self::spawn(command)
    }

    pub fn send(&self, request: BackendRequest) {
        let _ = self.request_tx.send(request);
    }

    pub fn shutdown(&self) {
        self.cancel.cancel();
    }
}

async fn read_events<R: AsyncRead + Unpin>(
    mut stdout: R,
    tx: mpsc::UnboundedSender<BackendEvent>,
    cancel: CancellationToken,
) {
    let mut buffer: Vec<u8> = Vec::new();
    let mut chunk = [0u8; 4096];
    loop {
        tokio::select! {
            read = stdout.read(&mut chunk) => {
                match read {
                    Ok(0) => return,
                    Ok(n) => {
                        buffer.extend_from_slice(&chunk[..n]);
                        while let Some(newline_pos) = memchr(b'\n', &buffer) {
                            match std::str::from_utf8(&buffer[..newline_pos]) {
                                Ok(line) => {
                                    if let Some(event) = parse_event_line(line) {
                                        if tx.send(event).is_err() {
                                            return;
                                        }
                                    }
                                }
                                Err(e) => warn!("invalid UTF-8 from backend: {e}"),
                            }
                            buffer.drain(..=newline_pos);
                        }
                    }
                    Err(e) => {
                        warn!("backend read failed: {e}");
                        return;
                    }
                }
            }
            _ = cancel.cancelled() => return,
        }
    }
}

async fn write_requests<W: AsyncWrite + Unpin>(
    mut stdin: W,
    mut rx: mpsc::UnboundedReceiver<BackendRequest>,
) {
    while let Some(request) = rx.recv().await {
        let mut line = match serde_json::to_string(&request) {
            Ok(line) => line,
            Err(e) => {
                warn!("could not encode backend request: {e}");
                continue;
            }
        };
        line.push('\n');
        if stdin.write_all(line.as_bytes()).await.is_err() {
            return;
        }
        let _ = stdin.flush().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_event_line_handles_chunk_and_defaults() {
        let event = parse_event_line(r#"{"type":"responseChunk","text":"Hello"}"#);
        assert_eq!(
            event,
            Some(BackendEvent::ResponseChunk {
                text: "Hello".to_string()
            })
        );

        // A chunk with no text field still parses, defaulting to empty.
        let event = parse_event_line(r#"{"type":"responseChunk"}"#);
        assert_eq!(
            event,
            Some(BackendEvent::ResponseChunk {
                text: String::new()
            })
        );
    }

    #[test]
    fn parse_event_line_defaults_indexing_fields() {
        let event = parse_event_line(r#"{"type":"indexingProgress"}"#);
        assert_eq!(
            event,
            Some(BackendEvent::IndexingProgress {
                percent: 0,
                message: String::new()
            })
        );

        let event = parse_event_line(r#"{"type":"indexingDone","hasIndex":true}"#);
        assert_eq!(
            event,
            Some(BackendEvent::IndexingDone {
                has_index: Some(true)
            })
        );
    }

    #[test]
    fn parse_event_line_reads_plan_payload() {
        let event = parse_event_line(
            r#"{"type":"planReady","plan":{"title":"Refactor","steps":[{"description":"rename"}]}}"#,
        );
        let Some(BackendEvent::PlanReady { plan }) = event else {
            panic!("expected planReady");
        };
        assert_eq!(plan.title, "Refactor");
        assert_eq!(plan.steps.len(), 1);
        assert_eq!(plan.steps[0].description, "rename");
    }

    #[test]
    fn parse_event_line_drops_unknown_and_malformed() {
        assert_eq!(parse_event_line(""), None);
        assert_eq!(parse_event_line("   "), None);
        assert_eq!(parse_event_line("not json"), None);
        assert_eq!(parse_event_line(r#"{"type":"fromTheFuture"}"#), None);
        assert_eq!(parse_event_line(r#"{"text":"no type"}"#), None);
    }

    #[test]
    fn requests_serialize_with_camel_case_tags() {
        let line = serde_json::to_string(&BackendRequest::StopGeneration).unwrap();
        assert_eq!(line, r#"{"type":"stopGeneration"}"#);

        let line = serde_json::to_string(&BackendRequest::SendPrompt {
            text: "hi".to_string(),
        })
        .unwrap();
        assert_eq!(line, r#"{"type":"sendPrompt","text":"hi"}"#);

        let line = serde_json::to_string(&BackendRequest::ExecutePlannerAll).unwrap();
        assert_eq!(line, r#"{"type":"executePlannerAll"}"#);
    }
}
