//! Sequential dispatch of `<DeviceToken> <Payload>` records.

use apns_core::{EncodingError, Notification, NotificationOptions, Payload, Response};
use tokio::io::{AsyncBufRead, AsyncBufReadExt as _, AsyncReadExt as _};

use crate::{Pusher, TransportError};

/// Default cap on the length of one input line, terminator included.
pub const MAX_LINE_LEN: usize = 64 * 1024;

/// Why a record was not submitted.
#[derive(Debug)]
pub enum Skip {
    /// The line is not `<DeviceToken> <Payload>`.
    Malformed,
    Encoding(EncodingError),
}

impl std::fmt::Display for Skip {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Malformed => {
                f.write_str("invalid input format, expected: <DeviceToken> <APNS Payload>")
            }
            Self::Encoding(e) => write!(f, "{e}"),
        }
    }
}

/// Receives per-record outcomes as they happen.
pub trait Reporter {
    /// The gateway answered for the record on `line`.
    fn delivered(&mut self, line: usize, device_token: &str, response: &Response);

    /// The record on `line` was skipped.
    fn skipped(&mut self, line: usize, skip: &Skip);
}

/// Counters for one run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DispatchStats {
    /// Lines read, including skipped ones.
    pub lines: usize,
    /// Records accepted by the gateway.
    pub sent: usize,
    /// Records the gateway answered with a non-200 status.
    pub rejected: usize,
    pub skipped: usize,
}

/// How a run ended.
#[derive(Debug)]
pub enum Outcome {
    /// Input exhausted.
    Success,
    /// The gateway could not be reached for the record on `line`; nothing after it was read.
    FatalTransport { line: usize, error: TransportError },
    /// Reading the input failed.
    FatalRead(std::io::Error),
}

/// Fatal run outcome as an error.
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("transport failure on line {line}")]
    Transport {
        line: usize,
        #[source]
        source: TransportError,
    },
    #[error("failed to read input")]
    Read(#[source] std::io::Error),
}

impl Outcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success)
    }

    pub fn into_result(self) -> Result<(), DispatchError> {
        match self {
            Self::Success => Ok(()),
            Self::FatalTransport { line, error } => Err(DispatchError::Transport {
                line,
                source: error,
            }),
            Self::FatalRead(e) => Err(DispatchError::Read(e)),
        }
    }
}

/// Result of [`DispatchLoop::run`].
#[derive(Debug)]
pub struct Summary {
    pub stats: DispatchStats,
    pub outcome: Outcome,
}

/// Split a record at its first space into device token and payload.
///
/// Returns `None` when there is no space or the token is empty or not UTF-8.
pub fn parse_record(line: &[u8]) -> Option<(&str, &[u8])> {
    let split = line.iter().position(|&b| b == b' ')?;
    let token = std::str::from_utf8(&line[..split]).ok()?;
    if token.is_empty() {
        return None;
    }
    Some((token, &line[split + 1..]))
}

fn trim_line_ending(mut line: &[u8]) -> &[u8] {
    if let Some(rest) = line.strip_suffix(b"\n") {
        line = rest;
    }
    if let Some(rest) = line.strip_suffix(b"\r") {
        line = rest;
    }
    line
}

/// Reads records one at a time and pushes each before reading the next.
pub struct DispatchLoop<P> {
    pusher: P,
    topic: String,
    options: NotificationOptions,
    max_line_len: usize,
}

impl<P> DispatchLoop<P>
where
    P: Pusher,
{
    /// Create a loop sending every record under `topic`.
    pub fn new(pusher: P, topic: impl Into<String>) -> Self {
        Self {
            pusher,
            topic: topic.into(),
            options: NotificationOptions::default(),
            max_line_len: MAX_LINE_LEN,
        }
    }

    /// Longest line accepted before the run fails with [`Outcome::FatalRead`].
    pub fn with_max_line_len(mut self, max_line_len: usize) -> Self {
        self.max_line_len = max_line_len;
        self
    }

    /// Headers applied to every notification of the run.
    pub fn with_options(mut self, options: NotificationOptions) -> Self {
        self.options = options;
        self
    }

    pub fn pusher(&self) -> &P {
        &self.pusher
    }

    /// Process `input` until it is exhausted or a fatal error occurs.
    ///
    /// Malformed records and gateway rejections never stop the run; a
    /// transport failure, a read failure or an overlong line always does.
    pub async fn run<R, O>(&self, mut input: R, reporter: &mut O) -> Summary
    where
        R: AsyncBufRead + Unpin,
        O: Reporter,
    {
        let mut stats = DispatchStats::default();
        let mut buf = Vec::new();

        loop {
            buf.clear();
            let limit = self.max_line_len as u64 + 1;
            let read = match (&mut input).take(limit).read_until(b'\n', &mut buf).await {
                Ok(_) if buf.len() > self.max_line_len && !buf.ends_with(b"\n") => {
                    Err(std::io::Error::new(
                        std::io::ErrorKind::InvalidData,
                        format!(
                            "line {} exceeds {} bytes",
                            stats.lines + 1,
                            self.max_line_len
                        ),
                    ))
                }
                read => read,
            };
            match read {
                Ok(0) => break,
                Ok(_) => {}
                Err(e) => {
                    tracing::error!(after_line = stats.lines, error = %e, "failed to read input");
                    return Summary {
                        stats,
                        outcome: Outcome::FatalRead(e),
                    };
                }
            }

            stats.lines += 1;
            let line = stats.lines;

            let Some((token, payload)) = parse_record(trim_line_ending(&buf)) else {
                stats.skipped += 1;
                reporter.skipped(line, &Skip::Malformed);
                continue;
            };

            let payload = Payload::from(payload);
            let notification = match Notification::new(token, &*self.topic, &payload) {
                Ok(notification) => notification.with_options(self.options.clone()),
                Err(e) => {
                    stats.skipped += 1;
                    reporter.skipped(line, &Skip::Encoding(e));
                    continue;
                }
            };

            match self.pusher.push(&notification).await {
                Ok(response) => {
                    if response.is_sent() {
                        stats.sent += 1;
                    } else {
                        stats.rejected += 1;
                    }
                    reporter.delivered(line, token, &response);
                }
                Err(error) => {
                    tracing::error!(line, error = %error, "transport failure, stopping");
                    return Summary {
                        stats,
                        outcome: Outcome::FatalTransport { line, error },
                    };
                }
            }
        }

        tracing::info!(
            lines = stats.lines,
            sent = stats.sent,
            rejected = stats.rejected,
            skipped = stats.skipped,
            "input exhausted"
        );

        Summary {
            stats,
            outcome: Outcome::Success,
        }
    }
}
