//! Line-oriented input transport.
//!
//! The viewer reads NDJSON-ish telemetry from stdin or from a capture
//! file. Either way the source is wrapped in a [`LineStream`] that
//! yields one non-blank line at a time and survives being polled
//! inside `select!`.

use thiserror::Error;
use tokio::fs::File;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tracing::debug;

/// Lines longer than this are dropped whole rather than parsed.
pub const DEFAULT_MAX_LINE_BYTES: usize = 64 * 1024;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("failed to open input {path}: {error}")]
    Open {
        path: String,
        error: std::io::Error,
    },
    #[error("read failed: {0}")]
    Read(std::io::Error),
}

/// Opens the configured input: `-` means stdin, anything else is a path.
pub async fn open_input(input: &str) -> Result<LineStream, TransportError> {
    let reader: Box<dyn AsyncRead + Send + Unpin> = if input == "-" {
        Box::new(tokio::io::stdin())
    } else {
        let file = File::open(input)
            .await
            .map_err(|error| TransportError::Open {
                path: input.to_string(),
                error,
            })?;
        Box::new(file)
    };
    Ok(LineStream::new(reader, DEFAULT_MAX_LINE_BYTES))
}

pub struct LineStream {
    reader: BufReader<Box<dyn AsyncRead + Send + Unpin>>,
    max_line_bytes: usize,
    // Bytes of a line still being assembled. Kept on the struct so a
    // read cancelled by `select!` loses nothing.
    pending: Vec<u8>,
    // The line being assembled outgrew the cap; its remaining bytes
    // are skipped until a newline restores sync.
    discarding: bool,
}

impl LineStream {
    pub fn new(reader: Box<dyn AsyncRead + Send + Unpin>, max_line_bytes: usize) -> Self {
        Self {
            reader: BufReader::new(reader),
            max_line_bytes,
            pending: Vec::new(),
            discarding: false,
        }
    }

    /// Next non-blank line, lossily decoded. `Ok(None)` is end of input.
    /// An unterminated tail before EOF is still delivered as a line.
    ///
    /// The length cap applies while a line assembles, not after: once
    /// `pending` outgrows it the line is dropped and input is skipped
    /// until the next newline, so a newline-free source cannot grow
    /// the buffer without bound.
    pub async fn next_line(&mut self) -> Result<Option<String>, TransportError> {
        loop {
            let (consumed, saw_newline, at_eof) = {
                let chunk = self
                    .reader
                    .fill_buf()
                    .await
                    .map_err(TransportError::Read)?;
                if chunk.is_empty() {
                    (0, false, true)
                } else if let Some(pos) = chunk.iter().position(|byte| *byte == b'\n') {
                    if !self.discarding {
                        self.pending.extend_from_slice(&chunk[..pos]);
                    }
                    (pos + 1, true, false)
                } else {
                    if !self.discarding {
                        self.pending.extend_from_slice(chunk);
                    }
                    (chunk.len(), false, false)
                }
            };
            self.reader.consume(consumed);

            if at_eof {
                if self.discarding {
                    self.discarding = false;
                    return Ok(None);
                }
                if self.pending.is_empty() {
                    return Ok(None);
                }
            } else if !saw_newline {
                if !self.discarding && self.pending.len() > self.max_line_bytes {
                    debug!(event = "oversized_line_dropped", bytes = self.pending.len());
                    self.pending.clear();
                    self.discarding = true;
                }
                continue;
            } else if self.discarding {
                // The newline ends the runaway line; buffering resumes.
                self.discarding = false;
                continue;
            }

            let mut line = std::mem::take(&mut self.pending);
            if line.ends_with(b"\r") {
                line.pop();
            }
            if line.iter().all(|byte| byte.is_ascii_whitespace()) {
                continue;
            }
            if line.len() > self.max_line_bytes {
                debug!(event = "oversized_line_dropped", bytes = line.len());
                continue;
            }
            return Ok(Some(String::from_utf8_lossy(&line).into_owned()));
        }
    }
}
