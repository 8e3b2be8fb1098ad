//! Newline-delimited line transport.
//!
//! Both channels to butlerd carry one JSON document per line: the daemon's
//! standard output and the TCP socket. [`LineReader`] turns any `AsyncRead`
//! into a sequence of non-blank lines that ends when the stream closes;
//! [`LineWriter`] writes whole lines so concurrent senders never interleave.

use futures::StreamExt;
use std::io;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt, BufWriter};
use tokio::sync::Mutex;
use tokio_util::codec::{FramedRead, LinesCodec, LinesCodecError};
use tracing::{debug, warn};

/// Reads complete lines from a byte stream.
pub struct LineReader<R> {
    lines: FramedRead<R, LinesCodec>,
    // A decode error pauses the framed stream for one poll.
    resume_after_error: bool,
}

impl<R: AsyncRead + Unpin> LineReader<R> {
    /// Lines longer than `max_line_bytes` are skipped with a warning.
    pub fn new(reader: R, max_line_bytes: usize) -> Self {
        Self {
            lines: FramedRead::new(reader, LinesCodec::new_with_max_length(max_line_bytes)),
            resume_after_error: false,
        }
    }

    /// The next non-blank line, or `None` once the stream has closed.
    ///
    /// A trailing `\r` is stripped. Lines that are not UTF-8 are skipped;
    /// other read errors end the sequence.
    pub async fn next_line(&mut self) -> Option<String> {
        loop {
            let Some(item) = self.lines.next().await else {
                if std::mem::take(&mut self.resume_after_error) {
                    continue;
                }
                return None;
            };
            self.resume_after_error = false;
            match item {
                Ok(line) => {
                    if line.trim().is_empty() {
                        continue;
                    }
                    return Some(line);
                }
                Err(LinesCodecError::MaxLineLengthExceeded) => {
                    warn!(
                        max_bytes = self.lines.decoder().max_length(),
                        "Discarding over-long line"
                    );
                    self.resume_after_error = true;
                }
                Err(LinesCodecError::Io(e)) if e.kind() == io::ErrorKind::InvalidData => {
                    warn!("Discarding line that is not valid UTF-8: {}", e);
                    self.resume_after_error = true;
                }
                Err(LinesCodecError::Io(e)) => {
                    debug!("Line stream ended with error: {}", e);
                    return None;
                }
            }
        }
    }
}

/// Writes complete lines to a byte stream, one writer at a time.
pub struct LineWriter {
    inner: Mutex<BufWriter<Box<dyn AsyncWrite + Send + Unpin>>>,
}

impl LineWriter {
    pub fn new<W>(writer: W) -> Self
    where
        W: AsyncWrite + Send + Unpin + 'static,
    {
        Self {
            inner: Mutex::new(BufWriter::new(Box::new(writer))),
        }
    }

    /// Write `line` followed by `\n` and flush.
    pub async fn write_line(&self, line: &str) -> io::Result<()> {
        let mut writer = self.inner.lock().await;
        writer.write_all(line.as_bytes()).await?;
        writer.write_all(b"\n").await?;
        writer.flush().await
    }

    /// Flush and close the write half.
    pub async fn shutdown(&self) -> io::Result<()> {
        self.inner.lock().await.shutdown().await
    }
}
