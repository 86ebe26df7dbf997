//! Line framing over the combined output stream
//!
//! Partial reads are assembled by the buffered reader; a line is only
//! handed out once its terminator (or EOF) has been seen. There is no
//! length limit: a line without a terminator keeps buffering until one
//! arrives or the stream ends.

use std::borrow::Cow;
use std::io;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};

/// Splits a byte stream into text lines, decoding permissively
pub struct LineFramer<R> {
    reader: BufReader<R>,
    buf: Vec<u8>,
    lossy_lines: u64,
}

impl<R: AsyncRead + Unpin> LineFramer<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader: BufReader::new(reader),
            buf: Vec::with_capacity(256),
            lossy_lines: 0,
        }
    }

    /// Read the next line without its terminator. `Ok(None)` means EOF.
    ///
    /// Invalid UTF-8 is replaced with U+FFFD rather than failing the stream.
    /// Cancel safe: bytes consumed by a dropped call stay buffered and are
    /// returned by the next one.
    pub async fn next_line(&mut self) -> io::Result<Option<String>> {
        self.reader.read_until(b'\n', &mut self.buf).await?;
        if self.buf.is_empty() {
            return Ok(None);
        }

        if self.buf.last() == Some(&b'\n') {
            self.buf.pop();
            if self.buf.last() == Some(&b'\r') {
                self.buf.pop();
            }
        }

        let line = match String::from_utf8_lossy(&self.buf) {
            Cow::Borrowed(s) => s.to_string(),
            Cow::Owned(s) => {
                self.lossy_lines += 1;
                tracing::debug!("Replaced invalid UTF-8 in log line");
                s
            }
        };
        self.buf.clear();

        Ok(Some(line))
    }

    /// Number of lines that needed replacement characters
    pub fn lossy_lines(&self) -> u64 {
        self.lossy_lines
    }
}
