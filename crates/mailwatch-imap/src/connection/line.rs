//! Line-oriented I/O for the watcher dialogue.
//!
//! The watcher only ever exchanges single CRLF-terminated text lines; it
//! never requests literals, so no literal framing is needed. This module
//! provides buffered reading and writing of such lines.

#![allow(clippy::missing_errors_doc)]

use bytes::BytesMut;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};

use crate::{Error, Result};

/// Default buffer size for reading.
const DEFAULT_BUFFER_SIZE: usize = 8192;

/// Maximum line length to prevent memory exhaustion.
const MAX_LINE_LENGTH: usize = 64 * 1024;

/// Buffered line channel over a duplex byte stream.
pub struct LineStream<S> {
    reader: BufReader<S>,
    write_buffer: BytesMut,
}

impl<S> LineStream<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Creates a new line stream.
    pub fn new(stream: S) -> Self {
        Self {
            reader: BufReader::with_capacity(DEFAULT_BUFFER_SIZE, stream),
            write_buffer: BytesMut::with_capacity(DEFAULT_BUFFER_SIZE),
        }
    }

    /// Reads the next line, with the terminator stripped.
    ///
    /// Lines are `\n`-delimited with an optional preceding `\r` (servers
    /// send CRLF; tolerating bare LF costs nothing). A clean close before
    /// any terminator yields [`Error::UnexpectedEof`]. Non-UTF-8 bytes are
    /// replaced rather than rejected, since classification only looks at
    /// ASCII tokens.
    pub async fn read_line(&mut self) -> Result<String> {
        let mut line = Vec::new();

        loop {
            let buf = self.reader.fill_buf().await?;
            if buf.is_empty() {
                return Err(Error::UnexpectedEof);
            }

            if let Some(pos) = buf.iter().position(|&b| b == b'\n') {
                line.extend_from_slice(&buf[..pos]);
                self.reader.consume(pos + 1);
                break;
            }

            let len = buf.len();
            line.extend_from_slice(buf);
            self.reader.consume(len);

            if line.len() > MAX_LINE_LENGTH {
                return Err(Error::Protocol("line too long".to_string()));
            }
        }

        if line.last() == Some(&b'\r') {
            line.pop();
        }

        Ok(String::from_utf8_lossy(&line).into_owned())
    }

    /// Writes a line followed by CRLF and flushes.
    pub async fn write_line(&mut self, line: &str) -> Result<()> {
        self.write_buffer.clear();
        self.write_buffer.extend_from_slice(line.as_bytes());
        self.write_buffer.extend_from_slice(b"\r\n");

        let stream = self.reader.get_mut();
        stream.write_all(&self.write_buffer).await?;
        stream.flush().await?;

        Ok(())
    }

}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::redundant_clone,
    clippy::manual_string_new,
    clippy::needless_collect,
    clippy::unreadable_literal,
    clippy::used_underscore_items,
    clippy::similar_names
)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_read_simple_line() {
        use tokio_test::io::Builder;

        let mock = Builder::new().read(b"* OK ready\r\n").build();
        let mut lines = LineStream::new(mock);

        assert_eq!(lines.read_line().await.unwrap(), "* OK ready");
    }

    #[tokio::test]
    async fn test_read_multiple_lines() {
        use tokio_test::io::Builder;

        let mock = Builder::new()
            .read(b"* 10 EXISTS\r\n")
            .read(b"a1 OK NOOP completed\r\n")
            .build();
        let mut lines = LineStream::new(mock);

        assert_eq!(lines.read_line().await.unwrap(), "* 10 EXISTS");
        assert_eq!(lines.read_line().await.unwrap(), "a1 OK NOOP completed");
    }

    #[tokio::test]
    async fn test_read_tolerates_bare_lf() {
        use tokio_test::io::Builder;

        let mock = Builder::new().read(b"* OK sloppy server\n").build();
        let mut lines = LineStream::new(mock);

        assert_eq!(lines.read_line().await.unwrap(), "* OK sloppy server");
    }

    #[tokio::test]
    async fn test_read_line_split_across_fills() {
        use tokio_test::io::Builder;

        let mock = Builder::new().read(b"* 23 EXI").read(b"STS\r\n").build();
        let mut lines = LineStream::new(mock);

        assert_eq!(lines.read_line().await.unwrap(), "* 23 EXISTS");
    }

    #[tokio::test]
    async fn test_eof_is_distinguished() {
        use tokio_test::io::Builder;

        let mock = Builder::new().build();
        let mut lines = LineStream::new(mock);

        assert!(matches!(lines.read_line().await, Err(Error::UnexpectedEof)));
    }

    #[tokio::test]
    async fn test_line_length_limit() {
        use tokio_test::io::Builder;

        let long_line = "A".repeat(MAX_LINE_LENGTH + 100);
        let mock = Builder::new().read(long_line.as_bytes()).build();
        let mut lines = LineStream::new(mock);

        let result = lines.read_line().await;
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("line too long"));
    }

    #[tokio::test]
    async fn test_write_line_appends_crlf() {
        use tokio_test::io::Builder;

        let mock = Builder::new().write(b"a1 NOOP\r\n").build();
        let mut lines = LineStream::new(mock);

        lines.write_line("a1 NOOP").await.unwrap();
    }
}
