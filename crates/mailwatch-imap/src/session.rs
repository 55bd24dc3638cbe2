//! One authenticated connection lifetime and its command dialogue.
//!
//! A [`Session`] owns the line channel for as long as it lives. It issues
//! exactly one command at a time and consumes response lines until the
//! matching tagged completion arrives, classifying every line it sees
//! along the way. Sessions are never reused across failures; the
//! supervisor builds a fresh one for every connection attempt.

use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::time::{Instant, timeout_at};

use crate::command::TagGenerator;
use crate::connection::LineStream;
use crate::{Error, Result};

/// A detected mailbox message count, paired with when it was observed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SizeObservation {
    /// When the report was read from the server.
    pub at: DateTime<Utc>,
    /// The reported message count.
    pub count: u32,
}

/// Receives size observations the moment they are read off the wire.
///
/// Observations are emitted on every occurrence of an EXISTS report,
/// including repeats of an unchanged count; de-duplication, if wanted,
/// belongs in the sink.
pub trait ObservationSink {
    /// Called once per EXISTS report, in wire order.
    fn observe(&mut self, observation: SizeObservation);
}

impl<F: FnMut(SizeObservation)> ObservationSink for F {
    fn observe(&mut self, observation: SizeObservation) {
        self(observation);
    }
}

/// One live connection to the server.
pub struct Session<S> {
    stream: LineStream<S>,
    timeout: Duration,
    tags: TagGenerator,
}

impl<S> Session<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Wraps a connected stream in a fresh session.
    pub fn new(stream: S, timeout: Duration) -> Self {
        Self {
            stream: LineStream::new(stream),
            timeout,
            tags: TagGenerator::default(),
        }
    }

    /// Generates the next poll tag (`a1`, `a2`, ...).
    pub fn next_tag(&mut self) -> String {
        self.tags.next()
    }

    /// Sends one tagged command and reads until its completion.
    ///
    /// Every line read before the completion is checked for an EXISTS
    /// report and forwarded to `sink` if it carries one; this happens
    /// independently of tag matching because the server may report size
    /// changes unsolicited while a command is outstanding. Lines matching
    /// neither are discarded.
    ///
    /// The whole exchange runs against one absolute deadline taken before
    /// the write; expiry surfaces as [`Error::Timeout`].
    ///
    /// # Errors
    ///
    /// [`Error::Status`] if the server completes the command with anything
    /// but OK, [`Error::UnexpectedEof`] if the stream ends first, and
    /// transport errors (including the deadline) as-is.
    pub async fn execute<K>(&mut self, tag: &str, command: &str, sink: &mut K) -> Result<()>
    where
        K: ObservationSink,
    {
        let deadline = Instant::now() + self.timeout;

        tracing::debug!(">>> {tag} {command}");
        let line = format!("{tag} {command}");
        match timeout_at(deadline, self.stream.write_line(&line)).await {
            Ok(written) => written?,
            Err(_) => return Err(Error::Timeout(self.timeout)),
        }

        loop {
            let line = match timeout_at(deadline, self.stream.read_line()).await {
                Ok(read) => read?,
                Err(_) => return Err(Error::Timeout(self.timeout)),
            };
            tracing::debug!("<<< {line}");

            if let Some(count) = parse_exists(&line) {
                sink.observe(SizeObservation {
                    at: Utc::now(),
                    count,
                });
            }

            if let Some(rest) = line.strip_prefix(tag).and_then(|r| r.strip_prefix(' ')) {
                if rest == "OK" || rest.starts_with("OK ") {
                    return Ok(());
                }
                return Err(Error::Status(line));
            }
        }
    }
}

/// Extracts the message count from an EXISTS report.
///
/// A report has `EXISTS` as its last whitespace-delimited token
/// (case-sensitive) and the count as its second, e.g. `* 42 EXISTS`.
/// Anything else, including a malformed count, yields `None`.
fn parse_exists(line: &str) -> Option<u32> {
    let tokens: Vec<&str> = line.split_whitespace().collect();
    if tokens.last() == Some(&"EXISTS") {
        tokens.get(1)?.parse().ok()
    } else {
        None
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

    fn collector(counts: &mut Vec<u32>) -> impl FnMut(SizeObservation) + '_ {
        |observation| counts.push(observation.count)
    }

    #[test]
    fn test_parse_exists() {
        assert_eq!(parse_exists("* 42 EXISTS"), Some(42));
        assert_eq!(parse_exists("* 0 EXISTS"), Some(0));
        assert_eq!(parse_exists("* 42 RECENT"), None);
        assert_eq!(parse_exists("* 42 exists"), None);
        assert_eq!(parse_exists("* EXISTS"), None);
        assert_eq!(parse_exists("* abc EXISTS"), None);
        assert_eq!(parse_exists(""), None);
    }

    #[tokio::test]
    async fn test_execute_success() {
        use tokio_test::io::Builder;

        let mock = Builder::new()
            .write(b"a3 NOOP\r\n")
            .read(b"a3 OK done\r\n")
            .build();
        let mut session = Session::new(mock, Duration::from_secs(5));
        let mut counts = Vec::new();

        session
            .execute("a3", "NOOP", &mut collector(&mut counts))
            .await
            .unwrap();
        assert!(counts.is_empty());
    }

    #[tokio::test]
    async fn test_execute_error_status_carries_line() {
        use tokio_test::io::Builder;

        let mock = Builder::new()
            .write(b"a3 NOOP\r\n")
            .read(b"a3 NO permission denied\r\n")
            .build();
        let mut session = Session::new(mock, Duration::from_secs(5));
        let mut counts = Vec::new();

        let err = session
            .execute("a3", "NOOP", &mut collector(&mut counts))
            .await
            .unwrap_err();
        match err {
            Error::Status(line) => assert_eq!(line, "a3 NO permission denied"),
            other => panic!("expected Status, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_execute_skips_mismatched_tag() {
        use tokio_test::io::Builder;

        let mock = Builder::new()
            .write(b"a3 NOOP\r\n")
            .read(b"a9 OK done\r\n")
            .read(b"a3 OK done\r\n")
            .build();
        let mut session = Session::new(mock, Duration::from_secs(5));
        let mut counts = Vec::new();

        session
            .execute("a3", "NOOP", &mut collector(&mut counts))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_tag_prefix_must_be_whole_token() {
        use tokio_test::io::Builder;

        // "a1" must not claim "a10 OK" as its completion.
        let mock = Builder::new()
            .write(b"a1 NOOP\r\n")
            .read(b"a10 OK done\r\n")
            .read(b"a1 OK done\r\n")
            .build();
        let mut session = Session::new(mock, Duration::from_secs(5));
        let mut counts = Vec::new();

        session
            .execute("a1", "NOOP", &mut collector(&mut counts))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_exists_observed_during_command() {
        use tokio_test::io::Builder;

        let mock = Builder::new()
            .write(b"a1 NOOP\r\n")
            .read(b"* 42 EXISTS\r\n")
            .read(b"* 42 RECENT\r\n")
            .read(b"a1 OK done\r\n")
            .build();
        let mut session = Session::new(mock, Duration::from_secs(5));
        let mut counts = Vec::new();

        session
            .execute("a1", "NOOP", &mut collector(&mut counts))
            .await
            .unwrap();
        assert_eq!(counts, vec![42]);
    }

    #[tokio::test]
    async fn test_eof_before_completion() {
        use tokio_test::io::Builder;

        let mock = Builder::new()
            .write(b"a1 NOOP\r\n")
            .read(b"* 7 EXISTS\r\n")
            .build();
        let mut session = Session::new(mock, Duration::from_secs(5));
        let mut counts = Vec::new();

        let err = session
            .execute("a1", "NOOP", &mut collector(&mut counts))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::UnexpectedEof));
        // The observation read before the stream ended was still emitted.
        assert_eq!(counts, vec![7]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_silent_server_hits_deadline() {
        use tokio_test::io::Builder;

        // No scripted reads: the read stays pending until the deadline.
        let mock = Builder::new()
            .write(b"a1 NOOP\r\n")
            .wait(Duration::from_secs(60))
            .build();
        let mut session = Session::new(mock, Duration::from_secs(5));
        let mut counts = Vec::new();

        let err = session
            .execute("a1", "NOOP", &mut collector(&mut counts))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Timeout(_)));
    }
}
