//! Integration tests for the mailbox watcher.
//!
//! These tests use a mock stream to simulate server responses without
//! requiring a real server connection.

use std::collections::VecDeque;
use std::io::{self, Cursor};
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};

use mailwatch_imap::{
    Connector, Error, Session, SizeObservation, WatchConfig, supervisor, watch_mailbox,
};

/// Mock stream that returns a predefined response script and captures
/// everything the watcher sends.
struct MockStream {
    responses: Cursor<Vec<u8>>,
    sent: Arc<Mutex<Vec<u8>>>,
}

impl MockStream {
    fn new(responses: &[u8]) -> Self {
        Self {
            responses: Cursor::new(responses.to_vec()),
            sent: Arc::new(Mutex::new(Vec::new())),
        }
    }

    fn sent_handle(&self) -> Arc<Mutex<Vec<u8>>> {
        Arc::clone(&self.sent)
    }
}

impl AsyncRead for MockStream {
    fn poll_read(
        mut self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let data = self.responses.get_ref();
        let pos = usize::try_from(self.responses.position()).unwrap();

        if pos >= data.len() {
            // Clean close: zero-byte read.
            return Poll::Ready(Ok(()));
        }

        let remaining = &data[pos..];
        let to_read = remaining.len().min(buf.remaining());
        buf.put_slice(&remaining[..to_read]);
        self.responses.set_position((pos + to_read) as u64);

        Poll::Ready(Ok(()))
    }
}

impl AsyncWrite for MockStream {
    fn poll_write(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        self.sent.lock().unwrap().extend_from_slice(buf);
        Poll::Ready(Ok(buf.len()))
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }
}

fn config() -> WatchConfig {
    WatchConfig {
        username: "user".to_string(),
        password: "pass".to_string(),
        mailbox: "INBOX".to_string(),
        interval: Duration::ZERO,
        timeout: Duration::from_secs(5),
    }
}

#[tokio::test]
async fn watch_emits_a_record_per_exists_report() {
    // A server that greets, accepts login and examine, then reports the
    // mailbox size on every NOOP: unchanged, unchanged, grown.
    let script = concat!(
        "* OK server ready\r\n",
        "login OK done\r\n",
        "* 10 EXISTS\r\n",
        "* 0 RECENT\r\n",
        "examine OK [READ-ONLY] done\r\n",
        "* 10 EXISTS\r\n",
        "a1 OK done\r\n",
        "* 10 EXISTS\r\n",
        "a2 OK done\r\n",
        "* 11 EXISTS\r\n",
        "a3 OK done\r\n",
    );
    let stream = MockStream::new(script.as_bytes());
    let sent = stream.sent_handle();
    let mut session = Session::new(stream, Duration::from_secs(5));

    let mut observations = Vec::new();
    let mut sink = |observation: SizeObservation| observations.push(observation);
    let mut forever = || true;

    // The script runs out after the third poll, so the watch ends with a
    // clean-close failure like any real session eventually does.
    let err = watch_mailbox(&mut session, &config(), &mut sink, &mut forever)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::UnexpectedEof));

    // Emit-on-every-occurrence: four records (one from EXAMINE, three
    // from the polls), with the repeated count repeated verbatim.
    let counts: Vec<u32> = observations.iter().map(|o| o.count).collect();
    assert_eq!(counts, vec![10, 10, 10, 11]);

    // Timestamps never go backwards.
    for pair in observations.windows(2) {
        assert!(pair[0].at <= pair[1].at);
    }

    let sent = sent.lock().unwrap();
    let sent = String::from_utf8(sent.clone()).unwrap();
    assert_eq!(
        sent,
        concat!(
            "login LOGIN \"user\" \"pass\"\r\n",
            "examine EXAMINE \"INBOX\"\r\n",
            "a1 NOOP\r\n",
            "a2 NOOP\r\n",
            "a3 NOOP\r\n",
            "a4 NOOP\r\n",
        )
    );
}

#[tokio::test]
async fn quoted_values_reach_the_wire_escaped() {
    let stream = MockStream::new(b"login NO rejected\r\n");
    let sent = stream.sent_handle();
    let mut session = Session::new(stream, Duration::from_secs(5));

    let config = WatchConfig {
        username: r#"od\d"user"#.to_string(),
        password: "p a/ss".to_string(),
        ..config()
    };
    let mut sink = |_: SizeObservation| {};
    let mut forever = || true;

    let _ = watch_mailbox(&mut session, &config, &mut sink, &mut forever).await;

    let sent = sent.lock().unwrap();
    let sent = String::from_utf8(sent.clone()).unwrap();
    assert_eq!(
        sent,
        "login LOGIN \"od\\\\d\\\"user\" \"p a\\/ss\"\r\n"
    );
}

struct ScriptedConnector {
    streams: VecDeque<MockStream>,
    sent: Vec<Arc<Mutex<Vec<u8>>>>,
}

impl ScriptedConnector {
    fn new(streams: Vec<MockStream>) -> Self {
        let sent = streams.iter().map(MockStream::sent_handle).collect();
        Self {
            streams: streams.into(),
            sent,
        }
    }

    fn dialed(&self) -> usize {
        self.sent.len() - self.streams.len()
    }

    fn sent_text(&self, index: usize) -> String {
        String::from_utf8(self.sent[index].lock().unwrap().clone()).unwrap()
    }
}

impl Connector for ScriptedConnector {
    type Stream = MockStream;

    async fn connect(&mut self) -> mailwatch_imap::Result<MockStream> {
        self.streams
            .pop_front()
            .ok_or_else(|| Error::Protocol("no more scripted streams".to_string()))
    }
}

#[tokio::test(start_paused = true)]
async fn dropped_session_reconnects_and_logs_in_again() {
    // First session dies when the server closes mid-poll; the second one
    // must repeat LOGIN and EXAMINE from scratch with a fresh tag
    // sequence, not resume where the first left off.
    let first = MockStream::new(
        concat!(
            "login OK done\r\n",
            "examine OK done\r\n",
            "* 10 EXISTS\r\n",
            "a1 OK done\r\n",
        )
        .as_bytes(),
    );
    let second = MockStream::new(
        concat!(
            "login OK done\r\n",
            "* 12 EXISTS\r\n",
            "examine OK done\r\n",
        )
        .as_bytes(),
    );
    let mut connector = ScriptedConnector::new(vec![first, second]);

    let mut counts = Vec::new();
    let mut sink = |observation: SizeObservation| counts.push(observation.count);

    // Attempt 1, poll a1, poll a2 (EOF), attempt 2, then stop at the
    // second session's first poll check.
    let mut checks = 0;
    let mut ctl = move || {
        checks += 1;
        checks <= 4
    };

    supervisor::run(&mut connector, &config(), &mut sink, &mut ctl).await;

    assert_eq!(connector.dialed(), 2);
    assert_eq!(counts, vec![10, 12]);

    let first_sent = connector.sent_text(0);
    assert!(first_sent.starts_with("login LOGIN"));
    assert!(first_sent.contains("a2 NOOP"));

    let second_sent = connector.sent_text(1);
    assert_eq!(
        second_sent,
        concat!(
            "login LOGIN \"user\" \"pass\"\r\n",
            "examine EXAMINE \"INBOX\"\r\n",
        )
    );
}
