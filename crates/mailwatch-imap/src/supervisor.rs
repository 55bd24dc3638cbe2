//! The outermost forever-loop: backoff, connect, watch, repeat.

use std::time::Instant;

use tokio::io::{AsyncRead, AsyncWrite};

use crate::backoff::Backoff;
use crate::connection::{ImapStream, connect_tls};
use crate::monitor::{RunControl, WatchConfig, watch_mailbox};
use crate::Result;
use crate::session::{ObservationSink, Session};

/// Opens a fresh transport for each connection attempt.
///
/// Implementations are driven from a single task, so no `Send` bound is
/// imposed on the returned future.
#[allow(async_fn_in_trait)]
pub trait Connector {
    /// The stream type produced.
    type Stream: AsyncRead + AsyncWrite + Unpin;

    /// Dials the server.
    ///
    /// # Errors
    ///
    /// Any failure here counts as a session failure and is retried.
    async fn connect(&mut self) -> Result<Self::Stream>;
}

/// Production connector: implicit TLS to a fixed host and port.
#[derive(Debug, Clone)]
pub struct TlsConnector {
    host: String,
    port: u16,
}

impl TlsConnector {
    /// Creates a connector for the given server.
    #[must_use]
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }
}

impl Connector for TlsConnector {
    type Stream = ImapStream;

    async fn connect(&mut self) -> Result<ImapStream> {
        connect_tls(&self.host, self.port).await
    }
}

/// Runs monitoring sessions until `ctl` says stop.
///
/// Each cycle consults the backoff scheduler (sleeping if told to),
/// dials a brand-new connection, builds a brand-new [`Session`] with a
/// fresh tag sequence, and drives [`watch_mailbox`] to
/// completion. Every failure is logged and retried; nothing short of
/// `ctl` (or process death) ends the loop. A retried session always
/// repeats login and mailbox selection from scratch.
pub async fn run<C, K, R>(connector: &mut C, config: &WatchConfig, sink: &mut K, ctl: &mut R)
where
    C: Connector,
    K: ObservationSink,
    R: RunControl,
{
    let mut backoff = Backoff::new();

    while ctl.should_continue() {
        if let Some(delay) = backoff.before_attempt(Instant::now()) {
            tracing::info!(?delay, "waiting before retry");
            tokio::time::sleep(delay).await;
        }

        let outcome = match connector.connect().await {
            Ok(stream) => {
                let mut session = Session::new(stream, config.timeout);
                watch_mailbox(&mut session, config, &mut *sink, &mut *ctl).await
            }
            Err(err) => Err(err),
        };

        match outcome {
            // Only a run control stop returns cleanly.
            Ok(()) => return,
            Err(err) => tracing::error!(error = %err, "session failed"),
        }
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
    use std::collections::VecDeque;
    use std::time::Duration;

    use tokio_test::io::{Builder, Mock};

    use super::*;
    use crate::Error;
    use crate::session::SizeObservation;

    struct ScriptedConnector {
        streams: VecDeque<Mock>,
        dialed: usize,
    }

    impl ScriptedConnector {
        fn new(streams: Vec<Mock>) -> Self {
            Self {
                streams: streams.into(),
                dialed: 0,
            }
        }
    }

    impl Connector for ScriptedConnector {
        type Stream = Mock;

        async fn connect(&mut self) -> Result<Mock> {
            self.dialed += 1;
            self.streams
                .pop_front()
                .ok_or_else(|| Error::Protocol("no more scripted streams".to_string()))
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

    #[tokio::test(start_paused = true)]
    async fn test_disconnect_triggers_fresh_session() {
        // First session: login, examine, one successful poll, then the
        // server drops the connection mid-poll.
        let first = Builder::new()
            .write(b"login LOGIN \"user\" \"pass\"\r\n")
            .read(b"login OK done\r\n")
            .write(b"examine EXAMINE \"INBOX\"\r\n")
            .read(b"* 10 EXISTS\r\n")
            .read(b"examine OK done\r\n")
            .write(b"a1 NOOP\r\n")
            .read(b"a1 OK done\r\n")
            .write(b"a2 NOOP\r\n")
            .build();

        // Second session must start over: fresh LOGIN and EXAMINE, and a
        // tag sequence restarting at a1. The mock asserts the writes.
        let second = Builder::new()
            .write(b"login LOGIN \"user\" \"pass\"\r\n")
            .read(b"login OK done\r\n")
            .write(b"examine EXAMINE \"INBOX\"\r\n")
            .read(b"* 12 EXISTS\r\n")
            .read(b"examine OK done\r\n")
            .build();

        let mut connector = ScriptedConnector::new(vec![first, second]);
        let mut counts = Vec::new();
        let mut sink = |observation: SizeObservation| counts.push(observation.count);

        // Checks land in order: attempt 1, poll a1, poll a2 (fails with
        // EOF), attempt 2, then the first poll check of session two ends
        // the run.
        let mut checks = 0;
        let mut ctl = move || {
            checks += 1;
            checks <= 4
        };

        run(&mut connector, &config(), &mut sink, &mut ctl).await;

        assert_eq!(connector.dialed, 2);
        assert_eq!(counts, vec![10, 12]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_connect_failure_is_retried() {
        // No streams at all: every attempt fails at dial time.
        let mut connector = ScriptedConnector::new(vec![]);
        let mut sink = |_: SizeObservation| {};
        let mut attempts = 0;
        let mut ctl = move || {
            attempts += 1;
            attempts <= 3
        };

        run(&mut connector, &config(), &mut sink, &mut ctl).await;

        assert_eq!(connector.dialed, 3);
    }
}
