//! Drives one session through login, mailbox selection and the poll loop.

use std::time::Duration;

use tokio::io::{AsyncRead, AsyncWrite};

use crate::session::{ObservationSink, Session};
use crate::{Error, Result, command};

/// Everything one watch needs to know, resolved once at startup.
///
/// Built by the caller and passed explicitly; no component reads ambient
/// global state.
#[derive(Debug, Clone)]
pub struct WatchConfig {
    /// Login username.
    pub username: String,
    /// Login password.
    pub password: String,
    /// Mailbox to monitor.
    pub mailbox: String,
    /// Wait between polls.
    pub interval: Duration,
    /// Per-command deadline; a poll taking longer than this fails the
    /// session and forces a reconnect.
    pub timeout: Duration,
}

/// Decides whether the forever-loops keep running.
///
/// Production uses an always-true check and runs until the process is
/// killed; tests inject a bounded one.
pub trait RunControl {
    /// Checked before every supervisor attempt and every poll.
    fn should_continue(&mut self) -> bool;
}

impl<F: FnMut() -> bool> RunControl for F {
    fn should_continue(&mut self) -> bool {
        self()
    }
}

/// Runs one monitoring session to completion.
///
/// Authenticates with the fixed tag `login`, selects the mailbox
/// read-only with the fixed tag `examine`, then polls with NOOP under
/// generated tags until a command fails or `ctl` ends the loop. Size
/// observations surface through `sink` identically in every phase.
///
/// The server greeting needs no separate read: it is consumed and
/// discarded by the LOGIN exchange like any other unrelated line.
///
/// # Errors
///
/// Returns the first command failure; an EXAMINE failure is wrapped so
/// the message names the mailbox. `Ok(())` means `ctl` ended the poll
/// loop, which only happens under test.
pub async fn watch_mailbox<S, K, R>(
    session: &mut Session<S>,
    config: &WatchConfig,
    sink: &mut K,
    ctl: &mut R,
) -> Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
    K: ObservationSink,
    R: RunControl,
{
    session
        .execute(
            "login",
            &command::login(&config.username, &config.password),
            sink,
        )
        .await?;
    tracing::info!(mailbox = %config.mailbox, "authenticated");

    session
        .execute("examine", &command::examine(&config.mailbox), sink)
        .await
        .map_err(|source| Error::Mailbox {
            mailbox: config.mailbox.clone(),
            source: Box::new(source),
        })?;

    while ctl.should_continue() {
        tokio::time::sleep(config.interval).await;
        let tag = session.next_tag();
        session.execute(&tag, command::NOOP, sink).await?;
    }

    Ok(())
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
    use tokio_test::io::Builder;

    use super::*;
    use crate::session::SizeObservation;

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
    async fn test_login_failure_names_no_mailbox() {
        let mock = Builder::new()
            .write(b"login LOGIN \"user\" \"pass\"\r\n")
            .read(b"login NO credentials rejected\r\n")
            .build();
        let mut session = Session::new(mock, Duration::from_secs(5));
        let mut sink = |_: SizeObservation| {};
        let mut ctl = || true;

        let err = watch_mailbox(&mut session, &config(), &mut sink, &mut ctl)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Status(_)));
    }

    #[tokio::test]
    async fn test_examine_failure_names_mailbox() {
        let mock = Builder::new()
            .write(b"login LOGIN \"user\" \"pass\"\r\n")
            .read(b"* OK greeting\r\n")
            .read(b"login OK done\r\n")
            .write(b"examine EXAMINE \"INBOX\"\r\n")
            .read(b"examine NO no such mailbox\r\n")
            .build();
        let mut session = Session::new(mock, Duration::from_secs(5));
        let mut sink = |_: SizeObservation| {};
        let mut ctl = || true;

        let err = watch_mailbox(&mut session, &config(), &mut sink, &mut ctl)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("INBOX"));
    }

    #[tokio::test]
    async fn test_poll_loop_bounded_by_control() {
        let mock = Builder::new()
            .write(b"login LOGIN \"user\" \"pass\"\r\n")
            .read(b"login OK done\r\n")
            .write(b"examine EXAMINE \"INBOX\"\r\n")
            .read(b"* 5 EXISTS\r\n")
            .read(b"examine OK done\r\n")
            .write(b"a1 NOOP\r\n")
            .read(b"a1 OK done\r\n")
            .write(b"a2 NOOP\r\n")
            .read(b"a2 OK done\r\n")
            .build();
        let mut session = Session::new(mock, Duration::from_secs(5));
        let mut counts = Vec::new();
        let mut sink = |observation: SizeObservation| counts.push(observation.count);
        let mut polls = 0;
        let mut ctl = move || {
            polls += 1;
            polls <= 2
        };

        watch_mailbox(&mut session, &config(), &mut sink, &mut ctl)
            .await
            .unwrap();
        assert_eq!(counts, vec![5]);
    }
}
