//! `mailwatch` - watch an IMAP mailbox's message count from the command line.
//!
//! One line per size report on stdout; session failures, reconnect waits
//! and (with `--verbose`) the full protocol chatter on stderr. Runs until
//! killed.

#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

mod config;

use std::io::Write;

use chrono::SecondsFormat;
use clap::Parser;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use mailwatch_imap::{ObservationSink, SizeObservation, TlsConnector, WatchConfig, supervisor};

use config::{Cli, load_credentials, split_server};

/// Writes observations to stdout, one line each, flushed immediately so
/// they can be tailed or piped into a grapher without waiting for a
/// buffer to fill.
struct StdoutSink;

impl ObservationSink for StdoutSink {
    fn observe(&mut self, observation: SizeObservation) {
        let mut stdout = std::io::stdout().lock();
        let line = format!(
            "{} {}\n",
            observation.at.to_rfc3339_opts(SecondsFormat::Secs, true),
            observation.count
        );
        if stdout.write_all(line.as_bytes()).and_then(|()| stdout.flush()).is_err() {
            tracing::warn!("failed to write observation to stdout");
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let default_filter = if cli.verbose {
        "mailwatch=debug,mailwatch_imap=debug"
    } else {
        "mailwatch=info,mailwatch_imap=info"
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let (host, port) = split_server(&cli.server)?;
    let credentials = load_credentials(&cli.credentials_file)?;

    let watch = WatchConfig {
        username: credentials.username,
        password: credentials.password,
        mailbox: cli.mailbox,
        interval: cli.interval,
        timeout: cli.timeout,
    };

    info!(server = %cli.server, mailbox = %watch.mailbox, "starting watch");

    let mut connector = TlsConnector::new(host, port);
    let mut sink = StdoutSink;
    let mut forever = || true;
    supervisor::run(&mut connector, &watch, &mut sink, &mut forever).await;

    Ok(())
}
