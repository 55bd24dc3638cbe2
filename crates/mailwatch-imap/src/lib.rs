//! # mailwatch-imap
//!
//! A deliberately minimal IMAP dialogue engine for watching the message
//! count of a single mailbox over a long-lived connection.
//!
//! This is not a general IMAP client. It speaks exactly three commands:
//!
//! - `LOGIN` — authenticate with plaintext credentials
//! - `EXAMINE` — select the watched mailbox read-only
//! - `NOOP` — poll; servers flush pending unsolicited status updates
//!   (notably `* <n> EXISTS`) in the reply window
//!
//! and it cares about exactly one response shape, the untagged EXISTS
//! report, which it converts into timestamped [`SizeObservation`]s pushed
//! to an [`ObservationSink`] the moment they are read.
//!
//! ## Quick Start
//!
//! ```ignore
//! use std::time::Duration;
//!
//! use mailwatch_imap::{SizeObservation, TlsConnector, WatchConfig, supervisor};
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = WatchConfig {
//!         username: "user@example.com".into(),
//!         password: "password".into(),
//!         mailbox: "INBOX".into(),
//!         interval: Duration::from_secs(60),
//!         timeout: Duration::from_secs(300),
//!     };
//!
//!     let mut connector = TlsConnector::new("imap.example.com", 993);
//!     let mut sink = |observation: SizeObservation| {
//!         println!("{} {}", observation.at, observation.count);
//!     };
//!     let mut forever = || true;
//!
//!     supervisor::run(&mut connector, &config, &mut sink, &mut forever).await;
//! }
//! ```
//!
//! ## Design
//!
//! One logical task, strict one-in-flight command discipline: a command
//! is written, then lines are consumed until its tagged completion, with
//! every line checked for an EXISTS report on the way. Any failure ends
//! the session; the supervisor backs off under a jittered sliding-window
//! schedule and starts a brand-new session that repeats login and
//! selection. There is no differentiated retry policy per error kind and
//! no cap on retries.
//!
//! ## Modules
//!
//! - [`command`]: command text builders, quoting and tag generation
//! - [`connection`]: TLS/plaintext streams and line-oriented I/O
//! - [`session`]: the tagged command/response engine
//! - [`monitor`]: login → examine → poll sequencing
//! - [`backoff`]: the reconnect scheduler
//! - [`supervisor`]: the outermost retry-forever loop

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

pub mod backoff;
pub mod command;
pub mod connection;
mod error;
pub mod monitor;
pub mod session;
pub mod supervisor;

pub use backoff::Backoff;
pub use command::TagGenerator;
pub use connection::{ImapStream, LineStream, connect_plain, connect_tls};
pub use error::{Error, Result};
pub use monitor::{RunControl, WatchConfig, watch_mailbox};
pub use session::{ObservationSink, Session, SizeObservation};
pub use supervisor::{Connector, TlsConnector, run};
