//! Flag parsing and startup configuration.
//!
//! Everything here is resolved exactly once, before any connection is
//! made; a failure at this stage is fatal and the process exits without
//! entering the watch loop.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, bail};
use clap::Parser;

/// Watch the message count of an IMAP mailbox.
///
/// Emits one line per size report to stdout, formatted as
/// `<rfc3339-timestamp> <message-count>`, and keeps reconnecting forever
/// when anything goes wrong.
#[derive(Debug, Parser)]
#[command(name = "mailwatch", version)]
pub struct Cli {
    /// Machine and port to connect to.
    #[arg(long, default_value = "imap.gmail.com:993")]
    pub server: String,

    /// File with username and password separated by a space.
    #[arg(long, default_value = ".mailwatch-credentials")]
    pub credentials_file: PathBuf,

    /// Mailbox to monitor.
    #[arg(long, default_value = "INBOX")]
    pub mailbox: String,

    /// Wait this long between polls (e.g. `30s`, `1m`, `1h30m`).
    #[arg(long, default_value = "1m", value_parser = parse_duration)]
    pub interval: Duration,

    /// Reconnect if a command takes longer than this.
    #[arg(long, default_value = "5m", value_parser = parse_duration)]
    pub timeout: Duration,

    /// Show the IMAP chatter on stderr.
    #[arg(long)]
    pub verbose: bool,
}

/// Username and password for LOGIN.
#[derive(Debug, Clone)]
pub struct Credentials {
    /// Login username.
    pub username: String,
    /// Login password.
    pub password: String,
}

/// Reads credentials from a file.
///
/// The trimmed first line is split on the first space: everything before
/// it is the username, everything after it the password (which may itself
/// contain spaces).
pub fn load_credentials(path: &Path) -> anyhow::Result<Credentials> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("couldn't read credentials file {}", path.display()))?;
    parse_credentials(&raw)
        .with_context(|| format!("malformed credentials file {}", path.display()))
}

fn parse_credentials(raw: &str) -> anyhow::Result<Credentials> {
    let Some((username, password)) = raw.trim().split_once(' ') else {
        bail!("expected `username password` on a single line");
    };
    if username.is_empty() || password.is_empty() {
        bail!("expected `username password` on a single line");
    }
    Ok(Credentials {
        username: username.to_string(),
        password: password.to_string(),
    })
}

/// Splits a `host:port` server address.
pub fn split_server(server: &str) -> anyhow::Result<(String, u16)> {
    let Some((host, port)) = server.rsplit_once(':') else {
        bail!("server address {server} is missing a port");
    };
    let port = port
        .parse()
        .with_context(|| format!("bad port in server address {server}"))?;
    Ok((host.to_string(), port))
}

/// Parses a duration under the `number+unit` grammar.
///
/// Units are `ms`, `s`, `m` and `h`; segments may be chained, as in
/// `1h30m`. The empty string and trailing garbage are errors.
pub fn parse_duration(value: &str) -> Result<Duration, String> {
    let mut total = Duration::ZERO;
    let mut rest = value;

    if rest.is_empty() {
        return Err(format!("couldn't parse duration value {value}"));
    }

    while !rest.is_empty() {
        let digits = rest.len() - rest.trim_start_matches(|c: char| c.is_ascii_digit()).len();
        if digits == 0 {
            return Err(format!("couldn't parse duration value {value}"));
        }
        let (number, after) = rest.split_at(digits);
        let number: u64 = number
            .parse()
            .map_err(|_| format!("couldn't parse duration value {value}"))?;

        let units = after.len() - after.trim_start_matches(char::is_alphabetic).len();
        let (unit, after) = after.split_at(units);
        let segment = match unit {
            "ms" => Duration::from_millis(number),
            "s" => Duration::from_secs(number),
            "m" => Duration::from_secs(number * 60),
            "h" => Duration::from_secs(number * 60 * 60),
            _ => return Err(format!("couldn't parse duration value {value}")),
        };

        total += segment;
        rest = after;
    }

    Ok(total)
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

    #[test]
    fn test_parse_duration_units() {
        assert_eq!(parse_duration("250ms").unwrap(), Duration::from_millis(250));
        assert_eq!(parse_duration("30s").unwrap(), Duration::from_secs(30));
        assert_eq!(parse_duration("1m").unwrap(), Duration::from_secs(60));
        assert_eq!(parse_duration("5m").unwrap(), Duration::from_secs(300));
        assert_eq!(parse_duration("2h").unwrap(), Duration::from_secs(7200));
    }

    #[test]
    fn test_parse_duration_compound() {
        assert_eq!(parse_duration("1h30m").unwrap(), Duration::from_secs(5400));
        assert_eq!(
            parse_duration("1m30s500ms").unwrap(),
            Duration::from_millis(90_500)
        );
    }

    #[test]
    fn test_parse_duration_rejects_garbage() {
        assert!(parse_duration("").is_err());
        assert!(parse_duration("m").is_err());
        assert!(parse_duration("10").is_err());
        assert!(parse_duration("10x").is_err());
        assert!(parse_duration("1m extra").is_err());
        assert!(parse_duration("-5s").is_err());
    }

    #[test]
    fn test_parse_credentials() {
        let credentials = parse_credentials("alice s3cret\n").unwrap();
        assert_eq!(credentials.username, "alice");
        assert_eq!(credentials.password, "s3cret");
    }

    #[test]
    fn test_parse_credentials_password_keeps_spaces() {
        let credentials = parse_credentials("alice pass with spaces").unwrap();
        assert_eq!(credentials.username, "alice");
        assert_eq!(credentials.password, "pass with spaces");
    }

    #[test]
    fn test_parse_credentials_rejects_single_field() {
        assert!(parse_credentials("justonefield").is_err());
        assert!(parse_credentials("").is_err());
        assert!(parse_credentials("trailing \n").is_err());
    }

    #[test]
    fn test_split_server() {
        let (host, port) = split_server("imap.example.com:993").unwrap();
        assert_eq!(host, "imap.example.com");
        assert_eq!(port, 993);
    }

    #[test]
    fn test_split_server_rejects_missing_port() {
        assert!(split_server("imap.example.com").is_err());
        assert!(split_server("imap.example.com:notaport").is_err());
    }

    #[test]
    fn test_cli_defaults() {
        let cli = Cli::parse_from(["mailwatch"]);
        assert_eq!(cli.server, "imap.gmail.com:993");
        assert_eq!(cli.mailbox, "INBOX");
        assert_eq!(cli.interval, Duration::from_secs(60));
        assert_eq!(cli.timeout, Duration::from_secs(300));
        assert!(!cli.verbose);
    }

    #[test]
    fn test_cli_rejects_bad_duration() {
        assert!(Cli::try_parse_from(["mailwatch", "--interval", "soon"]).is_err());
    }
}
