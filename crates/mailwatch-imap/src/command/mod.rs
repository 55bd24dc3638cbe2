//! Command text construction.
//!
//! The watcher speaks exactly three commands: LOGIN, EXAMINE and NOOP.
//! Builders return the command body without a tag; the session prepends
//! the tag when it writes the line.

mod tag_generator;

pub use tag_generator::TagGenerator;

/// NOOP command body.
///
/// Polling uses NOOP because it forces the server to flush pending
/// unsolicited status updates (including EXISTS) without mutating any
/// mailbox state.
pub const NOOP: &str = "NOOP";

/// Builds a LOGIN command body from plaintext credentials.
#[must_use]
pub fn login(username: &str, password: &str) -> String {
    format!("LOGIN {} {}", quote(username), quote(password))
}

/// Builds an EXAMINE command body for a read-only mailbox selection.
#[must_use]
pub fn examine(mailbox: &str) -> String {
    format!("EXAMINE {}", quote(mailbox))
}

/// Quotes a value for interpolation into a command line.
///
/// Backslash, double quote and forward slash are each escaped with a
/// preceding backslash and the whole value is wrapped in double quotes, so
/// the result is always a single syntactic token. Escaping `/` is not part
/// of the standard quoted-string grammar but is harmless over-escaping and
/// is kept as-is.
#[must_use]
pub fn quote(value: &str) -> String {
    let mut quoted = String::with_capacity(value.len() + 2);
    quoted.push('"');
    for c in value.chars() {
        if matches!(c, '\\' | '"' | '/') {
            quoted.push('\\');
        }
        quoted.push(c);
    }
    quoted.push('"');
    quoted
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
    use proptest::prelude::*;

    use super::*;

    #[test]
    fn test_quote_plain() {
        assert_eq!(quote("INBOX"), "\"INBOX\"");
        assert_eq!(quote(""), "\"\"");
    }

    #[test]
    fn test_quote_escapes() {
        assert_eq!(quote(r#"a\b"#), r#""a\\b""#);
        assert_eq!(quote(r#"a"b"#), r#""a\"b""#);
        assert_eq!(quote("a/b"), r#""a\/b""#);
        assert_eq!(quote(r#"\""#), r#""\\\"""#);
    }

    #[test]
    fn test_quote_space_stays_single_token() {
        // A quoted string with embedded spaces parses as one token.
        assert_eq!(quote("two words"), "\"two words\"");
    }

    #[test]
    fn test_login_command() {
        assert_eq!(
            login("user@example.com", "hunter2"),
            "LOGIN \"user@example.com\" \"hunter2\""
        );
    }

    #[test]
    fn test_examine_command() {
        assert_eq!(examine("Sent Mail"), "EXAMINE \"Sent Mail\"");
    }

    /// Decodes a quoted string the way a conforming parser would: expects
    /// surrounding double quotes, treats a backslash as escaping the next
    /// character, and fails on an unescaped inner double quote.
    fn unquote(quoted: &str) -> Option<String> {
        let inner = quoted.strip_prefix('"')?.strip_suffix('"')?;
        let mut out = String::new();
        let mut chars = inner.chars();
        while let Some(c) = chars.next() {
            match c {
                '\\' => out.push(chars.next()?),
                '"' => return None,
                c => out.push(c),
            }
        }
        Some(out)
    }

    proptest! {
        #[test]
        fn prop_quote_round_trips(value in ".*") {
            let quoted = quote(&value);
            prop_assert_eq!(unquote(&quoted), Some(value));
        }

        #[test]
        fn prop_quote_is_single_token(value in "[a-z\\\\\"/ ]{0,20}") {
            let quoted = quote(&value);
            // Everything between the outer quotes is escaped such that no
            // unescaped quote can terminate the token early.
            let inner = &quoted[1..quoted.len() - 1];
            let mut escaped = false;
            for c in inner.chars() {
                if escaped {
                    escaped = false;
                } else if c == '\\' {
                    escaped = true;
                } else {
                    prop_assert_ne!(c, '"');
                }
            }
            prop_assert!(!escaped);
        }
    }
}
