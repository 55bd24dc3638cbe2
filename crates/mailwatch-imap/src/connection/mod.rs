//! Connection plumbing.
//!
//! - TLS/plaintext stream abstraction
//! - Line-oriented I/O for the CRLF-framed dialogue

mod line;
mod stream;

pub use line::LineStream;
pub use stream::{ImapStream, connect_plain, connect_tls, create_tls_connector};
