//! Plain-text SMTP recipient probing.
//!
//! [`SmtpProber`] opens one connection to a mail exchange, walks it through
//! greeting, `EHLO`/`HELO`, `MAIL FROM` and `RCPT TO`, reports the `RCPT TO`
//! reply code and quits. No message data is ever sent and STARTTLS is never
//! negotiated.

mod error;
mod hosts;
mod options;
mod probe;
mod session;
mod types;

pub use error::{SmtpError, SmtpStage};
pub use hosts::{DnsHostResolver, HostResolver};
pub use options::{DEFAULT_MAIL_FROM, DEFAULT_SMTP_TIMEOUT, ProbeOptions, local_hostname};
pub use probe::{RecipientProber, SmtpProber};
pub use types::SmtpReply;

#[cfg(test)]
mod tests;
