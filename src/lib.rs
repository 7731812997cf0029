#![forbid(unsafe_code)]
//! mailprobe_lib: e-mail address verification by live SMTP probing.
//!
//! Each address goes through a syntax filter, an MX lookup and a `RCPT TO`
//! dialogue with the preferred mail exchange, and ends up as a [`Status`].
//! Outcomes are memoized in a TTL cache; [`BatchRunner`] fans a list out over
//! a bounded worker pool.

pub mod batch;
pub mod cache;
pub mod mx;
pub mod smtp;
pub mod syntax;
pub mod verifier;

pub use batch::{BatchError, BatchOptions, BatchRunner, CancellationToken, DEFAULT_WORKERS};
pub use cache::{CacheOptions, Clock, SystemClock, VerificationCache};
pub use mx::{DnsMxResolver, MxError, MxRecord, MxResolver};
pub use smtp::{
    DnsHostResolver, HostResolver, ProbeOptions, RecipientProber, SmtpError, SmtpProber, SmtpReply,
    SmtpStage,
};
pub use syntax::{is_valid_syntax, normalize_address};
pub use verifier::{Status, VerificationResult, Verifier, VerifierBuilder, VerifierOptions};
