use std::fmt;
use std::io;
use std::time::Duration;

use thiserror::Error;
use trust_dns_resolver::error::{ResolveError, ResolveErrorKind};

use super::SmtpReply;

/// Point of the dialogue at which a reply was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SmtpStage {
    Greeting,
    Helo,
    MailFrom,
}

impl fmt::Display for SmtpStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Greeting => "greeting",
            Self::Helo => "HELO",
            Self::MailFrom => "MAIL FROM",
        })
    }
}

#[derive(Debug, Error)]
pub enum SmtpError {
    #[error("could not resolve {host}: {source}")]
    Resolve {
        host: String,
        #[source]
        source: ResolveError,
    },
    #[error("no socket address available for {host}")]
    NoAddress { host: String },
    #[error("connection to {host} failed: {source}")]
    Connect {
        host: String,
        #[source]
        source: io::Error,
    },
    #[error("session timed out after {0:?}")]
    Timeout(Duration),
    #[error("connection closed by server")]
    Closed,
    #[error("I/O error: {source}")]
    Io {
        #[source]
        source: io::Error,
    },
    #[error("protocol error: {0}")]
    Protocol(String),
    #[error("{stage} rejected with {code}: {message}")]
    Rejected {
        stage: SmtpStage,
        code: u16,
        message: String,
    },
}

impl SmtpError {
    pub(crate) fn connect(host: impl Into<String>, source: io::Error) -> Self {
        Self::Connect {
            host: host.into(),
            source,
        }
    }

    pub(crate) fn rejected(stage: SmtpStage, reply: &SmtpReply) -> Self {
        Self::Rejected {
            stage,
            code: reply.code,
            message: reply.message.clone(),
        }
    }

    /// Address lookup failures: resolver timeouts become [`SmtpError::Timeout`],
    /// empty answers [`SmtpError::NoAddress`].
    pub(crate) fn from_resolve(host: &str, source: ResolveError, timeout: Duration) -> Self {
        if matches!(source.kind(), ResolveErrorKind::Timeout) {
            return Self::Timeout(timeout);
        }
        if matches!(source.kind(), ResolveErrorKind::NoRecordsFound { .. }) {
            return Self::NoAddress {
                host: host.to_string(),
            };
        }
        Self::Resolve {
            host: host.to_string(),
            source,
        }
    }

    /// Fold socket timeouts into [`SmtpError::Timeout`].
    pub(crate) fn from_io(source: io::Error, timeout: Duration) -> Self {
        match source.kind() {
            io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut => Self::Timeout(timeout),
            io::ErrorKind::UnexpectedEof => Self::Closed,
            _ => Self::Io { source },
        }
    }
}
