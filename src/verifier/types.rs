use std::fmt;

/// Terminal classification of one verification.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Status {
    /// The mail exchange accepted `RCPT TO` with 250 or 251.
    ///
    /// This is an upper bound: catch-all domains accept every recipient, so a
    /// `Valid` address may still bounce.
    Valid,
    /// `RCPT TO` was answered with 550.
    MailboxNotFound,
    /// The input does not have the `local@domain.tld` shape.
    InvalidSyntax,
    /// No usable MX record (NXDOMAIN, empty answer, timeout, bad domain).
    NoMailExchange,
    /// `RCPT TO` was answered with a code other than 250/251/550.
    UnknownCode(u16),
    /// Connection or protocol failure before a `RCPT TO` reply was read.
    SmtpError(String),
    /// The batch was cancelled before this address was started.
    Cancelled,
}

impl Status {
    /// Outcomes that reflect a definite answer rather than a failed probe.
    pub fn is_conclusive(&self) -> bool {
        matches!(self, Self::Valid | Self::MailboxNotFound | Self::InvalidSyntax)
    }

    pub fn is_valid(&self) -> bool {
        matches!(self, Self::Valid)
    }

    /// Map a `RCPT TO` reply code onto a status.
    pub fn from_rcpt_code(code: u16) -> Self {
        match code {
            250 | 251 => Self::Valid,
            550 => Self::MailboxNotFound,
            other => Self::UnknownCode(other),
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Valid => f.write_str("Valid"),
            Self::MailboxNotFound => f.write_str("Mailbox Not Found"),
            Self::InvalidSyntax => f.write_str("Invalid Syntax"),
            Self::NoMailExchange => f.write_str("No MX Records"),
            Self::UnknownCode(code) => write!(f, "Unknown ({code})"),
            Self::SmtpError(detail) => write!(f, "SMTP Error: {detail}"),
            Self::Cancelled => f.write_str("Cancelled"),
        }
    }
}

#[cfg(feature = "with-serde")]
impl serde::Serialize for Status {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.collect_str(self)
    }
}

/// Address (normalized) paired with its status.
#[cfg_attr(feature = "with-serde", derive(serde::Serialize))]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerificationResult {
    #[cfg_attr(feature = "with-serde", serde(rename = "email"))]
    pub address: String,
    pub status: Status,
}

impl VerificationResult {
    pub fn new(address: impl Into<String>, status: Status) -> Self {
        Self {
            address: address.into(),
            status,
        }
    }
}
