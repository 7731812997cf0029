use std::time::Duration;

/// Upper bound for one probe session, connect included.
pub const DEFAULT_SMTP_TIMEOUT: Duration = Duration::from_secs(10);

/// Envelope sender used for every probe. Never the address under test.
pub const DEFAULT_MAIL_FROM: &str = "verify@example.com";

/// Configuration knobs for [`SmtpProber`](super::SmtpProber).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeOptions {
    pub port: u16,
    /// Name announced in `EHLO`/`HELO`.
    pub helo_name: String,
    pub mail_from: String,
    /// Deadline for the whole session: host lookup, connect, every command and
    /// every reply.
    pub timeout: Duration,
}

impl Default for ProbeOptions {
    fn default() -> Self {
        Self {
            port: 25,
            helo_name: local_hostname(),
            mail_from: DEFAULT_MAIL_FROM.to_string(),
            timeout: DEFAULT_SMTP_TIMEOUT,
        }
    }
}

/// Hostname of this machine: `$HOSTNAME`, then `/etc/hostname`, then `localhost`.
pub fn local_hostname() -> String {
    std::env::var("HOSTNAME")
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
        .or_else(|| {
            std::fs::read_to_string("/etc/hostname")
                .ok()
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        })
        .unwrap_or_else(|| "localhost".to_string())
}
