use std::sync::Arc;

use super::session::{SmtpSession, Transport};
use super::{HostResolver, ProbeOptions, SmtpError, SmtpStage};

/// Asks a mail exchange whether it would accept a recipient.
pub trait RecipientProber: Send + Sync {
    /// Reply code to `RCPT TO:<recipient>` on `exchange`.
    fn probe(&self, exchange: &str, recipient: &str) -> Result<u16, SmtpError>;
}

/// [`RecipientProber`] speaking plain-text SMTP over TCP.
#[derive(Clone)]
pub struct SmtpProber {
    options: ProbeOptions,
    hosts: Arc<dyn HostResolver>,
}

impl std::fmt::Debug for SmtpProber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SmtpProber")
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl SmtpProber {
    pub fn new(options: ProbeOptions, hosts: Arc<dyn HostResolver>) -> Self {
        Self { options, hosts }
    }

    pub fn options(&self) -> &ProbeOptions {
        &self.options
    }
}

impl RecipientProber for SmtpProber {
    fn probe(&self, exchange: &str, recipient: &str) -> Result<u16, SmtpError> {
        let mut session = SmtpSession::connect(
            self.hosts.as_ref(),
            exchange,
            self.options.port,
            self.options.timeout,
        )?;
        run_probe(&mut session, &self.options, recipient)
    }
}

/// Run the dialogue and always attempt `QUIT`; a failed `QUIT` never
/// replaces the outcome already obtained.
pub(crate) fn run_probe<T: Transport>(
    session: &mut SmtpSession<T>,
    options: &ProbeOptions,
    recipient: &str,
) -> Result<u16, SmtpError> {
    let outcome = rcpt_dialogue(session, options, recipient);
    if let Err(err) = session.quit() {
        tracing::debug!(error = %err, "QUIT failed");
    }
    outcome
}

fn rcpt_dialogue<T: Transport>(
    session: &mut SmtpSession<T>,
    options: &ProbeOptions,
    recipient: &str,
) -> Result<u16, SmtpError> {
    let greeting = session.read_reply()?;
    if greeting.code != 220 {
        return Err(SmtpError::rejected(SmtpStage::Greeting, &greeting));
    }

    let ehlo = session.send_command(&format!("EHLO {}", options.helo_name))?;
    if ehlo.is_transient_failure() {
        return Err(SmtpError::rejected(SmtpStage::Helo, &ehlo));
    }
    if ehlo.is_permanent_failure() {
        // Servers predating ESMTP answer 500/502 to EHLO.
        let helo = session.send_command(&format!("HELO {}", options.helo_name))?;
        if !helo.is_positive_completion() {
            return Err(SmtpError::rejected(SmtpStage::Helo, &helo));
        }
    } else if !ehlo.is_positive_completion() {
        return Err(SmtpError::rejected(SmtpStage::Helo, &ehlo));
    }

    let mail = session.send_command(&format!("MAIL FROM:<{}>", options.mail_from))?;
    if !mail.is_positive_completion() {
        return Err(SmtpError::rejected(SmtpStage::MailFrom, &mail));
    }

    let rcpt = session.send_command(&format!("RCPT TO:<{recipient}>"))?;
    Ok(rcpt.code)
}
