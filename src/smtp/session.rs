use std::io::{self, BufRead, BufReader, Read, Write};
use std::net::{SocketAddr, TcpStream};
use std::time::{Duration, Instant};

use super::{HostResolver, SmtpError, SmtpReply};

const MAX_LINE_LEN: usize = 4096;
const MAX_REPLY_LINES: usize = 128;

/// Byte stream a session runs over; the timeout is re-armed before every
/// blocking operation with whatever is left of the session deadline.
pub(crate) trait Transport: Read + Write {
    fn set_io_timeout(&mut self, timeout: Duration) -> io::Result<()>;
}

impl Transport for TcpStream {
    fn set_io_timeout(&mut self, timeout: Duration) -> io::Result<()> {
        self.set_read_timeout(Some(timeout))?;
        self.set_write_timeout(Some(timeout))
    }
}

pub(crate) struct SmtpSession<T: Transport> {
    host: String,
    stream: BufReader<T>,
    deadline: Instant,
    timeout: Duration,
}

impl SmtpSession<TcpStream> {
    /// Resolve `host` through `hosts` and connect to the first address that
    /// answers before the deadline. Time spent resolving counts against it.
    pub(crate) fn connect(
        hosts: &dyn HostResolver,
        host: &str,
        port: u16,
        timeout: Duration,
    ) -> Result<Self, SmtpError> {
        let deadline = Instant::now() + timeout;
        let addrs: Vec<SocketAddr> = match hosts.resolve(host) {
            Ok(ips) => ips.into_iter().map(|ip| SocketAddr::new(ip, port)).collect(),
            Err(err) => return Err(SmtpError::from_resolve(host, err, timeout)),
        };
        if Instant::now() >= deadline {
            tracing::debug!(host, "deadline passed while resolving");
            return Err(SmtpError::Timeout(timeout));
        }
        if addrs.is_empty() {
            return Err(SmtpError::NoAddress {
                host: host.to_string(),
            });
        }

        let mut last_err = None;
        for addr in &addrs {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Err(SmtpError::Timeout(timeout));
            }
            match TcpStream::connect_timeout(addr, remaining) {
                Ok(stream) => {
                    tracing::debug!(host, %addr, "connected");
                    return Ok(Self::with_deadline(host, stream, deadline, timeout));
                }
                Err(err) => {
                    tracing::debug!(host, %addr, error = %err, "connect failed");
                    last_err = Some(err);
                }
            }
        }
        match last_err {
            Some(err) if matches!(err.kind(), io::ErrorKind::TimedOut) => {
                Err(SmtpError::Timeout(timeout))
            }
            Some(err) => Err(SmtpError::connect(host, err)),
            None => Err(SmtpError::NoAddress {
                host: host.to_string(),
            }),
        }
    }
}

impl<T: Transport> SmtpSession<T> {
    #[cfg(test)]
    pub(crate) fn new(host: &str, transport: T, timeout: Duration) -> Self {
        Self::with_deadline(host, transport, Instant::now() + timeout, timeout)
    }

    fn with_deadline(host: &str, transport: T, deadline: Instant, timeout: Duration) -> Self {
        Self {
            host: host.to_string(),
            stream: BufReader::new(transport),
            deadline,
            timeout,
        }
    }

    #[cfg(test)]
    pub(crate) fn into_transport(self) -> T {
        self.stream.into_inner()
    }

    /// Write `command` followed by CRLF and wait for the reply.
    pub(crate) fn send_command(&mut self, command: &str) -> Result<SmtpReply, SmtpError> {
        tracing::debug!(host = %self.host, "C: {command}");
        self.arm()?;
        write_line(self.stream.get_mut(), command)
            .map_err(|err| SmtpError::from_io(err, self.timeout))?;
        self.read_reply()
    }

    pub(crate) fn read_reply(&mut self) -> Result<SmtpReply, SmtpError> {
        let mut code = None;
        let mut lines = Vec::new();
        loop {
            let raw = self.read_line()?;
            let (parsed_code, last, text) = parse_reply_line(&raw)?;
            match code {
                Some(existing) if existing != parsed_code => {
                    return Err(SmtpError::Protocol(format!(
                        "inconsistent reply codes: {existing} vs {parsed_code}"
                    )));
                }
                Some(_) => {}
                None => code = Some(parsed_code),
            }
            lines.push(text);
            if last {
                break;
            }
            if lines.len() >= MAX_REPLY_LINES {
                return Err(SmtpError::Protocol("reply has too many lines".into()));
            }
        }
        let reply = SmtpReply {
            code: code.unwrap_or_default(),
            message: lines.join("\n"),
        };
        tracing::debug!(host = %self.host, code = reply.code, "S: {}", reply.message);
        Ok(reply)
    }

    pub(crate) fn quit(&mut self) -> Result<SmtpReply, SmtpError> {
        self.send_command("QUIT")
    }

    fn read_line(&mut self) -> Result<String, SmtpError> {
        let timeout = self.timeout;
        let mut line = Vec::new();
        loop {
            self.arm()?;
            let available = match self.stream.fill_buf() {
                Ok(buf) => buf,
                Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
                Err(err) => return Err(SmtpError::from_io(err, timeout)),
            };
            if available.is_empty() {
                return Err(SmtpError::Closed);
            }
            let (consumed, complete) = match available.iter().position(|byte| *byte == b'\n') {
                Some(pos) => {
                    line.extend_from_slice(&available[..=pos]);
                    (pos + 1, true)
                }
                None => {
                    line.extend_from_slice(available);
                    (available.len(), false)
                }
            };
            self.stream.consume(consumed);
            if complete {
                break;
            }
            if line.len() > MAX_LINE_LEN {
                return Err(SmtpError::Protocol("reply line too long".into()));
            }
        }

        while matches!(line.last(), Some(b'\n' | b'\r')) {
            line.pop();
        }
        String::from_utf8(line)
            .map_err(|err| SmtpError::Protocol(format!("reply is not valid UTF-8: {err}")))
    }

    /// Apply the remaining session budget to the transport, failing once the
    /// deadline has passed.
    fn arm(&mut self) -> Result<(), SmtpError> {
        let remaining = self.deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            return Err(SmtpError::Timeout(self.timeout));
        }
        let timeout = self.timeout;
        self.stream
            .get_mut()
            .set_io_timeout(remaining)
            .map_err(|err| SmtpError::from_io(err, timeout))
    }
}

fn write_line<W: Write>(writer: &mut W, command: &str) -> io::Result<()> {
    writer.write_all(command.as_bytes())?;
    writer.write_all(b"\r\n")?;
    writer.flush()
}

/// Split one reply line into `(code, is_last_line, text)`.
pub(crate) fn parse_reply_line(raw: &str) -> Result<(u16, bool, String), SmtpError> {
    let code_part = raw
        .get(..3)
        .filter(|part| part.bytes().all(|byte| byte.is_ascii_digit()))
        .ok_or_else(|| SmtpError::Protocol(format!("invalid SMTP reply: '{raw}'")))?;
    let code = code_part
        .parse::<u16>()
        .map_err(|_| SmtpError::Protocol(format!("invalid SMTP status code: '{code_part}'")))?;
    let continuation = raw.as_bytes().get(3) == Some(&b'-');
    let text = raw.get(4..).unwrap_or_default().to_string();
    Ok((code, !continuation, text))
}
