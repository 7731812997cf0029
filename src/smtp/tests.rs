use std::io::{self, BufRead, BufReader, Cursor, Read, Write};
use std::net::{IpAddr, Ipv4Addr, TcpListener, TcpStream};
use std::sync::Arc;
use std::sync::mpsc;
use std::thread;
use std::time::{Duration, Instant};

use trust_dns_resolver::error::{ResolveError, ResolveErrorKind};

use super::probe::run_probe;
use super::session::{SmtpSession, Transport, parse_reply_line};
use super::{HostResolver, ProbeOptions, RecipientProber, SmtpError, SmtpProber, SmtpStage};

/// Host lookup answering from a closure, optionally after a pause.
struct StubHosts {
    delay: Duration,
    answer: Box<dyn Fn(&str) -> Result<Vec<IpAddr>, ResolveError> + Send + Sync>,
}

impl StubHosts {
    fn new<F>(answer: F) -> Self
    where
        F: Fn(&str) -> Result<Vec<IpAddr>, ResolveError> + Send + Sync + 'static,
    {
        Self {
            delay: Duration::ZERO,
            answer: Box::new(answer),
        }
    }

    fn loopback() -> Self {
        Self::new(|_| Ok(vec![IpAddr::V4(Ipv4Addr::LOCALHOST)]))
    }

    fn slow(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

impl HostResolver for StubHosts {
    fn resolve(&self, host: &str) -> Result<Vec<IpAddr>, ResolveError> {
        if !self.delay.is_zero() {
            thread::sleep(self.delay);
        }
        (self.answer)(host)
    }
}

fn prober_with(hosts: StubHosts, options: ProbeOptions) -> SmtpProber {
    SmtpProber::new(options, Arc::new(hosts))
}

/// Replays canned server output and records what the client wrote.
struct ScriptedTransport {
    input: Cursor<Vec<u8>>,
    written: Vec<u8>,
}

impl ScriptedTransport {
    fn new(server_output: &str) -> Self {
        Self {
            input: Cursor::new(server_output.as_bytes().to_vec()),
            written: Vec::new(),
        }
    }

    fn commands(&self) -> Vec<String> {
        String::from_utf8_lossy(&self.written)
            .split("\r\n")
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect()
    }
}

impl Read for ScriptedTransport {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.input.read(buf)
    }
}

impl Write for ScriptedTransport {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.written.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Transport for ScriptedTransport {
    fn set_io_timeout(&mut self, _timeout: Duration) -> io::Result<()> {
        Ok(())
    }
}

fn options() -> ProbeOptions {
    ProbeOptions {
        port: 25,
        helo_name: "probe.test".to_string(),
        mail_from: "verify@example.com".to_string(),
        timeout: Duration::from_secs(10),
    }
}

fn run_script(server_output: &str) -> (Result<u16, SmtpError>, Vec<String>) {
    let mut session = SmtpSession::new(
        "mx.example.com",
        ScriptedTransport::new(server_output),
        Duration::from_secs(10),
    );
    let outcome = run_probe(&mut session, &options(), "user@example.com");
    (outcome, session.into_transport().commands())
}

#[test]
fn full_dialogue_returns_rcpt_code() {
    let (outcome, commands) = run_script(
        "220 mx.example.com ESMTP\r\n\
         250-mx.example.com\r\n250-PIPELINING\r\n250 STARTTLS\r\n\
         250 2.1.0 Ok\r\n\
         250 2.1.5 Ok\r\n\
         221 2.0.0 Bye\r\n",
    );
    assert_eq!(outcome.expect("probe succeeds"), 250);
    assert_eq!(
        commands,
        vec![
            "EHLO probe.test",
            "MAIL FROM:<verify@example.com>",
            "RCPT TO:<user@example.com>",
            "QUIT",
        ]
    );
}

#[test]
fn rejected_recipient_code_is_reported() {
    let (outcome, _) = run_script(
        "220 ready\r\n250 hello\r\n250 ok\r\n550 5.1.1 User unknown\r\n221 bye\r\n",
    );
    assert_eq!(outcome.expect("probe succeeds"), 550);
}

#[test]
fn greylisting_code_is_reported() {
    let (outcome, _) = run_script(
        "220 ready\r\n250 hello\r\n250 ok\r\n451 4.7.1 Try again later\r\n221 bye\r\n",
    );
    assert_eq!(outcome.expect("probe succeeds"), 451);
}

#[test]
fn ehlo_rejection_falls_back_to_helo() {
    let (outcome, commands) = run_script(
        "220 ready\r\n502 command not implemented\r\n250 hello\r\n250 ok\r\n250 ok\r\n221 bye\r\n",
    );
    assert_eq!(outcome.expect("probe succeeds"), 250);
    assert_eq!(commands[0], "EHLO probe.test");
    assert_eq!(commands[1], "HELO probe.test");
}

#[test]
fn non_220_greeting_is_an_error() {
    let (outcome, commands) = run_script("554 no SMTP service here\r\n");
    match outcome {
        Err(SmtpError::Rejected { stage, code, .. }) => {
            assert_eq!(stage, SmtpStage::Greeting);
            assert_eq!(code, 554);
        }
        other => panic!("expected greeting rejection, got {other:?}"),
    }
    assert_eq!(commands, vec!["QUIT"]);
}

#[test]
fn starttls_demand_surfaces_as_mail_from_rejection() {
    let (outcome, commands) = run_script(
        "220 ready\r\n250 hello\r\n530 5.7.0 Must issue a STARTTLS command first\r\n221 bye\r\n",
    );
    match outcome {
        Err(SmtpError::Rejected { stage, code, .. }) => {
            assert_eq!(stage, SmtpStage::MailFrom);
            assert_eq!(code, 530);
        }
        other => panic!("expected MAIL FROM rejection, got {other:?}"),
    }
    assert!(!commands.iter().any(|cmd| cmd.starts_with("RCPT")));
    assert!(!commands.iter().any(|cmd| cmd.starts_with("STARTTLS")));
}

#[test]
fn connection_closed_mid_dialogue_is_an_error() {
    let (outcome, _) = run_script("220 ready\r\n250 hello\r\n");
    assert!(matches!(outcome, Err(SmtpError::Closed)));
}

#[test]
fn quit_failure_does_not_mask_result() {
    // Server hangs up right after answering RCPT TO.
    let (outcome, commands) = run_script("220 ready\r\n250 hello\r\n250 ok\r\n250 ok\r\n");
    assert_eq!(outcome.expect("RCPT code survives"), 250);
    assert_eq!(commands.last().map(String::as_str), Some("QUIT"));
}

#[test]
fn expired_deadline_is_a_timeout() {
    let mut session = SmtpSession::new(
        "mx.example.com",
        ScriptedTransport::new("220 ready\r\n"),
        Duration::ZERO,
    );
    let outcome = run_probe(&mut session, &options(), "user@example.com");
    assert!(matches!(outcome, Err(SmtpError::Timeout(_))));
}

#[test]
fn inconsistent_multiline_codes_are_rejected() {
    let (outcome, _) = run_script("220-first\r\n250 second\r\n");
    assert!(matches!(outcome, Err(SmtpError::Protocol(_))));
}

#[test]
fn garbage_reply_is_a_protocol_error() {
    let (outcome, _) = run_script("hello there\r\n");
    assert!(matches!(outcome, Err(SmtpError::Protocol(_))));
}

#[test]
fn parse_reply_line_splits_code_and_text() {
    let (code, last, text) = parse_reply_line("250-PIPELINING").expect("valid line");
    assert_eq!((code, last, text.as_str()), (250, false, "PIPELINING"));

    let (code, last, text) = parse_reply_line("221").expect("bare code");
    assert_eq!((code, last, text.as_str()), (221, true, ""));

    assert!(parse_reply_line("2é0 nope").is_err());
}

#[test]
fn ehlo_transient_failure_does_not_fall_back() {
    let (outcome, commands) = run_script("220 ready\r\n421 4.3.2 busy\r\n221 bye\r\n");
    match outcome {
        Err(SmtpError::Rejected { stage, code, .. }) => {
            assert_eq!(stage, SmtpStage::Helo);
            assert_eq!(code, 421);
        }
        other => panic!("expected EHLO rejection, got {other:?}"),
    }
    assert!(!commands.iter().any(|cmd| cmd.starts_with("HELO")));
}

#[test]
fn slow_host_lookup_counts_against_the_deadline() {
    let prober = prober_with(
        StubHosts::loopback().slow(Duration::from_millis(200)),
        ProbeOptions {
            timeout: Duration::from_millis(50),
            ..options()
        },
    );
    let started = Instant::now();
    let err = prober
        .probe("mx.example.com", "user@example.com")
        .expect_err("lookup outlives the session budget");
    assert!(matches!(err, SmtpError::Timeout(_)), "{err:?}");
    assert!(started.elapsed() < Duration::from_secs(2));
}

#[test]
fn host_lookup_timeout_is_a_timeout() {
    let prober = prober_with(
        StubHosts::new(|_| Err(ResolveError::from(ResolveErrorKind::Timeout))),
        options(),
    );
    let err = prober
        .probe("mx.example.com", "user@example.com")
        .expect_err("lookup timed out");
    assert!(matches!(err, SmtpError::Timeout(_)));
}

#[test]
fn empty_host_answer_is_no_address() {
    let prober = prober_with(StubHosts::new(|_| Ok(Vec::new())), options());
    let err = prober
        .probe("mx.example.com", "user@example.com")
        .expect_err("nothing to connect to");
    assert!(matches!(err, SmtpError::NoAddress { ref host } if host == "mx.example.com"));
}

#[test]
fn failed_host_lookup_is_a_resolve_error() {
    let prober = prober_with(
        StubHosts::new(|_| Err(ResolveError::from("SERVFAIL"))),
        options(),
    );
    let err = prober
        .probe("nonexistent.invalid", "user@example.com")
        .expect_err("should not resolve");
    assert!(matches!(err, SmtpError::Resolve { .. }));
}

fn spawn_mock_server(script: Vec<(&'static str, &'static str)>) -> (u16, thread::JoinHandle<()>) {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind mock server");
    let port = listener.local_addr().expect("addr").port();
    let (ready_tx, ready_rx) = mpsc::channel();
    let handle = thread::spawn(move || {
        ready_tx.send(()).ok();
        if let Ok((mut stream, _)) = listener.accept() {
            let _ = handle_session(&mut stream, script);
        }
    });
    ready_rx.recv().expect("server ready");
    (port, handle)
}

fn handle_session(
    stream: &mut TcpStream,
    script: Vec<(&'static str, &'static str)>,
) -> io::Result<()> {
    let mut reader = BufReader::new(stream.try_clone()?);
    stream.write_all(b"220 mock.smtp.test ESMTP\r\n")?;
    stream.flush()?;
    for (expected, response) in script {
        let mut line = String::new();
        reader.read_line(&mut line)?;
        assert!(
            line.starts_with(expected),
            "expected command starting with '{expected}', got '{line}'"
        );
        stream.write_all(response.as_bytes())?;
        stream.flush()?;
    }
    Ok(())
}

#[test]
#[ignore = "requires loopback TCP binding"]
fn probes_over_tcp() {
    let (port, handle) = spawn_mock_server(vec![
        ("EHLO", "250-mock.example\r\n250 SIZE 1000000\r\n"),
        ("MAIL FROM:", "250 2.1.0 Ok\r\n"),
        ("RCPT TO:", "251 2.1.5 User not local; will forward\r\n"),
        ("QUIT", "221 2.0.0 Bye\r\n"),
    ]);
    let prober = prober_with(StubHosts::loopback(), ProbeOptions { port, ..options() });
    let code = prober
        .probe("127.0.0.1", "user@example.com")
        .expect("probe succeeds");
    assert_eq!(code, 251);
    handle.join().expect("server thread");
}

#[test]
#[ignore = "requires loopback TCP binding"]
fn refused_connection_is_an_error() {
    let port = {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
        listener.local_addr().expect("addr").port()
    };
    let prober = prober_with(StubHosts::loopback(), ProbeOptions { port, ..options() });
    let err = prober
        .probe("127.0.0.1", "user@example.com")
        .expect_err("nothing listens");
    assert!(matches!(err, SmtpError::Connect { .. }));
}
