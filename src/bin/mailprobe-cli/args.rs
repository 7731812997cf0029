use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Result, bail};
use clap::{Args, Parser, Subcommand};
use mailprobe_lib::mx::DEFAULT_DNS_TIMEOUT;
use mailprobe_lib::smtp::{DEFAULT_MAIL_FROM, DEFAULT_SMTP_TIMEOUT, local_hostname};
use mailprobe_lib::{BatchOptions, CacheOptions, DEFAULT_WORKERS, ProbeOptions, VerifierOptions};

#[derive(Parser)]
#[command(name = "mailprobe-cli", version, about = "Verify e-mail addresses against their mail exchange")]
pub struct Cli {
    #[command(subcommand)]
    pub cmd: Commands,

    /// format: human|json|ndjson|csv
    #[arg(long, global = true, default_value = "human", env = "MAILPROBE_FORMAT")]
    pub format: String,

    /// write report to file instead of stdout
    #[arg(long, global = true, env = "MAILPROBE_OUT")]
    pub out: Option<PathBuf>,

    /// concurrent verifications in batch mode
    #[arg(long, global = true, default_value_t = DEFAULT_WORKERS, env = "MAILPROBE_WORKERS")]
    pub workers: usize,

    /// SMTP port of the mail exchange
    #[arg(long, global = true, default_value_t = 25, env = "MAILPROBE_PORT")]
    pub port: u16,

    /// name announced in EHLO/HELO (defaults to the local hostname)
    #[arg(long, global = true, env = "MAILPROBE_HELO")]
    pub helo: Option<String>,

    /// envelope sender for MAIL FROM
    #[arg(long = "mail-from", global = true, default_value = DEFAULT_MAIL_FROM, env = "MAILPROBE_MAIL_FROM")]
    pub mail_from: String,

    /// MX query timeout (seconds)
    #[arg(long = "dns-timeout", global = true, default_value_t = DEFAULT_DNS_TIMEOUT.as_secs(), env = "MAILPROBE_DNS_TIMEOUT")]
    pub dns_timeout: u64,

    /// SMTP session timeout (seconds)
    #[arg(long = "smtp-timeout", global = true, default_value_t = DEFAULT_SMTP_TIMEOUT.as_secs(), env = "MAILPROBE_SMTP_TIMEOUT")]
    pub smtp_timeout: u64,

    /// lifetime of conclusive cached results (seconds)
    #[arg(long = "cache-ttl", global = true, default_value_t = CacheOptions::default().ttl.as_secs(), env = "MAILPROBE_CACHE_TTL")]
    pub cache_ttl: u64,

    /// lifetime of cached probe failures (seconds)
    #[arg(long = "error-ttl", global = true, default_value_t = CacheOptions::default().error_ttl.as_secs(), env = "MAILPROBE_ERROR_TTL")]
    pub error_ttl: u64,

    /// tracing filter, e.g. `info` or `mailprobe_lib=debug` (falls back to RUST_LOG, then `warn`)
    #[arg(long = "log-level", global = true, env = "MAILPROBE_LOG_LEVEL")]
    pub log_level: Option<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// verify a single address
    Verify { email: String },
    /// verify a list of addresses
    Batch(BatchSource),
}

#[derive(Args)]
pub struct BatchSource {
    /// read one address per line from stdin (the default)
    #[arg(long, conflicts_with = "file")]
    pub stdin: bool,

    /// read addresses from the first column of a CSV file
    #[arg(long)]
    pub file: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Human,
    Json,
    Ndjson,
    Csv,
}

impl Cli {
    pub fn parse() -> Self {
        <Self as Parser>::parse()
    }

    pub fn output_format(&self) -> Result<OutputFormat> {
        format_from_str(&self.format)
    }

    pub fn verifier_options(&self) -> VerifierOptions {
        VerifierOptions {
            dns_timeout: Duration::from_secs(self.dns_timeout),
            probe: ProbeOptions {
                port: self.port,
                helo_name: self.helo.clone().unwrap_or_else(local_hostname),
                mail_from: self.mail_from.clone(),
                timeout: Duration::from_secs(self.smtp_timeout),
            },
            cache: CacheOptions {
                ttl: Duration::from_secs(self.cache_ttl),
                error_ttl: Duration::from_secs(self.error_ttl),
                ..CacheOptions::default()
            },
        }
    }

    pub fn batch_options(&self) -> BatchOptions {
        BatchOptions {
            workers: self.workers,
        }
    }
}

pub fn format_from_str(s: &str) -> Result<OutputFormat> {
    match s {
        "human" => Ok(OutputFormat::Human),
        "json" => Ok(OutputFormat::Json),
        "ndjson" => Ok(OutputFormat::Ndjson),
        "csv" => Ok(OutputFormat::Csv),
        other => bail!("unknown --format '{other}', use: human|json|ndjson|csv"),
    }
}
