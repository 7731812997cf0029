use std::io::{self, Write};
use std::path::Path;

use anyhow::{Context, Result};
use mailprobe_lib::VerificationResult;

use crate::args::OutputFormat;

pub fn write_report(
    results: &[VerificationResult],
    format: OutputFormat,
    out: Option<&Path>,
) -> Result<()> {
    let rendered = match format {
        OutputFormat::Human => render_human(results).into_bytes(),
        OutputFormat::Json => render_json(results)?,
        OutputFormat::Ndjson => render_ndjson(results)?,
        OutputFormat::Csv => render_csv(results)?,
    };
    match out {
        Some(path) => write_all_atomically(path, &rendered),
        None => {
            let mut stdout = io::stdout().lock();
            stdout.write_all(&rendered)?;
            stdout.flush()?;
            Ok(())
        }
    }
}

pub fn all_valid(results: &[VerificationResult]) -> bool {
    results.iter().all(|result| result.status.is_valid())
}

pub fn render_human(results: &[VerificationResult]) -> String {
    let mut out = String::new();
    for result in results {
        if result.status.is_valid() {
            out.push_str(&format!("[OK]    {}\n", result.address));
        } else {
            out.push_str(&format!("[FAIL]  {} :: {}\n", result.address, result.status));
        }
    }
    out
}

#[cfg(feature = "with-serde")]
pub fn render_json(results: &[VerificationResult]) -> Result<Vec<u8>> {
    let mut buf = serde_json::to_vec_pretty(results)?;
    buf.push(b'\n');
    Ok(buf)
}

#[cfg(not(feature = "with-serde"))]
pub fn render_json(_: &[VerificationResult]) -> Result<Vec<u8>> {
    anyhow::bail!("format=json requires the 'with-serde' feature")
}

#[cfg(feature = "with-serde")]
pub fn render_ndjson(results: &[VerificationResult]) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    for result in results {
        serde_json::to_writer(&mut buf, result)?;
        buf.push(b'\n');
    }
    Ok(buf)
}

#[cfg(not(feature = "with-serde"))]
pub fn render_ndjson(_: &[VerificationResult]) -> Result<Vec<u8>> {
    anyhow::bail!("format=ndjson requires the 'with-serde' feature")
}

#[cfg(feature = "with-csv")]
pub fn render_csv(results: &[VerificationResult]) -> Result<Vec<u8>> {
    let mut wtr = csv::Writer::from_writer(Vec::new());
    wtr.write_record(["email", "status"])?;
    for result in results {
        let status = result.status.to_string();
        wtr.write_record([result.address.as_str(), status.as_str()])?;
    }
    wtr.into_inner().context("flush CSV writer")
}

#[cfg(not(feature = "with-csv"))]
pub fn render_csv(_: &[VerificationResult]) -> Result<Vec<u8>> {
    anyhow::bail!("format=csv requires the 'with-csv' feature")
}

fn write_all_atomically(path: &Path, bytes: &[u8]) -> Result<()> {
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = std::path::PathBuf::from(tmp);
    {
        let mut f = std::fs::File::create(&tmp)
            .with_context(|| format!("create {}", tmp.display()))?;
        f.write_all(bytes)?;
        f.sync_all()?;
    }
    std::fs::rename(&tmp, path)
        .with_context(|| format!("rename {} -> {}", tmp.display(), path.display()))?;
    Ok(())
}
