use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::fmt;
use std::time::Duration;
use tokio::process::Command;

// curl write-out template; every timing is reported in seconds and gets
// an explicit `s` suffix so the output stays self-describing.
const WRITE_OUT_FORMAT: &str = r#"{"http_code":"%{http_code}","time_connect":"%{time_connect}s","time_start_transfer":"%{time_starttransfer}s","time_total":"%{time_total}s","time_name_lookup":"%{time_namelookup}s"}"#;

#[derive(Deserialize)]
struct RawTiming {
    http_code: String,
    time_connect: String,
    time_start_transfer: String,
    time_total: String,
    time_name_lookup: String,
}

/// Timing breakdown of one HTTP request, as measured by curl.
#[derive(Debug)]
pub struct AccessTiming {
    pub http_code: String,
    /// DNS resolution time.
    pub name_lookup: Duration,
    /// TCP connection establishment.
    pub connect: Duration,
    /// Request sent until the first response byte arrived.
    pub start_transfer: Duration,
    pub total: Duration,
}

impl fmt::Display for AccessTiming {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "status {}  dns {}ms  connect {}ms  first byte {}ms  total {}ms",
            self.http_code,
            self.name_lookup.as_millis(),
            self.connect.as_millis(),
            self.start_transfer.as_millis(),
            self.total.as_millis()
        )
    }
}

/// Time a request against `url` by shelling out to curl. Redirects are
/// followed, the response body is discarded.
pub async fn trace(url: &str) -> Result<AccessTiming> {
    let output = Command::new("curl")
        .args(["-o", "/dev/null", "-w", WRITE_OUT_FORMAT, "-L", url])
        .output()
        .await
        .context("cannot run curl")?;

    if !output.status.success() {
        bail!(
            "curl exited with {}: {}",
            output.status,
            String::from_utf8_lossy(&output.stderr).trim()
        );
    }
    parse_timing(&output.stdout)
}

fn parse_timing(raw: &[u8]) -> Result<AccessTiming> {
    let raw: RawTiming =
        serde_json::from_slice(raw).context("unexpected curl write-out payload")?;
    Ok(AccessTiming {
        http_code: raw.http_code,
        name_lookup: parse_seconds(&raw.time_name_lookup)?,
        connect: parse_seconds(&raw.time_connect)?,
        start_transfer: parse_seconds(&raw.time_start_transfer)?,
        total: parse_seconds(&raw.time_total)?,
    })
}

fn parse_seconds(value: &str) -> Result<Duration> {
    let seconds = value.strip_suffix('s').unwrap_or(value);
    let seconds: f64 = seconds
        .parse()
        .with_context(|| format!("bad timing value '{value}'"))?;
    Ok(Duration::from_secs_f64(seconds))
}
