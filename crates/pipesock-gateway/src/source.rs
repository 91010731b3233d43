//! Event source: turns a byte stream (stdin in production) into hub events.

use std::time::Duration;

use pipesock_hub::Hub;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{debug, info, warn};

const READ_RETRY_BASE: Duration = Duration::from_millis(10);
const READ_RETRY_MAX: Duration = Duration::from_secs(1);

/// Counters reported when the source ends.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SourceStats {
    pub forwarded: u64,
    pub skipped: u64,
}

/// Read `reader` line by line and submit every non-empty line to the hub.
///
/// Lines are stripped of their terminator. When `echo` is set each line is
/// also written there (pass-through mode). Undecodable lines are logged and
/// skipped. Read errors are logged and reading resumes after a backoff that
/// doubles with each consecutive failure. Returns at end of input or when the
/// hub is gone.
pub async fn run<R, W>(mut reader: R, mut echo: Option<W>, hub: Hub) -> SourceStats
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut stats = SourceStats::default();
    let mut buf = Vec::new();
    let mut read_errors = 0u32;

    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf).await {
            Ok(0) => {
                info!(forwarded = stats.forwarded, "input closed");
                break;
            }
            Ok(_) => read_errors = 0,
            Err(e) => {
                read_errors += 1;
                let delay = read_retry_delay(read_errors);
                warn!(
                    error = %e,
                    attempt = read_errors,
                    retry_in_ms = delay.as_millis() as u64,
                    "read line error"
                );
                tokio::time::sleep(delay).await;
                continue;
            }
        }

        let line = match std::str::from_utf8(trim_line_end(&buf)) {
            Ok(line) => line,
            Err(e) => {
                stats.skipped += 1;
                warn!(error = %e, "skipping line that is not valid UTF-8");
                continue;
            }
        };
        if line.is_empty() {
            continue;
        }

        if let Some(out) = echo.as_mut() {
            let written = async {
                out.write_all(line.as_bytes()).await?;
                out.write_all(b"\n").await?;
                out.flush().await
            }
            .await;
            if let Err(e) = written {
                warn!(error = %e, "pass-through write failed, disabling echo");
                echo = None;
            }
        }

        if let Err(e) = hub.submit_wait(line).await {
            debug!(code = e.code(), "hub closed, stopping input");
            break;
        }
        stats.forwarded += 1;
    }

    stats
}

/// Backoff before the next read after `attempt` consecutive failures.
fn read_retry_delay(attempt: u32) -> Duration {
    let factor = 1u32 << attempt.saturating_sub(1).min(16);
    READ_RETRY_BASE.saturating_mul(factor).min(READ_RETRY_MAX)
}

fn trim_line_end(line: &[u8]) -> &[u8] {
    let line = line.strip_suffix(b"\n").unwrap_or(line);
    line.strip_suffix(b"\r").unwrap_or(line)
}
