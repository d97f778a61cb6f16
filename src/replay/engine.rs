//! Line pacing and transmission

use super::timestamp::{StampedLine, TimestampFormat, TimestampMatcher};
use crate::capture::Capture;
use crate::dataplane::Connection;
use crate::telemetry::Metrics;
use crate::{Error, Result};
use chrono::{DateTime, FixedOffset, Local};
use std::io::Write;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tracing::{debug, trace, warn};

/// How a run treats its input
#[derive(Debug, Clone, Copy, Default)]
pub struct ReplayOptions {
    pub format: TimestampFormat,
    /// Replace each line's timestamp with the current time
    pub convert: bool,
    /// Input comes from a terminal: no pacing and no echo
    pub interactive: bool,
}

/// Replays timestamped lines onto a connection
pub struct Replayer {
    options: ReplayOptions,
    matcher: TimestampMatcher,
    metrics: Arc<Metrics>,
}

impl Replayer {
    pub fn new(options: ReplayOptions, metrics: Arc<Metrics>) -> Result<Self> {
        Ok(Self {
            matcher: TimestampMatcher::new(options.format)?,
            options,
            metrics,
        })
    }

    /// Send every line of `input` until end of input.
    ///
    /// Piped input is paced by the gaps between consecutive timestamps and
    /// each sent line is echoed to `echo`. Per-line failures are logged and
    /// skipped; only input or echo I/O errors end the run early.
    pub async fn run<R, W, D>(
        &self,
        input: R,
        echo: &mut W,
        conn: &mut Connection<D>,
    ) -> Result<()>
    where
        R: AsyncRead + Unpin,
        W: Write,
        D: Capture,
    {
        let mut reader = BufReader::new(input);
        let mut buf = Vec::new();
        let mut previous: Option<DateTime<FixedOffset>> = None;

        loop {
            buf.clear();
            if reader.read_until(b'\n', &mut buf).await? == 0 {
                break;
            }
            self.metrics.lines_read.inc();
            let line = decode_line(&buf);

            let stamped = match self.matcher.extract(&line) {
                Ok(stamped) => stamped,
                Err(e) => {
                    warn!(error = %e, line = %line, "skipping line");
                    self.metrics.lines_skipped.inc();
                    continue;
                }
            };

            if !self.options.interactive {
                if let Some(prev) = previous {
                    self.pace(prev, stamped.instant).await;
                }
            }
            previous = Some(stamped.instant);

            let text = self.render(&stamped);
            let mut payload = Vec::with_capacity(text.len() + 1);
            payload.extend_from_slice(text.as_bytes());
            payload.push(b'\n');

            match conn.send(&payload).await {
                Ok(bytes) => {
                    trace!(bytes, "line sent");
                    self.metrics.record_tx(bytes);
                }
                Err(e @ Error::PayloadTooLarge { .. }) => {
                    warn!(error = %e, "skipping line");
                    self.metrics.lines_skipped.inc();
                    continue;
                }
                Err(e) => {
                    warn!(error = %e, "failed to send line");
                    self.metrics.tx_errors.inc();
                }
            }

            if !self.options.interactive {
                writeln!(echo, "{}", text)?;
                echo.flush()?;
            }
        }

        debug!("end of input");
        Ok(())
    }

    async fn pace(&self, previous: DateTime<FixedOffset>, current: DateTime<FixedOffset>) {
        // negative gaps (clock steps, unordered input) convert to Err
        if let Ok(delay) = (current - previous).to_std() {
            if !delay.is_zero() {
                trace!(?delay, "pacing");
                tokio::time::sleep(delay).await;
            }
        }
    }

    fn render(&self, stamped: &StampedLine) -> String {
        if self.options.convert {
            stamped.rewrite(&self.options.format.format(&Local::now()))
        } else {
            stamped.line.clone()
        }
    }
}

/// Strip the line terminator and repair invalid UTF-8
fn decode_line(buf: &[u8]) -> String {
    let line = buf.strip_suffix(b"\n").unwrap_or(buf);
    let line = line.strip_suffix(b"\r").unwrap_or(line);
    String::from_utf8_lossy(line).into_owned()
}
