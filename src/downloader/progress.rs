//! Progress tracking for transfers
//!
//! [`TransferState`] holds the live counters of the one active transfer.
//! [`estimate`] turns those counters into a percentage and an ETA; it is a
//! pure function of its inputs so presentation code can call it on whatever
//! schedule it likes.

use std::fmt;
use std::time::{Duration, Instant};

/// Lifecycle of a transfer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransferPhase {
    #[default]
    Idle,
    /// Request sent, the service is still converting
    AwaitingServer,
    Streaming,
    Completed,
    Cancelled,
    Failed,
}

impl TransferPhase {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TransferPhase::Completed | TransferPhase::Cancelled | TransferPhase::Failed
        )
    }

    pub fn is_active(&self) -> bool {
        matches!(self, TransferPhase::AwaitingServer | TransferPhase::Streaming)
    }
}

/// Live state of a transfer
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TransferState {
    pub phase: TransferPhase,
    pub bytes_received: u64,
    /// Declared size, 0 when unknown
    pub total_bytes: u64,
    /// Set on the first received byte, never during server processing
    pub started_at: Option<Instant>,
    /// Present only when `phase` is `Failed`
    pub error: Option<String>,
}

impl TransferState {
    /// Fresh state for a transfer that has just been issued
    pub fn begin(&mut self) {
        *self = Self {
            phase: TransferPhase::AwaitingServer,
            ..Default::default()
        };
    }

    /// Server answered; the total size is fixed from here on.
    pub fn start_streaming(&mut self, total_bytes: u64) {
        if self.phase != TransferPhase::AwaitingServer {
            return;
        }
        self.phase = TransferPhase::Streaming;
        self.total_bytes = total_bytes;
    }

    /// Record a new cumulative byte count. Lower counts are ignored.
    pub fn record_bytes(&mut self, cumulative: u64, now: Instant) {
        if self.phase != TransferPhase::Streaming {
            return;
        }
        self.bytes_received = self.bytes_received.max(cumulative);
        if self.started_at.is_none() && self.bytes_received > 0 {
            self.started_at = Some(now);
        }
    }

    pub fn complete(&mut self) {
        self.finish(TransferPhase::Completed, None);
    }

    pub fn cancel(&mut self) {
        self.finish(TransferPhase::Cancelled, None);
    }

    pub fn fail(&mut self, error: String) {
        self.finish(TransferPhase::Failed, Some(error));
    }

    /// Terminal back to `Idle`. Returns `false` and leaves an active or
    /// idle state untouched.
    pub fn reset(&mut self) -> bool {
        if !self.phase.is_terminal() {
            return false;
        }
        *self = Self::default();
        true
    }

    fn finish(&mut self, phase: TransferPhase, error: Option<String>) {
        self.phase = phase;
        self.bytes_received = 0;
        self.total_bytes = 0;
        self.started_at = None;
        self.error = error;
    }

    pub fn estimate(&self, now: Instant) -> Estimate {
        estimate(self.bytes_received, self.total_bytes, self.started_at, now)
    }

    /// Point-in-time view for presentation code
    pub fn snapshot(&self, now: Instant) -> ProgressSnapshot {
        let Estimate { percentage, eta } = self.estimate(now);
        ProgressSnapshot {
            phase: self.phase,
            bytes_received: self.bytes_received,
            total_bytes: self.total_bytes,
            percentage,
            eta,
            error: self.error.clone(),
        }
    }
}

/// Estimated time remaining
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum Eta {
    /// Not enough information yet
    #[default]
    Pending,
    Remaining(Duration),
}

impl fmt::Display for Eta {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Eta::Pending => f.write_str("--:--"),
            Eta::Remaining(remaining) => {
                let secs = remaining.as_secs_f64();
                if secs < 60.0 {
                    write!(f, "{}s", secs.ceil() as u64)
                } else {
                    write!(f, "{}m", (secs / 60.0).ceil() as u64)
                }
            }
        }
    }
}

/// Output of [`estimate`]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Estimate {
    /// 0..=100, `None` when the total size is unknown
    pub percentage: Option<f64>,
    pub eta: Eta,
}

/// Derive percentage and ETA from the transfer counters.
///
/// Speed is the average since `started_at`. The ETA stays pending until some
/// time has elapsed and both byte counts are known.
pub fn estimate(
    bytes_received: u64,
    total_bytes: u64,
    started_at: Option<Instant>,
    now: Instant,
) -> Estimate {
    let percentage = (total_bytes > 0)
        .then(|| (bytes_received as f64 / total_bytes as f64 * 100.0).clamp(0.0, 100.0));

    let eta = match started_at {
        Some(start) if bytes_received > 0 && total_bytes > 0 => {
            let elapsed = now.saturating_duration_since(start).as_secs_f64();
            let speed = if elapsed > 0.0 {
                bytes_received as f64 / elapsed
            } else {
                0.0
            };
            if speed > 0.0 {
                let remaining = total_bytes.saturating_sub(bytes_received) as f64 / speed;
                Eta::Remaining(Duration::try_from_secs_f64(remaining).unwrap_or(Duration::MAX))
            } else {
                Eta::Pending
            }
        }
        _ => Eta::Pending,
    };

    Estimate { percentage, eta }
}

const UNITS: [&str; 5] = ["B", "KB", "MB", "GB", "TB"];

/// Human readable byte count, base 1024.
///
/// Plain bytes are shown as integers. Larger units get two decimals; a
/// trailing zero after a non-zero digit is dropped (`1.50` -> `1.5`) while an
/// all-zero fraction is kept (`1.00`).
pub fn format_bytes(bytes: u64) -> String {
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }

    if unit == 0 {
        return format!("{} {}", bytes, UNITS[0]);
    }

    let fixed = format!("{:.2}", value);
    let shown = if fixed.ends_with(".00") {
        fixed.as_str()
    } else {
        fixed.trim_end_matches('0')
    };
    format!("{} {}", shown, UNITS[unit])
}

/// Everything a progress display needs, captured at one instant
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressSnapshot {
    pub phase: TransferPhase,
    pub bytes_received: u64,
    pub total_bytes: u64,
    pub percentage: Option<f64>,
    pub eta: Eta,
    pub error: Option<String>,
}

impl fmt::Display for ProgressSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.phase {
            TransferPhase::Idle => f.write_str("Idle"),
            TransferPhase::AwaitingServer => f.write_str("Preparing stream"),
            TransferPhase::Completed => f.write_str("Completed"),
            TransferPhase::Cancelled => f.write_str("Cancelled"),
            TransferPhase::Failed => write!(
                f,
                "Failed: {}",
                self.error.as_deref().unwrap_or("Download failed")
            ),
            TransferPhase::Streaming => {
                if let Some(pct) = self.percentage {
                    write!(f, "{}% · ", pct.round() as u64)?;
                }
                write!(
                    f,
                    "{} / {} · ETA {}",
                    format_bytes(self.bytes_received),
                    format_bytes(self.total_bytes),
                    self.eta
                )
            }
        }
    }
}
