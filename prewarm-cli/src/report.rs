use std::fmt;
use std::time::Duration;

use prewarm_service::{RequestKind, Response};
use yansi::Paint;

/// Request counts of a single transport.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Counts {
    /// Requests that completed successfully.
    pub successes: usize,
    /// Requests that failed.
    pub failures: usize,
}

impl Counts {
    /// Returns the total number of requests.
    pub fn total(&self) -> usize {
        self.successes + self.failures
    }
}

/// Tallies the responses of a warmup run.
#[derive(Debug, Default)]
pub struct Summary {
    /// Counts of HTTP requests.
    pub http: Counts,
    /// Counts of gRPC calls.
    pub grpc: Counts,
    /// Wall clock time of the run, excluding readiness checks.
    pub elapsed: Duration,
    /// Whether the run was cut short by a signal.
    pub interrupted: bool,
}

impl Summary {
    /// Counts a single response.
    pub fn record(&mut self, response: &Response) {
        let counts = match response.kind {
            RequestKind::Http => &mut self.http,
            RequestKind::Grpc => &mut self.grpc,
        };

        if response.is_success() {
            counts.successes += 1;
        } else {
            counts.failures += 1;
        }
    }

    /// Returns `true` if at least one request was sent and none of them succeeded.
    pub fn all_failed(&self) -> bool {
        let successes = self.http.successes + self.grpc.successes;
        let total = self.http.total() + self.grpc.total();
        total > 0 && successes == 0
    }
}

fn write_counts(f: &mut fmt::Formatter<'_>, name: &str, counts: Counts) -> fmt::Result {
    write!(f, "{}: ", name.bold())?;
    write!(f, "{} requests", counts.total())?;
    if counts.failures > 0 {
        write!(
            f,
            " ({}, {})",
            format!("{} ok", counts.successes).green(),
            format!("{} FAILED", counts.failures).red().bold()
        )?;
    } else if counts.total() > 0 {
        write!(f, " ({})", "all ok".green())?;
    }
    writeln!(f)
}

impl fmt::Display for Summary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.interrupted {
            writeln!(f, "{}", "## Warmup interrupted".yellow().bold())?;
        } else {
            writeln!(f, "{}", "## Warmup finished".bold())?;
        }
        write_counts(f, "HTTP", self.http)?;
        write_counts(f, "gRPC", self.grpc)?;
        writeln!(f, "{}: {:.2?}", "Elapsed".bold(), self.elapsed)
    }
}
