//! Enumeration statistics
//!
//! Per-context counters and the registry-wide table statistics reported at
//! shutdown and on demand.

use serde::Serialize;
use std::fmt::Write as _;
use std::time::Duration;

/// Running count/total/max over a stream of samples
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CounterStats {
    pub samples: u64,
    pub total: u64,
    pub max: u64,
}

impl CounterStats {
    pub fn record(&mut self, sample: u64) {
        self.samples += 1;
        self.total += sample;
        self.max = self.max.max(sample);
    }

    pub fn average(&self) -> u64 {
        if self.samples == 0 {
            0
        } else {
            self.total / self.samples
        }
    }
}

/// Snapshot of one context's activity
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ContextStatistics {
    /// Responses sent, counting the Open response
    pub responses: u64,
    pub pulls: u64,
    pub objects_returned: u64,
    pub objects_requested: u64,
    pub zero_length_responses: u64,
    pub consecutive_zero_pulls: u32,
    pub buffer_high_water_mark: usize,
    #[serde(skip)]
    pub age: Duration,
}

impl ContextStatistics {
    /// Account one response carrying `returned` of `requested` objects.
    pub(crate) fn record_response(&mut self, requested: u32, returned: usize) {
        self.responses += 1;
        self.objects_requested += u64::from(requested);
        self.objects_returned += returned as u64;
        if returned == 0 {
            self.zero_length_responses += 1;
        }
        if requested == 0 {
            self.consecutive_zero_pulls += 1;
        } else {
            self.consecutive_zero_pulls = 0;
        }
    }
}

/// Table statistics for the context registry
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RegistryStatistics {
    pub opened: u64,
    pub closed: u64,
    pub timed_out: u64,
    pub current: usize,
    pub max_simultaneous: usize,
    pub objects_per_response: CounterStats,
    pub requests_per_sequence: CounterStats,
    pub zero_length_responses: u64,
    pub cache_high_water_mark: usize,
}

impl RegistryStatistics {
    pub(crate) fn record_opened(&mut self, current: usize) {
        self.opened += 1;
        self.current = current;
        self.max_simultaneous = self.max_simultaneous.max(current);
    }

    pub(crate) fn record_response(&mut self, returned: usize) {
        self.objects_per_response.record(returned as u64);
        if returned == 0 {
            self.zero_length_responses += 1;
        }
    }

    pub(crate) fn record_removed(&mut self, context: &ContextStatistics, timed_out: bool, current: usize) {
        if timed_out {
            self.timed_out += 1;
        } else {
            self.closed += 1;
        }
        self.current = current;
        self.requests_per_sequence.record(context.responses);
        self.cache_high_water_mark = self
            .cache_high_water_mark
            .max(context.buffer_high_water_mark);
    }

    /// Human-readable table statistics
    pub fn summary(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(
            out,
            "Enumeration contexts: opened={} closed={} timed_out={} current={} max_simultaneous={}",
            self.opened, self.closed, self.timed_out, self.current, self.max_simultaneous
        );
        let _ = writeln!(
            out,
            "Objects per response: avg={} max={} ({} responses, {} zero-length)",
            self.objects_per_response.average(),
            self.objects_per_response.max,
            self.objects_per_response.samples,
            self.zero_length_responses
        );
        let _ = write!(
            out,
            "Requests per sequence: avg={} max={}; cache high-water mark={}",
            self.requests_per_sequence.average(),
            self.requests_per_sequence.max,
            self.cache_high_water_mark
        );
        out
    }
}
