//! Packet quality monitor.
//!
//! Scores received messages by sequence number: a forward gap counts as
//! drops, a backward step as one out-of-order packet. The current sequence
//! always follows the last observed value. Jitter is an EWMA (gain 1/16) of
//! the absolute change between consecutive inter-arrival intervals.

use std::fmt;
use std::time::{Duration, Instant};

/// Arithmetic used for sequence distances.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SequenceSpace {
    /// Circular modulo 2^16, matching the 16-bit wire field.
    #[default]
    Wire,
    /// Modulo 2^16 + 1, as computed by older receivers. Reports one extra
    /// drop whenever a gap spans the wrap point.
    Legacy,
}

impl SequenceSpace {
    pub fn modulus(self) -> i64 {
        match self {
            SequenceSpace::Wire => 1 << 16,
            SequenceSpace::Legacy => (1 << 16) + 1,
        }
    }

    /// Sequence expected after `current`.
    pub fn successor(self, current: u16) -> i64 {
        (current as i64 + 1) % self.modulus()
    }

    /// Signed circular distance from `expected` to `observed`, in
    /// `(-modulus/2, modulus/2]`.
    pub fn distance(self, expected: i64, observed: u16) -> i64 {
        let m = self.modulus();
        let d = (observed as i64 - expected).rem_euclid(m);
        if d > m / 2 {
            d - m
        } else {
            d
        }
    }
}

#[derive(Debug, Clone)]
pub struct PacketMonitor {
    space: SequenceSpace,
    current_sequence: Option<u16>,
    packet_count: u64,
    dropped_count: u64,
    out_of_order_count: u64,
    /// Seconds.
    jitter_ewma: f64,
    last_arrival: Option<Instant>,
    last_interval: Option<Duration>,
    /// `(arrival, bytes)` since the last report.
    bandwidth_samples: Vec<(Instant, usize)>,
    started: Instant,
    last_report: Instant,
    report_interval: Duration,
}

/// Snapshot of link quality.
#[derive(Debug, Clone, PartialEq)]
pub struct MonitorReport {
    pub runtime: Duration,
    pub packet_count: u64,
    pub dropped_count: u64,
    pub drop_percent: f64,
    pub out_of_order_count: u64,
    /// Over the interval since the previous report.
    pub throughput_bps: f64,
    pub jitter_ms: f64,
}

impl fmt::Display for MonitorReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "runtime {:.1}s | dropped {}/{} ({:.3}%) | {:.2} Mbit/s | jitter {:.3} ms | out of order {}",
            self.runtime.as_secs_f64(),
            self.dropped_count,
            self.packet_count + self.dropped_count,
            self.drop_percent,
            self.throughput_bps / 1e6,
            self.jitter_ms,
            self.out_of_order_count
        )
    }
}

impl Default for PacketMonitor {
    fn default() -> Self {
        Self::new(SequenceSpace::Wire, Duration::from_secs(5))
    }
}

impl PacketMonitor {
    pub fn new(space: SequenceSpace, report_interval: Duration) -> Self {
        Self::started_at(space, report_interval, Instant::now())
    }

    pub fn started_at(space: SequenceSpace, report_interval: Duration, now: Instant) -> Self {
        Self {
            space,
            current_sequence: None,
            packet_count: 0,
            dropped_count: 0,
            out_of_order_count: 0,
            jitter_ewma: 0.0,
            last_arrival: None,
            last_interval: None,
            bandwidth_samples: Vec::new(),
            started: now,
            last_report: now,
            report_interval,
        }
    }

    pub fn current_sequence(&self) -> Option<u16> {
        self.current_sequence
    }

    pub fn packet_count(&self) -> u64 {
        self.packet_count
    }

    pub fn dropped_count(&self) -> u64 {
        self.dropped_count
    }

    pub fn out_of_order_count(&self) -> u64 {
        self.out_of_order_count
    }

    pub fn jitter_ms(&self) -> f64 {
        self.jitter_ewma * 1e3
    }

    /// Account for one decoded message.
    pub fn process(&mut self, sequence: u16) {
        self.process_at(sequence, Instant::now());
    }

    pub fn process_at(&mut self, sequence: u16, now: Instant) {
        if let Some(current) = self.current_sequence {
            let distance = self.space.distance(self.space.successor(current), sequence);
            if distance > 0 {
                self.dropped_count += distance as u64;
            } else if distance < 0 {
                self.out_of_order_count += 1;
            }
        }
        self.current_sequence = Some(sequence);
        self.packet_count += 1;

        if let Some(last) = self.last_arrival {
            let interval = now.saturating_duration_since(last);
            if let Some(previous) = self.last_interval {
                let delta = (interval.as_secs_f64() - previous.as_secs_f64()).abs();
                self.jitter_ewma += (delta - self.jitter_ewma) / 16.0;
            }
            self.last_interval = Some(interval);
        }
        self.last_arrival = Some(now);
    }

    /// Account for received bytes (one datagram may carry several messages).
    pub fn record_bytes(&mut self, bytes: usize) {
        self.record_bytes_at(bytes, Instant::now());
    }

    pub fn record_bytes_at(&mut self, bytes: usize, now: Instant) {
        self.bandwidth_samples.push((now, bytes));
    }

    /// Build a report and start a new throughput interval.
    pub fn report_at(&mut self, now: Instant) -> MonitorReport {
        let elapsed = now.saturating_duration_since(self.last_report).as_secs_f64();
        let bytes: usize = self
            .bandwidth_samples
            .iter()
            .filter(|(at, _)| *at <= now)
            .map(|(_, b)| *b)
            .sum();
        self.bandwidth_samples.retain(|(at, _)| *at > now);
        self.last_report = now;

        let expected = self.packet_count + self.dropped_count;
        MonitorReport {
            runtime: now.saturating_duration_since(self.started),
            packet_count: self.packet_count,
            dropped_count: self.dropped_count,
            drop_percent: if expected == 0 {
                0.0
            } else {
                self.dropped_count as f64 * 100.0 / expected as f64
            },
            out_of_order_count: self.out_of_order_count,
            throughput_bps: if elapsed > 0.0 {
                bytes as f64 * 8.0 / elapsed
            } else {
                0.0
            },
            jitter_ms: self.jitter_ms(),
        }
    }

    /// A report if the report interval has elapsed.
    pub fn maybe_report(&mut self) -> Option<MonitorReport> {
        let now = Instant::now();
        if now.saturating_duration_since(self.last_report) >= self.report_interval {
            Some(self.report_at(now))
        } else {
            None
        }
    }
}
