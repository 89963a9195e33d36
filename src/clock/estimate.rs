//! Offset estimation from a burst of round trips.

use crate::clock::packet::TimeSyncPacket;

/// One completed round trip.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncSample {
    pub offset_ns: i64,
    pub rtt_ns: i64,
}

impl SyncSample {
    /// Build a sample from a server reply and the local receive time.
    pub fn from_reply(reply: &TimeSyncPacket, client_receive_ns: i64) -> Self {
        let t1 = reply.client_send_ns as i128;
        let t2 = reply.server_receive_ns as i128;
        let t3 = reply.server_send_ns as i128;
        let t4 = client_receive_ns as i128;
        Self {
            offset_ns: (((t2 - t1) + (t3 - t4)) / 2) as i64,
            rtt_ns: ((t4 - t1) - (t3 - t2)) as i64,
        }
    }
}

/// Collects the samples of one burst.
#[derive(Debug, Default, Clone)]
pub struct ClockEstimator {
    samples: Vec<SyncSample>,
}

impl ClockEstimator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, sample: SyncSample) {
        self.samples.push(sample);
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Sample with the smallest round trip; the first one wins ties.
    pub fn best(&self) -> Option<SyncSample> {
        self.samples
            .iter()
            .copied()
            .reduce(|best, s| if s.rtt_ns < best.rtt_ns { s } else { best })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reply(t1: i64, t2: i64, t3: i64) -> TimeSyncPacket {
        TimeSyncPacket {
            client_id: 1,
            sequence: 0,
            client_send_ns: t1,
            server_receive_ns: t2,
            server_send_ns: t3,
        }
    }

    #[test]
    fn test_offset_and_rtt() {
        // Server clock 1000 ahead, 50 each way, 10 of processing.
        let sample = SyncSample::from_reply(&reply(0, 1050, 1060), 110);
        assert_eq!(sample.offset_ns, 1000);
        assert_eq!(sample.rtt_ns, 100);
    }

    #[test]
    fn test_min_rtt_selection() {
        let mut estimator = ClockEstimator::new();
        assert_eq!(estimator.best(), None);
        estimator.add(SyncSample { offset_ns: 5, rtt_ns: 300 });
        estimator.add(SyncSample { offset_ns: 7, rtt_ns: 120 });
        estimator.add(SyncSample { offset_ns: 9, rtt_ns: 120 });
        estimator.add(SyncSample { offset_ns: 1, rtt_ns: 900 });
        assert_eq!(estimator.best(), Some(SyncSample { offset_ns: 7, rtt_ns: 120 }));
        assert_eq!(estimator.len(), 4);
    }
}
