//! Bounded per-node input queues.
//!
//! Every node owns one inbox; upstream emitters hold an [`InboxSender`] for
//! it. A full inbox either blocks the sender for a bounded time and then
//! drops the record with a warning, or evicts the oldest queued record.

use crate::pipeline::id::NodeId;
use crate::pipeline::record::Record;
use crossbeam_channel::{bounded, Receiver, SendTimeoutError, Sender, TrySendError};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InboxPolicy {
    /// Wait up to the send timeout, then drop the new record.
    Block,
    /// Evict the oldest queued record to admit the new one.
    DropOldest,
}

/// Sending half of a node inbox.
#[derive(Debug, Clone)]
pub struct InboxSender {
    owner: NodeId,
    tx: Sender<Record>,
    /// Kept for drop-oldest eviction.
    rx: Receiver<Record>,
    policy: InboxPolicy,
    send_timeout: Duration,
    dropped: Arc<AtomicU64>,
}

/// Create an inbox for `owner`.
pub fn inbox(
    owner: NodeId,
    capacity: usize,
    policy: InboxPolicy,
    send_timeout: Duration,
) -> (InboxSender, Receiver<Record>) {
    let (tx, rx) = bounded(capacity.max(1));
    let sender = InboxSender {
        owner,
        tx,
        rx: rx.clone(),
        policy,
        send_timeout,
        dropped: Arc::new(AtomicU64::new(0)),
    };
    (sender, rx)
}

impl InboxSender {
    pub fn owner(&self) -> NodeId {
        self.owner
    }

    /// Records dropped because the inbox was full.
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Enqueue a record. Returns `false` if the record was dropped.
    pub fn deliver(&self, record: Record) -> bool {
        match self.policy {
            InboxPolicy::Block => match self.tx.send_timeout(record, self.send_timeout) {
                Ok(()) => true,
                Err(SendTimeoutError::Timeout(_)) => {
                    let dropped = self.dropped.fetch_add(1, Ordering::Relaxed) + 1;
                    tracing::warn!(
                        "Inbox of node {} full for {:?}, dropped record ({} total)",
                        self.owner,
                        self.send_timeout,
                        dropped
                    );
                    false
                }
                Err(SendTimeoutError::Disconnected(_)) => false,
            },
            InboxPolicy::DropOldest => {
                let mut record = record;
                loop {
                    match self.tx.try_send(record) {
                        Ok(()) => return true,
                        Err(TrySendError::Full(rejected)) => {
                            if self.rx.try_recv().is_ok() {
                                self.dropped.fetch_add(1, Ordering::Relaxed);
                            }
                            record = rejected;
                        }
                        Err(TrySendError::Disconnected(_)) => return false,
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ndtp::SpiketrainFrame;

    fn record(ts: i64) -> Record {
        Record::from(SpiketrainFrame {
            timestamp_ns: ts,
            bin_size_ms: 1,
            spike_counts: vec![],
        })
    }

    #[test]
    fn test_drop_oldest_keeps_newest() {
        let (tx, rx) = inbox(NodeId(1), 2, InboxPolicy::DropOldest, Duration::ZERO);
        for ts in 0..5 {
            assert!(tx.deliver(record(ts)));
        }
        let kept: Vec<i64> = rx.try_iter().map(|r| r.timestamp_ns()).collect();
        assert_eq!(kept, vec![3, 4]);
        assert_eq!(tx.dropped(), 3);
    }

    #[test]
    fn test_block_times_out_and_drops() {
        let (tx, rx) = inbox(NodeId(1), 1, InboxPolicy::Block, Duration::from_millis(10));
        assert!(tx.deliver(record(0)));
        assert!(!tx.deliver(record(1)));
        assert_eq!(tx.dropped(), 1);
        assert_eq!(rx.try_recv().unwrap().timestamp_ns(), 0);
    }
}
