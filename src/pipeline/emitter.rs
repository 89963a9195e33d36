//! Fan-out from a node to its downstream inboxes.

use crate::pipeline::id::NodeId;
use crate::pipeline::queue::InboxSender;
use crate::pipeline::record::Record;

/// Delivers records to every directly connected downstream node, in
/// connection order. Delivery is complete when `emit` returns.
#[derive(Debug, Clone, Default)]
pub struct Emitter {
    targets: Vec<InboxSender>,
}

impl Emitter {
    pub fn new(targets: Vec<InboxSender>) -> Self {
        Self { targets }
    }

    pub fn targets(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.targets.iter().map(|t| t.owner())
    }

    pub fn is_connected(&self) -> bool {
        !self.targets.is_empty()
    }

    /// Returns how many targets accepted the record.
    pub fn emit(&self, record: Record) -> usize {
        let Some((last, rest)) = self.targets.split_last() else {
            return 0;
        };
        let mut accepted = 0;
        for target in rest {
            accepted += target.deliver(record.clone()) as usize;
        }
        accepted + last.deliver(record) as usize
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ndtp::SpiketrainFrame;
    use crate::pipeline::queue::{inbox, InboxPolicy};
    use std::time::Duration;

    #[test]
    fn test_emit_reaches_each_target_once_in_order() {
        let (a_tx, a_rx) = inbox(NodeId(2), 8, InboxPolicy::Block, Duration::from_millis(10));
        let (b_tx, b_rx) = inbox(NodeId(3), 8, InboxPolicy::Block, Duration::from_millis(10));
        let emitter = Emitter::new(vec![a_tx, b_tx]);
        assert_eq!(emitter.targets().collect::<Vec<_>>(), vec![NodeId(2), NodeId(3)]);

        let first = Record::from(SpiketrainFrame {
            timestamp_ns: 1,
            bin_size_ms: 1,
            spike_counts: vec![1],
        });
        let second = Record::from(SpiketrainFrame {
            timestamp_ns: 2,
            bin_size_ms: 1,
            spike_counts: vec![2],
        });
        assert_eq!(emitter.emit(first.clone()), 2);
        // Delivered before emit returned.
        assert_eq!(a_rx.len(), 1);
        assert_eq!(b_rx.len(), 1);
        emitter.emit(second.clone());

        assert_eq!(a_rx.try_iter().collect::<Vec<_>>(), vec![first.clone(), second.clone()]);
        assert_eq!(b_rx.try_iter().collect::<Vec<_>>(), vec![first, second]);
    }

    #[test]
    fn test_unconnected_emit_is_noop() {
        let emitter = Emitter::default();
        assert!(!emitter.is_connected());
        assert_eq!(
            emitter.emit(Record::from(SpiketrainFrame {
                timestamp_ns: 0,
                bin_size_ms: 1,
                spike_counts: vec![],
            })),
            0
        );
    }
}
