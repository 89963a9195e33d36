//! Records moved between nodes.
//!
//! Frames are reference counted so fan-out to several downstream nodes does
//! not copy sample data.

use crate::ndtp::{BroadbandFrame, DataKind, Frame, Message, NdtpResult, SpiketrainFrame};
use serde::Serialize;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "frame", rename_all = "snake_case")]
pub enum Record {
    Broadband(Arc<BroadbandFrame>),
    Spiketrain(Arc<SpiketrainFrame>),
}

impl Record {
    pub fn kind(&self) -> DataKind {
        match self {
            Record::Broadband(_) => DataKind::Broadband,
            Record::Spiketrain(_) => DataKind::Spiketrain,
        }
    }

    pub fn timestamp_ns(&self) -> i64 {
        match self {
            Record::Broadband(f) => f.timestamp_ns,
            Record::Spiketrain(f) => f.timestamp_ns,
        }
    }

    /// Encode into wire messages numbered from `first_sequence`.
    pub fn to_messages(&self, first_sequence: u16) -> NdtpResult<Vec<Message>> {
        match self {
            Record::Broadband(f) => f.to_messages(first_sequence),
            Record::Spiketrain(f) => Ok(vec![f.to_message(first_sequence)?]),
        }
    }
}

impl From<BroadbandFrame> for Record {
    fn from(frame: BroadbandFrame) -> Self {
        Record::Broadband(Arc::new(frame))
    }
}

impl From<SpiketrainFrame> for Record {
    fn from(frame: SpiketrainFrame) -> Self {
        Record::Spiketrain(Arc::new(frame))
    }
}

impl From<Frame> for Record {
    fn from(frame: Frame) -> Self {
        match frame {
            Frame::Broadband(f) => f.into(),
            Frame::Spiketrain(f) => f.into(),
        }
    }
}

impl From<Message> for Record {
    fn from(message: Message) -> Self {
        Frame::from(message).into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_json_shape() {
        let record = Record::from(SpiketrainFrame {
            timestamp_ns: 5,
            bin_size_ms: 10,
            spike_counts: vec![1, 0],
        });
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["kind"], "spiketrain");
        assert_eq!(json["frame"]["bin_size_ms"], 10);
        assert_eq!(record.kind(), DataKind::Spiketrain);
        assert_eq!(record.timestamp_ns(), 5);
    }
}
