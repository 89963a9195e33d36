//! Client-side sender: packs records and pushes them to a device socket.

use crate::error::Result;
use crate::pipeline::Record;
use crate::transport::socket::bind_sender;
use std::io;
use std::net::{Ipv4Addr, SocketAddr, UdpSocket};

/// Result of sending one record.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SendOutcome {
    pub sent: usize,
    pub failed: usize,
}

/// Encode `record` and send one datagram per message. `sequence` advances by
/// the number of messages whether or not each send succeeds.
pub(crate) fn send_record(
    socket: &UdpSocket,
    destination: SocketAddr,
    record: &Record,
    sequence: &mut u16,
) -> Result<SendOutcome> {
    let messages = record.to_messages(*sequence)?;
    *sequence = sequence.wrapping_add(messages.len() as u16);

    let mut outcome = SendOutcome::default();
    for message in &messages {
        let bytes = message.encode()?;
        match socket.send_to(&bytes, destination) {
            Ok(_) => outcome.sent += 1,
            Err(e) => {
                outcome.failed += 1;
                tracing::debug!(
                    "Send of sequence {} to {} failed: {}",
                    message.header.sequence,
                    destination,
                    e
                );
            }
        }
    }
    Ok(outcome)
}

#[derive(Debug)]
pub struct StreamWriter {
    socket: UdpSocket,
    destination: SocketAddr,
    sequence: u16,
}

impl StreamWriter {
    /// Bind an ephemeral local socket for sending to `destination`.
    pub fn connect(destination: SocketAddr) -> io::Result<Self> {
        let socket = bind_sender(Ipv4Addr::UNSPECIFIED, 0, None, 1)?;
        Ok(Self {
            socket,
            destination,
            sequence: 0,
        })
    }

    pub fn destination(&self) -> SocketAddr {
        self.destination
    }

    /// Sequence number the next message will carry.
    pub fn sequence(&self) -> u16 {
        self.sequence
    }

    pub fn write(&mut self, record: &Record) -> Result<SendOutcome> {
        send_record(&self.socket, self.destination, record, &mut self.sequence)
    }
}
