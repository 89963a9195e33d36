//! Client-side receiver: blocking reads of decoded records.

use crate::config::{MAX_DATAGRAM_SIZE, SOCKET_POLL_TIMEOUT};
use crate::ndtp::{Depacketizer, Header};
use crate::pipeline::Record;
use crate::transport::monitor::{PacketMonitor, SequenceSpace};
use crate::transport::socket::{bind_receiver, is_timeout};
use std::collections::VecDeque;
use std::io;
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4, UdpSocket};
use std::time::{Duration, Instant};

/// Reads NDTP datagrams from a unicast or multicast stream.
pub struct StreamReader {
    socket: UdpSocket,
    depacketizer: Depacketizer,
    monitor: PacketMonitor,
    buf: Vec<u8>,
    pending: VecDeque<(Header, Record)>,
}

impl StreamReader {
    /// Bind to `bind`, joining `multicast` on `iface` when given.
    pub fn bind(
        bind: SocketAddrV4,
        multicast: Option<Ipv4Addr>,
        iface: Ipv4Addr,
        receive_buffer_bytes: usize,
    ) -> io::Result<Self> {
        let socket = bind_receiver(bind, multicast, iface, receive_buffer_bytes)?;
        Ok(Self {
            socket,
            depacketizer: Depacketizer::new(),
            monitor: PacketMonitor::default(),
            buf: vec![0u8; MAX_DATAGRAM_SIZE],
            pending: VecDeque::new(),
        })
    }

    /// Use a different sequence arithmetic for the attached monitor.
    pub fn with_sequence_space(mut self, space: SequenceSpace) -> Self {
        self.monitor = PacketMonitor::new(space, Duration::from_secs(5));
        self
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    pub fn monitor(&self) -> &PacketMonitor {
        &self.monitor
    }

    /// Next decoded record, or `None` if nothing arrived within `timeout`.
    pub fn read(&mut self, timeout: Duration) -> io::Result<Option<(Header, Record)>> {
        let deadline = Instant::now() + timeout;
        loop {
            if let Some(next) = self.pending.pop_front() {
                return Ok(Some(next));
            }
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Ok(None);
            }
            self.socket
                .set_read_timeout(Some(remaining.min(SOCKET_POLL_TIMEOUT)))?;
            match self.socket.recv_from(&mut self.buf) {
                Ok((n, _peer)) => self.ingest(n),
                Err(e) if is_timeout(e.kind()) => continue,
                Err(e) => return Err(e),
            }
        }
    }

    fn ingest(&mut self, len: usize) {
        self.monitor.record_bytes(len);
        self.depacketizer.push(&self.buf[..len]);
        while let Some(message) = self.depacketizer.next_message() {
            self.monitor.process(message.header.sequence);
            let header = message.header;
            self.pending.push_back((header, Record::from(message)));
        }
        if let Some(report) = self.monitor.maybe_report() {
            tracing::info!("Stream {:?}: {}", self.socket.local_addr().ok(), report);
        }
    }
}
