//! Client side of clock synchronization.
//!
//! Only the sync thread writes the estimate. `now_ns` reads the latest
//! offset from an atomic; `last_sync` reads the `(local, offset)` pair of one
//! completed burst as a unit.

use crate::clock::estimate::{ClockEstimator, SyncSample};
use crate::clock::packet::TimeSyncPacket;
use crate::clock::{system_time_ns, ClockError, ClockResult};
use crate::config::TimeSyncSettings;
use crate::transport::socket::is_timeout;
use std::net::{Ipv4Addr, SocketAddr, UdpSocket};
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

const STOP_POLL: Duration = Duration::from_millis(50);

/// Local time of a completed burst and the offset it produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct LastSync {
    local_ns: i64,
    offset_ns: i64,
}

#[derive(Debug, Default)]
struct SyncState {
    offset_ns: AtomicI64,
    last: RwLock<Option<LastSync>>,
}

impl SyncState {
    fn publish(&self, local_ns: i64, sample: SyncSample) {
        let last = LastSync {
            local_ns,
            offset_ns: sample.offset_ns,
        };
        *self.last.write().unwrap_or_else(PoisonError::into_inner) = Some(last);
        self.offset_ns.store(sample.offset_ns, Ordering::Release);
    }

    fn offset_ns(&self) -> i64 {
        self.offset_ns.load(Ordering::Acquire)
    }

    fn now_ns(&self) -> i64 {
        system_time_ns().saturating_add(self.offset_ns())
    }

    fn last_sync(&self) -> Option<(i64, i64)> {
        let last = (*self.last.read().unwrap_or_else(PoisonError::into_inner))?;
        Some((last.local_ns, last.local_ns.saturating_add(last.offset_ns)))
    }
}

pub struct TimeSyncClient {
    socket: UdpSocket,
    server: SocketAddr,
    client_id: u32,
    next_sequence: u32,
    max_sync_packets: usize,
    send_delay: Duration,
    timeout: Duration,
    sync_interval: Duration,
    state: Arc<SyncState>,
}

impl TimeSyncClient {
    /// Bind an ephemeral socket for talking to `server`. The client id is random.
    pub fn new(server: SocketAddr, settings: &TimeSyncSettings) -> ClockResult<Self> {
        let socket = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, 0))?;
        let client_id = rand::random::<u32>();
        tracing::debug!("Time sync client {:08x} targeting {}", client_id, server);
        Ok(Self {
            socket,
            server,
            client_id,
            next_sequence: 0,
            max_sync_packets: settings.max_sync_packets.max(1),
            send_delay: settings.send_delay(),
            timeout: settings.timeout(),
            sync_interval: settings.sync_interval(),
            state: Arc::new(SyncState::default()),
        })
    }

    pub fn client_id(&self) -> u32 {
        self.client_id
    }

    /// Local wall clock corrected by the latest offset.
    pub fn now_ns(&self) -> i64 {
        self.state.now_ns()
    }

    pub fn offset_ns(&self) -> i64 {
        self.state.offset_ns()
    }

    /// `(local_ns, synced_ns)` at the last completed burst.
    pub fn last_sync(&self) -> Option<(i64, i64)> {
        self.state.last_sync()
    }

    /// Run one burst and publish the min-RTT sample.
    pub fn sync_once(&mut self) -> ClockResult<SyncSample> {
        let first_sequence = self.next_sequence;
        let mut estimator = ClockEstimator::new();
        let mut buf = [0u8; 64];

        for _ in 0..self.max_sync_packets {
            let sequence = self.next_sequence;
            self.next_sequence = self.next_sequence.wrapping_add(1);
            let request = TimeSyncPacket::request(self.client_id, sequence, system_time_ns());
            if let Err(e) = self.socket.send_to(&request.encode(), self.server) {
                tracing::warn!("Time sync request {} to {} failed: {}", sequence, self.server, e);
            }
            self.collect(&mut estimator, &mut buf, first_sequence, Instant::now() + self.send_delay)?;
        }
        if estimator.len() < self.max_sync_packets {
            self.collect(&mut estimator, &mut buf, first_sequence, Instant::now() + self.timeout)?;
        }

        let best = estimator.best().ok_or(ClockError::NoReplies(self.server))?;
        self.state.publish(system_time_ns(), best);
        tracing::debug!(
            "Time sync: offset {} ns, rtt {} ns from {}/{} replies",
            best.offset_ns,
            best.rtt_ns,
            estimator.len(),
            self.max_sync_packets
        );
        Ok(best)
    }

    fn collect(
        &self,
        estimator: &mut ClockEstimator,
        buf: &mut [u8],
        first_sequence: u32,
        deadline: Instant,
    ) -> ClockResult<()> {
        while estimator.len() < self.max_sync_packets {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                break;
            }
            self.socket.set_read_timeout(Some(remaining))?;
            let len = match self.socket.recv_from(buf) {
                Ok((n, _peer)) => n,
                Err(e) if is_timeout(e.kind()) => break,
                Err(e) => return Err(e.into()),
            };
            let received_ns = system_time_ns();
            let reply = match TimeSyncPacket::decode(&buf[..len]) {
                Ok(reply) => reply,
                Err(e) => {
                    tracing::debug!("Ignoring time sync datagram: {}", e);
                    continue;
                }
            };
            if reply.client_id != self.client_id {
                tracing::debug!(
                    "Ignoring time sync reply for client {:08x}",
                    reply.client_id
                );
                continue;
            }
            if reply.sequence.wrapping_sub(first_sequence) >= self.max_sync_packets as u32 {
                tracing::debug!("Ignoring stale time sync reply {}", reply.sequence);
                continue;
            }
            estimator.add(SyncSample::from_reply(&reply, received_ns));
        }
        Ok(())
    }

    /// Move the client onto a thread that re-syncs every `sync_interval`.
    pub fn spawn(self) -> ClockResult<TimeSyncHandle> {
        let state = Arc::clone(&self.state);
        let running = Arc::new(AtomicBool::new(true));
        let flag = Arc::clone(&running);
        let worker = thread::Builder::new()
            .name("time-sync".into())
            .spawn(move || self.run(&flag))?;
        Ok(TimeSyncHandle {
            state,
            running,
            worker: Some(worker),
        })
    }

    fn run(mut self, running: &AtomicBool) {
        while running.load(Ordering::Relaxed) {
            if let Err(e) = self.sync_once() {
                tracing::warn!("Time sync with {} failed: {}", self.server, e);
            }
            let resume = Instant::now() + self.sync_interval;
            while running.load(Ordering::Relaxed) && Instant::now() < resume {
                thread::sleep(STOP_POLL.min(resume.saturating_duration_since(Instant::now())));
            }
        }
    }
}

/// Reader side of a running sync thread.
pub struct TimeSyncHandle {
    state: Arc<SyncState>,
    running: Arc<AtomicBool>,
    worker: Option<JoinHandle<()>>,
}

impl TimeSyncHandle {
    pub fn now_ns(&self) -> i64 {
        self.state.now_ns()
    }

    pub fn offset_ns(&self) -> i64 {
        self.state.offset_ns()
    }

    pub fn last_sync(&self) -> Option<(i64, i64)> {
        self.state.last_sync()
    }

    pub fn stop(&mut self) {
        self.running.store(false, Ordering::Relaxed);
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                tracing::error!("Time sync thread panicked");
            }
        }
    }
}

impl Drop for TimeSyncHandle {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(offset_ns: i64) -> SyncSample {
        SyncSample {
            offset_ns,
            rtt_ns: 10,
        }
    }

    #[test]
    fn test_unsynced_state() {
        let state = SyncState::default();
        assert_eq!(state.last_sync(), None);
        assert_eq!(state.offset_ns(), 0);
    }

    #[test]
    fn test_last_sync_pair() {
        let state = SyncState::default();
        state.publish(1_000, sample(-250));
        assert_eq!(state.last_sync(), Some((1_000, 750)));
        assert_eq!(state.offset_ns(), -250);
    }

    #[test]
    fn test_last_sync_pair_consistent_under_publish() {
        let state = Arc::new(SyncState::default());
        state.publish(0, sample(0));

        let writer_state = Arc::clone(&state);
        let writer = thread::spawn(move || {
            for round in 1..20_000i64 {
                writer_state.publish(round * 1_000, sample(round));
            }
        });

        // Every round publishes local = 1000 * offset, so a pair from two
        // different rounds would break this relation.
        for _ in 0..20_000 {
            let (local, synced) = state.last_sync().unwrap();
            assert_eq!(synced - local, local / 1_000);
        }
        writer.join().unwrap();
    }
}
