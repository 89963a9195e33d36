//! Server side of clock synchronization: stamps and echoes requests.

use crate::clock::packet::TimeSyncPacket;
use crate::clock::{system_time_ns, ClockResult};
use crate::config::SOCKET_POLL_TIMEOUT;
use crate::transport::socket::is_timeout;
use std::net::{SocketAddr, UdpSocket};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

pub struct TimeSyncServer {
    socket: UdpSocket,
    running: Arc<AtomicBool>,
    served: Arc<AtomicU64>,
    worker: Option<JoinHandle<()>>,
}

impl TimeSyncServer {
    pub fn bind(addr: SocketAddr) -> ClockResult<Self> {
        let socket = UdpSocket::bind(addr)?;
        socket.set_read_timeout(Some(SOCKET_POLL_TIMEOUT))?;
        Ok(Self {
            socket,
            running: Arc::new(AtomicBool::new(false)),
            served: Arc::new(AtomicU64::new(0)),
            worker: None,
        })
    }

    pub fn local_addr(&self) -> ClockResult<SocketAddr> {
        Ok(self.socket.local_addr()?)
    }

    /// Replies sent so far.
    pub fn served(&self) -> u64 {
        self.served.load(Ordering::Relaxed)
    }

    pub fn is_running(&self) -> bool {
        self.worker.is_some()
    }

    /// Serve on a background thread until [`stop`](Self::stop).
    pub fn start(&mut self) -> ClockResult<()> {
        if self.worker.is_some() {
            return Ok(());
        }
        let socket = self.socket.try_clone()?;
        let running = Arc::clone(&self.running);
        let served = Arc::clone(&self.served);
        running.store(true, Ordering::Relaxed);
        let worker = thread::Builder::new()
            .name("time-sync-server".into())
            .spawn(move || serve(&socket, &running, &served))?;
        tracing::info!("Time sync server listening on {}", self.socket.local_addr()?);
        self.worker = Some(worker);
        Ok(())
    }

    pub fn stop(&mut self) {
        self.running.store(false, Ordering::Relaxed);
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                tracing::error!("Time sync server thread panicked");
            }
            tracing::info!("Time sync server stopped after {} replies", self.served());
        }
    }
}

impl Drop for TimeSyncServer {
    fn drop(&mut self) {
        self.stop();
    }
}

fn serve(socket: &UdpSocket, running: &AtomicBool, served: &AtomicU64) {
    let mut buf = [0u8; 64];
    while running.load(Ordering::Relaxed) {
        let (len, peer) = match socket.recv_from(&mut buf) {
            Ok(received) => received,
            Err(e) if is_timeout(e.kind()) => continue,
            Err(e) => {
                tracing::warn!("Time sync server receive failed: {}", e);
                continue;
            }
        };
        let receive_ns = system_time_ns();
        let mut packet = match TimeSyncPacket::decode(&buf[..len]) {
            Ok(packet) => packet,
            Err(e) => {
                tracing::debug!("Dropping time sync request from {}: {}", peer, e);
                continue;
            }
        };
        packet.server_receive_ns = receive_ns;
        packet.server_send_ns = system_time_ns();
        match socket.send_to(&packet.encode(), peer) {
            Ok(_) => {
                served.fetch_add(1, Ordering::Relaxed);
            }
            Err(e) => tracing::warn!("Time sync reply to {} failed: {}", peer, e),
        }
    }
}
