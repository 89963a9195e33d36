//! UDP socket setup for stream nodes and clients.

use crate::config::SOCKET_POLL_TIMEOUT;
use socket2::{Domain, Protocol, SockAddr, Socket, Type};
use std::io;
use std::net::{Ipv4Addr, SocketAddrV4, UdpSocket};

/// Returns `true` if the error kind is what a timed-out blocking read reports.
#[inline]
pub fn is_timeout(kind: io::ErrorKind) -> bool {
    matches!(kind, io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut)
}

fn new_udp_socket() -> io::Result<Socket> {
    let socket = Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP))?;
    socket.set_reuse_address(true)?;
    Ok(socket)
}

/// Bind an egress socket on `iface:port`. With a multicast group the socket
/// also sets the outgoing interface and TTL and joins the group.
pub fn bind_sender(
    iface: Ipv4Addr,
    port: u16,
    multicast: Option<Ipv4Addr>,
    ttl: u32,
) -> io::Result<UdpSocket> {
    let socket = new_udp_socket()?;
    socket.bind(&SockAddr::from(SocketAddrV4::new(iface, port)))?;
    if let Some(group) = multicast {
        socket.set_multicast_ttl_v4(ttl)?;
        socket.set_multicast_if_v4(&iface)?;
        socket.join_multicast_v4(&group, &iface)?;
    }
    Ok(socket.into())
}

/// Bind an ingress socket. Reads time out after [`SOCKET_POLL_TIMEOUT`] so
/// receive loops can observe a stop request.
pub fn bind_receiver(
    bind: SocketAddrV4,
    multicast: Option<Ipv4Addr>,
    iface: Ipv4Addr,
    receive_buffer_bytes: usize,
) -> io::Result<UdpSocket> {
    let socket = new_udp_socket()?;
    request_receive_buffer(&socket, receive_buffer_bytes);
    socket.bind(&SockAddr::from(bind))?;
    if let Some(group) = multicast {
        socket.join_multicast_v4(&group, &iface)?;
    }
    socket.set_read_timeout(Some(SOCKET_POLL_TIMEOUT))?;
    Ok(socket.into())
}

/// Ask for a larger receive buffer. A smaller grant is logged, never fatal.
fn request_receive_buffer(socket: &Socket, requested: usize) {
    if requested == 0 {
        return;
    }
    if let Err(e) = socket.set_recv_buffer_size(requested) {
        tracing::warn!("Failed to set receive buffer to {} bytes: {}", requested, e);
    }
    match socket.recv_buffer_size() {
        Ok(granted) if granted < requested => tracing::warn!(
            "Receive buffer is {} bytes, requested {}; bursts may be dropped",
            granted,
            requested
        ),
        Ok(granted) => tracing::debug!("Receive buffer set to {} bytes", granted),
        Err(e) => tracing::warn!("Failed to read receive buffer size: {}", e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_timeout_kinds() {
        assert!(is_timeout(io::ErrorKind::WouldBlock));
        assert!(is_timeout(io::ErrorKind::TimedOut));
        assert!(!is_timeout(io::ErrorKind::ConnectionRefused));
    }

    #[test]
    fn test_unicast_sender_to_receiver() {
        let receiver = bind_receiver(
            SocketAddrV4::new(Ipv4Addr::LOCALHOST, 0),
            None,
            Ipv4Addr::UNSPECIFIED,
            64 * 1024,
        )
        .unwrap();
        receiver
            .set_read_timeout(Some(Duration::from_secs(2)))
            .unwrap();
        let sender = bind_sender(Ipv4Addr::LOCALHOST, 0, None, 3).unwrap();

        sender
            .send_to(b"ping", receiver.local_addr().unwrap())
            .unwrap();
        let mut buf = [0u8; 16];
        let (n, _) = receiver.recv_from(&mut buf).unwrap();
        assert_eq!(&buf[..n], b"ping");
    }
}
