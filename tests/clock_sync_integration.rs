//! Integration tests for clock synchronization over loopback

mod common;

use serial_test::serial;
use std::net::{Ipv4Addr, SocketAddr, UdpSocket};
use std::time::{Duration, Instant};
use synapse_dataplane::clock::{system_time_ns, ClockError, TimeSyncClient, TimeSyncPacket, TimeSyncServer};
use synapse_dataplane::config::TimeSyncSettings;

fn fast_settings() -> TimeSyncSettings {
    TimeSyncSettings {
        max_sync_packets: 4,
        send_delay_ms: 20,
        timeout_ms: 200,
        sync_interval_s: 1,
        ..Default::default()
    }
}

fn loopback_server() -> (TimeSyncServer, SocketAddr) {
    let mut server = TimeSyncServer::bind((Ipv4Addr::LOCALHOST, 0).into()).unwrap();
    server.start().unwrap();
    let addr = server.local_addr().unwrap();
    (server, addr)
}

#[test]
#[serial]
fn test_same_host_offset_is_small() {
    let (mut server, addr) = loopback_server();
    let mut client = TimeSyncClient::new(addr, &fast_settings()).unwrap();
    assert!(client.last_sync().is_none());

    let sample = client.sync_once().unwrap();
    server.stop();

    // Same clock on both ends: only scheduling noise remains.
    assert!(sample.offset_ns.abs() < 5_000_000, "offset {}", sample.offset_ns);
    assert!(sample.rtt_ns >= 0);
    assert_eq!(client.offset_ns(), sample.offset_ns);
    assert!(server.served() >= 4);

    let (local, synced) = client.last_sync().unwrap();
    assert_eq!(synced - local, sample.offset_ns);
    assert!((client.now_ns() - system_time_ns()).abs() < 10_000_000);
}

#[test]
#[serial]
fn test_foreign_client_replies_ignored() {
    // A fake server that answers every request for some other client.
    let fake = UdpSocket::bind((Ipv4Addr::LOCALHOST, 0)).unwrap();
    fake.set_read_timeout(Some(Duration::from_millis(50))).unwrap();
    let addr = fake.local_addr().unwrap();
    let responder = std::thread::spawn(move || {
        let deadline = Instant::now() + Duration::from_millis(600);
        let mut buf = [0u8; 64];
        while Instant::now() < deadline {
            if let Ok((n, peer)) = fake.recv_from(&mut buf) {
                let mut packet = TimeSyncPacket::decode(&buf[..n]).unwrap();
                packet.client_id = packet.client_id.wrapping_add(1);
                packet.server_receive_ns = packet.client_send_ns;
                packet.server_send_ns = packet.client_send_ns;
                fake.send_to(&packet.encode(), peer).unwrap();
            }
        }
    });

    let mut client = TimeSyncClient::new(addr, &fast_settings()).unwrap();
    let result = client.sync_once();
    responder.join().unwrap();

    assert!(matches!(result, Err(ClockError::NoReplies(a)) if a == addr));
    assert!(client.last_sync().is_none());
}

#[test]
#[serial]
fn test_background_sync_publishes_estimate() {
    let (mut server, addr) = loopback_server();
    let client = TimeSyncClient::new(addr, &fast_settings()).unwrap();
    let mut handle = client.spawn().unwrap();

    let deadline = Instant::now() + Duration::from_secs(3);
    while handle.last_sync().is_none() && Instant::now() < deadline {
        std::thread::sleep(Duration::from_millis(20));
    }
    assert!(handle.last_sync().is_some());
    assert!(handle.offset_ns().abs() < 5_000_000);

    handle.stop();
    server.stop();
}
