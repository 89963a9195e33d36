//! Common test utilities and helpers

#![allow(dead_code)] // Test utilities may not all be used in every test file

pub mod builders;

use crossbeam_channel::Receiver;
use std::net::Ipv4Addr;
use std::time::{Duration, Instant};
use synapse_dataplane::config::{DeviceSettings, TransportSettings};
use synapse_dataplane::pipeline::{Device, Record};

/// How long integration tests wait for data to show up
pub fn test_timeout() -> Duration {
    Duration::from_secs(3)
}

/// Transport settings that keep every socket on loopback with OS-chosen ports
pub fn loopback_transport() -> TransportSettings {
    TransportSettings {
        iface_ip: Ipv4Addr::LOCALHOST,
        base_port: 0,
        receive_buffer_bytes: 256 * 1024,
        ..Default::default()
    }
}

pub fn loopback_device() -> Device {
    Device::new(DeviceSettings::default(), loopback_transport())
}

/// Collect records from a tap until `count` arrived or the timeout passed
pub fn collect(tap: &Receiver<Record>, count: usize, timeout: Duration) -> Vec<Record> {
    let deadline = Instant::now() + timeout;
    let mut records = Vec::new();
    while records.len() < count {
        let remaining = deadline.saturating_duration_since(Instant::now());
        match tap.recv_timeout(remaining) {
            Ok(record) => records.push(record),
            Err(_) => break,
        }
    }
    records
}
