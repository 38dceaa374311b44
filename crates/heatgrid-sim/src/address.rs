//! Address provider for workers

use std::net::UdpSocket;

use heatgrid_core::Rank;
use heatgrid_wire::{AddressRecord, IP_FIELD_SIZE};

/// Outbound IPv4/IPv6 address of this host, found by connecting a UDP
/// socket (no packet is sent)
fn outbound_ip() -> Option<String> {
    let socket = UdpSocket::bind("0.0.0.0:0").ok()?;
    socket.connect("192.0.2.1:9").ok()?;
    Some(socket.local_addr().ok()?.ip().to_string())
}

/// Address record for a worker rank
///
/// All workers share the host IP; the MAC is a locally administered one
/// derived from the rank.
pub fn worker_address(rank: Rank, host_ip: &str) -> AddressRecord {
    AddressRecord::new(
        format!("02:00:00:00:{:02x}:{:02x}", (rank.0 >> 8) & 0xff, rank.0 & 0xff),
        host_ip,
    )
}

/// Host IP that fits an address record, loopback otherwise
pub fn host_ip() -> String {
    outbound_ip()
        .filter(|ip| ip.len() <= IP_FIELD_SIZE)
        .unwrap_or_else(|| "127.0.0.1".to_string())
}
