//! Demonstration driver: a two-interface router with NAT in front of an
//! in-memory transport. Feeds a few canonical frames through the pipeline
//! and prints what the router emits.

use std::sync::Arc;

use log::LevelFilter;

use vrouter::logger;
use vrouter::net::arp::ArpPacket;
use vrouter::net::ethernet::{BROADCAST_MAC, ETHERTYPE_ARP, ETHERTYPE_IPV4, EthernetFrame, format_mac};
use vrouter::net::icmp::IcmpPacket;
use vrouter::net::ipv4::{Ipv4Addr, Ipv4Packet, protocol};
use vrouter::net::ipv4::{RouteEntry, RoutingTable};
use vrouter::router::{Interface, Router, RouterConfig, VecSink};

const ETH1_MAC: [u8; 6] = [0x02, 0x00, 0x00, 0x00, 0x01, 0x01];
const ETH2_MAC: [u8; 6] = [0x02, 0x00, 0x00, 0x00, 0x01, 0x02];
const HOST_MAC: [u8; 6] = [0xAA, 0xAA, 0xAA, 0xAA, 0xAA, 0x01];
const UPSTREAM_MAC: [u8; 6] = [0xBB, 0xBB, 0xBB, 0xBB, 0xBB, 0x01];

const ETH1_IP: Ipv4Addr = Ipv4Addr::new(10, 0, 1, 1);
const ETH2_IP: Ipv4Addr = Ipv4Addr::new(172, 64, 3, 1);
const HOST_IP: Ipv4Addr = Ipv4Addr::new(10, 0, 1, 11);
const UPSTREAM_IP: Ipv4Addr = Ipv4Addr::new(172, 64, 3, 10);

fn main() {
    logger::init(LevelFilter::Info);

    let interfaces = vec![
        Interface::new("eth1", ETH1_MAC, ETH1_IP),
        Interface::new("eth2", ETH2_MAC, ETH2_IP),
    ];
    let routes = RoutingTable::new(vec![
        RouteEntry::new(
            Ipv4Addr::new(10, 0, 1, 0),
            Ipv4Addr::new(255, 255, 255, 0),
            HOST_IP,
            "eth1",
        ),
        RouteEntry::new(
            Ipv4Addr::new(0, 0, 0, 0),
            Ipv4Addr::new(0, 0, 0, 0),
            UPSTREAM_IP,
            "eth2",
        ),
    ]);

    let config = RouterConfig {
        enable_nat: true,
        ..RouterConfig::default()
    };

    let sink = Arc::new(VecSink::new());
    let mut router = Router::new(config, interfaces, routes, sink.clone())
        .expect("demo configuration is valid");
    router.start_sweepers().expect("sweeper threads spawn");

    // An internal host asks who owns the router's inside address
    log::info!("--- ARP request for {} on eth1", ETH1_IP);
    let who_has = ArpPacket::new_request(HOST_MAC, HOST_IP, ETH1_IP);
    let frame = EthernetFrame::new(BROADCAST_MAC, HOST_MAC, ETHERTYPE_ARP, who_has.to_bytes());
    router.handle_frame("eth1", &frame.to_bytes());
    report(&sink);

    // The host pings 8.8.8.8 through the NAT; the next hop is unresolved,
    // so the router probes for the upstream gateway first
    log::info!("--- ICMP echo request {} -> 8.8.8.8 (id 0x1234) on eth1", HOST_IP);
    let ping = IcmpPacket::new_echo_request(0x1234, 1, b"vrouter demo".to_vec());
    let packet = Ipv4Packet::new(HOST_IP, Ipv4Addr::new(8, 8, 8, 8), protocol::ICMP, ping.to_bytes());
    let frame = EthernetFrame::new(ETH1_MAC, HOST_MAC, ETHERTYPE_IPV4, packet.to_bytes());
    router.handle_frame("eth1", &frame.to_bytes());
    report(&sink);

    // The upstream gateway answers the probe and the queued ping drains
    log::info!("--- ARP reply {} is-at {} on eth2", UPSTREAM_IP, format_mac(&UPSTREAM_MAC));
    let is_at = ArpPacket::new_reply(UPSTREAM_MAC, UPSTREAM_IP, ETH2_MAC, ETH2_IP);
    let frame = EthernetFrame::new(ETH2_MAC, UPSTREAM_MAC, ETHERTYPE_ARP, is_at.to_bytes());
    router.handle_frame("eth2", &frame.to_bytes());
    report(&sink);

    if let Some(nat) = router.nat() {
        for mapping in nat.mappings() {
            log::info!(
                "NAT mapping: {:?} {}:{} <-> {}:{}",
                mapping.kind,
                mapping.internal_ip,
                mapping.internal_aux,
                mapping.external_ip,
                mapping.external_aux
            );
        }
    }

    router.shutdown();
}

/// Print a one-line summary of every frame the router just emitted
fn report(sink: &VecSink) {
    for (iface, bytes) in sink.drain() {
        let Ok(frame) = EthernetFrame::from_bytes(&bytes) else {
            continue;
        };
        match frame.ethertype {
            ETHERTYPE_ARP => log::info!(
                "emitted on {}: ARP, {} bytes, dst {}",
                iface,
                bytes.len(),
                format_mac(&frame.dest_mac)
            ),
            ETHERTYPE_IPV4 => match Ipv4Packet::from_bytes(&frame.payload) {
                Ok(packet) => log::info!(
                    "emitted on {}: IPv4 {} -> {} proto {} ttl {}, {} bytes",
                    iface,
                    packet.header.src_ip,
                    packet.header.dest_ip,
                    packet.header.protocol,
                    packet.header.ttl,
                    bytes.len()
                ),
                Err(err) => log::warn!("emitted on {}: unparseable IPv4 ({})", iface, err),
            },
            other => log::info!("emitted on {}: ethertype {:#06x}", iface, other),
        }
    }
}
