//! Router pipeline
//!
//! Entry point for every received frame. Classifies Ethernet/ARP/IPv4
//! traffic and either answers locally (ARP replies, ICMP echo), forwards
//! via longest-prefix routing and ARP resolution, translates through the
//! NAT, or signals an error with ICMP. Also drives the two 1 Hz sweeper
//! threads that age the ARP cache and the NAT table.
//!
//! No lock is held across a `send_frame` call: the subsystems hand back
//! detached copies and the pipeline performs all sends itself.

use core::fmt;
use core::net::Ipv4Addr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_queue::SegQueue;

use crate::arpcache::{ArpCache, ArpCacheConfig, ArpRequest};
use crate::nat::{NatKind, NatTable, NatTimeouts};
use crate::net::arp::ArpPacket;
use crate::net::ethernet::{BROADCAST_MAC, ETHERTYPE_ARP, ETHERTYPE_IPV4, EthernetFrame};
use crate::net::icmp::{IcmpPacket, IcmpType, code};
use crate::net::ipv4::{Ipv4Header, Ipv4Packet, REPLY_TTL, RouteEntry, RoutingTable, protocol};
use crate::net::tcp::TcpPacket;

/// How often the sweeper threads wake
const SWEEP_INTERVAL: Duration = Duration::from_secs(1);

/// One virtual interface of the router. Read-only after construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Interface {
    /// Interface name, e.g. "eth1"
    pub name: String,
    /// MAC address of the interface
    pub mac: [u8; 6],
    /// IPv4 address owned by the interface
    pub ip: Ipv4Addr,
}

impl Interface {
    pub fn new(name: &str, mac: [u8; 6], ip: Ipv4Addr) -> Self {
        Self {
            name: name.to_string(),
            mac,
            ip,
        }
    }
}

/// Link-layer send primitive
///
/// Hands a complete Ethernet frame to the named virtual interface. The
/// transport buffers the frame and never blocks the caller.
pub trait FrameSink: Send + Sync {
    fn send_frame(&self, iface: &str, frame: &[u8]) -> Result<(), &'static str>;
}

/// In-memory sink collecting transmitted frames
///
/// Used by the demonstration binary and the test suite in place of a real
/// transport.
#[derive(Default)]
pub struct VecSink {
    frames: SegQueue<(String, Vec<u8>)>,
}

impl VecSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take the oldest transmitted frame, if any
    pub fn pop(&self) -> Option<(String, Vec<u8>)> {
        self.frames.pop()
    }

    /// Take every transmitted frame in order
    pub fn drain(&self) -> Vec<(String, Vec<u8>)> {
        let mut out = Vec::new();
        while let Some(frame) = self.frames.pop() {
            out.push(frame);
        }
        out
    }

    /// Number of frames waiting to be taken
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }
}

impl FrameSink for VecSink {
    fn send_frame(&self, iface: &str, frame: &[u8]) -> Result<(), &'static str> {
        self.frames.push((iface.to_string(), frame.to_vec()));
        Ok(())
    }
}

/// Router configuration supplied at init
#[derive(Debug, Clone)]
pub struct RouterConfig {
    /// Whether the NAT translates between `inside` and `outside`
    pub enable_nat: bool,
    /// Name of the interface facing the internal network
    pub inside: String,
    /// Name of the interface facing the external network
    pub outside: String,
    /// Idle timeouts for the NAT sweep
    pub nat_timeouts: NatTimeouts,
    /// ARP cache tunables
    pub arp: ArpCacheConfig,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            enable_nat: false,
            inside: "eth1".to_string(),
            outside: "eth2".to_string(),
            nat_timeouts: NatTimeouts::default(),
            arp: ArpCacheConfig::default(),
        }
    }
}

/// Construction errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouterError {
    /// The configuration names an interface that does not exist
    UnknownInterface(String),
}

impl fmt::Display for RouterError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RouterError::UnknownInterface(name) => {
                write!(f, "configuration names unknown interface {:?}", name)
            }
        }
    }
}

/// Why a frame's processing stopped
///
/// Reasons that carry an ICMP reply have already sent it by the time they
/// surface here; the rest are silent drops. Never propagated out of
/// `handle_frame`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DropReason {
    /// Short frame, bad checksum, or mismatched header fields
    Malformed(&'static str),
    /// ARP target is not a local IP
    NotForUs,
    /// Longest-prefix match found nothing
    NoRoute,
    /// TTL reached zero in transit
    TtlExpired,
    /// TCP/UDP to the router, or inbound NAT without a mapping
    PortUnreachable,
    /// The computed ICMP source is a router interface
    Suppressed,
}

impl fmt::Display for DropReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DropReason::Malformed(detail) => write!(f, "malformed frame ({})", detail),
            DropReason::NotForUs => write!(f, "not addressed to the router"),
            DropReason::NoRoute => write!(f, "no route to destination"),
            DropReason::TtlExpired => write!(f, "TTL expired in transit"),
            DropReason::PortUnreachable => write!(f, "port unreachable"),
            DropReason::Suppressed => write!(f, "error reply suppressed"),
        }
    }
}

/// The userspace router
pub struct Router {
    core: Arc<RouterCore>,
    stop: Arc<AtomicBool>,
    sweepers: Vec<JoinHandle<()>>,
}

impl Router {
    /// Build a router over the given interfaces, routes, and transport
    ///
    /// With NAT enabled the outside interface must exist; its address
    /// becomes the external side of every mapping.
    pub fn new(
        config: RouterConfig,
        interfaces: Vec<Interface>,
        routes: RoutingTable,
        sink: Arc<dyn FrameSink>,
    ) -> Result<Self, RouterError> {
        let nat = if config.enable_nat {
            let outside = interfaces
                .iter()
                .find(|iface| iface.name == config.outside)
                .ok_or_else(|| RouterError::UnknownInterface(config.outside.clone()))?;
            Some(NatTable::new(outside.ip, config.nat_timeouts))
        } else {
            None
        };

        let arp = ArpCache::with_config(config.arp.clone());

        Ok(Self {
            core: Arc::new(RouterCore {
                config,
                interfaces,
                routes,
                arp,
                nat,
                sink,
            }),
            stop: Arc::new(AtomicBool::new(false)),
            sweepers: Vec::new(),
        })
    }

    /// Process one received frame
    pub fn handle_frame(&self, recv_iface: &str, bytes: &[u8]) {
        self.core.handle_frame(recv_iface, bytes);
    }

    /// Run one ARP maintenance pass (what the sweeper thread does each second)
    pub fn arp_tick(&self, now: Instant) {
        self.core.arp_tick(now);
    }

    /// Run one NAT maintenance pass
    pub fn nat_tick(&self, now: Instant) {
        self.core.nat_tick(now);
    }

    /// The ARP resolver
    pub fn arp(&self) -> &ArpCache {
        &self.core.arp
    }

    /// The NAT table, when NAT is enabled
    pub fn nat(&self) -> Option<&NatTable> {
        self.core.nat.as_ref()
    }

    /// Spawn the 1 Hz ARP sweeper and (with NAT enabled) the NAT sweeper
    pub fn start_sweepers(&mut self) -> std::io::Result<()> {
        if !self.sweepers.is_empty() {
            return Ok(());
        }

        let core = Arc::clone(&self.core);
        let stop = Arc::clone(&self.stop);
        self.sweepers.push(
            thread::Builder::new()
                .name("arp-sweeper".to_string())
                .spawn(move || {
                    while !stop.load(Ordering::Relaxed) {
                        thread::sleep(SWEEP_INTERVAL);
                        if stop.load(Ordering::Relaxed) {
                            break;
                        }
                        core.arp_tick(Instant::now());
                    }
                })?,
        );

        if self.core.nat.is_some() {
            let core = Arc::clone(&self.core);
            let stop = Arc::clone(&self.stop);
            self.sweepers.push(
                thread::Builder::new()
                    .name("nat-sweeper".to_string())
                    .spawn(move || {
                        while !stop.load(Ordering::Relaxed) {
                            thread::sleep(SWEEP_INTERVAL);
                            if stop.load(Ordering::Relaxed) {
                                break;
                            }
                            core.nat_tick(Instant::now());
                        }
                    })?,
            );
        }

        Ok(())
    }

    /// Signal the sweepers to exit and join them
    pub fn shutdown(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
        for handle in self.sweepers.drain(..) {
            if handle.join().is_err() {
                log::warn!("sweeper thread panicked");
            }
        }
    }
}

impl Drop for Router {
    fn drop(&mut self) {
        self.shutdown();
    }
}

struct RouterCore {
    config: RouterConfig,
    interfaces: Vec<Interface>,
    routes: RoutingTable,
    arp: ArpCache,
    nat: Option<NatTable>,
    sink: Arc<dyn FrameSink>,
}

impl RouterCore {
    fn iface(&self, name: &str) -> Option<&Interface> {
        self.interfaces.iter().find(|iface| iface.name == name)
    }

    fn is_local_ip(&self, ip: Ipv4Addr) -> bool {
        self.interfaces.iter().any(|iface| iface.ip == ip)
    }

    /// Hand a frame to the transport; failures are logged and swallowed
    fn send(&self, iface: &str, frame: &[u8]) {
        match self.sink.send_frame(iface, frame) {
            Ok(()) => log::debug!("TX: {} bytes on {}", frame.len(), iface),
            Err(err) => log::warn!("TX: send on {} failed: {}", iface, err),
        }
    }

    fn handle_frame(&self, recv_iface: &str, bytes: &[u8]) {
        log::debug!("RX: {} bytes on {}", bytes.len(), recv_iface);
        if let Err(reason) = self.process(recv_iface, bytes) {
            log::debug!("RX: {} on {}", reason, recv_iface);
        }
    }

    fn process(&self, recv_iface: &str, bytes: &[u8]) -> Result<(), DropReason> {
        let recv = self
            .iface(recv_iface)
            .ok_or(DropReason::Malformed("frame from unknown interface"))?;

        let frame = EthernetFrame::from_bytes(bytes)
            .map_err(|_| DropReason::Malformed("short ethernet frame"))?;

        match frame.ethertype {
            ETHERTYPE_ARP => self.handle_arp(recv, &frame),
            ETHERTYPE_IPV4 => self.handle_ipv4(recv, &frame),
            other => {
                log::debug!("RX: ignoring ethertype {:#06x}", other);
                Ok(())
            }
        }
    }

    /// ARP: answer requests for our address, learn from replies
    fn handle_arp(&self, recv: &Interface, frame: &EthernetFrame) -> Result<(), DropReason> {
        let packet = ArpPacket::from_bytes(&frame.payload)
            .map_err(|_| DropReason::Malformed("bad arp packet"))?;

        if packet.target_ip != recv.ip {
            return Err(DropReason::NotForUs);
        }

        if packet.is_request() {
            let reply = ArpPacket::new_reply(recv.mac, recv.ip, packet.sender_mac, packet.sender_ip);
            let eth = EthernetFrame::new(frame.src_mac, recv.mac, ETHERTYPE_ARP, reply.to_bytes());
            self.send(&recv.name, &eth.to_bytes());
            return Ok(());
        }

        // ARP reply: cache the binding and release anything waiting on it
        if let Some(request) = self.arp.insert(packet.sender_mac, packet.sender_ip) {
            log::debug!(
                "ARP: resolved {}, draining {} pending frame(s)",
                request.ip,
                request.packets.len()
            );
            self.drain_request(request, packet.sender_mac);
        }
        Ok(())
    }

    /// Transmit the frames that were waiting on a resolved request
    fn drain_request(&self, request: ArpRequest, mac: [u8; 6]) {
        for pending in request.packets {
            if let Err(reason) = self.finish_forward(
                &pending.frame,
                mac,
                &pending.out_iface,
                pending.decrement_ttl,
            ) {
                log::warn!("ARP: pending frame for {} dropped: {}", request.ip, reason);
            }
        }
    }

    /// Complete a deferred transmission: fill Ethernet addresses, decrement
    /// the TTL for transit frames, recompute the IP checksum, send
    fn finish_forward(
        &self,
        bytes: &[u8],
        dst_mac: [u8; 6],
        out_iface: &str,
        decrement: bool,
    ) -> Result<(), DropReason> {
        let out = self
            .iface(out_iface)
            .ok_or(DropReason::Malformed("pending frame names unknown interface"))?;

        let mut frame = EthernetFrame::from_bytes(bytes)
            .map_err(|_| DropReason::Malformed("short ethernet frame"))?;
        if decrement {
            frame.payload = decrement_ttl(&frame.payload)?;
        }
        frame.dest_mac = dst_mac;
        frame.src_mac = out.mac;

        self.send(&out.name, &frame.to_bytes());
        Ok(())
    }

    /// IPv4: deliver locally or forward
    fn handle_ipv4(&self, recv: &Interface, frame: &EthernetFrame) -> Result<(), DropReason> {
        let (ip, _) = Ipv4Header::from_bytes(&frame.payload)
            .map_err(|_| DropReason::Malformed("bad ipv4 header"))?;
        let l4 = ip.payload(&frame.payload).to_vec();

        let mut local = self.is_local_ip(ip.dest_ip);

        // Translated reply traffic is addressed to the router's own outside
        // address; it belongs to the forwarding path, not to the router.
        if local && self.nat.is_some() && recv.name == self.config.outside {
            let echo_reply = ip.protocol == protocol::ICMP && l4.first() == Some(&0);
            if echo_reply || ip.protocol == protocol::TCP {
                local = false;
            }
        }

        if local {
            self.deliver_local(recv, frame, &ip, &l4)
        } else {
            self.forward(recv, frame, ip, l4)
        }
    }

    /// A packet addressed to one of the router's interfaces
    fn deliver_local(
        &self,
        recv: &Interface,
        frame: &EthernetFrame,
        ip: &Ipv4Header,
        l4: &[u8],
    ) -> Result<(), DropReason> {
        match ip.protocol {
            protocol::ICMP => {
                let icmp = IcmpPacket::from_bytes(l4)
                    .map_err(|_| DropReason::Malformed("bad icmp packet"))?;
                if icmp.is_echo_request() {
                    self.send_echo_reply(frame, ip, &icmp)
                } else {
                    log::debug!("ICMP: ignoring {} addressed to the router", icmp.icmp_type);
                    Ok(())
                }
            }
            protocol::TCP | protocol::UDP => {
                self.send_icmp_error(
                    recv,
                    frame,
                    ip,
                    IcmpType::DestinationUnreachable,
                    code::PORT_UNREACHABLE,
                )?;
                Err(DropReason::PortUnreachable)
            }
            other => {
                log::debug!("IPv4: ignoring protocol {} addressed to the router", other);
                Ok(())
            }
        }
    }

    /// Answer an echo request, emitting the reply through the forwarding path
    fn send_echo_reply(
        &self,
        frame: &EthernetFrame,
        ip: &Ipv4Header,
        request: &IcmpPacket,
    ) -> Result<(), DropReason> {
        let reply = IcmpPacket::create_echo_reply(request);

        let mut packet = Ipv4Packet::new(ip.dest_ip, ip.src_ip, protocol::ICMP, reply.to_bytes());
        packet.header.ttl = REPLY_TTL;

        let route = match self.routes.lookup(ip.src_ip) {
            Some(route) => route,
            None => {
                log::debug!("ICMP: no route back to {}, echo reply dropped", ip.src_ip);
                return Ok(());
            }
        };

        let eth = EthernetFrame::new(frame.src_mac, frame.dest_mac, ETHERTYPE_IPV4, packet.to_bytes());
        self.transmit_routed(eth, route, false)
    }

    /// Forward a transit packet, translating through the NAT when enabled
    fn forward(
        &self,
        recv: &Interface,
        frame: &EthernetFrame,
        mut ip: Ipv4Header,
        mut l4: Vec<u8>,
    ) -> Result<(), DropReason> {
        if ip.ttl <= 1 {
            self.send_icmp_error(recv, frame, &ip, IcmpType::TimeExceeded, code::TTL_EXPIRED)?;
            return Err(DropReason::TtlExpired);
        }

        if let Some(nat) = &self.nat {
            if recv.name == self.config.inside {
                self.nat_outbound(nat, &mut ip, &mut l4)?;
            } else if recv.name == self.config.outside {
                self.nat_inbound(nat, recv, frame, &mut ip, &mut l4)?;
            }
        }

        // Route on the (possibly rewritten) destination
        let route = match self.routes.lookup(ip.dest_ip) {
            Some(route) => route,
            None => {
                self.send_icmp_error(
                    recv,
                    frame,
                    &ip,
                    IcmpType::DestinationUnreachable,
                    code::NET_UNREACHABLE,
                )?;
                return Err(DropReason::NoRoute);
            }
        };

        ip.total_length = (ip.header_length() + l4.len()) as u16;
        let mut payload = ip.to_bytes();
        payload.extend_from_slice(&l4);

        // The original Ethernet addresses ride along until the next hop is
        // known; an abandoned resolution replies to the frame's source MAC.
        let eth = EthernetFrame::new(frame.dest_mac, frame.src_mac, ETHERTYPE_IPV4, payload);
        self.transmit_routed(eth, route, true)
    }

    /// Rewrite an internal-side packet to the router's external identity
    fn nat_outbound(
        &self,
        nat: &NatTable,
        ip: &mut Ipv4Header,
        l4: &mut Vec<u8>,
    ) -> Result<(), DropReason> {
        match ip.protocol {
            protocol::ICMP => {
                let mut icmp = IcmpPacket::from_bytes(l4)
                    .map_err(|_| DropReason::Malformed("bad icmp packet"))?;
                if !icmp.is_echo_request() {
                    return Ok(());
                }

                let mapping = nat
                    .lookup_internal(ip.src_ip, icmp.identifier, NatKind::Icmp, ip.dest_ip, 0, 0)
                    .unwrap_or_else(|| {
                        nat.insert_mapping(
                            ip.src_ip,
                            icmp.identifier,
                            NatKind::Icmp,
                            ip.dest_ip,
                            0,
                            0,
                        )
                    });

                ip.src_ip = mapping.external_ip;
                icmp.identifier = mapping.external_aux;
                *l4 = icmp.to_bytes();
                Ok(())
            }
            protocol::TCP => {
                let mut tcp = TcpPacket::from_bytes(l4)
                    .map_err(|_| DropReason::Malformed("bad tcp segment"))?;

                let mapping = nat
                    .lookup_internal(
                        ip.src_ip,
                        tcp.src_port,
                        NatKind::Tcp,
                        ip.dest_ip,
                        tcp.dest_port,
                        tcp.flags,
                    )
                    .unwrap_or_else(|| {
                        nat.insert_mapping(
                            ip.src_ip,
                            tcp.src_port,
                            NatKind::Tcp,
                            ip.dest_ip,
                            tcp.dest_port,
                            tcp.flags,
                        )
                    });

                ip.src_ip = mapping.external_ip;
                tcp.src_port = mapping.external_aux;
                *l4 = tcp.to_bytes(ip.src_ip, ip.dest_ip);
                Ok(())
            }
            // UDP and the rest cross untranslated
            _ => Ok(()),
        }
    }

    /// Rewrite a reply-direction packet back to its internal host
    fn nat_inbound(
        &self,
        nat: &NatTable,
        recv: &Interface,
        frame: &EthernetFrame,
        ip: &mut Ipv4Header,
        l4: &mut Vec<u8>,
    ) -> Result<(), DropReason> {
        match ip.protocol {
            protocol::ICMP => {
                let mut icmp = IcmpPacket::from_bytes(l4)
                    .map_err(|_| DropReason::Malformed("bad icmp packet"))?;
                if !icmp.is_echo_reply() && !icmp.is_echo_request() {
                    return Ok(());
                }

                match nat.lookup_external(icmp.identifier, NatKind::Icmp, ip.src_ip, 0, 0) {
                    Some(mapping) => {
                        ip.dest_ip = mapping.internal_ip;
                        icmp.identifier = mapping.internal_aux;
                        *l4 = icmp.to_bytes();
                        Ok(())
                    }
                    None => {
                        self.send_icmp_error(
                            recv,
                            frame,
                            ip,
                            IcmpType::DestinationUnreachable,
                            code::PORT_UNREACHABLE,
                        )?;
                        Err(DropReason::PortUnreachable)
                    }
                }
            }
            protocol::TCP => {
                let mut tcp = TcpPacket::from_bytes(l4)
                    .map_err(|_| DropReason::Malformed("bad tcp segment"))?;

                match nat.lookup_external(
                    tcp.dest_port,
                    NatKind::Tcp,
                    ip.src_ip,
                    tcp.src_port,
                    tcp.flags,
                ) {
                    Some(mapping) => {
                        ip.dest_ip = mapping.internal_ip;
                        tcp.dest_port = mapping.internal_aux;
                        *l4 = tcp.to_bytes(ip.src_ip, ip.dest_ip);
                        Ok(())
                    }
                    None => {
                        self.send_icmp_error(
                            recv,
                            frame,
                            ip,
                            IcmpType::DestinationUnreachable,
                            code::PORT_UNREACHABLE,
                        )?;
                        Err(DropReason::PortUnreachable)
                    }
                }
            }
            _ => Ok(()),
        }
    }

    /// Transmit toward a route's next hop, resolving it via ARP
    ///
    /// On a cache hit the frame leaves immediately; on a miss one broadcast
    /// probe goes out and the frame waits in the request queue. Transit
    /// frames have their TTL decremented exactly once, at actual
    /// transmission (here on a hit, in `finish_forward` when a queued frame
    /// drains); replies the router originates pass `decrement = false` and
    /// keep their TTL on both paths.
    fn transmit_routed(
        &self,
        mut frame: EthernetFrame,
        route: &RouteEntry,
        decrement: bool,
    ) -> Result<(), DropReason> {
        let out = self
            .iface(&route.iface)
            .ok_or(DropReason::Malformed("route names unknown interface"))?;

        match self.arp.lookup(route.gateway) {
            Some(mac) => {
                if decrement {
                    frame.payload = decrement_ttl(&frame.payload)?;
                }
                frame.dest_mac = mac;
                frame.src_mac = out.mac;
                self.send(&out.name, &frame.to_bytes());
            }
            None => {
                let bytes = frame.to_bytes();
                self.send_arp_probe(route.gateway, out);
                self.arp
                    .queue_request(route.gateway, &bytes, &route.iface, decrement);
                log::debug!("ARP: frame queued awaiting resolution of {}", route.gateway);
            }
        }
        Ok(())
    }

    /// Broadcast one ARP request for `target` out of `out`
    fn send_arp_probe(&self, target: Ipv4Addr, out: &Interface) {
        let probe = ArpPacket::new_request(out.mac, out.ip, target);
        let eth = EthernetFrame::new(BROADCAST_MAC, out.mac, ETHERTYPE_ARP, probe.to_bytes());
        self.send(&out.name, &eth.to_bytes());
    }

    /// Build and send an ICMP error (types 3 and 11) about `frame`
    ///
    /// The reply leaves on the interface of the route back to the offending
    /// source (falling back to the receiving interface) with that
    /// interface's address as IP source; port-unreachable keeps the
    /// destination address the sender originally targeted. Errors about the
    /// router's own packets are suppressed.
    fn send_icmp_error(
        &self,
        recv: &Interface,
        frame: &EthernetFrame,
        ip: &Ipv4Header,
        icmp_type: IcmpType,
        icmp_code: u8,
    ) -> Result<(), DropReason> {
        if self.is_local_ip(ip.src_ip) {
            return Err(DropReason::Suppressed);
        }

        let out = self
            .routes
            .lookup(ip.src_ip)
            .and_then(|route| self.iface(&route.iface))
            .unwrap_or(recv);

        let source_ip = if icmp_type == IcmpType::DestinationUnreachable
            && icmp_code == code::PORT_UNREACHABLE
        {
            ip.dest_ip
        } else {
            out.ip
        };

        let cited_len = ip.header_length() + 8;
        let cited = &frame.payload[..frame.payload.len().min(cited_len)];
        let icmp = IcmpPacket::new_error(icmp_type, icmp_code, cited);

        let mut packet = Ipv4Packet::new(source_ip, ip.src_ip, protocol::ICMP, icmp.to_bytes());
        packet.header.ttl = REPLY_TTL;

        let eth = EthernetFrame::new(frame.src_mac, out.mac, ETHERTYPE_IPV4, packet.to_bytes());
        self.send(&out.name, &eth.to_bytes());
        Ok(())
    }

    /// One ARP maintenance pass: invalidate stale entries, probe or abandon
    /// outstanding requests
    fn arp_tick(&self, now: Instant) {
        let pass = self.arp.sweep(now);

        for (target, iface_name) in pass.retransmit {
            match self.iface(&iface_name) {
                Some(out) => self.send_arp_probe(target, out),
                None => log::warn!("ARP: request for {} names unknown interface", target),
            }
        }

        for request in pass.expired {
            log::info!(
                "ARP: giving up on {} after {} probe(s)",
                request.ip,
                request.times_sent()
            );
            self.fail_pending(request);
        }
    }

    /// Send host-unreachable to the source of every frame an abandoned
    /// request was holding
    fn fail_pending(&self, request: ArpRequest) {
        for pending in request.packets {
            let Ok(frame) = EthernetFrame::from_bytes(&pending.frame) else {
                continue;
            };
            let Ok((ip, _)) = Ipv4Header::from_bytes(&frame.payload) else {
                continue;
            };
            let Some(fallback) = self.iface(&pending.out_iface) else {
                continue;
            };

            if let Err(reason) = self.send_icmp_error(
                fallback,
                &frame,
                &ip,
                IcmpType::DestinationUnreachable,
                code::HOST_UNREACHABLE,
            ) {
                log::debug!("ARP: host-unreachable for {} not sent: {}", ip.src_ip, reason);
            }
        }
    }

    /// One NAT maintenance pass
    fn nat_tick(&self, now: Instant) {
        if let Some(nat) = &self.nat {
            nat.sweep(now);
        }
    }
}

/// Return `payload` with its IPv4 TTL decremented and checksum recomputed
fn decrement_ttl(payload: &[u8]) -> Result<Vec<u8>, DropReason> {
    let (mut ip, _) =
        Ipv4Header::from_bytes(payload).map_err(|_| DropReason::Malformed("bad ipv4 header"))?;
    let body = ip.payload(payload).to_vec();

    ip.ttl -= 1;

    let mut out = ip.to_bytes();
    out.extend_from_slice(&body);
    Ok(out)
}
