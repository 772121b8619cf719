//! Endpoint-independent NAT for ICMP echo and TCP
//!
//! One (internal IP, internal port/id) pair maps to exactly one external
//! port on the router's outside address, regardless of peer. TCP mappings
//! carry per-peer connection records whose state advances with the control
//! flags observed in each direction; a once-per-second sweep expires idle
//! mappings and connections.
//!
//! Lookups and inserts serialize on one interior lock and return cloned
//! mappings, so callers never hold the lock while rewriting packets.

use core::net::Ipv4Addr;
use std::time::{Duration, Instant};

use spin::Mutex;

use crate::net::tcp::{TcpState, flags};

/// First external port the allocator will hand out
pub const NAT_PORT_MIN: u16 = 1024;

/// Last external port the allocator will hand out
pub const NAT_PORT_MAX: u16 = 65535;

/// Idle timeouts for the sweep pass
#[derive(Debug, Clone, Copy)]
pub struct NatTimeouts {
    /// Lifetime of an idle ICMP mapping
    pub icmp: Duration,
    /// Lifetime of an idle established TCP connection
    pub tcp_established: Duration,
    /// Lifetime of an idle TCP connection in any other state
    pub tcp_transitory: Duration,
}

impl Default for NatTimeouts {
    fn default() -> Self {
        Self {
            icmp: Duration::from_secs(60),
            tcp_established: Duration::from_secs(7440),
            tcp_transitory: Duration::from_secs(300),
        }
    }
}

/// Which traffic class a mapping translates
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NatKind {
    /// ICMP echo, keyed by the 16-bit identifier
    Icmp,
    /// TCP, keyed by port
    Tcp,
}

/// One tracked TCP peer within a mapping
#[derive(Debug, Clone)]
pub struct NatConn {
    /// Remote endpoint address
    pub peer_ip: Ipv4Addr,
    /// Remote endpoint port
    pub peer_port: u16,
    /// Connection state as seen by the translator
    pub state: TcpState,
    /// Stamped on every observed packet of this connection
    pub last_updated: Instant,
}

/// One translation entry
#[derive(Debug, Clone)]
pub struct NatMapping {
    /// Traffic class
    pub kind: NatKind,
    /// Host address on the inside network
    pub internal_ip: Ipv4Addr,
    /// The router's outside address
    pub external_ip: Ipv4Addr,
    /// Port (TCP) or echo identifier (ICMP) used by the internal host
    pub internal_aux: u16,
    /// Allocated port/identifier visible to the outside
    pub external_aux: u16,
    /// Stamped on every packet that references this mapping
    pub last_updated: Instant,
    /// Per-peer TCP connections; empty for ICMP
    pub conns: Vec<NatConn>,
}

/// Advance a connection state for a packet seen from the internal side
///
/// Implements the internal-direction rows of the translation state table;
/// any other (flags, state) combination leaves the state unchanged. Flags
/// other than ACK/SYN/FIN are ignored.
pub fn advance_internal(state: TcpState, tcp_flags: u8) -> TcpState {
    let ack = tcp_flags & flags::ACK != 0;
    let syn = tcp_flags & flags::SYN != 0;
    let fin = tcp_flags & flags::FIN != 0;

    match (ack, syn, fin, state) {
        (false, true, false, _) => TcpState::SynSent,
        (true, false, false, TcpState::SynSent) => TcpState::Established,
        (false, false, true, TcpState::Established) => TcpState::FinWait1,
        (false, false, true, TcpState::CloseWait) => TcpState::LastAck,
        (true, false, false, TcpState::FinWait1) => TcpState::Closing,
        _ => state,
    }
}

/// Advance a connection state for a packet seen from the external side
///
/// Implements the external-direction rows of the translation state table;
/// any other (flags, state) combination leaves the state unchanged.
pub fn advance_external(state: TcpState, tcp_flags: u8) -> TcpState {
    let ack = tcp_flags & flags::ACK != 0;
    let syn = tcp_flags & flags::SYN != 0;
    let fin = tcp_flags & flags::FIN != 0;

    match (ack, syn, fin, state) {
        (false, true, false, _) => TcpState::SynReceived,
        (true, false, false, TcpState::SynReceived) => TcpState::Established,
        (false, false, true, TcpState::Established) => TcpState::CloseWait,
        (true, false, true, TcpState::FinWait1) => TcpState::FinWait2,
        (false, false, true, TcpState::FinWait1) => TcpState::Closing,
        (false, false, true, TcpState::FinWait2) => TcpState::TimeWait,
        (true, false, false, TcpState::Closing) => TcpState::TimeWait,
        (true, false, false, TcpState::LastAck) => TcpState::Closed,
        _ => state,
    }
}

struct NatInner {
    mappings: Vec<NatMapping>,
}

/// The translation table
pub struct NatTable {
    /// Address every mapping is translated to (the outside interface IP)
    external_ip: Ipv4Addr,
    timeouts: NatTimeouts,
    inner: Mutex<NatInner>,
}

impl NatTable {
    /// Create an empty table translating to `external_ip`
    pub fn new(external_ip: Ipv4Addr, timeouts: NatTimeouts) -> Self {
        Self {
            external_ip,
            timeouts,
            inner: Mutex::new(NatInner {
                mappings: Vec::new(),
            }),
        }
    }

    /// Find the mapping for an internal (ip, aux) pair
    ///
    /// For TCP the (peer, flags) observation is applied to the per-peer
    /// connection, creating the record when this peer is new.
    ///
    /// # Returns
    /// A clone of the mapping, or `None` when the flow is unknown.
    pub fn lookup_internal(
        &self,
        internal_ip: Ipv4Addr,
        internal_aux: u16,
        kind: NatKind,
        peer_ip: Ipv4Addr,
        peer_port: u16,
        tcp_flags: u8,
    ) -> Option<NatMapping> {
        let now = Instant::now();
        let mut inner = self.inner.lock();

        let mapping = inner.mappings.iter_mut().find(|m| {
            m.kind == kind && m.internal_ip == internal_ip && m.internal_aux == internal_aux
        })?;

        if kind == NatKind::Tcp {
            observe(mapping, peer_ip, peer_port, tcp_flags, now, advance_internal);
        }
        mapping.last_updated = now;

        Some(mapping.clone())
    }

    /// Find the mapping for an external port/identifier
    ///
    /// Symmetric to [`lookup_internal`](Self::lookup_internal) for the
    /// reply direction.
    pub fn lookup_external(
        &self,
        external_aux: u16,
        kind: NatKind,
        peer_ip: Ipv4Addr,
        peer_port: u16,
        tcp_flags: u8,
    ) -> Option<NatMapping> {
        let now = Instant::now();
        let mut inner = self.inner.lock();

        let mapping = inner
            .mappings
            .iter_mut()
            .find(|m| m.kind == kind && m.external_aux == external_aux)?;

        if kind == NatKind::Tcp {
            observe(mapping, peer_ip, peer_port, tcp_flags, now, advance_external);
        }
        mapping.last_updated = now;

        Some(mapping.clone())
    }

    /// Create the mapping for an internal flow, or return the existing one
    ///
    /// The internal key is re-checked under the lock: a concurrent receive
    /// thread may have created the mapping between the caller's lookup and
    /// this call, and `(internal_ip, internal_aux, kind)` stays unique. An
    /// existing mapping absorbs the (peer, flags) observation exactly as
    /// [`lookup_internal`](Self::lookup_internal) would.
    ///
    /// A fresh mapping gets the first free external port in
    /// [`NAT_PORT_MIN`]..=[`NAT_PORT_MAX`] across mappings of every kind,
    /// and for TCP one connection for `peer` whose state is immediately
    /// advanced by `tcp_flags`.
    ///
    /// # Returns
    /// A clone of the inserted (or already present) mapping.
    pub fn insert_mapping(
        &self,
        internal_ip: Ipv4Addr,
        internal_aux: u16,
        kind: NatKind,
        peer_ip: Ipv4Addr,
        peer_port: u16,
        tcp_flags: u8,
    ) -> NatMapping {
        let now = Instant::now();
        let mut inner = self.inner.lock();

        if let Some(mapping) = inner.mappings.iter_mut().find(|m| {
            m.kind == kind && m.internal_ip == internal_ip && m.internal_aux == internal_aux
        }) {
            if kind == NatKind::Tcp {
                observe(mapping, peer_ip, peer_port, tcp_flags, now, advance_internal);
            }
            mapping.last_updated = now;
            return mapping.clone();
        }

        let external_aux = allocate_port(&inner.mappings);

        let conns = match kind {
            NatKind::Icmp => Vec::new(),
            NatKind::Tcp => vec![NatConn {
                peer_ip,
                peer_port,
                state: advance_internal(TcpState::Listen, tcp_flags),
                last_updated: now,
            }],
        };

        let mapping = NatMapping {
            kind,
            internal_ip,
            external_ip: self.external_ip,
            internal_aux,
            external_aux,
            last_updated: now,
            conns,
        };

        log::debug!(
            "NAT: new {:?} mapping {}:{} -> {}:{}",
            kind,
            internal_ip,
            internal_aux,
            self.external_ip,
            external_aux
        );

        inner.mappings.push(mapping.clone());
        mapping
    }

    /// One maintenance pass: drop idle mappings and connections
    ///
    /// # Returns
    /// Number of mappings removed.
    pub fn sweep(&self, now: Instant) -> usize {
        let timeouts = self.timeouts;
        let mut inner = self.inner.lock();
        let before = inner.mappings.len();

        inner.mappings.retain_mut(|m| match m.kind {
            NatKind::Icmp => now.saturating_duration_since(m.last_updated) < timeouts.icmp,
            NatKind::Tcp => {
                m.conns.retain(|conn| {
                    let timeout = if conn.state == TcpState::Established {
                        timeouts.tcp_established
                    } else {
                        timeouts.tcp_transitory
                    };
                    now.saturating_duration_since(conn.last_updated) < timeout
                });
                !m.conns.is_empty()
            }
        });

        let removed = before - inner.mappings.len();
        if removed > 0 {
            log::debug!("NAT: swept {} idle mapping(s)", removed);
        }
        removed
    }

    /// Snapshot of all current mappings
    pub fn mappings(&self) -> Vec<NatMapping> {
        self.inner.lock().mappings.clone()
    }
}

/// Apply one (peer, flags) observation to a TCP mapping
fn observe(
    mapping: &mut NatMapping,
    peer_ip: Ipv4Addr,
    peer_port: u16,
    tcp_flags: u8,
    now: Instant,
    advance: fn(TcpState, u8) -> TcpState,
) {
    if let Some(conn) = mapping
        .conns
        .iter_mut()
        .find(|c| c.peer_ip == peer_ip && c.peer_port == peer_port)
    {
        conn.state = advance(conn.state, tcp_flags);
        conn.last_updated = now;
        return;
    }

    mapping.conns.push(NatConn {
        peer_ip,
        peer_port,
        state: advance(TcpState::Listen, tcp_flags),
        last_updated: now,
    });
}

/// First external port in range unused by any mapping of any kind
fn allocate_port(mappings: &[NatMapping]) -> u16 {
    for port in NAT_PORT_MIN..=NAT_PORT_MAX {
        if !mappings.iter().any(|m| m.external_aux == port) {
            return port;
        }
    }
    // Range exhausted: the sweep reclaims ports long before 64512 live
    // mappings accumulate.
    NAT_PORT_MIN
}
