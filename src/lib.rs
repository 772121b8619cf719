//! vrouter - a userspace IPv4 router with NAT
//!
//! Receives raw Ethernet frames on virtual interfaces, decides what to do
//! with each one (reply, forward, drop, or signal an error via ICMP), and
//! emits frames back through a pluggable transport. Three subsystems make
//! up the core:
//!
//! - the packet pipeline ([`router`]): parse, validate, transform, dispatch
//! - the ARP resolver ([`arpcache`]): a concurrent IP-to-MAC cache plus a
//!   queue of frames waiting on resolution, aged by a 1 Hz sweeper
//! - the NAT table ([`nat`]): endpoint-independent ICMP/TCP translation
//!   with per-flow connection state machines and idle timeouts
//!
//! Wire formats live under [`net`]. The routing table and interface list
//! are loaded before the first frame arrives and never mutated afterwards.
//!
//! ```no_run
//! use std::sync::Arc;
//! use vrouter::net::ipv4::{Ipv4Addr, RouteEntry, RoutingTable};
//! use vrouter::router::{Interface, Router, RouterConfig, VecSink};
//!
//! let interfaces = vec![
//!     Interface::new("eth1", [0x02, 0, 0, 0, 0, 0x01], Ipv4Addr::new(10, 0, 1, 1)),
//!     Interface::new("eth2", [0x02, 0, 0, 0, 0, 0x02], Ipv4Addr::new(172, 64, 3, 1)),
//! ];
//! let routes = RoutingTable::new(vec![RouteEntry::new(
//!     Ipv4Addr::new(10, 0, 1, 0),
//!     Ipv4Addr::new(255, 255, 255, 0),
//!     Ipv4Addr::new(10, 0, 1, 11),
//!     "eth1",
//! )]);
//!
//! let sink = Arc::new(VecSink::new());
//! let mut router = Router::new(RouterConfig::default(), interfaces, routes, sink.clone())
//!     .expect("valid configuration");
//! router.start_sweepers().expect("spawn sweepers");
//!
//! // frames from the transport go in ...
//! router.handle_frame("eth1", &[0u8; 64]);
//! // ... and come back out through the sink
//! while let Some((iface, frame)) = sink.pop() {
//!     println!("{} -> {} bytes", iface, frame.len());
//! }
//! ```

pub mod arpcache;
pub mod logger;
pub mod nat;
pub mod net;
pub mod router;

pub use arpcache::{ArpCache, ArpCacheConfig};
pub use nat::{NatKind, NatTable, NatTimeouts};
pub use router::{FrameSink, Interface, Router, RouterConfig, VecSink};
