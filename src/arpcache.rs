//! ARP resolver state: IP-to-MAC cache and outstanding-request queue
//!
//! The cache is a fixed-capacity table of bindings with per-entry insertion
//! timestamps. Frames that cannot be transmitted yet wait inside their
//! request; a once-per-second sweep (driven by the router) retries each
//! outstanding request and abandons it after too many unanswered probes.
//!
//! All operations serialize on one interior lock and hand detached data
//! back to the caller, so no lock is held while frames are sent.

use core::net::Ipv4Addr;
use std::time::{Duration, Instant};

use spin::Mutex;

/// Default cache capacity
pub const ARP_CACHE_SIZE: usize = 100;

/// Default lifetime of a cache entry
pub const ARP_ENTRY_TIMEOUT: Duration = Duration::from_secs(15);

/// Default number of probes before a request is abandoned
pub const ARP_MAX_PROBES: u32 = 5;

/// Default spacing between probes for one request
pub const ARP_RESEND_INTERVAL: Duration = Duration::from_secs(1);

/// Tunables for the cache and its sweep pass
#[derive(Debug, Clone)]
pub struct ArpCacheConfig {
    /// Maximum number of cached bindings
    pub capacity: usize,
    /// How long a binding stays valid
    pub entry_timeout: Duration,
    /// Probes sent for a request before giving up
    pub max_probes: u32,
    /// Minimum spacing between probes
    pub resend_interval: Duration,
}

impl Default for ArpCacheConfig {
    fn default() -> Self {
        Self {
            capacity: ARP_CACHE_SIZE,
            entry_timeout: ARP_ENTRY_TIMEOUT,
            max_probes: ARP_MAX_PROBES,
            resend_interval: ARP_RESEND_INTERVAL,
        }
    }
}

/// A cached IP-to-MAC binding
#[derive(Debug, Clone, Copy)]
pub struct ArpEntry {
    /// IP address of the binding
    pub ip: Ipv4Addr,
    /// MAC address associated with the IP
    pub mac: [u8; 6],
    /// When the binding was inserted
    pub added: Instant,
}

/// A frame waiting for ARP resolution of its next hop
#[derive(Debug, Clone)]
pub struct PendingFrame {
    /// Complete Ethernet frame; its addresses are rewritten when the
    /// resolution arrives
    pub frame: Vec<u8>,
    /// Interface the frame will be transmitted on
    pub out_iface: String,
    /// Whether the IPv4 TTL is decremented at transmission. Transit frames
    /// are; replies the router originates keep their TTL.
    pub decrement_ttl: bool,
}

/// An outstanding resolution for one next-hop IP
#[derive(Debug)]
pub struct ArpRequest {
    /// IP being resolved
    pub ip: Ipv4Addr,
    /// When the last probe went out (None until the first probe)
    sent: Option<Instant>,
    /// Number of probes sent so far
    times_sent: u32,
    /// Frames waiting on this resolution
    pub packets: Vec<PendingFrame>,
}

impl ArpRequest {
    /// Number of probes sent for this request
    pub fn times_sent(&self) -> u32 {
        self.times_sent
    }
}

/// Result of one sweep pass. The caller performs the sends.
#[derive(Debug, Default)]
pub struct ArpSweep {
    /// Requests due for another probe: (target IP, interface to probe on)
    pub retransmit: Vec<(Ipv4Addr, String)>,
    /// Requests that exhausted their probes, detached with their frames
    pub expired: Vec<ArpRequest>,
}

struct ArpCacheInner {
    /// Fixed-capacity entry table; None marks a free slot
    entries: Vec<Option<ArpEntry>>,
    /// Outstanding requests (order is not significant)
    requests: Vec<ArpRequest>,
}

/// Concurrent ARP cache plus request queue
pub struct ArpCache {
    config: ArpCacheConfig,
    inner: Mutex<ArpCacheInner>,
}

impl ArpCache {
    /// Create a cache with the default configuration
    pub fn new() -> Self {
        Self::with_config(ArpCacheConfig::default())
    }

    /// Create a cache with explicit tunables
    pub fn with_config(config: ArpCacheConfig) -> Self {
        let mut entries = Vec::with_capacity(config.capacity);
        entries.resize_with(config.capacity, || None);

        Self {
            config,
            inner: Mutex::new(ArpCacheInner {
                entries,
                requests: Vec::new(),
            }),
        }
    }

    /// Look up the MAC for an IP
    ///
    /// # Returns
    /// A copy of the binding's MAC, or `None` when the IP is not cached.
    /// Expired bindings are invalidated by the sweep before they can be
    /// returned here.
    pub fn lookup(&self, ip: Ipv4Addr) -> Option<[u8; 6]> {
        let inner = self.inner.lock();

        inner
            .entries
            .iter()
            .flatten()
            .find(|entry| entry.ip == ip)
            .map(|entry| entry.mac)
    }

    /// Queue a frame behind the resolution of `ip`
    ///
    /// Finds or creates the request for `ip` and appends a deep copy of the
    /// frame, labeled with the interface it must eventually leave on and
    /// whether its TTL is still to be decremented.
    pub fn queue_request(&self, ip: Ipv4Addr, frame: &[u8], out_iface: &str, decrement_ttl: bool) {
        let mut inner = self.inner.lock();

        let pending = PendingFrame {
            frame: frame.to_vec(),
            out_iface: out_iface.to_string(),
            decrement_ttl,
        };

        if let Some(req) = inner.requests.iter_mut().find(|r| r.ip == ip) {
            req.packets.push(pending);
            return;
        }

        inner.requests.push(ArpRequest {
            ip,
            sent: None,
            times_sent: 0,
            packets: vec![pending],
        });
    }

    /// Insert or refresh the binding for `ip`
    ///
    /// If a request for `ip` was queued, it is detached from the queue and
    /// returned so the caller can drain and transmit its pending frames.
    /// When the table is full the binding is dropped with a warning; the
    /// request is still detached and returned.
    pub fn insert(&self, mac: [u8; 6], ip: Ipv4Addr) -> Option<ArpRequest> {
        let mut inner = self.inner.lock();

        let queued = inner.requests.iter().position(|r| r.ip == ip);
        let request = queued.map(|idx| inner.requests.remove(idx));

        let entry = ArpEntry {
            ip,
            mac,
            added: Instant::now(),
        };

        if let Some(slot) = inner
            .entries
            .iter_mut()
            .find(|slot| slot.as_ref().is_some_and(|e| e.ip == ip))
        {
            *slot = Some(entry);
        } else if let Some(slot) = inner.entries.iter_mut().find(|slot| slot.is_none()) {
            *slot = Some(entry);
        } else {
            log::warn!("ARP: cache full, not caching {} -> {:02X?}", ip, mac);
        }

        request
    }

    /// One maintenance pass
    ///
    /// Invalidates entries older than the configured timeout, then walks the
    /// outstanding requests: those probed less than the resend interval ago
    /// are left alone, those with all probes spent are detached into
    /// `expired`, the rest are stamped and listed in `retransmit`.
    pub fn sweep(&self, now: Instant) -> ArpSweep {
        let mut inner = self.inner.lock();
        let mut out = ArpSweep::default();

        for slot in inner.entries.iter_mut() {
            if let Some(entry) = slot {
                if now.saturating_duration_since(entry.added) > self.config.entry_timeout {
                    log::debug!("ARP: entry for {} expired", entry.ip);
                    *slot = None;
                }
            }
        }

        let mut keep = Vec::with_capacity(inner.requests.len());
        for mut req in inner.requests.drain(..) {
            let due = match req.sent {
                None => true,
                Some(at) => now.saturating_duration_since(at) >= self.config.resend_interval,
            };

            if !due {
                keep.push(req);
                continue;
            }

            if req.times_sent >= self.config.max_probes {
                out.expired.push(req);
                continue;
            }

            req.sent = Some(now);
            req.times_sent += 1;
            if let Some(pkt) = req.packets.first() {
                out.retransmit.push((req.ip, pkt.out_iface.clone()));
            }
            keep.push(req);
        }
        inner.requests = keep;

        out
    }

    /// Number of valid cached bindings
    pub fn entry_count(&self) -> usize {
        self.inner.lock().entries.iter().flatten().count()
    }

    /// Number of outstanding requests
    pub fn request_count(&self) -> usize {
        self.inner.lock().requests.len()
    }
}

impl Default for ArpCache {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MAC_A: [u8; 6] = [0xAA, 0xAA, 0xAA, 0xAA, 0xAA, 0x01];
    const MAC_B: [u8; 6] = [0xBB, 0xBB, 0xBB, 0xBB, 0xBB, 0x02];

    fn ip(last: u8) -> Ipv4Addr {
        Ipv4Addr::new(192, 168, 2, last)
    }

    #[test]
    fn test_insert_and_lookup() {
        let cache = ArpCache::new();

        assert_eq!(cache.lookup(ip(2)), None);
        cache.insert(MAC_B, ip(2));
        assert_eq!(cache.lookup(ip(2)), Some(MAC_B));
        assert_eq!(cache.entry_count(), 1);
    }

    #[test]
    fn test_insert_refreshes_existing_binding() {
        let cache = ArpCache::new();

        cache.insert(MAC_A, ip(2));
        cache.insert(MAC_B, ip(2));

        assert_eq!(cache.lookup(ip(2)), Some(MAC_B));
        assert_eq!(cache.entry_count(), 1);
    }

    #[test]
    fn test_entries_expire_on_sweep() {
        let cache = ArpCache::new();
        let start = Instant::now();

        cache.insert(MAC_A, ip(7));
        assert_eq!(cache.lookup(ip(7)), Some(MAC_A));

        // Not yet expired at 14s
        cache.sweep(start + Duration::from_secs(14));
        assert_eq!(cache.lookup(ip(7)), Some(MAC_A));

        // Past the 15s lifetime
        cache.sweep(start + Duration::from_secs(16));
        assert_eq!(cache.lookup(ip(7)), None);
        assert_eq!(cache.entry_count(), 0);
    }

    #[test]
    fn test_full_cache_drops_new_binding() {
        let cache = ArpCache::with_config(ArpCacheConfig {
            capacity: 2,
            ..ArpCacheConfig::default()
        });

        cache.insert(MAC_A, ip(1));
        cache.insert(MAC_A, ip(2));
        cache.insert(MAC_B, ip(3));

        assert_eq!(cache.entry_count(), 2);
        assert_eq!(cache.lookup(ip(3)), None);

        // A refresh of a resident binding still works when full
        cache.insert(MAC_B, ip(1));
        assert_eq!(cache.lookup(ip(1)), Some(MAC_B));
    }

    #[test]
    fn test_insert_detaches_queued_request() {
        let cache = ArpCache::new();

        cache.queue_request(ip(2), &[1, 2, 3], "eth2", true);
        cache.queue_request(ip(2), &[4, 5, 6], "eth2", false);
        assert_eq!(cache.request_count(), 1);

        let req = cache.insert(MAC_B, ip(2)).expect("request should detach");
        assert_eq!(req.ip, ip(2));
        assert_eq!(req.packets.len(), 2);
        assert_eq!(req.packets[0].frame, vec![1, 2, 3]);
        assert_eq!(req.packets[0].out_iface, "eth2");
        assert!(req.packets[0].decrement_ttl);
        assert!(!req.packets[1].decrement_ttl);

        assert_eq!(cache.request_count(), 0);
        // A second insert finds nothing to detach
        assert!(cache.insert(MAC_B, ip(2)).is_none());
    }

    #[test]
    fn test_sweep_retransmits_once_per_interval() {
        let cache = ArpCache::new();
        let start = Instant::now();

        cache.queue_request(ip(9), &[0; 42], "eth2", true);

        // First sweep probes immediately (nothing sent yet)
        let pass = cache.sweep(start);
        assert_eq!(pass.retransmit, vec![(ip(9), "eth2".to_string())]);
        assert!(pass.expired.is_empty());

        // Half a second later the request is left alone
        let pass = cache.sweep(start + Duration::from_millis(500));
        assert!(pass.retransmit.is_empty());
        assert!(pass.expired.is_empty());

        // A full interval later it is probed again
        let pass = cache.sweep(start + Duration::from_secs(1));
        assert_eq!(pass.retransmit.len(), 1);
    }

    #[test]
    fn test_request_abandoned_after_max_probes() {
        let cache = ArpCache::new();
        let start = Instant::now();

        cache.queue_request(ip(9), &[0; 42], "eth2", true);

        for i in 0..5 {
            let pass = cache.sweep(start + Duration::from_secs(i));
            assert_eq!(pass.retransmit.len(), 1, "probe {} should go out", i + 1);
            assert!(pass.expired.is_empty());
        }

        // Probes exhausted: the next due sweep detaches the request
        let pass = cache.sweep(start + Duration::from_secs(5));
        assert!(pass.retransmit.is_empty());
        assert_eq!(pass.expired.len(), 1);
        assert_eq!(pass.expired[0].times_sent(), 5);
        assert_eq!(pass.expired[0].packets.len(), 1);
        assert_eq!(cache.request_count(), 0);
    }
}
