//! Ethernet Frame Layer (OSI Layer 2)
//!
//! Handles Ethernet II frame parsing and building for the router's virtual
//! interfaces. The transport delivers frames without a trailing FCS and
//! owns any minimum-size padding, so frames round-trip byte-for-byte.
//! Frame structure: [Dest MAC (6)][Src MAC (6)][EtherType (2)][Payload]

use core::fmt;

/// EtherType constants
pub const ETHERTYPE_IPV4: u16 = 0x0800;
pub const ETHERTYPE_ARP: u16 = 0x0806;

/// Broadcast MAC address (FF:FF:FF:FF:FF:FF)
pub const BROADCAST_MAC: [u8; 6] = [0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF];

/// Ethernet frame header size
pub const HEADER_SIZE: usize = 14;

/// Errors that can occur during Ethernet frame operations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EthernetError {
    /// Frame is too short to be valid
    FrameTooShort,
}

impl fmt::Display for EthernetError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EthernetError::FrameTooShort => write!(f, "Ethernet frame too short"),
        }
    }
}

/// Represents an Ethernet frame
#[derive(Debug, Clone, PartialEq)]
pub struct EthernetFrame {
    /// Destination MAC address (6 bytes)
    pub dest_mac: [u8; 6],
    /// Source MAC address (6 bytes)
    pub src_mac: [u8; 6],
    /// EtherType field (2 bytes) - indicates protocol of payload
    pub ethertype: u16,
    /// Payload data
    pub payload: Vec<u8>,
}

impl EthernetFrame {
    /// # Arguments
    /// * `dest` - Destination MAC address
    /// * `src` - Source MAC address
    /// * `ethertype` - Protocol type (e.g., 0x0800 for IPv4, 0x0806 for ARP)
    /// * `payload` - Frame payload data
    pub fn new(dest: [u8; 6], src: [u8; 6], ethertype: u16, payload: Vec<u8>) -> Self {
        Self {
            dest_mac: dest,
            src_mac: src,
            ethertype,
            payload,
        }
    }

    /// Parse an Ethernet frame from raw bytes
    ///
    /// # Arguments
    /// * `data` - Raw frame data (Ethernet header plus payload)
    ///
    /// # Returns
    /// Parsed EthernetFrame or error
    pub fn from_bytes(data: &[u8]) -> Result<Self, EthernetError> {
        if data.len() < HEADER_SIZE {
            return Err(EthernetError::FrameTooShort);
        }

        // Extract destination MAC (bytes 0-5)
        let mut dest_mac = [0u8; 6];
        dest_mac.copy_from_slice(&data[0..6]);

        // Extract source MAC (bytes 6-11)
        let mut src_mac = [0u8; 6];
        src_mac.copy_from_slice(&data[6..12]);

        // Extract EtherType (bytes 12-13, big-endian)
        let ethertype = u16::from_be_bytes([data[12], data[13]]);

        let payload = data[HEADER_SIZE..].to_vec();

        Ok(Self {
            dest_mac,
            src_mac,
            ethertype,
            payload,
        })
    }

    /// Convert the Ethernet frame to bytes for transmission
    ///
    /// Frame format: [Dest MAC][Src MAC][EtherType][Payload]
    ///
    /// # Returns
    /// Complete frame ready for transmission
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut frame = Vec::with_capacity(HEADER_SIZE + self.payload.len());

        frame.extend_from_slice(&self.dest_mac);
        frame.extend_from_slice(&self.src_mac);
        frame.extend_from_slice(&self.ethertype.to_be_bytes());
        frame.extend_from_slice(&self.payload);

        frame
    }

    /// Check if the frame is a broadcast frame
    pub fn is_broadcast(&self) -> bool {
        self.dest_mac == BROADCAST_MAC
    }

    /// Check if the frame is a multicast frame
    pub fn is_multicast(&self) -> bool {
        (self.dest_mac[0] & 0x01) != 0 && !self.is_broadcast()
    }

    /// Check if the frame is a unicast frame
    pub fn is_unicast(&self) -> bool {
        !self.is_broadcast() && !self.is_multicast()
    }
}

/// Format a MAC address for display
pub fn format_mac(mac: &[u8; 6]) -> String {
    format!(
        "{:02X}:{:02X}:{:02X}:{:02X}:{:02X}:{:02X}",
        mac[0], mac[1], mac[2], mac[3], mac[4], mac[5]
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_round_trip() {
        let frame = EthernetFrame::new(
            [0xAA, 0xBB, 0xCC, 0xDD, 0xEE, 0xFF],
            [0x11, 0x22, 0x33, 0x44, 0x55, 0x66],
            ETHERTYPE_IPV4,
            vec![1, 2, 3, 4],
        );

        let bytes = frame.to_bytes();
        assert_eq!(bytes.len(), HEADER_SIZE + 4);

        let parsed = EthernetFrame::from_bytes(&bytes).unwrap();
        assert_eq!(parsed, frame);
    }

    #[test]
    fn test_frame_too_short() {
        let data = [0u8; 13];
        assert_eq!(
            EthernetFrame::from_bytes(&data),
            Err(EthernetError::FrameTooShort)
        );
    }

    #[test]
    fn test_ethertype_parsing() {
        let mut data = vec![0u8; HEADER_SIZE];
        data[12] = 0x08;
        data[13] = 0x06;

        let frame = EthernetFrame::from_bytes(&data).unwrap();
        assert_eq!(frame.ethertype, ETHERTYPE_ARP);
        assert!(frame.payload.is_empty());
    }

    #[test]
    fn test_broadcast_classification() {
        let broadcast = EthernetFrame::new(BROADCAST_MAC, [0; 6], ETHERTYPE_ARP, Vec::new());
        assert!(broadcast.is_broadcast());
        assert!(!broadcast.is_multicast());
        assert!(!broadcast.is_unicast());

        let multicast = EthernetFrame::new(
            [0x01, 0x00, 0x5E, 0x00, 0x00, 0x01],
            [0; 6],
            ETHERTYPE_IPV4,
            Vec::new(),
        );
        assert!(multicast.is_multicast());
        assert!(!multicast.is_unicast());

        let unicast = EthernetFrame::new(
            [0x52, 0x54, 0x00, 0x12, 0x34, 0x56],
            [0; 6],
            ETHERTYPE_IPV4,
            Vec::new(),
        );
        assert!(unicast.is_unicast());
    }

    #[test]
    fn test_format_mac() {
        let mac = [0xDE, 0xAD, 0xBE, 0xEF, 0x00, 0x01];
        assert_eq!(format_mac(&mac), "DE:AD:BE:EF:00:01");
    }
}
