//! ARP (Address Resolution Protocol) - RFC 826
//!
//! Wire format for mapping IPv4 addresses to MAC addresses. The resolver
//! state (cache and outstanding-request queue) lives in `crate::arpcache`.
//! Packet format: [HW Type (2)][Proto Type (2)][HW Len (1)][Proto Len (1)]
//!                [Operation (2)][Sender MAC (6)][Sender IP (4)]
//!                [Target MAC (6)][Target IP (4)]

use core::fmt;
use core::net::Ipv4Addr;

/// ARP hardware type for Ethernet
pub const HW_TYPE_ETHERNET: u16 = 1;

/// ARP protocol type for IPv4
pub const PROTO_TYPE_IPV4: u16 = 0x0800;

/// ARP operation codes
pub const ARP_REQUEST: u16 = 1;
pub const ARP_REPLY: u16 = 2;

/// ARP packet size (fixed at 28 bytes)
pub const ARP_PACKET_SIZE: usize = 28;

/// Errors that can occur during ARP operations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArpError {
    /// Packet is too short to be valid
    PacketTooShort,
    /// Invalid hardware type (not Ethernet)
    InvalidHardwareType,
    /// Invalid protocol type (not IPv4)
    InvalidProtocolType,
    /// Invalid hardware address length
    InvalidHardwareLength,
    /// Invalid protocol address length
    InvalidProtocolLength,
    /// Unknown operation code
    UnknownOperation,
}

impl fmt::Display for ArpError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArpError::PacketTooShort => write!(f, "ARP packet too short"),
            ArpError::InvalidHardwareType => write!(f, "ARP hardware type is not Ethernet"),
            ArpError::InvalidProtocolType => write!(f, "ARP protocol type is not IPv4"),
            ArpError::InvalidHardwareLength => write!(f, "ARP hardware address length is not 6"),
            ArpError::InvalidProtocolLength => write!(f, "ARP protocol address length is not 4"),
            ArpError::UnknownOperation => write!(f, "Unknown ARP operation"),
        }
    }
}

/// ARP packet structure
#[derive(Debug, Clone, PartialEq)]
pub struct ArpPacket {
    /// Hardware type (1 = Ethernet)
    pub hw_type: u16,
    /// Protocol type (0x0800 = IPv4)
    pub proto_type: u16,
    /// Hardware address length (6 for MAC)
    pub hw_len: u8,
    /// Protocol address length (4 for IPv4)
    pub proto_len: u8,
    /// Operation (1 = request, 2 = reply)
    pub operation: u16,
    /// Sender MAC address
    pub sender_mac: [u8; 6],
    /// Sender IP address
    pub sender_ip: Ipv4Addr,
    /// Target MAC address
    pub target_mac: [u8; 6],
    /// Target IP address
    pub target_ip: Ipv4Addr,
}

impl ArpPacket {
    /// Create a new ARP request packet
    ///
    /// # Arguments
    /// * `sender_mac` - Our MAC address
    /// * `sender_ip` - Our IP address
    /// * `target_ip` - The IP address we want to resolve
    pub fn new_request(sender_mac: [u8; 6], sender_ip: Ipv4Addr, target_ip: Ipv4Addr) -> Self {
        Self {
            hw_type: HW_TYPE_ETHERNET,
            proto_type: PROTO_TYPE_IPV4,
            hw_len: 6,
            proto_len: 4,
            operation: ARP_REQUEST,
            sender_mac,
            sender_ip,
            target_mac: [0; 6], // Unknown, set to zeros
            target_ip,
        }
    }

    /// Create a new ARP reply packet
    ///
    /// # Arguments
    /// * `sender_mac` - Our MAC address
    /// * `sender_ip` - Our IP address
    /// * `target_mac` - The MAC address of the requester
    /// * `target_ip` - The IP address of the requester
    pub fn new_reply(
        sender_mac: [u8; 6],
        sender_ip: Ipv4Addr,
        target_mac: [u8; 6],
        target_ip: Ipv4Addr,
    ) -> Self {
        Self {
            hw_type: HW_TYPE_ETHERNET,
            proto_type: PROTO_TYPE_IPV4,
            hw_len: 6,
            proto_len: 4,
            operation: ARP_REPLY,
            sender_mac,
            sender_ip,
            target_mac,
            target_ip,
        }
    }

    /// Parse an ARP packet from raw bytes
    ///
    /// # Arguments
    /// * `data` - Raw ARP packet data (must be at least 28 bytes)
    pub fn from_bytes(data: &[u8]) -> Result<Self, ArpError> {
        if data.len() < ARP_PACKET_SIZE {
            return Err(ArpError::PacketTooShort);
        }

        // Parse hardware type (bytes 0-1, big-endian)
        let hw_type = u16::from_be_bytes([data[0], data[1]]);
        if hw_type != HW_TYPE_ETHERNET {
            return Err(ArpError::InvalidHardwareType);
        }

        // Parse protocol type (bytes 2-3, big-endian)
        let proto_type = u16::from_be_bytes([data[2], data[3]]);
        if proto_type != PROTO_TYPE_IPV4 {
            return Err(ArpError::InvalidProtocolType);
        }

        // Parse address lengths
        let hw_len = data[4];
        let proto_len = data[5];

        if hw_len != 6 {
            return Err(ArpError::InvalidHardwareLength);
        }
        if proto_len != 4 {
            return Err(ArpError::InvalidProtocolLength);
        }

        // Parse operation (bytes 6-7, big-endian)
        let operation = u16::from_be_bytes([data[6], data[7]]);
        if operation != ARP_REQUEST && operation != ARP_REPLY {
            return Err(ArpError::UnknownOperation);
        }

        // Parse sender MAC (bytes 8-13)
        let mut sender_mac = [0u8; 6];
        sender_mac.copy_from_slice(&data[8..14]);

        // Parse sender IP (bytes 14-17)
        let sender_ip = Ipv4Addr::new(data[14], data[15], data[16], data[17]);

        // Parse target MAC (bytes 18-23)
        let mut target_mac = [0u8; 6];
        target_mac.copy_from_slice(&data[18..24]);

        // Parse target IP (bytes 24-27)
        let target_ip = Ipv4Addr::new(data[24], data[25], data[26], data[27]);

        Ok(Self {
            hw_type,
            proto_type,
            hw_len,
            proto_len,
            operation,
            sender_mac,
            sender_ip,
            target_mac,
            target_ip,
        })
    }

    /// Convert the ARP packet to bytes for transmission
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(ARP_PACKET_SIZE);

        bytes.extend_from_slice(&self.hw_type.to_be_bytes());
        bytes.extend_from_slice(&self.proto_type.to_be_bytes());
        bytes.push(self.hw_len);
        bytes.push(self.proto_len);
        bytes.extend_from_slice(&self.operation.to_be_bytes());
        bytes.extend_from_slice(&self.sender_mac);
        bytes.extend_from_slice(&self.sender_ip.octets());
        bytes.extend_from_slice(&self.target_mac);
        bytes.extend_from_slice(&self.target_ip.octets());

        bytes
    }

    /// Check if this is an ARP request
    pub fn is_request(&self) -> bool {
        self.operation == ARP_REQUEST
    }

    /// Check if this is an ARP reply
    pub fn is_reply(&self) -> bool {
        self.operation == ARP_REPLY
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_round_trip() {
        let sender_mac = [0xAA, 0xBB, 0xCC, 0xDD, 0xEE, 0xFF];
        let sender_ip = Ipv4Addr::new(192, 168, 1, 10);
        let target_ip = Ipv4Addr::new(192, 168, 1, 1);

        let original = ArpPacket::new_request(sender_mac, sender_ip, target_ip);
        assert!(original.is_request());
        assert!(!original.is_reply());

        let bytes = original.to_bytes();
        assert_eq!(bytes.len(), ARP_PACKET_SIZE);

        let parsed = ArpPacket::from_bytes(&bytes).unwrap();
        assert_eq!(parsed, original);
    }

    #[test]
    fn test_reply_construction() {
        let our_mac = [0x02, 0x00, 0x00, 0x00, 0x00, 0x01];
        let our_ip = Ipv4Addr::new(10, 0, 1, 1);
        let requester_mac = [0xAA, 0xAA, 0xAA, 0xAA, 0xAA, 0x01];
        let requester_ip = Ipv4Addr::new(10, 0, 1, 5);

        let reply = ArpPacket::new_reply(our_mac, our_ip, requester_mac, requester_ip);
        assert!(reply.is_reply());
        assert_eq!(reply.sender_mac, our_mac);
        assert_eq!(reply.sender_ip, our_ip);
        assert_eq!(reply.target_mac, requester_mac);
        assert_eq!(reply.target_ip, requester_ip);
    }

    #[test]
    fn test_packet_too_short() {
        let data = [0u8; 10];
        assert_eq!(ArpPacket::from_bytes(&data), Err(ArpError::PacketTooShort));
    }

    #[test]
    fn test_header_field_validation() {
        let template =
            ArpPacket::new_request([0; 6], Ipv4Addr::UNSPECIFIED, Ipv4Addr::UNSPECIFIED);

        let mut bad_hw = template.to_bytes();
        bad_hw[1] = 2;
        assert_eq!(
            ArpPacket::from_bytes(&bad_hw),
            Err(ArpError::InvalidHardwareType)
        );

        let mut bad_proto = template.to_bytes();
        bad_proto[2] = 0x86;
        bad_proto[3] = 0xDD;
        assert_eq!(
            ArpPacket::from_bytes(&bad_proto),
            Err(ArpError::InvalidProtocolType)
        );

        let mut bad_hlen = template.to_bytes();
        bad_hlen[4] = 8;
        assert_eq!(
            ArpPacket::from_bytes(&bad_hlen),
            Err(ArpError::InvalidHardwareLength)
        );

        let mut bad_plen = template.to_bytes();
        bad_plen[5] = 16;
        assert_eq!(
            ArpPacket::from_bytes(&bad_plen),
            Err(ArpError::InvalidProtocolLength)
        );

        let mut bad_op = template.to_bytes();
        bad_op[7] = 9;
        assert_eq!(
            ArpPacket::from_bytes(&bad_op),
            Err(ArpError::UnknownOperation)
        );
    }
}
