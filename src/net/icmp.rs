//! ICMP (Internet Control Message Protocol) Implementation
//! RFC 792 - https://www.rfc-editor.org/rfc/rfc792
//!
//! Covers echo request/reply (types 8/0) and the error messages the router
//! generates: destination unreachable (type 3) and time exceeded (type 11).
//! For error messages the identifier/sequence bytes are the unused field
//! and the data carries the offending IP header plus its first 8 payload
//! bytes.

use core::fmt;

use super::ipv4::checksum;

/// Number of cited bytes carried by an error message: the offending IP
/// header (no options) plus the first 8 bytes of its payload.
pub const CITED_LEN: usize = 28;

/// ICMP message types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IcmpType {
    /// Echo Reply (Type 0)
    EchoReply,
    /// Destination Unreachable (Type 3)
    DestinationUnreachable,
    /// Echo Request (Type 8)
    EchoRequest,
    /// Time Exceeded (Type 11)
    TimeExceeded,
    /// Unknown type
    Unknown(u8),
}

/// Destination-unreachable codes the router emits
pub mod code {
    /// Destination network unreachable (no route)
    pub const NET_UNREACHABLE: u8 = 0;
    /// Destination host unreachable (ARP resolution gave up)
    pub const HOST_UNREACHABLE: u8 = 1;
    /// Destination port unreachable (TCP/UDP to the router, NAT miss)
    pub const PORT_UNREACHABLE: u8 = 3;
    /// TTL expired in transit (type 11 only uses code 0)
    pub const TTL_EXPIRED: u8 = 0;
}

impl From<u8> for IcmpType {
    fn from(value: u8) -> Self {
        match value {
            0 => IcmpType::EchoReply,
            3 => IcmpType::DestinationUnreachable,
            8 => IcmpType::EchoRequest,
            11 => IcmpType::TimeExceeded,
            other => IcmpType::Unknown(other),
        }
    }
}

impl From<IcmpType> for u8 {
    fn from(icmp_type: IcmpType) -> Self {
        match icmp_type {
            IcmpType::EchoReply => 0,
            IcmpType::DestinationUnreachable => 3,
            IcmpType::EchoRequest => 8,
            IcmpType::TimeExceeded => 11,
            IcmpType::Unknown(val) => val,
        }
    }
}

impl fmt::Display for IcmpType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IcmpType::EchoReply => write!(f, "Echo Reply"),
            IcmpType::DestinationUnreachable => write!(f, "Destination Unreachable"),
            IcmpType::EchoRequest => write!(f, "Echo Request"),
            IcmpType::TimeExceeded => write!(f, "Time Exceeded"),
            IcmpType::Unknown(val) => write!(f, "Unknown({})", val),
        }
    }
}

/// ICMP packet structure
///
/// Format:
/// ```text
/// [Type (1)][Code (1)][Checksum (2)]
/// [Identifier (2)][Sequence (2)][Data (variable)]
/// ```
///
/// For types 3 and 11 the identifier/sequence bytes are the unused field
/// (zero) and `data` is the cited portion of the offending packet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IcmpPacket {
    /// ICMP message type
    pub icmp_type: IcmpType,
    /// ICMP code (subtype)
    pub code: u8,
    /// Checksum (calculated over entire ICMP packet)
    pub checksum: u16,
    /// Identifier (for echo request/reply)
    pub identifier: u16,
    /// Sequence number (for echo request/reply)
    pub sequence: u16,
    /// Payload data
    pub data: Vec<u8>,
}

/// ICMP parsing errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IcmpError {
    /// Packet too short (minimum 8 bytes)
    PacketTooShort,
    /// Invalid checksum
    InvalidChecksum,
}

impl fmt::Display for IcmpError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IcmpError::PacketTooShort => write!(f, "ICMP packet too short"),
            IcmpError::InvalidChecksum => write!(f, "Invalid ICMP checksum"),
        }
    }
}

impl IcmpPacket {
    /// Minimum ICMP packet size (header only)
    pub const MIN_SIZE: usize = 8;

    /// Parse an ICMP packet from raw bytes
    ///
    /// # Arguments
    /// * `data` - Raw ICMP packet bytes (minimum 8 bytes)
    ///
    /// # Returns
    /// * `Ok(IcmpPacket)` - Successfully parsed packet
    /// * `Err(IcmpError)` - Parse error
    pub fn from_bytes(data: &[u8]) -> Result<Self, IcmpError> {
        if data.len() < Self::MIN_SIZE {
            return Err(IcmpError::PacketTooShort);
        }

        let icmp_type = IcmpType::from(data[0]);
        let code = data[1];
        let received_checksum = u16::from_be_bytes([data[2], data[3]]);
        let identifier = u16::from_be_bytes([data[4], data[5]]);
        let sequence = u16::from_be_bytes([data[6], data[7]]);
        let payload = data[8..].to_vec();

        let packet = IcmpPacket {
            icmp_type,
            code,
            checksum: received_checksum,
            identifier,
            sequence,
            data: payload,
        };

        // Verify checksum
        if !packet.verify_checksum() {
            return Err(IcmpError::InvalidChecksum);
        }

        Ok(packet)
    }

    /// Convert ICMP packet to raw bytes
    ///
    /// Automatically calculates and sets the checksum.
    ///
    /// # Returns
    /// Raw ICMP packet bytes
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(Self::MIN_SIZE + self.data.len());

        // Header fields
        bytes.push(self.icmp_type.into());
        bytes.push(self.code);

        // Placeholder for checksum (will be calculated)
        bytes.extend_from_slice(&[0, 0]);

        // Identifier and sequence
        bytes.extend_from_slice(&self.identifier.to_be_bytes());
        bytes.extend_from_slice(&self.sequence.to_be_bytes());

        // Data
        bytes.extend_from_slice(&self.data);

        // Calculate and insert checksum
        let checksum = checksum(&bytes);
        bytes[2..4].copy_from_slice(&checksum.to_be_bytes());

        bytes
    }

    /// Create a new ICMP echo request packet
    ///
    /// # Arguments
    /// * `identifier` - Request identifier
    /// * `sequence` - Sequence number
    /// * `data` - Optional payload data
    pub fn new_echo_request(identifier: u16, sequence: u16, data: Vec<u8>) -> Self {
        IcmpPacket {
            icmp_type: IcmpType::EchoRequest,
            code: 0,
            checksum: 0, // Will be calculated in to_bytes()
            identifier,
            sequence,
            data,
        }
    }

    /// Create an ICMP echo reply from an echo request
    ///
    /// This swaps the type from EchoRequest (8) to EchoReply (0)
    /// and preserves the identifier, sequence, and data.
    ///
    /// # Arguments
    /// * `request` - The original echo request packet
    pub fn create_echo_reply(request: &IcmpPacket) -> Self {
        IcmpPacket {
            icmp_type: IcmpType::EchoReply,
            code: request.code,
            checksum: 0, // Will be recalculated in to_bytes()
            identifier: request.identifier,
            sequence: request.sequence,
            data: request.data.clone(),
        }
    }

    /// Create an error message (destination unreachable or time exceeded)
    ///
    /// # Arguments
    /// * `icmp_type` - `DestinationUnreachable` or `TimeExceeded`
    /// * `code` - Error code (see the `code` module)
    /// * `cited` - Bytes of the offending packet, starting at its IP header.
    ///   Trimmed or zero-padded to `CITED_LEN`.
    pub fn new_error(icmp_type: IcmpType, code: u8, cited: &[u8]) -> Self {
        let mut data = cited[..cited.len().min(CITED_LEN)].to_vec();
        data.resize(CITED_LEN, 0);

        IcmpPacket {
            icmp_type,
            code,
            checksum: 0,
            identifier: 0, // Unused field for error messages
            sequence: 0,
            data,
        }
    }

    /// Verify the packet's checksum
    ///
    /// # Returns
    /// `true` if checksum is valid, `false` otherwise
    pub fn verify_checksum(&self) -> bool {
        // Create packet with checksum set to 0
        let mut bytes = Vec::with_capacity(Self::MIN_SIZE + self.data.len());
        bytes.push(self.icmp_type.into());
        bytes.push(self.code);
        bytes.extend_from_slice(&[0, 0]); // Zero checksum
        bytes.extend_from_slice(&self.identifier.to_be_bytes());
        bytes.extend_from_slice(&self.sequence.to_be_bytes());
        bytes.extend_from_slice(&self.data);

        checksum(&bytes) == self.checksum
    }

    /// Check if this is an echo request
    pub fn is_echo_request(&self) -> bool {
        self.icmp_type == IcmpType::EchoRequest
    }

    /// Check if this is an echo reply
    pub fn is_echo_reply(&self) -> bool {
        self.icmp_type == IcmpType::EchoReply
    }
}

impl fmt::Display for IcmpPacket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "ICMP {} (code={}, id={}, seq={}, {} bytes data)",
            self.icmp_type,
            self.code,
            self.identifier,
            self.sequence,
            self.data.len()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_icmp_type_conversion() {
        assert_eq!(u8::from(IcmpType::EchoRequest), 8);
        assert_eq!(u8::from(IcmpType::EchoReply), 0);
        assert_eq!(u8::from(IcmpType::DestinationUnreachable), 3);
        assert_eq!(u8::from(IcmpType::TimeExceeded), 11);
        assert_eq!(IcmpType::from(8), IcmpType::EchoRequest);
        assert_eq!(IcmpType::from(0), IcmpType::EchoReply);
        assert_eq!(IcmpType::from(42), IcmpType::Unknown(42));
    }

    #[test]
    fn test_echo_request_to_bytes() {
        let data = vec![0x61, 0x62, 0x63, 0x64];
        let packet = IcmpPacket::new_echo_request(0x1234, 1, data);
        let bytes = packet.to_bytes();

        assert_eq!(bytes[0], 8); // Type: Echo Request
        assert_eq!(bytes[1], 0); // Code: 0
        assert_eq!(bytes[4], 0x12); // Identifier high byte
        assert_eq!(bytes[5], 0x34); // Identifier low byte
        assert_eq!(bytes[6], 0x00); // Sequence high byte
        assert_eq!(bytes[7], 0x01); // Sequence low byte
        assert_eq!(&bytes[8..], &[0x61, 0x62, 0x63, 0x64]); // Data
    }

    #[test]
    fn test_checksum_contract() {
        let packet = IcmpPacket::new_echo_request(0x1234, 1, vec![0x61, 0x62, 0x63, 0x64]);
        let bytes = packet.to_bytes();

        // A correctly checksummed message re-checksums to zero (the
        // one's-complement sum over it is 0xFFFF).
        assert_eq!(checksum(&bytes), 0);
    }

    #[test]
    fn test_packet_parsing() {
        let packet = IcmpPacket::new_echo_request(0x5678, 42, vec![1, 2, 3, 4]);
        let bytes = packet.to_bytes();

        let parsed = IcmpPacket::from_bytes(&bytes).unwrap();

        assert_eq!(parsed.icmp_type, IcmpType::EchoRequest);
        assert_eq!(parsed.code, 0);
        assert_eq!(parsed.identifier, 0x5678);
        assert_eq!(parsed.sequence, 42);
        assert_eq!(parsed.data, vec![1, 2, 3, 4]);
    }

    #[test]
    fn test_echo_reply_creation() {
        let request = IcmpPacket::new_echo_request(0xABCD, 10, vec![5, 6, 7, 8]);
        let reply = IcmpPacket::create_echo_reply(&request);

        assert_eq!(reply.icmp_type, IcmpType::EchoReply);
        assert_eq!(reply.code, request.code);
        assert_eq!(reply.identifier, request.identifier);
        assert_eq!(reply.sequence, request.sequence);
        assert_eq!(reply.data, request.data);
    }

    #[test]
    fn test_packet_too_short() {
        let short_data = vec![0x08, 0x00, 0x00, 0x00, 0x12, 0x34, 0x00]; // Only 7 bytes
        let result = IcmpPacket::from_bytes(&short_data);
        assert_eq!(result, Err(IcmpError::PacketTooShort));
    }

    #[test]
    fn test_invalid_checksum() {
        let packet = IcmpPacket::new_echo_request(0x1111, 5, vec![9, 10, 11]);
        let mut bytes = packet.to_bytes();

        // Corrupt the checksum
        bytes[2] ^= 0xFF;

        let result = IcmpPacket::from_bytes(&bytes);
        assert_eq!(result, Err(IcmpError::InvalidChecksum));
    }

    #[test]
    fn test_error_message_shape() {
        let cited = vec![0x45; 40]; // longer than CITED_LEN
        let packet = IcmpPacket::new_error(
            IcmpType::DestinationUnreachable,
            code::HOST_UNREACHABLE,
            &cited,
        );

        assert_eq!(packet.identifier, 0);
        assert_eq!(packet.sequence, 0);
        assert_eq!(packet.data.len(), CITED_LEN);

        let bytes = packet.to_bytes();
        assert_eq!(bytes.len(), IcmpPacket::MIN_SIZE + CITED_LEN);
        assert_eq!(bytes[0], 3);
        assert_eq!(bytes[1], 1);

        // Round trips through the parser with a valid checksum
        let parsed = IcmpPacket::from_bytes(&bytes).unwrap();
        assert_eq!(parsed.icmp_type, IcmpType::DestinationUnreachable);
        assert_eq!(parsed.code, code::HOST_UNREACHABLE);
    }

    #[test]
    fn test_error_message_pads_short_citation() {
        let cited = vec![0xAB; 10];
        let packet = IcmpPacket::new_error(IcmpType::TimeExceeded, code::TTL_EXPIRED, &cited);

        assert_eq!(packet.data.len(), CITED_LEN);
        assert_eq!(&packet.data[..10], &cited[..]);
        assert!(packet.data[10..].iter().all(|&b| b == 0));
    }

    #[test]
    fn test_checksum_odd_length() {
        // Odd-length data exercises the padding in the checksum fold
        let packet = IcmpPacket::new_echo_request(0x1234, 1, vec![0x61, 0x62, 0x63]);
        let bytes = packet.to_bytes();

        let parsed = IcmpPacket::from_bytes(&bytes).unwrap();
        assert_eq!(parsed.data, vec![0x61, 0x62, 0x63]);
    }
}
