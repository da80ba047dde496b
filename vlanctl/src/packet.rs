//! Frame decoding using smoltcp
//!
//! Decodes the Ethernet header, an optional 802.1Q tag, and the IPv4
//! addresses of packets punted to the controller. Only the headers the
//! forwarding pipeline needs are extracted; payloads are carried opaquely.

use std::net::Ipv4Addr;

use smoltcp::wire::{EthernetAddress, EthernetFrame, Ipv4Packet};
use thiserror::Error;

/// IPv4 ethertype
pub const ETHERTYPE_IPV4: u16 = 0x0800;

/// 802.1Q VLAN tag ethertype
pub const ETHERTYPE_VLAN: u16 = 0x8100;

/// LLDP ethertype (link discovery traffic, ignored by the pipeline)
pub const ETHERTYPE_LLDP: u16 = 0x88cc;

/// Frame decode errors
#[derive(Debug, Error, PartialEq, Eq)]
pub enum FrameError {
    #[error("frame too short for Ethernet header")]
    Truncated,

    #[error("802.1Q tag truncated")]
    TruncatedTag,
}

/// IPv4 addresses extracted from a frame's network-layer header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ipv4Header {
    pub src: Ipv4Addr,
    pub dst: Ipv4Addr,
}

/// Decoded view of a frame punted to the controller
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedFrame {
    /// Source link-layer address
    pub src: EthernetAddress,
    /// Destination link-layer address
    pub dst: EthernetAddress,
    /// 802.1Q VLAN id, if the frame is tagged
    pub vlan: Option<u16>,
    /// Ethertype after any 802.1Q tag
    pub ethertype: u16,
    /// IPv4 header addresses, if the frame carries an IPv4 payload
    pub ipv4: Option<Ipv4Header>,
}

/// Decode the headers of a raw Ethernet frame.
///
/// A frame whose IPv4 payload is malformed is still returned as a valid
/// link-layer frame with `ipv4: None`; only a truncated Ethernet header or
/// 802.1Q tag is an error.
pub fn decode(data: &[u8]) -> Result<DecodedFrame, FrameError> {
    let frame = EthernetFrame::new_checked(data).map_err(|_| FrameError::Truncated)?;

    let src = frame.src_addr();
    let dst = frame.dst_addr();
    let mut ethertype = u16::from(frame.ethertype());
    let mut payload: &[u8] = frame.payload();
    let mut vlan = None;

    if ethertype == ETHERTYPE_VLAN {
        if payload.len() < 4 {
            return Err(FrameError::TruncatedTag);
        }
        let tci = u16::from_be_bytes([payload[0], payload[1]]);
        vlan = Some(tci & 0x0fff);
        ethertype = u16::from_be_bytes([payload[2], payload[3]]);
        payload = &payload[4..];
    }

    let ipv4 = if ethertype == ETHERTYPE_IPV4 {
        Ipv4Packet::new_checked(payload)
            .ok()
            .map(|ip| Ipv4Header {
                src: ip.src_addr(),
                dst: ip.dst_addr(),
            })
    } else {
        None
    };

    Ok(DecodedFrame {
        src,
        dst,
        vlan,
        ethertype,
        ipv4,
    })
}

/// Parse a colon-separated MAC address string.
pub fn parse_mac(s: &str) -> Option<EthernetAddress> {
    let parts: Vec<&str> = s.split(':').collect();
    if parts.len() != 6 {
        return None;
    }

    let mut mac = [0u8; 6];
    for (i, part) in parts.iter().enumerate() {
        mac[i] = u8::from_str_radix(part, 16).ok()?;
    }
    Some(EthernetAddress(mac))
}

/// Format a MAC address as a colon-separated string.
pub fn format_mac(mac: &EthernetAddress) -> String {
    let b = mac.as_bytes();
    format!(
        "{:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x}",
        b[0], b[1], b[2], b[3], b[4], b[5]
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_util::{ethernet_frame, ipv4_frame, mac, vlan_frame};

    #[test]
    fn test_decode_untagged() {
        let data = ethernet_frame(mac(2), mac(1), ETHERTYPE_IPV4, &[0u8; 4]);
        let frame = decode(&data).unwrap();

        assert_eq!(frame.src, mac(1));
        assert_eq!(frame.dst, mac(2));
        assert_eq!(frame.vlan, None);
        assert_eq!(frame.ethertype, ETHERTYPE_IPV4);
        // 4 bytes of zeros is not a valid IPv4 header
        assert_eq!(frame.ipv4, None);
    }

    #[test]
    fn test_decode_tagged_ipv4() {
        let data = ipv4_frame(
            mac(2),
            mac(1),
            Some(10),
            Ipv4Addr::new(10, 0, 1, 5),
            Ipv4Addr::new(10, 0, 2, 5),
        );
        let frame = decode(&data).unwrap();

        assert_eq!(frame.vlan, Some(10));
        assert_eq!(frame.ethertype, ETHERTYPE_IPV4);
        let ip = frame.ipv4.unwrap();
        assert_eq!(ip.src, Ipv4Addr::new(10, 0, 1, 5));
        assert_eq!(ip.dst, Ipv4Addr::new(10, 0, 2, 5));
    }

    #[test]
    fn test_decode_strips_pcp_bits() {
        // TCI with priority bits set: PCP=5, VID=20
        let mut data = vlan_frame(mac(2), mac(1), 20, ETHERTYPE_IPV4, &[0u8; 4]);
        data[14] |= 0xa0;
        let frame = decode(&data).unwrap();
        assert_eq!(frame.vlan, Some(20));
    }

    #[test]
    fn test_decode_truncated() {
        assert_eq!(decode(&[0u8; 10]), Err(FrameError::Truncated));

        // Ethernet header claiming a VLAN tag, but no TCI bytes
        let data = ethernet_frame(mac(2), mac(1), ETHERTYPE_VLAN, &[]);
        assert_eq!(decode(&data), Err(FrameError::TruncatedTag));
    }

    #[test]
    fn test_decode_lldp() {
        let data = ethernet_frame(mac(2), mac(1), ETHERTYPE_LLDP, &[0u8; 8]);
        let frame = decode(&data).unwrap();
        assert_eq!(frame.ethertype, ETHERTYPE_LLDP);
        assert_eq!(frame.ipv4, None);
    }

    #[test]
    fn test_parse_mac() {
        let mac = parse_mac("00:00:00:00:00:01").unwrap();
        assert_eq!(mac, EthernetAddress([0, 0, 0, 0, 0, 1]));
        assert!(parse_mac("invalid").is_none());
        assert!(parse_mac("00:00:00:00:00").is_none());
        assert!(parse_mac("00:00:00:00:00:zz").is_none());
    }

    #[test]
    fn test_format_mac_roundtrip() {
        let mac = EthernetAddress([0xaa, 0xbb, 0xcc, 0x00, 0x11, 0x22]);
        assert_eq!(parse_mac(&format_mac(&mac)), Some(mac));
    }
}
