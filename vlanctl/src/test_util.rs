//! Frame builders shared by unit and integration tests
//!
//! Uses smoltcp for packet construction, matching the decoder's
//! implementation.

use std::net::Ipv4Addr;

use smoltcp::phy::ChecksumCapabilities;
use smoltcp::wire::{
    EthernetAddress, EthernetFrame, EthernetProtocol, EthernetRepr, IpProtocol, Ipv4Packet,
    Ipv4Repr,
};

use crate::packet::{ETHERTYPE_IPV4, ETHERTYPE_LLDP, ETHERTYPE_VLAN};

/// LLDP multicast destination address
pub const LLDP_MULTICAST: EthernetAddress = EthernetAddress([0x01, 0x80, 0xc2, 0x00, 0x00, 0x0e]);

/// A locally-administered MAC address ending in `last`.
pub fn mac(last: u8) -> EthernetAddress {
    EthernetAddress([0x52, 0x54, 0x00, 0x00, 0x00, last])
}

/// Build an untagged Ethernet frame.
pub fn ethernet_frame(
    dst: EthernetAddress,
    src: EthernetAddress,
    ethertype: u16,
    payload: &[u8],
) -> Vec<u8> {
    let repr = EthernetRepr {
        src_addr: src,
        dst_addr: dst,
        ethertype: EthernetProtocol::from(ethertype),
    };

    let mut buffer = vec![0u8; repr.buffer_len() + payload.len()];
    let mut frame = EthernetFrame::new_unchecked(&mut buffer);
    repr.emit(&mut frame);
    frame.payload_mut().copy_from_slice(payload);
    buffer
}

/// Build an 802.1Q-tagged Ethernet frame.
pub fn vlan_frame(
    dst: EthernetAddress,
    src: EthernetAddress,
    vid: u16,
    inner_ethertype: u16,
    payload: &[u8],
) -> Vec<u8> {
    let mut data = Vec::with_capacity(18 + payload.len());
    data.extend_from_slice(dst.as_bytes());
    data.extend_from_slice(src.as_bytes());
    data.extend_from_slice(&ETHERTYPE_VLAN.to_be_bytes());
    data.extend_from_slice(&vid.to_be_bytes());
    data.extend_from_slice(&inner_ethertype.to_be_bytes());
    data.extend_from_slice(payload);
    data
}

/// Build a minimal IPv4 header (no payload).
pub fn ipv4_payload(src: Ipv4Addr, dst: Ipv4Addr) -> Vec<u8> {
    let repr = Ipv4Repr {
        src_addr: src,
        dst_addr: dst,
        next_header: IpProtocol::Udp,
        payload_len: 0,
        hop_limit: 64,
    };

    let mut buffer = vec![0u8; repr.buffer_len()];
    let mut packet = Ipv4Packet::new_unchecked(&mut buffer);
    repr.emit(&mut packet, &ChecksumCapabilities::default());
    buffer
}

/// Build a complete IPv4-over-Ethernet frame, tagged when `vid` is set.
pub fn ipv4_frame(
    dst: EthernetAddress,
    src: EthernetAddress,
    vid: Option<u16>,
    src_ip: Ipv4Addr,
    dst_ip: Ipv4Addr,
) -> Vec<u8> {
    let payload = ipv4_payload(src_ip, dst_ip);
    match vid {
        Some(vid) => vlan_frame(dst, src, vid, ETHERTYPE_IPV4, &payload),
        None => ethernet_frame(dst, src, ETHERTYPE_IPV4, &payload),
    }
}

/// Build an LLDP frame (discovery traffic the engine must ignore).
pub fn lldp_frame(src: EthernetAddress) -> Vec<u8> {
    ethernet_frame(LLDP_MULTICAST, src, ETHERTYPE_LLDP, &[0u8; 8])
}
