//! Ethernet II decoder.

use etherparse::Ethernet2HeaderSlice;

use super::{tables, DissectContext, Decoder};
use crate::address::Address;
use crate::error::DissectError;
use crate::tree::{FieldValue, NodeId};
use crate::view::ByteView;

/// Link type constant for Ethernet.
pub const LINKTYPE_ETHERNET: u16 = 1;

/// Ethernet II header length.
const HEADER_LEN: usize = 14;

/// Well-known EtherTypes.
pub mod ethertype {
    pub const IPV4: u16 = 0x0800;
    pub const ARP: u16 = 0x0806;
    pub const VLAN: u16 = 0x8100;
    pub const IPV6: u16 = 0x86DD;
}

/// Ethernet II decoder; hands its payload to the `ethertype` table.
#[derive(Debug, Clone, Copy)]
pub struct EthernetDecoder;

impl Decoder for EthernetDecoder {
    fn name(&self) -> &'static str {
        "eth"
    }

    fn display_name(&self) -> &'static str {
        "Ethernet II"
    }

    fn dissect(
        &self,
        view: ByteView<'_>,
        ctx: &mut DissectContext<'_>,
        parent: Option<NodeId>,
    ) -> Result<usize, DissectError> {
        let header = view.bytes(0, HEADER_LEN)?;
        let eth = Ethernet2HeaderSlice::from_slice(header)
            .map_err(|e| DissectError::malformed("eth", e.to_string()))?;

        let src = Address::Ether(eth.source());
        let dst = Address::Ether(eth.destination());
        let ether_type = eth.ether_type().0;

        let node = ctx.tree.add_subtree(parent, "eth", "", view.range(0, HEADER_LEN)?);
        ctx.tree
            .set_text(node, format!("Ethernet II, Src: {src}, Dst: {dst}"));
        ctx.tree.add_field(
            Some(node),
            "eth.dst",
            "Destination",
            FieldValue::address(dst),
            view.range(0, 6)?,
        );
        ctx.tree.add_field(
            Some(node),
            "eth.src",
            "Source",
            FieldValue::address(src),
            view.range(6, 6)?,
        );
        ctx.tree.add_field(
            Some(node),
            "eth.type",
            "Type",
            FieldValue::UInt16(ether_type),
            view.range(12, 2)?,
        );

        ctx.src = src;
        ctx.dst = dst;
        ctx.set_protocol("Ethernet");

        let payload = view.slice_from(HEADER_LEN)?;
        let consumed = ctx.dissect_sub(tables::ETHERTYPE, ether_type, payload, parent);
        Ok(HEADER_LEN + consumed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::test_utils::{dissect_frame, EthBuilder};

    #[test]
    fn test_parse_ethernet() {
        // Sample Ethernet frame: dst MAC, src MAC, ethertype (0x0800 = IPv4)
        let frame = [
            0xff, 0xff, 0xff, 0xff, 0xff, 0xff, // dst: broadcast
            0x00, 0x11, 0x22, 0x33, 0x44, 0x55, // src
            0x88, 0xb5, // ethertype: local experimental
            0xde, 0xad, // payload
        ];

        let dissection = dissect_frame(&frame);
        let tree = dissection.tree();

        assert_eq!(
            tree.find("eth.type").map(|n| n.value.clone()),
            Some(FieldValue::UInt16(0x88b5))
        );
        assert_eq!(
            tree.find("eth.src").map(|n| n.value.to_string()),
            Some("00:11:22:33:44:55".to_string())
        );
        // Unknown ethertype: payload becomes a data leaf
        let data = tree.find("data").unwrap();
        assert_eq!(data.range.offset, 14);
        assert_eq!(data.range.len, 2);
        assert_eq!(dissection.summary().protocols, "frame:eth");
    }

    #[test]
    fn test_parse_ethernet_too_short() {
        let dissection = dissect_frame(&[0xff; 10]);
        let tree = dissection.tree();
        assert!(tree.find("eth").is_none());
        assert_eq!(tree.experts("bounds").count(), 1);
    }

    #[test]
    fn test_ethernet_dispatches_ipv4() {
        let frame = EthBuilder::new().ipv4_udp([10, 0, 0, 1], [10, 0, 0, 2], 5000, 5001, b"xy");
        let dissection = dissect_frame(&frame);
        assert_eq!(dissection.summary().protocols, "frame:eth:ip:udp");
    }
}
