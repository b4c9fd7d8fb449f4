//! UDP decoder.

use etherparse::UdpHeaderSlice;

use super::{tables, DissectContext, Decoder};
use crate::address::Transport;
use crate::error::DissectError;
use crate::tree::{FieldValue, NodeId};
use crate::view::ByteView;

/// IP protocol number for UDP.
pub const IP_PROTO_UDP: u8 = 17;

/// UDP header length.
const HEADER_LEN: usize = 8;

/// UDP decoder; hands its payload to the `udp.port` table, then to the
/// `udp` heuristic list.
#[derive(Debug, Clone, Copy)]
pub struct UdpDecoder;

impl Decoder for UdpDecoder {
    fn name(&self) -> &'static str {
        "udp"
    }

    fn display_name(&self) -> &'static str {
        "UDP"
    }

    fn dissect(
        &self,
        view: ByteView<'_>,
        ctx: &mut DissectContext<'_>,
        parent: Option<NodeId>,
    ) -> Result<usize, DissectError> {
        let header = view.bytes(0, HEADER_LEN)?;
        let udp = UdpHeaderSlice::from_slice(header)
            .map_err(|e| DissectError::malformed("udp", e.to_string()))?;

        let src_port = udp.source_port();
        let dst_port = udp.destination_port();
        let length = udp.length() as usize;

        let node = ctx.tree.add_subtree(parent, "udp", "", view.range(0, HEADER_LEN)?);
        ctx.tree.set_text(
            node,
            format!("User Datagram Protocol, Src Port: {src_port}, Dst Port: {dst_port}"),
        );
        ctx.tree
            .add_field(Some(node), "udp.srcport", "Source Port", FieldValue::UInt16(src_port), view.range(0, 2)?);
        ctx.tree.add_field(
            Some(node),
            "udp.dstport",
            "Destination Port",
            FieldValue::UInt16(dst_port),
            view.range(2, 2)?,
        );
        ctx.tree
            .add_field(Some(node), "udp.length", "Length", FieldValue::UInt16(length as u16), view.range(4, 2)?);
        ctx.tree.add_field(
            Some(node),
            "udp.checksum",
            "Checksum",
            FieldValue::UInt16(udp.checksum()),
            view.range(6, 2)?,
        );

        ctx.transport = Transport::Udp;
        ctx.src_port = src_port;
        ctx.dst_port = dst_port;
        ctx.set_protocol("UDP");

        if length < HEADER_LEN {
            return Err(DissectError::malformed(
                "udp",
                format!("length {length} shorter than header"),
            ));
        }

        // The first fragment of an IP datagram carries the real length but
        // only part of the payload.
        if ctx.fragmented {
            let payload = view.slice_from(HEADER_LEN)?;
            ctx.add_data(payload, parent);
            return Ok(view.len());
        }

        if length > view.len() {
            return Err(DissectError::length("udp", "length", length, view.len()));
        }
        ctx.set_info(format!("{src_port} → {dst_port} Len={}", length - HEADER_LEN));

        let payload = view.slice(HEADER_LEN, length - HEADER_LEN)?;
        ctx.dissect_ports(tables::UDP_PORT, "udp", payload, parent);
        Ok(length)
    }
}
