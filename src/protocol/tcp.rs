//! TCP decoder.
//!
//! Segments are decoded one at a time; stream reassembly is not performed,
//! each segment's payload goes straight to the `tcp.port` table.

use etherparse::TcpHeaderSlice;

use super::{tables, DissectContext, Decoder};
use crate::address::Transport;
use crate::error::DissectError;
use crate::tree::{FieldValue, NodeId};
use crate::view::ByteView;

/// IP protocol number for TCP.
pub const IP_PROTO_TCP: u8 = 6;

/// Minimum TCP header length.
const MIN_HEADER_LEN: usize = 20;

/// TCP decoder.
#[derive(Debug, Clone, Copy)]
pub struct TcpDecoder;

/// Render the set flags the way packet lists usually show them.
fn flag_string(tcp: &TcpHeaderSlice<'_>) -> String {
    let flags = [
        (tcp.fin(), "FIN"),
        (tcp.syn(), "SYN"),
        (tcp.rst(), "RST"),
        (tcp.psh(), "PSH"),
        (tcp.ack(), "ACK"),
        (tcp.urg(), "URG"),
        (tcp.ece(), "ECE"),
        (tcp.cwr(), "CWR"),
    ];
    flags
        .iter()
        .filter(|(set, _)| *set)
        .map(|(_, name)| *name)
        .collect::<Vec<_>>()
        .join(", ")
}

impl Decoder for TcpDecoder {
    fn name(&self) -> &'static str {
        "tcp"
    }

    fn display_name(&self) -> &'static str {
        "TCP"
    }

    fn dissect(
        &self,
        view: ByteView<'_>,
        ctx: &mut DissectContext<'_>,
        parent: Option<NodeId>,
    ) -> Result<usize, DissectError> {
        let offset_byte = view.read_u8(12)?;
        let header_len = (offset_byte >> 4) as usize * 4;
        if header_len < MIN_HEADER_LEN {
            return Err(DissectError::malformed(
                "tcp",
                format!("header length {header_len} shorter than {MIN_HEADER_LEN}"),
            ));
        }
        let header = view.bytes(0, header_len)?;
        let tcp = TcpHeaderSlice::from_slice(header)
            .map_err(|e| DissectError::malformed("tcp", e.to_string()))?;

        let src_port = tcp.source_port();
        let dst_port = tcp.destination_port();
        let flags = flag_string(&tcp);

        let node = ctx.tree.add_subtree(parent, "tcp", "", view.range(0, header_len)?);
        ctx.tree.set_text(
            node,
            format!(
                "Transmission Control Protocol, Src Port: {src_port}, Dst Port: {dst_port}, Seq: {}",
                tcp.sequence_number()
            ),
        );
        ctx.tree
            .add_field(Some(node), "tcp.srcport", "Source Port", FieldValue::UInt16(src_port), view.range(0, 2)?);
        ctx.tree.add_field(
            Some(node),
            "tcp.dstport",
            "Destination Port",
            FieldValue::UInt16(dst_port),
            view.range(2, 2)?,
        );
        ctx.tree.add_field(
            Some(node),
            "tcp.seq",
            "Sequence Number",
            FieldValue::UInt32(tcp.sequence_number()),
            view.range(4, 4)?,
        );
        ctx.tree.add_field(
            Some(node),
            "tcp.ack",
            "Acknowledgment Number",
            FieldValue::UInt32(tcp.acknowledgment_number()),
            view.range(8, 4)?,
        );
        ctx.tree.add_field(
            Some(node),
            "tcp.hdr_len",
            "Header Length",
            FieldValue::UInt8(header_len as u8),
            view.range(12, 1)?,
        );
        ctx.tree.add_field(
            Some(node),
            "tcp.flags",
            "Flags",
            FieldValue::string(&flags),
            view.range(12, 2)?,
        );
        ctx.tree.add_field(
            Some(node),
            "tcp.window_size",
            "Window",
            FieldValue::UInt16(tcp.window_size()),
            view.range(14, 2)?,
        );
        ctx.tree.add_field(
            Some(node),
            "tcp.checksum",
            "Checksum",
            FieldValue::UInt16(tcp.checksum()),
            view.range(16, 2)?,
        );
        ctx.tree.add_field(
            Some(node),
            "tcp.urgent_pointer",
            "Urgent Pointer",
            FieldValue::UInt16(tcp.urgent_pointer()),
            view.range(18, 2)?,
        );

        ctx.transport = Transport::Tcp;
        ctx.src_port = src_port;
        ctx.dst_port = dst_port;
        ctx.set_protocol("TCP");

        let payload = view.slice_from(header_len)?;
        ctx.set_info(format!(
            "{src_port} → {dst_port} [{flags}] Seq={} Len={}",
            tcp.sequence_number(),
            payload.len()
        ));
        if ctx.fragmented {
            ctx.add_data(payload, parent);
        } else if !payload.is_empty() {
            ctx.dissect_ports(tables::TCP_PORT, "tcp", payload, parent);
        }
        Ok(view.len())
    }
}
