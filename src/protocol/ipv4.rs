//! IPv4 decoder with fragment reassembly.

use etherparse::Ipv4HeaderSlice;

use super::{tables, DissectContext, Decoder};
use crate::address::Address;
use crate::error::DissectError;
use crate::reassembly::{AddResult, FragmentKey};
use crate::tree::{FieldValue, NodeId, Severity};
use crate::view::ByteView;

/// Link type for raw IP captures.
pub const LINKTYPE_RAW: u16 = 101;

/// Link type for raw IPv4 captures.
pub const LINKTYPE_IPV4: u16 = 228;

/// Minimum IPv4 header length.
const MIN_HEADER_LEN: usize = 20;

/// IPv4 decoder; hands its payload to the `ip.proto` table.
#[derive(Debug, Clone, Copy)]
pub struct Ipv4Decoder;

impl Decoder for Ipv4Decoder {
    fn name(&self) -> &'static str {
        "ip"
    }

    fn display_name(&self) -> &'static str {
        "IPv4"
    }

    fn dissect(
        &self,
        view: ByteView<'_>,
        ctx: &mut DissectContext<'_>,
        parent: Option<NodeId>,
    ) -> Result<usize, DissectError> {
        let first = view.read_u8(0)?;
        let header_len = (first & 0x0f) as usize * 4;
        if header_len < MIN_HEADER_LEN {
            return Err(DissectError::malformed(
                "ip",
                format!("header length {header_len} shorter than {MIN_HEADER_LEN}"),
            ));
        }
        let header = view.bytes(0, header_len)?;
        let ip = Ipv4HeaderSlice::from_slice(header)
            .map_err(|e| DissectError::malformed("ip", e.to_string()))?;

        let src = Address::Ipv4(ip.source_addr());
        let dst = Address::Ipv4(ip.destination_addr());
        let total_len = ip.total_len() as usize;
        let proto = ip.protocol().0;
        let more_fragments = ip.more_fragments();
        let frag_offset = ip.fragments_offset().value() as usize * 8;

        let node = ctx.tree.add_subtree(parent, "ip", "", view.range(0, header_len)?);
        ctx.tree.set_text(
            node,
            format!("Internet Protocol Version 4, Src: {src}, Dst: {dst}"),
        );
        let first_byte = view.range(0, 1)?;
        ctx.tree
            .add_field(Some(node), "ip.version", "Version", FieldValue::UInt8(4), first_byte);
        ctx.tree.add_field(
            Some(node),
            "ip.hdr_len",
            "Header Length",
            FieldValue::UInt8(header_len as u8),
            first_byte,
        );
        ctx.tree.add_field(
            Some(node),
            "ip.dsfield.dscp",
            "Differentiated Services Codepoint",
            FieldValue::UInt8(ip.dcp().value()),
            view.range(1, 1)?,
        );
        ctx.tree.add_field(
            Some(node),
            "ip.dsfield.ecn",
            "Explicit Congestion Notification",
            FieldValue::UInt8(ip.ecn().value()),
            view.range(1, 1)?,
        );
        let len_node = ctx.tree.add_field(
            Some(node),
            "ip.len",
            "Total Length",
            FieldValue::UInt16(total_len as u16),
            view.range(2, 2)?,
        );
        ctx.tree.add_field(
            Some(node),
            "ip.id",
            "Identification",
            FieldValue::UInt16(ip.identification()),
            view.range(4, 2)?,
        );
        let flags = view.range(6, 2)?;
        ctx.tree.add_field(
            Some(node),
            "ip.flags.df",
            "Don't fragment",
            FieldValue::Bool(ip.dont_fragment()),
            flags,
        );
        ctx.tree.add_field(
            Some(node),
            "ip.flags.mf",
            "More fragments",
            FieldValue::Bool(more_fragments),
            flags,
        );
        ctx.tree.add_field(
            Some(node),
            "ip.frag_offset",
            "Fragment Offset",
            FieldValue::UInt16(frag_offset as u16),
            flags,
        );
        ctx.tree.add_field(
            Some(node),
            "ip.ttl",
            "Time to Live",
            FieldValue::UInt8(ip.ttl()),
            view.range(8, 1)?,
        );
        ctx.tree.add_field(
            Some(node),
            "ip.proto",
            "Protocol",
            FieldValue::UInt8(proto),
            view.range(9, 1)?,
        );
        ctx.tree.add_field(
            Some(node),
            "ip.checksum",
            "Header Checksum",
            FieldValue::UInt16(ip.header_checksum()),
            view.range(10, 2)?,
        );
        ctx.tree
            .add_field(Some(node), "ip.src", "Source Address", FieldValue::address(src), view.range(12, 4)?);
        ctx.tree.add_field(
            Some(node),
            "ip.dst",
            "Destination Address",
            FieldValue::address(dst),
            view.range(16, 4)?,
        );

        ctx.src = src;
        ctx.dst = dst;
        ctx.set_protocol("IPv4");

        // A snapped capture keeps whatever is there; otherwise a total length
        // past the end of the buffer is a broken header.
        let end = if total_len <= view.len() {
            total_len
        } else if ctx.frame.is_truncated() {
            view.len()
        } else {
            ctx.tree
                .set_expert(len_node, Severity::Error, "malformed-length", "Total length exceeds captured bytes");
            return Err(DissectError::length("ip", "total_length", total_len, view.len()));
        };
        if end < header_len {
            ctx.tree
                .set_expert(len_node, Severity::Error, "malformed-length", "Total length shorter than header");
            return Err(DissectError::length("ip", "total_length", total_len, header_len));
        }
        ctx.tree.set_len(node, header_len);
        let payload = view.slice(header_len, end - header_len)?;

        if !more_fragments && frag_offset == 0 {
            ctx.dissect_sub(tables::IP_PROTO, proto, payload, parent);
            return Ok(end);
        }

        if !ctx.config.reassemble {
            self.unreassembled(ctx, proto, frag_offset, payload, parent);
            return Ok(end);
        }

        let key = FragmentKey::new("ip", ip.identification() as u32, src, dst);
        let result = ctx.reassembly.add_offset(
            key,
            frag_offset,
            !more_fragments,
            payload.as_slice(),
            ctx.frame.number,
        );
        match result {
            AddResult::Reassembled(done) => {
                let source = ctx.tree.add_source("Reassembled IPv4", done.data.clone());
                done.add_to_tree(ctx.tree, Some(node), source);
                let data = done.data;
                let whole = ByteView::with_source(&data, source);
                ctx.dissect_sub(tables::IP_PROTO, proto, whole, parent);
            }
            AddResult::AlreadyReassembled { in_frame, flags } => {
                ctx.tree.add_generated(
                    Some(node),
                    "ip.reassembled_in",
                    "Reassembled IPv4 in frame",
                    FieldValue::UInt64(in_frame),
                    payload.full_range(),
                );
                for name in flags.names() {
                    ctx.tree.add_text(Some(node), name, payload.full_range());
                }
                self.unreassembled(ctx, proto, frag_offset, payload, parent);
            }
            AddResult::Incomplete { flags } => {
                for name in flags.names() {
                    ctx.tree.add_text(Some(node), name, payload.full_range());
                }
                self.unreassembled(ctx, proto, frag_offset, payload, parent);
            }
            AddResult::Malformed(reason) => {
                ctx.tree
                    .set_expert(node, Severity::Warn, "reassembly", reason.to_string());
                self.unreassembled(ctx, proto, frag_offset, payload, parent);
            }
        }
        Ok(end)
    }
}

impl Ipv4Decoder {
    /// Show a fragment that is not (yet) part of a whole datagram. The
    /// first fragment still goes to the transport decoder, flagged as
    /// fragmented so it does not hand partial data further up.
    fn unreassembled(
        &self,
        ctx: &mut DissectContext<'_>,
        proto: u8,
        frag_offset: usize,
        payload: ByteView<'_>,
        parent: Option<NodeId>,
    ) {
        ctx.set_info(format!(
            "Fragmented IP protocol (proto={proto}, off={frag_offset})"
        ));
        let saved = ctx.fragmented;
        ctx.fragmented = true;
        if frag_offset == 0 {
            ctx.dissect_sub(tables::IP_PROTO, proto, payload, parent);
        } else {
            ctx.add_data(payload, parent);
        }
        ctx.fragmented = saved;
    }
}
