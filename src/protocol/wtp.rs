//! WTP (Wireless Transaction Protocol) decoder.
//!
//! Handles single and concatenated PDUs, the transport information items
//! of the variable header, and segmented invokes/results, which are put
//! back together through the reassembly table before going to `wsp`.

use super::{DissectContext, Decoder};
use crate::error::DissectError;
use crate::reassembly::{AddResult, FragmentKey};
use crate::tree::{FieldValue, NodeId, Severity};
use crate::view::ByteView;

/// Registered UDP ports: WTP over UDP and WTP with security.
pub const UDP_PORTS: [u16; 2] = [2948, 9201];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PduType {
    NotAllowed,
    Invoke,
    Result,
    Ack,
    Abort,
    SegmentedInvoke,
    SegmentedResult,
    NegativeAck,
    Unknown(u8),
}

impl PduType {
    fn from_bits(bits: u8) -> Self {
        match bits {
            0 => PduType::NotAllowed,
            1 => PduType::Invoke,
            2 => PduType::Result,
            3 => PduType::Ack,
            4 => PduType::Abort,
            5 => PduType::SegmentedInvoke,
            6 => PduType::SegmentedResult,
            7 => PduType::NegativeAck,
            other => PduType::Unknown(other),
        }
    }

    fn name(&self) -> String {
        match self {
            PduType::NotAllowed => "Not Allowed".into(),
            PduType::Invoke => "Invoke".into(),
            PduType::Result => "Result".into(),
            PduType::Ack => "Ack".into(),
            PduType::Abort => "Abort".into(),
            PduType::SegmentedInvoke => "Segmented Invoke".into(),
            PduType::SegmentedResult => "Segmented Result".into(),
            PduType::NegativeAck => "Negative Ack".into(),
            PduType::Unknown(bits) => format!("Unknown PDU type 0x{bits:x}"),
        }
    }

    /// PDU types whose first byte carries the retransmission flag.
    fn has_rid(&self) -> bool {
        matches!(
            self,
            PduType::Invoke
                | PduType::Result
                | PduType::Ack
                | PduType::SegmentedInvoke
                | PduType::SegmentedResult
                | PduType::NegativeAck
        )
    }

    /// PDU types that never carry user data.
    fn is_control(&self) -> bool {
        matches!(self, PduType::Ack | PduType::NegativeAck | PduType::Abort)
    }
}

fn provider_abort_reason(reason: u8) -> &'static str {
    match reason {
        0x00 => "Unknown",
        0x01 => "Protocol Error",
        0x02 => "Invalid TID",
        0x03 => "Not Implemented Class 2",
        0x04 => "Not Implemented SAR",
        0x05 => "Not Implemented User Acknowledgement",
        0x06 => "WTP Version Zero",
        0x07 => "Capacity Temporarily Exceeded",
        0x08 => "No Response",
        0x09 => "Message Too Large",
        _ => "Unknown",
    }
}

fn tpi_name(identity: u8) -> &'static str {
    match identity {
        0x00 => "Error",
        0x01 => "Info",
        0x02 => "Option",
        0x03 => "Packet sequence number (PSN)",
        0x04 => "SDU boundary",
        0x05 => "Frame boundary",
        _ => "Unknown",
    }
}

/// Fixed header fields of one PDU.
struct Header {
    tid: u16,
    /// Position of this PDU in a segmented message; 0 for an unsegmented
    /// or first invoke/result.
    psn: u8,
    /// Fixed header length, including the missing-packet list of a
    /// negative ack.
    len: usize,
    /// Column text used when the PDU carries nothing for `wsp`.
    info: String,
}

/// Per-pass WTP state, kept in the context scratch map.
#[derive(Debug, Default)]
struct PassState {
    /// PDUs decoded so far in this pass.
    pdus: usize,
}

/// WTP decoder.
#[derive(Debug, Clone, Copy)]
pub struct WtpDecoder;

impl WtpDecoder {
    fn dissect_pdu(
        &self,
        view: ByteView<'_>,
        ctx: &mut DissectContext<'_>,
        parent: Option<NodeId>,
        depth: usize,
    ) -> Result<usize, DissectError> {
        if depth >= ctx.config.max_depth {
            return Err(DissectError::malformed("wtp", "concatenated PDUs nested too deep"));
        }
        let b0 = view.read_u8(0)?;
        if b0 == 0 {
            return self.dissect_concatenated(view, ctx, parent, depth);
        }

        // PDUs of one pass share the info column, nested runs included.
        let seen = ctx.scratch().update::<PassState, _>(|pass| {
            pass.pdus += 1;
            pass.pdus
        });
        if seen > 1 {
            ctx.append_info(", ");
        }

        let continued = b0 & 0x80 != 0;
        let pdu_type = PduType::from_bits((b0 >> 3) & 0x0F);
        let ttr = (b0 >> 1) & 0x01 != 0;
        let header = self.dissect_header(view, ctx, parent, b0, pdu_type)?;
        let node = header.node;
        let mut header = header.header;

        if pdu_type.has_rid() && b0 & 0x01 != 0 {
            header.info.push_str(" R");
        }

        let mut var_len = 0;
        if continued {
            var_len = self.dissect_tpis(view, ctx, node, header.len)?;
        }

        let data_offset = header.len + var_len;
        ctx.tree.set_len(node, data_offset.min(view.len()));
        if data_offset >= view.len() || pdu_type.is_control() {
            ctx.append_info(&header.info);
            return Ok(view.len());
        }

        let payload = view.slice_from(data_offset)?;
        let segmented = match pdu_type {
            PduType::SegmentedInvoke | PduType::SegmentedResult => true,
            PduType::Invoke | PduType::Result => !ttr,
            _ => false,
        };
        if segmented {
            self.dissect_segment(ctx, node, parent, &header, ttr, payload);
        } else {
            ctx.call_handle("wsp", payload, parent);
            if !ctx.dissector_found {
                ctx.append_info(&header.info);
            }
        }
        Ok(view.len())
    }

    /// A first byte of zero introduces a run of length-prefixed PDUs.
    fn dissect_concatenated(
        &self,
        view: ByteView<'_>,
        ctx: &mut DissectContext<'_>,
        parent: Option<NodeId>,
        depth: usize,
    ) -> Result<usize, DissectError> {
        let node = ctx.tree.add_subtree(
            parent,
            "wtp",
            "Wireless Transaction Protocol, Multiple PDUs",
            view.full_range(),
        );
        let mut offset = 1;
        let mut index = 1;
        while offset < view.len() {
            let first = view.read_u8(offset)?;
            let (field_len, pdu_len) = if first & 0x80 != 0 {
                (2, (((first & 0x7f) as usize) << 8) | view.read_u8(offset + 1)? as usize)
            } else {
                (1, first as usize)
            };
            let item = ctx.tree.add_field(
                Some(node),
                "wtp.sub_pdu_size",
                "Sub PDU size",
                FieldValue::UInt16(pdu_len as u16),
                view.range(offset, field_len)?,
            );
            ctx.tree
                .set_text(item, format!("PDU #{index}: {pdu_len} bytes"));
            let sub = view.slice(offset + field_len, pdu_len)?;
            self.dissect_pdu(sub, ctx, Some(item), depth + 1)?;
            offset += field_len + pdu_len;
            index += 1;
        }
        Ok(view.len())
    }

    fn dissect_header(
        &self,
        view: ByteView<'_>,
        ctx: &mut DissectContext<'_>,
        parent: Option<NodeId>,
        b0: u8,
        pdu_type: PduType,
    ) -> Result<HeaderNode, DissectError> {
        let name = pdu_type.name();
        let mut info = format!("WTP {name}");

        let node = ctx
            .tree
            .add_subtree(parent, "wtp", "Wireless Transaction Protocol", view.full_range());
        ctx.tree.add_field(
            Some(node),
            "wtp.continue_flag",
            "Continue Flag",
            FieldValue::Bool(b0 & 0x80 != 0),
            view.range(0, 1)?,
        );
        let type_item = ctx.tree.add_field(
            Some(node),
            "wtp.pdu_type",
            "PDU Type",
            FieldValue::UInt8((b0 >> 3) & 0x0F),
            view.range(0, 1)?,
        );
        ctx.tree
            .set_text(type_item, format!("PDU Type: {name} (0x{:02x})", (b0 >> 3) & 0x0F));

        let mut header = Header {
            tid: 0,
            psn: 0,
            len: 1,
            info: String::new(),
        };

        if !matches!(pdu_type, PduType::NotAllowed | PduType::Unknown(_)) {
            header.tid = view.read_u16_be(1)?;
            let tid_range = view.range(1, 2)?;
            ctx.tree
                .add_field(Some(node), "wtp.TID", "Transaction ID", FieldValue::UInt16(header.tid), tid_range);
            ctx.tree.add_field(
                Some(node),
                "wtp.TID.response",
                "TID Response",
                FieldValue::Bool(header.tid & 0x8000 != 0),
                tid_range,
            );
            ctx.tree.set_text(
                node,
                format!(
                    "Wireless Transaction Protocol, PDU: {name} ({}), Transaction ID: {}",
                    (b0 >> 3) & 0x0F,
                    header.tid
                ),
            );
        }

        match pdu_type {
            PduType::Invoke => {
                let b3 = view.read_u8(3)?;
                let class = b3 & 0x03;
                info.push_str(&format!(" Class {class}"));
                self.add_trailer(ctx, node, view, b0)?;
                let r3 = view.range(3, 1)?;
                ctx.tree
                    .add_field(Some(node), "wtp.header.version", "Version", FieldValue::UInt8(b3 >> 6), r3);
                ctx.tree
                    .add_field(Some(node), "wtp.header.TIDNew", "TIDNew", FieldValue::Bool(b3 & 0x20 != 0), r3);
                ctx.tree.add_field(
                    Some(node),
                    "wtp.header.UP",
                    "U/P flag",
                    FieldValue::Bool(b3 & 0x10 != 0),
                    r3,
                );
                ctx.tree.add_field(
                    Some(node),
                    "wtp.inv.transaction_class",
                    "Transaction Class",
                    FieldValue::UInt8(class),
                    r3,
                );
                header.len = 4;
            }
            PduType::SegmentedInvoke | PduType::SegmentedResult => {
                self.add_trailer(ctx, node, view, b0)?;
                header.psn = view.read_u8(3)?;
                ctx.tree.add_field(
                    Some(node),
                    "wtp.header.sequence_number",
                    "Packet Sequence Number",
                    FieldValue::UInt8(header.psn),
                    view.range(3, 1)?,
                );
                header.len = 4;
            }
            PduType::Result => {
                self.add_trailer(ctx, node, view, b0)?;
                header.len = 3;
            }
            PduType::Ack => {
                ctx.tree.add_field(
                    Some(node),
                    "wtp.header.TVETOK",
                    "Tve/Tok flag",
                    FieldValue::Bool(b0 & 0x04 != 0),
                    view.range(0, 1)?,
                );
                header.len = 3;
            }
            PduType::Abort => {
                let abort_type = b0 & 0x07;
                let reason = view.read_u8(3)?;
                let type_item = ctx.tree.add_field(
                    Some(node),
                    "wtp.header.abort_type",
                    "Abort Type",
                    FieldValue::UInt8(abort_type),
                    view.range(0, 1)?,
                );
                let (type_name, reason_text) = match abort_type {
                    0 => ("Provider", provider_abort_reason(reason).to_string()),
                    1 => ("User", format!("0x{reason:02x}")),
                    _ => ("Unknown", format!("0x{reason:02x}")),
                };
                ctx.tree
                    .set_text(type_item, format!("Abort Type: {type_name} ({abort_type})"));
                let reason_item = ctx.tree.add_field(
                    Some(node),
                    "wtp.header.abort_reason",
                    "Abort Reason",
                    FieldValue::UInt8(reason),
                    view.range(3, 1)?,
                );
                ctx.tree
                    .set_text(reason_item, format!("Abort Reason: {reason_text}"));
                header.len = 4;
            }
            PduType::NegativeAck => {
                let missing = view.read_u8(3)? as usize;
                ctx.tree.add_field(
                    Some(node),
                    "wtp.header.missing_packets",
                    "Number of missing packets",
                    FieldValue::UInt8(missing as u8),
                    view.range(3, 1)?,
                );
                for i in 0..missing {
                    let psn = view.read_u8(4 + i)?;
                    ctx.tree.add_field(
                        Some(node),
                        "wtp.header.sequence_number",
                        "Missing Packet Sequence Number",
                        FieldValue::UInt8(psn),
                        view.range(4 + i, 1)?,
                    );
                }
                header.len = 4 + missing;
            }
            PduType::NotAllowed | PduType::Unknown(_) => {
                ctx.tree.set_expert(
                    type_item,
                    Severity::Warn,
                    "malformed",
                    format!("PDU type {name} carries no header"),
                );
            }
        }

        header.info = info;
        Ok(HeaderNode { node, header })
    }

    /// Group/transmission trailer bits of invokes and results.
    fn add_trailer(
        &self,
        ctx: &mut DissectContext<'_>,
        node: NodeId,
        view: ByteView<'_>,
        b0: u8,
    ) -> Result<(), DissectError> {
        let trailer = (b0 >> 1) & 0x03;
        let item = ctx.tree.add_field(
            Some(node),
            "wtp.trailer_flags",
            "Trailer Flags",
            FieldValue::UInt8(trailer),
            view.range(0, 1)?,
        );
        let text = match trailer {
            0 => "Not last packet",
            1 => "Last packet of message",
            2 => "Last packet of packet group",
            _ => "RESERVED",
        };
        ctx.tree.set_text(item, format!("Trailer Flags: {text}"));
        Ok(())
    }

    /// Transport information items following the fixed header. Returns
    /// the length of the variable header.
    fn dissect_tpis(
        &self,
        view: ByteView<'_>,
        ctx: &mut DissectContext<'_>,
        node: NodeId,
        fixed_len: usize,
    ) -> Result<usize, DissectError> {
        let mut var_len = 0;
        loop {
            let offset = fixed_len + var_len;
            let first = view.read_u8(offset)?;
            let more = first & 0x80 != 0;
            let (value_offset, tpi_len) = if first & 0x04 != 0 {
                (2, 2 + view.read_u8(offset + 1)? as usize)
            } else {
                (1, 1 + (first & 0x03) as usize)
            };
            let tpi = view.slice(offset, tpi_len)?;
            let identity = (first & 0x78) >> 3;
            let item = ctx.tree.add_field(
                Some(node),
                "wtp.tpi",
                "TPI",
                FieldValue::bytes(tpi.bytes(value_offset, tpi_len - value_offset)?),
                tpi.full_range(),
            );
            ctx.tree.set_text(
                item,
                format!("TPI: {} ({} bytes)", tpi_name(identity), tpi_len - value_offset),
            );
            var_len += tpi_len;
            if !more {
                return Ok(var_len);
            }
        }
    }

    /// One piece of a segmented message. Reassembled messages go to `wsp`
    /// as a new data source.
    fn dissect_segment(
        &self,
        ctx: &mut DissectContext<'_>,
        node: NodeId,
        parent: Option<NodeId>,
        header: &Header,
        last: bool,
        payload: ByteView<'_>,
    ) {
        let saved = ctx.fragmented;
        ctx.fragmented = true;

        if !ctx.config.reassemble {
            ctx.append_info(&header.info);
            ctx.add_data(payload, Some(node));
            ctx.fragmented = saved;
            return;
        }

        let key = FragmentKey::new("wtp", header.tid as u32, ctx.src, ctx.dst);
        let result = ctx.reassembly.add_seq(
            key,
            header.psn as u32,
            last,
            payload.as_slice(),
            ctx.frame.number,
        );
        match result {
            AddResult::Reassembled(done) => {
                let source = ctx.tree.add_source("Reassembled WTP", done.data.clone());
                done.add_to_tree(ctx.tree, Some(node), source);
                ctx.fragmented = saved;
                let data = done.data;
                let whole = ByteView::with_source(&data, source);
                ctx.call_handle("wsp", whole, parent);
                if !ctx.dissector_found {
                    ctx.append_info(&header.info);
                }
                return;
            }
            AddResult::AlreadyReassembled { in_frame, .. } => {
                ctx.append_info(&format!(
                    "{} (WTP payload reassembled in packet {in_frame})",
                    header.info
                ));
                ctx.tree.add_generated(
                    Some(node),
                    "wtp.reassembled.in",
                    "Reassembled in",
                    FieldValue::UInt64(in_frame),
                    payload.full_range(),
                );
            }
            AddResult::Incomplete { flags } => {
                ctx.append_info(&format!(
                    "{} (Unreassembled fragment {})",
                    header.info, header.psn
                ));
                for name in flags.names() {
                    ctx.tree.add_text(Some(node), name, payload.full_range());
                }
            }
            AddResult::Malformed(reason) => {
                ctx.append_info(&header.info);
                ctx.tree
                    .set_expert(node, Severity::Warn, "reassembly", reason.to_string());
            }
        }
        ctx.tree.add_field(
            Some(node),
            "wtp.fragment",
            "Payload",
            FieldValue::bytes(payload.as_slice()),
            payload.full_range(),
        );
        ctx.fragmented = saved;
    }
}

struct HeaderNode {
    node: NodeId,
    header: Header,
}

impl Decoder for WtpDecoder {
    fn name(&self) -> &'static str {
        "wtp"
    }

    fn display_name(&self) -> &'static str {
        "WTP"
    }

    fn dissect(
        &self,
        view: ByteView<'_>,
        ctx: &mut DissectContext<'_>,
        parent: Option<NodeId>,
    ) -> Result<usize, DissectError> {
        ctx.set_protocol("WTP+WSP");
        ctx.set_info("");
        self.dissect_pdu(view, ctx, parent, 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::test_utils::{dissect_frame, EthBuilder, TestSession};
    use crate::session::SessionConfig;

    const PHONE: [u8; 4] = [10, 1, 0, 1];
    const GATEWAY: [u8; 4] = [10, 1, 0, 2];

    fn wtp_frame(pdu: &[u8]) -> Vec<u8> {
        EthBuilder::new().ipv4_udp(PHONE, GATEWAY, 49152, 9201, pdu)
    }

    /// Invoke, class 2, with the trailer flag saying whether it is the
    /// whole message.
    fn invoke(tid: u16, last: bool, payload: &[u8]) -> Vec<u8> {
        let b0 = 0x08 | if last { 0x02 } else { 0x00 };
        let mut pdu = vec![b0];
        pdu.extend_from_slice(&tid.to_be_bytes());
        pdu.push(0x12);
        pdu.extend_from_slice(payload);
        pdu
    }

    fn segmented_invoke(tid: u16, psn: u8, last: bool, payload: &[u8]) -> Vec<u8> {
        let b0 = 0x28 | if last { 0x02 } else { 0x00 };
        let mut pdu = vec![b0];
        pdu.extend_from_slice(&tid.to_be_bytes());
        pdu.push(psn);
        pdu.extend_from_slice(payload);
        pdu
    }

    #[test]
    fn test_invoke_goes_to_data_without_wsp() {
        let dissection = dissect_frame(&wtp_frame(&invoke(7, true, b"\x01\x60\x10")));
        let tree = dissection.tree();

        assert_eq!(dissection.summary().protocol, "WTP+WSP");
        assert_eq!(dissection.summary().info, "WTP Invoke Class 2");
        assert_eq!(dissection.summary().protocols, "frame:eth:ip:udp:wtp");
        assert_eq!(
            tree.find("wtp.TID").map(|n| n.value.clone()),
            Some(FieldValue::UInt16(7))
        );
        assert_eq!(
            tree.find("wtp.pdu_type").unwrap().display_text(),
            "PDU Type: Invoke (0x01)"
        );
        let data = tree.find("data").unwrap();
        assert_eq!(data.range.offset, 42 + 4);
        assert_eq!(data.range.len, 3);
    }

    #[test]
    fn test_ack_with_retransmission_flag() {
        let dissection = dissect_frame(&wtp_frame(&[0x19, 0x00, 0x07]));
        assert_eq!(dissection.summary().info, "WTP Ack R");
        assert!(dissection.tree().find("data").is_none());
    }

    #[test]
    fn test_abort() {
        let dissection = dissect_frame(&wtp_frame(&[0x20, 0x00, 0x07, 0x02]));
        let tree = dissection.tree();
        assert_eq!(dissection.summary().info, "WTP Abort");
        assert_eq!(
            tree.find("wtp.header.abort_type").unwrap().display_text(),
            "Abort Type: Provider (0)"
        );
        assert_eq!(
            tree.find("wtp.header.abort_reason").unwrap().display_text(),
            "Abort Reason: Invalid TID"
        );
    }

    #[test]
    fn test_concatenated_pdus() {
        let pdu = [0x00, 0x03, 0x18, 0x00, 0x01, 0x03, 0x18, 0x00, 0x02];
        let dissection = dissect_frame(&wtp_frame(&pdu));
        let tree = dissection.tree();

        assert_eq!(dissection.summary().info, "WTP Ack, WTP Ack");
        let tids: Vec<_> = tree.find_all("wtp.TID").map(|n| n.value.clone()).collect();
        assert_eq!(tids, vec![FieldValue::UInt16(1), FieldValue::UInt16(2)]);
        assert_eq!(tree.find_all("wtp.sub_pdu_size").count(), 2);
    }

    #[test]
    fn test_pdu_count_starts_over_each_pass() {
        let pdu = [0x00, 0x03, 0x18, 0x00, 0x01, 0x03, 0x18, 0x00, 0x02];
        let mut session = TestSession::new();
        let first = session.dissect(0, &wtp_frame(&pdu));
        let second = session.dissect(1, &wtp_frame(&pdu));
        assert_eq!(first.summary().info, "WTP Ack, WTP Ack");
        assert_eq!(second.summary().info, "WTP Ack, WTP Ack");

        let single = session.dissect(2, &wtp_frame(&[0x18, 0x00, 0x03]));
        assert_eq!(single.summary().info, "WTP Ack");
    }

    #[test]
    fn test_nested_concatenation_shares_separators() {
        // Outer run: one plain Ack, then an inner run of two Acks.
        let pdu = [
            0x00, 0x03, 0x18, 0x00, 0x01, 0x09, 0x00, 0x03, 0x18, 0x00, 0x02, 0x03, 0x18, 0x00, 0x03,
        ];
        let dissection = dissect_frame(&wtp_frame(&pdu));
        assert_eq!(dissection.summary().info, "WTP Ack, WTP Ack, WTP Ack");
        assert_eq!(dissection.tree().find_all("wtp.TID").count(), 3);
    }

    #[test]
    fn test_concatenated_overrun_is_malformed() {
        let pdu = [0x00, 0x09, 0x18, 0x00, 0x01];
        let dissection = dissect_frame(&wtp_frame(&pdu));
        assert_eq!(dissection.tree().experts("bounds").count(), 1);
        assert!(dissection.summary().info.ends_with("[Malformed Packet]"));
    }

    #[test]
    fn test_segmented_invoke_reassembles() {
        let mut session = TestSession::new();
        let first = session.dissect(0, &wtp_frame(&invoke(0x21, false, b"HEAD")));
        assert_eq!(
            first.summary().info,
            "WTP Invoke Class 2 (Unreassembled fragment 0)"
        );
        assert!(first.tree().find("wtp.fragment").is_some());

        let second = session.dissect(1_000, &wtp_frame(&segmented_invoke(0x21, 1, true, b"TAIL")));
        let tree = second.tree();
        let source = tree
            .sources()
            .iter()
            .find(|s| s.name == "Reassembled WTP")
            .unwrap();
        assert_eq!(&source.data[..], b"HEADTAIL");
        assert_eq!(second.summary().info, "WTP Segmented Invoke");
        let data = tree.find("data").unwrap();
        assert_eq!(tree.node_bytes(data), Some(&b"HEADTAIL"[..]));
        assert_eq!(tree.find_all("fragment").count(), 2);
    }

    #[test]
    fn test_segments_out_of_order() {
        let mut session = TestSession::new();
        let tail = session.dissect(0, &wtp_frame(&segmented_invoke(0x22, 1, true, b"BB")));
        assert_eq!(
            tail.summary().info,
            "WTP Segmented Invoke (Unreassembled fragment 1)"
        );
        let head = session.dissect(1_000, &wtp_frame(&invoke(0x22, false, b"AA")));
        let source = head
            .tree()
            .sources()
            .iter()
            .find(|s| s.name == "Reassembled WTP")
            .map(|s| s.data.clone());
        assert_eq!(source.as_deref(), Some(&b"AABB"[..]));
    }

    #[test]
    fn test_segment_without_reassembly() {
        let mut session = TestSession::with_config(SessionConfig {
            reassemble: false,
            ..Default::default()
        });
        let first = session.dissect(0, &wtp_frame(&invoke(0x23, false, b"HEAD")));
        assert_eq!(first.summary().info, "WTP Invoke Class 2");
        assert_eq!(first.tree().find("data").unwrap().range.len, 4);
        assert!(first.tree().find("wtp.fragment").is_none());
    }

    #[test]
    fn test_transport_information_items() {
        // Invoke with the continue flag, then a one-byte PSN item.
        let pdu = [0x8a, 0x00, 0x05, 0x12, 0x19, 0x00, b'x', b'y'];
        let dissection = dissect_frame(&wtp_frame(&pdu));
        let tree = dissection.tree();

        assert_eq!(
            tree.find("wtp.tpi").unwrap().display_text(),
            "TPI: Packet sequence number (PSN) (1 bytes)"
        );
        let data = tree.find("data").unwrap();
        assert_eq!(tree.node_bytes(data), Some(&b"xy"[..]));
    }

    #[test]
    fn test_truncated_invoke() {
        let dissection = dissect_frame(&wtp_frame(&[0x0a, 0x00]));
        assert_eq!(dissection.tree().experts("bounds").count(), 1);
        assert!(dissection.tree().find("wtp.continue_flag").is_some());
    }
}
