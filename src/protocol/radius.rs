//! RADIUS decoder.
//!
//! Decodes the fixed header and the attribute list generically (no
//! dictionary beyond a handful of common attributes), concatenates
//! consecutive EAP-Message attributes into one buffer, and correlates
//! requests with responses through the session's transaction matcher.

use bytes::Bytes;

use super::{DissectContext, Decoder};
use crate::conversation::{CallKey, CallPolicy, ConversationKey, Resolution, DEFAULT_WINDOW_US};
use crate::error::DissectError;
use crate::tree::{FieldValue, NodeId, Severity};
use crate::view::ByteView;

/// Transaction matcher family name.
pub const RADIUS_FAMILY: &str = "radius";

/// Registered UDP ports (authentication and accounting, new and legacy).
pub const UDP_PORTS: [u16; 4] = [1812, 1813, 1645, 1646];

const HEADER_LEN: usize = 20;
const AUTHENTICATOR_LEN: usize = 16;

const VENDOR_SPECIFIC: u8 = 26;
const EAP_MESSAGE: u8 = 79;

mod code {
    pub const ACCESS_REQUEST: u8 = 1;
    pub const ACCESS_ACCEPT: u8 = 2;
    pub const ACCESS_REJECT: u8 = 3;
    pub const ACCOUNTING_REQUEST: u8 = 4;
    pub const ACCOUNTING_RESPONSE: u8 = 5;
    pub const ACCESS_PASSWORD_REQUEST: u8 = 7;
    pub const ACCESS_PASSWORD_ACK: u8 = 8;
    pub const ACCESS_PASSWORD_REJECT: u8 = 9;
    pub const ASCEND_ACCESS_EVENT_REQUEST: u8 = 33;
    pub const ASCEND_ACCESS_EVENT_RESPONSE: u8 = 34;
    pub const DISCONNECT_REQUEST: u8 = 40;
    pub const DISCONNECT_REQUEST_ACK: u8 = 41;
    pub const DISCONNECT_REQUEST_NAK: u8 = 42;
    pub const CHANGE_FILTER_REQUEST: u8 = 43;
    pub const CHANGE_FILTER_REQUEST_ACK: u8 = 44;
    pub const CHANGE_FILTER_REQUEST_NAK: u8 = 45;
}

/// Request code and the response codes that answer it.
const CALL_PAIRS: [(u8, &[u8]); 6] = [
    (code::ACCESS_REQUEST, &[code::ACCESS_ACCEPT, code::ACCESS_REJECT]),
    (code::ACCOUNTING_REQUEST, &[code::ACCOUNTING_RESPONSE]),
    (
        code::ACCESS_PASSWORD_REQUEST,
        &[code::ACCESS_PASSWORD_ACK, code::ACCESS_PASSWORD_REJECT],
    ),
    (code::ASCEND_ACCESS_EVENT_REQUEST, &[code::ASCEND_ACCESS_EVENT_RESPONSE]),
    (
        code::DISCONNECT_REQUEST,
        &[code::DISCONNECT_REQUEST_ACK, code::DISCONNECT_REQUEST_NAK],
    ),
    (
        code::CHANGE_FILTER_REQUEST,
        &[code::CHANGE_FILTER_REQUEST_ACK, code::CHANGE_FILTER_REQUEST_NAK],
    ),
];

/// Matching policy for RADIUS: five second window, request codes paired
/// with their accept/reject style answers.
pub fn radius_policy() -> CallPolicy {
    CALL_PAIRS
        .iter()
        .fold(CallPolicy::new(DEFAULT_WINDOW_US), |policy, (request, responses)| {
            let responses: Vec<u32> = responses.iter().map(|r| *r as u32).collect();
            policy.allow(*request as u32, &responses)
        })
}

fn is_request(code: u8) -> bool {
    CALL_PAIRS.iter().any(|(request, _)| *request == code)
}

fn is_response(code: u8) -> bool {
    CALL_PAIRS.iter().any(|(_, responses)| responses.contains(&code))
}

fn code_name(code: u8) -> Option<&'static str> {
    Some(match code {
        1 => "Access-Request",
        2 => "Access-Accept",
        3 => "Access-Reject",
        4 => "Accounting-Request",
        5 => "Accounting-Response",
        6 => "Accounting-Status",
        7 => "Access-Password-Request",
        8 => "Access-Password-Ack",
        9 => "Access-Password-Reject",
        10 => "Accounting-Message",
        11 => "Access-challenge",
        12 => "StatusServer",
        13 => "StatusClient",
        26 => "Vendor-Specific",
        29 => "Ascend-Access-Next-Code",
        30 => "Ascend-Access-New-Pin",
        32 => "Ascend-Password-Expired",
        33 => "Ascend-Access-Event-Request",
        34 => "Ascend-Access-Event-Response",
        40 => "Disconnect-Request",
        41 => "Disconnect-Request ACK",
        42 => "Disconnect-Request NAK",
        43 => "Change-Filter-Request",
        44 => "Change-Filter-Request-ACK",
        45 => "Change-Filter-Request-NAK",
        255 => "Reserved",
        _ => return None,
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AttrKind {
    Text,
    Integer,
    Address,
    Octets,
}

fn attribute(attr_type: u8) -> (&'static str, AttrKind) {
    use AttrKind::*;
    match attr_type {
        1 => ("User-Name", Text),
        2 => ("User-Password", Octets),
        3 => ("CHAP-Password", Octets),
        4 => ("NAS-IP-Address", Address),
        5 => ("NAS-Port", Integer),
        6 => ("Service-Type", Integer),
        7 => ("Framed-Protocol", Integer),
        8 => ("Framed-IP-Address", Address),
        18 => ("Reply-Message", Text),
        24 => ("State", Octets),
        25 => ("Class", Octets),
        26 => ("Vendor-Specific", Octets),
        27 => ("Session-Timeout", Integer),
        30 => ("Called-Station-Id", Text),
        31 => ("Calling-Station-Id", Text),
        32 => ("NAS-Identifier", Text),
        40 => ("Acct-Status-Type", Integer),
        44 => ("Acct-Session-Id", Text),
        61 => ("NAS-Port-Type", Integer),
        79 => ("EAP-Message", Octets),
        80 => ("Message-Authenticator", Octets),
        _ => ("Unknown-Attribute", Octets),
    }
}

fn vendor_name(vendor_id: u32) -> &'static str {
    match vendor_id {
        9 => "ciscoSystems",
        311 => "Microsoft",
        529 => "Ascend",
        2636 => "Juniper Networks",
        _ => "Unknown",
    }
}

fn attribute_value(kind: AttrKind, value: &[u8]) -> FieldValue {
    match (kind, value.len()) {
        (AttrKind::Text, _) => FieldValue::string(String::from_utf8_lossy(value)),
        (AttrKind::Integer, 4) => {
            FieldValue::UInt32(u32::from_be_bytes([value[0], value[1], value[2], value[3]]))
        }
        (AttrKind::Address, 4) => FieldValue::address(crate::address::Address::ipv4(value)),
        _ => FieldValue::bytes(value),
    }
}

/// Accumulator for consecutive EAP-Message attributes.
#[derive(Default)]
struct EapAssembly {
    buffer: Vec<u8>,
    segments: u32,
    done: bool,
}

/// RADIUS decoder.
#[derive(Debug, Clone, Copy)]
pub struct RadiusDecoder;

impl RadiusDecoder {
    /// Correlate this message with the rest of its exchange and render
    /// the result under `node`.
    fn correlate(&self, ctx: &mut DissectContext<'_>, node: NodeId, code: u8, ident: u8, view: ByteView<'_>) {
        let frame = ctx.frame.number;
        let time = ctx.frame.timestamp_us;
        let here = view.full_range();
        let nowhere = ByteView::with_source(&[], view.source()).full_range();

        if is_request(code) {
            // Replies may come from any address, so only the requester's
            // side is pinned.
            let key = ConversationKey::anchored(ctx.transport, ctx.src, ctx.src_port, ctx.dst_port);
            let conversation = ctx.conversations.find_or_create(key, frame);
            let call = CallKey {
                family: RADIUS_FAMILY,
                conversation,
                id: ident as u32,
            };
            let outcome = ctx
                .transactions
                .register_request(call, code as u32, frame, time);
            if outcome.duplicate {
                ctx.append_info(&format!(", Duplicate Request ID:{ident}"));
                let dup = ctx.tree.add_generated(
                    Some(node),
                    "radius.req.dup",
                    "Duplicate Request",
                    FieldValue::UInt8(ident),
                    nowhere,
                );
                if let Some(original) = outcome.original_frame {
                    ctx.tree.set_expert(
                        dup,
                        Severity::Note,
                        "duplicate",
                        format!("Retransmission of the request in frame {original}"),
                    );
                }
            }
            if let Some(response) = outcome.record.response_frame {
                let item = ctx.tree.add_generated(
                    Some(node),
                    "radius.rspframe",
                    "Response In",
                    FieldValue::UInt64(response),
                    nowhere,
                );
                ctx.tree
                    .set_text(item, format!("The response to this request is in frame {response}"));
            }
        } else if is_response(code) {
            let key = ConversationKey::anchored(ctx.transport, ctx.dst, ctx.dst_port, ctx.src_port);
            let resolution = match ctx.conversations.find(&key).map(|c| c.id) {
                Some(conversation) => {
                    let call = CallKey {
                        family: RADIUS_FAMILY,
                        conversation,
                        id: ident as u32,
                    };
                    ctx.transactions
                        .resolve_response(call, code as u32, frame, time)
                }
                None => Resolution::Unmatched,
            };

            match resolution {
                Resolution::Matched {
                    record,
                    rtt_us,
                    duplicate,
                } => {
                    let item = ctx.tree.add_generated(
                        Some(node),
                        "radius.reqframe",
                        "Request In",
                        FieldValue::UInt64(record.request_frame),
                        nowhere,
                    );
                    ctx.tree.set_text(
                        item,
                        format!(
                            "This is a response to a request in frame {}",
                            record.request_frame
                        ),
                    );
                    ctx.tree.add_generated(
                        Some(node),
                        "radius.time",
                        "Time from request",
                        FieldValue::Duration(rtt_us),
                        nowhere,
                    );
                    if duplicate {
                        ctx.append_info(&format!(", Duplicate Response ID:{ident}"));
                        let dup = ctx.tree.add_generated(
                            Some(node),
                            "radius.rsp.dup",
                            "Duplicate Response",
                            FieldValue::UInt8(ident),
                            nowhere,
                        );
                        ctx.tree.set_expert(
                            dup,
                            Severity::Note,
                            "duplicate",
                            "Retransmitted response",
                        );
                    }
                }
                Resolution::Unmatched => {
                    let item = ctx
                        .tree
                        .add_text(Some(node), "No request found for this response", here);
                    ctx.tree.set_expert(
                        item,
                        Severity::Note,
                        "unmatched",
                        "Response without a matching request",
                    );
                }
            }
        }
    }

    /// Decode the attribute list in `view` under `parent`. Structural
    /// problems end the list with an explanatory line; they are not
    /// errors of the RADIUS layer.
    fn dissect_avps(
        &self,
        ctx: &mut DissectContext<'_>,
        parent: NodeId,
        view: ByteView<'_>,
    ) -> Result<(), DissectError> {
        let length = view.len();
        let mut offset = 0;
        let mut eap = EapAssembly::default();

        while offset < length {
            let remaining = length - offset;
            if remaining < 2 {
                ctx.tree.add_text(
                    Some(parent),
                    "Not enough room in packet for AVP header",
                    view.range(offset, 0)?,
                );
                return Ok(());
            }
            let avp_type = view.read_u8(offset)?;
            let avp_len = view.read_u8(offset + 1)? as usize;
            if avp_len < 2 {
                ctx.tree.add_text(
                    Some(parent),
                    format!("AVP too short: length {avp_len} < 2"),
                    view.range(offset, 0)?,
                );
                return Ok(());
            }
            if remaining < avp_len {
                ctx.tree.add_text(
                    Some(parent),
                    "Not enough room in packet for AVP",
                    view.range(offset, 0)?,
                );
                return Ok(());
            }

            let (name, kind) = attribute(avp_type);
            let item = ctx.tree.add_field(
                Some(parent),
                "radius.avp",
                "AVP",
                FieldValue::UInt8(avp_type),
                view.range(offset, avp_len)?,
            );
            let mut text = format!("AVP: l={avp_len} t={name}({avp_type})");
            let value = view.slice(offset + 2, avp_len - 2)?;

            match avp_type {
                VENDOR_SPECIFIC => {
                    if !self.dissect_vendor(ctx, item, &mut text, value)? {
                        ctx.tree.set_text(item, text);
                        return Ok(());
                    }
                }
                EAP_MESSAGE => {
                    eap.segments += 1;
                    ctx.tree
                        .add_text(Some(item), "EAP fragment", value.full_range());
                    if eap.done {
                        text.push_str(" (non-consecutive)");
                    } else {
                        eap.buffer.extend_from_slice(value.as_slice());
                        let next = offset + avp_len;
                        let last = next + 2 > length || view.read_u8(next)? != EAP_MESSAGE;
                        if last {
                            text.push_str(&format!(" Last Segment[{}]", eap.segments));
                            eap.done = true;
                            self.dissect_eap(ctx, item, std::mem::take(&mut eap.buffer));
                        } else {
                            text.push_str(&format!(" Segment[{}]", eap.segments));
                        }
                    }
                }
                _ => {
                    let field = attribute_value(kind, value.as_slice());
                    text.push_str(&format!(": {field}"));
                    ctx.tree
                        .add_field(Some(item), "radius.avp.value", name, field, value.full_range());
                }
            }
            ctx.tree.set_text(item, text);
            offset += avp_len;
        }
        Ok(())
    }

    /// Vendor-Specific attribute: vendor id followed by sub-attributes.
    /// Returns `false` when the attribute list cannot continue.
    fn dissect_vendor(
        &self,
        ctx: &mut DissectContext<'_>,
        item: NodeId,
        text: &mut String,
        value: ByteView<'_>,
    ) -> Result<bool, DissectError> {
        if value.len() < 4 {
            text.push_str(" [AVP too short; no room for vendor ID]");
            return Ok(true);
        }
        let vendor_id = value.read_u32_be(0)?;
        text.push_str(&format!(" v={}({vendor_id})", vendor_name(vendor_id)));
        ctx.tree.add_field(
            Some(item),
            "radius.vendor_id",
            "Vendor ID",
            FieldValue::UInt32(vendor_id),
            value.range(0, 4)?,
        );

        let mut offset = 4;
        while offset < value.len() {
            let vsa_type = value.read_u8(offset)?;
            let vsa_len = match value.read_u8(offset + 1) {
                Ok(len) => len as usize,
                Err(_) => {
                    ctx.tree
                        .add_text(Some(item), "[VSA header truncated]", value.range(offset, 1)?);
                    return Ok(false);
                }
            };
            if vsa_len < 2 {
                ctx.tree
                    .add_text(Some(item), "[VSA too short]", value.range(offset + 1, 1)?);
                return Ok(false);
            }
            let Ok(vsa_value) = value.slice(offset + 2, vsa_len - 2) else {
                ctx.tree.add_text(
                    Some(item),
                    "Not enough room in packet for VSA",
                    value.range(offset, 0)?,
                );
                return Ok(false);
            };
            let vsa = ctx.tree.add_field(
                Some(item),
                "radius.vsa",
                "VSA",
                FieldValue::bytes(vsa_value.as_slice()),
                value.range(offset, vsa_len)?,
            );
            ctx.tree.set_text(
                vsa,
                format!(
                    "VSA: l={vsa_len} t=Unknown-Attribute({vsa_type}): {}",
                    FieldValue::bytes(vsa_value.as_slice())
                ),
            );
            offset += vsa_len;
        }
        Ok(true)
    }

    /// Hand the concatenated EAP payload to the `eap` handle without
    /// letting it take over the summary columns.
    fn dissect_eap(&self, ctx: &mut DissectContext<'_>, item: NodeId, buffer: Vec<u8>) {
        let data = Bytes::from(buffer);
        let source = ctx.tree.add_source("Reassembled EAP", data.clone());
        let eap_view = ByteView::with_source(&data, source);
        let eap_tree = ctx
            .tree
            .add_subtree(Some(item), "radius.eap", "Extensible Authentication Protocol", eap_view.full_range());

        let saved = ctx.summary().clone();
        ctx.call_handle("eap", eap_view, Some(eap_tree));
        ctx.set_protocol(&saved.protocol);
        ctx.set_info(saved.info);
    }
}

impl Decoder for RadiusDecoder {
    fn name(&self) -> &'static str {
        "radius"
    }

    fn display_name(&self) -> &'static str {
        "RADIUS"
    }

    fn heuristic(&self, view: ByteView<'_>, _ctx: &DissectContext<'_>) -> Option<u32> {
        let code = view.read_u8(0).ok()?;
        let length = view.read_u16_be(2).ok()? as usize;
        (code_name(code).is_some() && length >= HEADER_LEN && length == view.len()).then_some(50)
    }

    fn dissect(
        &self,
        view: ByteView<'_>,
        ctx: &mut DissectContext<'_>,
        parent: Option<NodeId>,
    ) -> Result<usize, DissectError> {
        ctx.set_protocol("RADIUS");
        ctx.set_info("");

        let code = view.read_u8(0)?;
        let ident = view.read_u8(1)?;
        let length = view.read_u16_be(2)? as usize;
        let name = code_name(code).unwrap_or("Unknown Packet");
        ctx.set_info(format!("{name}({code}) (id={ident}, l={length})"));

        let node = ctx
            .tree
            .add_subtree(parent, "radius", "RADIUS Protocol", view.range(0, length.min(view.len()))?);
        let code_item = ctx
            .tree
            .add_field(Some(node), "radius.code", "Code", FieldValue::UInt8(code), view.range(0, 1)?);
        ctx.tree.set_text(code_item, format!("Code: {name} ({code})"));
        let id_item = ctx.tree.add_field(
            Some(node),
            "radius.id",
            "Packet identifier",
            FieldValue::UInt8(ident),
            view.range(1, 1)?,
        );
        ctx.tree
            .set_text(id_item, format!("Packet identifier: 0x{ident:x} ({ident})"));

        let length_item = ctx.tree.add_field(
            Some(node),
            "radius.length",
            "Length",
            FieldValue::UInt16(length as u16),
            view.range(2, 2)?,
        );
        if length < HEADER_LEN {
            ctx.tree
                .set_text(length_item, format!("Length: {length} (bogus, < {HEADER_LEN})"));
            return Ok(view.len());
        }
        if length > view.len() {
            return Err(DissectError::length("radius", "length", length, view.len()));
        }
        ctx.tree.add_field(
            Some(node),
            "radius.authenticator",
            "Authenticator",
            FieldValue::bytes(view.bytes(4, AUTHENTICATOR_LEN)?),
            view.range(4, AUTHENTICATOR_LEN)?,
        );

        if ctx.config.correlate_transactions {
            self.correlate(ctx, node, code, ident, view);
        }

        let avp_len = length - HEADER_LEN;
        if avp_len > 0 {
            let avps = view.slice(HEADER_LEN, avp_len)?;
            let list = ctx
                .tree
                .add_subtree(Some(node), "radius.avps", "Attribute Value Pairs", avps.full_range());
            self.dissect_avps(ctx, list, avps)?;
        }
        // Octets past the declared length are padding.
        Ok(length)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::test_utils::{dissect_frame, radius_packet, EthBuilder, TestSession};

    const CLIENT: [u8; 4] = [10, 0, 0, 1];
    const SERVER: [u8; 4] = [10, 0, 0, 2];
    const SECOND: i64 = 1_000_000;

    fn request(id: u8, attrs: &[(u8, &[u8])]) -> Vec<u8> {
        EthBuilder::new().ipv4_udp(CLIENT, SERVER, 40000, 1812, &radius_packet(1, id, attrs))
    }

    fn accept(id: u8) -> Vec<u8> {
        EthBuilder::new().ipv4_udp(SERVER, CLIENT, 1812, 40000, &radius_packet(2, id, &[]))
    }

    #[test]
    fn test_header_and_attributes() {
        let frame = request(5, &[(1, b"alice"), (5, &[0, 0, 0, 7]), (4, &[192, 168, 0, 1])]);
        let dissection = dissect_frame(&frame);
        let tree = dissection.tree();

        assert_eq!(dissection.summary().protocol, "RADIUS");
        assert_eq!(dissection.summary().info, "Access-Request(1) (id=5, l=39)");
        assert_eq!(dissection.summary().protocols, "frame:eth:ip:udp:radius");
        assert_eq!(
            tree.find("radius.id").unwrap().display_text(),
            "Packet identifier: 0x5 (5)"
        );
        let avps: Vec<_> = tree.find_all("radius.avp").map(|n| n.display_text()).collect();
        assert_eq!(
            avps,
            vec![
                "AVP: l=7 t=User-Name(1): alice",
                "AVP: l=6 t=NAS-Port(5): 7",
                "AVP: l=6 t=NAS-IP-Address(4): 192.168.0.1",
            ]
        );
    }

    #[test]
    fn test_request_response_matching() {
        let mut session = TestSession::new();
        let req = session.dissect(0, &request(5, &[]));
        assert!(req.tree().find("radius.rspframe").is_none());

        let rsp = session.dissect(SECOND, &accept(5));
        let tree = rsp.tree();
        assert_eq!(
            tree.find("radius.reqframe").unwrap().display_text(),
            "[This is a response to a request in frame 1]"
        );
        assert_eq!(
            tree.find("radius.time").map(|n| n.value.clone()),
            Some(FieldValue::Duration(SECOND))
        );

        // Looking at the request again now shows where its answer is.
        let again = session.redissect(1);
        assert_eq!(
            again.tree().find("radius.rspframe").unwrap().display_text(),
            "[The response to this request is in frame 2]"
        );
        assert!(!again.summary().info.contains("Duplicate"));
    }

    #[test]
    fn test_response_after_window_is_unmatched() {
        let mut session = TestSession::new();
        session.dissect(0, &request(5, &[]));
        let rsp = session.dissect(10 * SECOND, &accept(5));
        assert!(rsp.tree().find("radius.reqframe").is_none());
        assert_eq!(rsp.tree().experts("unmatched").count(), 1);
    }

    #[test]
    fn test_duplicate_request_and_response() {
        let mut session = TestSession::new();
        session.dissect(0, &request(9, &[]));
        let dup = session.dissect(SECOND / 2, &request(9, &[]));
        assert_eq!(
            dup.summary().info,
            "Access-Request(1) (id=9, l=20), Duplicate Request ID:9"
        );
        assert!(dup.tree().find("radius.req.dup").is_some());

        session.dissect(SECOND, &accept(9));
        let dup_rsp = session.dissect(2 * SECOND, &accept(9));
        assert!(dup_rsp.summary().info.ends_with(", Duplicate Response ID:9"));
        assert_eq!(dup_rsp.tree().experts("duplicate").count(), 1);
    }

    #[test]
    fn test_correlation_disabled() {
        let mut session = TestSession::with_config(crate::session::SessionConfig {
            correlate_transactions: false,
            ..Default::default()
        });
        session.dissect(0, &request(5, &[]));
        let rsp = session.dissect(SECOND, &accept(5));
        assert!(rsp.tree().find("radius.reqframe").is_none());
        assert_eq!(rsp.tree().experts("unmatched").count(), 0);
    }

    #[test]
    fn test_bogus_length() {
        let mut packet = radius_packet(1, 1, &[]);
        packet[2] = 0;
        packet[3] = 12;
        let frame = EthBuilder::new().ipv4_udp(CLIENT, SERVER, 40000, 1812, &packet);
        let dissection = dissect_frame(&frame);
        let tree = dissection.tree();
        assert_eq!(
            tree.find("radius.length").unwrap().display_text(),
            "Length: 12 (bogus, < 20)"
        );
        assert!(tree.find("radius.authenticator").is_none());
    }

    #[test]
    fn test_length_past_datagram() {
        let mut packet = radius_packet(1, 1, &[(1, b"bob")]);
        packet[3] = 200;
        let frame = EthBuilder::new().ipv4_udp(CLIENT, SERVER, 40000, 1812, &packet);
        let dissection = dissect_frame(&frame);
        let tree = dissection.tree();
        assert!(tree.find("radius.code").is_some());
        assert!(tree.find("udp.srcport").is_some());
        assert_eq!(tree.experts("malformed-length").count(), 1);
        assert!(tree.find("radius.avp").is_none());
    }

    #[test]
    fn test_avp_structure_errors() {
        let mut packet = radius_packet(1, 1, &[(1, b"bob")]);
        packet.extend_from_slice(&[18, 1]);
        let len = packet.len() as u16;
        packet[2..4].copy_from_slice(&len.to_be_bytes());
        let frame = EthBuilder::new().ipv4_udp(CLIENT, SERVER, 40000, 1812, &packet);
        let dissection = dissect_frame(&frame);
        let lines: Vec<_> = dissection
            .tree()
            .walk()
            .map(|(_, n)| n.display_text())
            .collect();
        assert!(lines.contains(&"AVP too short: length 1 < 2".to_string()));
        assert_eq!(dissection.tree().experts("malformed").count(), 0);

        let mut packet = radius_packet(1, 1, &[]);
        packet.extend_from_slice(&[1, 9, b'x']);
        let len = packet.len() as u16;
        packet[2..4].copy_from_slice(&len.to_be_bytes());
        let frame = EthBuilder::new().ipv4_udp(CLIENT, SERVER, 40000, 1812, &packet);
        let rendered = dissect_frame(&frame).tree().render_text();
        assert!(rendered.contains("Not enough room in packet for AVP"));
    }

    #[test]
    fn test_eap_messages_concatenated() {
        let frame = request(
            3,
            &[(1, b"carol"), (79, b"\x02\x01"), (79, b"\x00\x06"), (79, b"\x01\x41"), (80, &[0u8; 16])],
        );
        let dissection = dissect_frame(&frame);
        let tree = dissection.tree();

        let eap_source = tree.sources().iter().find(|s| s.name == "Reassembled EAP").unwrap();
        assert_eq!(&eap_source.data[..], b"\x02\x01\x00\x06\x01\x41");

        let labels: Vec<_> = tree
            .find_all("radius.avp")
            .map(|n| n.display_text())
            .filter(|t| t.contains("EAP-Message"))
            .collect();
        assert_eq!(
            labels,
            vec![
                "AVP: l=4 t=EAP-Message(79) Segment[1]",
                "AVP: l=4 t=EAP-Message(79) Segment[2]",
                "AVP: l=4 t=EAP-Message(79) Last Segment[3]",
            ]
        );
        // No EAP decoder registered: the payload becomes data, the columns
        // stay RADIUS.
        assert_eq!(dissection.summary().protocol, "RADIUS");
        assert!(dissection.summary().info.starts_with("Access-Request(1)"));
    }

    #[test]
    fn test_non_consecutive_eap() {
        let frame = request(3, &[(79, b"\x01"), (1, b"x"), (79, b"\x02")]);
        let dissection = dissect_frame(&frame);
        let labels: Vec<_> = dissection
            .tree()
            .find_all("radius.avp")
            .map(|n| n.display_text())
            .collect();
        assert_eq!(labels[0], "AVP: l=3 t=EAP-Message(79) Last Segment[1]");
        assert_eq!(labels[2], "AVP: l=3 t=EAP-Message(79) (non-consecutive)");
    }

    #[test]
    fn test_vendor_specific() {
        let vsa = [0, 0, 0, 9, 1, 5, b'a', b'b', b'c'];
        let frame = request(4, &[(26, &vsa)]);
        let dissection = dissect_frame(&frame);
        let tree = dissection.tree();
        assert_eq!(
            tree.find("radius.avp").unwrap().display_text(),
            "AVP: l=11 t=Vendor-Specific(26) v=ciscoSystems(9)"
        );
        assert_eq!(
            tree.find("radius.vsa").unwrap().display_text(),
            "VSA: l=5 t=Unknown-Attribute(1): 616263"
        );
    }

    #[test]
    fn test_heuristic_on_unregistered_port() {
        let packet = radius_packet(4, 7, &[(40, &[0, 0, 0, 1])]);
        let frame = EthBuilder::new().ipv4_udp(CLIENT, SERVER, 40000, 3799, &packet);
        let dissection = dissect_frame(&frame);
        assert_eq!(dissection.summary().protocols, "frame:eth:ip:udp:radius");

        // Length field disagreeing with the datagram: heuristic declines.
        let mut bad = packet.clone();
        bad[3] += 1;
        let frame = EthBuilder::new().ipv4_udp(CLIENT, SERVER, 40000, 3799, &bad);
        let dissection = dissect_frame(&frame);
        assert_eq!(dissection.summary().protocols, "frame:eth:ip:udp");
        assert!(dissection.tree().find("radius").is_none());
    }

    #[test]
    fn test_policy_pairs() {
        let policy = radius_policy();
        assert!(policy.compatible(1, 2));
        assert!(policy.compatible(1, 3));
        assert!(policy.compatible(43, 45));
        assert!(!policy.compatible(1, 5));
        assert_eq!(policy.window_us, 5 * SECOND);
    }
}
