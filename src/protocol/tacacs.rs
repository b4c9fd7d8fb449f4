//! TACACS decoders: XTACACS over UDP and TACACS+ over TCP.
//!
//! The payload is treated as opaque; only the direction is decoded, from
//! which side of the conversation owns the well-known port.

use super::{DissectContext, Decoder};
use crate::error::DissectError;
use crate::tree::{FieldValue, NodeId};
use crate::view::ByteView;

/// Well-known TACACS port, UDP and TCP.
pub const PORT: u16 = 49;

/// TACACS decoder. One instance per transport flavor.
#[derive(Debug, Clone, Copy)]
pub struct TacacsDecoder {
    plus: bool,
}

impl TacacsDecoder {
    /// XTACACS, carried over UDP.
    pub fn xtacacs() -> Self {
        Self { plus: false }
    }

    /// TACACS+, carried over TCP.
    pub fn tacplus() -> Self {
        Self { plus: true }
    }

    fn version(&self) -> &'static str {
        if self.plus {
            "Tacacs+"
        } else {
            "XTacacs"
        }
    }
}

impl Decoder for TacacsDecoder {
    fn name(&self) -> &'static str {
        "tacacs"
    }

    fn display_name(&self) -> &'static str {
        if self.plus {
            "TACACS+"
        } else {
            "TACACS"
        }
    }

    fn dissect(
        &self,
        view: ByteView<'_>,
        ctx: &mut DissectContext<'_>,
        parent: Option<NodeId>,
    ) -> Result<usize, DissectError> {
        let request = ctx.match_port == ctx.dst_port;
        let direction = if request { "Request" } else { "Response" };

        ctx.set_protocol("TACACS");
        ctx.set_info(direction);

        let whole = view.full_range();
        let node = ctx.tree.add_subtree(parent, "tacacs", "TACACS", whole);
        let empty = view.range(0, 0)?;
        ctx.tree.add_field(
            Some(node),
            "tacacs.version",
            "Tacacs Version",
            FieldValue::string(self.version()),
            empty,
        );
        let (abbrev, label) = if request {
            ("tacacs.request", "Request")
        } else {
            ("tacacs.response", "Response")
        };
        let flag = ctx
            .tree
            .add_generated(Some(node), abbrev, label, FieldValue::Bool(true), whole);
        ctx.tree.set_text(flag, format!("{direction}: <opaque data>"));
        Ok(view.len())
    }
}
