//! Generic "unparsed data" decoder.

use super::{DissectContext, Decoder};
use crate::error::DissectError;
use crate::tree::{FieldValue, NodeId, ResultTree};
use crate::view::ByteView;

/// Decoder of last resort: one bytes leaf covering the whole view.
#[derive(Debug, Clone, Copy)]
pub struct DataDecoder;

impl DataDecoder {
    /// Append the data leaf without going through the invocation chain.
    pub(crate) fn add_leaf(tree: &mut ResultTree, view: ByteView<'_>, parent: Option<NodeId>) -> NodeId {
        let id = tree.add_field(
            parent,
            "data",
            "Data",
            FieldValue::bytes(view.as_slice()),
            view.full_range(),
        );
        tree.set_text(id, format!("Data ({} bytes)", view.len()));
        id
    }
}

impl Decoder for DataDecoder {
    fn name(&self) -> &'static str {
        "data"
    }

    fn display_name(&self) -> &'static str {
        "Data"
    }

    fn dissect(
        &self,
        view: ByteView<'_>,
        ctx: &mut DissectContext<'_>,
        parent: Option<NodeId>,
    ) -> Result<usize, DissectError> {
        if !view.is_empty() {
            Self::add_leaf(ctx.tree, view, parent);
        }
        Ok(view.len())
    }
}
