//! Per-pass dissection context and the invocation boundary.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::Arc;

use smallvec::SmallVec;
use tracing::{debug, trace};

use super::registry::{Registry, TableKey};
use super::{DataDecoder, Decoder};
use crate::address::{Address, Transport};
use crate::conversation::{ConversationTable, TransactionMatcher};
use crate::error::DissectError;
use crate::pcap::FrameInfo;
use crate::reassembly::ReassemblyTable;
use crate::session::SessionConfig;
use crate::tree::{NodeId, ResultTree, Severity};
use crate::view::ByteView;

/// One-line summary of a frame: the protocol column, the info column and
/// the stack of protocols entered.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Summary {
    /// Layers entered in this pass, e.g. `frame:eth:ip:udp:radius`.
    pub protocols: String,
    pub protocol: String,
    pub info: String,
}

/// Protocol-private state that lives for exactly one dissection pass.
#[derive(Default)]
pub struct Scratch {
    slots: HashMap<TypeId, Box<dyn Any + Send>>,
}

impl Scratch {
    pub fn get<T: Any + Send>(&self) -> Option<&T> {
        self.slots
            .get(&TypeId::of::<T>())
            .and_then(|slot| slot.downcast_ref::<T>())
    }

    /// Run `f` on the slot for `T`, creating it with `T::default()` first
    /// if absent.
    pub fn update<T: Any + Send + Default, R>(&mut self, f: impl FnOnce(&mut T) -> R) -> R {
        let mut value = self.take::<T>().unwrap_or_default();
        let result = f(&mut value);
        self.insert(value);
        result
    }

    /// Remove and return the slot for `T`.
    pub fn take<T: Any + Send>(&mut self) -> Option<T> {
        let slot = self.slots.remove(&TypeId::of::<T>())?;
        slot.downcast::<T>().ok().map(|boxed| *boxed)
    }

    pub fn insert<T: Any + Send>(&mut self, value: T) {
        self.slots.insert(TypeId::of::<T>(), Box::new(value));
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

/// Shared tables a pass may read and update.
pub struct EngineState<'s> {
    pub registry: &'s mut Registry,
    pub reassembly: &'s mut ReassemblyTable,
    pub conversations: &'s mut ConversationTable,
    pub transactions: &'s mut TransactionMatcher,
}

/// Everything a decoder can see and touch during one dissection pass.
///
/// A context is built fresh for each frame; nothing in it except the shared
/// tables survives the pass.
pub struct DissectContext<'s> {
    pub tree: &'s mut ResultTree,
    registry: &'s mut Registry,
    pub reassembly: &'s mut ReassemblyTable,
    pub conversations: &'s mut ConversationTable,
    pub transactions: &'s mut TransactionMatcher,
    pub config: &'s SessionConfig,
    pub frame: &'s FrameInfo,

    /// Source endpoint of the innermost network layer decoded so far.
    pub src: Address,
    pub dst: Address,
    pub transport: Transport,
    pub src_port: u16,
    pub dst_port: u16,
    /// Port that selected the running decoder from a port table.
    pub match_port: u16,
    /// Set while a decoder is handling a fragment that was not reassembled.
    pub fragmented: bool,
    /// Whether the last sub-dissector lookup found a decoder.
    pub dissector_found: bool,

    summary: Summary,
    scratch: Scratch,
    layers: SmallVec<[&'static str; 8]>,
    depth: usize,
    data_fallbacks: usize,
    malformed: usize,
}

impl<'s> DissectContext<'s> {
    /// Create a context for one pass over `frame`.
    pub fn new(
        tree: &'s mut ResultTree,
        state: EngineState<'s>,
        config: &'s SessionConfig,
        frame: &'s FrameInfo,
    ) -> Self {
        let mut layers = SmallVec::new();
        layers.push("frame");
        Self {
            tree,
            registry: state.registry,
            reassembly: state.reassembly,
            conversations: state.conversations,
            transactions: state.transactions,
            config,
            frame,
            src: Address::None,
            dst: Address::None,
            transport: Transport::None,
            src_port: 0,
            dst_port: 0,
            match_port: 0,
            fragmented: false,
            dissector_found: false,
            summary: Summary::default(),
            scratch: Scratch::default(),
            layers,
            depth: 0,
            data_fallbacks: 0,
            malformed: 0,
        }
    }

    /// Registry access, for decoders that register children lazily.
    pub fn registry_mut(&mut self) -> &mut Registry {
        &mut *self.registry
    }

    pub fn registry(&self) -> &Registry {
        &*self.registry
    }

    pub fn scratch(&mut self) -> &mut Scratch {
        &mut self.scratch
    }

    /// Set the protocol column.
    pub fn set_protocol(&mut self, protocol: &str) {
        self.summary.protocol.clear();
        self.summary.protocol.push_str(protocol);
    }

    /// Replace the info column.
    pub fn set_info(&mut self, info: impl Into<String>) {
        self.summary.info = info.into();
    }

    /// Append to the info column.
    pub fn append_info(&mut self, text: &str) {
        self.summary.info.push_str(text);
    }

    pub fn summary(&self) -> &Summary {
        &self.summary
    }

    /// Number of times this pass fell back to a generic data leaf.
    pub fn data_fallbacks(&self) -> usize {
        self.data_fallbacks
    }

    /// Number of layers that ended in a malformed leaf.
    pub fn malformed_layers(&self) -> usize {
        self.malformed
    }

    /// Finish the pass and return its summary.
    pub fn into_summary(mut self) -> Summary {
        self.summary.protocols = self.layers.join(":");
        self.summary
    }

    /// Run `decoder` on `view`. This is the invocation boundary: a decoder
    /// error becomes a malformed leaf under `parent` and the whole view
    /// counts as consumed, so sibling and ancestor nodes are kept.
    pub fn call_decoder(
        &mut self,
        decoder: &Arc<dyn Decoder>,
        view: ByteView<'_>,
        parent: Option<NodeId>,
    ) -> usize {
        if self.depth >= self.config.max_depth {
            let err = DissectError::malformed(decoder.name(), "decoder nesting too deep");
            self.add_malformed(decoder.name(), &err, view, parent);
            return view.len();
        }

        trace!(decoder = decoder.name(), len = view.len(), depth = self.depth, "Invoking decoder");
        self.layers.push(decoder.name());
        self.depth += 1;
        let result = decoder.dissect(view, self, parent);
        self.depth -= 1;

        match result {
            Ok(consumed) => consumed.min(view.len()),
            Err(err) => {
                debug!(
                    frame = self.frame.number,
                    decoder = decoder.name(),
                    error = %err,
                    "Recovered malformed layer"
                );
                self.add_malformed(decoder.name(), &err, view, parent);
                view.len()
            }
        }
    }

    fn add_malformed(
        &mut self,
        protocol: &str,
        err: &DissectError,
        view: ByteView<'_>,
        parent: Option<NodeId>,
    ) {
        const COLUMN: &str = "[Malformed Packet]";

        self.malformed += 1;
        let node = self
            .tree
            .add_text(parent, format!("[Malformed Packet: {protocol}]"), view.full_range());
        self.tree
            .set_expert(node, Severity::Error, err.kind(), err.to_string());
        if !self.summary.info.ends_with(COLUMN) {
            if !self.summary.info.is_empty() {
                self.summary.info.push(' ');
            }
            self.summary.info.push_str(COLUMN);
        }
    }

    /// Look up `key` in `table` and run the decoder found there. Returns
    /// `None` on a miss without touching the tree.
    pub fn try_table(
        &mut self,
        table: &str,
        key: impl Into<TableKey>,
        view: ByteView<'_>,
        parent: Option<NodeId>,
    ) -> Option<usize> {
        let decoder = self.registry.lookup(table, key);
        self.dissector_found = decoder.is_some();
        decoder.map(|d| self.call_decoder(&d, view, parent))
    }

    /// Dissect `view` with the decoder registered for `key`, or fall back to
    /// a data leaf covering all of it.
    pub fn dissect_sub(
        &mut self,
        table: &str,
        key: impl Into<TableKey>,
        view: ByteView<'_>,
        parent: Option<NodeId>,
    ) -> usize {
        match self.try_table(table, key, view, parent) {
            Some(consumed) => consumed,
            None => self.add_data(view, parent),
        }
    }

    /// Call a named handle, falling back to a data leaf if nobody
    /// registered it.
    pub fn call_handle(&mut self, name: &str, view: ByteView<'_>, parent: Option<NodeId>) -> usize {
        match self.registry.find_handle(name) {
            Some(decoder) => {
                self.dissector_found = true;
                self.call_decoder(&decoder, view, parent)
            }
            None => {
                self.dissector_found = false;
                self.add_data(view, parent)
            }
        }
    }

    /// Transport-port dispatch: try the lower port first, then the higher,
    /// then the heuristic list, then a data leaf.
    pub fn dissect_ports(
        &mut self,
        table: &str,
        heuristics: &str,
        view: ByteView<'_>,
        parent: Option<NodeId>,
    ) -> usize {
        let (low, high) = if self.src_port <= self.dst_port {
            (self.src_port, self.dst_port)
        } else {
            (self.dst_port, self.src_port)
        };
        for port in [low, high] {
            if let Some(decoder) = self.registry.lookup(table, port) {
                self.dissector_found = true;
                self.match_port = port;
                return self.call_decoder(&decoder, view, parent);
            }
        }
        if let Some(consumed) = self.try_heuristics(heuristics, view, parent) {
            return consumed;
        }
        self.dissector_found = false;
        self.add_data(view, parent)
    }

    /// Ask every decoder in a heuristic list; the highest confidence wins,
    /// ties go to the one registered first.
    pub fn try_heuristics(
        &mut self,
        list: &str,
        view: ByteView<'_>,
        parent: Option<NodeId>,
    ) -> Option<usize> {
        let mut best: Option<(u32, Arc<dyn Decoder>)> = None;
        for decoder in self.registry.heuristics(list) {
            if let Some(confidence) = decoder.heuristic(view, self) {
                if best.as_ref().map_or(true, |(b, _)| confidence > *b) {
                    best = Some((confidence, decoder));
                }
            }
        }
        let (confidence, decoder) = best?;
        trace!(list, decoder = decoder.name(), confidence, "Heuristic accepted");
        self.dissector_found = true;
        Some(self.call_decoder(&decoder, view, parent))
    }

    /// Append a generic data leaf covering all of `view`. Returns the view
    /// length.
    pub fn add_data(&mut self, view: ByteView<'_>, parent: Option<NodeId>) -> usize {
        if view.is_empty() {
            return 0;
        }
        self.data_fallbacks += 1;
        DataDecoder::add_leaf(self.tree, view, parent);
        view.len()
    }
}
