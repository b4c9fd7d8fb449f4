//! Dissection session.
//!
//! A [`Session`] owns the registry, the reassembly table, the conversation
//! table and the transaction matcher. Frames are fed in capture order with
//! [`Session::dissect`]; every call builds a fresh result tree while the
//! tables carry state from frame to frame.

mod config;

pub use config::{PortOverride, PortTable, SessionConfig};

use tracing::{debug, info, trace};

use crate::conversation::{ConversationTable, TransactionMatcher};
use crate::error::{Error, Result};
use crate::pcap::FrameInfo;
use crate::protocol::{
    radius_policy, register_builtin, tables, DissectContext, EngineState, Registry, Summary,
    RADIUS_FAMILY,
};
use crate::reassembly::ReassemblyTable;
use crate::tree::{FieldValue, ResultTree};
use crate::view::ByteView;

/// Output of one dissection pass.
#[derive(Debug, Clone, PartialEq)]
pub struct Dissection {
    pub frame: FrameInfo,
    tree: ResultTree,
    summary: Summary,
}

impl Dissection {
    pub fn tree(&self) -> &ResultTree {
        &self.tree
    }

    pub fn summary(&self) -> &Summary {
        &self.summary
    }

    pub fn into_parts(self) -> (ResultTree, Summary) {
        (self.tree, self.summary)
    }
}

/// Running totals over the frames a session has seen.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionStats {
    pub frames: u64,
    /// Frames with at least one malformed layer.
    pub malformed_frames: u64,
    /// Frames where some payload ended as generic data.
    pub data_frames: u64,
}

/// A dissection session over one capture.
pub struct Session {
    config: SessionConfig,
    registry: Registry,
    reassembly: ReassemblyTable,
    conversations: ConversationTable,
    transactions: TransactionMatcher,
    stats: SessionStats,
}

impl Session {
    /// Create a session with every built-in decoder registered and the
    /// configured port overrides applied.
    pub fn new(config: SessionConfig) -> Result<Self> {
        let mut registry = Registry::new();
        register_builtin(&mut registry);
        Self::with_registry(config, registry)
    }

    /// Create a session around a caller-built registry.
    pub fn with_registry(config: SessionConfig, mut registry: Registry) -> Result<Self> {
        for port_override in &config.port_overrides {
            let decoder = registry.find_handle(&port_override.decoder).ok_or_else(|| {
                Error::Config(format!("unknown decoder '{}'", port_override.decoder))
            })?;
            debug!(%port_override, "Applying port override");
            registry.register(port_override.table.table_name(), port_override.port, decoder);
        }

        let mut transactions = TransactionMatcher::new();
        transactions.register_policy(RADIUS_FAMILY, radius_policy());
        transactions.set_window_override(config.match_window_us);

        Ok(Self {
            config,
            registry,
            reassembly: ReassemblyTable::new(),
            conversations: ConversationTable::new(),
            transactions,
            stats: SessionStats::default(),
        })
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Registry access for adding decoders after construction.
    pub fn registry_mut(&mut self) -> &mut Registry {
        &mut self.registry
    }

    pub fn stats(&self) -> SessionStats {
        self.stats
    }

    pub fn reassembly(&self) -> &ReassemblyTable {
        &self.reassembly
    }

    pub fn conversations(&self) -> &ConversationTable {
        &self.conversations
    }

    pub fn transactions(&self) -> &TransactionMatcher {
        &self.transactions
    }

    /// Dissect one frame. The first dispatch is on the frame's link type;
    /// an unknown link type yields a data leaf.
    pub fn dissect(&mut self, frame: &FrameInfo, data: &[u8]) -> Dissection {
        let mut tree = ResultTree::new(data);
        let view = ByteView::new(data);
        let root = Self::add_frame_node(&mut tree, frame, view);

        let state = EngineState {
            registry: &mut self.registry,
            reassembly: &mut self.reassembly,
            conversations: &mut self.conversations,
            transactions: &mut self.transactions,
        };
        let mut ctx = DissectContext::new(&mut tree, state, &self.config, frame);
        ctx.dissect_sub(tables::LINK_TYPE, frame.link_type, view, None);

        let malformed = ctx.malformed_layers() > 0;
        let fell_back = ctx.data_fallbacks() > 0;
        let summary = ctx.into_summary();

        tree.add_generated(
            Some(root),
            "frame.protocols",
            "Protocols in frame",
            FieldValue::string(&summary.protocols),
            view.range(0, 0).unwrap_or_else(|_| view.full_range()),
        );

        self.stats.frames += 1;
        self.stats.malformed_frames += malformed as u64;
        self.stats.data_frames += fell_back as u64;
        trace!(frame = frame.number, protocols = %summary.protocols, "Dissected frame");

        Dissection {
            frame: *frame,
            tree,
            summary,
        }
    }

    fn add_frame_node(tree: &mut ResultTree, frame: &FrameInfo, view: ByteView<'_>) -> crate::tree::NodeId {
        let whole = view.full_range();
        let root = tree.add_subtree(None, "frame", "Frame", whole);
        tree.set_text(
            root,
            format!(
                "Frame {}: {} bytes on wire ({} bits), {} bytes captured ({} bits)",
                frame.number,
                frame.original_length,
                frame.original_length as u64 * 8,
                frame.captured_length,
                frame.captured_length as u64 * 8
            ),
        );
        tree.add_generated(Some(root), "frame.number", "Frame Number", FieldValue::UInt64(frame.number), whole);
        tree.add_generated(
            Some(root),
            "frame.time_epoch",
            "Epoch Time",
            FieldValue::Time(frame.timestamp_us),
            whole,
        );
        tree.add_generated(
            Some(root),
            "frame.len",
            "Frame Length",
            FieldValue::UInt32(frame.original_length),
            whole,
        );
        tree.add_generated(
            Some(root),
            "frame.cap_len",
            "Capture Length",
            FieldValue::UInt32(frame.captured_length),
            whole,
        );
        root
    }

    /// Forget everything learned from earlier frames. Registered decoders
    /// stay.
    pub fn reset(&mut self) {
        info!(
            frames = self.stats.frames,
            reassembly = self.reassembly.len(),
            conversations = self.conversations.len(),
            calls = self.transactions.len(),
            "Resetting session state"
        );
        self.reassembly.reset();
        self.conversations.reset();
        self.transactions.reset();
        self.stats = SessionStats::default();
    }
}
