//! Result tree: the decoded output of one dissection pass.
//!
//! Nodes live in an arena owned by the tree and refer to each other through
//! [`NodeId`] handles. Every node records the byte range it was decoded
//! from, tagged with the data source (captured frame or reassembled buffer)
//! that range belongs to. Children keep insertion order, which is decode
//! order.

mod field;

pub use field::{hex, FieldValue};

use bytes::Bytes;
use compact_str::CompactString;

use crate::view::{ByteRange, SourceId};

/// Handle to a node inside a [`ResultTree`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(usize);

/// Severity of an expert annotation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Chat,
    Note,
    Warn,
    Error,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Chat => "chat",
            Severity::Note => "note",
            Severity::Warn => "warn",
            Severity::Error => "error",
        }
    }
}

/// Diagnostic attached to a node: malformed layers, reassembly anomalies,
/// correlation observations.
#[derive(Debug, Clone, PartialEq)]
pub struct Expert {
    pub severity: Severity,
    /// Stable machine-readable kind, e.g. `"malformed-length"`.
    pub kind: &'static str,
    pub message: String,
}

/// One labeled field of the result tree.
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    /// Filter-style name, e.g. `"radius.code"`.
    pub abbrev: &'static str,
    /// Human-readable label, e.g. `"Code"`.
    pub label: CompactString,
    pub value: FieldValue,
    pub range: ByteRange,
    pub children: Vec<NodeId>,
    /// Replaces the default `label: value` rendering.
    pub text: Option<String>,
    /// Node was derived by the engine (e.g. a match result), not read from bytes.
    pub generated: bool,
    pub expert: Option<Expert>,
}

impl Node {
    /// Display line for this node.
    pub fn display_text(&self) -> String {
        let mut line = match (&self.text, &self.value) {
            (Some(text), _) => text.clone(),
            (None, FieldValue::None) => self.label.to_string(),
            (None, value) => format!("{}: {}", self.label, value),
        };
        if self.generated {
            line = format!("[{line}]");
        }
        line
    }
}

/// A named buffer that node ranges can point into.
#[derive(Debug, Clone, PartialEq)]
pub struct DataSource {
    pub name: CompactString,
    pub data: Bytes,
}

/// Arena of nodes plus the data sources their ranges refer to.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ResultTree {
    nodes: Vec<Node>,
    roots: Vec<NodeId>,
    sources: Vec<DataSource>,
}

impl ResultTree {
    /// Create a tree whose source 0 is the captured frame.
    pub fn new(frame: &[u8]) -> Self {
        Self {
            nodes: Vec::new(),
            roots: Vec::new(),
            sources: vec![DataSource {
                name: CompactString::new("Frame"),
                data: Bytes::copy_from_slice(frame),
            }],
        }
    }

    /// Register a buffer (typically a reassembled payload) as a new source.
    pub fn add_source(&mut self, name: &str, data: Bytes) -> SourceId {
        let id = SourceId(self.sources.len() as u16);
        self.sources.push(DataSource {
            name: CompactString::new(name),
            data,
        });
        id
    }

    pub fn source(&self, id: SourceId) -> Option<&DataSource> {
        self.sources.get(id.0 as usize)
    }

    pub fn sources(&self) -> &[DataSource] {
        &self.sources
    }

    /// Append a field under `parent` (or as a new root).
    pub fn add_field(
        &mut self,
        parent: Option<NodeId>,
        abbrev: &'static str,
        label: &str,
        value: FieldValue,
        range: ByteRange,
    ) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(Node {
            abbrev,
            label: CompactString::new(label),
            value,
            range,
            children: Vec::new(),
            text: None,
            generated: false,
            expert: None,
        });
        match parent.and_then(|p| self.nodes.get_mut(p.0)) {
            Some(parent) => parent.children.push(id),
            None => self.roots.push(id),
        }
        id
    }

    /// Append a value-less node, used for protocol subtrees and groupings.
    pub fn add_subtree(
        &mut self,
        parent: Option<NodeId>,
        abbrev: &'static str,
        label: &str,
        range: ByteRange,
    ) -> NodeId {
        self.add_field(parent, abbrev, label, FieldValue::None, range)
    }

    /// Append a text-only line.
    pub fn add_text(&mut self, parent: Option<NodeId>, text: impl Into<String>, range: ByteRange) -> NodeId {
        let id = self.add_field(parent, "", "", FieldValue::None, range);
        self.set_text(id, text);
        id
    }

    /// Append a node derived by the engine rather than read from the packet.
    pub fn add_generated(
        &mut self,
        parent: Option<NodeId>,
        abbrev: &'static str,
        label: &str,
        value: FieldValue,
        range: ByteRange,
    ) -> NodeId {
        let id = self.add_field(parent, abbrev, label, value, range);
        if let Some(node) = self.nodes.get_mut(id.0) {
            node.generated = true;
        }
        id
    }

    pub fn set_text(&mut self, id: NodeId, text: impl Into<String>) {
        if let Some(node) = self.nodes.get_mut(id.0) {
            node.text = Some(text.into());
        }
    }

    /// Shrink or grow a node's range once its decoder knows the real length.
    pub fn set_len(&mut self, id: NodeId, len: usize) {
        if let Some(node) = self.nodes.get_mut(id.0) {
            node.range.len = len;
        }
    }

    pub fn set_expert(&mut self, id: NodeId, severity: Severity, kind: &'static str, message: impl Into<String>) {
        if let Some(node) = self.nodes.get_mut(id.0) {
            node.expert = Some(Expert {
                severity,
                kind,
                message: message.into(),
            });
        }
    }

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.0)
    }

    pub fn roots(&self) -> &[NodeId] {
        &self.roots
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Depth-first walk in display order, yielding `(depth, node)`.
    pub fn walk(&self) -> Walk<'_> {
        Walk {
            tree: self,
            stack: self.roots.iter().rev().map(|id| (0, *id)).collect(),
        }
    }

    /// First node with the given abbreviation, in display order.
    pub fn find(&self, abbrev: &str) -> Option<&Node> {
        self.walk().map(|(_, node)| node).find(|n| n.abbrev == abbrev)
    }

    /// All nodes with the given abbreviation, in display order.
    pub fn find_all<'t>(&'t self, abbrev: &'t str) -> impl Iterator<Item = &'t Node> + 't {
        self.walk().map(|(_, node)| node).filter(move |n| n.abbrev == abbrev)
    }

    /// All nodes carrying an expert annotation of the given kind.
    pub fn experts<'t>(&'t self, kind: &'t str) -> impl Iterator<Item = &'t Node> + 't {
        self.walk()
            .map(|(_, node)| node)
            .filter(move |n| n.expert.as_ref().is_some_and(|e| e.kind == kind))
    }

    /// Bytes a node's range covers.
    pub fn node_bytes(&self, node: &Node) -> Option<&[u8]> {
        let source = self.source(node.range.source)?;
        source.data.get(node.range.offset..node.range.end())
    }

    /// Indented text rendering, four spaces per level.
    pub fn render_text(&self) -> String {
        let mut out = String::new();
        for (depth, node) in self.walk() {
            for _ in 0..depth {
                out.push_str("    ");
            }
            out.push_str(&node.display_text());
            if let Some(expert) = &node.expert {
                out.push_str(&format!(" <{}: {}>", expert.severity.as_str(), expert.message));
            }
            out.push('\n');
        }
        out
    }
}

/// Iterator returned by [`ResultTree::walk`].
pub struct Walk<'t> {
    tree: &'t ResultTree,
    stack: Vec<(usize, NodeId)>,
}

impl<'t> Iterator for Walk<'t> {
    type Item = (usize, &'t Node);

    fn next(&mut self) -> Option<Self::Item> {
        let (depth, id) = self.stack.pop()?;
        let node = self.tree.node(id)?;
        self.stack
            .extend(node.children.iter().rev().map(|child| (depth + 1, *child)));
        Some((depth, node))
    }
}
