//! Reassembly of payloads split across several frames.
//!
//! A [`ReassemblyTable`] keeps one record per [`FragmentKey`]. Records move
//! from accumulating to complete (the concatenated buffer is produced exactly
//! once) or to malformed (a terminal anomaly such as two different tails).
//! Fragments are addressed either by sequence number ([`ReassemblyTable::add_seq`])
//! or by byte offset ([`ReassemblyTable::add_offset`]); both modes apply the
//! same overlap, conflict and too-long rules.
//!
//! Anomalies never abort the dissection pass. They come back as
//! [`FragmentFlags`] on the fragment that caused them, or as a
//! [`MalformedReason`] when the record cannot complete.

use std::collections::{BTreeSet, HashMap};
use std::fmt;

use bytes::{Bytes, BytesMut};
use tracing::{debug, warn};

use crate::address::Address;
use crate::tree::{FieldValue, NodeId, ResultTree, Severity};
use crate::view::{ByteRange, SourceId};

/// Identity of one multi-part message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FragmentKey {
    /// Protocol that owns the record, so different layers never collide.
    pub protocol: &'static str,
    /// Message identifier inside the protocol (IP identification, WTP TID).
    pub id: u32,
    pub src: Address,
    pub dst: Address,
}

impl FragmentKey {
    pub fn new(protocol: &'static str, id: u32, src: Address, dst: Address) -> Self {
        Self {
            protocol,
            id,
            src,
            dst,
        }
    }
}

/// Anomalies recorded on a single fragment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct FragmentFlags(u8);

impl FragmentFlags {
    /// Overlaps data already stored.
    pub const OVERLAP: FragmentFlags = FragmentFlags(0x01);
    /// Overlaps stored data with different bytes; the stored bytes win.
    pub const OVERLAP_CONFLICT: FragmentFlags = FragmentFlags(0x02);
    /// A second, different final fragment.
    pub const MULTIPLE_TAILS: FragmentFlags = FragmentFlags(0x04);
    /// Extends past the end set by the final fragment; not concatenated.
    pub const TOO_LONG: FragmentFlags = FragmentFlags(0x08);
    /// The final fragment seen again.
    pub const DUPLICATE_TAIL: FragmentFlags = FragmentFlags(0x10);

    const NAMES: [(FragmentFlags, &'static str); 5] = [
        (Self::OVERLAP, "Fragment overlap"),
        (Self::OVERLAP_CONFLICT, "Conflicting data in fragment overlap"),
        (Self::MULTIPLE_TAILS, "Multiple tail fragments found"),
        (Self::TOO_LONG, "Fragment too long, extends past end of message"),
        (Self::DUPLICATE_TAIL, "Duplicate tail fragment"),
    ];

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    pub fn contains(&self, other: FragmentFlags) -> bool {
        self.0 & other.0 == other.0 && !other.is_empty()
    }

    pub fn insert(&mut self, other: FragmentFlags) {
        self.0 |= other.0;
    }

    /// Whether any flag marks the reassembled data as untrustworthy.
    pub fn is_error(&self) -> bool {
        self.0 & (Self::OVERLAP_CONFLICT.0 | Self::MULTIPLE_TAILS.0 | Self::TOO_LONG.0) != 0
    }

    /// Human-readable names of the flags that are set.
    pub fn names(&self) -> Vec<&'static str> {
        Self::NAMES
            .iter()
            .filter(|(flag, _)| self.contains(*flag))
            .map(|(_, name)| *name)
            .collect()
    }
}

impl std::ops::BitOr for FragmentFlags {
    type Output = FragmentFlags;

    fn bitor(self, rhs: FragmentFlags) -> FragmentFlags {
        FragmentFlags(self.0 | rhs.0)
    }
}

/// Most missing positions listed in [`MalformedReason::Gap`].
pub const MAX_LISTED_GAPS: usize = 64;

/// Why a record can never complete.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MalformedReason {
    /// Forced to end with pieces missing. `missing` lists the first
    /// [`MAX_LISTED_GAPS`] of them (sequence numbers in sequence mode,
    /// start offsets of the holes in offset mode); `total` counts all.
    Gap { missing: Vec<u32>, total: u64 },
    /// Two final fragments disagree on where the message ends (sequence
    /// numbers, or end offsets in offset mode).
    MultipleTails { first: usize, second: usize },
    /// The same key was fed through both addressing modes.
    ModeMismatch,
}

impl fmt::Display for MalformedReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MalformedReason::Gap { total, .. } => {
                write!(f, "reassembly ended with {total} missing piece(s)")
            }
            MalformedReason::MultipleTails { first, second } => {
                write!(f, "multiple tail fragments ({first} and {second})")
            }
            MalformedReason::ModeMismatch => write!(f, "mixed sequence and offset fragments"),
        }
    }
}

/// One stored fragment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fragment {
    pub frame: u64,
    /// Sequence number; zero in offset mode.
    pub seq: u32,
    /// Byte offset inside the message. In sequence mode this is filled in
    /// when the record completes.
    pub offset: usize,
    pub data: Bytes,
    pub flags: FragmentFlags,
}

impl Fragment {
    /// Stored fragments never overflow; see [`ReassemblyRecord::add`].
    fn end(&self) -> usize {
        self.offset.saturating_add(self.data.len())
    }
}

/// Missing positions below a record's tail.
#[derive(Debug, Default)]
struct Gaps {
    listed: Vec<u32>,
    total: u64,
}

impl Gaps {
    fn push(&mut self, start: u64, count: u64) {
        let room = MAX_LISTED_GAPS.saturating_sub(self.listed.len()) as u64;
        self.listed
            .extend((start..start + count.min(room)).map(|p| p as u32));
        self.total += count;
    }

    fn is_empty(&self) -> bool {
        self.total == 0
    }

    fn into_reason(self) -> MalformedReason {
        MalformedReason::Gap {
            missing: self.listed,
            total: self.total,
        }
    }
}

/// Listing entry for one fragment of a completed message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FragmentInfo {
    pub frame: u64,
    pub seq: u32,
    pub offset: usize,
    pub len: usize,
    pub flags: FragmentFlags,
}

/// A completed message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reassembled {
    pub data: Bytes,
    /// Frame in which the last missing piece arrived.
    pub frame: u64,
    /// Every fragment stored for the record, in message order.
    pub fragments: Vec<FragmentInfo>,
    /// Union of all fragment flags.
    pub flags: FragmentFlags,
}

impl Reassembled {
    /// Render the fragment listing under `parent`. `source` is the tree
    /// data source holding [`Reassembled::data`].
    pub fn add_to_tree(&self, tree: &mut ResultTree, parent: Option<NodeId>, source: SourceId) -> NodeId {
        let whole = ByteRange {
            source,
            offset: 0,
            len: self.data.len(),
        };
        let list = tree.add_subtree(parent, "fragments", "Fragments", whole);
        tree.set_text(
            list,
            format!(
                "{} Fragments ({} bytes): {}",
                self.fragments.len(),
                self.data.len(),
                self.fragments
                    .iter()
                    .map(|f| format!("#{}({})", f.frame, f.len))
                    .collect::<Vec<_>>()
                    .join(", ")
            ),
        );

        for fragment in &self.fragments {
            let start = fragment.offset.min(self.data.len());
            let end = (fragment.offset + fragment.len).min(self.data.len());
            let range = ByteRange {
                source,
                offset: start,
                len: end - start,
            };
            let node = tree.add_field(
                Some(list),
                "fragment",
                "Fragment",
                FieldValue::UInt64(fragment.frame),
                range,
            );
            let text = match fragment.len {
                0 => format!("Frame: {}, payload: empty", fragment.frame),
                len => format!(
                    "Frame: {}, payload: {}-{} ({} bytes)",
                    fragment.frame,
                    fragment.offset,
                    fragment.offset + len - 1,
                    len
                ),
            };
            tree.set_text(node, text);
            for name in fragment.flags.names() {
                tree.add_text(Some(node), name, range);
            }
            if fragment.flags.is_error() {
                tree.set_expert(
                    node,
                    Severity::Warn,
                    "reassembly",
                    fragment.flags.names().join(", "),
                );
            }
        }

        if self.flags.is_error() {
            let err = tree.add_text(Some(list), "[Illegal fragments]", whole);
            tree.set_expert(err, Severity::Warn, "reassembly", "Reassembled data may be unreliable");
        }
        tree.add_generated(
            Some(list),
            "reassembled.in",
            "Reassembled in",
            FieldValue::UInt64(self.frame),
            whole,
        );
        tree.add_generated(
            Some(list),
            "reassembled.length",
            "Reassembled length",
            FieldValue::UInt32(self.data.len() as u32),
            whole,
        );
        list
    }
}

/// Outcome of adding one fragment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AddResult {
    /// Stored; the message is still missing pieces.
    Incomplete { flags: FragmentFlags },
    /// This fragment completed the message.
    Reassembled(Reassembled),
    /// The message had already been completed in `in_frame`; the fragment
    /// was only checked against it.
    AlreadyReassembled { in_frame: u64, flags: FragmentFlags },
    /// The record can never complete.
    Malformed(MalformedReason),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Sequence,
    Offset,
}

#[derive(Debug, Clone)]
enum State {
    Accumulating,
    Complete(Reassembled),
    Malformed(MalformedReason),
}

/// All fragments seen for one key.
#[derive(Debug, Clone)]
pub struct ReassemblyRecord {
    mode: Mode,
    /// Last sequence number (sequence mode) or total length (offset mode),
    /// once the final fragment has been seen.
    tail: Option<usize>,
    /// Arrival order.
    fragments: Vec<Fragment>,
    state: State,
}

impl ReassemblyRecord {
    fn new(mode: Mode) -> Self {
        Self {
            mode,
            tail: None,
            fragments: Vec::new(),
            state: State::Accumulating,
        }
    }

    /// Stored fragments in arrival order.
    pub fn fragments(&self) -> &[Fragment] {
        &self.fragments
    }

    pub fn is_complete(&self) -> bool {
        matches!(self.state, State::Complete(_))
    }

    pub fn reassembled(&self) -> Option<&Reassembled> {
        match &self.state {
            State::Complete(r) => Some(r),
            _ => None,
        }
    }

    pub fn malformed(&self) -> Option<&MalformedReason> {
        match &self.state {
            State::Malformed(reason) => Some(reason),
            _ => None,
        }
    }

    /// Position of a fragment in this record's addressing mode.
    fn position(&self, fragment: &Fragment) -> usize {
        match self.mode {
            Mode::Sequence => fragment.seq as usize,
            Mode::Offset => fragment.end(),
        }
    }

    /// Flags a new piece earns against the fragments already stored.
    fn overlap_flags(&self, seq: u32, offset: usize, data: &[u8]) -> FragmentFlags {
        let mut flags = FragmentFlags::empty();
        for stored in self.fragments.iter().filter(|f| !f.flags.contains(FragmentFlags::TOO_LONG)) {
            let overlap = match self.mode {
                Mode::Sequence if stored.seq == seq => Some((stored.data.as_ref(), data)),
                Mode::Sequence => None,
                Mode::Offset => {
                    let start = stored.offset.max(offset);
                    let end = stored.end().min(offset + data.len());
                    (start < end).then(|| {
                        (
                            &stored.data[start - stored.offset..end - stored.offset],
                            &data[start - offset..end - offset],
                        )
                    })
                }
            };
            if let Some((old, new)) = overlap {
                flags.insert(FragmentFlags::OVERLAP);
                if old != new {
                    flags.insert(FragmentFlags::OVERLAP_CONFLICT);
                }
            }
        }
        flags
    }

    /// Flags a late fragment earns against an already completed message.
    fn late_flags(&self, done: &Reassembled, seq: u32, offset: usize, is_last: bool, data: &[u8]) -> FragmentFlags {
        let mut flags = FragmentFlags::empty();
        let position = match self.mode {
            Mode::Sequence => seq as usize,
            Mode::Offset => offset.saturating_add(data.len()),
        };
        let tail = self.tail.unwrap_or(0);
        if position > tail {
            flags.insert(FragmentFlags::TOO_LONG);
        }
        if is_last {
            flags.insert(if position == tail {
                FragmentFlags::DUPLICATE_TAIL
            } else {
                FragmentFlags::MULTIPLE_TAILS
            });
        }
        match self.mode {
            // Compare with the bytes first stored for this number.
            Mode::Sequence => {
                let first = self
                    .fragments
                    .iter()
                    .find(|f| f.seq == seq && !f.flags.contains(FragmentFlags::TOO_LONG));
                if let Some(first) = first {
                    flags.insert(FragmentFlags::OVERLAP);
                    if first.data[..] != *data {
                        flags.insert(FragmentFlags::OVERLAP_CONFLICT);
                    }
                }
            }
            Mode::Offset => {
                let end = position.min(done.data.len());
                if offset < end && done.data[offset..end] != data[..end - offset] {
                    flags.insert(FragmentFlags::OVERLAP | FragmentFlags::OVERLAP_CONFLICT);
                } else if offset < end {
                    flags.insert(FragmentFlags::OVERLAP);
                }
            }
        }
        flags
    }

    /// Start offsets (offset mode) or sequence numbers (sequence mode) that
    /// are still missing below `tail`. `tail` is inclusive in sequence mode.
    fn gaps(&self, tail: usize) -> Gaps {
        let usable = self
            .fragments
            .iter()
            .filter(|f| !f.flags.contains(FragmentFlags::TOO_LONG));
        let mut gaps = Gaps::default();
        match self.mode {
            Mode::Sequence => {
                let tail = tail as u64;
                let present: BTreeSet<u64> = usable.map(|f| f.seq as u64).collect();
                let mut next = 0u64;
                for seq in present.range(..=tail) {
                    if *seq > next {
                        gaps.push(next, seq - next);
                    }
                    next = seq + 1;
                }
                if next <= tail {
                    gaps.push(next, tail - next + 1);
                }
            }
            Mode::Offset => {
                let mut pieces: Vec<(usize, usize)> = usable.map(|f| (f.offset, f.end())).collect();
                pieces.sort_unstable();
                let mut covered = 0;
                for (start, end) in pieces {
                    if start > covered {
                        gaps.push(covered as u64, 1);
                    }
                    covered = covered.max(end);
                }
                if covered < tail {
                    gaps.push(covered as u64, 1);
                }
            }
        }
        gaps
    }

    /// Concatenate the first-seen bytes of every position. Must only be
    /// called once nothing is missing.
    fn assemble(&mut self, frame: u64) -> Reassembled {
        let tail = self.tail.unwrap_or(0);
        let data = match self.mode {
            Mode::Sequence => {
                // Stable sort keeps arrival order among equal numbers.
                let mut order: Vec<usize> = (0..self.fragments.len())
                    .filter(|i| self.fragments[*i].seq as usize <= tail)
                    .collect();
                order.sort_by_key(|i| self.fragments[*i].seq);

                let mut buf = BytesMut::new();
                let mut previous = None;
                let mut offset = 0;
                for i in order {
                    let fragment = &mut self.fragments[i];
                    if previous != Some(fragment.seq) {
                        offset = buf.len();
                        previous = Some(fragment.seq);
                        buf.extend_from_slice(&fragment.data);
                    }
                    fragment.offset = offset;
                }
                buf.freeze()
            }
            Mode::Offset => {
                // Only called once the pieces cover `0..tail`, so the buffer
                // never outgrows the stored bytes.
                let mut buf = vec![0u8; tail];
                let mut filled = vec![false; tail];
                for fragment in self
                    .fragments
                    .iter()
                    .filter(|f| !f.flags.contains(FragmentFlags::TOO_LONG))
                {
                    for (i, byte) in fragment.data.iter().enumerate() {
                        let at = fragment.offset + i;
                        if at < tail && !filled[at] {
                            buf[at] = *byte;
                            filled[at] = true;
                        }
                    }
                }
                Bytes::from(buf)
            }
        };

        let mut fragments: Vec<FragmentInfo> = self
            .fragments
            .iter()
            .map(|f| FragmentInfo {
                frame: f.frame,
                seq: f.seq,
                offset: f.offset,
                len: f.data.len(),
                flags: f.flags,
            })
            .collect();
        fragments.sort_by_key(|f| (f.offset, f.seq, f.frame));
        let flags = fragments
            .iter()
            .fold(FragmentFlags::empty(), |acc, f| acc | f.flags);

        Reassembled {
            data,
            frame,
            fragments,
            flags,
        }
    }

    fn add(&mut self, seq: u32, offset: usize, is_last: bool, data: &[u8], frame: u64) -> AddResult {
        // A piece whose end does not fit in `usize` cannot belong to any
        // message; it is flagged and never stored.
        if self.mode == Mode::Offset && offset.checked_add(data.len()).is_none() {
            debug!(frame, offset, len = data.len(), "Fragment end overflows");
            return match &self.state {
                State::Malformed(reason) => AddResult::Malformed(reason.clone()),
                State::Complete(done) => AddResult::AlreadyReassembled {
                    in_frame: done.frame,
                    flags: FragmentFlags::TOO_LONG,
                },
                State::Accumulating => AddResult::Incomplete {
                    flags: FragmentFlags::TOO_LONG,
                },
            };
        }

        match &self.state {
            State::Malformed(reason) => return AddResult::Malformed(reason.clone()),
            State::Complete(done) => {
                let flags = self.late_flags(done, seq, offset, is_last, data);
                return AddResult::AlreadyReassembled {
                    in_frame: done.frame,
                    flags,
                };
            }
            State::Accumulating => {}
        }

        let mut fragment = Fragment {
            frame,
            seq,
            offset,
            data: Bytes::copy_from_slice(data),
            flags: self.overlap_flags(seq, offset, data),
        };
        let position = self.position(&fragment);

        if is_last {
            match self.tail {
                None => {
                    self.tail = Some(position);
                    for stored in &mut self.fragments {
                        let stored_position = match self.mode {
                            Mode::Sequence => stored.seq as usize,
                            Mode::Offset => stored.end(),
                        };
                        if stored_position > position {
                            stored.flags.insert(FragmentFlags::TOO_LONG);
                        }
                    }
                }
                Some(tail) if tail == position => fragment.flags.insert(FragmentFlags::DUPLICATE_TAIL),
                Some(tail) => {
                    fragment.flags.insert(FragmentFlags::MULTIPLE_TAILS);
                    self.fragments.push(fragment);
                    let reason = MalformedReason::MultipleTails {
                        first: tail,
                        second: position,
                    };
                    warn!(frame, %reason, "Reassembly record is malformed");
                    self.state = State::Malformed(reason.clone());
                    return AddResult::Malformed(reason);
                }
            }
        } else if self.tail.is_some_and(|tail| position > tail) {
            fragment.flags.insert(FragmentFlags::TOO_LONG);
        }

        let flags = fragment.flags;
        self.fragments.push(fragment);

        match self.tail {
            Some(tail) if self.gaps(tail).is_empty() => {
                let done = self.assemble(frame);
                debug!(
                    frame,
                    fragments = done.fragments.len(),
                    len = done.data.len(),
                    "Reassembly complete"
                );
                self.state = State::Complete(done.clone());
                AddResult::Reassembled(done)
            }
            _ => AddResult::Incomplete { flags },
        }
    }

    fn end(&mut self, frame: u64) -> AddResult {
        match &self.state {
            State::Malformed(reason) => return AddResult::Malformed(reason.clone()),
            State::Complete(done) => {
                return AddResult::AlreadyReassembled {
                    in_frame: done.frame,
                    flags: FragmentFlags::empty(),
                }
            }
            State::Accumulating => {}
        }

        let tail = match self.tail {
            Some(tail) => tail,
            None => self
                .fragments
                .iter()
                .map(|f| self.position(f))
                .max()
                .unwrap_or(0),
        };
        let gaps = self.gaps(tail);
        if !gaps.is_empty() || self.fragments.is_empty() {
            let reason = gaps.into_reason();
            warn!(frame, %reason, "Reassembly record is malformed");
            self.state = State::Malformed(reason.clone());
            return AddResult::Malformed(reason);
        }
        self.tail = Some(tail);
        let done = self.assemble(frame);
        self.state = State::Complete(done.clone());
        AddResult::Reassembled(done)
    }
}

/// Store of in-progress multi-part messages, shared across frames.
#[derive(Debug, Default)]
pub struct ReassemblyTable {
    records: HashMap<FragmentKey, ReassemblyRecord>,
}

impl ReassemblyTable {
    pub fn new() -> Self {
        Self::default()
    }

    fn record_for(&mut self, key: FragmentKey, mode: Mode) -> Result<&mut ReassemblyRecord, MalformedReason> {
        let record = self
            .records
            .entry(key)
            .or_insert_with(|| ReassemblyRecord::new(mode));
        if record.mode != mode {
            debug!(protocol = key.protocol, id = key.id, "Fragment addressing mode mismatch");
            return Err(MalformedReason::ModeMismatch);
        }
        Ok(record)
    }

    /// Add fragment number `seq` (counting from zero) of the message `key`.
    pub fn add_seq(&mut self, key: FragmentKey, seq: u32, is_last: bool, data: &[u8], frame: u64) -> AddResult {
        match self.record_for(key, Mode::Sequence) {
            Ok(record) => record.add(seq, 0, is_last, data, frame),
            Err(reason) => AddResult::Malformed(reason),
        }
    }

    /// Add the bytes found at `offset` of the message `key`. The final
    /// fragment fixes the message length.
    pub fn add_offset(
        &mut self,
        key: FragmentKey,
        offset: usize,
        is_last: bool,
        data: &[u8],
        frame: u64,
    ) -> AddResult {
        match self.record_for(key, Mode::Offset) {
            Ok(record) => record.add(0, offset, is_last, data, frame),
            Err(reason) => AddResult::Malformed(reason),
        }
    }

    /// Force a record to finish with what it has. Without a final fragment
    /// the highest position seen is taken as the end. `None` if the key
    /// is unknown.
    pub fn end(&mut self, key: &FragmentKey, frame: u64) -> Option<AddResult> {
        self.records.get_mut(key).map(|record| record.end(frame))
    }

    pub fn record(&self, key: &FragmentKey) -> Option<&ReassemblyRecord> {
        self.records.get(key)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Drop every record.
    pub fn reset(&mut self) {
        self.records.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(id: u32) -> FragmentKey {
        FragmentKey::new("test", id, Address::None, Address::None)
    }

    fn reassembled(result: AddResult) -> Reassembled {
        match result {
            AddResult::Reassembled(r) => r,
            other => panic!("expected reassembly, got {other:?}"),
        }
    }

    #[test]
    fn test_seq_in_order() {
        let mut table = ReassemblyTable::new();
        assert_eq!(
            table.add_seq(key(1), 0, false, b"AB", 1),
            AddResult::Incomplete {
                flags: FragmentFlags::empty()
            }
        );
        let done = reassembled(table.add_seq(key(1), 1, true, b"CD", 2));
        assert_eq!(&done.data[..], b"ABCD");
        assert_eq!(done.frame, 2);
        assert_eq!(done.fragments.len(), 2);
        assert_eq!(done.fragments[1].offset, 2);
        assert!(table.record(&key(1)).unwrap().is_complete());
    }

    #[test]
    fn test_seq_reverse_order() {
        let mut table = ReassemblyTable::new();
        assert!(matches!(
            table.add_seq(key(1), 1, true, b"CD", 1),
            AddResult::Incomplete { .. }
        ));
        let done = reassembled(table.add_seq(key(1), 0, false, b"AB", 2));
        assert_eq!(&done.data[..], b"ABCD");
    }

    #[test]
    fn test_completed_record_does_not_restart() {
        let mut table = ReassemblyTable::new();
        table.add_seq(key(1), 0, true, b"AB", 1);
        let result = table.add_seq(key(1), 0, true, b"AB", 5);
        assert_eq!(
            result,
            AddResult::AlreadyReassembled {
                in_frame: 1,
                flags: FragmentFlags::OVERLAP | FragmentFlags::DUPLICATE_TAIL
            }
        );
        let late = table.add_seq(key(1), 3, false, b"ZZ", 6);
        match late {
            AddResult::AlreadyReassembled { flags, .. } => assert!(flags.contains(FragmentFlags::TOO_LONG)),
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_seq_conflict_keeps_first_bytes() {
        let mut table = ReassemblyTable::new();
        table.add_seq(key(2), 0, false, b"AAAA", 1);
        let result = table.add_seq(key(2), 0, false, b"BBBB", 2);
        assert_eq!(
            result,
            AddResult::Incomplete {
                flags: FragmentFlags::OVERLAP | FragmentFlags::OVERLAP_CONFLICT
            }
        );
        let done = reassembled(table.add_seq(key(2), 1, true, b"!", 3));
        assert_eq!(&done.data[..], b"AAAA!");
        assert!(done.flags.is_error());
        assert_eq!(done.fragments.len(), 3);
    }

    #[test]
    fn test_multiple_tails_is_terminal() {
        let mut table = ReassemblyTable::new();
        table.add_seq(key(3), 2, true, b"x", 1);
        let result = table.add_seq(key(3), 4, true, b"y", 2);
        assert_eq!(
            result,
            AddResult::Malformed(MalformedReason::MultipleTails { first: 2, second: 4 })
        );
        assert!(matches!(
            table.add_seq(key(3), 0, false, b"z", 3),
            AddResult::Malformed(_)
        ));
    }

    #[test]
    fn test_past_tail_excluded() {
        let mut table = ReassemblyTable::new();
        table.add_seq(key(4), 5, false, b"late", 1);
        table.add_seq(key(4), 1, true, b"CD", 2);
        let done = reassembled(table.add_seq(key(4), 0, false, b"AB", 3));
        assert_eq!(&done.data[..], b"ABCD");
        let excluded = done.fragments.iter().find(|f| f.seq == 5).unwrap();
        assert!(excluded.flags.contains(FragmentFlags::TOO_LONG));
    }

    #[test]
    fn test_end_reports_gap() {
        let mut table = ReassemblyTable::new();
        table.add_seq(key(5), 0, false, b"a", 1);
        table.add_seq(key(5), 3, false, b"d", 2);
        assert_eq!(
            table.end(&key(5), 3),
            Some(AddResult::Malformed(MalformedReason::Gap {
                missing: vec![1, 2],
                total: 2
            }))
        );
        assert!(table.end(&key(6), 3).is_none());
    }

    #[test]
    fn test_end_without_tail_completes() {
        let mut table = ReassemblyTable::new();
        table.add_seq(key(5), 0, false, b"a", 1);
        table.add_seq(key(5), 1, false, b"b", 2);
        let done = reassembled(table.end(&key(5), 3).unwrap());
        assert_eq!(&done.data[..], b"ab");
    }

    #[test]
    fn test_offset_mode_overlap_first_wins() {
        let mut table = ReassemblyTable::new();
        table.add_offset(key(7), 0, false, b"AAAA", 1);
        let result = table.add_offset(key(7), 2, false, b"BBBB", 2);
        assert_eq!(
            result,
            AddResult::Incomplete {
                flags: FragmentFlags::OVERLAP | FragmentFlags::OVERLAP_CONFLICT
            }
        );
        let done = reassembled(table.add_offset(key(7), 6, true, b"CC", 3));
        assert_eq!(&done.data[..], b"AAAABBCC");
    }

    #[test]
    fn test_offset_mode_hole_waits() {
        let mut table = ReassemblyTable::new();
        table.add_offset(key(8), 4, true, b"5678", 1);
        assert!(matches!(
            table.add_offset(key(8), 0, false, b"12", 2),
            AddResult::Incomplete { .. }
        ));
        assert_eq!(
            table.end(&key(8), 3),
            Some(AddResult::Malformed(MalformedReason::Gap {
                missing: vec![2],
                total: 1
            }))
        );
    }

    #[test]
    fn test_mode_mismatch() {
        let mut table = ReassemblyTable::new();
        table.add_offset(key(9), 0, false, b"ab", 1);
        assert_eq!(
            table.add_seq(key(9), 1, true, b"cd", 2),
            AddResult::Malformed(MalformedReason::ModeMismatch)
        );
    }

    #[test]
    fn test_fragment_listing_in_tree() {
        let mut table = ReassemblyTable::new();
        table.add_seq(key(10), 0, false, b"AB", 1);
        let done = reassembled(table.add_seq(key(10), 1, true, b"CD", 2));

        let mut tree = ResultTree::new(&[]);
        let source = tree.add_source("Reassembled", done.data.clone());
        done.add_to_tree(&mut tree, None, source);
        let list = tree.find("fragments").unwrap();
        assert_eq!(list.display_text(), "2 Fragments (4 bytes): #1(2), #2(2)");
        let pieces: Vec<_> = tree.find_all("fragment").map(|n| n.display_text()).collect();
        assert_eq!(
            pieces,
            vec![
                "Frame: 1, payload: 0-1 (2 bytes)",
                "Frame: 2, payload: 2-3 (2 bytes)"
            ]
        );
        assert_eq!(tree.experts("reassembly").count(), 0);
    }

    #[test]
    fn test_late_seq_fragment_compared_with_stored_piece() {
        let mut table = ReassemblyTable::new();
        table.add_seq(key(11), 0, false, b"AB", 1);
        reassembled(table.add_seq(key(11), 1, true, b"CD", 2));

        // "ABC" is a prefix of the whole message but not the stored seq 0.
        assert_eq!(
            table.add_seq(key(11), 0, false, b"ABC", 3),
            AddResult::AlreadyReassembled {
                in_frame: 2,
                flags: FragmentFlags::OVERLAP | FragmentFlags::OVERLAP_CONFLICT
            }
        );
        assert_eq!(
            table.add_seq(key(11), 1, true, b"CD", 4),
            AddResult::AlreadyReassembled {
                in_frame: 2,
                flags: FragmentFlags::OVERLAP | FragmentFlags::DUPLICATE_TAIL
            }
        );
    }

    #[test]
    fn test_huge_sequence_numbers_stay_cheap() {
        let mut table = ReassemblyTable::new();
        assert_eq!(
            table.add_seq(key(12), u32::MAX, true, b"x", 1),
            AddResult::Incomplete {
                flags: FragmentFlags::empty()
            }
        );
        table.add_seq(key(12), 0, false, b"a", 2);
        match table.end(&key(12), 3) {
            Some(AddResult::Malformed(MalformedReason::Gap { missing, total })) => {
                assert_eq!(missing.len(), MAX_LISTED_GAPS);
                assert_eq!(missing[0], 1);
                assert_eq!(total, u32::MAX as u64 - 1);
            }
            other => panic!("unexpected {other:?}"),
        }

        let mut table = ReassemblyTable::new();
        table.add_seq(key(13), 200_000_000, false, b"x", 1);
        assert!(matches!(
            table.end(&key(13), 2),
            Some(AddResult::Malformed(MalformedReason::Gap { total: 200_000_000, .. }))
        ));
    }

    #[test]
    fn test_offset_past_usize_is_too_long() {
        let mut table = ReassemblyTable::new();
        assert_eq!(
            table.add_offset(key(14), usize::MAX - 1, false, b"abcd", 1),
            AddResult::Incomplete {
                flags: FragmentFlags::TOO_LONG
            }
        );
        assert!(table.record(&key(14)).unwrap().fragments().is_empty());

        table.add_offset(key(14), 0, false, b"ab", 2);
        let done = reassembled(table.add_offset(key(14), 2, true, b"cd", 3));
        assert_eq!(&done.data[..], b"abcd");
        assert_eq!(
            table.add_offset(key(14), usize::MAX, true, b"zz", 4),
            AddResult::AlreadyReassembled {
                in_frame: 3,
                flags: FragmentFlags::TOO_LONG
            }
        );
    }

    #[test]
    fn test_reset() {
        let mut table = ReassemblyTable::new();
        table.add_seq(key(1), 0, false, b"AB", 1);
        assert_eq!(table.len(), 1);
        table.reset();
        assert!(table.is_empty());
    }
}
