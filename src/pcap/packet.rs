//! Capture metadata for one frame.

/// What the capture source knows about a frame, handed to the session with
/// the frame's bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameInfo {
    /// Frame number (1-indexed).
    pub number: u64,

    /// Timestamp in microseconds since epoch.
    pub timestamp_us: i64,

    /// Captured length (may be less than original).
    pub captured_length: u32,

    /// Original length on the wire.
    pub original_length: u32,

    /// Link layer type (e.g., 1 = Ethernet).
    pub link_type: u16,
}

impl FrameInfo {
    /// Metadata for an untruncated frame of `len` bytes.
    pub fn new(number: u64, timestamp_us: i64, len: usize, link_type: u16) -> Self {
        Self {
            number,
            timestamp_us,
            captured_length: len as u32,
            original_length: len as u32,
            link_type,
        }
    }

    /// Check if the packet was truncated during capture.
    pub fn is_truncated(&self) -> bool {
        self.captured_length < self.original_length
    }
}
