//! Capture source.
//!
//! Reads pcap and pcapng files (optionally gzipped) and hands out each
//! frame's bytes with its [`FrameInfo`]. The dissection engine itself never
//! touches files; it only sees `FrameInfo` plus a byte slice.

mod packet;
mod reader;

pub use packet::FrameInfo;
pub use reader::{is_gzip_extension, CaptureReader, CapturedFrame};
