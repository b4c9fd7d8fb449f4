//! Capture file reader.

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use flate2::read::GzDecoder;
use pcap_parser::pcapng::Block;
use pcap_parser::traits::PcapReaderIterator;
use pcap_parser::{LegacyPcapReader, PcapBlockOwned, PcapError, PcapNGReader};
use tracing::{debug, warn};

use super::FrameInfo;
use crate::error::{Error, PcapError as CapturePcapError};

/// Buffer size for reading capture files (64KB).
const BUFFER_SIZE: usize = 65536;

/// Gzip magic bytes.
const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

type Stream = BufReader<Box<dyn Read + Send>>;

/// One frame read from a capture.
#[derive(Debug, Clone)]
pub struct CapturedFrame {
    pub info: FrameInfo,
    pub data: Vec<u8>,
}

/// Reader for pcap and pcapng files, with optional gzip decompression.
/// Frames are numbered from 1 in file order.
pub struct CaptureReader {
    inner: ReaderInner,
    state: ReadState,
}

enum ReaderInner {
    Legacy(LegacyPcapReader<Stream>),
    Ng(PcapNGReader<Stream>),
}

struct ReadState {
    frame_number: u64,
    link_type: u16,
    /// Legacy timestamps count nanoseconds instead of microseconds.
    nanosecond: bool,
}

impl ReadState {
    fn frame(&mut self, timestamp_us: i64, captured: u32, original: u32, data: &[u8]) -> CapturedFrame {
        self.frame_number += 1;
        CapturedFrame {
            info: FrameInfo {
                number: self.frame_number,
                timestamp_us,
                captured_length: captured,
                original_length: original,
                link_type: self.link_type,
            },
            data: data.to_vec(),
        }
    }
}

fn open_stream(path: &Path, gzipped: bool) -> Result<Stream, Error> {
    let file = File::open(path).map_err(|_| {
        Error::Pcap(CapturePcapError::FileNotFound {
            path: path.display().to_string(),
        })
    })?;
    let reader: Box<dyn Read + Send> = if gzipped {
        Box::new(GzDecoder::new(file))
    } else {
        Box::new(file)
    };
    Ok(BufReader::with_capacity(BUFFER_SIZE, reader))
}

fn invalid(reason: String) -> Error {
    Error::Pcap(CapturePcapError::InvalidFormat { reason })
}

impl CaptureReader {
    /// Open a capture file. Gzipped files are detected by extension or
    /// magic bytes and decompressed on the fly.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        let path = path.as_ref();
        let gzipped = is_gzip_file(path)?;

        // Peek at the (decompressed) magic number, then start over.
        let mut magic = [0u8; 4];
        open_stream(path, gzipped)?
            .read_exact(&mut magic)
            .map_err(|_| invalid("File too short to read magic number".to_string()))?;
        let stream = open_stream(path, gzipped)?;

        let (inner, nanosecond) = match magic {
            [0xd4, 0xc3, 0xb2, 0xa1] | [0xa1, 0xb2, 0xc3, 0xd4] => (Self::open_legacy(stream)?, false),
            [0x4d, 0x3c, 0xb2, 0xa1] | [0xa1, 0xb2, 0x3c, 0x4d] => (Self::open_legacy(stream)?, true),
            [0x0a, 0x0d, 0x0d, 0x0a] => (Self::open_ng(stream)?, false),
            _ => return Err(invalid(format!("Unknown magic number: {magic:02x?}"))),
        };
        debug!(path = %path.display(), gzipped, "Opened capture");

        Ok(Self {
            inner,
            state: ReadState {
                frame_number: 0,
                // Replaced by the file header or first interface block.
                link_type: 1,
                nanosecond,
            },
        })
    }

    fn open_legacy(stream: Stream) -> Result<ReaderInner, Error> {
        LegacyPcapReader::new(BUFFER_SIZE, stream)
            .map(ReaderInner::Legacy)
            .map_err(|e| invalid(format!("Failed to parse PCAP header: {e}")))
    }

    fn open_ng(stream: Stream) -> Result<ReaderInner, Error> {
        PcapNGReader::new(BUFFER_SIZE, stream)
            .map(ReaderInner::Ng)
            .map_err(|e| invalid(format!("Failed to parse PCAPNG header: {e}")))
    }

    /// Link type of the most recent file header or interface block.
    pub fn link_type(&self) -> u16 {
        self.state.link_type
    }

    /// Number of frames read so far.
    pub fn frame_count(&self) -> u64 {
        self.state.frame_number
    }

    /// Read the next frame, `None` at end of file.
    pub fn next_frame(&mut self) -> Result<Option<CapturedFrame>, Error> {
        match &mut self.inner {
            ReaderInner::Legacy(reader) => next_legacy(reader, &mut self.state),
            ReaderInner::Ng(reader) => next_ng(reader, &mut self.state),
        }
    }
}

fn next_legacy(reader: &mut LegacyPcapReader<Stream>, state: &mut ReadState) -> Result<Option<CapturedFrame>, Error> {
    loop {
        match reader.next() {
            Ok((offset, block)) => {
                let frame = match block {
                    PcapBlockOwned::Legacy(packet) => {
                        let fraction = if state.nanosecond {
                            packet.ts_usec as i64 / 1_000
                        } else {
                            packet.ts_usec as i64
                        };
                        let timestamp_us = (packet.ts_sec as i64) * 1_000_000 + fraction;
                        Some(state.frame(timestamp_us, packet.caplen, packet.origlen, packet.data))
                    }
                    PcapBlockOwned::LegacyHeader(header) => {
                        state.link_type = header.network.0 as u16;
                        None
                    }
                    _ => None,
                };
                reader.consume(offset);
                if frame.is_some() {
                    return Ok(frame);
                }
            }
            Err(PcapError::Eof) => return Ok(None),
            Err(PcapError::Incomplete(_)) => {
                reader
                    .refill()
                    .map_err(|e| invalid(format!("Refill error: {e}")))?;
            }
            Err(e) => return Err(invalid(format!("Parse error: {e}"))),
        }
    }
}

fn next_ng(reader: &mut PcapNGReader<Stream>, state: &mut ReadState) -> Result<Option<CapturedFrame>, Error> {
    loop {
        match reader.next() {
            Ok((offset, block)) => {
                let frame = match block {
                    PcapBlockOwned::NG(Block::InterfaceDescription(idb)) => {
                        state.link_type = idb.linktype.0 as u16;
                        None
                    }
                    PcapBlockOwned::NG(Block::EnhancedPacket(epb)) => {
                        // Interface time units; microseconds unless the
                        // interface says otherwise.
                        let timestamp_us = ((epb.ts_high as i64) << 32) | (epb.ts_low as i64);
                        Some(state.frame(timestamp_us, epb.caplen, epb.origlen, epb.data))
                    }
                    PcapBlockOwned::NG(Block::SimplePacket(spb)) => {
                        let captured = spb.data.len() as u32;
                        Some(state.frame(0, captured, spb.origlen, spb.data))
                    }
                    _ => None,
                };
                reader.consume(offset);
                if frame.is_some() {
                    return Ok(frame);
                }
            }
            Err(PcapError::Eof) => return Ok(None),
            Err(PcapError::Incomplete(_)) => {
                reader
                    .refill()
                    .map_err(|e| invalid(format!("Refill error: {e}")))?;
            }
            Err(e) => {
                warn!(frames = state.frame_number, error = %e, "Stopping at unreadable pcapng block");
                return Err(invalid(format!("Parse error: {e}")));
            }
        }
    }
}

/// Check if a file is gzipped by extension or magic bytes.
fn is_gzip_file(path: &Path) -> Result<bool, Error> {
    if is_gzip_extension(path) {
        return Ok(true);
    }

    let mut file = File::open(path).map_err(|_| {
        Error::Pcap(CapturePcapError::FileNotFound {
            path: path.display().to_string(),
        })
    })?;
    let mut magic = [0u8; 2];
    match file.read_exact(&mut magic) {
        Ok(()) => Ok(magic == GZIP_MAGIC),
        Err(_) => Ok(false),
    }
}

/// Check if a path appears to be a gzip file by extension only.
pub fn is_gzip_extension<P: AsRef<Path>>(path: P) -> bool {
    path.as_ref()
        .file_name()
        .and_then(|f| f.to_str())
        .is_some_and(|name| name.to_lowercase().ends_with(".gz"))
}

impl Iterator for CaptureReader {
    type Item = Result<CapturedFrame, Error>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_frame().transpose()
    }
}
