//! Bounds-checked read-only windows over packet bytes.
//!
//! A [`ByteView`] borrows a contiguous range of a data source (the captured
//! frame, or a buffer produced by reassembly) and answers every read either
//! fully in bounds or with a [`BoundsError`]. Decoders only ever see the view
//! they were handed, so a layer cannot read past its declared length.

use crate::error::BoundsError;

/// Identifies the data source a view (and a tree node range) refers to.
///
/// Source 0 is always the captured frame; reassembled buffers get the
/// following ids in the order they are added to the result tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct SourceId(pub u16);

impl SourceId {
    /// The captured frame.
    pub const FRAME: SourceId = SourceId(0);
}

/// Length argument for [`ByteView::slice`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Length {
    /// Exactly this many bytes.
    Exact(usize),
    /// Everything from the offset to the end of the view.
    Rest,
}

impl From<usize> for Length {
    fn from(len: usize) -> Self {
        Length::Exact(len)
    }
}

/// A byte range inside one data source, in source-absolute offsets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ByteRange {
    pub source: SourceId,
    pub offset: usize,
    pub len: usize,
}

impl ByteRange {
    /// Offset one past the last byte.
    pub fn end(&self) -> usize {
        self.offset + self.len
    }
}

/// Immutable, bounds-checked window over packet bytes.
#[derive(Debug, Clone, Copy)]
pub struct ByteView<'a> {
    /// The bytes of this window only; never more.
    bytes: &'a [u8],
    /// Offset of `bytes[0]` within the data source.
    origin: usize,
    source: SourceId,
}

macro_rules! read_int {
    ($(#[$doc:meta])* $name:ident, $ty:ty, $conv:ident) => {
        $(#[$doc])*
        #[inline]
        pub fn $name(&self, offset: usize) -> Result<$ty, BoundsError> {
            const N: usize = std::mem::size_of::<$ty>();
            let bytes = self.bytes(offset, N)?;
            let mut buf = [0u8; N];
            buf.copy_from_slice(bytes);
            Ok(<$ty>::$conv(buf))
        }
    };
}

impl<'a> ByteView<'a> {
    /// Create a view over a whole captured frame.
    pub fn new(data: &'a [u8]) -> Self {
        Self::with_source(data, SourceId::FRAME)
    }

    /// Create a view over a whole buffer belonging to `source`.
    pub fn with_source(data: &'a [u8], source: SourceId) -> Self {
        Self {
            bytes: data,
            origin: 0,
            source,
        }
    }

    /// Declared length of this view.
    #[inline]
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Check if the view has no bytes.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Data source this view reads from.
    pub fn source(&self) -> SourceId {
        self.source
    }

    /// Offset of the first byte of this view within its data source.
    pub fn origin(&self) -> usize {
        self.origin
    }

    /// All bytes of the view.
    pub fn as_slice(&self) -> &'a [u8] {
        self.bytes
    }

    fn check(&self, offset: usize, length: usize) -> Result<(), BoundsError> {
        match offset.checked_add(length) {
            Some(end) if end <= self.bytes.len() => Ok(()),
            _ => Err(BoundsError {
                offset,
                length,
                available: self.bytes.len(),
            }),
        }
    }

    /// Borrow `length` bytes starting at `offset`.
    #[inline]
    pub fn bytes(&self, offset: usize, length: usize) -> Result<&'a [u8], BoundsError> {
        self.check(offset, length)?;
        Ok(&self.bytes[offset..offset + length])
    }

    /// Borrow a sub-view. [`Length::Rest`] resolves against the bytes left
    /// after `offset`; an offset equal to the view length yields an empty view.
    pub fn slice(&self, offset: usize, length: impl Into<Length>) -> Result<ByteView<'a>, BoundsError> {
        let length = match length.into() {
            Length::Exact(n) => n,
            Length::Rest => self.remaining_length(offset)?,
        };
        let bytes = self.bytes(offset, length)?;
        Ok(ByteView {
            bytes,
            origin: self.origin + offset,
            source: self.source,
        })
    }

    /// Sub-view from `offset` to the end.
    pub fn slice_from(&self, offset: usize) -> Result<ByteView<'a>, BoundsError> {
        self.slice(offset, Length::Rest)
    }

    /// Number of bytes left after `offset`; an offset past the end is a
    /// bounds error rather than zero.
    pub fn remaining_length(&self, offset: usize) -> Result<usize, BoundsError> {
        self.bytes
            .len()
            .checked_sub(offset)
            .ok_or(BoundsError {
                offset,
                length: 0,
                available: self.bytes.len(),
            })
    }

    /// Source-absolute range of `length` bytes at `offset`.
    pub fn range(&self, offset: usize, length: usize) -> Result<ByteRange, BoundsError> {
        self.check(offset, length)?;
        Ok(ByteRange {
            source: self.source,
            offset: self.origin + offset,
            len: length,
        })
    }

    /// Source-absolute range covering the whole view.
    pub fn full_range(&self) -> ByteRange {
        ByteRange {
            source: self.source,
            offset: self.origin,
            len: self.bytes.len(),
        }
    }

    /// Read one byte.
    #[inline]
    pub fn read_u8(&self, offset: usize) -> Result<u8, BoundsError> {
        Ok(self.bytes(offset, 1)?[0])
    }

    read_int!(
        /// Read a big-endian `u16`.
        read_u16_be, u16, from_be_bytes
    );
    read_int!(
        /// Read a little-endian `u16`.
        read_u16_le, u16, from_le_bytes
    );
    read_int!(
        /// Read a big-endian `u32`.
        read_u32_be, u32, from_be_bytes
    );
    read_int!(
        /// Read a little-endian `u32`.
        read_u32_le, u32, from_le_bytes
    );
    read_int!(
        /// Read a big-endian `u64`.
        read_u64_be, u64, from_be_bytes
    );
    read_int!(
        /// Read a little-endian `u64`.
        read_u64_le, u64, from_le_bytes
    );

    /// Read a big-endian 24-bit integer.
    pub fn read_u24_be(&self, offset: usize) -> Result<u32, BoundsError> {
        let b = self.bytes(offset, 3)?;
        Ok(u32::from_be_bytes([0, b[0], b[1], b[2]]))
    }

    /// Read a little-endian 24-bit integer.
    pub fn read_u24_le(&self, offset: usize) -> Result<u32, BoundsError> {
        let b = self.bytes(offset, 3)?;
        Ok(u32::from_le_bytes([b[0], b[1], b[2], 0]))
    }
}
