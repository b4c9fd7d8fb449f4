//! Field value types carried by result tree nodes.

use std::fmt;
use std::net::IpAddr;

use bytes::Bytes;
use compact_str::CompactString;

use crate::address::Address;

/// Semantic value of a result tree node.
///
/// Values own their data: a tree outlives the buffer it was decoded from.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    /// Unsigned 8-bit integer
    UInt8(u8),
    /// Unsigned 16-bit integer
    UInt16(u16),
    /// Unsigned 32-bit integer
    UInt32(u32),
    /// Unsigned 64-bit integer
    UInt64(u64),
    /// Signed 64-bit integer
    Int64(i64),
    /// Boolean value
    Bool(bool),
    /// IP address (v4 or v6)
    IpAddr(IpAddr),
    /// MAC address (6 bytes)
    MacAddr([u8; 6]),
    /// Text, inline up to 24 bytes.
    String(CompactString),
    /// Raw bytes.
    Bytes(Bytes),
    /// Absolute time, microseconds since the Unix epoch.
    Time(i64),
    /// Relative time in microseconds.
    Duration(i64),
    /// Nested node with no value of its own (protocol subtree, text line).
    None,
}

impl FieldValue {
    /// Create a string value.
    pub fn string(s: impl AsRef<str>) -> Self {
        FieldValue::String(CompactString::new(s.as_ref()))
    }

    /// Create a bytes value by copying `data`.
    pub fn bytes(data: &[u8]) -> Self {
        FieldValue::Bytes(Bytes::copy_from_slice(data))
    }

    /// Convert an endpoint address into a field value.
    pub fn address(addr: Address) -> Self {
        match addr {
            Address::None => FieldValue::None,
            Address::Ether(mac) => FieldValue::MacAddr(mac),
            Address::Ipv4(v4) => FieldValue::IpAddr(IpAddr::V4(v4)),
            Address::Ipv6(v6) => FieldValue::IpAddr(IpAddr::V6(v6)),
        }
    }

    /// Check if the node carries no value.
    pub fn is_none(&self) -> bool {
        matches!(self, FieldValue::None)
    }

    /// Try to get as u64.
    pub fn as_u64(&self) -> Option<u64> {
        match self {
            FieldValue::UInt8(v) => Some(*v as u64),
            FieldValue::UInt16(v) => Some(*v as u64),
            FieldValue::UInt32(v) => Some(*v as u64),
            FieldValue::UInt64(v) => Some(*v),
            FieldValue::Int64(v) => u64::try_from(*v).ok(),
            _ => None,
        }
    }

    /// Try to get as i64.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            FieldValue::Int64(v) | FieldValue::Time(v) | FieldValue::Duration(v) => Some(*v),
            FieldValue::UInt8(v) => Some(*v as i64),
            FieldValue::UInt16(v) => Some(*v as i64),
            FieldValue::UInt32(v) => Some(*v as i64),
            FieldValue::UInt64(v) => i64::try_from(*v).ok(),
            _ => None,
        }
    }

    /// Try to get as a string slice.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            FieldValue::String(s) => Some(s.as_str()),
            _ => None,
        }
    }

    /// Try to get as raw bytes.
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            FieldValue::Bytes(b) => Some(b),
            _ => None,
        }
    }

    /// Name of the semantic type, used by the JSON output.
    pub fn type_name(&self) -> &'static str {
        match self {
            FieldValue::UInt8(_)
            | FieldValue::UInt16(_)
            | FieldValue::UInt32(_)
            | FieldValue::UInt64(_)
            | FieldValue::Int64(_) => "integer",
            FieldValue::Bool(_) => "boolean",
            FieldValue::IpAddr(_) | FieldValue::MacAddr(_) => "address",
            FieldValue::String(_) => "string",
            FieldValue::Bytes(_) => "bytes",
            FieldValue::Time(_) => "time",
            FieldValue::Duration(_) => "duration",
            FieldValue::None => "nested",
        }
    }
}

/// Render bytes as lowercase hex without separators.
pub fn hex(data: &[u8]) -> String {
    use std::fmt::Write;

    let mut out = String::with_capacity(data.len() * 2);
    for b in data {
        let _ = write!(out, "{b:02x}");
    }
    out
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::UInt8(v) => write!(f, "{v}"),
            FieldValue::UInt16(v) => write!(f, "{v}"),
            FieldValue::UInt32(v) => write!(f, "{v}"),
            FieldValue::UInt64(v) => write!(f, "{v}"),
            FieldValue::Int64(v) => write!(f, "{v}"),
            FieldValue::Bool(v) => write!(f, "{v}"),
            FieldValue::IpAddr(addr) => write!(f, "{addr}"),
            FieldValue::MacAddr(mac) => write!(f, "{}", Address::Ether(*mac)),
            FieldValue::String(s) => write!(f, "{s}"),
            FieldValue::Bytes(b) if b.len() <= 16 => write!(f, "{}", hex(b)),
            FieldValue::Bytes(b) => write!(f, "{}... [{} bytes]", hex(&b[..16]), b.len()),
            FieldValue::Time(us) => write!(f, "{}.{:06}", us.div_euclid(1_000_000), us.rem_euclid(1_000_000)),
            FieldValue::Duration(us) => {
                let sign = if *us < 0 { "-" } else { "" };
                let abs = us.unsigned_abs();
                write!(f, "{sign}{}.{:06} seconds", abs / 1_000_000, abs % 1_000_000)
            }
            FieldValue::None => Ok(()),
        }
    }
}
