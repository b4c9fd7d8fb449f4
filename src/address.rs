//! Endpoint identity types shared by the dissection context, the
//! reassembly table and the conversation table.

use std::fmt;
use std::net::{Ipv4Addr, Ipv6Addr};

/// A network-layer or link-layer address seen in a packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub enum Address {
    /// No address known (yet) for this endpoint.
    #[default]
    None,
    /// Ethernet MAC address.
    Ether([u8; 6]),
    /// IPv4 address.
    Ipv4(Ipv4Addr),
    /// IPv6 address.
    Ipv6(Ipv6Addr),
}

impl Address {
    /// Create a MAC address from bytes, `Address::None` if too short.
    pub fn mac(bytes: &[u8]) -> Self {
        match <[u8; 6]>::try_from(bytes.get(..6).unwrap_or_default()) {
            Ok(mac) => Address::Ether(mac),
            Err(_) => Address::None,
        }
    }

    /// Create an IPv4 address from bytes, `Address::None` if too short.
    pub fn ipv4(bytes: &[u8]) -> Self {
        match <[u8; 4]>::try_from(bytes.get(..4).unwrap_or_default()) {
            Ok(octets) => Address::Ipv4(Ipv4Addr::from(octets)),
            Err(_) => Address::None,
        }
    }

    /// Check if no address is known.
    pub fn is_none(&self) -> bool {
        matches!(self, Address::None)
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Address::None => write!(f, "-"),
            Address::Ether(mac) => write!(
                f,
                "{:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x}",
                mac[0], mac[1], mac[2], mac[3], mac[4], mac[5]
            ),
            Address::Ipv4(addr) => write!(f, "{addr}"),
            Address::Ipv6(addr) => write!(f, "{addr}"),
        }
    }
}

/// Transport namespace that ports belong to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub enum Transport {
    #[default]
    None,
    Udp,
    Tcp,
}

impl Transport {
    /// Return a string representation of the transport.
    pub fn as_str(&self) -> &'static str {
        match self {
            Transport::None => "none",
            Transport::Udp => "udp",
            Transport::Tcp => "tcp",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_address_from_bytes() {
        assert_eq!(
            Address::ipv4(&[10, 0, 0, 1]),
            Address::Ipv4(Ipv4Addr::new(10, 0, 0, 1))
        );
        assert_eq!(Address::ipv4(&[10, 0]), Address::None);
        assert_eq!(
            Address::mac(&[0xde, 0xad, 0xbe, 0xef, 0x00, 0x01, 0xff]).to_string(),
            "de:ad:be:ef:00:01"
        );
        assert!(Address::mac(&[1, 2, 3]).is_none());
    }

    #[test]
    fn test_address_ordering_is_total() {
        let a = Address::ipv4(&[10, 0, 0, 1]);
        let b = Address::ipv4(&[10, 0, 0, 2]);
        assert!(a < b);
        assert!(Address::None < a);
    }
}
