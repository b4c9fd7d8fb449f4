//! Protocol decoding.
//!
//! This module provides:
//! - Core `Decoder` trait every protocol plug-in implements
//! - `Registry` of dispatch tables, handles and heuristic lists
//! - `DissectContext`, the per-pass state and invocation boundary
//! - Built-in decoders used to drive the engine end to end

mod context;
mod registry;

// Decoder implementations
mod data;
mod ethernet;
mod ipv4;
mod radius;
mod tacacs;
mod tcp;
mod udp;
mod wtp;

// Test utilities (only compiled for tests)
#[cfg(test)]
pub mod test_utils;

use std::sync::Arc;

pub use context::{DissectContext, EngineState, Scratch, Summary};
pub use registry::{KeyKind, Registry, TableKey, TableListing};

pub use data::DataDecoder;
pub use ethernet::{ethertype, EthernetDecoder, LINKTYPE_ETHERNET};
pub use ipv4::{Ipv4Decoder, LINKTYPE_IPV4, LINKTYPE_RAW};
pub use radius::{radius_policy, RadiusDecoder, RADIUS_FAMILY};
pub use tacacs::TacacsDecoder;
pub use tcp::TcpDecoder;
pub use udp::UdpDecoder;
pub use wtp::WtpDecoder;

use crate::error::DissectError;
use crate::tree::NodeId;
use crate::view::ByteView;

/// Well-known dispatch table names.
pub mod tables {
    pub const LINK_TYPE: &str = "link_type";
    pub const ETHERTYPE: &str = "ethertype";
    pub const IP_PROTO: &str = "ip.proto";
    pub const UDP_PORT: &str = "udp.port";
    pub const TCP_PORT: &str = "tcp.port";
}

/// Core trait all protocol decoders implement.
pub trait Decoder: Send + Sync {
    /// Unique identifier for this decoder (e.g., "udp", "radius").
    fn name(&self) -> &'static str;

    /// Human-readable display name.
    fn display_name(&self) -> &'static str {
        self.name()
    }

    /// Decode one layer from `view`, adding nodes under `parent`, and hand
    /// the remainder to the next decoder through `ctx`. Returns the number
    /// of bytes consumed.
    fn dissect(
        &self,
        view: ByteView<'_>,
        ctx: &mut DissectContext<'_>,
        parent: Option<NodeId>,
    ) -> Result<usize, DissectError>;

    /// Confidence that `view` belongs to this protocol when port lookup
    /// found nothing. `None` declines.
    fn heuristic(&self, _view: ByteView<'_>, _ctx: &DissectContext<'_>) -> Option<u32> {
        None
    }
}

/// Register every built-in decoder with its tables, handles and
/// heuristics.
pub fn register_builtin(registry: &mut Registry) {
    registry.add_table(tables::LINK_TYPE, KeyKind::UInt);
    registry.add_table(tables::ETHERTYPE, KeyKind::UInt);
    registry.add_table(tables::IP_PROTO, KeyKind::UInt);
    registry.add_table(tables::UDP_PORT, KeyKind::UInt);
    registry.add_table(tables::TCP_PORT, KeyKind::UInt);

    let data: Arc<dyn Decoder> = Arc::new(DataDecoder);
    registry.register_handle("data", data);

    // Layer 2
    let eth: Arc<dyn Decoder> = Arc::new(EthernetDecoder);
    registry.register(tables::LINK_TYPE, LINKTYPE_ETHERNET, eth.clone());
    registry.register_handle("eth", eth);

    // Layer 3
    let ip: Arc<dyn Decoder> = Arc::new(Ipv4Decoder);
    registry.register(tables::ETHERTYPE, ethertype::IPV4, ip.clone());
    registry.register(tables::LINK_TYPE, LINKTYPE_RAW, ip.clone());
    registry.register(tables::LINK_TYPE, LINKTYPE_IPV4, ip.clone());
    registry.register_handle("ip", ip);

    // Layer 4
    let udp: Arc<dyn Decoder> = Arc::new(UdpDecoder);
    registry.register(tables::IP_PROTO, udp::IP_PROTO_UDP, udp.clone());
    registry.register_handle("udp", udp);
    let tcp: Arc<dyn Decoder> = Arc::new(TcpDecoder);
    registry.register(tables::IP_PROTO, tcp::IP_PROTO_TCP, tcp.clone());
    registry.register_handle("tcp", tcp);

    // Application layer
    let radius: Arc<dyn Decoder> = Arc::new(RadiusDecoder);
    for port in radius::UDP_PORTS {
        registry.register(tables::UDP_PORT, port, radius.clone());
    }
    registry.register_heuristic("udp", radius.clone());
    registry.register_handle("radius", radius);

    let wtp: Arc<dyn Decoder> = Arc::new(WtpDecoder);
    for port in wtp::UDP_PORTS {
        registry.register(tables::UDP_PORT, port, wtp.clone());
    }
    registry.register_handle("wtp", wtp);

    let xtacacs: Arc<dyn Decoder> = Arc::new(TacacsDecoder::xtacacs());
    registry.register(tables::UDP_PORT, tacacs::PORT, xtacacs.clone());
    registry.register_handle("tacacs", xtacacs);
    let tacplus: Arc<dyn Decoder> = Arc::new(TacacsDecoder::tacplus());
    registry.register(tables::TCP_PORT, tacacs::PORT, tacplus.clone());
    registry.register_handle("tacplus", tacplus);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_tables() {
        let mut registry = Registry::new();
        register_builtin(&mut registry);

        assert_eq!(registry.lookup(tables::LINK_TYPE, 1u16).unwrap().name(), "eth");
        assert_eq!(registry.lookup(tables::ETHERTYPE, 0x0800u16).unwrap().name(), "ip");
        assert_eq!(registry.lookup(tables::IP_PROTO, 17u8).unwrap().name(), "udp");
        assert_eq!(registry.lookup(tables::UDP_PORT, 1812u16).unwrap().name(), "radius");
        assert_eq!(registry.lookup(tables::UDP_PORT, 9201u16).unwrap().name(), "wtp");
        assert_eq!(registry.lookup(tables::TCP_PORT, 49u16).unwrap().display_name(), "TACACS+");
        assert!(registry.lookup(tables::UDP_PORT, 53u16).is_none());
        assert!(registry.find_handle("wsp").is_none());
        assert_eq!(registry.heuristics("udp").len(), 1);
        assert_eq!(
            registry.handle_names(),
            vec!["data", "eth", "ip", "radius", "tacacs", "tacplus", "tcp", "udp", "wtp"]
        );
    }
}
