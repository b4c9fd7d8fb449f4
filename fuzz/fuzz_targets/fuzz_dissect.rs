//! Fuzz target for the full dissection chain.
//!
//! Arbitrary bytes go through one session under several link types. The
//! session must never panic, and every pass must produce a tree.

#![no_main]

use libfuzzer_sys::fuzz_target;
use pktdissect::pcap::FrameInfo;
use pktdissect::session::{Session, SessionConfig};

fuzz_target!(|data: &[u8]| {
    let Ok(mut session) = Session::new(SessionConfig::default()) else {
        return;
    };

    // Ethernet, raw IP, IPv4
    for (number, link_type) in [(1u64, 1u16), (2, 101), (3, 228)] {
        let frame = FrameInfo::new(number, number as i64, data.len(), link_type);
        let dissection = session.dissect(&frame, data);
        assert!(!dissection.tree().is_empty());
    }
});
