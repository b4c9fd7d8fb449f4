//! Fuzz target for the reassembly table.
//!
//! Input is split into fragment records (sequence number, last flag,
//! payload) that are fed to one key, in both addressing modes.

#![no_main]

use libfuzzer_sys::fuzz_target;
use pktdissect::address::Address;
use pktdissect::reassembly::{FragmentKey, ReassemblyTable};

fuzz_target!(|data: &[u8]| {
    let mut table = ReassemblyTable::new();
    let seq_key = FragmentKey::new("fuzz", 1, Address::None, Address::None);
    let offset_key = FragmentKey::new("fuzz", 2, Address::None, Address::None);

    let mut frame = 0u64;
    let mut rest = data;
    while rest.len() >= 3 {
        let seq = rest[0] as u32 & 0x0f;
        let last = rest[0] & 0x80 != 0;
        let len = (rest[1] as usize % 16).min(rest.len() - 2);
        let payload = &rest[2..2 + len];
        frame += 1;

        let _ = table.add_seq(seq_key, seq, last, payload, frame);
        let _ = table.add_offset(offset_key, seq as usize * 8, last, payload, frame);
        rest = &rest[2 + len..];
    }
    let _ = table.end(&seq_key, frame + 1);
});
