//! pktdissect - layered protocol dissection.
//!
//! This library decodes captured frames through a chain of pluggable
//! protocol decoders, producing one annotated result tree per frame. Across
//! frames it reassembles fragmented messages and matches requests with
//! their responses.
//!
//! # Example
//!
//! ```no_run
//! use pktdissect::pcap::CaptureReader;
//! use pktdissect::session::{Session, SessionConfig};
//!
//! fn main() -> pktdissect::Result<()> {
//!     let mut session = Session::new(SessionConfig::default())?;
//!     for frame in CaptureReader::open("capture.pcap")? {
//!         let frame = frame?;
//!         let dissection = session.dissect(&frame.info, &frame.data);
//!         println!("{} {}", frame.info.number, dissection.summary().info);
//!         print!("{}", dissection.tree().render_text());
//!     }
//!     Ok(())
//! }
//! ```

pub mod address;
pub mod cli;
pub mod conversation;
pub mod error;
pub mod pcap;
pub mod protocol;
pub mod reassembly;
pub mod session;
pub mod tree;
pub mod view;

pub use error::{Error, Result};
