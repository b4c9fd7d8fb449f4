//! Command-line argument definitions.

use clap::Parser;
use std::path::PathBuf;

use super::OutputFormat;
use crate::session::{PortOverride, SessionConfig};

/// Dissect the frames of a capture file.
#[derive(Parser, Debug)]
#[command(name = "pktdissect")]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Capture file (pcap or pcapng, optionally gzipped)
    #[arg(value_name = "FILE")]
    pub file: Option<PathBuf>,

    /// Output format for stdout
    #[arg(long = "format", value_enum, default_value = "text")]
    pub format: OutputFormat,

    /// Show fragments as they are instead of reassembling them
    #[arg(long = "no-reassembly")]
    pub no_reassembly: bool,

    /// Skip request/response matching
    #[arg(long = "no-correlation")]
    pub no_correlation: bool,

    /// Request/response matching window in seconds, for every protocol
    #[arg(long = "match-window", value_name = "SECONDS")]
    pub match_window: Option<f64>,

    /// Extra port for a decoder, e.g. udp=3799:radius
    #[arg(long = "decode-as", value_name = "TABLE=PORT:DECODER")]
    pub decode_as: Vec<PortOverride>,

    /// Stop after this many frames
    #[arg(short = 'c', long = "count", value_name = "N")]
    pub count: Option<u64>,

    /// Print one summary line per frame, without the tree
    #[arg(short = 's', long = "summary")]
    pub summary_only: bool,

    /// List dispatch tables and decoder handles
    #[arg(long = "list-decoders")]
    pub list_decoders: bool,

    /// Enable verbose output
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count)]
    pub verbose: u8,
}

impl Args {
    /// Check if this is an info-only command (no capture file needed).
    pub fn is_info_only(&self) -> bool {
        self.list_decoders
    }

    /// Session configuration selected by the flags.
    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            reassemble: !self.no_reassembly,
            correlate_transactions: !self.no_correlation,
            match_window_us: self.match_window.map(|secs| (secs * 1_000_000.0).round() as i64),
            port_overrides: self.decode_as.clone(),
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flags_map_to_config() {
        let args = Args::parse_from([
            "pktdissect",
            "--no-reassembly",
            "--match-window",
            "2.5",
            "--decode-as",
            "udp=3799:radius",
            "--decode-as",
            "tcp=4949:tacplus",
            "capture.pcap",
        ]);
        let config = args.session_config();
        assert!(!config.reassemble);
        assert!(config.correlate_transactions);
        assert_eq!(config.match_window_us, Some(2_500_000));
        assert_eq!(config.port_overrides.len(), 2);
        assert_eq!(config.port_overrides[0].port, 3799);
        assert_eq!(args.format, OutputFormat::Text);
    }

    #[test]
    fn test_bad_decode_as_rejected() {
        let result = Args::try_parse_from(["pktdissect", "--decode-as", "udp:3799", "x.pcap"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_info_only() {
        let args = Args::parse_from(["pktdissect", "--list-decoders"]);
        assert!(args.is_info_only());
        assert!(args.file.is_none());
    }
}
