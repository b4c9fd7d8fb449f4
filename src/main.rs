//! pktdissect CLI entry point.

use std::io::{self, BufWriter, Write};

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use pktdissect::cli::{Args, OutputFormatter};
use pktdissect::pcap::CaptureReader;
use pktdissect::protocol::{register_builtin, Registry};
use pktdissect::session::Session;

fn main() -> Result<()> {
    // Parse command line arguments
    let args = Args::parse();

    // Set up logging
    let filter = match args.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()))
        .init();

    if args.is_info_only() {
        list_decoders();
        return Ok(());
    }

    let capture = args
        .file
        .clone()
        .context("Capture file required. Use --help for usage.")?;

    let mut reader = CaptureReader::open(&capture)
        .with_context(|| format!("Failed to open capture file: {}", capture.display()))?;
    let mut session = Session::new(args.session_config()).context("Invalid session configuration")?;
    let formatter = OutputFormatter::new(args.format).summary_only(args.summary_only);

    let stdout = io::stdout();
    let mut out = BufWriter::new(stdout.lock());
    while let Some(frame) = reader.next_frame().transpose() {
        let frame = match frame {
            Ok(frame) => frame,
            Err(e) => {
                warn!(after = reader.frame_count(), error = %e, "Stopping at unreadable capture data");
                break;
            }
        };
        let dissection = session.dissect(&frame.info, &frame.data);
        formatter.write(&dissection, &mut out)?;
        if args.count.is_some_and(|limit| frame.info.number >= limit) {
            break;
        }
    }
    out.flush()?;

    let stats = session.stats();
    info!(
        frames = stats.frames,
        malformed = stats.malformed_frames,
        undecoded = stats.data_frames,
        "Done"
    );
    Ok(())
}

fn list_decoders() {
    let mut registry = Registry::new();
    register_builtin(&mut registry);

    println!("Dispatch tables:");
    println!("{:-<50}", "");
    for table in registry.tables() {
        println!("  {}", table.name);
        for (key, decoder) in &table.entries {
            println!("    {:<8} {decoder}", key.to_string());
        }
    }

    println!();
    println!("Decoder handles:");
    println!("{:-<50}", "");
    for name in registry.handle_names() {
        println!("  {name}");
    }
}
