//! A thin driver that replays a line-oriented segment trace through
//! `httpstitch::Assembler` and prints the timing lines it emits.
//!
//! Packet capture, decoding, and argument parsing all live here, at the edge,
//! exactly as `spec.md` scopes them out of the library core.

mod trace;

use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::SystemTime;

use anyhow::Result;
use clap::Parser;

use httpstitch::{Assembler, Config, ConnectionHandler, Endpoint, StdoutSink, StreamReader};

#[derive(Parser, Debug)]
#[clap(about = "Replay a segment trace through httpstitch and print HTTP timing lines")]
struct Args {
    /// Path to a trace file. Reads stdin if omitted.
    #[clap(value_name = "TRACE")]
    trace: Option<PathBuf>,

    /// Path to a TOML config file. Falls back to `Config::default()` if omitted.
    #[clap(short, long, value_name = "FILE")]
    config: Option<PathBuf>,
}

/// Spawns one reader thread per direction; each thread just drains its stream
/// to end-of-stream; the interesting output is the timing lines the assembler
/// emits through `StdoutSink`; see `spec.md` §6.
struct ThreadSpawningHandler;

impl ConnectionHandler for ThreadSpawningHandler {
    fn handle(&self, src: Endpoint, dst: Endpoint, mut upstream: StreamReader, mut downstream: StreamReader) {
        std::thread::spawn(move || drain(&mut upstream, src, dst, "up"));
        std::thread::spawn(move || drain(&mut downstream, dst, src, "down"));
    }

    fn finish(&self) {
        log::info!("assembler shutdown: all connections finished");
    }
}

fn drain(reader: &mut StreamReader, src: Endpoint, dst: Endpoint, direction: &str) {
    use std::io::Read;
    let mut buf = [0u8; 4096];
    let mut total = 0usize;
    loop {
        match reader.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => total += n,
            Err(e) => {
                log::warn!("{} {}->{}: read error: {}", direction, src, dst, e);
                break;
            }
        }
    }
    log::debug!("{} {}->{}: {} bytes", direction, src, dst, total);
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };
    let idle_timeout = config.idle_timeout;

    let assembler = Assembler::new(config, Arc::new(ThreadSpawningHandler), Arc::new(StdoutSink));

    let lines: Box<dyn BufRead> = match &args.trace {
        Some(path) => Box::new(BufReader::new(File::open(path)?)),
        None => Box::new(BufReader::new(io::stdin())),
    };

    let mut latest: Option<SystemTime> = None;
    for (lineno, line) in lines.lines().enumerate() {
        let line = line?;
        match trace::parse_line(&line) {
            Ok(Some(parsed)) => {
                latest = Some(match latest {
                    Some(prev) if prev > parsed.timestamp => prev,
                    _ => parsed.timestamp,
                });
                assembler.assemble(parsed.src, parsed.dst, parsed.segment, parsed.timestamp);
            }
            Ok(None) => {}
            Err(e) => log::warn!("skipping malformed trace line {}: {}", lineno + 1, e),
        }
    }

    if let Some(latest) = latest {
        if let Some(cutoff) = latest.checked_sub(idle_timeout) {
            assembler.flush_older_than(cutoff);
        }
    }
    assembler.finish_all();

    Ok(())
}
