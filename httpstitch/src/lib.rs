//! A passive, bidirectional TCP reassembler specialized for HTTP traffic analysis.
//!
//! Feed it already-parsed TCP segments (the caller owns packet capture and
//! decoding) and it reconstructs each connection's two half-duplex byte
//! streams, hands each direction to a consumer as a blocking byte reader, and
//! — for connections that look like HTTP/1.x — records coarse request/response
//! timing suitable for latency diagnosis.
//!
//! ```no_run
//! use std::net::{IpAddr, Ipv4Addr};
//! use std::sync::Arc;
//! use std::time::SystemTime;
//!
//! use httpstitch::{Assembler, Config, ConnectionHandler, Endpoint, Segment, StdoutSink, StreamReader};
//!
//! struct PrintingHandler;
//!
//! impl ConnectionHandler for PrintingHandler {
//!     fn handle(&self, src: Endpoint, dst: Endpoint, mut up: StreamReader, mut down: StreamReader) {
//!         std::thread::spawn(move || {
//!             use std::io::Read;
//!             let mut buf = Vec::new();
//!             up.read_to_end(&mut buf).ok();
//!             println!("{} -> {}: {} bytes", src, dst, buf.len());
//!         });
//!         std::thread::spawn(move || {
//!             use std::io::Read;
//!             let mut buf = Vec::new();
//!             down.read_to_end(&mut buf).ok();
//!         });
//!     }
//! }
//!
//! let assembler = Assembler::new(Config::default(), Arc::new(PrintingHandler), Arc::new(StdoutSink));
//! let client = Endpoint::new(IpAddr::V4(Ipv4Addr::new(10, 0, 0, 1)), 5000);
//! let server = Endpoint::new(IpAddr::V4(Ipv4Addr::new(10, 0, 0, 2)), 80);
//! let seg = Segment::new(1000, 0, b"GET / HTTP/1.1\r\n\r\n".to_vec());
//! assembler.assemble(client, server, seg, SystemTime::now());
//! ```

mod assembler;
mod conn;
mod conn_id;
mod config;
mod handler;
mod http;
mod segment;
mod sequence;
mod stream;
mod timing;
mod window;

pub use assembler::Assembler;
pub use config::{Config, ConfigError};
pub use conn_id::{ConnKey, Endpoint};
pub use handler::ConnectionHandler;
pub use segment::Segment;
pub use stream::StreamReader;
pub use timing::{StdoutSink, TimingRecord, TimingSink};

pub mod cues {
    //! Narrow HTTP cue detectors, exposed for callers that want to reuse the
    //! same recognition rules this crate builds connections on.
    pub use crate::http::{is_http_reply, is_http_request};
}
