//! Parses the line-oriented segment trace this demo reads.
//!
//! One line is one observed TCP segment:
//!
//! ```text
//! <unix-seconds.fraction>\t<src-ip:port>\t<dst-ip:port>\t<seq>\t<ack>\t<flags>\t<payload>
//! ```
//!
//! `flags` is a run of single-letter flags drawn from `S` (SYN), `A` (ACK
//! present), `F` (FIN), `R` (RST), or `.` for a segment carrying none of them.
//! `payload` is `-` for an empty payload, otherwise the literal bytes with
//! `\r`, `\n`, `\t`, and `\\` backslash-escaped so a single physical line can
//! carry a CRLF-terminated HTTP request or response.
//!
//! Blank lines and lines starting with `#` are ignored, so a trace file can
//! carry comments.

use std::net::IpAddr;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use anyhow::{anyhow, Context, Result};

use httpstitch::{Endpoint, Segment};

/// One parsed line of the trace: the two endpoints in the order they appear
/// on the wire (`src` sent this segment) plus the segment itself and the
/// timestamp it was observed.
pub struct TraceSegment {
    pub src: Endpoint,
    pub dst: Endpoint,
    pub segment: Segment,
    pub timestamp: SystemTime,
}

pub fn parse_line(line: &str) -> Result<Option<TraceSegment>> {
    let line = line.trim_end();
    if line.is_empty() || line.starts_with('#') {
        return Ok(None);
    }

    let mut fields = line.split('\t');
    let ts = fields.next().ok_or_else(|| anyhow!("missing timestamp field"))?;
    let src = fields.next().ok_or_else(|| anyhow!("missing src field"))?;
    let dst = fields.next().ok_or_else(|| anyhow!("missing dst field"))?;
    let seq = fields.next().ok_or_else(|| anyhow!("missing seq field"))?;
    let ack = fields.next().ok_or_else(|| anyhow!("missing ack field"))?;
    let flags = fields.next().ok_or_else(|| anyhow!("missing flags field"))?;
    let payload = fields.next().unwrap_or("-");

    let timestamp = parse_timestamp(ts)?;
    let src = parse_endpoint(src)?;
    let dst = parse_endpoint(dst)?;
    let seq: u32 = seq.parse().with_context(|| format!("bad seq {:?}", seq))?;
    let ack: u32 = ack.parse().with_context(|| format!("bad ack {:?}", ack))?;

    let mut segment = Segment::new(seq, ack, unescape_payload(payload));
    segment.syn = flags.contains('S');
    segment.ack_flag = flags.contains('A');
    segment.fin = flags.contains('F');
    segment.rst = flags.contains('R');

    Ok(Some(TraceSegment { src, dst, segment, timestamp }))
}

fn parse_timestamp(field: &str) -> Result<SystemTime> {
    let secs: f64 = field.parse().with_context(|| format!("bad timestamp {:?}", field))?;
    Ok(UNIX_EPOCH + Duration::from_secs_f64(secs.max(0.0)))
}

fn parse_endpoint(field: &str) -> Result<Endpoint> {
    let (ip, port) = field
        .rsplit_once(':')
        .ok_or_else(|| anyhow!("endpoint {:?} is missing a port", field))?;
    let ip: IpAddr = ip.parse().with_context(|| format!("bad ip in endpoint {:?}", field))?;
    let port: u16 = port.parse().with_context(|| format!("bad port in endpoint {:?}", field))?;
    Ok(Endpoint::new(ip, port))
}

fn unescape_payload(field: &str) -> Vec<u8> {
    if field == "-" {
        return Vec::new();
    }
    let mut out = Vec::with_capacity(field.len());
    let mut chars = field.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            let mut buf = [0u8; 4];
            out.extend_from_slice(c.encode_utf8(&mut buf).as_bytes());
            continue;
        }
        match chars.next() {
            Some('r') => out.push(b'\r'),
            Some('n') => out.push(b'\n'),
            Some('t') => out.push(b'\t'),
            Some('\\') => out.push(b'\\'),
            Some(other) => {
                out.push(b'\\');
                let mut buf = [0u8; 4];
                out.extend_from_slice(other.encode_utf8(&mut buf).as_bytes());
            }
            None => out.push(b'\\'),
        }
    }
    out
}
