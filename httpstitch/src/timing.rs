//! Per-connection request/response timing.
//!
//! One `TimingRecord` tracks the first request/response pair observed on a
//! connection since the record was last (re)initialized. It is intentionally
//! naive about HTTP pipelining — see `SPEC_FULL.md` §8 for why that's the
//! chosen tradeoff rather than an oversight.

use std::time::SystemTime;

use chrono::{DateTime, Utc};

/// Destination for emitted timing lines. The core never writes to stdout
/// directly; callers plug in whatever sink fits (stdout, a file, a channel).
pub trait TimingSink: Send + Sync {
    fn emit(&self, record: &TimingRecord);
}

/// A `TimingSink` that writes tab-separated lines to stdout, for simple callers.
pub struct StdoutSink;

impl TimingSink for StdoutSink {
    fn emit(&self, record: &TimingRecord) {
        println!("{}", record.emit_line());
    }
}

/// Request/response timing state for one connection.
#[derive(Debug, Clone)]
pub struct TimingRecord {
    /// `true` if the request travels client-to-server (the common case).
    pub up: bool,
    pub req1: SystemTime,
    pub req2: SystemTime,
    pub rep1: SystemTime,
    pub rep2: SystemTime,
    pub req_len: usize,
    pub rep_len: usize,
    pub req_fragment: bool,
    pub rep_fragment: bool,
    pub id: String,
}

impl TimingRecord {
    /// Initializes a fresh record at the moment a request line is recognized.
    /// `rep1`/`rep2` are set to the epoch, a sentinel that keeps `should_emit`
    /// false until a real response line resets them (see below).
    pub fn new_request(up: bool, id: String, timestamp: SystemTime, len: usize, fragment_threshold: usize) -> Self {
        TimingRecord {
            up,
            req1: timestamp,
            req2: timestamp,
            rep1: SystemTime::UNIX_EPOCH,
            rep2: SystemTime::UNIX_EPOCH,
            req_len: len,
            rep_len: 0,
            req_fragment: len > fragment_threshold,
            rep_fragment: false,
            id,
        }
    }

    /// Extends the request side with another fragment of the same request.
    pub fn extend_request(&mut self, timestamp: SystemTime, len: usize) {
        self.req2 = timestamp;
        self.req_len += len;
    }

    /// Extends the response side with another fragment of the same response.
    pub fn extend_response(&mut self, timestamp: SystemTime, len: usize) {
        self.rep2 = timestamp;
        self.rep_len += len;
    }

    /// Resets the response side at the moment a response line is recognized.
    pub fn reset_response(&mut self, timestamp: SystemTime, len: usize, fragment_threshold: usize) {
        self.rep1 = timestamp;
        self.rep2 = timestamp;
        self.rep_len = len;
        self.rep_fragment = len > fragment_threshold;
    }

    /// The suppression rule: a record with no real response yet (`rep1` still
    /// at the epoch sentinel, or otherwise preceding the request's own end) is
    /// not ready to emit.
    pub fn should_emit(&self) -> bool {
        self.rep1 >= self.req2
    }

    /// Renders this record as a tab-separated timing line in the exact field
    /// order `spec.md` §6 specifies: `req1 req2 rep1 rep2 d1 d2 d3 req_len
    /// rep_len req_fragment rep_fragment up id`.
    pub fn emit_line(&self) -> String {
        let req_dur = duration_between(self.req1, self.req2);
        let think_dur = duration_between(self.req2, self.rep1);
        let rep_dur = duration_between(self.rep1, self.rep2);

        format!(
            "{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}",
            fmt_timestamp(self.req1),
            fmt_timestamp(self.req2),
            fmt_timestamp(self.rep1),
            fmt_timestamp(self.rep2),
            fmt_duration(req_dur),
            fmt_duration(think_dur),
            fmt_duration(rep_dur),
            self.req_len,
            self.rep_len,
            self.req_fragment,
            self.rep_fragment,
            if self.up { "up" } else { "down" },
            self.id,
        )
    }
}

fn fmt_timestamp(t: SystemTime) -> String {
    let dt: DateTime<Utc> = t.into();
    dt.format("%S.%6f").to_string()
}

fn duration_between(from: SystemTime, to: SystemTime) -> f64 {
    match to.duration_since(from) {
        Ok(d) => d.as_secs_f64(),
        Err(e) => -e.duration().as_secs_f64(),
    }
}

fn fmt_duration(secs: f64) -> String {
    format!("{:.6}", secs)
}
