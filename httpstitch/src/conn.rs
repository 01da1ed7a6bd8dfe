//! A single tracked TCP connection: two directional streams plus the HTTP
//! request/response timing derived from watching them.

use std::time::SystemTime;

use crate::conn_id::{ConnKey, Endpoint};
use crate::http;
use crate::segment::Segment;
use crate::stream::{NetworkStream, StreamReader};
use crate::timing::{TimingRecord, TimingSink};

/// One tracked connection. Lives in the assembler's table from the moment its
/// first HTTP request line is recognized until both directions have closed.
pub struct TcpConnection {
    key: ConnKey,
    upstream: NetworkStream,
    downstream: NetworkStream,
    /// Latched to the sender of the first recognized HTTP request; determines
    /// which stream is "upstream" (client-to-server) for the rest of the
    /// connection's life.
    client_id: Option<Endpoint>,
    is_http: bool,
    last_timestamp: SystemTime,
    fragment_threshold: usize,
    /// Minimum payload size for a segment to count as "not a pure ACK" when
    /// extending the in-flight timing record (`spec.md` §4.4 step 5, §6).
    ack_pure_threshold: usize,
    timing: Option<TimingRecord>,
}

impl TcpConnection {
    /// Builds a fresh connection and its two reader handles, ready to hand to
    /// a `ConnectionHandler`.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        key: ConnKey,
        handoff_capacity: usize,
        window_initial_capacity: usize,
        max_out_of_order: Option<usize>,
        fragment_threshold: usize,
        ack_pure_threshold: usize,
        timestamp: SystemTime,
    ) -> (TcpConnection, StreamReader, StreamReader) {
        let (upstream, up_reader) =
            NetworkStream::new(handoff_capacity, window_initial_capacity, max_out_of_order);
        let (downstream, down_reader) =
            NetworkStream::new(handoff_capacity, window_initial_capacity, max_out_of_order);
        let conn = TcpConnection {
            key,
            upstream,
            downstream,
            client_id: None,
            is_http: false,
            last_timestamp: timestamp,
            fragment_threshold,
            ack_pure_threshold,
            timing: None,
        };
        (conn, up_reader, down_reader)
    }

    pub fn key(&self) -> &ConnKey {
        &self.key
    }

    pub fn last_timestamp(&self) -> SystemTime {
        self.last_timestamp
    }

    /// `true` once both directions have seen FIN/RST, or have been force-closed.
    pub fn closed(&self) -> bool {
        self.upstream.is_closed() && self.downstream.is_closed()
    }

    /// Closes both handoff channels, unblocking any readers still waiting on
    /// this connection. Safe to call more than once.
    pub fn finish(&mut self) {
        self.upstream.finish();
        self.downstream.finish();
    }

    /// The idle-eviction path: marks both directions closed and finishes them
    /// without waiting for FIN/RST.
    pub fn force_close(&mut self) {
        self.upstream.mark_closed();
        self.downstream.mark_closed();
        self.finish();
    }

    /// Drains whatever timing record is pending, if it's ready to emit, handing
    /// it to `sink`. Called by the assembler when it observes closure.
    pub fn flush_timing(&mut self, sink: &dyn TimingSink) {
        if let Some(record) = self.timing.take() {
            if record.should_emit() {
                sink.emit(&record);
            }
        }
    }

    /// Processes one observed segment. `src`/`dst` are the segment's own
    /// direction; `sink` receives a timing line if a response completes on
    /// this call.
    pub fn on_receive(&mut self, src: Endpoint, dst: Endpoint, seg: Segment, timestamp: SystemTime, sink: &dyn TimingSink) {
        self.last_timestamp = timestamp;

        if !self.is_http {
            if !http::is_http_request(&seg.payload) {
                return;
            }
            self.client_id = Some(src);
            self.is_http = true;
        }

        let up = self.client_id == Some(src);

        if http::is_http_request(&seg.payload) {
            self.timing = Some(TimingRecord::new_request(
                up,
                format!("{}->{}", src, dst),
                timestamp,
                seg.payload.len(),
                self.fragment_threshold,
            ));
        }

        if seg.payload.len() > self.ack_pure_threshold {
            if let Some(record) = &mut self.timing {
                if up {
                    record.extend_request(timestamp, seg.payload.len());
                } else {
                    record.extend_response(timestamp, seg.payload.len());
                }
            }
        }

        if http::is_http_reply(&seg.payload) {
            if let Some(record) = &self.timing {
                if record.should_emit() {
                    sink.emit(record);
                }
            }
            if let Some(record) = &mut self.timing {
                record.reset_response(timestamp, seg.payload.len(), self.fragment_threshold);
            }
        }

        let ack_flag = seg.ack_flag;
        let ack = seg.ack;
        let fin_or_rst = seg.fin || seg.rst;

        let overflowed = if up {
            self.upstream.append(seg).is_err()
        } else {
            self.downstream.append(seg).is_err()
        };

        if overflowed {
            log::warn!("connection {} exceeded its out-of-order bound, tearing down", self.key);
            self.force_close();
            return;
        }

        if ack_flag {
            if up {
                self.downstream.confirm(ack);
            } else {
                self.upstream.confirm(ack);
            }
        }

        if fin_or_rst {
            if up {
                self.upstream.mark_closed();
            } else {
                self.downstream.mark_closed();
            }
        }
    }
}
