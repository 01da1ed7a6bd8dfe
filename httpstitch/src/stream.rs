//! Per-direction consumer-facing view of a TCP connection's reassembled bytes.
//!
//! A `NetworkStream` is the capture-side handle: it accepts segments from the
//! assembler and forwards released payload through a bounded handoff channel.
//! Its counterpart, `StreamReader`, is the consumer-side handle: a blocking
//! byte reader with no access back into the receive window, so a consumer
//! reading slowly can never contend with the capture thread for a lock — only
//! the channel's own bounded capacity provides back-pressure.

use crate::segment::Segment;
use crate::window::{ReceiveWindow, WindowOverflow};

use std::io::{self, Read};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crossbeam_channel::{bounded, Receiver, Sender};

/// The capture-side half of one direction of a connection.
pub struct NetworkStream {
    window: ReceiveWindow,
    tx: Option<Sender<Segment>>,
    ignored: Arc<AtomicBool>,
    /// `true` once FIN/RST has been observed on this direction. Distinct from
    /// the handoff channel being closed: this flag alone doesn't unblock a
    /// blocked reader (see `spec.md` §4.3) — only `finish` does that.
    closed: bool,
}

impl NetworkStream {
    /// Creates a connected pair: the capture-side `NetworkStream` and the
    /// consumer-side `StreamReader`.
    pub fn new(
        handoff_capacity: usize,
        window_initial_capacity: usize,
        max_buffered: Option<usize>,
    ) -> (NetworkStream, StreamReader) {
        let (tx, rx) = bounded(handoff_capacity);
        let ignored = Arc::new(AtomicBool::new(false));
        let stream = NetworkStream {
            window: ReceiveWindow::new(window_initial_capacity, max_buffered),
            tx: Some(tx),
            ignored: Arc::clone(&ignored),
            closed: false,
        };
        let reader = StreamReader {
            rx,
            remain: Vec::new(),
            ignored,
        };
        (stream, reader)
    }

    /// Buffers an incoming segment. A no-op if the consumer has closed or the
    /// direction is already marked closed. Propagates `WindowOverflow` so the
    /// owning connection can decide to tear itself down.
    pub fn append(&mut self, seg: Segment) -> Result<(), WindowOverflow> {
        if self.ignored.load(Ordering::Relaxed) || self.closed {
            return Ok(());
        }
        self.window.insert(seg)
    }

    /// Releases in-order bytes up to `ack`. A no-op under the same conditions
    /// as `append`.
    pub fn confirm(&mut self, ack: u32) {
        if self.ignored.load(Ordering::Relaxed) || self.closed {
            return;
        }
        if let Some(tx) = &self.tx {
            self.window.confirm(ack, tx);
        }
    }

    /// Marks this direction closed (FIN/RST observed). Does not by itself wake
    /// a blocked reader — see `finish`.
    pub fn mark_closed(&mut self) {
        self.closed = true;
    }

    #[inline]
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Closes the handoff channel exactly once. Safe to call more than once;
    /// subsequent calls are no-ops since `tx` is already `None`.
    pub fn finish(&mut self) {
        self.closed = true;
        self.tx = None;
    }
}

/// The consumer-side half: a blocking byte reader over one direction's
/// reassembled payload.
pub struct StreamReader {
    rx: Receiver<Segment>,
    remain: Vec<u8>,
    ignored: Arc<AtomicBool>,
}

impl StreamReader {
    /// Signals disinterest: the capture side silently drops future segments
    /// for this direction instead of blocking on a reader that will never come
    /// back.
    pub fn close(&self) {
        self.ignored.store(true, Ordering::Relaxed);
    }
}

impl Read for StreamReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.remain.is_empty() {
            match self.rx.recv() {
                Ok(seg) => self.remain = seg.payload,
                Err(_) => return Ok(0), // channel closed and drained: end-of-stream
            }
        }
        let n = buf.len().min(self.remain.len());
        buf[..n].copy_from_slice(&self.remain[..n]);
        self.remain.drain(..n);
        Ok(n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seg(seq: u32, payload: &str) -> Segment {
        Segment::new(seq, 0, payload.as_bytes().to_vec())
    }

    #[test]
    fn appended_and_confirmed_bytes_reach_the_reader() {
        let (mut stream, mut reader) = NetworkStream::new(16, 64, None);
        stream.append(seg(1000, "hello")).unwrap();
        stream.confirm(1005);
        stream.finish();

        let mut out = Vec::new();
        reader.read_to_end(&mut out).unwrap();
        assert_eq!(out, b"hello");
    }

    #[test]
    fn closing_the_reader_makes_future_appends_no_ops() {
        let (mut stream, reader) = NetworkStream::new(16, 64, None);
        reader.close();
        stream.append(seg(1000, "hello")).unwrap();
        stream.confirm(1005);
        // No segment was ever buffered: window stays empty, confirm is a no-op.
        assert!(stream.window.buffered_seqs().is_empty());
    }

    #[test]
    fn finish_unblocks_a_reader_with_no_data() {
        let (mut stream, mut reader) = NetworkStream::new(16, 64, None);
        stream.finish();
        let mut buf = [0u8; 4];
        assert_eq!(reader.read(&mut buf).unwrap(), 0);
    }

    #[test]
    fn read_respects_buffer_size_and_retains_remainder() {
        let (mut stream, mut reader) = NetworkStream::new(16, 64, None);
        stream.append(seg(1000, "hello world")).unwrap();
        stream.confirm(1011);
        stream.finish();

        let mut buf = [0u8; 5];
        assert_eq!(reader.read(&mut buf).unwrap(), 5);
        assert_eq!(&buf, b"hello");
        assert_eq!(reader.read(&mut buf).unwrap(), 5);
        assert_eq!(&buf, b" worl");
        assert_eq!(reader.read(&mut buf).unwrap(), 1);
        assert_eq!(&buf[..1], b"d");
    }
}
