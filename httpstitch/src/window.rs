//! Per-direction receive window: sorts out-of-order segments and releases
//! in-order, de-overlapped payload bytes once acknowledged.

use crate::sequence;
use crate::segment::Segment;

use crossbeam_channel::Sender;

/// Returned when a window's out-of-order buffer would exceed its configured
/// bound. The caller (`TcpConnection`) treats this as grounds to tear the whole
/// connection down, the same "drop the connection, don't let memory grow
/// without bound" discipline used for pathological reordering elsewhere in this
/// family of reassemblers.
#[derive(Debug, Clone, Copy)]
pub struct WindowOverflow;

/// A ring buffer of segments pending release, ordered by sequence number.
///
/// Invariants (see `spec.md` §8): no two buffered segments share a `seq`; the
/// buffer is always sorted ascending by the wrap-aware comparator; segments
/// with empty payloads are never buffered.
#[derive(Debug)]
pub struct ReceiveWindow {
    buffer: Vec<Option<Segment>>,
    start: usize,
    size: usize,
    /// Hard cap on buffered out-of-order segments. `None` means unbounded
    /// (capacity still only grows by doubling, as in `spec.md` §4.2).
    max_buffered: Option<usize>,
    /// Next sequence number the consumer expects. `0` means nothing released yet.
    expect_begin: u32,
    /// Highest ACK observed so far. `0` means never ACKed.
    last_ack: u32,
}

/// Fallback initial capacity if a caller asks for zero (a ring buffer of size
/// zero can never hold a segment, which would make `insert` indistinguishable
/// from a permanently-overflowing window).
const MIN_CAPACITY: usize = 1;

impl ReceiveWindow {
    pub fn new(initial_capacity: usize, max_buffered: Option<usize>) -> Self {
        let initial_capacity = initial_capacity.max(MIN_CAPACITY);
        ReceiveWindow {
            buffer: (0..initial_capacity).map(|_| None).collect(),
            start: 0,
            size: 0,
            max_buffered,
            expect_begin: 0,
            last_ack: 0,
        }
    }

    #[inline]
    fn capacity(&self) -> usize {
        self.buffer.len()
    }

    #[inline]
    fn physical(&self, logical: usize) -> usize {
        (self.start + logical) % self.capacity()
    }

    fn get(&self, logical: usize) -> &Segment {
        self.buffer[self.physical(logical)]
            .as_ref()
            .expect("logical index within size must be occupied")
    }

    /// Doubles capacity and linearizes buffered segments into a fresh buffer
    /// starting at logical index 0.
    fn grow(&mut self) {
        let new_capacity = self.capacity() * 2;
        let mut new_buffer: Vec<Option<Segment>> = (0..new_capacity).map(|_| None).collect();
        for i in 0..self.size {
            new_buffer[i] = self.buffer[self.physical(i)].take();
        }
        self.buffer = new_buffer;
        self.start = 0;
        log::debug!("receive window grew to {} segments", new_capacity);
    }

    /// Shifts logical indices `[pos, size)` right by one and places `seg` at `pos`.
    fn insert_at(&mut self, pos: usize, seg: Segment) {
        for i in (pos..self.size).rev() {
            let moved = self.buffer[self.physical(i)].take();
            let dst = self.physical(i + 1);
            self.buffer[dst] = moved;
        }
        let dst = self.physical(pos);
        self.buffer[dst] = Some(seg);
        self.size += 1;
    }

    /// Attempts to buffer an out-of-order or future segment.
    ///
    /// Returns `Ok(())` if the segment was buffered or intentionally dropped
    /// (duplicate, already-released, empty payload). Returns
    /// `Err(WindowOverflow)` only when buffering would exceed `max_buffered`.
    pub fn insert(&mut self, seg: Segment) -> Result<(), WindowOverflow> {
        if seg.payload.is_empty() {
            return Ok(());
        }

        if self.expect_begin != 0 && !sequence::lt(self.expect_begin, seg.end_seq()) {
            log::debug!(
                "dropping segment seq={} entirely behind release boundary {}",
                seg.seq,
                self.expect_begin
            );
            return Ok(());
        }

        for i in (0..self.size).rev() {
            let cur_seq = self.get(i).seq;
            if cur_seq == seg.seq {
                log::debug!("dropping duplicate segment seq={}", seg.seq);
                return Ok(());
            }
            if sequence::lt(cur_seq, seg.seq) {
                return self.place(i + 1, seg);
            }
        }
        self.place(0, seg)
    }

    fn place(&mut self, pos: usize, seg: Segment) -> Result<(), WindowOverflow> {
        if let Some(max) = self.max_buffered {
            if self.size >= max {
                log::warn!(
                    "receive window exceeded max_buffered={} segments, signaling overflow",
                    max
                );
                return Err(WindowOverflow);
            }
        }
        if self.size == self.capacity() {
            self.grow();
        }
        self.insert_at(pos, seg);
        Ok(())
    }

    /// Releases every buffered segment whose `seq` is strictly less than `ack`,
    /// in order, forwarding de-overlapped payload to `sink`. Blocks if `sink` is
    /// at capacity (bounded back-pressure, see `spec.md` §5).
    pub fn confirm(&mut self, ack: u32, sink: &Sender<Segment>) {
        while self.size > 0 && sequence::lt(self.get(0).seq, ack) {
            let front = self.physical(0);
            let mut seg = self.buffer[front].take().expect("front must be occupied");
            self.start = (self.start + 1) % self.capacity();
            self.size -= 1;

            let end_seq = seg.end_seq();

            if self.expect_begin != 0 {
                if sequence::gt(self.expect_begin, seg.seq) {
                    let dup = self.expect_begin.wrapping_sub(seg.seq) as usize;
                    if dup >= seg.payload.len() {
                        // Entirely already-released: drop and don't touch expect_begin.
                        continue;
                    }
                    seg.payload.drain(0..dup);
                } else if sequence::lt(self.expect_begin, seg.seq) {
                    log::warn!(
                        "gap detected: expected seq {} but next released segment starts at {} ({} bytes lost)",
                        self.expect_begin,
                        seg.seq,
                        seg.seq.wrapping_sub(self.expect_begin)
                    );
                }
            }

            if sink.send(seg).is_err() {
                // Consumer dropped the receiving end; nothing more to forward.
                return;
            }
            self.expect_begin = end_seq;
        }

        if self.last_ack == 0 || sequence::gt(ack, self.last_ack) {
            self.last_ack = ack;
        }
    }

    #[cfg(test)]
    pub(crate) fn buffered_seqs(&self) -> Vec<u32> {
        (0..self.size).map(|i| self.get(i).seq).collect()
    }

    #[cfg(test)]
    pub(crate) fn expect_begin(&self) -> u32 {
        self.expect_begin
    }
}
