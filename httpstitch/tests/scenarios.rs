//! End-to-end reassembly scenarios driven entirely through the public
//! `Assembler` API, mirroring the literal scenarios and invariants this crate
//! is built against.

use std::io::Read;
use std::net::{IpAddr, Ipv4Addr};
use std::sync::mpsc;
use std::sync::{Arc, Mutex};
use std::time::SystemTime;

use httpstitch::{Assembler, Config, ConnectionHandler, Endpoint, Segment, StreamReader, TimingRecord, TimingSink};

fn ep(octet: u8, port: u16) -> Endpoint {
    Endpoint::new(IpAddr::V4(Ipv4Addr::new(10, 0, 0, octet)), port)
}

fn seg(seq: u32, ack: u32, payload: &[u8]) -> Segment {
    let mut s = Segment::new(seq, ack, payload.to_vec());
    s.ack_flag = ack != 0;
    s
}

/// Hands every new connection's two readers back to the test over a channel,
/// so the test thread can read them to completion itself instead of the
/// handler doing anything interesting with them.
struct ChannelHandler(Mutex<mpsc::Sender<(Endpoint, Endpoint, StreamReader, StreamReader)>>);

impl ConnectionHandler for ChannelHandler {
    fn handle(&self, src: Endpoint, dst: Endpoint, up: StreamReader, down: StreamReader) {
        self.0.lock().unwrap().send((src, dst, up, down)).unwrap();
    }
}

#[derive(Default)]
struct CollectingSink(Mutex<Vec<TimingRecord>>);

impl TimingSink for CollectingSink {
    fn emit(&self, record: &TimingRecord) {
        self.0.lock().unwrap().push(record.clone());
    }
}

fn read_all(reader: &mut StreamReader) -> Vec<u8> {
    let mut buf = Vec::new();
    reader.read_to_end(&mut buf).unwrap();
    buf
}

/// Reads exactly `n` bytes, looping over `Read::read` as needed since each
/// underlying channel message carries only one released segment's payload.
fn read_n(reader: &mut StreamReader, n: usize) -> Vec<u8> {
    let mut buf = vec![0u8; n];
    reader.read_exact(&mut buf).unwrap();
    buf
}

/// S1 — basic HTTP exchange: one request, one response, clean FIN close.
#[test]
fn s1_basic_http_exchange_reassembles_both_directions_and_emits_one_timing_line() {
    let (tx, rx) = mpsc::channel();
    let handler = Arc::new(ChannelHandler(Mutex::new(tx)));
    let sink = Arc::new(CollectingSink::default());
    let assembler = Assembler::new(Config::default(), handler, sink.clone());

    let client = ep(1, 5000);
    let server = ep(2, 80);
    let t0 = SystemTime::now();

    assembler.assemble(client, server, seg(1000, 0, b"GET / HTTP/1.1\r\n\r\n"), t0);
    assembler.assemble(server, client, seg(2000, 1018, b"HTTP/1.1 200 OK\r\n\r\nhello"), t0);

    let mut fin1 = seg(1018, 2024, b"");
    fin1.fin = true;
    assembler.assemble(client, server, fin1, t0);

    let mut fin2 = seg(2024, 1018, b"");
    fin2.fin = true;
    assembler.assemble(server, client, fin2, t0);

    let (_src, _dst, mut up, mut down) = rx.recv().unwrap();
    assert_eq!(read_all(&mut up), b"GET / HTTP/1.1\r\n\r\n");
    assert_eq!(read_all(&mut down), b"HTTP/1.1 200 OK\r\n\r\nhello");

    let records = sink.0.lock().unwrap();
    assert_eq!(records.len(), 1);
    assert!(records[0].up);
    assert_eq!(records[0].req_len, 18);
    assert_eq!(records[0].rep_len, 24);
}

/// S3 — duplicate retransmit: a mid-stream fragment delivered twice before
/// the covering ACK must not duplicate bytes in the released stream.
#[test]
fn s3_duplicate_retransmit_does_not_duplicate_released_bytes() {
    let (tx, rx) = mpsc::channel();
    let handler = Arc::new(ChannelHandler(Mutex::new(tx)));
    let sink = Arc::new(CollectingSink::default());
    let assembler = Assembler::new(Config::default(), handler, sink);

    let client = ep(1, 5000);
    let server = ep(2, 80);
    let t0 = SystemTime::now();

    // "GET / HT" recognizes the request (>= the 8-byte floor) and latches
    // direction; the remaining two fragments, plus a duplicate retransmit of
    // the middle one, arrive after.
    assembler.assemble(client, server, seg(1000, 0, b"GET / HT"), t0);
    assembler.assemble(client, server, seg(1016, 0, b"\r\n"), t0);
    assembler.assemble(client, server, seg(1008, 0, b"TP/1.1\r\n"), t0);
    assembler.assemble(client, server, seg(1008, 0, b"TP/1.1\r\n"), t0); // duplicate

    assembler.assemble(server, client, seg(1, 1018, b""), t0);

    let (_src, _dst, mut up, _down) = rx.recv().unwrap();
    assert_eq!(read_n(&mut up, 18), b"GET / HTTP/1.1\r\n\r\n");
}

/// Overlap trim: a retransmit that partially overlaps already-released bytes
/// is trimmed to its unreleased tail (`spec.md` §8 scenario S4, embedded in a
/// connection that first establishes direction via a recognized request).
#[test]
fn overlap_trim_drops_only_the_duplicated_prefix() {
    let (tx, rx) = mpsc::channel();
    let handler = Arc::new(ChannelHandler(Mutex::new(tx)));
    let sink = Arc::new(CollectingSink::default());
    let assembler = Assembler::new(Config::default(), handler, sink);

    let client = ep(1, 5000);
    let server = ep(2, 80);
    let t0 = SystemTime::now();

    // "GET ABCD" establishes recognition (>= the 8-byte floor); "E" completes
    // the same run of bytes the original "GET " + "ABCDE" split carried.
    assembler.assemble(client, server, seg(1000, 0, b"GET ABCD"), t0);
    assembler.assemble(client, server, seg(1008, 0, b"E"), t0);
    // ACKs through 1009, releasing "GET ABCDE".
    assembler.assemble(server, client, seg(1, 1009, b""), t0);
    // Overlaps the last 2 released bytes ("DE"), contributes "FGH" new.
    assembler.assemble(client, server, seg(1007, 0, b"DEFGH"), t0);
    assembler.assemble(server, client, seg(1, 1012, b""), t0);

    let (_src, _dst, mut up, _down) = rx.recv().unwrap();
    assert_eq!(read_n(&mut up, 12), b"GET ABCDEFGH");
}

/// Sequence-number wrap: a request split across the 32-bit boundary
/// reassembles contiguously (`spec.md` §8 scenario S5).
#[test]
fn wraparound_sequence_numbers_reassemble_in_order() {
    let (tx, rx) = mpsc::channel();
    let handler = Arc::new(ChannelHandler(Mutex::new(tx)));
    let sink = Arc::new(CollectingSink::default());
    let assembler = Assembler::new(Config::default(), handler, sink);

    let client = ep(1, 5000);
    let server = ep(2, 80);
    let t0 = SystemTime::now();

    let seq1 = 0xFFFF_FFF6u32;
    // First fragment meets the 8-byte recognition floor; the split itself
    // wraps the 32-bit boundary.
    let seq2 = seq1.wrapping_add(8); // end of "GET / HT", wraps near the boundary
    assembler.assemble(client, server, seg(seq1, 0, b"GET / HT"), t0);
    assembler.assemble(client, server, seg(seq2, 0, b"TP/1.1\r\n\r\n"), t0);

    let ack = seq2.wrapping_add(10); // past the wrap, covers both segments
    assembler.assemble(server, client, seg(1, ack, b""), t0);

    let (_src, _dst, mut up, _down) = rx.recv().unwrap();
    assert_eq!(read_n(&mut up, 18), b"GET / HTTP/1.1\r\n\r\n");
}

/// S6 — a port filter drops traffic on unrelated ports without creating a
/// connection or notifying the handler.
#[test]
fn s6_filter_drops_traffic_outside_the_configured_port() {
    let (tx, rx) = mpsc::channel();
    let handler = Arc::new(ChannelHandler(Mutex::new(tx)));
    let sink = Arc::new(CollectingSink::default());

    let mut config = Config::default();
    config.filter_port = Some(80);
    let assembler = Assembler::new(config, handler, sink);

    assembler.assemble(
        ep(1, 1234),
        ep(2, 5678),
        seg(1000, 0, b"GET / HTTP/1.1\r\n\r\n"),
        SystemTime::now(),
    );

    assert!(rx.try_recv().is_err(), "filtered traffic must not create a connection");
}

/// Round-trip property: duplicating an arbitrary suffix of the segments that
/// make up a request does not change the bytes a consumer observes
/// (`spec.md` §8 invariant 6).
#[test]
fn duplicating_a_suffix_of_segments_does_not_change_the_released_stream() {
    let (tx, rx) = mpsc::channel();
    let handler = Arc::new(ChannelHandler(Mutex::new(tx)));
    let sink = Arc::new(CollectingSink::default());
    let assembler = Assembler::new(Config::default(), handler, sink);

    let client = ep(1, 5000);
    let server = ep(2, 80);
    let t0 = SystemTime::now();

    // "GET / HT" meets the 8-byte recognition floor.
    assembler.assemble(client, server, seg(1000, 0, b"GET / HT"), t0);
    assembler.assemble(client, server, seg(1008, 0, b"TP/1.1\r\n"), t0);
    assembler.assemble(client, server, seg(1016, 0, b"\r\n"), t0);
    // Redeliver the trailing suffix once more before the ACK.
    assembler.assemble(client, server, seg(1008, 0, b"TP/1.1\r\n"), t0);
    assembler.assemble(client, server, seg(1016, 0, b"\r\n"), t0);

    assembler.assemble(server, client, seg(1, 1018, b""), t0);

    let (_src, _dst, mut up, _down) = rx.recv().unwrap();
    assert_eq!(read_n(&mut up, 18), b"GET / HTTP/1.1\r\n\r\n");
}

/// Round-trip property: feeding a fixed set of segments in any permutation of
/// arrival order releases the same byte stream as feeding them in order
/// (`spec.md` §8 invariant 5). The permutation space (3! = 6 orderings of the
/// trailing fragments) is small enough to enumerate directly.
#[test]
fn arbitrary_arrival_permutations_release_the_same_byte_stream() {
    // "GET / HT" (8 bytes) establishes recognition and is always delivered
    // first; the remaining three fragments complete the request line and are
    // delivered in every possible order.
    let trailing: [(u32, &[u8]); 3] = [(1008, b"TP/"), (1011, b"1.1\r\n"), (1016, b"\r\n")];
    let permutations: [[usize; 3]; 6] = [
        [0, 1, 2],
        [0, 2, 1],
        [1, 0, 2],
        [1, 2, 0],
        [2, 0, 1],
        [2, 1, 0],
    ];

    for order in permutations {
        let (tx, rx) = mpsc::channel();
        let handler = Arc::new(ChannelHandler(Mutex::new(tx)));
        let sink = Arc::new(CollectingSink::default());
        let assembler = Assembler::new(Config::default(), handler, sink);

        let client = ep(1, 5000);
        let server = ep(2, 80);
        let t0 = SystemTime::now();

        assembler.assemble(client, server, seg(1000, 0, b"GET / HT"), t0);
        for idx in order {
            let (seq, payload) = trailing[idx];
            assembler.assemble(client, server, seg(seq, 0, payload), t0);
        }
        assembler.assemble(server, client, seg(1, 1018, b""), t0);

        let (_src, _dst, mut up, _down) = rx.recv().unwrap();
        assert_eq!(
            read_n(&mut up, 18),
            b"GET / HTTP/1.1\r\n\r\n",
            "order {:?} produced a different released stream",
            order
        );
    }
}
