//! Narrow HTTP cue detection.
//!
//! This is deliberately not an HTTP parser: it recognizes just enough of the
//! first bytes of a segment to decide "this looks like the start of an HTTP
//! request" or "this looks like the start of a 200 response". Anything more
//! (headers, bodies, chunked encoding) is the consumer's problem once it reads
//! the reassembled byte stream.

const METHODS: [&[u8]; 8] = [
    b"GET ", b"POST ", b"PUT ", b"DELETE ", b"HEAD ", b"TRACE ", b"OPTIONS ", b"PATCH ",
];

/// Minimum payload length for a request line to be recognized at all
/// (`spec.md` §4.6): short enough to rule out a bare method prefix with no
/// URI or HTTP version following it.
const MIN_REQUEST_LEN: usize = 8;

/// `true` if `payload` is at least `MIN_REQUEST_LEN` bytes and begins with one
/// of the recognized HTTP method prefixes.
pub fn is_http_request(payload: &[u8]) -> bool {
    payload.len() >= MIN_REQUEST_LEN && METHODS.iter().any(|m| payload.starts_with(m))
}

const REPLY_PREFIX: &[u8] = b"HTTP/1.1 200";

/// `true` if the first 12 bytes of `payload` are `HTTP/1.1 200`, case-insensitive.
pub fn is_http_reply(payload: &[u8]) -> bool {
    if payload.len() < REPLY_PREFIX.len() {
        return false;
    }
    payload[..REPLY_PREFIX.len()].eq_ignore_ascii_case(REPLY_PREFIX)
}
