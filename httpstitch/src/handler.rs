//! The caller-supplied notification hook for connection lifecycle events.

use crate::conn_id::Endpoint;
use crate::stream::StreamReader;

/// Notified once per new connection, and once more when the assembler shuts
/// down. Implementations typically spawn a reader task per direction on the
/// two `StreamReader` handles they're handed.
pub trait ConnectionHandler: Send + Sync {
    /// Called exactly once when a new connection is recognized, handing over
    /// the two direction readers. `src`/`dst` identify the endpoint that sent
    /// the segment that triggered recognition.
    fn handle(&self, src: Endpoint, dst: Endpoint, upstream: StreamReader, downstream: StreamReader);

    /// Called once the assembler has no more connections to dispatch.
    fn finish(&self) {}
}
