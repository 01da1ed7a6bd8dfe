//! The connection table: routes segments to connections, creates and evicts
//! them, and applies coarse IP/port filtering.

use std::sync::{Arc, Mutex};
use std::time::SystemTime;

use hashlink::linked_hash_map::{LinkedHashMap, RawEntryMut};

use crate::config::Config;
use crate::conn::TcpConnection;
use crate::conn_id::{ConnKey, Endpoint};
use crate::handler::ConnectionHandler;
use crate::http;
use crate::segment::Segment;
use crate::timing::TimingSink;

/// Process-wide connection table plus the glue that routes segments into it.
///
/// One `Assembler` is shared (via `&self`, never `&mut self`) across every
/// capture thread that calls `assemble`. The table itself is the only thing
/// those threads contend on, and only briefly: connection-level work happens
/// after the table lock is released.
pub struct Assembler {
    config: Config,
    handler: Arc<dyn ConnectionHandler>,
    sink: Arc<dyn TimingSink>,
    table: Mutex<LinkedHashMap<ConnKey, Arc<Mutex<TcpConnection>>>>,
}

impl Assembler {
    pub fn new(config: Config, handler: Arc<dyn ConnectionHandler>, sink: Arc<dyn TimingSink>) -> Self {
        Assembler {
            config,
            handler,
            sink,
            table: Mutex::new(LinkedHashMap::new()),
        }
    }

    #[inline]
    fn passes_filter(&self, src: Endpoint, dst: Endpoint) -> bool {
        if let Some(ip) = self.config.filter_ip {
            if src.ip != ip && dst.ip != ip {
                log::debug!("dropping {} -> {}: neither endpoint matches filter_ip {}", src, dst, ip);
                return false;
            }
        }
        if let Some(port) = self.config.filter_port {
            if src.port != port && dst.port != port {
                log::debug!("dropping {} -> {}: neither endpoint matches filter_port {}", src, dst, port);
                return false;
            }
        }
        true
    }

    /// Routes one observed segment. A no-op if it's filtered out or belongs to
    /// a connection this assembler has no reason to create.
    pub fn assemble(&self, src: Endpoint, dst: Endpoint, seg: Segment, timestamp: SystemTime) {
        if !self.passes_filter(src, dst) {
            return;
        }

        let key = ConnKey::new(src, dst);
        let may_create = (seg.syn && !seg.ack_flag) || http::is_http_request(&seg.payload);

        let conn = {
            let mut table = self.table.lock().unwrap();
            match table.raw_entry_mut().from_key(&key) {
                RawEntryMut::Occupied(occupied) => Arc::clone(occupied.get()),
                RawEntryMut::Vacant(vacant) => {
                    if !may_create {
                        log::debug!(
                            "dropping {} -> {}: no connection {} and segment is neither a bare SYN nor an HTTP request line",
                            src, dst, key
                        );
                        return;
                    }
                    let (conn, up_reader, down_reader) = TcpConnection::new(
                        key.clone(),
                        self.config.handoff_capacity,
                        self.config.window_initial_capacity,
                        self.config.max_out_of_order,
                        self.config.fragment_threshold,
                        self.config.ack_pure_threshold,
                        timestamp,
                    );
                    let conn = Arc::new(Mutex::new(conn));
                    vacant.insert(key.clone(), Arc::clone(&conn));
                    drop(table);
                    self.handler.handle(src, dst, up_reader, down_reader);
                    conn
                }
            }
        };

        let closed = {
            let mut conn = conn.lock().unwrap();
            conn.on_receive(src, dst, seg, timestamp, self.sink.as_ref());
            conn.closed()
        };

        if closed {
            self.table.lock().unwrap().remove(&key);
            let mut conn = conn.lock().unwrap();
            conn.flush_timing(self.sink.as_ref());
            conn.finish();
        }
    }

    /// Evicts connections that have gone quiet. Intended to be called
    /// periodically by an external driver with `cutoff = now - idle_timeout`.
    pub fn flush_older_than(&self, cutoff: SystemTime) {
        let evicted: Vec<Arc<Mutex<TcpConnection>>> = {
            let mut table = self.table.lock().unwrap();
            let stale_keys: Vec<ConnKey> = table
                .iter()
                .filter(|(_, conn)| conn.lock().unwrap().last_timestamp() < cutoff)
                .map(|(key, _)| key.clone())
                .collect();
            stale_keys
                .into_iter()
                .filter_map(|key| table.remove(&key))
                .collect()
        };

        for conn in evicted {
            conn.lock().unwrap().force_close();
        }
    }

    /// Finishes every live connection and notifies the handler of shutdown.
    pub fn finish_all(&self) {
        let remaining: Vec<Arc<Mutex<TcpConnection>>> = {
            let mut table = self.table.lock().unwrap();
            table.drain().map(|(_, conn)| conn).collect()
        };
        for conn in remaining {
            conn.lock().unwrap().finish();
        }
        self.handler.finish();
    }

    #[cfg(test)]
    pub(crate) fn table_len(&self) -> usize {
        self.table.lock().unwrap().len()
    }
}
