// Core modules for the fogo key-value server
pub mod aof; // AOF writer, background rewrite, startup loader
pub mod buffer; // two-cursor byte buffer with 3-tier compaction
pub mod command; // command registry, dispatch, handlers
pub mod config; // server configuration + CLI parsing
pub mod conn; // per-client connection state and I/O drivers
pub mod db; // keyspace: dictionary + TTL index + lazy expiry
pub mod dict; // chained hash table with incremental rehashing
pub mod net; // listener, server loop, signals, fd limits
pub mod protocol; // RESP2 parser + response writers
pub mod reactor; // poll wrapper + periodic tick clock
pub mod skiplist; // sorted-set ordered index
pub mod ttl; // indexed min-heap of key deadlines
pub mod value; // tagged value payloads for the five types

// Re-export the public surface for easier access
pub use aof::*;
pub use buffer::*;
pub use command::*;
pub use config::*;
pub use conn::*;
pub use db::*;
pub use dict::*;
pub use net::*;
pub use protocol::*;
pub use reactor::*;
pub use skiplist::*;
pub use ttl::*;
pub use value::*;
