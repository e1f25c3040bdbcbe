//! Event ingestion subsystem.
//!
//! # Data Flow
//! ```text
//! NodeConnection::subscribe(stream)
//!     → stream.rs (split chunks into lines, decode frames)
//!     → monitor.rs (persist each event, record metrics)
//!     → restart.rs (on failure: back off, reconnect, try again)
//! ```

pub mod monitor;
pub mod restart;
pub mod stream;

pub use monitor::ingest_stream;
pub use restart::supervised;
pub use stream::{decode_message, LineDecoder};
