//! Conveyline Core - Shared infrastructure for parcel transfer pipelines
//!
//! Record shapes, the transfer selection rule, array-file reading and
//! streaming writing, the shared HTTP client, logging and progress.

pub mod array_reader;
pub mod array_writer;
pub mod error;
pub mod filter;
pub mod http;
pub mod logging;
pub mod progress;
pub mod schema;

// Re-exports for convenience
pub use array_reader::{Framing, PriorOutput, move_aside, parse_array_text, read_array};
pub use array_writer::{ArrayStart, StreamingArrayWriter};
pub use error::FetchError;
pub use filter::{SelectionPredicate, parse_grantor_date};
pub use http::{HttpConfig, SHARED_RUNTIME, http_client, http_config, set_http_config};
pub use logging::{IndicatifLogger, init_logging};
pub use progress::{ProgressContext, SharedProgress, fmt_num};
pub use schema::{ParcelRecord, PersistedTransfer};
