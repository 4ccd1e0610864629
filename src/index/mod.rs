//! Vector index client and payload mapping.

pub mod client;
pub mod payload;

pub use client::{DEFAULT_SEARCH_LIMIT, VectorIndexClient, normalize_url};
pub use payload::{RecordDefect, decode_hit, encode_item};
