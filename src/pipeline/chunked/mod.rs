//! Model-assisted extraction over long documents: split into overlapping
//! chunks, extract them concurrently with retries, merge the partials.

pub mod merge;
pub mod retry;
pub mod splitter;
pub mod worker;

pub use merge::merge_chunk_results;
pub use retry::RetryPolicy;
pub use splitter::{split_into_chunks, Chunk, ChunkingConfig};
pub use worker::{extract_chunk, ChunkRequest, ExtractionPool, PoolConfig};
