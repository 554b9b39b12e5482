//! Vector indexes for speaker embeddings.
//!
//! [`VecIndex`] is the narrow interface the voiceprint core talks to: upsert
//! points with a JSON payload, cosine top-k search, delete by id, and
//! filtered scroll. Three backends are provided:
//!
//! - [`MemoryIndex`]: ordered in-memory map, brute-force search. Tests and
//!   single-process use.
//! - [`RedbIndex`]: one redb table per collection in a single file.
//! - [`QdrantIndex`]: Qdrant REST API.
//!
//! Distances are cosine distances in `[0, 2]`; `similarity = 1 - distance`.

pub mod cosine;
pub mod error;
pub mod memory;
pub mod qdrant;
pub mod redb;
pub mod vecstore;

pub use cosine::{cosine_distance, cosine_similarity, l2_normalize};
pub use error::VecError;
pub use memory::MemoryIndex;
pub use qdrant::{QdrantConfig, QdrantIndex};
pub use self::redb::RedbIndex;
pub use vecstore::{Filter, Match, Payload, Point, VecIndex};
