//! Tenant-isolated retrieval: chunking, embedding, and nearest-neighbor
//! search over ingested documents.
//!
//! The stack composes three seams:
//! 1. **Chunking** (`chunker`) - split raw text into overlapping passages
//! 2. **Embedding** (`embedding`) - text -> fixed-dimension vector, in
//!    document or query mode
//! 3. **Index** (`index`) - persistent vector store where every record and
//!    every query carries a mandatory tenant filter
//!
//! `RetrievalService` (`service`) wires them into ingest/query/delete
//! operations scoped to one tenant. Failure policy: `query` degrades to an
//! empty result rather than raising into a live conversation turn;
//! `ingest`/`delete` report errors to their administrative caller.

pub mod chunker;
pub mod embedding;
pub mod index;
pub mod service;

pub use chunker::{ChunkingEngine, SplitChunk};
pub use embedding::{EmbeddingClient, EmbeddingMode, HttpEmbeddingClient};
pub use index::{ChunkRecord, InMemoryVectorIndex, SqliteVectorIndex, TenantVectorIndex};
pub use service::RetrievalService;
