use serde::{Deserialize, Serialize};

use super::tenant::TenantId;

/// A bounded-length excerpt of a source document, embedded and indexed for
/// retrieval. Every stored and queried chunk carries its tenant id; the
/// index refuses to operate without that filter.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DocumentChunk {
    pub tenant_id: TenantId,
    pub source_file: String,
    pub chunk_index: usize,
    pub text: String,
}

/// A retrieval hit, ranked by similarity (higher is closer).
#[derive(Clone, Debug, PartialEq)]
pub struct RankedPassage {
    pub chunk: DocumentChunk,
    pub score: f32,
}
