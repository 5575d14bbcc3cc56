use std::sync::Arc;

use tracing::{debug, warn};

use parley_core::domain::chunk::{DocumentChunk, RankedPassage};
use parley_core::domain::tenant::TenantId;
use parley_core::errors::{CoreError, CoreResult};

use crate::chunker::ChunkingEngine;
use crate::embedding::{EmbeddingClient, EmbeddingMode};
use crate::index::{ChunkRecord, TenantVectorIndex};

/// Ingest, query, and delete over one tenant's knowledge base.
///
/// `ingest` and `delete` are administrative operations and report errors to
/// their caller. `query` runs inside a live conversation turn, so it degrades
/// to an empty context on any failure instead of surfacing an error.
pub struct RetrievalService {
    chunker: ChunkingEngine,
    embedder: Arc<dyn EmbeddingClient>,
    index: Arc<dyn TenantVectorIndex>,
    top_k: usize,
}

impl RetrievalService {
    pub fn new(
        chunker: ChunkingEngine,
        embedder: Arc<dyn EmbeddingClient>,
        index: Arc<dyn TenantVectorIndex>,
        top_k: usize,
    ) -> Self {
        Self { chunker, embedder, index, top_k }
    }

    /// Splits, embeds, and indexes a document. Re-ingesting a source file
    /// replaces its previous chunks. Returns the number of chunks stored.
    pub async fn ingest(
        &self,
        tenant_id: &TenantId,
        source_file: &str,
        text: &str,
        api_key: Option<&str>,
    ) -> CoreResult<usize> {
        if text.trim().is_empty() {
            return Err(CoreError::Validation("document text must not be empty".to_string()));
        }
        if source_file.trim().is_empty() {
            return Err(CoreError::Validation("source file name must not be empty".to_string()));
        }
        let api_key = api_key.ok_or_else(|| {
            CoreError::Configuration("no embedding credential configured for tenant".to_string())
        })?;

        let pieces = self.chunker.split(text);
        let mut records = Vec::with_capacity(pieces.len());
        for (chunk_index, piece) in pieces.into_iter().enumerate() {
            let vector = self.embedder.embed(&piece, EmbeddingMode::Document, api_key).await?;
            records.push(ChunkRecord {
                chunk: DocumentChunk {
                    tenant_id: tenant_id.clone(),
                    source_file: source_file.to_string(),
                    chunk_index,
                    text: piece,
                },
                vector,
            });
        }

        let replaced = self.index.delete(tenant_id, source_file).await?;
        if replaced > 0 {
            debug!(
                event_name = "retrieval.reingest",
                tenant_id = %tenant_id,
                source_file,
                replaced_chunks = replaced,
            );
        }

        let stored = records.len();
        self.index.add(records).await?;

        debug!(
            event_name = "retrieval.ingested",
            tenant_id = %tenant_id,
            source_file,
            chunks = stored,
        );
        Ok(stored)
    }

    /// Retrieves the passages most similar to `text` within the tenant's
    /// knowledge base. Never fails: a missing credential, provider error, or
    /// index error all degrade to an empty result with a warning.
    pub async fn query(
        &self,
        tenant_id: &TenantId,
        text: &str,
        api_key: Option<&str>,
    ) -> Vec<RankedPassage> {
        let Some(api_key) = api_key else {
            warn!(
                event_name = "retrieval.degraded",
                tenant_id = %tenant_id,
                reason = "missing embedding credential",
            );
            return Vec::new();
        };

        let vector = match self.embedder.embed(text, EmbeddingMode::Query, api_key).await {
            Ok(vector) => vector,
            Err(err) => {
                warn!(
                    event_name = "retrieval.degraded",
                    tenant_id = %tenant_id,
                    error = %err,
                );
                return Vec::new();
            }
        };

        match self.index.search(tenant_id, &vector, self.top_k).await {
            Ok(passages) => passages,
            Err(err) => {
                warn!(
                    event_name = "retrieval.degraded",
                    tenant_id = %tenant_id,
                    error = %err,
                );
                Vec::new()
            }
        }
    }

    /// Removes every chunk ingested from `source_file`. Returns how many
    /// chunks were removed; zero is not an error.
    pub async fn delete(&self, tenant_id: &TenantId, source_file: &str) -> CoreResult<usize> {
        let removed = self.index.delete(tenant_id, source_file).await?;
        debug!(
            event_name = "retrieval.deleted",
            tenant_id = %tenant_id,
            source_file,
            chunks = removed,
        );
        Ok(removed)
    }
}
