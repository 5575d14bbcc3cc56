use sqlx::Row;
use tokio::sync::RwLock;

use parley_core::domain::chunk::{DocumentChunk, RankedPassage};
use parley_core::domain::tenant::TenantId;
use parley_core::errors::{CoreError, CoreResult};

use parley_db::DbPool;

/// An embedded chunk ready for indexing.
#[derive(Clone, Debug)]
pub struct ChunkRecord {
    pub chunk: DocumentChunk,
    pub vector: Vec<f32>,
}

/// Vector store where every record and every query carries a tenant filter.
/// There is deliberately no cross-tenant search operation.
#[async_trait::async_trait]
pub trait TenantVectorIndex: Send + Sync {
    async fn add(&self, records: Vec<ChunkRecord>) -> CoreResult<()>;

    async fn search(
        &self,
        tenant_id: &TenantId,
        vector: &[f32],
        k: usize,
    ) -> CoreResult<Vec<RankedPassage>>;

    /// Removes every chunk ingested from `source_file` for the tenant.
    /// Returns the number of chunks removed.
    async fn delete(&self, tenant_id: &TenantId, source_file: &str) -> CoreResult<usize>;
}

/// Brute-force cosine index over the `document_chunks` table. Vectors are
/// stored as little-endian f32 blobs. Corpus sizes here are per-tenant
/// knowledge bases, small enough that a linear scan beats maintaining an
/// approximate structure.
pub struct SqliteVectorIndex {
    pool: DbPool,
}

impl SqliteVectorIndex {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl TenantVectorIndex for SqliteVectorIndex {
    async fn add(&self, records: Vec<ChunkRecord>) -> CoreResult<()> {
        for record in records {
            sqlx::query(
                "INSERT INTO document_chunks (tenant_id, source_file, chunk_index, text, embedding) \
                 VALUES (?1, ?2, ?3, ?4, ?5)",
            )
            .bind(&record.chunk.tenant_id.0)
            .bind(&record.chunk.source_file)
            .bind(record.chunk.chunk_index as i64)
            .bind(&record.chunk.text)
            .bind(encode_vector(&record.vector))
            .execute(&self.pool)
            .await
            .map_err(|err| CoreError::provider("index", err))?;
        }

        Ok(())
    }

    async fn search(
        &self,
        tenant_id: &TenantId,
        vector: &[f32],
        k: usize,
    ) -> CoreResult<Vec<RankedPassage>> {
        let rows = sqlx::query(
            "SELECT tenant_id, source_file, chunk_index, text, embedding \
             FROM document_chunks WHERE tenant_id = ?1",
        )
        .bind(&tenant_id.0)
        .fetch_all(&self.pool)
        .await
        .map_err(|err| CoreError::provider("index", err))?;

        let mut ranked = Vec::with_capacity(rows.len());
        for row in rows {
            let blob: Vec<u8> = row.get("embedding");
            let stored = decode_vector(&blob);
            let chunk_index: i64 = row.get("chunk_index");

            ranked.push(RankedPassage {
                chunk: DocumentChunk {
                    tenant_id: TenantId(row.get("tenant_id")),
                    source_file: row.get("source_file"),
                    chunk_index: chunk_index as usize,
                    text: row.get("text"),
                },
                score: cosine_similarity(vector, &stored),
            });
        }

        ranked.sort_by(|a, b| b.score.total_cmp(&a.score));
        ranked.truncate(k);
        Ok(ranked)
    }

    async fn delete(&self, tenant_id: &TenantId, source_file: &str) -> CoreResult<usize> {
        let result = sqlx::query(
            "DELETE FROM document_chunks WHERE tenant_id = ?1 AND source_file = ?2",
        )
        .bind(&tenant_id.0)
        .bind(source_file)
        .execute(&self.pool)
        .await
        .map_err(|err| CoreError::provider("index", err))?;

        Ok(result.rows_affected() as usize)
    }
}

/// In-process index backing tests and single-node deployments without a
/// persistent knowledge base.
#[derive(Default)]
pub struct InMemoryVectorIndex {
    records: RwLock<Vec<ChunkRecord>>,
}

#[async_trait::async_trait]
impl TenantVectorIndex for InMemoryVectorIndex {
    async fn add(&self, mut records: Vec<ChunkRecord>) -> CoreResult<()> {
        let mut stored = self.records.write().await;
        stored.append(&mut records);
        Ok(())
    }

    async fn search(
        &self,
        tenant_id: &TenantId,
        vector: &[f32],
        k: usize,
    ) -> CoreResult<Vec<RankedPassage>> {
        let stored = self.records.read().await;

        let mut ranked: Vec<RankedPassage> = stored
            .iter()
            .filter(|record| record.chunk.tenant_id == *tenant_id)
            .map(|record| RankedPassage {
                chunk: record.chunk.clone(),
                score: cosine_similarity(vector, &record.vector),
            })
            .collect();

        ranked.sort_by(|a, b| b.score.total_cmp(&a.score));
        ranked.truncate(k);
        Ok(ranked)
    }

    async fn delete(&self, tenant_id: &TenantId, source_file: &str) -> CoreResult<usize> {
        let mut stored = self.records.write().await;
        let before = stored.len();
        stored.retain(|record| {
            record.chunk.tenant_id != *tenant_id || record.chunk.source_file != source_file
        });
        Ok(before - stored.len())
    }
}

fn encode_vector(vector: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(vector.len() * 4);
    for value in vector {
        bytes.extend_from_slice(&value.to_le_bytes());
    }
    bytes
}

fn decode_vector(bytes: &[u8]) -> Vec<f32> {
    bytes
        .chunks_exact(4)
        .map(|quad| f32::from_le_bytes([quad[0], quad[1], quad[2], quad[3]]))
        .collect()
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.is_empty() || a.len() != b.len() {
        return 0.0;
    }

    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;
    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denominator = norm_a.sqrt() * norm_b.sqrt();
    if denominator == 0.0 {
        return 0.0;
    }
    dot / denominator
}

#[cfg(test)]
mod tests {
    use parley_core::domain::chunk::DocumentChunk;
    use parley_core::domain::tenant::TenantId;

    use super::{
        cosine_similarity, decode_vector, encode_vector, ChunkRecord, InMemoryVectorIndex,
        SqliteVectorIndex, TenantVectorIndex,
    };

    fn record(tenant: &str, source: &str, index: usize, text: &str, vector: Vec<f32>) -> ChunkRecord {
        ChunkRecord {
            chunk: DocumentChunk {
                tenant_id: TenantId(tenant.to_string()),
                source_file: source.to_string(),
                chunk_index: index,
                text: text.to_string(),
            },
            vector,
        }
    }

    #[test]
    fn vector_blob_encoding_round_trips() {
        let vector = vec![0.25f32, -1.5, 3.75, 0.0];
        assert_eq!(decode_vector(&encode_vector(&vector)), vector);
    }

    #[test]
    fn cosine_handles_degenerate_inputs() {
        assert_eq!(cosine_similarity(&[], &[]), 0.0);
        assert_eq!(cosine_similarity(&[1.0, 0.0], &[1.0]), 0.0);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 1.0]), 0.0);
        assert!((cosine_similarity(&[1.0, 0.0], &[1.0, 0.0]) - 1.0).abs() < 1e-6);
    }

    #[tokio::test]
    async fn search_never_crosses_tenants_in_memory() {
        let index = InMemoryVectorIndex::default();
        index
            .add(vec![
                record("tenant-a", "a.md", 0, "alpha text", vec![1.0, 0.0]),
                record("tenant-b", "b.md", 0, "beta text", vec![1.0, 0.0]),
            ])
            .await
            .expect("add");

        let hits = index
            .search(&TenantId("tenant-a".to_string()), &[1.0, 0.0], 10)
            .await
            .expect("search");

        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].chunk.text, "alpha text");
    }

    #[tokio::test]
    async fn delete_removes_only_the_named_source_file() {
        let index = InMemoryVectorIndex::default();
        index
            .add(vec![
                record("tenant-a", "keep.md", 0, "keep", vec![1.0, 0.0]),
                record("tenant-a", "drop.md", 0, "drop one", vec![0.0, 1.0]),
                record("tenant-a", "drop.md", 1, "drop two", vec![0.5, 0.5]),
                record("tenant-b", "drop.md", 0, "other tenant", vec![0.5, 0.5]),
            ])
            .await
            .expect("add");

        let removed =
            index.delete(&TenantId("tenant-a".to_string()), "drop.md").await.expect("delete");
        assert_eq!(removed, 2);

        let other_tenant = index
            .search(&TenantId("tenant-b".to_string()), &[0.5, 0.5], 10)
            .await
            .expect("search");
        assert_eq!(other_tenant.len(), 1);
    }

    #[tokio::test]
    async fn sqlite_index_isolates_tenants_and_ranks_by_similarity() {
        let pool = parley_db::connect_with_settings("sqlite::memory:", 1, 30)
            .await
            .expect("connect");
        parley_db::migrations::run_pending(&pool).await.expect("migrate");
        seed_tenants(&pool, &["tenant-a", "tenant-b"]).await;

        let index = SqliteVectorIndex::new(pool.clone());
        index
            .add(vec![
                record("tenant-a", "kb.md", 0, "close match", vec![1.0, 0.0, 0.0]),
                record("tenant-a", "kb.md", 1, "far match", vec![0.0, 1.0, 0.0]),
                record("tenant-b", "kb.md", 0, "other tenant", vec![1.0, 0.0, 0.0]),
            ])
            .await
            .expect("add");

        let hits = index
            .search(&TenantId("tenant-a".to_string()), &[1.0, 0.0, 0.0], 2)
            .await
            .expect("search");

        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].chunk.text, "close match");
        assert!(hits[0].score > hits[1].score);
        assert!(hits.iter().all(|hit| hit.chunk.tenant_id.0 == "tenant-a"));

        pool.close().await;
    }

    async fn seed_tenants(pool: &parley_db::DbPool, ids: &[&str]) {
        use parley_core::domain::tenant::Tenant;
        use parley_db::repositories::{SqlTenantRepository, TenantRepository};

        let repo = SqlTenantRepository::new(pool.clone());
        for id in ids {
            repo.save(Tenant::new(*id, "Test Tenant")).await.expect("seed tenant");
        }
    }
}
