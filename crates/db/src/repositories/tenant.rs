use secrecy::ExposeSecret;
use sqlx::Row;

use parley_core::domain::tenant::{Tenant, TenantId};

use super::{RepositoryError, TenantRepository};
use crate::DbPool;

pub struct SqlTenantRepository {
    pool: DbPool,
}

impl SqlTenantRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl TenantRepository for SqlTenantRepository {
    async fn find_by_id(&self, id: &TenantId) -> Result<Option<Tenant>, RepositoryError> {
        let row = sqlx::query(
            "SELECT id, name, agent_instruction, intents, escalation_enabled, \
             escalation_recipients, api_key \
             FROM tenants WHERE id = ?1",
        )
        .bind(&id.0)
        .fetch_optional(&self.pool)
        .await?;

        row.map(decode_tenant).transpose()
    }

    async fn save(&self, tenant: Tenant) -> Result<(), RepositoryError> {
        let intents = serde_json::to_string(&tenant.intents)
            .map_err(|err| RepositoryError::Decode(err.to_string()))?;
        let recipients = serde_json::to_string(&tenant.escalation_recipients)
            .map_err(|err| RepositoryError::Decode(err.to_string()))?;

        sqlx::query(
            "INSERT INTO tenants \
             (id, name, agent_instruction, intents, escalation_enabled, escalation_recipients, api_key) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7) \
             ON CONFLICT(id) DO UPDATE SET \
             name = excluded.name, \
             agent_instruction = excluded.agent_instruction, \
             intents = excluded.intents, \
             escalation_enabled = excluded.escalation_enabled, \
             escalation_recipients = excluded.escalation_recipients, \
             api_key = excluded.api_key",
        )
        .bind(&tenant.id.0)
        .bind(&tenant.name)
        .bind(&tenant.agent_instruction)
        .bind(intents)
        .bind(tenant.escalation_enabled)
        .bind(recipients)
        .bind(tenant.api_key.as_ref().map(|key| key.expose_secret().to_string()))
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

fn decode_tenant(row: sqlx::sqlite::SqliteRow) -> Result<Tenant, RepositoryError> {
    let intents_raw: String = row.get("intents");
    let recipients_raw: String = row.get("escalation_recipients");

    let intents: Vec<String> = serde_json::from_str(&intents_raw)
        .map_err(|err| RepositoryError::Decode(format!("tenants.intents: {err}")))?;
    let escalation_recipients: Vec<String> = serde_json::from_str(&recipients_raw)
        .map_err(|err| RepositoryError::Decode(format!("tenants.escalation_recipients: {err}")))?;

    Ok(Tenant {
        id: TenantId(row.get("id")),
        name: row.get("name"),
        agent_instruction: row.get("agent_instruction"),
        intents,
        escalation_enabled: row.get("escalation_enabled"),
        escalation_recipients,
        api_key: row.get::<Option<String>, _>("api_key").map(Into::into),
    })
}
