use chrono::Utc;

use parley_core::domain::message::{Message, Sender};
use parley_core::domain::session::{ParticipantId, Session, SessionId};
use parley_core::domain::tenant::{Tenant, TenantId};
use parley_core::domain::ticket::{EscalationTicket, TicketStatus};
use parley_db::repositories::{
    MessageRepository, SessionRepository, SqlMessageRepository, SqlSessionRepository,
    SqlTenantRepository, SqlTicketRepository, TenantRepository, TicketRepository,
};
use parley_db::{connect_with_settings, migrations, DbPool};

async fn migrated_pool() -> DbPool {
    let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
    migrations::run_pending(&pool).await.expect("migrate");
    pool
}

async fn seed_tenant(pool: &DbPool, id: &str) -> Tenant {
    let mut tenant = Tenant::new(id, "Acme Support");
    tenant.intents = vec!["Order Status".to_string(), "Returns".to_string()];
    tenant.escalation_enabled = true;
    tenant.escalation_recipients = vec!["ops@acme.test".to_string()];
    SqlTenantRepository::new(pool.clone()).save(tenant.clone()).await.expect("save tenant");
    tenant
}

async fn seed_session(pool: &DbPool, tenant: &Tenant, id: &str) -> Session {
    let session = Session::new(
        SessionId(id.to_string()),
        tenant.id.clone(),
        ParticipantId("p-1".to_string()),
    );
    SqlSessionRepository::new(pool.clone()).save(session.clone()).await.expect("save session");
    session
}

#[tokio::test]
async fn tenant_round_trip_preserves_taxonomy_and_recipients() {
    let pool = migrated_pool().await;
    let tenant = seed_tenant(&pool, "t-1").await;

    let found = SqlTenantRepository::new(pool.clone())
        .find_by_id(&tenant.id)
        .await
        .expect("find")
        .expect("tenant exists");

    assert_eq!(found.name, "Acme Support");
    assert_eq!(found.intents, vec!["Order Status", "Returns"]);
    assert!(found.escalation_enabled);
    assert_eq!(found.escalation_recipients, vec!["ops@acme.test"]);

    pool.close().await;
}

#[tokio::test]
async fn session_upsert_never_overwrites_first_response_latency() {
    let pool = migrated_pool().await;
    let tenant = seed_tenant(&pool, "t-1").await;
    let repo = SqlSessionRepository::new(pool.clone());

    let mut session = seed_session(&pool, &tenant, "s-1").await;
    session.record_turn(Utc::now(), Utc::now() + chrono::Duration::milliseconds(800));
    repo.save(session.clone()).await.expect("save first turn");

    // A later save with a different latency value must lose to the stored one.
    session.first_response_latency_seconds = Some(42.0);
    repo.save(session.clone()).await.expect("save second turn");

    let found = repo.find_by_id(&session.id).await.expect("find").expect("exists");
    assert_eq!(found.first_response_latency_seconds, Some(0.8));

    pool.close().await;
}

#[tokio::test]
async fn analysis_update_is_idempotent_last_write_wins() {
    let pool = migrated_pool().await;
    let tenant = seed_tenant(&pool, "t-1").await;
    let session = seed_session(&pool, &tenant, "s-1").await;
    let repo = SqlSessionRepository::new(pool.clone());

    let stamp = Utc::now();
    assert!(repo.update_analysis(&session.id, "one", "Support", stamp).await.expect("first"));
    assert!(repo.update_analysis(&session.id, "two", "Sales", stamp).await.expect("second"));

    let found = repo.find_by_id(&session.id).await.expect("find").expect("exists");
    assert_eq!(found.summary.as_deref(), Some("two"));
    assert_eq!(found.intent.as_deref(), Some("Sales"));
    assert!(found.summary_generated_at.is_some());

    assert!(!repo
        .update_analysis(&SessionId("missing".to_string()), "x", "y", stamp)
        .await
        .expect("missing session update"));

    pool.close().await;
}

#[tokio::test]
async fn transcript_comes_back_in_chronological_order() {
    let pool = migrated_pool().await;
    let tenant = seed_tenant(&pool, "t-1").await;
    let session = seed_session(&pool, &tenant, "s-1").await;
    let repo = SqlMessageRepository::new(pool.clone());

    let mut inbound = Message::new(
        session.id.clone(),
        session.participant_id.clone(),
        Sender::Participant,
        "where is my order?",
    );
    inbound.created_at = Utc::now() - chrono::Duration::seconds(5);
    let outbound = Message::new(
        session.id.clone(),
        session.participant_id.clone(),
        Sender::Agent,
        "let me check that for you",
    );

    repo.append(outbound.clone()).await.expect("append outbound");
    repo.append(inbound.clone()).await.expect("append inbound");

    let listed = repo.list_for_session(&session.id).await.expect("list");
    assert_eq!(listed.len(), 2);
    assert_eq!(listed[0].sender, Sender::Participant);
    assert_eq!(listed[1].sender, Sender::Agent);

    pool.close().await;
}

#[tokio::test]
async fn ticket_transitions_are_forward_only_in_sql() {
    let pool = migrated_pool().await;
    let tenant = seed_tenant(&pool, "t-1").await;
    let session = seed_session(&pool, &tenant, "s-1").await;
    let repo = SqlTicketRepository::new(pool.clone());

    let ticket = EscalationTicket::new(
        tenant.id.clone(),
        session.id.clone(),
        "frustrated: where is my refund?",
    );
    repo.save(ticket.clone()).await.expect("save ticket");

    assert!(repo.update_status(&ticket.id, TicketStatus::InProgress).await.expect("forward"));
    assert!(repo.update_status(&ticket.id, TicketStatus::Resolved).await.expect("forward again"));
    assert!(!repo.update_status(&ticket.id, TicketStatus::Pending).await.expect("backward"));

    let listed = repo.list_for_session(&session.id).await.expect("list");
    assert_eq!(listed[0].status, TicketStatus::Resolved);

    pool.close().await;
}

#[tokio::test]
async fn multiple_tickets_per_session_are_permitted() {
    let pool = migrated_pool().await;
    let tenant = seed_tenant(&pool, "t-1").await;
    let session = seed_session(&pool, &tenant, "s-1").await;
    let repo = SqlTicketRepository::new(pool.clone());

    let first = EscalationTicket::new(tenant.id.clone(), session.id.clone(), "first trigger");
    let second = EscalationTicket::new(tenant.id.clone(), session.id.clone(), "second trigger");
    repo.save(first).await.expect("save first");
    repo.save(second).await.expect("save second");

    let listed = repo.list_for_session(&session.id).await.expect("list");
    assert_eq!(listed.len(), 2);

    pool.close().await;
}
