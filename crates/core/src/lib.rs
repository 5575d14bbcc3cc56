//! Domain model, configuration, and error taxonomy for the parley engine.
//!
//! This crate is deliberately free of I/O: persistence lives in `parley-db`,
//! retrieval in `parley-retrieval`, and the conversational runtime in
//! `parley-agent`. Everything here is plain data plus the invariants the
//! rest of the system leans on:
//!
//! - every indexed chunk, session, and ticket is partitioned by `TenantId`
//! - `Session::first_response_latency_seconds` is written at most once
//! - `EscalationTicket` status only moves forward
//!
//! # Key Types
//!
//! - `AppConfig` - layered file/env/override configuration (see `config`)
//! - `CoreError` - the shared failure taxonomy (see `errors`)
//! - `domain::*` - tenants, sessions, messages, tickets, chunks

pub mod config;
pub mod domain;
pub mod errors;
