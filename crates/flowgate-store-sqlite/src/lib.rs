// crates/flowgate-store-sqlite/src/lib.rs
// ============================================================================
// Module: Flowgate SQLite Store
// Description: Durable store implementation over SQLite WAL.
// Purpose: Persist the full Flowgate data model behind the core store traits.
// Dependencies: flowgate-core, rusqlite, serde_json, thiserror
// ============================================================================

//! ## Overview
//! This crate implements every `flowgate-core` store trait over one SQLite
//! database file. Writes go through a single mutex-guarded connection with
//! WAL journaling and a busy timeout; ownership cascades follow the §3 data
//! model (org → users/flows/integrations/notifications, flow → versions,
//! execution → steps → logs). Notification and integration writes publish
//! org-scoped events through the injected sink, which is the platform's
//! re-architected LISTEN/NOTIFY bridge.
//!
//! Security posture: stored payloads are untrusted on read; corrupt JSON or
//! unknown status labels fail closed with a serialization error.

// ============================================================================
// SECTION: Modules
// ============================================================================

mod store;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use store::SqliteStore;
pub use store::SqliteStoreConfig;
