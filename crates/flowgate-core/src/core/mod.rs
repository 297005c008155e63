// crates/flowgate-core/src/core/mod.rs
// ============================================================================
// Module: Flowgate Core Domain
// Description: Domain submodules for identifiers, entities, graphs, and time.
// Purpose: Group the pure domain model under one namespace.
// Dependencies: serde, serde_json, uuid, time
// ============================================================================

//! ## Overview
//! The `core` namespace holds the pure domain model: strongly typed
//! identifiers, tenancy and flow entities, the graph model with its execution
//! planner, and canonical timestamps. Nothing here performs I/O.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod execution;
pub mod flow;
pub mod graph;
pub mod identifiers;
pub mod integration;
pub mod org;
pub mod policy;
pub mod time;
