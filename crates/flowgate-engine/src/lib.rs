// crates/flowgate-engine/src/lib.rs
// ============================================================================
// Module: Flowgate Engine
// Description: Graph interpretation, scheduling, and execution persistence.
// Purpose: Turn stored flow versions into executed, fully recorded runs.
// Dependencies: flowgate-core, flowgate-providers, tokio, serde_json, tracing
// ============================================================================

//! ## Overview
//! The engine loads the latest version of a flow, derives the sequential
//! Kahn plan, and interprets nodes one at a time: one execution step per
//! node, inputs gathered from predecessor outputs, logs appended as it goes.
//! Failure is fail-fast (no engine-level retry, no compensation); a node
//! failure fails the execution and remaining nodes are recorded as skipped.
//! Cancellation is cooperative, observed between nodes. Shutdown drains
//! in-flight executions for a grace window and fails survivors.
//!
//! Invariants:
//! - The execution row is committed before any node runs; the start call
//!   returns without waiting for completion.
//! - Terminal execution states are sticky.
//! - The per-execution output map is owned by the driving task and never
//!   shared.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod eval;
pub mod runner;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use eval::apply_transform;
pub use eval::evaluate_condition;
pub use runner::EngineSettings;
pub use runner::ExecutionRunner;
pub use runner::StartedExecution;
