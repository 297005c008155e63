// crates/flowgate-core/src/error.rs
// ============================================================================
// Module: Flowgate Error Kinds
// Description: The platform-wide error taxonomy mapped to HTTP at the edge.
// Purpose: Give every layer one stable vocabulary for failure.
// Dependencies: thiserror
// ============================================================================

//! ## Overview
//! [`ApiError`] is the taxonomy every Flowgate layer speaks. Interior layers
//! construct the semantically right variant; only the HTTP boundary decides
//! status codes. Provider transport failures split into
//! [`ApiError::UpstreamUnavailable`] (network) and [`ApiError::Timeout`]
//! (deadline); provider protocol errors are data, not errors.

// ============================================================================
// SECTION: Imports
// ============================================================================

use thiserror::Error;

use crate::interfaces::StoreError;

// ============================================================================
// SECTION: Error Kinds
// ============================================================================

/// Platform-wide error taxonomy.
///
/// # Invariants
/// - Variants are stable for programmatic handling and HTTP mapping.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Missing or invalid session.
    #[error("unauthenticated: {0}")]
    Unauthenticated(String),
    /// Authenticated but not permitted.
    #[error("forbidden: {0}")]
    Forbidden(String),
    /// Target entity does not exist in the caller's scope.
    #[error("not found: {0}")]
    NotFound(String),
    /// A uniqueness or state conflict.
    #[error("conflict: {0}")]
    Conflict(String),
    /// Request payload failed validation.
    #[error("validation: {0}")]
    Validation(String),
    /// The caller exhausted its hourly quota.
    #[error("rate limited; retry after {retry_after_secs}s")]
    RateLimited {
        /// Seconds until the window opens again.
        retry_after_secs: u64,
    },
    /// An upstream provider was unreachable.
    #[error("upstream unavailable: {0}")]
    UpstreamUnavailable(String),
    /// An outbound call exceeded its deadline.
    #[error("timeout: {0}")]
    Timeout(String),
    /// A stored or submitted graph is not executable.
    #[error("invalid graph: {0}")]
    InvalidGraph(String),
    /// Unexpected internal failure.
    #[error("internal error: {0}")]
    Internal(String),
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(what) => Self::NotFound(what),
            StoreError::Conflict(what) => Self::Conflict(what),
            StoreError::Serialization(detail) | StoreError::Backend(detail) => {
                Self::Internal(detail)
            }
        }
    }
}
