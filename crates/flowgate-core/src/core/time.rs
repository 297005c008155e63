// crates/flowgate-core/src/core/time.rs
// ============================================================================
// Module: Flowgate Time Model
// Description: Canonical unix-millisecond timestamps for rows and logs.
// Purpose: Provide one timestamp representation across all Flowgate records.
// Dependencies: serde, time
// ============================================================================

//! ## Overview
//! Flowgate stores every instant as unix epoch milliseconds. [`Timestamp`] is
//! the only time representation that crosses crate boundaries; formatting for
//! humans happens at the presentation edge. Millisecond precision is enough
//! for step timing and rate accounting, and keeps SQLite columns as plain
//! integers.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;

use serde::Deserialize;
use serde::Serialize;
use time::OffsetDateTime;

// ============================================================================
// SECTION: Timestamp
// ============================================================================

/// Milliseconds in one second.
const MILLIS_PER_SECOND: i64 = 1_000;
/// Nanoseconds in one millisecond.
const NANOS_PER_MILLI: i128 = 1_000_000;

/// Canonical unix-millisecond timestamp.
///
/// # Invariants
/// - Wire and stored form is a signed 64-bit millisecond count since the
///   unix epoch; values before the epoch are representable but never produced
///   by [`Timestamp::now`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Timestamp(i64);

impl Timestamp {
    /// Returns the current wall-clock instant.
    #[must_use]
    pub fn now() -> Self {
        let nanos = OffsetDateTime::now_utc().unix_timestamp_nanos();
        Self(i64::try_from(nanos / NANOS_PER_MILLI).unwrap_or(i64::MAX))
    }

    /// Wraps a raw unix-millisecond value.
    #[must_use]
    pub const fn from_unix_millis(millis: i64) -> Self {
        Self(millis)
    }

    /// Returns the raw unix-millisecond value.
    #[must_use]
    pub const fn as_unix_millis(self) -> i64 {
        self.0
    }

    /// Returns this instant shifted forward by `millis` (saturating).
    #[must_use]
    pub const fn saturating_add_millis(self, millis: i64) -> Self {
        Self(self.0.saturating_add(millis))
    }

    /// Returns this instant shifted backward by `millis` (saturating).
    #[must_use]
    pub const fn saturating_sub_millis(self, millis: i64) -> Self {
        Self(self.0.saturating_sub(millis))
    }

    /// Returns the signed millisecond distance from `earlier` to `self`.
    #[must_use]
    pub const fn millis_since(self, earlier: Self) -> i64 {
        self.0.saturating_sub(earlier.0)
    }

    /// Returns the whole seconds component, rounding toward negative infinity.
    #[must_use]
    pub const fn as_unix_seconds(self) -> i64 {
        self.0.div_euclid(MILLIS_PER_SECOND)
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}
