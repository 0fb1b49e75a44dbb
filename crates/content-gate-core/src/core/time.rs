// content-gate-core/src/core/time.rs
// ============================================================================
// Module: Content Gate Time Model
// Description: Canonical timestamp representation for records and audit events.
// Purpose: Keep every persisted time value in one comparable, serializable form.
// Dependencies: serde, time
// ============================================================================

//! ## Overview
//! Timestamps are unix epoch milliseconds. Runtime services never read the
//! wall clock directly; they ask a [`crate::interfaces::Clock`] so tests can
//! pin or advance time.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;

use serde::Deserialize;
use serde::Serialize;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

// ============================================================================
// SECTION: Time Values
// ============================================================================

/// Unix epoch milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Timestamp(i64);

impl Timestamp {
    /// Unix epoch.
    pub const EPOCH: Self = Self(0);

    /// Creates a timestamp from unix milliseconds.
    #[must_use]
    pub const fn from_unix_millis(millis: i64) -> Self {
        Self(millis)
    }

    /// Returns the timestamp as unix milliseconds.
    #[must_use]
    pub const fn as_unix_millis(self) -> i64 {
        self.0
    }

    /// Returns this timestamp shifted forward by `millis`, saturating at the bounds.
    #[must_use]
    pub const fn saturating_add_millis(self, millis: i64) -> Self {
        Self(self.0.saturating_add(millis))
    }

    /// Returns this timestamp shifted backward by `millis`, saturating at the bounds.
    #[must_use]
    pub const fn saturating_sub_millis(self, millis: i64) -> Self {
        Self(self.0.saturating_sub(millis))
    }

    /// Formats the timestamp as RFC 3339 in UTC.
    ///
    /// Returns `None` when the value is outside the representable calendar range.
    #[must_use]
    pub fn to_rfc3339(self) -> Option<String> {
        let nanos = i128::from(self.0) * 1_000_000;
        OffsetDateTime::from_unix_timestamp_nanos(nanos).ok()?.format(&Rfc3339).ok()
    }

    /// Parses an RFC 3339 string into a timestamp.
    #[must_use]
    pub fn parse_rfc3339(value: &str) -> Option<Self> {
        let parsed = OffsetDateTime::parse(value, &Rfc3339).ok()?;
        let millis = parsed.unix_timestamp_nanos() / 1_000_000;
        i64::try_from(millis).ok().map(Self)
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.to_rfc3339() {
            Some(value) => f.write_str(&value),
            None => write!(f, "{}ms", self.0),
        }
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================
