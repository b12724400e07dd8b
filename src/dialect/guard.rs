//! Capability guards for query-layer collaborators
//!
//! The query builder calls these before emitting SQL that depends on an
//! optional engine capability. Failures carry the suggestion string the
//! CLI prints under the one-line reason.

use crate::dialect::{Dialect, DialectFeatures};
use crate::error::SyncError;

/// Query capabilities that vary across the supported engines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    Returning,
    Lateral,
    DistinctOn,
    ForUpdateSkipLocked,
    Cursors,
}

impl Capability {
    pub fn as_sql(&self) -> &'static str {
        match self {
            Self::Returning => "RETURNING",
            Self::Lateral => "LATERAL",
            Self::DistinctOn => "DISTINCT ON",
            Self::ForUpdateSkipLocked => "FOR UPDATE SKIP LOCKED",
            Self::Cursors => "cursors",
        }
    }

    fn supported(&self, features: &DialectFeatures) -> bool {
        match self {
            Self::Returning => features.supports_returning,
            Self::Lateral => features.supports_lateral,
            Self::DistinctOn => features.supports_distinct_on,
            Self::ForUpdateSkipLocked => features.supports_for_update_skip_locked,
            Self::Cursors => features.supports_cursors,
        }
    }

    fn suggestion(&self) -> &'static str {
        match self {
            Self::Returning => "Fetch the affected rows with a follow-up SELECT",
            Self::Lateral => "Use separate queries for one-to-many relationships",
            Self::DistinctOn => "Use GROUP BY with an aggregate, or a window function",
            Self::ForUpdateSkipLocked => "Use plain FOR UPDATE and handle lock waits",
            Self::Cursors => "Use keyset pagination with LIMIT batches",
        }
    }
}

/// Fail with a compatibility error when the dialect lacks `capability`.
pub fn ensure_supported(
    dialect: Dialect,
    features: &DialectFeatures,
    capability: Capability,
) -> Result<(), SyncError> {
    if capability.supported(features) {
        return Ok(());
    }
    Err(SyncError::Compatibility {
        dialect,
        feature: capability.as_sql().to_string(),
        suggestion: Some(capability.suggestion().to_string()),
    })
}
