//! Xata dialect
//!
//! Xata's Postgres endpoints are close to stock; EXCLUDE constraints are
//! rejected by the branch engine and file-backed columns carry
//! branch-local storage semantics.

use std::collections::HashMap;
use std::sync::Arc;

use crate::diagnostics::DiagnosticCode;
use crate::dialect::{
    BlockedFeatures, Dialect, DialectAdapter, DialectFeatures, DialectProfile, TypeMapping,
};

pub fn profile() -> DialectProfile {
    let mut type_map: HashMap<&'static str, TypeMapping> = HashMap::new();
    type_map.insert(
        "xata_file",
        TypeMapping::warning(
            "file",
            DiagnosticCode::XataW001,
            "file columns are stored per branch and do not replicate on branch copy",
        ),
    );
    type_map.insert(
        "xata_file_array",
        TypeMapping::warning(
            "file",
            DiagnosticCode::XataW001,
            "file columns are stored per branch and do not replicate on branch copy",
        ),
    );

    DialectProfile {
        dialect: Dialect::Xata,
        features: DialectFeatures {
            supports_foreign_tables: false,
            ..DialectFeatures::postgres()
        },
        type_map,
        blocked: BlockedFeatures {
            exclude_constraints: Some(DiagnosticCode::XataE001),
            ..BlockedFeatures::default()
        },
    }
}

pub struct XataAdapter {
    profile: DialectProfile,
}

impl XataAdapter {
    pub fn new() -> Self {
        Self { profile: profile() }
    }
}

impl Default for XataAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl DialectAdapter for XataAdapter {
    fn dialect(&self) -> Dialect {
        Dialect::Xata
    }

    fn profile(&self) -> &DialectProfile {
        &self.profile
    }
}

pub fn adapter() -> Arc<dyn DialectAdapter> {
    Arc::new(XataAdapter::new())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialect::TypeSupport;

    #[test]
    fn test_xata_blocks_exclude() {
        let profile = profile();
        assert_eq!(profile.blocked.exclude_constraints, Some(DiagnosticCode::XataE001));
    }

    #[test]
    fn test_file_type_warns() {
        let profile = profile();
        let mapping = profile.lookup_type("xata_file").unwrap();
        assert_eq!(mapping.status, TypeSupport::Warning);
    }
}
