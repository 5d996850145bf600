//! Route table

use crate::health;
use crate::state::AppState;
use crate::versioning::{ApiVersion, VersionedApiBuilder};

/// Base path of every versioned route
pub const API_BASE_PATH: &str = "/api";

/// Versioned API routes: `/api/v1/health` and `/api/v1/health/culture`
pub fn versioned_api() -> VersionedApiBuilder<AppState> {
    VersionedApiBuilder::new()
        .with_base_path(API_BASE_PATH)
        .add_version(ApiVersion::V1, health::routes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_v1_registered_under_api() {
        let api = versioned_api();
        assert_eq!(api.base_path(), API_BASE_PATH);
        assert!(api.has_version(ApiVersion::V1));
        assert_eq!(api.version_count(), 1);
    }
}
