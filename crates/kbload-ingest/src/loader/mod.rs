//! Database mutation seam
//!
//! The only two destructive steps of a run: removing the previous load's
//! rows, and bulk-copying the new BCP files in. Both happen after every
//! in-memory check has passed.

#[cfg(feature = "database")]
pub mod postgres;

use crate::error::Result;
use async_trait::async_trait;
use std::fmt;
use std::path::Path;

#[cfg(feature = "database")]
pub use postgres::PgLoadTarget;

/// Rows a previous run of the same load created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeleteScope {
    /// Every row of `table` created by `user_key`
    CreatedBy { table: &'static str, user_key: i64 },
    /// Every row of `table` whose reference key is one of `refs_keys`
    References { table: &'static str, refs_keys: Vec<i64> },
}

impl fmt::Display for DeleteScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeleteScope::CreatedBy { table, user_key } => {
                write!(f, "{table} created by user {user_key}")
            },
            DeleteScope::References { table, refs_keys } => {
                let keys: Vec<String> = refs_keys.iter().map(i64::to_string).collect();
                write!(f, "{table} with reference in ({})", keys.join(", "))
            },
        }
    }
}

#[async_trait]
pub trait LoadTarget: Send + Sync {
    /// Delete the previous load's rows; returns how many went.
    async fn delete_prior(&self, scope: &DeleteScope) -> Result<u64>;

    /// Copy a finished tab-delimited file into `table`.
    async fn bulk_load(&self, table: &str, file: &Path) -> Result<u64>;
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_scope_display() {
        let scope = DeleteScope::References {
            table: "MRK_StrainMarker",
            refs_keys: vec![282407, 282660],
        };
        assert_eq!(scope.to_string(), "MRK_StrainMarker with reference in (282407, 282660)");

        let scope = DeleteScope::CreatedBy {
            table: "MGI_Relationship",
            user_key: 1576,
        };
        assert_eq!(scope.to_string(), "MGI_Relationship created by user 1576");
    }
}
