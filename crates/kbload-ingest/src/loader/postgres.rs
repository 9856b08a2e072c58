//! Postgres deletes and `COPY ... FROM STDIN` bulk loading

use super::{DeleteScope, LoadTarget};
use crate::error::{LoadError, Result};
use async_trait::async_trait;
use sqlx::postgres::PgPoolCopyExt;
use sqlx::PgPool;
use std::path::Path;
use tracing::info;

/// Table names and key columns come from compile-time constants, never input.
pub struct PgLoadTarget {
    pool: PgPool,
}

impl PgLoadTarget {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl LoadTarget for PgLoadTarget {
    async fn delete_prior(&self, scope: &DeleteScope) -> Result<u64> {
        let result = match scope {
            DeleteScope::CreatedBy { table, user_key } => {
                let sql = format!("DELETE FROM {table} WHERE _CreatedBy_key = $1");
                sqlx::query(&sql).bind(*user_key).execute(&self.pool).await?
            },
            DeleteScope::References { table, refs_keys } => {
                let sql = format!("DELETE FROM {table} WHERE _Refs_key = ANY($1)");
                sqlx::query(&sql).bind(refs_keys.as_slice()).execute(&self.pool).await?
            },
        };

        info!(scope = %scope, deleted = result.rows_affected(), "Deleted prior load rows");
        Ok(result.rows_affected())
    }

    async fn bulk_load(&self, table: &str, file: &Path) -> Result<u64> {
        let data = tokio::fs::read(file)
            .await
            .map_err(|e| LoadError::io(file, e))?;

        let statement = format!("COPY {table} FROM STDIN WITH (FORMAT text, DELIMITER E'\\t', NULL '')");
        let mut copy = self
            .pool
            .copy_in_raw(&statement)
            .await
            .map_err(|e| LoadError::bulk_load(table, e))?;

        copy.send(data)
            .await
            .map_err(|e| LoadError::bulk_load(table, e))?;
        let rows = copy
            .finish()
            .await
            .map_err(|e| LoadError::bulk_load(table, e))?;

        info!(table = %table, rows, file = %file.display(), "Bulk loaded");
        Ok(rows)
    }
}
