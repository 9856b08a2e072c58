//! Live snapshot queries against the reference database

use super::{
    BiotypeRow, ChromosomeRow, EnsemblMarkerRow, KeyedTable, MarkerRow, SnapshotSource,
    StrainTranslationRow, TermRow, VocabularyScope,
};
use crate::error::{LoadError, Result};
use async_trait::async_trait;
use sqlx::PgPool;

/// MGI type of vocabulary term objects.
const TERM_MGI_TYPE_KEY: i64 = 13;
/// MGI type of marker objects.
const MARKER_MGI_TYPE_KEY: i64 = 2;
const MGI_LOGICAL_DB_KEY: i64 = 1;
const ENSEMBL_LOGICAL_DB_KEY: i64 = 60;
const MOUSE_ORGANISM_KEY: i64 = 1;
const STRAIN_TRANSLATION_TYPE_KEY: i64 = 1021;
const MGP_BIOTYPE_VOCAB_KEY: i64 = 136;
const FEATURE_TYPE_VOCAB_KEY: i64 = 79;

pub struct PgSnapshotSource {
    pool: PgPool,
}

impl PgSnapshotSource {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn wrap(what: &str, err: sqlx::Error) -> LoadError {
        LoadError::Snapshot(format!("{what}: {err}"))
    }
}

#[async_trait]
impl SnapshotSource for PgSnapshotSource {
    async fn vocabulary_terms(&self, scope: &VocabularyScope) -> Result<Vec<TermRow>> {
        sqlx::query_as::<_, TermRow>(
            r#"
            SELECT a.accid,
                   t._term_key::bigint AS term_key,
                   t.isobsolete = 1 AS is_obsolete,
                   a.preferred = 1 AS preferred
            FROM voc_term t
            JOIN acc_accession a ON a._object_key = t._term_key
            WHERE t._vocab_key = $1
              AND a._mgitype_key = $2
              AND a._logicaldb_key = $3
              AND ($4 = false OR a.preferred = 1)
            "#,
        )
        .bind(scope.vocab_key)
        .bind(TERM_MGI_TYPE_KEY)
        .bind(scope.logical_db_key)
        .bind(scope.preferred_only)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| Self::wrap(&format!("{} terms", scope.name), e))
    }

    async fn max_key(&self, table: KeyedTable) -> Result<Option<i64>> {
        // table and column come from compile-time constants
        let sql = format!("SELECT max({})::bigint FROM {}", table.key_column, table.table);
        sqlx::query_scalar::<_, Option<i64>>(&sql)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| Self::wrap(table.table, e))
    }

    async fn strain_translations(&self) -> Result<Vec<StrainTranslationRow>> {
        sqlx::query_as::<_, StrainTranslationRow>(
            r#"
            SELECT t.badname AS bad_name,
                   t._object_key::bigint AS strain_key,
                   s.strain
            FROM mgi_translation t
            JOIN prb_strain s ON s._strain_key = t._object_key
            WHERE t._translationtype_key = $1
            "#,
        )
        .bind(STRAIN_TRANSLATION_TYPE_KEY)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| Self::wrap("strain translations", e))
    }

    async fn markers(&self) -> Result<Vec<MarkerRow>> {
        sqlx::query_as::<_, MarkerRow>(
            r#"
            SELECT a.accid AS mgi_id,
                   m._marker_key::bigint AS marker_key,
                   m.symbol,
                   s.status,
                   a.preferred = 1 AS preferred
            FROM acc_accession a
            JOIN mrk_marker m ON m._marker_key = a._object_key
            JOIN mrk_status s ON s._marker_status_key = m._marker_status_key
            WHERE a._mgitype_key = $1
              AND a._logicaldb_key = $2
              AND a.prefixpart = 'MGI:'
              AND m._organism_key = $3
            "#,
        )
        .bind(MARKER_MGI_TYPE_KEY)
        .bind(MGI_LOGICAL_DB_KEY)
        .bind(MOUSE_ORGANISM_KEY)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| Self::wrap("markers", e))
    }

    async fn ensembl_markers(&self) -> Result<Vec<EnsemblMarkerRow>> {
        sqlx::query_as::<_, EnsemblMarkerRow>(
            r#"
            SELECT a1.accid AS ensembl_id, a2.accid AS mgi_id
            FROM acc_accession a1
            JOIN acc_accession a2 ON a2._object_key = a1._object_key
            WHERE a1._mgitype_key = $1
              AND a1._logicaldb_key = $2
              AND a2._mgitype_key = $1
              AND a2._logicaldb_key = $3
              AND a2.preferred = 1
              AND a2.prefixpart = 'MGI:'
            ORDER BY a1.accid, a2.accid
            "#,
        )
        .bind(MARKER_MGI_TYPE_KEY)
        .bind(ENSEMBL_LOGICAL_DB_KEY)
        .bind(MGI_LOGICAL_DB_KEY)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| Self::wrap("Ensembl associations", e))
    }

    async fn chromosomes(&self) -> Result<Vec<ChromosomeRow>> {
        sqlx::query_as::<_, ChromosomeRow>(
            r#"
            SELECT chromosome, _chromosome_key::bigint AS chromosome_key
            FROM mrk_chromosome
            WHERE _organism_key = $1
            "#,
        )
        .bind(MOUSE_ORGANISM_KEY)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| Self::wrap("chromosomes", e))
    }

    async fn biotype_mappings(&self) -> Result<Vec<BiotypeRow>> {
        sqlx::query_as::<_, BiotypeRow>(
            r#"
            SELECT t1.term AS raw_biotype, t2.term AS feature_type
            FROM mrk_biotypemapping m
            JOIN voc_term t1 ON t1._term_key = m._biotypeterm_key
            JOIN voc_term t2 ON t2._term_key = m._primarymcvterm_key
            WHERE t1._vocab_key = $1
            "#,
        )
        .bind(MGP_BIOTYPE_VOCAB_KEY)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| Self::wrap("biotype mappings", e))
    }

    async fn feature_types(&self) -> Result<Vec<String>> {
        sqlx::query_scalar::<_, String>("SELECT term FROM voc_term WHERE _vocab_key = $1")
            .bind(FEATURE_TYPE_VOCAB_KEY)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| Self::wrap("feature types", e))
    }
}
