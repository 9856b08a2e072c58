//! Offline snapshot source
//!
//! A JSON export of the reference rows, used for QC-only runs away from the
//! database and for tests:
//!
//! ```json
//! {
//!   "vocabularies": { "MP": [{"accid": "MP:0000001", "term_key": 1, "is_obsolete": false, "preferred": true}] },
//!   "max_keys": { "MGI_Relationship": 5000 },
//!   "strain_marker": { "strains": [], "markers": [] }
//! }
//! ```

use super::{
    BiotypeRow, ChromosomeRow, EnsemblMarkerRow, KeyedTable, MarkerRow, SnapshotSource,
    StrainMarkerRows, StrainTranslationRow, TermRow, VocabularyScope,
};
use crate::error::{LoadError, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FileSnapshotSource {
    #[serde(default)]
    pub vocabularies: HashMap<String, Vec<TermRow>>,
    #[serde(default)]
    pub max_keys: HashMap<String, i64>,
    #[serde(default)]
    pub strain_marker: StrainMarkerRows,
}

impl FileSnapshotSource {
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| LoadError::io(path, e))?;
        serde_json::from_str(&content).map_err(|e| {
            LoadError::Snapshot(format!("{}: {}", path.display(), e))
        })
    }
}

#[async_trait]
impl SnapshotSource for FileSnapshotSource {
    async fn vocabulary_terms(&self, scope: &VocabularyScope) -> Result<Vec<TermRow>> {
        let rows = self.vocabularies.get(&scope.name).ok_or_else(|| {
            LoadError::Snapshot(format!("vocabulary {} missing from snapshot export", scope.name))
        })?;

        Ok(rows
            .iter()
            .filter(|row| !scope.preferred_only || row.preferred)
            .cloned()
            .collect())
    }

    async fn max_key(&self, table: KeyedTable) -> Result<Option<i64>> {
        Ok(self.max_keys.get(table.table).copied())
    }

    async fn strain_translations(&self) -> Result<Vec<StrainTranslationRow>> {
        Ok(self.strain_marker.strains.clone())
    }

    async fn markers(&self) -> Result<Vec<MarkerRow>> {
        Ok(self.strain_marker.markers.clone())
    }

    async fn ensembl_markers(&self) -> Result<Vec<EnsemblMarkerRow>> {
        Ok(self.strain_marker.ensembl_markers.clone())
    }

    async fn chromosomes(&self) -> Result<Vec<ChromosomeRow>> {
        Ok(self.strain_marker.chromosomes.clone())
    }

    async fn biotype_mappings(&self) -> Result<Vec<BiotypeRow>> {
        Ok(self.strain_marker.biotypes.clone())
    }

    async fn feature_types(&self) -> Result<Vec<String>> {
        Ok(self.strain_marker.feature_types.clone())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::snapshot::{SnapshotLoader, RELATIONSHIP_TABLE};

    fn scope(name: &str, preferred_only: bool) -> VocabularyScope {
        VocabularyScope {
            name: name.to_string(),
            vocab_key: 5,
            logical_db_key: 34,
            preferred_only,
        }
    }

    fn export() -> FileSnapshotSource {
        serde_json::from_str(
            r#"{
                "vocabularies": {
                    "MP": [
                        {"accid": "MP:0000001", "term_key": 10, "is_obsolete": false, "preferred": true},
                        {"accid": "MP:0000002", "term_key": 10, "is_obsolete": false, "preferred": false}
                    ],
                    "EMAPA": [
                        {"accid": "EMAPA:16039", "term_key": 20, "is_obsolete": false, "preferred": true}
                    ]
                },
                "max_keys": {"MGI_Relationship": 5000}
            }"#,
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_preferred_only_scope_filters_secondary_ids() {
        let source = export();
        let rows = source.vocabulary_terms(&scope("MP", true)).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].accid, "MP:0000001");

        let rows = source.vocabulary_terms(&scope("MP", false)).await.unwrap();
        assert_eq!(rows.len(), 2);
    }

    #[tokio::test]
    async fn test_missing_vocabulary_is_an_error() {
        let source = export();
        assert!(source.vocabulary_terms(&scope("GO", false)).await.is_err());
    }

    #[tokio::test]
    async fn test_relationship_snapshot_next_key() {
        let source = export();
        assert_eq!(source.max_key(RELATIONSHIP_TABLE).await.unwrap(), Some(5000));

        let snapshot = SnapshotLoader::new(&source)
            .relationship_snapshot(&scope("MP", true), &scope("EMAPA", false))
            .await
            .unwrap();
        assert_eq!(snapshot.next_relationship_key, 5001);
        assert_eq!(snapshot.source.get("MP:0000001").unwrap().key, 10);
        assert!(snapshot.source.get("MP:0000002").is_none());
        assert!(snapshot.target.get("EMAPA:16039").is_some());
    }
}
