//! Reference snapshot
//!
//! Read-only lookups built once per run from the reference database (or an
//! offline export of it). Sources return raw rows; [`SnapshotLoader`] turns
//! them into the keyed lookups the parsers and classifiers consult.

pub mod file;
#[cfg(feature = "database")]
pub mod postgres;

use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use tracing::info;

pub use file::FileSnapshotSource;
#[cfg(feature = "database")]
pub use postgres::PgSnapshotSource;

/// First surrogate key handed out when a table is empty.
pub const KEY_FLOOR: i64 = 1000;

/// `max + 1`, or [`KEY_FLOOR`] for an empty table.
pub fn next_key(current_max: Option<i64>) -> i64 {
    current_max.map(|max| max + 1).unwrap_or(KEY_FLOOR)
}

// ============================================================================
// Scopes
// ============================================================================

/// One vocabulary's accession IDs, as stored for term objects.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VocabularyScope {
    /// Short name, e.g. "MP"; keys the offline export.
    pub name: String,
    pub vocab_key: i64,
    pub logical_db_key: i64,
    /// Only preferred accessions are returned when set.
    pub preferred_only: bool,
}

/// A table whose surrogate keys this run assigns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct KeyedTable {
    pub table: &'static str,
    pub key_column: &'static str,
}

pub const RELATIONSHIP_TABLE: KeyedTable = KeyedTable {
    table: "MGI_Relationship",
    key_column: "_Relationship_key",
};

pub const STRAIN_MARKER_TABLE: KeyedTable = KeyedTable {
    table: "MRK_StrainMarker",
    key_column: "_StrainMarker_key",
};

pub const ACCESSION_TABLE: KeyedTable = KeyedTable {
    table: "ACC_Accession",
    key_column: "_Accession_key",
};

// ============================================================================
// Raw rows
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "database", derive(sqlx::FromRow))]
pub struct TermRow {
    pub accid: String,
    pub term_key: i64,
    pub is_obsolete: bool,
    pub preferred: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "database", derive(sqlx::FromRow))]
pub struct StrainTranslationRow {
    pub bad_name: String,
    pub strain_key: i64,
    pub strain: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "database", derive(sqlx::FromRow))]
pub struct MarkerRow {
    pub mgi_id: String,
    pub marker_key: i64,
    pub symbol: String,
    pub status: String,
    pub preferred: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "database", derive(sqlx::FromRow))]
pub struct EnsemblMarkerRow {
    pub ensembl_id: String,
    pub mgi_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "database", derive(sqlx::FromRow))]
pub struct ChromosomeRow {
    pub chromosome: String,
    pub chromosome_key: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "database", derive(sqlx::FromRow))]
pub struct BiotypeRow {
    pub raw_biotype: String,
    pub feature_type: String,
}

/// Query layer over the reference database. Any error is fatal for the run.
#[async_trait]
pub trait SnapshotSource: Send + Sync {
    async fn vocabulary_terms(&self, scope: &VocabularyScope) -> Result<Vec<TermRow>>;

    async fn max_key(&self, table: KeyedTable) -> Result<Option<i64>>;

    async fn strain_translations(&self) -> Result<Vec<StrainTranslationRow>>;

    async fn markers(&self) -> Result<Vec<MarkerRow>>;

    async fn ensembl_markers(&self) -> Result<Vec<EnsemblMarkerRow>>;

    async fn chromosomes(&self) -> Result<Vec<ChromosomeRow>>;

    async fn biotype_mappings(&self) -> Result<Vec<BiotypeRow>>;

    async fn feature_types(&self) -> Result<Vec<String>>;
}

// ============================================================================
// Lookups
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TermStatus {
    pub key: i64,
    pub is_obsolete: bool,
    pub is_preferred: bool,
}

/// Accession ID -> term status for one vocabulary.
#[derive(Debug, Clone, Default)]
pub struct VocabularySnapshot {
    terms: HashMap<String, TermStatus>,
}

impl VocabularySnapshot {
    pub fn from_rows(rows: impl IntoIterator<Item = TermRow>) -> Self {
        let terms = rows
            .into_iter()
            .map(|row| {
                (
                    row.accid,
                    TermStatus {
                        key: row.term_key,
                        is_obsolete: row.is_obsolete,
                        is_preferred: row.preferred,
                    },
                )
            })
            .collect();
        Self { terms }
    }

    pub fn get(&self, accid: &str) -> Option<TermStatus> {
        self.terms.get(accid).copied()
    }

    pub fn len(&self) -> usize {
        self.terms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct RelationshipSnapshot {
    pub source: VocabularySnapshot,
    pub target: VocabularySnapshot,
    pub next_relationship_key: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StrainEntry {
    pub key: i64,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarkerEntry {
    pub key: i64,
    pub mgi_id: String,
    pub symbol: String,
    pub status: String,
    pub is_preferred: bool,
}

impl MarkerEntry {
    pub fn is_official(&self) -> bool {
        self.status == "official"
    }
}

/// Rows feeding a [`StrainMarkerSnapshot`]; also the shape of the offline export.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StrainMarkerRows {
    #[serde(default)]
    pub strains: Vec<StrainTranslationRow>,
    #[serde(default)]
    pub markers: Vec<MarkerRow>,
    #[serde(default)]
    pub ensembl_markers: Vec<EnsemblMarkerRow>,
    #[serde(default)]
    pub chromosomes: Vec<ChromosomeRow>,
    #[serde(default)]
    pub biotypes: Vec<BiotypeRow>,
    #[serde(default)]
    pub feature_types: Vec<String>,
}

#[derive(Debug, Clone, Default)]
pub struct StrainMarkerSnapshot {
    strains: HashMap<String, StrainEntry>,
    markers: HashMap<String, MarkerEntry>,
    ensembl: HashMap<String, Vec<String>>,
    chromosomes: HashMap<String, i64>,
    biotypes: HashMap<String, String>,
    feature_types: HashSet<String>,
    pub next_strain_marker_key: i64,
    pub next_accession_key: i64,
}

impl StrainMarkerSnapshot {
    pub fn from_rows(rows: StrainMarkerRows, next_strain_marker_key: i64, next_accession_key: i64) -> Self {
        let strains = rows
            .strains
            .into_iter()
            .map(|r| {
                (
                    r.bad_name,
                    StrainEntry {
                        key: r.strain_key,
                        name: r.strain,
                    },
                )
            })
            .collect();

        let markers = rows
            .markers
            .into_iter()
            .map(|r| {
                (
                    r.mgi_id.clone(),
                    MarkerEntry {
                        key: r.marker_key,
                        mgi_id: r.mgi_id,
                        symbol: r.symbol,
                        status: r.status,
                        is_preferred: r.preferred,
                    },
                )
            })
            .collect();

        let mut ensembl: HashMap<String, Vec<String>> = HashMap::new();
        for row in rows.ensembl_markers {
            let ids = ensembl.entry(row.ensembl_id).or_default();
            if !ids.contains(&row.mgi_id) {
                ids.push(row.mgi_id);
            }
        }

        Self {
            strains,
            markers,
            ensembl,
            chromosomes: rows
                .chromosomes
                .into_iter()
                .map(|r| (r.chromosome, r.chromosome_key))
                .collect(),
            biotypes: rows
                .biotypes
                .into_iter()
                .map(|r| (r.raw_biotype.trim().to_lowercase(), r.feature_type))
                .collect(),
            feature_types: rows
                .feature_types
                .into_iter()
                .map(|t| t.trim().to_lowercase())
                .collect(),
            next_strain_marker_key,
            next_accession_key,
        }
    }

    pub fn strain(&self, name: &str) -> Option<&StrainEntry> {
        self.strains.get(name)
    }

    pub fn marker(&self, mgi_id: &str) -> Option<&MarkerEntry> {
        self.markers.get(mgi_id)
    }

    /// MGI IDs associated with an Ensembl gene ID (empty when unknown).
    pub fn ensembl_markers(&self, ensembl_id: &str) -> &[String] {
        self.ensembl.get(ensembl_id).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn has_chromosome(&self, chromosome: &str) -> bool {
        self.chromosomes.contains_key(chromosome)
    }

    /// Feature type for a raw biotype, compared case-insensitively.
    pub fn feature_type_for(&self, raw_biotype: &str) -> Option<&str> {
        self.biotypes
            .get(&raw_biotype.trim().to_lowercase())
            .map(String::as_str)
    }

    pub fn is_feature_type(&self, term: &str) -> bool {
        self.feature_types.contains(&term.trim().to_lowercase())
    }

    pub fn has_feature_types(&self) -> bool {
        !self.feature_types.is_empty()
    }
}

// ============================================================================
// Loader
// ============================================================================

/// Builds the lookups a load needs from a [`SnapshotSource`].
pub struct SnapshotLoader<'a> {
    source: &'a dyn SnapshotSource,
}

impl<'a> SnapshotLoader<'a> {
    pub fn new(source: &'a dyn SnapshotSource) -> Self {
        Self { source }
    }

    pub async fn relationship_snapshot(
        &self,
        source_scope: &VocabularyScope,
        target_scope: &VocabularyScope,
    ) -> Result<RelationshipSnapshot> {
        let source = VocabularySnapshot::from_rows(self.source.vocabulary_terms(source_scope).await?);
        let target = VocabularySnapshot::from_rows(self.source.vocabulary_terms(target_scope).await?);
        let next_relationship_key = next_key(self.source.max_key(RELATIONSHIP_TABLE).await?);

        info!(
            source = %source_scope.name,
            source_terms = source.len(),
            target = %target_scope.name,
            target_terms = target.len(),
            next_relationship_key,
            "Loaded reference snapshot"
        );

        Ok(RelationshipSnapshot {
            source,
            target,
            next_relationship_key,
        })
    }

    pub async fn strain_marker_snapshot(&self) -> Result<StrainMarkerSnapshot> {
        let rows = StrainMarkerRows {
            strains: self.source.strain_translations().await?,
            markers: self.source.markers().await?,
            ensembl_markers: self.source.ensembl_markers().await?,
            chromosomes: self.source.chromosomes().await?,
            biotypes: self.source.biotype_mappings().await?,
            feature_types: self.source.feature_types().await?,
        };
        let next_sm = next_key(self.source.max_key(STRAIN_MARKER_TABLE).await?);
        let next_acc = next_key(self.source.max_key(ACCESSION_TABLE).await?);

        info!(
            strains = rows.strains.len(),
            markers = rows.markers.len(),
            ensembl = rows.ensembl_markers.len(),
            next_strain_marker_key = next_sm,
            next_accession_key = next_acc,
            "Loaded reference snapshot"
        );

        Ok(StrainMarkerSnapshot::from_rows(rows, next_sm, next_acc))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_next_key_floor() {
        assert_eq!(next_key(None), KEY_FLOOR);
        assert_eq!(next_key(Some(41)), 42);
    }

    #[test]
    fn test_biotype_lookup_is_case_insensitive() {
        let rows = StrainMarkerRows {
            biotypes: vec![BiotypeRow {
                raw_biotype: "Protein_Coding".into(),
                feature_type: "protein coding gene".into(),
            }],
            ..Default::default()
        };
        let snapshot = StrainMarkerSnapshot::from_rows(rows, 1000, 1000);
        assert_eq!(snapshot.feature_type_for("protein_coding"), Some("protein coding gene"));
        assert_eq!(snapshot.feature_type_for(" PROTEIN_CODING "), Some("protein coding gene"));
        assert_eq!(snapshot.feature_type_for("lncRNA"), None);
    }

    #[test]
    fn test_ensembl_associations_keep_distinct_markers() {
        let rows = StrainMarkerRows {
            ensembl_markers: vec![
                EnsemblMarkerRow {
                    ensembl_id: "ENSMUSG01".into(),
                    mgi_id: "MGI:1".into(),
                },
                EnsemblMarkerRow {
                    ensembl_id: "ENSMUSG01".into(),
                    mgi_id: "MGI:1".into(),
                },
                EnsemblMarkerRow {
                    ensembl_id: "ENSMUSG01".into(),
                    mgi_id: "MGI:2".into(),
                },
            ],
            ..Default::default()
        };
        let snapshot = StrainMarkerSnapshot::from_rows(rows, 1000, 1000);
        assert_eq!(snapshot.ensembl_markers("ENSMUSG01"), ["MGI:1", "MGI:2"]);
        assert!(snapshot.ensembl_markers("ENSMUSG99").is_empty());
    }
}
