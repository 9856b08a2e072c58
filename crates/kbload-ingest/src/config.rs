//! Load configuration
//!
//! Static configuration for both loads, read from environment variables
//! (a `.env` file is honoured by the binary). File locations are required;
//! constant database keys default to the production values and can be
//! overridden per environment.

use crate::error::{LoadError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;

// ============================================================================
// Shared
// ============================================================================

/// What to do with an endpoint that resolves only through a secondary
/// (non-preferred) accession.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SecondaryIdPolicy {
    /// Report it and load the relationship anyway
    #[default]
    Load,
    /// Report it and leave it out
    Skip,
}

impl FromStr for SecondaryIdPolicy {
    type Err = LoadError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "load" => Ok(SecondaryIdPolicy::Load),
            "skip" => Ok(SecondaryIdPolicy::Skip),
            other => Err(LoadError::config(format!(
                "SECONDARY_ID_POLICY must be 'load' or 'skip', got '{other}'"
            ))),
        }
    }
}

fn required(name: &str) -> Result<String> {
    match std::env::var(name) {
        Ok(value) if !value.trim().is_empty() => Ok(value.trim().to_string()),
        _ => Err(LoadError::config(format!("{name} not set"))),
    }
}

fn required_path(name: &str) -> Result<PathBuf> {
    required(name).map(PathBuf::from)
}

fn optional_path(name: &str) -> Option<PathBuf> {
    std::env::var(name)
        .ok()
        .filter(|s| !s.trim().is_empty())
        .map(PathBuf::from)
}

fn key_or(name: &str, default: i64) -> i64 {
    std::env::var(name)
        .ok()
        .and_then(|s| s.trim().parse().ok())
        .unwrap_or(default)
}

fn secondary_id_policy() -> Result<SecondaryIdPolicy> {
    match std::env::var("SECONDARY_ID_POLICY") {
        Ok(value) => value.parse(),
        Err(_) => Ok(SecondaryIdPolicy::default()),
    }
}

fn check_file(path: &Path, what: &str) -> Result<()> {
    if !path.is_file() {
        return Err(LoadError::config(format!("{what} not found: {}", path.display())));
    }
    Ok(())
}

fn check_dir(path: &Path, what: &str) -> Result<()> {
    if !path.is_dir() {
        return Err(LoadError::config(format!("{what} is not a directory: {}", path.display())));
    }
    Ok(())
}

// ============================================================================
// Relationship load
// ============================================================================

pub const DEFAULT_RELATIONSHIP_CATEGORY_KEY: i64 = 1007;
pub const DEFAULT_RELATIONSHIP_TERM_KEY: i64 = 37085930;
pub const DEFAULT_QUALIFIER_KEY: i64 = 11391898;
pub const DEFAULT_EVIDENCE_KEY: i64 = 17396909;
pub const DEFAULT_RELATIONSHIP_REFS_KEY: i64 = 257191;
pub const DEFAULT_RELATIONSHIP_USER_KEY: i64 = 1576;

/// Constant columns of every `MGI_Relationship` row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelationshipKeys {
    pub category_key: i64,
    pub relationship_term_key: i64,
    pub qualifier_key: i64,
    pub evidence_key: i64,
    pub refs_key: i64,
    pub user_key: i64,
}

impl Default for RelationshipKeys {
    fn default() -> Self {
        Self {
            category_key: DEFAULT_RELATIONSHIP_CATEGORY_KEY,
            relationship_term_key: DEFAULT_RELATIONSHIP_TERM_KEY,
            qualifier_key: DEFAULT_QUALIFIER_KEY,
            evidence_key: DEFAULT_EVIDENCE_KEY,
            refs_key: DEFAULT_RELATIONSHIP_REFS_KEY,
            user_key: DEFAULT_RELATIONSHIP_USER_KEY,
        }
    }
}

impl RelationshipKeys {
    pub fn from_env() -> Self {
        Self {
            category_key: key_or("RELATIONSHIP_CATEGORY_KEY", DEFAULT_RELATIONSHIP_CATEGORY_KEY),
            relationship_term_key: key_or("RELATIONSHIP_TERM_KEY", DEFAULT_RELATIONSHIP_TERM_KEY),
            qualifier_key: key_or("QUALIFIER_KEY", DEFAULT_QUALIFIER_KEY),
            evidence_key: key_or("EVIDENCE_KEY", DEFAULT_EVIDENCE_KEY),
            refs_key: key_or("REFS_KEY", DEFAULT_RELATIONSHIP_REFS_KEY),
            user_key: key_or("USER_KEY", DEFAULT_RELATIONSHIP_USER_KEY),
        }
    }
}

/// MP -> UBERON -> EMAPA relationship load.
#[derive(Debug, Clone)]
pub struct RelationshipLoadConfig {
    pub mp_file: PathBuf,
    pub uberon_file: PathBuf,
    pub emapa_file: PathBuf,
    pub output_dir: PathBuf,
    /// File name of the relationship BCP file inside `output_dir`
    pub relationship_bcp: String,
    pub curation_log: PathBuf,
    pub keys: RelationshipKeys,
    pub secondary_id_policy: SecondaryIdPolicy,
    /// Parsed collections are dumped here when set
    pub debug_dump_dir: Option<PathBuf>,
}

impl RelationshipLoadConfig {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            mp_file: required_path("INPUT_FILE_MP")?,
            uberon_file: required_path("INPUT_FILE_UBERON")?,
            emapa_file: required_path("INPUT_FILE_EMAPA")?,
            output_dir: required_path("OUTPUTDIR")?,
            relationship_bcp: required("RELATIONSHIP_BCP")?,
            curation_log: required_path("LOG_CUR")?,
            keys: RelationshipKeys::from_env(),
            secondary_id_policy: secondary_id_policy()?,
            debug_dump_dir: optional_path("DEBUG_DUMP_DIR"),
        })
    }

    pub fn validate(&self) -> Result<()> {
        check_file(&self.mp_file, "MP OWL file")?;
        check_file(&self.uberon_file, "UBERON OBO file")?;
        check_file(&self.emapa_file, "EMAPA OBO file")?;
        check_dir(&self.output_dir, "OUTPUTDIR")?;
        if let Some(ref dir) = self.debug_dump_dir {
            check_dir(dir, "DEBUG_DUMP_DIR")?;
        }
        Ok(())
    }

    pub fn relationship_bcp_path(&self) -> PathBuf {
        self.output_dir.join(&self.relationship_bcp)
    }
}

// ============================================================================
// Strain marker load
// ============================================================================

pub const DEFAULT_MGP_REFS_KEY: i64 = 282407;
pub const DEFAULT_B6_REFS_KEY: i64 = 282660;
pub const DEFAULT_B6_STRAIN_KEY: i64 = 38048;
pub const DEFAULT_STRAIN_MARKER_USER_KEY: i64 = 1600;
pub const DEFAULT_MGP_LOGICAL_DB_KEY: i64 = 209;
pub const DEFAULT_B6_LOGICAL_DB_KEY: i64 = 212;
pub const DEFAULT_STRAIN_MARKER_MGI_TYPE_KEY: i64 = 44;
/// CAROLI/EiJ, PAHARI/EiJ, SPRET/EiJ
pub const DEFAULT_NON_MUSCULUS_STRAIN_KEYS: [i64; 3] = [31303, 1398, 34371];
pub const DEFAULT_ENSEMBL_PREFIX: &str = "ENSMUS";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StrainMarkerKeys {
    pub mgp_refs_key: i64,
    pub b6_refs_key: i64,
    pub b6_strain_key: i64,
    pub user_key: i64,
    pub mgp_logical_db_key: i64,
    pub b6_logical_db_key: i64,
    pub mgi_type_key: i64,
    pub non_musculus_strain_keys: Vec<i64>,
}

impl Default for StrainMarkerKeys {
    fn default() -> Self {
        Self {
            mgp_refs_key: DEFAULT_MGP_REFS_KEY,
            b6_refs_key: DEFAULT_B6_REFS_KEY,
            b6_strain_key: DEFAULT_B6_STRAIN_KEY,
            user_key: DEFAULT_STRAIN_MARKER_USER_KEY,
            mgp_logical_db_key: DEFAULT_MGP_LOGICAL_DB_KEY,
            b6_logical_db_key: DEFAULT_B6_LOGICAL_DB_KEY,
            mgi_type_key: DEFAULT_STRAIN_MARKER_MGI_TYPE_KEY,
            non_musculus_strain_keys: DEFAULT_NON_MUSCULUS_STRAIN_KEYS.to_vec(),
        }
    }
}

impl StrainMarkerKeys {
    pub fn from_env() -> Self {
        let non_musculus_strain_keys = std::env::var("NON_MUSCULUS_STRAIN_KEYS")
            .ok()
            .map(|s| {
                s.split([',', ' '])
                    .filter_map(|k| k.trim().parse().ok())
                    .collect::<Vec<i64>>()
            })
            .filter(|keys| !keys.is_empty())
            .unwrap_or_else(|| DEFAULT_NON_MUSCULUS_STRAIN_KEYS.to_vec());

        Self {
            mgp_refs_key: key_or("MGP_REFS_KEY", DEFAULT_MGP_REFS_KEY),
            b6_refs_key: key_or("B6_REFS_KEY", DEFAULT_B6_REFS_KEY),
            b6_strain_key: key_or("B6_STRAIN_KEY", DEFAULT_B6_STRAIN_KEY),
            user_key: key_or("USER_KEY", DEFAULT_STRAIN_MARKER_USER_KEY),
            mgp_logical_db_key: key_or("MGP_LOGICAL_DB_KEY", DEFAULT_MGP_LOGICAL_DB_KEY),
            b6_logical_db_key: key_or("B6_LOGICAL_DB_KEY", DEFAULT_B6_LOGICAL_DB_KEY),
            mgi_type_key: key_or("STRAIN_MARKER_MGI_TYPE_KEY", DEFAULT_STRAIN_MARKER_MGI_TYPE_KEY),
            non_musculus_strain_keys,
        }
    }

    pub fn is_non_musculus(&self, strain_key: i64) -> bool {
        self.non_musculus_strain_keys.contains(&strain_key)
    }
}

/// Output file names inside `output_dir`.
#[derive(Debug, Clone)]
pub struct StrainMarkerOutputs {
    pub strain_marker_bcp: String,
    pub accession_bcp: String,
    pub accession_reference_bcp: String,
    pub mgp_gene_model: String,
    pub mgp_biotype: String,
    pub b6_gene_model: String,
    pub b6_biotype: String,
}

/// MGP strain gene models plus the MGI B6 reference strain.
#[derive(Debug, Clone)]
pub struct StrainMarkerLoadConfig {
    pub input_dir: PathBuf,
    /// File stems; each strain file is `<input_dir>/<stem>.txt`
    pub mgp_file_stems: Vec<String>,
    pub b6_file: PathBuf,
    pub output_dir: PathBuf,
    pub outputs: StrainMarkerOutputs,
    pub release_mgp: String,
    pub release_b6: String,
    pub curation_log: PathBuf,
    pub keys: StrainMarkerKeys,
    pub secondary_id_policy: SecondaryIdPolicy,
    /// Required prefix of `projection_parent_gene` values
    pub ensembl_prefix: String,
}

impl StrainMarkerLoadConfig {
    pub fn from_env() -> Result<Self> {
        let mgp_file_stems = std::env::var("INPUT_MGP_DIR_LIST")
            .unwrap_or_default()
            .split_whitespace()
            .map(str::to_string)
            .collect();

        Ok(Self {
            input_dir: required_path("INPUTDIR")?,
            mgp_file_stems,
            b6_file: required_path("INPUT_MGI_GFF_FILE")?,
            output_dir: required_path("OUTPUTDIR")?,
            outputs: StrainMarkerOutputs {
                strain_marker_bcp: required("SM_BCP_FILE")?,
                accession_bcp: required("ACC_BCP_FILE")?,
                accession_reference_bcp: required("ACC_REF_BCP_FILE")?,
                mgp_gene_model: required("GM_MGP_INPUT_FILE")?,
                mgp_biotype: required("GM_MGP_BIOTYPE_FILE")?,
                b6_gene_model: required("GM_B6_INPUT_FILE")?,
                b6_biotype: required("GM_B6_BIOTYPE_FILE")?,
            },
            release_mgp: required("RELEASE_MGP")?,
            release_b6: required("RELEASE_B6")?,
            curation_log: required_path("LOG_CUR")?,
            keys: StrainMarkerKeys::from_env(),
            secondary_id_policy: secondary_id_policy()?,
            ensembl_prefix: std::env::var("ENSEMBL_PREFIX")
                .unwrap_or_else(|_| DEFAULT_ENSEMBL_PREFIX.to_string()),
        })
    }

    /// `reference_strain_only` skips the MGP inputs entirely.
    pub fn validate(&self, reference_strain_only: bool) -> Result<()> {
        check_file(&self.b6_file, "MGI GFF file")?;
        check_dir(&self.output_dir, "OUTPUTDIR")?;
        if !reference_strain_only {
            if self.mgp_file_stems.is_empty() {
                return Err(LoadError::config("INPUT_MGP_DIR_LIST is empty"));
            }
            for path in self.mgp_files() {
                check_file(&path, "MGP strain file")?;
            }
        }
        if self.ensembl_prefix.is_empty() {
            return Err(LoadError::config("ENSEMBL_PREFIX must not be empty"));
        }
        Ok(())
    }

    pub fn mgp_files(&self) -> Vec<PathBuf> {
        self.mgp_file_stems
            .iter()
            .map(|stem| self.input_dir.join(format!("{stem}.txt")))
            .collect()
    }

    pub fn output_path(&self, name: &str) -> PathBuf {
        self.output_dir.join(name)
    }

    /// Reference keys whose strain markers belong to this load.
    pub fn active_refs_keys(&self, reference_strain_only: bool) -> Vec<i64> {
        if reference_strain_only {
            vec![self.keys.b6_refs_key]
        } else {
            vec![self.keys.mgp_refs_key, self.keys.b6_refs_key]
        }
    }
}
