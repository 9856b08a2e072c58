//! Shared helpers for the load integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use kbload_ingest::config::{
    RelationshipKeys, RelationshipLoadConfig, SecondaryIdPolicy, StrainMarkerKeys, StrainMarkerLoadConfig,
    StrainMarkerOutputs,
};
use kbload_ingest::loader::{DeleteScope, LoadTarget};
use kbload_ingest::report::QcReport;
use kbload_ingest::{Result, RunContext, RunToggles};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

pub const LOAD_DATE: &str = "10/19/2026";

pub fn fixture(name: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures").join(name)
}

/// Load target that remembers what it was asked to do.
#[derive(Default)]
pub struct RecordingTarget {
    pub deletes: Mutex<Vec<DeleteScope>>,
    pub loads: Mutex<Vec<(String, PathBuf)>>,
}

#[async_trait]
impl LoadTarget for RecordingTarget {
    async fn delete_prior(&self, scope: &DeleteScope) -> Result<u64> {
        self.deletes.lock().unwrap().push(scope.clone());
        Ok(2)
    }

    async fn bulk_load(&self, table: &str, file: &Path) -> Result<u64> {
        let rows = std::fs::read_to_string(file).unwrap().lines().count() as u64;
        self.loads.lock().unwrap().push((table.to_string(), file.to_path_buf()));
        Ok(rows)
    }
}

pub fn relationship_config(output_dir: &Path) -> RelationshipLoadConfig {
    RelationshipLoadConfig {
        mp_file: fixture("mp.owl"),
        uberon_file: fixture("uberon.obo"),
        emapa_file: fixture("emapa.obo"),
        output_dir: output_dir.to_path_buf(),
        relationship_bcp: "MGI_Relationship.bcp".to_string(),
        curation_log: output_dir.join("curator.log"),
        keys: RelationshipKeys::default(),
        secondary_id_policy: SecondaryIdPolicy::Load,
        debug_dump_dir: None,
    }
}

pub fn strain_marker_config(output_dir: &Path, stems: &[&str]) -> StrainMarkerLoadConfig {
    StrainMarkerLoadConfig {
        input_dir: fixture(""),
        mgp_file_stems: stems.iter().map(|s| s.to_string()).collect(),
        b6_file: fixture("MGI.gff3"),
        output_dir: output_dir.to_path_buf(),
        outputs: StrainMarkerOutputs {
            strain_marker_bcp: "MRK_StrainMarker.bcp".to_string(),
            accession_bcp: "ACC_Accession.bcp".to_string(),
            accession_reference_bcp: "ACC_AccessionReference.bcp".to_string(),
            mgp_gene_model: "mgp_genemodel.txt".to_string(),
            mgp_biotype: "mgp_biotype.txt".to_string(),
            b6_gene_model: "b6_genemodel.txt".to_string(),
            b6_biotype: "b6_biotype.txt".to_string(),
        },
        release_mgp: "Ensembl Release 99".to_string(),
        release_b6: "GRCm39".to_string(),
        curation_log: output_dir.join("curator.log"),
        keys: StrainMarkerKeys::default(),
        secondary_id_policy: SecondaryIdPolicy::Load,
        ensembl_prefix: "ENSMUS".to_string(),
    }
}

pub fn context(output_dir: &Path, report: QcReport, toggles: RunToggles) -> RunContext {
    RunContext::with_load_date(
        toggles,
        report,
        output_dir.join("curator.log"),
        output_dir.to_path_buf(),
        LOAD_DATE,
    )
}

pub fn read(path: impl AsRef<Path>) -> String {
    std::fs::read_to_string(path).unwrap()
}
