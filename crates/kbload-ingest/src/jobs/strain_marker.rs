//! Strain marker load: MGP strain gene models plus the MGI B6 reference strain

use super::b6::{build_b6_markers, B6StrainMarker};
use super::file_label;
use super::templates::mgp_description;
use crate::classify::{ClassifiedStrain, MarkerClassifier};
use crate::config::StrainMarkerLoadConfig;
use crate::context::RunContext;
use crate::error::Result;
use crate::loader::DeleteScope;
use crate::output::{
    AccessionReferenceRow, AccessionRow, AuditStamp, BiotypeRow, GeneModelRow, OutputSet, StrainMarkerRow,
};
use crate::parser::gff3::{parse_b6_file, parse_strain_file};
use crate::parser::read_input;
use crate::pipeline::{BulkFile, StagedLoad};
use crate::report::QcReport;
use crate::snapshot::{SnapshotLoader, SnapshotSource, ACCESSION_TABLE, STRAIN_MARKER_TABLE};
use kbload_common::AccessionId;
use tracing::info;

pub const ACCESSION_REFERENCE_TABLE: &str = "ACC_AccessionReference";

pub struct StrainMarkerLoad {
    config: StrainMarkerLoadConfig,
    reference_strain_only: bool,
    strains: Vec<ClassifiedStrain>,
    unresolved_strains: Vec<String>,
    b6: Vec<B6StrainMarker>,
}

/// Writer indexes inside the run's [`OutputSet`].
struct Writers {
    strain_marker: usize,
    accession: usize,
    accession_reference: usize,
}

impl StrainMarkerLoad {
    pub async fn prepare(
        config: StrainMarkerLoadConfig,
        source: &dyn SnapshotSource,
        ctx: &mut RunContext,
    ) -> Result<Self> {
        let snapshot = SnapshotLoader::new(source).strain_marker_snapshot().await?;
        ctx.register_counter(STRAIN_MARKER_TABLE, snapshot.next_strain_marker_key);
        ctx.register_counter(ACCESSION_TABLE, snapshot.next_accession_key);
        let check = ctx.sanity_check();
        let reference_strain_only = ctx.toggles.reference_strain_only;

        let mut strains = Vec::new();
        let mut unresolved_strains = Vec::new();
        if !reference_strain_only {
            let mut classifier =
                MarkerClassifier::new(&snapshot, &config.ensembl_prefix, config.secondary_id_policy)?;
            for path in config.mgp_files() {
                let file = parse_strain_file(&file_label(&path), &read_input(&path)?, check)?;
                match classifier.classify_strain(&file, &mut ctx.report) {
                    Some(classified) => strains.push(classified),
                    None => unresolved_strains.push(file.strain_name),
                }
            }
            info!(
                strains = strains.len(),
                unresolved = unresolved_strains.len(),
                markerless = classifier.placeholders_issued(),
                "Classified MGP strain files"
            );
        }

        let groups = parse_b6_file(
            &file_label(&config.b6_file),
            &read_input(&config.b6_file)?,
            check,
        )?;
        let b6 = build_b6_markers(&groups, &snapshot, &config.release_b6);

        let load = Self {
            config,
            reference_strain_only,
            strains,
            unresolved_strains,
            b6,
        };
        load.summarize(&mut ctx.report);
        Ok(load)
    }

    pub fn strains(&self) -> &[ClassifiedStrain] {
        &self.strains
    }

    pub fn b6_markers(&self) -> &[B6StrainMarker] {
        &self.b6
    }

    fn summarize(&self, report: &mut QcReport) {
        let input: usize = self.strains.iter().map(|s| s.input_count).sum();
        let skipped: usize = self.strains.iter().map(|s| s.skipped).sum();
        let loaded: usize = self.strains.iter().map(ClassifiedStrain::loaded).sum();
        let markerless: usize = self.strains.iter().map(ClassifiedStrain::loaded_without_marker).sum();

        report.summary_line(format!("Loaded {} Strain Markers", loaded + self.b6.len()));
        if !self.reference_strain_only {
            report.summary_line(format!("Total MGP in input: {input}"));
            report.summary_line(format!("Total MGP  skipped: {skipped}"));
            report.summary_line(format!("Total MGP Strain Markers Loaded: {loaded}"));
            report.summary_line(format!("Total MGP Strain Markers Loaded with no Marker: {markerless}"));
        }
        report.summary_line(format!("Total B6 Strain Markers Loaded: {}", self.b6.len()));
        for strain in &self.strains {
            report.summary_line(format!("{}: {} records in input", strain.strain_name, strain.input_count));
        }
    }

    fn write_mgp(&self, ctx: &mut RunContext, outputs: &mut OutputSet, writers: &Writers, audit: &AuditStamp) -> Result<usize> {
        let keys = &self.config.keys;
        let gene_models = outputs.open(self.config.output_path(&self.config.outputs.mgp_gene_model))?;
        let biotypes = outputs.open(self.config.output_path(&self.config.outputs.mgp_biotype))?;
        let mut written = 0usize;

        for strain in &self.strains {
            let non_musculus = keys.is_non_musculus(strain.strain_key);
            for record in strain.records() {
                let strain_marker_key = ctx.next_key(STRAIN_MARKER_TABLE)?;
                let accession_key = ctx.next_key(ACCESSION_TABLE)?;
                let accession = AccessionId::split(&record.mgp_id);

                outputs.writer(writers.strain_marker)?.write_row(&StrainMarkerRow {
                    key: strain_marker_key,
                    strain_key: strain.strain_key,
                    marker_key: record.marker_key,
                    refs_key: keys.mgp_refs_key,
                    audit,
                })?;
                outputs.writer(writers.accession)?.write_row(&AccessionRow {
                    key: accession_key,
                    accession: &accession,
                    logical_db_key: keys.mgp_logical_db_key,
                    object_key: strain_marker_key,
                    mgi_type_key: keys.mgi_type_key,
                    audit,
                })?;
                outputs.writer(writers.accession_reference)?.write_row(&AccessionReferenceRow {
                    accession_key,
                    refs_key: keys.mgp_refs_key,
                    audit,
                })?;

                let description =
                    mgp_description(record, &strain.strain_name, non_musculus, &self.config.release_mgp);
                outputs.writer(gene_models)?.write_row(&GeneModelRow {
                    id: &record.mgp_id,
                    chromosome: &record.chromosome,
                    start: record.start,
                    end: record.end,
                    strand: &record.strand,
                    description: &description,
                })?;
                outputs.writer(biotypes)?.write_row(&BiotypeRow {
                    id: &record.mgp_id,
                    feature_type: &record.feature_type,
                })?;
                written += 1;
            }
        }
        Ok(written)
    }

    fn write_b6(&self, ctx: &mut RunContext, outputs: &mut OutputSet, writers: &Writers, audit: &AuditStamp) -> Result<usize> {
        let keys = &self.config.keys;
        let gene_models = outputs.open(self.config.output_path(&self.config.outputs.b6_gene_model))?;
        let biotypes = outputs.open(self.config.output_path(&self.config.outputs.b6_biotype))?;

        for marker in &self.b6 {
            let strain_marker_key = ctx.next_key(STRAIN_MARKER_TABLE)?;
            let accession_key = ctx.next_key(ACCESSION_TABLE)?;
            let accession = AccessionId::split(&marker.strain_gene_id);

            outputs.writer(writers.strain_marker)?.write_row(&StrainMarkerRow {
                key: strain_marker_key,
                strain_key: keys.b6_strain_key,
                marker_key: Some(marker.marker_key),
                refs_key: keys.b6_refs_key,
                audit,
            })?;
            outputs.writer(writers.accession)?.write_row(&AccessionRow {
                key: accession_key,
                accession: &accession,
                logical_db_key: keys.b6_logical_db_key,
                object_key: strain_marker_key,
                mgi_type_key: keys.mgi_type_key,
                audit,
            })?;
            outputs.writer(writers.accession_reference)?.write_row(&AccessionReferenceRow {
                accession_key,
                refs_key: keys.b6_refs_key,
                audit,
            })?;
            outputs.writer(gene_models)?.write_row(&GeneModelRow {
                id: &marker.strain_gene_id,
                chromosome: &marker.chromosome,
                start: marker.start,
                end: marker.end,
                strand: &marker.strand,
                description: &marker.description,
            })?;
            outputs.writer(biotypes)?.write_row(&BiotypeRow {
                id: &marker.strain_gene_id,
                feature_type: &marker.gene_type,
            })?;
        }
        Ok(self.b6.len())
    }
}

impl StagedLoad for StrainMarkerLoad {
    fn name(&self) -> &'static str {
        "strain-markers"
    }

    fn unresolved_groupings(&self) -> Vec<String> {
        self.unresolved_strains.clone()
    }

    fn delete_scope(&self) -> DeleteScope {
        DeleteScope::References {
            table: STRAIN_MARKER_TABLE.table,
            refs_keys: self.config.active_refs_keys(self.reference_strain_only),
        }
    }

    fn deleted_noun(&self) -> &'static str {
        "Strain Markers"
    }

    fn write_outputs(&self, ctx: &mut RunContext, outputs: &mut OutputSet) -> Result<Vec<BulkFile>> {
        let names = &self.config.outputs;
        let strain_marker_path = self.config.output_path(&names.strain_marker_bcp);
        let accession_path = self.config.output_path(&names.accession_bcp);
        let accession_reference_path = self.config.output_path(&names.accession_reference_bcp);

        let writers = Writers {
            strain_marker: outputs.open(&strain_marker_path)?,
            accession: outputs.open(&accession_path)?,
            accession_reference: outputs.open(&accession_reference_path)?,
        };
        let audit = ctx.audit(self.config.keys.user_key);

        let mgp = if self.reference_strain_only {
            0
        } else {
            self.write_mgp(ctx, outputs, &writers, &audit)?
        };
        let b6 = self.write_b6(ctx, outputs, &writers, &audit)?;
        info!(mgp, b6, "Wrote strain marker rows");

        Ok(vec![
            BulkFile::new(STRAIN_MARKER_TABLE.table, strain_marker_path),
            BulkFile::new(ACCESSION_TABLE.table, accession_path),
            BulkFile::new(ACCESSION_REFERENCE_TABLE, accession_reference_path),
        ])
    }
}
