//! MP -> UBERON -> EMAPA relationship load

use super::file_label;
use crate::classify::relationship::summarize;
use crate::classify::{AcceptedRelationship, RelationshipClassifier};
use crate::config::RelationshipLoadConfig;
use crate::context::RunContext;
use crate::error::Result;
use crate::loader::DeleteScope;
use crate::output::{OutputSet, RelationshipRow};
use crate::parser::{read_input, OboParser, OwlClassParser, TermCollection};
use crate::pipeline::{BulkFile, StagedLoad};
use crate::snapshot::{SnapshotLoader, SnapshotSource, VocabularyScope, RELATIONSHIP_TABLE};
use std::path::Path;
use tracing::{debug, info};

pub const SOURCE_VOCABULARY: &str = "MP";
pub const INTERMEDIATE_VOCABULARY: &str = "UBERON";
pub const TARGET_VOCABULARY: &str = "EMAPA";

/// Mammalian Phenotype terms, preferred accessions only.
pub fn source_scope() -> VocabularyScope {
    VocabularyScope {
        name: SOURCE_VOCABULARY.to_string(),
        vocab_key: 5,
        logical_db_key: 34,
        preferred_only: true,
    }
}

/// EMAPA anatomy terms, every accession.
pub fn target_scope() -> VocabularyScope {
    VocabularyScope {
        name: TARGET_VOCABULARY.to_string(),
        vocab_key: 90,
        logical_db_key: 169,
        preferred_only: false,
    }
}

pub struct RelationshipLoad {
    config: RelationshipLoadConfig,
    accepted: Vec<AcceptedRelationship>,
}

impl RelationshipLoad {
    /// Parse the three vocabularies, classify every MP term and fill in the
    /// report. Structural problems (bad header, too few records) are errors.
    pub async fn prepare(
        config: RelationshipLoadConfig,
        source: &dyn SnapshotSource,
        ctx: &mut RunContext,
    ) -> Result<Self> {
        let snapshot = SnapshotLoader::new(source)
            .relationship_snapshot(&source_scope(), &target_scope())
            .await?;
        ctx.register_counter(RELATIONSHIP_TABLE, snapshot.next_relationship_key);
        let check = ctx.sanity_check();

        let mp = OwlClassParser::new(SOURCE_VOCABULARY, INTERMEDIATE_VOCABULARY).parse(
            &file_label(&config.mp_file),
            &read_input(&config.mp_file)?,
            Some(&snapshot.source),
            check,
        )?;
        let uberon = OboParser::new(INTERMEDIATE_VOCABULARY)
            .with_cross_refs(TARGET_VOCABULARY)
            .parse(
                &file_label(&config.uberon_file),
                &read_input(&config.uberon_file)?,
                None,
                check,
            )?;
        let emapa = OboParser::new(TARGET_VOCABULARY).parse(
            &file_label(&config.emapa_file),
            &read_input(&config.emapa_file)?,
            Some(&snapshot.target),
            check,
        )?;

        if let Some(ref dir) = config.debug_dump_dir {
            dump(dir, &[&mp, &uberon, &emapa])?;
        }

        let accepted =
            RelationshipClassifier::new(&mp, &uberon, &emapa, config.secondary_id_policy).classify(&mut ctx.report);
        summarize(&accepted, &mut ctx.report, SOURCE_VOCABULARY, TARGET_VOCABULARY);

        Ok(Self { config, accepted })
    }

    pub fn accepted(&self) -> &[AcceptedRelationship] {
        &self.accepted
    }
}

fn dump(dir: &Path, collections: &[&TermCollection]) -> Result<()> {
    for collection in collections {
        let path = dir.join(format!("{}.tsv", collection.vocabulary().to_lowercase()));
        collection.write_dump(&path)?;
        debug!(path = %path.display(), records = collection.len(), "Wrote debug dump");
    }
    Ok(())
}

impl StagedLoad for RelationshipLoad {
    fn name(&self) -> &'static str {
        "relationships"
    }

    fn delete_scope(&self) -> DeleteScope {
        DeleteScope::CreatedBy {
            table: RELATIONSHIP_TABLE.table,
            user_key: self.config.keys.user_key,
        }
    }

    fn deleted_noun(&self) -> &'static str {
        "Relationships"
    }

    fn write_outputs(&self, ctx: &mut RunContext, outputs: &mut OutputSet) -> Result<Vec<BulkFile>> {
        let path = self.config.relationship_bcp_path();
        let idx = outputs.open(&path)?;
        let keys = self.config.keys;
        let audit = ctx.audit(keys.user_key);

        for relationship in &self.accepted {
            let key = ctx.next_key(RELATIONSHIP_TABLE)?;
            outputs.writer(idx)?.write_row(&RelationshipRow {
                key,
                category_key: keys.category_key,
                object_key_1: relationship.source_key,
                object_key_2: relationship.target_key,
                relationship_term_key: keys.relationship_term_key,
                qualifier_key: keys.qualifier_key,
                evidence_key: keys.evidence_key,
                refs_key: keys.refs_key,
                audit: &audit,
            })?;
        }

        info!(rows = self.accepted.len(), path = %path.display(), "Wrote relationship rows");
        Ok(vec![BulkFile::new(RELATIONSHIP_TABLE.table, path)])
    }
}
