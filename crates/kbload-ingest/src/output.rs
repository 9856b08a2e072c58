//! Bulk-copy (BCP) output
//!
//! Accepted records become tab-delimited, newline-terminated rows whose
//! columns match the target table exactly. Null foreign keys are written as
//! empty fields.

use crate::error::{LoadError, Result};
use kbload_common::AccessionId;
use std::fmt::Display;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

// ============================================================================
// Keys and audit columns
// ============================================================================

/// Run-scoped surrogate key sequence. Keys only ever increase.
#[derive(Debug)]
pub struct KeyCounter {
    next: i64,
}

impl KeyCounter {
    pub fn starting_at(first: i64) -> Self {
        Self { next: first }
    }

    pub fn next_key(&mut self) -> i64 {
        let key = self.next;
        self.next += 1;
        key
    }
}

/// Created-by/modified-by user and the creation/modification date, identical
/// for every row of a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditStamp {
    pub user_key: i64,
    pub date: String,
}

impl AuditStamp {
    pub fn new(user_key: i64, date: impl Into<String>) -> Self {
        Self {
            user_key,
            date: date.into(),
        }
    }

    fn push(&self, fields: &mut Vec<String>) {
        fields.push(self.user_key.to_string());
        fields.push(self.user_key.to_string());
        fields.push(self.date.clone());
        fields.push(self.date.clone());
    }
}

/// Empty string for a null column.
pub fn nullable<T: Display>(value: Option<T>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

/// Free text with delimiter characters flattened to spaces.
pub fn text(value: &str) -> String {
    value.replace(['\t', '\r', '\n'], " ")
}

// ============================================================================
// Rows
// ============================================================================

/// One output line.
pub trait BcpRow {
    fn fields(&self) -> Vec<String>;
}

/// `MGI_Relationship`
#[derive(Debug, Clone)]
pub struct RelationshipRow<'a> {
    pub key: i64,
    pub category_key: i64,
    pub object_key_1: i64,
    pub object_key_2: i64,
    pub relationship_term_key: i64,
    pub qualifier_key: i64,
    pub evidence_key: i64,
    pub refs_key: i64,
    pub audit: &'a AuditStamp,
}

impl BcpRow for RelationshipRow<'_> {
    fn fields(&self) -> Vec<String> {
        let mut fields = vec![
            self.key.to_string(),
            self.category_key.to_string(),
            self.object_key_1.to_string(),
            self.object_key_2.to_string(),
            self.relationship_term_key.to_string(),
            self.qualifier_key.to_string(),
            self.evidence_key.to_string(),
            self.refs_key.to_string(),
        ];
        self.audit.push(&mut fields);
        fields
    }
}

/// `MRK_StrainMarker`
#[derive(Debug, Clone)]
pub struct StrainMarkerRow<'a> {
    pub key: i64,
    pub strain_key: i64,
    pub marker_key: Option<i64>,
    pub refs_key: i64,
    pub audit: &'a AuditStamp,
}

impl BcpRow for StrainMarkerRow<'_> {
    fn fields(&self) -> Vec<String> {
        let mut fields = vec![
            self.key.to_string(),
            self.strain_key.to_string(),
            nullable(self.marker_key),
            self.refs_key.to_string(),
        ];
        self.audit.push(&mut fields);
        fields
    }
}

/// `ACC_Accession` registering a strain marker's ID. Always public and preferred.
#[derive(Debug, Clone)]
pub struct AccessionRow<'a> {
    pub key: i64,
    pub accession: &'a AccessionId,
    pub logical_db_key: i64,
    pub object_key: i64,
    pub mgi_type_key: i64,
    pub audit: &'a AuditStamp,
}

impl BcpRow for AccessionRow<'_> {
    fn fields(&self) -> Vec<String> {
        let mut fields = vec![
            self.key.to_string(),
            self.accession.id.clone(),
            self.accession.prefix.clone(),
            self.accession.numeric_field(),
            self.logical_db_key.to_string(),
            self.object_key.to_string(),
            self.mgi_type_key.to_string(),
            "0".to_string(),
            "1".to_string(),
        ];
        self.audit.push(&mut fields);
        fields
    }
}

/// `ACC_AccessionReference`
#[derive(Debug, Clone)]
pub struct AccessionReferenceRow<'a> {
    pub accession_key: i64,
    pub refs_key: i64,
    pub audit: &'a AuditStamp,
}

impl BcpRow for AccessionReferenceRow<'_> {
    fn fields(&self) -> Vec<String> {
        let mut fields = vec![self.accession_key.to_string(), self.refs_key.to_string()];
        self.audit.push(&mut fields);
        fields
    }
}

/// Hand-off gene model record for the sequence loaders.
#[derive(Debug, Clone)]
pub struct GeneModelRow<'a> {
    pub id: &'a str,
    pub chromosome: &'a str,
    pub start: u64,
    pub end: u64,
    pub strand: &'a str,
    pub description: &'a str,
}

impl BcpRow for GeneModelRow<'_> {
    fn fields(&self) -> Vec<String> {
        vec![
            self.id.to_string(),
            self.chromosome.to_string(),
            self.start.to_string(),
            self.end.to_string(),
            self.strand.to_string(),
            text(self.description),
        ]
    }
}

/// Hand-off biotype record.
#[derive(Debug, Clone)]
pub struct BiotypeRow<'a> {
    pub id: &'a str,
    pub feature_type: &'a str,
}

impl BcpRow for BiotypeRow<'_> {
    fn fields(&self) -> Vec<String> {
        vec![self.id.to_string(), text(self.feature_type)]
    }
}

// ============================================================================
// Writers
// ============================================================================

pub struct BcpWriter {
    path: PathBuf,
    out: BufWriter<File>,
    rows: usize,
}

impl BcpWriter {
    pub fn create(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = File::create(&path).map_err(|e| LoadError::io(&path, e))?;
        debug!(path = %path.display(), "Opened output file");
        Ok(Self {
            path,
            out: BufWriter::new(file),
            rows: 0,
        })
    }

    pub fn write_row(&mut self, row: &impl BcpRow) -> Result<()> {
        let line = row.fields().join("\t");
        writeln!(self.out, "{line}").map_err(|e| LoadError::io(&self.path, e))?;
        self.rows += 1;
        Ok(())
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn finish(mut self) -> Result<PathBuf> {
        self.out.flush().map_err(|e| LoadError::io(&self.path, e))?;
        Ok(self.path)
    }
}

/// Every writer a run opened, closed together at one teardown point.
#[derive(Default)]
pub struct OutputSet {
    writers: Vec<BcpWriter>,
}

impl OutputSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a writer and return its index.
    pub fn open(&mut self, path: impl AsRef<Path>) -> Result<usize> {
        self.writers.push(BcpWriter::create(path)?);
        Ok(self.writers.len() - 1)
    }

    pub fn writer(&mut self, index: usize) -> Result<&mut BcpWriter> {
        self.writers
            .get_mut(index)
            .ok_or_else(|| LoadError::config(format!("no output writer #{index}")))
    }

    /// Flush and close every writer. All writers are attempted; the first
    /// failure is returned and later ones are only logged.
    pub fn close_all(self) -> Result<Vec<PathBuf>> {
        let mut closed = Vec::with_capacity(self.writers.len());
        let mut first_error = None;

        for writer in self.writers {
            match writer.finish() {
                Ok(path) => closed.push(path),
                Err(e) if first_error.is_none() => first_error = Some(e),
                Err(e) => warn!(error = %e, "Failed to close output file"),
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(closed),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_key_counter_is_monotonic() {
        let mut keys = KeyCounter::starting_at(1000);
        assert_eq!(keys.next_key(), 1000);
        assert_eq!(keys.next_key(), 1001);
        assert_eq!(keys.next_key(), 1002);
    }

    #[test]
    fn test_relationship_row_layout() {
        let audit = AuditStamp::new(1576, "01/02/2026");
        let row = RelationshipRow {
            key: 5000,
            category_key: 1007,
            object_key_1: 11,
            object_key_2: 22,
            relationship_term_key: 37085930,
            qualifier_key: 11391898,
            evidence_key: 17396909,
            refs_key: 257191,
            audit: &audit,
        };
        assert_eq!(
            row.fields().join("\t"),
            "5000\t1007\t11\t22\t37085930\t11391898\t17396909\t257191\t1576\t1576\t01/02/2026\t01/02/2026"
        );
    }

    #[test]
    fn test_null_marker_is_empty_column() {
        let audit = AuditStamp::new(1600, "01/02/2026");
        let row = StrainMarkerRow {
            key: 7,
            strain_key: 31303,
            marker_key: None,
            refs_key: 282407,
            audit: &audit,
        };
        assert_eq!(row.fields()[2], "");
        assert_eq!(row.fields().len(), 8);
    }

    #[test]
    fn test_accession_row_layout() {
        let audit = AuditStamp::new(1600, "01/02/2026");
        let accession = AccessionId::split("MGP_CAROLIEiJ_G0013919");
        let row = AccessionRow {
            key: 90,
            accession: &accession,
            logical_db_key: 209,
            object_key: 7,
            mgi_type_key: 44,
            audit: &audit,
        };
        assert_eq!(
            row.fields().join("\t"),
            "90\tMGP_CAROLIEiJ_G0013919\tMGP_CAROLIEiJ_G\t13919\t209\t7\t44\t0\t1\t1600\t1600\t01/02/2026\t01/02/2026"
        );
    }

    #[test]
    fn test_writer_set_flushes_on_close() {
        let dir = tempfile::tempdir().unwrap();
        let audit = AuditStamp::new(1, "01/01/2026");
        let mut outputs = OutputSet::new();
        let idx = outputs.open(dir.path().join("ref.bcp")).unwrap();
        outputs
            .writer(idx)
            .unwrap()
            .write_row(&AccessionReferenceRow {
                accession_key: 3,
                refs_key: 4,
                audit: &audit,
            })
            .unwrap();

        let paths = outputs.close_all().unwrap();
        let content = std::fs::read_to_string(&paths[0]).unwrap();
        assert_eq!(content, "3\t4\t1\t1\t01/01/2026\t01/01/2026\n");
    }

    #[test]
    fn test_description_text_is_flattened() {
        assert_eq!(text("a\tb\nc"), "a b c");
    }
}
