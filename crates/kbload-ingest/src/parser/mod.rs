//! Source file parsers
//!
//! Each parser turns one input file into typed records and runs the
//! file-level sanity checks (version header, minimum record count). A failed
//! check is fatal for the whole run.

pub mod gff3;
pub mod obo;
pub mod owl;

use crate::error::{LoadError, Result};
use crate::snapshot::VocabularySnapshot;
use indexmap::IndexMap;
use std::collections::HashSet;
use std::io::Write;
use std::path::Path;
use tracing::debug;

pub use gff3::{AttributeError, AttributeList, B6Group, GffLine, StrainFile};
pub use obo::OboParser;
pub use owl::OwlClassParser;

// ============================================================================
// Term records
// ============================================================================

/// One term from one vocabulary file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TermRecord {
    pub source_id: String,
    pub label: String,
    /// Present only when the ID is in the reference snapshot.
    pub resolved_key: Option<i64>,
    pub is_obsolete: bool,
    pub is_preferred: bool,
    /// Cross-references into the next vocabulary, in file order, deduplicated.
    pub cross_ref_ids: Vec<String>,
    /// Cross-references from the alternate structural location.
    pub secondary_cross_ref_ids: Vec<String>,
}

impl TermRecord {
    pub fn new(source_id: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            source_id: source_id.into(),
            label: label.into(),
            resolved_key: None,
            is_obsolete: false,
            is_preferred: false,
            cross_ref_ids: Vec::new(),
            secondary_cross_ref_ids: Vec::new(),
        }
    }

    /// Fold in the snapshot's view of this ID. The file's obsolete flag is
    /// kept when the snapshot does not know the term.
    pub fn resolve_against(&mut self, snapshot: &VocabularySnapshot) {
        if let Some(status) = snapshot.get(&self.source_id) {
            self.resolved_key = Some(status.key);
            self.is_obsolete |= status.is_obsolete;
            self.is_preferred = status.is_preferred;
        }
    }

    pub fn add_cross_ref(&mut self, id: impl Into<String>) {
        push_unique(&mut self.cross_ref_ids, id.into());
    }

    pub fn add_secondary_cross_ref(&mut self, id: impl Into<String>) {
        push_unique(&mut self.secondary_cross_ref_ids, id.into());
    }
}

fn push_unique(ids: &mut Vec<String>, id: String) {
    if !ids.contains(&id) {
        ids.push(id);
    }
}

// ============================================================================
// Alternate IDs
// ============================================================================

/// IDs a file declares as deprecated aliases (`alt_id`).
#[derive(Debug, Clone, Default)]
pub struct AltIdRegistry {
    ids: HashSet<String>,
}

impl AltIdRegistry {
    pub fn insert(&mut self, id: impl Into<String>) {
        self.ids.insert(id.into());
    }

    pub fn contains(&self, id: &str) -> bool {
        self.ids.contains(id)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

// ============================================================================
// Collections
// ============================================================================

/// Parsed terms keyed by source ID in file order.
///
/// A repeated ID replaces the earlier record (last write wins) but keeps the
/// position of its first occurrence.
#[derive(Debug, Clone, Default)]
pub struct TermCollection {
    vocabulary: String,
    records: IndexMap<String, TermRecord>,
    alt_ids: AltIdRegistry,
}

impl TermCollection {
    pub fn new(vocabulary: impl Into<String>) -> Self {
        Self {
            vocabulary: vocabulary.into(),
            ..Default::default()
        }
    }

    pub fn vocabulary(&self) -> &str {
        &self.vocabulary
    }

    pub fn insert(&mut self, record: TermRecord) {
        if let Some(previous) = self.records.insert(record.source_id.clone(), record) {
            debug!(
                vocabulary = %self.vocabulary,
                id = %previous.source_id,
                "Duplicate term ID, later record replaces earlier"
            );
        }
    }

    pub fn add_alt_id(&mut self, id: impl Into<String>) {
        self.alt_ids.insert(id);
    }

    pub fn get(&self, id: &str) -> Option<&TermRecord> {
        self.records.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.records.contains_key(id)
    }

    pub fn is_alt_id(&self, id: &str) -> bool {
        self.alt_ids.contains(id)
    }

    pub fn alt_ids(&self) -> &AltIdRegistry {
        &self.alt_ids
    }

    pub fn iter(&self) -> impl Iterator<Item = &TermRecord> {
        self.records.values()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Label for report messages, with a placeholder for IDs not in the file.
    pub fn label_or<'a>(&'a self, id: &str, missing: &'a str) -> &'a str {
        self.get(id).map(|r| r.label.as_str()).unwrap_or(missing)
    }

    /// Write a TSV dump of the parsed records for curator inspection.
    pub fn write_dump(&self, path: &Path) -> Result<()> {
        let file = std::fs::File::create(path).map_err(|e| LoadError::io(path, e))?;
        let mut out = std::io::BufWriter::new(file);
        let mut write = || -> std::io::Result<()> {
            writeln!(out, "id\tpreferred\tlabel\tisObsolete\tcrossRefs\tsecondaryCrossRefs")?;
            let mut records: Vec<&TermRecord> = self.records.values().collect();
            records.sort_by(|a, b| a.source_id.cmp(&b.source_id));
            for r in records {
                writeln!(
                    out,
                    "{}\t{}\t{}\t{}\t{}\t{}",
                    r.source_id,
                    u8::from(r.is_preferred),
                    r.label,
                    u8::from(r.is_obsolete),
                    r.cross_ref_ids.join(", "),
                    r.secondary_cross_ref_ids.join(", ")
                )?;
            }
            out.flush()
        };
        write().map_err(|e| LoadError::io(path, e))
    }
}

// ============================================================================
// Sanity checks
// ============================================================================

/// File-level checks shared by every parser.
#[derive(Debug, Clone, Copy)]
pub struct SanityCheck {
    pub min_records: usize,
}

impl SanityCheck {
    pub fn new(min_records: usize) -> Self {
        Self { min_records }
    }

    pub fn check_count(&self, file: &str, actual: usize) -> Result<()> {
        if actual < self.min_records {
            return Err(LoadError::BelowMinimum {
                file: file.to_string(),
                minimum: self.min_records,
                actual,
            });
        }
        Ok(())
    }
}

/// Read an input file, attaching the path to any IO error.
pub fn read_input(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).map_err(|e| LoadError::io(path, e))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::snapshot::TermRow;

    #[test]
    fn test_last_write_wins_keeps_first_position() {
        let mut collection = TermCollection::new("UBERON");
        collection.insert(TermRecord::new("UBERON:1", "first"));
        collection.insert(TermRecord::new("UBERON:2", "second"));
        collection.insert(TermRecord::new("UBERON:1", "replacement"));

        assert_eq!(collection.len(), 2);
        let ids: Vec<&str> = collection.iter().map(|r| r.source_id.as_str()).collect();
        assert_eq!(ids, vec!["UBERON:1", "UBERON:2"]);
        assert_eq!(collection.get("UBERON:1").unwrap().label, "replacement");
    }

    #[test]
    fn test_cross_refs_deduplicate_within_each_set_only() {
        let mut record = TermRecord::new("MP:1", "x");
        record.add_cross_ref("UBERON:1");
        record.add_cross_ref("UBERON:1");
        record.add_secondary_cross_ref("UBERON:1");
        assert_eq!(record.cross_ref_ids, vec!["UBERON:1"]);
        assert_eq!(record.secondary_cross_ref_ids, vec!["UBERON:1"]);
    }

    #[test]
    fn test_resolve_against_snapshot() {
        let snapshot = VocabularySnapshot::from_rows(vec![TermRow {
            accid: "MP:1".into(),
            term_key: 99,
            is_obsolete: true,
            preferred: true,
        }]);
        let mut known = TermRecord::new("MP:1", "x");
        known.resolve_against(&snapshot);
        assert_eq!(known.resolved_key, Some(99));
        assert!(known.is_obsolete && known.is_preferred);

        let mut unknown = TermRecord::new("MP:2", "y");
        unknown.resolve_against(&snapshot);
        assert_eq!(unknown.resolved_key, None);
    }

    #[test]
    fn test_below_minimum_is_fatal() {
        let check = SanityCheck::new(3);
        assert!(check.check_count("uberon.obo", 3).is_ok());
        let err = check.check_count("uberon.obo", 2).unwrap_err();
        assert!(matches!(err, LoadError::BelowMinimum { actual: 2, .. }));
    }
}
