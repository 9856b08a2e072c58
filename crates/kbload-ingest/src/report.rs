//! Curation report
//!
//! Classification outcomes accumulate in buckets while a run is in progress
//! and are rendered once, in a fixed section order, into the curation log.

use crate::config::SecondaryIdPolicy;
use crate::error::{LoadError, Result};
use indexmap::{IndexMap, IndexSet};
use std::collections::HashMap;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;

/// Every outcome bucket either load can produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BucketKind {
    // Relationship load
    SourceNotInDatabase,
    TargetNotInDatabase,
    ObsoleteOrAltSource,
    NoMapping,
    ObsoleteOrAltIntermediate,
    ObsoleteOrAltTarget,
    SecondaryTarget,
    LostMapping,
    SourceFanOut,
    IntermediateFanOut,

    // Strain marker load
    StrainUnresolved,
    BiotypeMissing,
    MgpIdMissing,
    ChromosomeMissing,
    ChromosomeUnresolved,
    StartMissing,
    EndMissing,
    StrandMissing,
    CoordinatesInverted,
    BiotypeUnresolved,
    MarkerNotOfficial,
    MarkerUnresolved,
    MarkerSecondary,
    ExternalIdMalformed,
    ExternalIdMissing,
    ExternalIdMultiple,
    MultipleStrainIds,
}

impl BucketKind {
    /// Buckets that aggregate occurrences per distinct value.
    pub fn is_counted(self) -> bool {
        matches!(self, BucketKind::BiotypeUnresolved)
    }
}

/// How a layout's list buckets treat repeated messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Repeats {
    /// Each distinct message is listed once
    Collapse,
    /// Every occurrence is listed and counted
    Keep,
}

#[derive(Debug, Clone)]
pub enum Bucket {
    Distinct(IndexSet<String>),
    Every(Vec<String>),
    Count(IndexMap<String, usize>),
}

impl Bucket {
    fn for_kind(kind: BucketKind, repeats: Repeats) -> Self {
        if kind.is_counted() {
            return Bucket::Count(IndexMap::new());
        }
        match repeats {
            Repeats::Collapse => Bucket::Distinct(IndexSet::new()),
            Repeats::Keep => Bucket::Every(Vec::new()),
        }
    }

    /// Listed entries: messages, or distinct counted values.
    pub fn len(&self) -> usize {
        match self {
            Bucket::Distinct(messages) => messages.len(),
            Bucket::Every(messages) => messages.len(),
            Bucket::Count(counts) => counts.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// One report section: which bucket, and the header lines above it.
#[derive(Debug, Clone)]
pub struct Section {
    pub kind: BucketKind,
    pub header: String,
}

impl Section {
    pub fn new(kind: BucketKind, header: impl Into<String>) -> Self {
        Self {
            kind,
            header: header.into(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct QcReport {
    layout: Vec<Section>,
    separator_width: usize,
    repeats: Repeats,
    buckets: HashMap<BucketKind, Bucket>,
    summary: Vec<String>,
}

impl QcReport {
    pub fn new(layout: Vec<Section>, separator_width: usize, repeats: Repeats) -> Self {
        Self {
            layout,
            separator_width,
            repeats,
            buckets: HashMap::new(),
            summary: Vec::new(),
        }
    }

    pub fn relationship(policy: SecondaryIdPolicy) -> Self {
        Self::new(relationship_layout(policy), 60, Repeats::Collapse)
    }

    /// Messages are raw input lines, so identical defective lines are each
    /// listed and the section totals match the skipped counts.
    pub fn strain_marker(policy: SecondaryIdPolicy) -> Self {
        Self::new(strain_marker_layout(policy), 80, Repeats::Keep)
    }

    /// Record one outcome. Counted buckets tally occurrences of `message`.
    pub fn log(&mut self, kind: BucketKind, message: impl Into<String>) {
        let repeats = self.repeats;
        match self.buckets.entry(kind).or_insert_with(|| Bucket::for_kind(kind, repeats)) {
            Bucket::Distinct(messages) => {
                messages.insert(message.into());
            },
            Bucket::Every(messages) => messages.push(message.into()),
            Bucket::Count(counts) => {
                *counts.entry(message.into()).or_insert(0) += 1;
            },
        }
    }

    pub fn summary_line(&mut self, line: impl Into<String>) {
        self.summary.push(line.into());
    }

    pub fn bucket(&self, kind: BucketKind) -> Option<&Bucket> {
        self.buckets.get(&kind)
    }

    pub fn count(&self, kind: BucketKind) -> usize {
        self.bucket(kind).map(Bucket::len).unwrap_or(0)
    }

    /// Messages of a list bucket, in insertion order.
    pub fn messages(&self, kind: BucketKind) -> Vec<&str> {
        match self.bucket(kind) {
            Some(Bucket::Distinct(messages)) => messages.iter().map(String::as_str).collect(),
            Some(Bucket::Every(messages)) => messages.iter().map(String::as_str).collect(),
            Some(Bucket::Count(counts)) => counts.keys().map(String::as_str).collect(),
            None => Vec::new(),
        }
    }

    pub fn render(&self) -> String {
        let mut out = String::new();

        if !self.summary.is_empty() {
            out.push('\n');
            for line in &self.summary {
                out.push_str(line);
                out.push_str("\n\n");
            }
        }

        let separator = "-".repeat(self.separator_width);
        for section in &self.layout {
            let Some(bucket) = self.buckets.get(&section.kind).filter(|b| !b.is_empty()) else {
                continue;
            };

            out.push_str(&section.header);
            out.push('\n');
            out.push_str(&separator);
            out.push('\n');
            match bucket {
                Bucket::Distinct(messages) => {
                    for message in messages {
                        out.push_str(message);
                        out.push('\n');
                    }
                },
                Bucket::Every(messages) => {
                    for message in messages {
                        out.push_str(message);
                        out.push('\n');
                    }
                },
                Bucket::Count(counts) => {
                    for (value, n) in counts {
                        out.push_str(&format!("{value}: {n}\n"));
                    }
                },
            }
            out.push_str(&format!("Total: {}\n\n", bucket.len()));
        }

        out
    }

    /// Append the rendered report to the curation log.
    pub fn append_to(&self, path: &Path) -> Result<()> {
        append_to_log(path, &self.render())
    }
}

/// Append text to the curation log, creating it when missing.
pub fn append_to_log(path: &Path, text: &str) -> Result<()> {
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|e| LoadError::io(path, e))?;
    file.write_all(text.as_bytes())
        .map_err(|e| LoadError::io(path, e))
}

fn secondary_effect(policy: SecondaryIdPolicy) -> &'static str {
    match policy {
        SecondaryIdPolicy::Load => "loaded",
        SecondaryIdPolicy::Skip => "skipped",
    }
}

pub fn relationship_layout(policy: SecondaryIdPolicy) -> Vec<Section> {
    use BucketKind::*;
    vec![
        Section::new(SourceNotInDatabase, "MP Terms in the MP OWL file not in the database"),
        Section::new(TargetNotInDatabase, "EMAPA Terms in the EMAPA OBO file not in the database"),
        Section::new(ObsoleteOrAltSource, "Obsolete MP Terms in the MP OWL file"),
        Section::new(
            NoMapping,
            "MP Terms that do not map to EMAPA\n\
             When MP and Uberon ID reported, Uberon ID not in Uberon file\n\
             When MP, Uberon ID and EMAPA reported, EMAPA not in EMAPA file or no EMAPA cross reference",
        ),
        Section::new(ObsoleteOrAltIntermediate, "Obsolete or Alt Uberon Terms in the MP File"),
        Section::new(ObsoleteOrAltTarget, "Obsolete or Alt EMAPA Terms in the Uberon File"),
        Section::new(
            SecondaryTarget,
            format!(
                "Secondary EMAPA IDs in the Uberon File, relationship(s) {}",
                secondary_effect(policy)
            ),
        ),
        Section::new(
            LostMapping,
            "EMAPA from \"someValuesFrom\" lost because using EMAPA from Description",
        ),
        Section::new(SourceFanOut, "MP Terms that Map to Multiple Uberon Terms"),
        Section::new(IntermediateFanOut, "Uberon Terms that Map to Multiple EMAPA Terms"),
    ]
}

pub fn strain_marker_layout(policy: SecondaryIdPolicy) -> Vec<Section> {
    use BucketKind::*;
    let secondary = match policy {
        SecondaryIdPolicy::Load => "Marker from input is secondary ID, strain marker created",
        SecondaryIdPolicy::Skip => {
            "Marker from input is secondary ID, strain marker created with null marker"
        },
    };
    vec![
        Section::new(StrainUnresolved, "Strain from input unresolved, load fails"),
        Section::new(BiotypeMissing, "Biotype missing from input, record(s) skipped"),
        Section::new(MgpIdMissing, "MGP ID missing from input, record(s) skipped"),
        Section::new(ChromosomeUnresolved, "Chromosome from input unresolved, record(s) skipped"),
        Section::new(ChromosomeMissing, "Chromosome missing from input, record(s) skipped"),
        Section::new(StartMissing, "Start Coordinate missing from input, record(s) skipped"),
        Section::new(EndMissing, "End Coordinate missing from input, record(s) skipped"),
        Section::new(StrandMissing, "Strand missing from input, record(s) skipped"),
        Section::new(CoordinatesInverted, "Start Coordinate > End Coordinate, record(s) skipped"),
        Section::new(BiotypeUnresolved, "Biotype from input unresolved, record(s) skipped"),
        Section::new(
            MarkerNotOfficial,
            "Marker from input is not official, strain marker created with null marker",
        ),
        Section::new(
            MarkerUnresolved,
            "Ensembl ID from input unresolved, strain marker created with null marker",
        ),
        Section::new(MarkerSecondary, secondary),
        Section::new(
            ExternalIdMalformed,
            "projection_parent_gene from input not an Ensembl ID, strain marker created with null marker",
        ),
        Section::new(
            ExternalIdMissing,
            "projection_parent_gene missing from input, strain marker created with null marker",
        ),
        Section::new(
            ExternalIdMultiple,
            "Ensembl ID associated with > 1 marker, strain marker created with null marker",
        ),
        Section::new(
            MultipleStrainIds,
            "Markers from input with > 1 Strain specific MGP ID, report and load strain marker and MGI marker association",
        ),
    ]
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_buckets_are_omitted() {
        let mut report = QcReport::relationship(SecondaryIdPolicy::Load);
        report.log(BucketKind::NoMapping, "MP:1 x UBERON:1");
        let text = report.render();
        assert!(text.contains("MP Terms that do not map to EMAPA"));
        assert!(!text.contains("not in the database"));
        assert!(text.contains("Total: 1"));
    }

    #[test]
    fn test_sections_follow_layout_order() {
        let mut report = QcReport::relationship(SecondaryIdPolicy::Load);
        report.log(BucketKind::IntermediateFanOut, "fan");
        report.log(BucketKind::SourceNotInDatabase, "missing");
        let text = report.render();
        let missing = text.find("not in the database").unwrap();
        let fan = text.find("Map to Multiple EMAPA").unwrap();
        assert!(missing < fan);
    }

    #[test]
    fn test_list_buckets_deduplicate_messages() {
        let mut report = QcReport::relationship(SecondaryIdPolicy::Load);
        report.log(BucketKind::ObsoleteOrAltSource, "MP:9 (gone)");
        report.log(BucketKind::ObsoleteOrAltSource, "MP:9 (gone)");
        assert_eq!(report.count(BucketKind::ObsoleteOrAltSource), 1);
    }

    #[test]
    fn test_strain_marker_buckets_list_every_line() {
        let line = "1\tmgp\tgene\t100\t200\t.\t\t.\tID=gene:MGP_X_G001;biotype=protein_coding";
        let mut report = QcReport::strain_marker(SecondaryIdPolicy::Load);
        report.log(BucketKind::StrandMissing, line);
        report.log(BucketKind::StrandMissing, line);
        assert_eq!(report.count(BucketKind::StrandMissing), 2);

        let text = report.render();
        assert_eq!(text.matches(line).count(), 2);
        assert!(text.contains("Total: 2\n"));
    }

    #[test]
    fn test_count_bucket_tallies_distinct_values() {
        let mut report = QcReport::strain_marker(SecondaryIdPolicy::Load);
        report.log(BucketKind::BiotypeUnresolved, "weird_rna");
        report.log(BucketKind::BiotypeUnresolved, "weird_rna");
        report.log(BucketKind::BiotypeUnresolved, "odd_gene");
        assert_eq!(report.count(BucketKind::BiotypeUnresolved), 2);

        let text = report.render();
        assert!(text.contains("weird_rna: 2\n"));
        assert!(text.contains("odd_gene: 1\n"));
        assert!(text.contains(&"-".repeat(80)));
        assert!(text.contains("Total: 2"));
    }

    #[test]
    fn test_append_keeps_existing_log() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("curator.log");
        std::fs::write(&path, "earlier run\n").unwrap();

        let mut report = QcReport::relationship(SecondaryIdPolicy::Skip);
        report.summary_line("3 Relationships Loaded");
        report.append_to(&path).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.starts_with("earlier run\n"));
        assert!(text.contains("3 Relationships Loaded"));
    }
}
