// Strain gene model classification

use super::{Rejection, Verdict};
use crate::config::SecondaryIdPolicy;
use crate::error::{LoadError, Result};
use crate::parser::{AttributeError, GffLine, StrainFile};
use crate::report::{BucketKind, QcReport};
use crate::snapshot::{MarkerEntry, StrainMarkerSnapshot};
use indexmap::IndexMap;
use regex::Regex;
use tracing::info;

/// Attribute holding the Ensembl gene a strain gene was projected from.
pub const EXTERNAL_ID_ATTRIBUTE: &str = "projection_parent_gene";
/// Prefix of synthetic marker IDs given to markerless records.
pub const PLACEHOLDER_PREFIX: &str = "TEMP:";

/// One strain gene that passed every skip check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StrainGeneRecord {
    pub mgp_id: String,
    /// MGI ID, or a `TEMP:n` placeholder when the marker was nulled
    pub marker_id: String,
    pub marker_key: Option<i64>,
    pub symbol: Option<String>,
    pub chromosome: String,
    pub start: u64,
    pub end: u64,
    pub strand: String,
    pub feature_type: String,
}

impl StrainGeneRecord {
    pub fn is_markerless(&self) -> bool {
        self.marker_key.is_none()
    }
}

/// One strain file after classification. Records are grouped by marker ID in
/// first-seen order.
#[derive(Debug, Clone)]
pub struct ClassifiedStrain {
    pub strain_key: i64,
    pub strain_name: String,
    pub groups: IndexMap<String, Vec<StrainGeneRecord>>,
    pub input_count: usize,
    pub skipped: usize,
}

impl ClassifiedStrain {
    pub fn records(&self) -> impl Iterator<Item = &StrainGeneRecord> {
        self.groups.values().flatten()
    }

    pub fn loaded(&self) -> usize {
        self.input_count - self.skipped
    }

    pub fn loaded_without_marker(&self) -> usize {
        self.records().filter(|r| r.is_markerless()).count()
    }
}

/// Fields of a line that passed the skip checks.
struct Located<'l> {
    mgp_id: &'l str,
    chromosome: &'l str,
    start: u64,
    end: u64,
    strand: &'l str,
    feature_type: String,
}

pub struct MarkerClassifier<'a> {
    snapshot: &'a StrainMarkerSnapshot,
    ensembl_pattern: Regex,
    policy: SecondaryIdPolicy,
    placeholders: usize,
}

impl<'a> MarkerClassifier<'a> {
    pub fn new(snapshot: &'a StrainMarkerSnapshot, ensembl_prefix: &str, policy: SecondaryIdPolicy) -> Result<Self> {
        let pattern = format!("^{}[A-Z]*[0-9]+$", regex::escape(ensembl_prefix));
        let ensembl_pattern = Regex::new(&pattern)
            .map_err(|e| LoadError::config(format!("invalid Ensembl prefix '{ensembl_prefix}': {e}")))?;
        Ok(Self {
            snapshot,
            ensembl_pattern,
            policy,
            placeholders: 0,
        })
    }

    /// Markerless records seen so far across every strain file.
    pub fn placeholders_issued(&self) -> usize {
        self.placeholders
    }

    /// Classify one strain file. Returns `None` when its strain name does not
    /// resolve; the caller must treat that as fatal once the report is out.
    pub fn classify_strain(&mut self, file: &StrainFile, report: &mut QcReport) -> Option<ClassifiedStrain> {
        let Some(strain) = self.snapshot.strain(&file.strain_name) else {
            report.log(BucketKind::StrainUnresolved, file.strain_name.clone());
            return None;
        };

        let mut classified = ClassifiedStrain {
            strain_key: strain.key,
            strain_name: strain.name.clone(),
            groups: IndexMap::new(),
            input_count: file.lines.len(),
            skipped: 0,
        };

        for line in &file.lines {
            let Some(located) = self.locate(line, report) else {
                classified.skipped += 1;
                continue;
            };

            let marker = match self.resolve_marker(line) {
                Ok(marker) => self.apply_secondary_policy(marker, line, report),
                Err(rejection) => {
                    report.log(rejection.bucket, rejection.message);
                    None
                },
            };

            let record = self.build_record(located, marker);
            classified
                .groups
                .entry(record.marker_id.clone())
                .or_default()
                .push(record);
        }

        for (marker_id, records) in &classified.groups {
            if records.len() > 1 && !marker_id.starts_with(PLACEHOLDER_PREFIX) {
                let ids: Vec<&str> = records.iter().map(|r| r.mgp_id.as_str()).collect();
                report.log(BucketKind::MultipleStrainIds, format!("{}: {}", marker_id, ids.join(", ")));
            }
        }

        info!(
            strain = %classified.strain_name,
            input = classified.input_count,
            skipped = classified.skipped,
            without_marker = classified.loaded_without_marker(),
            "Classified strain gene models"
        );
        Some(classified)
    }

    /// Skip checks. Every defect on the line is reported, not only the first.
    fn locate<'l>(&self, line: &'l GffLine, report: &mut QcReport) -> Option<Located<'l>> {
        let raw = line.display();
        let mut skip = false;

        let chromosome = match line.chromosome() {
            Ok(chr) if self.snapshot.has_chromosome(chr) => Some(chr),
            Ok(_) => {
                report.log(BucketKind::ChromosomeUnresolved, raw);
                None
            },
            Err(_) => {
                report.log(BucketKind::ChromosomeMissing, raw);
                None
            },
        };
        skip |= chromosome.is_none();

        let start = line.start().map_err(|_| report.log(BucketKind::StartMissing, raw)).ok();
        let end = line.end().map_err(|_| report.log(BucketKind::EndMissing, raw)).ok();
        skip |= start.is_none() || end.is_none();
        if let (Some(s), Some(e)) = (start, end) {
            if s > e {
                report.log(BucketKind::CoordinatesInverted, raw);
                skip = true;
            }
        }

        let strand = line.strand().map_err(|_| report.log(BucketKind::StrandMissing, raw)).ok();
        skip |= strand.is_none();

        let feature_type = match line.biotype() {
            Ok(biotype) => match self.snapshot.feature_type_for(biotype) {
                Some(feature_type) => Some(feature_type.to_string()),
                None => {
                    report.log(BucketKind::BiotypeUnresolved, biotype);
                    None
                },
            },
            Err(_) => {
                report.log(BucketKind::BiotypeMissing, raw);
                None
            },
        };
        skip |= feature_type.is_none();

        let mgp_id = line.local_gene_id().map_err(|_| report.log(BucketKind::MgpIdMissing, raw)).ok();
        skip |= mgp_id.is_none();

        if skip {
            return None;
        }
        Some(Located {
            mgp_id: mgp_id?,
            chromosome: chromosome?,
            start: start?,
            end: end?,
            strand: strand?,
            feature_type: feature_type?,
        })
    }

    /// Degrade chain: the first failing step nulls the marker.
    fn resolve_marker(&self, line: &GffLine) -> Verdict<&'a MarkerEntry> {
        let raw = line.display();

        let ensembl_id = match line.external_id(EXTERNAL_ID_ATTRIBUTE, &self.ensembl_pattern) {
            Ok(id) => id,
            Err(AttributeError::Absent(_)) => return Err(Rejection::new(BucketKind::ExternalIdMissing, raw)),
            Err(AttributeError::Malformed { .. }) => {
                return Err(Rejection::new(BucketKind::ExternalIdMalformed, raw))
            },
        };

        let mgi_id = match self.snapshot.ensembl_markers(&ensembl_id) {
            [] => {
                return Err(Rejection::new(
                    BucketKind::MarkerUnresolved,
                    format!("{} : {}", ensembl_id, raw),
                ))
            },
            [single] => single,
            many => {
                return Err(Rejection::new(
                    BucketKind::ExternalIdMultiple,
                    format!("{} : {} : {}", ensembl_id, many.join(", "), raw),
                ))
            },
        };

        let marker = self.snapshot.marker(mgi_id).ok_or_else(|| {
            Rejection::new(BucketKind::MarkerUnresolved, format!("{} : {}", mgi_id, raw))
        })?;

        if !marker.is_official() {
            return Err(Rejection::new(
                BucketKind::MarkerNotOfficial,
                format!("{} : {}", mgi_id, raw),
            ));
        }
        Ok(marker)
    }

    fn apply_secondary_policy(
        &self,
        marker: &'a MarkerEntry,
        line: &GffLine,
        report: &mut QcReport,
    ) -> Option<&'a MarkerEntry> {
        if marker.is_preferred {
            return Some(marker);
        }
        report.log(
            BucketKind::MarkerSecondary,
            format!("{} : {}", marker.mgi_id, line.display()),
        );
        match self.policy {
            SecondaryIdPolicy::Load => Some(marker),
            SecondaryIdPolicy::Skip => None,
        }
    }

    fn build_record(&mut self, located: Located<'_>, marker: Option<&MarkerEntry>) -> StrainGeneRecord {
        let (marker_id, marker_key, symbol) = match marker {
            Some(m) => (m.mgi_id.clone(), Some(m.key), Some(m.symbol.clone())),
            None => {
                self.placeholders += 1;
                (format!("{}{}", PLACEHOLDER_PREFIX, self.placeholders), None, None)
            },
        };

        StrainGeneRecord {
            mgp_id: located.mgp_id.to_string(),
            marker_id,
            marker_key,
            symbol,
            chromosome: located.chromosome.to_string(),
            start: located.start,
            end: located.end,
            strand: located.strand.to_string(),
            feature_type: located.feature_type,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::parser::gff3::parse_strain_file;
    use crate::parser::SanityCheck;
    use crate::snapshot::{
        BiotypeRow, ChromosomeRow, EnsemblMarkerRow, MarkerRow, StrainMarkerRows, StrainTranslationRow,
    };

    fn snapshot() -> StrainMarkerSnapshot {
        let rows = StrainMarkerRows {
            strains: vec![StrainTranslationRow {
                bad_name: "CAROLI/EiJ".into(),
                strain_key: 31303,
                strain: "CAROLI/EiJ".into(),
            }],
            markers: vec![
                MarkerRow {
                    mgi_id: "MGI:3528744".into(),
                    marker_key: 501,
                    symbol: "Xkr4".into(),
                    status: "official".into(),
                    preferred: true,
                },
                MarkerRow {
                    mgi_id: "MGI:2".into(),
                    marker_key: 502,
                    symbol: "Old".into(),
                    status: "withdrawn".into(),
                    preferred: true,
                },
                MarkerRow {
                    mgi_id: "MGI:3".into(),
                    marker_key: 503,
                    symbol: "Sec".into(),
                    status: "official".into(),
                    preferred: false,
                },
            ],
            ensembl_markers: vec![
                EnsemblMarkerRow {
                    ensembl_id: "ENSMUSG00000051951".into(),
                    mgi_id: "MGI:3528744".into(),
                },
                EnsemblMarkerRow {
                    ensembl_id: "ENSMUSG00000000002".into(),
                    mgi_id: "MGI:2".into(),
                },
                EnsemblMarkerRow {
                    ensembl_id: "ENSMUSG00000000003".into(),
                    mgi_id: "MGI:3".into(),
                },
                EnsemblMarkerRow {
                    ensembl_id: "ENSMUSG00000000009".into(),
                    mgi_id: "MGI:3528744".into(),
                },
                EnsemblMarkerRow {
                    ensembl_id: "ENSMUSG00000000009".into(),
                    mgi_id: "MGI:2".into(),
                },
            ],
            chromosomes: vec![ChromosomeRow {
                chromosome: "1".into(),
                chromosome_key: 1,
            }],
            biotypes: vec![BiotypeRow {
                raw_biotype: "protein_coding".into(),
                feature_type: "protein coding gene".into(),
            }],
            feature_types: vec!["protein coding gene".into()],
        };
        StrainMarkerSnapshot::from_rows(rows, 1000, 2000)
    }

    fn line(mgp: &str, extra: &str) -> String {
        format!("1\tmgp\tgene\t100\t200\t.\t+\t.\tID=gene:{mgp};biotype=protein_coding{extra}")
    }

    fn classify(lines: &[String], policy: SecondaryIdPolicy) -> (Option<ClassifiedStrain>, QcReport) {
        let content = format!("CAROLI/EiJ\n{}\n", lines.join("\n"));
        let file = parse_strain_file("caroli.txt", &content, SanityCheck::new(0)).unwrap();
        let snapshot = snapshot();
        let mut classifier = MarkerClassifier::new(&snapshot, "ENSMUS", policy).unwrap();
        let mut report = QcReport::strain_marker(policy);
        let classified = classifier.classify_strain(&file, &mut report);
        (classified, report)
    }

    #[test]
    fn test_resolved_marker() {
        let (classified, report) = classify(
            &[line("MGP_X_G001", ";projection_parent_gene=ENSMUSG00000051951.5")],
            SecondaryIdPolicy::Load,
        );
        let classified = classified.unwrap();
        let record = classified.records().next().unwrap();
        assert_eq!(record.marker_key, Some(501));
        assert_eq!(record.symbol.as_deref(), Some("Xkr4"));
        assert_eq!(record.feature_type, "protein coding gene");
        assert!(report.render().is_empty());
    }

    #[test]
    fn test_degraded_records_get_unique_placeholders() {
        let (classified, report) = classify(
            &[
                line("MGP_X_G001", ";projection_parent_gene=OTTMUSG01.1"),
                line("MGP_X_G002", ""),
                line("MGP_X_G003", ";projection_parent_gene=ENSMUSG00000000009"),
                line("MGP_X_G004", ";projection_parent_gene=ENSMUSG00000000002"),
                line("MGP_X_G005", ";projection_parent_gene=ENSMUSG00000077777"),
            ],
            SecondaryIdPolicy::Load,
        );
        let classified = classified.unwrap();
        let ids: Vec<&str> = classified.records().map(|r| r.marker_id.as_str()).collect();
        assert_eq!(ids, vec!["TEMP:1", "TEMP:2", "TEMP:3", "TEMP:4", "TEMP:5"]);
        assert!(classified.records().all(|r| r.marker_key.is_none()));
        assert_eq!(report.count(BucketKind::ExternalIdMalformed), 1);
        assert_eq!(report.count(BucketKind::ExternalIdMissing), 1);
        assert_eq!(report.count(BucketKind::ExternalIdMultiple), 1);
        assert_eq!(report.count(BucketKind::MarkerNotOfficial), 1);
        assert_eq!(report.count(BucketKind::MarkerUnresolved), 1);
    }

    #[test]
    fn test_additive_skip_defects() {
        let bad = "\tmgp\tgene\t300\t200\t.\t\t.\tbiotype=mystery".to_string();
        let (classified, report) = classify(&[bad], SecondaryIdPolicy::Load);
        let classified = classified.unwrap();
        assert_eq!(classified.skipped, 1);
        assert_eq!(classified.records().count(), 0);
        for kind in [
            BucketKind::ChromosomeMissing,
            BucketKind::CoordinatesInverted,
            BucketKind::StrandMissing,
            BucketKind::BiotypeUnresolved,
            BucketKind::MgpIdMissing,
        ] {
            assert_eq!(report.count(kind), 1, "{kind:?}");
        }
    }

    #[test]
    fn test_short_line_is_a_skip_defect() {
        let short = "1\tmgp\tgene\t100\t200\t.\t+\t.".to_string();
        let (classified, report) = classify(&[short, line("MGP_X_G001", "")], SecondaryIdPolicy::Load);
        let classified = classified.unwrap();
        assert_eq!(classified.skipped, 1);
        assert_eq!(classified.records().count(), 1);
        assert_eq!(report.count(BucketKind::BiotypeMissing), 1);
        assert_eq!(report.count(BucketKind::MgpIdMissing), 1);
        assert_eq!(report.count(BucketKind::StrandMissing), 0);
    }

    #[test]
    fn test_repeated_defective_lines_are_each_reported() {
        let bad = "1\tmgp\tgene\t100\t200\t.\t\t.\tID=gene:MGP_X_G001;biotype=protein_coding".to_string();
        let (classified, report) = classify(&[bad.clone(), bad], SecondaryIdPolicy::Load);
        assert_eq!(classified.unwrap().skipped, 2);
        assert_eq!(report.count(BucketKind::StrandMissing), 2);
    }

    #[test]
    fn test_secondary_marker_policy() {
        let lines = [line("MGP_X_G001", ";projection_parent_gene=ENSMUSG00000000003")];

        let (classified, report) = classify(&lines, SecondaryIdPolicy::Load);
        assert_eq!(classified.unwrap().records().next().unwrap().marker_key, Some(503));
        assert_eq!(report.count(BucketKind::MarkerSecondary), 1);

        let (classified, _) = classify(&lines, SecondaryIdPolicy::Skip);
        assert!(classified.unwrap().records().next().unwrap().is_markerless());
    }

    #[test]
    fn test_multiple_strain_ids_per_marker() {
        let (classified, report) = classify(
            &[
                line("MGP_X_G001", ";projection_parent_gene=ENSMUSG00000051951"),
                line("MGP_X_G002", ";projection_parent_gene=ENSMUSG00000051951"),
            ],
            SecondaryIdPolicy::Load,
        );
        assert_eq!(classified.unwrap().groups.len(), 1);
        assert_eq!(
            report.messages(BucketKind::MultipleStrainIds),
            vec!["MGI:3528744: MGP_X_G001, MGP_X_G002"]
        );
    }

    #[test]
    fn test_unresolved_strain() {
        let file = parse_strain_file("x.txt", "NOSUCH/J\n", SanityCheck::new(0)).unwrap();
        let snapshot = snapshot();
        let mut classifier = MarkerClassifier::new(&snapshot, "ENSMUS", SecondaryIdPolicy::Load).unwrap();
        let mut report = QcReport::strain_marker(SecondaryIdPolicy::Load);
        assert!(classifier.classify_strain(&file, &mut report).is_none());
        assert_eq!(report.messages(BucketKind::StrainUnresolved), vec!["NOSUCH/J"]);
    }
}
