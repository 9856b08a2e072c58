// Relationship classification (source -> intermediate -> target)

use super::{Rejection, Verdict};
use crate::config::SecondaryIdPolicy;
use crate::parser::{TermCollection, TermRecord};
use crate::report::{BucketKind, QcReport};
use crate::resolve::{Candidate, CrossReferenceResolver, ResolutionEvent};
use std::collections::HashSet;
use tracing::{debug, info};

const NOT_IN_FILE: &str = "not in file";
const ALT_ID: &str = "altId";

/// A fully resolved relationship ready for serialization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AcceptedRelationship {
    pub source_id: String,
    pub source_key: i64,
    pub intermediate_id: String,
    pub target_id: String,
    pub target_key: i64,
}

struct Accepted<'a> {
    target: &'a TermRecord,
    target_key: i64,
}

pub struct RelationshipClassifier<'a> {
    source: &'a TermCollection,
    intermediate: &'a TermCollection,
    target: &'a TermCollection,
    policy: SecondaryIdPolicy,
}

impl<'a> RelationshipClassifier<'a> {
    pub fn new(
        source: &'a TermCollection,
        intermediate: &'a TermCollection,
        target: &'a TermCollection,
        policy: SecondaryIdPolicy,
    ) -> Self {
        Self {
            source,
            intermediate,
            target,
            policy,
        }
    }

    /// Classify every source record in file order. Accepted relationships
    /// come back in that same order; everything else goes to `report`.
    pub fn classify(&self, report: &mut QcReport) -> Vec<AcceptedRelationship> {
        let resolver = CrossReferenceResolver::new(self.intermediate, self.target);
        let mut accepted = Vec::new();
        let mut without_xrefs = 0usize;

        for source in self.source.iter() {
            let source_key = match self.gate(source) {
                Ok(key) => key,
                Err(rejection) => {
                    report.log(rejection.bucket, rejection.message);
                    continue;
                },
            };

            let resolution = resolver.resolve(source);
            if resolution.candidates.is_empty() {
                without_xrefs += 1;
            }

            for event in &resolution.events {
                let (bucket, message) = self.describe(event, source);
                report.log(bucket, message);
            }

            for candidate in &resolution.candidates {
                match self.evaluate(candidate) {
                    Ok(ok) => {
                        if !ok.target.is_preferred {
                            report.log(BucketKind::SecondaryTarget, self.secondary_message(candidate, ok.target));
                        }
                        accepted.push(AcceptedRelationship {
                            source_id: source.source_id.clone(),
                            source_key,
                            intermediate_id: candidate.intermediate_id.to_string(),
                            target_id: ok.target.source_id.clone(),
                            target_key: ok.target_key,
                        });
                    },
                    Err(rejection) => report.log(rejection.bucket, rejection.message),
                }
            }
        }

        debug!(without_xrefs, "Source terms without cross-references");
        info!(
            sources = self.source.len(),
            accepted = accepted.len(),
            "Classified relationships"
        );
        accepted
    }

    /// Source-side checks, run once per source record before resolution.
    fn gate(&self, source: &TermRecord) -> Verdict<i64> {
        match source.resolved_key {
            None => Err(Rejection::new(
                BucketKind::SourceNotInDatabase,
                format!("{} ({})", source.source_id, source.label),
            )),
            Some(_) if source.is_obsolete => Err(Rejection::new(
                BucketKind::ObsoleteOrAltSource,
                format!("{} ({})", source.source_id, source.label),
            )),
            Some(key) => Ok(key),
        }
    }

    fn evaluate(&self, candidate: &Candidate<'a>) -> Verdict<Accepted<'a>> {
        let intermediate = self.check_intermediate(candidate)?;
        self.check_target(candidate, intermediate)
    }

    fn check_intermediate(&self, candidate: &Candidate<'a>) -> Verdict<&'a TermRecord> {
        let source = candidate.source;
        let id = candidate.intermediate_id;
        let vocabulary = self.intermediate.vocabulary();

        if self.intermediate.is_alt_id(id) && !self.intermediate.contains(id) {
            return Err(Rejection::new(
                BucketKind::ObsoleteOrAltIntermediate,
                format!(
                    "{} ({}) {} id is alternate id: {} ({})",
                    source.source_id, source.label, vocabulary, id, ALT_ID
                ),
            ));
        }

        let record = match candidate.intermediate {
            Some(record) if record.is_obsolete => {
                return Err(Rejection::new(
                    BucketKind::ObsoleteOrAltIntermediate,
                    format!(
                        "{} ({}) {} id is obsolete: {} ({})",
                        source.source_id, source.label, vocabulary, id, record.label
                    ),
                ))
            },
            Some(record) => record,
            None => {
                return Err(Rejection::new(
                    BucketKind::NoMapping,
                    format!("{} {} {}", source.source_id, source.label, id),
                ))
            },
        };

        if record.cross_ref_ids.is_empty() {
            return Err(Rejection::new(
                BucketKind::NoMapping,
                format!("{} {} {} {}", source.source_id, source.label, id, record.label),
            ));
        }
        Ok(record)
    }

    fn check_target(&self, candidate: &Candidate<'a>, intermediate: &'a TermRecord) -> Verdict<Accepted<'a>> {
        let source = candidate.source;
        let vocabulary = self.target.vocabulary();
        let Some(id) = candidate.target_id else {
            // resolver only leaves the target open for unexpandable hops
            return Err(Rejection::new(
                BucketKind::NoMapping,
                format!("{} {} {} {}", source.source_id, source.label, intermediate.source_id, intermediate.label),
            ));
        };

        if self.target.is_alt_id(id) && !self.target.contains(id) {
            return Err(Rejection::new(
                BucketKind::ObsoleteOrAltTarget,
                format!(
                    "{} ({}) {} id is alternate id: {} ({})",
                    intermediate.source_id, intermediate.label, vocabulary, id, ALT_ID
                ),
            ));
        }

        let target = match candidate.target {
            Some(target) if target.is_obsolete => {
                return Err(Rejection::new(
                    BucketKind::ObsoleteOrAltTarget,
                    format!(
                        "{} ({}) {} id is obsolete: {} ({})",
                        intermediate.source_id, intermediate.label, vocabulary, id, target.label
                    ),
                ))
            },
            Some(target) => target,
            None => {
                return Err(Rejection::new(
                    BucketKind::NoMapping,
                    format!(
                        "{} ({}) {} ({}) {}",
                        source.source_id, source.label, intermediate.source_id, intermediate.label, id
                    ),
                ))
            },
        };

        let Some(target_key) = target.resolved_key else {
            return Err(Rejection::new(
                BucketKind::TargetNotInDatabase,
                format!("{} ({})", target.source_id, target.label),
            ));
        };

        if !target.is_preferred && self.policy == SecondaryIdPolicy::Skip {
            return Err(Rejection::new(
                BucketKind::SecondaryTarget,
                self.secondary_message(candidate, target),
            ));
        }

        Ok(Accepted { target, target_key })
    }

    fn secondary_message(&self, candidate: &Candidate<'_>, target: &TermRecord) -> String {
        format!(
            "{} ({}) {} {} ({})",
            candidate.source.source_id, candidate.source.label, candidate.intermediate_id, target.source_id, target.label
        )
    }

    fn intermediate_label(&self, id: &str) -> &str {
        if self.intermediate.contains(id) {
            self.intermediate.label_or(id, NOT_IN_FILE)
        } else if self.intermediate.is_alt_id(id) {
            ALT_ID
        } else {
            NOT_IN_FILE
        }
    }

    fn target_label(&self, id: &str) -> &str {
        if self.target.contains(id) {
            self.target.label_or(id, NOT_IN_FILE)
        } else if self.target.is_alt_id(id) {
            ALT_ID
        } else {
            NOT_IN_FILE
        }
    }

    fn describe(&self, event: &ResolutionEvent, source: &TermRecord) -> (BucketKind, String) {
        match event {
            ResolutionEvent::LostMapping { lost, .. } => {
                let lost: Vec<String> = lost
                    .iter()
                    .map(|(b, targets)| format!("{} {}", b, targets.join(", ")))
                    .collect();
                (
                    BucketKind::LostMapping,
                    format!("{} {} {}", source.source_id, source.label, lost.join("; ")),
                )
            },
            ResolutionEvent::SourceFanOut { intermediate_ids, .. } => {
                let paths: Vec<String> = intermediate_ids
                    .iter()
                    .map(|id| format!("{} ({})", id, self.intermediate_label(id)))
                    .collect();
                (
                    BucketKind::SourceFanOut,
                    format!("{} ({}) {}", source.source_id, source.label, paths.join(", ")),
                )
            },
            ResolutionEvent::IntermediateFanOut {
                intermediate_id,
                target_ids,
            } => {
                let paths: Vec<String> = target_ids
                    .iter()
                    .map(|id| format!("{} ({})", id, self.target_label(id)))
                    .collect();
                (
                    BucketKind::IntermediateFanOut,
                    format!(
                        "{} ({}): {}",
                        intermediate_id,
                        self.intermediate_label(intermediate_id),
                        paths.join(", ")
                    ),
                )
            },
        }
    }
}

/// Summary lines for the top of the report.
pub fn summarize(accepted: &[AcceptedRelationship], report: &mut QcReport, source_vocab: &str, target_vocab: &str) {
    let sources: HashSet<&str> = accepted.iter().map(|r| r.source_id.as_str()).collect();
    let targets: HashSet<&str> = accepted.iter().map(|r| r.target_id.as_str()).collect();
    report.summary_line(format!("{} Relationships Loaded", accepted.len()));
    report.summary_line(format!("{} Distinct {} Loaded", sources.len(), source_vocab));
    report.summary_line(format!("{} Distinct {} Loaded", targets.len(), target_vocab));
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn term(id: &str, key: Option<i64>, xrefs: &[&str]) -> TermRecord {
        let mut record = TermRecord::new(id, format!("{id} label"));
        record.resolved_key = key;
        record.is_preferred = key.is_some();
        for x in xrefs {
            record.add_cross_ref(*x);
        }
        record
    }

    fn collection(vocab: &str, records: Vec<TermRecord>) -> TermCollection {
        let mut c = TermCollection::new(vocab);
        for r in records {
            c.insert(r);
        }
        c
    }

    struct Fixture {
        mp: TermCollection,
        uberon: TermCollection,
        emapa: TermCollection,
    }

    impl Fixture {
        fn run(&self, policy: SecondaryIdPolicy) -> (Vec<AcceptedRelationship>, QcReport) {
            let mut report = QcReport::relationship(policy);
            let accepted = RelationshipClassifier::new(&self.mp, &self.uberon, &self.emapa, policy).classify(&mut report);
            (accepted, report)
        }
    }

    fn basic() -> Fixture {
        Fixture {
            mp: collection("MP", vec![term("MP:1", Some(10), &["UBERON:1"])]),
            uberon: collection("UBERON", vec![term("UBERON:1", None, &["EMAPA:1"])]),
            emapa: collection("EMAPA", vec![term("EMAPA:1", Some(100), &[])]),
        }
    }

    #[test]
    fn test_single_path_accepted() {
        let (accepted, report) = basic().run(SecondaryIdPolicy::Load);
        assert_eq!(accepted.len(), 1);
        assert_eq!(accepted[0].source_key, 10);
        assert_eq!(accepted[0].target_key, 100);
        assert!(report.render().is_empty());
    }

    #[test]
    fn test_source_not_in_database() {
        let mut fixture = basic();
        fixture.mp = collection("MP", vec![term("MP:1", None, &["UBERON:1"])]);
        let (accepted, report) = fixture.run(SecondaryIdPolicy::Load);
        assert!(accepted.is_empty());
        assert_eq!(report.messages(BucketKind::SourceNotInDatabase), vec!["MP:1 (MP:1 label)"]);
    }

    #[test]
    fn test_obsolete_source_reported_once() {
        let mut fixture = basic();
        let mut source = term("MP:1", Some(10), &["UBERON:1", "UBERON:2"]);
        source.is_obsolete = true;
        fixture.mp = collection("MP", vec![source]);
        let (accepted, report) = fixture.run(SecondaryIdPolicy::Load);
        assert!(accepted.is_empty());
        assert_eq!(report.count(BucketKind::ObsoleteOrAltSource), 1);
        assert_eq!(report.count(BucketKind::SourceFanOut), 0);
    }

    #[test]
    fn test_alternate_intermediate_rejected() {
        let mut fixture = basic();
        fixture.mp = collection("MP", vec![term("MP:1", Some(10), &["UBERON:9"])]);
        fixture.uberon.add_alt_id("UBERON:9");
        let (accepted, report) = fixture.run(SecondaryIdPolicy::Load);
        assert!(accepted.is_empty());
        assert_eq!(
            report.messages(BucketKind::ObsoleteOrAltIntermediate),
            vec!["MP:1 (MP:1 label) UBERON id is alternate id: UBERON:9 (altId)"]
        );
    }

    #[test]
    fn test_intermediate_without_targets_is_no_mapping() {
        let mut fixture = basic();
        fixture.uberon = collection("UBERON", vec![term("UBERON:1", None, &[])]);
        let (_, report) = fixture.run(SecondaryIdPolicy::Load);
        assert_eq!(
            report.messages(BucketKind::NoMapping),
            vec!["MP:1 MP:1 label UBERON:1 UBERON:1 label"]
        );
    }

    #[test]
    fn test_target_checks_in_order() {
        let mut fixture = basic();
        fixture.uberon = collection("UBERON", vec![term("UBERON:1", None, &["EMAPA:1", "EMAPA:2", "EMAPA:3"])]);
        let mut obsolete = term("EMAPA:1", Some(100), &[]);
        obsolete.is_obsolete = true;
        fixture.emapa = collection("EMAPA", vec![obsolete, term("EMAPA:2", None, &[])]);
        let (accepted, report) = fixture.run(SecondaryIdPolicy::Load);
        assert!(accepted.is_empty());
        assert_eq!(report.count(BucketKind::ObsoleteOrAltTarget), 1);
        assert_eq!(report.messages(BucketKind::TargetNotInDatabase), vec!["EMAPA:2 (EMAPA:2 label)"]);
        assert_eq!(
            report.messages(BucketKind::NoMapping),
            vec!["MP:1 (MP:1 label) UBERON:1 (UBERON:1 label) EMAPA:3"]
        );
        assert_eq!(report.count(BucketKind::IntermediateFanOut), 1);
    }

    #[test]
    fn test_secondary_target_policy() {
        let mut fixture = basic();
        let mut secondary = term("EMAPA:1", Some(100), &[]);
        secondary.is_preferred = false;
        fixture.emapa = collection("EMAPA", vec![secondary]);

        let (accepted, report) = fixture.run(SecondaryIdPolicy::Load);
        assert_eq!(accepted.len(), 1);
        assert_eq!(report.count(BucketKind::SecondaryTarget), 1);

        let (accepted, report) = fixture.run(SecondaryIdPolicy::Skip);
        assert!(accepted.is_empty());
        assert_eq!(report.count(BucketKind::SecondaryTarget), 1);
    }

    #[test]
    fn test_summary_counts_distinct_terms() {
        let accepted = vec![
            AcceptedRelationship {
                source_id: "MP:1".into(),
                source_key: 1,
                intermediate_id: "UBERON:1".into(),
                target_id: "EMAPA:1".into(),
                target_key: 2,
            },
            AcceptedRelationship {
                source_id: "MP:1".into(),
                source_key: 1,
                intermediate_id: "UBERON:2".into(),
                target_id: "EMAPA:1".into(),
                target_key: 2,
            },
        ];
        let mut report = QcReport::relationship(SecondaryIdPolicy::Load);
        summarize(&accepted, &mut report, "MP", "EMAPA");
        let text = report.render();
        assert!(text.contains("2 Relationships Loaded"));
        assert!(text.contains("1 Distinct MP Loaded"));
        assert!(text.contains("1 Distinct EMAPA Loaded"));
    }
}
