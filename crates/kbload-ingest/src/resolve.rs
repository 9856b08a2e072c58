//! Cross-reference resolution over an A -> B -> C chain
//!
//! For each A record the resolver selects which cross-reference set to follow
//! (primary wins over secondary whenever it is non-empty), then expands every
//! B identifier into its C identifiers. Nothing is filtered here: every hop,
//! resolvable or not, becomes a [`Candidate`] so the classifier can report
//! exactly where a chain broke. N:M shapes are surfaced as
//! [`ResolutionEvent`]s alongside the candidates.

use crate::parser::{TermCollection, TermRecord};
use tracing::debug;

/// Which cross-reference field of the A record produced a candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum XrefProvenance {
    Primary,
    Secondary,
}

/// One (A, B, C) path. `target_id` is `None` when the B hop could not be
/// expanded (alternate, obsolete, absent, or without cross-references).
#[derive(Debug, Clone, Copy)]
pub struct Candidate<'a> {
    pub source: &'a TermRecord,
    pub intermediate_id: &'a str,
    pub intermediate: Option<&'a TermRecord>,
    pub target_id: Option<&'a str>,
    pub target: Option<&'a TermRecord>,
    pub provenance: XrefProvenance,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolutionEvent {
    /// The primary set reached no C while the secondary set would have.
    LostMapping {
        source_id: String,
        /// B identifiers from the secondary set with the C identifiers each reaches.
        lost: Vec<(String, Vec<String>)>,
    },
    /// More than one B identifier was selected for an A record.
    SourceFanOut {
        source_id: String,
        intermediate_ids: Vec<String>,
    },
    /// A B record cross-references more than one C identifier.
    IntermediateFanOut {
        intermediate_id: String,
        target_ids: Vec<String>,
    },
}

#[derive(Debug, Default)]
pub struct Resolution<'a> {
    pub candidates: Vec<Candidate<'a>>,
    pub events: Vec<ResolutionEvent>,
}

pub struct CrossReferenceResolver<'a> {
    intermediate: &'a TermCollection,
    target: &'a TermCollection,
}

impl<'a> CrossReferenceResolver<'a> {
    pub fn new(intermediate: &'a TermCollection, target: &'a TermCollection) -> Self {
        Self { intermediate, target }
    }

    /// B identifiers to follow for `source`, with their provenance.
    fn select(&self, source: &'a TermRecord) -> (&'a [String], XrefProvenance) {
        if source.cross_ref_ids.is_empty() {
            (source.secondary_cross_ref_ids.as_slice(), XrefProvenance::Secondary)
        } else {
            (source.cross_ref_ids.as_slice(), XrefProvenance::Primary)
        }
    }

    /// C identifiers declared by a current B record, empty otherwise.
    fn reachable(&self, intermediate_id: &str) -> &'a [String] {
        if self.is_alternate(intermediate_id) {
            return &[];
        }
        match self.intermediate.get(intermediate_id) {
            Some(record) if !record.is_obsolete => record.cross_ref_ids.as_slice(),
            _ => &[],
        }
    }

    fn is_alternate(&self, intermediate_id: &str) -> bool {
        self.intermediate.is_alt_id(intermediate_id) && !self.intermediate.contains(intermediate_id)
    }

    fn lost_mapping(&self, source: &TermRecord) -> Option<ResolutionEvent> {
        if source.cross_ref_ids.is_empty() || source.secondary_cross_ref_ids.is_empty() {
            return None;
        }
        if source.cross_ref_ids.iter().any(|b| !self.reachable(b).is_empty()) {
            return None;
        }

        let lost: Vec<(String, Vec<String>)> = source
            .secondary_cross_ref_ids
            .iter()
            .filter_map(|b| {
                let targets = self.reachable(b);
                (!targets.is_empty()).then(|| (b.clone(), targets.to_vec()))
            })
            .collect();

        (!lost.is_empty()).then(|| ResolutionEvent::LostMapping {
            source_id: source.source_id.clone(),
            lost,
        })
    }

    pub fn resolve(&self, source: &'a TermRecord) -> Resolution<'a> {
        let mut resolution = Resolution::default();
        let (selected, provenance) = self.select(source);

        if selected.is_empty() {
            debug!(id = %source.source_id, "No cross-references to follow");
            return resolution;
        }

        if let Some(event) = self.lost_mapping(source) {
            resolution.events.push(event);
        }

        if selected.len() > 1 {
            resolution.events.push(ResolutionEvent::SourceFanOut {
                source_id: source.source_id.clone(),
                intermediate_ids: selected.to_vec(),
            });
        }

        for intermediate_id in selected {
            let intermediate = self.intermediate.get(intermediate_id);
            let unexpanded = Candidate {
                source,
                intermediate_id,
                intermediate,
                target_id: None,
                target: None,
                provenance,
            };

            let expandable = !self.is_alternate(intermediate_id)
                && intermediate.is_some_and(|r| !r.is_obsolete && !r.cross_ref_ids.is_empty());
            let Some(record) = intermediate.filter(|_| expandable) else {
                resolution.candidates.push(unexpanded);
                continue;
            };

            if record.cross_ref_ids.len() > 1 {
                resolution.events.push(ResolutionEvent::IntermediateFanOut {
                    intermediate_id: intermediate_id.clone(),
                    target_ids: record.cross_ref_ids.clone(),
                });
            }

            for target_id in &record.cross_ref_ids {
                resolution.candidates.push(Candidate {
                    target_id: Some(target_id.as_str()),
                    target: self.target.get(target_id),
                    ..unexpanded
                });
            }
        }

        resolution
    }
}
