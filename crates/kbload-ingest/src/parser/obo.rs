// OBO 1.2 stanza parser

use super::{SanityCheck, TermCollection, TermRecord};
use crate::error::{LoadError, Result};
use crate::snapshot::VocabularySnapshot;
use tracing::{debug, info};

/// Required first line of every OBO input.
pub const FORMAT_VERSION_HEADER: &str = "format-version: 1.2";

// ============================================================================
// OBO Parser
// ============================================================================

/// Reads `[Term]` stanzas whose `id` belongs to `vocabulary`.
///
/// `alt_id` lines go to the collection's alternate-ID registry. When a cross
/// reference vocabulary is set, matching `xref` lines are collected into
/// `cross_ref_ids` with any trailing annotation (`{source="MA"}`) removed.
pub struct OboParser {
    vocabulary: String,
    xref_vocabulary: Option<String>,
}

impl OboParser {
    pub fn new(vocabulary: impl Into<String>) -> Self {
        Self {
            vocabulary: vocabulary.into(),
            xref_vocabulary: None,
        }
    }

    pub fn with_cross_refs(mut self, xref_vocabulary: impl Into<String>) -> Self {
        self.xref_vocabulary = Some(xref_vocabulary.into());
        self
    }

    pub fn parse(
        &self,
        file: &str,
        content: &str,
        snapshot: Option<&VocabularySnapshot>,
        check: SanityCheck,
    ) -> Result<TermCollection> {
        let lines: Vec<&str> = content.lines().collect();

        match lines.first() {
            Some(first) if first.trim() == FORMAT_VERSION_HEADER => {},
            _ => {
                return Err(LoadError::format(
                    file,
                    format!("first line must be '{}'", FORMAT_VERSION_HEADER),
                ))
            },
        }

        let mut collection = TermCollection::new(&self.vocabulary);
        let mut stanzas = 0usize;
        let mut i = 1;

        while i < lines.len() {
            if lines[i].trim() == "[Term]" {
                stanzas += 1;
                if let Some(mut record) = self.parse_term_stanza(&lines, &mut i, &mut collection) {
                    if let Some(snapshot) = snapshot {
                        record.resolve_against(snapshot);
                    }
                    collection.insert(record);
                }
            } else {
                i += 1;
            }
        }

        info!(
            file = %file,
            vocabulary = %self.vocabulary,
            stanzas,
            terms = collection.len(),
            alt_ids = collection.alt_ids().len(),
            "Parsed OBO terms"
        );
        check.check_count(file, collection.len())?;
        Ok(collection)
    }

    /// Parse one `[Term]` stanza. Returns `None` for terms outside the
    /// vocabulary; their alt IDs are not registered either.
    fn parse_term_stanza(
        &self,
        lines: &[&str],
        i: &mut usize,
        collection: &mut TermCollection,
    ) -> Option<TermRecord> {
        *i += 1; // Skip [Term] line

        let mut id: Option<String> = None;
        let mut name = String::new();
        let mut is_obsolete = false;
        let mut alt_ids = Vec::new();
        let mut xrefs = Vec::new();

        while *i < lines.len() {
            let line = lines[*i].trim();
            if line.starts_with('[') {
                break;
            }
            *i += 1;

            let Some((key, value)) = line.split_once(':') else {
                continue;
            };
            let value = value.trim();

            match key.trim() {
                "id" => id = Some(strip_annotation(value).to_string()),
                "name" => name = value.to_string(),
                "is_obsolete" => is_obsolete = value == "true",
                "alt_id" => alt_ids.push(strip_annotation(value).to_string()),
                "xref" => {
                    if let Some(ref prefix) = self.xref_vocabulary {
                        let xref = strip_annotation(value);
                        if belongs_to(xref, prefix) {
                            xrefs.push(xref.to_string());
                        }
                    }
                },
                _ => {},
            }
        }

        let id = id?;
        if !belongs_to(&id, &self.vocabulary) {
            debug!(id = %id, "Skipping term outside vocabulary");
            return None;
        }

        for alt_id in alt_ids {
            collection.add_alt_id(alt_id);
        }

        let mut record = TermRecord::new(id, name);
        record.is_obsolete = is_obsolete || record.label.starts_with("obsolete");
        for xref in xrefs {
            record.add_cross_ref(xref);
        }
        Some(record)
    }
}

fn belongs_to(id: &str, vocabulary: &str) -> bool {
    id.strip_prefix(vocabulary)
        .is_some_and(|rest| rest.starts_with(':'))
}

/// `EMAPA:35128 {source="MA"}` -> `EMAPA:35128`
fn strip_annotation(value: &str) -> &str {
    let end = value
        .find(|c: char| c.is_whitespace() || c == '{' || c == '(' || c == '!')
        .unwrap_or(value.len());
    &value[..end]
}
