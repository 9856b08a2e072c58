// OWL/XML class parser

use super::{SanityCheck, TermCollection, TermRecord};
use crate::error::{LoadError, Result};
use crate::snapshot::VocabularySnapshot;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use tracing::info;

const OWL_CLASS: &[u8] = b"owl:Class";
const RDFS_LABEL: &[u8] = b"rdfs:label";
const RDF_DESCRIPTION: &[u8] = b"rdf:Description";
const OWL_SOME_VALUES_FROM: &[u8] = b"owl:someValuesFrom";
const OWL_DEPRECATED: &[u8] = b"owl:deprecated";

/// Parses the `owl:Class` elements of one vocabulary from an OWL/XML export.
///
/// Class IDs come from `rdf:about` URLs (`.../MP_0000001` -> `MP:0000001`).
/// Cross-references into `xref_vocabulary` are read from two places and kept
/// apart: `rdf:Description/@rdf:about` feeds `cross_ref_ids`,
/// `owl:someValuesFrom/@rdf:resource` feeds `secondary_cross_ref_ids`.
pub struct OwlClassParser {
    vocabulary: String,
    xref_vocabulary: String,
}

#[derive(Debug, Default)]
struct ClassState {
    about: String,
    depth: usize,
    labels: Vec<String>,
    label_text: Option<String>,
    deprecated_text: Option<String>,
    deprecated: bool,
    primary: Vec<String>,
    secondary: Vec<String>,
}

impl OwlClassParser {
    pub fn new(vocabulary: impl Into<String>, xref_vocabulary: impl Into<String>) -> Self {
        Self {
            vocabulary: vocabulary.into(),
            xref_vocabulary: xref_vocabulary.into(),
        }
    }

    pub fn parse(
        &self,
        file: &str,
        content: &str,
        snapshot: Option<&VocabularySnapshot>,
        check: SanityCheck,
    ) -> Result<TermCollection> {
        let mut reader = Reader::from_str(content);
        reader.config_mut().trim_text(true);

        let mut collection = TermCollection::new(&self.vocabulary);
        let mut current: Option<ClassState> = None;

        loop {
            let event = reader.read_event().map_err(|e| {
                LoadError::format(file, format!("XML error at byte {}: {}", reader.buffer_position(), e))
            })?;

            match event {
                Event::Start(ref e) => match current.as_mut() {
                    None if e.name().as_ref() == OWL_CLASS => {
                        current = Some(ClassState {
                            about: attribute(e, b"rdf:about").unwrap_or_default(),
                            depth: 1,
                            ..Default::default()
                        });
                    },
                    None => {},
                    Some(class) => {
                        class.depth += 1;
                        match e.name().as_ref() {
                            RDFS_LABEL => class.label_text = Some(String::new()),
                            OWL_DEPRECATED => class.deprecated_text = Some(String::new()),
                            _ => self.collect_xref(e, class),
                        }
                    },
                },
                Event::Empty(ref e) => match current.as_mut() {
                    None if e.name().as_ref() == OWL_CLASS => {
                        let class = ClassState {
                            about: attribute(e, b"rdf:about").unwrap_or_default(),
                            ..Default::default()
                        };
                        self.finish_class(class, snapshot, &mut collection);
                    },
                    None => {},
                    Some(class) => {
                        if e.name().as_ref() == RDFS_LABEL {
                            class.labels.push(String::new());
                        } else {
                            self.collect_xref(e, class);
                        }
                    },
                },
                Event::Text(ref t) => {
                    if let Some(class) = current.as_mut() {
                        let text = t.unescape().map_err(|e| {
                            LoadError::format(file, format!("bad text in {}: {}", class.about, e))
                        })?;
                        class.append_text(&text);
                    }
                },
                Event::CData(ref t) => {
                    if let Some(class) = current.as_mut() {
                        class.append_text(&String::from_utf8_lossy(t));
                    }
                },
                Event::End(ref e) => {
                    if let Some(class) = current.as_mut() {
                        match e.name().as_ref() {
                            RDFS_LABEL => {
                                if let Some(label) = class.label_text.take() {
                                    class.labels.push(label);
                                }
                            },
                            OWL_DEPRECATED => {
                                if let Some(text) = class.deprecated_text.take() {
                                    class.deprecated = text.trim() == "true";
                                }
                            },
                            _ => {},
                        }
                        class.depth -= 1;
                        if class.depth == 0 {
                            if let Some(class) = current.take() {
                                self.finish_class(class, snapshot, &mut collection);
                            }
                        }
                    }
                },
                Event::Eof => break,
                _ => {},
            }
        }

        if let Some(class) = current {
            return Err(LoadError::format(
                file,
                format!("unexpected end of file inside class {}", class.about),
            ));
        }

        info!(
            file = %file,
            vocabulary = %self.vocabulary,
            classes = collection.len(),
            "Parsed OWL classes"
        );
        check.check_count(file, collection.len())?;
        Ok(collection)
    }

    fn collect_xref(&self, e: &BytesStart<'_>, class: &mut ClassState) {
        match e.name().as_ref() {
            RDF_DESCRIPTION => {
                if let Some(id) = attribute(e, b"rdf:about").and_then(|url| self.xref_id(&url)) {
                    push_unique(&mut class.primary, id);
                }
            },
            OWL_SOME_VALUES_FROM => {
                if let Some(id) = attribute(e, b"rdf:resource").and_then(|url| self.xref_id(&url)) {
                    push_unique(&mut class.secondary, id);
                }
            },
            _ => {},
        }
    }

    fn xref_id(&self, url: &str) -> Option<String> {
        url_to_id(url, &self.xref_vocabulary)
    }

    fn finish_class(
        &self,
        class: ClassState,
        snapshot: Option<&VocabularySnapshot>,
        collection: &mut TermCollection,
    ) {
        let Some(id) = url_to_id(&class.about, &self.vocabulary) else {
            return;
        };

        // second label position is consulted only when the first is empty
        let label = match class.labels.first() {
            Some(first) if !first.is_empty() => first.clone(),
            _ => class.labels.get(1).cloned().unwrap_or_default(),
        };

        let mut record = TermRecord::new(id, label);
        record.is_obsolete = class.deprecated;
        for xref in class.primary {
            record.add_cross_ref(xref);
        }
        for xref in class.secondary {
            record.add_secondary_cross_ref(xref);
        }
        if let Some(snapshot) = snapshot {
            record.resolve_against(snapshot);
        }
        collection.insert(record);
    }
}

impl ClassState {
    fn append_text(&mut self, text: &str) {
        if let Some(label) = self.label_text.as_mut() {
            label.push_str(text);
        } else if let Some(deprecated) = self.deprecated_text.as_mut() {
            deprecated.push_str(text);
        }
    }
}

fn attribute(e: &BytesStart<'_>, key: &[u8]) -> Option<String> {
    e.attributes()
        .flatten()
        .find(|attr| attr.key.as_ref() == key)
        .and_then(|attr| attr.unescape_value().ok().map(|v| v.into_owned()))
}

/// `http://purl.obolibrary.org/obo/MP_0000001` -> `MP:0000001` when the last
/// path segment belongs to `vocabulary`.
fn url_to_id(url: &str, vocabulary: &str) -> Option<String> {
    let segment = url.rsplit('/').next()?;
    let local = segment.strip_prefix(vocabulary)?.strip_prefix('_')?;
    if local.is_empty() {
        return None;
    }
    Some(format!("{vocabulary}:{local}"))
}

fn push_unique(ids: &mut Vec<String>, id: String) {
    if !ids.contains(&id) {
        ids.push(id);
    }
}
