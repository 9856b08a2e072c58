// GFF3 annotation parser (strain gene model files and the MGI B6 file)

use super::SanityCheck;
use crate::error::{LoadError, Result};
use indexmap::IndexMap;
use regex::Regex;
use thiserror::Error;
use tracing::{debug, info, warn};

const COLUMN_COUNT: usize = 9;

/// Why a column-9 attribute could not be used.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AttributeError {
    #[error("{0} missing")]
    Absent(String),

    #[error("{key} malformed: {value}")]
    Malformed { key: String, value: String },
}

impl AttributeError {
    fn malformed(key: &str, value: &str) -> Self {
        AttributeError::Malformed {
            key: key.to_string(),
            value: value.to_string(),
        }
    }
}

// ============================================================================
// Attribute list (column 9)
// ============================================================================

/// Tokenized `key=value;key=value` attribute column, in file order. Tokens
/// without an `=` are dropped.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AttributeList {
    entries: Vec<(String, String)>,
}

impl AttributeList {
    pub fn parse(column: &str) -> Self {
        let entries = column
            .split(';')
            .filter_map(|token| token.split_once('='))
            .map(|(key, value)| (key.trim().to_string(), value.trim().to_string()))
            .collect();
        Self { entries }
    }

    /// First value for `key`; an empty value counts as malformed.
    pub fn get(&self, key: &str) -> std::result::Result<&str, AttributeError> {
        let value = self
            .entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
            .ok_or_else(|| AttributeError::Absent(key.to_string()))?;

        if value.is_empty() {
            return Err(AttributeError::malformed(key, value));
        }
        Ok(value)
    }
}

// ============================================================================
// Data lines
// ============================================================================

/// One tab-delimited annotation line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GffLine {
    pub line_number: usize,
    pub raw: String,
    pub column_count: usize,
    pub seqid: String,
    pub source: String,
    pub feature_type: String,
    pub start: String,
    pub end: String,
    pub strand: String,
    pub attributes: AttributeList,
}

impl GffLine {
    /// Split a data line. Missing trailing columns read as empty, so a short
    /// line surfaces as absent fields rather than a file-level error.
    pub fn parse(line_number: usize, line: &str) -> Self {
        let columns: Vec<&str> = line.split('\t').map(str::trim).collect();
        let column = |idx: usize| columns.get(idx).copied().unwrap_or_default().to_string();

        Self {
            line_number,
            raw: line.to_string(),
            column_count: columns.len(),
            seqid: column(0),
            source: column(1),
            feature_type: column(2),
            start: column(3),
            end: column(4),
            strand: column(6),
            attributes: AttributeList::parse(columns.get(8).copied().unwrap_or_default()),
        }
    }

    /// Whether every GFF3 column was present.
    pub fn is_complete(&self) -> bool {
        self.column_count >= COLUMN_COUNT
    }

    pub fn chromosome(&self) -> std::result::Result<&str, AttributeError> {
        required(&self.seqid, "chromosome")
    }

    pub fn start(&self) -> std::result::Result<u64, AttributeError> {
        coordinate(&self.start, "start")
    }

    pub fn end(&self) -> std::result::Result<u64, AttributeError> {
        coordinate(&self.end, "end")
    }

    pub fn strand(&self) -> std::result::Result<&str, AttributeError> {
        required(&self.strand, "strand")
    }

    /// Local gene ID from `ID=gene:<id>`.
    pub fn local_gene_id(&self) -> std::result::Result<&str, AttributeError> {
        let value = self.attributes.get("ID")?;
        match value.strip_prefix("gene:") {
            Some(id) if !id.is_empty() => Ok(id),
            _ => Err(AttributeError::malformed("ID", value)),
        }
    }

    /// External gene ID from `key`, version suffix dropped, checked against
    /// `pattern`. A present value that fails the pattern is malformed.
    pub fn external_id(&self, key: &str, pattern: &Regex) -> std::result::Result<String, AttributeError> {
        let value = self.attributes.get(key)?;
        let unversioned = value.split('.').next().unwrap_or(value);
        if pattern.is_match(unversioned) {
            Ok(unversioned.to_string())
        } else {
            Err(AttributeError::malformed(key, value))
        }
    }

    pub fn biotype(&self) -> std::result::Result<&str, AttributeError> {
        self.attributes.get("biotype")
    }

    /// The line without its trailing newline, for report messages.
    pub fn display(&self) -> &str {
        self.raw.trim_end_matches(['\r', '\n'])
    }
}

fn required<'a>(value: &'a str, name: &str) -> std::result::Result<&'a str, AttributeError> {
    if value.is_empty() {
        Err(AttributeError::Absent(name.to_string()))
    } else {
        Ok(value)
    }
}

fn coordinate(value: &str, name: &str) -> std::result::Result<u64, AttributeError> {
    let value = required(value, name)?;
    value
        .parse()
        .map_err(|_| AttributeError::malformed(name, value))
}

// ============================================================================
// Strain files
// ============================================================================

/// A strain gene model file: first line names the strain, the rest are data.
#[derive(Debug, Clone)]
pub struct StrainFile {
    pub strain_name: String,
    pub lines: Vec<GffLine>,
}

pub fn parse_strain_file(file: &str, content: &str, check: SanityCheck) -> Result<StrainFile> {
    let mut lines = content.lines().enumerate();

    let strain_name = match lines.next() {
        Some((_, first)) if !first.trim().is_empty() => first.trim().to_string(),
        _ => return Err(LoadError::format(file, "first line must hold the strain name")),
    };

    let mut records = Vec::new();
    for (idx, line) in lines {
        if line.trim().is_empty() || line.starts_with('#') {
            continue;
        }
        let record = GffLine::parse(idx + 1, line);
        if !record.is_complete() {
            debug!(file = %file, line = record.line_number, columns = record.column_count, "Short strain line");
        }
        records.push(record);
    }

    info!(file = %file, strain = %strain_name, records = records.len(), "Parsed strain file");
    check.check_count(file, records.len())?;

    Ok(StrainFile {
        strain_name,
        lines: records,
    })
}

// ============================================================================
// MGI B6 file
// ============================================================================

const B6_FEATURES: [&str; 2] = ["gene", "pseudogene"];
const BLAT_SOURCE: &str = "BlatAlignment";

/// All kept lines for one MGI marker: the canonical feature first, then any
/// BLAT alignments, in file order.
#[derive(Debug, Clone)]
pub struct B6Group {
    pub mgi_id: String,
    pub lines: Vec<GffLine>,
}

impl B6Group {
    pub fn feature(&self) -> Option<&GffLine> {
        self.lines.first()
    }

    /// Alignment lines after the feature line.
    pub fn blat_lines(&self) -> &[GffLine] {
        self.lines.get(1..).unwrap_or(&[])
    }
}

fn b6_mgi_id(line: &GffLine) -> Option<String> {
    if let Ok(curie) = line.attributes.get("curie") {
        if curie.starts_with("MGI:") {
            return Some(curie.to_string());
        }
    }
    line.attributes.get("mgi_id").ok().map(str::to_string)
}

pub fn parse_b6_file(file: &str, content: &str, check: SanityCheck) -> Result<Vec<B6Group>> {
    let mut groups: IndexMap<String, Vec<GffLine>> = IndexMap::new();
    let mut skipped = 0usize;

    for (idx, line) in content.lines().enumerate() {
        if line.trim().is_empty() || line.starts_with('#') {
            continue;
        }
        let record = GffLine::parse(idx + 1, line);
        if !record.is_complete() {
            warn!(
                file = %file,
                line = record.line_number,
                columns = record.column_count,
                "Skipping B6 line with missing columns"
            );
            skipped += 1;
            continue;
        }

        let kept = record.source == BLAT_SOURCE || B6_FEATURES.contains(&record.feature_type.as_str());
        if !kept {
            skipped += 1;
            continue;
        }

        match b6_mgi_id(&record) {
            Some(mgi_id) => groups.entry(mgi_id).or_default().push(record),
            None => debug!(line = record.line_number, "B6 line without MGI ID"),
        }
    }

    info!(file = %file, markers = groups.len(), skipped, "Parsed B6 file");
    check.check_count(file, groups.len())?;

    Ok(groups
        .into_iter()
        .map(|(mgi_id, lines)| B6Group { mgi_id, lines })
        .collect())
}
