//! Sequence descriptions for the gene model hand-off files

use crate::classify::StrainGeneRecord;
use std::collections::BTreeSet;

const UCSC_MGP_PROVIDER: &str = "the University of California Santa Cruz (UCSC) Genome Browser Group \
and the Wellcome Sanger Institute's Mouse Genomes Project (MGP)";
const GENCODE_PROVIDER: &str = "GENCODE consortium";
const B6_CITATION: &str = r"\\Ref(J:262996||)";

/// Coordinates shared by every description.
#[derive(Debug, Clone, Copy)]
pub struct Span<'a> {
    pub chromosome: &'a str,
    pub start: u64,
    pub end: u64,
    pub strand: &'a str,
}

/// MGP strain gene. Non-musculus strains credit UCSC/MGP, the rest GENCODE;
/// markerless records carry "undefined" as gene name.
pub fn mgp_description(record: &StrainGeneRecord, strain: &str, non_musculus: bool, release: &str) -> String {
    let provider = if non_musculus {
        UCSC_MGP_PROVIDER
    } else {
        GENCODE_PROVIDER
    };
    let gene_name = match (&record.symbol, record.marker_key) {
        (Some(symbol), Some(_)) => symbol.as_str(),
        _ => "undefined",
    };

    format!(
        "chr{}:{}-{}, {} strand. Annotation of mouse strain {} genome assembly provided by {}. \
         Distributed via {}. Gene type: {}; Gene Name: {}.",
        record.chromosome,
        record.start,
        record.end,
        record.strand,
        strain,
        provider,
        release,
        record.feature_type,
        gene_name
    )
}

/// B6 canonical feature; `gene_models` is the raw `Dbxref` list.
pub fn b6_feature_description(span: Span<'_>, symbol: &str, gene_type: &str, release: &str, gene_models: &str) -> String {
    format!(
        "Chr{}:{}-{}, {} strand. MGI derived this sequence for the C57BL/6J strain version of Gene: {}, \
         Gene type: {}, from outermost boundary coordinates of combined annotations to mouse reference \
         assembly {} provided by: {}. Note that the source annotations for this representation of the \
         C57BL/6J gene model sequence can derive from different assembly patches ({}).",
        span.chromosome, span.start, span.end, span.strand, symbol, gene_type, release, gene_models, B6_CITATION
    )
}

/// B6 gene placed by BLAT; lists the aligned sequence accessions.
pub fn b6_blat_description(
    span: Span<'_>,
    symbol: &str,
    gene_type: &str,
    release: &str,
    sequences: &BTreeSet<String>,
) -> String {
    let sequences: Vec<&str> = sequences.iter().map(String::as_str).collect();
    format!(
        "Chr{}:{}-{}, {} strand. MGI derived this sequence for the C57BL/6J strain version of Gene: {}, \
         Gene type: {}, from outermost boundary coordinates of combined BLAT alignments to the mouse \
         reference assembly {} for sequences: {} ({}).",
        span.chromosome,
        span.start,
        span.end,
        span.strand,
        symbol,
        gene_type,
        release,
        sequences.join(","),
        B6_CITATION
    )
}
