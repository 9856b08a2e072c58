//! MGI C57BL/6J reference strain genes
//!
//! The B6 file comes from MGI itself, so its lines are not classified into
//! report buckets. Anything unexpected is a console warning; a group is only
//! dropped when its marker is unknown or its feature line is unusable.

use super::templates::{b6_blat_description, b6_feature_description, Span};
use crate::parser::{B6Group, GffLine};
use crate::snapshot::StrainMarkerSnapshot;
use std::collections::BTreeSet;
use tracing::{info, warn};

/// One B6 strain marker ready for output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct B6StrainMarker {
    pub mgi_id: String,
    pub marker_key: i64,
    /// Strain gene ID, e.g. `MGI_C57BL6J_1344588`
    pub strain_gene_id: String,
    pub chromosome: String,
    pub start: u64,
    pub end: u64,
    pub strand: String,
    pub gene_type: String,
    pub description: String,
}

pub fn build_b6_markers(groups: &[B6Group], snapshot: &StrainMarkerSnapshot, release: &str) -> Vec<B6StrainMarker> {
    let mut markers = Vec::with_capacity(groups.len());

    for group in groups {
        let Some(marker) = snapshot.marker(&group.mgi_id) else {
            warn!(mgi_id = %group.mgi_id, "{} in MGI GFF File, but NOT IN MGI", group.mgi_id);
            continue;
        };
        let Some(feature) = group.feature() else {
            continue;
        };
        let Some(strain_gene_id) = strain_gene_id(feature) else {
            warn!(mgi_id = %group.mgi_id, line = feature.line_number, "B6 feature without strain gene ID");
            continue;
        };
        let (start, end) = match (feature.start(), feature.end()) {
            (Ok(start), Ok(end)) => (start, end),
            _ => {
                warn!(mgi_id = %group.mgi_id, line = feature.line_number, "B6 feature coordinates unusable");
                continue;
            },
        };

        check_feature(feature, snapshot, start, end);
        let gene_type = gene_type(feature);
        let span = Span {
            chromosome: &feature.seqid,
            start,
            end,
            strand: &feature.strand,
        };

        let description = if group.blat_lines().is_empty() {
            let gene_models = feature.attributes.get("Dbxref").unwrap_or_default();
            b6_feature_description(span, &marker.symbol, gene_type, release, gene_models)
        } else {
            let sequences: BTreeSet<String> = group.blat_lines().iter().filter_map(query_name).collect();
            if sequences.is_empty() {
                warn!(mgi_id = %group.mgi_id, "BLAT set without qName values");
            }
            b6_blat_description(span, &marker.symbol, gene_type, release, &sequences)
        };

        markers.push(B6StrainMarker {
            mgi_id: group.mgi_id.clone(),
            marker_key: marker.key,
            strain_gene_id: strain_gene_id.to_string(),
            chromosome: feature.seqid.clone(),
            start,
            end,
            strand: feature.strand.clone(),
            gene_type: gene_type.to_string(),
            description,
        });
    }

    info!(groups = groups.len(), markers = markers.len(), "Built B6 strain markers");
    markers
}

fn strain_gene_id(feature: &GffLine) -> Option<&str> {
    feature
        .attributes
        .get("strain_gene_id")
        .or_else(|_| feature.attributes.get("ID"))
        .ok()
}

fn gene_type(feature: &GffLine) -> &str {
    feature
        .attributes
        .get("mgi_type")
        .or_else(|_| feature.attributes.get("mcv_type"))
        .unwrap_or_default()
}

/// Aligned sequence accession without its version.
fn query_name(line: &GffLine) -> Option<String> {
    let value = line.attributes.get("qName").ok()?;
    value.split('.').next().map(str::to_string)
}

fn check_feature(feature: &GffLine, snapshot: &StrainMarkerSnapshot, start: u64, end: u64) {
    let line = feature.line_number;
    if feature.seqid.is_empty() || !snapshot.has_chromosome(&feature.seqid) {
        warn!(line, chromosome = %feature.seqid, "B6 chromosome not resolved");
    }
    if start > end {
        warn!(line, start, end, "B6 start > end");
    }
    if feature.strand.is_empty() {
        warn!(line, "B6 strand missing");
    }
    let gene_type = gene_type(feature);
    if gene_type.is_empty() {
        warn!(line, "B6 gene type missing");
    } else if snapshot.has_feature_types() && !snapshot.is_feature_type(gene_type) {
        warn!(line, gene_type = %gene_type, "B6 gene type not in MGI");
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::parser::gff3::parse_b6_file;
    use crate::parser::SanityCheck;
    use crate::snapshot::{ChromosomeRow, MarkerRow, StrainMarkerRows};

    const B6_GFF: &str = "##gff-version 3\n\
1\tMGI\tgene\t4807560\t4848410\t.\t+\t.\tID=MGI:1344588;Name=Lypla1;mgi_type=protein coding gene;curie=MGI:1344588;strain_gene_id=MGI_C57BL6J_1344588;Dbxref=ENSEMBL:ENSMUSG00000025903,NCBI_Gene:18777\n\
1\tMGI\tgene\t5156597\t5158506\t.\t+\t.\tID=MGI:2443922;Name=B230334L07Rik;curie=MGI:2443922;mcv_type=unclassified gene;strain_gene_id=MGI_C57BL6J_2443922\n\
1\tBlatAlignment\tmatch\t5156597\t5158506\t.\t+\t.\tID=MGI:2443922.m2;qName=AK046028.1;mgi_id=MGI:2443922\n\
1\tBlatAlignment\tmatch\t5156600\t5158506\t.\t+\t.\tID=MGI:2443922.m1;qName=AK010001.2;mgi_id=MGI:2443922\n\
1\tBlatAlignment\tmatch\t5156600\t5158506\t.\t+\t.\tID=MGI:2443922.m3;qName=AK046028.1;mgi_id=MGI:2443922\n\
2\tMGI\tgene\t100\t200\t.\t-\t.\tID=MGI:9;Name=Gone;mgi_type=gene;curie=MGI:9;strain_gene_id=MGI_C57BL6J_9\n";

    fn snapshot() -> StrainMarkerSnapshot {
        let marker = |id: &str, key: i64, symbol: &str| MarkerRow {
            mgi_id: id.into(),
            marker_key: key,
            symbol: symbol.into(),
            status: "official".into(),
            preferred: true,
        };
        let rows = StrainMarkerRows {
            markers: vec![marker("MGI:1344588", 11, "Lypla1"), marker("MGI:2443922", 12, "B230334L07Rik")],
            chromosomes: vec![ChromosomeRow {
                chromosome: "1".into(),
                chromosome_key: 1,
            }],
            ..Default::default()
        };
        StrainMarkerSnapshot::from_rows(rows, 1000, 1000)
    }

    fn build() -> Vec<B6StrainMarker> {
        let groups = parse_b6_file("MGI.gff3", B6_GFF, SanityCheck::new(0)).unwrap();
        build_b6_markers(&groups, &snapshot(), "GRCm39")
    }

    #[test]
    fn test_unknown_marker_group_is_dropped() {
        let markers = build();
        let ids: Vec<&str> = markers.iter().map(|m| m.mgi_id.as_str()).collect();
        assert_eq!(ids, vec!["MGI:1344588", "MGI:2443922"]);
    }

    #[test]
    fn test_canonical_feature_description() {
        let markers = build();
        let lypla1 = &markers[0];
        assert_eq!(lypla1.strain_gene_id, "MGI_C57BL6J_1344588");
        assert_eq!(lypla1.marker_key, 11);
        assert_eq!(lypla1.gene_type, "protein coding gene");
        assert!(lypla1
            .description
            .contains("provided by: ENSEMBL:ENSMUSG00000025903,NCBI_Gene:18777."));
    }

    #[test]
    fn test_blat_set_lists_sorted_distinct_sequences() {
        let markers = build();
        let blat = &markers[1];
        assert_eq!(blat.gene_type, "unclassified gene");
        assert!(blat.description.contains("for sequences: AK010001,AK046028 ("));
        assert!(blat.description.starts_with("Chr1:5156597-5158506, + strand."));
    }
}
