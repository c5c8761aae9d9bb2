use tracing::warn;

use super::{Entity, EntityPlan};
use crate::error::CatalogError;
use crate::release::ReleaseDescriptor;
use crate::schema;
use crate::spec::SourceSpec;
use crate::table::{ReadOptions, Table};
use crate::validate::Validator;

pub const TABLE_KIND: &str = "ASSEMBLIES";

const RELEASE_1_URL: &str = "https://raw.githubusercontent.com/human-pangenomics/HPP_Year1_Assemblies/main/assembly_index/Year1_assemblies_v2_genbank.index";
const RELEASE_2_URL: &str = "https://github.com/human-pangenomics/hprc_intermediate_assembly/raw/refs/heads/main/data_tables/assemblies_pre_release_v0.6.1.index.csv";

/// Reference genomes listed in the year-one index alongside the samples.
const EXCLUDED_SAMPLE_IDS: &[&str] = &["CHM13_v1.1", "GRCh38_no_alt_analysis_set"];
const HAPLOTYPE_IDS: &[(&str, &str)] = &[("maternal", "2"), ("paternal", "1")];
const UNKNOWN_HAPLOTYPE: &str = "-";
const HAPLOTYPE_PREFIXES: &[&str] = &["hap1", "hap2"];
const SPLIT_COLUMNS: &[&str] = &["aws_fasta", "gcp_fasta", "fasta_sha256"];

pub fn plan(validator: &Validator) -> EntityPlan {
    EntityPlan {
        entity: Entity::Assemblies,
        table_kind: TABLE_KIND,
        releases: releases(validator),
        size_column: "assembly",
        label: "assembly",
        output_file: "assemblies.csv",
        drop_biosample_columns: &[],
        finish: None,
    }
}

pub fn releases(validator: &Validator) -> Vec<ReleaseDescriptor> {
    let release_1 = SourceSpec::source(
        SourceSpec::url(RELEASE_1_URL)
            .separator(b'\t')
            .read_options(ReadOptions::strings())
            .input_formatter(format_release_1)
            .map_column("haplotype", haplotype_id)
            .columns(&[
                ("sample", "sample_id"),
                ("haplotype", "haplotype"),
                ("aws_fasta", "assembly"),
                ("fasta_sha256", "fasta_sha256"),
            ]),
    )
    .contextual_input_formatter(validator.formatter(schema::release_one_assembly(), None));

    let release_2 = SourceSpec::url(RELEASE_2_URL)
        .separator(b',')
        .read_options(ReadOptions::strings())
        .contextual_input_formatter(validator.formatter(schema::assembly(), None));

    vec![
        ReleaseDescriptor::new("1").table(TABLE_KIND, release_1),
        ReleaseDescriptor::new("2").table(TABLE_KIND, release_2),
    ]
}

pub fn haplotype_id(name: &str) -> String {
    HAPLOTYPE_IDS
        .iter()
        .find(|(haplotype, _)| *haplotype == name)
        .map(|(_, id)| id.to_string())
        .unwrap_or_else(|| name.to_string())
}

fn detect_haplotype(file_name: Option<&str>) -> Option<&'static str> {
    let file_name = file_name?;
    let found = HAPLOTYPE_IDS
        .iter()
        .map(|(haplotype, _)| *haplotype)
        .find(|haplotype| file_name.contains(haplotype));
    if found.is_none() {
        warn!(file = file_name, "no haplotype found");
    }
    found
}

/// Turns the one-row-per-sample year-one index into one row per haplotype.
pub fn format_release_1(table: Table) -> Result<Table, CatalogError> {
    let mut samples = table.clone();
    samples.dedup_by_columns(&["sample"])?;
    if samples.len() != table.len() {
        return Err(CatalogError::Format(
            "Duplicate keys are present in the assembly data.".to_string(),
        ));
    }

    let mut halves = Vec::with_capacity(HAPLOTYPE_PREFIXES.len());
    for prefix in HAPLOTYPE_PREFIXES {
        let prefixed = SPLIT_COLUMNS
            .iter()
            .map(|column| format!("{prefix}_{column}"))
            .collect::<Vec<_>>();
        let mut names = vec!["sample"];
        names.extend(prefixed.iter().map(String::as_str));
        let mut half = table.select(&names)?;
        for (from, to) in prefixed.iter().zip(SPLIT_COLUMNS) {
            half.rename(from, to);
        }
        halves.push(half);
    }
    let mut combined = Table::concat(halves);
    combined.retain_rows(|row| {
        !row.get("sample")
            .is_some_and(|sample| EXCLUDED_SAMPLE_IDS.contains(&sample))
    });

    let aws = combined.column("aws_fasta").unwrap_or_default();
    let gcp = combined.column("gcp_fasta").unwrap_or_default();
    let samples = combined.column("sample").unwrap_or_default();
    let mut haplotypes = Vec::with_capacity(combined.len());
    let mut disagreements = Vec::new();
    for ((aws, gcp), sample) in aws.into_iter().zip(gcp).zip(samples) {
        let from_aws = detect_haplotype(aws);
        let from_gcp = detect_haplotype(gcp);
        if from_aws != from_gcp {
            disagreements.push(sample.unwrap_or_default().to_string());
        }
        haplotypes.push(Some(from_aws.unwrap_or(UNKNOWN_HAPLOTYPE).to_string()));
    }
    if !disagreements.is_empty() {
        return Err(CatalogError::Format(format!(
            "Haplotypes disagree between AWS and GCP filenames for the following entries. Are the files for these sample IDs correct? {}",
            disagreements.join(",")
        )));
    }
    combined.set_column("haplotype", haplotypes)?;

    combined.sort_by_columns(&["sample", "haplotype"])?;
    let mut output = combined.reindex(
        &["sample", "haplotype", "aws_fasta", "gcp_fasta", "fasta_sha256"]
            .map(String::from),
    );
    output.dedup_by_columns(&["sample", "haplotype"])?;
    Ok(output)
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    const HEADER: &[&str] = &[
        "sample",
        "hap1_aws_fasta",
        "hap1_gcp_fasta",
        "hap1_fasta_sha256",
        "hap2_aws_fasta",
        "hap2_gcp_fasta",
        "hap2_fasta_sha256",
    ];

    #[test]
    fn splits_haplotypes_and_drops_references() {
        let table = Table::from_records(
            HEADER,
            &[
                &[
                    "HG002",
                    "s3://b/HG002.paternal.f1.fa.gz",
                    "gs://b/HG002.paternal.f1.fa.gz",
                    "aa",
                    "s3://b/HG002.maternal.f1.fa.gz",
                    "gs://b/HG002.maternal.f1.fa.gz",
                    "bb",
                ],
                &["CHM13_v1.1", "s3://b/chm13.fa", "gs://b/chm13.fa", "cc", "", "", ""],
            ],
        );
        let output = format_release_1(table).unwrap();
        assert_eq!(
            output.columns(),
            ["sample", "haplotype", "aws_fasta", "gcp_fasta", "fasta_sha256"]
        );
        assert_eq!(output.len(), 2);
        assert_eq!(
            output.column("haplotype").unwrap(),
            vec![Some("maternal"), Some("paternal")]
        );
        assert_eq!(output.rows()[0][4].as_deref(), Some("bb"));
    }

    #[test]
    fn unknown_haplotypes_become_dashes() {
        let table = Table::from_records(
            HEADER,
            &[&["HG003", "s3://b/a.fa", "gs://b/a.fa", "x", "s3://b/b.fa", "gs://b/b.fa", "y"]],
        );
        let output = format_release_1(table).unwrap();
        // Both halves share sample and haplotype, so only the first survives.
        assert_eq!(output.len(), 1);
        assert_eq!(output.rows()[0][1].as_deref(), Some("-"));
    }

    #[test]
    fn disagreeing_mirrors_fail() {
        let table = Table::from_records(
            HEADER,
            &[&[
                "HG004",
                "s3://b/HG004.maternal.fa",
                "gs://b/HG004.paternal.fa",
                "x",
                "s3://b/HG004.paternal.fa",
                "gs://b/HG004.paternal.fa",
                "y",
            ]],
        );
        assert_matches!(format_release_1(table), Err(CatalogError::Format(message)) if message.ends_with("HG004"));
    }

    #[test]
    fn duplicate_samples_fail() {
        let row: &[&str] = &["HG002", "a", "b", "c", "d", "e", "f"];
        let table = Table::from_records(HEADER, &[row, row]);
        assert_matches!(format_release_1(table), Err(CatalogError::Format(_)));
    }

    #[test]
    fn haplotype_names_map_to_ids() {
        assert_eq!(haplotype_id("maternal"), "2");
        assert_eq!(haplotype_id("paternal"), "1");
        assert_eq!(haplotype_id("-"), "-");
    }
}
