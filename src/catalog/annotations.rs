use std::sync::Arc;

use super::{Entity, EntityPlan};
use crate::error::CatalogError;
use crate::release::ReleaseDescriptor;
use crate::schema::{self, SchemaModel};
use crate::spec::{
    Branch, ContextualFormatter, InputFormatter, LoadContext, Metadata, Shaping, SourceSpec,
    column_map,
};
use crate::table::{ReadOptions, Table};
use crate::validate::Validator;

pub const TABLE_KIND: &str = "ANNOTATIONS";
pub const ANNOTATION_TYPE: &str = "annotation_type";

const RELEASE_1_BASE_URL: &str = "https://raw.githubusercontent.com/human-pangenomics/HPP_Year1_Assemblies/main/annotation_index/Year1_assemblies_v2_genbank_";

/// (annotation type, index file suffix)
const RELEASE_1_TYPES: &[(&str, &str)] = &[
    ("ASat", "ASat"),
    ("DNA_BRNN", "DNA_BRNN"),
    ("HSat", "HSat"),
    ("Repeat_masker", "Repeat_Masker"),
    ("Seg_Dups", "Seg_Dups"),
    ("TRF", "TRF"),
];

/// (value of the `reference` column, annotation type)
const RELEASE_1_CAT_TYPES: &[(&str, &str)] =
    &[("chm13", "CAT_genes_chm13"), ("hg38", "CAT_genes_hg38")];

/// (location column, annotation type)
const RELEASE_1_FLAGGER_TYPES: &[(&str, &str)] = &[
    (
        "unreliable_only_no_MT_file_location",
        "flagger_unreliable_only_no_MT_file_location",
    ),
    (
        "unreliable_only_file_location",
        "flagger_unreliable_only_file_location",
    ),
    ("all_file_location", "flagger_all_file_location"),
];

const RELEASE_1_HAPLOTYPE_IDS: &[(&str, &str)] =
    &[("maternal", "2"), ("paternal", "1"), ("-", "")];

const RELEASE_2_BASE_URL: &str = "https://raw.githubusercontent.com/human-pangenomics/hprc_intermediate_assembly/refs/heads/main/data_tables/";

const RELEASE_2_SOURCES: &[(&str, &str)] = &[
    (
        "Reference Mappings CHM13",
        "annotation/alignments_to_ref/alignments_to_ref_chm13_winnowmap_bai_hprc_r2_v1.1.index.csv",
    ),
    (
        "Reference Mappings CHM13",
        "annotation/alignments_to_ref/alignments_to_ref_chm13_winnowmap_hprc_r2_v1.1.index.csv",
    ),
    (
        "Reference Mappings GRCh38",
        "annotation/alignments_to_ref/alignments_to_ref_grch38_winnowmap_bai_hprc_r2_v1.1.index.csv",
    ),
    (
        "Reference Mappings GRCh38",
        "annotation/alignments_to_ref/alignments_to_ref_grch38_winnowmap_hprc_r2_v1.1.index.csv",
    ),
    ("CAT Genes", "annotation/cat/cat_genes_hprc_r2_v1.2.index.csv"),
    ("CenSat", "annotation/censat/censat_hprc_r2_v1.0.index.csv"),
    (
        "chains CHM13",
        "annotation/chains/chains_to_chm13_mc_hprc_r2_v1.0.index.csv",
    ),
    (
        "chains GRCh38",
        "annotation/chains/chains_to_grch38_mc_hprc_r2_v1.0.index.csv",
    ),
    (
        "ChromAlias",
        "annotation/chrom_assignment/chrom_alias_hprc_r2_v1.0.index.csv",
    ),
    (
        "ChromAlias Gaps",
        "annotation/chrom_assignment/gaps_hprc_r2_v1.0.index.csv",
    ),
    (
        "ChromAlias T2T",
        "annotation/chrom_assignment/t2t_sequences_hprc_r2_v1.0.index.csv",
    ),
    ("liftoff", "annotation/liftoff/liftoff_genes_hprc_r2_v1.0.index.csv"),
    (
        "methylation",
        "annotation/methylation/ont_methylation_hprc_r2_v1.0.index.csv",
    ),
    (
        "Repeat_masker Bed",
        "annotation/repeat_masker/repeat_masker_bed_hprc_r2_v1.0.index.csv",
    ),
    (
        "Repeat_masker Out",
        "annotation/repeat_masker/repeat_masker_out_hprc_r2_v1.0.index.csv",
    ),
    ("Seg_Dups", "annotation/segdups/segdups_hprc_r2_v1.1.index.csv"),
    ("Flagger_HiFi", "assembly_qc/flagger/flagger_hifi_v0.1.csv"),
    ("Flagger_ONT", "assembly_qc/flagger/flagger_ont_v0.1.1.csv"),
    ("NucFlag", "assembly_qc/nucflag/nucflag_pre_release_v0.2.index.csv"),
];

pub fn plan(validator: &Validator) -> EntityPlan {
    EntityPlan {
        entity: Entity::Annotations,
        table_kind: TABLE_KIND,
        releases: releases(validator),
        size_column: "location",
        label: "annotation",
        output_file: "annotations.csv",
        drop_biosample_columns: &[],
        finish: None,
    }
}

pub fn releases(validator: &Validator) -> Vec<ReleaseDescriptor> {
    let mut release_1 = RELEASE_1_TYPES
        .iter()
        .map(|(kind, suffix)| {
            SourceSpec::source(reshape(release_1_url(suffix), true)).contextual_input_formatter(
                validator.formatter(schema::release_one_annotation(), Some(with_type(*kind))),
            )
        })
        .collect::<Vec<_>>();
    release_1.push(SourceSpec::fanout(
        release_1_url("CAT_genes"),
        split_cat_genes,
        Shaping::default().contextual_input_formatter(branch_formatter(
            validator,
            schema::release_one_annotation(),
            true,
        )),
    ));
    release_1.push(SourceSpec::fanout(
        release_1_url("Flagger"),
        split_flagger,
        Shaping::default().contextual_input_formatter(branch_formatter(
            validator,
            schema::release_one_flagger_annotation(),
            false,
        )),
    ));

    let release_2 = RELEASE_2_SOURCES
        .iter()
        .map(|(kind, path)| {
            SourceSpec::url(format!("{RELEASE_2_BASE_URL}{path}")).contextual_input_formatter(
                validator.formatter(schema::annotation(), Some(with_type(*kind))),
            )
        })
        .collect::<Vec<_>>();

    vec![
        ReleaseDescriptor::new("1").table(
            TABLE_KIND,
            SourceSpec::sources(release_1)
                .separator(b'\t')
                .read_options(ReadOptions::strings()),
        ),
        ReleaseDescriptor::new("2").table(
            TABLE_KIND,
            SourceSpec::sources(release_2)
                .separator(b',')
                .read_options(ReadOptions::strings()),
        ),
    ]
}

fn release_1_url(suffix: &str) -> SourceSpec {
    SourceSpec::url(format!("{RELEASE_1_BASE_URL}{suffix}.index"))
}

pub fn release_1_haplotype_id(name: &str) -> String {
    RELEASE_1_HAPLOTYPE_IDS
        .iter()
        .find(|(haplotype, _)| *haplotype == name)
        .map(|(_, id)| id.to_string())
        .unwrap_or_else(|| name.to_string())
}

fn projection(with_haplotype: bool) -> Vec<(&'static str, &'static str)> {
    let mut columns = vec![("sample", "sample_id")];
    if with_haplotype {
        columns.push(("haplotype", "haplotype"));
    }
    columns.push(("file_location", "location"));
    columns
}

fn reshape(spec: SourceSpec, with_haplotype: bool) -> SourceSpec {
    let spec = if with_haplotype {
        spec.map_column("haplotype", release_1_haplotype_id)
    } else {
        spec
    };
    spec.columns(&projection(with_haplotype))
}

fn reshape_table(mut table: Table, with_haplotype: bool) -> Result<Table, CatalogError> {
    if with_haplotype {
        table.map_column("haplotype", release_1_haplotype_id);
    }
    table.project(&column_map(&projection(with_haplotype)), &[])
}

fn with_type(kind: &str) -> InputFormatter {
    let kind = kind.to_string();
    Arc::new(move |table: Table| table.with_constant(ANNOTATION_TYPE, &kind))
}

/// Validates one fan-out branch; the branch tag names its annotation type.
fn branch_formatter(
    validator: &Validator,
    model: SchemaModel,
    with_haplotype: bool,
) -> ContextualFormatter {
    let validator = validator.clone();
    Arc::new(
        move |table: Table,
              metadata: Option<Metadata>,
              context: &LoadContext|
              -> Result<(Table, Option<Metadata>), CatalogError> {
            let kind = metadata
                .as_ref()
                .and_then(Metadata::tag)
                .ok_or_else(|| {
                    CatalogError::Format("annotation branch has no type tag".to_string())
                })?
                .to_string();
            let table = reshape_table(table, with_haplotype)?;
            let validate = validator.formatter(model.clone(), Some(with_type(&kind)));
            validate(table, None, context)
        },
    )
}

fn tagged_context(context: &LoadContext, kind: &str) -> LoadContext {
    LoadContext {
        source_file_names: context
            .source_file_names
            .iter()
            .map(|name| format!("{name} ({kind})"))
            .collect(),
    }
}

pub fn split_cat_genes(table: Table, context: &LoadContext) -> Result<Vec<Branch>, CatalogError> {
    table.require_column("reference")?;
    Ok(RELEASE_1_CAT_TYPES
        .iter()
        .map(|(reference, kind)| {
            let mut subset = table.clone();
            subset.retain_rows(|row| row.get("reference") == Some(*reference));
            Branch {
                table: subset,
                tag: kind.to_string(),
                context: tagged_context(context, kind),
            }
        })
        .collect())
}

pub fn split_flagger(table: Table, context: &LoadContext) -> Result<Vec<Branch>, CatalogError> {
    RELEASE_1_FLAGGER_TYPES
        .iter()
        .map(|(location_column, kind)| {
            table.require_column(location_column)?;
            let others = RELEASE_1_FLAGGER_TYPES
                .iter()
                .map(|(column, _)| *column)
                .filter(|column| column != location_column)
                .collect::<Vec<_>>();
            let mut branch = table.clone();
            branch.drop_columns(&others);
            branch.rename(location_column, "file_location");
            Ok(Branch {
                table: branch,
                tag: kind.to_string(),
                context: tagged_context(context, kind),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn context() -> LoadContext {
        LoadContext {
            source_file_names: vec!["Year1_assemblies_v2_genbank_Flagger.index".to_string()],
        }
    }

    #[test]
    fn flagger_fans_out_per_location_column() {
        let table = Table::from_records(
            &[
                "sample",
                "unreliable_only_no_MT_file_location",
                "unreliable_only_file_location",
                "all_file_location",
            ],
            &[&["HG002", "s3://a", "s3://b", "s3://c"]],
        );
        let branches = split_flagger(table, &context()).unwrap();
        assert_eq!(branches.len(), 3);
        assert_eq!(branches[2].table.columns(), ["sample", "file_location"]);
        assert_eq!(branches[2].table.rows()[0][1].as_deref(), Some("s3://c"));
        assert_eq!(branches[0].tag, "flagger_unreliable_only_no_MT_file_location");
        assert_eq!(
            branches[1].context.source_file_names,
            vec!["Year1_assemblies_v2_genbank_Flagger.index (flagger_unreliable_only_file_location)"]
        );
    }

    #[test]
    fn cat_genes_split_by_reference() {
        let table = Table::from_records(
            &["sample", "haplotype", "reference", "file_location"],
            &[
                &["HG002", "maternal", "chm13", "s3://a"],
                &["HG002", "maternal", "hg38", "s3://b"],
                &["HG002", "paternal", "hg38", "s3://c"],
            ],
        );
        let branches = split_cat_genes(table, &context()).unwrap();
        assert_eq!(branches[0].table.len(), 1);
        assert_eq!(branches[1].table.len(), 2);
        assert_eq!(branches[1].tag, "CAT_genes_hg38");
    }

    #[test]
    fn branch_formatter_validates_reshaped_rows() {
        let formatter = branch_formatter(
            &Validator::default(),
            schema::release_one_annotation(),
            true,
        );
        let table = Table::from_records(
            &["sample", "haplotype", "reference", "file_location"],
            &[&["HG002", "-", "chm13", "s3://a"], &["HG003", "paternal", "chm13", ""]],
        );
        let (table, metadata) = formatter(
            table,
            Some(Metadata::Tag("CAT_genes_chm13".to_string())),
            &context(),
        )
        .unwrap();
        assert_eq!(
            table.columns(),
            ["sample_id", "haplotype", "location", "annotation_type"]
        );
        assert_eq!(table.rows()[1][1].as_deref(), Some("1"));
        let errors = metadata.unwrap();
        let files = errors.file_errors();
        assert_eq!(files[0].errors.len(), 1);
        assert_eq!(files[0].errors[0].row, 3);
        assert_eq!(files[0].errors[0].field, "location");
    }

    #[test]
    fn release_1_haplotypes() {
        assert_eq!(release_1_haplotype_id("-"), "");
        assert_eq!(release_1_haplotype_id("maternal"), "2");
    }
}
