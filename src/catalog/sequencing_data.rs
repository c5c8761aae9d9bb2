use super::{Entity, EntityPlan};
use crate::error::CatalogError;
use crate::release::ReleaseDescriptor;
use crate::schema::{self, SchemaModel};
use crate::spec::{SourceLocation, SourceSpec};
use crate::table::{NOT_AVAILABLE, ReadOptions, Table};
use crate::validate::Validator;

pub const TABLE_KIND: &str = "SEQUENCING_DATA";

const SHEET_BASE_URL: &str = "https://docs.google.com/spreadsheets/d/1EuZNw2sdijKYpJLqgHUYBOF6F4ECry8EWKZzVPjAw4Y/gviz/tq?tqx=out:csv&sheet=";

/// (sheet name, local file name, row model)
const SHEETS: &[(&str, &str, fn() -> SchemaModel)] = &[
    ("hic", "hic_sheet.csv", schema::hic_sequencing_data),
    ("ont", "ont_sheet.csv", schema::ont_sequencing_data),
    ("dc", "dc_sheet.csv", schema::deep_consensus_sequencing_data),
    ("hifi", "hifi_sheet.csv", schema::hifi_sequencing_data),
    ("ill", "ill_sheet.csv", schema::illumina_sequencing_data),
    ("kinnex", "kinnex_sheet.csv", schema::kinnex_sequencing_data),
];

pub fn plan(validator: &Validator) -> EntityPlan {
    EntityPlan {
        entity: Entity::SequencingData,
        table_kind: TABLE_KIND,
        releases: releases(validator),
        size_column: "path",
        label: "sequencing data",
        output_file: "sequencing-data.csv",
        drop_biosample_columns: &["notes"],
        finish: Some(sort_columns),
    }
}

pub fn releases(validator: &Validator) -> Vec<ReleaseDescriptor> {
    let sheets = SHEETS
        .iter()
        .map(|(sheet, file_name, model)| {
            SourceSpec::url(SourceLocation::named(
                format!("{SHEET_BASE_URL}{sheet}"),
                *file_name,
            ))
            .contextual_input_formatter(validator.formatter(model(), None))
        })
        .collect();
    vec![
        ReleaseDescriptor::new("2").table(
            TABLE_KIND,
            SourceSpec::sources(sheets)
                .separator(b',')
                .read_options(ReadOptions::strings()),
        ),
    ]
}

/// Columns in byte order; cells a sheet did not have become `N/A`.
pub fn sort_columns(table: Table) -> Result<Table, CatalogError> {
    let mut columns = table.columns().to_vec();
    columns.sort();
    columns.dedup();
    let mut sorted = table.reindex(&columns);
    sorted.fill_missing(NOT_AVAILABLE);
    Ok(sorted)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn columns_are_sorted_and_filled() {
        let hic = Table::from_records(&["sample_id", "path", "coverage"], &[&["HG002", "s3://a", "30"]]);
        let ont = Table::from_records(&["whales", "sample_id", "path"], &[&["4", "HG003", "s3://b"]]);
        let sorted = sort_columns(Table::concat(vec![hic, ont])).unwrap();
        assert_eq!(sorted.columns(), ["coverage", "path", "sample_id", "whales"]);
        assert_eq!(sorted.rows()[1][0].as_deref(), Some("N/A"));
        assert_eq!(sorted.rows()[0][3].as_deref(), Some("N/A"));
    }

    #[test]
    fn one_source_per_sheet() {
        let releases = releases(&Validator::default());
        assert_eq!(releases.len(), 1);
        match &releases[0].tables[TABLE_KIND] {
            SourceSpec::Composite(node) => assert_eq!(node.children.len(), SHEETS.len()),
            other => panic!("unexpected spec {other:?}"),
        }
    }
}
