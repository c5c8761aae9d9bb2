use camino::Utf8Path;

use crate::error::CatalogError;
use crate::schema;
use crate::table::{Cell, ReadOptions, Table};
use crate::validate::{FileErrors, Validator};

pub const OUTPUT_FILE: &str = "alignments.csv";
pub const DEFAULT_SOURCE: &str = "source/alignments.csv";

const VERSIONS: &[&str] = &["v1.0", "v1.1"];
const REFERENCE_COORDINATES: &[&str] = &["chm13", "grch38"];

pub fn determine_version(file_name: &str) -> &'static str {
    VERSIONS
        .iter()
        .find(|version| file_name.contains(*version))
        .copied()
        .unwrap_or("")
}

/// Whole-genome files (`all` anywhere in the name) carry no coordinates.
pub fn extract_reference_coordinates(file_name: &str) -> &'static str {
    if file_name.to_lowercase().contains("all") {
        return "";
    }
    REFERENCE_COORDINATES
        .iter()
        .find(|reference| file_name.contains(*reference))
        .copied()
        .unwrap_or("")
}

pub fn alignment_name(version: &str, pipeline: &str, coordinates: &str) -> String {
    let pipeline = if pipeline == "minigraph-cactus" {
        "mc"
    } else {
        pipeline
    };
    let base = format!("hprc-{version}-{pipeline}");
    if coordinates.is_empty() {
        base
    } else {
        format!("{base}-{coordinates}")
    }
}

/// Adds `version`, `reference_coordinates` (pggb rows only) and `alignment`.
pub fn derive_columns(mut table: Table) -> Result<Table, CatalogError> {
    table.require_column("file")?;
    table.require_column("pipeline")?;
    table.ensure_column("reference_coordinates", "");

    let files = table.column("file").unwrap_or_default();
    let pipelines = table.column("pipeline").unwrap_or_default();
    let existing = table.column("reference_coordinates").unwrap_or_default();

    let mut versions: Vec<Cell> = Vec::with_capacity(table.len());
    let mut coordinates: Vec<Cell> = Vec::with_capacity(table.len());
    let mut alignments: Vec<Cell> = Vec::with_capacity(table.len());
    for ((file, pipeline), current) in files.into_iter().zip(pipelines).zip(existing) {
        let file = file.unwrap_or_default();
        let pipeline = pipeline.unwrap_or_default();
        let version = determine_version(file);
        let coords = if pipeline == "pggb" {
            extract_reference_coordinates(file)
        } else {
            current.unwrap_or_default()
        };
        alignments.push(Some(alignment_name(version, pipeline, coords)));
        versions.push(Some(version.to_string()));
        coordinates.push(Some(coords.to_string()));
    }

    table.set_column("reference_coordinates", coordinates)?;
    table.set_column("version", versions)?;
    table.set_column("alignment", alignments)?;
    Ok(table)
}

fn read(path: &Utf8Path) -> Result<Table, CatalogError> {
    Table::read_path(path.as_std_path(), b',', ReadOptions::strings())
}

/// Reads the source table, derives the naming columns and validates it.
pub fn build(source: &Utf8Path, validator: &Validator) -> Result<(Table, FileErrors), CatalogError> {
    let table = derive_columns(read(source)?)?;
    let (table, errors) = validator.validate(&table, &schema::alignment())?;
    Ok((table, FileErrors::new(file_name(source), errors)))
}

pub fn validate_file(path: &Utf8Path, validator: &Validator) -> Result<FileErrors, CatalogError> {
    let (_, errors) = validator.validate(&read(path)?, &schema::alignment())?;
    Ok(FileErrors::new(file_name(path), errors))
}

fn file_name(path: &Utf8Path) -> String {
    path.file_name().unwrap_or(path.as_str()).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn naming_rules() {
        assert_eq!(determine_version("hprc-v1.1-mc-chm13.gfa.gz"), "v1.1");
        assert_eq!(determine_version("unversioned.gfa"), "");
        assert_eq!(extract_reference_coordinates("hprc-v1.0-pggb-grch38.gfa"), "grch38");
        assert_eq!(extract_reference_coordinates("hprc-v1.0-pggb-chm13.ALL.gfa"), "");
        assert_eq!(alignment_name("v1.1", "minigraph-cactus", ""), "hprc-v1.1-mc");
        assert_eq!(alignment_name("v1.0", "pggb", "chm13"), "hprc-v1.0-pggb-chm13");
    }

    #[test]
    fn coordinates_only_for_pggb() {
        let table = Table::from_records(
            &["file", "pipeline"],
            &[
                &["hprc-v1.0-pggb-chm13.gfa", "pggb"],
                &["hprc-v1.1-mc-chm13.gfa", "minigraph-cactus"],
            ],
        );
        let derived = derive_columns(table).unwrap();
        assert_eq!(
            derived.column("alignment").unwrap(),
            vec![Some("hprc-v1.0-pggb-chm13"), Some("hprc-v1.1-mc")]
        );
        assert_eq!(
            derived.column("reference_coordinates").unwrap(),
            vec![Some("chm13"), Some("")]
        );
    }

    #[test]
    fn na_location_is_a_value() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = camino::Utf8PathBuf::from_path_buf(dir.path().join("alignments.csv")).unwrap();
        std::fs::write(
            &path,
            "file,pipeline,loc,file_size\nhprc-v1.1-mc-chm13.gfa.gz,minigraph-cactus,N/A,NA\n",
        )
        .unwrap();

        let (table, errors) = build(&path, &Validator::default()).unwrap();
        assert!(errors.is_empty(), "{:?}", errors.errors);
        assert_eq!(table.column("loc").unwrap(), vec![Some("N/A")]);
        assert_eq!(table.column("file_size").unwrap(), vec![Some("NA")]);
    }

    #[test]
    fn undeclared_columns_are_rejected() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = camino::Utf8PathBuf::from_path_buf(dir.path().join("alignments.csv")).unwrap();
        std::fs::write(
            &path,
            "file,pipeline,loc,file_size,notes\nhprc-v1.0-pggb-grch38.gfa,pggb,s3://b/x,10,draft\n",
        )
        .unwrap();

        let errors = validate_file(&path, &Validator::default()).unwrap();
        assert_eq!(errors.file, "alignments.csv");
        assert!(
            errors
                .errors
                .iter()
                .any(|error| error.field == "notes" && error.message == "Extra inputs are not permitted")
        );
    }

    #[test]
    fn requires_file_and_pipeline() {
        let table = Table::from_records(&["file"], &[&["a.gfa"]]);
        assert!(matches!(
            derive_columns(table),
            Err(CatalogError::MissingColumn { column, .. }) if column == "pipeline"
        ));
    }
}
