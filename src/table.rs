use std::cmp::Ordering;
use std::collections::HashSet;
use std::fs;
use std::io::Write;
use std::path::Path;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::CatalogError;

/// Tokens read as missing cells when `keep_default_na` is set, matching the
/// dataframe defaults the source sheets were authored against.
pub const DEFAULT_NA_TOKENS: &[&str] = &[
    "", "#N/A", "#N/A N/A", "#NA", "-1.#IND", "-1.#QNAN", "-NaN", "-nan", "1.#IND", "1.#QNAN",
    "<NA>", "N/A", "NA", "NULL", "NaN", "None", "n/a", "nan", "null",
];

/// Sentinel written into cells that a later release introduced.
pub const NOT_AVAILABLE: &str = "N/A";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReadOptions {
    pub keep_default_na: bool,
    pub trim: bool,
}

impl Default for ReadOptions {
    fn default() -> Self {
        Self {
            keep_default_na: true,
            trim: false,
        }
    }
}

impl ReadOptions {
    /// Every cell is kept as its literal string; nothing becomes missing.
    pub fn strings() -> Self {
        Self {
            keep_default_na: false,
            trim: false,
        }
    }
}

pub type Cell = Option<String>;

/// An in-memory table of string cells. `None` marks a missing cell.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Table {
    columns: Vec<String>,
    rows: Vec<Vec<Cell>>,
}

#[derive(Debug, Clone, Copy)]
pub struct RowRef<'a> {
    columns: &'a [String],
    cells: &'a [Cell],
}

impl<'a> RowRef<'a> {
    pub fn get(&self, column: &str) -> Option<&'a str> {
        let index = self.columns.iter().position(|name| name == column)?;
        self.cells.get(index).and_then(|cell| cell.as_deref())
    }

    pub fn cells(&self) -> &'a [Cell] {
        self.cells
    }
}

impl Table {
    pub fn new(columns: Vec<String>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
        }
    }

    pub fn from_records(columns: &[&str], records: &[&[&str]]) -> Self {
        let mut table = Self::new(columns.iter().map(|name| name.to_string()).collect());
        for record in records {
            table.push_row(record.iter().map(|value| Some(value.to_string())).collect());
        }
        table
    }

    pub fn read_delimited(
        source_name: &str,
        text: &str,
        separator: u8,
        options: ReadOptions,
    ) -> Result<Self, CatalogError> {
        let parse_error = |err: csv::Error| CatalogError::Parse {
            source_name: source_name.to_string(),
            message: err.to_string(),
        };
        let mut reader = csv::ReaderBuilder::new()
            .delimiter(separator)
            .has_headers(true)
            .flexible(true)
            .from_reader(text.as_bytes());

        let columns = reader
            .headers()
            .map_err(parse_error)?
            .iter()
            .map(normalize_header)
            .collect::<Vec<_>>();
        let mut table = Self::new(columns);

        for (index, record) in reader.records().enumerate() {
            let record = record.map_err(parse_error)?;
            if record.len() > table.columns.len() {
                return Err(CatalogError::Parse {
                    source_name: source_name.to_string(),
                    message: format!(
                        "row {} has {} fields but the header has {}",
                        index + 2,
                        record.len(),
                        table.columns.len()
                    ),
                });
            }
            let row = record
                .iter()
                .map(|raw| {
                    let value = if options.trim { raw.trim() } else { raw };
                    if options.keep_default_na && DEFAULT_NA_TOKENS.contains(&value) {
                        None
                    } else {
                        Some(value.to_string())
                    }
                })
                .collect();
            table.push_row(row);
        }
        Ok(table)
    }

    pub fn read_path(
        path: &Path,
        separator: u8,
        options: ReadOptions,
    ) -> Result<Self, CatalogError> {
        let text = fs::read_to_string(path)
            .map_err(|err| CatalogError::Filesystem(format!("read {}: {err}", path.display())))?;
        let name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        Self::read_delimited(&name, &text, separator, options)
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<Cell>] {
        &self.rows
    }

    pub fn iter_rows(&self) -> impl Iterator<Item = RowRef<'_>> {
        self.rows.iter().map(|cells| RowRef {
            columns: &self.columns,
            cells,
        })
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|column| column == name)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column_index(name).is_some()
    }

    pub fn column(&self, name: &str) -> Option<Vec<Option<&str>>> {
        let index = self.column_index(name)?;
        Some(
            self.rows
                .iter()
                .map(|row| row.get(index).and_then(|cell| cell.as_deref()))
                .collect(),
        )
    }

    pub fn require_column(&self, name: &str) -> Result<usize, CatalogError> {
        self.column_index(name)
            .ok_or_else(|| self.missing_column(name))
    }

    /// Short rows are padded with missing cells.
    pub fn push_row(&mut self, mut row: Vec<Cell>) {
        debug_assert!(row.len() <= self.columns.len());
        if row.len() < self.columns.len() {
            row.resize(self.columns.len(), None);
        }
        self.rows.push(row);
    }

    /// Row-wise union. Columns keep their order of first appearance; cells of
    /// columns a part does not have are left missing.
    pub fn concat(parts: Vec<Table>) -> Table {
        let mut columns: Vec<String> = Vec::new();
        let mut seen = HashSet::new();
        for part in &parts {
            for column in &part.columns {
                if seen.insert(column.clone()) {
                    columns.push(column.clone());
                }
            }
        }

        let mut combined = Table::new(columns);
        for part in parts {
            let positions = part
                .columns
                .iter()
                .map(|column| combined.column_index(column))
                .collect::<Vec<_>>();
            for row in part.rows {
                let mut target = vec![None; combined.columns.len()];
                for (cell, position) in row.into_iter().zip(&positions) {
                    if let Some(position) = position {
                        target[*position] = cell;
                    }
                }
                combined.rows.push(target);
            }
        }
        combined
    }

    pub fn append(self, other: Table) -> Table {
        Table::concat(vec![self, other])
    }

    pub fn fill_missing(&mut self, value: &str) {
        for cell in self.rows.iter_mut().flatten() {
            if cell.is_none() {
                *cell = Some(value.to_string());
            }
        }
    }

    /// Adds `name` or replaces its values.
    pub fn set_column(&mut self, name: &str, values: Vec<Cell>) -> Result<(), CatalogError> {
        if values.len() != self.rows.len() {
            return Err(CatalogError::Format(format!(
                "column `{name}` has {} values but the table has {} rows",
                values.len(),
                self.rows.len()
            )));
        }
        let index = match self.column_index(name) {
            Some(index) => index,
            None => {
                self.columns.push(name.to_string());
                for row in &mut self.rows {
                    row.push(None);
                }
                self.columns.len() - 1
            }
        };
        for (row, value) in self.rows.iter_mut().zip(values) {
            row[index] = value;
        }
        Ok(())
    }

    pub fn with_constant(mut self, name: &str, value: &str) -> Result<Self, CatalogError> {
        let values = vec![Some(value.to_string()); self.rows.len()];
        self.set_column(name, values)?;
        Ok(self)
    }

    pub fn ensure_column(&mut self, name: &str, default: &str) {
        if !self.has_column(name) {
            self.columns.push(name.to_string());
            for row in &mut self.rows {
                row.push(Some(default.to_string()));
            }
        }
    }

    /// Applies `f` to every present cell of `name`. Returns false when the
    /// column does not exist.
    pub fn map_column<F>(&mut self, name: &str, f: F) -> bool
    where
        F: Fn(&str) -> String,
    {
        let Some(index) = self.column_index(name) else {
            return false;
        };
        for row in &mut self.rows {
            if let Some(value) = row[index].as_deref() {
                row[index] = Some(f(value));
            }
        }
        true
    }

    /// Keeps only the mapped source columns (renamed, in mapping order) plus
    /// any `retain` columns the table has.
    pub fn project(
        &self,
        mapping: &IndexMap<String, String>,
        retain: &[String],
    ) -> Result<Table, CatalogError> {
        let mut indices = Vec::new();
        let mut names = Vec::new();
        for (source, target) in mapping {
            indices.push(self.require_column(source)?);
            names.push(target.clone());
        }
        for column in retain {
            if mapping.contains_key(column) || names.contains(column) {
                continue;
            }
            if let Some(index) = self.column_index(column) {
                indices.push(index);
                names.push(column.clone());
            }
        }
        Ok(self.pick(&indices, names))
    }

    pub fn select(&self, names: &[&str]) -> Result<Table, CatalogError> {
        let indices = names
            .iter()
            .map(|name| self.require_column(name))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(self.pick(
            &indices,
            names.iter().map(|name| name.to_string()).collect(),
        ))
    }

    /// Reorders to `order`; listed columns the table lacks are added as missing.
    pub fn reindex(&self, order: &[String]) -> Table {
        let mut reindexed = Table::new(order.to_vec());
        let positions = order
            .iter()
            .map(|column| self.column_index(column))
            .collect::<Vec<_>>();
        for row in &self.rows {
            reindexed.rows.push(
                positions
                    .iter()
                    .map(|position| position.and_then(|index| row[index].clone()))
                    .collect(),
            );
        }
        reindexed
    }

    pub fn rename(&mut self, from: &str, to: &str) {
        if let Some(index) = self.column_index(from) {
            self.columns[index] = to.to_string();
        }
    }

    pub fn drop_columns(&mut self, names: &[&str]) {
        let keep = self
            .columns
            .iter()
            .map(|column| !names.contains(&column.as_str()))
            .collect::<Vec<_>>();
        let mut flags = keep.iter();
        self.columns.retain(|_| *flags.next().unwrap_or(&true));
        for row in &mut self.rows {
            let mut flags = keep.iter();
            row.retain(|_| *flags.next().unwrap_or(&true));
        }
    }

    pub fn retain_rows<F>(&mut self, keep: F)
    where
        F: Fn(RowRef<'_>) -> bool,
    {
        let columns = &self.columns;
        self.rows.retain(|cells| keep(RowRef { columns, cells }));
    }

    /// Stable sort by the given columns; missing cells sort last.
    pub fn sort_by_columns(&mut self, names: &[&str]) -> Result<(), CatalogError> {
        let indices = names
            .iter()
            .map(|name| self.require_column(name))
            .collect::<Result<Vec<_>, _>>()?;
        self.rows.sort_by(|left, right| {
            for index in &indices {
                let ordering = match (&left[*index], &right[*index]) {
                    (Some(a), Some(b)) => a.cmp(b),
                    (Some(_), None) => Ordering::Less,
                    (None, Some(_)) => Ordering::Greater,
                    (None, None) => Ordering::Equal,
                };
                if ordering != Ordering::Equal {
                    return ordering;
                }
            }
            Ordering::Equal
        });
        Ok(())
    }

    /// Drops rows whose values in `names` repeat an earlier row.
    pub fn dedup_by_columns(&mut self, names: &[&str]) -> Result<(), CatalogError> {
        let indices = names
            .iter()
            .map(|name| self.require_column(name))
            .collect::<Result<Vec<_>, _>>()?;
        let mut seen = HashSet::new();
        self.rows.retain(|row| {
            let key = indices
                .iter()
                .map(|index| row[*index].clone())
                .collect::<Vec<_>>();
            seen.insert(key)
        });
        Ok(())
    }

    pub fn write_csv<W: Write>(&self, writer: W) -> Result<(), CatalogError> {
        let mut writer = csv::Writer::from_writer(writer);
        writer
            .write_record(&self.columns)
            .map_err(|err| CatalogError::Filesystem(err.to_string()))?;
        for row in &self.rows {
            writer
                .write_record(row.iter().map(|cell| cell.as_deref().unwrap_or("")))
                .map_err(|err| CatalogError::Filesystem(err.to_string()))?;
        }
        writer
            .flush()
            .map_err(|err| CatalogError::Filesystem(err.to_string()))
    }

    pub fn to_csv_string(&self) -> Result<String, CatalogError> {
        let mut buffer = Vec::new();
        self.write_csv(&mut buffer)?;
        String::from_utf8(buffer).map_err(|err| CatalogError::Format(err.to_string()))
    }

    fn pick(&self, indices: &[usize], names: Vec<String>) -> Table {
        let mut picked = Table::new(names);
        for row in &self.rows {
            picked
                .rows
                .push(indices.iter().map(|index| row[*index].clone()).collect());
        }
        picked
    }

    fn missing_column(&self, name: &str) -> CatalogError {
        CatalogError::MissingColumn {
            column: name.to_string(),
            available: self.columns.join(", "),
        }
    }
}

fn normalize_header(raw: &str) -> String {
    raw.trim_matches('\u{feff}').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_tsv_with_default_missing_tokens() {
        let text = "sample\thaplotype\tnote\nHG002\tmaternal\tNA\nHG003\t\tok\n";
        let table = Table::read_delimited("index.tsv", text, b'\t', ReadOptions::default())
            .unwrap();
        assert_eq!(table.columns(), ["sample", "haplotype", "note"]);
        assert_eq!(table.len(), 2);
        assert_eq!(table.rows()[0][2], None);
        assert_eq!(table.rows()[1][1], None);
    }

    #[test]
    fn strings_option_keeps_literals() {
        let text = "a,b\nNA,\n";
        let table = Table::read_delimited("x.csv", text, b',', ReadOptions::strings()).unwrap();
        assert_eq!(table.rows()[0], vec![Some("NA".to_string()), Some(String::new())]);
    }

    #[test]
    fn concat_unions_columns_in_first_seen_order() {
        let first = Table::from_records(&["a", "b"], &[&["1", "2"]]);
        let second = Table::from_records(&["b", "c"], &[&["3", "4"]]);
        let combined = first.append(second);
        assert_eq!(combined.columns(), ["a", "b", "c"]);
        assert_eq!(combined.rows()[0][2], None);
        assert_eq!(combined.rows()[1][0], None);
        assert_eq!(combined.rows()[1][1].as_deref(), Some("3"));
    }

    #[test]
    fn project_renames_and_retains() {
        let table = Table::from_records(&["sample", "junk", "release"], &[&["HG1", "x", "1"]]);
        let mut mapping = IndexMap::new();
        mapping.insert("sample".to_string(), "sample_id".to_string());
        let projected = table.project(&mapping, &["release".to_string()]).unwrap();
        assert_eq!(projected.columns(), ["sample_id", "release"]);
    }

    #[test]
    fn project_reports_missing_source_column() {
        let table = Table::from_records(&["a"], &[]);
        let mut mapping = IndexMap::new();
        mapping.insert("b".to_string(), "c".to_string());
        let err = table.project(&mapping, &[]).unwrap_err();
        assert!(matches!(err, CatalogError::MissingColumn { .. }));
    }

    #[test]
    fn rows_longer_than_the_header_fail() {
        let err = Table::read_delimited("wide.csv", "a,b\n1,2,3\n4,5\n", b',', ReadOptions::strings())
            .unwrap_err();
        assert!(matches!(
            err,
            CatalogError::Parse { source_name, message }
                if source_name == "wide.csv" && message.starts_with("row 2 ")
        ));

        let short = Table::read_delimited("short.csv", "a,b\n1\n", b',', ReadOptions::strings()).unwrap();
        assert_eq!(short.rows()[0], vec![Some("1".to_string()), None]);
    }

    #[test]
    fn writes_missing_cells_as_empty() {
        let mut table = Table::new(vec!["a".to_string(), "b".to_string()]);
        table.push_row(vec![Some("1".to_string())]);
        assert_eq!(table.to_csv_string().unwrap(), "a,b\n1,\n");
    }

    #[test]
    fn sort_and_dedup() {
        let mut table = Table::from_records(
            &["sample", "haplotype"],
            &[&["HG2", "b"], &["HG1", "b"], &["HG1", "a"], &["HG1", "a"]],
        );
        table.sort_by_columns(&["sample", "haplotype"]).unwrap();
        table.dedup_by_columns(&["sample", "haplotype"]).unwrap();
        assert_eq!(table.len(), 3);
        assert_eq!(table.iter_rows().next().unwrap().get("haplotype"), Some("a"));
    }
}
