use indexmap::IndexMap;

use crate::validate::{FieldError, FileErrors};

/// Compresses ascending row numbers into ranges: `2-4, 7, and 9-10`.
pub fn format_index_list(indices: &[usize]) -> String {
    let mut ranges: Vec<(usize, usize)> = Vec::new();
    for &index in indices {
        match ranges.last_mut() {
            Some((_, end)) if *end + 1 == index => *end = index,
            _ => ranges.push((index, index)),
        }
    }
    let parts = ranges
        .iter()
        .map(|(start, end)| {
            if start == end {
                start.to_string()
            } else {
                format!("{start}-{end}")
            }
        })
        .collect::<Vec<_>>();

    match parts.split_last() {
        Some((last, rest)) if rest.len() >= 2 => format!("{}, and {last}", rest.join(", ")),
        _ => parts.join(" and "),
    }
}

/// One line per distinct (field, message), in order of first appearance.
pub fn format_file_errors(errors: &[FieldError]) -> String {
    let mut grouped: IndexMap<(&str, &str), Vec<usize>> = IndexMap::new();
    for error in errors {
        grouped
            .entry((error.field.as_str(), error.message.as_str()))
            .or_default()
            .push(error.row);
    }
    grouped
        .iter()
        .map(|((field, message), rows)| {
            let noun = if rows.len() == 1 { "row" } else { "rows" };
            format!(
                "{field}: {message} (source {noun} {})",
                format_index_list(rows)
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn format_errors(files: &[&FileErrors]) -> String {
    files
        .iter()
        .filter(|file| !file.is_empty())
        .map(|file| format!("{}:\n{}", file.file, format_file_errors(&file.errors)))
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Only files that actually reported errors.
pub fn files_with_errors<'a>(files: &[&'a FileErrors]) -> Vec<&'a FileErrors> {
    files.iter().copied().filter(|file| !file.is_empty()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn error(row: usize, field: &str, message: &str) -> FieldError {
        FieldError {
            row,
            field: field.to_string(),
            message: message.to_string(),
        }
    }

    #[test]
    fn index_lists() {
        assert_eq!(format_index_list(&[]), "");
        assert_eq!(format_index_list(&[5]), "5");
        assert_eq!(format_index_list(&[2, 3, 4]), "2-4");
        assert_eq!(format_index_list(&[2, 7]), "2 and 7");
        assert_eq!(format_index_list(&[2, 3, 4, 7, 9, 10]), "2-4, 7, and 9-10");
    }

    #[test]
    fn groups_by_field_and_message() {
        let errors = vec![
            error(2, "haplotype", "Field required"),
            error(3, "sample_id", "Field required"),
            error(3, "haplotype", "Field required"),
            error(4, "haplotype", "Field required"),
        ];
        assert_eq!(
            format_file_errors(&errors),
            "haplotype: Field required (source rows 2-4)\nsample_id: Field required (source row 3)"
        );
    }

    #[test]
    fn skips_clean_files() {
        let clean = FileErrors::new("clean.csv", Vec::new());
        let dirty = FileErrors::new("a.csv, b.csv", vec![error(2, "path", "Field required")]);
        let other = FileErrors::new("c.csv", vec![error(5, "n50", "unable to parse as integer")]);
        assert_eq!(
            format_errors(&[&clean, &dirty, &other]),
            "a.csv, b.csv:\npath: Field required (source row 2)\n\nc.csv:\nn50: unable to parse as integer (source row 5)"
        );
        assert_eq!(files_with_errors(&[&clean, &dirty]).len(), 1);
    }
}
