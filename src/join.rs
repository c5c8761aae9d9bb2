use std::collections::{HashMap, HashSet};

use crate::error::CatalogError;
use crate::table::{Cell, Table};

const LEFT_SUFFIX: &str = "_x";
const RIGHT_SUFFIX: &str = "_y";

/// Left join where every `on` value may appear at most once in `right`.
/// Overlapping non-key columns get `_x`/`_y` suffixes.
pub fn left_join_many_to_one(left: &Table, right: &Table, on: &str) -> Result<Table, CatalogError> {
    let left_key = left.require_column(on)?;
    let right_key = right.require_column(on)?;

    let mut lookup: HashMap<&str, usize> = HashMap::new();
    for (index, row) in right.rows().iter().enumerate() {
        if let Some(value) = row[right_key].as_deref() {
            if lookup.insert(value, index).is_some() {
                return Err(CatalogError::JoinCardinality {
                    key: on.to_string(),
                    value: value.to_string(),
                });
            }
        }
    }

    let right_columns = right
        .columns()
        .iter()
        .enumerate()
        .filter(|(index, _)| *index != right_key)
        .collect::<Vec<_>>();
    let overlapping = |name: &str| name != on && left.has_column(name) && right.has_column(name);

    let mut columns = left
        .columns()
        .iter()
        .map(|name| {
            if overlapping(name) {
                format!("{name}{LEFT_SUFFIX}")
            } else {
                name.clone()
            }
        })
        .collect::<Vec<_>>();
    columns.extend(right_columns.iter().map(|(_, name)| {
        if overlapping(name) {
            format!("{name}{RIGHT_SUFFIX}")
        } else {
            name.to_string()
        }
    }));

    let mut joined = Table::new(columns);
    for row in left.rows() {
        let matched = row[left_key]
            .as_deref()
            .and_then(|value| lookup.get(value))
            .map(|index| &right.rows()[*index]);
        let mut cells: Vec<Cell> = row.clone();
        cells.extend(
            right_columns
                .iter()
                .map(|(index, _)| matched.and_then(|other| other[*index].clone())),
        );
        joined.push_row(cells);
    }
    Ok(joined)
}

/// Distinct `on` values of `left` with no counterpart in `right`, in first-seen order.
pub fn unmatched_keys(left: &Table, right: &Table, on: &str) -> Result<Vec<String>, CatalogError> {
    left.require_column(on)?;
    right.require_column(on)?;
    let known = right
        .column(on)
        .unwrap_or_default()
        .into_iter()
        .flatten()
        .collect::<HashSet<_>>();

    let mut seen = HashSet::new();
    Ok(left
        .column(on)
        .unwrap_or_default()
        .into_iter()
        .flatten()
        .filter(|value| !known.contains(value) && seen.insert(*value))
        .map(str::to_string)
        .collect())
}
