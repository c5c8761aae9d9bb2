use std::fmt;
use std::sync::Arc;

use clap::ValueEnum;
use indexmap::IndexMap;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::CatalogError;
use crate::schema::{FieldDef, FieldRange, SchemaModel};
use crate::spec::{ContextualFormatter, InputFormatter, LoadContext, Metadata};
use crate::table::{RowRef, Table};

/// Header row plus 1-based numbering: the first data row is row 2.
const FIRST_DATA_ROW: usize = 2;

const EXTRA_FORBIDDEN: &str = "Extra inputs are not permitted";

/// What a build does once validation has reported errors.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ValidationPolicy {
    /// Print the report and still write the output table.
    #[default]
    Warn,
    /// Print the report and abort before any output is written.
    Fail,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BooleanTokens {
    #[serde(rename = "true")]
    pub truthy: String,
    #[serde(rename = "false")]
    pub falsy: String,
}

impl BooleanTokens {
    pub fn upper() -> Self {
        Self {
            truthy: "TRUE".to_string(),
            falsy: "FALSE".to_string(),
        }
    }

    pub fn title() -> Self {
        Self {
            truthy: "True".to_string(),
            falsy: "False".to_string(),
        }
    }

    pub fn parse(&self, raw: &str) -> Option<bool> {
        if raw == self.truthy {
            Some(true)
        } else if raw == self.falsy {
            Some(false)
        } else {
            None
        }
    }

    pub fn render(&self, value: bool) -> &str {
        if value { &self.truthy } else { &self.falsy }
    }
}

impl Default for BooleanTokens {
    fn default() -> Self {
        Self::upper()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    String(String),
    Integer(i64),
    Float(f64),
    Boolean(bool),
}

impl Value {
    pub fn render(&self, tokens: &BooleanTokens) -> String {
        match self {
            Value::String(value) => value.clone(),
            Value::Integer(value) => value.to_string(),
            Value::Float(value) => value.to_string(),
            Value::Boolean(value) => tokens.render(*value).to_string(),
        }
    }

    fn as_number(&self) -> Option<f64> {
        match self {
            Value::Integer(value) => Some(*value as f64),
            Value::Float(value) => Some(*value),
            _ => None,
        }
    }
}

pub type TypedRow = IndexMap<String, Option<Value>>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub row: usize,
    pub field: String,
    pub message: String,
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "row {}: {}: {}", self.row, self.field, self.message)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileErrors {
    pub file: String,
    pub errors: Vec<FieldError>,
}

impl FileErrors {
    pub fn new(file: impl Into<String>, errors: Vec<FieldError>) -> Self {
        Self {
            file: file.into(),
            errors,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }
}

#[derive(Debug)]
struct CastFailure {
    field: String,
    message: String,
}

#[derive(Debug, Clone, Default)]
pub struct Validator {
    tokens: BooleanTokens,
}

impl Validator {
    pub fn new(tokens: BooleanTokens) -> Self {
        Self { tokens }
    }

    pub fn tokens(&self) -> &BooleanTokens {
        &self.tokens
    }

    /// Validates every row of `table` against `model`. The returned table has
    /// every model column (absent ones filled with empty strings); errors are
    /// collected rather than raised.
    pub fn validate(
        &self,
        table: &Table,
        model: &SchemaModel,
    ) -> Result<(Table, Vec<FieldError>), CatalogError> {
        let patterns = compile_patterns(model)?;
        let extra = if model.forbids_extra() {
            table
                .columns()
                .iter()
                .filter(|column| model.get(column).is_none())
                .cloned()
                .collect::<Vec<_>>()
        } else {
            Vec::new()
        };
        let mut augmented = table.clone();
        for name in model.field_names() {
            augmented.ensure_column(name, "");
        }

        let mut errors = Vec::new();
        for (index, row) in augmented.iter_rows().enumerate() {
            let row_number = index + FIRST_DATA_ROW;
            match self.cast_row(model, row) {
                Ok(typed) => {
                    for (field, message) in check_row(model, &patterns, &typed) {
                        errors.push(FieldError {
                            row: row_number,
                            field,
                            message,
                        });
                    }
                }
                Err(failure) => errors.push(FieldError {
                    row: row_number,
                    field: failure.field,
                    message: failure.message,
                }),
            }
            errors.extend(extra.iter().map(|column| FieldError {
                row: row_number,
                field: column.clone(),
                message: EXTRA_FORBIDDEN.to_string(),
            }));
        }
        debug!(
            model = model.name(),
            rows = augmented.len(),
            errors = errors.len(),
            "validated table"
        );
        Ok((augmented, errors))
    }

    /// Typed values per row; `None` where a cell failed to cast.
    pub fn typed_rows(&self, table: &Table, model: &SchemaModel) -> Vec<Option<TypedRow>> {
        table
            .iter_rows()
            .map(|row| self.cast_row(model, row).ok())
            .collect()
    }

    /// Casts each model field of `row`. Empty cells become null whatever the
    /// declared type; the first failing cell stops the row.
    fn cast_row(&self, model: &SchemaModel, row: RowRef<'_>) -> Result<TypedRow, CastFailure> {
        let mut typed = TypedRow::new();
        for field in model.fields() {
            let value = match row.get(&field.name).filter(|raw| !raw.is_empty()) {
                None => None,
                Some(raw) => Some(self.cast_value(field, raw)?),
            };
            typed.insert(field.name.clone(), value);
        }
        Ok(typed)
    }

    fn cast_value(&self, field: &FieldDef, raw: &str) -> Result<Value, CastFailure> {
        let failure = |kind: &str| CastFailure {
            field: field.name.clone(),
            message: format!("unable to parse as {kind}"),
        };
        match &field.range {
            FieldRange::String | FieldRange::Enum(_) => Ok(Value::String(raw.to_string())),
            FieldRange::Integer => raw
                .trim()
                .parse::<i64>()
                .map(Value::Integer)
                .map_err(|_| failure("integer")),
            FieldRange::Float => raw
                .trim()
                .parse::<f64>()
                .map(Value::Float)
                .map_err(|_| failure("float")),
            FieldRange::Boolean => self
                .tokens
                .parse(raw)
                .map(Value::Boolean)
                .ok_or_else(|| failure("boolean")),
        }
    }

    /// Wraps validation as a contextual formatter. `pre` runs on the table
    /// before it is validated.
    pub fn formatter(&self, model: SchemaModel, pre: Option<InputFormatter>) -> ContextualFormatter {
        let validator = self.clone();
        Arc::new(
            move |table: Table,
                  _metadata: Option<Metadata>,
                  context: &LoadContext|
                  -> Result<(Table, Option<Metadata>), CatalogError> {
                let table = match &pre {
                    Some(pre) => pre(table)?,
                    None => table,
                };
                let (table, errors) = validator.validate(&table, &model)?;
                let file_errors = FileErrors::new(context.display_name(), errors);
                Ok((table, Some(Metadata::Errors(file_errors))))
            },
        )
    }
}

fn compile_patterns(model: &SchemaModel) -> Result<IndexMap<String, Regex>, CatalogError> {
    let mut patterns = IndexMap::new();
    for field in model.fields() {
        if let Some(pattern) = &field.pattern {
            let regex = Regex::new(pattern).map_err(|err| CatalogError::Schema {
                model: model.name().to_string(),
                message: format!("field {}: {err}", field.name),
            })?;
            patterns.insert(field.name.clone(), regex);
        }
    }
    Ok(patterns)
}

fn check_row(
    model: &SchemaModel,
    patterns: &IndexMap<String, Regex>,
    row: &TypedRow,
) -> Vec<(String, String)> {
    let mut violations = Vec::new();
    for field in model.fields() {
        let Some(value) = row.get(&field.name).and_then(Option::as_ref) else {
            if field.required {
                violations.push((field.name.clone(), "Field required".to_string()));
            }
            continue;
        };

        if let (FieldRange::Enum(allowed), Value::String(text)) = (&field.range, value) {
            if !allowed.iter().any(|candidate| candidate == text) {
                violations.push((field.name.clone(), enum_message(allowed)));
                continue;
            }
        }

        if let Some(number) = value.as_number() {
            if let Some(minimum) = field.minimum.filter(|minimum| number < *minimum) {
                violations.push((
                    field.name.clone(),
                    format!(
                        "Input should be greater than or equal to {}",
                        format_bound(minimum)
                    ),
                ));
            }
            if let Some(maximum) = field.maximum.filter(|maximum| number > *maximum) {
                violations.push((
                    field.name.clone(),
                    format!(
                        "Input should be less than or equal to {}",
                        format_bound(maximum)
                    ),
                ));
            }
        }

        if let (Some(regex), Value::String(text)) = (patterns.get(&field.name), value) {
            if !regex.is_match(text) {
                violations.push((
                    field.name.clone(),
                    format!("String should match pattern '{}'", regex.as_str()),
                ));
            }
        }
    }
    violations
}

fn enum_message(allowed: &[String]) -> String {
    let quoted = allowed
        .iter()
        .map(|value| format!("'{value}'"))
        .collect::<Vec<_>>();
    match quoted.split_last() {
        None => "Input should be empty".to_string(),
        Some((last, [])) => format!("Input should be {last}"),
        Some((last, rest)) => format!("Input should be {} or {last}", rest.join(", ")),
    }
}

fn format_bound(bound: f64) -> String {
    if bound.fract() == 0.0 {
        format!("{}", bound as i64)
    } else {
        bound.to_string()
    }
}
