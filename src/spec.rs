use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use serde::Deserialize;

use crate::error::CatalogError;
use crate::table::{ReadOptions, Table};
use crate::validate::FileErrors;

pub type InputFormatter = Arc<dyn Fn(Table) -> Result<Table, CatalogError> + Send + Sync>;

pub type ContextualFormatter = Arc<
    dyn Fn(Table, Option<Metadata>, &LoadContext) -> Result<(Table, Option<Metadata>), CatalogError>
        + Send
        + Sync,
>;

pub type ValueMapper = Arc<dyn Fn(&str) -> String + Send + Sync>;

pub type SourceTransformer =
    Arc<dyn Fn(Table, &LoadContext) -> Result<Vec<Branch>, CatalogError> + Send + Sync>;

/// Whatever a source node reports upward besides its table. Validation
/// results travel this way.
#[derive(Debug, Clone, PartialEq)]
pub enum Metadata {
    Tag(String),
    Errors(FileErrors),
    List(Vec<Option<Metadata>>),
}

impl Metadata {
    /// Collapses to `None` when no entry carries anything.
    pub fn aggregate(items: Vec<Option<Metadata>>) -> Option<Metadata> {
        if items.iter().all(Option::is_none) {
            None
        } else {
            Some(Metadata::List(items))
        }
    }

    pub fn file_errors(&self) -> Vec<&FileErrors> {
        let mut out = Vec::new();
        self.collect_file_errors(&mut out);
        out
    }

    pub fn tag(&self) -> Option<&str> {
        match self {
            Metadata::Tag(tag) => Some(tag),
            _ => None,
        }
    }

    fn collect_file_errors<'a>(&'a self, out: &mut Vec<&'a FileErrors>) {
        match self {
            Metadata::Tag(_) => {}
            Metadata::Errors(errors) => out.push(errors),
            Metadata::List(items) => {
                for item in items.iter().flatten() {
                    item.collect_file_errors(out);
                }
            }
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadContext {
    pub source_file_names: Vec<String>,
}

impl LoadContext {
    pub fn merge(contexts: impl IntoIterator<Item = LoadContext>) -> Self {
        Self {
            source_file_names: contexts
                .into_iter()
                .flat_map(|context| context.source_file_names)
                .collect(),
        }
    }

    pub fn display_name(&self) -> String {
        self.source_file_names.join(", ")
    }
}

/// One branch produced by a fan-out transformer.
#[derive(Debug, Clone)]
pub struct Branch {
    pub table: Table,
    pub tag: String,
    pub context: LoadContext,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceLocation {
    pub url: String,
    pub file_name: Option<String>,
}

impl SourceLocation {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            file_name: None,
        }
    }

    pub fn named(url: impl Into<String>, file_name: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            file_name: Some(file_name.into()),
        }
    }

    /// The explicit name, otherwise the last path segment of the URL.
    pub fn file_name(&self) -> String {
        if let Some(name) = &self.file_name {
            return name.clone();
        }
        let without_query = self
            .url
            .split(['?', '#'])
            .next()
            .unwrap_or(self.url.as_str());
        without_query
            .trim_end_matches('/')
            .rsplit('/')
            .next()
            .filter(|segment| !segment.is_empty())
            .unwrap_or(without_query)
            .to_string()
    }
}

impl From<&str> for SourceLocation {
    fn from(url: &str) -> Self {
        Self::new(url)
    }
}

impl From<String> for SourceLocation {
    fn from(url: String) -> Self {
        Self::new(url)
    }
}

/// Directives applied to a node's table once it is loaded.
#[derive(Clone, Default)]
pub struct Shaping {
    pub separator: Option<u8>,
    pub read_options: Option<ReadOptions>,
    pub na: Option<String>,
    pub input_formatter: Option<InputFormatter>,
    pub contextual_input_formatter: Option<ContextualFormatter>,
    pub column_mapper: IndexMap<String, ValueMapper>,
    pub columns: Option<IndexMap<String, String>>,
}

impl fmt::Debug for Shaping {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Shaping")
            .field("separator", &self.separator.map(char::from))
            .field("read_options", &self.read_options)
            .field("na", &self.na)
            .field("input_formatter", &self.input_formatter.is_some())
            .field(
                "contextual_input_formatter",
                &self.contextual_input_formatter.is_some(),
            )
            .field("column_mapper", &self.column_mapper.keys().collect::<Vec<_>>())
            .field("columns", &self.columns)
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct UrlLeaf {
    pub locations: Vec<SourceLocation>,
    pub shaping: Shaping,
}

#[derive(Debug, Clone)]
pub struct CompositeSource {
    pub children: Vec<SourceSpec>,
    pub shaping: Shaping,
}

#[derive(Clone)]
pub struct FanoutSource {
    pub inner: Box<SourceSpec>,
    pub transformer: SourceTransformer,
    pub branch: Shaping,
    pub shaping: Shaping,
}

impl fmt::Debug for FanoutSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FanoutSource")
            .field("inner", &self.inner)
            .field("branch", &self.branch)
            .field("shaping", &self.shaping)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone)]
pub enum SourceSpec {
    Url(UrlLeaf),
    Composite(CompositeSource),
    Fanout(FanoutSource),
}

impl SourceSpec {
    pub fn url(location: impl Into<SourceLocation>) -> Self {
        Self::urls(vec![location.into()])
    }

    pub fn urls(locations: Vec<SourceLocation>) -> Self {
        SourceSpec::Url(UrlLeaf {
            locations,
            shaping: Shaping::default(),
        })
    }

    pub fn source(child: SourceSpec) -> Self {
        Self::sources(vec![child])
    }

    pub fn sources(children: Vec<SourceSpec>) -> Self {
        SourceSpec::Composite(CompositeSource {
            children,
            shaping: Shaping::default(),
        })
    }

    pub fn fanout<F>(inner: SourceSpec, transformer: F, branch: Shaping) -> Self
    where
        F: Fn(Table, &LoadContext) -> Result<Vec<Branch>, CatalogError> + Send + Sync + 'static,
    {
        SourceSpec::Fanout(FanoutSource {
            inner: Box::new(inner),
            transformer: Arc::new(transformer),
            branch,
            shaping: Shaping::default(),
        })
    }

    pub fn shaping(&self) -> &Shaping {
        match self {
            SourceSpec::Url(leaf) => &leaf.shaping,
            SourceSpec::Composite(node) => &node.shaping,
            SourceSpec::Fanout(node) => &node.shaping,
        }
    }

    pub fn shaping_mut(&mut self) -> &mut Shaping {
        match self {
            SourceSpec::Url(leaf) => &mut leaf.shaping,
            SourceSpec::Composite(node) => &mut node.shaping,
            SourceSpec::Fanout(node) => &mut node.shaping,
        }
    }

    pub fn separator(mut self, separator: u8) -> Self {
        self.shaping_mut().separator = Some(separator);
        self
    }

    pub fn read_options(mut self, options: ReadOptions) -> Self {
        self.shaping_mut().read_options = Some(options);
        self
    }

    pub fn na(mut self, value: impl Into<String>) -> Self {
        self.shaping_mut().na = Some(value.into());
        self
    }

    pub fn input_formatter<F>(mut self, formatter: F) -> Self
    where
        F: Fn(Table) -> Result<Table, CatalogError> + Send + Sync + 'static,
    {
        self.shaping_mut().input_formatter = Some(Arc::new(formatter));
        self
    }

    pub fn contextual_input_formatter(mut self, formatter: ContextualFormatter) -> Self {
        self.shaping_mut().contextual_input_formatter = Some(formatter);
        self
    }

    pub fn map_column<F>(mut self, column: &str, mapper: F) -> Self
    where
        F: Fn(&str) -> String + Send + Sync + 'static,
    {
        self.shaping_mut()
            .column_mapper
            .insert(column.to_string(), Arc::new(mapper));
        self
    }

    pub fn columns(mut self, columns: &[(&str, &str)]) -> Self {
        self.shaping_mut().columns = Some(column_map(columns));
        self
    }
}

impl Shaping {
    pub fn map_column<F>(mut self, column: &str, mapper: F) -> Self
    where
        F: Fn(&str) -> String + Send + Sync + 'static,
    {
        self.column_mapper
            .insert(column.to_string(), Arc::new(mapper));
        self
    }

    pub fn columns(mut self, columns: &[(&str, &str)]) -> Self {
        self.columns = Some(column_map(columns));
        self
    }

    pub fn contextual_input_formatter(mut self, formatter: ContextualFormatter) -> Self {
        self.contextual_input_formatter = Some(formatter);
        self
    }
}

pub fn column_map(columns: &[(&str, &str)]) -> IndexMap<String, String> {
    columns
        .iter()
        .map(|(source, target)| (source.to_string(), target.to_string()))
        .collect()
}

/// JSON form of a source specification. `url` and `source` are mutually
/// exclusive; conversion into [`SourceSpec`] enforces it.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawSourceSpec {
    #[serde(default)]
    pub url: Option<OneOrMany<String>>,
    #[serde(default)]
    pub source: Option<OneOrMany<Box<RawSourceSpec>>>,
    #[serde(default)]
    pub separator: Option<String>,
    #[serde(default)]
    pub read_options: Option<ReadOptions>,
    #[serde(default)]
    pub na: Option<String>,
    #[serde(default)]
    pub columns: Option<IndexMap<String, String>>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum OneOrMany<T> {
    One(T),
    Many(Vec<T>),
}

impl<T> OneOrMany<T> {
    pub fn into_vec(self) -> Vec<T> {
        match self {
            OneOrMany::One(value) => vec![value],
            OneOrMany::Many(values) => values,
        }
    }
}

impl TryFrom<RawSourceSpec> for SourceSpec {
    type Error = CatalogError;

    fn try_from(raw: RawSourceSpec) -> Result<Self, Self::Error> {
        let mut spec = match (raw.url, raw.source) {
            (Some(urls), None) => SourceSpec::urls(
                urls.into_vec()
                    .into_iter()
                    .map(SourceLocation::new)
                    .collect(),
            ),
            (None, Some(children)) => SourceSpec::sources(
                children
                    .into_vec()
                    .into_iter()
                    .map(|child| SourceSpec::try_from(*child))
                    .collect::<Result<Vec<_>, _>>()?,
            ),
            (Some(_), Some(_)) => {
                return Err(CatalogError::Configuration(
                    "a source specification must have either `url` or `source`, not both"
                        .to_string(),
                ));
            }
            (None, None) => {
                return Err(CatalogError::Configuration(
                    "a source specification must have `url` or `source`".to_string(),
                ));
            }
        };

        let shaping = spec.shaping_mut();
        shaping.separator = raw.separator.as_deref().map(parse_separator).transpose()?;
        shaping.read_options = raw.read_options;
        shaping.na = raw.na;
        shaping.columns = raw.columns;
        Ok(spec)
    }
}

impl SourceSpec {
    pub fn from_json(value: serde_json::Value) -> Result<Self, CatalogError> {
        let raw: RawSourceSpec = serde_json::from_value(value)
            .map_err(|err| CatalogError::Configuration(err.to_string()))?;
        SourceSpec::try_from(raw)
    }
}

fn parse_separator(value: &str) -> Result<u8, CatalogError> {
    let normalized = match value {
        "\\t" | "tab" => "\t",
        other => other,
    };
    match normalized.as_bytes() {
        [byte] => Ok(*byte),
        _ => Err(CatalogError::Configuration(format!(
            "separator must be a single byte, got {value:?}"
        ))),
    }
}
