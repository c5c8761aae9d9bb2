use tracing::debug;

use crate::error::CatalogError;
use crate::fetch::SourceFetcher;
use crate::spec::{
    Branch, CompositeSource, FanoutSource, LoadContext, Metadata, Shaping, SourceSpec, UrlLeaf,
};
use crate::table::{ReadOptions, Table};

/// Settings a node passes down to its descendants.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Inherited {
    pub separator: Option<u8>,
    pub read_options: Option<ReadOptions>,
}

impl Inherited {
    fn under(&self, shaping: &Shaping) -> Self {
        Self {
            separator: shaping.separator.or(self.separator),
            read_options: shaping.read_options.or(self.read_options),
        }
    }
}

pub type PostLoad<'p> = &'p dyn Fn(Table) -> Result<Table, CatalogError>;

#[derive(Debug, Clone)]
pub struct Loaded {
    pub table: Table,
    pub metadata: Option<Metadata>,
    pub context: LoadContext,
}

pub struct Loader<'a, F: SourceFetcher> {
    fetcher: &'a F,
}

impl<'a, F: SourceFetcher> Loader<'a, F> {
    pub fn new(fetcher: &'a F) -> Self {
        Self { fetcher }
    }

    pub fn load(&self, spec: &SourceSpec) -> Result<Loaded, CatalogError> {
        self.load_with(spec, &Inherited::default(), None, &[])
    }

    /// Resolves `spec` into one table. `post_load` runs after the node's
    /// formatters and before its column mapper; `retain` names extra columns
    /// that survive the node's projection.
    pub fn load_with(
        &self,
        spec: &SourceSpec,
        inherited: &Inherited,
        post_load: Option<PostLoad<'_>>,
        retain: &[String],
    ) -> Result<Loaded, CatalogError> {
        let scope = inherited.under(spec.shaping());
        let loaded = match spec {
            SourceSpec::Url(leaf) => self.load_leaf(leaf, &scope)?,
            SourceSpec::Composite(node) => self.load_composite(node, &scope)?,
            SourceSpec::Fanout(node) => self.load_fanout(node, &scope)?,
        };
        apply_shaping(loaded, spec.shaping(), post_load, retain)
    }

    fn load_leaf(&self, leaf: &UrlLeaf, scope: &Inherited) -> Result<Loaded, CatalogError> {
        if leaf.locations.is_empty() {
            return Err(CatalogError::Configuration(
                "`url` must list at least one location".to_string(),
            ));
        }
        let separator = scope.separator.ok_or_else(|| {
            CatalogError::MissingSeparator(
                leaf.locations
                    .iter()
                    .map(|location| location.url.as_str())
                    .collect::<Vec<_>>()
                    .join(", "),
            )
        })?;
        let options = scope.read_options.unwrap_or_default();

        let mut tables = Vec::with_capacity(leaf.locations.len());
        let mut names = Vec::with_capacity(leaf.locations.len());
        for location in &leaf.locations {
            let name = location.file_name();
            let text = self.fetcher.fetch(location)?;
            let table = Table::read_delimited(&name, &text, separator, options)?;
            debug!(file = %name, rows = table.len(), "loaded source file");
            tables.push(table);
            names.push(name);
        }

        Ok(Loaded {
            table: Table::concat(tables),
            metadata: None,
            context: LoadContext {
                source_file_names: names,
            },
        })
    }

    fn load_composite(
        &self,
        node: &CompositeSource,
        scope: &Inherited,
    ) -> Result<Loaded, CatalogError> {
        if node.children.is_empty() {
            return Err(CatalogError::Configuration(
                "`source` must list at least one specification".to_string(),
            ));
        }
        let children = node
            .children
            .iter()
            .map(|child| self.load_with(child, scope, None, &[]))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(combine(children))
    }

    fn load_fanout(&self, node: &FanoutSource, scope: &Inherited) -> Result<Loaded, CatalogError> {
        let inner = self.load_with(&node.inner, scope, None, &[])?;
        let branches = (node.transformer)(inner.table, &inner.context)?;
        debug!(branches = branches.len(), "fanned out source");

        let shaped = branches
            .into_iter()
            .map(|Branch { table, tag, context }| {
                let loaded = Loaded {
                    table,
                    metadata: Some(Metadata::Tag(tag)),
                    context,
                };
                apply_shaping(loaded, &node.branch, None, &[])
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(combine(shaped))
    }
}

fn combine(parts: Vec<Loaded>) -> Loaded {
    let mut tables = Vec::with_capacity(parts.len());
    let mut metadata = Vec::with_capacity(parts.len());
    let mut contexts = Vec::with_capacity(parts.len());
    for part in parts {
        tables.push(part.table);
        metadata.push(part.metadata);
        contexts.push(part.context);
    }
    Loaded {
        table: Table::concat(tables),
        metadata: Metadata::aggregate(metadata),
        context: LoadContext::merge(contexts),
    }
}

fn apply_shaping(
    loaded: Loaded,
    shaping: &Shaping,
    post_load: Option<PostLoad<'_>>,
    retain: &[String],
) -> Result<Loaded, CatalogError> {
    let Loaded {
        mut table,
        mut metadata,
        context,
    } = loaded;

    if let Some(na) = &shaping.na {
        table.fill_missing(na);
    }
    if let Some(formatter) = &shaping.input_formatter {
        table = formatter(table)?;
    }
    if let Some(formatter) = &shaping.contextual_input_formatter {
        (table, metadata) = formatter(table, metadata, &context)?;
    }
    if let Some(post_load) = post_load {
        table = post_load(table)?;
    }
    for (column, mapper) in &shaping.column_mapper {
        table.map_column(column, |value| mapper(value));
    }
    if let Some(columns) = &shaping.columns {
        table = table.project(columns, retain)?;
    }

    Ok(Loaded {
        table,
        metadata,
        context,
    })
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use assert_matches::assert_matches;

    use super::*;
    use crate::spec::SourceLocation;

    struct MapFetcher(HashMap<String, String>);

    impl SourceFetcher for MapFetcher {
        fn fetch(&self, location: &SourceLocation) -> Result<String, CatalogError> {
            self.0
                .get(&location.url)
                .cloned()
                .ok_or_else(|| CatalogError::FetchStatus {
                    url: location.url.clone(),
                    status: 404,
                    body: "Not Found".to_string(),
                })
        }
    }

    fn fetcher() -> MapFetcher {
        MapFetcher(HashMap::from([
            ("https://h/a.csv".to_string(), "x,y\n1,2\n3,\n".to_string()),
            ("https://h/b.tsv".to_string(), "x\tz\n5\t6\n".to_string()),
        ]))
    }

    #[test]
    fn separator_is_inherited_and_overridable() {
        let fetcher = fetcher();
        let spec = SourceSpec::sources(vec![
            SourceSpec::url("https://h/a.csv"),
            SourceSpec::url("https://h/b.tsv").separator(b'\t'),
        ])
        .separator(b',');
        let loaded = Loader::new(&fetcher).load(&spec).unwrap();
        assert_eq!(loaded.table.columns(), ["x", "y", "z"]);
        assert_eq!(loaded.table.len(), 3);
        assert_eq!(loaded.context.source_file_names, vec!["a.csv", "b.tsv"]);
        assert_eq!(loaded.metadata, None);
    }

    #[test]
    fn missing_separator_is_reported() {
        let fetcher = fetcher();
        let err = Loader::new(&fetcher)
            .load(&SourceSpec::url("https://h/a.csv"))
            .unwrap_err();
        assert_matches!(err, CatalogError::MissingSeparator(url) if url == "https://h/a.csv");
    }

    #[test]
    fn empty_composite_is_a_configuration_error() {
        let fetcher = fetcher();
        let err = Loader::new(&fetcher)
            .load(&SourceSpec::sources(Vec::new()).separator(b','))
            .unwrap_err();
        assert_matches!(err, CatalogError::Configuration(_));
    }

    #[test]
    fn na_fill_precedes_mapper_and_projection() {
        let fetcher = fetcher();
        let spec = SourceSpec::url("https://h/a.csv")
            .separator(b',')
            .na("none")
            .map_column("y", |value| format!("<{value}>"))
            .columns(&[("y", "why")]);
        let loaded = Loader::new(&fetcher).load(&spec).unwrap();
        assert_eq!(loaded.table.columns(), ["why"]);
        let values = loaded.table.column("why").unwrap();
        assert_eq!(values, vec![Some("<2>"), Some("<none>")]);
    }

    #[test]
    fn fanout_branches_carry_tags() {
        let fetcher = fetcher();
        let spec = SourceSpec::fanout(
            SourceSpec::url("https://h/a.csv").separator(b','),
            |table, context| {
                Ok(["left", "right"]
                    .iter()
                    .map(|tag| Branch {
                        table: table.clone(),
                        tag: tag.to_string(),
                        context: context.clone(),
                    })
                    .collect())
            },
            Shaping::default(),
        );
        let loaded = Loader::new(&fetcher).load(&spec).unwrap();
        assert_eq!(loaded.table.len(), 4);
        assert_matches!(
            loaded.metadata,
            Some(Metadata::List(items)) if items.len() == 2
                && items[0].as_ref().and_then(Metadata::tag) == Some("left")
        );
    }
}
