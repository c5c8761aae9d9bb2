use indexmap::IndexMap;
use tracing::info;

use crate::error::CatalogError;
use crate::fetch::SourceFetcher;
use crate::loader::{Inherited, Loader};
use crate::spec::{Metadata, SourceSpec};
use crate::table::{NOT_AVAILABLE, Table};

pub const RELEASE_COLUMN: &str = "release";

#[derive(Debug, Clone)]
pub struct ReleaseDescriptor {
    pub release: String,
    pub tables: IndexMap<String, SourceSpec>,
}

impl ReleaseDescriptor {
    pub fn new(release: &str) -> Self {
        Self {
            release: release.to_string(),
            tables: IndexMap::new(),
        }
    }

    pub fn table(mut self, kind: &str, spec: SourceSpec) -> Self {
        self.tables.insert(kind.to_string(), spec);
        self
    }
}

pub type ReleaseMetadata = IndexMap<String, IndexMap<String, Option<Metadata>>>;

#[derive(Debug, Clone, Default)]
pub struct Accumulated {
    pub tables: IndexMap<String, Table>,
    /// `metadata[kind][release]`; `None` when no load reported anything.
    pub metadata: Option<ReleaseMetadata>,
}

impl Accumulated {
    pub fn file_errors(&self) -> Vec<&crate::validate::FileErrors> {
        self.metadata
            .iter()
            .flat_map(|by_kind| by_kind.values())
            .flat_map(|by_release| by_release.values())
            .flatten()
            .flat_map(Metadata::file_errors)
            .collect()
    }

    pub fn take(&mut self, kind: &str) -> Option<Table> {
        self.tables.shift_remove(kind)
    }
}

/// Folds releases in order into one table per kind. A later release's spec
/// shapes the cumulative table, so its projection and mapper also apply to
/// rows from earlier releases.
pub fn load_data_for_releases<F: SourceFetcher>(
    loader: &Loader<'_, F>,
    releases: &[ReleaseDescriptor],
) -> Result<Accumulated, CatalogError> {
    if releases.is_empty() {
        return Err(CatalogError::Configuration("no files specified".to_string()));
    }

    let retain = [RELEASE_COLUMN.to_string()];
    let mut tables: IndexMap<String, Table> = IndexMap::new();
    let mut metadata: ReleaseMetadata = IndexMap::new();

    for descriptor in releases {
        for (kind, spec) in &descriptor.tables {
            let prior = tables.shift_remove(kind);
            let release = descriptor.release.as_str();
            let accumulate = move |table: Table| -> Result<Table, CatalogError> {
                let tagged = table.with_constant(RELEASE_COLUMN, release)?;
                Ok(match prior.clone() {
                    Some(prior) => {
                        let mut combined = prior.append(tagged);
                        combined.fill_missing(NOT_AVAILABLE);
                        combined
                    }
                    None => tagged,
                })
            };
            let loaded = loader.load_with(spec, &Inherited::default(), Some(&accumulate), &retain)?;
            info!(
                kind = kind.as_str(),
                release,
                rows = loaded.table.len(),
                "accumulated release"
            );
            tables.insert(kind.clone(), loaded.table);
            metadata
                .entry(kind.clone())
                .or_default()
                .insert(descriptor.release.clone(), loaded.metadata);
        }
    }

    let any_metadata = metadata
        .values()
        .flat_map(|by_release| by_release.values())
        .any(Option::is_some);
    Ok(Accumulated {
        tables,
        metadata: any_metadata.then_some(metadata),
    })
}
