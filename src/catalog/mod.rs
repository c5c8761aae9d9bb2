pub mod alignments;
pub mod annotations;
pub mod assemblies;
pub mod sequencing_data;

use clap::ValueEnum;
use serde::Serialize;

use crate::error::CatalogError;
use crate::release::ReleaseDescriptor;
use crate::spec::SourceSpec;
use crate::table::Table;
use crate::validate::Validator;

pub const BIOSAMPLE_TABLE_URL: &str = "https://raw.githubusercontent.com/human-pangenomics/hprc_intermediate_assembly/refs/heads/main/data_tables/sample/hprc_release2_sample_metadata.csv";

pub const SAMPLE_ID: &str = "sample_id";
pub const FILE_SIZE: &str = "file_size";

/// Entities built from release descriptors and joined with biosamples.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum Entity {
    Assemblies,
    Annotations,
    SequencingData,
}

impl Entity {
    pub const ALL: [Entity; 3] = [
        Entity::Assemblies,
        Entity::Annotations,
        Entity::SequencingData,
    ];

    pub fn plan(self, validator: &Validator) -> EntityPlan {
        match self {
            Entity::Assemblies => assemblies::plan(validator),
            Entity::Annotations => annotations::plan(validator),
            Entity::SequencingData => sequencing_data::plan(validator),
        }
    }
}

pub type Finisher = fn(Table) -> Result<Table, CatalogError>;

/// Everything needed to build one output table.
pub struct EntityPlan {
    pub entity: Entity,
    /// Key of the accumulated table in each release descriptor.
    pub table_kind: &'static str,
    pub releases: Vec<ReleaseDescriptor>,
    /// Column holding the URI whose size is probed.
    pub size_column: &'static str,
    /// Noun used in progress messages.
    pub label: &'static str,
    pub output_file: &'static str,
    pub drop_biosample_columns: &'static [&'static str],
    pub finish: Option<Finisher>,
}

pub fn biosample_spec() -> SourceSpec {
    SourceSpec::url(BIOSAMPLE_TABLE_URL).separator(b',')
}
