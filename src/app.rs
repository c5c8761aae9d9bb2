use std::time::{Duration, Instant};

use camino::Utf8PathBuf;
use indexmap::IndexMap;
use serde::Serialize;
use tracing::{info, warn};

use crate::catalog::{self, Entity, FILE_SIZE, SAMPLE_ID, alignments};
use crate::config::ResolvedConfig;
use crate::enrich::{SizeProbe, file_sizes};
use crate::error::CatalogError;
use crate::fetch::SourceFetcher;
use crate::fs_util::write_atomic;
use crate::join::{left_join_many_to_one, unmatched_keys};
use crate::loader::Loader;
use crate::release::{RELEASE_COLUMN, load_data_for_releases};
use crate::report::{files_with_errors, format_errors};
use crate::table::{NOT_AVAILABLE, Table};
use crate::validate::{FileErrors, ValidationPolicy, Validator};

#[derive(Debug, Clone, Serialize)]
pub struct ValidationSummary {
    pub files_with_errors: usize,
    pub errors: usize,
    pub report: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct BuildResult {
    pub entity: String,
    pub output_path: String,
    pub rows: usize,
    pub columns: usize,
    pub rows_by_release: IndexMap<String, usize>,
    pub validation: ValidationSummary,
    pub unmatched_samples: Vec<String>,
    pub probed_files: usize,
    pub built_at: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct BuildReport {
    pub builds: Vec<BuildResult>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AlignmentsValidation {
    pub file: String,
    pub validation: ValidationSummary,
}

#[derive(Debug, Clone)]
pub struct ProgressEvent {
    pub message: String,
    pub elapsed: Option<Duration>,
}

pub trait ProgressSink {
    fn event(&self, event: ProgressEvent);
}

pub struct App<F: SourceFetcher, P: SizeProbe> {
    fetcher: F,
    probe: P,
    config: ResolvedConfig,
}

impl<F: SourceFetcher, P: SizeProbe> App<F, P> {
    pub fn new(fetcher: F, probe: P, config: ResolvedConfig) -> Self {
        Self {
            fetcher,
            probe,
            config,
        }
    }

    pub fn config(&self) -> &ResolvedConfig {
        &self.config
    }

    fn validator(&self) -> Validator {
        Validator::new(self.config.boolean_tokens.clone())
    }

    /// Loads every release of `entity`, joins biosamples, probes file sizes
    /// and writes the output table. Nothing is written when any step fails.
    pub fn build(&self, entity: Entity, sink: &dyn ProgressSink) -> Result<BuildResult, CatalogError> {
        let started = Instant::now();
        let plan = entity.plan(&self.validator());
        let loader = Loader::new(&self.fetcher);

        sink.event(ProgressEvent {
            message: format!("phase=Load; {} releases", plan.releases.len()),
            elapsed: None,
        });
        let mut accumulated = load_data_for_releases(&loader, &plan.releases)?;
        let validation = self.check_validation(&accumulated.file_errors(), sink)?;

        let mut table = accumulated.take(plan.table_kind).ok_or_else(|| {
            CatalogError::Configuration(format!("no `{}` table was loaded", plan.table_kind))
        })?;
        if let Some(finish) = plan.finish {
            table = finish(table)?;
        }

        sink.event(ProgressEvent {
            message: "phase=Join; loading biosamples".to_string(),
            elapsed: Some(started.elapsed()),
        });
        let mut biosamples = loader.load(&catalog::biosample_spec())?.table;
        biosamples.drop_columns(plan.drop_biosample_columns);
        let mut joined = left_join_many_to_one(&table, &biosamples, SAMPLE_ID)?;
        let unmatched = unmatched_keys(&table, &biosamples, SAMPLE_ID)?;
        if !unmatched.is_empty() {
            warn!(count = unmatched.len(), "sample IDs missing from the biosample table");
        }
        sink.event(ProgressEvent {
            message: format!(
                "The following sample IDs did not correspond to a value in the Biosample sheet, so NA values were entered:\n{}",
                unmatched.join(", ")
            ),
            elapsed: None,
        });

        let probed_files = self.attach_file_sizes(&mut joined, plan.size_column, plan.label, sink)?;

        let output_path = self.config.output_dir.join(plan.output_file);
        write_atomic(&output_path, joined.to_csv_string()?.as_bytes())?;
        info!(path = %output_path, rows = joined.len(), "wrote catalog table");
        sink.event(ProgressEvent {
            message: format!("{} processing complete!", capitalize(plan.label)),
            elapsed: Some(started.elapsed()),
        });

        Ok(BuildResult {
            entity: plan.label.to_string(),
            output_path: output_path.to_string(),
            rows: joined.len(),
            columns: joined.columns().len(),
            rows_by_release: rows_by_release(&joined),
            validation,
            unmatched_samples: unmatched,
            probed_files,
            built_at: iso_timestamp(),
        })
    }

    /// Derives the naming columns of the alignments source and writes it out.
    pub fn build_alignments(&self, sink: &dyn ProgressSink) -> Result<BuildResult, CatalogError> {
        let started = Instant::now();
        let (table, errors) = alignments::build(&self.config.alignments_source, &self.validator())?;
        let validation = self.check_validation(&[&errors], sink)?;

        let output_path = self.config.output_dir.join(alignments::OUTPUT_FILE);
        write_atomic(&output_path, table.to_csv_string()?.as_bytes())?;
        sink.event(ProgressEvent {
            message: "Alignments processing complete!".to_string(),
            elapsed: Some(started.elapsed()),
        });

        Ok(BuildResult {
            entity: "alignment".to_string(),
            output_path: output_path.to_string(),
            rows: table.len(),
            columns: table.columns().len(),
            rows_by_release: IndexMap::new(),
            validation,
            unmatched_samples: Vec::new(),
            probed_files: 0,
            built_at: iso_timestamp(),
        })
    }

    /// Validates an already written alignments table.
    pub fn validate_alignments(
        &self,
        path: Option<Utf8PathBuf>,
        sink: &dyn ProgressSink,
    ) -> Result<AlignmentsValidation, CatalogError> {
        let path = path.unwrap_or_else(|| self.config.output_dir.join(alignments::OUTPUT_FILE));
        let errors = alignments::validate_file(&path, &self.validator())?;
        let validation = self.check_validation(&[&errors], sink)?;
        Ok(AlignmentsValidation {
            file: path.to_string(),
            validation,
        })
    }

    pub fn build_all(&self, sink: &dyn ProgressSink) -> Result<BuildReport, CatalogError> {
        let mut builds = Vec::with_capacity(Entity::ALL.len() + 1);
        for entity in Entity::ALL {
            builds.push(self.build(entity, sink)?);
        }
        builds.push(self.build_alignments(sink)?);
        Ok(BuildReport { builds })
    }

    fn check_validation(
        &self,
        files: &[&FileErrors],
        sink: &dyn ProgressSink,
    ) -> Result<ValidationSummary, CatalogError> {
        let failing = files_with_errors(files);
        let errors = failing.iter().map(|file| file.errors.len()).sum();
        if failing.is_empty() {
            return Ok(ValidationSummary {
                files_with_errors: 0,
                errors,
                report: None,
            });
        }

        let report = format_errors(&failing);
        sink.event(ProgressEvent {
            message: format!("\nValidation errors:\n\n{report}"),
            elapsed: None,
        });
        sink.event(ProgressEvent {
            message: format!("\nFound errors in {} source files\n", failing.len()),
            elapsed: None,
        });

        if self.config.validation_policy == ValidationPolicy::Fail {
            return Err(CatalogError::ValidationFailed {
                files: failing.len(),
            });
        }
        Ok(ValidationSummary {
            files_with_errors: failing.len(),
            errors,
            report: Some(report),
        })
    }

    fn attach_file_sizes(
        &self,
        table: &mut Table,
        column: &str,
        label: &str,
        sink: &dyn ProgressSink,
    ) -> Result<usize, CatalogError> {
        table.require_column(column)?;
        let uris = table.column(column).unwrap_or_default();
        let (sizes, probed) = if self.config.skip_file_sizes {
            (vec![NOT_AVAILABLE.to_string(); uris.len()], 0)
        } else {
            let probed = uris.len();
            (file_sizes(&self.probe, &uris, label, sink), probed)
        };
        table.set_column(FILE_SIZE, sizes.into_iter().map(Some).collect())?;
        Ok(probed)
    }
}

fn rows_by_release(table: &Table) -> IndexMap<String, usize> {
    let mut counts = IndexMap::new();
    for release in table.column(RELEASE_COLUMN).unwrap_or_default() {
        *counts
            .entry(release.unwrap_or(NOT_AVAILABLE).to_string())
            .or_insert(0) += 1;
    }
    counts
}

fn capitalize(label: &str) -> String {
    let mut chars = label.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

fn iso_timestamp() -> String {
    chrono::Utc::now().to_rfc3339()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn labels_are_capitalized() {
        assert_eq!(capitalize("sequencing data"), "Sequencing data");
        assert_eq!(capitalize(""), "");
    }

    #[test]
    fn counts_rows_per_release() {
        let table = Table::from_records(&["release"], &[&["1"], &["2"], &["2"]]);
        let counts = rows_by_release(&table);
        assert_eq!(counts["1"], 1);
        assert_eq!(counts["2"], 2);
    }
}
