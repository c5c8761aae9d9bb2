use std::collections::HashMap;
use std::sync::Mutex;

use assert_matches::assert_matches;

use pangenome_catalog::error::CatalogError;
use pangenome_catalog::fetch::SourceFetcher;
use pangenome_catalog::loader::Loader;
use pangenome_catalog::spec::{SourceLocation, SourceSpec};
use pangenome_catalog::table::ReadOptions;

#[derive(Default)]
struct MockFetcher {
    files: HashMap<String, String>,
    calls: Mutex<Vec<String>>,
}

impl MockFetcher {
    fn with(mut self, url: &str, body: &str) -> Self {
        self.files.insert(url.to_string(), body.to_string());
        self
    }
}

impl SourceFetcher for MockFetcher {
    fn fetch(&self, location: &SourceLocation) -> Result<String, CatalogError> {
        self.calls.lock().unwrap().push(location.url.clone());
        self.files
            .get(&location.url)
            .cloned()
            .ok_or_else(|| CatalogError::FetchStatus {
                url: location.url.clone(),
                status: 404,
                body: "404: Not Found".to_string(),
            })
    }
}

fn fetcher() -> MockFetcher {
    MockFetcher::default()
        .with(
            "https://example.org/samples.csv",
            "sample,haplotype,aws_fasta,gcp_fasta\nHG002,maternal,s3://a,gs://a\nHG003,paternal,s3://b,gs://b\n",
        )
        .with(
            "https://example.org/more.tsv",
            "sample\thaplotype\taws_fasta\nHG004\tmaternal\ts3://c\n",
        )
}

#[test]
fn projection_keeps_exactly_the_target_columns() {
    let fetcher = fetcher();
    let spec = SourceSpec::url("https://example.org/samples.csv")
        .separator(b',')
        .columns(&[("sample", "sample_id"), ("aws_fasta", "assembly")]);

    let loaded = Loader::new(&fetcher).load(&spec).unwrap();
    assert_eq!(loaded.table.columns(), ["sample_id", "assembly"]);
    assert_eq!(loaded.table.len(), 2);
}

#[test]
fn projection_of_unknown_column_fails() {
    let fetcher = fetcher();
    let spec = SourceSpec::url("https://example.org/samples.csv")
        .separator(b',')
        .columns(&[("sample_name", "sample_id")]);

    assert_matches!(
        Loader::new(&fetcher).load(&spec),
        Err(CatalogError::MissingColumn { column, .. }) if column == "sample_name"
    );
}

#[test]
fn nested_sources_concatenate_in_order() {
    let fetcher = fetcher();
    let spec = SourceSpec::sources(vec![
        SourceSpec::url("https://example.org/samples.csv"),
        SourceSpec::url("https://example.org/more.tsv").separator(b'\t'),
    ])
    .separator(b',')
    .read_options(ReadOptions::strings())
    .map_column("haplotype", |value| match value {
        "maternal" => "2".to_string(),
        "paternal" => "1".to_string(),
        other => other.to_string(),
    });

    let loaded = Loader::new(&fetcher).load(&spec).unwrap();
    assert_eq!(
        loaded.table.column("haplotype").unwrap(),
        vec![Some("2"), Some("1"), Some("2")]
    );
    assert_eq!(
        loaded.table.column("gcp_fasta").unwrap(),
        vec![Some("gs://a"), Some("gs://b"), None]
    );
    assert_eq!(
        loaded.context.source_file_names,
        vec!["samples.csv", "more.tsv"]
    );
}

#[test]
fn loading_twice_is_byte_identical() {
    let fetcher = fetcher();
    let spec = SourceSpec::sources(vec![
        SourceSpec::url("https://example.org/samples.csv"),
        SourceSpec::url("https://example.org/more.tsv").separator(b'\t'),
    ])
    .separator(b',')
    .na("N/A");
    let loader = Loader::new(&fetcher);

    let first = loader.load(&spec).unwrap().table.to_csv_string().unwrap();
    let second = loader.load(&spec).unwrap().table.to_csv_string().unwrap();
    assert_eq!(first, second);
    assert_eq!(fetcher.calls.lock().unwrap().len(), 4);
}

#[test]
fn fetch_failure_is_fatal() {
    let fetcher = fetcher();
    let spec = SourceSpec::sources(vec![
        SourceSpec::url("https://example.org/samples.csv"),
        SourceSpec::url("https://example.org/missing.csv"),
    ])
    .separator(b',');

    let err = Loader::new(&fetcher).load(&spec).unwrap_err();
    assert_matches!(&err, CatalogError::FetchStatus { status: 404, .. });
    assert_eq!(
        err.to_string(),
        "https://example.org/missing.csv caused error 404. See details below:\n 404: Not Found"
    );
}

#[test]
fn json_specs_load_like_built_ones() {
    let fetcher = fetcher();
    let spec = SourceSpec::from_json(serde_json::json!({
        "separator": ",",
        "source": { "url": "https://example.org/samples.csv" },
        "columns": { "sample": "sample_id" }
    }))
    .unwrap();

    let loaded = Loader::new(&fetcher).load(&spec).unwrap();
    assert_eq!(loaded.table.columns(), ["sample_id"]);
}

#[test]
fn json_composites_nest() {
    let fetcher = fetcher();
    let spec = SourceSpec::from_json(serde_json::json!({
        "separator": ",",
        "columns": { "sample": "sample_id", "aws_fasta": "assembly" },
        "source": {
            "source": [
                { "url": "https://example.org/samples.csv" },
                { "url": "https://example.org/more.tsv", "separator": "\t" }
            ]
        }
    }))
    .unwrap();

    let loaded = Loader::new(&fetcher).load(&spec).unwrap();
    assert_eq!(loaded.table.columns(), ["sample_id", "assembly"]);
    assert_eq!(
        loaded.table.column("sample_id").unwrap(),
        vec![Some("HG002"), Some("HG003"), Some("HG004")]
    );
    assert_eq!(
        loaded.context.source_file_names,
        vec!["samples.csv", "more.tsv"]
    );
}

#[test]
fn rows_wider_than_the_header_fail_the_load() {
    let fetcher = MockFetcher::default().with(
        "https://example.org/ragged.csv",
        "sample,haplotype\nHG002,maternal\nHG003,paternal,s3://stray\n",
    );
    let spec = SourceSpec::url("https://example.org/ragged.csv").separator(b',');

    assert_matches!(
        Loader::new(&fetcher).load(&spec),
        Err(CatalogError::Parse { source_name, message })
            if source_name == "ragged.csv" && message.starts_with("row 3 ")
    );
}
