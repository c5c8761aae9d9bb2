use std::time::Duration;

use reqwest::StatusCode;
use reqwest::blocking::Client;
use reqwest::header::CONTENT_LENGTH;
use reqwest::redirect::Policy;
use tracing::{info, warn};

use crate::app::{ProgressEvent, ProgressSink};
use crate::error::CatalogError;
use crate::fetch::default_headers;
use crate::table::NOT_AVAILABLE;

pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeOutcome {
    Size(u64),
    NoContentLength,
    Status(u16),
    Failed(String),
}

impl ProbeOutcome {
    pub fn render(&self) -> String {
        match self {
            ProbeOutcome::Size(size) => size.to_string(),
            _ => NOT_AVAILABLE.to_string(),
        }
    }
}

pub trait SizeProbe: Send + Sync {
    /// Issues a HEAD request for `url` (already HTTP(S)).
    fn probe(&self, url: &str) -> ProbeOutcome;
}

#[derive(Clone)]
pub struct HttpSizeProbe {
    client: Client,
}

impl HttpSizeProbe {
    /// Redirects are not followed: a 3xx answer renders as `N/A`.
    pub fn new(timeout: Duration) -> Result<Self, CatalogError> {
        let client = Client::builder()
            .default_headers(default_headers()?)
            .redirect(Policy::none())
            .timeout(timeout)
            .build()
            .map_err(|err| CatalogError::FetchHttp {
                url: String::new(),
                message: err.to_string(),
            })?;
        Ok(Self { client })
    }
}

impl SizeProbe for HttpSizeProbe {
    fn probe(&self, url: &str) -> ProbeOutcome {
        let response = match self.client.head(url).send() {
            Ok(response) => response,
            Err(err) => return ProbeOutcome::Failed(err.to_string()),
        };
        if response.status() != StatusCode::OK {
            return ProbeOutcome::Status(response.status().as_u16());
        }
        response
            .headers()
            .get(CONTENT_LENGTH)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.trim().parse::<u64>().ok())
            .map(ProbeOutcome::Size)
            .unwrap_or(ProbeOutcome::NoContentLength)
    }
}

/// Rewrites `s3://bucket/key` into its public HTTPS form.
pub fn to_https_url(uri: &str) -> String {
    match uri.strip_prefix("s3://") {
        Some(rest) => {
            let (bucket, key) = rest.split_once('/').unwrap_or((rest, ""));
            format!("https://{bucket}.s3.amazonaws.com/{key}")
        }
        None => uri.to_string(),
    }
}

/// Probes each URI in order. Never fails: any problem yields `N/A`.
pub fn file_sizes<P: SizeProbe + ?Sized>(
    probe: &P,
    uris: &[Option<&str>],
    entity: &str,
    sink: &dyn ProgressSink,
) -> Vec<String> {
    let total = uris.len();
    uris.iter()
        .enumerate()
        .map(|(index, uri)| {
            let size = match uri.filter(|uri| !uri.is_empty() && *uri != NOT_AVAILABLE) {
                Some(uri) => {
                    let url = to_https_url(uri);
                    let outcome = probe.probe(&url);
                    match &outcome {
                        ProbeOutcome::Size(size) => info!(url = %url, size, "probed file size"),
                        ProbeOutcome::NoContentLength => {
                            warn!(url = %url, "no `Content-Length` header received")
                        }
                        ProbeOutcome::Status(status) => {
                            warn!(url = %url, status, "unexpected response to size probe")
                        }
                        ProbeOutcome::Failed(message) => {
                            warn!(url = %url, error = %message, "size probe failed")
                        }
                    }
                    outcome.render()
                }
                None => NOT_AVAILABLE.to_string(),
            };
            sink.event(ProgressEvent {
                message: format!(
                    "Remaining {entity} files to process: {}",
                    total - index - 1
                ),
                elapsed: None,
            });
            size
        })
        .collect()
}
