use std::time::Duration;

use camino::Utf8PathBuf;
use reqwest::blocking::{Client, Response};
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use tracing::info;

use crate::error::CatalogError;
use crate::fs_util::write_atomic;
use crate::spec::SourceLocation;

pub trait SourceFetcher: Send + Sync {
    /// Returns the body of `location` as text.
    fn fetch(&self, location: &SourceLocation) -> Result<String, CatalogError>;
}

pub fn user_agent() -> String {
    format!("catalog-build/{}", env!("CARGO_PKG_VERSION"))
}

pub(crate) fn default_headers() -> Result<HeaderMap, CatalogError> {
    let mut headers = HeaderMap::new();
    headers.insert(
        USER_AGENT,
        HeaderValue::from_str(&user_agent())
            .map_err(|err| CatalogError::Configuration(err.to_string()))?,
    );
    Ok(headers)
}

#[derive(Clone)]
pub struct HttpFetcher {
    client: Client,
    downloads_dir: Option<Utf8PathBuf>,
}

impl HttpFetcher {
    pub fn new(downloads_dir: Option<Utf8PathBuf>) -> Result<Self, CatalogError> {
        let client = Client::builder()
            .default_headers(default_headers()?)
            .timeout(Duration::from_secs(120))
            .build()
            .map_err(|err| CatalogError::FetchHttp {
                url: String::new(),
                message: err.to_string(),
            })?;
        Ok(Self {
            client,
            downloads_dir,
        })
    }

    fn handle_status(url: &str, response: Response) -> Result<String, CatalogError> {
        let status = response.status();
        let body = response.text().map_err(|err| CatalogError::FetchHttp {
            url: url.to_string(),
            message: err.to_string(),
        })?;
        if !status.is_success() {
            return Err(CatalogError::FetchStatus {
                url: url.to_string(),
                status: status.as_u16(),
                body,
            });
        }
        Ok(body)
    }
}

impl SourceFetcher for HttpFetcher {
    fn fetch(&self, location: &SourceLocation) -> Result<String, CatalogError> {
        let response = self
            .client
            .get(&location.url)
            .send()
            .map_err(|err| CatalogError::FetchHttp {
                url: location.url.clone(),
                message: err.to_string(),
            })?;
        let body = Self::handle_status(&location.url, response)?;

        match &self.downloads_dir {
            Some(dir) => {
                let path = dir.join(location.file_name());
                info!(url = %location.url, path = %path, "Downloading");
                write_atomic(&path, body.as_bytes())?;
            }
            None => info!(url = %location.url, "Downloading"),
        }
        Ok(body)
    }
}
