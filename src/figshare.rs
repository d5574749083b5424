use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;
use std::thread;
use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use serde::Deserialize;

use crate::error::DataprovError;

/// Article holding the published dataset archive parts.
pub const DEFAULT_ARTICLE_ID: &str = "29177162";

/// Fixed-name file in the listing whose content defines assembly order.
pub const METADATA_FILE: &str = "data_metadata.json";

const LISTING_PAGE_SIZE: u32 = 100;
const BLOCK_SIZE: usize = 8192;

/// One file as reported by the article listing API. Fetched fresh each run,
/// never persisted.
#[derive(Debug, Clone, Deserialize)]
pub struct RemoteFile {
    pub name: String,
    pub size: u64,
    pub download_url: String,
    pub computed_md5: String,
}

/// Content of the metadata file: ordered part-file names.
#[derive(Debug, Clone, Deserialize)]
pub struct PartManifest {
    pub part_files: Vec<String>,
}

pub trait ArticleClient: Send + Sync {
    fn list_files(&self, article_id: &str) -> Result<Vec<RemoteFile>, DataprovError>;
    fn fetch_part_manifest(&self, url: &str) -> Result<PartManifest, DataprovError>;
    /// Streams `url` to `destination` in fixed-size chunks, invoking
    /// `progress` with the byte count of each chunk written.
    fn download_file(
        &self,
        url: &str,
        destination: &Path,
        progress: &mut dyn FnMut(u64),
    ) -> Result<(), DataprovError>;
}

#[derive(Clone)]
pub struct FigshareHttpClient {
    client: Client,
    base_url: String,
}

impl FigshareHttpClient {
    pub fn new() -> Result<Self, DataprovError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&format!("dataprov/{}", env!("CARGO_PKG_VERSION")))
                .map_err(|err| DataprovError::Http(err.to_string()))?,
        );

        // No overall request timeout: part files are large and transfer time
        // is unbounded. The connect phase still gets a cap.
        let client = Client::builder()
            .default_headers(headers)
            .connect_timeout(Duration::from_secs(30))
            .build()
            .map_err(|err| DataprovError::Http(err.to_string()))?;

        Ok(Self {
            client,
            base_url: "https://api.figshare.com/v2".to_string(),
        })
    }

    pub fn with_base_url(base_url: impl Into<String>) -> Result<Self, DataprovError> {
        let mut client = Self::new()?;
        client.base_url = base_url.into();
        Ok(client)
    }

    fn get_checked(&self, url: &str) -> Result<reqwest::blocking::Response, DataprovError> {
        let response = self.send_with_retries(|| self.client.get(url))?;
        if !response.status().is_success() {
            let status = response.status().as_u16();
            let message = response
                .text()
                .unwrap_or_else(|_| "figshare request failed".to_string());
            return Err(DataprovError::Status { status, message });
        }
        Ok(response)
    }

    fn send_with_retries<F>(
        &self,
        mut make_req: F,
    ) -> Result<reqwest::blocking::Response, DataprovError>
    where
        F: FnMut() -> reqwest::blocking::RequestBuilder,
    {
        const MAX_RETRIES: usize = 3;
        const BASE_DELAY_MS: u64 = 200;
        let mut attempt = 0usize;
        loop {
            let response = make_req().send();
            match response {
                Ok(resp) => {
                    let status = resp.status().as_u16();
                    if attempt < MAX_RETRIES && is_retryable_status(status) {
                        let delay = BASE_DELAY_MS * (attempt as u64 + 1);
                        thread::sleep(Duration::from_millis(delay));
                        attempt += 1;
                        continue;
                    }
                    return Ok(resp);
                }
                Err(err) => {
                    if attempt < MAX_RETRIES && is_retryable_error(&err) {
                        let delay = BASE_DELAY_MS * (attempt as u64 + 1);
                        thread::sleep(Duration::from_millis(delay));
                        attempt += 1;
                        continue;
                    }
                    return Err(DataprovError::Http(err.to_string()));
                }
            }
        }
    }
}

impl ArticleClient for FigshareHttpClient {
    fn list_files(&self, article_id: &str) -> Result<Vec<RemoteFile>, DataprovError> {
        let url = format!(
            "{}/articles/{article_id}/files?page_size={LISTING_PAGE_SIZE}",
            self.base_url
        );
        let response = self.get_checked(&url)?;
        response
            .json::<Vec<RemoteFile>>()
            .map_err(|err| DataprovError::Http(err.to_string()))
    }

    fn fetch_part_manifest(&self, url: &str) -> Result<PartManifest, DataprovError> {
        let response = self.get_checked(url)?;
        response
            .json::<PartManifest>()
            .map_err(|err| DataprovError::Http(err.to_string()))
    }

    fn download_file(
        &self,
        url: &str,
        destination: &Path,
        progress: &mut dyn FnMut(u64),
    ) -> Result<(), DataprovError> {
        let mut response = self.get_checked(url)?;
        let mut file = File::create(destination).map_err(|err| {
            DataprovError::Filesystem(format!("create {}: {err}", destination.display()))
        })?;
        let mut buffer = [0u8; BLOCK_SIZE];
        loop {
            let read = response
                .read(&mut buffer)
                .map_err(|err| DataprovError::Http(err.to_string()))?;
            if read == 0 {
                break;
            }
            file.write_all(&buffer[..read])
                .map_err(|err| DataprovError::Filesystem(err.to_string()))?;
            progress(read as u64);
        }
        Ok(())
    }
}

fn is_retryable_status(status: u16) -> bool {
    matches!(status, 429 | 500 | 502 | 503 | 504)
}

fn is_retryable_error(err: &reqwest::Error) -> bool {
    err.is_timeout() || err.is_connect() || err.is_request()
}
