//! Dataset source adapter
//!
//! A dataset arrives either as an in-memory table or as a URL to delimited
//! text. For URLs the `sep` and `encoding` query parameters describe the
//! content and are stripped before fetching.

use std::time::Duration;
use tracing::info;
use url::Url;

use crate::agent::ColumnDescriptions;
use crate::dataset::Dataset;
use crate::error::{Result, TabulaError};

const FETCH_TIMEOUT_SECS: u64 = 60;

/// Where the dataset comes from
#[derive(Debug, Clone)]
pub enum DatasetSource {
    Table(Dataset),
    Url(String),
}

impl DatasetSource {
    /// Interpret a command-line argument: URLs stay URLs, anything else is
    /// read as a local delimited file.
    pub fn from_arg(arg: &str, delimiter: u8) -> Result<Self> {
        if is_valid_url(arg) {
            return Ok(DatasetSource::Url(arg.to_string()));
        }
        let content = std::fs::read_to_string(arg)?;
        Ok(DatasetSource::Table(Dataset::from_delimited(&content, delimiter)?))
    }

    pub fn load(self) -> Result<Dataset> {
        match self {
            DatasetSource::Table(ds) => Ok(ds),
            DatasetSource::Url(url) => fetch_dataset(&url),
        }
    }
}

/// Column descriptions given inline or as a URL to a JSON object
#[derive(Debug, Clone)]
pub enum DescriptionsSource {
    Inline(ColumnDescriptions),
    Url(String),
}

impl DescriptionsSource {
    pub fn load(self) -> Result<ColumnDescriptions> {
        match self {
            DescriptionsSource::Inline(map) => Ok(map),
            DescriptionsSource::Url(url) => {
                if !is_valid_url(&url) {
                    return Err(TabulaError::InvalidColumnDescriptions(url));
                }
                let body = http_get(&url)?;
                let text = String::from_utf8_lossy(&body);
                Ok(serde_json::from_str(&text)?)
            }
        }
    }
}

/// Fetch parameters recovered from a dataset URL
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchRequest {
    pub url: String,
    pub delimiter: u8,
    pub encoding: String,
}

pub fn is_valid_url(candidate: &str) -> bool {
    Url::parse(candidate)
        .map(|u| matches!(u.scheme(), "http" | "https") && u.host().is_some())
        .unwrap_or(false)
}

/// Split a dataset URL into the fetch URL and its parsing parameters.
///
/// Defaults: comma delimiter, UTF-8.
pub fn parse_dataset_url(raw: &str) -> Result<FetchRequest> {
    if !is_valid_url(raw) {
        return Err(TabulaError::InvalidDatasetSource(raw.to_string()));
    }
    let mut url = Url::parse(raw).map_err(|_| TabulaError::InvalidDatasetSource(raw.to_string()))?;

    let mut sep = None;
    let mut encoding = None;
    let mut kept: Vec<(String, String)> = Vec::new();
    for (key, value) in url.query_pairs() {
        match &*key {
            "sep" => sep = sep.or_else(|| Some(value.into_owned()).filter(|v| !v.is_empty())),
            "encoding" => {
                encoding = encoding.or_else(|| Some(value.into_owned()).filter(|v| !v.is_empty()))
            }
            _ => kept.push((key.to_string(), value.into_owned())),
        }
    }

    if kept.is_empty() {
        url.set_query(None);
    } else {
        url.query_pairs_mut().clear().extend_pairs(kept);
    }

    let sep = sep.unwrap_or_else(|| ",".to_string());
    let delimiter = match sep.as_bytes() {
        [b] => *b,
        _ => return Err(TabulaError::Parse(format!("unsupported separator {:?}", sep))),
    };

    Ok(FetchRequest {
        url: url.to_string(),
        delimiter,
        encoding: encoding.unwrap_or_else(|| "utf-8".to_string()),
    })
}

/// Decode fetched bytes with the named encoding and parse them.
pub fn parse_fetched(bytes: &[u8], request: &FetchRequest) -> Result<Dataset> {
    let encoding = encoding_rs::Encoding::for_label(request.encoding.as_bytes())
        .ok_or_else(|| TabulaError::Parse(format!("unknown encoding {}", request.encoding)))?;
    let (decoded, _, _) = encoding.decode(bytes);
    Dataset::from_delimited(&decoded, request.delimiter)
}

pub fn fetch_dataset(raw: &str) -> Result<Dataset> {
    let request = parse_dataset_url(raw)?;
    info!(
        "Fetching dataset from {} (sep {:?}, encoding {})",
        request.url, request.delimiter as char, request.encoding
    );
    let body = http_get(&request.url)?;
    parse_fetched(&body, &request)
}

fn http_get(url: &str) -> Result<Vec<u8>> {
    let client = reqwest::blocking::Client::builder()
        .timeout(Duration::from_secs(FETCH_TIMEOUT_SECS))
        .build()
        .map_err(|e| TabulaError::Fetch(e.to_string()))?;

    let response = client
        .get(url)
        .send()
        .map_err(|e| TabulaError::Fetch(format!("Request failed: {}", e)))?;
    if !response.status().is_success() {
        return Err(TabulaError::Fetch(format!("HTTP {} from {}", response.status(), url)));
    }

    response
        .bytes()
        .map(|b| b.to_vec())
        .map_err(|e| TabulaError::Fetch(e.to_string()))
}
