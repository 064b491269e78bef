//! Azure Data Lake Store (Gen1) over WebHDFS

use super::traits::ObjectStore;
use crate::auth::AccessToken;
use crate::error::{Error, Result};
use async_trait::async_trait;
use reqwest::{Method, StatusCode, header};
use serde::Deserialize;
use tracing::debug;
use url::Url;

/// WebHDFS API version sent with every request
const API_VERSION: &str = "2018-09-01";

/// Longest store error body kept in an error message
const MAX_REASON_LEN: usize = 512;

/// Authenticated client bound to one Data Lake Store account
///
/// Appends use `GETFILESTATUS` to decide between `CREATE` (file absent) and
/// `APPEND` (file present), so repeated writes to the same path concatenate.
pub struct AdlsStore {
    http: reqwest::Client,
    base: Url,
    store_name: String,
    token: AccessToken,
}

#[derive(Debug, Deserialize)]
struct ListStatusResponse {
    #[serde(rename = "FileStatuses")]
    file_statuses: FileStatuses,
}

#[derive(Debug, Deserialize)]
struct FileStatuses {
    #[serde(rename = "FileStatus", default)]
    file_status: Vec<FileStatus>,
}

#[derive(Debug, Deserialize)]
struct FileStatus {
    #[serde(rename = "pathSuffix")]
    path_suffix: String,
}

impl AdlsStore {
    /// Bind a client to the store at `base` (e.g. `https://mystore.azuredatalakestore.net`)
    pub fn new(
        http: reqwest::Client,
        base: Url,
        store_name: impl Into<String>,
        token: AccessToken,
    ) -> Self {
        Self {
            http,
            base,
            store_name: store_name.into(),
            token,
        }
    }

    /// Token the client authenticates with
    pub fn token(&self) -> &AccessToken {
        &self.token
    }

    /// WebHDFS URL for an operation on `path`
    pub fn op_url(&self, path: &str, op: &str, extra: &[(&str, &str)]) -> Result<Url> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|_| Error::Config {
                message: format!("store endpoint {} cannot carry a path", self.base),
                key: Some("store_endpoint".to_string()),
            })?
            .pop_if_empty()
            .extend(["webhdfs", "v1"])
            .extend(path.split('/').filter(|s| !s.is_empty() && *s != "."));
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("op", op);
            for (k, v) in extra {
                query.append_pair(k, v);
            }
            query.append_pair("api-version", API_VERSION);
        }
        Ok(url)
    }

    async fn send(
        &self,
        method: Method,
        url: Url,
        body: Option<Vec<u8>>,
    ) -> Result<reqwest::Response> {
        let mut request = self
            .http
            .request(method, url)
            .header(header::AUTHORIZATION, self.token.bearer());
        if let Some(body) = body {
            request = request
                .header(header::CONTENT_TYPE, "application/octet-stream")
                .body(body);
        }
        Ok(request.send().await?)
    }

    async fn exists(&self, path: &str) -> Result<bool> {
        let url = self.op_url(path, "GETFILESTATUS", &[])?;
        let response = self.send(Method::GET, url, None).await?;
        match response.status() {
            s if s.is_success() => Ok(true),
            StatusCode::NOT_FOUND => Ok(false),
            _ => Err(storage_error(path, response).await),
        }
    }
}

async fn storage_error(path: &str, response: reqwest::Response) -> Error {
    let status = response.status();
    let mut reason = response
        .text()
        .await
        .unwrap_or_else(|e| format!("unreadable response body: {}", e));
    if reason.trim().is_empty() {
        reason = status.to_string();
    }
    if reason.len() > MAX_REASON_LEN {
        let mut end = MAX_REASON_LEN;
        while !reason.is_char_boundary(end) {
            end -= 1;
        }
        reason.truncate(end);
    }
    Error::Storage {
        path: path.to_string(),
        status: Some(status.as_u16()),
        reason,
    }
}

#[async_trait]
impl ObjectStore for AdlsStore {
    async fn append(&self, path: &str, data: &[u8]) -> Result<()> {
        let (method, url) = if self.exists(path).await? {
            (
                Method::POST,
                self.op_url(path, "APPEND", &[("append", "true")])?,
            )
        } else {
            (
                Method::PUT,
                self.op_url(path, "CREATE", &[("overwrite", "true"), ("write", "true")])?,
            )
        };

        debug!(store = %self.store_name, path, %method, bytes = data.len(), "writing to store");

        let response = self.send(method, url, Some(data.to_vec())).await?;
        if response.status().is_success() {
            Ok(())
        } else {
            Err(storage_error(path, response).await)
        }
    }

    async fn list(&self, path: &str) -> Result<Vec<String>> {
        let url = self.op_url(path, "LISTSTATUS", &[])?;
        let response = self.send(Method::GET, url, None).await?;
        if !response.status().is_success() {
            return Err(storage_error(path, response).await);
        }
        let listing: ListStatusResponse = response.json().await?;
        Ok(listing
            .file_statuses
            .file_status
            .into_iter()
            .map(|f| f.path_suffix)
            .collect())
    }

    fn name(&self) -> &str {
        &self.store_name
    }
}
