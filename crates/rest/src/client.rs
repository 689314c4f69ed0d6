//! XNAT REST client implementation
//!
//! Implements the Repository trait from qx-core over the XNAT REST API.
//! Requests authenticate with HTTP basic auth and keep the server's
//! `JSESSIONID` cookie, which [`XnatClient::close`] ends.

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use qx_core::{
    Attributes, EntityType, Error, Profile, RemoteObject, Repository, Result, RetryConfig,
};
use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};
use url::Url;

use crate::result_set::{parse_rows, row_fields};

/// Session resource ended on close
const SESSION_URI: &str = "/data/JSESSION";

/// Longest response body excerpt carried into error messages
const MAX_ERROR_BODY: usize = 200;

/// XNAT REST client
pub struct XnatClient {
    http_client: Client,
    server: Url,
    user: String,
    password: String,
    retry: RetryConfig,
}

impl XnatClient {
    /// Create a new client from a profile
    pub fn new(profile: &Profile) -> Result<Self> {
        let server = profile.server_url()?;
        if server.cannot_be_a_base() {
            return Err(Error::Config(format!(
                "XNAT server URL cannot hold a path: {}",
                profile.server
            )));
        }
        let timeout = profile.timeout_config();
        let http_client = Client::builder()
            .danger_accept_invalid_certs(profile.insecure)
            .cookie_store(true)
            .connect_timeout(Duration::from_millis(timeout.connect_ms))
            .read_timeout(Duration::from_millis(timeout.read_ms))
            .build()
            .map_err(|e| Error::Network(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            http_client,
            server,
            user: profile.user.clone(),
            password: profile.password.clone(),
            retry: profile.retry_config(),
        })
    }

    /// Build the request URL for a REST URI such as `/data/projects`
    ///
    /// The URI is appended to the server path, so servers deployed under a
    /// context path (`https://host/xnat`) work unchanged.
    fn url(&self, uri: &str, query: &[(&str, &str)]) -> Result<Url> {
        let mut url = self.server.clone();
        url.path_segments_mut()
            .map_err(|_| Error::Config(format!("XNAT server URL cannot hold a path: {}", self.server)))?
            .pop_if_empty()
            .extend(uri.split('/').filter(|s| !s.is_empty()));
        if !query.is_empty() {
            url.query_pairs_mut().extend_pairs(query);
        }
        Ok(url)
    }

    fn authorized(&self, method: Method, url: Url) -> RequestBuilder {
        self.http_client
            .request(method, url)
            .basic_auth(&self.user, Some(&self.password))
    }

    /// Send a bodiless request, retrying idempotent reads
    async fn execute(&self, method: Method, url: Url) -> Result<Response> {
        let max_attempts = if method == Method::GET {
            self.retry.max_attempts.max(1)
        } else {
            1
        };
        let mut attempt = 1;
        loop {
            let result = self.authorized(method.clone(), url.clone()).send().await;
            let retryable = match &result {
                Ok(response) => response.status().is_server_error(),
                Err(e) => e.is_connect() || e.is_timeout(),
            };
            if !retryable || attempt >= max_attempts {
                let response =
                    result.map_err(|e| Error::Network(format!("Request failed: {e}")))?;
                return check_status(response).await;
            }
            let delay = backoff(&self.retry, attempt);
            warn!(
                url = %url,
                attempt,
                delay_ms = delay.as_millis() as u64,
                "Retrying XNAT request"
            );
            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }
}

/// Fail on a non-success status, keeping an excerpt of the body
async fn check_status(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let url = response.url().clone();
    let body = response
        .text()
        .await
        .unwrap_or_else(|_| "Unknown error".to_string());
    Err(map_error(status, &url, &body))
}

/// Map HTTP status codes to appropriate errors
fn map_error(status: StatusCode, url: &Url, body: &str) -> Error {
    let excerpt: String = body.trim().chars().take(MAX_ERROR_BODY).collect();
    let detail = if excerpt.is_empty() {
        format!("{} {}", status.as_u16(), url.path())
    } else {
        format!("{} {}: {excerpt}", status.as_u16(), url.path())
    };
    match status {
        StatusCode::NOT_FOUND => Error::NotFound(detail),
        StatusCode::FORBIDDEN | StatusCode::UNAUTHORIZED => Error::Auth(detail),
        StatusCode::CONFLICT => Error::Conflict(detail),
        _ => Error::Network(format!("HTTP {detail}")),
    }
}

/// Sibling file a download is written to until it is complete
fn partial_path(target: &Path) -> Result<PathBuf> {
    let name = target.file_name().ok_or_else(|| {
        Error::InvalidArgument(format!("{} has no file name", target.display()))
    })?;
    Ok(target.with_file_name(format!(".{}.part", name.to_string_lossy())))
}

async fn stream_to_file(mut response: Response, path: &Path) -> Result<u64> {
    let mut output = tokio::fs::File::create(path).await?;
    let mut written = 0u64;
    while let Some(chunk) = response
        .chunk()
        .await
        .map_err(|e| Error::Network(format!("Download interrupted: {e}")))?
    {
        output.write_all(&chunk).await?;
        written += chunk.len() as u64;
    }
    output.flush().await?;
    Ok(written)
}

/// Delay before the next attempt, doubling from the initial backoff
fn backoff(retry: &RetryConfig, attempt: u32) -> Duration {
    let factor = 2u64.saturating_pow(attempt.saturating_sub(1));
    let millis = retry
        .initial_backoff_ms
        .saturating_mul(factor)
        .min(retry.max_backoff_ms);
    Duration::from_millis(millis)
}

/// REST URI of the collection holding children of one type
fn collection_uri(parent: Option<&RemoteObject>, entity: EntityType) -> Result<String> {
    let collection = match entity {
        EntityType::Project => "projects",
        EntityType::Subject => "subjects",
        EntityType::Experiment => "experiments",
        EntityType::Scan => "scans",
        EntityType::Assessor => "assessors",
        EntityType::Resource => "resources",
        EntityType::InResource => "in/resources",
        EntityType::OutResource => "out/resources",
        EntityType::File => "files",
    };
    match parent {
        None if entity == EntityType::Project => Ok("/data/projects".to_string()),
        Some(p) if p.entity.can_contain(entity) => Ok(format!("{}/{collection}", p.uri)),
        Some(p) => Err(Error::InvalidArgument(format!(
            "a {} has no {entity} children",
            p.entity
        ))),
        None => Err(Error::InvalidArgument(format!(
            "a {entity} must be looked up below its parent"
        ))),
    }
}

#[async_trait]
impl Repository for XnatClient {
    async fn list_children(
        &self,
        parent: Option<&RemoteObject>,
        entity: EntityType,
    ) -> Result<Vec<RemoteObject>> {
        let collection = collection_uri(parent, entity)?;
        let url = self.url(&collection, &[("format", "json")])?;
        let response = match self.execute(Method::GET, url).await {
            // An assessor without input resources has no such collection.
            Err(Error::NotFound(_)) => return Ok(Vec::new()),
            other => other?,
        };
        let body = response
            .text()
            .await
            .map_err(|e| Error::Network(format!("Failed to read response: {e}")))?;

        let rows = parse_rows(&body)?;
        let mut children = Vec::with_capacity(rows.len());
        for row in &rows {
            let Some(fields) = row_fields(entity, row) else {
                debug!(collection = %collection, "Skipping listing row without identifier");
                continue;
            };
            let uri = format!("{collection}/{}", fields.uri_segment(entity));
            let child = RemoteObject::child_of(parent, entity, fields.id, fields.label, uri)?
                .with_xsi_type(fields.xsi_type)
                .with_size(fields.size);
            children.push(child);
        }
        debug!(collection = %collection, count = children.len(), "Listed XNAT children");
        Ok(children)
    }

    async fn get_child(
        &self,
        parent: Option<&RemoteObject>,
        entity: EntityType,
        label: &str,
    ) -> Result<Option<RemoteObject>> {
        let children = self.list_children(parent, entity).await?;
        Ok(children
            .into_iter()
            .find(|child| child.label == label || child.id == label))
    }

    async fn create(
        &self,
        parent: Option<&RemoteObject>,
        entity: EntityType,
        label: &str,
        attributes: &Attributes,
    ) -> Result<RemoteObject> {
        let collection = collection_uri(parent, entity)?;
        let date = attributes
            .date
            .map(|d| d.strftime("%m/%d/%Y").to_string());
        let mut query: Vec<(&str, &str)> = Vec::new();
        if let Some(xsi_type) = attributes.xsi_type.as_deref() {
            query.push(("xsiType", xsi_type));
        }
        if let Some(date) = date.as_deref() {
            query.push(("date", date));
        }
        let url = self.url(&format!("{collection}/{label}"), &query)?;
        debug!(url = %url, "Creating XNAT object");
        self.execute(Method::PUT, url).await?;

        self.get_child(parent, entity, label).await?.ok_or_else(|| {
            Error::General(format!("XNAT did not report the new {entity} {label}"))
        })
    }

    async fn delete(&self, object: &RemoteObject) -> Result<()> {
        let url = self.url(&object.uri, &[("removeFiles", "true")])?;
        debug!(url = %url, "Deleting XNAT object");
        self.execute(Method::DELETE, url).await?;
        Ok(())
    }

    async fn download_file(&self, file: &RemoteObject, target: &Path) -> Result<u64> {
        let url = self.url(&file.uri, &[])?;
        let response = self.execute(Method::GET, url).await?;
        let partial = partial_path(target)?;
        let result = match stream_to_file(response, &partial).await {
            Ok(written) => tokio::fs::rename(&partial, target)
                .await
                .map(|()| written)
                .map_err(Error::from),
            Err(e) => Err(e),
        };
        if result.is_err() {
            if let Err(e) = tokio::fs::remove_file(&partial).await {
                warn!(path = %partial.display(), error = %e, "Failed to remove partial download");
            }
        }
        result
    }

    async fn upload_file(
        &self,
        resource: &RemoteObject,
        name: &str,
        source: &Path,
        overwrite: bool,
    ) -> Result<RemoteObject> {
        let content = tokio::fs::read(source).await?;
        let size = content.len() as u64;
        let mime = mime_guess::from_path(name).first_or_octet_stream();

        let uri = format!("{}/files/{name}", resource.uri);
        let mut query = vec![("inbody", "true")];
        if overwrite {
            query.push(("overwrite", "true"));
        }
        let url = self.url(&uri, &query)?;
        let response = self
            .authorized(Method::PUT, url)
            .header(CONTENT_TYPE, mime.as_ref())
            .body(content)
            .send()
            .await
            .map_err(|e| Error::Network(format!("Upload failed: {e}")))?;
        check_status(response).await?;

        Ok(RemoteObject::child_of(Some(resource), EntityType::File, name, name, uri)?
            .with_size(Some(size)))
    }

    async fn close(&self) -> Result<()> {
        let url = self.url(SESSION_URI, &[])?;
        self.execute(Method::DELETE, url).await?;
        debug!("Closed XNAT session");
        Ok(())
    }
}
