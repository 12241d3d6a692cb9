//! src/services/storage_sink.rs
//!
//! Storage sinks persist a packaged product folder under
//! `{prefix}/{product_id}/{filename}`. Two backends:
//! - `LocalSink` writes into a directory tree (`{root}/{bucket}/{key}`)
//! - `HttpSink` PUTs to an S3-style object store (`{endpoint}/{bucket}/{key}`)
//!
//! Every file is attempted once. Failures are reported per file and never retried.

use crate::models::file_entry::{ProductId, extension_of};
use async_trait::async_trait;
use base64::{Engine as _, engine::general_purpose};
use bytes::Bytes;
use futures::StreamExt;
use md5::Context;
use reqwest::{
    Client, StatusCode, Url,
    header::{CONTENT_LENGTH, CONTENT_TYPE, ETAG},
};
use std::{
    io::{self, ErrorKind},
    path::{Path, PathBuf},
};
use thiserror::Error;
use tokio::{
    fs::{self, File},
    io::AsyncWriteExt,
};
use tokio_util::io::ReaderStream;
use tracing::{debug, error, info};
use uuid::Uuid;

const MAX_OBJECT_KEY_LEN: usize = 1024;

#[derive(Debug, Error)]
pub enum SinkError {
    #[error("invalid object key `{0}`")]
    InvalidObjectKey(String),
    #[error("invalid endpoint `{0}`")]
    InvalidEndpoint(String),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error("PUT {url} failed: {source}")]
    Http {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("PUT {url} returned {status}")]
    Status { url: String, status: StatusCode },
    #[error("etag mismatch for `{key}`: sent {local}, store reported {remote}")]
    EtagMismatch {
        key: String,
        local: String,
        remote: String,
    },
}

pub type SinkResult<T> = Result<T, SinkError>;

/// An object accepted by a sink.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
    pub key: String,
    /// Hex MD5 of the uploaded bytes.
    pub etag: String,
    pub size_bytes: u64,
}

#[async_trait]
pub trait StorageSink: Send + Sync {
    /// Human-readable location of `key` (URL or path), for logs.
    fn location(&self, key: &str) -> String;

    /// Store the file at `path` under `key`.
    async fn put_file(&self, key: &str, path: &Path) -> SinkResult<StoredObject>;
}

/// Where uploads go, as parsed from configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteEndpoint {
    /// S3-style HTTP object store.
    Http(Url),
    /// Local directory standing in for the object store.
    Directory(PathBuf),
}

impl RemoteEndpoint {
    /// Accepts `http(s)://...`, `file://<dir>` or a bare directory path.
    pub fn parse(raw: &str) -> SinkResult<Self> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(SinkError::InvalidEndpoint(raw.to_string()));
        }
        if raw.starts_with("http://") || raw.starts_with("https://") {
            let url = Url::parse(raw).map_err(|_| SinkError::InvalidEndpoint(raw.to_string()))?;
            if url.cannot_be_a_base() || url.host_str().is_none() {
                return Err(SinkError::InvalidEndpoint(raw.to_string()));
            }
            return Ok(Self::Http(url));
        }
        let path = raw.trim_start_matches("file://");
        if path.is_empty() || path.contains("://") {
            return Err(SinkError::InvalidEndpoint(raw.to_string()));
        }
        Ok(Self::Directory(PathBuf::from(path)))
    }

    /// Build the sink for `bucket` at this endpoint.
    pub fn into_sink(self, bucket: &str) -> Box<dyn StorageSink> {
        match self {
            Self::Http(url) => Box::new(HttpSink::new(Client::new(), url, bucket)),
            Self::Directory(root) => Box::new(LocalSink::new(root.join(bucket))),
        }
    }
}

/// Remote key for one file of a product: `{prefix}/{id}/{filename}`.
///
/// Slashes around `prefix` are trimmed; an empty prefix yields `{id}/{filename}`.
pub fn object_key(prefix: &str, id: &ProductId, filename: &str) -> String {
    let prefix = prefix.trim_matches('/');
    if prefix.is_empty() {
        format!("{}/{}", id, filename)
    } else {
        format!("{}/{}/{}", prefix, id, filename)
    }
}

/// Reject keys that could escape the bucket or confuse a store.
///
/// Empty, over-long and absolute keys are refused, as are keys with a `..`
/// segment, control characters or backslashes. Dots inside a segment are fine.
pub fn ensure_key_safe(key: &str) -> SinkResult<()> {
    let unsafe_key = key.is_empty()
        || key.len() > MAX_OBJECT_KEY_LEN
        || key.starts_with('/')
        || key.split('/').any(|segment| segment == "..")
        || key
            .bytes()
            .any(|b| b.is_ascii_control() || b == b'\\' || b == b'\0');
    if unsafe_key {
        return Err(SinkError::InvalidObjectKey(key.to_string()));
    }
    Ok(())
}

/// MIME type for a packaged file, by extension.
pub fn content_type_for(path: &Path) -> &'static str {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    match extension_of(&name).as_str() {
        "zip" => "application/zip",
        "glb" => "model/gltf-binary",
        "gltf" => "model/gltf+json",
        "json" => "application/json",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        _ => "application/octet-stream",
    }
}

/// Stream a file once, returning its MD5 digest and length.
async fn file_digest(path: &Path) -> io::Result<(md5::Digest, u64)> {
    let mut stream = ReaderStream::new(File::open(path).await?);
    let mut digest = Context::new();
    let mut size = 0u64;
    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        size += chunk.len() as u64;
        digest.consume(&chunk);
    }
    Ok((digest.compute(), size))
}

/// Directory-backed sink: objects land at `{root}/{key}`.
#[derive(Clone, Debug)]
pub struct LocalSink {
    root: PathBuf,
}

impl LocalSink {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

#[async_trait]
impl StorageSink for LocalSink {
    fn location(&self, key: &str) -> String {
        self.root.join(key).display().to_string()
    }

    /// Copy through a temporary file, hashing while streaming, then rename
    /// into place so readers never see a partial object.
    async fn put_file(&self, key: &str, path: &Path) -> SinkResult<StoredObject> {
        ensure_key_safe(key)?;
        let dest = self.root.join(key);
        let parent = dest.parent().map(Path::to_path_buf).ok_or_else(|| {
            io::Error::new(ErrorKind::Other, "object path missing parent directory")
        })?;
        fs::create_dir_all(&parent).await?;
        let tmp_path = parent.join(format!(".tmp-{}", Uuid::new_v4()));

        let result = copy_hashed(path, &tmp_path).await;
        let (digest, size_bytes) = match result {
            Ok(done) => done,
            Err(err) => {
                let _ = fs::remove_file(&tmp_path).await;
                return Err(SinkError::Io(err));
            }
        };
        if let Err(err) = fs::rename(&tmp_path, &dest).await {
            let _ = fs::remove_file(&tmp_path).await;
            return Err(SinkError::Io(err));
        }

        Ok(StoredObject {
            key: key.to_string(),
            etag: format!("{:x}", digest),
            size_bytes,
        })
    }
}

async fn copy_hashed(src: &Path, dest: &Path) -> io::Result<(md5::Digest, u64)> {
    let mut stream = ReaderStream::new(File::open(src).await?);
    let mut file = File::create(dest).await?;
    let mut digest = Context::new();
    let mut size = 0u64;
    while let Some(chunk) = stream.next().await {
        let chunk: Bytes = chunk?;
        size += chunk.len() as u64;
        digest.consume(&chunk);
        file.write_all(&chunk).await?;
    }
    file.flush().await?;
    file.sync_all().await?;
    Ok((digest.compute(), size))
}

/// S3-style HTTP sink: `PUT {endpoint}/{bucket}/{key}` with a streamed body.
#[derive(Clone, Debug)]
pub struct HttpSink {
    client: Client,
    endpoint: Url,
    bucket: String,
}

impl HttpSink {
    pub fn new(client: Client, endpoint: Url, bucket: impl Into<String>) -> Self {
        Self {
            client,
            endpoint,
            bucket: bucket.into(),
        }
    }

    fn object_url(&self, key: &str) -> SinkResult<Url> {
        let mut url = self.endpoint.clone();
        url.path_segments_mut()
            .map_err(|_| SinkError::InvalidEndpoint(self.endpoint.to_string()))?
            .pop_if_empty()
            .push(&self.bucket)
            .extend(key.split('/'));
        Ok(url)
    }
}

#[async_trait]
impl StorageSink for HttpSink {
    fn location(&self, key: &str) -> String {
        self.object_url(key)
            .map(|url| url.to_string())
            .unwrap_or_else(|_| format!("{}/{}/{}", self.endpoint, self.bucket, key))
    }

    async fn put_file(&self, key: &str, path: &Path) -> SinkResult<StoredObject> {
        ensure_key_safe(key)?;
        let url = self.object_url(key)?;
        let (digest, size_bytes) = file_digest(path).await?;
        let etag = format!("{:x}", digest);

        let body = reqwest::Body::wrap_stream(ReaderStream::new(File::open(path).await?));
        let response = self
            .client
            .put(url.clone())
            .header(CONTENT_TYPE, content_type_for(path))
            .header(CONTENT_LENGTH, size_bytes)
            .header("content-md5", general_purpose::STANDARD.encode(digest.0))
            .body(body)
            .send()
            .await
            .map_err(|source| SinkError::Http {
                url: url.to_string(),
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(SinkError::Status {
                url: url.to_string(),
                status,
            });
        }

        let remote = response
            .headers()
            .get(ETAG)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.trim_matches('"').to_ascii_lowercase());
        match remote {
            // multipart etags (`<hash>-<parts>`) are not content hashes
            Some(remote) if !remote.contains('-') && remote != etag => {
                return Err(SinkError::EtagMismatch {
                    key: key.to_string(),
                    local: etag,
                    remote,
                });
            }
            Some(_) => {}
            None => debug!("no etag returned for {}", url),
        }

        Ok(StoredObject {
            key: key.to_string(),
            etag,
            size_bytes,
        })
    }
}

/// One file the sink refused.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailedUpload {
    pub key: String,
    pub error: String,
}

/// Per-file outcome of uploading a product folder.
#[derive(Debug, Clone, Default)]
pub struct UploadReport {
    pub uploaded: Vec<StoredObject>,
    pub failed: Vec<FailedUpload>,
}

impl UploadReport {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Upload every regular file in `folder`, in filename order.
///
/// Only listing the folder can fail the call as a whole; individual file
/// failures are collected in the report and the remaining files still go up.
pub async fn upload_folder(
    sink: &dyn StorageSink,
    prefix: &str,
    id: &ProductId,
    folder: &Path,
) -> io::Result<UploadReport> {
    let mut files = Vec::new();
    let mut reader = fs::read_dir(folder).await?;
    while let Some(item) = reader.next_entry().await? {
        if item.file_type().await?.is_file() {
            files.push((item.file_name().to_string_lossy().into_owned(), item.path()));
        }
    }
    files.sort();

    let mut report = UploadReport::default();
    for (name, path) in files {
        let key = object_key(prefix, id, &name);
        match sink.put_file(&key, &path).await {
            Ok(object) => {
                info!("  uploaded {}", sink.location(&key));
                report.uploaded.push(object);
            }
            Err(err) => {
                error!("  upload of {} failed: {}", sink.location(&key), err);
                report.failed.push(FailedUpload {
                    key,
                    error: err.to_string(),
                });
            }
        }
    }

    info!("  uploaded {} file(s)", report.uploaded.len());
    Ok(report)
}
