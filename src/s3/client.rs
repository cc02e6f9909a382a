//! Object storage client with core operations.
//!
//! Every operation runs the same pipeline: validate inputs, sign the
//! request, dispatch it once through the shared transport, and interpret
//! the response. Upload, get and delete all build their signature through
//! one `dispatch` path, so the canonical resource can never drift between
//! methods.
//!
//! Failures never escape unclassified: each public operation returns a
//! [`StorageError`] naming the kind of failure, and the classifier logs
//! through `tracing` before returning.

use crate::config::StorageSettings;
use crate::s3::signer::{SignerV4, SigningError};
use crate::s3::transport::{HttpTransport, Transport, TransportError, WireResponse};
use crate::s3::types::StorageInfo;
use bytes::Bytes;
use chrono::Utc;
use hyper::{Method, StatusCode};
use quick_xml::events::Event;
use quick_xml::Reader;
use std::borrow::Cow;
use std::collections::BTreeMap;
use std::io::Write;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::error;

/// Hex lookup table for object key encoding
static HEX_UPPER: &[u8; 16] = b"0123456789ABCDEF";

/// Presigned retrieval URLs stay valid for this long after upload
const PRESIGN_TTL_SECS: u64 = 3 * 60 * 60;

/// Storage operation errors, by kind
#[derive(Debug, Error)]
pub enum StorageError {
    /// Caller-supplied input failed validation; nothing was dispatched
    #[error("invalid input: {0}")]
    InvalidInput(&'static str),

    /// Configuration prevented signature computation; nothing was dispatched
    #[error(transparent)]
    Signing(#[from] SigningError),

    /// The store rejected the request credentials. Not retryable.
    #[error("authentication rejected ({code}): {message}")]
    Authentication { code: String, message: String },

    /// Any other store rejection: not-found, precondition-failed, server error
    #[error("store rejected request ({status}): {message}")]
    Store {
        status: StatusCode,
        code: Option<String>,
        message: String,
    },

    /// The exchange failed before a response arrived
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// No response within the configured deadline. The object may still
    /// have been written; partial writes are not rolled back.
    #[error("no response within {0:?}")]
    Timeout(Duration),

    /// Local filesystem failure while writing a downloaded object
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, StorageError>;

/// Client for signed upload, retrieval and deletion of objects.
///
/// Holds the settings, the signer and one transport handle; clones of the
/// `Arc`-wrapped transport are shared by every in-flight operation. Each
/// operation is a single best-effort attempt bounded by the configured
/// deadline.
pub struct ObjectStorageClient {
    settings: StorageSettings,
    signer: SignerV4,
    transport: Arc<dyn Transport>,
    timeout: Duration,
}

impl ObjectStorageClient {
    /// Create a client over the hyper transport
    pub fn new(settings: StorageSettings) -> Result<Self> {
        let transport = Arc::new(HttpTransport::new()?);
        Self::with_transport(settings, transport)
    }

    /// Create a client over an injected transport (tests use in-memory fakes).
    ///
    /// Incomplete credentials surface here as a signing error, before any
    /// request can be dispatched.
    pub fn with_transport(
        settings: StorageSettings,
        transport: Arc<dyn Transport>,
    ) -> Result<Self> {
        let signer = SignerV4::new(
            &settings.access_key,
            &settings.secret_key,
            &settings.region,
            &settings.service,
            &settings.algorithm,
        )?;
        let timeout = Duration::from_secs(settings.request_timeout);

        Ok(Self {
            settings,
            signer,
            transport,
            timeout,
        })
    }

    pub fn settings(&self) -> &StorageSettings {
        &self.settings
    }

    /// Upload a payload under the given object key.
    ///
    /// Returns the stored object's reference record, including the etag the
    /// store reported and a presigned retrieval URL valid for three hours.
    pub async fn upload(&self, file_name: &str, data: Bytes) -> Result<StorageInfo> {
        if file_name.is_empty() {
            return Err(StorageError::InvalidInput("file name is empty"));
        }
        if data.is_empty() {
            return Err(StorageError::InvalidInput("payload is empty"));
        }

        let url = self.object_url(file_name);

        let mut headers = BTreeMap::new();
        headers.insert(
            "content-type".to_string(),
            self.settings.content_type.clone(),
        );
        headers.insert("content-length".to_string(), data.len().to_string());

        let response = self
            .dispatch("upload", Method::PUT, &url, headers, data)
            .await?;

        let etag = etag_header(&response);
        let path = self.signer.presign_get(&url, PRESIGN_TTL_SECS, Utc::now());

        Ok(StorageInfo::new(
            url,
            path,
            file_name.to_string(),
            etag,
            self.settings.sender.clone(),
        ))
    }

    /// Fetch an object and return its body as text.
    ///
    /// A non-empty `etag` on the record is sent as an `if-match`
    /// precondition; the store rejects the read if the stored content no
    /// longer matches it.
    pub async fn get(&self, info: &StorageInfo) -> Result<String> {
        let response = self.fetch("get", info).await?;
        Ok(String::from_utf8_lossy(&response.body).into_owned())
    }

    /// Delete an object.
    ///
    /// Failures are classified and logged before being returned, so callers
    /// treating deletion as fire-and-forget can drop the result.
    pub async fn delete(&self, info: &StorageInfo) -> Result<()> {
        if info.file_name.is_empty() {
            return Err(StorageError::InvalidInput("file name is empty"));
        }

        let url = self.object_url(&info.file_name);
        self.dispatch("delete", Method::DELETE, &url, BTreeMap::new(), Bytes::new())
            .await?;

        Ok(())
    }

    /// Fetch an object and write it under the configured download directory.
    ///
    /// Returns the number of bytes written.
    pub async fn download(&self, info: &StorageInfo) -> Result<u64> {
        let dir = self
            .settings
            .download_path
            .clone()
            .ok_or(StorageError::InvalidInput("no download path configured"))?;

        let response = self.fetch("download", info).await?;

        let target = dir.join(&info.file_name);
        if let Some(parent) = target.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let file = std::fs::File::create(&target)?;
        let mut writer = std::io::BufWriter::with_capacity(256 * 1024, file);
        writer.write_all(&response.body)?;
        writer.flush()?;

        Ok(response.body.len() as u64)
    }

    /// Presigned retrieval URL for an object key, valid for three hours
    pub fn presigned_get_url(&self, file_name: &str) -> String {
        self.signer
            .presign_get(&self.object_url(file_name), PRESIGN_TTL_SECS, Utc::now())
    }

    /// Rebuild a storage record from persisted fields so a later get or
    /// delete can address the object. Pass an empty etag to skip the
    /// if-match precondition.
    pub fn reference(&self, file_name: &str, etag: &str) -> StorageInfo {
        StorageInfo::new(
            self.object_url(file_name),
            String::new(),
            file_name.to_string(),
            etag.to_string(),
            self.settings.sender.clone(),
        )
    }

    /// Shared GET path for `get` and `download`
    async fn fetch(&self, op: &'static str, info: &StorageInfo) -> Result<WireResponse> {
        if info.file_name.is_empty() {
            return Err(StorageError::InvalidInput("file name is empty"));
        }

        let url = self.object_url(&info.file_name);

        let mut headers = BTreeMap::new();
        if !info.etag.is_empty() {
            headers.insert("if-match".to_string(), format!("\"{}\"", info.etag));
        }

        self.dispatch(op, Method::GET, &url, headers, Bytes::new())
            .await
    }

    /// Sign, dispatch once under the deadline, and interpret the outcome
    async fn dispatch(
        &self,
        op: &'static str,
        method: Method,
        url: &str,
        extra_headers: BTreeMap<String, String>,
        body: Bytes,
    ) -> Result<WireResponse> {
        let signed = self.signer.sign(method.as_str(), url, extra_headers, &body);
        let headers = signed.into_headers();

        let outcome = tokio::time::timeout(
            self.timeout,
            self.transport.execute(method, url, &headers, body),
        )
        .await;

        match outcome {
            Ok(Ok(response)) => self.interpret(op, response),
            Ok(Err(e)) => {
                error!(op, error = %e, "dispatch failed");
                Err(e.into())
            }
            Err(_) => {
                error!(op, deadline = ?self.timeout, "no response within deadline");
                Err(StorageError::Timeout(self.timeout))
            }
        }
    }

    /// Classify a store response: success passes through, rejections become
    /// typed errors keyed on the store's error code
    fn interpret(&self, op: &'static str, response: WireResponse) -> Result<WireResponse> {
        if response.status.is_success() {
            return Ok(response);
        }

        let (code, message) = parse_error_body(&response.body);

        if code.as_deref().is_some_and(is_auth_error_code) {
            error!(
                op,
                code = code.as_deref().unwrap_or_default(),
                "check the provided credentials"
            );
            return Err(StorageError::Authentication {
                code: code.unwrap_or_default(),
                message,
            });
        }

        error!(op, status = %response.status, message = %message, "store rejected request");
        Err(StorageError::Store {
            status: response.status,
            code,
            message,
        })
    }

    /// Full object URL: `{endpoint}/{bucket}/{encoded key}`
    fn object_url(&self, file_name: &str) -> String {
        let endpoint = self.settings.endpoint_url.trim_end_matches('/');
        let key = encode_object_key(file_name);
        format!("{}/{}/{}", endpoint, self.settings.bucket, key)
    }
}

/// Error codes the store uses to signal rejected credentials
fn is_auth_error_code(code: &str) -> bool {
    matches!(code, "InvalidAccessKeyId" | "InvalidSecurity")
}

/// Pull the etag out of a write response, stripping the surrounding quotes
fn etag_header(response: &WireResponse) -> String {
    response
        .headers
        .get("etag")
        .and_then(|v| v.to_str().ok())
        .map(|s| s.trim_matches('"').to_string())
        .unwrap_or_default()
}

/// Parse the store's XML error body into (code, message).
///
/// The message falls back to the raw body when the store sent no
/// `<Message>` element (or no XML at all).
fn parse_error_body(body: &[u8]) -> (Option<String>, String) {
    let mut reader = Reader::from_reader(body);
    reader.config_mut().trim_text_start = true;
    reader.config_mut().trim_text_end = true;

    let mut code = None;
    let mut message = None;
    let mut current_text = String::with_capacity(128);

    loop {
        match reader.read_event() {
            Ok(Event::Text(e)) => {
                current_text.clear();
                if let Ok(text) = e.unescape() {
                    current_text.push_str(&text);
                }
            }
            Ok(Event::End(e)) => {
                match e.local_name().as_ref() {
                    b"Code" => code = Some(std::mem::take(&mut current_text)),
                    b"Message" => message = Some(std::mem::take(&mut current_text)),
                    _ => {}
                }
                current_text.clear();
            }
            Ok(Event::Eof) => break,
            // Not XML; the raw body becomes the message below
            Err(_) => break,
            _ => {}
        }
    }

    let message = message.unwrap_or_else(|| String::from_utf8_lossy(body).to_string());
    (code, message)
}

/// Encode an object key, preserving forward slashes.
/// Returns Cow::Borrowed when no encoding is needed (the common case).
fn encode_object_key(key: &str) -> Cow<'_, str> {
    let needs_encoding = key.bytes().any(
        |b| !matches!(b, b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' | b'/'),
    );

    if !needs_encoding {
        return Cow::Borrowed(key);
    }

    let mut result = String::with_capacity(key.len() + 32);
    for byte in key.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' | b'/' => {
                result.push(byte as char);
            }
            _ => {
                result.push('%');
                result.push(HEX_UPPER[(byte >> 4) as usize] as char);
                result.push(HEX_UPPER[(byte & 0xf) as usize] as char);
            }
        }
    }
    Cow::Owned(result)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_object_key_plain() {
        let result = encode_object_key("reports/2026/summary.csv");
        assert!(matches!(result, Cow::Borrowed(_)));
        assert_eq!(result, "reports/2026/summary.csv");
    }

    #[test]
    fn test_encode_object_key_special() {
        let result = encode_object_key("reports/月次 report.csv");
        assert!(matches!(result, Cow::Owned(_)));
        assert_eq!(result, "reports/%E6%9C%88%E6%AC%A1%20report.csv");
    }

    #[test]
    fn test_parse_error_body_auth_code() {
        let body = br#"<?xml version="1.0" encoding="UTF-8"?>
<Error><Code>InvalidAccessKeyId</Code><Message>The AWS access key ID you provided does not exist in our records.</Message></Error>"#;

        let (code, message) = parse_error_body(body);
        assert_eq!(code.as_deref(), Some("InvalidAccessKeyId"));
        assert!(message.contains("does not exist"));
        assert!(is_auth_error_code(code.as_deref().unwrap()));
    }

    #[test]
    fn test_parse_error_body_non_xml() {
        let (code, message) = parse_error_body(b"upstream connect error");
        assert_eq!(code, None);
        assert_eq!(message, "upstream connect error");
    }

    #[test]
    fn test_auth_error_codes() {
        assert!(is_auth_error_code("InvalidAccessKeyId"));
        assert!(is_auth_error_code("InvalidSecurity"));
        assert!(!is_auth_error_code("NoSuchKey"));
        assert!(!is_auth_error_code("PreconditionFailed"));
    }
}
