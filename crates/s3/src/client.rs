//! S3 client implementation
//!
//! Wraps aws-sdk-s3 and implements the ObjectStore trait from bmu-core.
//! Containers map to buckets. Remote calls are retried on transient failures
//! according to the configured `RetryConfig`.

use std::path::Path;

use async_trait::async_trait;
use aws_sdk_s3::error::ProvideErrorMetadata;
use aws_smithy_runtime_api::client::orchestrator::HttpResponse;
use aws_smithy_runtime_api::client::result::SdkError;
use aws_smithy_types::byte_stream::ByteStream as SdkByteStream;
use bmu_core::{
    ByteStream, ContainerInfo, Error, Lookup, ObjectInfo, ObjectStore, Result, RetryConfig,
    StoreConfig, is_retryable_error, retry_with_backoff,
};
use jiff::Timestamp;

const BACKEND_NAME: &str = "s3";

const NOT_FOUND_CODES: [&str; 3] = ["NotFound", "NoSuchBucket", "NoSuchKey"];
const CONFLICT_CODES: [&str; 2] = ["BucketAlreadyOwnedByYou", "BucketAlreadyExists"];
const AUTH_CODES: [&str; 3] = ["AccessDenied", "InvalidAccessKeyId", "SignatureDoesNotMatch"];

/// Failure class of an S3 error response
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FailureKind {
    NotFound,
    Conflict,
    Auth,
    Other,
}

/// Classify from the S3 error code and HTTP status only
///
/// HEAD requests carry no error body, so their status is the only signal.
fn failure_kind(code: Option<&str>, status: Option<u16>) -> FailureKind {
    let has = |codes: &[&str]| code.is_some_and(|c| codes.contains(&c));

    if has(&NOT_FOUND_CODES) || status == Some(404) {
        FailureKind::NotFound
    } else if has(&CONFLICT_CODES) {
        FailureKind::Conflict
    } else if has(&AUTH_CODES) || matches!(status, Some(401 | 403)) {
        FailureKind::Auth
    } else {
        FailureKind::Other
    }
}

/// S3 client wrapper
pub struct S3Client {
    inner: aws_sdk_s3::Client,
    retry: RetryConfig,
}

impl S3Client {
    /// Create a new S3 client from validated store settings
    pub async fn new(store: &StoreConfig, retry: RetryConfig) -> Result<Self> {
        let required = |value: &Option<String>, name: &str| {
            value
                .clone()
                .filter(|v| !v.is_empty())
                .ok_or_else(|| Error::Config(format!("store.{name} is not configured")))
        };
        let endpoint = required(&store.endpoint, "endpoint")?;
        let region = required(&store.region, "region")?;
        let access_key = required(&store.access_key, "access_key")?;
        let secret_key = required(&store.secret_key, "secret_key")?;

        let credentials = aws_credential_types::Credentials::new(
            access_key,
            secret_key,
            None, // session token
            None, // expiry
            "bmu-static-credentials",
        );

        let config = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .credentials_provider(credentials)
            .region(aws_config::Region::new(region))
            .endpoint_url(&endpoint)
            .load()
            .await;

        // path-style addressing unless DNS lookup was asked for explicitly
        let s3_config = aws_sdk_s3::config::Builder::from(&config)
            .force_path_style(store.bucket_lookup != "dns")
            .build();

        tracing::debug!(endpoint = %endpoint, bucket_lookup = %store.bucket_lookup, "Created S3 client");

        Ok(Self {
            inner: aws_sdk_s3::Client::from_conf(s3_config),
            retry,
        })
    }

    /// Get the underlying aws-sdk-s3 client
    pub fn inner(&self) -> &aws_sdk_s3::Client {
        &self.inner
    }

    /// Format an SDK error into a detailed message
    fn format_sdk_error<E>(error: &SdkError<E, HttpResponse>) -> String
    where
        E: std::fmt::Display + ProvideErrorMetadata,
    {
        match error {
            SdkError::ServiceError(service_err) => {
                let err = service_err.err();
                let mut msg = format!("Service error: {err}");
                if let Some(code) = err.code() {
                    msg.push_str(&format!(" (code: {code})"));
                }
                let status = service_err.raw().status().as_u16();
                msg.push_str(&format!(" (status: {status})"));
                msg
            }
            SdkError::ConstructionFailure(err) => {
                format!("Request construction failed: {err:?}")
            }
            SdkError::TimeoutError(_) => "Request timeout".to_string(),
            SdkError::DispatchFailure(err) => format!("Network dispatch error: {err:?}"),
            SdkError::ResponseError(err) => format!("Response error: {err:?}"),
            _ => error.to_string(),
        }
    }

    /// Map an SDK error onto the workspace error type
    ///
    /// `what` names the container or object involved, for not-found and
    /// conflict messages.
    fn classify<E>(error: SdkError<E, HttpResponse>, what: &str) -> Error
    where
        E: std::fmt::Display + ProvideErrorMetadata,
    {
        let message = Self::format_sdk_error(&error);
        let status = match &error {
            SdkError::ServiceError(e) => Some(e.raw().status().as_u16()),
            _ => None,
        };

        match failure_kind(error.code(), status) {
            FailureKind::NotFound => Error::NotFound(what.to_string()),
            FailureKind::Conflict => Error::Conflict(format!("Bucket already exists: {what}")),
            FailureKind::Auth => Error::Auth(message),
            FailureKind::Other => Error::Network(message),
        }
    }

    async fn retry<T, F, Fut>(&self, label: &str, operation: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = Result<T>>,
    {
        retry_with_backoff(&self.retry, label, operation, is_retryable_error).await
    }
}

fn timestamp(dt: &aws_smithy_types::DateTime) -> Option<Timestamp> {
    Timestamp::from_second(dt.secs()).ok()
}

fn not_found_as_lookup<T>(result: Result<T>) -> Result<Lookup<T>> {
    match result {
        Ok(v) => Ok(Lookup::Found(v)),
        Err(Error::NotFound(_)) => Ok(Lookup::NotFound),
        Err(e) => Err(e),
    }
}

/// Turn an SDK body into a stream of workspace-typed chunks
fn into_stream(body: SdkByteStream) -> ByteStream {
    Box::pin(futures::stream::unfold(body, |mut body| async move {
        body.next()
            .await
            .map(|chunk| (chunk.map_err(|e| Error::Network(e.to_string())), body))
    }))
}

#[async_trait]
impl ObjectStore for S3Client {
    fn backend_name(&self) -> &'static str {
        BACKEND_NAME
    }

    async fn container_metadata(&self, container: &str) -> Result<Lookup<ContainerInfo>> {
        let result = self
            .retry("head_bucket", || async move {
                self.inner
                    .head_bucket()
                    .bucket(container)
                    .send()
                    .await
                    .map(|_| ContainerInfo::new(container))
                    .map_err(|e| Self::classify(e, container))
            })
            .await;
        not_found_as_lookup(result)
    }

    async fn object_metadata(&self, container: &str, name: &str) -> Result<Lookup<ObjectInfo>> {
        let what = format!("{container}/{name}");
        let what = what.as_str();
        let result = self
            .retry("head_object", || async move {
                let response = self
                    .inner
                    .head_object()
                    .bucket(container)
                    .key(name)
                    .send()
                    .await
                    .map_err(|e| Self::classify(e, what))?;

                let mut info = ObjectInfo::new(name);
                info.size_bytes = response.content_length();
                info.last_modified = response.last_modified().and_then(timestamp);
                Ok::<_, Error>(info)
            })
            .await;
        not_found_as_lookup(result)
    }

    async fn create_container(&self, container: &str) -> Result<()> {
        self.retry("create_bucket", || async move {
            self.inner
                .create_bucket()
                .bucket(container)
                .send()
                .await
                .map_err(|e| Self::classify(e, container))?;
            Ok::<_, Error>(())
        })
        .await
    }

    async fn delete_object(&self, container: &str, name: &str) -> Result<()> {
        // S3 deletes succeed silently for absent keys
        if let Lookup::NotFound = self.object_metadata(container, name).await? {
            return Err(Error::NotFound(format!("{container}/{name}")));
        }

        let what = format!("{container}/{name}");
        let what = what.as_str();
        self.retry("delete_object", || async move {
            self.inner
                .delete_object()
                .bucket(container)
                .key(name)
                .send()
                .await
                .map_err(|e| Self::classify(e, what))?;
            Ok::<_, Error>(())
        })
        .await
    }

    async fn upload_object(&self, container: &str, name: &str, source: &Path) -> Result<()> {
        let content_type = mime_guess::from_path(source)
            .first_or_octet_stream()
            .to_string();
        let content_type = content_type.as_str();
        let what = format!("{container}/{name}");
        let what = what.as_str();

        self.retry("put_object", || async move {
            let body = SdkByteStream::from_path(source)
                .await
                .map_err(|e| Error::Io(std::io::Error::other(e)))?;
            self.inner
                .put_object()
                .bucket(container)
                .key(name)
                .content_type(content_type)
                .body(body)
                .send()
                .await
                .map_err(|e| Self::classify(e, what))?;
            Ok::<_, Error>(())
        })
        .await
    }

    async fn download_object(&self, container: &str, name: &str) -> Result<ByteStream> {
        let what = format!("{container}/{name}");
        let what = what.as_str();
        let response = self
            .retry("get_object", || async move {
                self.inner
                    .get_object()
                    .bucket(container)
                    .key(name)
                    .send()
                    .await
                    .map_err(|e| Self::classify(e, what))
            })
            .await?;

        Ok(into_stream(response.body))
    }

    async fn list_objects(&self, container: &str) -> Result<Vec<ObjectInfo>> {
        let mut objects = Vec::new();
        let mut continuation_token: Option<String> = None;

        loop {
            let token = continuation_token.as_deref();
            let response = self
                .retry("list_objects_v2", || async move {
                    self.inner
                        .list_objects_v2()
                        .bucket(container)
                        .set_continuation_token(token.map(str::to_string))
                        .send()
                        .await
                        .map_err(|e| Self::classify(e, container))
                })
                .await?;

            for object in response.contents() {
                let mut info = ObjectInfo::new(object.key().unwrap_or_default());
                info.size_bytes = object.size();
                info.last_modified = object.last_modified().and_then(timestamp);
                objects.push(info);
            }

            match response.next_continuation_token() {
                Some(next) if response.is_truncated().unwrap_or(false) => {
                    continuation_token = Some(next.to_string());
                }
                _ => break,
            }
        }

        tracing::debug!(container, count = objects.len(), "Listed objects");
        Ok(objects)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_as_lookup() {
        let found = not_found_as_lookup(Ok(ContainerInfo::new("b"))).unwrap();
        assert!(found.is_found());

        let missing: Lookup<ContainerInfo> =
            not_found_as_lookup(Err(Error::NotFound("b".into()))).unwrap();
        assert_eq!(missing, Lookup::NotFound);

        let err = not_found_as_lookup::<ContainerInfo>(Err(Error::Network("timeout".into())));
        assert!(matches!(err, Err(Error::Network(_))));
    }

    #[test]
    fn test_failure_kind_uses_code_and_status() {
        assert_eq!(failure_kind(Some("NoSuchKey"), Some(404)), FailureKind::NotFound);
        assert_eq!(failure_kind(None, Some(404)), FailureKind::NotFound);
        assert_eq!(
            failure_kind(Some("BucketAlreadyOwnedByYou"), Some(409)),
            FailureKind::Conflict
        );
        assert_eq!(failure_kind(Some("AccessDenied"), Some(403)), FailureKind::Auth);
        assert_eq!(failure_kind(None, Some(403)), FailureKind::Auth);
        assert_eq!(failure_kind(Some("InternalError"), Some(500)), FailureKind::Other);
        assert_eq!(failure_kind(None, None), FailureKind::Other);
    }

    #[tokio::test]
    async fn test_backend_name() {
        let store = StoreConfig {
            endpoint: Some("http://localhost:9000".into()),
            region: Some("us-east-1".into()),
            access_key: Some("access".into()),
            secret_key: Some("secret".into()),
            ..Default::default()
        };
        let client = S3Client::new(&store, RetryConfig::default()).await.unwrap();
        assert_eq!(client.backend_name(), "s3");
    }

    #[test]
    fn test_timestamp_conversion() {
        let dt = aws_smithy_types::DateTime::from_secs(1_714_557_600);
        let ts = timestamp(&dt).unwrap();
        assert_eq!(ts.to_string(), "2024-05-01T10:00:00Z");
    }

    #[tokio::test]
    async fn test_missing_credentials_rejected() {
        let store = StoreConfig {
            endpoint: Some("http://localhost:9000".into()),
            region: Some("us-east-1".into()),
            access_key: None,
            secret_key: Some("secret".into()),
            ..Default::default()
        };
        let err = S3Client::new(&store, RetryConfig::default())
            .await
            .err()
            .unwrap();
        assert!(matches!(err, Error::Config(ref m) if m.contains("access_key")));
    }

    #[tokio::test]
    async fn test_body_stream_yields_chunks() {
        use futures::TryStreamExt;

        let stream = into_stream(SdkByteStream::from_static(b"archive"));
        let chunks: Vec<bytes::Bytes> = stream.try_collect().await.unwrap();
        assert_eq!(chunks.concat(), b"archive");
    }
}
