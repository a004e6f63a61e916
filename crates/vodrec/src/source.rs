// Byte source abstraction: how the pipeline gets bytes off the network.
//
// The trait seam keeps the pipeline and coordinator testable without a
// server; HttpSource is the production implementation.

use crate::config::{FetchConfig, HttpConfig};
use crate::error::RecoveryError;
use crate::retry::{RetryAction, is_retryable_reqwest_error, retry_with_backoff};
use async_trait::async_trait;
use bytes::Bytes;
use hls_manifest::ByteRange;
use reqwest::Client;
use tokio_util::sync::CancellationToken;
use tracing::trace;
use url::Url;

#[async_trait]
pub trait ByteSource: Send + Sync {
    /// Fetches one resource, optionally a byte range of it. Transient
    /// failures are retried internally; the returned error is final for
    /// this invocation.
    async fn fetch(
        &self,
        url: &Url,
        byte_range: Option<&ByteRange>,
    ) -> Result<Bytes, RecoveryError>;
}

pub struct HttpSource {
    client: Client,
    config: FetchConfig,
    token: CancellationToken,
}

impl HttpSource {
    pub fn new(client: Client, config: FetchConfig, token: CancellationToken) -> Self {
        Self {
            client,
            config,
            token,
        }
    }

    pub fn from_config(
        http: &HttpConfig,
        fetch: FetchConfig,
        token: CancellationToken,
    ) -> Result<Self, RecoveryError> {
        Ok(Self::new(crate::client::build_client(http)?, fetch, token))
    }

    async fn attempt(
        &self,
        url: &Url,
        byte_range: Option<&ByteRange>,
    ) -> RetryAction<Bytes> {
        let mut request = self.client.get(url.clone());
        if let Some(range) = byte_range {
            let end = range.offset + range.length.saturating_sub(1);
            request = request.header(
                reqwest::header::RANGE,
                format!("bytes={}-{end}", range.offset),
            );
        }

        let response = match request.send().await {
            Ok(response) => response,
            Err(e) if is_retryable_reqwest_error(&e) => {
                return RetryAction::Retry(RecoveryError::from(e));
            }
            Err(e) => return RetryAction::Fail(RecoveryError::from(e)),
        };

        let status = response.status();
        if !status.is_success() {
            let err = RecoveryError::http_status(status, url.as_str(), "fetch");
            return if err.is_retryable() {
                RetryAction::Retry(err)
            } else {
                RetryAction::Fail(err)
            };
        }

        match response.bytes().await {
            Ok(bytes) => {
                trace!(url = %url, size = bytes.len(), "fetched resource");
                RetryAction::Success(bytes)
            }
            Err(e) if is_retryable_reqwest_error(&e) => {
                RetryAction::Retry(RecoveryError::from(e))
            }
            Err(e) => RetryAction::Fail(RecoveryError::from(e)),
        }
    }
}

#[async_trait]
impl ByteSource for HttpSource {
    async fn fetch(
        &self,
        url: &Url,
        byte_range: Option<&ByteRange>,
    ) -> Result<Bytes, RecoveryError> {
        retry_with_backoff(&self.config.retry, &self.token, |_| {
            self.attempt(url, byte_range)
        })
        .await
    }
}
