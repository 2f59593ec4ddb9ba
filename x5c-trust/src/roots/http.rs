use std::time::Duration;

use async_trait::async_trait;
use reqwest::Url;

use super::{RootCertificateSource, RootSet};
use crate::certificate::EncodedCertificate;
use crate::context::FetchContext;
use crate::error::{TrustError, TrustResult};

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Root source that downloads every configured URL on each fetch.
///
/// Nothing is cached: roots rotated upstream are picked up by the next
/// fetch. Retries are left to the caller.
#[derive(Debug, Clone)]
pub struct HttpRootSource {
    client: reqwest::Client,
    urls: Vec<Url>,
}

impl HttpRootSource {
    /// Create a source using a default client with a 30 second timeout.
    ///
    /// # Errors
    ///
    /// Returns [`TrustError::Configuration`] when no URL is given or a URL
    /// does not parse.
    pub fn new<I, S>(urls: I) -> TrustResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self::with_client(None, urls)
    }

    /// Create a source with a caller-supplied client; `None` uses the default.
    pub fn with_client<I, S>(client: Option<reqwest::Client>, urls: I) -> TrustResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let urls = urls
            .into_iter()
            .map(|url| {
                Url::parse(url.as_ref()).map_err(|e| {
                    TrustError::Configuration(format!("Invalid Root CA url {}: {}", url.as_ref(), e))
                })
            })
            .collect::<TrustResult<Vec<_>>>()?;
        if urls.is_empty() {
            return Err(TrustError::Configuration(
                "At least one Root CA url must be set".to_string(),
            ));
        }

        let client = client.unwrap_or_else(|| {
            reqwest::Client::builder()
                .timeout(DEFAULT_TIMEOUT)
                .build()
                .unwrap_or_default()
        });

        Ok(Self { client, urls })
    }

    pub fn urls(&self) -> &[Url] {
        &self.urls
    }

    async fn get(&self, url: &Url) -> Result<Vec<u8>, String> {
        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| format!("url: {}, request error: {}", url, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(format!("url: {}, code: {}", url, status.as_u16()));
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| format!("url: {}, body error: {}", url, e))?;
        Ok(body.to_vec())
    }
}

#[async_trait]
impl RootCertificateSource for HttpRootSource {
    async fn fetch(&self, ctx: &FetchContext) -> TrustResult<RootSet> {
        let mut collected = Vec::with_capacity(self.urls.len());
        for url in &self.urls {
            tracing::debug!(url = %url, "Fetching Root CA certificate");
            let body = match ctx.run(self.get(url)).await {
                Ok(Ok(body)) => body,
                Ok(Err(reason)) => {
                    tracing::warn!(url = %url, error = %reason, "Root CA fetch failed");
                    return Err(TrustError::SourceFetchFailed { reason, collected });
                }
                Err(reason) => {
                    tracing::warn!(url = %url, reason = %reason, "Root CA fetch aborted");
                    return Err(TrustError::CancellationFailed { reason, collected });
                }
            };
            let root = EncodedCertificate::from_der_or_pem(&body).map_err(|e| {
                TrustError::SourceFetchFailed {
                    reason: format!("url: {}, invalid PEM body: {}", url, e),
                    collected: collected.clone(),
                }
            })?;
            collected.push(root);
        }
        Ok(collected.into())
    }

    fn name(&self) -> &'static str {
        "http"
    }
}
