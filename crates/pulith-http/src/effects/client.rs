use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::warn;

use crate::data::{ClientConfig, ReadOptions, RequestOptions, RequestSpec, ShortcutOptions};
use crate::error::Result;

use super::transport::{Response, ResponseHead, Transport};
use super::reader::{Content, read};
use super::redirect::follow_redirects;

const DETACHED_DRAIN: Duration = Duration::from_secs(1);

/// HTTP client over a [`Transport`] with configured defaults.
///
/// Cloning is cheap and clones share the transport.
pub struct Client<T> {
    transport: Arc<T>,
    config: Arc<ClientConfig>,
}

impl<T> Clone for Client<T> {
    fn clone(&self) -> Self {
        Self {
            transport: Arc::clone(&self.transport),
            config: Arc::clone(&self.config),
        }
    }
}

impl<T: Transport> Client<T> {
    pub fn new(transport: T) -> Self {
        Self::with_config(transport, ClientConfig::default())
    }

    pub fn with_config(transport: T, config: ClientConfig) -> Self {
        Self {
            transport: Arc::new(transport),
            config: Arc::new(config),
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Send a request and follow redirects up to the configured budget.
    ///
    /// The returned response has an unread body.
    pub async fn request(
        &self,
        method: &str,
        url: &str,
        options: RequestOptions,
    ) -> Result<Response> {
        let spec = RequestSpec::new(method, url, options, &self.config)?;
        follow_redirects(self.transport.as_ref(), spec).await
    }

    /// Send a request without waiting for it.
    ///
    /// Failures are logged. A successful response body is discarded.
    pub fn request_detached(
        &self,
        method: &str,
        url: &str,
        options: RequestOptions,
    ) -> JoinHandle<()>
    where
        T: 'static,
    {
        let client = self.clone();
        let method = method.to_owned();
        let url = url.to_owned();
        tokio::spawn(async move {
            match client.request(&method, &url, options).await {
                Ok(response) => response.into_body().discard(DETACHED_DRAIN).await,
                Err(e) => warn!(%method, %url, error = %e, "detached request failed"),
            }
        })
    }

    /// Read a response body, filling unset limits from the client config.
    pub async fn read(&self, response: Response, options: &ReadOptions) -> Result<Content> {
        read(response, &options.or_config(&self.config)).await
    }

    pub async fn get(
        &self,
        url: &str,
        options: impl Into<ShortcutOptions>,
    ) -> Result<(ResponseHead, Content)> {
        self.shortcut("GET", url, options.into()).await
    }

    pub async fn post(
        &self,
        url: &str,
        options: impl Into<ShortcutOptions>,
    ) -> Result<(ResponseHead, Content)> {
        self.shortcut("POST", url, options.into()).await
    }

    pub async fn put(
        &self,
        url: &str,
        options: impl Into<ShortcutOptions>,
    ) -> Result<(ResponseHead, Content)> {
        self.shortcut("PUT", url, options.into()).await
    }

    pub async fn patch(
        &self,
        url: &str,
        options: impl Into<ShortcutOptions>,
    ) -> Result<(ResponseHead, Content)> {
        self.shortcut("PATCH", url, options.into()).await
    }

    pub async fn delete(
        &self,
        url: &str,
        options: impl Into<ShortcutOptions>,
    ) -> Result<(ResponseHead, Content)> {
        self.shortcut("DELETE", url, options.into()).await
    }

    async fn shortcut(
        &self,
        method: &str,
        url: &str,
        options: ShortcutOptions,
    ) -> Result<(ResponseHead, Content)> {
        let response = self.request(method, url, options.request).await?;
        let head = response.head().clone();
        let content = self.read(response, &options.read).await?;
        Ok((head, content))
    }
}

#[cfg(feature = "reqwest")]
impl Client<super::transport::ReqwestTransport> {
    /// A client over reqwest with default configuration.
    pub fn reqwest() -> Result<Self> {
        Self::from_config(ClientConfig::default())
    }

    pub fn from_config(config: ClientConfig) -> Result<Self> {
        Ok(Self::with_config(super::transport::ReqwestTransport::new()?, config))
    }
}
