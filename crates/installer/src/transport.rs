//! HTTP seam.
//!
//! The installer only ever issues GETs. [`ReqwestTransport`] is the real
//! implementation; tests substitute an in-memory one.

use std::io::Read;
use std::time::Duration;

use tracing::debug;
use vl_common::InstallerConfig;

use crate::error::InstallError;

const USER_AGENT: &str = concat!("Vellum/", env!("CARGO_PKG_VERSION"));

/// A response whose body has not been read yet.
pub struct HttpResponse {
    pub status: u16,
    pub content_length: Option<u64>,
    pub body: Box<dyn Read + Send>,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Read the whole body as UTF-8 text.
    pub fn into_text(mut self, url: &str) -> Result<String, InstallError> {
        let mut text = String::new();
        self.body
            .read_to_string(&mut text)
            .map_err(|e| InstallError::Transport {
                url: url.to_string(),
                reason: e.to_string(),
            })?;
        Ok(text)
    }
}

impl std::fmt::Debug for HttpResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpResponse")
            .field("status", &self.status)
            .field("content_length", &self.content_length)
            .finish_non_exhaustive()
    }
}

pub trait Transport: Send + Sync {
    /// GET `url`, with `Authorization: Bearer` when a token is given.
    ///
    /// Non-2xx statuses are returned, not turned into errors; only
    /// connection-level failures are `Err`.
    fn get(&self, url: &str, bearer: Option<&str>) -> Result<HttpResponse, InstallError>;
}

/// Blocking reqwest client with a bounded timeout and redirect count.
pub struct ReqwestTransport {
    client: reqwest::blocking::Client,
}

impl ReqwestTransport {
    pub fn new(timeout: Duration, max_redirects: usize) -> Result<Self, InstallError> {
        let client = reqwest::blocking::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .redirect(reqwest::redirect::Policy::limited(max_redirects))
            .build()
            .map_err(|e| InstallError::Transport {
                url: String::new(),
                reason: e.to_string(),
            })?;
        Ok(Self { client })
    }

    pub fn from_config(config: &InstallerConfig) -> Result<Self, InstallError> {
        Self::new(config.http_timeout(), config.max_redirects)
    }
}

impl Transport for ReqwestTransport {
    fn get(&self, url: &str, bearer: Option<&str>) -> Result<HttpResponse, InstallError> {
        debug!(url = %url, authorized = bearer.is_some(), "GET");

        let mut request = self.client.get(url);
        if let Some(token) = bearer {
            request = request.bearer_auth(token);
        }
        let response = request.send().map_err(|e| InstallError::Transport {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

        Ok(HttpResponse {
            status: response.status().as_u16(),
            content_length: response.content_length(),
            body: Box::new(response),
        })
    }
}
