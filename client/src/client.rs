use crate::{Error, Result};
use std::time::Duration;
use url::Url;

/// Timeout applied to every request unless the caller picks another.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Blocking client for a single venue endpoint.
///
/// Requests never suspend cooperatively: each call either completes or fails (including by
/// timeout) before returning.
#[derive(Clone, Debug)]
pub struct Client {
    pub(crate) base_url: Url,
    pub(crate) http_client: reqwest::blocking::Client,
}

impl Client {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let base_url = Url::parse(base_url)?;
        match base_url.scheme() {
            "http" | "https" => {}
            scheme => return Err(Error::InvalidScheme(scheme.to_string())),
        }
        let http_client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()?;

        Ok(Self {
            base_url,
            http_client,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Appends `path` to the base URL as given, keeping any path prefix it already has.
    pub(crate) fn endpoint(&self, path: &str) -> String {
        format!("{}{path}", self.base_url.as_str().trim_end_matches('/'))
    }
}
