use crate::{Client, Error, Result};
use serde::Deserialize;
use tracing::debug;

const NEXT_NONCE_PATH: &str = "/api/v1/nextNonce";

/// Response code the venue uses for success inside the JSON body.
const CODE_OK: i32 = 200;

#[derive(Debug, Deserialize)]
struct NextNonce {
    code: i32,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    nonce: Option<i64>,
}

impl Client {
    /// Fetch the next unused nonce for an account's API key.
    pub fn next_nonce(&self, account_index: i64, api_key_index: u8) -> Result<i64> {
        // Make request
        let response = self
            .http_client
            .get(self.endpoint(NEXT_NONCE_PATH))
            .query(&[
                ("account_index", account_index.to_string()),
                ("api_key_index", api_key_index.to_string()),
            ])
            .send()?;

        // Parse response
        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(Error::FailedWithBody { status, body });
        }
        let body: NextNonce = response.json()?;
        if body.code != CODE_OK {
            return Err(Error::Api {
                code: body.code,
                message: body.message.unwrap_or_default(),
            });
        }
        let nonce = body.nonce.ok_or(Error::UnexpectedResponse)?;
        debug!(account_index, api_key_index, nonce, "fetched next nonce");
        Ok(nonce)
    }
}
