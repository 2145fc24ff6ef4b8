//! Pinata-backed [`ContentPinner`].
//!
//! Uploads go to `pinFileToIPFS` as multipart form data. API key + secret is
//! preferred; a JWT is accepted when no key pair is configured.

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, Request, StatusCode};
use serde::Deserialize;
use sober_journey_sdk::core::pinning::ContentPinner;
use std::env;
use std::error::Error;
use std::path::Path;
use thiserror::Error;
use tracing::{debug, info};

pub const PINATA_API_URL: &str = "https://api.pinata.cloud";
const PIN_FILE_PATH: &str = "/pinning/pinFileToIPFS";

#[derive(Error, Debug)]
pub enum PinataError {
    #[error("Missing Pinata credentials. Provide either (API Key + Secret Key) or JWT")]
    MissingCredentials,

    #[error("Pinata upload failed: {status} {body}")]
    Upload { status: StatusCode, body: String },

    #[error("Pinata response has no IpfsHash")]
    MissingHash,

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

#[derive(Clone, PartialEq, Eq)]
pub enum PinataCredentials {
    ApiKey { key: String, secret: String },
    Jwt(String),
}

impl std::fmt::Debug for PinataCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PinataCredentials::ApiKey { .. } => f.write_str("ApiKey(..)"),
            PinataCredentials::Jwt(_) => f.write_str("Jwt(..)"),
        }
    }
}

impl PinataCredentials {
    /// Pick a credential: the key pair if both halves are present, else the JWT.
    /// Blank values count as absent.
    pub fn select(
        api_key: Option<&str>,
        secret: Option<&str>,
        jwt: Option<&str>,
    ) -> Result<Self, PinataError> {
        let present = |v: Option<&str>| v.map(str::trim).filter(|v| !v.is_empty()).map(String::from);

        if let (Some(key), Some(secret)) = (present(api_key), present(secret)) {
            return Ok(PinataCredentials::ApiKey { key, secret });
        }
        present(jwt)
            .map(PinataCredentials::Jwt)
            .ok_or(PinataError::MissingCredentials)
    }

    /// `PINATA_API_KEY` + `PINATA_SECRET_KEY`, or `PINATA_JWT`
    pub fn from_env() -> Result<Self, PinataError> {
        if Path::new(".env").exists() {
            dotenvy::dotenv().ok();
        }
        let api_key = env::var("PINATA_API_KEY").ok();
        let secret = env::var("PINATA_SECRET_KEY").ok();
        let jwt = env::var("PINATA_JWT").ok();
        Self::select(api_key.as_deref(), secret.as_deref(), jwt.as_deref())
    }
}

#[derive(Debug, Deserialize)]
struct PinResponse {
    #[serde(rename = "IpfsHash")]
    ipfs_hash: Option<String>,
}

#[derive(Debug, Clone)]
pub struct PinataClient {
    http: Client,
    base_url: String,
    credentials: PinataCredentials,
}

impl PinataClient {
    pub fn new(credentials: PinataCredentials) -> Self {
        Self {
            http: Client::new(),
            base_url: PINATA_API_URL.to_string(),
            credentials,
        }
    }

    pub fn from_env() -> Result<Self, PinataError> {
        Ok(Self::new(PinataCredentials::from_env()?))
    }

    /// Point at a gateway other than api.pinata.cloud
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    fn upload_request(&self, file_name: &str, content: Vec<u8>) -> Result<Request, PinataError> {
        let form = Form::new().part("file", Part::bytes(content).file_name(file_name.to_string()));
        let builder = self
            .http
            .post(format!("{}{}", self.base_url, PIN_FILE_PATH))
            .multipart(form);
        let builder = match &self.credentials {
            PinataCredentials::ApiKey { key, secret } => builder
                .header("pinata_api_key", key)
                .header("pinata_secret_api_key", secret),
            PinataCredentials::Jwt(token) => builder.bearer_auth(token),
        };
        Ok(builder.build()?)
    }

    /// Upload one file and return its CID.
    pub async fn pin_file_to_ipfs(&self, file_name: &str, content: Vec<u8>) -> Result<String, PinataError> {
        let size = content.len();
        let request = self.upload_request(file_name, content)?;
        debug!(file_name, size, "Pinning file");

        let response = self.http.execute(request).await?;
        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(PinataError::Upload {
                status,
                body: describe_error_body(&text),
            });
        }

        let cid = response
            .json::<PinResponse>()
            .await?
            .ipfs_hash
            .filter(|h| !h.is_empty())
            .ok_or(PinataError::MissingHash)?;
        info!(file_name, %cid, "Pinned file");
        Ok(cid)
    }
}

/// Pretty-print JSON error bodies, pass anything else through
fn describe_error_body(text: &str) -> String {
    serde_json::from_str::<serde_json::Value>(text)
        .ok()
        .and_then(|json| serde_json::to_string_pretty(&json).ok())
        .unwrap_or_else(|| text.to_string())
}

#[async_trait]
impl ContentPinner for PinataClient {
    async fn pin_file(
        &self,
        file_name: &str,
        content: Vec<u8>,
    ) -> Result<String, Box<dyn Error + Send + Sync>> {
        Ok(self.pin_file_to_ipfs(file_name, content).await?)
    }
}
