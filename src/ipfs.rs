//! IPFS pinning (Pinata) and token metadata retrieval.
//!
//! Two pinning endpoints are consumed, pin-file and pin-JSON, both
//! authenticated with API-key/secret headers. Responses carry the content
//! hash used to build `ipfs://<hash>` URIs and gateway URLs. No gateway
//! failover and no automatic retries: a failed pin or fetch surfaces with
//! the underlying reason.

use crate::config::ConfigStore;
use crate::error::Error;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

const PIN_FILE_ENDPOINT: &str = "https://api.pinata.cloud/pinning/pinFileToIPFS";
const PIN_JSON_ENDPOINT: &str = "https://api.pinata.cloud/pinning/pinJSONToIPFS";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// A pinned piece of content.
#[derive(Debug, Clone)]
pub struct PinResult {
    pub hash: String,
    /// `ipfs://<hash>` form, what goes on chain.
    pub uri: String,
    /// Gateway URL for direct retrieval.
    pub url: String,
}

/// Standard token metadata document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenMetadata {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub image: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external_url: Option<String>,
    #[serde(default)]
    pub attributes: Vec<Attribute>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Attribute {
    pub trait_type: String,
    pub value: serde_json::Value,
}

/// Pinning + metadata-fetch seam. The facade and mint service depend on
/// this rather than on the concrete HTTP client.
#[async_trait]
pub trait IpfsApi: Send + Sync {
    async fn pin_file(
        &self,
        name: &str,
        content_type: &str,
        bytes: Vec<u8>,
    ) -> Result<PinResult, Error>;
    async fn pin_json(&self, name: &str, content: &serde_json::Value) -> Result<PinResult, Error>;
    async fn fetch_metadata(&self, token_uri: &str) -> Result<TokenMetadata, Error>;
}

#[derive(Deserialize)]
struct PinataResponse {
    #[serde(rename = "IpfsHash")]
    ipfs_hash: String,
}

pub struct IpfsClient {
    store: Arc<ConfigStore>,
    http: reqwest::Client,
}

impl IpfsClient {
    pub fn new(store: Arc<ConfigStore>) -> Result<Self, Error> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .connect_timeout(CONNECT_TIMEOUT)
            .build()
            .map_err(|e| Error::Ipfs(format!("HTTP client build failed: {e}")))?;
        Ok(Self { store, http })
    }

    /// Build the `ipfs://` URI for a content hash.
    pub fn ipfs_uri(hash: &str) -> String {
        format!("ipfs://{hash}")
    }

    /// Resolve a token URI to a fetchable URL, routing `ipfs://` through
    /// the configured gateway.
    pub async fn resolve_uri(&self, uri: &str) -> String {
        match uri.strip_prefix("ipfs://") {
            Some(hash) => format!("{}{hash}", self.store.ipfs_gateway().await),
            None => uri.to_string(),
        }
    }

    async fn credentials(&self) -> Result<crate::config::PinataConfig, Error> {
        let pinata = self
            .store
            .pinata()
            .await
            .map_err(|e| Error::Ipfs(format!("pinning unavailable: {e}")))?;
        if !pinata.is_configured() {
            return Err(Error::Ipfs(
                "Pinata credentials missing, add an ipfs.pinata section to the deploy artifact"
                    .into(),
            ));
        }
        Ok(pinata)
    }

    async fn pin_result(&self, hash: String) -> PinResult {
        let url = format!("{}{hash}", self.store.ipfs_gateway().await);
        PinResult {
            uri: Self::ipfs_uri(&hash),
            hash,
            url,
        }
    }
}

#[async_trait]
impl IpfsApi for IpfsClient {
    async fn pin_file(
        &self,
        name: &str,
        content_type: &str,
        bytes: Vec<u8>,
    ) -> Result<PinResult, Error> {
        let pinata = self.credentials().await?;

        let metadata = serde_json::json!({ "name": name });
        let options = serde_json::json!({ "cidVersion": 0, "groupId": pinata.group_id });
        let part = reqwest::multipart::Part::bytes(bytes)
            .file_name(name.to_string())
            .mime_str(content_type)
            .map_err(|e| Error::Ipfs(format!("bad content type {content_type}: {e}")))?;
        let form = reqwest::multipart::Form::new()
            .part("file", part)
            .text("pinataMetadata", metadata.to_string())
            .text("pinataOptions", options.to_string());

        let resp = self
            .http
            .post(PIN_FILE_ENDPOINT)
            .header("pinata_api_key", &pinata.api_key)
            .header("pinata_secret_api_key", &pinata.secret_key)
            .multipart(form)
            .send()
            .await
            .map_err(|e| Error::Ipfs(format!("pin file failed: {e}")))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(Error::Ipfs(format!("pin file rejected ({status}): {body}")));
        }
        let parsed: PinataResponse = resp
            .json()
            .await
            .map_err(|e| Error::Ipfs(format!("pin file response malformed: {e}")))?;
        info!(hash = %parsed.ipfs_hash, name, "File pinned");
        Ok(self.pin_result(parsed.ipfs_hash).await)
    }

    async fn pin_json(&self, name: &str, content: &serde_json::Value) -> Result<PinResult, Error> {
        let pinata = self.credentials().await?;

        let body = serde_json::json!({
            "pinataContent": content,
            "pinataMetadata": { "name": name },
            "pinataOptions": { "groupId": pinata.group_id }
        });

        let resp = self
            .http
            .post(PIN_JSON_ENDPOINT)
            .header("pinata_api_key", &pinata.api_key)
            .header("pinata_secret_api_key", &pinata.secret_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| Error::Ipfs(format!("pin JSON failed: {e}")))?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(Error::Ipfs(format!("pin JSON rejected ({status}): {text}")));
        }
        let parsed: PinataResponse = resp
            .json()
            .await
            .map_err(|e| Error::Ipfs(format!("pin JSON response malformed: {e}")))?;
        info!(hash = %parsed.ipfs_hash, name, "Metadata pinned");
        Ok(self.pin_result(parsed.ipfs_hash).await)
    }

    async fn fetch_metadata(&self, token_uri: &str) -> Result<TokenMetadata, Error> {
        let url = self.resolve_uri(token_uri).await;
        let resp = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| Error::Ipfs(format!("metadata fetch {url} failed: {e}")))?;
        if !resp.status().is_success() {
            return Err(Error::Ipfs(format!(
                "metadata fetch {url} returned {}",
                resp.status()
            )));
        }
        resp.json()
            .await
            .map_err(|e| Error::Ipfs(format!("metadata at {url} malformed: {e}")))
    }
}
