//! Deploy-artifact configuration: loading, caching, typed accessors.
//!
//! The deployment step writes a single JSON document (network, contract
//! addresses, IPFS credentials, market parameters). [`ConfigStore`] fetches
//! it exactly once per load cycle, caches the parsed document, and serves
//! typed projections over it. Concurrent loaders converge on one outbound
//! fetch. Market parameters and the IPFS gateway have hardcoded fallbacks;
//! network and contract addresses do not and propagate failure.

use crate::error::Error;
use async_trait::async_trait;
use serde::Deserialize;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};
use tracing::{info, warn};

/// Gateway used when the document omits `ipfs.gateway`.
pub const DEFAULT_IPFS_GATEWAY: &str = "https://gateway.pinata.cloud/ipfs/";

/// Native currency of the target network.
#[derive(Debug, Clone, Deserialize)]
pub struct NativeCurrency {
    pub name: String,
    pub symbol: String,
    pub decimals: u8,
}

/// Target network section. Required; no fallback.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkConfig {
    pub chain_id: u64,
    pub chain_id_hex: String,
    pub name: String,
    pub native_currency: NativeCurrency,
    pub rpc_urls: Vec<String>,
    pub block_explorer_urls: Vec<String>,
}

/// NFT contract deployment info. Required; no fallback.
#[derive(Debug, Clone, Deserialize)]
pub struct NftContractConfig {
    pub address: String,
    pub name: String,
    pub symbol: String,
}

/// Market contract deployment info. Required; no fallback.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarketContractConfig {
    pub address: String,
    /// Deploy-formatted fee text; authoritative fee math uses
    /// [`MarketParams::platform_fee_percentage`].
    #[serde(default)]
    pub platform_fee: String,
    #[serde(default)]
    pub fee_recipient: String,
}

impl MarketContractConfig {
    /// Platform fee as a percentage number, when the deploy wrote one.
    pub fn platform_fee_percent(&self) -> Option<f64> {
        self.platform_fee.trim().parse().ok()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ContractsConfig {
    pub nft: NftContractConfig,
    pub market: MarketContractConfig,
}

/// Pinata API credentials. Absent credentials disable pinning.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PinataConfig {
    #[serde(default)]
    pub api_key: String,
    #[serde(default)]
    pub secret_key: String,
    #[serde(default)]
    pub group_id: String,
}

impl PinataConfig {
    pub fn is_configured(&self) -> bool {
        !self.api_key.is_empty() && !self.secret_key.is_empty()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct IpfsConfig {
    #[serde(default = "defaults::gateway")]
    pub gateway: String,
    #[serde(default)]
    pub pinata: PinataConfig,
}

impl Default for IpfsConfig {
    fn default() -> Self {
        Self {
            gateway: defaults::gateway(),
            pinata: PinataConfig::default(),
        }
    }
}

/// File constraints for mint uploads.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NftSettings {
    #[serde(default = "defaults::supported_types")]
    pub supported_types: Vec<String>,
    #[serde(default = "defaults::max_file_size")]
    pub max_file_size: u64,
}

impl Default for NftSettings {
    fn default() -> Self {
        Self {
            supported_types: defaults::supported_types(),
            max_file_size: defaults::max_file_size(),
        }
    }
}

/// Marketplace parameters. Every field has a hardcoded fallback.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarketParams {
    /// Platform fee as a fraction (0.025 = 2.5%).
    #[serde(default = "defaults::platform_fee_percentage")]
    pub platform_fee_percentage: f64,
    /// Lowest listable price, in ETH.
    #[serde(default = "defaults::min_price")]
    pub min_price: f64,
    /// Highest listable price, in ETH.
    #[serde(default = "defaults::max_price")]
    pub max_price: f64,
    #[serde(default = "defaults::listing_duration")]
    pub listing_duration: u64,
    #[serde(default = "defaults::max_listings_per_user")]
    pub max_listings_per_user: u32,
}

impl Default for MarketParams {
    fn default() -> Self {
        Self {
            platform_fee_percentage: defaults::platform_fee_percentage(),
            min_price: defaults::min_price(),
            max_price: defaults::max_price(),
            listing_duration: defaults::listing_duration(),
            max_listings_per_user: defaults::max_listings_per_user(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct DeployerInfo {
    pub address: String,
    #[serde(default)]
    pub balance: String,
}

/// The full deploy artifact. Immutable once loaded.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub network: NetworkConfig,
    pub contracts: ContractsConfig,
    #[serde(default)]
    pub ipfs: IpfsConfig,
    #[serde(default)]
    pub nft: NftSettings,
    #[serde(default)]
    pub market: MarketParams,
    #[serde(default)]
    pub deployer: Option<DeployerInfo>,
}

mod defaults {
    pub fn gateway() -> String {
        super::DEFAULT_IPFS_GATEWAY.to_string()
    }

    pub fn supported_types() -> Vec<String> {
        [
            "image/jpeg",
            "image/png",
            "image/gif",
            "image/webp",
            "image/svg+xml",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect()
    }

    pub fn max_file_size() -> u64 {
        10 * 1024 * 1024
    }

    pub fn platform_fee_percentage() -> f64 {
        0.025
    }

    pub fn min_price() -> f64 {
        0.001
    }

    pub fn max_price() -> f64 {
        1000.0
    }

    pub fn listing_duration() -> u64 {
        2_592_000
    }

    pub fn max_listings_per_user() -> u32 {
        100
    }
}

/// Where the artifact comes from. One outbound fetch per load cycle.
#[async_trait]
pub trait ConfigSource: Send + Sync {
    async fn fetch(&self) -> Result<String, Error>;
}

/// Fetches the artifact over HTTP(S).
pub struct HttpSource {
    url: String,
    http: reqwest::Client,
}

impl HttpSource {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, Error> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| Error::ConfigUnavailable(format!("HTTP client build failed: {e}")))?;
        Ok(Self {
            url: url.into(),
            http,
        })
    }
}

#[async_trait]
impl ConfigSource for HttpSource {
    async fn fetch(&self) -> Result<String, Error> {
        let resp = self
            .http
            .get(&self.url)
            .send()
            .await
            .map_err(|e| Error::ConfigUnavailable(format!("fetch {} failed: {e}", self.url)))?;
        if !resp.status().is_success() {
            return Err(Error::ConfigUnavailable(format!(
                "fetch {} returned {}",
                self.url,
                resp.status()
            )));
        }
        resp.text()
            .await
            .map_err(|e| Error::ConfigUnavailable(format!("reading config body failed: {e}")))
    }
}

/// Reads the artifact from disk (local runs and tests).
pub struct FileSource {
    path: PathBuf,
}

impl FileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl ConfigSource for FileSource {
    async fn fetch(&self) -> Result<String, Error> {
        tokio::fs::read_to_string(&self.path).await.map_err(|e| {
            Error::ConfigUnavailable(format!("read {} failed: {e}", self.path.display()))
        })
    }
}

/// Loads and caches the deploy artifact exactly once per load cycle.
pub struct ConfigStore {
    source: Box<dyn ConfigSource>,
    loaded: RwLock<Option<Arc<Config>>>,
    load_lock: Mutex<()>,
}

impl ConfigStore {
    pub fn new(source: impl ConfigSource + 'static) -> Self {
        Self {
            source: Box::new(source),
            loaded: RwLock::new(None),
            load_lock: Mutex::new(()),
        }
    }

    pub fn from_boxed(source: Box<dyn ConfigSource>) -> Self {
        Self {
            source,
            loaded: RwLock::new(None),
            load_lock: Mutex::new(()),
        }
    }

    /// Load the document. Idempotent: a call while another load is in
    /// flight waits for it and shares its result rather than issuing a
    /// second fetch.
    pub async fn load(&self) -> Result<Arc<Config>, Error> {
        if let Some(cfg) = self.loaded.read().await.as_ref() {
            return Ok(Arc::clone(cfg));
        }
        let _guard = self.load_lock.lock().await;
        // Another loader may have finished while we waited for the lock.
        if let Some(cfg) = self.loaded.read().await.as_ref() {
            return Ok(Arc::clone(cfg));
        }
        let raw = self.source.fetch().await?;
        let cfg: Config = serde_json::from_str(&raw)
            .map_err(|e| Error::ConfigUnavailable(format!("invalid config document: {e}")))?;
        let cfg = Arc::new(cfg);
        *self.loaded.write().await = Some(Arc::clone(&cfg));
        info!(
            network = %cfg.network.name,
            chain_id = cfg.network.chain_id,
            nft = %cfg.contracts.nft.address,
            market = %cfg.contracts.market.address,
            "Configuration loaded"
        );
        Ok(cfg)
    }

    /// Fails with `ConfigUnavailable` if the document is still absent
    /// after attempting a load.
    pub async fn ensure_loaded(&self) -> Result<Arc<Config>, Error> {
        self.load().await
    }

    /// Clear cached state and re-trigger a load.
    pub async fn reload(&self) -> Result<Arc<Config>, Error> {
        {
            let _guard = self.load_lock.lock().await;
            *self.loaded.write().await = None;
        }
        self.load().await
    }

    pub async fn is_loaded(&self) -> bool {
        self.loaded.read().await.is_some()
    }

    // --- Accessors: pure projections over the loaded document ---

    pub async fn network(&self) -> Result<NetworkConfig, Error> {
        Ok(self.ensure_loaded().await?.network.clone())
    }

    pub async fn chain_id(&self) -> Result<u64, Error> {
        Ok(self.ensure_loaded().await?.network.chain_id)
    }

    pub async fn nft_contract(&self) -> Result<NftContractConfig, Error> {
        Ok(self.ensure_loaded().await?.contracts.nft.clone())
    }

    pub async fn market_contract(&self) -> Result<MarketContractConfig, Error> {
        Ok(self.ensure_loaded().await?.contracts.market.clone())
    }

    /// Market parameters. Documented fallback: when the document cannot be
    /// loaded at all, the hardcoded defaults are served instead of failing.
    pub async fn market_params(&self) -> MarketParams {
        match self.ensure_loaded().await {
            Ok(cfg) => cfg.market.clone(),
            Err(e) => {
                warn!(error = %e, "Config unavailable, serving default market parameters");
                MarketParams::default()
            }
        }
    }

    /// Price bounds `(min, max)` in ETH, with the market-params fallback.
    pub async fn price_limits(&self) -> (f64, f64) {
        let params = self.market_params().await;
        (params.min_price, params.max_price)
    }

    /// IPFS gateway. Documented fallback: the public Pinata gateway.
    pub async fn ipfs_gateway(&self) -> String {
        match self.ensure_loaded().await {
            Ok(cfg) => cfg.ipfs.gateway.clone(),
            Err(e) => {
                warn!(error = %e, "Config unavailable, serving default IPFS gateway");
                DEFAULT_IPFS_GATEWAY.to_string()
            }
        }
    }

    /// Pinata credentials. No fallback: pinning is impossible without them.
    pub async fn pinata(&self) -> Result<PinataConfig, Error> {
        Ok(self.ensure_loaded().await?.ipfs.pinata.clone())
    }

    pub async fn is_pinata_configured(&self) -> bool {
        match self.pinata().await {
            Ok(p) => p.is_configured(),
            Err(_) => false,
        }
    }

    pub async fn nft_settings(&self) -> Result<NftSettings, Error> {
        Ok(self.ensure_loaded().await?.nft.clone())
    }

    pub async fn deployer(&self) -> Result<Option<DeployerInfo>, Error> {
        Ok(self.ensure_loaded().await?.deployer.clone())
    }
}
