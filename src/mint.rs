//! Minting: file validation, metadata assembly, pinning, and the mint
//! transaction.
//!
//! The pipeline is strictly ordered: nothing is pinned until the file
//! passes validation, and the transaction is not submitted until both the
//! image and the metadata document are pinned. A failure at any stage
//! aborts the rest; already-pinned content is left behind (pins are cheap
//! and unreferenced ones are garbage-collected upstream).

use crate::binder::ContractBinder;
use crate::config::ConfigStore;
use crate::error::Error;
use crate::ipfs::{Attribute, IpfsApi, TokenMetadata};
use crate::market::ProgressFn;
use ethers::types::{Address, TxHash, U256};
use ethers::utils::format_ether;
use std::sync::Arc;
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;
use tracing::{info, warn};

/// An uploaded file, as handed in by the caller.
#[derive(Debug, Clone)]
pub struct FileUpload {
    pub name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

/// Outcome of a file validation.
#[derive(Debug, Clone)]
pub struct FileValidation {
    pub valid: bool,
    pub errors: Vec<String>,
}

/// Everything needed to mint one token.
#[derive(Debug, Clone)]
pub struct MintRequest {
    pub name: String,
    pub description: String,
    pub external_url: Option<String>,
    pub attributes: Vec<Attribute>,
    pub file: FileUpload,
}

/// Result of a confirmed mint.
#[derive(Debug, Clone)]
pub struct MintReceipt {
    pub tx_hash: TxHash,
    /// `ipfs://` URI of the metadata document, what went on chain.
    pub token_uri: String,
    /// `ipfs://` URI of the pinned image.
    pub image_uri: String,
}

/// Collection-level facts from the NFT contract.
#[derive(Debug, Clone)]
pub struct CollectionInfo {
    pub name: String,
    pub symbol: String,
    pub total_supply: U256,
    pub max_supply: U256,
    pub mint_price_wei: U256,
    pub mint_price_eth: String,
    pub minting_enabled: bool,
}

/// A token in the connected account's wallet.
#[derive(Debug, Clone)]
pub struct OwnedToken {
    pub token_id: U256,
    pub token_uri: String,
    pub metadata: Option<TokenMetadata>,
}

#[derive(Debug, Clone)]
pub struct MintEligibility {
    pub eligible: bool,
    pub reasons: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct RoyaltyInfo {
    pub recipient: Address,
    pub amount_wei: U256,
}

pub struct MintService {
    store: Arc<ConfigStore>,
    binder: Arc<ContractBinder>,
    ipfs: Arc<dyn IpfsApi>,
}

impl MintService {
    pub fn new(store: Arc<ConfigStore>, binder: Arc<ContractBinder>, ipfs: Arc<dyn IpfsApi>) -> Self {
        Self {
            store,
            binder,
            ipfs,
        }
    }

    /// Validate an upload against the configured type and size limits.
    pub async fn validate_file(&self, file: &FileUpload) -> FileValidation {
        let settings = self.store.nft_settings().await.unwrap_or_default();
        let mut errors = Vec::new();
        if !settings
            .supported_types
            .iter()
            .any(|t| t == &file.content_type)
        {
            errors.push(format!(
                "unsupported file type {}, accepted: {}",
                file.content_type,
                settings.supported_types.join(", ")
            ));
        }
        if file.bytes.len() as u64 > settings.max_file_size {
            errors.push(format!(
                "file is {} bytes, limit is {}",
                file.bytes.len(),
                settings.max_file_size
            ));
        }
        if file.bytes.is_empty() {
            errors.push("file is empty".to_string());
        }
        FileValidation {
            valid: errors.is_empty(),
            errors,
        }
    }

    /// Parse free-form attribute text into trait pairs. Entries are
    /// separated by commas or newlines, each `trait: value`; malformed
    /// entries are skipped. Numeric values become JSON numbers.
    pub fn parse_attributes(text: &str) -> Vec<Attribute> {
        text.split(|c| c == ',' || c == '\n')
            .filter_map(|entry| {
                let (key, value) = entry.split_once(':')?;
                let key = key.trim();
                let value = value.trim();
                if key.is_empty() || value.is_empty() {
                    return None;
                }
                let value = match value.parse::<f64>() {
                    Ok(n) => serde_json::Number::from_f64(n)
                        .map(serde_json::Value::Number)
                        .unwrap_or_else(|| serde_json::Value::String(value.to_string())),
                    Err(_) => serde_json::Value::String(value.to_string()),
                };
                Some(Attribute {
                    trait_type: key.to_string(),
                    value,
                })
            })
            .collect()
    }

    /// Assemble the standard metadata document around a pinned image.
    pub fn build_metadata(request: &MintRequest, image_uri: &str) -> serde_json::Value {
        let created_at = OffsetDateTime::now_utc()
            .format(&Rfc3339)
            .unwrap_or_default();
        let metadata = TokenMetadata {
            name: request.name.clone(),
            description: request.description.clone(),
            image: image_uri.to_string(),
            external_url: request.external_url.clone(),
            attributes: request.attributes.clone(),
        };
        let mut doc = serde_json::to_value(&metadata).unwrap_or_default();
        if let Some(obj) = doc.as_object_mut() {
            obj.insert("created_at".to_string(), created_at.into());
        }
        doc
    }

    /// Full pipeline: validate, pin image, pin metadata, mint.
    pub async fn mint(
        &self,
        request: MintRequest,
        progress: Option<ProgressFn<'_>>,
    ) -> Result<MintReceipt, Error> {
        if let Some(cb) = progress {
            cb(10, "Validating file...");
        }
        let validation = self.validate_file(&request.file).await;
        if !validation.valid {
            return Err(Error::InvalidFile(validation.errors));
        }

        let nft = self.binder.nft_handle().await?;
        let to = self.binder.signer_address().await?;

        if let Some(cb) = progress {
            cb(25, "Uploading image to IPFS...");
        }
        let image = self
            .ipfs
            .pin_file(
                &request.file.name,
                &request.file.content_type,
                request.file.bytes.clone(),
            )
            .await?;

        if let Some(cb) = progress {
            cb(50, "Uploading metadata to IPFS...");
        }
        let doc = Self::build_metadata(&request, &image.uri);
        let metadata = self
            .ipfs
            .pin_json(&format!("{}.json", request.name), &doc)
            .await?;

        if let Some(cb) = progress {
            cb(75, "Submitting mint transaction...");
        }
        let price = nft.mint_price().await?;
        let outcome = nft.mint(to, metadata.uri.clone(), price).await?;
        info!(
            tx = %outcome.tx_hash,
            token_uri = %metadata.uri,
            name = %request.name,
            "Token minted"
        );
        if let Some(cb) = progress {
            cb(100, "Mint complete");
        }
        Ok(MintReceipt {
            tx_hash: outcome.tx_hash,
            token_uri: metadata.uri,
            image_uri: image.uri,
        })
    }

    /// Collection facts, combining the contract with the deploy artifact.
    pub async fn collection_info(&self) -> Result<CollectionInfo, Error> {
        let nft = self.binder.nft_handle().await?;
        let cfg = self.store.nft_contract().await?;
        let total_supply = nft.total_supply().await?;
        let max_supply = nft.max_supply().await?;
        let mint_price_wei = nft.mint_price().await?;
        let minting_enabled = nft.minting_enabled().await?;
        Ok(CollectionInfo {
            name: cfg.name,
            symbol: cfg.symbol,
            total_supply,
            max_supply,
            mint_price_eth: format_ether(mint_price_wei),
            mint_price_wei,
            minting_enabled,
        })
    }

    /// Whether the connected account can mint right now, with reasons.
    pub async fn minting_eligibility(&self) -> Result<MintEligibility, Error> {
        let nft = self.binder.nft_handle().await?;
        let mut reasons = Vec::new();

        if !nft.minting_enabled().await? {
            reasons.push("minting is currently disabled".to_string());
        }
        let total = nft.total_supply().await?;
        let max = nft.max_supply().await?;
        if total >= max {
            reasons.push(format!("collection is sold out ({max} tokens)"));
        }
        let price = nft.mint_price().await?;
        let balance = self.binder.signer_balance().await?;
        if balance < price {
            reasons.push(format!(
                "balance {} ETH is below the mint price {} ETH",
                format_ether(balance),
                format_ether(price)
            ));
        }
        Ok(MintEligibility {
            eligible: reasons.is_empty(),
            reasons,
        })
    }

    /// Tokens held by `owner`, with resolved metadata where available.
    ///
    /// Prefers the batch `tokensOfOwner` view; contracts without it fall
    /// back to per-index enumeration. A metadata failure keeps the token
    /// with `metadata: None`.
    pub async fn user_tokens(&self, owner: Address) -> Result<Vec<OwnedToken>, Error> {
        let nft = self.binder.nft_handle().await?;

        let token_ids = match nft.tokens_of_owner(owner).await {
            Ok(ids) => ids,
            Err(e) => {
                warn!(error = %e, "tokensOfOwner unavailable, enumerating by index");
                let count = nft.balance_of(owner).await?.as_u64();
                let mut ids = Vec::with_capacity(count as usize);
                for index in 0..count {
                    ids.push(nft.token_of_owner_by_index(owner, U256::from(index)).await?);
                }
                ids
            }
        };

        let mut tokens = Vec::with_capacity(token_ids.len());
        for token_id in token_ids {
            let token_uri = nft.token_uri(token_id).await?;
            let metadata = match self.ipfs.fetch_metadata(&token_uri).await {
                Ok(m) => Some(m),
                Err(e) => {
                    warn!(token_id = %token_id, error = %e, "Token metadata unavailable");
                    None
                }
            };
            tokens.push(OwnedToken {
                token_id,
                token_uri,
                metadata,
            });
        }
        Ok(tokens)
    }

    /// EIP-2981 royalty for a token at a given sale price.
    pub async fn royalty(&self, token_id: U256, sale_price: U256) -> Result<RoyaltyInfo, Error> {
        let nft = self.binder.nft_handle().await?;
        let (recipient, amount_wei) = nft.royalty_info(token_id, sale_price).await?;
        Ok(RoyaltyInfo {
            recipient,
            amount_wei,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::tests::sample_store;
    use crate::contracts::testing::{addr, CallLog, MockBalance, MockMarket, MockNft};
    use crate::ipfs::testing::MockIpfs;
    use ethers::utils::parse_ether;

    const SIGNER: u64 = 0xabc;

    fn png(len: usize) -> FileUpload {
        FileUpload {
            name: "art.png".to_string(),
            content_type: "image/png".to_string(),
            bytes: vec![0u8; len],
        }
    }

    fn request(file: FileUpload) -> MintRequest {
        MintRequest {
            name: "Art #1".to_string(),
            description: "First piece".to_string(),
            external_url: None,
            attributes: MintService::parse_attributes("Palette: warm, Edition: 1"),
            file,
        }
    }

    struct Fixture {
        service: MintService,
        ipfs: Arc<MockIpfs>,
        log: CallLog,
    }

    async fn fixture_with(nft: MockNft, balance: U256) -> Fixture {
        let log = Arc::clone(&nft.log);
        let store = Arc::new(sample_store());
        let binder = Arc::new(ContractBinder::new(Arc::clone(&store)));
        binder
            .install(
                Arc::new(nft),
                Arc::new(MockMarket::new(Arc::clone(&log))),
                Arc::new(MockBalance { amount: balance }),
                addr(SIGNER),
            )
            .await;
        let ipfs = Arc::new(MockIpfs::default());
        Fixture {
            service: MintService::new(store, binder, Arc::clone(&ipfs) as Arc<dyn IpfsApi>),
            ipfs,
            log,
        }
    }

    async fn fixture() -> Fixture {
        let nft = MockNft::new(CallLog::default());
        fixture_with(nft, parse_ether("1").unwrap()).await
    }

    // --- Validation ---

    #[tokio::test]
    async fn test_supported_file_within_limit_is_valid() {
        let f = fixture().await;
        let v = f.service.validate_file(&png(1024)).await;
        assert!(v.valid, "{:?}", v.errors);
    }

    #[tokio::test]
    async fn test_unsupported_type_and_oversize_both_reported() {
        let f = fixture().await;
        let mut file = png(2 * 1024 * 1024);
        file.content_type = "application/pdf".to_string();
        let v = f.service.validate_file(&file).await;
        assert!(!v.valid);
        assert_eq!(v.errors.len(), 2);
    }

    #[tokio::test]
    async fn test_empty_file_is_invalid() {
        let f = fixture().await;
        let v = f.service.validate_file(&png(0)).await;
        assert!(!v.valid);
    }

    // --- Attributes and metadata ---

    #[test]
    fn test_parse_attributes_mixed_separators_and_types() {
        let attrs = MintService::parse_attributes("Palette: warm\nEdition: 3, broken-entry, : x");
        assert_eq!(attrs.len(), 2);
        assert_eq!(attrs[0].trait_type, "Palette");
        assert_eq!(attrs[0].value, serde_json::json!("warm"));
        assert_eq!(attrs[1].value, serde_json::json!(3.0));
    }

    #[test]
    fn test_build_metadata_shape() {
        let doc = MintService::build_metadata(&request(png(10)), "ipfs://QmImg");
        assert_eq!(doc["name"], "Art #1");
        assert_eq!(doc["image"], "ipfs://QmImg");
        assert!(doc["created_at"].as_str().unwrap().contains('T'));
        assert_eq!(doc["attributes"].as_array().unwrap().len(), 2);
        assert!(doc.get("external_url").is_none());
    }

    // --- Mint pipeline ---

    #[tokio::test]
    async fn test_mint_pins_image_then_metadata_then_submits() {
        let f = fixture().await;
        let receipt = f.service.mint(request(png(64)), None).await.unwrap();
        assert_eq!(receipt.token_uri, "ipfs://QmJsonHash");
        assert_eq!(receipt.image_uri, "ipfs://QmFileHash");

        let pins = f.ipfs.pins.lock().unwrap().clone();
        assert_eq!(pins, vec!["file:art.png", "json:Art #1.json"]);
        assert!(f.log.lock().unwrap().contains(&"mint".to_string()));
    }

    #[tokio::test]
    async fn test_invalid_file_aborts_before_any_pin() {
        let f = fixture().await;
        let mut file = png(64);
        file.content_type = "text/plain".to_string();
        let err = f.service.mint(request(file), None).await.unwrap_err();
        assert_eq!(err.kind(), "invalid_file");
        assert!(f.ipfs.pins.lock().unwrap().is_empty());
        assert!(f.log.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_mint_progress_reaches_completion() {
        let f = fixture().await;
        let seen = Arc::new(std::sync::Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let cb = move |pct: u8, _msg: &str| sink.lock().unwrap().push(pct);
        let cb: ProgressFn<'_> = &cb;

        f.service.mint(request(png(64)), Some(cb)).await.unwrap();
        let seen = seen.lock().unwrap();
        assert!(seen.windows(2).all(|w| w[0] < w[1]));
        assert_eq!(*seen.last().unwrap(), 100);
    }

    // --- Collection and eligibility ---

    #[tokio::test]
    async fn test_collection_info_merges_config_and_chain() {
        let f = fixture().await;
        let info = f.service.collection_info().await.unwrap();
        assert_eq!(info.symbol, "ART");
        assert_eq!(info.max_supply, U256::from(10_000u64));
        assert!(info.minting_enabled);
    }

    #[tokio::test]
    async fn test_eligibility_fails_on_insufficient_balance() {
        let mut nft = MockNft::new(CallLog::default());
        nft.mint_price = parse_ether("0.5").unwrap();
        let f = fixture_with(nft, parse_ether("0.1").unwrap()).await;

        let elig = f.service.minting_eligibility().await.unwrap();
        assert!(!elig.eligible);
        assert_eq!(elig.reasons.len(), 1);
        assert!(elig.reasons[0].contains("mint price"));
    }

    #[tokio::test]
    async fn test_eligibility_passes_with_funds() {
        let f = fixture().await;
        let elig = f.service.minting_eligibility().await.unwrap();
        assert!(elig.eligible, "{:?}", elig.reasons);
    }

    // --- Owned tokens ---

    #[tokio::test]
    async fn test_user_tokens_keep_entries_with_missing_metadata() {
        let mut nft = MockNft::new(CallLog::default());
        nft.owners.insert(U256::from(1u64), addr(SIGNER));
        nft.owners.insert(U256::from(2u64), addr(SIGNER));
        nft.uris.insert(U256::from(1u64), "ipfs://m1".into());
        nft.uris.insert(U256::from(2u64), "ipfs://m2".into());
        let log = Arc::clone(&nft.log);
        let store = Arc::new(sample_store());
        let binder = Arc::new(ContractBinder::new(Arc::clone(&store)));
        binder
            .install(
                Arc::new(nft),
                Arc::new(MockMarket::new(Arc::clone(&log))),
                Arc::new(MockBalance {
                    amount: parse_ether("1").unwrap(),
                }),
                addr(SIGNER),
            )
            .await;
        let ipfs = Arc::new(MockIpfs::default().with_metadata("ipfs://m1", "One"));
        let service = MintService::new(store, binder, ipfs);

        let tokens = service.user_tokens(addr(SIGNER)).await.unwrap();
        assert_eq!(tokens.len(), 2);
        assert!(tokens[0].metadata.is_some());
        assert!(tokens[1].metadata.is_none());
    }

    #[tokio::test]
    async fn test_royalty_passthrough() {
        let f = fixture().await;
        let royalty = f
            .service
            .royalty(U256::from(1u64), parse_ether("1").unwrap())
            .await
            .unwrap();
        assert_eq!(royalty.recipient, addr(0xfee));
        assert_eq!(royalty.amount_wei, parse_ether("0.05").unwrap());
    }
}
