//! Marketplace workflows: list, buy, cancel, and listing enumeration.
//!
//! Each operation is a sequential pipeline with progress checkpoints.
//! Validation failures (price, ownership, listing state) are raised before
//! any transaction is submitted; submission failures surface verbatim and
//! are never retried. The client performs best-effort pre-checks only —
//! the contract is authoritative, and two racing operations resolve on
//! chain, not here.

use crate::binder::ContractBinder;
use crate::config::ConfigStore;
use crate::contracts::{MarketHandle, NftHandle, OnchainListing};
use crate::error::Error;
use crate::ipfs::{IpfsApi, TokenMetadata};
use ethers::types::{Address, TxHash, U256};
use ethers::utils::{format_ether, parse_ether};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::{info, warn};

/// How long a cached listings read stays valid.
const CACHE_TTL: Duration = Duration::from_secs(5 * 60);

/// Page size for `getActiveListings` reads.
const LISTINGS_PAGE: u64 = 100;

/// Progress callback: `(percent, message)` at each checkpoint. Relative
/// ordering of checkpoints is guaranteed; percentages are approximate.
pub type ProgressFn<'a> = &'a (dyn Fn(u8, &str) + Send + Sync);

fn report(progress: Option<ProgressFn<'_>>, percent: u8, message: &str) {
    if let Some(cb) = progress {
        cb(percent, message);
    }
}

/// Outcome of a price validation.
#[derive(Debug, Clone)]
pub struct PriceValidation {
    pub valid: bool,
    pub errors: Vec<String>,
    pub price: f64,
}

/// Result of a confirmed list/buy/cancel operation.
#[derive(Debug, Clone)]
pub struct TradeReceipt {
    pub tx_hash: TxHash,
    pub token_id: U256,
    pub price: Option<f64>,
}

/// A listing enriched for display.
#[derive(Debug, Clone)]
pub struct ListingView {
    pub listing_id: U256,
    pub token_id: U256,
    pub nft_contract: Address,
    pub seller: Address,
    pub price_wei: U256,
    pub price_eth: f64,
    pub active: bool,
    pub metadata: Option<TokenMetadata>,
}

/// Fee breakdown for a given sale price, all amounts in ETH.
#[derive(Debug, Clone)]
pub struct FeeBreakdown {
    pub total_price: f64,
    pub platform_fee: f64,
    pub seller_receives: f64,
    pub platform_fee_percent: f64,
}

/// Pure in-memory listing filter.
#[derive(Debug, Clone, Default)]
pub struct ListingFilter {
    pub min_price: Option<f64>,
    pub max_price: Option<f64>,
    pub search: Option<String>,
    pub sort: Option<SortBy>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortBy {
    PriceLowHigh,
    PriceHighLow,
    Name,
    Newest,
}

#[derive(Debug, Clone, Default)]
pub struct MarketStats {
    pub total_listings: usize,
    pub average_price: f64,
    pub min_price: f64,
    pub max_price: f64,
    pub active_sellers: usize,
}

struct CachedListings {
    data: Arc<Vec<ListingView>>,
    fetched_at: Instant,
}

pub struct MarketplaceFacade {
    store: Arc<ConfigStore>,
    binder: Arc<ContractBinder>,
    ipfs: Arc<dyn IpfsApi>,
    cache: RwLock<Option<CachedListings>>,
    cache_ttl: Duration,
}

impl MarketplaceFacade {
    pub fn new(store: Arc<ConfigStore>, binder: Arc<ContractBinder>, ipfs: Arc<dyn IpfsApi>) -> Self {
        Self {
            store,
            binder,
            ipfs,
            cache: RwLock::new(None),
            cache_ttl: CACHE_TTL,
        }
    }

    #[cfg(test)]
    fn with_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl = ttl;
        self
    }

    /// Validate a price against the configured bounds.
    pub async fn validate_price(&self, price: f64) -> PriceValidation {
        let params = self.store.market_params().await;
        let mut errors = Vec::new();
        if !price.is_finite() || price <= 0.0 {
            errors.push("price must be greater than zero".to_string());
        } else {
            if price < params.min_price {
                errors.push(format!("price cannot be below {} ETH", params.min_price));
            }
            if price > params.max_price {
                errors.push(format!("price cannot exceed {} ETH", params.max_price));
            }
        }
        PriceValidation {
            valid: errors.is_empty(),
            errors,
            price,
        }
    }

    /// List a token at a fixed price. Approves the marketplace first when
    /// needed; the listing transaction is not submitted until the approval
    /// is mined.
    pub async fn list(
        &self,
        token_id: U256,
        price: f64,
        progress: Option<ProgressFn<'_>>,
    ) -> Result<TradeReceipt, Error> {
        let validation = self.validate_price(price).await;
        if !validation.valid {
            return Err(Error::InvalidPrice(validation.errors));
        }
        let price_wei = parse_ether(price)
            .map_err(|e| Error::InvalidPrice(vec![format!("unparseable price: {e}")]))?;

        let nft = self.binder.nft_handle().await?;
        let market = self.binder.market_handle().await?;
        let caller = self.binder.signer_address().await?;

        report(progress, 10, "Checking token ownership...");
        let owner = nft.owner_of(token_id).await?;
        if owner != caller {
            return Err(Error::NotOwner(format!(
                "token {token_id} belongs to {owner:?}"
            )));
        }

        report(progress, 30, "Checking marketplace approval...");
        let approved = nft.get_approved(token_id).await?;
        if approved != market.address() {
            report(progress, 50, "Approving marketplace contract...");
            let approval = nft.approve(market.address(), token_id).await?;
            info!(tx = %approval.tx_hash, token_id = %token_id, "Marketplace approval confirmed");
        }

        report(progress, 70, "Listing token on the marketplace...");
        let outcome = market.list_nft(nft.address(), token_id, price_wei).await?;
        self.invalidate_cache().await;
        info!(tx = %outcome.tx_hash, token_id = %token_id, price, "Token listed");
        report(progress, 100, "Token listed");
        Ok(TradeReceipt {
            tx_hash: outcome.tx_hash,
            token_id,
            price: Some(price),
        })
    }

    /// Buy a listed token at the price the caller expects to pay. The
    /// listing is re-checked immediately before submission; the remaining
    /// window between re-check and mining is inherent to the contract.
    pub async fn buy(
        &self,
        token_id: U256,
        price: f64,
        progress: Option<ProgressFn<'_>>,
    ) -> Result<TradeReceipt, Error> {
        let price_wei = parse_ether(price)
            .map_err(|e| Error::InvalidPrice(vec![format!("unparseable price: {e}")]))?;
        let nft = self.binder.nft_handle().await?;
        let market = self.binder.market_handle().await?;

        report(progress, 10, "Checking balance...");
        let balance = self.binder.signer_balance().await?;
        if balance < price_wei {
            return Err(Error::InsufficientFunds(format!(
                "balance {} ETH is below the asking price {} ETH",
                format_ether(balance),
                format_ether(price_wei)
            )));
        }

        report(progress, 30, "Checking listing status...");
        let listing_id = market.listing_id_for(nft.address(), token_id).await?;
        if listing_id.is_zero() {
            return Err(Error::NotListed(format!(
                "token {token_id} has no active listing"
            )));
        }
        let listing = market.listing(listing_id).await?;
        if !listing.active {
            return Err(Error::ListingInactive(format!(
                "listing {listing_id} was cancelled or already sold"
            )));
        }
        if listing.price != price_wei {
            return Err(Error::PriceChanged {
                expected: format_ether(price_wei),
                actual: format_ether(listing.price),
            });
        }

        report(progress, 60, "Submitting purchase transaction...");
        // Re-resolve right before submission to narrow the race window.
        let listing_id = market.listing_id_for(nft.address(), token_id).await?;
        if listing_id.is_zero() {
            return Err(Error::NotListed(format!(
                "token {token_id} was delisted before purchase"
            )));
        }
        let outcome = market.buy_nft(listing_id, price_wei).await?;
        self.invalidate_cache().await;
        info!(tx = %outcome.tx_hash, token_id = %token_id, price, "Token purchased");
        report(progress, 100, "Purchase complete");
        Ok(TradeReceipt {
            tx_hash: outcome.tx_hash,
            token_id,
            price: Some(price),
        })
    }

    /// Cancel the caller's listing for a token.
    pub async fn cancel(
        &self,
        token_id: U256,
        progress: Option<ProgressFn<'_>>,
    ) -> Result<TradeReceipt, Error> {
        let nft = self.binder.nft_handle().await?;
        let market = self.binder.market_handle().await?;
        let caller = self.binder.signer_address().await?;

        report(progress, 20, "Checking token ownership...");
        let owner = nft.owner_of(token_id).await?;
        if owner != caller {
            return Err(Error::NotOwner(format!(
                "token {token_id} belongs to {owner:?}"
            )));
        }

        report(progress, 50, "Cancelling listing...");
        let listing_id = market.listing_id_for(nft.address(), token_id).await?;
        if listing_id.is_zero() {
            return Err(Error::NotListed(format!("token {token_id} is not listed")));
        }
        let outcome = market.cancel_listing(listing_id).await?;
        self.invalidate_cache().await;
        info!(tx = %outcome.tx_hash, token_id = %token_id, "Listing cancelled");
        report(progress, 100, "Listing cancelled");
        Ok(TradeReceipt {
            tx_hash: outcome.tx_hash,
            token_id,
            price: None,
        })
    }

    /// All active listings with resolved metadata. Served from cache when
    /// fresh; a metadata failure for one listing drops that listing with a
    /// warning and never aborts the batch.
    pub async fn get_all_listings(&self, use_cache: bool) -> Result<Arc<Vec<ListingView>>, Error> {
        if use_cache {
            if let Some(cached) = self.cache.read().await.as_ref() {
                if cached.fetched_at.elapsed() < self.cache_ttl {
                    return Ok(Arc::clone(&cached.data));
                }
            }
        }

        let nft = self.binder.nft_handle().await?;
        let market = self.binder.market_handle().await?;

        let mut raw = Vec::new();
        let mut offset = 0u64;
        loop {
            let page = market
                .active_listings(U256::from(offset), U256::from(LISTINGS_PAGE))
                .await?;
            let page_len = page.len();
            raw.extend(page);
            if page_len < LISTINGS_PAGE as usize {
                break;
            }
            offset += LISTINGS_PAGE;
        }

        let mut views = Vec::new();
        for listing in raw.into_iter().filter(|l| l.active) {
            match self.resolve_listing(nft.as_ref(), &listing).await {
                Ok(view) => views.push(view),
                Err(e) => warn!(
                    token_id = %listing.token_id,
                    error = %e,
                    "Skipping listing with unresolvable metadata"
                ),
            }
        }

        let data = Arc::new(views);
        *self.cache.write().await = Some(CachedListings {
            data: Arc::clone(&data),
            fetched_at: Instant::now(),
        });
        Ok(data)
    }

    async fn resolve_listing(
        &self,
        nft: &dyn NftHandle,
        listing: &OnchainListing,
    ) -> Result<ListingView, Error> {
        let token_uri = nft.token_uri(listing.token_id).await?;
        let metadata = self.ipfs.fetch_metadata(&token_uri).await?;
        Ok(ListingView {
            listing_id: listing.listing_id,
            token_id: listing.token_id,
            nft_contract: listing.nft_contract,
            seller: listing.seller,
            price_wei: listing.price,
            price_eth: wei_to_eth(listing.price),
            active: listing.active,
            metadata: Some(metadata),
        })
    }

    /// Listings by one seller, through the same cache as the full read.
    pub async fn user_listings(&self, user: Address) -> Result<Vec<ListingView>, Error> {
        let all = self.get_all_listings(true).await?;
        Ok(all.iter().filter(|l| l.seller == user).cloned().collect())
    }

    /// Current listing for one token, straight from the contract (no
    /// cache, no metadata resolution). `None` when not actively listed.
    pub async fn nft_listing(&self, token_id: U256) -> Result<Option<ListingView>, Error> {
        let nft = self.binder.nft_handle().await?;
        let market = self.binder.market_handle().await?;

        let listing_id = market.listing_id_for(nft.address(), token_id).await?;
        if listing_id.is_zero() {
            return Ok(None);
        }
        let listing = market.listing(listing_id).await?;
        if !listing.active {
            return Ok(None);
        }
        Ok(Some(ListingView {
            listing_id: listing.listing_id,
            token_id: listing.token_id,
            nft_contract: listing.nft_contract,
            seller: listing.seller,
            price_wei: listing.price,
            price_eth: wei_to_eth(listing.price),
            active: listing.active,
            metadata: None,
        }))
    }

    /// Fee breakdown at the configured platform fee.
    pub async fn calculate_fees(&self, price: f64) -> FeeBreakdown {
        let params = self.store.market_params().await;
        let platform_fee = price * params.platform_fee_percentage;
        FeeBreakdown {
            total_price: price,
            platform_fee,
            seller_receives: price - platform_fee,
            platform_fee_percent: params.platform_fee_percentage * 100.0,
        }
    }

    /// Pure filter + sort over already-fetched listings.
    pub fn filter_listings(listings: &[ListingView], filter: &ListingFilter) -> Vec<ListingView> {
        let mut out: Vec<ListingView> = listings
            .iter()
            .filter(|l| filter.min_price.map_or(true, |min| l.price_eth >= min))
            .filter(|l| filter.max_price.map_or(true, |max| l.price_eth <= max))
            .filter(|l| match &filter.search {
                None => true,
                Some(term) => {
                    let term = term.to_lowercase();
                    l.metadata.as_ref().map_or(false, |m| {
                        m.name.to_lowercase().contains(&term)
                            || m.description.to_lowercase().contains(&term)
                    })
                }
            })
            .cloned()
            .collect();

        match filter.sort {
            Some(SortBy::PriceLowHigh) => {
                out.sort_by(|a, b| a.price_eth.total_cmp(&b.price_eth));
            }
            Some(SortBy::PriceHighLow) => {
                out.sort_by(|a, b| b.price_eth.total_cmp(&a.price_eth));
            }
            Some(SortBy::Name) => out.sort_by(|a, b| {
                let name_a = a.metadata.as_ref().map(|m| m.name.as_str()).unwrap_or("");
                let name_b = b.metadata.as_ref().map(|m| m.name.as_str()).unwrap_or("");
                name_a.cmp(name_b)
            }),
            Some(SortBy::Newest) | None => out.sort_by(|a, b| b.token_id.cmp(&a.token_id)),
        }
        out
    }

    /// Aggregate stats over the current active listings.
    pub async fn market_stats(&self) -> Result<MarketStats, Error> {
        let listings = self.get_all_listings(true).await?;
        if listings.is_empty() {
            return Ok(MarketStats::default());
        }
        let prices: Vec<f64> = listings.iter().map(|l| l.price_eth).collect();
        let sellers: std::collections::HashSet<Address> =
            listings.iter().map(|l| l.seller).collect();
        Ok(MarketStats {
            total_listings: listings.len(),
            average_price: prices.iter().sum::<f64>() / prices.len() as f64,
            min_price: prices.iter().cloned().fold(f64::INFINITY, f64::min),
            max_price: prices.iter().cloned().fold(0.0, f64::max),
            active_sellers: sellers.len(),
        })
    }

    /// Drop the whole listings cache. Every mutating operation calls this;
    /// no partial invalidation.
    pub async fn invalidate_cache(&self) {
        *self.cache.write().await = None;
    }
}

fn wei_to_eth(wei: U256) -> f64 {
    format_ether(wei).parse().unwrap_or(0.0)
}
