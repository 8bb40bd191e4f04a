//! Contract handles: address + ABI + signer bound into a callable proxy.
//!
//! The ABIs are compiled in (they ship with the client; only addresses come
//! from the deploy artifact). Higher layers talk to the [`NftHandle`] and
//! [`MarketHandle`] seams; the ethers-backed implementations submit calls
//! through a `SignerMiddleware`, so every transaction is signed by the
//! session's wallet. View errors surface as `Error::Rpc`; submission and
//! revert errors surface verbatim as `Error::TransactionFailed` and are
//! never retried here.

use crate::error::Error;
use async_trait::async_trait;
use ethers::abi::{AbiParser, Detokenize, Tokenize};
use ethers::contract::{Contract, EthAbiType};
use ethers::middleware::SignerMiddleware;
use ethers::providers::{Http, Middleware, Provider};
use ethers::signers::LocalWallet;
use ethers::types::{Address, TxHash, U256};
use std::sync::Arc;

/// Signer-bound client every handle submits through.
pub type EthClient = SignerMiddleware<Provider<Http>, LocalWallet>;

/// NFT contract ABI (the surface this client consumes).
pub const NFT_ABI: &[&str] = &[
    "function mint(address to, string tokenURI) payable",
    "function tokenURI(uint256 tokenId) view returns (string)",
    "function balanceOf(address owner) view returns (uint256)",
    "function tokenOfOwnerByIndex(address owner, uint256 index) view returns (uint256)",
    "function ownerOf(uint256 tokenId) view returns (address)",
    "function approve(address to, uint256 tokenId)",
    "function getApproved(uint256 tokenId) view returns (address)",
    "function setApprovalForAll(address operator, bool approved)",
    "function isApprovedForAll(address owner, address operator) view returns (bool)",
    "function transferFrom(address from, address to, uint256 tokenId)",
    "function safeTransferFrom(address from, address to, uint256 tokenId)",
    "function totalSupply() view returns (uint256)",
    "function tokensOfOwner(address owner) view returns (uint256[])",
    "function mintPrice() view returns (uint256)",
    "function maxSupply() view returns (uint256)",
    "function mintingEnabled() view returns (bool)",
    "function royaltyInfo(uint256 tokenId, uint256 salePrice) view returns (address, uint256)",
];

/// Market contract ABI (the surface this client consumes).
pub const MARKET_ABI: &[&str] = &[
    "struct Listing { uint256 listingId; address nftContract; uint256 tokenId; address seller; uint256 price; bool active; uint256 createdAt; uint256 updatedAt; }",
    "struct Auction { uint256 auctionId; address nftContract; uint256 tokenId; address seller; uint256 startingPrice; uint256 currentBid; address currentBidder; uint256 endTime; bool active; uint256 createdAt; }",
    "struct Offer { uint256 offerId; address nftContract; uint256 tokenId; address buyer; uint256 price; uint256 expiration; bool active; uint256 createdAt; }",
    "function listNFT(address nftContract, uint256 tokenId, uint256 price)",
    "function buyNFT(uint256 listingId) payable",
    "function cancelListing(uint256 listingId)",
    "function updateListingPrice(uint256 listingId, uint256 newPrice)",
    "function createAuction(address nftContract, uint256 tokenId, uint256 startingPrice, uint256 duration)",
    "function placeBid(uint256 auctionId) payable",
    "function endAuction(uint256 auctionId)",
    "function makeOffer(address nftContract, uint256 tokenId, uint256 expiration) payable",
    "function acceptOffer(uint256 offerId)",
    "function cancelOffer(uint256 offerId)",
    "function getActiveListings(uint256 offset, uint256 limit) view returns (Listing[])",
    "function getUserListings(address user) view returns (Listing[])",
    "function listings(uint256 listingId) view returns (Listing)",
    "function auctions(uint256 auctionId) view returns (Auction)",
    "function offers(uint256 offerId) view returns (Offer)",
    "function nftToListingId(address nftContract, uint256 tokenId) view returns (uint256)",
    "function platformFeePercentage() view returns (uint256)",
    "function feeRecipient() view returns (address)",
    "function minimumPrice() view returns (uint256)",
];

/// A listing record as the market contract stores it.
#[derive(Clone, Debug, Default, EthAbiType)]
pub struct OnchainListing {
    pub listing_id: U256,
    pub nft_contract: Address,
    pub token_id: U256,
    pub seller: Address,
    pub price: U256,
    pub active: bool,
    pub created_at: U256,
    pub updated_at: U256,
}

#[derive(Clone, Debug, Default, EthAbiType)]
pub struct OnchainAuction {
    pub auction_id: U256,
    pub nft_contract: Address,
    pub token_id: U256,
    pub seller: Address,
    pub starting_price: U256,
    pub current_bid: U256,
    pub current_bidder: Address,
    pub end_time: U256,
    pub active: bool,
    pub created_at: U256,
}

#[derive(Clone, Debug, Default, EthAbiType)]
pub struct OnchainOffer {
    pub offer_id: U256,
    pub nft_contract: Address,
    pub token_id: U256,
    pub buyer: Address,
    pub price: U256,
    pub expiration: U256,
    pub active: bool,
    pub created_at: U256,
}

/// Result of a confirmed transaction.
#[derive(Clone, Debug)]
pub struct TxOutcome {
    pub tx_hash: TxHash,
    pub block_number: Option<u64>,
}

/// Callable binding of the NFT contract.
#[async_trait]
pub trait NftHandle: Send + Sync {
    fn address(&self) -> Address;
    async fn owner_of(&self, token_id: U256) -> Result<Address, Error>;
    async fn get_approved(&self, token_id: U256) -> Result<Address, Error>;
    async fn approve(&self, to: Address, token_id: U256) -> Result<TxOutcome, Error>;
    async fn token_uri(&self, token_id: U256) -> Result<String, Error>;
    async fn balance_of(&self, owner: Address) -> Result<U256, Error>;
    async fn token_of_owner_by_index(&self, owner: Address, index: U256) -> Result<U256, Error>;
    async fn tokens_of_owner(&self, owner: Address) -> Result<Vec<U256>, Error>;
    async fn total_supply(&self) -> Result<U256, Error>;
    async fn mint(&self, to: Address, token_uri: String, value: U256) -> Result<TxOutcome, Error>;
    async fn mint_price(&self) -> Result<U256, Error>;
    async fn max_supply(&self) -> Result<U256, Error>;
    async fn minting_enabled(&self) -> Result<bool, Error>;
    async fn royalty_info(
        &self,
        token_id: U256,
        sale_price: U256,
    ) -> Result<(Address, U256), Error>;
    async fn safe_transfer_from(
        &self,
        from: Address,
        to: Address,
        token_id: U256,
    ) -> Result<TxOutcome, Error>;
}

/// Callable binding of the market contract.
#[async_trait]
pub trait MarketHandle: Send + Sync {
    fn address(&self) -> Address;
    async fn list_nft(
        &self,
        nft_contract: Address,
        token_id: U256,
        price: U256,
    ) -> Result<TxOutcome, Error>;
    async fn buy_nft(&self, listing_id: U256, value: U256) -> Result<TxOutcome, Error>;
    async fn cancel_listing(&self, listing_id: U256) -> Result<TxOutcome, Error>;
    async fn update_listing_price(
        &self,
        listing_id: U256,
        new_price: U256,
    ) -> Result<TxOutcome, Error>;
    async fn create_auction(
        &self,
        nft_contract: Address,
        token_id: U256,
        starting_price: U256,
        duration: U256,
    ) -> Result<TxOutcome, Error>;
    async fn place_bid(&self, auction_id: U256, value: U256) -> Result<TxOutcome, Error>;
    async fn end_auction(&self, auction_id: U256) -> Result<TxOutcome, Error>;
    async fn make_offer(
        &self,
        nft_contract: Address,
        token_id: U256,
        expiration: U256,
        value: U256,
    ) -> Result<TxOutcome, Error>;
    async fn accept_offer(&self, offer_id: U256) -> Result<TxOutcome, Error>;
    async fn cancel_offer(&self, offer_id: U256) -> Result<TxOutcome, Error>;
    async fn active_listings(
        &self,
        offset: U256,
        limit: U256,
    ) -> Result<Vec<OnchainListing>, Error>;
    async fn user_listings(&self, user: Address) -> Result<Vec<OnchainListing>, Error>;
    async fn listing(&self, listing_id: U256) -> Result<OnchainListing, Error>;
    async fn auction(&self, auction_id: U256) -> Result<OnchainAuction, Error>;
    async fn offer(&self, offer_id: U256) -> Result<OnchainOffer, Error>;
    async fn listing_id_for(&self, nft_contract: Address, token_id: U256) -> Result<U256, Error>;
    async fn platform_fee_percentage(&self) -> Result<U256, Error>;
    async fn fee_recipient(&self) -> Result<Address, Error>;
    async fn minimum_price(&self) -> Result<U256, Error>;
}

/// Native-balance lookup for the bound signer.
#[async_trait]
pub trait BalanceSource: Send + Sync {
    async fn balance(&self, who: Address) -> Result<U256, Error>;
}

// --- ethers-backed implementations ---

async fn view<D, T>(contract: &Contract<EthClient>, name: &str, args: T) -> Result<D, Error>
where
    D: Detokenize + Send,
    T: Tokenize + Send,
{
    contract
        .method::<T, D>(name, args)
        .map_err(|e| Error::Rpc(format!("{name}: {e}")))?
        .call()
        .await
        .map_err(|e| Error::Rpc(format!("{name}: {e}")))
}

/// Submit a state-changing call and wait for its confirmation.
async fn send<T>(
    contract: &Contract<EthClient>,
    name: &str,
    args: T,
    value: Option<U256>,
) -> Result<TxOutcome, Error>
where
    T: Tokenize + Send,
{
    let mut call = contract
        .method::<T, ()>(name, args)
        .map_err(|e| Error::TransactionFailed(format!("{name}: {e}")))?;
    if let Some(v) = value {
        call = call.value(v);
    }
    let pending = call
        .send()
        .await
        .map_err(|e| Error::TransactionFailed(format!("{name}: {e}")))?;
    let receipt = pending
        .await
        .map_err(|e| Error::TransactionFailed(format!("{name}: {e}")))?
        .ok_or_else(|| {
            Error::TransactionFailed(format!("{name}: transaction dropped before confirmation"))
        })?;
    Ok(TxOutcome {
        tx_hash: receipt.transaction_hash,
        block_number: receipt.block_number.map(|b| b.as_u64()),
    })
}

pub struct EthersNft {
    contract: Contract<EthClient>,
}

impl EthersNft {
    pub fn new(address: Address, client: Arc<EthClient>) -> Result<Self, Error> {
        let abi = AbiParser::default()
            .parse(NFT_ABI)
            .map_err(|e| Error::Rpc(format!("NFT ABI parse failed: {e}")))?;
        Ok(Self {
            contract: Contract::new(address, abi, client),
        })
    }
}

#[async_trait]
impl NftHandle for EthersNft {
    fn address(&self) -> Address {
        self.contract.address()
    }

    async fn owner_of(&self, token_id: U256) -> Result<Address, Error> {
        view(&self.contract, "ownerOf", token_id).await
    }

    async fn get_approved(&self, token_id: U256) -> Result<Address, Error> {
        view(&self.contract, "getApproved", token_id).await
    }

    async fn approve(&self, to: Address, token_id: U256) -> Result<TxOutcome, Error> {
        send(&self.contract, "approve", (to, token_id), None).await
    }

    async fn token_uri(&self, token_id: U256) -> Result<String, Error> {
        view(&self.contract, "tokenURI", token_id).await
    }

    async fn balance_of(&self, owner: Address) -> Result<U256, Error> {
        view(&self.contract, "balanceOf", owner).await
    }

    async fn token_of_owner_by_index(&self, owner: Address, index: U256) -> Result<U256, Error> {
        view(&self.contract, "tokenOfOwnerByIndex", (owner, index)).await
    }

    async fn tokens_of_owner(&self, owner: Address) -> Result<Vec<U256>, Error> {
        view(&self.contract, "tokensOfOwner", owner).await
    }

    async fn total_supply(&self) -> Result<U256, Error> {
        view(&self.contract, "totalSupply", ()).await
    }

    async fn mint(&self, to: Address, token_uri: String, value: U256) -> Result<TxOutcome, Error> {
        send(&self.contract, "mint", (to, token_uri), Some(value)).await
    }

    async fn mint_price(&self) -> Result<U256, Error> {
        view(&self.contract, "mintPrice", ()).await
    }

    async fn max_supply(&self) -> Result<U256, Error> {
        view(&self.contract, "maxSupply", ()).await
    }

    async fn minting_enabled(&self) -> Result<bool, Error> {
        view(&self.contract, "mintingEnabled", ()).await
    }

    async fn royalty_info(
        &self,
        token_id: U256,
        sale_price: U256,
    ) -> Result<(Address, U256), Error> {
        view(&self.contract, "royaltyInfo", (token_id, sale_price)).await
    }

    async fn safe_transfer_from(
        &self,
        from: Address,
        to: Address,
        token_id: U256,
    ) -> Result<TxOutcome, Error> {
        send(&self.contract, "safeTransferFrom", (from, to, token_id), None).await
    }
}

pub struct EthersMarket {
    contract: Contract<EthClient>,
}

impl EthersMarket {
    pub fn new(address: Address, client: Arc<EthClient>) -> Result<Self, Error> {
        let abi = AbiParser::default()
            .parse(MARKET_ABI)
            .map_err(|e| Error::Rpc(format!("market ABI parse failed: {e}")))?;
        Ok(Self {
            contract: Contract::new(address, abi, client),
        })
    }
}

#[async_trait]
impl MarketHandle for EthersMarket {
    fn address(&self) -> Address {
        self.contract.address()
    }

    async fn list_nft(
        &self,
        nft_contract: Address,
        token_id: U256,
        price: U256,
    ) -> Result<TxOutcome, Error> {
        send(&self.contract, "listNFT", (nft_contract, token_id, price), None).await
    }

    async fn buy_nft(&self, listing_id: U256, value: U256) -> Result<TxOutcome, Error> {
        send(&self.contract, "buyNFT", listing_id, Some(value)).await
    }

    async fn cancel_listing(&self, listing_id: U256) -> Result<TxOutcome, Error> {
        send(&self.contract, "cancelListing", listing_id, None).await
    }

    async fn update_listing_price(
        &self,
        listing_id: U256,
        new_price: U256,
    ) -> Result<TxOutcome, Error> {
        send(&self.contract, "updateListingPrice", (listing_id, new_price), None).await
    }

    async fn create_auction(
        &self,
        nft_contract: Address,
        token_id: U256,
        starting_price: U256,
        duration: U256,
    ) -> Result<TxOutcome, Error> {
        send(
            &self.contract,
            "createAuction",
            (nft_contract, token_id, starting_price, duration),
            None,
        )
        .await
    }

    async fn place_bid(&self, auction_id: U256, value: U256) -> Result<TxOutcome, Error> {
        send(&self.contract, "placeBid", auction_id, Some(value)).await
    }

    async fn end_auction(&self, auction_id: U256) -> Result<TxOutcome, Error> {
        send(&self.contract, "endAuction", auction_id, None).await
    }

    async fn make_offer(
        &self,
        nft_contract: Address,
        token_id: U256,
        expiration: U256,
        value: U256,
    ) -> Result<TxOutcome, Error> {
        send(
            &self.contract,
            "makeOffer",
            (nft_contract, token_id, expiration),
            Some(value),
        )
        .await
    }

    async fn accept_offer(&self, offer_id: U256) -> Result<TxOutcome, Error> {
        send(&self.contract, "acceptOffer", offer_id, None).await
    }

    async fn cancel_offer(&self, offer_id: U256) -> Result<TxOutcome, Error> {
        send(&self.contract, "cancelOffer", offer_id, None).await
    }

    async fn active_listings(
        &self,
        offset: U256,
        limit: U256,
    ) -> Result<Vec<OnchainListing>, Error> {
        view(&self.contract, "getActiveListings", (offset, limit)).await
    }

    async fn user_listings(&self, user: Address) -> Result<Vec<OnchainListing>, Error> {
        view(&self.contract, "getUserListings", user).await
    }

    async fn listing(&self, listing_id: U256) -> Result<OnchainListing, Error> {
        view(&self.contract, "listings", listing_id).await
    }

    async fn auction(&self, auction_id: U256) -> Result<OnchainAuction, Error> {
        view(&self.contract, "auctions", auction_id).await
    }

    async fn offer(&self, offer_id: U256) -> Result<OnchainOffer, Error> {
        view(&self.contract, "offers", offer_id).await
    }

    async fn listing_id_for(&self, nft_contract: Address, token_id: U256) -> Result<U256, Error> {
        view(&self.contract, "nftToListingId", (nft_contract, token_id)).await
    }

    async fn platform_fee_percentage(&self) -> Result<U256, Error> {
        view(&self.contract, "platformFeePercentage", ()).await
    }

    async fn fee_recipient(&self) -> Result<Address, Error> {
        view(&self.contract, "feeRecipient", ()).await
    }

    async fn minimum_price(&self) -> Result<U256, Error> {
        view(&self.contract, "minimumPrice", ()).await
    }
}

/// Balance queries through the bound signer's provider.
pub struct ProviderBalance {
    client: Arc<EthClient>,
}

impl ProviderBalance {
    pub fn new(client: Arc<EthClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl BalanceSource for ProviderBalance {
    async fn balance(&self, who: Address) -> Result<U256, Error> {
        self.client
            .get_balance(who, None)
            .await
            .map_err(|e| Error::Rpc(format!("getBalance: {e}")))
    }
}

// --- Test doubles (shared across module tests) ---

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;

    pub(crate) type CallLog = Arc<Mutex<Vec<String>>>;

    pub(crate) fn outcome(n: u64) -> TxOutcome {
        TxOutcome {
            tx_hash: TxHash::from_low_u64_be(n),
            block_number: Some(n),
        }
    }

    pub(crate) fn addr(n: u64) -> Address {
        Address::from_low_u64_be(n)
    }

    /// NFT handle backed by in-memory maps; records every call by name.
    pub(crate) struct MockNft {
        pub address: Address,
        pub owners: HashMap<U256, Address>,
        pub approved: HashMap<U256, Address>,
        pub uris: HashMap<U256, String>,
        pub mint_price: U256,
        pub log: CallLog,
    }

    impl MockNft {
        pub(crate) fn new(log: CallLog) -> Self {
            Self {
                address: addr(0x70f7),
                owners: HashMap::new(),
                approved: HashMap::new(),
                uris: HashMap::new(),
                mint_price: U256::zero(),
                log,
            }
        }

        fn record(&self, name: &str) {
            self.log.lock().unwrap().push(name.to_string());
        }
    }

    #[async_trait]
    impl NftHandle for MockNft {
        fn address(&self) -> Address {
            self.address
        }

        async fn owner_of(&self, token_id: U256) -> Result<Address, Error> {
            self.record("ownerOf");
            self.owners
                .get(&token_id)
                .copied()
                .ok_or_else(|| Error::Rpc(format!("ownerOf: token {token_id} does not exist")))
        }

        async fn get_approved(&self, token_id: U256) -> Result<Address, Error> {
            self.record("getApproved");
            Ok(self.approved.get(&token_id).copied().unwrap_or_default())
        }

        async fn approve(&self, _to: Address, _token_id: U256) -> Result<TxOutcome, Error> {
            self.record("approve");
            Ok(outcome(1))
        }

        async fn token_uri(&self, token_id: U256) -> Result<String, Error> {
            self.record("tokenURI");
            self.uris
                .get(&token_id)
                .cloned()
                .ok_or_else(|| Error::Rpc(format!("tokenURI: token {token_id} has no URI")))
        }

        async fn balance_of(&self, owner: Address) -> Result<U256, Error> {
            self.record("balanceOf");
            let n = self.owners.values().filter(|o| **o == owner).count();
            Ok(U256::from(n))
        }

        async fn token_of_owner_by_index(
            &self,
            owner: Address,
            index: U256,
        ) -> Result<U256, Error> {
            self.record("tokenOfOwnerByIndex");
            let mut tokens: Vec<U256> = self
                .owners
                .iter()
                .filter(|(_, o)| **o == owner)
                .map(|(t, _)| *t)
                .collect();
            tokens.sort();
            tokens
                .get(index.as_usize())
                .copied()
                .ok_or_else(|| Error::Rpc("tokenOfOwnerByIndex: out of range".into()))
        }

        async fn tokens_of_owner(&self, owner: Address) -> Result<Vec<U256>, Error> {
            self.record("tokensOfOwner");
            let mut tokens: Vec<U256> = self
                .owners
                .iter()
                .filter(|(_, o)| **o == owner)
                .map(|(t, _)| *t)
                .collect();
            tokens.sort();
            Ok(tokens)
        }

        async fn total_supply(&self) -> Result<U256, Error> {
            self.record("totalSupply");
            Ok(U256::from(self.owners.len()))
        }

        async fn mint(
            &self,
            _to: Address,
            _token_uri: String,
            _value: U256,
        ) -> Result<TxOutcome, Error> {
            self.record("mint");
            Ok(outcome(2))
        }

        async fn mint_price(&self) -> Result<U256, Error> {
            self.record("mintPrice");
            Ok(self.mint_price)
        }

        async fn max_supply(&self) -> Result<U256, Error> {
            self.record("maxSupply");
            Ok(U256::from(10_000u64))
        }

        async fn minting_enabled(&self) -> Result<bool, Error> {
            self.record("mintingEnabled");
            Ok(true)
        }

        async fn royalty_info(
            &self,
            _token_id: U256,
            sale_price: U256,
        ) -> Result<(Address, U256), Error> {
            self.record("royaltyInfo");
            Ok((addr(0xfee), sale_price / 20))
        }

        async fn safe_transfer_from(
            &self,
            _from: Address,
            _to: Address,
            _token_id: U256,
        ) -> Result<TxOutcome, Error> {
            self.record("safeTransferFrom");
            Ok(outcome(3))
        }
    }

    /// Market handle backed by in-memory listings; records every call.
    pub(crate) struct MockMarket {
        pub address: Address,
        pub listing_ids: HashMap<(Address, U256), U256>,
        pub listings: HashMap<U256, OnchainListing>,
        pub log: CallLog,
    }

    impl MockMarket {
        pub(crate) fn new(log: CallLog) -> Self {
            Self {
                address: addr(0x3a47),
                listing_ids: HashMap::new(),
                listings: HashMap::new(),
                log,
            }
        }

        pub(crate) fn with_listing(mut self, listing: OnchainListing) -> Self {
            self.listing_ids.insert(
                (listing.nft_contract, listing.token_id),
                listing.listing_id,
            );
            self.listings.insert(listing.listing_id, listing);
            self
        }

        fn record(&self, name: &str) {
            self.log.lock().unwrap().push(name.to_string());
        }
    }

    #[async_trait]
    impl MarketHandle for MockMarket {
        fn address(&self) -> Address {
            self.address
        }

        async fn list_nft(
            &self,
            _nft_contract: Address,
            _token_id: U256,
            _price: U256,
        ) -> Result<TxOutcome, Error> {
            self.record("listNFT");
            Ok(outcome(10))
        }

        async fn buy_nft(&self, _listing_id: U256, _value: U256) -> Result<TxOutcome, Error> {
            self.record("buyNFT");
            Ok(outcome(11))
        }

        async fn cancel_listing(&self, _listing_id: U256) -> Result<TxOutcome, Error> {
            self.record("cancelListing");
            Ok(outcome(12))
        }

        async fn update_listing_price(
            &self,
            _listing_id: U256,
            _new_price: U256,
        ) -> Result<TxOutcome, Error> {
            self.record("updateListingPrice");
            Ok(outcome(13))
        }

        async fn create_auction(
            &self,
            _nft_contract: Address,
            _token_id: U256,
            _starting_price: U256,
            _duration: U256,
        ) -> Result<TxOutcome, Error> {
            self.record("createAuction");
            Ok(outcome(14))
        }

        async fn place_bid(&self, _auction_id: U256, _value: U256) -> Result<TxOutcome, Error> {
            self.record("placeBid");
            Ok(outcome(15))
        }

        async fn end_auction(&self, _auction_id: U256) -> Result<TxOutcome, Error> {
            self.record("endAuction");
            Ok(outcome(16))
        }

        async fn make_offer(
            &self,
            _nft_contract: Address,
            _token_id: U256,
            _expiration: U256,
            _value: U256,
        ) -> Result<TxOutcome, Error> {
            self.record("makeOffer");
            Ok(outcome(17))
        }

        async fn accept_offer(&self, _offer_id: U256) -> Result<TxOutcome, Error> {
            self.record("acceptOffer");
            Ok(outcome(18))
        }

        async fn cancel_offer(&self, _offer_id: U256) -> Result<TxOutcome, Error> {
            self.record("cancelOffer");
            Ok(outcome(19))
        }

        async fn active_listings(
            &self,
            offset: U256,
            limit: U256,
        ) -> Result<Vec<OnchainListing>, Error> {
            self.record("getActiveListings");
            let mut all: Vec<OnchainListing> = self.listings.values().cloned().collect();
            all.sort_by_key(|l| l.listing_id);
            Ok(all
                .into_iter()
                .skip(offset.as_usize())
                .take(limit.as_usize())
                .collect())
        }

        async fn user_listings(&self, user: Address) -> Result<Vec<OnchainListing>, Error> {
            self.record("getUserListings");
            Ok(self
                .listings
                .values()
                .filter(|l| l.seller == user)
                .cloned()
                .collect())
        }

        async fn listing(&self, listing_id: U256) -> Result<OnchainListing, Error> {
            self.record("listings");
            self.listings
                .get(&listing_id)
                .cloned()
                .ok_or_else(|| Error::Rpc(format!("listings: unknown id {listing_id}")))
        }

        async fn auction(&self, _auction_id: U256) -> Result<OnchainAuction, Error> {
            self.record("auctions");
            Ok(OnchainAuction::default())
        }

        async fn offer(&self, _offer_id: U256) -> Result<OnchainOffer, Error> {
            self.record("offers");
            Ok(OnchainOffer::default())
        }

        async fn listing_id_for(
            &self,
            nft_contract: Address,
            token_id: U256,
        ) -> Result<U256, Error> {
            self.record("nftToListingId");
            Ok(self
                .listing_ids
                .get(&(nft_contract, token_id))
                .copied()
                .unwrap_or_default())
        }

        async fn platform_fee_percentage(&self) -> Result<U256, Error> {
            self.record("platformFeePercentage");
            Ok(U256::from(250u64))
        }

        async fn fee_recipient(&self) -> Result<Address, Error> {
            self.record("feeRecipient");
            Ok(addr(0xfee))
        }

        async fn minimum_price(&self) -> Result<U256, Error> {
            self.record("minimumPrice");
            Ok(U256::from(1u64))
        }
    }

    /// Fixed-balance source.
    pub(crate) struct MockBalance {
        pub amount: U256,
    }

    #[async_trait]
    impl BalanceSource for MockBalance {
        async fn balance(&self, _who: Address) -> Result<U256, Error> {
            Ok(self.amount)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nft_abi_parses() {
        let abi = AbiParser::default().parse(NFT_ABI).unwrap();
        assert!(abi.function("ownerOf").is_ok());
        assert!(abi.function("royaltyInfo").is_ok());
    }

    #[test]
    fn test_market_abi_parses_with_structs() {
        let abi = AbiParser::default().parse(MARKET_ABI).unwrap();
        assert!(abi.function("getActiveListings").is_ok());
        assert!(abi.function("nftToListingId").is_ok());
        assert!(abi.function("buyNFT").is_ok());
    }
}
