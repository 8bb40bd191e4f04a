//! Error types for the marketplace client.
//!
//! Every variant is a stable error kind carrying a human-readable message
//! suitable for direct display. Validation errors are raised before any
//! transaction is submitted; submission failures carry the underlying
//! reason verbatim and are never retried here.

use std::fmt;

/// Client error type.
#[derive(Debug, Clone)]
pub enum Error {
    /// Configuration fetch/parse failure with no safe fallback.
    ConfigUnavailable(String),
    /// Contract handle requested before a successful bind.
    NotInitialized,
    /// Wallet session absent or missing a signer.
    NotConnected,
    /// Price outside the configured bounds (or non-positive).
    InvalidPrice(Vec<String>),
    /// Caller does not own the token.
    NotOwner(String),
    /// No active listing exists for the token.
    NotListed(String),
    /// Listing was deactivated between lookup and submission.
    ListingInactive(String),
    /// On-chain price differs from the price the caller expects to pay.
    PriceChanged { expected: String, actual: String },
    /// Caller balance below the listing price.
    InsufficientFunds(String),
    /// File rejected by type/size validation before upload.
    InvalidFile(Vec<String>),
    /// On-chain execution revert or submission failure.
    TransactionFailed(String),
    /// RPC communication error.
    Rpc(String),
    /// IPFS pinning or gateway error.
    Ipfs(String),
}

impl Error {
    /// Stable machine-readable kind name.
    pub fn kind(&self) -> &'static str {
        match self {
            Error::ConfigUnavailable(_) => "config_unavailable",
            Error::NotInitialized => "not_initialized",
            Error::NotConnected => "not_connected",
            Error::InvalidPrice(_) => "invalid_price",
            Error::NotOwner(_) => "not_owner",
            Error::NotListed(_) => "not_listed",
            Error::ListingInactive(_) => "listing_inactive",
            Error::PriceChanged { .. } => "price_changed",
            Error::InsufficientFunds(_) => "insufficient_funds",
            Error::InvalidFile(_) => "invalid_file",
            Error::TransactionFailed(_) => "transaction_failed",
            Error::Rpc(_) => "rpc",
            Error::Ipfs(_) => "ipfs",
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::ConfigUnavailable(msg) => write!(f, "configuration unavailable: {msg}"),
            Error::NotInitialized => {
                write!(f, "contracts not initialized, connect a wallet first")
            }
            Error::NotConnected => write!(f, "wallet not connected"),
            Error::InvalidPrice(errors) => write!(f, "invalid price: {}", errors.join(", ")),
            Error::NotOwner(msg) => write!(f, "not the token owner: {msg}"),
            Error::NotListed(msg) => write!(f, "not listed: {msg}"),
            Error::ListingInactive(msg) => write!(f, "listing inactive: {msg}"),
            Error::PriceChanged { expected, actual } => write!(
                f,
                "listing price changed: expected {expected} ETH, now {actual} ETH"
            ),
            Error::InsufficientFunds(msg) => write!(f, "insufficient funds: {msg}"),
            Error::InvalidFile(errors) => write!(f, "invalid file: {}", errors.join(", ")),
            Error::TransactionFailed(msg) => write!(f, "transaction failed: {msg}"),
            Error::Rpc(msg) => write!(f, "rpc error: {msg}"),
            Error::Ipfs(msg) => write!(f, "ipfs error: {msg}"),
        }
    }
}

impl std::error::Error for Error {}
