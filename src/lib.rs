//! Client library for an NFT minting and marketplace deployment.
//!
//! The pieces compose in dependency order: [`config::ConfigStore`] loads
//! the deploy artifact, [`session::WalletSession`] carries the signer,
//! [`binder::ContractBinder`] turns both into callable contract handles,
//! and [`market::MarketplaceFacade`] and [`mint::MintService`] run the
//! user-facing workflows on top. [`client::MarketClient`] wires it all.

pub mod binder;
pub mod client;
pub mod config;
pub mod contracts;
pub mod error;
pub mod ipfs;
pub mod market;
pub mod mint;
pub mod session;
pub mod settings;

pub use binder::{BindStatus, ContractBinder};
pub use client::MarketClient;
pub use config::ConfigStore;
pub use error::Error;
pub use market::{ListingView, MarketplaceFacade, TradeReceipt};
pub use mint::MintService;
pub use session::{SessionEvent, WalletSession};
pub use settings::Settings;
