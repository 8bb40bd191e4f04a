//! Marketplace status binary: loads the deploy artifact, prints a summary,
//! and with `MARKET_SIGNER_KEY` set also binds a wallet and dumps the
//! current listings.

use ethers::signers::LocalWallet;
use nft_market_client::{MarketClient, Settings};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let settings = Settings::load();
    info!(artifact = %settings.artifact, rpc = %settings.rpc_url, "Starting market status");

    let client = MarketClient::new(settings)?;
    client.init().await?;

    let network = client.config().network().await?;
    let nft = client.config().nft_contract().await?;
    let market = client.config().market_contract().await?;
    let params = client.config().market_params().await;
    info!(
        network = %network.name,
        chain_id = network.chain_id,
        nft = %nft.address,
        market = %market.address,
        min_price = params.min_price,
        max_price = params.max_price,
        "Deployment"
    );
    if !client.config().is_pinata_configured().await {
        warn!("Pinata credentials missing, minting uploads will fail");
    }

    let Ok(key) = std::env::var("MARKET_SIGNER_KEY") else {
        info!("No MARKET_SIGNER_KEY set, skipping listing dump");
        return Ok(());
    };
    let wallet: LocalWallet = key.parse()?;
    let session = client.connect(wallet).await?;
    info!(address = ?session.address(), "Wallet bound");

    let listings = client.market().get_all_listings(false).await?;
    info!(count = listings.len(), "Active listings");
    for listing in listings.iter() {
        let name = listing
            .metadata
            .as_ref()
            .map(|m| m.name.as_str())
            .unwrap_or("(unnamed)");
        info!(
            token_id = %listing.token_id,
            price_eth = listing.price_eth,
            seller = ?listing.seller,
            name,
            "Listing"
        );
    }

    let stats = client.market().market_stats().await?;
    info!(
        total = stats.total_listings,
        sellers = stats.active_sellers,
        avg_price = stats.average_price,
        "Market stats"
    );

    Ok(())
}
