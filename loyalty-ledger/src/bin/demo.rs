//! Loyalty ledger demo binary
//!
//! Opens a seeded in-memory ledger and walks a customer through an earn
//! and a redemption against the sample business.

use anyhow::Context;
use loyalty_ledger::{types::NewUser, Config, Ledger};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    tracing::info!("Starting loyalty ledger demo");

    let config = match std::env::args().nth(1) {
        Some(path) => Config::from_file(&path).with_context(|| format!("loading {path}"))?,
        None => Config::from_env()?,
    };

    let ledger = Ledger::open(config)?;
    let business = ledger
        .list_businesses()?
        .into_iter()
        .next()
        .context("no business registered; enable storage.seed_sample_data")?;
    let token = ledger.get_token_by_business(business.id)?;
    let rewards = ledger.list_rewards(business.id)?;

    let user = ledger.register_user(NewUser {
        username: "demo".to_string(),
        password: "demo".to_string(),
        wallet_address: Some("DemoWallet111".to_string()),
    })?;

    ledger
        .earn(user.id, business.id, 250, "Welcome bonus", &token.token_ref())
        .await?;

    if let Some(reward) = rewards.iter().min_by_key(|r| r.token_cost) {
        match ledger
            .redeem(user.id, business.id, reward.id, &token.token_ref())
            .await
        {
            Ok(tx) => tracing::info!(transaction_id = %tx.id, reward = %reward.name, "Redeemed"),
            Err(e) => tracing::warn!(reward = %reward.name, "Redemption failed: {}", e),
        }
    }

    let balance = ledger.balance_of(user.id, token.id)?;
    tracing::info!(user = %user.username, balance, symbol = %token.symbol, "Final balance");

    let history = ledger.list_transactions_by_user(user.id)?;
    println!("{}", serde_json::to_string_pretty(&history)?);

    Ok(())
}
