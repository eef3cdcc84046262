//! Exchange integration.
//!
//! Defines the `QuoteClient` (read side) and `TradeClient` (swap intents)
//! traits, the STON.fi-style HTTP implementation, and the degrade helpers
//! through which callers deliberately discard remote failures.

pub mod degrade;
pub mod ston;

use async_trait::async_trait;
use rust_decimal::Decimal;

use crate::types::{ExchangeError, Farm, TxParams};

/// Read-only access to the exchange: farm catalog and pool prices.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait QuoteClient: Send + Sync {
    /// Fetch the current farm catalog.
    async fn list_farms(&self) -> Result<Vec<Farm>, ExchangeError>;

    /// Fetch the current price for a pool.
    async fn get_price(&self, pool_address: &str) -> Result<Decimal, ExchangeError>;
}

/// Swap intents. Nothing is signed or settled here; the returned
/// parameters are for a downstream signer.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TradeClient: Send + Sync {
    /// Request a TON → jetton swap of `amount` into the pool's token.
    async fn buy(&self, pool_address: &str, amount: Decimal) -> Result<TxParams, ExchangeError>;

    /// Request a jetton → TON swap for the held position.
    async fn sell(&self, pool_address: &str) -> Result<TxParams, ExchangeError>;
}
