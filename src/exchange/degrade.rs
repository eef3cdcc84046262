//! Named degrade paths.
//!
//! Remote failures never reach the scan loop or the exit monitors as
//! errors. These functions are the only places where an `ExchangeError`
//! is logged and dropped in favour of a fallback value.

use rust_decimal::Decimal;
use tracing::{debug, info, warn};

use super::QuoteClient;
use crate::types::{ExchangeError, TxParams};

/// Current pool price, or zero ("no price available") on any failure.
pub async fn price_or_zero(quotes: &dyn QuoteClient, pool_address: &str) -> Decimal {
    match quotes.get_price(pool_address).await {
        Ok(price) => price,
        Err(e) => {
            debug!(pool = %pool_address, error = %e, "Price unavailable, using 0");
            Decimal::ZERO
        }
    }
}

/// Log the outcome of a buy/sell request and drop any error.
///
/// Returns whether transaction parameters were obtained.
pub fn discard_trade_failure(
    action: &str,
    pool_address: &str,
    result: Result<TxParams, ExchangeError>,
) -> bool {
    match result {
        Ok(params) => {
            info!(action, pool = %pool_address, params = %params, "Transaction parameters received");
            true
        }
        Err(e) => {
            warn!(action, pool = %pool_address, error = %e, "Swap request failed, continuing");
            false
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
