//! In-memory exchange and clock for integration testing.
//!
//! `MockExchange` implements both client traits with a controllable farm
//! catalog, a settable price, and forced failures; every buy and sell is
//! recorded. `ManualClock` only moves when the test moves it.

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use std::sync::{Arc, Mutex};

use farmbot::engine::cache::PositionCache;
use farmbot::engine::registry::MonitorRegistry;
use farmbot::engine::scanner::{FarmScanner, ScanSettings};
use farmbot::engine::Clock;
use farmbot::exchange::{QuoteClient, TradeClient};
use farmbot::types::{ExchangeError, Farm, TxParams};

pub fn farm(pool_name: &str, status: &str) -> Farm {
    Farm {
        pool_address: format!("EQ-{}", pool_name.replace('/', "-")),
        pool_name: pool_name.to_string(),
        status: status.to_string(),
        version: "v2".to_string(),
    }
}

#[derive(Default)]
pub struct MockExchange {
    farms: Mutex<Vec<Farm>>,
    price: Mutex<Decimal>,
    /// If set, listing fails with a transport error carrying this text.
    listing_error: Mutex<Option<String>>,
    /// If true, price requests fail (and degrade to zero).
    price_error: Mutex<bool>,
    /// Price the pool moves to once a buy lands.
    price_after_buy: Mutex<Option<Decimal>>,
    buys: Mutex<Vec<(String, Decimal)>>,
    sells: Mutex<Vec<String>>,
    /// Every exchange call in order, e.g. `buy EQ-TON-NOT`, `price EQ-TON-NOT`.
    calls: Mutex<Vec<String>>,
}

impl MockExchange {
    pub fn with_farms(farms: Vec<Farm>, price: Decimal) -> Arc<Self> {
        let exchange = Self::default();
        *exchange.farms.lock().unwrap() = farms;
        *exchange.price.lock().unwrap() = price;
        Arc::new(exchange)
    }

    pub fn set_price(&self, price: Decimal) {
        *self.price.lock().unwrap() = price;
    }

    pub fn set_listing_error(&self, msg: Option<&str>) {
        *self.listing_error.lock().unwrap() = msg.map(String::from);
    }

    pub fn set_price_error(&self, fail: bool) {
        *self.price_error.lock().unwrap() = fail;
    }

    pub fn set_price_after_buy(&self, price: Decimal) {
        *self.price_after_buy.lock().unwrap() = Some(price);
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn buys(&self) -> Vec<(String, Decimal)> {
        self.buys.lock().unwrap().clone()
    }

    pub fn sells(&self) -> Vec<String> {
        self.sells.lock().unwrap().clone()
    }
}

#[async_trait]
impl QuoteClient for MockExchange {
    async fn list_farms(&self) -> Result<Vec<Farm>, ExchangeError> {
        if let Some(msg) = self.listing_error.lock().unwrap().as_ref() {
            return Err(ExchangeError::transport("farm.list", msg));
        }
        Ok(self.farms.lock().unwrap().clone())
    }

    async fn get_price(&self, pool_address: &str) -> Result<Decimal, ExchangeError> {
        self.calls.lock().unwrap().push(format!("price {pool_address}"));
        if *self.price_error.lock().unwrap() {
            return Err(ExchangeError::protocol("price", "HTTP 503"));
        }
        Ok(*self.price.lock().unwrap())
    }
}

#[async_trait]
impl TradeClient for MockExchange {
    async fn buy(&self, pool_address: &str, amount: Decimal) -> Result<TxParams, ExchangeError> {
        self.calls.lock().unwrap().push(format!("buy {pool_address}"));
        self.buys.lock().unwrap().push((pool_address.to_string(), amount));
        if let Some(price) = *self.price_after_buy.lock().unwrap() {
            self.set_price(price);
        }
        Ok(TxParams(serde_json::Map::new()))
    }

    async fn sell(&self, pool_address: &str) -> Result<TxParams, ExchangeError> {
        self.calls.lock().unwrap().push(format!("sell {pool_address}"));
        self.sells.lock().unwrap().push(pool_address.to_string());
        Ok(TxParams(serde_json::Map::new()))
    }
}

pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Arc<Self> {
        Arc::new(Self { now: Mutex::new(start) })
    }

    pub fn advance(&self, by: Duration) {
        *self.now.lock().unwrap() += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap()
    }
}

pub fn t0() -> DateTime<Utc> {
    DateTime::parse_from_rfc3339("2026-03-01T12:00:00Z")
        .unwrap()
        .with_timezone(&Utc)
}

/// Scanner wired to `exchange` and `clock`, polling every few milliseconds.
pub fn scanner(exchange: Arc<MockExchange>, clock: Arc<ManualClock>) -> Arc<FarmScanner> {
    Arc::new(FarmScanner::new(
        exchange.clone(),
        exchange,
        Arc::new(PositionCache::default()),
        Arc::new(MonitorRegistry::new()),
        clock,
        ScanSettings {
            poll_interval: std::time::Duration::from_millis(5),
            ..ScanSettings::default()
        },
    ))
}

/// Wait until `cond` holds, polling for up to two seconds.
pub async fn eventually<F: Fn() -> bool>(cond: F) {
    for _ in 0..400 {
        if cond() {
            return;
        }
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
    }
    panic!("condition not reached in time");
}
