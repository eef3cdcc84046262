//! STON.fi-style exchange integration.
//!
//! Farm listing goes through a JSON-RPC endpoint; swaps and prices are
//! plain REST under the same base URL.
//!
//! - `POST {rpc}`                      JSON-RPC `farm.list`
//! - `POST {rpc}/swap/ton-to-jetton`   buy intent
//! - `POST {rpc}/swap/jetton-to-ton`   sell intent
//! - `GET  {rpc}/price/{pool}`         current pool price
//!
//! Every response is parsed into an explicit schema; anything that does
//! not match is a `Protocol` error.

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, ORIGIN, USER_AGENT};
use reqwest::{Client, StatusCode};
use rust_decimal::Decimal;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info, warn};

use super::{QuoteClient, TradeClient};
use crate::types::{ExchangeError, Farm, TxParams};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

const FARM_LIST_METHOD: &str = "farm.list";
const RPC_ORIGIN: &str = "https://app.ston.fi";
const RPC_USER_AGENT: &str = "Mozilla/5.0";

/// Minimum amount accepted on either side of a swap.
const MIN_ASK_AMOUNT: &str = "1";

/// Offer amount for every sell request. The exchange receives the literal
/// unit "1" regardless of how much was bought; whether that means "one
/// token" or "the whole position" is unresolved, so it is sent verbatim.
pub const SELL_OFFER_AMOUNT: &str = "1";

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct RpcRequest<'a> {
    jsonrpc: &'static str,
    id: u64,
    method: &'a str,
    params: serde_json::Value,
}

/// JSON-RPC envelope for `farm.list`. Exactly one of `result`/`error`
/// is expected.
#[derive(Debug, Deserialize)]
struct FarmListEnvelope {
    #[serde(default)]
    result: Option<FarmListResult>,
    #[serde(default)]
    error: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct FarmListResult {
    farms: Vec<Farm>,
}

/// Body of `GET /price/{pool}`. The price may arrive as a number or a
/// numeric string; both deserialize into `Decimal`.
#[derive(Debug, Deserialize)]
struct PriceResponse {
    price: Decimal,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct TonToJettonRequest<'a> {
    user_wallet_address: &'a str,
    offer_amount: String,
    ask_jetton_address: &'a str,
    min_ask_amount: &'static str,
    query_id: u64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct JettonToTonRequest<'a> {
    user_wallet_address: &'a str,
    offer_jetton_address: &'a str,
    offer_amount: &'static str,
    min_ask_amount: &'static str,
    query_id: u64,
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

/// Settings for `StonClient`.
#[derive(Debug, Clone)]
pub struct StonSettings {
    /// Base URL: the JSON-RPC endpoint, also the prefix for REST paths.
    pub rpc_url: String,
    /// Wallet address placed in swap requests. Signing happens elsewhere.
    pub wallet_address: String,
    pub query_id: u64,
    pub request_timeout: Duration,
}

/// HTTP client implementing both `QuoteClient` and `TradeClient`.
pub struct StonClient {
    http: Client,
    settings: StonSettings,
}

impl StonClient {
    pub fn new(settings: StonSettings) -> Result<Self, ExchangeError> {
        let mut headers = HeaderMap::new();
        headers.insert(ORIGIN, HeaderValue::from_static(RPC_ORIGIN));
        headers.insert(ACCEPT, HeaderValue::from_static("*/*"));

        let http = Client::builder()
            .timeout(settings.request_timeout)
            .user_agent(RPC_USER_AGENT)
            .default_headers(headers)
            .build()
            .map_err(|e| ExchangeError::transport("client", e))?;

        Ok(Self { http, settings })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.settings.rpc_url.trim_end_matches('/'), path)
    }

    // -- Internal helpers ------------------------------------------------

    /// Send a request and decode a 200 body into `T`.
    async fn send_json<T: DeserializeOwned>(
        &self,
        label: &str,
        request: reqwest::RequestBuilder,
    ) -> Result<T, ExchangeError> {
        let resp = request
            .send()
            .await
            .map_err(|e| ExchangeError::transport(label, e))?;

        let status = resp.status();
        let bytes = resp
            .bytes()
            .await
            .map_err(|e| ExchangeError::transport(label, e))?;

        decode_body(label, status, &bytes)
    }

    async fn post_swap<B: Serialize>(&self, path: &str, body: &B) -> Result<TxParams, ExchangeError> {
        let url = self.endpoint(path);
        debug!(url = %url, "Requesting swap parameters");
        self.send_json(path, self.http.post(&url).json(body)).await
    }
}

/// Map an HTTP status and body to `T`, or a `Protocol` error.
fn decode_body<T: DeserializeOwned>(
    label: &str,
    status: StatusCode,
    bytes: &[u8],
) -> Result<T, ExchangeError> {
    if status != StatusCode::OK {
        let body = String::from_utf8_lossy(bytes);
        return Err(ExchangeError::protocol(label, format!("HTTP {status}: {body}")));
    }
    serde_json::from_slice(bytes)
        .map_err(|e| ExchangeError::protocol(label, format!("unexpected response shape: {e}")))
}

/// Turn a decoded `farm.list` envelope into farms, rejecting RPC errors.
fn farms_from_envelope(envelope: FarmListEnvelope) -> Result<Vec<Farm>, ExchangeError> {
    if let Some(err) = envelope.error {
        return Err(ExchangeError::protocol(FARM_LIST_METHOD, format!("RPC error: {err}")));
    }
    envelope
        .result
        .map(|r| r.farms)
        .ok_or_else(|| ExchangeError::protocol(FARM_LIST_METHOD, "missing result"))
}

// ---------------------------------------------------------------------------
// Trait implementations
// ---------------------------------------------------------------------------

#[async_trait]
impl QuoteClient for StonClient {
    async fn list_farms(&self) -> Result<Vec<Farm>, ExchangeError> {
        let body = RpcRequest {
            jsonrpc: "2.0",
            id: 1,
            method: FARM_LIST_METHOD,
            params: serde_json::json!({}),
        };

        let envelope: FarmListEnvelope = self
            .send_json(
                FARM_LIST_METHOD,
                self.http.post(&self.settings.rpc_url).json(&body),
            )
            .await
            .inspect_err(|e| warn!(error = %e, "Farm listing failed"))?;

        let farms = farms_from_envelope(envelope)
            .inspect_err(|e| warn!(error = %e, "Farm listing rejected"))?;

        debug!(count = farms.len(), "Farm catalog fetched");
        Ok(farms)
    }

    async fn get_price(&self, pool_address: &str) -> Result<Decimal, ExchangeError> {
        let url = self.endpoint(&format!("price/{}", urlencoding::encode(pool_address)));
        let resp: PriceResponse = self.send_json("price", self.http.get(&url)).await?;
        Ok(resp.price)
    }
}

#[async_trait]
impl TradeClient for StonClient {
    async fn buy(&self, pool_address: &str, amount: Decimal) -> Result<TxParams, ExchangeError> {
        let body = TonToJettonRequest {
            user_wallet_address: &self.settings.wallet_address,
            offer_amount: amount.normalize().to_string(),
            ask_jetton_address: pool_address,
            min_ask_amount: MIN_ASK_AMOUNT,
            query_id: self.settings.query_id,
        };
        let params = self.post_swap("swap/ton-to-jetton", &body).await?;
        info!(pool = %pool_address, amount = %amount, "Buy parameters received");
        Ok(params)
    }

    async fn sell(&self, pool_address: &str) -> Result<TxParams, ExchangeError> {
        let body = JettonToTonRequest {
            user_wallet_address: &self.settings.wallet_address,
            offer_jetton_address: pool_address,
            offer_amount: SELL_OFFER_AMOUNT,
            min_ask_amount: MIN_ASK_AMOUNT,
            query_id: self.settings.query_id,
        };
        let params = self.post_swap("swap/jetton-to-ton", &body).await?;
        info!(pool = %pool_address, "Sell parameters received");
        Ok(params)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn settings(url: &str) -> StonSettings {
        StonSettings {
            rpc_url: url.to_string(),
            wallet_address: "EQwallet".to_string(),
            query_id: 12345,
            request_timeout: Duration::from_secs(2),
        }
    }

    // -- Response decoding --

    #[test]
    fn test_decode_farm_list() {
        let body = br#"{"jsonrpc":"2.0","id":1,"result":{"farms":[
            {"pool_address":"EQa","pool_name":"TON/NOT","status":"pause_all","version":"v2"},
            {"pool_address":"EQb","pool_name":"TON/USDT","status":"active","version":"v2"}
        ]}}"#;
        let env: FarmListEnvelope = decode_body("farm.list", StatusCode::OK, body).unwrap();
        let farms = farms_from_envelope(env).unwrap();
        assert_eq!(farms.len(), 2);
        assert_eq!(farms[0].pool_name, "TON/NOT");
        assert!(farms[0].is_eligible());
        assert!(!farms[1].is_eligible());
    }

    #[test]
    fn test_rpc_error_is_protocol_error() {
        let body = br#"{"jsonrpc":"2.0","id":1,"error":{"code":-32601,"message":"nope"}}"#;
        let env: FarmListEnvelope = decode_body("farm.list", StatusCode::OK, body).unwrap();
        let err = farms_from_envelope(env).unwrap_err();
        assert!(matches!(err, ExchangeError::Protocol { .. }));
        assert!(err.to_string().contains("nope"));
    }

    #[test]
    fn test_missing_result_is_protocol_error() {
        let env: FarmListEnvelope = decode_body("farm.list", StatusCode::OK, b"{}").unwrap();
        assert!(farms_from_envelope(env).is_err());
    }

    #[test]
    fn test_malformed_farm_is_protocol_error() {
        let body = br#"{"result":{"farms":[{"pool_name":"TON/NOT"}]}}"#;
        let res: Result<FarmListEnvelope, _> = decode_body("farm.list", StatusCode::OK, body);
        assert!(matches!(res, Err(ExchangeError::Protocol { .. })));
    }

    #[test]
    fn test_non_200_is_protocol_error() {
        let res: Result<PriceResponse, _> =
            decode_body("price", StatusCode::NOT_FOUND, br#"{"price":"1.0"}"#);
        let err = res.unwrap_err();
        assert!(err.to_string().contains("404"));
    }

    #[test]
    fn test_price_as_string_or_number() {
        let p: PriceResponse = decode_body("price", StatusCode::OK, br#"{"price":"0.0425"}"#).unwrap();
        assert_eq!(p.price, dec!(0.0425));
        let p: PriceResponse = decode_body("price", StatusCode::OK, br#"{"price":2}"#).unwrap();
        assert_eq!(p.price, dec!(2));
    }

    #[test]
    fn test_price_missing_field_rejected() {
        let res: Result<PriceResponse, _> = decode_body("price", StatusCode::OK, br#"{"value":1}"#);
        assert!(res.is_err());
    }

    // -- Request bodies --

    #[test]
    fn test_sell_body_uses_literal_unit() {
        let body = JettonToTonRequest {
            user_wallet_address: "EQwallet",
            offer_jetton_address: "EQpool",
            offer_amount: SELL_OFFER_AMOUNT,
            min_ask_amount: MIN_ASK_AMOUNT,
            query_id: 12345,
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["offerAmount"], "1");
        assert_eq!(json["offerJettonAddress"], "EQpool");
        assert_eq!(json["userWalletAddress"], "EQwallet");
        assert_eq!(json["queryId"], 12345);
    }

    #[test]
    fn test_buy_body_field_names() {
        let body = TonToJettonRequest {
            user_wallet_address: "EQwallet",
            offer_amount: dec!(100).normalize().to_string(),
            ask_jetton_address: "EQpool",
            min_ask_amount: MIN_ASK_AMOUNT,
            query_id: 7,
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["offerAmount"], "100");
        assert_eq!(json["askJettonAddress"], "EQpool");
        assert_eq!(json["minAskAmount"], "1");
    }

    #[test]
    fn test_rpc_request_shape() {
        let req = RpcRequest {
            jsonrpc: "2.0",
            id: 1,
            method: FARM_LIST_METHOD,
            params: serde_json::json!({}),
        };
        let json = serde_json::to_value(&req).unwrap();
        assert_eq!(json["method"], "farm.list");
        assert_eq!(json["params"], serde_json::json!({}));
    }

    // -- Client construction --

    #[test]
    fn test_endpoint_joins_paths() {
        let client = StonClient::new(settings("https://rpc.example.com/")).unwrap();
        assert_eq!(
            client.endpoint("swap/ton-to-jetton"),
            "https://rpc.example.com/swap/ton-to-jetton"
        );
    }

    #[tokio::test]
    async fn test_unreachable_host_is_transport_error() {
        // Port 9 (discard) on localhost is almost never listening.
        let client = StonClient::new(settings("http://127.0.0.1:9")).unwrap();
        let err = client.list_farms().await.unwrap_err();
        assert!(err.is_transport());
    }
}
