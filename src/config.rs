//! Configuration loading from TOML with environment variable resolution.
//!
//! Reads `config.toml` (optional, every field has a default) and
//! deserializes into strongly-typed structs. Secrets and the RPC endpoint
//! are referenced by env-var name in the config and resolved at startup;
//! a missing value is fatal.

use anyhow::{Context, Result};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use secrecy::SecretString;
use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::time::Duration;

use crate::engine::monitor::ExitRules;
use crate::engine::scanner::ScanSettings;
use crate::exchange::ston::StonSettings;

/// Top-level application configuration.
#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct AppConfig {
    pub agent: AgentConfig,
    pub exit: ExitConfig,
    pub cooldown: CooldownConfig,
    pub exchange: ExchangeConfig,
    pub telegram: TelegramConfig,
    pub dashboard: DashboardConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct AgentConfig {
    pub name: String,
    /// Period of the scan driver and of every exit monitor's price poll.
    pub check_interval_secs: u64,
    /// Base-asset amount offered on each buy.
    pub purchase_amount: Decimal,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            name: "FARMBOT-001".to_string(),
            check_interval_secs: 60,
            purchase_amount: dec!(100),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ExitConfig {
    pub price_multiplier: Decimal,
    pub take_profit_after_secs: u64,
    pub stop_loss_after_secs: u64,
}

impl Default for ExitConfig {
    fn default() -> Self {
        Self {
            price_multiplier: dec!(2),
            take_profit_after_secs: 600,
            stop_loss_after_secs: 1800,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct CooldownConfig {
    pub window_secs: u64,
    pub evict_expired: bool,
}

impl Default for CooldownConfig {
    fn default() -> Self {
        Self {
            window_secs: 86_400,
            evict_expired: true,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ExchangeConfig {
    pub rpc_url_env: String,
    pub wallet_address: String,
    pub query_id: u64,
    pub request_timeout_secs: u64,
}

impl Default for ExchangeConfig {
    fn default() -> Self {
        Self {
            rpc_url_env: "RPC_URL".to_string(),
            wallet_address: "your_wallet_address_here".to_string(),
            query_id: 12345,
            request_timeout_secs: 30,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct TelegramConfig {
    pub bot_token_env: String,
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            bot_token_env: "API_TOKEN".to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct DashboardConfig {
    pub enabled: bool,
    pub port: u16,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            port: 8080,
        }
    }
}

impl AppConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &str) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {path}"))?;
        Self::parse(&contents).with_context(|| format!("Failed to parse config file: {path}"))
    }

    /// Load from `path` if it exists, otherwise use defaults.
    pub fn load_or_default(path: &str) -> Result<Self> {
        if Path::new(path).exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn parse(contents: &str) -> Result<Self> {
        let config: AppConfig = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        anyhow::ensure!(self.agent.check_interval_secs > 0, "agent.check_interval_secs must be > 0");
        anyhow::ensure!(self.agent.purchase_amount > Decimal::ZERO, "agent.purchase_amount must be > 0");
        anyhow::ensure!(self.exit.price_multiplier > Decimal::ZERO, "exit.price_multiplier must be > 0");
        anyhow::ensure!(self.exchange.request_timeout_secs > 0, "exchange.request_timeout_secs must be > 0");
        Ok(())
    }

    /// Resolve an environment variable name to its value.
    /// Useful for loading secrets referenced in the config.
    pub fn resolve_env(env_name: &str) -> Result<String> {
        std::env::var(env_name)
            .ok()
            .filter(|v| !v.trim().is_empty())
            .with_context(|| format!("Environment variable not set: {env_name}"))
    }

    /// Exchange base URL from `exchange.rpc_url_env`.
    pub fn rpc_url(&self) -> Result<String> {
        Self::resolve_env(&self.exchange.rpc_url_env)
    }

    /// Bot token from `telegram.bot_token_env`.
    pub fn bot_token(&self) -> Result<SecretString> {
        Self::resolve_env(&self.telegram.bot_token_env).map(SecretString::new)
    }

    pub fn check_interval(&self) -> Duration {
        Duration::from_secs(self.agent.check_interval_secs)
    }

    pub fn cooldown_window(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.cooldown.window_secs as i64)
    }

    pub fn exit_rules(&self) -> ExitRules {
        ExitRules {
            price_multiplier: self.exit.price_multiplier,
            take_profit_after: chrono::Duration::seconds(self.exit.take_profit_after_secs as i64),
            stop_loss_after: chrono::Duration::seconds(self.exit.stop_loss_after_secs as i64),
        }
    }

    pub fn scan_settings(&self) -> ScanSettings {
        ScanSettings {
            purchase_amount: self.agent.purchase_amount,
            exit_rules: self.exit_rules(),
            poll_interval: self.check_interval(),
            evict_expired: self.cooldown.evict_expired,
        }
    }

    pub fn ston_settings(&self, rpc_url: String) -> StonSettings {
        StonSettings {
            rpc_url,
            wallet_address: self.exchange.wallet_address.clone(),
            query_id: self.exchange.query_id,
            request_timeout: Duration::from_secs(self.exchange.request_timeout_secs),
        }
    }
}
