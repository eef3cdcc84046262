//! Chat command handling.
//!
//! Transport-agnostic: the Telegram front end parses a message into a
//! `BotCommand`, sends the acknowledgement (if any) straight away, then
//! sends whatever `handle` returns.

use std::sync::Arc;
use tracing::{error, info};
use uuid::Uuid;

use crate::engine::scanner::FarmScanner;

pub const GREETING: &str =
    "Hi! I'm a farming bot. I check farms and trade their tokens.";

pub const HELP: &str = "Commands:\n\
    /start - greeting\n\
    /help - this message\n\
    /check - run one farm check now\n\
    /positions - list watched positions\n\
    /cancel <id> - stop watching a position (no sell)";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BotCommand {
    Start,
    Help,
    Check,
    Positions,
    Cancel(String),
}

pub struct CommandHandler {
    scanner: Arc<FarmScanner>,
}

impl CommandHandler {
    pub fn new(scanner: Arc<FarmScanner>) -> Self {
        Self { scanner }
    }

    /// Immediate reply sent before `handle` runs, for slow commands.
    pub fn acknowledgement(&self, cmd: &BotCommand) -> Option<&'static str> {
        match cmd {
            BotCommand::Check => Some("Starting farm check..."),
            _ => None,
        }
    }

    pub async fn handle(&self, cmd: BotCommand) -> String {
        info!(command = ?cmd, "Handling chat command");
        match cmd {
            BotCommand::Start => GREETING.to_string(),
            BotCommand::Help => HELP.to_string(),
            BotCommand::Check => self.check().await,
            BotCommand::Positions => self.positions().await,
            BotCommand::Cancel(id) => self.cancel(&id).await,
        }
    }

    /// Run one scan on its own task so that a panic inside it is reported
    /// back instead of taking down the handler.
    async fn check(&self) -> String {
        let scanner = self.scanner.clone();
        match tokio::spawn(async move { scanner.check_farms().await }).await {
            Ok(Ok(report)) => format!("Farm check complete: {report}."),
            Ok(Err(e)) => format!("An error occurred: {e}"),
            Err(join_err) => {
                error!(error = %join_err, "Farm check task failed");
                format!("An error occurred: {join_err}")
            }
        }
    }

    async fn positions(&self) -> String {
        let snaps = self.scanner.registry().snapshots().await;
        let open: Vec<_> = snaps.iter().filter(|s| !s.state.is_terminal()).collect();
        if open.is_empty() {
            return "No open positions.".to_string();
        }

        let mut lines = vec![format!("{} open position(s):", open.len())];
        for s in open {
            let last = s
                .last_price
                .map(|p| p.to_string())
                .unwrap_or_else(|| "-".to_string());
            lines.push(format!(
                "{} {} entry={} last={} [{}]",
                s.position.id, s.position.pool_name, s.position.entry_price, last, s.state
            ));
        }
        lines.join("\n")
    }

    async fn cancel(&self, raw_id: &str) -> String {
        let Ok(id) = Uuid::parse_str(raw_id.trim()) else {
            return format!("Not a position id: {}", raw_id.trim());
        };
        if self.scanner.registry().cancel(id).await {
            format!("Stopped watching {id}. No sell was issued.")
        } else {
            format!("No open position with id {id}.")
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::cache::PositionCache;
    use crate::engine::registry::MonitorRegistry;
    use crate::engine::scanner::ScanSettings;
    use crate::engine::SystemClock;
    use crate::exchange::{MockQuoteClient, MockTradeClient, QuoteClient};
    use crate::types::{ExchangeError, Farm, TxParams};
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;
    use std::time::Duration;

    fn handler(quotes: MockQuoteClient, trades: MockTradeClient) -> CommandHandler {
        let scanner = FarmScanner::new(
            Arc::new(quotes),
            Arc::new(trades),
            Arc::new(PositionCache::default()),
            Arc::new(MonitorRegistry::new()),
            Arc::new(SystemClock),
            ScanSettings {
                poll_interval: Duration::from_secs(3600),
                ..ScanSettings::default()
            },
        );
        CommandHandler::new(Arc::new(scanner))
    }

    #[tokio::test]
    async fn test_start_and_help_are_static() {
        let h = handler(MockQuoteClient::new(), MockTradeClient::new());
        assert_eq!(h.handle(BotCommand::Start).await, GREETING);
        assert!(h.handle(BotCommand::Help).await.contains("/check"));
        assert!(h.acknowledgement(&BotCommand::Start).is_none());
        assert!(h.acknowledgement(&BotCommand::Check).is_some());
    }

    #[tokio::test]
    async fn test_check_reports_unreachable_remote() {
        let mut quotes = MockQuoteClient::new();
        quotes
            .expect_list_farms()
            .returning(|| Err(ExchangeError::transport("farm.list", "connection refused")));
        let h = handler(quotes, MockTradeClient::new());

        let reply = h.handle(BotCommand::Check).await;
        assert!(reply.starts_with("An error occurred"));
        assert!(reply.contains("connection refused"));
        assert!(h.scanner.cache().is_empty().await);
    }

    struct PanickingQuotes;

    #[async_trait::async_trait]
    impl QuoteClient for PanickingQuotes {
        async fn list_farms(&self) -> Result<Vec<Farm>, ExchangeError> {
            panic!("malformed catalog")
        }

        async fn get_price(&self, _pool_address: &str) -> Result<Decimal, ExchangeError> {
            Ok(Decimal::ZERO)
        }
    }

    #[tokio::test]
    async fn test_check_reports_panic() {
        let scanner = FarmScanner::new(
            Arc::new(PanickingQuotes),
            Arc::new(MockTradeClient::new()),
            Arc::new(PositionCache::default()),
            Arc::new(MonitorRegistry::new()),
            Arc::new(SystemClock),
            ScanSettings::default(),
        );
        let h = CommandHandler::new(Arc::new(scanner));

        let reply = h.handle(BotCommand::Check).await;
        assert!(reply.starts_with("An error occurred"), "{reply}");
    }

    #[tokio::test]
    async fn test_check_positions_and_cancel() {
        let mut quotes = MockQuoteClient::new();
        quotes
            .expect_list_farms()
            .returning(|| Ok(vec![Farm::sample("TON/NOT", "pause_all")]));
        quotes.expect_get_price().returning(|_| Ok(dec!(1)));
        let mut trades = MockTradeClient::new();
        trades
            .expect_buy()
            .returning(|_, _| Ok(TxParams(serde_json::Map::new())));
        let h = handler(quotes, trades);

        let reply = h.handle(BotCommand::Check).await;
        assert!(reply.contains("1 entered"), "{reply}");

        let listing = h.handle(BotCommand::Positions).await;
        assert!(listing.contains("TON/NOT"));

        let id = h.scanner.registry().snapshots().await[0].position.id;
        let reply = h.handle(BotCommand::Cancel(id.to_string())).await;
        assert!(reply.starts_with("Stopped watching"));
        assert_eq!(h.handle(BotCommand::Positions).await, "No open positions.");
    }

    #[tokio::test]
    async fn test_cancel_bad_id() {
        let h = handler(MockQuoteClient::new(), MockTradeClient::new());
        assert!(h
            .handle(BotCommand::Cancel("not-a-uuid".into()))
            .await
            .starts_with("Not a position id"));
        assert!(h
            .handle(BotCommand::Cancel(Uuid::new_v4().to_string()))
            .await
            .starts_with("No open position"));
    }
}
