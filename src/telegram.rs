//! Telegram front end.
//!
//! Long-polls the Bot API with teloxide and forwards recognised commands
//! to `CommandHandler`. Nothing here makes decisions.

use secrecy::{ExposeSecret, SecretString};
use std::sync::Arc;
use teloxide::prelude::*;
use teloxide::utils::command::BotCommands;
use tracing::{info, warn};

use crate::commands::{BotCommand, CommandHandler};

#[derive(BotCommands, Clone, Debug)]
#[command(rename_rule = "lowercase", description = "Supported commands:")]
pub enum TelegramCommand {
    #[command(description = "greeting")]
    Start,
    #[command(description = "show this text")]
    Help,
    #[command(description = "run one farm check now")]
    Check,
    #[command(description = "list watched positions")]
    Positions,
    #[command(description = "stop watching a position: /cancel <id>")]
    Cancel(String),
}

impl From<TelegramCommand> for BotCommand {
    fn from(cmd: TelegramCommand) -> Self {
        match cmd {
            TelegramCommand::Start => BotCommand::Start,
            TelegramCommand::Help => BotCommand::Help,
            TelegramCommand::Check => BotCommand::Check,
            TelegramCommand::Positions => BotCommand::Positions,
            TelegramCommand::Cancel(id) => BotCommand::Cancel(id),
        }
    }
}

/// Poll for updates until the dispatcher stops.
pub async fn run_bot(token: SecretString, handler: Arc<CommandHandler>) {
    let bot = Bot::new(token.expose_secret());

    if let Err(e) = bot.set_my_commands(TelegramCommand::bot_commands()).await {
        warn!(error = %e, "Failed to register bot command list");
    }

    info!("Telegram bot polling started");

    let schema = Update::filter_message()
        .filter_command::<TelegramCommand>()
        .endpoint(answer);

    Dispatcher::builder(bot, schema)
        .dependencies(dptree::deps![handler])
        .default_handler(|_| async {})
        .build()
        .dispatch()
        .await;
}

async fn answer(
    bot: Bot,
    msg: Message,
    cmd: TelegramCommand,
    handler: Arc<CommandHandler>,
) -> ResponseResult<()> {
    let cmd = BotCommand::from(cmd);

    if let Some(ack) = handler.acknowledgement(&cmd) {
        bot.send_message(msg.chat.id, ack).await?;
    }

    let reply = match cmd {
        BotCommand::Help => TelegramCommand::descriptions().to_string(),
        other => handler.handle(other).await,
    };
    bot.send_message(msg.chat.id, reply).await?;
    Ok(())
}
