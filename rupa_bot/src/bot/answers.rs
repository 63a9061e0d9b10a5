use anyhow::Result;
use teloxide::{Bot, types::Message};

use super::handler::{handle_help, handle_start};
use crate::commands::Command;
use crate::dependencies::BotDependencies;

pub async fn answers(
    bot: Bot,
    msg: Message,
    cmd: Command,
    bot_deps: BotDependencies,
) -> Result<()> {
    match cmd {
        Command::Start => handle_start(msg, bot_deps).await?,
        Command::Help => handle_help(bot, msg).await?,
    };
    Ok(())
}
