//! Callback query handling. Every button press is forwarded to the hub; the
//! query is always answered so the client stops its spinner.

use anyhow::Result;
use rupa_core::gateway::{ChatRef, MessageRef};
use rupa_core::hub::UserCtx;
use rupa_core::lang::Lang;
use teloxide::{
    prelude::*,
    types::{CallbackQuery, MaybeInaccessibleMessage},
};

use crate::dependencies::BotDependencies;

/// Sender and the message the pressed button belongs to. Without an
/// accessible message the reply goes to the user's private chat.
pub fn query_ctx(query: &CallbackQuery) -> (UserCtx, Option<MessageRef>) {
    let user_id = query.from.id.0 as i64;
    let (chat, origin) = match &query.message {
        Some(MaybeInaccessibleMessage::Regular(message)) => {
            (ChatRef(message.chat.id.0), Some(MessageRef(message.id.0)))
        }
        _ => (ChatRef(user_id), None),
    };
    let ctx = UserCtx {
        user_id,
        chat,
        lang: Lang::from_code(query.from.language_code.as_deref()),
    };
    (ctx, origin)
}

pub async fn handle_callback_query(
    bot: Bot,
    query: CallbackQuery,
    bot_deps: BotDependencies,
) -> Result<()> {
    let Some(data) = &query.data else {
        bot.answer_callback_query(query.id.clone()).await?;
        return Ok(());
    };
    let (ctx, origin) = query_ctx(&query);

    let outcome = bot_deps.hub.handle_callback(ctx, origin, data).await;
    let answer = match &outcome {
        Ok(Some(toast)) => bot.answer_callback_query(query.id.clone()).text(*toast),
        _ => bot.answer_callback_query(query.id.clone()),
    };
    if let Err(e) = answer.await {
        log::warn!("Failed to answer callback query for user {}: {}", ctx.user_id, e);
    }

    outcome?;
    Ok(())
}

/// Answers a press from a user who was not admitted, without a toast.
pub async fn answer_rejected_query(bot: Bot, query: CallbackQuery) -> Result<()> {
    if let Err(e) = bot.answer_callback_query(query.id.clone()).await {
        log::debug!("Failed to answer rejected query from user {}: {}", query.from.id, e);
    }
    Ok(())
}
