use anyhow::Result;
use teloxide::{
    Bot,
    dispatching::{DpHandlerDescription, HandlerExt, UpdateFilterExt},
    dptree::{self, Handler},
    types::{CallbackQuery, Message, Update},
};

use crate::{
    bot::{
        answers::answers,
        handler::{handle_file_message, handle_text_message, incoming_file, user_ctx},
    },
    callbacks::{answer_rejected_query, handle_callback_query, query_ctx},
    commands::Command,
    dependencies::BotDependencies,
};

pub fn handler_tree() -> Handler<'static, Result<()>, DpHandlerDescription> {
    dptree::entry()
        .branch(
            Update::filter_message()
                // Private chats with a known sender only
                .filter(|msg: Message| msg.chat.is_private() && msg.from.is_some())
                // Rate limiting applies to every inbound message
                .filter_async(|msg: Message, bot_deps: BotDependencies| async move {
                    match user_ctx(&msg) {
                        Some(ctx) => bot_deps.hub.admit(ctx).await,
                        None => false,
                    }
                })
                .branch(
                    dptree::entry()
                        .filter_command::<Command>()
                        .endpoint(answers),
                )
                .branch(
                    dptree::entry()
                        .filter(|msg: Message| incoming_file(&msg).is_some())
                        .endpoint(handle_file_message),
                )
                .branch(
                    dptree::entry()
                        .filter(|msg: Message| msg.text().is_some())
                        .endpoint(handle_text_message),
                ),
        )
        .branch(
            Update::filter_callback_query()
                .branch(
                    dptree::entry()
                        .filter_async(|query: CallbackQuery, bot_deps: BotDependencies| async move {
                            bot_deps.hub.admit(query_ctx(&query).0).await
                        })
                        .endpoint(
                            |bot: Bot, query: CallbackQuery, bot_deps: BotDependencies| async move {
                                handle_callback_query(bot, query, bot_deps).await
                            },
                        ),
                )
                // Rejected presses still get an answer so the client stops waiting.
                .branch(dptree::endpoint(answer_rejected_query)),
        )
}
