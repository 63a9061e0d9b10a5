use anyhow::Result;
use rupa_core::gateway::ChatRef;
use rupa_core::hub::{IncomingFile, UserCtx};
use rupa_core::lang::Lang;
use teloxide::{Bot, prelude::*, types::Message, utils::command::BotCommands};

use crate::commands::Command;
use crate::dependencies::BotDependencies;

/// Sender of a private message. Messages without a sender never reach the
/// handlers, the tree filters them out.
pub fn user_ctx(msg: &Message) -> Option<UserCtx> {
    let user = msg.from.as_ref()?;
    Some(UserCtx {
        user_id: user.id.0 as i64,
        chat: ChatRef(msg.chat.id.0),
        lang: Lang::from_code(user.language_code.as_deref()),
    })
}

/// The file attached to a message, if any. Photos use the largest size.
pub fn incoming_file(msg: &Message) -> Option<IncomingFile> {
    if let Some(document) = msg.document() {
        return Some(IncomingFile {
            file_id: document.file.id.to_string(),
            name: document
                .file_name
                .clone()
                .unwrap_or_else(|| "document.bin".to_string()),
            size: document.file.size as u64,
        });
    }
    if let Some(photo) = msg.photo().and_then(|photos| photos.last()) {
        return Some(IncomingFile {
            file_id: photo.file.id.to_string(),
            name: format!("photo_{}.jpg", photo.file.id),
            size: photo.file.size as u64,
        });
    }
    if let Some(video) = msg.video() {
        return Some(IncomingFile {
            file_id: video.file.id.to_string(),
            name: video
                .file_name
                .clone()
                .unwrap_or_else(|| format!("video_{}.mp4", video.file.id)),
            size: video.file.size as u64,
        });
    }
    if let Some(audio) = msg.audio() {
        return Some(IncomingFile {
            file_id: audio.file.id.to_string(),
            name: audio
                .file_name
                .clone()
                .unwrap_or_else(|| format!("audio_{}.mp3", audio.file.id)),
            size: audio.file.size as u64,
        });
    }
    None
}

pub async fn handle_start(msg: Message, bot_deps: BotDependencies) -> Result<()> {
    let Some(ctx) = user_ctx(&msg) else {
        return Ok(());
    };
    bot_deps.hub.handle_start(ctx).await?;
    Ok(())
}

pub async fn handle_help(bot: Bot, msg: Message) -> Result<()> {
    bot.send_message(msg.chat.id, Command::descriptions().to_string())
        .await?;
    Ok(())
}

pub async fn handle_file_message(msg: Message, bot_deps: BotDependencies) -> Result<()> {
    let (Some(ctx), Some(file)) = (user_ctx(&msg), incoming_file(&msg)) else {
        return Ok(());
    };
    log::info!("User {} uploaded {} ({} bytes)", ctx.user_id, file.name, file.size);
    bot_deps.hub.handle_upload(ctx, file).await?;
    Ok(())
}

pub async fn handle_text_message(msg: Message, bot_deps: BotDependencies) -> Result<()> {
    let Some(ctx) = user_ctx(&msg) else {
        return Ok(());
    };
    bot_deps.hub.handle_text(ctx).await?;
    Ok(())
}
