//! Teloxide implementation of the core's messaging gateway.

use async_trait::async_trait;
use rupa_core::error::{RupaError, RupaResult};
use rupa_core::gateway::{ChatRef, Keyboard, MessageRef, Messenger};
use teloxide::{
    net::Download,
    prelude::*,
    types::{ChatId, FileId, InlineKeyboardButton, InlineKeyboardMarkup, InputFile, MessageId},
};

#[derive(Clone)]
pub struct TelegramMessenger {
    bot: Bot,
}

impl TelegramMessenger {
    pub fn new(bot: Bot) -> Self {
        Self { bot }
    }
}

fn markup(keyboard: Keyboard) -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(keyboard.into_iter().map(|row| {
        row.into_iter()
            .map(|button| InlineKeyboardButton::callback(button.label, button.payload))
            .collect::<Vec<_>>()
    }))
}

fn gateway_error(e: impl std::fmt::Display) -> RupaError {
    RupaError::Gateway(e.to_string())
}

#[async_trait]
impl Messenger for TelegramMessenger {
    async fn send_message(
        &self,
        chat: ChatRef,
        text: &str,
        keyboard: Option<Keyboard>,
    ) -> RupaResult<MessageRef> {
        let mut request = self.bot.send_message(ChatId(chat.0), text);
        if let Some(keyboard) = keyboard {
            request = request.reply_markup(markup(keyboard));
        }
        let message = request.await.map_err(gateway_error)?;
        Ok(MessageRef(message.id.0))
    }

    async fn edit_message(
        &self,
        chat: ChatRef,
        message: MessageRef,
        text: &str,
        keyboard: Option<Keyboard>,
    ) -> RupaResult<()> {
        let mut request = self
            .bot
            .edit_message_text(ChatId(chat.0), MessageId(message.0), text);
        if let Some(keyboard) = keyboard {
            request = request.reply_markup(markup(keyboard));
        }
        request.await.map_err(gateway_error)?;
        Ok(())
    }

    async fn delete_message(&self, chat: ChatRef, message: MessageRef) -> RupaResult<()> {
        self.bot
            .delete_message(ChatId(chat.0), MessageId(message.0))
            .await
            .map_err(gateway_error)?;
        Ok(())
    }

    async fn send_document(
        &self,
        chat: ChatRef,
        file_name: &str,
        bytes: Vec<u8>,
    ) -> RupaResult<MessageRef> {
        let document = InputFile::memory(bytes).file_name(file_name.to_string());
        let message = self
            .bot
            .send_document(ChatId(chat.0), document)
            .await
            .map_err(gateway_error)?;
        Ok(MessageRef(message.id.0))
    }

    async fn download_file(&self, file_id: &str) -> RupaResult<Vec<u8>> {
        let file_info = self
            .bot
            .get_file(FileId(file_id.to_owned()))
            .await
            .map_err(gateway_error)?;
        let mut bytes = Vec::with_capacity(file_info.size as usize);
        self.bot
            .download_file(&file_info.path, &mut bytes)
            .await
            .map_err(gateway_error)?;
        Ok(bytes)
    }
}
