//! The messaging surface the coordination layer talks to. The bot crate
//! implements it over Telegram; tests use a recording fake.

use async_trait::async_trait;

use crate::callback_data::CallbackData;
use crate::error::RupaResult;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ChatRef(pub i64);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct MessageRef(pub i32);

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Button {
    pub label: String,
    pub payload: String,
}

impl Button {
    pub fn new(label: impl Into<String>, data: CallbackData) -> Self {
        Self {
            label: label.into(),
            payload: data.to_string(),
        }
    }
}

/// Inline keyboard rows.
pub type Keyboard = Vec<Vec<Button>>;

#[async_trait]
pub trait Messenger: Send + Sync + 'static {
    async fn send_message(
        &self,
        chat: ChatRef,
        text: &str,
        keyboard: Option<Keyboard>,
    ) -> RupaResult<MessageRef>;

    async fn edit_message(
        &self,
        chat: ChatRef,
        message: MessageRef,
        text: &str,
        keyboard: Option<Keyboard>,
    ) -> RupaResult<()>;

    async fn delete_message(&self, chat: ChatRef, message: MessageRef) -> RupaResult<()>;

    async fn send_document(
        &self,
        chat: ChatRef,
        file_name: &str,
        bytes: Vec<u8>,
    ) -> RupaResult<MessageRef>;

    /// Fetches an uploaded file by its gateway-side id.
    async fn download_file(&self, file_id: &str) -> RupaResult<Vec<u8>>;
}
