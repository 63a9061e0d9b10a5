//! Test doubles for the messaging gateway and the transforms.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicI32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tempfile::TempDir;

use crate::error::{RupaError, RupaResult};
use crate::files::cipher::FileCipher;
use crate::files::vault::FileVault;
use crate::files::FileStore;
use crate::gateway::{ChatRef, Keyboard, MessageRef, Messenger};
use crate::transform::{Action, TransformOutput, Transformer};

pub fn create_test_store() -> (FileStore, TempDir) {
    let temp = TempDir::new().unwrap();
    let db = sled::open(temp.path().join("db")).unwrap();
    let vault = FileVault::new(
        temp.path().join("files"),
        temp.path().join("temp"),
        FileCipher::new("test-encryption-key").unwrap(),
    )
    .unwrap();
    (FileStore::new(&db, vault).unwrap(), temp)
}

#[derive(Clone, Debug, PartialEq)]
pub enum Sent {
    Message {
        chat: ChatRef,
        id: MessageRef,
        text: String,
        keyboard: Option<Keyboard>,
    },
    Edit {
        chat: ChatRef,
        id: MessageRef,
        text: String,
        keyboard: Option<Keyboard>,
    },
    Delete {
        chat: ChatRef,
        id: MessageRef,
    },
    Document {
        chat: ChatRef,
        id: MessageRef,
        file_name: String,
        bytes: Vec<u8>,
    },
}

/// Records every gateway call in order.
#[derive(Default)]
pub struct RecordingMessenger {
    events: Mutex<Vec<Sent>>,
    blobs: Mutex<HashMap<String, Vec<u8>>>,
    next_id: AtomicI32,
    fail_edits: AtomicBool,
    fail_documents: AtomicBool,
    send_delay: Mutex<Duration>,
}

impl RecordingMessenger {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Makes `bytes` downloadable under `file_id`.
    pub fn put_blob(&self, file_id: &str, bytes: &[u8]) {
        self.blobs
            .lock()
            .unwrap()
            .insert(file_id.to_string(), bytes.to_vec());
    }

    pub fn fail_edits(&self, fail: bool) {
        self.fail_edits.store(fail, Ordering::SeqCst);
    }

    pub fn fail_documents(&self, fail: bool) {
        self.fail_documents.store(fail, Ordering::SeqCst);
    }

    /// Makes every `send_message` wait this long before it is recorded.
    pub fn delay_sends(&self, delay: Duration) {
        *self.send_delay.lock().unwrap() = delay;
    }

    pub fn events(&self) -> Vec<Sent> {
        self.events.lock().unwrap().clone()
    }

    pub fn message_texts(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                Sent::Message { text, .. } => Some(text),
                _ => None,
            })
            .collect()
    }

    /// Text the message was first sent with.
    pub fn text_of(&self, message: MessageRef) -> Option<String> {
        self.events().into_iter().find_map(|e| match e {
            Sent::Message { id, text, .. } if id == message => Some(text),
            _ => None,
        })
    }

    /// Text after the last edit, or the original text.
    pub fn latest_text_of(&self, message: MessageRef) -> Option<String> {
        self.events()
            .into_iter()
            .rev()
            .find_map(|e| match e {
                Sent::Edit { id, text, .. } | Sent::Message { id, text, .. } if id == message => {
                    Some(text)
                }
                _ => None,
            })
    }

    pub fn was_deleted(&self, message: MessageRef) -> bool {
        self.events()
            .iter()
            .any(|e| matches!(e, Sent::Delete { id, .. } if *id == message))
    }

    pub fn documents(&self) -> Vec<(String, Vec<u8>)> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                Sent::Document { file_name, bytes, .. } => Some((file_name, bytes)),
                _ => None,
            })
            .collect()
    }

    /// Keyboard of the most recent message or edit that carried one.
    pub fn last_keyboard(&self) -> Option<Keyboard> {
        self.events().into_iter().rev().find_map(|e| match e {
            Sent::Message { keyboard, .. } | Sent::Edit { keyboard, .. } => keyboard,
            _ => None,
        })
    }

    /// Whether any button payload equals `payload`.
    pub fn offered(&self, payload: &str) -> bool {
        self.events().iter().any(|e| match e {
            Sent::Message {
                keyboard: Some(k), ..
            }
            | Sent::Edit {
                keyboard: Some(k), ..
            } => k.iter().flatten().any(|b| b.payload == payload),
            _ => false,
        })
    }

    fn push(&self, event: Sent) {
        self.events.lock().unwrap().push(event);
    }

    fn next_ref(&self) -> MessageRef {
        MessageRef(self.next_id.fetch_add(1, Ordering::SeqCst) + 1)
    }
}

#[async_trait]
impl Messenger for RecordingMessenger {
    async fn send_message(
        &self,
        chat: ChatRef,
        text: &str,
        keyboard: Option<Keyboard>,
    ) -> RupaResult<MessageRef> {
        let delay = *self.send_delay.lock().unwrap();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        let id = self.next_ref();
        self.push(Sent::Message {
            chat,
            id,
            text: text.to_string(),
            keyboard,
        });
        Ok(id)
    }

    async fn edit_message(
        &self,
        chat: ChatRef,
        message: MessageRef,
        text: &str,
        keyboard: Option<Keyboard>,
    ) -> RupaResult<()> {
        if self.fail_edits.load(Ordering::SeqCst) {
            return Err(RupaError::Gateway("message to edit not found".into()));
        }
        self.push(Sent::Edit {
            chat,
            id: message,
            text: text.to_string(),
            keyboard,
        });
        Ok(())
    }

    async fn delete_message(&self, chat: ChatRef, message: MessageRef) -> RupaResult<()> {
        self.push(Sent::Delete { chat, id: message });
        Ok(())
    }

    async fn send_document(
        &self,
        chat: ChatRef,
        file_name: &str,
        bytes: Vec<u8>,
    ) -> RupaResult<MessageRef> {
        if self.fail_documents.load(Ordering::SeqCst) {
            return Err(RupaError::Gateway("Request Entity Too Large".into()));
        }
        let id = self.next_ref();
        self.push(Sent::Document {
            chat,
            id,
            file_name: file_name.to_string(),
            bytes,
        });
        Ok(id)
    }

    async fn download_file(&self, file_id: &str) -> RupaResult<Vec<u8>> {
        self.blobs
            .lock()
            .unwrap()
            .get(file_id)
            .cloned()
            .ok_or_else(|| RupaError::Gateway(format!("unknown file {file_id}")))
    }
}

/// Deterministic transforms: an action prefixes the input with its code,
/// a merge joins the inputs with `|`.
#[derive(Default)]
pub struct FakeTransformer {
    fail: AtomicBool,
    merge_delay: Mutex<Duration>,
}

impl FakeTransformer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    /// Makes merges take this long.
    pub fn slow_merges(&self, delay: Duration) {
        *self.merge_delay.lock().unwrap() = delay;
    }

    fn check(&self) -> RupaResult<()> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(RupaError::TransformFailed("fake transform failure".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl Transformer for FakeTransformer {
    async fn apply(
        &self,
        action: Action,
        _file_name: &str,
        input: Vec<u8>,
    ) -> RupaResult<TransformOutput> {
        self.check()?;
        let mut bytes = format!("{}:", action.code()).into_bytes();
        bytes.extend(input);
        Ok(TransformOutput {
            file_name: action.output_name().to_string(),
            bytes,
        })
    }

    async fn merge_documents(&self, inputs: Vec<Vec<u8>>) -> RupaResult<Vec<u8>> {
        let delay = *self.merge_delay.lock().unwrap();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        self.check()?;
        Ok(inputs.join(&b'|'))
    }
}
