//! Event flows: what happens when a user sends text, a file or presses a
//! button. Each flow holds the user's lock for its whole run so that
//! cancel-then-create sequences for one user never interleave. Timers never
//! take the lock; they re-validate their own state instead.

mod callbacks;
mod upload;


use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::admission::RateLimiter;
use crate::callback_data::CallbackData;
use crate::config::RupaConfig;
use crate::error::{RupaError, RupaResult, UserNotice};
use crate::files::FileStore;
use crate::gateway::{Button, ChatRef, Keyboard, MessageRef, Messenger};
use crate::inactivity::InactivityTracker;
use crate::lang::{Lang, Texts};
use crate::merge::MergeCoordinator;
use crate::reaper::Reaper;
use crate::selection::{Service, ServiceSelection};
use crate::session::SessionManager;
use crate::transform::Transformer;

/// Who an event came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct UserCtx {
    pub user_id: i64,
    pub chat: ChatRef,
    pub lang: Lang,
}

impl UserCtx {
    pub fn texts(&self) -> &'static Texts {
        self.lang.texts()
    }
}

/// An upload as announced by the gateway, before download.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IncomingFile {
    pub file_id: String,
    pub name: String,
    pub size: u64,
}

#[derive(Clone)]
pub struct Hub {
    config: Arc<RupaConfig>,
    messenger: Arc<dyn Messenger>,
    files: FileStore,
    transformer: Arc<dyn Transformer>,
    admission: Arc<RateLimiter>,
    selection: Arc<ServiceSelection>,
    sessions: Arc<SessionManager>,
    inactivity: Arc<InactivityTracker>,
    merges: Arc<MergeCoordinator>,
    user_locks: Arc<DashMap<i64, Arc<Mutex<()>>>>,
}

impl Hub {
    pub fn new(
        config: RupaConfig,
        messenger: Arc<dyn Messenger>,
        files: FileStore,
        transformer: Arc<dyn Transformer>,
    ) -> Self {
        let admission = Arc::new(RateLimiter::new(&config.rate_limit));
        let sessions =
            SessionManager::new(messenger.clone(), files.clone(), config.session.clone());
        let inactivity = InactivityTracker::new(messenger.clone(), config.inactivity.clone());
        let merges = MergeCoordinator::new(messenger.clone(), files.clone(), config.merge.clone());

        Self {
            config: Arc::new(config),
            messenger,
            files,
            transformer,
            admission,
            selection: Arc::new(ServiceSelection::new()),
            sessions,
            inactivity,
            merges,
            user_locks: Arc::new(DashMap::new()),
        }
    }

    pub fn config(&self) -> &RupaConfig {
        &self.config
    }

    pub fn files(&self) -> &FileStore {
        &self.files
    }

    pub fn sessions(&self) -> &Arc<SessionManager> {
        &self.sessions
    }

    pub fn merges(&self) -> &Arc<MergeCoordinator> {
        &self.merges
    }

    pub fn inactivity(&self) -> &Arc<InactivityTracker> {
        &self.inactivity
    }

    pub fn selection(&self) -> &ServiceSelection {
        &self.selection
    }

    pub fn reaper(&self) -> Reaper {
        Reaper::new(
            self.files.clone(),
            self.inactivity.clone(),
            self.merges.clone(),
            self.admission.clone(),
            self.config.retention.clone(),
        )
    }

    /// Admission check for every inbound event. The user is told once, when
    /// the block kicks in; later events from a blocked user are dropped
    /// silently.
    pub async fn admit(&self, ctx: UserCtx) -> bool {
        if self.admission.is_blocked(ctx.user_id) {
            return false;
        }
        if self.admission.admit(ctx.user_id) {
            return true;
        }
        self.report_error(ctx, &RupaError::AdmissionDenied(ctx.user_id))
            .await;
        false
    }

    /// `/start` and the start button: forget everything about the user and
    /// show the main menu.
    pub async fn handle_start(&self, ctx: UserCtx) -> RupaResult<()> {
        let _guard = self.lock_user(ctx.user_id).await;
        self.restart(ctx).await
    }

    /// Plain text: greet and start idle tracking.
    pub async fn handle_text(&self, ctx: UserCtx) -> RupaResult<()> {
        let _guard = self.lock_user(ctx.user_id).await;
        self.inactivity.touch(ctx.user_id, ctx.chat, ctx.lang);
        let texts = ctx.texts();
        let keyboard = vec![vec![Button::new(texts.start_button, CallbackData::StartBot)]];
        self.messenger
            .send_message(ctx.chat, texts.first_welcome, Some(keyboard))
            .await?;
        Ok(())
    }

    /// Drops per-user locks nobody holds.
    pub fn prune_user_locks(&self) -> usize {
        let before = self.user_locks.len();
        self.user_locks.retain(|_, lock| Arc::strong_count(lock) > 1);
        before - self.user_locks.len()
    }

    async fn lock_user(&self, user_id: i64) -> OwnedMutexGuard<()> {
        let lock = self
            .user_locks
            .entry(user_id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        lock.lock_owned().await
    }

    async fn restart(&self, ctx: UserCtx) -> RupaResult<()> {
        self.selection.clear(ctx.user_id);
        self.sessions.abandon(ctx.user_id).await;
        self.merges.cancel(ctx.user_id);
        self.inactivity.clear(ctx.user_id);
        self.inactivity.touch(ctx.user_id, ctx.chat, ctx.lang);
        log::info!("Reset state for user {}", ctx.user_id);

        let texts = ctx.texts();
        self.messenger.send_message(ctx.chat, texts.welcome, None).await?;
        self.show_main_menu(ctx, None).await
    }

    async fn show_main_menu(&self, ctx: UserCtx, origin: Option<MessageRef>) -> RupaResult<()> {
        let texts = ctx.texts();
        self.replace_or_send(ctx.chat, origin, texts.choose_service, Some(main_menu(texts)))
            .await
    }

    /// Edits the message a button was pressed on, or sends a new one when
    /// there is none or the edit fails.
    async fn replace_or_send(
        &self,
        chat: ChatRef,
        origin: Option<MessageRef>,
        text: &str,
        keyboard: Option<Keyboard>,
    ) -> RupaResult<()> {
        if let Some(message) = origin {
            match self
                .messenger
                .edit_message(chat, message, text, keyboard.clone())
                .await
            {
                Ok(()) => return Ok(()),
                Err(e) => log::debug!("Edit failed, sending instead: {}", e),
            }
        }
        self.messenger.send_message(chat, text, keyboard).await?;
        Ok(())
    }

    async fn send_completion(&self, ctx: UserCtx) -> RupaResult<()> {
        let texts = ctx.texts();
        self.messenger.send_message(ctx.chat, texts.complete, None).await?;
        let keyboard = vec![vec![
            Button::new(texts.yes_more, CallbackData::YesMore),
            Button::new(texts.no_thanks, CallbackData::NoThanks),
        ]];
        self.messenger
            .send_message(ctx.chat, texts.help_more, Some(keyboard))
            .await?;
        Ok(())
    }

    /// Tells the user about a failure. The detail goes to the log only.
    async fn report_error(&self, ctx: UserCtx, error: &RupaError) {
        match error.user_notice() {
            UserNotice::Failed | UserNotice::Corrupted => {
                log::error!("Request from user {} failed: {}", ctx.user_id, error)
            }
            _ => log::info!("Request from user {} rejected: {}", ctx.user_id, error),
        }

        let texts = ctx.texts();
        let text = match error.user_notice() {
            UserNotice::RateLimited => texts.rate_limited.to_string(),
            UserNotice::WrongFileType => texts.wrong_file_type.to_string(),
            UserNotice::InsufficientFiles => texts.merge_insufficient.to_string(),
            UserNotice::BatchFull => texts
                .merge_full
                .replace("{max}", &self.merges.capacity().to_string()),
            UserNotice::FileTooLarge => texts.file_too_large.replace(
                "{max}",
                &(self.config.storage.max_file_size / (1024 * 1024)).to_string(),
            ),
            UserNotice::Corrupted => texts.corrupted_file.to_string(),
            UserNotice::MergeExpired => texts.merge_expired.to_string(),
            UserNotice::FileNotFound => texts.file_not_found.to_string(),
            UserNotice::Failed => texts.conversion_failed.to_string(),
        };
        let keyboard = error
            .needs_restart()
            .then(|| vec![vec![Button::new(texts.start_button, CallbackData::StartBot)]]);

        if let Err(e) = self.messenger.send_message(ctx.chat, &text, keyboard).await {
            log::warn!("Failed to notify user {}: {}", ctx.user_id, e);
        }
    }
}

pub fn main_menu(texts: &Texts) -> Keyboard {
    Service::ALL
        .into_iter()
        .map(|service| vec![Button::new(service.label(texts), CallbackData::Service(service))])
        .collect()
}

fn back_to_menu(texts: &Texts) -> Vec<Button> {
    vec![Button::new(texts.back_to_menu, CallbackData::MainMenu)]
}
