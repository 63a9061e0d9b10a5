//! One pending single-file session per user, with a visible countdown.
//!
//! States: no session, active (ticking), expired. Ticks run in a single
//! timer chain per session and carry the session's generation; a tick whose
//! generation no longer matches the map entry stops without acting.

use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tokio::time::Instant;

use crate::callback_data::CallbackData;
use crate::config::SessionTimings;
use crate::files::records::FileRecord;
use crate::files::FileStore;
use crate::gateway::{Button, ChatRef, MessageRef, Messenger};
use crate::lang::{format_countdown, Lang};
use crate::timer::{schedule_chain, Tick, TimerHandle};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProcessingSession {
    pub user_id: i64,
    pub chat: ChatRef,
    pub file_path: PathBuf,
    pub record_id: u64,
    pub lang: Lang,
    pub started_at: Instant,
    pub countdown_message: Option<MessageRef>,
}

struct ActiveSession {
    session: ProcessingSession,
    generation: u64,
    timer: TimerHandle,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Countdown {
    Remaining(Duration),
    Expired,
}

pub fn countdown(started_at: Instant, now: Instant, timeout: Duration) -> Countdown {
    let elapsed = now.saturating_duration_since(started_at);
    match timeout.checked_sub(elapsed) {
        Some(remaining) if !remaining.is_zero() => Countdown::Remaining(remaining),
        _ => Countdown::Expired,
    }
}

pub struct SessionManager {
    sessions: DashMap<i64, ActiveSession>,
    messenger: Arc<dyn Messenger>,
    files: FileStore,
    timings: SessionTimings,
    next_generation: AtomicU64,
}

impl SessionManager {
    pub fn new(messenger: Arc<dyn Messenger>, files: FileStore, timings: SessionTimings) -> Arc<Self> {
        Arc::new(Self {
            sessions: DashMap::new(),
            messenger,
            files,
            timings,
            next_generation: AtomicU64::new(1),
        })
    }

    /// Replaces any previous session for the user. The previous session's
    /// timer and countdown message go away first and its file is discarded
    /// unless it is the same record.
    pub async fn start(self: &Arc<Self>, chat: ChatRef, record: &FileRecord, lang: Lang) {
        let user_id = record.user_id;
        if let Some((_, previous)) = self.sessions.remove(&user_id) {
            self.teardown_replaced(previous, record.id).await;
        }

        let text = lang
            .texts()
            .countdown
            .replace("{time}", &format_countdown(self.timings.timeout));
        let countdown_message = match self.messenger.send_message(chat, &text, None).await {
            Ok(message) => Some(message),
            Err(e) => {
                log::warn!("Failed to send countdown to user {}: {}", user_id, e);
                None
            }
        };

        let session = ProcessingSession {
            user_id,
            chat,
            file_path: record.storage_path.clone(),
            record_id: record.id,
            lang,
            started_at: Instant::now(),
            countdown_message,
        };
        let generation = self.next_generation.fetch_add(1, Ordering::Relaxed);

        let replaced = match self.sessions.entry(user_id) {
            Entry::Occupied(mut occupied) => {
                let timer = self.spawn_ticker(user_id, generation);
                Some(occupied.insert(ActiveSession {
                    session,
                    generation,
                    timer,
                }))
            }
            Entry::Vacant(vacant) => {
                let timer = self.spawn_ticker(user_id, generation);
                vacant.insert(ActiveSession {
                    session,
                    generation,
                    timer,
                });
                None
            }
        };
        if let Some(previous) = replaced {
            log::warn!("Concurrent session start for user {}", user_id);
            self.teardown_replaced(previous, record.id).await;
        }
        log::info!("Started processing session for user {} (record {})", user_id, record.id);
    }

    /// Stops the countdown and hands the file back to the caller untouched.
    pub async fn cancel(&self, user_id: i64) -> Option<ProcessingSession> {
        let (_, active) = self.sessions.remove(&user_id)?;
        active.timer.cancel();
        self.remove_countdown(&active.session).await;
        Some(active.session)
    }

    /// Cancels the session and discards its file.
    pub async fn abandon(&self, user_id: i64) {
        if let Some(session) = self.cancel(user_id).await {
            self.files.discard_quietly(session.record_id);
        }
    }

    pub fn get(&self, user_id: i64) -> Option<ProcessingSession> {
        self.sessions.get(&user_id).map(|a| a.session.clone())
    }

    pub fn active_count(&self) -> usize {
        self.sessions.len()
    }

    fn spawn_ticker(self: &Arc<Self>, user_id: i64, generation: u64) -> TimerHandle {
        let manager: Weak<Self> = Arc::downgrade(self);
        schedule_chain(self.timings.tick, move || {
            let manager = manager.clone();
            async move {
                match manager.upgrade() {
                    Some(manager) => manager.on_tick(user_id, generation).await,
                    None => Tick::Done,
                }
            }
        })
    }

    async fn on_tick(&self, user_id: i64, generation: u64) -> Tick {
        let (state, chat, message, lang) = match self.sessions.get(&user_id) {
            Some(active) if active.generation == generation => (
                countdown(active.session.started_at, Instant::now(), self.timings.timeout),
                active.session.chat,
                active.session.countdown_message,
                active.session.lang,
            ),
            _ => return Tick::Done,
        };

        match state {
            Countdown::Remaining(remaining) => {
                if let Some(message) = message {
                    let text = lang
                        .texts()
                        .countdown
                        .replace("{time}", &format_countdown(remaining));
                    if let Err(e) = self.messenger.edit_message(chat, message, &text, None).await {
                        log::debug!("Countdown edit failed for user {}: {}", user_id, e);
                    }
                }
                Tick::Again(remaining.min(self.timings.tick))
            }
            Countdown::Expired => {
                self.expire(user_id, generation).await;
                Tick::Done
            }
        }
    }

    async fn expire(&self, user_id: i64, generation: u64) {
        // The timer running this is the session's own, so it is dropped, not cancelled.
        let Some((_, active)) = self
            .sessions
            .remove_if(&user_id, |_, a| a.generation == generation)
        else {
            return;
        };
        let session = active.session;
        log::info!("Processing session for user {} expired", user_id);

        self.remove_countdown(&session).await;
        self.files.discard_quietly(session.record_id);

        let texts = session.lang.texts();
        let keyboard = vec![vec![Button::new(texts.start_button, CallbackData::StartBot)]];
        if let Err(e) = self
            .messenger
            .send_message(session.chat, texts.session_expired, Some(keyboard))
            .await
        {
            log::warn!("Failed to send expiry notice to user {}: {}", user_id, e);
        }
    }

    async fn teardown_replaced(&self, previous: ActiveSession, keep_record: u64) {
        previous.timer.cancel();
        self.remove_countdown(&previous.session).await;
        if previous.session.record_id != keep_record {
            self.files.discard_quietly(previous.session.record_id);
        }
    }

    async fn remove_countdown(&self, session: &ProcessingSession) {
        if let Some(message) = session.countdown_message {
            if let Err(e) = self.messenger.delete_message(session.chat, message).await {
                log::debug!("Failed to delete countdown for user {}: {}", session.user_id, e);
            }
        }
    }
}
