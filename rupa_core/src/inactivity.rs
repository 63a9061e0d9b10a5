//! Idle reminders, independent of processing sessions. A user is tracked from
//! their first interaction; every action refreshes the entry.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use dashmap::DashMap;
use tokio::time::Instant;

use crate::callback_data::CallbackData;
use crate::config::InactivityTimings;
use crate::gateway::{Button, ChatRef, Messenger};
use crate::lang::Lang;
use crate::timer::{schedule_chain, Tick, TimerHandle};

struct ActivityEntry {
    chat: ChatRef,
    lang: Lang,
    last_activity: Instant,
    reminder_sent: bool,
    generation: u64,
    timer: TimerHandle,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IdleStep {
    Remind,
    Close,
    Wait,
}

pub fn evaluate(elapsed: Duration, reminder_sent: bool, timings: &InactivityTimings) -> IdleStep {
    if elapsed > timings.reminder_after && !reminder_sent {
        IdleStep::Remind
    } else if elapsed > timings.close_after && reminder_sent {
        IdleStep::Close
    } else {
        IdleStep::Wait
    }
}

pub struct InactivityTracker {
    entries: DashMap<i64, ActivityEntry>,
    messenger: Arc<dyn Messenger>,
    timings: InactivityTimings,
    next_generation: AtomicU64,
}

impl InactivityTracker {
    pub fn new(messenger: Arc<dyn Messenger>, timings: InactivityTimings) -> Arc<Self> {
        Arc::new(Self {
            entries: DashMap::new(),
            messenger,
            timings,
            next_generation: AtomicU64::new(1),
        })
    }

    pub fn touch(self: &Arc<Self>, user_id: i64, chat: ChatRef, lang: Lang) {
        let generation = self.next_generation.fetch_add(1, Ordering::Relaxed);
        let timer = self.spawn_checker(user_id, generation);
        let entry = ActivityEntry {
            chat,
            lang,
            last_activity: Instant::now(),
            reminder_sent: false,
            generation,
            timer,
        };
        if let Some(previous) = self.entries.insert(user_id, entry) {
            previous.timer.cancel();
        }
    }

    pub fn clear(&self, user_id: i64) {
        if let Some((_, entry)) = self.entries.remove(&user_id) {
            entry.timer.cancel();
        }
    }

    pub fn is_tracked(&self, user_id: i64) -> bool {
        self.entries.contains_key(&user_id)
    }

    pub fn tracked_count(&self) -> usize {
        self.entries.len()
    }

    /// Drops entries idle for longer than the close threshold plus grace.
    /// Backstop for chains that died without closing.
    pub fn sweep_idle(&self, now: Instant) -> usize {
        let limit = self.timings.close_after + self.timings.sweep_grace;
        let before = self.entries.len();
        self.entries.retain(|user_id, entry| {
            let keep = now.saturating_duration_since(entry.last_activity) <= limit;
            if !keep {
                log::debug!("Sweeping idle user {}", user_id);
                entry.timer.cancel();
            }
            keep
        });
        before - self.entries.len()
    }

    fn spawn_checker(self: &Arc<Self>, user_id: i64, generation: u64) -> TimerHandle {
        let tracker: Weak<Self> = Arc::downgrade(self);
        schedule_chain(self.timings.check_interval, move || {
            let tracker = tracker.clone();
            async move {
                match tracker.upgrade() {
                    Some(tracker) => tracker.on_check(user_id, generation).await,
                    None => Tick::Done,
                }
            }
        })
    }

    async fn on_check(&self, user_id: i64, generation: u64) -> Tick {
        let (step, chat, lang) = match self.entries.get(&user_id) {
            Some(entry) if entry.generation == generation => (
                evaluate(
                    Instant::now().saturating_duration_since(entry.last_activity),
                    entry.reminder_sent,
                    &self.timings,
                ),
                entry.chat,
                entry.lang,
            ),
            _ => return Tick::Done,
        };

        match step {
            IdleStep::Remind => {
                match self.entries.get_mut(&user_id) {
                    Some(mut entry) if entry.generation == generation => entry.reminder_sent = true,
                    _ => return Tick::Done,
                }
                if let Err(e) = self
                    .messenger
                    .send_message(chat, lang.texts().inactivity_reminder, None)
                    .await
                {
                    log::warn!("Failed to send idle reminder to user {}: {}", user_id, e);
                }
                Tick::Again(self.timings.recheck_after_reminder)
            }
            IdleStep::Close => {
                // Own chain: the entry is dropped, its timer is not cancelled.
                if self
                    .entries
                    .remove_if(&user_id, |_, e| e.generation == generation)
                    .is_none()
                {
                    return Tick::Done;
                }
                let texts = lang.texts();
                let keyboard = vec![vec![Button::new(texts.start_button, CallbackData::StartBot)]];
                if let Err(e) = self
                    .messenger
                    .send_message(chat, texts.inactivity_close, Some(keyboard))
                    .await
                {
                    log::warn!("Failed to send close notice to user {}: {}", user_id, e);
                }
                log::info!("Closed idle session for user {}", user_id);
                Tick::Done
            }
            IdleStep::Wait => Tick::Again(self.timings.check_interval),
        }
    }
}
