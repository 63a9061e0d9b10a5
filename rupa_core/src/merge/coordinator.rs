use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use dashmap::DashMap;
use tokio::time::Instant;

use crate::callback_data::CallbackData;
use crate::config::MergeTimings;
use crate::error::{RupaError, RupaResult};
use crate::files::FileStore;
use crate::gateway::{Button, ChatRef, Keyboard, MessageRef, Messenger};
use crate::lang::Lang;
use crate::merge::batch::{BatchPhase, Direction, MergeBatch};
use crate::timer::schedule_once;
use crate::transform::Transformer;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BatchSnapshot {
    pub chat: ChatRef,
    pub lang: Lang,
    pub record_ids: Vec<u64>,
    pub phase: BatchPhase,
    pub prompt_message: Option<MessageRef>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RemoveOutcome {
    Removed { remaining: usize },
    /// Fewer than two entries were left, so the whole batch went away.
    BatchCancelled,
    /// Index out of range or the merge is already running.
    Unchanged,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CancelledBatch {
    pub chat: ChatRef,
    pub lang: Lang,
    pub prompt_message: Option<MessageRef>,
    pub discarded: usize,
}

pub struct MergeCoordinator {
    batches: DashMap<i64, MergeBatch>,
    messenger: Arc<dyn Messenger>,
    files: FileStore,
    timings: MergeTimings,
    next_generation: AtomicU64,
}

impl MergeCoordinator {
    pub fn new(messenger: Arc<dyn Messenger>, files: FileStore, timings: MergeTimings) -> Arc<Self> {
        Arc::new(Self {
            batches: DashMap::new(),
            messenger,
            files,
            timings,
            next_generation: AtomicU64::new(1),
        })
    }

    pub fn capacity(&self) -> usize {
        self.timings.capacity
    }

    /// Opens a fresh batch, discarding whatever an earlier batch still held.
    pub fn create(self: &Arc<Self>, user_id: i64, chat: ChatRef, lang: Lang) {
        if let Some((_, mut previous)) = self.batches.remove(&user_id) {
            previous.stop_debounce();
            log::info!(
                "Replacing merge batch for user {} ({} files discarded)",
                user_id,
                previous.record_ids.len()
            );
            for id in &previous.record_ids {
                self.files.discard_quietly(*id);
            }
        }

        let generation = self.next_generation.fetch_add(1, Ordering::Relaxed);
        let mut batch = MergeBatch::new(user_id, chat, lang, generation);
        self.arm_debounce(&mut batch, self.timings.initial_debounce);
        if let Some(mut raced) = self.batches.insert(user_id, batch) {
            raced.stop_debounce();
            for id in &raced.record_ids {
                self.files.discard_quietly(*id);
            }
        }
        log::info!("Opened merge batch for user {}", user_id);
    }

    pub fn has_batch(&self, user_id: i64) -> bool {
        self.batches.contains_key(&user_id)
    }

    pub fn snapshot(&self, user_id: i64) -> Option<BatchSnapshot> {
        self.batches.get(&user_id).map(|b| BatchSnapshot {
            chat: b.chat,
            lang: b.lang,
            record_ids: b.record_ids.clone(),
            phase: b.phase,
            prompt_message: b.prompt_message,
        })
    }

    pub fn active_count(&self) -> usize {
        self.batches.len()
    }

    /// Appends a document and restarts the quiet-period timer. Returns the new
    /// number of entries. A full batch is left untouched.
    pub fn add_document(self: &Arc<Self>, user_id: i64, record_id: u64) -> RupaResult<usize> {
        let mut batch = self
            .batches
            .get_mut(&user_id)
            .ok_or(RupaError::SessionNotFound(user_id))?;
        if batch.phase == BatchPhase::Merging {
            return Err(RupaError::SessionNotFound(user_id));
        }
        if !batch.push(record_id, self.timings.capacity) {
            return Err(RupaError::BatchFull(batch.record_ids.len()));
        }
        batch.phase = BatchPhase::Collecting;
        self.arm_debounce(&mut batch, self.timings.arrival_debounce);
        Ok(batch.record_ids.len())
    }

    pub async fn reorder(&self, user_id: i64, index: usize, direction: Direction) -> RupaResult<bool> {
        let (moved, confirming) = {
            let mut batch = self
                .batches
                .get_mut(&user_id)
                .ok_or(RupaError::SessionNotFound(user_id))?;
            if batch.phase == BatchPhase::Merging {
                return Ok(false);
            }
            (batch.reorder(index, direction), batch.phase == BatchPhase::Confirming)
        };
        if moved && confirming {
            self.show_prompt(user_id).await;
        }
        Ok(moved)
    }

    /// Drops one entry and its file. Falling below two entries cancels the
    /// batch and discards every remaining file.
    pub async fn remove(&self, user_id: i64, index: usize) -> RupaResult<RemoveOutcome> {
        let (removed, remaining, confirming) = {
            let mut batch = self
                .batches
                .get_mut(&user_id)
                .ok_or(RupaError::SessionNotFound(user_id))?;
            if batch.phase == BatchPhase::Merging {
                return Ok(RemoveOutcome::Unchanged);
            }
            match batch.remove(index) {
                Some(id) => (id, batch.record_ids.len(), batch.phase == BatchPhase::Confirming),
                None => return Ok(RemoveOutcome::Unchanged),
            }
        };
        self.files.discard_quietly(removed);

        if remaining < 2 {
            self.cancel(user_id);
            return Ok(RemoveOutcome::BatchCancelled);
        }
        if confirming {
            self.show_prompt(user_id).await;
        }
        Ok(RemoveOutcome::Removed { remaining })
    }

    /// Merges the documents in their current order. On success the batch and
    /// every constituent file are gone. On failure the batch is left in place
    /// for the caller to cancel.
    pub async fn execute(&self, user_id: i64, transformer: &dyn Transformer) -> RupaResult<Vec<u8>> {
        let (record_ids, generation) = {
            let mut batch = self
                .batches
                .get_mut(&user_id)
                .ok_or(RupaError::SessionNotFound(user_id))?;
            if batch.phase == BatchPhase::Merging {
                return Err(RupaError::SessionNotFound(user_id));
            }
            if batch.record_ids.len() < 2 {
                return Err(RupaError::InsufficientFiles(batch.record_ids.len()));
            }
            batch.stop_debounce();
            batch.phase = BatchPhase::Merging;
            (batch.record_ids.clone(), batch.generation)
        };

        let mut inputs = Vec::with_capacity(record_ids.len());
        for id in &record_ids {
            let (_, bytes) = self.files.open(*id)?;
            inputs.push(bytes);
        }
        let merged = transformer.merge_documents(inputs).await?;

        if self
            .batches
            .remove_if(&user_id, |_, b| b.generation == generation)
            .is_none()
        {
            // Expired while merging; the expiry already cleaned up.
            return Err(RupaError::BatchTimedOut(user_id));
        }
        for id in &record_ids {
            self.files.discard_quietly(*id);
        }
        log::info!("Merged {} documents for user {}", record_ids.len(), user_id);
        Ok(merged)
    }

    pub fn cancel(&self, user_id: i64) -> Option<CancelledBatch> {
        let (_, mut batch) = self.batches.remove(&user_id)?;
        batch.stop_debounce();
        for id in &batch.record_ids {
            self.files.discard_quietly(*id);
        }
        log::info!("Cancelled merge batch for user {}", user_id);
        Some(CancelledBatch {
            chat: batch.chat,
            lang: batch.lang,
            prompt_message: batch.prompt_message,
            discarded: batch.record_ids.len(),
        })
    }

    /// Force-expires batches older than the absolute limit, whatever phase
    /// they are in. Returns how many were expired.
    pub async fn expire_stale(&self, now: Instant) -> usize {
        let max_age = self.timings.max_age;
        let stale: Vec<(i64, u64)> = self
            .batches
            .iter()
            .filter(|b| b.is_older_than(max_age, now))
            .map(|b| (*b.key(), b.generation))
            .collect();

        let mut expired = 0;
        for (user_id, generation) in stale {
            let Some((_, mut batch)) = self
                .batches
                .remove_if(&user_id, |_, b| b.generation == generation)
            else {
                continue;
            };
            batch.stop_debounce();
            for id in &batch.record_ids {
                self.files.discard_quietly(*id);
            }
            expired += 1;
            log::info!("Merge batch for user {} expired", user_id);

            let texts = batch.lang.texts();
            let keyboard = vec![vec![Button::new(texts.start_button, CallbackData::StartBot)]];
            if let Some(prompt) = batch.prompt_message {
                if let Err(e) = self.messenger.delete_message(batch.chat, prompt).await {
                    log::debug!("Failed to delete merge prompt for user {}: {}", user_id, e);
                }
            }
            if let Err(e) = self
                .messenger
                .send_message(batch.chat, texts.merge_expired, Some(keyboard))
                .await
            {
                log::warn!("Failed to send merge expiry to user {}: {}", user_id, e);
            }
        }
        expired
    }

    fn arm_debounce(self: &Arc<Self>, batch: &mut MergeBatch, delay: Duration) {
        batch.stop_debounce();
        batch.debounce_seq += 1;
        let coordinator: Weak<Self> = Arc::downgrade(self);
        let (user_id, generation, seq) = (batch.user_id, batch.generation, batch.debounce_seq);
        batch.debounce = Some(schedule_once(delay, async move {
            if let Some(coordinator) = coordinator.upgrade() {
                coordinator.on_debounce(user_id, generation, seq).await;
            }
        }));
    }

    async fn on_debounce(&self, user_id: i64, generation: u64, seq: u64) {
        let (count, chat, lang) = {
            let Some(mut batch) = self.batches.get_mut(&user_id) else {
                return;
            };
            if batch.generation != generation
                || batch.debounce_seq != seq
                || batch.phase != BatchPhase::Collecting
            {
                return;
            }
            // Own timer: dropped, not cancelled.
            batch.debounce = None;
            let count = batch.record_ids.len();
            if count >= 2 {
                batch.phase = BatchPhase::Confirming;
            }
            (count, batch.chat, batch.lang)
        };

        match count {
            0 => {}
            1 => {
                if let Err(e) = self
                    .messenger
                    .send_message(chat, lang.texts().merge_need_more, None)
                    .await
                {
                    log::warn!("Failed to ask user {} for more files: {}", user_id, e);
                }
            }
            _ => self.show_prompt(user_id).await,
        }
    }

    /// Sends the order prompt, or edits the one already shown.
    pub async fn show_prompt(&self, user_id: i64) {
        let Some((chat, existing, text, keyboard, generation)) = self.render(user_id) else {
            return;
        };

        let message = match existing {
            Some(message) => match self
                .messenger
                .edit_message(chat, message, &text, Some(keyboard.clone()))
                .await
            {
                Ok(()) => Some(message),
                Err(e) => {
                    log::debug!("Merge prompt edit failed for user {}: {}", user_id, e);
                    None
                }
            },
            None => None,
        };
        let message = match message {
            Some(message) => message,
            None => match self.messenger.send_message(chat, &text, Some(keyboard)).await {
                Ok(message) => message,
                Err(e) => {
                    log::warn!("Failed to send merge prompt to user {}: {}", user_id, e);
                    return;
                }
            },
        };

        if let Some(mut batch) = self.batches.get_mut(&user_id) {
            if batch.generation == generation {
                batch.prompt_message = Some(message);
            }
        }
    }

    fn render(&self, user_id: i64) -> Option<(ChatRef, Option<MessageRef>, String, Keyboard, u64)> {
        let (chat, lang, record_ids, prompt, generation) = {
            let batch = self.batches.get(&user_id)?;
            (
                batch.chat,
                batch.lang,
                batch.record_ids.clone(),
                batch.prompt_message,
                batch.generation,
            )
        };
        let texts = lang.texts();

        let mut text = String::from(texts.merge_order);
        text.push('\n');
        let mut keyboard: Keyboard = Vec::with_capacity(record_ids.len() + 1);
        let last = record_ids.len().saturating_sub(1);
        for (index, id) in record_ids.iter().enumerate() {
            let name = match self.files.records().get(*id) {
                Ok(Some(record)) => record.original_name,
                Ok(None) => "?".to_string(),
                Err(e) => {
                    log::warn!("Failed to read record {} for merge prompt: {}", id, e);
                    "?".to_string()
                }
            };
            text.push_str(&format!("\n{}. {}", index + 1, name));

            let mut row = Vec::with_capacity(3);
            if index > 0 {
                row.push(Button::new(
                    format!("⬆️ {}", index + 1),
                    CallbackData::MergeMove {
                        index,
                        direction: Direction::Up,
                    },
                ));
            }
            if index < last {
                row.push(Button::new(
                    format!("⬇️ {}", index + 1),
                    CallbackData::MergeMove {
                        index,
                        direction: Direction::Down,
                    },
                ));
            }
            row.push(Button::new(
                format!("🗑️ {}", index + 1),
                CallbackData::MergeRemove { index },
            ));
            keyboard.push(row);
        }
        keyboard.push(vec![
            Button::new(texts.merge_execute, CallbackData::ExecuteMerge),
            Button::new(texts.merge_cancel, CallbackData::CancelMerge),
        ]);

        Some((chat, prompt, text, keyboard, generation))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RupaConfig;
    use crate::files::records::FileRecord;
    use crate::testing::{create_test_store, FakeTransformer, RecordingMessenger};

    fn setup() -> (Arc<MergeCoordinator>, Arc<RecordingMessenger>, FileStore, tempfile::TempDir) {
        let (store, temp) = create_test_store();
        let messenger = RecordingMessenger::new();
        let coordinator =
            MergeCoordinator::new(messenger.clone(), store.clone(), RupaConfig::default().merge);
        (coordinator, messenger, store, temp)
    }

    fn upload(store: &FileStore, name: &str) -> FileRecord {
        store.persist(1, name, name, name.as_bytes()).unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn test_debounce_waits_for_quiet_period() {
        let (coordinator, messenger, store, _temp) = setup();
        coordinator.create(1, ChatRef(1), Lang::En);

        let a = upload(&store, "a.pdf");
        coordinator.add_document(1, a.id).unwrap();
        tokio::time::sleep(Duration::from_secs(2)).await;
        let b = upload(&store, "b.pdf");
        coordinator.add_document(1, b.id).unwrap();
        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(coordinator.snapshot(1).unwrap().phase, BatchPhase::Collecting);

        tokio::time::sleep(Duration::from_secs(2)).await;
        let snapshot = coordinator.snapshot(1).unwrap();
        assert_eq!(snapshot.phase, BatchPhase::Confirming);
        assert!(snapshot.prompt_message.is_some());
        let prompt = messenger.text_of(snapshot.prompt_message.unwrap()).unwrap();
        assert!(prompt.contains("1. a.pdf") && prompt.contains("2. b.pdf"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_single_file_keeps_collecting() {
        let (coordinator, messenger, store, _temp) = setup();
        coordinator.create(1, ChatRef(1), Lang::En);
        let a = upload(&store, "a.pdf");
        coordinator.add_document(1, a.id).unwrap();

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(coordinator.snapshot(1).unwrap().phase, BatchPhase::Collecting);
        assert!(messenger
            .message_texts()
            .contains(&Lang::En.texts().merge_need_more.to_string()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_capacity_rejects_without_mutation() {
        let (coordinator, _messenger, store, _temp) = setup();
        coordinator.create(1, ChatRef(1), Lang::En);
        for i in 0..10 {
            let record = upload(&store, &format!("{i}.pdf"));
            assert_eq!(coordinator.add_document(1, record.id).unwrap(), i + 1);
        }
        let extra = upload(&store, "extra.pdf");
        assert!(matches!(
            coordinator.add_document(1, extra.id),
            Err(RupaError::BatchFull(10))
        ));
        assert_eq!(coordinator.snapshot(1).unwrap().record_ids.len(), 10);
        assert!(matches!(
            coordinator.add_document(2, extra.id),
            Err(RupaError::SessionNotFound(2))
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_execute_needs_two_files_and_deletes_nothing() {
        let (coordinator, _messenger, store, _temp) = setup();
        let transformer = FakeTransformer::new();
        coordinator.create(1, ChatRef(1), Lang::En);
        assert!(matches!(
            coordinator.execute(1, &transformer).await,
            Err(RupaError::InsufficientFiles(0))
        ));

        let a = upload(&store, "a.pdf");
        coordinator.add_document(1, a.id).unwrap();
        assert!(matches!(
            coordinator.execute(1, &transformer).await,
            Err(RupaError::InsufficientFiles(1))
        ));
        assert!(store.records().get(a.id).unwrap().is_some());
        assert_eq!(coordinator.snapshot(1).unwrap().phase, BatchPhase::Collecting);
    }

    #[tokio::test(start_paused = true)]
    async fn test_remove_below_two_cancels_batch() {
        let (coordinator, _messenger, store, _temp) = setup();
        coordinator.create(1, ChatRef(1), Lang::En);
        let a = upload(&store, "a.pdf");
        let b = upload(&store, "b.pdf");
        coordinator.add_document(1, a.id).unwrap();
        coordinator.add_document(1, b.id).unwrap();

        assert_eq!(
            coordinator.remove(1, 0).await.unwrap(),
            RemoveOutcome::BatchCancelled
        );
        assert!(!coordinator.has_batch(1));
        assert!(store.records().is_empty());
        assert!(!a.storage_path.exists() && !b.storage_path.exists());
    }

    #[tokio::test(start_paused = true)]
    async fn test_remove_keeps_batch_with_two_left() {
        let (coordinator, _messenger, store, _temp) = setup();
        coordinator.create(1, ChatRef(1), Lang::En);
        let ids: Vec<u64> = ["a.pdf", "b.pdf", "c.pdf"]
            .iter()
            .map(|n| upload(&store, n).id)
            .collect();
        for id in &ids {
            coordinator.add_document(1, *id).unwrap();
        }

        assert_eq!(
            coordinator.remove(1, 1).await.unwrap(),
            RemoveOutcome::Removed { remaining: 2 }
        );
        assert_eq!(coordinator.snapshot(1).unwrap().record_ids, vec![ids[0], ids[2]]);
        assert!(store.records().get(ids[1]).unwrap().is_none());
        assert_eq!(coordinator.remove(1, 9).await.unwrap(), RemoveOutcome::Unchanged);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_merge_leaves_batch_for_cancel() {
        let (coordinator, _messenger, store, _temp) = setup();
        let transformer = FakeTransformer::new();
        transformer.fail(true);
        coordinator.create(1, ChatRef(1), Lang::En);
        let a = upload(&store, "a.pdf");
        let b = upload(&store, "b.pdf");
        coordinator.add_document(1, a.id).unwrap();
        coordinator.add_document(1, b.id).unwrap();

        assert!(matches!(
            coordinator.execute(1, &transformer).await,
            Err(RupaError::TransformFailed(_))
        ));
        assert_eq!(coordinator.snapshot(1).unwrap().phase, BatchPhase::Merging);

        let cancelled = coordinator.cancel(1).unwrap();
        assert_eq!(cancelled.discarded, 2);
        assert!(store.records().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_absolute_timeout_wins() {
        let (coordinator, messenger, store, _temp) = setup();
        coordinator.create(1, ChatRef(1), Lang::En);
        let a = upload(&store, "a.pdf");
        let b = upload(&store, "b.pdf");
        coordinator.add_document(1, a.id).unwrap();
        coordinator.add_document(1, b.id).unwrap();
        tokio::time::sleep(Duration::from_secs(10)).await;

        assert_eq!(coordinator.expire_stale(Instant::now()).await, 0);
        tokio::time::sleep(Duration::from_secs(300)).await;
        assert_eq!(coordinator.expire_stale(Instant::now()).await, 1);
        assert_eq!(coordinator.expire_stale(Instant::now()).await, 0);

        assert!(!coordinator.has_batch(1));
        assert!(store.records().is_empty());
        assert!(messenger
            .message_texts()
            .contains(&Lang::En.texts().merge_expired.to_string()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_create_replaces_and_discards_previous() {
        let (coordinator, _messenger, store, _temp) = setup();
        coordinator.create(1, ChatRef(1), Lang::En);
        let a = upload(&store, "a.pdf");
        coordinator.add_document(1, a.id).unwrap();

        coordinator.create(1, ChatRef(1), Lang::En);
        assert!(coordinator.snapshot(1).unwrap().record_ids.is_empty());
        assert!(store.records().get(a.id).unwrap().is_none());
        assert_eq!(coordinator.active_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_expiry_during_merge_wins() {
        let (coordinator, messenger, store, _temp) = setup();
        let transformer = Arc::new(FakeTransformer::new());
        transformer.slow_merges(Duration::from_secs(60));
        coordinator.create(1, ChatRef(1), Lang::En);
        for name in ["a.pdf", "b.pdf"] {
            let record = upload(&store, name);
            coordinator.add_document(1, record.id).unwrap();
        }
        tokio::time::sleep(Duration::from_secs(290)).await;

        let merge = {
            let coordinator = coordinator.clone();
            let transformer = transformer.clone();
            tokio::spawn(async move { coordinator.execute(1, transformer.as_ref()).await })
        };
        tokio::time::sleep(Duration::from_secs(20)).await;
        assert_eq!(coordinator.expire_stale(Instant::now()).await, 1);

        assert!(matches!(
            merge.await.unwrap(),
            Err(RupaError::BatchTimedOut(1))
        ));
        assert!(!coordinator.has_batch(1));
        assert!(store.records().is_empty());
        let notices = messenger
            .message_texts()
            .into_iter()
            .filter(|t| t == Lang::En.texts().merge_expired)
            .count();
        assert_eq!(notices, 1);
    }
}
