use tokio::time::Instant;

use crate::gateway::{ChatRef, MessageRef};
use crate::lang::Lang;
use crate::timer::TimerHandle;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BatchPhase {
    /// Still accepting documents; the debounce timer is armed.
    Collecting,
    /// Quiet period elapsed and the order prompt is shown.
    Confirming,
    /// Merge is running; the batch no longer changes.
    Merging,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Direction {
    Up,
    Down,
}

pub struct MergeBatch {
    pub user_id: i64,
    pub chat: ChatRef,
    pub lang: Lang,
    pub created_at: Instant,
    pub record_ids: Vec<u64>,
    pub phase: BatchPhase,
    pub prompt_message: Option<MessageRef>,
    pub(crate) generation: u64,
    pub(crate) debounce: Option<TimerHandle>,
    /// Bumped on every (re)armed debounce so a stale firing is a no-op.
    pub(crate) debounce_seq: u64,
}

impl MergeBatch {
    pub fn new(user_id: i64, chat: ChatRef, lang: Lang, generation: u64) -> Self {
        Self {
            user_id,
            chat,
            lang,
            created_at: Instant::now(),
            record_ids: Vec::new(),
            phase: BatchPhase::Collecting,
            prompt_message: None,
            generation,
            debounce: None,
            debounce_seq: 0,
        }
    }

    pub fn awaiting_more(&self) -> bool {
        self.phase == BatchPhase::Collecting
    }

    /// Appends unless the batch is full or already holds the id.
    pub fn push(&mut self, record_id: u64, capacity: usize) -> bool {
        if self.record_ids.len() >= capacity || self.record_ids.contains(&record_id) {
            return false;
        }
        self.record_ids.push(record_id);
        true
    }

    /// Swaps the entry with its neighbour. Returns false when nothing moved.
    pub fn reorder(&mut self, index: usize, direction: Direction) -> bool {
        let len = self.record_ids.len();
        if index >= len {
            return false;
        }
        let other = match direction {
            Direction::Up if index > 0 => index - 1,
            Direction::Down if index + 1 < len => index + 1,
            _ => return false,
        };
        self.record_ids.swap(index, other);
        true
    }

    pub fn remove(&mut self, index: usize) -> Option<u64> {
        (index < self.record_ids.len()).then(|| self.record_ids.remove(index))
    }

    pub fn is_older_than(&self, max_age: std::time::Duration, now: Instant) -> bool {
        now.saturating_duration_since(self.created_at) > max_age
    }

    pub(crate) fn stop_debounce(&mut self) {
        if let Some(timer) = self.debounce.take() {
            timer.cancel();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn batch_with(ids: &[u64]) -> MergeBatch {
        let mut batch = MergeBatch::new(1, ChatRef(1), Lang::En, 1);
        for id in ids {
            assert!(batch.push(*id, 10));
        }
        batch
    }

    #[tokio::test]
    async fn test_reorder_boundaries() {
        let mut batch = batch_with(&[10, 20, 30]);
        assert!(!batch.reorder(0, Direction::Up));
        assert_eq!(batch.record_ids, vec![10, 20, 30]);
        assert!(!batch.reorder(2, Direction::Down));
        assert!(!batch.reorder(7, Direction::Up));
        assert_eq!(batch.record_ids, vec![10, 20, 30]);
    }

    #[tokio::test]
    async fn test_reorder_down_then_up_restores() {
        let mut batch = batch_with(&[10, 20, 30]);
        assert!(batch.reorder(0, Direction::Down));
        assert_eq!(batch.record_ids, vec![20, 10, 30]);
        // the moved entry now sits at index 1
        assert!(!batch.reorder(0, Direction::Up));
        assert!(batch.reorder(1, Direction::Up));
        assert_eq!(batch.record_ids, vec![10, 20, 30]);
    }

    #[tokio::test]
    async fn test_push_rejects_full_and_duplicates() {
        let mut batch = batch_with(&[1, 2]);
        assert!(!batch.push(2, 10));
        assert!(!batch.push(3, 2));
        assert_eq!(batch.record_ids, vec![1, 2]);
        assert_eq!(batch.remove(0), Some(1));
        assert_eq!(batch.remove(5), None);
        assert_eq!(batch.record_ids, vec![2]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_age() {
        let batch = batch_with(&[]);
        let max_age = Duration::from_secs(300);
        assert!(!batch.is_older_than(max_age, Instant::now()));
        tokio::time::advance(Duration::from_secs(301)).await;
        assert!(batch.is_older_than(max_age, Instant::now()));
    }
}
