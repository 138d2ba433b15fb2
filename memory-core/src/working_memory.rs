//! Bounded working-memory buffer with LRU-plus-importance-floor eviction.

use chrono::Utc;
use uuid::Uuid;

use crate::constants::defaults;
use crate::types::{ArchivalReason, StaleMemoryItem, WorkingMemoryItem};

/// In-process working-memory buffer, capacity `C` (default
/// [`defaults::WORKING_MEMORY_CAPACITY`]).
///
/// Items with `importance <= CRITICAL_IMPORTANCE_FLOOR` are evictable under
/// normal pressure. If every item is above the floor (all "critical"), the
/// oldest-by-`last_accessed` critical item is force-evicted rather than
/// refusing the insert.
#[derive(Debug)]
pub struct WorkingMemory {
    capacity: usize,
    items: Vec<WorkingMemoryItem>,
}

/// Result of inserting into a full buffer.
#[derive(Debug, Clone)]
pub struct EvictionOutcome {
    pub evicted: StaleMemoryItem,
    pub forced: bool,
}

impl WorkingMemory {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            items: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_default_capacity() -> Self {
        Self::new(defaults::WORKING_MEMORY_CAPACITY)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    #[must_use]
    pub fn items(&self) -> &[WorkingMemoryItem] {
        &self.items
    }

    /// Mark `id` as freshly accessed, bumping its recency.
    pub fn touch(&mut self, id: Uuid) {
        if let Some(item) = self.items.iter_mut().find(|i| i.id == id) {
            item.last_accessed = Utc::now();
        }
    }

    /// Insert a new item, evicting the least-recently-used evictable item
    /// if the buffer is already at capacity. Returns the evicted item, if
    /// any eviction was necessary.
    pub fn insert(&mut self, item: WorkingMemoryItem) -> Option<EvictionOutcome> {
        let outcome = if self.items.len() >= self.capacity {
            Some(self.evict_one())
        } else {
            None
        };
        self.items.push(item);
        outcome
    }

    fn evict_one(&mut self) -> EvictionOutcome {
        let evictable_idx = self
            .items
            .iter()
            .enumerate()
            .filter(|(_, i)| i.importance <= defaults::CRITICAL_IMPORTANCE_FLOOR)
            .min_by_key(|(_, i)| i.last_accessed)
            .map(|(idx, _)| idx);

        let (idx, forced) = match evictable_idx {
            Some(idx) => (idx, false),
            None => {
                let idx = self
                    .items
                    .iter()
                    .enumerate()
                    .min_by_key(|(_, i)| i.last_accessed)
                    .map(|(idx, _)| idx)
                    .expect("buffer at capacity implies at least one item");
                (idx, true)
            }
        };

        let removed = self.items.remove(idx);
        EvictionOutcome {
            evicted: StaleMemoryItem {
                id: removed.id,
                original_content: removed.content,
                archived_at: Utc::now(),
                importance: removed.importance,
                reason: ArchivalReason::LruEviction,
            },
            forced,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn item(importance: f32, minutes_ago: i64) -> WorkingMemoryItem {
        WorkingMemoryItem {
            id: Uuid::new_v4(),
            content: "content".into(),
            importance,
            last_accessed: Utc::now() - Duration::minutes(minutes_ago),
            created_at: Utc::now() - Duration::minutes(minutes_ago),
        }
    }

    #[test]
    fn inserts_below_capacity_do_not_evict() {
        let mut wm = WorkingMemory::new(3);
        assert!(wm.insert(item(0.5, 0)).is_none());
        assert!(wm.insert(item(0.5, 0)).is_none());
        assert_eq!(wm.len(), 2);
    }

    #[test]
    fn evicts_least_recently_used_evictable_item() {
        let mut wm = WorkingMemory::new(2);
        let old = item(0.3, 100);
        let recent = item(0.3, 1);
        wm.insert(old.clone());
        wm.insert(recent);
        let outcome = wm.insert(item(0.3, 0)).expect("buffer full, must evict");
        assert_eq!(outcome.evicted.id, old.id);
        assert!(!outcome.forced);
    }

    #[test]
    fn never_evicts_items_above_the_critical_floor_unless_forced() {
        let mut wm = WorkingMemory::new(2);
        let critical_old = item(0.9, 100);
        let evictable_recent = item(0.2, 1);
        wm.insert(critical_old.clone());
        wm.insert(evictable_recent.clone());
        let outcome = wm.insert(item(0.9, 0)).expect("buffer full, must evict");
        assert_eq!(outcome.evicted.id, evictable_recent.id);
        assert!(!outcome.forced);
    }

    #[test]
    fn force_evicts_oldest_critical_item_when_all_are_critical() {
        let mut wm = WorkingMemory::new(2);
        let oldest = item(0.9, 200);
        let newer = item(0.95, 50);
        wm.insert(oldest.clone());
        wm.insert(newer);
        let outcome = wm.insert(item(0.99, 0)).expect("buffer full, must evict");
        assert_eq!(outcome.evicted.id, oldest.id);
        assert!(outcome.forced);
    }
}
