//! JSON encode/decode helpers for the byte-slice values redb tables store.

use memory_core::error::{Error, Result};
use memory_core::types::{NuanceReview, StaleMemoryItem, WorkingMemoryItem};

pub(crate) fn encode_working_memory_item(item: &WorkingMemoryItem) -> Result<Vec<u8>> {
    serde_json::to_vec(item).map_err(Error::from)
}

pub(crate) fn decode_working_memory_item(bytes: &[u8]) -> Result<WorkingMemoryItem> {
    serde_json::from_slice(bytes).map_err(Error::from)
}

pub(crate) fn encode_stale_item(item: &StaleMemoryItem) -> Result<Vec<u8>> {
    serde_json::to_vec(item).map_err(Error::from)
}

pub(crate) fn decode_stale_item(bytes: &[u8]) -> Result<StaleMemoryItem> {
    serde_json::from_slice(bytes).map_err(Error::from)
}

pub(crate) fn encode_nuance_review(review: &NuanceReview) -> Result<Vec<u8>> {
    serde_json::to_vec(review).map_err(Error::from)
}

pub(crate) fn decode_nuance_review(bytes: &[u8]) -> Result<NuanceReview> {
    serde_json::from_slice(bytes).map_err(Error::from)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use uuid::Uuid;

    #[test]
    fn working_memory_item_round_trips() {
        let item = WorkingMemoryItem {
            id: Uuid::new_v4(),
            content: "note".into(),
            importance: 0.6,
            last_accessed: Utc::now(),
            created_at: Utc::now(),
        };
        let bytes = encode_working_memory_item(&item).unwrap();
        let decoded = decode_working_memory_item(&bytes).unwrap();
        assert_eq!(decoded.id, item.id);
        assert_eq!(decoded.content, item.content);
    }
}
