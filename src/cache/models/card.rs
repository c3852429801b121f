use serde::{Deserialize, Serialize};

use crate::cache::keys::card_by_id_key;

/// Descriptor of the `card.byId` query scoped to one card.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq, Hash)]
#[serde(rename_all = "camelCase")]
pub struct CardQueryKey {
    pub namespace: String,
    pub procedure: String,
    pub card_public_id: String,
}

impl CardQueryKey {
    pub fn by_id(card_public_id: &str) -> Self {
        Self {
            namespace: "card".into(),
            procedure: "byId".into(),
            card_public_id: card_public_id.to_string(),
        }
    }

    /// Storage key of the cached result this descriptor addresses.
    pub fn cache_key(&self) -> String {
        card_by_id_key(&self.card_public_id)
    }
}

/// A cached query result held by the in-memory query cache.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct CachedQuery {
    pub data: serde_json::Value,
    pub stale: bool,
    pub updated_at: i64, // Unix timestamp (ms)
}
