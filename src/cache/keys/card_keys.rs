/// Prefix of cached `card.byId` query results.
const CARD_BY_ID_PREFIX: &str = "query:card.byId:";

/// Channel announcing invalidated query keys to other consumers.
pub const QUERY_INVALIDATE_CHANNEL: &str = "query:invalidate";

pub fn card_by_id_key(card_public_id: &str) -> String {
    format!("{}{}", CARD_BY_ID_PREFIX, card_public_id)
}
