use crate::cache::CacheError;
use crate::cache::models::card::CardQueryKey;
use crate::cache::operations::card::QueryCache;

/// Card public ids shorter than this are placeholders that have not been
/// resolved yet and must never key a cache operation.
pub const DEFAULT_MIN_CARD_PUBLIC_ID_LEN: usize = 12;

/// Invalidates cached `card.byId` results after a card mutation.
#[derive(Debug, Clone, Copy)]
pub struct CardCacheInvalidator {
    min_len: usize,
}

impl Default for CardCacheInvalidator {
    fn default() -> Self {
        Self::new(DEFAULT_MIN_CARD_PUBLIC_ID_LEN)
    }
}

impl CardCacheInvalidator {
    pub fn new(min_len: usize) -> Self {
        Self { min_len }
    }

    pub fn min_len(&self) -> usize {
        self.min_len
    }

    /// Whether `card_public_id` is long enough to key a cache operation.
    /// Length is counted in characters.
    pub fn accepts(&self, card_public_id: &str) -> bool {
        !card_public_id.is_empty() && card_public_id.chars().count() >= self.min_len
    }

    /// Returns `Ok(false)` without touching `cache` for empty or short ids.
    /// Otherwise awaits a single invalidation and returns `Ok(true)`; errors
    /// from `cache` are returned as they are.
    pub async fn invalidate_card<C>(
        &self,
        cache: &C,
        card_public_id: &str,
    ) -> Result<bool, CacheError>
    where
        C: QueryCache + ?Sized,
    {
        if !self.accepts(card_public_id) {
            tracing::debug!(
                "Skipping invalidation for unresolved card id {:?}",
                card_public_id
            );
            return Ok(false);
        }

        cache
            .invalidate(&CardQueryKey::by_id(card_public_id))
            .await?;
        Ok(true)
    }
}
