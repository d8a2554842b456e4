//! The bidirectional mapping cache: a single map keyed by
//! helpdesk message id, holding the provider message id plus the
//! conversation/inbox/dialect/tenant tags needed to route replies and
//! deletions. Reverse lookups by provider id are a linear scan; the cache
//! is small and ephemeral by design, wiped wholesale every 5 hours.

use bridge_core::Dialect;
use dashmap::DashMap;

#[derive(Debug, Clone)]
pub struct MappingEntry {
    pub provider_msg_id: String,
    pub conversation_id: String,
    pub inbox_id: String,
    pub provider_dialect: Dialect,
    pub tenant_id: String,
}

#[derive(Default)]
pub struct MappingCache {
    by_helpdesk_id: DashMap<String, MappingEntry>,
}

impl MappingCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn store(&self, helpdesk_msg_id: impl Into<String>, entry: MappingEntry) {
        self.by_helpdesk_id.insert(helpdesk_msg_id.into(), entry);
    }

    pub fn get_by_helpdesk_id(&self, helpdesk_msg_id: &str) -> Option<MappingEntry> {
        self.by_helpdesk_id
            .get(helpdesk_msg_id)
            .map(|r| r.value().clone())
    }

    /// Linear scan for the helpdesk id that maps to `provider_msg_id`.
    /// Acceptable at the scale implied by the 5-hour wipe.
    pub fn get_helpdesk_id_by_provider_id(&self, provider_msg_id: &str) -> Option<String> {
        self.by_helpdesk_id
            .iter()
            .find(|entry| entry.value().provider_msg_id == provider_msg_id)
            .map(|entry| entry.key().clone())
    }

    pub fn remove_by_helpdesk_id(&self, helpdesk_msg_id: &str) -> Option<MappingEntry> {
        self.by_helpdesk_id
            .remove(helpdesk_msg_id)
            .map(|(_, entry)| entry)
    }

    /// Wipes the entire cache. Called by the global 5-hour eviction timer
    /// alongside the credit ledger's wipe.
    pub fn clear(&self) {
        self.by_helpdesk_id.clear();
    }

    pub fn len(&self) -> usize {
        self.by_helpdesk_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_helpdesk_id.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(provider_msg_id: &str) -> MappingEntry {
        MappingEntry {
            provider_msg_id: provider_msg_id.to_string(),
            conversation_id: "7".into(),
            inbox_id: "3".into(),
            provider_dialect: Dialect::Uazapi,
            tenant_id: "default".into(),
        }
    }

    #[test]
    fn round_trip_both_directions() {
        let cache = MappingCache::new();
        cache.store("42", entry("ABC"));
        assert_eq!(cache.get_by_helpdesk_id("42").unwrap().provider_msg_id, "ABC");
        assert_eq!(
            cache.get_helpdesk_id_by_provider_id("ABC").as_deref(),
            Some("42")
        );
    }

    #[test]
    fn removal_clears_both_directions() {
        let cache = MappingCache::new();
        cache.store("42", entry("ABC"));
        cache.remove_by_helpdesk_id("42");
        assert!(cache.get_by_helpdesk_id("42").is_none());
        assert!(cache.get_helpdesk_id_by_provider_id("ABC").is_none());
    }

    #[test]
    fn clear_wipes_everything() {
        let cache = MappingCache::new();
        cache.store("1", entry("A"));
        cache.store("2", entry("B"));
        cache.clear();
        assert!(cache.is_empty());
    }

    #[test]
    fn unknown_ids_return_none() {
        let cache = MappingCache::new();
        assert!(cache.get_by_helpdesk_id("missing").is_none());
        assert!(cache.get_helpdesk_id_by_provider_id("missing").is_none());
    }
}
