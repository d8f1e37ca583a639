use std::collections::HashSet;
use std::sync::Mutex;

use crate::block_store::BlockStore;

/// In-memory view of the known peer set, backed by the Block Store's
/// peer table (§4.2) for persistence across a reconcile cycle. Holds
/// only address strings; `last_seen`/`reputation` live in the store.
pub struct PeerRegistry {
    addresses: Mutex<HashSet<String>>,
}

/// Splits `address` into its scheme+authority (e.g. `http://host:port`),
/// discarding any path/query/fragment. Returns `None` if the address has
/// no recognizable scheme or authority.
fn scheme_and_authority(address: &str) -> Option<String> {
    let (scheme, rest) = address.split_once("://")?;
    if scheme.is_empty() {
        return None;
    }
    let authority = rest.split(['/', '?', '#']).next().unwrap_or("");
    if authority.is_empty() {
        return None;
    }
    Some(format!("{scheme}://{authority}"))
}

impl PeerRegistry {
    #[must_use]
    pub fn load_from(store: &BlockStore) -> Self {
        let addresses = store
            .list_peers()
            .into_iter()
            .map(|peer| peer.address)
            .collect();
        Self {
            addresses: Mutex::new(addresses),
        }
    }

    /// Registers `address` as a peer unless it is malformed or equal to
    /// `self_address`. Returns whether it was newly added.
    pub fn register(&self, address: &str, self_address: &str) -> Option<String> {
        let normalized = scheme_and_authority(address)?;
        let self_normalized = scheme_and_authority(self_address);
        if self_normalized.as_deref() == Some(normalized.as_str()) {
            return None;
        }
        let mut guard = self.addresses.lock().expect("peer registry mutex poisoned");
        guard.insert(normalized.clone());
        Some(normalized)
    }

    #[must_use]
    pub fn snapshot(&self) -> Vec<String> {
        self.addresses
            .lock()
            .expect("peer registry mutex poisoned")
            .iter()
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_normalizes_to_scheme_and_authority() {
        let store = BlockStore::new();
        let registry = PeerRegistry::load_from(&store);
        let normalized = registry
            .register("http://example.com:8000/peers/register", "http://me:9000")
            .unwrap();
        assert_eq!(normalized, "http://example.com:8000");
    }

    #[test]
    fn register_rejects_self_and_malformed_addresses() {
        let store = BlockStore::new();
        let registry = PeerRegistry::load_from(&store);
        assert!(registry.register("not-a-url", "http://me:9000").is_none());
        assert!(registry
            .register("http://me:9000", "http://me:9000")
            .is_none());
    }

    #[test]
    fn snapshot_reflects_registrations() {
        let store = BlockStore::new();
        let registry = PeerRegistry::load_from(&store);
        registry.register("http://a:1", "http://me:9000");
        registry.register("http://b:2", "http://me:9000");
        let mut peers = registry.snapshot();
        peers.sort();
        assert_eq!(peers, vec!["http://a:1".to_string(), "http://b:2".to_string()]);
    }
}
