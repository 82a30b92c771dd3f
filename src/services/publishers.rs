//! Authorized publisher registry.

use std::collections::HashMap;

use alloy::primitives::Address;
use tokio::sync::RwLock;
use tracing::info;

use crate::error::{AppError, Result};

/// Owner-managed set of publishers whose signatures are trusted.
///
/// One registry exists at the origin (who may have rounds endorsed) and one
/// per destination (whose attestations are applied).
#[derive(Debug)]
pub struct PublisherRegistry {
    owner: Address,
    authorized: RwLock<HashMap<Address, bool>>,
}

impl PublisherRegistry {
    /// Create an empty registry owned by `owner`.
    pub fn new(owner: Address) -> Self {
        Self { owner, authorized: RwLock::new(HashMap::new()) }
    }

    /// Create a registry with an initial set of authorized publishers.
    pub fn with_publishers(owner: Address, publishers: impl IntoIterator<Item = Address>) -> Self {
        let authorized = publishers.into_iter().map(|p| (p, true)).collect();
        Self { owner, authorized: RwLock::new(authorized) }
    }

    /// Registry owner.
    pub fn owner(&self) -> Address {
        self.owner
    }

    /// Grant or revoke publisher rights. Only the owner may call this.
    pub async fn set_authorized_publisher(
        &self,
        caller: Address,
        publisher: Address,
        authorized: bool,
    ) -> Result<()> {
        if caller != self.owner {
            return Err(AppError::NotOwner(caller));
        }

        self.authorized.write().await.insert(publisher, authorized);
        info!(publisher = %publisher, authorized, "Authorized publisher updated");
        Ok(())
    }

    /// Whether `publisher` is currently authorized.
    pub async fn is_authorized(&self, publisher: Address) -> bool {
        self.authorized.read().await.get(&publisher).copied().unwrap_or(false)
    }

    /// All currently authorized publishers.
    pub async fn publishers(&self) -> Vec<Address> {
        let guard = self.authorized.read().await;
        let mut list: Vec<Address> =
            guard.iter().filter(|(_, authorized)| **authorized).map(|(a, _)| *a).collect();
        list.sort();
        list
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use alloy::primitives::address;

    const OWNER: Address = address!("0101010101010101010101010101010101010101");
    const PUBLISHER: Address = address!("0202020202020202020202020202020202020202");

    #[tokio::test]
    async fn test_unknown_publisher_is_not_authorized() {
        let registry = PublisherRegistry::new(OWNER);
        assert!(!registry.is_authorized(PUBLISHER).await);
        assert!(registry.publishers().await.is_empty());
    }

    #[tokio::test]
    async fn test_owner_can_grant_and_revoke() {
        let registry = PublisherRegistry::new(OWNER);

        registry.set_authorized_publisher(OWNER, PUBLISHER, true).await.unwrap();
        assert!(registry.is_authorized(PUBLISHER).await);
        assert_eq!(registry.publishers().await, vec![PUBLISHER]);

        registry.set_authorized_publisher(OWNER, PUBLISHER, false).await.unwrap();
        assert!(!registry.is_authorized(PUBLISHER).await);
        assert!(registry.publishers().await.is_empty());
    }

    #[tokio::test]
    async fn test_non_owner_cannot_mutate() {
        let registry = PublisherRegistry::new(OWNER);

        let result = registry.set_authorized_publisher(PUBLISHER, PUBLISHER, true).await;
        assert!(matches!(result, Err(AppError::NotOwner(caller)) if caller == PUBLISHER));
        assert!(!registry.is_authorized(PUBLISHER).await);
    }

    #[tokio::test]
    async fn test_with_publishers_seeds_set() {
        let registry = PublisherRegistry::with_publishers(OWNER, [PUBLISHER]);
        assert!(registry.is_authorized(PUBLISHER).await);
        assert_eq!(registry.owner(), OWNER);
    }
}
