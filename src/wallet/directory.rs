use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use serde::{Deserialize, Serialize};

use super::normalize_public_key_hex;
use crate::error::WalletError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Student,
    Validator,
    Admin,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WalletRecord {
    pub public_key: String,
    pub role: Role,
}

/// Wallet lookups the ledger depends on. Storage lives elsewhere.
pub trait WalletDirectory: Send + Sync {
    /// Registered public key of `user_id` (lowercase compressed hex).
    fn resolve_public_key(&self, user_id: &str) -> Option<String>;

    fn is_validator(&self, user_id: &str) -> bool;
}

/// Process-local wallet directory.
#[derive(Debug, Default)]
pub struct InMemoryWallets {
    wallets: RwLock<HashMap<String, WalletRecord>>,
}

impl InMemoryWallets {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a wallet once per user. The key is stored normalized.
    pub fn register(&self, user_id: &str, public_key: &str, role: Role) -> Result<(), WalletError> {
        let public_key = normalize_public_key_hex(public_key)?;
        let mut wallets = self.wallets.write().unwrap_or_else(PoisonError::into_inner);
        if wallets.contains_key(user_id) {
            return Err(WalletError::AlreadyRegistered(user_id.to_string()));
        }
        wallets.insert(user_id.to_string(), WalletRecord { public_key, role });
        Ok(())
    }

    pub fn get(&self, user_id: &str) -> Option<WalletRecord> {
        self.wallets
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(user_id)
            .cloned()
    }
}

impl WalletDirectory for InMemoryWallets {
    fn resolve_public_key(&self, user_id: &str) -> Option<String> {
        self.get(user_id).map(|w| w.public_key)
    }

    fn is_validator(&self, user_id: &str) -> bool {
        self.get(user_id).is_some_and(|w| w.role == Role::Validator)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wallet::generate_keypair_hex;

    #[test]
    fn register_is_once_per_user() {
        let wallets = InMemoryWallets::new();
        let (_, pk) = generate_keypair_hex();
        wallets.register("alice", &pk, Role::Student).unwrap();
        assert_eq!(
            wallets.register("alice", &pk, Role::Validator),
            Err(WalletError::AlreadyRegistered("alice".into()))
        );
        assert_eq!(wallets.resolve_public_key("alice"), Some(pk));
        assert!(!wallets.is_validator("alice"));
    }

    #[test]
    fn only_validator_role_is_authorized() {
        let wallets = InMemoryWallets::new();
        let (_, pk) = generate_keypair_hex();
        wallets.register("vera", &pk, Role::Validator).unwrap();
        let (_, pk) = generate_keypair_hex();
        wallets.register("root", &pk, Role::Admin).unwrap();

        assert!(wallets.is_validator("vera"));
        assert!(!wallets.is_validator("root"));
        assert!(!wallets.is_validator("nobody"));
    }

    #[test]
    fn invalid_key_is_not_stored() {
        let wallets = InMemoryWallets::new();
        assert_eq!(
            wallets.register("bob", "abc", Role::Student),
            Err(WalletError::InvalidPublicKey)
        );
        assert!(wallets.get("bob").is_none());
    }
}
