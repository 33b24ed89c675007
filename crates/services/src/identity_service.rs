use std::sync::Arc;

use storage::repository::KeyValueRepository;
use study_core::model::{CURRENT_USER_KEY, Identity};
use study_core::{Clock, StorageKey};

use crate::codec;
use crate::error::IdentityServiceError;

/// Declares, forgets and reads back the active identity.
#[derive(Clone)]
pub struct IdentityService {
    repo: Arc<dyn KeyValueRepository>,
    clock: Clock,
}

impl IdentityService {
    #[must_use]
    pub fn new(repo: Arc<dyn KeyValueRepository>, clock: Clock) -> Self {
        Self { repo, clock }
    }

    fn key() -> StorageKey {
        StorageKey::raw(CURRENT_USER_KEY)
    }

    /// Declare `username` as the active identity.
    ///
    /// A storage failure is logged; the identity is still returned and holds
    /// for the rest of the session.
    ///
    /// # Errors
    ///
    /// Returns `IdentityServiceError::Identity` if the trimmed name is empty.
    pub async fn login(&self, username: &str) -> Result<Identity, IdentityServiceError> {
        let identity = Identity::new(username, self.clock.now())?;
        match serde_json::to_string(&identity) {
            Ok(text) => {
                if let Err(err) = self.repo.set(&Self::key(), &text).await {
                    tracing::warn!(error = %err, "could not persist identity");
                }
            }
            Err(err) => tracing::warn!(error = %err, "could not encode identity"),
        }
        tracing::info!(user = identity.username(), "logged in");
        Ok(identity)
    }

    /// Forget the active identity. Stored state is kept.
    pub async fn logout(&self) {
        if let Err(err) = self.repo.remove(&Self::key()).await {
            tracing::warn!(error = %err, "could not remove identity");
        }
        tracing::info!("logged out");
    }

    /// The persisted identity, or `None` (guest) when absent or unreadable.
    pub async fn current(&self) -> Option<Identity> {
        let stored = match self.repo.get(&Self::key()).await {
            Ok(stored) => stored,
            Err(err) => {
                tracing::warn!(error = %err, "could not read identity");
                None
            }
        };
        codec::decode(stored.as_deref(), None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;
    use storage::repository::InMemoryRepository;
    use study_core::model::IdentityError;
    use study_core::time::{fixed_clock, fixed_now};

    fn service() -> (InMemoryRepository, IdentityService) {
        let mem = InMemoryRepository::new();
        let svc = IdentityService::new(Arc::new(mem.clone()), fixed_clock());
        (mem, svc)
    }

    #[tokio::test]
    async fn login_persists_trimmed_identity() {
        let (mem, svc) = service();
        let identity = svc.login("  alice ").await.unwrap();
        assert_eq!(identity.username(), "alice");
        assert_eq!(
            identity.id(),
            format!("user_{}", fixed_now().timestamp_millis())
        );

        let raw = mem.get(&StorageKey::raw("current-user")).await.unwrap().unwrap();
        let value: Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(value["username"], "alice");
        assert!(value.get("loginTime").is_some());

        assert_eq!(svc.current().await, Some(identity));
    }

    #[tokio::test]
    async fn blank_username_is_rejected() {
        let (mem, svc) = service();
        let err = svc.login("   ").await.unwrap_err();
        assert!(matches!(
            err,
            IdentityServiceError::Identity(IdentityError::EmptyUsername)
        ));
        assert!(mem.is_empty().unwrap());
    }

    #[tokio::test]
    async fn logout_and_corrupt_values_mean_guest() {
        let (mem, svc) = service();
        svc.login("bob").await.unwrap();
        svc.logout().await;
        assert_eq!(svc.current().await, None);

        mem.set(&StorageKey::raw("current-user"), "not json").await.unwrap();
        assert_eq!(svc.current().await, None);
    }

    #[tokio::test]
    async fn stored_blank_username_reads_as_guest() {
        let (mem, svc) = service();
        mem.set(
            &StorageKey::raw("current-user"),
            r#"{"username":"  ","loginTime":"2023-11-14T22:13:20Z","id":"x"}"#,
        )
        .await
        .unwrap();
        assert_eq!(svc.current().await, None);
    }
}
