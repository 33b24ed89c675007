use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Fixed storage key holding the active identity.
pub const CURRENT_USER_KEY: &str = "current-user";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum IdentityError {
    #[error("username cannot be empty")]
    EmptyUsername,
}

/// A locally declared user label.
///
/// Its only purpose is to namespace storage keys; there is no credential
/// attached and presence of a persisted identity is the whole login signal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", try_from = "StoredIdentity")]
pub struct Identity {
    username: String,
    login_time: DateTime<Utc>,
    id: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoredIdentity {
    username: String,
    login_time: DateTime<Utc>,
    id: String,
}

impl TryFrom<StoredIdentity> for Identity {
    type Error = IdentityError;

    fn try_from(stored: StoredIdentity) -> Result<Self, Self::Error> {
        let username = stored.username.trim();
        if username.is_empty() {
            return Err(IdentityError::EmptyUsername);
        }
        Ok(Self {
            username: username.to_string(),
            login_time: stored.login_time,
            id: stored.id,
        })
    }
}

impl Identity {
    /// Declare a new identity at `now`.
    ///
    /// # Errors
    ///
    /// Returns `IdentityError::EmptyUsername` if the trimmed name is empty.
    pub fn new(username: impl Into<String>, now: DateTime<Utc>) -> Result<Self, IdentityError> {
        let username = username.into().trim().to_string();
        if username.is_empty() {
            return Err(IdentityError::EmptyUsername);
        }
        Ok(Self {
            username,
            login_time: now,
            id: format!("user_{}", now.timestamp_millis()),
        })
    }

    #[must_use]
    pub fn username(&self) -> &str {
        &self.username
    }

    #[must_use]
    pub fn login_time(&self) -> DateTime<Utc> {
        self.login_time
    }

    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }
}

/// Name segment used for key derivation, `None` for guests.
#[must_use]
pub fn identity_name(identity: Option<&Identity>) -> Option<&str> {
    identity.map(Identity::username)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::fixed_now;

    #[test]
    fn new_trims_and_stamps() {
        let identity = Identity::new("  alice ", fixed_now()).unwrap();
        assert_eq!(identity.username(), "alice");
        assert_eq!(identity.login_time(), fixed_now());
        assert_eq!(identity.id(), "user_1700000000000");
    }

    #[test]
    fn rejects_blank_username() {
        assert_eq!(
            Identity::new("   ", fixed_now()).unwrap_err(),
            IdentityError::EmptyUsername
        );
    }

    #[test]
    fn serializes_with_login_time_field() {
        let identity = Identity::new("bob", fixed_now()).unwrap();
        let json = serde_json::to_value(&identity).unwrap();
        assert_eq!(json["username"], "bob");
        assert_eq!(json["loginTime"], "2023-11-14T22:13:20Z");
        assert_eq!(json["id"], "user_1700000000000");
    }

    #[test]
    fn stored_names_are_checked_like_new_ones() {
        let blank = r#"{"username":"  ","loginTime":"2023-11-14T22:13:20Z","id":"x"}"#;
        assert!(serde_json::from_str::<Identity>(blank).is_err());

        let padded = r#"{"username":" carol ","loginTime":"2023-11-14T22:13:20Z","id":"x"}"#;
        let identity: Identity = serde_json::from_str(padded).unwrap();
        assert_eq!(identity.username(), "carol");
    }
}
