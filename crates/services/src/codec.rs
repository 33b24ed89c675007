use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use study_core::key::GUEST;

use crate::error::CodecError;

/// Envelope field holding the write time.
pub const TIMESTAMP_FIELD: &str = "timestamp";
/// Envelope field holding the writer's identity name.
pub const USER_FIELD: &str = "user";

/// A decoded envelope: the state plus the injected fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope<T> {
    #[serde(flatten)]
    pub state: T,
    pub timestamp: i64,
    pub user: String,
}

/// Serialize `state` with `timestamp` and `user` merged in.
///
/// # Errors
///
/// Returns `CodecError::NotAnObject` if `state` does not serialize to a JSON
/// object, or `CodecError::Json` if serialization fails.
pub fn encode<T: Serialize + ?Sized>(
    state: &T,
    identity_name: Option<&str>,
    now_millis: i64,
) -> Result<String, CodecError> {
    let Value::Object(mut fields) = serde_json::to_value(state)? else {
        return Err(CodecError::NotAnObject);
    };
    fields.insert(TIMESTAMP_FIELD.to_string(), Value::from(now_millis));
    fields.insert(
        USER_FIELD.to_string(),
        Value::from(identity_name.unwrap_or(GUEST)),
    );
    Ok(serde_json::to_string(&Value::Object(fields))?)
}

/// Parse stored text, returning `fallback` when absent or undecodable.
#[must_use]
pub fn decode<T: DeserializeOwned>(text: Option<&str>, fallback: T) -> T {
    let Some(text) = text else {
        return fallback;
    };
    match serde_json::from_str(text) {
        Ok(state) => state,
        Err(err) => {
            tracing::debug!(error = %err, "stored state is not decodable; using default");
            fallback
        }
    }
}

/// Parse stored text including the envelope fields.
///
/// # Errors
///
/// Returns `CodecError::Json` if the text is not a valid envelope.
pub fn decode_envelope<T: DeserializeOwned>(text: &str) -> Result<Envelope<T>, CodecError> {
    Ok(serde_json::from_str(text)?)
}
