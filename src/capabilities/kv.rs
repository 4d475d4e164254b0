use crux_core::capability::{Capability, CapabilityContext, Operation};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const MAX_KEY_LENGTH: usize = 512;

/// Key of the one-day cookie that suppresses the welcome popup after
/// the first visit.
pub const WELCOME_SEEN_KEY: &str = "welcome_seen";

/// Small string store backed by whatever the shell has: cookies on the
/// web, `SharedPreferences`/`UserDefaults` on mobile.
#[derive(Clone)]
pub struct KeyValue<E> {
    context: CapabilityContext<KvOperation, E>,
}

/// `Kv`-prefixed alias matching the rest of this module's naming
/// (`KvError`, `KvOperation`, `KvOutput`). Used for the `Capabilities`
/// field so the generated `Effect::Kv` variant name is consistent.
pub type Kv<E> = KeyValue<E>;

impl<Ev> Capability<Ev> for KeyValue<Ev> {
    type Operation = KvOperation;
    type MappedSelf<MappedEv> = KeyValue<MappedEv>;

    fn map_event<F, NewEv>(&self, f: F) -> Self::MappedSelf<NewEv>
    where
        F: Fn(NewEv) -> Ev + Send + Sync + 'static,
        Ev: 'static,
        NewEv: 'static + Send,
    {
        KeyValue::new(self.context.map_event(f))
    }
}

impl<Ev> KeyValue<Ev>
where
    Ev: 'static,
{
    pub fn new(context: CapabilityContext<KvOperation, Ev>) -> Self {
        Self { context }
    }

    pub fn get<F>(&self, key: impl Into<String>, callback: F)
    where
        F: FnOnce(KvResult) -> Ev + Send + 'static,
    {
        let key = key.into();
        debug_assert!(validate_key(&key).is_ok());
        let context = self.context.clone();
        self.context.spawn(async move {
            let result = context.request_from_shell(KvOperation::Get { key }).await;
            context.update_app(callback(result));
        });
    }

    pub fn set<F>(&self, key: impl Into<String>, value: impl Into<String>, callback: F)
    where
        F: FnOnce(KvResult) -> Ev + Send + 'static,
    {
        let key = key.into();
        let value = value.into();
        debug_assert!(validate_key(&key).is_ok());
        let context = self.context.clone();
        self.context.spawn(async move {
            let result = context
                .request_from_shell(KvOperation::Set { key, value })
                .await;
            context.update_app(callback(result));
        });
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum KvOperation {
    Get { key: String },
    Set { key: String, value: String },
}

impl Operation for KvOperation {
    type Output = KvResult;
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum KvOutput {
    Value(Option<String>),
    Written,
}

#[derive(Debug, Clone, Error, Serialize, Deserialize, PartialEq, Eq)]
pub enum KvError {
    #[error("invalid key '{key}': {reason}")]
    InvalidKey { key: String, reason: String },

    #[error("store unavailable: {reason}")]
    Unavailable { reason: String },

    #[error("write failed: {reason}")]
    WriteFailed { reason: String },
}

pub type KvResult = Result<KvOutput, KvError>;

pub fn validate_key(key: &str) -> Result<(), KvError> {
    if key.trim().is_empty() {
        return Err(KvError::InvalidKey {
            key: key.to_string(),
            reason: "key cannot be empty".to_string(),
        });
    }
    if key.len() > MAX_KEY_LENGTH {
        return Err(KvError::InvalidKey {
            key: key.chars().take(50).collect::<String>() + "...",
            reason: format!("key exceeds maximum length of {MAX_KEY_LENGTH} bytes"),
        });
    }
    for c in key.chars() {
        if c.is_control() || c == '=' || c == ';' {
            return Err(KvError::InvalidKey {
                key: key.to_string(),
                reason: "key contains characters a cookie name cannot hold".to_string(),
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_welcome_key_is_valid() {
        assert!(validate_key(WELCOME_SEEN_KEY).is_ok());
    }

    #[test]
    fn test_empty_key_rejected() {
        assert!(validate_key("").is_err());
        assert!(validate_key("   ").is_err());
    }

    #[test]
    fn test_cookie_delimiters_rejected() {
        assert!(validate_key("a=b").is_err());
        assert!(validate_key("a;b").is_err());
        assert!(validate_key("a\nb").is_err());
    }

    #[test]
    fn test_overlong_key_rejected() {
        assert!(validate_key(&"k".repeat(MAX_KEY_LENGTH + 1)).is_err());
    }
}
