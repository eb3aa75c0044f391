//! Anonymous-admin identity proofs.
//!
//! A command sent by an anonymous admin arrives from a channel proxy, so
//! the sender cannot be permission-checked directly. The pipeline parks a
//! resume intent - command name, original args and the originating message
//! as plain data - and posts a "prove identity" button. A successful proof
//! replays the intent through the dispatch pipeline; nothing captures the
//! handler itself.

use std::sync::Arc;
use std::time::Duration;

use teloxide::types::Message;

use crate::cache::{CacheConfig, CacheRegistry, TypedCache};
use crate::permissions::AdminRight;

/// What to run once somebody proves they are an admin of the chat.
pub struct ResumeIntent {
    pub command: String,
    pub args: Vec<String>,
    pub right: AdminRight,
    /// The original command message; handlers see it as their `msg`.
    pub msg: Message,
}

/// Pending proofs keyed by (chat_id, original message_id).
///
/// Records expire after 15 minutes.
#[derive(Clone)]
pub struct AnonProofs {
    cache: TypedCache<(i64, i32), Arc<ResumeIntent>>,
}

impl AnonProofs {
    pub fn new(cache_registry: &CacheRegistry) -> Self {
        let cache = cache_registry.get_or_create(
            "anon_proofs",
            CacheConfig::with_capacity(2_000).ttl(Duration::from_secs(900)),
        );
        Self { cache }
    }

    pub fn put(&self, chat_id: i64, message_id: i32, intent: ResumeIntent) {
        self.cache.insert((chat_id, message_id), Arc::new(intent));
    }

    /// Look at the intent without consuming it.
    pub fn get(&self, chat_id: i64, message_id: i32) -> Option<Arc<ResumeIntent>> {
        self.cache.get(&(chat_id, message_id))
    }

    /// Take the intent, removing it so a proof can only be used once.
    pub fn take(&self, chat_id: i64, message_id: i32) -> Option<Arc<ResumeIntent>> {
        self.cache.remove(&(chat_id, message_id))
    }
}

/// Callback payload for the proof button.
pub fn callback_data(chat_id: i64, message_id: i32) -> String {
    format!("anoncb:{}:{}", chat_id, message_id)
}

/// Parse a proof callback payload back into (chat_id, message_id).
pub fn parse_callback(data: &str) -> Option<(i64, i32)> {
    let rest = data.strip_prefix("anoncb:")?;
    let (chat, msg) = rest.split_once(':')?;
    Some((chat.parse().ok()?, msg.parse().ok()?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_callback_roundtrip() {
        let data = callback_data(-1001234, 42);
        assert_eq!(parse_callback(&data), Some((-1001234, 42)));
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert_eq!(parse_callback("anoncb:x:y"), None);
        assert_eq!(parse_callback("other:1:2"), None);
        assert_eq!(parse_callback("anoncb:1"), None);
    }
}
