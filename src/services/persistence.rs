use std::sync::Arc;

use serde::Deserialize;

use crate::config::STORAGE_KEY;
use crate::models::{Conversation, Message, Role, SessionCollection};
use crate::services::database::KeyValueStore;

/// Mirrors the session collection into a single key of a [`KeyValueStore`].
///
/// Neither direction ever fails from the caller's point of view: unreadable
/// or corrupt history loads as an empty collection, and failed writes are
/// logged and dropped so the in-memory session carries on.
#[derive(Clone)]
pub struct PersistenceAdapter {
    store: Arc<dyn KeyValueStore>,
    key: String,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum StoredBlob {
    Collection(SessionCollection),
    Legacy(Vec<LegacyConversation>),
}

/// Older blobs were a bare array of chats whose messages carried both
/// `content` and `text`.
#[derive(Deserialize)]
struct LegacyConversation {
    id: String,
    title: String,
    #[serde(default)]
    messages: Vec<LegacyMessage>,
}

#[derive(Deserialize)]
struct LegacyMessage {
    role: Role,
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    content: Option<serde_json::Value>,
}

impl From<LegacyConversation> for Conversation {
    fn from(legacy: LegacyConversation) -> Self {
        let messages = legacy
            .messages
            .into_iter()
            .map(|m| {
                let text = m.text.unwrap_or_else(|| match m.content {
                    Some(serde_json::Value::String(s)) => s,
                    _ => String::new(),
                });
                Message { role: m.role, text }
            })
            .collect();

        Conversation {
            id: legacy.id,
            title: legacy.title,
            created_at: Default::default(),
            messages,
        }
    }
}

impl PersistenceAdapter {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self::with_key(store, STORAGE_KEY)
    }

    pub fn with_key(store: Arc<dyn KeyValueStore>, key: impl Into<String>) -> Self {
        Self {
            store,
            key: key.into(),
        }
    }

    pub fn load(&self) -> SessionCollection {
        let raw = match self.store.get(&self.key) {
            Ok(Some(raw)) => raw,
            Ok(None) => return SessionCollection::default(),
            Err(e) => {
                tracing::warn!("Failed to read chat history, starting empty: {}", e);
                return SessionCollection::default();
            }
        };

        let mut collection = match serde_json::from_str::<StoredBlob>(&raw) {
            Ok(StoredBlob::Collection(collection)) => collection,
            Ok(StoredBlob::Legacy(chats)) => SessionCollection {
                conversations: chats.into_iter().map(Conversation::from).collect(),
                active_id: None,
            },
            Err(e) => {
                tracing::warn!("Stored chat history is corrupt, starting empty: {}", e);
                return SessionCollection::default();
            }
        };

        if let Some(id) = collection.active_id.as_deref() {
            if !collection.contains(id) {
                tracing::debug!("Dropping stale active conversation id {}", id);
                collection.active_id = None;
            }
        }

        tracing::debug!(
            "Loaded {} conversations from storage",
            collection.conversations.len()
        );
        collection
    }

    pub fn save(&self, collection: &SessionCollection) {
        let json = match serde_json::to_string(collection) {
            Ok(json) => json,
            Err(e) => {
                tracing::error!("Failed to serialize chat history: {}", e);
                return;
            }
        };

        if let Err(e) = self.store.set(&self.key, &json) {
            tracing::error!("Failed to save chat history: {}", e);
        }
    }
}
