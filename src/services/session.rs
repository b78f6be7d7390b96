use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::Utc;
use uuid::Uuid;

use crate::models::{Conversation, Message, SessionCollection};
use crate::services::persistence::PersistenceAdapter;

type MutationHook = Box<dyn Fn(&SessionCollection) + Send + Sync>;

/// Owns the conversation collection and the active selection.
///
/// Every command is total: an id that does not name a conversation turns the
/// command into a no-op. Commands that change state run each registered
/// mutation hook before returning.
pub struct SessionStore {
    collection: SessionCollection,
    hooks: Vec<MutationHook>,
}

impl SessionStore {
    pub fn new(collection: SessionCollection) -> Self {
        Self {
            collection,
            hooks: Vec::new(),
        }
    }

    /// Load the stored collection and keep storage in step with every
    /// subsequent mutation.
    pub fn load(persistence: PersistenceAdapter) -> Self {
        let mut store = Self::new(persistence.load());
        store.on_mutation(move |collection| persistence.save(collection));
        store
    }

    pub fn on_mutation<F>(&mut self, hook: F)
    where
        F: Fn(&SessionCollection) + Send + Sync + 'static,
    {
        self.hooks.push(Box::new(hook));
    }

    pub fn collection(&self) -> &SessionCollection {
        &self.collection
    }

    pub fn conversations(&self) -> &[Conversation] {
        &self.collection.conversations
    }

    pub fn conversation(&self, id: &str) -> Option<&Conversation> {
        self.collection.find(id)
    }

    pub fn active_id(&self) -> Option<&str> {
        self.collection.active_id.as_deref()
    }

    pub fn active_messages(&self) -> Vec<Message> {
        self.collection
            .active()
            .map(|c| c.messages.clone())
            .unwrap_or_default()
    }

    pub fn create_conversation(&mut self) -> String {
        let mut id = Uuid::new_v4().to_string();
        while self.collection.contains(&id) {
            id = Uuid::new_v4().to_string();
        }

        let conversation = Conversation {
            id: id.clone(),
            title: format!("Chat {}", self.collection.conversations.len() + 1),
            created_at: Utc::now(),
            messages: Vec::new(),
        };
        tracing::debug!("Created conversation {} ({})", id, conversation.title);

        self.collection.conversations.insert(0, conversation);
        self.collection.active_id = Some(id.clone());
        self.notify();
        id
    }

    pub fn select_conversation(&mut self, id: &str) -> &SessionCollection {
        if !self.collection.contains(id) {
            tracing::debug!("Ignoring select of unknown conversation {}", id);
            return &self.collection;
        }
        self.collection.active_id = Some(id.to_string());
        self.notify();
        &self.collection
    }

    pub fn rename_conversation(&mut self, id: &str, new_title: &str) -> &SessionCollection {
        let title = new_title.trim();
        if title.is_empty() {
            return &self.collection;
        }
        match self.collection.find_mut(id) {
            Some(conversation) => conversation.title = title.to_string(),
            None => {
                tracing::debug!("Ignoring rename of unknown conversation {}", id);
                return &self.collection;
            }
        }
        self.notify();
        &self.collection
    }

    pub fn delete_conversation(&mut self, id: &str) -> &SessionCollection {
        let before = self.collection.conversations.len();
        self.collection.conversations.retain(|c| c.id != id);
        if self.collection.conversations.len() == before {
            tracing::debug!("Ignoring delete of unknown conversation {}", id);
            return &self.collection;
        }
        if self.collection.active_id.as_deref() == Some(id) {
            self.collection.active_id = None;
        }
        self.notify();
        &self.collection
    }

    pub fn append_message(&mut self, id: &str, message: Message) -> &SessionCollection {
        match self.collection.find_mut(id) {
            Some(conversation) => conversation.messages.push(message),
            None => {
                tracing::debug!("Dropping message for unknown conversation {}", id);
                return &self.collection;
            }
        }
        self.notify();
        &self.collection
    }

    fn notify(&self) {
        for hook in &self.hooks {
            hook(&self.collection);
        }
    }
}

/// Cloneable handle shared by the orchestrator and the front end.
#[derive(Clone)]
pub struct SessionHandle {
    inner: Arc<Mutex<SessionStore>>,
}

impl SessionHandle {
    pub fn new(store: SessionStore) -> Self {
        Self {
            inner: Arc::new(Mutex::new(store)),
        }
    }

    /// Never hold the guard across an `.await`. Mutating commands run their
    /// hooks under this guard, and the persistence hook writes to SQLite
    /// synchronously, so the guard can be held for a blocking write.
    pub fn lock(&self) -> MutexGuard<'_, SessionStore> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::database::Database;
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counting_store() -> (SessionStore, Arc<AtomicUsize>) {
        let count = Arc::new(AtomicUsize::new(0));
        let mut store = SessionStore::new(SessionCollection::default());
        let hook_count = count.clone();
        store.on_mutation(move |_| {
            hook_count.fetch_add(1, Ordering::SeqCst);
        });
        (store, count)
    }

    fn assert_invariants(store: &SessionStore) {
        let ids: HashSet<&str> = store.conversations().iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids.len(), store.conversations().len(), "duplicate ids");
        if let Some(active) = store.active_id() {
            assert!(ids.contains(active), "active id {} not in collection", active);
        }
    }

    #[test]
    fn test_create_first_conversation() {
        let mut store = SessionStore::new(SessionCollection::default());
        let id = store.create_conversation();

        assert_eq!(store.conversations().len(), 1);
        assert_eq!(store.conversations()[0].title, "Chat 1");
        assert!(store.conversations()[0].messages.is_empty());
        assert_eq!(store.active_id(), Some(id.as_str()));
    }

    #[test]
    fn test_new_conversations_go_first() {
        let mut store = SessionStore::new(SessionCollection::default());
        let first = store.create_conversation();
        let second = store.create_conversation();

        assert_eq!(store.conversations()[0].id, second);
        assert_eq!(store.conversations()[0].title, "Chat 2");
        assert_eq!(store.conversations()[1].id, first);
        assert_eq!(store.active_id(), Some(second.as_str()));
    }

    #[test]
    fn test_create_delete_sequences_keep_invariants() {
        let mut store = SessionStore::new(SessionCollection::default());
        let mut created = Vec::new();

        for round in 0..20 {
            created.push(store.create_conversation());
            assert_invariants(&store);

            if round % 3 == 2 {
                let victim = created.remove(round % created.len());
                store.delete_conversation(&victim);
                assert_invariants(&store);
            }
            if round % 4 == 3 {
                let target = created[0].clone();
                store.select_conversation(&target);
                store.delete_conversation(&target);
                created.remove(0);
                assert_eq!(store.active_id(), None);
                assert_invariants(&store);
            }
        }
    }

    #[test]
    fn test_select_unknown_is_noop() {
        let (mut store, count) = counting_store();
        let id = store.create_conversation();
        let before = count.load(Ordering::SeqCst);

        store.select_conversation("missing");

        assert_eq!(store.active_id(), Some(id.as_str()));
        assert_eq!(count.load(Ordering::SeqCst), before);
    }

    #[test]
    fn test_select_switches_active() {
        let mut store = SessionStore::new(SessionCollection::default());
        let first = store.create_conversation();
        store.create_conversation();

        let collection = store.select_conversation(&first);
        assert_eq!(collection.active_id.as_deref(), Some(first.as_str()));
    }

    #[test]
    fn test_rename_blank_title_is_noop() {
        let (mut store, count) = counting_store();
        let id = store.create_conversation();
        let before = count.load(Ordering::SeqCst);

        store.rename_conversation(&id, "");
        store.rename_conversation(&id, "   ");

        assert_eq!(store.conversation(&id).unwrap().title, "Chat 1");
        assert_eq!(count.load(Ordering::SeqCst), before);
    }

    #[test]
    fn test_rename_trims_title() {
        let mut store = SessionStore::new(SessionCollection::default());
        let id = store.create_conversation();

        store.rename_conversation(&id, "  Trip planning ");
        assert_eq!(store.conversation(&id).unwrap().title, "Trip planning");

        store.rename_conversation("missing", "Other");
        assert_eq!(store.conversations().len(), 1);
    }

    #[test]
    fn test_delete_inactive_keeps_active() {
        let mut store = SessionStore::new(SessionCollection::default());
        let first = store.create_conversation();
        let second = store.create_conversation();

        store.delete_conversation(&first);

        assert_eq!(store.conversations().len(), 1);
        assert_eq!(store.active_id(), Some(second.as_str()));
    }

    #[test]
    fn test_append_and_active_messages() {
        let mut store = SessionStore::new(SessionCollection::default());
        assert!(store.active_messages().is_empty());

        let id = store.create_conversation();
        store.append_message(&id, Message::user("Hi"));
        store.append_message(&id, Message::assistant("Hello!"));
        store.append_message("missing", Message::user("lost"));

        assert_eq!(
            store.active_messages(),
            vec![Message::user("Hi"), Message::assistant("Hello!")]
        );
    }

    #[test]
    fn test_append_to_unknown_does_not_notify() {
        let (mut store, count) = counting_store();
        store.append_message("missing", Message::user("lost"));
        assert_eq!(count.load(Ordering::SeqCst), 0);
        assert!(store.conversations().is_empty());
    }

    #[test]
    fn test_every_mutation_is_persisted() {
        let db = Arc::new(Database::new_in_memory().unwrap());
        let persistence = PersistenceAdapter::new(db.clone());

        let mut store = SessionStore::load(persistence.clone());
        let id = store.create_conversation();
        store.append_message(&id, Message::user("Hi"));
        store.rename_conversation(&id, "Greetings");

        assert_eq!(&persistence.load(), store.collection());

        let reloaded = SessionStore::load(persistence);
        assert_eq!(reloaded.conversation(&id).unwrap().title, "Greetings");
        assert_eq!(reloaded.active_messages(), vec![Message::user("Hi")]);
    }
}
