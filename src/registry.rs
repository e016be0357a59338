//! The list of generated apps, mirrored into the local store on every change.

use chrono::{DateTime, Utc};

use crate::errors::RegistryError;
use crate::generation::Revision;
use crate::models::{AppRecord, ChatMessage, ChatRole, ENTRY_POINT};
use crate::store::{APPS_KEY, LocalStore};

/// Text stored as the assistant's chat reply when a revision replaced the site.
pub const DOCUMENT_UPDATED_REPLY: &str = "I've updated the website with your changes.";

pub struct AppRegistry {
    store: LocalStore,
    apps: Vec<AppRecord>,
    /// The stored list existed but could not be read, so it loaded as empty.
    unreadable: bool,
}

impl AppRegistry {
    /// Load the registry from `store`. Missing or null entries load as empty.
    /// An entry that cannot be read also loads as empty, and is backed up
    /// before the first write replaces it.
    pub fn load(store: LocalStore) -> Self {
        let (apps, unreadable) = match store.try_get(APPS_KEY) {
            Ok(apps) => (apps.unwrap_or_default(), false),
            Err(e) => {
                tracing::warn!(error = %e, "app registry could not be read; starting empty");
                (Vec::new(), true)
            }
        };
        Self {
            store,
            apps,
            unreadable,
        }
    }

    /// True when the stored list could not be read and has not yet been
    /// backed up and replaced.
    pub fn is_unreadable(&self) -> bool {
        self.unreadable
    }

    fn persist(&mut self) -> Result<(), RegistryError> {
        if self.unreadable {
            if let Some(backup) = self.store.backup(APPS_KEY)? {
                tracing::warn!(backup = %backup.display(), "saved unreadable app registry before replacing it");
            }
            self.unreadable = false;
        }
        self.store.set(APPS_KEY, &self.apps)?;
        Ok(())
    }

    /// All records in storage order (newest added first).
    pub fn apps(&self) -> &[AppRecord] {
        &self.apps
    }

    pub fn len(&self) -> usize {
        self.apps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.apps.is_empty()
    }

    pub fn find_by_id(&self, id: &str) -> Option<&AppRecord> {
        self.apps.iter().find(|app| app.id == id)
    }

    /// Records ordered for display: newest `created_at` first.
    pub fn sorted_by_created_desc(&self) -> Vec<&AppRecord> {
        let mut sorted: Vec<&AppRecord> = self.apps.iter().collect();
        sorted.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        sorted
    }

    /// Add a freshly created record to the front of the list and persist.
    pub fn add(&mut self, record: AppRecord) -> Result<(), RegistryError> {
        if self.find_by_id(&record.id).is_some() {
            return Err(RegistryError::DuplicateId(record.id));
        }
        tracing::info!(id = %record.id, "registering app");
        self.apps.insert(0, record);
        self.persist()
    }

    /// Remove a record. Remote resources are not touched.
    pub fn remove(&mut self, id: &str) -> Result<AppRecord, RegistryError> {
        let idx = self
            .apps
            .iter()
            .position(|app| app.id == id)
            .ok_or_else(|| RegistryError::NotFound(id.to_string()))?;
        let removed = self.apps.remove(idx);
        self.persist()?;
        Ok(removed)
    }

    /// Record one chat exchange and, for a document reply, replace the
    /// entry point's content.
    pub fn apply_revision(
        &mut self,
        id: &str,
        user_message: &str,
        revision: &Revision,
        now: DateTime<Utc>,
    ) -> Result<&AppRecord, RegistryError> {
        let idx = self
            .apps
            .iter()
            .position(|app| app.id == id)
            .ok_or_else(|| RegistryError::NotFound(id.to_string()))?;

        {
            let app = &mut self.apps[idx];
            let reply = match revision {
                Revision::Document { content } => {
                    let file = app
                        .files
                        .iter_mut()
                        .find(|f| f.name == ENTRY_POINT)
                        .ok_or_else(|| RegistryError::FileNotFound {
                            id: id.to_string(),
                            file: ENTRY_POINT.to_string(),
                        })?;
                    file.content = content.clone();
                    DOCUMENT_UPDATED_REPLY.to_string()
                }
                Revision::Message { text } => text.clone(),
            };
            app.chat_history
                .push(ChatMessage::new(ChatRole::User, user_message, now));
            app.chat_history
                .push(ChatMessage::new(ChatRole::Assistant, reply, now));
        }

        self.persist()?;
        Ok(&self.apps[idx])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::NamedFile;
    use chrono::TimeZone;
    use tempfile::tempdir;

    fn record(id: &str, secs: i64) -> AppRecord {
        AppRecord {
            id: id.to_string(),
            prompt: format!("prompt for {id}"),
            plan: None,
            files: vec![NamedFile::new("index.html", "<p>v1</p>")],
            created_at: Utc.timestamp_opt(secs, 0).unwrap(),
            github_repo_url: None,
            public_url: None,
            chat_history: vec![],
        }
    }

    #[test]
    fn test_load_empty_store() {
        let dir = tempdir().unwrap();
        let registry = AppRegistry::load(LocalStore::open(dir.path()).unwrap());
        assert!(registry.is_empty());
    }

    #[test]
    fn test_add_persists_and_reloads() {
        let dir = tempdir().unwrap();
        let store = LocalStore::open(dir.path()).unwrap();
        let mut registry = AppRegistry::load(store.clone());
        registry.add(record("one", 10)).unwrap();
        registry.add(record("two", 20)).unwrap();

        let reloaded = AppRegistry::load(store);
        assert_eq!(reloaded.len(), 2);
        assert_eq!(reloaded.apps()[0].id, "two");
        assert!(reloaded.find_by_id("one").is_some());
        assert!(reloaded.find_by_id("three").is_none());
    }

    #[test]
    fn test_sorted_by_created_desc_ignores_insertion_order() {
        let dir = tempdir().unwrap();
        let mut registry = AppRegistry::load(LocalStore::open(dir.path()).unwrap());
        registry.add(record("t2", 200)).unwrap();
        registry.add(record("t1", 100)).unwrap();
        registry.add(record("t3", 300)).unwrap();

        let ids: Vec<&str> = registry
            .sorted_by_created_desc()
            .iter()
            .map(|a| a.id.as_str())
            .collect();
        assert_eq!(ids, vec!["t3", "t2", "t1"]);
    }

    #[test]
    fn test_duplicate_id_rejected() {
        let dir = tempdir().unwrap();
        let mut registry = AppRegistry::load(LocalStore::open(dir.path()).unwrap());
        registry.add(record("same", 1)).unwrap();
        let err = registry.add(record("same", 2)).unwrap_err();
        assert!(matches!(err, RegistryError::DuplicateId(id) if id == "same"));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_remove() {
        let dir = tempdir().unwrap();
        let store = LocalStore::open(dir.path()).unwrap();
        let mut registry = AppRegistry::load(store.clone());
        registry.add(record("gone", 1)).unwrap();
        let removed = registry.remove("gone").unwrap();
        assert_eq!(removed.id, "gone");
        assert!(AppRegistry::load(store).is_empty());
        assert!(matches!(
            registry.remove("gone"),
            Err(RegistryError::NotFound(_))
        ));
    }

    #[test]
    fn test_apply_document_revision_replaces_entry_point() {
        let dir = tempdir().unwrap();
        let store = LocalStore::open(dir.path()).unwrap();
        let mut registry = AppRegistry::load(store.clone());
        registry.add(record("site", 1)).unwrap();

        let now = Utc.timestamp_opt(50, 0).unwrap();
        let revision = Revision::Document {
            content: "<p>v2</p>".to_string(),
        };
        let updated = registry
            .apply_revision("site", "make it v2", &revision, now)
            .unwrap();
        assert_eq!(updated.entry_point().unwrap().content, "<p>v2</p>");
        assert_eq!(updated.chat_history.len(), 2);
        assert_eq!(updated.chat_history[0].sender, ChatRole::User);
        assert_eq!(updated.chat_history[1].text, DOCUMENT_UPDATED_REPLY);

        let reloaded = AppRegistry::load(store);
        let app = reloaded.find_by_id("site").unwrap();
        assert_eq!(app.entry_point().unwrap().content, "<p>v2</p>");
    }

    #[test]
    fn test_apply_message_revision_keeps_files() {
        let dir = tempdir().unwrap();
        let mut registry = AppRegistry::load(LocalStore::open(dir.path()).unwrap());
        registry.add(record("site", 1)).unwrap();

        let revision = Revision::Message {
            text: "Try a warmer palette.".to_string(),
        };
        let updated = registry
            .apply_revision("site", "ideas?", &revision, Utc::now())
            .unwrap();
        assert_eq!(updated.entry_point().unwrap().content, "<p>v1</p>");
        assert_eq!(updated.chat_history[1].text, "Try a warmer palette.");
        assert_eq!(updated.chat_history[1].sender, ChatRole::Assistant);
    }

    #[test]
    fn test_unreadable_registry_backed_up_before_write() {
        let dir = tempdir().unwrap();
        let store = LocalStore::open(dir.path()).unwrap();
        // Records in an older layout: no prompt, no files
        let legacy = r#"[{"id":"3f2a","name":"Cat Cafe","slug":"cat-cafe","plan":"A cafe","html":"<h1>cats</h1>","views":0,"chatHistory":[],"createdAt":"2024-01-01T00:00:00.000Z"}]"#;
        std::fs::write(dir.path().join("generated-apps.json"), legacy).unwrap();

        let mut registry = AppRegistry::load(store.clone());
        assert!(registry.is_empty());
        assert!(registry.is_unreadable());

        registry.add(record("new-1", 1)).unwrap();
        assert!(!registry.is_unreadable());
        let backup = std::fs::read_to_string(dir.path().join("generated-apps.json.bak")).unwrap();
        assert_eq!(backup, legacy);

        // Later writes keep the first backup
        registry.add(record("new-2", 2)).unwrap();
        let backup = std::fs::read_to_string(dir.path().join("generated-apps.json.bak")).unwrap();
        assert_eq!(backup, legacy);
        assert_eq!(AppRegistry::load(store).len(), 2);
    }

    #[test]
    fn test_missing_registry_is_not_unreadable() {
        let dir = tempdir().unwrap();
        let mut registry = AppRegistry::load(LocalStore::open(dir.path()).unwrap());
        assert!(!registry.is_unreadable());
        registry.add(record("one", 1)).unwrap();
        assert!(!dir.path().join("generated-apps.json.bak").exists());
    }

    #[test]
    fn test_apply_revision_unknown_app() {
        let dir = tempdir().unwrap();
        let mut registry = AppRegistry::load(LocalStore::open(dir.path()).unwrap());
        let revision = Revision::Message { text: "x".into() };
        assert!(matches!(
            registry.apply_revision("missing", "hi", &revision, Utc::now()),
            Err(RegistryError::NotFound(_))
        ));
    }
}
