//! Flat key-value persistence for the user name, theme and conversations.
//!
//! Values are strings, mirroring a browser's local storage. The conversation
//! list is stored as a versioned JSON envelope:
//!
//! ```json
//! {"version": 1, "conversations": [ ... ]}
//! ```
//!
//! A bare JSON array is the unversioned layout written by earlier releases
//! and is read as version 0.

use crate::error::Result;
use crate::message::Conversation;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

pub const KEY_USER_NAME: &str = "userName";
pub const KEY_THEME: &str = "theme";
pub const KEY_CONVERSATIONS: &str = "conversations";

/// Current layout of the `conversations` value
pub const CONVERSATIONS_VERSION: u32 = 1;

/// Light or dark presentation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ThemeMode {
    Light,
    #[default]
    Dark,
}

impl ThemeMode {
    pub fn as_str(self) -> &'static str {
        match self {
            ThemeMode::Light => "light",
            ThemeMode::Dark => "dark",
        }
    }

    pub fn toggled(self) -> Self {
        match self {
            ThemeMode::Light => ThemeMode::Dark,
            ThemeMode::Dark => ThemeMode::Light,
        }
    }
}

impl std::str::FromStr for ThemeMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "light" => Ok(ThemeMode::Light),
            "dark" => Ok(ThemeMode::Dark),
            other => Err(format!("unknown theme '{}' (expected light or dark)", other)),
        }
    }
}

/// Synchronous string key-value storage
pub trait KeyValueStore {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&mut self, key: &str, value: &str) -> Result<()>;
    fn remove(&mut self, key: &str) -> Result<()>;
}

/// In-memory store, used for tests and `--ephemeral` sessions
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    values: BTreeMap<String, String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        self.values.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: &str) -> Result<()> {
        self.values.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<()> {
        self.values.remove(key);
        Ok(())
    }
}

/// All keys in one JSON object file, replaced atomically on every write
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    values: BTreeMap<String, String>,
}

impl FileStore {
    /// Open the store at `path`. A missing or unreadable file starts empty.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let values = match fs::read_to_string(&path) {
            Ok(content) if content.trim().is_empty() => BTreeMap::new(),
            Ok(content) => serde_json::from_str(&content).unwrap_or_else(|e| {
                tracing::warn!(path = %path.display(), error = %e, "state file is corrupt, starting empty");
                BTreeMap::new()
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "could not read state file");
                BTreeMap::new()
            }
        };
        Self { path, values }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn flush(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }

        let content = serde_json::to_string_pretty(&self.values)?;
        let tmp_path = self.path.with_extension("json.tmp");
        {
            let mut file = fs::File::create(&tmp_path)?;
            file.write_all(content.as_bytes())?;
            file.sync_all()?;
        }
        fs::rename(&tmp_path, &self.path)?;
        Ok(())
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Option<String> {
        self.values.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: &str) -> Result<()> {
        self.values.insert(key.to_string(), value.to_string());
        self.flush()
    }

    fn remove(&mut self, key: &str) -> Result<()> {
        if self.values.remove(key).is_some() {
            self.flush()?;
        }
        Ok(())
    }
}

/// Everything read back at startup
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadedState {
    pub user_name: Option<String>,
    pub theme: Option<ThemeMode>,
    /// Never empty
    pub conversations: Vec<Conversation>,
}

#[derive(Serialize)]
struct EnvelopeRef<'a> {
    version: u32,
    conversations: &'a [Conversation],
}

#[derive(Deserialize)]
struct Envelope {
    version: u32,
    conversations: serde_json::Value,
}

/// Decode the `conversations` value, or explain why it was rejected
fn decode_conversations(raw: &str) -> std::result::Result<Vec<Conversation>, String> {
    let value: serde_json::Value = serde_json::from_str(raw).map_err(|e| e.to_string())?;

    let list = if value.is_array() {
        value
    } else {
        let envelope: Envelope = serde_json::from_value(value).map_err(|e| e.to_string())?;
        if envelope.version != CONVERSATIONS_VERSION {
            return Err(format!("unsupported version {}", envelope.version));
        }
        envelope.conversations
    };

    serde_json::from_value(list).map_err(|e| e.to_string())
}

/// Reads and writes application state through a [`KeyValueStore`].
///
/// Write failures are logged and otherwise ignored.
#[derive(Debug)]
pub struct Persistence<S> {
    store: S,
}

impl<S: KeyValueStore> Persistence<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn load(&self) -> LoadedState {
        let user_name = self
            .store
            .get(KEY_USER_NAME)
            .filter(|name| !name.trim().is_empty());

        let theme = self.store.get(KEY_THEME).and_then(|raw| match raw.parse() {
            Ok(theme) => Some(theme),
            Err(e) => {
                tracing::warn!(error = %e, "ignoring stored theme");
                None
            }
        });

        let conversations = match self.store.get(KEY_CONVERSATIONS) {
            None => Vec::new(),
            Some(raw) => decode_conversations(&raw).unwrap_or_else(|reason| {
                tracing::warn!(%reason, "discarding stored conversations");
                Vec::new()
            }),
        };

        let conversations = if conversations.is_empty() {
            tracing::debug!("no stored conversations, starting fresh");
            vec![Conversation::new()]
        } else {
            conversations
        };

        LoadedState {
            user_name,
            theme,
            conversations,
        }
    }

    pub fn save_theme(&mut self, theme: ThemeMode) {
        self.write(KEY_THEME, theme.as_str());
    }

    pub fn save_user_name(&mut self, name: &str) {
        self.write(KEY_USER_NAME, name);
    }

    pub fn clear_user_name(&mut self) {
        if let Err(e) = self.store.remove(KEY_USER_NAME) {
            tracing::warn!(error = %e, "failed to clear user name");
        }
    }

    pub fn save_conversations(&mut self, conversations: &[Conversation]) {
        let envelope = EnvelopeRef {
            version: CONVERSATIONS_VERSION,
            conversations,
        };
        match serde_json::to_string(&envelope) {
            Ok(raw) => self.write(KEY_CONVERSATIONS, &raw),
            Err(e) => tracing::warn!(error = %e, "failed to encode conversations"),
        }
    }

    fn write(&mut self, key: &str, value: &str) {
        if let Err(e) = self.store.set(key, value) {
            tracing::warn!(key, error = %e, "failed to persist value");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::{Message, PLACEHOLDER_TITLE};

    fn conversation(id: &str) -> Conversation {
        Conversation {
            id: id.into(),
            title: format!("title {id}"),
            messages: vec![Message::user("hello", None)],
            created_at: 1_700_000_000_000,
        }
    }

    fn with_conversations(raw: &str) -> Persistence<MemoryStore> {
        let mut store = MemoryStore::new();
        store.set(KEY_CONVERSATIONS, raw).unwrap();
        Persistence::new(store)
    }

    #[test]
    fn test_empty_store_loads_one_fresh_conversation() {
        let loaded = Persistence::new(MemoryStore::new()).load();
        assert_eq!(loaded.user_name, None);
        assert_eq!(loaded.theme, None);
        assert_eq!(loaded.conversations.len(), 1);
        assert_eq!(loaded.conversations[0].title, PLACEHOLDER_TITLE);
    }

    #[test]
    fn test_round_trip_preserves_order() {
        let mut persistence = Persistence::new(MemoryStore::new());
        persistence.save_conversations(&[conversation("a"), conversation("b")]);
        persistence.save_theme(ThemeMode::Light);
        persistence.save_user_name("Mona");

        let loaded = persistence.load();
        let ids: Vec<_> = loaded.conversations.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b"]);
        assert_eq!(loaded.theme, Some(ThemeMode::Light));
        assert_eq!(loaded.user_name.as_deref(), Some("Mona"));
    }

    #[test]
    fn test_writes_versioned_envelope() {
        let mut persistence = Persistence::new(MemoryStore::new());
        persistence.save_conversations(&[conversation("a")]);

        let raw = persistence.store().get(KEY_CONVERSATIONS).unwrap();
        let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(value["version"], 1);
        assert_eq!(value["conversations"][0]["id"], "a");
    }

    #[test]
    fn test_reads_unversioned_array() {
        let raw = r#"[
            {"id":"a","title":"First","messages":[{"id":"m1","text":"hi","sender":"user"}]},
            {"id":"b","title":"Second","messages":[]}
        ]"#;
        let loaded = with_conversations(raw).load();
        assert_eq!(loaded.conversations.len(), 2);
        assert_eq!(loaded.conversations[0].id, "a");
        assert_eq!(loaded.conversations[0].messages[0].text, "hi");
    }

    #[test]
    fn test_malformed_data_falls_back() {
        for raw in [
            "not json",
            r#"{"version": 99, "conversations": []}"#,
            r#"{"version": 1, "conversations": [{"id": 5}]}"#,
            r#"{"something": "else"}"#,
            "[]",
        ] {
            let loaded = with_conversations(raw).load();
            assert_eq!(loaded.conversations.len(), 1, "input: {raw}");
            assert_eq!(loaded.conversations[0].title, PLACEHOLDER_TITLE);
        }
    }

    #[test]
    fn test_clear_user_name_keeps_other_keys() {
        let mut persistence = Persistence::new(MemoryStore::new());
        persistence.save_user_name("Mona");
        persistence.save_theme(ThemeMode::Dark);
        persistence.save_conversations(&[conversation("a")]);

        persistence.clear_user_name();

        let loaded = persistence.load();
        assert_eq!(loaded.user_name, None);
        assert_eq!(loaded.theme, Some(ThemeMode::Dark));
        assert_eq!(loaded.conversations[0].id, "a");
    }

    #[test]
    fn test_unknown_theme_is_ignored() {
        let mut store = MemoryStore::new();
        store.set(KEY_THEME, "sepia").unwrap();
        assert_eq!(Persistence::new(store).load().theme, None);
    }

    #[test]
    fn test_file_store_persists_across_opens() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("state.json");

        let mut store = FileStore::open(&path);
        store.set(KEY_USER_NAME, "Karim").unwrap();
        store.set(KEY_THEME, "light").unwrap();
        store.remove(KEY_THEME).unwrap();

        let reopened = FileStore::open(&path);
        assert_eq!(reopened.get(KEY_USER_NAME).as_deref(), Some("Karim"));
        assert_eq!(reopened.get(KEY_THEME), None);
        assert!(!path.with_extension("json.tmp").exists());
    }

    #[test]
    fn test_file_store_corrupt_file_reads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        fs::write(&path, "{{{{").unwrap();

        let store = FileStore::open(&path);
        assert_eq!(store.get(KEY_USER_NAME), None);
    }

    #[test]
    fn test_theme_parse() {
        assert_eq!("Light".parse::<ThemeMode>(), Ok(ThemeMode::Light));
        assert_eq!(ThemeMode::Light.toggled(), ThemeMode::Dark);
        assert!("blue".parse::<ThemeMode>().is_err());
    }
}
