//! Device-local preferences: theme, view mode, favorites, edit mode, autosave

use directories::ProjectDirs;
use log::warn;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tokio::sync::broadcast;

use crate::error::{Error, Result};

const DARK_MODE_KEY: &str = "zoo_darkMode";
const VIEW_MODE_KEY: &str = "zoo_viewMode";
const FAVORITES_KEY: &str = "zoo_favorites";
const EDIT_MODE_KEY: &str = "zoo_editMode";
const AUTOSAVE_KEY: &str = "zoo_autoSave";

/// Where preference strings live. Reads answer `None` on missing or
/// unreadable values and writes are best-effort; a broken store must
/// degrade to defaults, never to errors.
pub trait PrefsBackend: Send + Sync {
    fn read(&self, key: &str) -> Option<String>;
    fn write(&self, key: &str, value: &str);
}

/// Keeps all preferences in one JSON object file
pub struct FileBackend {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileBackend {
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            lock: Mutex::new(()),
        }
    }

    /// Backend at the platform's config directory for this app
    pub fn at_default_location() -> Result<Self> {
        let dirs = ProjectDirs::from("", "", "zoodb")
            .ok_or_else(|| Error::validation("could not determine a home directory"))?;
        Ok(Self::new(dirs.config_dir().join("prefs.json")))
    }

    fn load_map(&self) -> HashMap<String, String> {
        let text = match std::fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(_) => return HashMap::new(),
        };
        serde_json::from_str(&text).unwrap_or_default()
    }
}

impl PrefsBackend for FileBackend {
    fn read(&self, key: &str) -> Option<String> {
        let _guard = self.lock.lock().unwrap();
        self.load_map().get(key).cloned()
    }

    fn write(&self, key: &str, value: &str) {
        let _guard = self.lock.lock().unwrap();
        let mut map = self.load_map();
        map.insert(key.to_string(), value.to_string());
        if let Some(parent) = self.path.parent() {
            if let Err(e) = std::fs::create_dir_all(parent) {
                warn!("could not create preferences directory: {}", e);
                return;
            }
        }
        match serde_json::to_string_pretty(&map) {
            Ok(json) => {
                if let Err(e) = std::fs::write(&self.path, json) {
                    warn!("could not write preferences: {}", e);
                }
            }
            Err(e) => warn!("could not encode preferences: {}", e),
        }
    }
}

/// In-memory backend for tests and ephemeral sessions
#[derive(Default)]
pub struct MemoryBackend {
    map: Mutex<HashMap<String, String>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

impl PrefsBackend for MemoryBackend {
    fn read(&self, key: &str) -> Option<String> {
        self.map.lock().unwrap().get(key).cloned()
    }

    fn write(&self, key: &str, value: &str) {
        self.map.lock().unwrap().insert(key.to_string(), value.to_string());
    }
}

/// Color theme; the app ships dark-first
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Theme {
    #[default]
    Dark,
    Light,
}

/// Top-level view the user last had open
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ViewMode {
    #[default]
    Detail,
    Grid,
    Admin,
}

impl ViewMode {
    pub fn as_str(self) -> &'static str {
        match self {
            ViewMode::Detail => "detail",
            ViewMode::Grid => "grid",
            ViewMode::Admin => "admin",
        }
    }

    fn parse(value: &str) -> Self {
        match value {
            "grid" => ViewMode::Grid,
            "admin" => ViewMode::Admin,
            _ => ViewMode::Detail,
        }
    }
}

/// One preference changed; carried on the subscription channel
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PrefChange {
    Theme(Theme),
    ViewMode(ViewMode),
    Favorites(Vec<String>),
    EditMode(bool),
    Autosave(bool),
}

/// Typed, write-through view over a [`PrefsBackend`].
///
/// Values are read fresh on every access and written on every change;
/// last write wins. Missing or corrupt values fall back to defaults.
pub struct Preferences {
    backend: Arc<dyn PrefsBackend>,
    change: broadcast::Sender<PrefChange>,
}

impl Preferences {
    pub fn new(backend: Arc<dyn PrefsBackend>) -> Self {
        let (change, _) = broadcast::channel(16);
        Self { backend, change }
    }

    /// Preferences stored in memory only
    pub fn ephemeral() -> Self {
        Self::new(Arc::new(MemoryBackend::new()))
    }

    /// Observe preference changes
    pub fn subscribe(&self) -> broadcast::Receiver<PrefChange> {
        self.change.subscribe()
    }

    fn notify(&self, change: PrefChange) {
        let _ = self.change.send(change);
    }

    /// Current theme; absent means dark, anything but "1" means light
    pub fn theme(&self) -> Theme {
        match self.backend.read(DARK_MODE_KEY) {
            None => Theme::Dark,
            Some(v) if v == "1" => Theme::Dark,
            Some(_) => Theme::Light,
        }
    }

    pub fn set_theme(&self, theme: Theme) {
        let encoded = if theme == Theme::Dark { "1" } else { "0" };
        self.backend.write(DARK_MODE_KEY, encoded);
        self.notify(PrefChange::Theme(theme));
    }

    pub fn view_mode(&self) -> ViewMode {
        self.backend
            .read(VIEW_MODE_KEY)
            .map(|v| ViewMode::parse(&v))
            .unwrap_or_default()
    }

    pub fn set_view_mode(&self, mode: ViewMode) {
        self.backend.write(VIEW_MODE_KEY, mode.as_str());
        self.notify(PrefChange::ViewMode(mode));
    }

    /// Favorited breed ids in the order they were added. Corrupt stored
    /// JSON reads as no favorites.
    pub fn favorites(&self) -> Vec<String> {
        self.backend
            .read(FAVORITES_KEY)
            .and_then(|raw| serde_json::from_str(&raw).ok())
            .unwrap_or_default()
    }

    pub fn is_favorite(&self, breed_id: &str) -> bool {
        self.favorites().iter().any(|b| b == breed_id)
    }

    /// Flip one breed's favorite bit; returns true when it is now set
    pub fn toggle_favorite(&self, breed_id: &str) -> bool {
        let mut favorites = self.favorites();
        let added = match favorites.iter().position(|b| b == breed_id) {
            Some(pos) => {
                favorites.remove(pos);
                false
            }
            None => {
                favorites.push(breed_id.to_string());
                true
            }
        };
        self.store_favorites(favorites);
        added
    }

    fn store_favorites(&self, favorites: Vec<String>) {
        match serde_json::to_string(&favorites) {
            Ok(json) => self.backend.write(FAVORITES_KEY, &json),
            Err(e) => warn!("could not encode favorites: {}", e),
        }
        self.notify(PrefChange::Favorites(favorites));
    }

    pub fn edit_mode(&self) -> bool {
        self.backend.read(EDIT_MODE_KEY).as_deref() == Some("1")
    }

    pub fn set_edit_mode(&self, enabled: bool) {
        self.backend
            .write(EDIT_MODE_KEY, if enabled { "1" } else { "0" });
        self.notify(PrefChange::EditMode(enabled));
    }

    pub fn autosave(&self) -> bool {
        self.backend.read(AUTOSAVE_KEY).as_deref() == Some("1")
    }

    pub fn set_autosave(&self, enabled: bool) {
        self.backend
            .write(AUTOSAVE_KEY, if enabled { "1" } else { "0" });
        self.notify(PrefChange::Autosave(enabled));
    }
}
