use directories::ProjectDirs;
use doc_model::{BookmarkSet, FontStyle, Session};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

const SCHEMA_VERSION: u32 = 1;

/// Overrides the platform data directory.
pub const DATA_DIR_ENV: &str = "VELLUM_DATA_DIR";

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("unable to resolve local data directory")]
    NoDataDirectory,
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Rasterisation factor over 72 dpi at 100% zoom.
    pub render_scale: f32,
    pub zoom_step_percent: u16,
    pub fallback_font: String,
    pub fallback_font_size: f32,
    /// RGBA colour of the debug word boxes.
    pub overlay_color: [u8; 4],
    pub restore_session: bool,
    pub render_cache_pages: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            render_scale: 2.0,
            zoom_step_percent: 10,
            fallback_font: "helv".to_owned(),
            fallback_font_size: 11.0,
            overlay_color: [255, 0, 0, 150],
            restore_session: true,
            render_cache_pages: 8,
        }
    }
}

impl Settings {
    pub fn fallback_style(&self) -> FontStyle {
        FontStyle::new(self.fallback_font.clone(), self.fallback_font_size)
    }
}

#[derive(Debug, Clone)]
pub struct Storage {
    root: PathBuf,
}

#[derive(Debug, Serialize, Deserialize)]
struct SettingsEnvelope {
    version: u32,
    settings: Settings,
}

#[derive(Debug, Serialize, Deserialize)]
struct SessionEnvelope {
    version: u32,
    session: Session,
}

#[derive(Debug, Serialize, Deserialize)]
struct BookmarksEnvelope {
    version: u32,
    bookmarks: BookmarkSet,
}

/// Files written by a newer build are ignored rather than misread.
trait Versioned {
    fn version(&self) -> u32;
}

impl Versioned for SettingsEnvelope {
    fn version(&self) -> u32 {
        self.version
    }
}

impl Versioned for SessionEnvelope {
    fn version(&self) -> u32 {
        self.version
    }
}

impl Versioned for BookmarksEnvelope {
    fn version(&self) -> u32 {
        self.version
    }
}

impl Storage {
    pub fn from_default_project() -> Result<Self, StorageError> {
        let dirs =
            ProjectDirs::from("dev", "Vellum", "Vellum").ok_or(StorageError::NoDataDirectory)?;

        Ok(Self { root: dirs.data_local_dir().to_path_buf() })
    }

    /// `VELLUM_DATA_DIR` when set and non-empty, else the platform directory.
    pub fn from_env_or_default() -> Result<Self, StorageError> {
        match std::env::var_os(DATA_DIR_ENV) {
            Some(dir) if !dir.is_empty() => Ok(Self::with_root(dir)),
            _ => Self::from_default_project(),
        }
    }

    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn load_settings(&self) -> Result<Settings, StorageError> {
        Ok(self
            .read::<SettingsEnvelope>(&self.settings_path())?
            .map(|envelope| envelope.settings)
            .unwrap_or_default())
    }

    pub fn save_settings(&self, settings: &Settings) -> Result<(), StorageError> {
        let envelope = SettingsEnvelope { version: SCHEMA_VERSION, settings: settings.clone() };
        self.write(&self.settings_path(), &envelope)
    }

    pub fn load_session(&self) -> Result<Session, StorageError> {
        Ok(self
            .read::<SessionEnvelope>(&self.session_path())?
            .map(|envelope| envelope.session)
            .unwrap_or_default())
    }

    pub fn save_session(&self, session: &Session) -> Result<(), StorageError> {
        let envelope = SessionEnvelope { version: SCHEMA_VERSION, session: session.clone() };
        self.write(&self.session_path(), &envelope)
    }

    pub fn load_bookmarks(&self) -> Result<BookmarkSet, StorageError> {
        Ok(self
            .read::<BookmarksEnvelope>(&self.bookmarks_path())?
            .map(|envelope| envelope.bookmarks)
            .unwrap_or_default())
    }

    pub fn save_bookmarks(&self, bookmarks: &BookmarkSet) -> Result<(), StorageError> {
        let envelope = BookmarksEnvelope { version: SCHEMA_VERSION, bookmarks: bookmarks.clone() };
        self.write(&self.bookmarks_path(), &envelope)
    }

    fn read<T: DeserializeOwned + Versioned>(&self, path: &Path) -> Result<Option<T>, StorageError> {
        if !path.exists() {
            return Ok(None);
        }

        let bytes = fs::read(path)?;
        let envelope: T = serde_json::from_slice(&bytes)?;

        if envelope.version() > SCHEMA_VERSION {
            warn!(
                path = %path.display(),
                version = envelope.version(),
                "ignoring file written by a newer schema"
            );
            return Ok(None);
        }

        Ok(Some(envelope))
    }

    /// Write to a sibling temp file, then rename over the target.
    fn write<T: Serialize>(&self, path: &Path, value: &T) -> Result<(), StorageError> {
        fs::create_dir_all(&self.root)?;

        let bytes = serde_json::to_vec_pretty(value)?;
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, bytes)?;
        fs::rename(&tmp, path)?;

        debug!(path = %path.display(), "wrote state file");
        Ok(())
    }

    fn settings_path(&self) -> PathBuf {
        self.root.join("settings.json")
    }

    fn session_path(&self) -> PathBuf {
        self.root.join("session.json")
    }

    fn bookmarks_path(&self) -> PathBuf {
        self.root.join("bookmarks.json")
    }
}
