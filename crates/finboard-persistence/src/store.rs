//! JSON file store for the widget list.

use crate::error::PersistenceResult;
use finboard_core::WidgetRecord;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Fixed identifier of the persisted dashboard.
pub const STORE_NAME: &str = "finboard_dashboard";

/// Persistence configuration (`[persistence]` section).
#[derive(Debug, Clone, Deserialize)]
pub struct PersistenceConfig {
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("data")
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
        }
    }
}

/// On-disk document layout.
#[derive(Debug, Default, Serialize, Deserialize)]
struct PersistedDocument {
    state: PersistedState,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct PersistedState {
    #[serde(default)]
    widgets: Vec<WidgetRecord>,
}

/// Reads and writes `<data_dir>/finboard_dashboard.json`.
#[derive(Debug, Clone)]
pub struct WidgetStore {
    path: PathBuf,
}

impl WidgetStore {
    pub fn new(data_dir: impl AsRef<Path>) -> Self {
        Self {
            path: data_dir.as_ref().join(format!("{STORE_NAME}.json")),
        }
    }

    pub fn from_config(config: &PersistenceConfig) -> Self {
        Self::new(&config.data_dir)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the widget list. A missing or unreadable file yields an empty list.
    pub fn load(&self) -> Vec<WidgetRecord> {
        match self.try_load() {
            Ok(widgets) => {
                info!(path = %self.path.display(), count = widgets.len(), "Loaded widgets");
                widgets
            }
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "Failed to load widgets, starting empty");
                Vec::new()
            }
        }
    }

    /// Load the widget list, surfacing parse and IO errors. A missing file
    /// is not an error.
    pub fn try_load(&self) -> PersistenceResult<Vec<WidgetRecord>> {
        if !self.path.exists() {
            debug!(path = %self.path.display(), "No persisted widgets");
            return Ok(Vec::new());
        }
        let bytes = fs::read(&self.path)?;
        let document: PersistedDocument = serde_json::from_slice(&bytes)?;
        Ok(document.state.widgets)
    }

    /// Replace the stored widget list.
    ///
    /// Writes a sibling temp file and renames it over the target, so readers
    /// see either the old or the new document.
    pub fn save(&self, widgets: &[WidgetRecord]) -> PersistenceResult<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }

        let document = PersistedDocument {
            state: PersistedState {
                widgets: widgets.to_vec(),
            },
        };
        let bytes = serde_json::to_vec_pretty(&document)?;

        let tmp_path = self.path.with_extension("json.tmp");
        {
            let mut file = fs::File::create(&tmp_path)?;
            file.write_all(&bytes)?;
            file.sync_all()?;
        }
        fs::rename(&tmp_path, &self.path)?;

        debug!(path = %self.path.display(), count = widgets.len(), "Saved widgets");
        Ok(())
    }

    /// Delete the stored document.
    pub fn clear(&self) -> PersistenceResult<()> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use finboard_core::{DisplayMode, NewWidget};

    fn widget(title: &str) -> WidgetRecord {
        WidgetRecord::from_new(NewWidget {
            title: title.to_string(),
            api_url: "https://api.example.com/price".to_string(),
            refresh_interval: 30,
            display_mode: DisplayMode::Card,
            selected_fields: vec!["price".to_string()],
            chart_type: None,
            ws_url: None,
            use_websocket: false,
        })
    }

    #[test]
    fn test_missing_file_loads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = WidgetStore::new(dir.path());
        assert!(store.load().is_empty());
        assert!(store.try_load().unwrap().is_empty());
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let store = WidgetStore::new(dir.path().join("nested"));
        let widgets = vec![widget("BTC"), widget("ETH")];

        store.save(&widgets).unwrap();
        assert_eq!(store.load(), widgets);
        assert!(!store.path().with_extension("json.tmp").exists());
    }

    #[test]
    fn test_document_layout() {
        let dir = tempfile::tempdir().unwrap();
        let store = WidgetStore::new(dir.path());
        store.save(&[widget("BTC")]).unwrap();

        let raw: serde_json::Value =
            serde_json::from_slice(&fs::read(store.path()).unwrap()).unwrap();
        let widgets = raw["state"]["widgets"].as_array().unwrap();
        assert_eq!(widgets.len(), 1);
        assert_eq!(widgets[0]["title"], "BTC");
        assert_eq!(widgets[0]["apiUrl"], "https://api.example.com/price");
        assert!(store.path().ends_with("finboard_dashboard.json"));
    }

    #[test]
    fn test_corrupt_file_falls_back_to_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = WidgetStore::new(dir.path());
        fs::write(store.path(), b"{not json").unwrap();

        assert!(store.try_load().is_err());
        assert!(store.load().is_empty());

        // The next save repairs the file
        store.save(&[widget("BTC")]).unwrap();
        assert_eq!(store.load().len(), 1);
    }

    #[test]
    fn test_clear() {
        let dir = tempfile::tempdir().unwrap();
        let store = WidgetStore::new(dir.path());
        store.clear().unwrap();

        store.save(&[widget("BTC")]).unwrap();
        store.clear().unwrap();
        assert!(!store.path().exists());
    }
}
