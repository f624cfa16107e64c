//! Crawl state persistence for resumable crawling
//!
//! The pagination controller owns a [`CrawlState`] value and hands it to a
//! [`CrawlStateStore`] after every confirmed step. The file-backed store
//! writes to a temp file and renames it over the target, so an interrupted
//! write never leaves a truncated state file behind.
//!
//! # Example
//!
//! ```no_run
//! use offerhound::models::CrawlState;
//! use offerhound::storage::checkpoint::{CrawlStateStore, JsonStateFile};
//! use std::path::Path;
//!
//! # async fn example() -> Result<(), offerhound::utils::error::StoreError> {
//! let store = JsonStateFile::new(Path::new("data/crawl_state.json"));
//!
//! let mut state = store.load().await?;
//! state.current_page = 3;
//! store.save(&state).await?;
//! # Ok(())
//! # }
//! ```

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::models::CrawlState;
use crate::utils::error::StoreError;

/// Load/save port for pagination progress
#[async_trait]
pub trait CrawlStateStore: Send + Sync {
    /// Current progress, or the default state when none is stored
    async fn load(&self) -> Result<CrawlState, StoreError>;

    /// Persist progress durably before returning
    async fn save(&self, state: &CrawlState) -> Result<(), StoreError>;

    /// Forget stored progress
    async fn reset(&self) -> Result<(), StoreError> {
        self.save(&CrawlState::default()).await
    }
}

// ============================================================================
// JSON file store
// ============================================================================

/// `crawl_state.json` store
#[derive(Debug, Clone)]
pub struct JsonStateFile {
    path: PathBuf,
}

impl JsonStateFile {
    pub fn new(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "crawl_state.json".into());
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

#[async_trait]
impl CrawlStateStore for JsonStateFile {
    async fn load(&self) -> Result<CrawlState, StoreError> {
        let contents = match fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %self.path.display(), "No crawl state file, starting fresh");
                return Ok(CrawlState::default());
            }
            Err(e) => return Err(e.into()),
        };

        if contents.trim().is_empty() {
            tracing::warn!(path = %self.path.display(), "Crawl state file is empty, starting fresh");
            return Ok(CrawlState::default());
        }

        match serde_json::from_str::<CrawlState>(&contents) {
            Ok(state) => {
                tracing::debug!(
                    path = %self.path.display(),
                    page = state.current_page,
                    max_pages = state.max_pages,
                    "Crawl state loaded"
                );
                Ok(state)
            }
            Err(e) => {
                tracing::warn!(
                    path = %self.path.display(),
                    error = %e,
                    "Crawl state file is malformed, starting fresh"
                );
                Ok(CrawlState::default())
            }
        }
    }

    async fn save(&self, state: &CrawlState) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        let temp_path = self.temp_path();
        let file = File::create(&temp_path)?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer_pretty(&mut writer, state)?;
        writer.flush()?;
        writer.get_ref().sync_all()?;
        drop(writer);

        fs::rename(&temp_path, &self.path)?;

        tracing::debug!(
            path = %self.path.display(),
            page = state.current_page,
            "Crawl state saved"
        );
        Ok(())
    }
}

// ============================================================================
// In-memory store
// ============================================================================

/// In-memory store that records every save (for testing)
#[derive(Debug, Default)]
pub struct MemoryStateStore {
    current: Mutex<Option<CrawlState>>,
    history: Mutex<Vec<CrawlState>>,
}

impl MemoryStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-seeded with `state`
    pub fn with_state(state: CrawlState) -> Self {
        Self {
            current: Mutex::new(Some(state)),
            history: Mutex::new(Vec::new()),
        }
    }

    /// Every state passed to `save`, oldest first
    pub fn history(&self) -> Vec<CrawlState> {
        self.history.lock().map(|h| h.clone()).unwrap_or_default()
    }

    /// Last stored state
    pub fn current(&self) -> Option<CrawlState> {
        self.current.lock().ok().and_then(|c| c.clone())
    }
}

#[async_trait]
impl CrawlStateStore for MemoryStateStore {
    async fn load(&self) -> Result<CrawlState, StoreError> {
        let current = self.current.lock().map_err(|_| StoreError::Poisoned)?;
        Ok(current.clone().unwrap_or_default())
    }

    async fn save(&self, state: &CrawlState) -> Result<(), StoreError> {
        *self.current.lock().map_err(|_| StoreError::Poisoned)? = Some(state.clone());
        self.history
            .lock()
            .map_err(|_| StoreError::Poisoned)?
            .push(state.clone());
        Ok(())
    }
}
