use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use anyhow::Context;
use directories::ProjectDirs;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tracing::warn;

use crate::model::Theme;
use crate::timer::TimerState;

const TIMER_STATE_FILE: &str = "timer-state.json";
const THEME_FILE: &str = "theme.json";

/// Client-side state that survives restarts.
#[derive(Debug, Clone)]
pub struct LocalStore {
    dir: PathBuf,
}

#[derive(Serialize, Deserialize)]
struct ThemePreference {
    theme: Theme,
}

impl LocalStore {
    /// Opens `dir`, or the platform data directory when `None`.
    pub fn open(dir: Option<PathBuf>) -> anyhow::Result<Self> {
        let dir = match dir {
            Some(d) => d,
            None => ProjectDirs::from("", "", "focushero")
                .map(|p| p.data_local_dir().to_path_buf())
                .context("no home directory; pass --state-dir")?,
        };
        fs::create_dir_all(&dir)
            .with_context(|| format!("create state dir {}", dir.display()))?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Last saved timer state, never marked running.
    pub fn load_timer_state(&self) -> Option<TimerState> {
        let mut state: TimerState = self.load_json(TIMER_STATE_FILE)?;
        state.is_running = false;
        Some(state)
    }

    pub fn save_timer_state(&self, state: &TimerState) -> anyhow::Result<()> {
        self.save_json(TIMER_STATE_FILE, state)
    }

    pub fn load_theme(&self) -> Theme {
        self.load_json::<ThemePreference>(THEME_FILE)
            .map(|p| p.theme)
            .unwrap_or_default()
    }

    pub fn save_theme(&self, theme: Theme) -> anyhow::Result<()> {
        self.save_json(THEME_FILE, &ThemePreference { theme })
    }

    /// Removes every locally stored file. Returns how many were deleted.
    pub fn clear(&self) -> anyhow::Result<usize> {
        let mut removed = 0;
        for name in [TIMER_STATE_FILE, THEME_FILE] {
            match fs::remove_file(self.dir.join(name)) {
                Ok(()) => removed += 1,
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => return Err(e).with_context(|| format!("remove {name}")),
            }
        }
        Ok(removed)
    }

    fn load_json<T: DeserializeOwned>(&self, name: &str) -> Option<T> {
        let path = self.dir.join(name);
        let raw = match fs::read_to_string(&path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return None,
            Err(e) => {
                warn!("read {} failed: {e}", path.display());
                return None;
            }
        };
        match serde_json::from_str(&raw) {
            Ok(v) => Some(v),
            Err(e) => {
                warn!("ignoring corrupt {}: {e}", path.display());
                None
            }
        }
    }

    fn save_json<T: Serialize>(&self, name: &str, value: &T) -> anyhow::Result<()> {
        let path = self.dir.join(name);
        let raw = serde_json::to_string_pretty(value)?;
        fs::write(&path, raw).with_context(|| format!("write {}", path.display()))
    }
}
