//! On-disk store root for the event queue
//!
//! The store owns one directory and the small files inside it:
//!
//! - `id`: persisted pseudo-identifier (UUID, generated once)
//! - `disable`: marker file; presence means tracking is opted out
//! - `events`: the append-only journal (owned by [`crate::journal`])
//! - `last_flush`: sentinel file; only its mtime is meaningful
//!
//! Opening a store never fails hard. Storage problems degrade the instance
//! to [`TrackingStatus::Unavailable`], which callers observe as an inert
//! tracker rather than an error.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use uuid::Uuid;

use crate::config;
use crate::error::{Error, Result};

pub(crate) const ID_FILE: &str = "id";
pub(crate) const DISABLE_FILE: &str = "disable";
pub(crate) const EVENTS_FILE: &str = "events";
pub(crate) const LAST_FLUSH_FILE: &str = "last_flush";

/// Whether the tracker records events, and if not, why.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackingStatus {
    /// Recording events
    Enabled,
    /// The user opted out (the disable marker exists)
    Disabled,
    /// Local storage is unusable; tracking calls are inert
    Unavailable,
}

/// Resolve the platform preferences root for a store directory name.
///
/// macOS: `~/Library/Preferences/<dir>`, Linux: `$XDG_CONFIG_HOME/<dir>`
/// (or `~/.config/<dir>`), Windows: `%LOCALAPPDATA%/<dir>/Config`.
pub fn platform_root(dir: &str) -> Result<PathBuf> {
    if cfg!(target_os = "macos") {
        Ok(config::home_dir()
            .join("Library")
            .join("Preferences")
            .join(dir))
    } else if cfg!(target_os = "linux") {
        Ok(config::xdg_config_home().join(dir))
    } else if cfg!(target_os = "windows") {
        let base = std::env::var_os("LOCALAPPDATA")
            .map(PathBuf::from)
            .unwrap_or_else(|| config::home_dir().join("AppData").join("Local"));
        Ok(base.join(dir).join("Config"))
    } else {
        Err(Error::UnsupportedPlatform(std::env::consts::OS.to_string()))
    }
}

/// The store root and the persisted state inside it.
#[derive(Debug)]
pub struct Store {
    root: PathBuf,
    user_id: Option<String>,
    status: TrackingStatus,
}

impl Store {
    /// Open (creating if needed) the store at `root`.
    ///
    /// Failures creating the root or reading the disable marker yield an
    /// `Unavailable` store; failures loading or persisting the id are
    /// logged and leave tracking enabled without a persisted identifier.
    pub fn open(root: PathBuf) -> Store {
        if let Err(e) = fs::create_dir_all(&root) {
            tracing::error!(root = %root.display(), error = %e, "couldn't create store root");
            return Store {
                root,
                user_id: None,
                status: TrackingStatus::Unavailable,
            };
        }

        let status = match fs::metadata(root.join(DISABLE_FILE)) {
            Ok(_) => TrackingStatus::Disabled,
            Err(e) if e.kind() == io::ErrorKind::NotFound => TrackingStatus::Enabled,
            Err(e) => {
                tracing::error!(root = %root.display(), error = %e, "couldn't read disable marker");
                TrackingStatus::Unavailable
            }
        };

        let mut store = Store {
            root,
            user_id: None,
            status,
        };

        if store.status == TrackingStatus::Enabled {
            store.user_id = store.load_or_create_id();
        }

        store
    }

    /// id file contents, generating and persisting a fresh UUID on first use.
    fn load_or_create_id(&self) -> Option<String> {
        let path = self.root.join(ID_FILE);

        match fs::read_to_string(&path) {
            Ok(id) => {
                tracing::debug!("id already created");
                return Some(id);
            }
            Err(e) if e.kind() != io::ErrorKind::NotFound => {
                tracing::debug!(error = %e, "error reading id");
                return None;
            }
            Err(_) => {}
        }

        tracing::debug!("creating id");
        let id = Uuid::new_v4().to_string();

        match fs::write(&path, &id) {
            Ok(()) => {
                // A fresh id starts the flush-age clock.
                if let Err(e) = self.touch() {
                    tracing::debug!(error = %e, "error touching last flush");
                }
            }
            Err(e) => {
                tracing::debug!(error = %e, "error saving id");
            }
        }

        Some(id)
    }

    /// A store with no usable root, for instances whose root could not
    /// even be resolved.
    pub(crate) fn unavailable() -> Store {
        Store {
            root: PathBuf::new(),
            user_id: None,
            status: TrackingStatus::Unavailable,
        }
    }

    /// The store root directory
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of the event journal inside this store
    pub fn events_path(&self) -> PathBuf {
        self.root.join(EVENTS_FILE)
    }

    /// The persisted pseudo-identifier, if one could be read or created
    pub fn user_id(&self) -> Option<&str> {
        self.user_id.as_deref()
    }

    /// Current tracking status
    pub fn status(&self) -> TrackingStatus {
        self.status
    }

    /// True unless the user opted out or storage is unusable
    pub fn is_enabled(&self) -> bool {
        self.status == TrackingStatus::Enabled
    }

    fn check_available(&self) -> Result<()> {
        if self.status == TrackingStatus::Unavailable {
            return Err(Error::Store("local storage is unavailable".to_string()));
        }
        Ok(())
    }

    /// Disable tracking by creating the disable marker. Idempotent.
    pub fn disable(&mut self) -> Result<()> {
        self.check_available()?;
        tracing::debug!("disable");
        fs::File::create(self.root.join(DISABLE_FILE))?;
        self.status = TrackingStatus::Disabled;
        Ok(())
    }

    /// Enable tracking by removing the disable marker. Idempotent.
    pub fn enable(&mut self) -> Result<()> {
        self.check_available()?;
        tracing::debug!("enable");
        match fs::remove_file(self.root.join(DISABLE_FILE)) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
        self.status = TrackingStatus::Enabled;
        Ok(())
    }

    /// Rewrite the last-flush sentinel so its mtime is now.
    pub fn touch(&self) -> Result<()> {
        self.check_available()?;
        fs::write(self.root.join(LAST_FLUSH_FILE), b"")?;
        Ok(())
    }

    /// Last flush time, from the sentinel's mtime. Errors if the sentinel
    /// is absent; callers treat that as an unknown age.
    pub fn last_flush(&self) -> Result<SystemTime> {
        let meta = fs::metadata(self.root.join(LAST_FLUSH_FILE))?;
        Ok(meta.modified()?)
    }

    /// Time since the last flush, or zero when it is unknown so an absent
    /// sentinel never triggers an age-based flush.
    pub fn last_flush_age(&self) -> Duration {
        match self.last_flush() {
            Ok(t) => SystemTime::now()
                .duration_since(t)
                .unwrap_or(Duration::ZERO),
            Err(_) => Duration::ZERO,
        }
    }
}
