//! Woof configuration.
//!
//! Loaded from `~/.woof/config.toml`. Every field is optional and a missing
//! file means defaults:
//!
//! ```toml
//! user = "luna"
//! database = "/home/me/.woof/woof.sqlite"
//! geocoder-url = "https://nominatim.openstreetmap.org/reverse"
//! user-agent = "WoofApp/1.0"
//! ```

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::geocode::{DEFAULT_NOMINATIM_URL, DEFAULT_USER_AGENT, NominatimGeocoder};
use crate::storage::Storage;

/// Woof configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct Config {
    /// The user to act as when neither `--as` nor `WOOF_USER` is given.
    pub user: Option<String>,

    /// Database file. Defaults to `~/.woof/woof.sqlite`.
    pub database: Option<PathBuf>,

    /// Nominatim reverse-geocoding endpoint.
    pub geocoder_url: Option<String>,

    /// `User-Agent` sent with geocoding requests.
    pub user_agent: Option<String>,
}

impl Config {
    /// Load config from `~/.woof/config.toml`, or defaults if there is none.
    pub fn load() -> Result<Self, String> {
        match Self::path() {
            Some(path) => Self::load_from(&path),
            None => Ok(Self::default()),
        }
    }

    /// Load config from `path`. A missing file yields defaults.
    pub fn load_from(path: &Path) -> Result<Self, String> {
        let contents = match fs::read_to_string(path) {
            Ok(s) => s,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Self::default()),
            Err(e) => return Err(format!("failed to read {}: {e}", path.display())),
        };

        toml::from_str(&contents).map_err(|e| format!("invalid config at {}: {e}", path.display()))
    }

    /// The config file path: `~/.woof/config.toml`.
    pub fn path() -> Option<PathBuf> {
        dirs::home_dir().map(|h| h.join(".woof").join("config.toml"))
    }

    /// The configured user, ignoring an empty string.
    pub fn user(&self) -> Option<&str> {
        self.user.as_deref().filter(|s| !s.is_empty())
    }

    /// Where the database lives: the configured path or the default.
    pub fn database_path(&self) -> Option<PathBuf> {
        self.database.clone().or_else(Storage::default_path)
    }

    pub fn geocoder(&self) -> NominatimGeocoder {
        NominatimGeocoder::new(
            self.geocoder_url.as_deref().unwrap_or(DEFAULT_NOMINATIM_URL),
            self.user_agent.as_deref().unwrap_or(DEFAULT_USER_AGENT),
        )
    }
}
