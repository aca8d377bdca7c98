//! Reverse geocoding: a best-effort place name for a coordinate.
//!
//! Lookups go to a Nominatim endpoint through `curl`. Failures are never
//! fatal; [`PlaceTracker`] keeps showing the last name that resolved.

use std::process::Command;

use serde::Deserialize;

use crate::geo::Coordinate;

/// Shown when a lookup succeeds but names nothing useful.
pub const DEFAULT_PLACE_NAME: &str = "Your Location";

pub const DEFAULT_NOMINATIM_URL: &str = "https://nominatim.openstreetmap.org/reverse";

pub const DEFAULT_USER_AGENT: &str = "WoofApp/1.0";

#[derive(Debug, thiserror::Error)]
pub enum GeocodeError {
    #[error("failed to run curl: {0}")]
    Spawn(#[from] std::io::Error),

    #[error("lookup failed: {0}")]
    Request(String),

    #[error("unexpected response: {0}")]
    Response(#[from] serde_json::Error),
}

/// Anything that can name a place.
pub trait Geocoder {
    fn place_name(&self, position: Coordinate) -> Result<String, GeocodeError>;
}

#[derive(Debug, Default, Deserialize)]
struct ReverseResponse {
    #[serde(default)]
    address: Address,
}

#[derive(Debug, Default, Deserialize)]
struct Address {
    neighbourhood: Option<String>,
    suburb: Option<String>,
    city: Option<String>,
    town: Option<String>,
}

/// Picks the most specific name from a Nominatim reverse response.
///
/// Prefers neighbourhood, then suburb, city, and town.
pub fn parse_place_name(body: &str) -> Result<String, GeocodeError> {
    let response: ReverseResponse = serde_json::from_str(body)?;
    let Address {
        neighbourhood,
        suburb,
        city,
        town,
    } = response.address;

    Ok(neighbourhood
        .or(suburb)
        .or(city)
        .or(town)
        .unwrap_or_else(|| DEFAULT_PLACE_NAME.to_string()))
}

/// Reverse geocoding against a Nominatim server.
#[derive(Debug, Clone)]
pub struct NominatimGeocoder {
    url: String,
    user_agent: String,
}

impl Default for NominatimGeocoder {
    fn default() -> Self {
        Self::new(DEFAULT_NOMINATIM_URL, DEFAULT_USER_AGENT)
    }
}

impl NominatimGeocoder {
    pub fn new(url: impl Into<String>, user_agent: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            user_agent: user_agent.into(),
        }
    }

    fn request_url(&self, position: Coordinate) -> String {
        format!(
            "{}?format=json&lat={}&lon={}&addressdetails=1",
            self.url, position.latitude, position.longitude
        )
    }
}

impl Geocoder for NominatimGeocoder {
    fn place_name(&self, position: Coordinate) -> Result<String, GeocodeError> {
        let output = Command::new("curl")
            .args(["--silent", "--show-error", "--fail", "--max-time", "10"])
            .args(["--user-agent", self.user_agent.as_str()])
            .arg(self.request_url(position))
            .output()?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(GeocodeError::Request(stderr.trim().to_string()));
        }

        parse_place_name(&String::from_utf8_lossy(&output.stdout))
    }
}

/// Remembers the last place name that resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaceTracker {
    name: String,
}

impl Default for PlaceTracker {
    fn default() -> Self {
        Self {
            name: DEFAULT_PLACE_NAME.to_string(),
        }
    }
}

impl PlaceTracker {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Looks up `position`; on failure logs and keeps the previous name.
    pub fn update(&mut self, geocoder: &impl Geocoder, position: Coordinate) -> &str {
        match geocoder.place_name(position) {
            Ok(name) => self.name = name,
            Err(e) => tracing::warn!(error = %e, "reverse geocoding failed"),
        }
        &self.name
    }
}
