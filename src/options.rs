use serde::Deserialize;

/// Fastest pace still taken as running, in min/km (about 4:14 min/km).
pub const DEFAULT_MIN_PACE_MIN_KM: f64 = 4.14;

/// Slowest pace still taken as running, in min/km (about 6:01 min/km).
pub const DEFAULT_MAX_PACE_MIN_KM: f64 = 6.01;

/// Options for deriving the track table.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoadOptions {
    /// Paces below this are blanked as GPS noise (default: 4.14)
    #[serde(default = "default_min_pace")]
    pub min_pace_min_km: f64,

    /// Paces above this are blanked as GPS noise (default: 6.01)
    #[serde(default = "default_max_pace")]
    pub max_pace_min_km: f64,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            min_pace_min_km: DEFAULT_MIN_PACE_MIN_KM,
            max_pace_min_km: DEFAULT_MAX_PACE_MIN_KM,
        }
    }
}

impl LoadOptions {
    /// Both bounds are inclusive.
    pub fn accepts_pace(&self, pace_min_km: f64) -> bool {
        pace_min_km >= self.min_pace_min_km && pace_min_km <= self.max_pace_min_km
    }
}

fn default_min_pace() -> f64 {
    DEFAULT_MIN_PACE_MIN_KM
}

fn default_max_pace() -> f64 {
    DEFAULT_MAX_PACE_MIN_KM
}
