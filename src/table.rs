use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::geodesic::geodesic_distance_m;
use crate::gpx_types::{GpxData, GpxPoint};
use crate::options::LoadOptions;

/// One derived row per track point.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DerivedRow {
    pub time: Option<DateTime<Utc>>,
    pub lat: f64,
    pub lon: f64,
    pub elevation: Option<f64>,
    pub delta_distance_km: f64,
    pub distance_km: f64,
    pub speed_km_h: Option<f64>,
    pub pace_min_km: Option<f64>,
}

/// Ordered table of derived rows, one per track point in document order.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct TrackTable {
    rows: Vec<DerivedRow>,
}

impl TrackTable {
    pub fn rows(&self) -> &[DerivedRow] {
        &self.rows
    }

    pub fn into_rows(self) -> Vec<DerivedRow> {
        self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn times(&self) -> Vec<Option<DateTime<Utc>>> {
        self.rows.iter().map(|r| r.time).collect()
    }

    pub fn delta_distance_km(&self) -> Vec<f64> {
        self.rows.iter().map(|r| r.delta_distance_km).collect()
    }

    pub fn distance_km(&self) -> Vec<f64> {
        self.rows.iter().map(|r| r.distance_km).collect()
    }

    pub fn speed_km_h(&self) -> Vec<Option<f64>> {
        self.rows.iter().map(|r| r.speed_km_h).collect()
    }

    pub fn pace_min_km(&self) -> Vec<Option<f64>> {
        self.rows.iter().map(|r| r.pace_min_km).collect()
    }

    /// Cumulative distance at the last row, 0 for an empty table.
    pub fn total_distance_km(&self) -> f64 {
        self.rows.last().map_or(0.0, |r| r.distance_km)
    }
}

impl<'a> IntoIterator for &'a TrackTable {
    type Item = &'a DerivedRow;
    type IntoIter = std::slice::Iter<'a, DerivedRow>;

    fn into_iter(self) -> Self::IntoIter {
        self.rows.iter()
    }
}

/// Derive the track table from parsed GPX data.
pub fn build_table(data: &GpxData, opts: &LoadOptions) -> TrackTable {
    let mut rows: Vec<DerivedRow> = Vec::new();
    let mut prev: Option<&GpxPoint> = None;
    let mut total_m = 0.0;

    for pt in data.points() {
        let dist_m = match prev {
            Some(p) => geodesic_distance_m(p.lat, p.lon, pt.lat, pt.lon),
            None => 0.0,
        };
        total_m += dist_m;

        let delta_distance_km = round_to(dist_m / 1000.0, 4);
        let speed_km_h = rows
            .last()
            .and_then(|last| speed(delta_distance_km, elapsed_seconds(last.time, pt.time)));

        rows.push(DerivedRow {
            time: pt.time,
            lat: round_to(pt.lat, 4),
            lon: round_to(pt.lon, 4),
            elevation: pt.ele.map(|e| round_to(e, 2)),
            delta_distance_km,
            distance_km: round_to(total_m / 1000.0, 4),
            speed_km_h,
            pace_min_km: speed_km_h.and_then(|s| pace(s, opts)),
        });

        prev = Some(pt);
    }

    let blanked = rows
        .iter()
        .filter(|r| r.speed_km_h.is_some() && r.pace_min_km.is_none())
        .count();
    log::debug!(
        "derived {} rows from {} tracks, {} pace values blanked",
        rows.len(),
        data.tracks.len(),
        blanked
    );

    TrackTable { rows }
}

/// Seconds from `from` to `to`; missing when either timestamp is.
fn elapsed_seconds(from: Option<DateTime<Utc>>, to: Option<DateTime<Utc>>) -> Option<f64> {
    let (from, to) = (from?, to?);
    Some(to.signed_duration_since(from).num_milliseconds() as f64 / 1000.0)
}

/// km/h from a segment length and its duration. Zero duration has no speed.
fn speed(delta_distance_km: f64, elapsed_s: Option<f64>) -> Option<f64> {
    let elapsed_s = elapsed_s.filter(|s| *s != 0.0)?;
    Some(round_to(delta_distance_km / (elapsed_s / 3600.0), 2))
}

/// min/km from km/h, blanked when standing still or outside the plausible range.
fn pace(speed_km_h: f64, opts: &LoadOptions) -> Option<f64> {
    if speed_km_h == 0.0 {
        return None;
    }
    let pace = round_to(60.0 / speed_km_h, 2);
    opts.accepts_pace(pace).then_some(pace)
}

/// Round to `decimals` places from the exact binary value, as a decimal
/// printout would: 2.675 is stored just below itself and rounds to 2.67.
pub fn round_to(value: f64, decimals: usize) -> f64 {
    format!("{value:.decimals$}").parse().unwrap_or(value)
}
