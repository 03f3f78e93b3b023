use chrono::{DateTime, Utc};

/// Parsed GPX data. Only tracks carry timed points, so waypoints and routes are not kept.
#[derive(Debug, Default)]
pub struct GpxData {
    pub tracks: Vec<GpxTrack>,
}

impl GpxData {
    /// All track points in document order: track, then segment, then point.
    pub fn points(&self) -> impl Iterator<Item = &GpxPoint> {
        self.tracks
            .iter()
            .flat_map(|trk| trk.segments.iter())
            .flat_map(|seg| seg.points.iter())
    }

    /// Name of the first named track, if any.
    pub fn name(&self) -> Option<&str> {
        self.tracks.iter().find_map(|trk| trk.name.as_deref())
    }
}

/// A single track point (<trkpt>).
#[derive(Debug, Clone, PartialEq)]
pub struct GpxPoint {
    pub lat: f64,
    pub lon: f64,
    pub ele: Option<f64>,
    pub time: Option<DateTime<Utc>>,
}

impl GpxPoint {
    pub fn new(lat: f64, lon: f64) -> Self {
        Self {
            lat,
            lon,
            ele: None,
            time: None,
        }
    }
}

/// A GPX track (<trk>).
#[derive(Debug, Default)]
pub struct GpxTrack {
    pub name: Option<String>,
    pub segments: Vec<GpxSegment>,
}

/// A GPX track segment (<trkseg>).
#[derive(Debug, Default)]
pub struct GpxSegment {
    pub points: Vec<GpxPoint>,
}
