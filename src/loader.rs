use std::path::Path;

use crate::error::TrackError;
use crate::options::LoadOptions;
use crate::parser::parse_gpx;
use crate::table::{TrackTable, build_table};

/// Load a GPX file and derive its track table with the default pace bounds.
pub fn load_track<P: AsRef<Path>>(path: P) -> Result<TrackTable, TrackError> {
    load_track_with(path, &LoadOptions::default())
}

/// Load a GPX file and derive its track table.
///
/// Fails with [`TrackError::FileAccess`] when the file cannot be read as UTF-8
/// text and with [`TrackError::Parse`] when it is not well-formed GPX. No
/// partial table is returned in either case.
pub fn load_track_with<P: AsRef<Path>>(
    path: P,
    opts: &LoadOptions,
) -> Result<TrackTable, TrackError> {
    let path = path.as_ref();
    let xml = std::fs::read_to_string(path).map_err(|source| TrackError::FileAccess {
        path: path.to_path_buf(),
        source,
    })?;
    log::debug!("loading track from {}", path.display());
    load_track_str(&xml, opts)
}

/// Derive a track table from GPX text already in memory.
pub fn load_track_str(xml: &str, opts: &LoadOptions) -> Result<TrackTable, TrackError> {
    let data = parse_gpx(xml)?;
    let untimed = data.points().filter(|p| p.time.is_none()).count();
    if untimed > 0 {
        log::warn!("{untimed} track points have no timestamp; their speed and pace are left empty");
    }
    Ok(build_table(&data, opts))
}
