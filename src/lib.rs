pub mod converter;
pub mod error;
pub mod geodesic;
pub mod gpx_types;
pub mod loader;
pub mod options;
pub mod parser;
pub mod table;

use wasm_bindgen::prelude::*;

pub use crate::error::{ParseError, TrackError};
pub use crate::loader::{load_track, load_track_str, load_track_with};
pub use crate::options::LoadOptions;
pub use crate::table::{DerivedRow, TrackTable};

/// Derive the track table from a GPX string, returned as a JS array of rows.
#[wasm_bindgen(js_name = gpxToTrackTable)]
pub fn gpx_to_track_table(gpx_string: &str, options: JsValue) -> Result<JsValue, JsValue> {
    console_error_panic_hook::set_once();

    let opts = parse_options(options)?;
    let table = load_track_str(gpx_string, &opts)?;
    serde_wasm_bindgen::to_value(&table).map_err(|e| JsValue::from_str(&e.to_string()))
}

/// Derive the track table from a GPX string, returned as a JSON string.
#[wasm_bindgen(js_name = gpxToTrackTableString)]
pub fn gpx_to_track_table_string(gpx_string: &str, options: JsValue) -> Result<String, JsValue> {
    console_error_panic_hook::set_once();

    let opts = parse_options(options)?;
    let table = load_track_str(gpx_string, &opts)?;
    serde_json::to_string(&table).map_err(|e| JsValue::from_str(&e.to_string()))
}

/// Derive the track table from a GPX string and return it as GeoJSON.
#[wasm_bindgen(js_name = gpxToPaceGeoJson)]
pub fn gpx_to_pace_geojson(gpx_string: &str, options: JsValue) -> Result<JsValue, JsValue> {
    console_error_panic_hook::set_once();

    let opts = parse_options(options)?;
    let data = parser::parse_gpx(gpx_string)?;
    let table = table::build_table(&data, &opts);
    let fc = converter::to_feature_collection(&table, data.name());
    serde_wasm_bindgen::to_value(&fc).map_err(|e| JsValue::from_str(&e.to_string()))
}

fn parse_options(options: JsValue) -> Result<LoadOptions, JsValue> {
    if options.is_undefined() || options.is_null() {
        Ok(LoadOptions::default())
    } else {
        serde_wasm_bindgen::from_value(options).map_err(|e| JsValue::from_str(&e.to_string()))
    }
}
