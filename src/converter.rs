use geojson::{Feature, FeatureCollection, Geometry, Value};
use serde_json::{Map, Value as JsonValue};

use crate::table::{DerivedRow, TrackTable};

/// Convert a derived track table to a GeoJSON FeatureCollection.
///
/// The whole table becomes one LineString feature whose per-point derived
/// columns live under `coordinateProperties`.
pub fn to_feature_collection(table: &TrackTable, name: Option<&str>) -> FeatureCollection {
    let features = match table.rows() {
        [] => Vec::new(),
        [row] => vec![single_point_feature(row, name)],
        rows => vec![line_feature(rows, name)],
    };

    FeatureCollection {
        bbox: None,
        features,
        foreign_members: None,
    }
}

fn line_feature(rows: &[DerivedRow], name: Option<&str>) -> Feature {
    let coords: Vec<Vec<f64>> = rows.iter().map(row_coords).collect();
    let geometry = Geometry::new(Value::LineString(coords));

    let mut props = build_track_props(rows, name);
    insert_coordinate_properties(&mut props, rows);

    Feature {
        bbox: None,
        geometry: Some(geometry),
        id: None,
        properties: Some(props),
        foreign_members: None,
    }
}

fn single_point_feature(row: &DerivedRow, name: Option<&str>) -> Feature {
    let geometry = Geometry::new(Value::Point(row_coords(row)));

    let mut props = build_track_props(std::slice::from_ref(row), name);
    if let Some(time) = row.time {
        props.insert("time".to_string(), JsonValue::String(time.to_rfc3339()));
    }

    Feature {
        bbox: None,
        geometry: Some(geometry),
        id: None,
        properties: Some(props),
        foreign_members: None,
    }
}

fn build_track_props(rows: &[DerivedRow], name: Option<&str>) -> Map<String, JsonValue> {
    let mut props = Map::new();
    props.insert(
        "gpxType".to_string(),
        JsonValue::String("track".to_string()),
    );
    if let Some(name) = name {
        props.insert("name".to_string(), JsonValue::String(name.to_string()));
    }
    let total = rows.last().map_or(0.0, |r| r.distance_km);
    props.insert("distanceKm".to_string(), number(Some(total)));
    props
}

/// Build [lon, lat] or [lon, lat, ele] coordinate array.
fn row_coords(row: &DerivedRow) -> Vec<f64> {
    match row.elevation {
        Some(ele) => vec![row.lon, row.lat, ele],
        None => vec![row.lon, row.lat],
    }
}

fn insert_coordinate_properties(props: &mut Map<String, JsonValue>, rows: &[DerivedRow]) {
    let mut coord_props = Map::new();

    let times: Vec<JsonValue> = rows
        .iter()
        .map(|r| match r.time {
            Some(t) => JsonValue::String(t.to_rfc3339()),
            None => JsonValue::Null,
        })
        .collect();
    // Only include if at least one time is present
    if times.iter().any(|t| !t.is_null()) {
        coord_props.insert("times".to_string(), JsonValue::Array(times));
    }

    let column = |f: fn(&DerivedRow) -> Option<f64>| -> JsonValue {
        JsonValue::Array(rows.iter().map(|r| number(f(r))).collect())
    };
    coord_props.insert("distanceKm".to_string(), column(|r| Some(r.distance_km)));
    coord_props.insert("speedKmH".to_string(), column(|r| r.speed_km_h));
    coord_props.insert("paceMinKm".to_string(), column(|r| r.pace_min_km));

    props.insert(
        "coordinateProperties".to_string(),
        JsonValue::Object(coord_props),
    );
}

fn number(value: Option<f64>) -> JsonValue {
    value
        .and_then(serde_json::Number::from_f64)
        .map_or(JsonValue::Null, JsonValue::Number)
}
