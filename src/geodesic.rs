use geo::{Distance, Geodesic, Point};

/// Distance in meters between two (lat, lon) pairs on the WGS-84 ellipsoid.
pub fn geodesic_distance_m(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    // geo points are (x = lon, y = lat)
    Geodesic::distance(Point::new(lon1, lat1), Point::new(lon2, lat2))
}
