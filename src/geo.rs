//! # GeoSpatialMath
//! Pure great-circle geometry shared by the window filters and the cluster
//! engine. No I/O, no state.

/// Mean Earth radius in kilometers (IUGG).
pub const EARTH_RADIUS_KM: f64 = 6371.0088;

/// A geographic point as `(longitude, latitude)` in degrees.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct GeoPoint {
    pub lon: f64,
    pub lat: f64,
}

impl GeoPoint {
    pub fn new(lon: f64, lat: f64) -> Self {
        Self { lon, lat }
    }
}

/// Great-circle distance between two points, in kilometers (haversine).
pub fn haversine_km(a: GeoPoint, b: GeoPoint) -> f64 {
    let lat1 = a.lat.to_radians();
    let lat2 = b.lat.to_radians();
    let dlat = (b.lat - a.lat).to_radians();
    let dlon = (b.lon - a.lon).to_radians();

    let h = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_KM * h.sqrt().asin()
}

/// Distance in kilometers from `p` to the nearest point on the segment
/// `a`-`b`, using an equirectangular projection local to the segment.
///
/// Accurate enough for proximity queries at regional scale (a few hundred
/// kilometers); not intended for antipodal or polar segments.
pub fn point_to_segment_km(p: GeoPoint, a: GeoPoint, b: GeoPoint) -> f64 {
    // Project onto a flat plane around the segment midpoint.
    let mid_lat = ((a.lat + b.lat) / 2.0).to_radians();
    let scale_x = mid_lat.cos();

    let px = p.lon.to_radians() * scale_x;
    let py = p.lat.to_radians();
    let ax = a.lon.to_radians() * scale_x;
    let ay = a.lat.to_radians();
    let bx = b.lon.to_radians() * scale_x;
    let by = b.lat.to_radians();

    let (dx, dy) = (bx - ax, by - ay);
    let len2 = dx * dx + dy * dy;

    let t = if len2 > 0.0 {
        (((px - ax) * dx + (py - ay) * dy) / len2).clamp(0.0, 1.0)
    } else {
        0.0 // degenerate segment, fall back to endpoint distance
    };

    let cx = ax + t * dx;
    let cy = ay + t * dy;
    let nearest = GeoPoint::new((cx / scale_x).to_degrees(), cy.to_degrees());
    haversine_km(p, nearest)
}

/// Minimum distance in kilometers from `p` to a polyline given as an ordered
/// list of vertices. Returns `None` for polylines with fewer than two points.
pub fn point_to_polyline_km(p: GeoPoint, line: &[GeoPoint]) -> Option<f64> {
    if line.len() < 2 {
        return None;
    }
    line.windows(2)
        .map(|seg| point_to_segment_km(p, seg[0], seg[1]))
        .min_by(|a, b| a.partial_cmp(b).expect("distance is never NaN"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn haversine_zero_for_identical_points() {
        let p = GeoPoint::new(-122.42, 37.77);
        assert!(haversine_km(p, p) < 1e-9);
    }

    #[test]
    fn haversine_known_distance_sf_to_la() {
        // San Francisco -> Los Angeles, roughly 559 km
        let sf = GeoPoint::new(-122.4194, 37.7749);
        let la = GeoPoint::new(-118.2437, 34.0522);
        let d = haversine_km(sf, la);
        assert!((d - 559.0).abs() < 5.0, "got {d}");
    }

    #[test]
    fn haversine_is_symmetric() {
        let a = GeoPoint::new(139.69, 35.69);
        let b = GeoPoint::new(-74.0, 40.71);
        assert!((haversine_km(a, b) - haversine_km(b, a)).abs() < 1e-9);
    }

    #[test]
    fn segment_distance_to_point_on_segment_is_zero() {
        let a = GeoPoint::new(0.0, 0.0);
        let b = GeoPoint::new(2.0, 0.0);
        let mid = GeoPoint::new(1.0, 0.0);
        assert!(point_to_segment_km(mid, a, b) < 0.5);
    }

    #[test]
    fn segment_distance_clamps_to_endpoints() {
        let a = GeoPoint::new(0.0, 0.0);
        let b = GeoPoint::new(1.0, 0.0);
        // Point beyond b: nearest point is b itself.
        let p = GeoPoint::new(3.0, 0.0);
        let d = point_to_segment_km(p, a, b);
        let expected = haversine_km(p, b);
        assert!((d - expected).abs() < 1.0, "got {d}, expected {expected}");
    }

    #[test]
    fn polyline_needs_two_vertices() {
        let p = GeoPoint::new(0.0, 0.0);
        assert!(point_to_polyline_km(p, &[]).is_none());
        assert!(point_to_polyline_km(p, &[GeoPoint::new(1.0, 1.0)]).is_none());
    }

    #[test]
    fn polyline_picks_nearest_segment() {
        let line = vec![
            GeoPoint::new(0.0, 0.0),
            GeoPoint::new(1.0, 0.0),
            GeoPoint::new(1.0, 5.0),
        ];
        // Close to the second (vertical) segment.
        let p = GeoPoint::new(1.1, 3.0);
        let d = point_to_polyline_km(p, &line).unwrap();
        assert!(d < 15.0, "got {d}");
    }
}
