//! Spherical geometry for `2dsphere` indexes and geo queries
//!
//! Coordinates are `[longitude, latitude]` in degrees. Distances are metres
//! on a sphere of radius [`EARTH_RADIUS_METERS`].

use labcheck_core::{Error, Result, Value};

/// Sphere radius used for distance calculations.
pub(crate) const EARTH_RADIUS_METERS: f64 = 6_378_100.0;

/// A validated longitude/latitude pair.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct Point {
    pub lng: f64,
    pub lat: f64,
}

impl Point {
    fn from_coordinates(value: &Value) -> Result<Self> {
        let pair = value
            .as_array()
            .filter(|items| items.len() == 2)
            .ok_or_else(|| Error::InvalidGeometry(format!("Point must be [lng, lat]: {}", value)))?;
        let lng = pair[0]
            .as_f64()
            .ok_or_else(|| Error::InvalidGeometry(format!("longitude is not a number: {}", pair[0])))?;
        let lat = pair[1]
            .as_f64()
            .ok_or_else(|| Error::InvalidGeometry(format!("latitude is not a number: {}", pair[1])))?;
        if !(-180.0..=180.0).contains(&lng) || !(-90.0..=90.0).contains(&lat) {
            return Err(Error::InvalidGeometry(format!(
                "longitude/latitude is out of bounds, lng: {} lat: {}",
                lng, lat
            )));
        }
        Ok(Point { lng, lat })
    }

    /// Parse a GeoJSON `Point` or a legacy `[lng, lat]` pair.
    pub(crate) fn parse(value: &Value) -> Result<Self> {
        match value {
            Value::Array(_) => Self::from_coordinates(value),
            Value::Object(map) => {
                match map.get("type").and_then(Value::as_str) {
                    Some("Point") => {}
                    Some(other) => {
                        return Err(Error::InvalidGeometry(format!(
                            "expected a Point, got {}",
                            other
                        )))
                    }
                    None => {
                        return Err(Error::InvalidGeometry(
                            "unknown GeoJSON type: missing 'type'".to_string(),
                        ))
                    }
                }
                let coordinates = map.get("coordinates").ok_or_else(|| {
                    Error::InvalidGeometry("Point is missing 'coordinates'".to_string())
                })?;
                Self::from_coordinates(coordinates)
            }
            other => Err(Error::InvalidGeometry(format!(
                "geo field is not a GeoJSON object or coordinate pair: {}",
                other
            ))),
        }
    }

    /// Great-circle distance to another point, in metres.
    pub(crate) fn distance_to(&self, other: &Point) -> f64 {
        self.angle_to(other) * EARTH_RADIUS_METERS
    }

    /// Central angle to another point, in radians (haversine).
    pub(crate) fn angle_to(&self, other: &Point) -> f64 {
        let (lat1, lat2) = (self.lat.to_radians(), other.lat.to_radians());
        let dlat = lat2 - lat1;
        let dlng = (other.lng - self.lng).to_radians();
        let h = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlng / 2.0).sin().powi(2);
        2.0 * h.sqrt().min(1.0).asin()
    }
}

/// Validate a value stored under a `2dsphere` key.
///
/// Accepts GeoJSON `Point` and `Polygon` (closed rings) and legacy pairs.
pub(crate) fn validate_geometry(value: &Value) -> Result<()> {
    if let Some("Polygon") = value.get("type").and_then(Value::as_str) {
        parse_polygon(value.get("coordinates").unwrap_or(&Value::Null)).map(|_| ())
    } else {
        Point::parse(value).map(|_| ())
    }
}

/// Parse polygon coordinates; only the outer ring is used for containment.
fn parse_polygon(coordinates: &Value) -> Result<Vec<Point>> {
    let outer = coordinates
        .as_array()
        .and_then(|rings| rings.first())
        .and_then(Value::as_array)
        .ok_or_else(|| Error::InvalidGeometry("Polygon coordinates must be an array of rings".to_string()))?;
    let ring = outer
        .iter()
        .map(Point::from_coordinates)
        .collect::<Result<Vec<_>>>()?;
    if ring.len() < 4 {
        return Err(Error::InvalidGeometry(
            "Loop must have at least 3 different vertices".to_string(),
        ));
    }
    if ring.first() != ring.last() {
        return Err(Error::InvalidGeometry("Loop is not closed".to_string()));
    }
    Ok(ring)
}

/// Region accepted by `$geoWithin`.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum GeoShape {
    /// `$centerSphere: [[lng, lat], radiusRadians]`
    CenterSphere { center: Point, radians: f64 },
    /// `$box: [[lng, lat], [lng, lat]]` (bottom-left, top-right)
    Box { min: Point, max: Point },
    /// `$geometry: { type: "Polygon", ... }`
    Polygon(Vec<Point>),
}

impl GeoShape {
    /// Parse the operand of `$geoWithin`.
    pub(crate) fn parse(spec: &Value) -> Result<Self> {
        let map = spec
            .as_object()
            .ok_or_else(|| Error::InvalidQuery("$geoWithin not an object".to_string()))?;
        if let Some(center) = map.get("$centerSphere") {
            let parts = center
                .as_array()
                .filter(|p| p.len() == 2)
                .ok_or_else(|| Error::InvalidQuery("$centerSphere must be [[lng, lat], radius]".to_string()))?;
            let radians = parts[1]
                .as_f64()
                .filter(|r| *r >= 0.0)
                .ok_or_else(|| Error::InvalidQuery("$centerSphere radius must be a non-negative number".to_string()))?;
            return Ok(GeoShape::CenterSphere {
                center: Point::from_coordinates(&parts[0]).map_err(as_query_error)?,
                radians,
            });
        }
        if let Some(corners) = map.get("$box") {
            let parts = corners
                .as_array()
                .filter(|p| p.len() == 2)
                .ok_or_else(|| Error::InvalidQuery("$box must be [[lng, lat], [lng, lat]]".to_string()))?;
            return Ok(GeoShape::Box {
                min: Point::from_coordinates(&parts[0]).map_err(as_query_error)?,
                max: Point::from_coordinates(&parts[1]).map_err(as_query_error)?,
            });
        }
        if let Some(geometry) = map.get("$geometry") {
            return match geometry.get("type").and_then(Value::as_str) {
                Some("Polygon") => Ok(GeoShape::Polygon(
                    parse_polygon(geometry.get("coordinates").unwrap_or(&Value::Null))
                        .map_err(as_query_error)?,
                )),
                _ => Err(Error::InvalidQuery(
                    "$geoWithin $geometry must be a Polygon".to_string(),
                )),
            };
        }
        Err(Error::InvalidQuery(
            "unknown geo specifier in $geoWithin".to_string(),
        ))
    }

    /// Whether the point lies inside the region.
    pub(crate) fn contains(&self, point: &Point) -> bool {
        match self {
            GeoShape::CenterSphere { center, radians } => center.angle_to(point) <= *radians,
            GeoShape::Box { min, max } => {
                (min.lng..=max.lng).contains(&point.lng) && (min.lat..=max.lat).contains(&point.lat)
            }
            GeoShape::Polygon(ring) => point_in_ring(point, ring),
        }
    }
}

/// Even-odd ray casting in lng/lat space.
fn point_in_ring(point: &Point, ring: &[Point]) -> bool {
    let mut inside = false;
    for edge in ring.windows(2) {
        let (a, b) = (edge[0], edge[1]);
        if (a.lat > point.lat) != (b.lat > point.lat) {
            let cross = (b.lng - a.lng) * (point.lat - a.lat) / (b.lat - a.lat) + a.lng;
            if point.lng < cross {
                inside = !inside;
            }
        }
    }
    inside
}

fn as_query_error(err: Error) -> Error {
    match err {
        Error::InvalidGeometry(msg) => Error::InvalidQuery(msg),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_geojson_and_legacy_points() {
        let a = Point::parse(&json!({"type": "Point", "coordinates": [-73.98, 40.75]})).unwrap();
        let b = Point::parse(&json!([-73.98, 40.75])).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_out_of_bounds_point_rejected() {
        let err = Point::parse(&json!({"type": "Point", "coordinates": [200.0, 10.0]})).unwrap_err();
        assert!(err.to_string().contains("out of bounds"));
    }

    #[test]
    fn test_distance_new_york_to_boston() {
        let nyc = Point { lng: -74.006, lat: 40.7128 };
        let boston = Point { lng: -71.0589, lat: 42.3601 };
        let km = nyc.distance_to(&boston) / 1000.0;
        assert!((300.0..315.0).contains(&km), "got {} km", km);
    }

    #[test]
    fn test_polygon_validation() {
        assert!(validate_geometry(&json!({
            "type": "Polygon",
            "coordinates": [[[0, 0], [0, 1], [1, 1], [0, 0]]]
        }))
        .is_ok());
        assert!(validate_geometry(&json!({
            "type": "Polygon",
            "coordinates": [[[0, 0], [0, 1], [1, 1], [1, 0]]]
        }))
        .is_err());
    }

    #[test]
    fn test_geo_shapes_contain() {
        let square = GeoShape::parse(&json!({"$geometry": {
            "type": "Polygon",
            "coordinates": [[[0, 0], [0, 2], [2, 2], [2, 0], [0, 0]]]
        }}))
        .unwrap();
        assert!(square.contains(&Point { lng: 1.0, lat: 1.0 }));
        assert!(!square.contains(&Point { lng: 3.0, lat: 1.0 }));

        let circle = GeoShape::parse(&json!({"$centerSphere": [[0, 0], 0.01]})).unwrap();
        assert!(circle.contains(&Point { lng: 0.1, lat: 0.1 }));
        assert!(!circle.contains(&Point { lng: 5.0, lat: 5.0 }));

        let bx = GeoShape::parse(&json!({"$box": [[-1, -1], [1, 1]]})).unwrap();
        assert!(bx.contains(&Point { lng: 0.5, lat: -0.5 }));
    }
}
