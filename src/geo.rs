/*!
 * Geographic calculations.
 *
 * Simple spherical and flat-earth approximations only. The distances involved in grouping
 * hotspots are a few kilometers, so none of this needs an ellipsoidal model, and the
 * buffered circle approximation is deliberately equirectangular. Accuracy at high latitudes
 * is not guaranteed.
 */

/// A latitude-longitude position in degrees.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Coord {
    pub lat: f64,
    pub lon: f64,
}

/// A polygon ring of [Coord] vertices.
///
/// Rings with two or more vertices are closed, the first vertex is repeated as the last.
/// A single vertex is allowed and stands for a degenerate, trivially closed ring.
#[derive(Debug, Clone, PartialEq)]
pub struct Polygon(pub Vec<Coord>);

impl Polygon {
    pub fn ring(&self) -> &[Coord] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Check the ring invariant, first vertex equal to the last.
    pub fn is_closed(&self) -> bool {
        match self.0.len() {
            0 => false,
            1 => true,
            _ => self.0[0] == self.0[self.0.len() - 1],
        }
    }

    /// GeoJSON Polygon geometry with this ring as the outer boundary. GeoJSON orders each
    /// vertex longitude first.
    pub fn to_geojson(&self) -> serde_json::Value {
        let ring: Vec<[f64; 2]> = self.0.iter().map(|c| [c.lon, c.lat]).collect();
        serde_json::json!({ "type": "Polygon", "coordinates": [ring] })
    }

    /// Rebuild a ring from a GeoJSON Polygon geometry, taking the outer boundary only.
    pub fn from_geojson(value: &serde_json::Value) -> Option<Polygon> {
        let ring = value.get("coordinates")?.get(0)?.as_array()?;

        let mut coords = Vec::with_capacity(ring.len());
        for vertex in ring {
            let lon = vertex.get(0)?.as_f64()?;
            let lat = vertex.get(1)?.as_f64()?;
            coords.push(Coord { lat, lon });
        }

        Some(Polygon(coords))
    }
}

/**
 * The simple great circle distance calculation.
 *
 * #Arguments
 * * lat1 - the latitude of the first point in degrees.
 * * lon1 - the longitude of the first point in degrees.
 * * lat2 - the latitude of the second point in degrees.
 * * lon2 - the longitude of the second point in degrees.
 *
 * #Returns
 * The distance between the points in kilometers.
 */
pub fn great_circle_distance(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    const EARTH_RADIUS_KM: f64 = 6371.0;

    let lat1_r = lat1.to_radians();
    let lat2_r = lat2.to_radians();
    let dlat2 = (lat2 - lat1).to_radians() / 2.0;
    let dlon2 = (lon2 - lon1).to_radians() / 2.0;

    let a = dlat2.sin().powi(2) + dlon2.sin().powi(2) * lat1_r.cos() * lat2_r.cos();
    let arc = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());

    arc * EARTH_RADIUS_KM
}

fn cross(o: Coord, a: Coord, b: Coord) -> f64 {
    (a.lon - o.lon) * (b.lat - o.lat) - (a.lat - o.lat) * (b.lon - o.lon)
}

/**
 * Andrew's monotone chain convex hull.
 *
 * Duplicate input points are removed before processing. Zero or one distinct points come back
 * unchanged, exactly two distinct points come back as a degenerate three vertex ring closed by
 * repeating the first point, and three or more produce the standard hull. Collinear points are
 * excluded from the hull boundary.
 *
 * #Returns
 * A closed [Polygon], first vertex equal to the last.
 */
pub fn convex_hull(points: &[Coord]) -> Polygon {
    let mut pts: Vec<Coord> = points.to_vec();
    pts.sort_unstable_by(|a, b| a.lon.total_cmp(&b.lon).then(a.lat.total_cmp(&b.lat)));
    pts.dedup();

    if pts.len() <= 1 {
        return Polygon(pts);
    }

    if pts.len() == 2 {
        let first = pts[0];
        pts.push(first);
        return Polygon(pts);
    }

    let mut lower: Vec<Coord> = Vec::with_capacity(pts.len());
    for &p in &pts {
        while lower.len() >= 2 && cross(lower[lower.len() - 2], lower[lower.len() - 1], p) <= 0.0 {
            lower.pop();
        }
        lower.push(p);
    }

    let mut upper: Vec<Coord> = Vec::with_capacity(pts.len());
    for &p in pts.iter().rev() {
        while upper.len() >= 2 && cross(upper[upper.len() - 2], upper[upper.len() - 1], p) <= 0.0 {
            upper.pop();
        }
        upper.push(p);
    }

    // The upper chain already ends back at the start of the lower chain, so dropping the
    // last vertex of the lower chain leaves a closed ring.
    lower.pop();
    lower.extend(upper);

    Polygon(lower)
}

/// Arithmetic mean of the points, (0, 0) for an empty input.
pub fn centroid(points: &[Coord]) -> Coord {
    if points.is_empty() {
        return Coord { lat: 0.0, lon: 0.0 };
    }

    let mut lat_sum = 0.0;
    let mut lon_sum = 0.0;
    for p in points {
        lat_sum += p.lat;
        lon_sum += p.lon;
    }

    let n = points.len() as f64;
    Coord {
        lat: lat_sum / n,
        lon: lon_sum / n,
    }
}

/// Number of sides used to approximate a buffered circle.
pub const BUFFER_SEGMENTS: usize = 16;

/**
 * Approximate a circle of `radius_km` around a point as a `segments`-sided closed polygon.
 *
 * Uses a flat scaling of 111.32 km per degree of latitude with the longitude scaled by
 * cos(latitude). Not a geodesic buffer.
 */
pub fn buffered_point(center: Coord, radius_km: f64, segments: usize) -> Polygon {
    const KM_PER_DEG_LAT: f64 = 111.32;

    let dlat = radius_km / KM_PER_DEG_LAT;
    let dlon = radius_km / (KM_PER_DEG_LAT * center.lat.to_radians().cos());

    let mut ring = Vec::with_capacity(segments + 1);
    for i in 0..segments {
        let angle = 2.0 * std::f64::consts::PI * i as f64 / segments as f64;
        ring.push(Coord {
            lat: center.lat + dlat * angle.sin(),
            lon: center.lon + dlon * angle.cos(),
        });
    }

    let first = ring[0];
    ring.push(first);

    Polygon(ring)
}
