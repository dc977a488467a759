/*!
 * Proximity matching of hotspots against user watch locations.
 *
 * Watch radii are configured in miles, so the distance math here stays in miles too.
 * Rendering and delivery of the alert email is an external collaborator's job; this module
 * only decides which hotspots are close enough to alert on.
 */

use crate::hotspot::Hotspot;

/// A user-registered location to watch for nearby fire activity.
#[derive(Debug, Clone)]
pub struct WatchLocation {
    pub id: String,
    pub name: String,
    pub email: String,
    pub lat: f64,
    pub lon: f64,
    pub radius_miles: f64,
}

/// One hotspot inside a watch location's radius.
#[derive(Debug, Clone, Copy)]
pub struct AlertHit<'a> {
    pub hotspot: &'a Hotspot,
    /// Distance from the watch location, rounded to a tenth of a mile.
    pub distance_miles: f64,
}

/// The simple great circle distance calculation in miles.
pub fn great_circle_distance_miles(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    const EARTH_RADIUS_MILES: f64 = 3958.8;

    let lat1_r = lat1.to_radians();
    let lat2_r = lat2.to_radians();
    let dlat2 = (lat2 - lat1).to_radians() / 2.0;
    let dlon2 = (lon2 - lon1).to_radians() / 2.0;

    let a = dlat2.sin().powi(2) + dlon2.sin().powi(2) * lat1_r.cos() * lat2_r.cos();
    let arc = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());

    arc * EARTH_RADIUS_MILES
}

/**
 * Find the hotspots within a watch location's radius.
 *
 * Hotspots without usable coordinates never match. The hits come back sorted nearest
 * first, the order the alert email lists them in.
 */
pub fn hotspots_within_radius<'a>(
    location: &WatchLocation,
    hotspots: &'a [Hotspot],
) -> Vec<AlertHit<'a>> {
    let mut hits: Vec<AlertHit> = hotspots
        .iter()
        .filter_map(|hs| {
            let coord = hs.coord()?;
            let distance =
                great_circle_distance_miles(location.lat, location.lon, coord.lat, coord.lon);

            if distance <= location.radius_miles {
                Some(AlertHit {
                    hotspot: hs,
                    distance_miles: (distance * 10.0).round() / 10.0,
                })
            } else {
                None
            }
        })
        .collect();

    hits.sort_by(|a, b| a.distance_miles.total_cmp(&b.distance_miles));

    hits
}

#[cfg(test)]
mod test {
    use super::*;

    fn hotspot(id: &str, lat: f64, lon: f64) -> Hotspot {
        Hotspot {
            id: id.to_string(),
            latitude: Some(lat),
            longitude: Some(lon),
            acq_date: "2024-08-06".to_string(),
            acq_time: "1130".to_string(),
            acq_datetime: "2024-08-06 1130".to_string(),
            confidence: 50,
            frp: 1.0,
            satellite: "N".to_string(),
            source: "VIIRS_SNPP_NRT".to_string(),
        }
    }

    #[test]
    fn test_hotspots_within_radius() {
        let location = WatchLocation {
            id: "loc1".to_string(),
            name: "Cabin".to_string(),
            email: "someone@example.com".to_string(),
            lat: 34.05,
            lon: -118.25,
            radius_miles: 10.0,
        };

        let mut far_off = hotspot("d", 0.0, 0.0);
        far_off.latitude = None;

        let hotspots = vec![
            hotspot("a", 34.05, -118.25),
            hotspot("b", 34.15, -118.25), // roughly 7 miles north
            hotspot("c", 35.50, -119.00), // far outside the radius
            far_off,
        ];

        let hits = hotspots_within_radius(&location, &hotspots);

        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].hotspot.id, "a");
        assert_eq!(hits[0].distance_miles, 0.0);
        assert_eq!(hits[1].hotspot.id, "b");
        assert!(hits[1].distance_miles > 5.0 && hits[1].distance_miles < 9.0);
    }
}
