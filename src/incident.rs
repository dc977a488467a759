/*!
 * Incidents and the recompute of their aggregate properties.
 *
 * An Incident is a persistent cluster of spatially and temporally related hotspots
 * representing one fire event. Membership only ever grows; the derived geometry and metrics
 * are recomputed from the full member set by [aggregate], which is a pure function of the
 * member ids, the hotspot lookup, and the current time.
 */

use crate::{
    geo::{self, Coord, Polygon},
    hotspot::Hotspot,
};
use chrono::{DateTime, Duration, Utc};
use rustc_hash::FxHashMap;
use std::fmt::{self, Display};

/// Buffer radius for the footprint of an incident with a single resolvable hotspot.
const SINGLE_POINT_BUFFER_KM: f64 = 2.0;
/// Buffer radius around the midpoint for an incident with two resolvable hotspots.
const TWO_POINT_BUFFER_KM: f64 = 3.0;

/** Lifecycle status of an incident. */
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::EnumString, strum::IntoStaticStr)]
pub enum IncidentStatus {
    /// Still accumulating hotspots.
    #[strum(serialize = "active")]
    Active,
    /// No longer receiving hotspots. The clustering engine never writes this status, it only
    /// exists so records written by an external lifecycle job round-trip through the store.
    #[strum(serialize = "closed")]
    Closed,
}

impl IncidentStatus {
    pub fn name(self) -> &'static str {
        self.into()
    }
}

/**
 * The aggregate properties of a group of related [Hotspot] detections.
 */
#[derive(Debug, Clone)]
pub struct Incident {
    /// Stable id, assigned when the incident is first created.
    pub id: String,
    pub status: IncidentStatus,
    /// Acquisition timestamp string of the hotspot that created this incident.
    pub first_seen: String,
    /// Most recent acquisition timestamp string over the members.
    pub last_seen: String,
    /// Ids of the member hotspots. A hotspot belongs to at most one active incident.
    pub hotspot_ids: Vec<String>,
    /// Arithmetic mean of the member positions.
    pub centroid: Coord,
    /// Polygon approximating the geographic extent of the incident.
    pub footprint: Polygon,
    /// Total number of members, including members whose record could not be resolved.
    pub hotspot_count: i64,
    /// Members acquired within the last hour.
    pub hotspot_count_1h: i64,
    /// Members acquired within the last six hours.
    pub hotspot_count_6h: i64,
    /// Maximum fire radiative power over the members in megawatts.
    pub intensity_max: f64,
    /// Mean detection confidence over the members.
    pub avg_confidence: f64,
    pub updated_at: DateTime<Utc>,
}

impl Display for Incident {
    fn fmt(&self, f: &mut fmt::Formatter) -> Result<(), fmt::Error> {
        writeln!(f, "            ID: {}", self.id)?;
        writeln!(f, "        Status: {}", self.status.name())?;
        writeln!(f, "    First Seen: {}", self.first_seen)?;
        writeln!(f, "     Last Seen: {}", self.last_seen)?;
        writeln!(
            f,
            "      Centroid: {:.6},{:.6}",
            self.centroid.lat, self.centroid.lon
        )?;
        writeln!(
            f,
            "      Hotspots: {} ({} last hour, {} last six hours)",
            self.hotspot_count, self.hotspot_count_1h, self.hotspot_count_6h
        )?;
        writeln!(f, "       Max FRP: {:.2} MW", self.intensity_max)?;
        writeln!(f, "    Confidence: {:.1}", self.avg_confidence)
    }
}

impl Incident {
    /// Assemble an incident from its identity and freshly recomputed aggregates.
    pub(crate) fn from_aggregate(
        id: String,
        first_seen: String,
        hotspot_ids: Vec<String>,
        agg: IncidentAggregate,
        updated_at: DateTime<Utc>,
    ) -> Self {
        Incident {
            id,
            status: IncidentStatus::Active,
            first_seen,
            last_seen: agg.last_seen,
            hotspot_count: hotspot_ids.len() as i64,
            hotspot_ids,
            centroid: agg.centroid,
            footprint: agg.footprint,
            hotspot_count_1h: agg.hotspot_count_1h,
            hotspot_count_6h: agg.hotspot_count_6h,
            intensity_max: agg.intensity_max,
            avg_confidence: agg.avg_confidence,
            updated_at,
        }
    }
}

/// Recomputed fields for one incident, produced by [aggregate].
#[derive(Debug, Clone)]
pub struct IncidentAggregate {
    pub centroid: Coord,
    pub footprint: Polygon,
    pub last_seen: String,
    pub hotspot_count_1h: i64,
    pub hotspot_count_6h: i64,
    pub intensity_max: f64,
    pub avg_confidence: f64,
}

/**
 * Recompute the aggregate properties of an incident from its member hotspots.
 *
 * Members that are missing from the lookup or have no usable coordinates contribute nothing
 * here (the caller still counts them in the total member count). A member whose acquisition
 * timestamp does not parse is excluded from the age buckets but still contributes geometry,
 * FRP, and confidence.
 *
 * The footprint policy by resolvable member count: one member buffers the point at 2 km, two
 * members buffer their midpoint at 3 km, three or more take the convex hull.
 *
 * #Returns
 * `None` when no member has usable coordinates. The incident should then be left out of the
 * run's output entirely rather than written with empty geometry.
 */
pub fn aggregate(
    member_ids: &[String],
    hotspots: &FxHashMap<&str, &Hotspot>,
    now: DateTime<Utc>,
) -> Option<IncidentAggregate> {
    let mut points = Vec::with_capacity(member_ids.len());
    let mut frp_max = 0.0_f64;
    let mut confidence_sum = 0_i64;
    let mut latest_acq = String::new();
    let mut count_1h = 0;
    let mut count_6h = 0;

    for id in member_ids {
        let hs = match hotspots.get(id.as_str()) {
            Some(hs) => *hs,
            None => continue,
        };
        let coord = match hs.coord() {
            Some(coord) => coord,
            None => continue,
        };

        points.push(coord);
        frp_max = frp_max.max(hs.frp);
        confidence_sum += hs.confidence;

        if hs.acq_datetime > latest_acq {
            latest_acq = hs.acq_datetime.clone();
        }

        if let Some(ts) = hs.acq_timestamp() {
            let age = now.naive_utc() - ts;
            if age < Duration::hours(1) {
                count_1h += 1;
            }
            if age < Duration::hours(6) {
                count_6h += 1;
            }
        }
    }

    if points.is_empty() {
        return None;
    }

    let footprint = match points.len() {
        1 => geo::buffered_point(points[0], SINGLE_POINT_BUFFER_KM, geo::BUFFER_SEGMENTS),
        2 => geo::buffered_point(geo::centroid(&points), TWO_POINT_BUFFER_KM, geo::BUFFER_SEGMENTS),
        _ => geo::convex_hull(&points),
    };

    let avg_confidence = confidence_sum as f64 / points.len() as f64;

    Some(IncidentAggregate {
        centroid: geo::centroid(&points),
        footprint,
        last_seen: latest_acq,
        hotspot_count_1h: count_1h,
        hotspot_count_6h: count_6h,
        intensity_max: round_to(frp_max, 2),
        avg_confidence: round_to(avg_confidence, 1),
    })
}

fn round_to(value: f64, places: i32) -> f64 {
    let scale = 10.0_f64.powi(places);
    (value * scale).round() / scale
}

#[cfg(test)]
mod test {
    use super::*;
    use chrono::NaiveDate;

    fn hotspot(id: &str, lat: f64, lon: f64, acq: &str, confidence: i64, frp: f64) -> Hotspot {
        Hotspot {
            id: id.to_string(),
            latitude: Some(lat),
            longitude: Some(lon),
            acq_date: acq[..10].to_string(),
            acq_time: acq[11..].to_string(),
            acq_datetime: acq.to_string(),
            confidence,
            frp,
            satellite: "N".to_string(),
            source: "VIIRS_SNPP_NRT".to_string(),
        }
    }

    fn lookup(hotspots: &[Hotspot]) -> FxHashMap<&str, &Hotspot> {
        hotspots.iter().map(|h| (h.id.as_str(), h)).collect()
    }

    fn test_now() -> DateTime<Utc> {
        DateTime::<Utc>::from_utc(NaiveDate::from_ymd(2024, 8, 6).and_hms(12, 0, 0), Utc)
    }

    #[test]
    fn test_aggregate_single_member() {
        let hotspots = vec![hotspot("a", 34.05, -118.25, "2024-08-06 1130", 80, 12.3)];
        let members = vec!["a".to_string()];

        let agg = aggregate(&members, &lookup(&hotspots), test_now()).unwrap();

        assert_eq!(
            agg.centroid,
            Coord {
                lat: 34.05,
                lon: -118.25
            }
        );
        // 16 segments plus the closing vertex.
        assert_eq!(agg.footprint.len(), 17);
        assert!(agg.footprint.is_closed());
        assert_eq!(agg.last_seen, "2024-08-06 1130");
        assert_eq!(agg.intensity_max, 12.3);
        assert_eq!(agg.avg_confidence, 80.0);
        assert_eq!(agg.hotspot_count_1h, 1);
        assert_eq!(agg.hotspot_count_6h, 1);
    }

    #[test]
    fn test_aggregate_two_members_buffers_midpoint() {
        let hotspots = vec![
            hotspot("a", 34.00, -118.00, "2024-08-06 0600", 60, 5.0),
            hotspot("b", 34.02, -118.02, "2024-08-06 0800", 80, 9.0),
        ];
        let members = vec!["a".to_string(), "b".to_string()];

        let agg = aggregate(&members, &lookup(&hotspots), test_now()).unwrap();

        assert_eq!(agg.footprint.len(), 17);
        assert!((agg.centroid.lat - 34.01).abs() < 1.0e-9);
        assert!((agg.centroid.lon + 118.01).abs() < 1.0e-9);
        assert_eq!(agg.last_seen, "2024-08-06 0800");
        assert_eq!(agg.avg_confidence, 70.0);
        assert_eq!(agg.intensity_max, 9.0);
        // 0600 is six hours old on the dot, which is outside the strict six hour bucket.
        assert_eq!(agg.hotspot_count_6h, 1);
        assert_eq!(agg.hotspot_count_1h, 0);
    }

    #[test]
    fn test_aggregate_many_members_takes_hull() {
        let hotspots = vec![
            hotspot("a", 34.00, -118.00, "2024-08-06 0100", 50, 1.0),
            hotspot("b", 34.04, -118.00, "2024-08-06 0200", 50, 2.0),
            hotspot("c", 34.00, -118.04, "2024-08-06 0300", 50, 3.0),
            hotspot("d", 34.01, -118.01, "2024-08-06 0400", 50, 4.0),
        ];
        let members: Vec<String> = hotspots.iter().map(|h| h.id.clone()).collect();

        let agg = aggregate(&members, &lookup(&hotspots), test_now()).unwrap();

        // Triangle: three corners plus the closing vertex, interior point excluded.
        assert_eq!(agg.footprint.len(), 4);
        assert!(agg.footprint.is_closed());
        assert_eq!(agg.intensity_max, 4.0);
    }

    #[test]
    fn test_aggregate_skips_unresolvable_members() {
        let hotspots = vec![
            hotspot("a", 34.05, -118.25, "2024-08-06 1130", 80, 12.3),
            Hotspot {
                latitude: None,
                ..hotspot("b", 0.0, 0.0, "2024-08-06 1145", 95, 99.0)
            },
        ];
        let members = vec!["a".to_string(), "b".to_string(), "ghost".to_string()];

        let agg = aggregate(&members, &lookup(&hotspots), test_now()).unwrap();

        // Only "a" resolves, so only it shapes the metrics.
        assert_eq!(agg.footprint.len(), 17);
        assert_eq!(agg.intensity_max, 12.3);
        assert_eq!(agg.avg_confidence, 80.0);
        assert_eq!(agg.last_seen, "2024-08-06 1130");
    }

    #[test]
    fn test_aggregate_no_resolvable_members() {
        let hotspots = vec![Hotspot {
            latitude: None,
            longitude: None,
            ..hotspot("a", 0.0, 0.0, "2024-08-06 1130", 80, 12.3)
        }];
        let members = vec!["a".to_string(), "ghost".to_string()];

        assert!(aggregate(&members, &lookup(&hotspots), test_now()).is_none());
        assert!(aggregate(&[], &lookup(&[]), test_now()).is_none());
    }

    #[test]
    fn test_aggregate_unparsable_timestamp_excluded_from_buckets() {
        let mut hs = hotspot("a", 34.05, -118.25, "2024-08-06 1130", 80, 12.3);
        hs.acq_datetime = "sometime".to_string();
        let hotspots = vec![hs];
        let members = vec!["a".to_string()];

        let agg = aggregate(&members, &lookup(&hotspots), test_now()).unwrap();

        assert_eq!(agg.hotspot_count_1h, 0);
        assert_eq!(agg.hotspot_count_6h, 0);
        // Geometry and metrics still come through.
        assert_eq!(agg.footprint.len(), 17);
        assert_eq!(agg.intensity_max, 12.3);
    }

    #[test]
    fn test_aggregate_rounding() {
        let hotspots = vec![
            hotspot("a", 34.0, -118.0, "2024-08-06 1130", 80, 12.346),
            hotspot("b", 34.1, -118.1, "2024-08-06 1140", 71, 3.0),
        ];
        let members = vec!["a".to_string(), "b".to_string()];

        let agg = aggregate(&members, &lookup(&hotspots), test_now()).unwrap();

        assert_eq!(agg.intensity_max, 12.35);
        assert_eq!(agg.avg_confidence, 75.5);
    }
}
