/*!
 * Change-set payloads for the live update collaborator.
 *
 * After an engine run the changed incidents are summarized into a single
 * `incidents_updated` message. Pushing that message to connected clients, and dealing with
 * clients that have gone away, is entirely the delivery collaborator's problem; this module
 * only produces the payload, one JSON line per run.
 */

use crate::{incident::Incident, FireMapResult};
use serde::Serialize;

/// Summary of one changed incident, trimmed to what the live map needs to redraw.
#[derive(Debug, Clone, Serialize)]
pub struct IncidentSummary {
    pub incident_id: String,
    pub hotspot_count: i64,
    pub intensity_max: f64,
    pub centroid_lat: f64,
    pub centroid_lon: f64,
    /// GeoJSON Polygon geometry of the footprint.
    pub footprint: serde_json::Value,
}

impl IncidentSummary {
    pub fn from_incident(incident: &Incident) -> Self {
        IncidentSummary {
            incident_id: incident.id.clone(),
            hotspot_count: incident.hotspot_count,
            intensity_max: incident.intensity_max,
            centroid_lat: incident.centroid.lat,
            centroid_lon: incident.centroid.lon,
            footprint: incident.footprint.to_geojson(),
        }
    }
}

/// The message pushed to live subscribers after an engine run.
#[derive(Debug, Clone, Serialize)]
pub struct BroadcastMessage {
    pub action: &'static str,
    pub incidents: Vec<IncidentSummary>,
}

impl BroadcastMessage {
    pub fn incidents_updated(changed: &[Incident]) -> Self {
        BroadcastMessage {
            action: "incidents_updated",
            incidents: changed.iter().map(IncidentSummary::from_incident).collect(),
        }
    }

    /// Serialize to the single JSON line handed to the delivery collaborator.
    pub fn to_json_line(&self) -> FireMapResult<String> {
        Ok(serde_json::to_string(self)?)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{
        geo::{Coord, Polygon},
        incident::IncidentStatus,
    };
    use chrono::{NaiveDate, TimeZone, Utc};

    #[test]
    fn test_incidents_updated_payload() {
        let incident = Incident {
            id: "INC-00000001".to_string(),
            status: IncidentStatus::Active,
            first_seen: "2024-08-06 1130".to_string(),
            last_seen: "2024-08-06 1145".to_string(),
            hotspot_ids: vec!["a".to_string(), "b".to_string()],
            centroid: Coord {
                lat: 34.05,
                lon: -118.25,
            },
            footprint: Polygon(vec![
                Coord { lat: 34.0, lon: -118.3 },
                Coord { lat: 34.1, lon: -118.3 },
                Coord { lat: 34.1, lon: -118.2 },
                Coord { lat: 34.0, lon: -118.3 },
            ]),
            hotspot_count: 2,
            hotspot_count_1h: 1,
            hotspot_count_6h: 2,
            intensity_max: 12.3,
            avg_confidence: 70.0,
            updated_at: Utc
                .from_utc_datetime(&NaiveDate::from_ymd(2024, 8, 6).and_hms(12, 0, 0)),
        };

        let message = BroadcastMessage::incidents_updated(std::slice::from_ref(&incident));
        let line = message.to_json_line().unwrap();

        let value: serde_json::Value = serde_json::from_str(&line).unwrap();
        assert_eq!(value["action"], "incidents_updated");
        assert_eq!(value["incidents"].as_array().unwrap().len(), 1);

        let summary = &value["incidents"][0];
        assert_eq!(summary["incident_id"], "INC-00000001");
        assert_eq!(summary["hotspot_count"], 2);
        assert_eq!(summary["intensity_max"], 12.3);
        assert_eq!(summary["footprint"]["type"], "Polygon");
        // GeoJSON vertices are lon, lat pairs.
        assert_eq!(summary["footprint"]["coordinates"][0][0][0], -118.3);
        assert_eq!(summary["footprint"]["coordinates"][0][0][1], 34.0);
    }
}
