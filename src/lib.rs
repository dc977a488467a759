pub use alert::{hotspots_within_radius, AlertHit, WatchLocation};
pub use broadcast::{BroadcastMessage, IncidentSummary};
pub use cluster::{assign_and_update, ClusterStats, DISTANCE_THRESHOLD_KM};
pub use database::{AddHotspotsTransaction, FireDatabase};
pub use error::FireMapError;
pub use firms::{parse_area_csv, Source};
pub use geo::{buffered_point, centroid, convex_hull, great_circle_distance, Coord, Polygon};
pub use hotspot::Hotspot;
pub use incident::{aggregate, Incident, IncidentAggregate, IncidentStatus};
pub use kml::{KmlFile, KmlWriter};

/// Result type for fallible operations in this crate.
pub type FireMapResult<T> = Result<T, Box<dyn std::error::Error>>;

/**************************************************************************************************
 * Private Implementation
 *************************************************************************************************/
mod alert;
mod broadcast;
mod cluster;
mod database;
mod error;
mod firms;
mod geo;
mod hotspot;
mod incident;
mod kml;
