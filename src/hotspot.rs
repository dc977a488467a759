/*!
 * All the data related to a single satellite thermal anomaly detection.
 *
 * A Hotspot is one reading from a FIRMS feed. It is immutable once ingested and read-only to
 * the incident clustering engine.
 */

use crate::geo::Coord;
use chrono::NaiveDateTime;

/// Format of the composite acquisition timestamp string.
pub const ACQ_DATETIME_FORMAT: &str = "%Y-%m-%d %H%M";

/**
 * A single satellite-detected thermal anomaly reading.
 *
 * Coordinates stay optional so a malformed record can flow through the pipeline and be
 * excluded at the point of use instead of aborting a run.
 */
#[derive(Debug, Clone)]
pub struct Hotspot {
    /// Stable unique id, synthesized at ingest from the source, acquisition time, and position.
    pub id: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    /// Acquisition date, `YYYY-MM-DD`.
    pub acq_date: String,
    /// Acquisition time of day, zero-padded `HHMM`.
    pub acq_time: String,
    /// Composite `YYYY-MM-DD HHMM` timestamp. Fixed-width and zero-padded, so the
    /// lexicographic order of these strings is the chronological order. The clustering pass
    /// sorts on the raw string and relies on this.
    pub acq_datetime: String,
    /// Detection confidence, 0-100.
    pub confidence: i64,
    /// Fire radiative power in megawatts, 0 when the feed had no usable value.
    pub frp: f64,
    /// Reporting satellite, free text from the feed.
    pub satellite: String,
    /// The FIRMS feed this reading came from.
    pub source: String,
}

impl Hotspot {
    /// The position of this detection, if both coordinates are present.
    pub fn coord(&self) -> Option<Coord> {
        match (self.latitude, self.longitude) {
            (Some(lat), Some(lon)) => Some(Coord { lat, lon }),
            _ => None,
        }
    }

    /// Parse the acquisition timestamp for age calculations.
    ///
    /// `None` when the stored string does not conform to [ACQ_DATETIME_FORMAT]. Callers
    /// exclude such records from time-bucket counts rather than failing the run.
    pub fn acq_timestamp(&self) -> Option<NaiveDateTime> {
        NaiveDateTime::parse_from_str(&self.acq_datetime, ACQ_DATETIME_FORMAT).ok()
    }
}

/// Map a FIRMS confidence field to a 0-100 value.
///
/// MODIS feeds report a numeric percent while VIIRS feeds report the categories l/n/h.
/// Anything unrecognized falls back to nominal.
pub fn parse_confidence(raw: &str) -> i64 {
    match raw.trim() {
        "l" => 20,
        "n" => 50,
        "h" => 85,
        other => other.parse().unwrap_or(50),
    }
}

/// Parse an FRP field, defaulting to 0 on a missing or invalid value.
pub fn parse_frp(raw: &str) -> f64 {
    raw.trim().parse().unwrap_or(0.0)
}
