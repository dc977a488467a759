/*! Parsing for NASA FIRMS area CSV files. */

use crate::hotspot::{parse_confidence, parse_frp, Hotspot};
use strum::IntoEnumIterator;

/** The FIRMS feeds this library ingests. */
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::EnumIter, strum::IntoStaticStr)]
pub enum Source {
    /// MODIS near real-time detections (Terra and Aqua).
    #[strum(serialize = "MODIS_NRT")]
    ModisNrt,
    /// VIIRS near real-time detections from Suomi NPP.
    #[strum(serialize = "VIIRS_SNPP_NRT")]
    ViirsSnppNrt,
    /// VIIRS near real-time detections from NOAA-20.
    #[strum(serialize = "VIIRS_NOAA20_NRT")]
    ViirsNoaa20Nrt,
    /// VIIRS near real-time detections from NOAA-21.
    #[strum(serialize = "VIIRS_NOAA21_NRT")]
    ViirsNoaa21Nrt,
}

impl Source {
    /// Get the feed name as used in FIRMS URLs and download file names.
    pub fn name(self) -> &'static str {
        self.into()
    }

    /// Scan the string for the occurrence of a feed name.
    pub fn string_contains_source(string: &str) -> Option<Source> {
        Source::iter().find(|src| string.contains(src.name()))
    }
}

impl std::fmt::Display for Source {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> Result<(), std::fmt::Error> {
        write!(f, "{}", self.name())
    }
}

/**
 * Parse the text of a FIRMS area CSV into hotspot records.
 *
 * The area CSV format has a header row naming the columns and no quoting or escapes, so rows
 * split cleanly on commas. Columns are looked up by name because MODIS and VIIRS files order
 * them differently.
 *
 * Rows with an acquisition timestamp at or before `cursor` were ingested by an earlier run
 * and are skipped, as are rows with no latitude or longitude at all. A coordinate that is
 * present but unparsable is kept as a missing value so downstream consumers can exclude it
 * at the point of use.
 *
 * #Returns
 * The parsed hotspots and the new cursor value, the maximum acquisition timestamp seen.
 */
pub fn parse_area_csv(csv_text: &str, source: Source, cursor: &str) -> (Vec<Hotspot>, String) {
    let mut lines = csv_text.lines();

    let header = match lines.next() {
        Some(h) => h,
        None => return (Vec::new(), cursor.to_string()),
    };
    let columns: Vec<&str> = header.trim().split(',').collect();
    let position = |name: &str| columns.iter().position(|col| *col == name);

    let lat_idx = position("latitude");
    let lon_idx = position("longitude");
    let date_idx = position("acq_date");
    let time_idx = position("acq_time");
    let sat_idx = position("satellite");
    let conf_idx = position("confidence");
    let frp_idx = position("frp");

    let mut hotspots = Vec::new();
    let mut max_acq = cursor.to_string();

    for line in lines {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let fields: Vec<&str> = line.split(',').collect();
        let field =
            |idx: Option<usize>| idx.and_then(|i| fields.get(i)).map_or("", |raw| raw.trim());

        let acq_date = field(date_idx);
        let acq_time = format!("{:0>4}", field(time_idx));
        let acq_datetime = format!("{} {}", acq_date, acq_time);

        // Skip rows an earlier ingest run already covered.
        if !cursor.is_empty() && acq_datetime.as_str() <= cursor {
            continue;
        }

        let lat_raw = field(lat_idx);
        let lon_raw = field(lon_idx);
        if lat_raw.is_empty() || lon_raw.is_empty() {
            continue;
        }

        // Only rows that were actually kept advance the cursor.
        if acq_datetime > max_acq {
            max_acq = acq_datetime.clone();
        }

        let id = format!(
            "{}_{}_{}_{}_{}",
            source.name(),
            acq_date,
            acq_time,
            lat_raw,
            lon_raw
        );

        hotspots.push(Hotspot {
            id,
            latitude: lat_raw.parse().ok(),
            longitude: lon_raw.parse().ok(),
            acq_date: acq_date.to_string(),
            acq_time: acq_time.clone(),
            acq_datetime,
            confidence: parse_confidence(field(conf_idx)),
            frp: parse_frp(field(frp_idx)),
            satellite: field(sat_idx).to_string(),
            source: source.name().to_string(),
        });
    }

    (hotspots, max_acq)
}
