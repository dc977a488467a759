/*!
 * The SQLite store shared by all the programs in this crate.
 *
 * Holds ingested hotspots, the incidents built from them, the ingest cursors, and the
 * watch-location and alert-history records used for proximity alerting. The clustering
 * engine itself never touches this module, it only sees the in-memory snapshots loaded
 * here.
 */

use crate::{
    alert::WatchLocation,
    geo::{Coord, Polygon},
    hotspot::Hotspot,
    incident::{Incident, IncidentStatus},
    FireMapResult,
};
use chrono::{DateTime, Utc};
use log::warn;
use rusqlite::{Connection, OpenFlags, OptionalExtension, ToSql};
use rustc_hash::FxHashMap;
use std::path::Path;

/// Hotspots older than this are expired out of the store.
const HOTSPOT_TTL_HOURS: i64 = 24;
/// How long an alert suppresses a repeat for the same location and hotspot.
const ALERT_DEDUP_HOURS: i64 = 48;

/// A connection to the database where ALL the hotspot and incident data is stored.
pub struct FireDatabase {
    conn: Connection,
}

impl FireDatabase {
    /// Initialize a database.
    ///
    /// Initialize a database to make sure it exists and is set up properly. This should be
    /// run in the main thread before any other threads open a connection to the database to
    /// ensure consistency.
    pub fn initialize<P: AsRef<Path>>(path: P) -> FireMapResult<()> {
        let path = path.as_ref();

        let _conn = Self::open_database_to_write(path)?;
        Ok(())
    }

    /// Open a connection to the database.
    pub fn connect<P: AsRef<Path>>(path: P) -> FireMapResult<Self> {
        let path = path.as_ref();

        let conn = Self::open_database_to_write(path)?;
        Ok(FireDatabase { conn })
    }

    fn open_database_to_write(path: &Path) -> FireMapResult<Connection> {
        let conn = rusqlite::Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_WRITE
                | OpenFlags::SQLITE_OPEN_CREATE
                | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;

        // A 5-second busy time out is WAY too much. If we hit this something has gone terribly wrong.
        conn.busy_timeout(std::time::Duration::from_secs(5))?;
        const QUERY: &str = include_str!("database/create_db.sql");
        conn.execute_batch(QUERY)?;

        Ok(conn)
    }

    /// Get the ingest cursor for a feed, the acquisition timestamp of the newest row already
    /// ingested. Empty if this feed has never been ingested.
    pub fn ingest_cursor(&self, source_name: &str) -> FireMapResult<String> {
        const QUERY: &str =
            "SELECT last_acq_datetime FROM ingest_cursor WHERE source_name = ?1";

        let cursor: Option<String> = self
            .conn
            .query_row(QUERY, [source_name], |row| row.get(0))
            .optional()?;

        Ok(cursor.unwrap_or_default())
    }

    /// Advance the ingest cursor for a feed.
    pub fn update_ingest_cursor(
        &self,
        source_name: &str,
        last_acq_datetime: &str,
        now: DateTime<Utc>,
    ) -> FireMapResult<()> {
        const QUERY: &str = concat!(
            "INSERT OR REPLACE INTO ingest_cursor (source_name, last_acq_datetime, updated_at) ",
            "VALUES (?1, ?2, ?3)"
        );

        self.conn
            .execute(QUERY, (source_name, last_acq_datetime, now.timestamp()))?;
        Ok(())
    }

    /// Prepare to add hotspot rows to the database.
    pub fn add_hotspots_handle(&self) -> FireMapResult<AddHotspotsTransaction> {
        const ADD_HOTSPOT_QUERY: &str = include_str!("database/add_hotspot.sql");

        let add_hotspot_stmt = self.conn.prepare(ADD_HOTSPOT_QUERY)?;

        Ok(AddHotspotsTransaction {
            add_hotspot_stmt,
            conn: &self.conn,
        })
    }

    /// Load all hotspots that have not expired yet.
    pub fn hotspots(&self, now: DateTime<Utc>) -> FireMapResult<Vec<Hotspot>> {
        // The stable order keeps clustering runs reproducible when detections share an
        // acquisition timestamp.
        const QUERY: &str = concat!(
            "SELECT hotspot_id, latitude, longitude, acq_date, acq_time, acq_datetime, ",
            "confidence, frp, satellite, source FROM hotspots WHERE expires_at > ?1 ",
            "ORDER BY acq_datetime, hotspot_id"
        );

        let mut stmt = self.conn.prepare(QUERY)?;
        let rows = stmt.query_map([now.timestamp()], |row| {
            Ok(Hotspot {
                id: row.get(0)?,
                latitude: row.get(1)?,
                longitude: row.get(2)?,
                acq_date: row.get(3)?,
                acq_time: row.get(4)?,
                acq_datetime: row.get(5)?,
                confidence: row.get(6)?,
                frp: row.get(7)?,
                satellite: row.get(8)?,
                source: row.get(9)?,
            })
        })?;

        let mut hotspots = Vec::new();
        for row in rows {
            hotspots.push(row?);
        }

        Ok(hotspots)
    }

    /// Delete hotspots whose time to live has passed.
    ///
    /// #Returns
    /// The number of rows removed.
    pub fn purge_expired_hotspots(&self, now: DateTime<Utc>) -> FireMapResult<usize> {
        let removed = self
            .conn
            .execute("DELETE FROM hotspots WHERE expires_at <= ?1", [now.timestamp()])?;
        Ok(removed)
    }

    /// Load all active incidents with their member hotspot ids.
    pub fn active_incidents(&self) -> FireMapResult<Vec<Incident>> {
        // One pass over the association table instead of a query per incident.
        let mut members: FxHashMap<String, Vec<String>> = FxHashMap::default();
        let mut stmt = self
            .conn
            .prepare("SELECT incident_id, hotspot_id FROM incident_hotspots")?;
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;
        for row in rows {
            let (incident_id, hotspot_id) = row?;
            members.entry(incident_id).or_default().push(hotspot_id);
        }

        const QUERY: &str = concat!(
            "SELECT incident_id, status, first_seen, last_seen, hotspot_count, ",
            "hotspot_count_1h, hotspot_count_6h, centroid_lat, centroid_lon, intensity_max, ",
            "avg_confidence, footprint, updated_at FROM incidents WHERE status = 'active'"
        );

        let mut stmt = self.conn.prepare(QUERY)?;
        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
                row.get::<_, i64>(4)?,
                row.get::<_, i64>(5)?,
                row.get::<_, i64>(6)?,
                row.get::<_, f64>(7)?,
                row.get::<_, f64>(8)?,
                row.get::<_, f64>(9)?,
                row.get::<_, f64>(10)?,
                row.get::<_, String>(11)?,
                row.get::<_, i64>(12)?,
            ))
        })?;

        let mut incidents = Vec::new();
        for row in rows {
            let (
                id,
                status,
                first_seen,
                last_seen,
                hotspot_count,
                hotspot_count_1h,
                hotspot_count_6h,
                centroid_lat,
                centroid_lon,
                intensity_max,
                avg_confidence,
                footprint_text,
                updated_at,
            ) = row?;

            let centroid = Coord {
                lat: centroid_lat,
                lon: centroid_lon,
            };

            // The engine only matches on the centroid, so a corrupted footprint degrades to
            // a degenerate ring rather than dropping the incident.
            let footprint = serde_json::from_str(&footprint_text)
                .ok()
                .as_ref()
                .and_then(Polygon::from_geojson)
                .unwrap_or_else(|| {
                    warn!("incident {} has an unreadable footprint", id);
                    Polygon(vec![centroid])
                });

            let updated_at = DateTime::<Utc>::from_utc(
                chrono::NaiveDateTime::from_timestamp(updated_at, 0),
                Utc,
            );

            incidents.push(Incident {
                hotspot_ids: members.remove(&id).unwrap_or_default(),
                status: status.parse().unwrap_or(IncidentStatus::Active),
                id,
                first_seen,
                last_seen,
                centroid,
                footprint,
                hotspot_count,
                hotspot_count_1h,
                hotspot_count_6h,
                intensity_max,
                avg_confidence,
                updated_at,
            });
        }

        Ok(incidents)
    }

    /// Restore the next incident id number from the ids already in the store.
    pub fn next_incident_number(&self) -> FireMapResult<u64> {
        let mut stmt = self.conn.prepare("SELECT incident_id FROM incidents")?;
        let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;

        let mut max_num = 0_u64;
        for row in rows {
            let id = row?;
            if let Some(num) = id
                .strip_prefix("INC-")
                .and_then(|hex| u64::from_str_radix(hex, 16).ok())
            {
                max_num = max_num.max(num);
            }
        }

        Ok(max_num + 1)
    }

    /// Write the change-set back, replacing each listed incident and its membership.
    pub fn replace_incidents(&self, incidents: &[Incident]) -> FireMapResult<()> {
        const ADD_INCIDENT_QUERY: &str = include_str!("database/add_incident.sql");
        const ADD_MEMBER_QUERY: &str = concat!(
            "INSERT OR REPLACE INTO incident_hotspots (incident_id, hotspot_id) ",
            "VALUES (?1, ?2)"
        );

        let mut add_incident_stmt = self.conn.prepare(ADD_INCIDENT_QUERY)?;
        let mut add_member_stmt = self.conn.prepare(ADD_MEMBER_QUERY)?;

        self.conn.execute("BEGIN TRANSACTION", [])?;

        for inc in incidents {
            let footprint = inc.footprint.to_geojson().to_string();

            add_incident_stmt.execute([
                &inc.id as &dyn ToSql,
                &inc.status.name(),
                &inc.first_seen,
                &inc.last_seen,
                &inc.hotspot_count,
                &inc.hotspot_count_1h,
                &inc.hotspot_count_6h,
                &inc.centroid.lat,
                &inc.centroid.lon,
                &inc.intensity_max,
                &inc.avg_confidence,
                &footprint,
                &inc.updated_at.timestamp(),
            ])?;

            self.conn
                .execute("DELETE FROM incident_hotspots WHERE incident_id = ?1", [&inc.id])?;
            for hotspot_id in &inc.hotspot_ids {
                add_member_stmt.execute([&inc.id, hotspot_id])?;
            }
        }

        self.conn.execute("COMMIT", [])?;

        Ok(())
    }

    /// Load all active watch locations.
    pub fn watch_locations(&self) -> FireMapResult<Vec<WatchLocation>> {
        const QUERY: &str = concat!(
            "SELECT location_id, name, email, lat, lon, radius_miles FROM watch_locations ",
            "WHERE status = 'active'"
        );

        let mut stmt = self.conn.prepare(QUERY)?;
        let rows = stmt.query_map([], |row| {
            Ok(WatchLocation {
                id: row.get(0)?,
                name: row.get(1)?,
                email: row.get(2)?,
                lat: row.get(3)?,
                lon: row.get(4)?,
                radius_miles: row.get(5)?,
            })
        })?;

        let mut locations = Vec::new();
        for row in rows {
            locations.push(row?);
        }

        Ok(locations)
    }

    /// Store a watch location, active immediately.
    pub fn add_watch_location(&self, location: &WatchLocation) -> FireMapResult<()> {
        const QUERY: &str = concat!(
            "INSERT OR REPLACE INTO watch_locations ",
            "(location_id, name, email, lat, lon, radius_miles, status) ",
            "VALUES (?1, ?2, ?3, ?4, ?5, ?6, 'active')"
        );

        self.conn.execute(
            QUERY,
            (
                &location.id,
                &location.name,
                &location.email,
                location.lat,
                location.lon,
                location.radius_miles,
            ),
        )?;
        Ok(())
    }

    /// Check whether an alert for this location and hotspot went out recently.
    pub fn alert_already_sent(
        &self,
        location_id: &str,
        hotspot_id: &str,
        now: DateTime<Utc>,
    ) -> FireMapResult<bool> {
        const QUERY: &str = concat!(
            "SELECT 1 FROM alert_history ",
            "WHERE location_id = ?1 AND hotspot_id = ?2 AND expires_at > ?3"
        );

        let hit: Option<i64> = self
            .conn
            .query_row(QUERY, (location_id, hotspot_id, now.timestamp()), |row| {
                row.get(0)
            })
            .optional()?;

        Ok(hit.is_some())
    }

    /// Record a sent alert so it is not repeated within the dedup window.
    pub fn record_alert(
        &self,
        location_id: &str,
        hotspot_id: &str,
        now: DateTime<Utc>,
    ) -> FireMapResult<()> {
        const QUERY: &str = concat!(
            "INSERT OR REPLACE INTO alert_history ",
            "(location_id, hotspot_id, alerted_at, expires_at) VALUES (?1, ?2, ?3, ?4)"
        );

        let alerted_at = now.timestamp();
        let expires_at = alerted_at + ALERT_DEDUP_HOURS * 3600;
        self.conn
            .execute(QUERY, (location_id, hotspot_id, alerted_at, expires_at))?;
        Ok(())
    }
}

/// A handle for efficiently adding batches of hotspots to the database.
pub struct AddHotspotsTransaction<'a> {
    add_hotspot_stmt: rusqlite::Statement<'a>,
    conn: &'a Connection,
}

impl<'a> AddHotspotsTransaction<'a> {
    /// Add a batch of hotspots in a single transaction.
    ///
    /// Rows keep their identity across batches, re-adding a hotspot replaces it.
    pub fn add(&mut self, hotspots: &[Hotspot], now: DateTime<Utc>) -> FireMapResult<()> {
        if hotspots.is_empty() {
            return Ok(());
        }

        let ingested_at = now.timestamp();
        let expires_at = ingested_at + HOTSPOT_TTL_HOURS * 3600;

        self.conn.execute("BEGIN TRANSACTION", [])?;

        for hs in hotspots {
            self.add_hotspot_stmt.execute([
                &hs.id as &dyn ToSql,
                &hs.latitude,
                &hs.longitude,
                &hs.acq_date,
                &hs.acq_time,
                &hs.acq_datetime,
                &hs.confidence,
                &hs.frp,
                &hs.satellite,
                &hs.source,
                &ingested_at,
                &expires_at,
            ])?;
        }

        self.conn.execute("COMMIT", [])?;

        Ok(())
    }
}
