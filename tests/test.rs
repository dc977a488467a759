use chrono::{NaiveDate, TimeZone, Utc};
use firemap::{
    assign_and_update, parse_area_csv, BroadcastMessage, FireDatabase, Source, WatchLocation,
};

/// Two groups of detections: three around downtown Los Angeles within a couple of
/// kilometers of each other, and one far away near Bakersfield. The final row has no
/// latitude and must be dropped at parse time.
const CSV: &str = "\
latitude,longitude,bright_ti4,scan,track,acq_date,acq_time,satellite,instrument,confidence,version,bright_ti5,frp,daynight
34.05,-118.25,330.1,0.5,0.5,2024-08-06,830,N,VIIRS,h,2.0NRT,290.0,12.3,N
34.06,-118.24,332.4,0.5,0.5,2024-08-06,910,N,VIIRS,n,2.0NRT,291.3,6.0,N
34.07,-118.23,335.0,0.5,0.5,2024-08-06,1130,N,VIIRS,n,2.0NRT,292.8,4.5,D
35.50,-119.00,340.2,0.5,0.5,2024-08-06,1130,N,VIIRS,l,2.0NRT,293.0,20.0,D
,-118.30,340.0,0.5,0.5,2024-08-06,1130,N,VIIRS,l,2.0NRT,291.0,3.0,D
";

fn test_now() -> chrono::DateTime<Utc> {
    Utc.from_utc_datetime(&NaiveDate::from_ymd(2024, 8, 6).and_hms(12, 0, 0))
}

fn temp_db(tag: &str) -> std::path::PathBuf {
    let path = std::env::temp_dir().join(format!(
        "firemap-test-{}-{}.sqlite",
        tag,
        std::process::id()
    ));
    let _ = std::fs::remove_file(&path);
    path
}

#[test]
fn test_csv_to_broadcast_pipeline() {
    let (hotspots, max_acq) = parse_area_csv(CSV, Source::ViirsSnppNrt, "");
    assert_eq!(hotspots.len(), 4);
    assert_eq!(max_acq, "2024-08-06 1130");

    let mut next = 1;
    let (changed, stats) = assign_and_update(&hotspots, &[], &mut next, test_now());

    // One incident for the Los Angeles group, one for the lone distant detection.
    assert_eq!(stats.spawned, 2);
    assert_eq!(stats.assigned, 2);
    assert_eq!(changed.len(), 2);

    let la = changed.iter().find(|i| i.hotspot_count == 3).unwrap();
    let lone = changed.iter().find(|i| i.hotspot_count == 1).unwrap();

    assert_eq!(la.first_seen, "2024-08-06 0830");
    assert_eq!(la.last_seen, "2024-08-06 1130");
    assert_eq!(la.intensity_max, 12.3);
    // One member in the last hour (1130), all three in the last six hours.
    assert_eq!(la.hotspot_count_1h, 1);
    assert_eq!(la.hotspot_count_6h, 3);
    assert!(la.footprint.is_closed());

    assert_eq!(lone.intensity_max, 20.0);
    assert_eq!(lone.avg_confidence, 20.0);
    // A single member gets the 16 segment buffer plus the closing vertex.
    assert_eq!(lone.footprint.len(), 17);

    // No hotspot may land in two incidents.
    let mut seen = std::collections::HashSet::new();
    for incident in &changed {
        for id in &incident.hotspot_ids {
            assert!(seen.insert(id.clone()), "{} in two incidents", id);
        }
    }

    // The broadcast payload carries the summary tuple for every changed incident.
    let line = BroadcastMessage::incidents_updated(&changed)
        .to_json_line()
        .unwrap();
    let value: serde_json::Value = serde_json::from_str(&line).unwrap();
    assert_eq!(value["action"], "incidents_updated");
    assert_eq!(value["incidents"].as_array().unwrap().len(), 2);
    for summary in value["incidents"].as_array().unwrap() {
        assert!(summary["incident_id"].as_str().unwrap().starts_with("INC-"));
        assert_eq!(summary["footprint"]["type"], "Polygon");
    }

    // Feeding the change-set back with the same inputs must be quiescent.
    let (second, stats) = assign_and_update(&hotspots, &changed, &mut next, test_now());
    assert!(second.is_empty());
    assert_eq!(stats.assigned + stats.spawned, 0);
}

#[test]
fn test_store_round_trip() {
    let path = temp_db("store");
    let now = test_now();

    FireDatabase::initialize(&path).unwrap();
    let db = FireDatabase::connect(&path).unwrap();

    let (hotspots, max_acq) = parse_area_csv(CSV, Source::ViirsSnppNrt, "");
    let mut add_transaction = db.add_hotspots_handle().unwrap();
    add_transaction.add(&hotspots, now).unwrap();
    drop(add_transaction);

    db.update_ingest_cursor("FIRMS_ALL", &max_acq, now).unwrap();
    assert_eq!(db.ingest_cursor("FIRMS_ALL").unwrap(), max_acq);
    assert_eq!(db.ingest_cursor("NO_SUCH_CURSOR").unwrap(), "");

    let loaded = db.hotspots(now).unwrap();
    assert_eq!(loaded.len(), hotspots.len());

    let mut next = db.next_incident_number().unwrap();
    assert_eq!(next, 1);

    let (changed, _stats) = assign_and_update(&loaded, &[], &mut next, now);
    db.replace_incidents(&changed).unwrap();
    assert_eq!(db.next_incident_number().unwrap(), next);

    let active = db.active_incidents().unwrap();
    assert_eq!(active.len(), changed.len());

    for incident in &changed {
        let reloaded = active.iter().find(|i| i.id == incident.id).unwrap();

        let mut expected = incident.hotspot_ids.clone();
        let mut actual = reloaded.hotspot_ids.clone();
        expected.sort();
        actual.sort();
        assert_eq!(expected, actual);

        assert_eq!(reloaded.hotspot_count, incident.hotspot_count);
        assert_eq!(reloaded.first_seen, incident.first_seen);
        assert_eq!(reloaded.last_seen, incident.last_seen);
        assert_eq!(reloaded.intensity_max, incident.intensity_max);
        assert_eq!(reloaded.avg_confidence, incident.avg_confidence);
        assert!(reloaded.footprint.is_closed());
        assert_eq!(reloaded.footprint, incident.footprint);
    }

    // A second run over the stored state must not drift.
    let (second, stats) = assign_and_update(&loaded, &active, &mut next, now);
    assert!(second.is_empty());
    assert_eq!(stats.assigned + stats.spawned, 0);

    drop(db);
    let _ = std::fs::remove_file(&path);
}

#[test]
fn test_hotspot_expiry() {
    let path = temp_db("expiry");
    let now = test_now();

    FireDatabase::initialize(&path).unwrap();
    let db = FireDatabase::connect(&path).unwrap();

    let (hotspots, _) = parse_area_csv(CSV, Source::ViirsSnppNrt, "");
    let mut add_transaction = db.add_hotspots_handle().unwrap();
    add_transaction.add(&hotspots, now).unwrap();
    drop(add_transaction);

    // Inside the TTL everything is visible, two days later nothing is.
    assert_eq!(db.hotspots(now).unwrap().len(), hotspots.len());
    let much_later = now + chrono::Duration::hours(48);
    assert!(db.hotspots(much_later).unwrap().is_empty());

    assert_eq!(
        db.purge_expired_hotspots(much_later).unwrap(),
        hotspots.len()
    );
    assert_eq!(db.purge_expired_hotspots(much_later).unwrap(), 0);

    drop(db);
    let _ = std::fs::remove_file(&path);
}

#[test]
fn test_watch_locations_and_alert_dedup() {
    let path = temp_db("alerts");
    let now = test_now();

    FireDatabase::initialize(&path).unwrap();
    let db = FireDatabase::connect(&path).unwrap();

    let location = WatchLocation {
        id: "loc1".to_string(),
        name: "Cabin".to_string(),
        email: "someone@example.com".to_string(),
        lat: 34.05,
        lon: -118.25,
        radius_miles: 10.0,
    };
    db.add_watch_location(&location).unwrap();

    let locations = db.watch_locations().unwrap();
    assert_eq!(locations.len(), 1);
    assert_eq!(locations[0].name, "Cabin");

    assert!(!db.alert_already_sent("loc1", "hs1", now).unwrap());
    db.record_alert("loc1", "hs1", now).unwrap();
    assert!(db.alert_already_sent("loc1", "hs1", now).unwrap());

    // The dedup record ages out after its window passes.
    let much_later = now + chrono::Duration::hours(72);
    assert!(!db.alert_already_sent("loc1", "hs1", much_later).unwrap());

    drop(db);
    let _ = std::fs::remove_file(&path);
}
