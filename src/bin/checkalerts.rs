use chrono::Utc;
use clap::Parser;
use firemap::{hotspots_within_radius, FireDatabase, FireMapResult};
use log::LevelFilter;
use simple_logger::SimpleLogger;
use std::{io::Write, path::PathBuf};

/*-------------------------------------------------------------------------------------------------
 *                                     Command Line Options
 *-----------------------------------------------------------------------------------------------*/

///
/// Check current hotspots against user watch locations.
///
/// For every active watch location this program finds the hotspots inside its radius that
/// have not already been alerted on, records them in the alert history so they are not
/// repeated, and prints one JSON line per location for the mail collaborator to render and
/// deliver.
///
#[derive(Debug, Parser)]
#[clap(bin_name = "checkalerts")]
#[clap(author, version, about)]
struct CheckAlertsOptions {
    /// The path to the hotspot and incident database file.
    ///
    /// If this is not specified, then the program will check for it in the "FIREMAP_DB"
    /// environment variable.
    #[clap(short, long)]
    #[clap(env = "FIREMAP_DB")]
    store_file: PathBuf,

    /// Find and print the alerts but do not record them in the alert history.
    #[clap(short, long)]
    dry_run: bool,

    /// Verbose output
    #[clap(short, long)]
    verbose: bool,
}

/*-------------------------------------------------------------------------------------------------
 *                                             MAIN
 *-----------------------------------------------------------------------------------------------*/
fn main() -> FireMapResult<()> {
    let opts = CheckAlertsOptions::parse();

    let level = if opts.verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };
    SimpleLogger::new().with_level(level).init()?;

    let now = Utc::now();

    let db = FireDatabase::connect(&opts.store_file)?;

    let locations = db.watch_locations()?;
    if locations.is_empty() {
        log::info!("No active watch locations.");
        return Ok(());
    }

    let hotspots = db.hotspots(now)?;
    if hotspots.is_empty() {
        log::info!("No hotspots.");
        return Ok(());
    }

    let stdout = std::io::stdout();
    let mut out = stdout.lock();

    let mut alerts_sent = 0;
    for location in &locations {
        let hits: Vec<_> = hotspots_within_radius(location, &hotspots)
            .into_iter()
            .filter(|hit| {
                match db.alert_already_sent(&location.id, &hit.hotspot.id, now) {
                    Ok(sent) => !sent,
                    Err(err) => {
                        log::error!("Error checking alert history: {}", err);
                        false
                    }
                }
            })
            .collect();

        if hits.is_empty() {
            log::debug!("Nothing new near {}", location.name);
            continue;
        }

        if !opts.dry_run {
            for hit in &hits {
                db.record_alert(&location.id, &hit.hotspot.id, now)?;
            }
        }

        log::info!(
            "Alert for {}: {} hotspots, closest {:.1} miles away.",
            location.name,
            hits.len(),
            hits[0].distance_miles
        );

        // One line per location for the mail collaborator.
        let payload = serde_json::json!({
            "action": "alert",
            "location_id": location.id,
            "name": location.name,
            "email": location.email,
            "hotspots": hits.iter().map(|hit| {
                serde_json::json!({
                    "hotspot_id": hit.hotspot.id,
                    "distance_miles": hit.distance_miles,
                    "confidence": hit.hotspot.confidence,
                    "frp": hit.hotspot.frp,
                    "satellite": hit.hotspot.satellite,
                    "acq_date": hit.hotspot.acq_date,
                    "acq_time": hit.hotspot.acq_time,
                })
            }).collect::<Vec<_>>(),
        });
        writeln!(out, "{}", payload)?;

        alerts_sent += 1;
    }

    log::info!(
        "Checked {} hotspots against {} locations, {} alerts.",
        hotspots.len(),
        locations.len(),
        alerts_sent
    );

    Ok(())
}
