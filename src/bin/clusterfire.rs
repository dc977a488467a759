use chrono::Utc;
use clap::Parser;
use firemap::{assign_and_update, BroadcastMessage, FireDatabase, FireMapResult};
use log::LevelFilter;
use simple_logger::SimpleLogger;
use std::{io::Write, path::PathBuf};

/*-------------------------------------------------------------------------------------------------
 *                                     Command Line Options
 *-----------------------------------------------------------------------------------------------*/

///
/// Group ingested hotspots into incidents.
///
/// One run loads the full hotspot and active incident snapshot, assigns any unassigned
/// hotspots to the nearest incident or spawns new ones, recomputes the touched incidents,
/// and writes them back. The change-set is printed on standard output as a single JSON line
/// for the live update collaborator. The program is meant to be invoked periodically by a
/// scheduler; runs must not overlap.
///
#[derive(Debug, Parser)]
#[clap(bin_name = "clusterfire")]
#[clap(author, version, about)]
struct ClusterFireOptions {
    /// The path to the hotspot and incident database file.
    ///
    /// If this is not specified, then the program will check for it in the "FIREMAP_DB"
    /// environment variable.
    #[clap(short, long)]
    #[clap(env = "FIREMAP_DB")]
    store_file: PathBuf,

    /// Suppress the broadcast JSON line on standard output.
    #[clap(short, long)]
    quiet: bool,

    /// Verbose output
    #[clap(short, long)]
    verbose: bool,
}

/*-------------------------------------------------------------------------------------------------
 *                                             MAIN
 *-----------------------------------------------------------------------------------------------*/
fn main() -> FireMapResult<()> {
    let opts = ClusterFireOptions::parse();

    let level = if opts.verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };
    SimpleLogger::new().with_level(level).init()?;

    // A single timestamp keeps the whole run deterministic.
    let now = Utc::now();

    FireDatabase::initialize(&opts.store_file)?;
    let db = FireDatabase::connect(&opts.store_file)?;

    let hotspots = db.hotspots(now)?;
    let incidents = db.active_incidents()?;
    let mut next_incident_num = db.next_incident_number()?;

    log::info!(
        "Loaded {} hotspots and {} active incidents.",
        hotspots.len(),
        incidents.len()
    );

    let (changed, stats) = assign_and_update(&hotspots, &incidents, &mut next_incident_num, now);

    db.replace_incidents(&changed)?;

    log::info!(
        "Assigned = {:4} New = {:4} Updated = {:4}",
        stats.assigned,
        stats.spawned,
        stats.updated
    );

    if let Some(most_intense) = changed
        .iter()
        .max_by(|a, b| a.intensity_max.total_cmp(&b.intensity_max))
    {
        log::info!("");
        log::info!("Most intense updated incident:");
        for line in most_intense.to_string().lines() {
            log::info!("{}", line);
        }
    }

    if !opts.quiet && !changed.is_empty() {
        let message = BroadcastMessage::incidents_updated(&changed);

        let stdout = std::io::stdout();
        let mut handle = stdout.lock();
        writeln!(handle, "{}", message.to_json_line()?)?;
    }

    Ok(())
}
