use chrono::Utc;
use clap::Parser;
use crossbeam_channel::{bounded, Receiver, Sender};
use firemap::{parse_area_csv, FireDatabase, FireMapError, FireMapResult, Hotspot, Source};
use log::LevelFilter;
use simple_logger::SimpleLogger;
use std::{
    path::PathBuf,
    thread::{self, JoinHandle},
};

const CHANNEL_SIZE: usize = 100;

/// A single cursor covers every feed since they all land in the same table.
const CURSOR_NAME: &str = "FIRMS_ALL";

/*-------------------------------------------------------------------------------------------------
 *                                     Command Line Options
 *-----------------------------------------------------------------------------------------------*/

///
/// Ingest downloaded FIRMS area CSV files into the hotspot database.
///
/// This program scans a drop directory for FIRMS area CSV files, parses any rows newer than
/// the ingest cursor, and writes them to the database. The file name must contain the FIRMS
/// source the file came from (for example VIIRS_SNPP_NRT_2024-08-06.csv) so the rows can be
/// attributed correctly. Expired hotspots are purged at the end of the run.
///
#[derive(Debug, Parser)]
#[clap(bin_name = "ingestfire")]
#[clap(author, version, about)]
struct IngestFireOptions {
    /// The path to the hotspot and incident database file.
    ///
    /// If this is not specified, then the program will check for it in the "FIREMAP_DB"
    /// environment variable.
    #[clap(short, long)]
    #[clap(env = "FIREMAP_DB")]
    store_file: PathBuf,

    /// The directory to scan for downloaded FIRMS area CSV files.
    ///
    /// If this is not specified, then the program will check for it in the
    /// "FIREMAP_DATA_DIR" environment variable.
    #[clap(short, long)]
    #[clap(env = "FIREMAP_DATA_DIR")]
    data_dir: PathBuf,

    /// Verbose output
    #[clap(short, long)]
    verbose: bool,
}

/*-------------------------------------------------------------------------------------------------
 *                                             MAIN
 *-----------------------------------------------------------------------------------------------*/
fn main() -> FireMapResult<()> {
    let opts = IngestFireOptions::parse();

    let level = if opts.verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };
    SimpleLogger::new().with_level(level).init()?;

    if !opts.data_dir.is_dir() {
        return Err(Box::new(FireMapError {
            msg: "data directory does not exist",
        }));
    }

    FireDatabase::initialize(&opts.store_file)?;

    let db = FireDatabase::connect(&opts.store_file)?;
    let cursor = db.ingest_cursor(CURSOR_NAME)?;
    drop(db);

    log::debug!("Current cursor: '{}'", cursor);

    let (to_parse, from_path_gen) = bounded(CHANNEL_SIZE);
    let (to_store, from_parse) = bounded(CHANNEL_SIZE);

    let path_gen = start_path_generation_thread(opts.data_dir.clone(), to_parse)?;

    let mut parse_threads = Vec::with_capacity(num_cpus::get());
    for _ in 0..num_cpus::get() {
        parse_threads.push(start_parse_thread(
            cursor.clone(),
            from_path_gen.clone(),
            to_store.clone(),
        )?);
    }
    drop(from_path_gen);
    drop(to_store);

    let store_thread = start_store_thread(opts.store_file.clone(), from_parse)?;

    path_gen.join().unwrap();
    for jh in parse_threads {
        jh.join().unwrap();
    }
    let (num_ingested, max_acq) = store_thread.join().unwrap();

    let db = FireDatabase::connect(&opts.store_file)?;
    if max_acq > cursor {
        db.update_ingest_cursor(CURSOR_NAME, &max_acq, Utc::now())?;
        log::debug!("Updated cursor to '{}'", max_acq);
    }

    let purged = db.purge_expired_hotspots(Utc::now())?;

    log::info!(
        "Ingested {} hotspots, purged {} expired ones.",
        num_ingested,
        purged
    );

    Ok(())
}

/*-------------------------------------------------------------------------------------------------
 *                                      Pipeline Threads
 *-----------------------------------------------------------------------------------------------*/
fn start_path_generation_thread(
    data_dir: PathBuf,
    to_parse: Sender<(PathBuf, Source)>,
) -> FireMapResult<JoinHandle<()>> {
    let jh = thread::Builder::new()
        .name("ingestfire-path_gen".to_owned())
        .spawn(move || {
            for (entry, fname) in walkdir::WalkDir::new(data_dir)
                .into_iter()
                .filter_map(|res| res.ok())
                // Ignore directories, WalkDir will take care of recursing into them.
                .filter(|entry| entry.path().is_file())
                // Get the file name
                .map(|entry| {
                    let fname: String = entry.file_name().to_string_lossy().to_string();
                    (entry, fname)
                })
                // Only consider CSV files.
                .filter(|(_entry, fname)| fname.ends_with(".csv"))
            {
                match Source::string_contains_source(&fname) {
                    Some(source) => {
                        log::debug!("Queueing {}", fname);
                        to_parse.send((entry.path().to_path_buf(), source)).unwrap();
                    }
                    None => log::warn!("No FIRMS source in file name, skipping: {}", fname),
                }
            }
        })?;

    Ok(jh)
}

fn start_parse_thread(
    cursor: String,
    from_path_gen: Receiver<(PathBuf, Source)>,
    to_store: Sender<(Vec<Hotspot>, String)>,
) -> FireMapResult<JoinHandle<()>> {
    let jh = thread::Builder::new()
        .name("ingestfire-parse".to_owned())
        .spawn(move || {
            for (path, source) in from_path_gen {
                let csv_text = match std::fs::read_to_string(&path) {
                    Ok(text) => text,
                    Err(err) => {
                        log::error!("Error reading {}: {}", path.display(), err);
                        continue;
                    }
                };

                let (hotspots, max_acq) = parse_area_csv(&csv_text, source, &cursor);
                log::debug!(
                    "{} ({}): {} new hotspots",
                    path.display(),
                    source,
                    hotspots.len()
                );

                to_store.send((hotspots, max_acq)).unwrap();
            }
        })?;

    Ok(jh)
}

fn start_store_thread(
    store_file: PathBuf,
    from_parse: Receiver<(Vec<Hotspot>, String)>,
) -> FireMapResult<JoinHandle<(usize, String)>> {
    let jh = thread::Builder::new()
        .name("ingestfire-store".to_owned())
        .spawn(move || {
            let db = FireDatabase::connect(store_file).unwrap();
            let mut add_transaction = db.add_hotspots_handle().unwrap();

            let now = Utc::now();
            let mut num_ingested = 0;
            let mut max_acq = String::new();

            for (hotspots, file_max_acq) in from_parse {
                num_ingested += hotspots.len();
                if file_max_acq > max_acq {
                    max_acq = file_max_acq;
                }

                add_transaction.add(&hotspots, now).unwrap();
            }

            (num_ingested, max_acq)
        })?;

    Ok(jh)
}
