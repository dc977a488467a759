use clap::Parser;
use firemap::{FireDatabase, FireMapResult, KmlFile, KmlWriter};
use std::{
    fmt::{self, Display, Write},
    path::PathBuf,
};

/*-------------------------------------------------------------------------------------------------
 *                                     Command Line Options
 *-----------------------------------------------------------------------------------------------*/

///
/// Export the current active incidents into a KML file.
///
/// This program will export every active incident in the database, with its footprint
/// polygon and a placemark at its centroid, as KML for inspection in Google Earth.
///
#[derive(Debug, Parser)]
#[clap(bin_name = "showincidents")]
#[clap(author, version, about)]
struct ShowIncidentsOptionsInit {
    /// The path to the hotspot and incident database file.
    ///
    /// If this is not specified, then the program will check for it in the "FIREMAP_DB"
    /// environment variable.
    #[clap(short, long)]
    #[clap(env = "FIREMAP_DB")]
    store_file: PathBuf,

    /// The path to a KML file to produce from this run.
    ///
    /// If this is not specified, then the program will create one automatically by replacing
    /// the file extension on the store_file with "*.kml".
    #[clap(short, long)]
    kml_file: Option<PathBuf>,

    /// Verbose output
    #[clap(short, long)]
    verbose: bool,
}

#[derive(Debug)]
struct ShowIncidentsOptionsChecked {
    /// The path to the database file.
    store_file: PathBuf,

    /// The path to a KML file to produce from this run.
    kml_file: PathBuf,

    /// Verbose output
    verbose: bool,
}

impl Display for ShowIncidentsOptionsChecked {
    fn fmt(&self, f: &mut fmt::Formatter) -> Result<(), fmt::Error> {
        writeln!(f, "\n")?; // yes, two blank lines.
        writeln!(f, "    Database: {}", self.store_file.display())?;
        writeln!(f, "  Output KML: {}", self.kml_file.display())?;
        writeln!(f, "\n")?; // yes, two blank lines.

        Ok(())
    }
}

/// Get the command line arguments and check them.
///
/// If there is missing data, try to fill it in with environment variables.
fn parse_args() -> FireMapResult<ShowIncidentsOptionsChecked> {
    let ShowIncidentsOptionsInit {
        store_file,
        kml_file,
        verbose,
    } = ShowIncidentsOptionsInit::parse();

    let kml_file = match kml_file {
        Some(v) => v,
        None => {
            let mut clone = store_file.clone();
            clone.set_extension("kml");
            clone
        }
    };

    let checked = ShowIncidentsOptionsChecked {
        store_file,
        kml_file,
        verbose,
    };

    if verbose {
        println!("{}", checked);
    }

    Ok(checked)
}

/*-------------------------------------------------------------------------------------------------
 *                                             MAIN
 *-----------------------------------------------------------------------------------------------*/
fn main() -> FireMapResult<()> {
    let opts = parse_args()?;

    let db = FireDatabase::connect(&opts.store_file)?;
    let mut incidents = db.active_incidents()?;
    drop(db);

    incidents.sort_unstable_by(|a, b| a.intensity_max.total_cmp(&b.intensity_max));

    if opts.verbose {
        println!("Retrieved {} incidents.", incidents.len());
    }

    //
    // Output the KML
    //
    let mut kfile = KmlFile::new(&opts.kml_file)?;

    kfile.start_style(Some("fire"))?;
    kfile.create_icon_style(
        Some("http://maps.google.com/mapfiles/kml/shapes/firedept.png"),
        1.3,
    )?;
    kfile.create_poly_style(Some("880000FF"), true, false)?;
    kfile.finish_style()?;

    let mut name = String::new();
    let mut description = String::new();
    for incident in incidents {
        name.clear();
        let _ = write!(&mut name, "{}", incident.id);

        description.clear();
        let _ = write!(
            &mut description,
            concat!(
                "ID: {}<br/>",
                "First Seen: {}<br/>",
                "Last Seen: {}<br/>",
                "Hotspots: {} ({} last hour, {} last six hours)<br/>",
                "Max FRP: {:.2} MW<br/>",
                "Avg Confidence: {:.1}<br/>",
            ),
            incident.id,
            incident.first_seen,
            incident.last_seen,
            incident.hotspot_count,
            incident.hotspot_count_1h,
            incident.hotspot_count_6h,
            incident.intensity_max,
            incident.avg_confidence,
        );

        kfile.start_folder(Some(&name), false)?;

        kfile.start_placemark(Some(&name), Some(&description), Some("#fire"))?;
        kfile.create_point(incident.centroid.lat, incident.centroid.lon, 0.0)?;
        kfile.finish_placemark()?;

        kfile.start_placemark(None, None, Some("#fire"))?;
        kfile.create_polygon(&incident.footprint)?;
        kfile.finish_placemark()?;

        kfile.finish_folder()?;
    }

    Ok(())
}
