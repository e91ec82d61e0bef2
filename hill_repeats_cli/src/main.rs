use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{ArgAction, Parser, ValueHint};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use hill_repeats::{
    detect_intervals, format_duration_hms, load_samples, HillTable, Interval, Params, Sample,
};

#[derive(Parser, Debug)]
#[command(author, version, about = "Hill-repeat interval detection CLI", long_about = None)]
struct Cli {
    /// Tab-delimited activity export to segment
    #[arg(value_hint = ValueHint::FilePath)]
    activity: PathBuf,

    /// Name of the hill course to match against
    hill: String,

    /// JSON hill table (defaults to the built-in course list)
    #[arg(long, value_hint = ValueHint::FilePath)]
    hills: Option<PathBuf>,

    /// Directory for the interval and summary exports
    #[arg(long, default_value = ".", value_hint = ValueHint::DirPath)]
    output_dir: PathBuf,

    /// Enable debug logging
    #[arg(short, long, action = ArgAction::SetTrue)]
    verbose: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let default_level = if cli.verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .try_init();

    let hills = match cli.hills.as_ref() {
        Some(path) => HillTable::from_json_path(path)?,
        None => HillTable::builtin(),
    };
    debug!("known hills: {}", hills.names().join(", "));
    let hill = hills.get(&cli.hill)?;

    info!(
        "loading {}, starting at {}, {}, stopping at {}, {}",
        cli.activity.display(),
        hill.start_lat,
        hill.start_long,
        hill.stop_lat,
        hill.stop_long
    );
    let samples = load_samples(&cli.activity)?;
    debug!("loaded {} samples", samples.len());

    let intervals = detect_intervals(&samples, hill, &Params::default())?;
    info!("detected {} repeats", intervals.len());

    fs::create_dir_all(&cli.output_dir)
        .with_context(|| format!("failed to create {}", cli.output_dir.display()))?;
    let activity_name = cli
        .activity
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("activity");

    for interval in &intervals {
        let path = cli
            .output_dir
            .join(format!("{}_interval_{}.csv", activity_name, interval.number - 1));
        write_interval_csv(&path, &samples, interval)?;
        info!("wrote interval data: {}", path.display());
    }

    let summary_path = cli.output_dir.join(format!("{}_summary.txt", activity_name));
    write_summary(&summary_path, &intervals)?;
    info!("wrote summary: {}", summary_path.display());

    Ok(())
}

fn write_interval_csv(path: &Path, samples: &[Sample], interval: &Interval) -> Result<()> {
    let file =
        File::create(path).with_context(|| format!("failed to create {}", path.display()))?;
    let mut writer = csv::Writer::from_writer(file);
    write_interval_rows(samples, interval, &mut writer)
}

fn write_interval_rows<W: Write>(
    samples: &[Sample],
    interval: &Interval,
    writer: &mut csv::Writer<W>,
) -> Result<()> {
    writer.write_record([
        "Time",
        "Latitude",
        "Longitude",
        "Alt.(M)",
        "Dist.(M)",
        "HR (Bpm)",
        "Cadence",
        "Speed",
    ])?;

    for sample in &samples[interval.start.index..=interval.stop.index] {
        writer.write_record([
            sample.time_text.clone(),
            format_number(sample.lat),
            format_number(sample.long),
            format_number(sample.altitude_m),
            format_number(sample.distance_m),
            format_number(sample.heart_rate_bpm),
            format_number(sample.cadence_rpm),
            format_number(sample.speed_mps),
        ])?;
    }
    writer.flush()?;
    Ok(())
}

fn write_summary(path: &Path, intervals: &[Interval]) -> Result<()> {
    let file =
        File::create(path).with_context(|| format!("failed to create {}", path.display()))?;
    let mut writer = csv::WriterBuilder::new().delimiter(b'\t').from_writer(file);
    write_summary_rows(intervals, &mut writer)
}

fn write_summary_rows<W: Write>(
    intervals: &[Interval],
    writer: &mut csv::Writer<W>,
) -> Result<()> {
    writer.write_record([
        "interval",
        "duration(mm:ss)",
        "duration(s)",
        "distance(m)",
        "minHR(BPM)",
        "avgHR(BPM)",
        "maxHR(BPM)",
        "minCad(RPM)",
        "avgCad(RPM)",
        "maxCad(RPM)",
        "minSpeed(m/s)",
        "avgSpeed(m/s)",
        "maxSpeed(m/s)",
        "minSpeed(km/h)",
        "avgSpeed(km/h)",
        "maxSpeed(km/h)",
    ])?;

    for interval in intervals {
        writer.write_record([
            format!("int {}", interval.number),
            format_duration_hms(interval.duration_s),
            interval.duration_s.to_string(),
            format_number(interval.distance_m),
            format_min(interval.heart_rate.min),
            format_number(interval.heart_rate.avg),
            format_number(interval.heart_rate.max),
            format_min(interval.cadence.min),
            format_number(interval.cadence.avg),
            format_number(interval.cadence.max),
            format_number(interval.speed_mps.min.unwrap_or(0.0)),
            format_number(interval.speed_mps.avg),
            format_number(interval.speed_mps.max),
            format_number(interval.speed_kmh.min.unwrap_or(0.0)),
            format_number(interval.speed_kmh.avg),
            format_number(interval.speed_kmh.max),
        ])?;
    }
    writer.flush()?;
    Ok(())
}

/// Integral values keep a trailing `.0` so columns line up with the
/// historical exports.
fn format_number(value: f64) -> String {
    if value.is_finite() && value.fract() == 0.0 {
        format!("{value:.1}")
    } else {
        format!("{value}")
    }
}

/// Heart rate and cadence columns leave an undefined minimum blank.
fn format_min(min: Option<f64>) -> String {
    min.map(format_number).unwrap_or_default()
}
