//! Hill-repeat segmentation for geostamped activity logs.
//!
//! Given a time-ordered activity export and the start/stop coordinates of a
//! hill course, detect every repeat of the climb and aggregate per-repeat
//! statistics. The whole log is in memory before detection begins; every
//! stage consumes the full output of the previous one.

mod hills;
mod parse;
mod stats;

pub use hills::{HillDefinition, HillTable};
pub use parse::{load_samples, num_str_to_f64, parse_activity};
pub use stats::{build_interval, format_duration_hms, Interval, MetricStats};

use chrono::NaiveTime;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Error, Debug)]
pub enum RepeatError {
    #[error("activity file not found: {0}")]
    InputNotFound(String),
    #[error("malformed activity record: {0}")]
    MalformedRecord(String),
    #[error("unable to convert '{0}' to a number")]
    UnparsableValue(String),
    #[error("unable to parse time of day '{0}'")]
    UnparsableTime(String),
    #[error("invalid hill table: {0}")]
    InvalidConfig(String),
    #[error("unknown hill name: {0}")]
    UnknownHillName(String),
    #[error("no zero-speed samples matched the start coordinate")]
    NoCandidatesFound,
    #[error("no stop match in range for repeat {0}")]
    NoInRangeMatch(usize),
    #[error("repeat {0} crosses midnight")]
    MidnightRollover(usize),
    #[error("repeat {0} has an empty sample window")]
    EmptyWindow(usize),
}

/// Detection thresholds. The defaults are the values the tool has always
/// shipped with, tuned for short urban climbs logged at roughly 1 Hz.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Params {
    /// Capacity of the bounded start-candidate set.
    pub start_cap: usize,
    /// Degree-space error bound for a sample to qualify as a start.
    pub start_eps: f64,
    /// Starts closer together than this many seconds collapse into one.
    pub min_start_gap_s: i64,
    /// Upper bound on the stop-match error.
    pub stop_error_limit: f64,
}

impl Default for Params {
    fn default() -> Self {
        Self {
            start_cap: 20,
            start_eps: 0.01,
            min_start_gap_s: 120,
            stop_error_limit: 1.0,
        }
    }
}

/// One parsed activity record.
///
/// `time_text` keeps the source token verbatim so exports reproduce it
/// unchanged. The sequence index is the unit of every range operation.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Sample {
    pub time: NaiveTime,
    pub time_text: String,
    pub lat: f64,
    pub long: f64,
    pub altitude_m: f64,
    pub distance_m: f64,
    pub heart_rate_bpm: f64,
    pub cadence_rpm: f64,
    pub speed_mps: f64,
}

/// A sample paired with its coordinate error against a target point.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Candidate {
    pub error: f64,
    pub index: usize,
    pub sample: Sample,
}

/// A deduplicated repeat start.
///
/// `halt_index` is the zero-speed sample that matched the start coordinate;
/// `index` (`halt_index + 1`) is the first moving sample, where the effort
/// actually begins. Stop windows are bounded by halt indexes.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RepeatStart {
    pub error: f64,
    pub halt_index: usize,
    pub index: usize,
    pub sample: Sample,
}

/// Sum of absolute latitude and longitude differences, in degrees. Start and
/// stop points of a course sit close together, so this stays proportional to
/// real distance without any geodesic math.
fn coordinate_error(sample: &Sample, lat: f64, long: f64) -> f64 {
    (sample.lat - lat).abs() + (sample.long - long).abs()
}

/// Fixed-capacity set keeping the lowest-error candidates seen so far. Once
/// full, an insert replaces the single worst member, and only when the new
/// error is strictly smaller.
struct CandidateSet {
    cap: usize,
    members: Vec<Candidate>,
}

impl CandidateSet {
    fn new(cap: usize) -> Self {
        Self {
            cap,
            members: Vec::with_capacity(cap),
        }
    }

    fn insert(&mut self, candidate: Candidate) {
        if self.members.len() < self.cap {
            self.members.push(candidate);
            return;
        }
        let worst = self
            .members
            .iter()
            .enumerate()
            .max_by(|(_, a), (_, b)| a.error.total_cmp(&b.error))
            .map(|(i, _)| i);
        if let Some(worst) = worst {
            if self.members[worst].error > candidate.error {
                self.members[worst] = candidate;
            }
        }
    }

    fn into_members(self) -> Vec<Candidate> {
        self.members
    }
}

/// Scan the log for zero-speed samples near the hill's start coordinate.
///
/// The rider always comes to a halt before launching a repeat, so only
/// samples with an instantaneous speed of exactly zero qualify. Returns up
/// to `params.start_cap` candidates, every one with `error < start_eps`.
pub fn find_start_candidates(
    samples: &[Sample],
    hill: &HillDefinition,
    params: &Params,
) -> Result<Vec<Candidate>, RepeatError> {
    let mut found = CandidateSet::new(params.start_cap);
    for (index, sample) in samples.iter().enumerate() {
        if sample.speed_mps != 0.0 {
            continue;
        }
        let error = coordinate_error(sample, hill.start_lat, hill.start_long);
        if error < params.start_eps {
            found.insert(Candidate {
                error,
                index,
                sample: sample.clone(),
            });
        }
    }
    let members = found.into_members();
    if members.is_empty() {
        return Err(RepeatError::NoCandidatesFound);
    }
    debug!("found {} start candidates", members.len());
    Ok(members)
}

/// Collapse candidates that sit too close in time into one true start per
/// physical repeat, then shift each to the first moving sample.
///
/// A stationary pause at the bottom of the hill produces a cluster of
/// qualifying samples; only the last of each cluster survives. A candidate
/// on the final sample of the log has no following movement sample and is
/// discarded.
pub fn dedup_starts(
    samples: &[Sample],
    candidates: Vec<Candidate>,
    params: &Params,
) -> Result<Vec<RepeatStart>, RepeatError> {
    let mut ordered = candidates;
    ordered.sort_by_key(|c| c.index);

    let mut kept: Vec<Candidate> = Vec::new();
    for pair in ordered.windows(2) {
        let gap = pair[1]
            .sample
            .time
            .signed_duration_since(pair[0].sample.time)
            .num_seconds();
        if gap > params.min_start_gap_s {
            kept.push(pair[0].clone());
        }
    }
    if let Some(last) = ordered.last() {
        kept.push(last.clone());
    }

    let mut starts = Vec::with_capacity(kept.len());
    for candidate in kept {
        let halt_index = candidate.index;
        let index = halt_index + 1;
        match samples.get(index) {
            Some(sample) => {
                debug!(
                    "start at index {} ({}), error {}",
                    index, sample.time_text, candidate.error
                );
                starts.push(RepeatStart {
                    error: candidate.error,
                    halt_index,
                    index,
                    sample: sample.clone(),
                });
            }
            None => warn!(
                "discarding start candidate at index {}: log ends before movement resumes",
                halt_index
            ),
        }
    }
    if starts.is_empty() {
        return Err(RepeatError::NoCandidatesFound);
    }
    Ok(starts)
}

/// For each start, find the sample closest to the hill's stop coordinate
/// within the window between that start's halt and the next start's halt
/// (exclusive on both ends; the last window runs to the end of the log).
///
/// A repeat with no sample below `params.stop_error_limit` in its window is
/// a hard error; the caller gets no partial results.
pub fn match_stops(
    samples: &[Sample],
    starts: &[RepeatStart],
    hill: &HillDefinition,
    params: &Params,
) -> Result<Vec<Candidate>, RepeatError> {
    let mut stops = Vec::with_capacity(starts.len());
    for (t, start) in starts.iter().enumerate() {
        let window_end = starts
            .get(t + 1)
            .map(|next| next.halt_index)
            .unwrap_or(samples.len());

        let mut best: Option<Candidate> = None;
        for index in (start.halt_index + 1)..window_end {
            let sample = &samples[index];
            let error = coordinate_error(sample, hill.stop_lat, hill.stop_long);
            if error < params.stop_error_limit && best.as_ref().map_or(true, |b| error < b.error) {
                best = Some(Candidate {
                    error,
                    index,
                    sample: sample.clone(),
                });
            }
        }

        match best {
            Some(stop) => {
                debug!(
                    "stop for repeat {} at index {} ({}), error {}",
                    t + 1,
                    stop.index,
                    stop.sample.time_text,
                    stop.error
                );
                stops.push(stop);
            }
            None => return Err(RepeatError::NoInRangeMatch(t + 1)),
        }
    }
    Ok(stops)
}

/// Run the full pipeline: candidate scan, deduplication, stop matching, and
/// per-repeat aggregation. Fails fast; either every repeat resolves or the
/// whole run errors.
pub fn detect_intervals(
    samples: &[Sample],
    hill: &HillDefinition,
    params: &Params,
) -> Result<Vec<Interval>, RepeatError> {
    let candidates = find_start_candidates(samples, hill, params)?;
    let starts = dedup_starts(samples, candidates, params)?;
    let stops = match_stops(samples, &starts, hill, params)?;

    let mut intervals = Vec::with_capacity(starts.len());
    for (t, (start, stop)) in starts.into_iter().zip(stops.into_iter()).enumerate() {
        intervals.push(build_interval(samples, t + 1, start, stop)?);
    }
    Ok(intervals)
}

#[cfg(test)]
pub(crate) mod test_util {
    use chrono::NaiveTime;

    use crate::Sample;

    pub(crate) fn sample(time: &str, lat: f64, long: f64, speed_mps: f64) -> Sample {
        Sample {
            time: NaiveTime::parse_from_str(time, "%H:%M:%S").unwrap(),
            time_text: time.to_string(),
            lat,
            long,
            altitude_m: 0.0,
            distance_m: 0.0,
            heart_rate_bpm: 0.0,
            cadence_rpm: 0.0,
            speed_mps,
        }
    }
}
