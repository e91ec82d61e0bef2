//! Per-repeat summary statistics.

use serde::{Deserialize, Serialize};

use crate::{Candidate, RepeatError, RepeatStart, Sample};

/// Min/avg/max triple for one sensor column over a repeat window.
///
/// `min` skips non-positive readings (a zero means the sensor had no signal,
/// not a true minimum) and is `None` when the window never saw a positive
/// value. `max` and the running sum behind `avg` count every reading.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct MetricStats {
    pub min: Option<f64>,
    pub avg: f64,
    pub max: f64,
}

impl MetricStats {
    /// The same triple converted from m/s to km/h.
    pub fn in_km_per_hour(&self) -> MetricStats {
        let scale = |v: f64| v * 3600.0 / 1000.0;
        MetricStats {
            min: self.min.map(scale),
            avg: scale(self.avg),
            max: scale(self.max),
        }
    }
}

/// One detected repeat with its aggregated statistics. Built once per
/// start/stop pair and never mutated afterwards.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Interval {
    /// 1-based position in detection order.
    pub number: usize,
    pub start: RepeatStart,
    pub stop: Candidate,
    pub duration_s: i64,
    pub distance_m: f64,
    pub heart_rate: MetricStats,
    pub cadence: MetricStats,
    pub speed_mps: MetricStats,
    pub speed_kmh: MetricStats,
}

/// Aggregate one start/stop pair into an [`Interval`].
///
/// Duration is a time-of-day subtraction; an activity must not cross
/// midnight, and a negative result is rejected. A stop that does not lie
/// strictly after the start leaves nothing to aggregate and is likewise
/// rejected.
pub fn build_interval(
    samples: &[Sample],
    number: usize,
    start: RepeatStart,
    stop: Candidate,
) -> Result<Interval, RepeatError> {
    if stop.index <= start.index {
        return Err(RepeatError::EmptyWindow(number));
    }

    let duration_s = stop
        .sample
        .time
        .signed_duration_since(start.sample.time)
        .num_seconds();
    if duration_s < 0 {
        return Err(RepeatError::MidnightRollover(number));
    }

    let distance_m = stop.sample.distance_m - start.sample.distance_m;
    let heart_rate = column_min_avg_max(samples, start.index, stop.index, |s| s.heart_rate_bpm);
    let cadence = column_min_avg_max(samples, start.index, stop.index, |s| s.cadence_rpm);
    let speed_mps = column_min_avg_max(samples, start.index, stop.index, |s| s.speed_mps);
    let speed_kmh = speed_mps.in_km_per_hour();

    Ok(Interval {
        number,
        start,
        stop,
        duration_s,
        distance_m,
        heart_rate,
        cadence,
        speed_mps,
        speed_kmh,
    })
}

/// Scan one column over the inclusive index range `[start_index, stop_index]`.
///
/// The average divides by the index span rather than the sample count,
/// matching the summaries this tool has always produced.
fn column_min_avg_max(
    samples: &[Sample],
    start_index: usize,
    stop_index: usize,
    column: fn(&Sample) -> f64,
) -> MetricStats {
    let mut min: Option<f64> = None;
    let mut max = f64::NEG_INFINITY;
    let mut sum = 0.0;

    for sample in &samples[start_index..=stop_index] {
        let value = column(sample);
        if value > 0.0 {
            min = Some(min.map_or(value, |m| m.min(value)));
        }
        max = max.max(value);
        sum += value;
    }

    let span = (stop_index - start_index) as f64;
    MetricStats {
        min,
        avg: sum / span,
        max,
    }
}

/// Zero-padded `HH:MM:SS` rendering of a second count.
pub fn format_duration_hms(total_s: i64) -> String {
    let hours = total_s / 3600;
    let minutes = (total_s % 3600) / 60;
    let seconds = total_s % 60;
    format!("{hours:02}:{minutes:02}:{seconds:02}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_util::sample;

    fn samples_with_heart_rates(rates: &[f64]) -> Vec<Sample> {
        rates
            .iter()
            .enumerate()
            .map(|(i, &hr)| {
                let mut s = sample(&format!("10:00:{i:02}"), 49.0, -123.0, 2.0);
                s.heart_rate_bpm = hr;
                s
            })
            .collect()
    }

    fn start_at(samples: &[Sample], index: usize) -> RepeatStart {
        RepeatStart {
            error: 0.0,
            halt_index: index - 1,
            index,
            sample: samples[index].clone(),
        }
    }

    fn stop_at(samples: &[Sample], index: usize) -> Candidate {
        Candidate {
            error: 0.0,
            index,
            sample: samples[index].clone(),
        }
    }

    #[test]
    fn min_ignores_non_positive_values() {
        let samples = samples_with_heart_rates(&[100.0, 0.0, 150.0, 160.0, 170.0]);
        let stats = column_min_avg_max(&samples, 1, 4, |s| s.heart_rate_bpm);
        assert_eq!(stats.min, Some(150.0));
        assert_eq!(stats.max, 170.0);
        // sum 480 over an index span of 3
        assert!((stats.avg - 160.0).abs() < 1e-9);
        assert!(stats.min.unwrap() <= stats.avg && stats.avg <= stats.max);
    }

    #[test]
    fn min_is_none_without_positive_values() {
        let samples = samples_with_heart_rates(&[0.0, 0.0, 0.0]);
        let stats = column_min_avg_max(&samples, 0, 2, |s| s.heart_rate_bpm);
        assert_eq!(stats.min, None);
        assert_eq!(stats.max, 0.0);
        assert_eq!(stats.avg, 0.0);
    }

    #[test]
    fn average_uses_index_span() {
        let samples = samples_with_heart_rates(&[0.0, 120.0, 150.0, 165.0]);
        let stats = column_min_avg_max(&samples, 1, 3, |s| s.heart_rate_bpm);
        assert!((stats.avg - 217.5).abs() < 1e-9);
    }

    #[test]
    fn km_per_hour_scales_by_3_6() {
        let stats = MetricStats {
            min: Some(1.0),
            avg: 2.0,
            max: 3.0,
        };
        let kmh = stats.in_km_per_hour();
        assert!((kmh.min.unwrap() - 3.6).abs() < 1e-9);
        assert!((kmh.avg - 7.2).abs() < 1e-9);
        assert!((kmh.max - 10.8).abs() < 1e-9);
    }

    #[test]
    fn interval_carries_duration_and_distance() {
        let mut samples = samples_with_heart_rates(&[0.0, 130.0, 140.0]);
        samples[1].distance_m = 1010.0;
        samples[2].distance_m = 2010.0;
        samples[2].time = chrono::NaiveTime::parse_from_str("10:04:57", "%H:%M:%S").unwrap();
        let interval = build_interval(
            &samples,
            1,
            start_at(&samples, 1),
            stop_at(&samples, 2),
        )
        .unwrap();
        assert_eq!(interval.duration_s, 296);
        assert!((interval.distance_m - 1000.0).abs() < 1e-9);
    }

    #[test]
    fn midnight_rollover_is_rejected() {
        let mut samples = samples_with_heart_rates(&[0.0, 130.0, 140.0]);
        samples[1].time = chrono::NaiveTime::parse_from_str("23:59:00", "%H:%M:%S").unwrap();
        samples[2].time = chrono::NaiveTime::parse_from_str("00:01:00", "%H:%M:%S").unwrap();
        let result = build_interval(&samples, 1, start_at(&samples, 1), stop_at(&samples, 2));
        assert!(matches!(result, Err(RepeatError::MidnightRollover(1))));
    }

    #[test]
    fn empty_window_is_rejected() {
        let samples = samples_with_heart_rates(&[0.0, 130.0]);
        let result = build_interval(&samples, 1, start_at(&samples, 1), stop_at(&samples, 1));
        assert!(matches!(result, Err(RepeatError::EmptyWindow(1))));
    }

    #[test]
    fn duration_formats_zero_padded() {
        assert_eq!(format_duration_hms(0), "00:00:00");
        assert_eq!(format_duration_hms(295), "00:04:55");
        assert_eq!(format_duration_hms(3605), "01:00:05");
    }
}
