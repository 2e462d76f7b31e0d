//! FFmpeg progress parsing.

use std::sync::atomic::{AtomicU32, Ordering};

use serde::{Deserialize, Serialize};

/// Progress information from FFmpeg.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FfmpegProgress {
    /// Current frame number
    pub frame: u64,
    /// Output time in milliseconds
    pub out_time_ms: i64,
    /// Encoding speed (e.g., 1.5 = 1.5x realtime)
    pub speed: f64,
    /// Whether encoding is complete
    pub is_complete: bool,
}

impl FfmpegProgress {
    /// Progress percentage given the expected output duration in seconds.
    pub fn percentage(&self, expected_secs: f64) -> f64 {
        if expected_secs <= 0.0 {
            return 0.0;
        }
        ((self.out_time_ms as f64 / 1000.0 / expected_secs) * 100.0).clamp(0.0, 100.0)
    }
}

/// Turns a stream of progress snapshots into a few milestones worth logging.
///
/// Usable from the runner's `Fn` callback; each milestone fires at most once.
#[derive(Debug)]
pub struct ProgressMilestones {
    expected_secs: f64,
    step_percent: f64,
    reached: AtomicU32,
}

impl ProgressMilestones {
    /// Milestones every `step_percent` of an output `expected_secs` long.
    pub fn new(expected_secs: f64, step_percent: f64) -> Self {
        Self {
            expected_secs,
            step_percent: step_percent.clamp(1.0, 100.0),
            reached: AtomicU32::new(0),
        }
    }

    /// 25 %, 50 %, 75 %, 100 %.
    pub fn quarters(expected_secs: f64) -> Self {
        Self::new(expected_secs, 25.0)
    }

    /// The milestone (in percent) `progress` has newly passed, if any.
    pub fn crossed(&self, progress: &FfmpegProgress) -> Option<u32> {
        let index = (progress.percentage(self.expected_secs) / self.step_percent).floor() as u32;
        if index == 0 {
            return None;
        }
        let previous = self.reached.fetch_max(index, Ordering::Relaxed);
        (index > previous).then(|| (index as f64 * self.step_percent).round() as u32)
    }
}

/// Fold one `-progress` line into `current`.
///
/// Returns a snapshot at the end of every progress block.
pub(crate) fn parse_progress_line(line: &str, current: &mut FfmpegProgress) -> Option<FfmpegProgress> {
    let (key, value) = line.trim().split_once('=')?;
    match key {
        "out_time_us" | "out_time_ms" => {
            // FFmpeg reports microseconds under both keys
            if let Ok(us) = value.parse::<i64>() {
                current.out_time_ms = us / 1000;
            }
        }
        "frame" => {
            if let Ok(frame) = value.parse() {
                current.frame = frame;
            }
        }
        "speed" => {
            if let Some(speed) = value.strip_suffix('x').and_then(|s| s.trim().parse().ok()) {
                current.speed = speed;
            }
        }
        "progress" => {
            current.is_complete = value == "end";
            return Some(current.clone());
        }
        _ => {}
    }
    None
}

/// Whether a stderr line belongs to the `-progress` key/value stream.
pub(crate) fn is_progress_line(line: &str) -> bool {
    const KEYS: &[&str] = &[
        "frame", "fps", "stream_0_0_q", "bitrate", "total_size", "out_time_us",
        "out_time_ms", "out_time", "dup_frames", "drop_frames", "speed", "progress",
    ];
    line.split_once('=')
        .map(|(key, _)| KEYS.contains(&key.trim()) || key.starts_with("stream_"))
        .unwrap_or(false)
}
