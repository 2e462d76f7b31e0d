//! FFmpeg CLI wrapper for the ShotReel pipeline.
//!
//! All pixel and sample work happens in FFmpeg subprocesses; this crate
//! builds their argument lists, runs them with a timeout, and probes results.

pub mod audio;
pub mod command;
pub mod error;
pub mod frame;
pub mod fs_utils;
pub mod ops;
pub mod overlay;
pub mod probe;
pub mod progress;

pub use audio::{atempo_chain, atempo_filter, MixInput};
pub use command::{check_ffmpeg, check_ffprobe, FfmpegCommand, FfmpegRunner, InputSource};
pub use error::{MediaError, MediaResult, Tool};
pub use frame::extract_last_frame;
pub use fs_utils::move_file;
pub use ops::NormalizeTarget;
pub use overlay::TextStyle;
pub use probe::{get_duration, probe_video, VideoInfo};
pub use progress::{FfmpegProgress, ProgressMilestones};
