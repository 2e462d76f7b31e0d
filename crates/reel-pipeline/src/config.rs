//! Pipeline configuration.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use reel_models::EncodingConfig;

/// Pipeline configuration.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Downloaded takes, continuity frames and assembly scratch space
    pub work_dir: PathBuf,
    /// JSON file backing the job store
    pub job_store_path: PathBuf,
    /// How often a background task polls the generation service
    pub poll_interval: Duration,
    /// How often a blocking wait re-reads the job store
    pub wait_interval: Duration,
    /// Upper bound for a blocking wait on one job
    pub wait_timeout: Duration,
    /// Aspect ratio requested from the generation service
    pub aspect_ratio: String,
    /// Kill FFmpeg processes that run longer than this
    pub ffmpeg_timeout: Duration,
    /// Shots whose takes are executed concurrently
    pub max_parallel_shots: usize,
    /// Output encoding for every re-encode during assembly
    pub encoding: EncodingConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            work_dir: PathBuf::from("/tmp/shotreel"),
            job_store_path: PathBuf::from("/tmp/shotreel/jobs.json"),
            poll_interval: Duration::from_secs(10),
            wait_interval: Duration::from_secs(2),
            wait_timeout: Duration::from_secs(600),
            aspect_ratio: "16:9".to_string(),
            ffmpeg_timeout: Duration::from_secs(900),
            max_parallel_shots: 2,
            encoding: EncodingConfig::default(),
        }
    }
}

fn env_or<T: FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

impl PipelineConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let work_dir: PathBuf = std::env::var("SHOTREEL_WORK_DIR")
            .map(PathBuf::from)
            .unwrap_or(defaults.work_dir);
        let job_store_path = std::env::var("SHOTREEL_JOB_STORE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| work_dir.join("jobs.json"));

        let mut encoding = defaults.encoding;
        if let Some(crf) = std::env::var("SHOTREEL_CRF").ok().and_then(|s| s.parse().ok()) {
            encoding = encoding.with_crf(crf);
        }

        Self {
            work_dir,
            job_store_path,
            poll_interval: Duration::from_secs(env_or("SHOTREEL_POLL_INTERVAL_SECS", 10)),
            wait_interval: Duration::from_secs(env_or("SHOTREEL_WAIT_INTERVAL_SECS", 2)),
            wait_timeout: Duration::from_secs(env_or("SHOTREEL_WAIT_TIMEOUT_SECS", 600)),
            aspect_ratio: std::env::var("SHOTREEL_ASPECT_RATIO")
                .unwrap_or(defaults.aspect_ratio),
            ffmpeg_timeout: Duration::from_secs(env_or("SHOTREEL_FFMPEG_TIMEOUT_SECS", 900)),
            max_parallel_shots: env_or("SHOTREEL_MAX_PARALLEL_SHOTS", 2).max(1),
            encoding,
        }
    }

    /// Where downloaded takes are written.
    pub fn takes_dir(&self) -> PathBuf {
        self.work_dir.join("takes")
    }

    /// Where continuity frames are written.
    pub fn frames_dir(&self) -> PathBuf {
        self.work_dir.join("frames")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = PipelineConfig::default();
        assert_eq!(config.poll_interval, Duration::from_secs(10));
        assert_eq!(config.wait_interval, Duration::from_secs(2));
        assert_eq!(config.wait_timeout, Duration::from_secs(600));
        assert_eq!(config.aspect_ratio, "16:9");
        assert_eq!(config.takes_dir(), PathBuf::from("/tmp/shotreel/takes"));
    }

    #[test]
    fn test_env_or_falls_back_on_garbage() {
        std::env::set_var("SHOTREEL_TEST_GARBAGE", "ten");
        assert_eq!(env_or("SHOTREEL_TEST_GARBAGE", 7u64), 7);
        std::env::set_var("SHOTREEL_TEST_GARBAGE", "12");
        assert_eq!(env_or("SHOTREEL_TEST_GARBAGE", 7u64), 12);
        std::env::remove_var("SHOTREEL_TEST_GARBAGE");
    }
}
