//! Structured job logging utilities.

use tracing::Span;

use reel_models::JobId;

/// One event with the logger's context attached as fields.
macro_rules! job_event {
    ($level:ident, $logger:expr, $phase:literal, $message:expr) => {
        tracing::$level!(
            job_id = %$logger.job_id,
            operation = $logger.operation,
            shot_id = %$logger.shot(),
            take = ?$logger.take,
            phase = $phase,
            "{}",
            $message
        )
    };
}

/// Logs job lifecycle events with the job, shot and take attached as fields.
#[derive(Debug, Clone)]
pub struct JobLogger {
    job_id: JobId,
    operation: &'static str,
    shot_id: Option<String>,
    take: Option<usize>,
}

impl JobLogger {
    /// `operation` is the job type label, e.g. `take_generation`.
    pub fn new(job_id: &JobId, operation: &'static str) -> Self {
        Self {
            job_id: job_id.clone(),
            operation,
            shot_id: None,
            take: None,
        }
    }

    /// Attach the shot (and take index, for chained shots) the job belongs to.
    pub fn for_shot(mut self, shot_id: Option<&str>, take: Option<usize>) -> Self {
        self.shot_id = shot_id.map(str::to_string);
        self.take = take;
        self
    }

    fn shot(&self) -> &str {
        self.shot_id.as_deref().unwrap_or("-")
    }

    pub fn log_start(&self, message: &str) {
        job_event!(info, self, "start", message);
    }

    pub fn log_progress(&self, message: &str) {
        job_event!(debug, self, "progress", message);
    }

    pub fn log_warning(&self, message: &str) {
        job_event!(warn, self, "warning", message);
    }

    pub fn log_error(&self, message: &str) {
        job_event!(error, self, "error", message);
    }

    pub fn log_completion(&self, message: &str) {
        job_event!(info, self, "complete", message);
    }

    /// Span carrying the same fields, for instrumenting the poll task.
    pub fn create_span(&self) -> Span {
        tracing::info_span!(
            "job",
            job_id = %self.job_id,
            operation = self.operation,
            shot_id = %self.shot(),
            take = ?self.take
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unattached_job_logs_placeholder_shot() {
        let logger = JobLogger::new(&JobId::from_string("j1"), "shot_generation");
        assert_eq!(logger.shot(), "-");
        assert_eq!(logger.take, None);
        logger.log_start("submitted");
    }

    #[test]
    fn test_shot_context() {
        let logger = JobLogger::new(&JobId::from_string("j1"), "take_generation")
            .for_shot(Some("s4"), Some(1));
        assert_eq!(logger.shot(), "s4");
        assert_eq!(logger.take, Some(1));
        let _span = logger.create_span().entered();
        logger.log_completion("done");
    }
}
