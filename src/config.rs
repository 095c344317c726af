use std::env;
use std::time::Duration;

/// Engine settings, read from the environment by the binary.
#[derive(Debug, Clone)]
pub struct RunnerConfig {
    /// Visible countdown before the first loop.
    pub countdown: Duration,
    /// Upper bound on any wait-until-found image check.
    pub max_wait: Duration,
    /// Poll interval for image checks that do not set their own.
    pub poll_interval: Duration,
    pub failsafe_poll: Duration,
    /// Duration hint passed to the input injector for drags.
    pub drag_duration: Duration,
    pub tesseract_cmd: String,
}

fn env_u64(name: &str) -> Option<u64> {
    env::var(name).ok().and_then(|v| v.trim().parse().ok())
}

impl RunnerConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            countdown: env_u64("MACRO_COUNTDOWN_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.countdown),
            max_wait: env_u64("MACRO_MAX_WAIT_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.max_wait),
            poll_interval: env_u64("MACRO_POLL_INTERVAL_MS")
                .filter(|ms| *ms > 0)
                .map(Duration::from_millis)
                .unwrap_or(defaults.poll_interval),
            failsafe_poll: env_u64("MACRO_FAILSAFE_POLL_MS")
                .filter(|ms| *ms > 0)
                .map(Duration::from_millis)
                .unwrap_or(defaults.failsafe_poll),
            drag_duration: env_u64("MACRO_DRAG_DURATION_MS")
                .map(Duration::from_millis)
                .unwrap_or(defaults.drag_duration),
            tesseract_cmd: env::var("TESSERACT_CMD")
                .ok()
                .filter(|c| !c.trim().is_empty())
                .unwrap_or(defaults.tesseract_cmd),
        }
    }

    /// No countdown; useful for tests and embedding.
    pub fn immediate() -> Self {
        Self {
            countdown: Duration::ZERO,
            ..Self::default()
        }
    }

    pub fn with_countdown(mut self, countdown: Duration) -> Self {
        self.countdown = countdown;
        self
    }

    pub fn with_max_wait(mut self, max_wait: Duration) -> Self {
        self.max_wait = max_wait;
        self
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    pub fn with_failsafe_poll(mut self, failsafe_poll: Duration) -> Self {
        self.failsafe_poll = failsafe_poll;
        self
    }
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            countdown: Duration::from_secs(3),
            max_wait: Duration::from_secs(30),
            poll_interval: Duration::from_millis(500),
            failsafe_poll: Duration::from_millis(50),
            drag_duration: Duration::from_millis(100),
            tesseract_cmd: "tesseract".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = RunnerConfig::default();
        assert_eq!(config.countdown, Duration::from_secs(3));
        assert_eq!(config.max_wait, Duration::from_secs(30));
        assert_eq!(config.poll_interval, Duration::from_millis(500));
        assert_eq!(config.tesseract_cmd, "tesseract");
    }

    #[test]
    fn test_immediate_keeps_other_defaults() {
        let config = RunnerConfig::immediate();
        assert_eq!(config.countdown, Duration::ZERO);
        assert_eq!(config.drag_duration, Duration::from_millis(100));
    }
}
