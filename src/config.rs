use crate::error::ConfigError;

/// Process-wide tuning knobs for the statistics engine.
///
/// These options shape the sub-second sliding window and the priority-wait
/// budget. They are validated once at [`Engine`](crate::Engine)
/// construction and copied where needed; nothing reads ambient process
/// state afterwards.
#[derive(Clone, Debug)]
pub struct CoreConfig {
    /// Bucket count of the sub-second sliding window.
    pub sample_count: u32,
    /// Total time span of the sub-second sliding window, in milliseconds.
    ///
    /// Must be a whole multiple of `sample_count`.
    pub interval_ms: u32,
    /// Upper bound on how long a prioritized request may wait for a future
    /// bucket slot before being rejected, in milliseconds.
    pub occupy_timeout_ms: u32,
    /// Ceiling used when tracking minimum response times, in milliseconds.
    pub statistic_max_rt_ms: u64,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            sample_count: 2,
            interval_ms: 1_000,
            occupy_timeout_ms: 500,
            statistic_max_rt_ms: 5_000,
        }
    }
}

impl CoreConfig {
    pub(crate) fn validate(&self) -> Result<(), ConfigError> {
        if self.sample_count == 0 {
            return Err(ConfigError::InvalidSampleCount(self.sample_count));
        }
        if self.interval_ms == 0 || self.interval_ms % self.sample_count != 0 {
            return Err(ConfigError::InvalidInterval {
                interval_ms: self.interval_ms,
                sample_count: self.sample_count,
            });
        }
        if self.occupy_timeout_ms == 0 {
            return Err(ConfigError::InvalidOccupyTimeout(self.occupy_timeout_ms));
        }
        Ok(())
    }
}
