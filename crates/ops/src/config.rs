use std::time::Duration;

pub const DEFAULT_CHUNK_SIZE: usize = 10;
pub const DEFAULT_PACE_MS: u64 = 100;

/// Tuning for bulk jobs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OpsConfig {
    /// Ids per remote call; the platform caps bulk calls at 10.
    pub chunk_size: usize,
    /// Pause between consecutive chunk submissions.
    pub pace: Duration,
}

impl Default for OpsConfig {
    fn default() -> Self {
        Self { chunk_size: DEFAULT_CHUNK_SIZE, pace: Duration::from_millis(DEFAULT_PACE_MS) }
    }
}

impl OpsConfig {
    /// `FILEX_BULK_CHUNK_SIZE` and `FILEX_BULK_PACE_MS`; unparsable or zero chunk sizes fall back to the default.
    pub fn from_env() -> Self {
        let chunk_size = std::env::var("FILEX_BULK_CHUNK_SIZE")
            .ok()
            .and_then(|s| s.trim().parse::<usize>().ok())
            .filter(|n| *n > 0)
            .unwrap_or(DEFAULT_CHUNK_SIZE);
        let pace_ms = std::env::var("FILEX_BULK_PACE_MS")
            .ok()
            .and_then(|s| s.trim().parse::<u64>().ok())
            .unwrap_or(DEFAULT_PACE_MS);
        Self { chunk_size, pace: Duration::from_millis(pace_ms) }
    }
}
