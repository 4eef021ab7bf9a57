/// Timeouts for song generation
///
/// The generation call is the only slow step in the pipeline. It is bounded
/// here; anything that slips through (a crashed process, a lost task) is
/// picked up later by the reaper using [`DEFAULT_STALE_AFTER`].
///
/// # Defaults
///
/// - Generation call: 5 minutes
/// - Minimum: 1 second
/// - Maximum: 30 minutes
/// - A song is stale once it has been `generating` for 15 minutes
///
/// # Example
///
/// ```no_run
/// use songteam_worker::timeout::GenerationTimeout;
///
/// # async fn example() {
/// let timeout = GenerationTimeout::from_config(Some(120));
/// let result = timeout.run(async { 42 }).await;
/// assert_eq!(result.ok(), Some(42));
/// # }
/// ```

use std::future::Future;
use std::time::Duration;

/// Default bound on a single generation call (5 minutes)
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(300);

/// Minimum allowed timeout (1 second)
pub const MIN_TIMEOUT: Duration = Duration::from_secs(1);

/// Maximum allowed timeout (30 minutes)
pub const MAX_TIMEOUT: Duration = Duration::from_secs(1800);

/// Age after which a `generating` song is considered abandoned (15 minutes)
pub const DEFAULT_STALE_AFTER: Duration = Duration::from_secs(900);

/// Returned when the wrapped future did not finish in time
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("timed out after {0:?}")]
pub struct Elapsed(pub Duration);

/// Generation call timeout
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GenerationTimeout {
    timeout: Duration,
}

impl GenerationTimeout {
    pub fn new(timeout: Duration) -> Self {
        GenerationTimeout { timeout }
    }

    /// Builds a timeout from a configured number of seconds
    ///
    /// `None` means the default; other values are clamped to
    /// `[MIN_TIMEOUT, MAX_TIMEOUT]`.
    pub fn from_config(timeout_secs: Option<u64>) -> Self {
        let timeout = match timeout_secs {
            Some(secs) => Duration::from_secs(secs).clamp(MIN_TIMEOUT, MAX_TIMEOUT),
            None => DEFAULT_TIMEOUT,
        };

        GenerationTimeout::new(timeout)
    }

    /// Runs `future`, giving up once the timeout elapses
    pub async fn run<F: Future>(&self, future: F) -> Result<F::Output, Elapsed> {
        tokio::time::timeout(self.timeout, future)
            .await
            .map_err(|_| Elapsed(self.timeout))
    }

    pub fn duration(&self) -> Duration {
        self.timeout
    }
}

impl Default for GenerationTimeout {
    fn default() -> Self {
        GenerationTimeout::new(DEFAULT_TIMEOUT)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::sleep;

    #[test]
    fn test_from_config_default() {
        assert_eq!(GenerationTimeout::from_config(None).duration(), DEFAULT_TIMEOUT);
    }

    #[test]
    fn test_from_config_valid() {
        assert_eq!(
            GenerationTimeout::from_config(Some(600)).duration(),
            Duration::from_secs(600)
        );
    }

    #[test]
    fn test_from_config_too_small() {
        assert_eq!(GenerationTimeout::from_config(Some(0)).duration(), MIN_TIMEOUT);
    }

    #[test]
    fn test_from_config_too_large() {
        assert_eq!(GenerationTimeout::from_config(Some(100_000)).duration(), MAX_TIMEOUT);
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_times_out() {
        let timeout = GenerationTimeout::new(Duration::from_secs(1));
        let result = timeout.run(sleep(Duration::from_secs(5))).await;
        assert_eq!(result, Err(Elapsed(Duration::from_secs(1))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_completes_early() {
        let timeout = GenerationTimeout::new(Duration::from_secs(10));
        let result = timeout
            .run(async {
                sleep(Duration::from_millis(50)).await;
                "done"
            })
            .await;
        assert_eq!(result, Ok("done"));
    }

    #[test]
    fn test_constants() {
        assert_eq!(DEFAULT_TIMEOUT, Duration::from_secs(300));
        assert_eq!(MIN_TIMEOUT, Duration::from_secs(1));
        assert_eq!(MAX_TIMEOUT, Duration::from_secs(1800));
        assert_eq!(DEFAULT_STALE_AFTER, Duration::from_secs(900));
    }
}
