/// Mock generator for tests and local development
///
/// Returns a canned outcome after an optional delay and remembers every
/// request it saw, so tests can assert on what would have been sent to the
/// song engine.
///
/// # Example
///
/// ```no_run
/// use songteam_worker::generator::{MockGenerator, SongGenerator};
///
/// let ok = MockGenerator::succeeding();
/// let broken = MockGenerator::failing("engine offline");
/// assert_eq!(ok.name(), "mock");
/// # let _ = broken;
/// ```

use super::generator_trait::{
    GeneratedSong, GenerationRequest, GeneratorError, GeneratorResult, SongGenerator,
};
use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Debug, Clone)]
enum Outcome {
    Succeed,
    Fail(String),
    MissingUrl,
}

/// Mock generator
#[derive(Debug, Clone)]
pub struct MockGenerator {
    outcome: Outcome,
    delay: Duration,
    calls: Arc<Mutex<Vec<GenerationRequest>>>,
}

impl MockGenerator {
    /// Always succeeds with `https://mock.songteam.local/<song id>.mp3`
    pub fn succeeding() -> Self {
        MockGenerator {
            outcome: Outcome::Succeed,
            delay: Duration::ZERO,
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Always fails with the given message
    pub fn failing(message: impl Into<String>) -> Self {
        MockGenerator {
            outcome: Outcome::Fail(message.into()),
            ..MockGenerator::succeeding()
        }
    }

    /// Answers 2xx without an audio URL
    pub fn missing_url() -> Self {
        MockGenerator {
            outcome: Outcome::MissingUrl,
            ..MockGenerator::succeeding()
        }
    }

    /// Sleeps before answering
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Requests received so far
    pub fn calls(&self) -> Vec<GenerationRequest> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }
}

impl Default for MockGenerator {
    fn default() -> Self {
        MockGenerator::succeeding()
    }
}

#[async_trait]
impl SongGenerator for MockGenerator {
    fn name(&self) -> &str {
        "mock"
    }

    async fn generate(&self, request: GenerationRequest) -> GeneratorResult<GeneratedSong> {
        let song_id = request.song_id;
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(request);
        }

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        match &self.outcome {
            Outcome::Succeed => Ok(GeneratedSong {
                audio_url: format!("https://mock.songteam.local/{}.mp3", song_id),
            }),
            Outcome::Fail(message) => Err(GeneratorError::Failed(message.clone())),
            Outcome::MissingUrl => Err(GeneratorError::MissingAudioUrl),
        }
    }
}
