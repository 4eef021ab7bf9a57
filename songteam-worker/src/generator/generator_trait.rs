/// Core SongGenerator trait and types
///
/// A generator turns a week's worth of lyrics into an audio file hosted
/// somewhere the web app can link to. The pipeline owns all state changes;
/// generators only talk to the outside world.
///
/// # Contract
///
/// Implementations must:
/// 1. Send the request exactly once (the pipeline does not retry)
/// 2. Return `Ok` only when an audio URL was obtained
/// 3. Map every other outcome to a `GeneratorError` whose message is fit to
///    store on the song
///
/// # Example
///
/// ```no_run
/// use songteam_worker::generator::{GeneratedSong, GenerationRequest, GeneratorResult, SongGenerator};
/// use async_trait::async_trait;
///
/// struct StaticGenerator;
///
/// #[async_trait]
/// impl SongGenerator for StaticGenerator {
///     fn name(&self) -> &str {
///         "static"
///     }
///
///     async fn generate(&self, request: GenerationRequest) -> GeneratorResult<GeneratedSong> {
///         Ok(GeneratedSong {
///             audio_url: format!("https://cdn.example.com/{}.mp3", request.song_id),
///         })
///     }
/// }
/// ```

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use songteam_shared::genre::Genre;
use uuid::Uuid;

/// Length requested from the generation API, in milliseconds
pub const SONG_LENGTH_MS: u32 = 90_000;

/// Generator error types
#[derive(Debug, thiserror::Error)]
pub enum GeneratorError {
    /// Transport-level failure (connect, TLS, body decode)
    #[error("Song API request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The API answered with a non-success status
    #[error("Song API failed ({status}): {body}")]
    Api { status: u16, body: String },

    /// 2xx response without `audio_url`/`audioUrl`
    #[error("Song API response did not include an audio URL")]
    MissingAudioUrl,

    #[error("Song generation timed out")]
    Timeout,

    /// Generator-specific failure
    #[error("Song generation failed: {0}")]
    Failed(String),
}

/// Generator result type alias
pub type GeneratorResult<T> = Result<T, GeneratorError>;

/// Payload sent to the generation API
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationRequest {
    pub song_id: Uuid,
    pub team_name: String,
    pub genre: Genre,
    /// `M/D/YYYY - M/D/YYYY`
    pub week_label: String,
    pub lyrics: String,
    pub length_ms: u32,
}

/// Successful generation result
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedSong {
    pub audio_url: String,
}

/// Song generator trait
///
/// Implemented by the HTTP client used in production and by
/// [`super::MockGenerator`] in tests and local development.
#[async_trait]
pub trait SongGenerator: Send + Sync {
    /// Short name used in logs
    fn name(&self) -> &str;

    /// Generates audio for the request
    ///
    /// # Errors
    ///
    /// Any failure; the message ends up in `songs.error_message`.
    async fn generate(&self, request: GenerationRequest) -> GeneratorResult<GeneratedSong>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_serializes_camel_case() {
        let request = GenerationRequest {
            song_id: Uuid::nil(),
            team_name: "Ops".to_string(),
            genre: Genre::HypeAnnouncer,
            week_label: "1/6/2025 - 1/12/2025".to_string(),
            lyrics: "Shipped it".to_string(),
            length_ms: SONG_LENGTH_MS,
        };

        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["songId"], Uuid::nil().to_string());
        assert_eq!(json["teamName"], "Ops");
        assert_eq!(json["genre"], "hype_announcer");
        assert_eq!(json["weekLabel"], "1/6/2025 - 1/12/2025");
        assert_eq!(json["lengthMs"], 90_000);
    }

    #[test]
    fn test_error_messages() {
        let err = GeneratorError::Api {
            status: 502,
            body: "bad gateway".to_string(),
        };
        assert_eq!(err.to_string(), "Song API failed (502): bad gateway");
        assert_eq!(GeneratorError::Timeout.to_string(), "Song generation timed out");
    }
}
