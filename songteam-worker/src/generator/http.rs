/// HTTP client for the external song engine
///
/// Sends one JSON `POST` per song:
///
/// ```text
/// POST {SONG_GENERATION_API_URL}
/// x-song-engine-secret: {SONG_GENERATION_API_KEY}
///
/// {"songId": "...", "teamName": "...", "genre": "rap",
///  "weekLabel": "1/6/2025 - 1/12/2025", "lyrics": "...", "lengthMs": 90000}
/// ```
///
/// The engine answers with `{"audio_url": "..."}` (older deployments use
/// `audioUrl`; both are accepted).

use super::generator_trait::{
    GeneratedSong, GenerationRequest, GeneratorError, GeneratorResult, SongGenerator,
};
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;

/// Header carrying the shared secret
pub const SECRET_HEADER: &str = "x-song-engine-secret";

#[derive(Debug, Deserialize)]
struct GenerationResponse {
    #[serde(alias = "audioUrl")]
    audio_url: Option<String>,
}

/// Generator backed by the song engine's HTTP API
#[derive(Debug, Clone)]
pub struct HttpSongGenerator {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
}

impl HttpSongGenerator {
    /// Creates a client with a per-request timeout
    ///
    /// # Arguments
    ///
    /// * `endpoint` - Full URL of the generation endpoint
    /// * `api_key` - Shared secret sent in `x-song-engine-secret`
    /// * `timeout` - Upper bound on a single call
    pub fn new(
        endpoint: impl Into<String>,
        api_key: impl Into<String>,
        timeout: Duration,
    ) -> GeneratorResult<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;

        Ok(HttpSongGenerator {
            client,
            endpoint: endpoint.into(),
            api_key: api_key.into(),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

/// Pulls the audio URL out of a 2xx response body
fn extract_audio_url(body: &str) -> GeneratorResult<String> {
    let parsed: GenerationResponse = serde_json::from_str(body)
        .map_err(|e| GeneratorError::Failed(format!("Invalid response from song API: {}", e)))?;

    match parsed.audio_url {
        Some(url) if !url.trim().is_empty() => Ok(url),
        _ => Err(GeneratorError::MissingAudioUrl),
    }
}

#[async_trait]
impl SongGenerator for HttpSongGenerator {
    fn name(&self) -> &str {
        "http"
    }

    async fn generate(&self, request: GenerationRequest) -> GeneratorResult<GeneratedSong> {
        let song_id = request.song_id;

        let response = self
            .client
            .post(&self.endpoint)
            .header(SECRET_HEADER, &self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    GeneratorError::Timeout
                } else {
                    GeneratorError::Request(e)
                }
            })?;

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            tracing::warn!(song_id = %song_id, status = status.as_u16(), "Song API returned an error");
            return Err(GeneratorError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let audio_url = extract_audio_url(&body)?;
        tracing::debug!(song_id = %song_id, "Song API returned audio");

        Ok(GeneratedSong { audio_url })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_snake_case_url() {
        let url = extract_audio_url(r#"{"audio_url":"https://cdn/a.mp3"}"#).unwrap();
        assert_eq!(url, "https://cdn/a.mp3");
    }

    #[test]
    fn test_extract_camel_case_url() {
        let url = extract_audio_url(r#"{"audioUrl":"https://cdn/b.mp3","id":7}"#).unwrap();
        assert_eq!(url, "https://cdn/b.mp3");
    }

    #[test]
    fn test_missing_url_is_an_error() {
        assert!(matches!(
            extract_audio_url(r#"{"status":"ok"}"#),
            Err(GeneratorError::MissingAudioUrl)
        ));
        assert!(matches!(
            extract_audio_url(r#"{"audio_url":"  "}"#),
            Err(GeneratorError::MissingAudioUrl)
        ));
    }

    #[test]
    fn test_non_json_body_is_an_error() {
        assert!(matches!(
            extract_audio_url("<html>"),
            Err(GeneratorError::Failed(_))
        ));
    }

    #[test]
    fn test_new_keeps_endpoint() {
        let generator =
            HttpSongGenerator::new("http://localhost:9000/generate", "secret", Duration::from_secs(5))
                .unwrap();
        assert_eq!(generator.endpoint(), "http://localhost:9000/generate");
        assert_eq!(generator.name(), "http");
    }
}
