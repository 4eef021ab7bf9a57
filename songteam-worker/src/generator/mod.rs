/// Song generators
///
/// # Generators
///
/// - **http**: calls the external song engine
/// - **mock**: canned results for tests and local development

pub mod generator_trait;
pub mod http;
pub mod mock;

pub use generator_trait::{
    GeneratedSong, GenerationRequest, GeneratorError, GeneratorResult, SongGenerator,
    SONG_LENGTH_MS,
};
pub use http::HttpSongGenerator;
pub use mock::MockGenerator;
