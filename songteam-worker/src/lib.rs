//! # SongTeam Worker Library
//!
//! Song generation and its safety net.
//!
//! ## Modules
//!
//! - `generator`: Song engine clients (http, mock)
//! - `pipeline`: Runs a generation and settles the song and its credit
//! - `reaper`: Fails and refunds songs stuck in `generating`
//! - `timeout`: Generation time limits
//! - `config`: Worker binary configuration
//!
//! The API server links this crate to spawn generations right after kickoff;
//! the `songteam-worker` binary runs the reaper.
//!
//! ## Example
//!
//! ```no_run
//! use songteam_worker::generator::{MockGenerator, SongGenerator};
//!
//! let generator = MockGenerator::succeeding();
//! println!("Generator: {}", generator.name());
//! ```

pub mod config;
pub mod generator;
pub mod pipeline;
pub mod reaper;
pub mod timeout;
