//! # SongTeam API Server Library
//!
//! Router, handlers and the pieces they share.
//!
//! ## Modules
//!
//! - `app`: Application state and router builder
//! - `config`: Configuration management
//! - `error`: Error handling and HTTP response mapping
//! - `middleware`: Security headers and rate limiting
//! - `routes`: API route handlers
//! - `stripe`: Stripe checkout client and webhook signatures

pub mod app;
pub mod config;
pub mod error;
pub mod middleware;
pub mod routes;
pub mod stripe;
