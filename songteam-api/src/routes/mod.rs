/// API route handlers
///
/// This module contains all route handlers organized by resource:
///
/// - `health`: Health check endpoint
/// - `teams`: Team creation, join codes and membership
/// - `accomplishments`: Logging the wins songs are written from
/// - `songs`: Song generation and status
/// - `credits`: Balance and ledger history
/// - `billing`: Stripe checkout and webhook
/// - `admin`: Manual credit grants

pub mod accomplishments;
pub mod admin;
pub mod billing;
pub mod credits;
pub mod health;
pub mod songs;
pub mod teams;
