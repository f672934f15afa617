//! # juke-rq library interface
//!
//! Request-gateway microservice for the shared venue playlist: walk-up
//! users search the catalog and submit tracks, and every submission runs
//! through the moderation pipeline before it can reach the public
//! playlist. All durable state lives in the two external playlists.

pub mod api;
pub mod error;
pub mod moderation;
pub mod pipeline;
pub mod spotify;

pub use api::{create_router, AppState};
pub use error::{Error, Result};
