pub mod client;
pub mod listing;
pub mod models;

pub use client::{ApiClient, ApiError, Result};
pub use listing::parse_listing;
pub use models::{ApiConfig, Claim, GameHashes, HashResult};
