pub mod error;
pub mod model;
pub mod sources;

pub use error::AppError;
pub use model::{
    CatalogEntry, DownloadProgress, ListingEntry, MatchResult, ResolutionTask, RunPhase,
    SourceUrl, TaskOutcome,
};
pub use sources::ConsoleSourceSet;
