pub mod catalog;
pub mod download_coordinator;
pub mod matcher;
pub mod pipeline;
pub mod search;

pub use catalog::{Catalog, MirrorFailure, RetryPolicy, SourceAggregator};
pub use download_coordinator::{DownloadCoordinator, DownloadEvent, DownloadOutcome};
pub use matcher::Matcher;
pub use pipeline::{CancelFlag, Pipeline, PipelineEvent, RunRequest, RunSummary};
pub use search::{filter_catalog, SearchOptions};
