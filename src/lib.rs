//! Turn-based and card game catalog: discovery from Steam search and curated
//! lists, per-step enrichment with resumable status tracking, CSV export.
pub mod catalog;
pub mod config;
pub mod export;
pub mod logging;
pub mod pipeline;
pub mod providers;
pub mod steps;

pub mod normalization {
    pub mod text;
}

pub mod util {
    pub mod env;
    pub mod pace;
}

pub use catalog::{EntityStore, GameRecord, SnapshotFile, StepName, StepOutcome, StepStatus};
pub use config::CatalogConfig;
pub use pipeline::{Pipeline, PipelineOptions, PipelineSummary, RetryPolicy};
