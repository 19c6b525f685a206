//! Game catalog state: records, the entity store, and discovery merging.
pub mod discovery;
pub mod merge;
pub mod model;
pub mod store;

pub use discovery::{
    discover_from, DiscoveryPacing, DiscoveryPage, DiscoveryQuery, DiscoveryReport, DiscoverySource,
};
pub use merge::{merge_discovered, Discovered, MergeStats};
pub use model::{GameRecord, StepName, StepOutcome, StepResult, StepStatus};
pub use store::{EntityStore, SnapshotError, SnapshotFile};
