//! Enrichment steps, in the order the pipeline runs them.
pub mod metacritic;
pub mod steam;

pub use metacritic::MetacriticStep;
pub use steam::SteamStep;
