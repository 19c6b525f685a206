use chrono::Utc;
use tracing::debug;

use super::model::GameRecord;
use super::store::EntityStore;

/// One candidate surfaced by a discovery source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Discovered {
    pub app_id: u32,
    pub name: String,
    pub source: String,
}

impl Discovered {
    pub fn new(app_id: u32, name: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            app_id,
            name: name.into(),
            source: source.into(),
        }
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct MergeStats {
    /// Records created by this merge.
    pub created: usize,
    /// Candidates whose id was already known.
    pub rediscovered: usize,
    /// Provenance tags appended to known records.
    pub sources_added: usize,
}

impl MergeStats {
    pub fn absorb(&mut self, other: MergeStats) {
        self.created += other.created;
        self.rediscovered += other.rediscovered;
        self.sources_added += other.sources_added;
    }
}

/// Merge discovered candidates into the store.
///
/// Unknown ids become new records with every step pending. Known ids only
/// gain the candidate's source tag; their name and descriptive fields are
/// left alone.
pub fn merge_discovered<I>(store: &mut EntityStore, candidates: I) -> MergeStats
where
    I: IntoIterator<Item = Discovered>,
{
    let mut stats = MergeStats::default();
    for Discovered {
        app_id,
        name,
        source,
    } in candidates
    {
        match store.get_mut(app_id) {
            Some(existing) => {
                stats.rediscovered += 1;
                if existing.add_source(&source) {
                    stats.sources_added += 1;
                    debug!(app_id, source = %source, "new source for known game");
                }
            }
            None => {
                store.insert_new(GameRecord::new(app_id, name, source, Utc::now()));
                stats.created += 1;
            }
        }
    }
    stats
}
