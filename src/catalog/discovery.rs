//! Discovery driver: pages candidates out of a [`DiscoverySource`] and merges
//! them into the store, one query at a time.
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use tracing::{info, warn};

use super::merge::{merge_discovered, Discovered, MergeStats};
use super::store::{EntityStore, SnapshotError, SnapshotFile};
use crate::util::pace::pause;

/// One search or list page a source knows how to walk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveryQuery {
    pub label: String,
    /// Source-specific address (tag combination, list URL, ...).
    pub locator: String,
    /// Provenance tag stamped on every candidate from this query.
    pub source_tag: String,
    /// Stop paging once this many new games were created.
    pub target: Option<usize>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiscoveryPage {
    pub candidates: Vec<Discovered>,
    /// Cursor for the following page; `None` when the query is exhausted.
    pub next: Option<usize>,
}

#[async_trait]
pub trait DiscoverySource: Send + Sync {
    fn name(&self) -> &str;

    async fn queries(&self) -> Result<Vec<DiscoveryQuery>>;

    async fn fetch_page(&self, query: &DiscoveryQuery, cursor: usize) -> Result<DiscoveryPage>;

    /// Cursor to continue from when the page at `cursor` failed. `None`
    /// ends the query; sources whose pages can't be addressed blind keep it.
    fn resume_after_failure(&self, _query: &DiscoveryQuery, _cursor: usize) -> Option<usize> {
        None
    }
}

/// Consecutive failed pages after which a query is abandoned.
pub const MAX_CONSECUTIVE_PAGE_FAILURES: usize = 3;

#[derive(Debug, Clone, Copy, Default)]
pub struct DiscoveryPacing {
    pub page_delay: Duration,
    pub query_delay: Duration,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiscoveryReport {
    pub source: String,
    pub queries: usize,
    pub pages: usize,
    pub failed_pages: usize,
    pub merge: MergeStats,
}

/// Walk every query of `source`, merging as pages arrive.
///
/// A failed page is logged and contributes nothing; paging resumes where the
/// source says it can, otherwise the query ends. The store is checkpointed
/// after each query; only snapshot errors propagate.
pub async fn discover_from(
    source: &dyn DiscoverySource,
    store: &mut EntityStore,
    snapshot: &SnapshotFile,
    pacing: &DiscoveryPacing,
) -> Result<DiscoveryReport, SnapshotError> {
    let mut report = DiscoveryReport {
        source: source.name().to_string(),
        ..Default::default()
    };
    let queries = match source.queries().await {
        Ok(q) => q,
        Err(e) => {
            warn!(source = source.name(), error = %e, "discovery: could not list queries");
            Vec::new()
        }
    };
    info!(source = source.name(), queries = queries.len(), "discovery: starting");
    let before = store.len();

    for (idx, query) in queries.iter().enumerate() {
        if idx > 0 {
            pause(pacing.query_delay).await;
        }
        report.queries += 1;
        let mut created_here = 0usize;
        let mut cursor = 0usize;
        let mut failures_in_row = 0usize;
        loop {
            if query.target.is_some_and(|t| created_here >= t) {
                break;
            }
            let page = match source.fetch_page(query, cursor).await {
                Ok(page) => {
                    failures_in_row = 0;
                    page
                }
                Err(e) => {
                    report.failed_pages += 1;
                    failures_in_row += 1;
                    let resume = source
                        .resume_after_failure(query, cursor)
                        .filter(|&next| next > cursor)
                        .filter(|_| failures_in_row < MAX_CONSECUTIVE_PAGE_FAILURES);
                    warn!(
                        source = source.name(),
                        query = %query.label,
                        cursor,
                        resume = ?resume,
                        error = %e,
                        "discovery: page fetch failed"
                    );
                    match resume {
                        Some(next) => {
                            cursor = next;
                            pause(pacing.page_delay).await;
                            continue;
                        }
                        None => break,
                    }
                }
            };
            report.pages += 1;
            if page.candidates.is_empty() {
                break;
            }
            let found = page.candidates.len();
            let stats = merge_discovered(store, page.candidates);
            created_here += stats.created;
            report.merge.absorb(stats);
            info!(
                source = source.name(),
                query = %query.label,
                found,
                new_in_query = created_here,
                total = store.len(),
                "discovery: page merged"
            );

            if query.target.is_some_and(|t| created_here >= t) {
                break;
            }
            match page.next {
                Some(next) if next > cursor => cursor = next,
                _ => break,
            }
            pause(pacing.page_delay).await;
        }
        snapshot.save(store)?;
    }

    info!(
        source = source.name(),
        added = store.len() - before,
        total = store.len(),
        failed_pages = report.failed_pages,
        "discovery: complete"
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// Canned pages keyed by (locator, cursor); a missing key is a fetch error.
    struct CannedSource {
        queries: Vec<DiscoveryQuery>,
        pages: HashMap<(String, usize), DiscoveryPage>,
        calls: Mutex<Vec<(String, usize)>>,
        /// Offset step to resume with after a failed page.
        skip: Option<usize>,
    }

    impl CannedSource {
        fn new(queries: Vec<DiscoveryQuery>) -> Self {
            Self {
                queries,
                pages: HashMap::new(),
                calls: Mutex::new(Vec::new()),
                skip: None,
            }
        }

        fn skipping(mut self, step: usize) -> Self {
            self.skip = Some(step);
            self
        }

        fn page(mut self, locator: &str, cursor: usize, ids: &[u32], next: Option<usize>) -> Self {
            let candidates = ids
                .iter()
                .map(|&id| Discovered::new(id, format!("Game {id}"), format!("tag:{locator}")))
                .collect();
            self.pages
                .insert((locator.to_string(), cursor), DiscoveryPage { candidates, next });
            self
        }
    }

    #[async_trait]
    impl DiscoverySource for CannedSource {
        fn name(&self) -> &str {
            "canned"
        }

        async fn queries(&self) -> Result<Vec<DiscoveryQuery>> {
            Ok(self.queries.clone())
        }

        async fn fetch_page(&self, query: &DiscoveryQuery, cursor: usize) -> Result<DiscoveryPage> {
            self.calls
                .lock()
                .unwrap()
                .push((query.locator.clone(), cursor));
            self.pages
                .get(&(query.locator.clone(), cursor))
                .cloned()
                .ok_or_else(|| anyhow::anyhow!("HTTP 503"))
        }

        fn resume_after_failure(&self, _query: &DiscoveryQuery, cursor: usize) -> Option<usize> {
            self.skip.map(|step| cursor + step)
        }
    }

    fn query(locator: &str, target: Option<usize>) -> DiscoveryQuery {
        DiscoveryQuery {
            label: locator.to_uppercase(),
            locator: locator.to_string(),
            source_tag: format!("tag:{locator}"),
            target,
        }
    }

    fn snapshot() -> (tempfile::TempDir, SnapshotFile) {
        let dir = tempfile::tempdir().unwrap();
        let snap = SnapshotFile::new(dir.path().join("games.json"));
        (dir, snap)
    }

    #[tokio::test]
    async fn pages_until_exhausted_and_checkpoints() {
        let source = CannedSource::new(vec![query("a", None)])
            .page("a", 0, &[1, 2], Some(2))
            .page("a", 2, &[3], None);
        let (_dir, snap) = snapshot();
        let mut store = EntityStore::new();

        let report = discover_from(&source, &mut store, &snap, &DiscoveryPacing::default())
            .await
            .unwrap();

        assert_eq!(report.pages, 2);
        assert_eq!(report.merge.created, 3);
        assert_eq!(snap.load().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn stops_at_target_of_new_games() {
        let source = CannedSource::new(vec![query("a", Some(2))])
            .page("a", 0, &[1, 2], Some(2))
            .page("a", 2, &[3, 4], None);
        let (_dir, snap) = snapshot();
        let mut store = EntityStore::new();

        discover_from(&source, &mut store, &snap, &DiscoveryPacing::default())
            .await
            .unwrap();

        assert_eq!(store.len(), 2);
        assert_eq!(source.calls.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn zero_target_fetches_nothing() {
        let source = CannedSource::new(vec![query("a", Some(0))]).page("a", 0, &[1, 2, 3], None);
        let (_dir, snap) = snapshot();
        let mut store = EntityStore::new();

        let report = discover_from(&source, &mut store, &snap, &DiscoveryPacing::default())
            .await
            .unwrap();

        assert!(store.is_empty());
        assert!(source.calls.lock().unwrap().is_empty());
        assert_eq!(report.pages, 0);
    }

    #[tokio::test]
    async fn failed_page_is_skipped_when_source_can_resume() {
        let source = CannedSource::new(vec![query("a", None)])
            .skipping(2)
            .page("a", 0, &[1, 2], Some(2))
            .page("a", 4, &[5], None);
        let (_dir, snap) = snapshot();
        let mut store = EntityStore::new();

        let report = discover_from(&source, &mut store, &snap, &DiscoveryPacing::default())
            .await
            .unwrap();

        assert_eq!(report.failed_pages, 1);
        let ids: Vec<u32> = store.iter().map(|g| g.steam_app_id).collect();
        assert_eq!(ids, vec![1, 2, 5]);
    }

    #[tokio::test]
    async fn persistent_failures_abandon_the_query() {
        let source = CannedSource::new(vec![query("down", None)]).skipping(50);
        let (_dir, snap) = snapshot();
        let mut store = EntityStore::new();

        let report = discover_from(&source, &mut store, &snap, &DiscoveryPacing::default())
            .await
            .unwrap();

        assert_eq!(report.failed_pages, MAX_CONSECUTIVE_PAGE_FAILURES);
        let cursors: Vec<usize> = source.calls.lock().unwrap().iter().map(|c| c.1).collect();
        assert_eq!(cursors, vec![0, 50, 100]);
    }

    #[tokio::test]
    async fn checkpoint_failure_is_fatal() {
        let source = CannedSource::new(vec![query("a", None)]).page("a", 0, &[1], None);
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("games.json");
        std::fs::create_dir(path.with_extension("json.tmp")).unwrap();
        let snap = SnapshotFile::new(&path);
        let mut store = EntityStore::new();

        let err = discover_from(&source, &mut store, &snap, &DiscoveryPacing::default())
            .await
            .unwrap_err();

        assert!(matches!(err, SnapshotError::Write { .. }));
    }

    #[tokio::test]
    async fn failed_page_does_not_stop_other_queries() {
        let source = CannedSource::new(vec![query("broken", None), query("b", None)])
            .page("b", 0, &[10, 11], None);
        let (_dir, snap) = snapshot();
        let mut store = EntityStore::new();

        let report = discover_from(&source, &mut store, &snap, &DiscoveryPacing::default())
            .await
            .unwrap();

        assert_eq!(report.failed_pages, 1);
        assert_eq!(report.queries, 2);
        assert_eq!(store.len(), 2);
    }

    #[tokio::test]
    async fn overlapping_queries_merge_provenance() {
        let source = CannedSource::new(vec![query("a", None), query("b", None)])
            .page("a", 0, &[1, 2], None)
            .page("b", 0, &[2, 3], None);
        let (_dir, snap) = snapshot();
        let mut store = EntityStore::new();

        let report = discover_from(&source, &mut store, &snap, &DiscoveryPacing::default())
            .await
            .unwrap();

        assert_eq!(store.len(), 3);
        assert_eq!(report.merge.sources_added, 1);
        assert_eq!(store.get(2).unwrap().sources, vec!["tag:a", "tag:b"]);
    }
}
