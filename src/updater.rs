// Copyright 2026 Storysearch Authors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Staleness-aware rebuild of locale indexes from a content source.

use std::sync::Arc;

use anyhow::Context;
use anyhow::Result;
use tracing::debug;
use tracing::info;

use crate::extract::ContentExtractor;
use crate::source::ContentSource;
use crate::store::IndexStore;

pub struct IndexUpdater {
    source: Arc<dyn ContentSource>,
    extractor: Arc<dyn ContentExtractor>,
    store: Arc<IndexStore>,
}

impl IndexUpdater {
    pub fn new(
        source: Arc<dyn ContentSource>,
        extractor: Arc<dyn ContentExtractor>,
        store: Arc<IndexStore>,
    ) -> Self {
        Self {
            source,
            extractor,
            store,
        }
    }

    pub fn source(&self) -> &Arc<dyn ContentSource> {
        &self.source
    }

    pub fn store(&self) -> &Arc<IndexStore> {
        &self.store
    }

    /// Rebuilds the locale index when the source has content newer than the
    /// last build. Returns the number of documents written, or `None` when
    /// the index was already current.
    ///
    /// Only the newest modification time is compared, so a deletion that
    /// does not touch any other item goes unnoticed until the next change.
    pub fn update_index(&self, locale: &str) -> Result<Option<usize>> {
        info!(locale = %locale, "checking index freshness");
        let summaries = self
            .source
            .list_summaries(locale)
            .with_context(|| format!("list content for {locale}"))?;
        let latest_source = summaries.iter().filter_map(|s| s.last_modified).max();
        let latest_indexed = self.store.built_at(locale);
        if let (Some(indexed), Some(source)) = (latest_indexed, latest_source) {
            if indexed >= source {
                info!(locale = %locale, %indexed, %source, "index is current, skipping rebuild");
                return Ok(None);
            }
        }

        let mut docs = Vec::with_capacity(summaries.len());
        for summary in &summaries {
            if summary.id.trim().is_empty() {
                debug!(locale = %locale, "content without a slug, skipping");
                continue;
            }
            let loaded = self
                .source
                .load_content(locale, &summary.id)
                .with_context(|| format!("load {} ({locale})", summary.id))?;
            match loaded {
                Some(content) => docs.push(self.extractor.extract(&content)),
                None => debug!(locale = %locale, id = %summary.id, "content no longer resolves, skipping"),
            }
        }
        let report = self.store.rebuild(locale, &docs)?;
        info!(locale = %locale, docs = report.documents, "index update complete");
        Ok(Some(report.documents))
    }

    /// Removes the locale index so the next update rebuilds it.
    pub fn delete_index(&self, locale: &str) -> Result<bool> {
        self.source.invalidate(locale);
        self.store.delete(locale)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::atomic::AtomicUsize;
    use std::sync::atomic::Ordering;

    use parking_lot::Mutex;
    use serde_json::json;
    use tempfile::tempdir;
    use time::OffsetDateTime;

    use super::*;
    use crate::component::ComponentRegistry;
    use crate::extract::DefaultExtractor;
    use crate::source::ContentDocument;
    use crate::source::ContentSummary;
    use crate::store::FieldWeights;

    #[derive(Default)]
    struct MemorySource {
        items: Mutex<HashMap<String, (OffsetDateTime, String)>>,
        missing: Mutex<Vec<String>>,
        loads: AtomicUsize,
        fail: Mutex<bool>,
    }

    impl MemorySource {
        fn put(&self, id: &str, text: &str, modified: OffsetDateTime) {
            self.items
                .lock()
                .insert(id.to_string(), (modified, text.to_string()));
        }
    }

    impl ContentSource for MemorySource {
        fn list_summaries(&self, _locale: &str) -> Result<Vec<ContentSummary>> {
            if *self.fail.lock() {
                anyhow::bail!("upstream unavailable");
            }
            let mut summaries: Vec<ContentSummary> = self
                .items
                .lock()
                .iter()
                .map(|(id, (modified, _))| ContentSummary {
                    id: id.clone(),
                    last_modified: Some(*modified),
                })
                .collect();
            summaries.sort_by(|a, b| a.id.cmp(&b.id));
            Ok(summaries)
        }

        fn load_content(&self, _locale: &str, id: &str) -> Result<Option<ContentDocument>> {
            self.loads.fetch_add(1, Ordering::SeqCst);
            if self.missing.lock().iter().any(|m| m == id) {
                return Ok(None);
            }
            let items = self.items.lock();
            let Some((_, text)) = items.get(id) else {
                return Ok(None);
            };
            let content = json!({"component": "text", "content": text});
            Ok(Some(ContentDocument {
                id: id.to_string(),
                name: id.to_string(),
                slug: id.to_string(),
                lang: "default".to_string(),
                tag_list: Vec::new(),
                published_at: None,
                content: ComponentRegistry::standard().parse(&content),
                raw: json!({"content": content}),
            }))
        }
    }

    fn updater(source: Arc<MemorySource>, root: &std::path::Path) -> IndexUpdater {
        IndexUpdater::new(
            source,
            Arc::new(DefaultExtractor),
            Arc::new(IndexStore::new(root, FieldWeights::default())),
        )
    }

    fn past(hours: i64) -> OffsetDateTime {
        OffsetDateTime::now_utc() - time::Duration::hours(hours)
    }

    #[test]
    fn second_update_without_changes_is_skipped() -> Result<()> {
        let dir = tempdir()?;
        let source = Arc::new(MemorySource::default());
        source.put("a", "alpha", past(2));
        source.put("b", "beta", past(1));
        let updater = updater(Arc::clone(&source), dir.path());

        assert_eq!(updater.update_index("en")?, Some(2));
        let loads = source.loads.load(Ordering::SeqCst);
        assert_eq!(updater.update_index("en")?, None);
        assert_eq!(source.loads.load(Ordering::SeqCst), loads);
        Ok(())
    }

    #[test]
    fn newer_source_content_triggers_rebuild() -> Result<()> {
        let dir = tempdir()?;
        let source = Arc::new(MemorySource::default());
        source.put("a", "alpha", past(2));
        let updater = updater(Arc::clone(&source), dir.path());
        assert_eq!(updater.update_index("en")?, Some(1));

        source.put("b", "beta", OffsetDateTime::now_utc() + time::Duration::minutes(5));
        assert_eq!(updater.update_index("en")?, Some(2));
        assert_eq!(updater.store().query("en", "beta", 10, 300)?.total, 1);
        Ok(())
    }

    #[test]
    fn unresolvable_documents_are_skipped() -> Result<()> {
        let dir = tempdir()?;
        let source = Arc::new(MemorySource::default());
        source.put("a", "alpha", past(2));
        source.put("gone", "ghost", past(1));
        source.missing.lock().push("gone".to_string());
        let updater = updater(Arc::clone(&source), dir.path());
        assert_eq!(updater.update_index("en")?, Some(1));
        assert_eq!(updater.store().query("en", "ghost", 10, 300)?.total, 0);
        Ok(())
    }

    #[test]
    fn slugless_content_is_skipped() -> Result<()> {
        let dir = tempdir()?;
        let source = Arc::new(MemorySource::default());
        source.put("", "orphan", past(2));
        source.put("  ", "stray", past(2));
        source.put("a", "alpha", past(1));
        let updater = updater(Arc::clone(&source), dir.path());
        assert_eq!(updater.update_index("en")?, Some(1));
        assert_eq!(source.loads.load(Ordering::SeqCst), 1);
        let store = updater.store();
        assert_eq!(store.query("en", "orphan", 10, 300)?.total, 0);
        assert_eq!(store.query("en", "stray", 10, 300)?.total, 0);
        let hits = store.query("en", "alpha", 10, 300)?.hits;
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, "a");
        Ok(())
    }

    #[test]
    fn empty_source_still_builds_an_empty_index() -> Result<()> {
        let dir = tempdir()?;
        let source = Arc::new(MemorySource::default());
        let updater = updater(source, dir.path());
        assert_eq!(updater.update_index("en")?, Some(0));
        assert!(updater.store().built_at("en").is_some());
        assert_eq!(updater.update_index("en")?, Some(0));
        Ok(())
    }

    #[test]
    fn source_failure_propagates_and_keeps_old_index() -> Result<()> {
        let dir = tempdir()?;
        let source = Arc::new(MemorySource::default());
        source.put("a", "alpha", past(2));
        let updater = updater(Arc::clone(&source), dir.path());
        updater.update_index("en")?;
        *source.fail.lock() = true;
        assert!(updater.update_index("en").is_err());
        assert_eq!(updater.store().query("en", "alpha", 10, 300)?.total, 1);
        Ok(())
    }

    #[test]
    fn delete_forces_next_rebuild() -> Result<()> {
        let dir = tempdir()?;
        let source = Arc::new(MemorySource::default());
        source.put("a", "alpha", past(2));
        let updater = updater(Arc::clone(&source), dir.path());
        updater.update_index("en")?;
        assert!(updater.delete_index("en")?);
        assert!(!updater.delete_index("en")?);
        assert_eq!(updater.update_index("en")?, Some(1));
        Ok(())
    }
}
