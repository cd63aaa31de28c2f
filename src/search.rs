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

//! Query facade: ranked search with role filtering.

use std::collections::BTreeSet;
use std::sync::Arc;

use tracing::debug;
use tracing::error;

use crate::model::RawHit;
use crate::model::SearchResult;
use crate::model::SearchResultItem;
use crate::snippet::DEFAULT_SNIPPET_CHARS;
use crate::store::IndexStore;

#[derive(Debug, Clone)]
pub struct Searcher {
    store: Arc<IndexStore>,
    snippet_chars: usize,
}

impl Searcher {
    pub fn new(store: Arc<IndexStore>) -> Self {
        Self {
            store,
            snippet_chars: DEFAULT_SNIPPET_CHARS,
        }
    }

    pub fn with_snippet_chars(mut self, snippet_chars: usize) -> Self {
        self.snippet_chars = snippet_chars;
        self
    }

    /// Searches `locale` as a caller holding `caller_roles`.
    ///
    /// A hit is kept when all of its roles are held by the caller (compared
    /// case-insensitively); roleless hits are always kept. Each dropped hit
    /// lowers `total_approx` by one. Hits beyond `limit` are not inspected,
    /// so the total stays approximate under filtering. Failures are logged
    /// and reported as an empty result.
    pub fn search(
        &self,
        locale: &str,
        text: &str,
        caller_roles: &[String],
        limit: usize,
    ) -> SearchResult {
        let raw = match self
            .store
            .query(locale, text, limit.max(1), self.snippet_chars)
        {
            Ok(raw) => raw,
            Err(err) => {
                error!(locale = %locale, query = %text, error = %format!("{err:#}"), "search failed");
                return SearchResult::default();
            }
        };
        let held: BTreeSet<String> = caller_roles.iter().map(|r| r.to_lowercase()).collect();
        let mut dropped = 0usize;
        let mut items = Vec::with_capacity(raw.hits.len());
        for hit in raw.hits {
            if visible(&hit, &held) {
                items.push(SearchResultItem {
                    id: hit.id,
                    title: hit.title,
                    snippet: hit.snippet,
                    roles: hit.roles.into_iter().collect(),
                });
            } else {
                dropped += 1;
            }
        }
        let total_approx = raw.total.saturating_sub(dropped).max(items.len());
        debug!(locale = %locale, query = %text, total = raw.total, dropped, "search complete");
        SearchResult {
            total_approx,
            items,
        }
    }

    /// Search as an anonymous caller.
    pub fn search_public(&self, locale: &str, text: &str, limit: usize) -> SearchResult {
        self.search(locale, text, &[], limit)
    }
}

fn visible(hit: &RawHit, held: &BTreeSet<String>) -> bool {
    hit.roles
        .iter()
        .all(|role| held.contains(&role.to_lowercase()))
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use anyhow::Result;
    use tempfile::tempdir;

    use super::*;
    use crate::model::IndexedDocument;
    use crate::store::FieldWeights;

    fn doc(id: &str, body: &str, roles: &[&str]) -> IndexedDocument {
        IndexedDocument::new(
            id,
            "",
            roles.iter().map(|r| r.to_string()).collect::<BTreeSet<_>>(),
            body,
        )
    }

    fn searcher(docs: &[IndexedDocument]) -> Result<(tempfile::TempDir, Searcher)> {
        let dir = tempdir()?;
        let store = Arc::new(IndexStore::new(dir.path(), FieldWeights::default()));
        store.rebuild("en", docs)?;
        Ok((dir, Searcher::new(store)))
    }

    fn roles(names: &[&str]) -> Vec<String> {
        names.iter().map(|n| n.to_string()).collect()
    }

    fn ids(result: &SearchResult) -> BTreeSet<String> {
        result.items.iter().map(|i| i.id.clone()).collect()
    }

    #[test]
    fn role_tagged_hits_need_every_role() -> Result<()> {
        let (_dir, searcher) = searcher(&[
            doc("public", "topic", &[]),
            doc("staff", "topic", &["staff"]),
            doc("both", "topic", &["staff", "admin"]),
        ])?;
        let anonymous = searcher.search_public("en", "topic", 10);
        assert_eq!(ids(&anonymous), BTreeSet::from(["public".to_string()]));
        assert_eq!(anonymous.total_approx, 1);

        let staff = searcher.search("en", "topic", &roles(&["STAFF"]), 10);
        assert_eq!(
            ids(&staff),
            BTreeSet::from(["public".to_string(), "staff".to_string()])
        );
        assert_eq!(staff.total_approx, 2);

        let all = searcher.search("en", "topic", &roles(&["staff", "admin"]), 10);
        assert_eq!(all.items.len(), 3);
        assert_eq!(all.total_approx, 3);
        Ok(())
    }

    #[test]
    fn more_roles_never_hide_results() -> Result<()> {
        let (_dir, searcher) = searcher(&[
            doc("a", "shared", &["x"]),
            doc("b", "shared", &["y"]),
            doc("c", "shared", &[]),
            doc("d", "shared", &["x", "y"]),
        ])?;
        let sets: [&[&str]; 4] = [&[], &["x"], &["y"], &["x", "y"]];
        for narrow in sets {
            for extra in sets {
                let mut wide = narrow.to_vec();
                wide.extend_from_slice(extra);
                let small = searcher.search("en", "shared", &roles(narrow), 10);
                let large = searcher.search("en", "shared", &roles(&wide), 10);
                assert!(ids(&small).is_subset(&ids(&large)));
                assert!(small.total_approx >= small.items.len());
            }
        }
        Ok(())
    }

    #[test]
    fn count_correction_only_covers_the_fetched_page() -> Result<()> {
        let (_dir, searcher) = searcher(&[
            doc("open-1", "word", &[]),
            doc("closed-1", "word", &["staff"]),
            doc("closed-2", "word", &["staff"]),
        ])?;
        let page = searcher.search_public("en", "word", 2);
        assert_eq!(page.items.len(), 1);
        assert_eq!(page.total_approx, 2);
        Ok(())
    }

    #[test]
    fn failures_become_empty_results() -> Result<()> {
        let dir = tempdir()?;
        let store = Arc::new(IndexStore::new(dir.path(), FieldWeights::default()));
        std::fs::write(store.index_path("en"), vec![b'x'; 4096])?;
        let searcher = Searcher::new(store);
        let result = searcher.search_public("en", "anything", 10);
        assert_eq!(result, SearchResult::default());
        assert_eq!(searcher.search_public("de", "\"unbalanced", 0), SearchResult::default());
        Ok(())
    }
}
