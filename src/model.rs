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

//! Shared domain types used across extraction, indexing, and search.

use std::collections::BTreeSet;

use serde::Serialize;
use time::OffsetDateTime;

/// One searchable unit inside a locale index.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexedDocument {
    pub id: String,
    /// Indexed as written, possibly empty. Hits fall back to the id.
    pub title: String,
    pub roles: BTreeSet<String>,
    pub body: String,
}

impl IndexedDocument {
    pub fn new(
        id: impl Into<String>,
        title: impl Into<String>,
        roles: BTreeSet<String>,
        body: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            roles,
            body: body.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RawHit {
    pub id: String,
    pub title: String,
    pub roles: BTreeSet<String>,
    pub snippet: String,
}

/// Engine output before role filtering.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawSearchResult {
    pub total: usize,
    pub hits: Vec<RawHit>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchResultItem {
    pub id: String,
    pub title: String,
    pub snippet: String,
    pub roles: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SearchResult {
    /// Engine-reported match count minus hits dropped by role filtering on
    /// the fetched page. Matches beyond the page are not re-checked.
    pub total_approx: usize,
    pub items: Vec<SearchResultItem>,
}

#[derive(Debug, Clone, Serialize)]
pub struct IndexStats {
    pub locale: String,
    pub doc_count: i64,
    /// RFC 3339 build stamp of the metadata marker.
    pub built_at: Option<String>,
    pub analyzer: Option<String>,
    pub db_size_bytes: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RebuildReport {
    pub documents: usize,
    pub built_at: OffsetDateTime,
}
