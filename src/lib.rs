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

//! Per-locale full-text indexes over CMS content with role-aware search.

pub mod analysis;
pub mod cache;
pub mod component;
pub mod config;
pub mod context;
pub mod extract;
pub mod markdown;
pub mod model;
pub mod output;
pub mod query;
pub mod scheduler;
pub mod search;
pub mod snippet;
pub mod source;
pub mod store;
pub mod storyblok;
pub mod updater;

pub use crate::extract::ContentExtractor;
pub use crate::model::SearchResult;
pub use crate::model::SearchResultItem;
pub use crate::scheduler::IndexScheduler;
pub use crate::search::Searcher;
pub use crate::source::ContentSource;
pub use crate::store::IndexStore;
pub use crate::updater::IndexUpdater;
