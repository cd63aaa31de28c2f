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

//! Flattens a content document into an [`IndexedDocument`].
//!
//! The default walk recurses through containers in document order and
//! appends leaf text to a [`TextBuffer`]. Extractors override individual hooks
//! (`title`, `roles`, `visit`) and keep the rest.

use std::collections::BTreeSet;
use std::collections::HashMap;

use serde_json::Value;

use crate::component::Component;
use crate::markdown::strip_markdown;
use crate::model::IndexedDocument;
use crate::source::ContentDocument;

/// Line-separated plain text accumulator.
#[derive(Debug, Default, Clone)]
pub struct TextBuffer {
    text: String,
}

impl TextBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, fragment: &str) {
        let fragment = fragment.trim();
        if fragment.is_empty() {
            return;
        }
        if !self.text.is_empty() {
            self.text.push('\n');
        }
        self.text.push_str(fragment);
    }

    pub fn push_markdown(&mut self, markdown: &str) {
        self.push(&strip_markdown(markdown));
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    pub fn into_string(self) -> String {
        self.text
    }
}

/// Appends the text of `component` and its descendants to `out`.
pub fn walk(component: &Component, out: &mut TextBuffer) {
    walk_with(component, out, &|child, out| walk(child, out));
}

fn walk_with(
    component: &Component,
    out: &mut TextBuffer,
    visit: &dyn Fn(&Component, &mut TextBuffer),
) {
    match component {
        Component::Page { children }
        | Component::Section { children }
        | Component::Container { children, .. } => {
            for child in children {
                visit(child, out);
            }
        }
        Component::Grid { left, right } => {
            for child in left.iter().chain(right) {
                visit(child, out);
            }
        }
        Component::Table(table) => {
            for cell in table.header.iter().chain(table.rows.iter().flatten()) {
                out.push_markdown(cell);
            }
        }
        Component::Text { markdown } => out.push_markdown(markdown),
        Component::Teaser { headline } => out.push(headline),
        Component::Fields { texts, .. } => {
            for text in texts {
                out.push_markdown(text);
            }
        }
        Component::Unknown { .. } => {}
    }
}

pub trait ContentExtractor: Send + Sync {
    fn title(&self, doc: &ContentDocument) -> String {
        doc.name.clone()
    }

    /// Role tags required to see `doc`; empty means public.
    fn roles(&self, _doc: &ContentDocument) -> BTreeSet<String> {
        BTreeSet::new()
    }

    /// Visits one component. Overrides usually handle a few kinds and defer
    /// the rest to [`walk`].
    fn visit(&self, component: &Component, out: &mut TextBuffer) {
        walk_with(component, out, &|child, out| self.visit(child, out));
    }

    fn body(&self, doc: &ContentDocument) -> String {
        let mut out = TextBuffer::new();
        self.visit(&doc.content, &mut out);
        out.into_string()
    }

    fn extract(&self, doc: &ContentDocument) -> IndexedDocument {
        IndexedDocument::new(doc.id.clone(), self.title(doc), self.roles(doc), self.body(doc))
    }
}

/// Walks with the default rules and no role tags.
#[derive(Debug, Default, Clone)]
pub struct DefaultExtractor;

impl ContentExtractor for DefaultExtractor {}

/// Role tags from a content field and from a table keyed by document id.
#[derive(Debug, Default, Clone)]
pub struct RolePolicy {
    pub field: Option<String>,
    pub slugs: HashMap<String, Vec<String>>,
}

impl RolePolicy {
    pub fn roles_for(&self, doc: &ContentDocument) -> BTreeSet<String> {
        let mut roles = BTreeSet::new();
        if let Some(tags) = self.slugs.get(&doc.id) {
            roles.extend(tags.iter().map(|t| t.trim().to_string()));
        }
        if let Some(field) = &self.field {
            match doc.raw.get("content").and_then(|c| c.get(field)) {
                Some(Value::Array(items)) => {
                    roles.extend(items.iter().filter_map(Value::as_str).map(|t| t.trim().to_string()));
                }
                Some(Value::String(list)) => {
                    roles.extend(list.split(',').map(|t| t.trim().to_string()));
                }
                _ => {}
            }
        }
        roles.retain(|r| !r.is_empty());
        roles
    }
}

/// Extractor for upstream stories: title from the `title` content field,
/// falling back to the story name, roles from a [`RolePolicy`].
#[derive(Debug, Default, Clone)]
pub struct StoryExtractor {
    pub roles: RolePolicy,
}

impl StoryExtractor {
    pub fn new(roles: RolePolicy) -> Self {
        Self { roles }
    }
}

impl ContentExtractor for StoryExtractor {
    fn title(&self, doc: &ContentDocument) -> String {
        doc.raw
            .get("content")
            .and_then(|c| c.get("title"))
            .and_then(Value::as_str)
            .filter(|t| !t.trim().is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| doc.name.clone())
    }

    fn roles(&self, doc: &ContentDocument) -> BTreeSet<String> {
        self.roles.roles_for(doc)
    }
}
