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

//! Content sources feeding the index updater.

use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use anyhow::Result;
use globset::Glob;
use globset::GlobSet;
use globset::GlobSetBuilder;
use parking_lot::Mutex;
use serde::Deserialize;
use serde_json::Value;
use time::OffsetDateTime;
use time::PrimitiveDateTime;
use time::format_description::well_known::Rfc3339;
use time::macros::format_description;
use tracing::debug;
use tracing::warn;
use walkdir::WalkDir;

use crate::component::Component;
use crate::component::ComponentRegistry;

/// Metadata-only view of one content item.
#[derive(Debug, Clone, PartialEq)]
pub struct ContentSummary {
    pub id: String,
    pub last_modified: Option<OffsetDateTime>,
}

#[derive(Debug, Clone)]
pub struct ContentDocument {
    pub id: String,
    pub name: String,
    pub slug: String,
    pub lang: String,
    pub tag_list: Vec<String>,
    pub published_at: Option<OffsetDateTime>,
    pub content: Component,
    /// The story as received, for extractors reading custom fields.
    pub raw: Value,
}

pub trait ContentSource: Send + Sync {
    fn list_summaries(&self, locale: &str) -> Result<Vec<ContentSummary>>;

    /// Full document for `id`, or `None` when it no longer resolves.
    fn load_content(&self, locale: &str, id: &str) -> Result<Option<ContentDocument>>;

    /// Drops anything cached for `locale`.
    fn invalidate(&self, _locale: &str) {}
}

/// Story shape shared by the upstream API and the directory layout.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct StoryJson {
    pub id: Option<i64>,
    pub name: String,
    pub slug: String,
    pub full_slug: String,
    pub lang: String,
    pub tag_list: Vec<String>,
    pub published_at: Option<String>,
    pub created_at: Option<String>,
    pub content: Value,
}

impl StoryJson {
    pub fn content_id(&self) -> &str {
        if self.full_slug.is_empty() {
            &self.slug
        } else {
            &self.full_slug
        }
    }

    pub fn last_modified(&self) -> Option<OffsetDateTime> {
        self.published_at
            .as_deref()
            .and_then(parse_timestamp)
            .or_else(|| self.created_at.as_deref().and_then(parse_timestamp))
    }

    pub fn summary(&self) -> ContentSummary {
        ContentSummary {
            id: self.content_id().to_string(),
            last_modified: self.last_modified(),
        }
    }

    pub fn into_document(self, registry: &ComponentRegistry, raw: Value) -> ContentDocument {
        ContentDocument {
            id: self.content_id().to_string(),
            published_at: self.published_at.as_deref().and_then(parse_timestamp),
            content: registry.parse(&self.content),
            name: self.name,
            slug: self.slug,
            lang: self.lang,
            tag_list: self.tag_list,
            raw,
        }
    }
}

/// Parses RFC 3339, or `YYYY-MM-DD HH:MM` taken as UTC.
pub fn parse_timestamp(value: &str) -> Option<OffsetDateTime> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }
    if let Ok(ts) = OffsetDateTime::parse(value, &Rfc3339) {
        return Some(ts);
    }
    PrimitiveDateTime::parse(
        value,
        format_description!("[year]-[month]-[day] [hour]:[minute]"),
    )
        .ok()
        .map(PrimitiveDateTime::assume_utc)
}

/// Unwraps `{"story": {...}}`; anything else is taken as a bare story.
pub fn story_value(value: Value) -> Value {
    match value {
        Value::Object(mut map) if map.get("story").is_some_and(Value::is_object) => {
            map.remove("story").unwrap_or_default()
        }
        other => other,
    }
}

/// Stories stored as JSON files under `<root>/<locale>/`.
#[derive(Debug)]
pub struct DirSource {
    root: PathBuf,
    pattern: GlobSet,
    registry: Arc<ComponentRegistry>,
    paths: Mutex<HashMap<String, HashMap<String, PathBuf>>>,
}

impl DirSource {
    pub fn new(root: &Path, pattern: &str, registry: Arc<ComponentRegistry>) -> Result<Self> {
        let mut builder = GlobSetBuilder::new();
        builder.add(Glob::new(pattern).with_context(|| format!("invalid pattern {pattern}"))?);
        let pattern = builder.build()?;
        Ok(Self {
            root: root.to_path_buf(),
            pattern,
            registry,
            paths: Mutex::new(HashMap::new()),
        })
    }

    fn read_story(path: &Path) -> Result<(StoryJson, Value)> {
        let text =
            fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
        let value: Value =
            serde_json::from_str(&text).with_context(|| format!("parse {}", path.display()))?;
        let value = story_value(value);
        let story = StoryJson::deserialize(&value)
            .with_context(|| format!("decode story {}", path.display()))?;
        Ok((story, value))
    }

    fn scan(&self, locale: &str) -> Result<Vec<(ContentSummary, PathBuf)>> {
        if !self.root.is_dir() {
            anyhow::bail!("content directory not found: {}", self.root.display());
        }
        let dir = self.root.join(locale);
        if !dir.is_dir() {
            debug!(locale = %locale, dir = %dir.display(), "no content directory for locale");
            return Ok(Vec::new());
        }
        let mut found = Vec::new();
        for entry in WalkDir::new(&dir)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|e| e.ok())
        {
            if !entry.file_type().is_file() {
                continue;
            }
            let relative = entry.path().strip_prefix(&dir).unwrap_or(entry.path());
            if !self.pattern.is_match(relative) {
                continue;
            }
            match Self::read_story(entry.path()) {
                Ok((story, _)) => found.push((story.summary(), entry.path().to_path_buf())),
                Err(err) => warn!(path = %entry.path().display(), error = %err, "skipping story"),
            }
        }
        Ok(found)
    }
}

impl ContentSource for DirSource {
    fn list_summaries(&self, locale: &str) -> Result<Vec<ContentSummary>> {
        let found = self.scan(locale)?;
        let mut paths = HashMap::new();
        let mut summaries = Vec::with_capacity(found.len());
        for (summary, path) in found {
            paths.insert(summary.id.clone(), path);
            summaries.push(summary);
        }
        self.paths.lock().insert(locale.to_string(), paths);
        Ok(summaries)
    }

    fn load_content(&self, locale: &str, id: &str) -> Result<Option<ContentDocument>> {
        let known = self.paths.lock().get(locale).map(|paths| paths.get(id).cloned());
        let path = match known {
            Some(path) => path,
            None => {
                self.list_summaries(locale)?;
                self.paths
                    .lock()
                    .get(locale)
                    .and_then(|paths| paths.get(id).cloned())
            }
        };
        let Some(path) = path else {
            return Ok(None);
        };
        if !path.exists() {
            return Ok(None);
        }
        let (story, raw) = Self::read_story(&path)?;
        Ok(Some(story.into_document(&self.registry, raw)))
    }

    fn invalidate(&self, locale: &str) {
        self.paths.lock().remove(locale);
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use tempfile::tempdir;

    use super::*;

    fn write(root: &Path, rel: &str, value: Value) -> Result<()> {
        let path = root.join(rel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, serde_json::to_string_pretty(&value)?)?;
        Ok(())
    }

    #[test]
    fn parses_both_timestamp_forms() {
        let rfc = parse_timestamp("2024-01-01T10:00:00.000Z").map(|t| t.unix_timestamp());
        let short = parse_timestamp("2024-01-01 10:00").map(|t| t.unix_timestamp());
        assert_eq!(rfc, Some(1_704_103_200));
        assert_eq!(short, rfc);
        assert_eq!(parse_timestamp("yesterday"), None);
    }

    #[test]
    fn lists_and_loads_stories_per_locale() -> Result<()> {
        let dir = tempdir()?;
        write(
            dir.path(),
            "en/home.json",
            json!({"story": {
                "name": "Home", "slug": "home", "full_slug": "home",
                "created_at": "2023-05-01T08:00:00Z",
                "content": {"component": "page", "body": []}
            }}),
        )?;
        write(
            dir.path(),
            "en/blog/post.json",
            json!({
                "name": "Post", "slug": "post", "full_slug": "blog/post",
                "published_at": "2024-02-01T08:00:00Z",
                "content": {"component": "text", "content": "hi"}
            }),
        )?;
        write(dir.path(), "en/broken.json", json!("not a story"))?;
        fs::write(dir.path().join("en/notes.txt"), "ignored")?;

        let source = DirSource::new(dir.path(), "**/*.json", Arc::new(ComponentRegistry::standard()))?;
        let mut ids: Vec<String> = source
            .list_summaries("en")?
            .into_iter()
            .map(|s| s.id)
            .collect();
        ids.sort();
        assert_eq!(ids, vec!["blog/post".to_string(), "home".to_string()]);

        let post = source.load_content("en", "blog/post")?.expect("post");
        assert_eq!(post.name, "Post");
        assert_eq!(post.content, Component::Text { markdown: "hi".into() });
        assert!(source.load_content("en", "missing")?.is_none());
        assert!(source.list_summaries("de")?.is_empty());
        Ok(())
    }

    #[test]
    fn missing_root_is_an_error() -> Result<()> {
        let dir = tempdir()?;
        let source = DirSource::new(
            &dir.path().join("nope"),
            "**/*.json",
            Arc::new(ComponentRegistry::standard()),
        )?;
        assert!(source.list_summaries("en").is_err());
        Ok(())
    }
}
