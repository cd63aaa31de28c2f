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

//! Content source backed by the Storyblok content delivery API.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use anyhow::Result;
use reqwest::StatusCode;
use reqwest::blocking::Client;
use serde::Deserialize;
use serde_json::Value;
use time::OffsetDateTime;
use tracing::debug;

use crate::cache::ContentCache;
use crate::component::ComponentRegistry;
use crate::config::SourceConfig;
use crate::context::RequestContext;
use crate::source::ContentDocument;
use crate::source::ContentSource;
use crate::source::ContentSummary;
use crate::source::StoryJson;
use crate::source::story_value;

const SUMMARIES_KEY: &str = "\u{0}summaries";

#[derive(Debug, Deserialize)]
struct StoriesPage {
    #[serde(default)]
    stories: Vec<StoryJson>,
}

pub struct StoryblokSource {
    client: Client,
    base_url: String,
    api_key_public: String,
    api_key_preview: Option<String>,
    include_drafts: bool,
    per_page: usize,
    default_locale: String,
    registry: Arc<ComponentRegistry>,
    summaries: ContentCache<Vec<ContentSummary>>,
    stories: ContentCache<Option<Value>>,
}

impl StoryblokSource {
    pub fn new(
        config: &SourceConfig,
        default_locale: &str,
        registry: Arc<ComponentRegistry>,
    ) -> Result<Self> {
        let api_key_public = config
            .api_key_public
            .clone()
            .filter(|k| !k.is_empty())
            .context("source.api_key_public is required for the storyblok source")?;
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .context("build http client")?;
        let ttl = Duration::from_secs(config.cache_seconds);
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key_public,
            api_key_preview: config.api_key_preview.clone().filter(|k| !k.is_empty()),
            include_drafts: config.include_drafts,
            per_page: config.per_page.max(1),
            default_locale: default_locale.to_string(),
            registry,
            summaries: ContentCache::new(ttl),
            stories: ContentCache::new(ttl),
        })
    }

    fn drafts(&self, ctx: RequestContext) -> bool {
        self.include_drafts || ctx.in_editor
    }

    fn api_key(&self, ctx: RequestContext) -> &str {
        match (&self.api_key_preview, self.drafts(ctx)) {
            (Some(preview), true) => preview,
            _ => &self.api_key_public,
        }
    }

    fn common_params(&self, ctx: RequestContext) -> Vec<(&'static str, String)> {
        let mut params = vec![("token", self.api_key(ctx).to_string())];
        if self.drafts(ctx) {
            params.push(("version", "draft".to_string()));
        }
        params.push(("cb", OffsetDateTime::now_utc().unix_timestamp().to_string()));
        params
    }

    fn list_params(
        &self,
        ctx: RequestContext,
        locale: &str,
        page: usize,
    ) -> Vec<(&'static str, String)> {
        let mut params = self.common_params(ctx);
        params.push(("per_page", self.per_page.to_string()));
        params.push(("page", page.to_string()));
        params.push(("excluding_fields", "content".to_string()));
        if !locale.eq_ignore_ascii_case(&self.default_locale) {
            params.push(("starts_with", format!("{locale}/*")));
        }
        params
    }

    pub fn list_summaries_with(
        &self,
        ctx: RequestContext,
        locale: &str,
    ) -> Result<Vec<ContentSummary>> {
        if !ctx.in_editor {
            if let Some(cached) = self.summaries.get(locale, SUMMARIES_KEY) {
                return Ok(cached);
            }
        }
        let url = format!("{}/stories", self.base_url);
        let mut summaries = Vec::new();
        let mut page = 1;
        loop {
            let response = self
                .client
                .get(&url)
                .query(&self.list_params(ctx, locale, page))
                .send()
                .with_context(|| format!("list stories for {locale}"))?
                .error_for_status()
                .with_context(|| format!("list stories for {locale}"))?;
            let total = response
                .headers()
                .get("total")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.trim().parse::<usize>().ok());
            let body: StoriesPage = response
                .json()
                .with_context(|| format!("decode stories page {page} for {locale}"))?;
            let received = body.stories.len();
            summaries.extend(body.stories.iter().map(StoryJson::summary));
            debug!(locale = %locale, page, received, total = ?total, "fetched stories page");
            if page >= page_count(total, self.per_page) || received == 0 {
                break;
            }
            page += 1;
        }
        if !ctx.in_editor {
            self.summaries.insert(locale, SUMMARIES_KEY, summaries.clone());
        }
        Ok(summaries)
    }

    pub fn load_content_with(
        &self,
        ctx: RequestContext,
        locale: &str,
        id: &str,
    ) -> Result<Option<ContentDocument>> {
        let story = match (!ctx.in_editor).then(|| self.stories.get(locale, id)).flatten() {
            Some(cached) => cached,
            None => {
                let fetched = self.fetch_story(ctx, id)?;
                if !ctx.in_editor {
                    self.stories.insert(locale, id, fetched.clone());
                }
                fetched
            }
        };
        let Some(raw) = story else {
            return Ok(None);
        };
        let story = StoryJson::deserialize(&raw).with_context(|| format!("decode story {id}"))?;
        Ok(Some(story.into_document(&self.registry, raw)))
    }

    fn fetch_story(&self, ctx: RequestContext, id: &str) -> Result<Option<Value>> {
        let url = format!("{}/stories/{}", self.base_url, id.trim_start_matches('/'));
        let response = self
            .client
            .get(&url)
            .query(&self.common_params(ctx))
            .send()
            .with_context(|| format!("load story {id}"))?;
        if response.status() == StatusCode::NOT_FOUND {
            debug!(id = %id, "story not found");
            return Ok(None);
        }
        let value: Value = response
            .error_for_status()
            .with_context(|| format!("load story {id}"))?
            .json()
            .with_context(|| format!("decode story {id}"))?;
        Ok(Some(story_value(value)))
    }
}

impl ContentSource for StoryblokSource {
    fn list_summaries(&self, locale: &str) -> Result<Vec<ContentSummary>> {
        self.list_summaries_with(RequestContext::public(), locale)
    }

    fn load_content(&self, locale: &str, id: &str) -> Result<Option<ContentDocument>> {
        self.load_content_with(RequestContext::public(), locale, id)
    }

    fn invalidate(&self, locale: &str) {
        self.summaries.invalidate_locale(locale);
        self.stories.invalidate_locale(locale);
    }
}

fn page_count(total: Option<usize>, per_page: usize) -> usize {
    match total {
        Some(total) => total.div_ceil(per_page.max(1)).max(1),
        None => 1,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn source(include_drafts: bool) -> Result<StoryblokSource> {
        let config = SourceConfig {
            kind: "storyblok".to_string(),
            api_key_public: Some("public".to_string()),
            api_key_preview: Some("preview".to_string()),
            include_drafts,
            per_page: 25,
            ..SourceConfig::default()
        };
        StoryblokSource::new(&config, "en", Arc::new(ComponentRegistry::standard()))
    }

    fn param<'a>(params: &'a [(&'static str, String)], name: &str) -> Option<&'a str> {
        params
            .iter()
            .find(|(key, _)| *key == name)
            .map(|(_, value)| value.as_str())
    }

    #[test]
    fn pages_follow_total_header() {
        assert_eq!(page_count(Some(0), 100), 1);
        assert_eq!(page_count(Some(100), 100), 1);
        assert_eq!(page_count(Some(101), 100), 2);
        assert_eq!(page_count(None, 100), 1);
    }

    #[test]
    fn listing_params_depend_on_locale_and_context() -> Result<()> {
        let published = source(false)?;
        let params = published.list_params(RequestContext::public(), "en", 2);
        assert_eq!(param(&params, "token"), Some("public"));
        assert_eq!(param(&params, "per_page"), Some("25"));
        assert_eq!(param(&params, "page"), Some("2"));
        assert_eq!(param(&params, "excluding_fields"), Some("content"));
        assert_eq!(param(&params, "starts_with"), None);
        assert_eq!(param(&params, "version"), None);
        assert!(param(&params, "cb").is_some());

        let params = published.list_params(RequestContext::editor(), "de", 1);
        assert_eq!(param(&params, "token"), Some("preview"));
        assert_eq!(param(&params, "version"), Some("draft"));
        assert_eq!(param(&params, "starts_with"), Some("de/*"));

        let drafts = source(true)?;
        let params = drafts.list_params(RequestContext::public(), "en", 1);
        assert_eq!(param(&params, "version"), Some("draft"));
        Ok(())
    }

    #[test]
    fn public_key_is_required() {
        let config = SourceConfig {
            kind: "storyblok".to_string(),
            ..SourceConfig::default()
        };
        assert!(StoryblokSource::new(&config, "en", Arc::new(ComponentRegistry::standard())).is_err());
    }
}
