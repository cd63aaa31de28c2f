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

//! Per-request context passed to content sources.

use sha1::Digest;
use sha1::Sha1;
use time::Duration;
use time::OffsetDateTime;

/// Editor tokens older than this are rejected.
pub const EDITOR_TOKEN_MAX_AGE: Duration = Duration::hours(1);

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RequestContext {
    /// Request comes from the visual editor: draft content, preview key,
    /// no caching.
    pub in_editor: bool,
}

impl RequestContext {
    pub fn public() -> Self {
        Self { in_editor: false }
    }

    pub fn editor() -> Self {
        Self { in_editor: true }
    }

    /// Validates the editor query parameters
    /// (`_storyblok_tk[space_id]`, `[timestamp]`, `[token]`).
    pub fn editor_from_query(
        space_id: &str,
        timestamp: &str,
        token: &str,
        preview_key: &str,
        now: OffsetDateTime,
    ) -> Self {
        let Ok(issued) = timestamp.trim().parse::<i64>() else {
            return Self::public();
        };
        let mut hasher = Sha1::new();
        hasher.update(format!("{space_id}:{preview_key}:{timestamp}").as_bytes());
        let expected = hex::encode(hasher.finalize());
        if !expected.eq_ignore_ascii_case(token.trim()) {
            return Self::public();
        }
        if issued <= (now - EDITOR_TOKEN_MAX_AGE).unix_timestamp() {
            return Self::public();
        }
        Self::editor()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn token(space_id: &str, preview_key: &str, timestamp: &str) -> String {
        let mut hasher = Sha1::new();
        hasher.update(format!("{space_id}:{preview_key}:{timestamp}").as_bytes());
        hex::encode(hasher.finalize())
    }

    #[test]
    fn valid_recent_token_enables_editor() {
        let now = OffsetDateTime::from_unix_timestamp(1_700_000_000).unwrap_or(OffsetDateTime::UNIX_EPOCH);
        let ts = (now.unix_timestamp() - 60).to_string();
        let tk = token("42", "preview", &ts);
        let ctx = RequestContext::editor_from_query("42", &ts, &tk, "preview", now);
        assert!(ctx.in_editor);
    }

    #[test]
    fn stale_or_forged_tokens_stay_public() {
        let now = OffsetDateTime::from_unix_timestamp(1_700_000_000).unwrap_or(OffsetDateTime::UNIX_EPOCH);
        let old = (now.unix_timestamp() - 7200).to_string();
        let tk = token("42", "preview", &old);
        assert_eq!(
            RequestContext::editor_from_query("42", &old, &tk, "preview", now),
            RequestContext::public()
        );

        let ts = now.unix_timestamp().to_string();
        let forged = token("42", "wrong-key", &ts);
        assert!(!RequestContext::editor_from_query("42", &ts, &forged, "preview", now).in_editor);
        assert!(!RequestContext::editor_from_query("42", "soon", &forged, "preview", now).in_editor);
    }
}
